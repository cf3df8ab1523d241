use anyhow::{anyhow, Result};

use crate::frame::{Clock, Frame};
use crate::geometry::Resolution;

use super::FrameSource;

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct StubConfig {
    /// `stub://<name>`
    pub url: String,
    pub resolution: Resolution,
    /// Stop after this many frames; `None` runs forever.
    pub max_frames: Option<u64>,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            url: "stub://checkout_camera".to_string(),
            resolution: Resolution::new(640, 480),
            max_frames: None,
        }
    }
}

/// Synthetic frame source. Produces flat gray RGB frames.
pub struct StubSource {
    config: StubConfig,
    frame_count: u64,
}

impl StubSource {
    pub fn new(config: StubConfig) -> Result<Self> {
        if !config.url.starts_with("stub://") {
            return Err(anyhow!("stub source requires a stub:// url, got {}", config.url));
        }
        if config.resolution.width == 0 || config.resolution.height == 0 {
            return Err(anyhow!("stub source resolution must be non-zero"));
        }
        Ok(Self {
            config,
            frame_count: 0,
        })
    }
}

impl FrameSource for StubSource {
    fn describe(&self) -> String {
        format!(
            "{} ({}x{})",
            self.config.url, self.config.resolution.width, self.config.resolution.height
        )
    }

    fn next_frame(&mut self, clock: &dyn Clock) -> Result<Option<Frame>> {
        if let Some(max) = self.config.max_frames {
            if self.frame_count >= max {
                return Ok(None);
            }
        }
        self.frame_count += 1;
        let Resolution { width, height } = self.config.resolution;
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        Ok(Some(Frame::new(
            vec![128u8; len],
            width,
            height,
            clock.now(),
            self.frame_count,
        )))
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}
