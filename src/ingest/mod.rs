//! Frame sources.
//!
//! - `stub://<name>`: synthetic frames (testing, scripted runs)
//! - a directory of still images (feature: ingest-image)
//!
//! Sources stamp each frame with the station clock at capture time. Camera
//! drivers and video decode live outside this crate.

#[cfg(feature = "ingest-image")]
pub mod image_dir;
pub mod stub;

use anyhow::Result;

use crate::frame::{Clock, Frame};
use crate::geometry::Resolution;

#[cfg(feature = "ingest-image")]
pub use image_dir::ImageDirSource;
pub use stub::{StubConfig, StubSource};

/// Producer of frames for the station loop.
pub trait FrameSource {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    /// Capture the next frame. `Ok(None)` means the stream ended.
    fn next_frame(&mut self, clock: &dyn Clock) -> Result<Option<Frame>>;

    /// Number of frames produced so far.
    fn frames_captured(&self) -> u64;
}

/// Open a source from its configured location.
pub fn open_source(location: &str, resolution: Resolution) -> Result<Box<dyn FrameSource>> {
    if location.starts_with("stub://") {
        let config = StubConfig {
            url: location.to_string(),
            resolution,
            max_frames: None,
        };
        return Ok(Box::new(StubSource::new(config)?));
    }
    #[cfg(feature = "ingest-image")]
    {
        Ok(Box::new(ImageDirSource::open(std::path::Path::new(
            location,
        ))?))
    }
    #[cfg(not(feature = "ingest-image"))]
    {
        anyhow::bail!(
            "source '{}' requires the ingest-image feature (only stub:// is built in)",
            location
        )
    }
}
