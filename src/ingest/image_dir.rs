//! Still-image directory source.
//!
//! Reads every JPEG/PNG file in a directory in file-name order and yields
//! one frame per image. Useful for replaying captured checkout sessions.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::frame::{Clock, Frame};

use super::FrameSource;

pub struct ImageDirSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    frame_count: u64,
}

impl ImageDirSource {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("read image directory {}", dir.display()))?
        {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
                .unwrap_or(false);
            if is_image {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", dir.display()));
        }
        files.sort();
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            next: 0,
            frame_count: 0,
        })
    }
}

impl FrameSource for ImageDirSource {
    fn describe(&self) -> String {
        format!("{} ({} images)", self.dir.display(), self.files.len())
    }

    fn next_frame(&mut self, clock: &dyn Clock) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let image = image::open(path).with_context(|| format!("decode {}", path.display()))?;
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        self.frame_count += 1;
        Ok(Some(Frame::new(
            rgb.into_raw(),
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
