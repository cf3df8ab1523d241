use std::collections::VecDeque;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Detections to report for one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptedFrame {
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

/// Replays a fixed script, one entry per frame, then reports nothing.
///
/// Used by tests and the demo in place of a real model.
pub struct ScriptedBackend {
    script: VecDeque<ScriptedFrame>,
    frames_seen: u64,
}

impl ScriptedBackend {
    pub fn new(script: Vec<ScriptedFrame>) -> Self {
        Self {
            script: script.into(),
            frames_seen: 0,
        }
    }

    /// Load a JSON array of `{"detections": [...]}` entries.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read detection script {}: {}", path.display(), e))?;
        let script: Vec<ScriptedFrame> = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid detection script {}: {}", path.display(), e))?;
        Ok(Self::new(script))
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        self.frames_seen += 1;
        Ok(self
            .script
            .pop_front()
            .map(|frame| frame.detections)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn replays_script_then_goes_quiet() {
        let mut backend = ScriptedBackend::new(vec![
            ScriptedFrame {
                detections: vec![RawDetection::new(0, 0.9, [1.0, 1.0, 5.0, 5.0])],
            },
            ScriptedFrame::default(),
        ]);
        let frame = Frame::new(Vec::new(), 0, 0, Duration::ZERO, 1);

        assert_eq!(backend.detect(&frame).unwrap().len(), 1);
        assert!(backend.detect(&frame).unwrap().is_empty());
        assert!(backend.detect(&frame).unwrap().is_empty());
        assert_eq!(backend.frames_seen(), 3);
        assert_eq!(backend.remaining(), 0);
    }

    #[test]
    fn parses_script_json() {
        let json = r#"[
            {"detections": [{"class_index": 2, "confidence": 0.8, "xyxy": [10, 20, 30, 40]}]},
            {}
        ]"#;
        let script: Vec<ScriptedFrame> = serde_json::from_str(json).unwrap();
        assert_eq!(script.len(), 2);
        assert_eq!(script[0].detections[0].class_index, 2);
        assert!(script[1].detections.is_empty());
    }
}
