use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geometry::BoundingBox;

/// Model output for one object, before taxonomy lookup and thresholding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Ordinal class index into the label taxonomy.
    pub class_index: usize,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in frame pixels.
    pub xyxy: [f32; 4],
}

impl RawDetection {
    pub fn new(class_index: usize, confidence: f32, xyxy: [f32; 4]) -> Self {
        Self {
            class_index,
            confidence,
            xyxy,
        }
    }
}

/// A normalised detection, valid for the frame that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionEvent {
    pub label: String,
    /// In `[0, 1]`.
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub frame_timestamp: Duration,
}
