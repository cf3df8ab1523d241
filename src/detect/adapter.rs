use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{DetectionEvent, RawDetection};
use crate::detect::taxonomy::LabelTaxonomy;
use crate::frame::Frame;
use crate::geometry::BoundingBox;

/// Default minimum confidence for a detection to leave the adapter.
pub const DEFAULT_CONF_THRESHOLD: f32 = 0.30;

/// Stateless translation from backend output to `DetectionEvent`s.
#[derive(Clone, Debug)]
pub struct DetectionAdapter {
    taxonomy: Arc<LabelTaxonomy>,
    conf_threshold: f32,
}

impl DetectionAdapter {
    pub fn new(taxonomy: Arc<LabelTaxonomy>, conf_threshold: f32) -> Self {
        Self {
            taxonomy,
            conf_threshold,
        }
    }

    pub fn conf_threshold(&self) -> f32 {
        self.conf_threshold
    }

    /// Run `backend` on `frame` and normalise its output.
    pub fn detect(
        &self,
        backend: &mut dyn DetectorBackend,
        frame: &Frame,
    ) -> Result<Vec<DetectionEvent>> {
        let raw = backend
            .detect(frame)
            .with_context(|| format!("detector '{}' failed on frame {}", backend.name(), frame.sequence))?;
        Ok(self.normalize(&raw, frame.timestamp))
    }

    /// Map raw detections to events, keeping backend order. Below-threshold,
    /// non-finite and empty boxes are dropped.
    pub fn normalize(&self, raw: &[RawDetection], timestamp: Duration) -> Vec<DetectionEvent> {
        raw.iter()
            .filter_map(|det| self.normalize_one(det, timestamp))
            .collect()
    }

    fn normalize_one(&self, det: &RawDetection, timestamp: Duration) -> Option<DetectionEvent> {
        if !det.confidence.is_finite() || det.confidence < self.conf_threshold {
            return None;
        }
        if det.xyxy.iter().any(|v| !v.is_finite()) {
            log::debug!("dropping detection with non-finite box {:?}", det.xyxy);
            return None;
        }
        // Pixel coordinates truncate toward zero.
        let [x1, y1, x2, y2] = det.xyxy.map(|v| v as i32);
        let Some(bbox) = BoundingBox::new(x1, y1, x2, y2) else {
            log::debug!("dropping detection with empty box {:?}", det.xyxy);
            return None;
        };
        Some(DetectionEvent {
            label: self.taxonomy.label_for(det.class_index).into_owned(),
            confidence: det.confidence.clamp(0.0, 1.0),
            bbox,
            frame_timestamp: timestamp,
        })
    }
}
