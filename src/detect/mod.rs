//! Object detection boundary.
//!
//! Backends turn a `Frame` into raw model output (`RawDetection`); the
//! `DetectionAdapter` normalises that output into `DetectionEvent`s using the
//! label taxonomy and the confidence threshold. Nothing downstream of the
//! adapter looks at confidence again.

mod adapter;
mod backend;
mod backends;
mod registry;
mod result;
mod taxonomy;

pub use adapter::{DetectionAdapter, DEFAULT_CONF_THRESHOLD};
pub use backend::DetectorBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use backends::{ScriptedBackend, ScriptedFrame};
pub use registry::BackendRegistry;
pub use result::{DetectionEvent, RawDetection};
pub use taxonomy::LabelTaxonomy;
