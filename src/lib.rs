//! Checkout Kernel
//!
//! Cart state engine for camera-driven self-checkout.
//!
//! # Architecture
//!
//! Frames flow through a single owner, the `CheckoutStation`:
//!
//! 1. **Detect**: a `DetectorBackend` yields raw `(class, confidence, box)`
//!    tuples; the `DetectionAdapter` maps them to labelled `DetectionEvent`s.
//! 2. **ROI filter**: only boxes whose center lies in the checkout polygon
//!    count.
//! 3. **Debounce**: a label is counted at most once per window, so an item
//!    sitting in view is not counted every frame.
//! 4. **Aggregate**: accepted events become cart lines priced from the
//!    catalog.
//! 5. **Ledger**: item-add notifications and the checkout handshake go to
//!    the ledger service over HTTP/JSON.
//!
//! # Module Structure
//!
//! - `geometry`: points, boxes, ROI polygon
//! - `frame`: frames and the monotonic clock
//! - `ingest`: frame sources (stub, image directory)
//! - `detect`: backends, registry, taxonomy, adapter
//! - `debounce`, `cart`: gate, cart lines, session
//! - `ledger`, `checkout`: service contract, client, checkout state machine
//! - `station`: per-frame pipeline and control commands
//! - `api`: the ledger HTTP service
//! - `config`: layered station/ledger configuration

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod debounce;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod ledger;
pub mod station;

pub use cart::{Cart, CartLine, CartSession, CartSummary, PriceTable, SummaryLine};
pub use checkout::{CheckoutClient, CheckoutState, PaymentChoice};
pub use config::{Catalog, LedgerApiConfig, StationConfig};
pub use debounce::{DebounceGate, DEFAULT_DEBOUNCE_WINDOW};
pub use detect::{
    BackendRegistry, DetectionAdapter, DetectionEvent, DetectorBackend, LabelTaxonomy,
    RawDetection, ScriptedBackend, ScriptedFrame,
};
pub use frame::{Clock, Frame, ManualClock, MonotonicClock};
pub use geometry::{BoundingBox, Point, Resolution, RoiPolygon};
pub use ingest::{open_source, FrameSource, StubConfig, StubSource};
pub use ledger::{
    HttpLedger, InMemoryLedger, Ledger, LedgerError, LedgerItem, LedgerStore, LedgerTimeouts,
    MemoryLedgerStore, SqliteLedgerStore,
};
pub use station::{CheckoutStation, FrameOutcome, StationCommand, StationSettings};
