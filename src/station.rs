//! Checkout station: the single owner of a cart session.
//!
//! Per frame: adapter -> ROI -> debounce -> aggregate -> (optional) add-item
//! notification. Control commands (reset, checkout, quit) go through the
//! same `&mut self` path, so there is exactly one writer of session state.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::cart::{CartSession, PriceTable};
use crate::checkout::{CheckoutClient, CheckoutState, PaymentChoice};
use crate::detect::{DetectionAdapter, DetectionEvent, DetectorBackend};
use crate::frame::Frame;
use crate::geometry::{self, RoiPolygon};
use crate::ledger::{Ledger, LedgerError};

/// Externally triggered state transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StationCommand {
    ResetCart,
    TriggerCheckout,
    Quit,
}

impl FromStr for StationCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r" | "reset" => Ok(StationCommand::ResetCart),
            "p" | "pay" | "checkout" => Ok(StationCommand::TriggerCheckout),
            "q" | "quit" | "exit" => Ok(StationCommand::Quit),
            other => Err(anyhow!("unknown command '{}' (use r, p or q)", other)),
        }
    }
}

/// What one frame did to the cart.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    pub detections: usize,
    pub outside_roi: usize,
    pub debounced: usize,
    /// Labels counted into the cart, in processing order.
    pub accepted: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct StationSettings {
    pub roi: RoiPolygon,
    pub payment: PaymentChoice,
    /// Send an add-item notification for every accepted event.
    pub send_api: bool,
}

pub struct CheckoutStation<L> {
    adapter: DetectionAdapter,
    settings: StationSettings,
    session: CartSession,
    client: CheckoutClient<L>,
    last_notification: Option<Result<(), LedgerError>>,
}

impl<L: Ledger> CheckoutStation<L> {
    pub fn new(
        adapter: DetectionAdapter,
        prices: Arc<PriceTable>,
        debounce_window: std::time::Duration,
        settings: StationSettings,
        ledger: L,
    ) -> Self {
        Self {
            adapter,
            settings,
            session: CartSession::new(prices, debounce_window),
            client: CheckoutClient::new(ledger),
            last_notification: None,
        }
    }

    pub fn session(&self) -> &CartSession {
        &self.session
    }

    pub fn checkout_state(&self) -> &CheckoutState {
        self.client.state()
    }

    pub fn ledger(&self) -> &L {
        self.client.ledger()
    }

    pub fn roi(&self) -> &RoiPolygon {
        &self.settings.roi
    }

    /// Outcome of the most recent add-item notification, if any was sent.
    pub fn last_notification(&self) -> Option<&Result<(), LedgerError>> {
        self.last_notification.as_ref()
    }

    /// Detect on `frame` and fold the results into the cart.
    pub fn process_frame(
        &mut self,
        backend: &mut dyn DetectorBackend,
        frame: &Frame,
    ) -> Result<FrameOutcome> {
        let events = self.adapter.detect(backend, frame)?;
        Ok(self.process_detections(&events))
    }

    /// Fold already-normalised detections into the cart, in the given order.
    pub fn process_detections(&mut self, events: &[DetectionEvent]) -> FrameOutcome {
        let mut outcome = FrameOutcome {
            detections: events.len(),
            ..FrameOutcome::default()
        };
        for event in events {
            if !geometry::contains(&event.bbox, &self.settings.roi) {
                outcome.outside_roi += 1;
                continue;
            }
            let Some(line) = self.session.offer(&event.label, event.frame_timestamp) else {
                outcome.debounced += 1;
                log::debug!("{} still in view; not counted", event.label);
                continue;
            };
            log::info!(
                "added {} (x{}, {:.2} each, conf {:.2})",
                line.name,
                line.count,
                line.unit_price,
                event.confidence
            );
            if self.settings.send_api {
                let line = line.clone();
                self.last_notification = Some(self.client.notify_added(&line).map(|_| ()));
            }
            outcome.accepted.push(event.label.clone());
        }
        outcome
    }

    /// Apply a control command. Returns `false` when the station should stop.
    pub fn handle(&mut self, command: StationCommand) -> bool {
        match command {
            StationCommand::ResetCart => {
                self.session.reset();
                log::info!("cart reset");
                true
            }
            StationCommand::TriggerCheckout => {
                let payment = self.settings.payment.clone();
                self.client.checkout(&mut self.session, &payment);
                if let Some(message) = self.session.transaction_message() {
                    log::info!("{}", message);
                }
                true
            }
            StationCommand::Quit => false,
        }
    }
}
