//! Checkout handshake.
//!
//! `CheckoutClient` turns a cart snapshot plus a payment choice into a
//! `CheckoutRequest`, sends it to the ledger and folds the outcome back into
//! the session's transaction message:
//!
//! ```text
//! Idle -> Pending -> Settled
//!                 -> Failed
//! ```
//!
//! Terminal states are only observed; the next trigger starts a new cycle.
//! Failures never clear the cart, so the shopper can retry.

use crate::cart::{CartLine, CartSession};
use crate::ledger::{
    requires_identifier, CheckoutItem, CheckoutRequest, Ledger, LedgerError, LedgerItem, NewItem,
};

/// Payment method and optional payer identifier chosen at the station.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentChoice {
    pub method: String,
    pub identifier: Option<String>,
}

impl PaymentChoice {
    pub fn new(method: impl Into<String>, identifier: Option<String>) -> Self {
        Self {
            method: method.into(),
            identifier,
        }
    }

    pub fn requires_identifier(&self) -> bool {
        requires_identifier(&self.method)
    }

    fn identifier(&self) -> Option<&str> {
        self.identifier
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum CheckoutState {
    #[default]
    Idle,
    Pending,
    Settled {
        transaction_id: Option<String>,
        amount_paid: f64,
    },
    Failed(LedgerError),
}

/// Drives checkout and item-add notifications against one ledger.
pub struct CheckoutClient<L> {
    ledger: L,
    state: CheckoutState,
}

impl<L: Ledger> CheckoutClient<L> {
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            state: CheckoutState::Idle,
        }
    }

    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Run one checkout cycle for `session`.
    ///
    /// Only the transaction message changes on the session; lines and
    /// debounce state are left as they were.
    pub fn checkout(&mut self, session: &mut CartSession, payment: &PaymentChoice) -> &CheckoutState {
        self.state = CheckoutState::Pending;
        let outcome = build_request(&session.snapshot(), payment)
            .and_then(|request| self.ledger.checkout(&request));

        match outcome {
            Ok(response) => {
                let tx = response.transaction_id.clone().unwrap_or_default();
                session.set_transaction_message(format!("{} - TxID: {}", response.status, tx));
                log::info!(
                    "checkout settled: status={} amount={:.2} tx={}",
                    response.status,
                    response.amount_paid,
                    tx
                );
                self.state = CheckoutState::Settled {
                    transaction_id: response.transaction_id,
                    amount_paid: response.amount_paid,
                };
            }
            Err(err) => {
                session.set_transaction_message(failure_message(&err));
                log::warn!("checkout failed: {}", err);
                self.state = CheckoutState::Failed(err);
            }
        }
        &self.state
    }

    /// Tell the ledger that one unit of `line` was placed in the cart.
    pub fn notify_added(&self, line: &CartLine) -> Result<LedgerItem, LedgerError> {
        let item = NewItem {
            name: line.name.clone(),
            price: line.unit_price,
        };
        self.ledger.add_item(&item).map_err(|err| {
            log::warn!("add_item notification for '{}' failed: {}", line.name, err);
            err
        })
    }
}

/// Build the request from a snapshot, one `{name, price}` entry per unit so
/// the ledger's sum equals the cart total.
///
/// Identifier-based methods without an identifier fail here, before any
/// ledger call.
pub fn build_request(
    snapshot: &[CartLine],
    payment: &PaymentChoice,
) -> Result<CheckoutRequest, LedgerError> {
    let identifier = payment.identifier();
    if payment.requires_identifier() && identifier.is_none() {
        return Err(LedgerError::Validation(format!(
            "{} payment requires a payer identifier",
            payment.method
        )));
    }
    let items = snapshot
        .iter()
        .flat_map(|line| {
            (0..line.count).map(move |_| CheckoutItem {
                name: line.name.clone(),
                price: line.unit_price,
            })
        })
        .collect();
    Ok(CheckoutRequest {
        items,
        payment_method: payment.method.clone(),
        upi_id: identifier.map(str::to_string),
    })
}

fn failure_message(err: &LedgerError) -> String {
    match err {
        LedgerError::Status { code, .. } => format!("Checkout failed ({})", code),
        LedgerError::Validation(reason) => format!("Checkout error: {}", reason),
        LedgerError::Timeout => "Checkout error: ledger timed out".to_string(),
        LedgerError::Transport(reason) => format!("Checkout error: {}", reason),
        LedgerError::Decode(reason) => format!("Checkout error: bad response ({})", reason),
    }
}
