//! Ledger service boundary.
//!
//! The ledger is the system of record for added items and payment
//! settlement. The station talks to it through the `Ledger` trait:
//!
//! - `HttpLedger`: the JSON-over-HTTP contract (`add_item`, `checkout`,
//!   `items`) with short per-call timeouts
//! - `InMemoryLedger`: same semantics in-process, with call counting and
//!   failure injection for tests
//!
//! The backend side of the contract (`settle`, `LedgerStore`) is shared by
//! `InMemoryLedger` and the `api::LedgerServer`.

mod error;
mod http;
mod memory;
mod sqlite;
mod store;
mod wire;

pub use error::LedgerError;
pub use http::{HttpLedger, LedgerTimeouts};
pub use memory::InMemoryLedger;
pub use sqlite::SqliteLedgerStore;
pub use store::{LedgerStore, MemoryLedgerStore};
pub use wire::{CheckoutItem, CheckoutRequest, CheckoutResponse, ErrorDetail, LedgerItem, NewItem};

/// Default page size for `GET /items`.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Payment methods that need a payer identifier (UPI handle).
pub const IDENTIFIER_METHODS: &[&str] = &["upi", "gpay"];

/// Client of the ledger contract.
pub trait Ledger {
    fn add_item(&self, item: &NewItem) -> Result<LedgerItem, LedgerError>;

    fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutResponse, LedgerError>;

    fn list_items(&self, limit: usize) -> Result<Vec<LedgerItem>, LedgerError>;
}

impl<L: Ledger + ?Sized> Ledger for &L {
    fn add_item(&self, item: &NewItem) -> Result<LedgerItem, LedgerError> {
        (**self).add_item(item)
    }

    fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutResponse, LedgerError> {
        (**self).checkout(request)
    }

    fn list_items(&self, limit: usize) -> Result<Vec<LedgerItem>, LedgerError> {
        (**self).list_items(limit)
    }
}

impl<L: Ledger + ?Sized> Ledger for Box<L> {
    fn add_item(&self, item: &NewItem) -> Result<LedgerItem, LedgerError> {
        (**self).add_item(item)
    }

    fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutResponse, LedgerError> {
        (**self).checkout(request)
    }

    fn list_items(&self, limit: usize) -> Result<Vec<LedgerItem>, LedgerError> {
        (**self).list_items(limit)
    }
}

/// Case-insensitive match against `IDENTIFIER_METHODS`.
pub fn requires_identifier(payment_method: &str) -> bool {
    let method = payment_method.trim();
    IDENTIFIER_METHODS
        .iter()
        .any(|m| method.eq_ignore_ascii_case(m))
}

/// Reject identifier-based payments that carry no identifier.
pub fn validate_checkout(request: &CheckoutRequest) -> Result<(), LedgerError> {
    let has_identifier = request
        .upi_id
        .as_deref()
        .is_some_and(|id| !id.trim().is_empty());
    if requires_identifier(&request.payment_method) && !has_identifier {
        return Err(LedgerError::Validation(
            "UPI ID required for UPI/GPay payment".to_string(),
        ));
    }
    Ok(())
}

/// Backend side of `checkout`: validate, mark outstanding items paid and
/// issue a mock transaction id.
pub fn settle(
    store: &mut dyn LedgerStore,
    request: &CheckoutRequest,
) -> Result<CheckoutResponse, LedgerError> {
    validate_checkout(request)?;
    let amount_paid = request.items.iter().fold(0.0, |acc, item| acc + item.price);
    let marked = store.mark_all_paid().map_err(|e| LedgerError::Status {
        code: 500,
        detail: e.to_string(),
    })?;
    let transaction_id = hex::encode(rand::random::<[u8; 4]>());

    let mut message = format!(
        "Payment received via {}",
        request.payment_method.to_uppercase()
    );
    if let Some(upi_id) = request.upi_id.as_deref().filter(|id| !id.is_empty()) {
        message.push_str(&format!(" (UPI ID: {})", upi_id));
    }
    log::info!(
        "settled {} items for {:.2} via {} (tx {}, {} rows marked paid)",
        request.items.len(),
        amount_paid,
        request.payment_method,
        transaction_id,
        marked
    );
    Ok(CheckoutResponse {
        status: "success".to_string(),
        amount_paid,
        transaction_id: Some(transaction_id),
        message,
    })
}
