//! JSON bodies of the ledger contract.

use serde::{Deserialize, Serialize};

/// `POST /add_item` request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub price: f64,
}

/// A stored ledger row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerItem {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub paid: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub name: String,
    pub price: f64,
}

/// `POST /checkout` request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    pub payment_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_id: Option<String>,
}

/// `POST /checkout` response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub status: String,
    pub amount_paid: f64,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Error body for non-2xx responses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}
