/// Structured failure of a ledger call.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LedgerError {
    /// Rejected before (or by) the ledger because the request is incomplete.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No response within the call's timeout.
    #[error("ledger request timed out")]
    Timeout,

    /// Connection refused, reset, DNS failure and the like.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx response.
    #[error("ledger returned status {code}: {detail}")]
    Status { code: u16, detail: String },

    /// 2xx response whose body does not match the contract.
    #[error("invalid ledger response: {0}")]
    Decode(String),
}

impl LedgerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LedgerError::Timeout)
    }
}
