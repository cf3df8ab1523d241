use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::error::LedgerError;
use super::store::{LedgerStore, MemoryLedgerStore};
use super::wire::{CheckoutRequest, CheckoutResponse, LedgerItem, NewItem};
use super::Ledger;

/// In-process ledger with the same semantics as the HTTP service.
///
/// Counts every call that reaches it, and can be told to fail every call
/// with a fixed error.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    store: Mutex<MemoryLedgerStore>,
    calls: AtomicUsize,
    failure: Mutex<Option<LedgerError>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger that answers every call with `error`.
    pub fn failing(error: LedgerError) -> Self {
        let ledger = Self::default();
        ledger.fail_with(Some(error));
        ledger
    }

    pub fn fail_with(&self, error: Option<LedgerError>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = error;
        }
    }

    /// Calls received so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<std::sync::MutexGuard<'_, MemoryLedgerStore>, LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failure
            .lock()
            .map_err(|_| LedgerError::Transport("ledger lock poisoned".to_string()))?
            .clone();
        if let Some(error) = failure {
            return Err(error);
        }
        self.store
            .lock()
            .map_err(|_| LedgerError::Transport("ledger lock poisoned".to_string()))
    }
}

fn store_error(err: anyhow::Error) -> LedgerError {
    LedgerError::Status {
        code: 500,
        detail: err.to_string(),
    }
}

impl Ledger for InMemoryLedger {
    fn add_item(&self, item: &NewItem) -> Result<LedgerItem, LedgerError> {
        let mut store = self.begin()?;
        let id = store.insert_item(&item.name, item.price).map_err(store_error)?;
        Ok(LedgerItem {
            id,
            name: item.name.clone(),
            price: item.price,
            paid: false,
        })
    }

    fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutResponse, LedgerError> {
        let mut store = self.begin()?;
        super::settle(&mut *store, request)
    }

    fn list_items(&self, limit: usize) -> Result<Vec<LedgerItem>, LedgerError> {
        let mut store = self.begin()?;
        store.list_items(limit).map_err(store_error)
    }
}
