use anyhow::Result;

use super::wire::LedgerItem;

/// Persistence behind the ledger service: insert, list newest first,
/// mark outstanding items paid.
pub trait LedgerStore {
    /// Insert an unpaid item and return its id.
    fn insert_item(&mut self, name: &str, price: f64) -> Result<String>;

    /// Most recently inserted first, at most `limit` rows.
    fn list_items(&mut self, limit: usize) -> Result<Vec<LedgerItem>>;

    /// Mark every unpaid item paid; returns how many changed.
    fn mark_all_paid(&mut self) -> Result<usize>;
}

/// Volatile store for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    items: Vec<LedgerItem>,
    next_id: u64,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn insert_item(&mut self, name: &str, price: f64) -> Result<String> {
        self.next_id += 1;
        let id = format!("{:08x}", self.next_id);
        self.items.push(LedgerItem {
            id: id.clone(),
            name: name.to_string(),
            price,
            paid: false,
        });
        Ok(id)
    }

    fn list_items(&mut self, limit: usize) -> Result<Vec<LedgerItem>> {
        Ok(self.items.iter().rev().take(limit).cloned().collect())
    }

    fn mark_all_paid(&mut self) -> Result<usize> {
        let mut marked = 0;
        for item in self.items.iter_mut().filter(|item| !item.paid) {
            item.paid = true;
            marked += 1;
        }
        Ok(marked)
    }
}
