//! Cart state.
//!
//! - `PriceTable`: immutable label -> unit price lookup. Unknown labels cost 0.0.
//! - `Cart`: line items in order of first appearance, one per distinct label.
//! - `CartSession`: the cart, its debounce gate and the transient checkout
//!   message, owned by exactly one control thread.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::debounce::DebounceGate;

/// Label -> unit price.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PriceTable {
    prices: HashMap<String, f64>,
}

impl PriceTable {
    pub fn new(prices: HashMap<String, f64>) -> Self {
        Self { prices }
    }

    pub fn price_of(&self, label: &str) -> Option<f64> {
        self.prices.get(label).copied()
    }

    /// Unit price, 0.0 when the label is not priced.
    pub fn unit_price(&self, label: &str) -> f64 {
        self.price_of(label).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl FromIterator<(String, f64)> for PriceTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub name: String,
    pub count: u32,
    pub unit_price: f64,
}

impl CartLine {
    pub fn total(&self) -> f64 {
        self.unit_price * f64::from(self.count)
    }
}

/// Line-item aggregator.
#[derive(Clone, Debug)]
pub struct Cart {
    prices: Arc<PriceTable>,
    lines: Vec<CartLine>,
    index: HashMap<String, usize>,
    unpriced: HashSet<String>,
}

impl Cart {
    pub fn new(prices: Arc<PriceTable>) -> Self {
        Self {
            prices,
            lines: Vec::new(),
            index: HashMap::new(),
            unpriced: HashSet::new(),
        }
    }

    /// Count one confirmed physical add of `label`.
    pub fn record(&mut self, label: &str) -> &CartLine {
        let idx = match self.index.get(label) {
            Some(idx) => *idx,
            None => {
                let unit_price = match self.prices.price_of(label) {
                    Some(price) => price,
                    None => {
                        if self.unpriced.insert(label.to_string()) {
                            log::warn!("no price configured for '{}'; valuing at 0.00", label);
                        }
                        0.0
                    }
                };
                self.lines.push(CartLine {
                    name: label.to_string(),
                    count: 0,
                    unit_price,
                });
                let idx = self.lines.len() - 1;
                self.index.insert(label.to_string(), idx);
                idx
            }
        };
        let line = &mut self.lines[idx];
        line.count += 1;
        line
    }

    pub fn count(&self, label: &str) -> u32 {
        self.line(label).map_or(0, |line| line.count)
    }

    pub fn line(&self, label: &str) -> Option<&CartLine> {
        self.index.get(label).map(|idx| &self.lines[*idx])
    }

    pub fn total(&self) -> f64 {
        self.lines.iter().fold(0.0, |acc, line| acc + line.total())
    }

    /// Owned copy of the lines in first-appearance order.
    pub fn snapshot(&self) -> Vec<CartLine> {
        self.lines.clone()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn prices(&self) -> &Arc<PriceTable> {
        &self.prices
    }

    pub fn summary(&self) -> CartSummary {
        CartSummary {
            items: self
                .lines
                .iter()
                .map(|line| SummaryLine {
                    name: line.name.clone(),
                    count: line.count,
                    unit_price: line.unit_price,
                    total_price: line.total(),
                })
                .collect(),
            grand_total: self.total(),
        }
    }
}

/// Display view of the cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartSummary {
    pub items: Vec<SummaryLine>,
    pub grand_total: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryLine {
    pub name: String,
    pub count: u32,
    pub unit_price: f64,
    pub total_price: f64,
}

/// Per-session cart state.
#[derive(Clone, Debug)]
pub struct CartSession {
    cart: Cart,
    gate: DebounceGate,
    transaction_message: Option<String>,
}

impl CartSession {
    pub fn new(prices: Arc<PriceTable>, debounce_window: Duration) -> Self {
        Self {
            cart: Cart::new(prices),
            gate: DebounceGate::new(debounce_window),
            transaction_message: None,
        }
    }

    /// Debounce `label` at `now` and record it when accepted.
    pub fn offer(&mut self, label: &str, now: Duration) -> Option<&CartLine> {
        if !self.gate.accept(label, now) {
            return None;
        }
        Some(self.cart.record(label))
    }

    /// Clears lines, debounce state and the transaction message together.
    pub fn reset(&mut self) {
        let fresh = Self::new(self.cart.prices.clone(), self.gate.window());
        *self = fresh;
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn gate(&self) -> &DebounceGate {
        &self.gate
    }

    pub fn total(&self) -> f64 {
        self.cart.total()
    }

    pub fn snapshot(&self) -> Vec<CartLine> {
        self.cart.snapshot()
    }

    pub fn transaction_message(&self) -> Option<&str> {
        self.transaction_message.as_deref()
    }

    pub fn set_transaction_message(&mut self, message: impl Into<String>) {
        self.transaction_message = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices() -> Arc<PriceTable> {
        Arc::new(
            [("milk", 2.5), ("bread", 1.75), ("eggs", 3.0)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn milk_scenario() {
        let mut session = CartSession::new(prices(), secs(1.0));
        assert!(session.offer("milk", secs(0.0)).is_some());
        assert!(session.offer("milk", secs(0.3)).is_none());
        assert!(session.offer("milk", secs(1.2)).is_some());
        assert_eq!(session.cart().count("milk"), 2);
        assert_eq!(session.total(), 5.0);
    }

    #[test]
    fn total_matches_independent_sum() {
        let table = prices();
        let mut cart = Cart::new(table.clone());
        let recorded = [
            "milk", "bread", "milk", "soap", "eggs", "bread", "milk", "soap",
        ];
        for label in recorded {
            cart.record(label);
        }
        let expected: f64 = recorded.iter().map(|label| table.unit_price(label)).sum();
        assert!((cart.total() - expected).abs() < 1e-9);
        assert_eq!(cart.count("soap"), 2);
        assert_eq!(cart.line("soap").unwrap().unit_price, 0.0);
    }

    #[test]
    fn snapshot_is_ordered_and_detached() {
        let mut cart = Cart::new(prices());
        cart.record("eggs");
        cart.record("milk");
        cart.record("eggs");
        let snapshot = cart.snapshot();
        cart.record("bread");
        cart.record("milk");

        let names: Vec<&str> = snapshot.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["eggs", "milk"]);
        assert_eq!(snapshot[0].count, 2);
        assert_eq!(snapshot[1].count, 1);
        assert_eq!(cart.lines().len(), 3);
    }

    #[test]
    fn reset_clears_lines_debounce_and_message() {
        let mut session = CartSession::new(prices(), secs(1.0));
        session.offer("milk", secs(5.0));
        session.set_transaction_message("success - TxID: abc123");
        assert!(session.offer("milk", secs(5.5)).is_none());

        session.reset();
        assert!(session.snapshot().is_empty());
        assert_eq!(session.total(), 0.0);
        assert_eq!(session.transaction_message(), None);
        assert_eq!(session.gate().tracked_labels(), 0);
        assert_eq!(session.gate().window(), secs(1.0));
        assert!(session.offer("milk", secs(5.6)).is_some());
    }

    #[test]
    fn summary_reports_line_totals() {
        let mut cart = Cart::new(prices());
        cart.record("bread");
        cart.record("bread");
        let summary = cart.summary();
        assert_eq!(summary.items.len(), 1);
        assert_eq!(summary.items[0].total_price, 3.5);
        assert_eq!(summary.grand_total, 3.5);
    }

    #[test]
    fn empty_totals_are_positive_zero() {
        let mut session = CartSession::new(prices(), secs(1.0));
        assert!(!session.total().is_sign_negative());
        session.offer("milk", secs(0.0));
        session.reset();
        assert!(!session.total().is_sign_negative());

        let summary = session.cart().summary();
        assert!(!summary.grand_total.is_sign_negative());
        assert_eq!(
            serde_json::to_string(&summary).unwrap(),
            r#"{"items":[],"grand_total":0.0}"#
        );
        assert_eq!(format!("{:.2}", session.total()), "0.00");
    }
}
