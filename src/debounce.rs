use std::collections::HashMap;
use std::time::Duration;

/// Default minimum gap between two accepted events for one label.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// Per-label debounce.
///
/// A label is accepted when no event for it has been accepted yet, or when at
/// least `window` has elapsed since the last accepted one. Rejections leave
/// the state untouched: they mean the same physical item is still in view.
#[derive(Clone, Debug)]
pub struct DebounceGate {
    window: Duration,
    last_accepted: HashMap<String, Duration>,
}

impl DebounceGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Accept or reject an event for `label` observed at `now`.
    pub fn accept(&mut self, label: &str, now: Duration) -> bool {
        if let Some(last) = self.last_accepted.get(label) {
            if now.saturating_sub(*last) < self.window {
                log::trace!("debounce: {} rejected at {:?} (last {:?})", label, now, last);
                return false;
            }
        }
        self.last_accepted.insert(label.to_string(), now);
        true
    }

    pub fn last_accepted(&self, label: &str) -> Option<Duration> {
        self.last_accepted.get(label).copied()
    }

    pub fn tracked_labels(&self) -> usize {
        self.last_accepted.len()
    }
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn rejects_inside_window_and_accepts_at_boundary() {
        let mut gate = DebounceGate::new(secs(1.0));
        assert!(gate.accept("milk", secs(10.0)));
        assert!(!gate.accept("milk", secs(10.0)));
        assert!(!gate.accept("milk", secs(10.999)));
        assert!(gate.accept("milk", secs(11.0)));
        assert_eq!(gate.last_accepted("milk"), Some(secs(11.0)));
    }

    #[test]
    fn rejection_does_not_extend_window() {
        let mut gate = DebounceGate::new(secs(1.0));
        assert!(gate.accept("milk", secs(0.0)));
        assert!(!gate.accept("milk", secs(0.3)));
        assert!(!gate.accept("milk", secs(0.9)));
        assert!(gate.accept("milk", secs(1.2)));
    }

    #[test]
    fn labels_are_independent() {
        let mut gate = DebounceGate::new(secs(1.0));
        assert!(gate.accept("milk", secs(0.0)));
        assert!(gate.accept("bread", secs(0.1)));
        assert!(!gate.accept("milk", secs(0.5)));
        assert!(!gate.accept("bread", secs(0.5)));
        assert_eq!(gate.tracked_labels(), 2);
    }

    #[test]
    fn first_event_at_time_zero_is_accepted() {
        let mut gate = DebounceGate::default();
        assert!(gate.accept("eggs", Duration::ZERO));
    }
}
