use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use checkout_kernel::api::{ApiConfig, LedgerServer};
use checkout_kernel::ledger::{CheckoutRequest, CheckoutResponse, LedgerItem, NewItem};
use checkout_kernel::{
    BoundingBox, CheckoutState, CheckoutStation, DetectionAdapter, DetectionEvent, FrameSource,
    HttpLedger, LabelTaxonomy, Ledger, LedgerError, LedgerTimeouts, ManualClock,
    MemoryLedgerStore, PaymentChoice, Point, PriceTable, RawDetection, RoiPolygon,
    ScriptedBackend, ScriptedFrame, StationCommand, StationSettings, StubConfig, StubSource,
};

/// Ledger that settles every checkout with a fixed transaction id.
#[derive(Default)]
struct FixedLedger {
    checkouts: AtomicUsize,
}

impl Ledger for FixedLedger {
    fn add_item(&self, item: &NewItem) -> Result<LedgerItem, LedgerError> {
        Ok(LedgerItem {
            id: "1".to_string(),
            name: item.name.clone(),
            price: item.price,
            paid: false,
        })
    }

    fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutResponse, LedgerError> {
        self.checkouts.fetch_add(1, Ordering::SeqCst);
        Ok(CheckoutResponse {
            status: "success".to_string(),
            amount_paid: request.items.iter().map(|item| item.price).sum(),
            transaction_id: Some("abc123".to_string()),
            message: "Payment received via CARD".to_string(),
        })
    }

    fn list_items(&self, _limit: usize) -> Result<Vec<LedgerItem>, LedgerError> {
        Ok(Vec::new())
    }
}

fn prices() -> Arc<PriceTable> {
    Arc::new(
        [("milk".to_string(), 2.5), ("bread".to_string(), 1.75)]
            .into_iter()
            .collect(),
    )
}

fn roi() -> RoiPolygon {
    RoiPolygon::new(vec![
        Point::new(100, 200),
        Point::new(540, 200),
        Point::new(600, 470),
        Point::new(40, 470),
    ])
    .unwrap()
}

fn station<L: Ledger>(ledger: L, payment: PaymentChoice) -> CheckoutStation<L> {
    CheckoutStation::new(
        DetectionAdapter::new(Arc::new(LabelTaxonomy::parse("milk\nbread\n")), 0.3),
        prices(),
        Duration::from_secs(1),
        StationSettings {
            roi: roi(),
            payment,
            send_api: false,
        },
        ledger,
    )
}

fn milk_at(ms: u64) -> DetectionEvent {
    DetectionEvent {
        label: "milk".to_string(),
        confidence: 0.9,
        bbox: BoundingBox::new(300, 300, 340, 360).unwrap(),
        frame_timestamp: Duration::from_millis(ms),
    }
}

#[test]
fn successful_checkout_sets_message_and_keeps_cart() {
    let ledger = FixedLedger::default();
    let mut station = station(&ledger, PaymentChoice::new("Card", None));
    station.process_detections(&[milk_at(0)]);
    station.process_detections(&[milk_at(1500)]);
    let before = station.session().snapshot();

    assert!(station.handle(StationCommand::TriggerCheckout));
    assert_eq!(
        station.session().transaction_message(),
        Some("success - TxID: abc123")
    );
    assert_eq!(
        station.checkout_state(),
        &CheckoutState::Settled {
            transaction_id: Some("abc123".to_string()),
            amount_paid: 5.0,
        }
    );
    assert_eq!(station.session().snapshot(), before);
    assert_eq!(station.session().cart().count("milk"), 2);
    assert_eq!(ledger.checkouts.load(Ordering::SeqCst), 1);
}

#[test]
fn unresponsive_ledger_times_out_without_touching_cart() {
    // Accepts connections (via the kernel backlog) but never answers.
    let silent = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", silent.local_addr().unwrap());
    let timeouts = LedgerTimeouts {
        add_item: Duration::from_millis(200),
        checkout: Duration::from_millis(300),
        list: Duration::from_millis(200),
    };
    let ledger = HttpLedger::new(&base_url, timeouts).unwrap();
    let mut station = station(ledger, PaymentChoice::new("Card", None));
    station.process_detections(&[milk_at(0)]);
    let before = station.session().snapshot();

    let started = Instant::now();
    station.handle(StationCommand::TriggerCheckout);
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(
        station.checkout_state(),
        &CheckoutState::Failed(LedgerError::Timeout)
    );
    assert!(station
        .session()
        .transaction_message()
        .unwrap()
        .contains("error"));
    assert_eq!(station.session().snapshot(), before);
    assert_eq!(station.session().total(), 2.5);
    drop(silent);
}

#[test]
fn upi_without_identifier_fails_locally() {
    let ledger = FixedLedger::default();
    let mut station = station(&ledger, PaymentChoice::new("upi", None));
    station.process_detections(&[milk_at(0)]);

    station.handle(StationCommand::TriggerCheckout);
    assert!(matches!(
        station.checkout_state(),
        CheckoutState::Failed(LedgerError::Validation(_))
    ));
    assert_eq!(ledger.checkouts.load(Ordering::SeqCst), 0);
    assert_eq!(station.session().cart().count("milk"), 1);
}

#[test]
fn scripted_run_against_ledger_service() {
    let api = LedgerServer::new(
        ApiConfig {
            addr: "127.0.0.1:0".to_string(),
        },
        Box::new(MemoryLedgerStore::new()),
    )
    .spawn()
    .unwrap();
    let ledger = HttpLedger::new(&api.base_url(), LedgerTimeouts::default()).unwrap();

    let mut station = CheckoutStation::new(
        DetectionAdapter::new(Arc::new(LabelTaxonomy::parse("milk\nbread\n")), 0.3),
        prices(),
        Duration::from_secs(1),
        StationSettings {
            roi: roi(),
            payment: PaymentChoice::new("UPI", Some("user@upi".to_string())),
            send_api: true,
        },
        ledger,
    );

    // Milk stays in view for 1.5 s; bread shows once outside the ROI and
    // once inside.
    let milk = RawDetection::new(0, 0.9, [300.0, 300.0, 340.0, 360.0]);
    let bread_outside = RawDetection::new(1, 0.8, [0.0, 0.0, 50.0, 50.0]);
    let bread_inside = RawDetection::new(1, 0.8, [200.0, 250.0, 260.0, 300.0]);
    let script: Vec<ScriptedFrame> = (0..16)
        .map(|i| {
            let mut detections = vec![milk.clone()];
            if i == 2 {
                detections.push(bread_outside.clone());
            }
            if i == 4 {
                detections.push(bread_inside.clone());
            }
            ScriptedFrame { detections }
        })
        .collect();
    let mut backend = ScriptedBackend::new(script);
    let mut source = StubSource::new(StubConfig {
        max_frames: Some(16),
        ..StubConfig::default()
    })
    .unwrap();

    let clock = ManualClock::new();
    while let Some(frame) = source.next_frame(&clock).unwrap() {
        station.process_frame(&mut backend, &frame).unwrap();
        clock.advance(Duration::from_millis(100));
    }

    // Milk counted at t=0 and again at t=1.0 s.
    assert_eq!(station.session().cart().count("milk"), 2);
    assert_eq!(station.session().cart().count("bread"), 1);
    assert_eq!(station.session().total(), 6.75);
    assert_eq!(station.last_notification(), Some(&Ok(())));

    station.handle(StationCommand::TriggerCheckout);
    assert!(matches!(
        station.checkout_state(),
        CheckoutState::Settled { amount_paid, .. } if (*amount_paid - 6.75).abs() < 1e-9
    ));
    assert!(station
        .session()
        .transaction_message()
        .unwrap()
        .starts_with("success - TxID: "));

    let items = station.ledger().list_items(50).unwrap();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|item| item.paid));

    api.stop().unwrap();
}
