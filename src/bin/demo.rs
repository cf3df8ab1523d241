//! demo - end-to-end synthetic checkout run
//!
//! Starts an in-process ledger service, replays a scripted detection feed
//! through the station on a manual clock, checks out and prints the result.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use checkout_kernel::{
    api::{ApiConfig, LedgerServer},
    CheckoutState, CheckoutStation, DetectionAdapter, FrameSource, HttpLedger, LabelTaxonomy,
    Ledger, LedgerTimeouts, ManualClock, MemoryLedgerStore, PaymentChoice, Point, PriceTable,
    RawDetection, Resolution, RoiPolygon, ScriptedBackend, ScriptedFrame, StationCommand,
    StationSettings, StubConfig, StubSource,
};

const CLASSES: &str = "milk\nbread\neggs\n";
const DEMO_ROI: [(i32, i32); 4] = [(100, 200), (540, 200), (600, 470), (40, 470)];

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of synthetic frames to run.
    #[arg(long, default_value_t = 30)]
    frames: u64,
    /// Milliseconds of station time between frames.
    #[arg(long, default_value_t = 100)]
    frame_ms: u64,
    /// Payment method sent at checkout.
    #[arg(long, default_value = "UPI")]
    method: String,
    /// Payer identifier (UPI handle).
    #[arg(long, default_value = "user@upi")]
    payer: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.frame_ms == 0 {
        return Err(anyhow!("frame-ms must be >= 1"));
    }

    let api = LedgerServer::new(
        ApiConfig {
            addr: "127.0.0.1:0".to_string(),
        },
        Box::new(MemoryLedgerStore::new()),
    )
    .spawn()?;
    log::info!("demo ledger listening on {}", api.addr);

    let resolution = Resolution::new(640, 480);
    let mut source = StubSource::new(StubConfig {
        url: "stub://demo_cart".to_string(),
        resolution,
        max_frames: Some(args.frames),
    })?;
    let mut backend = ScriptedBackend::new(demo_script(args.frames));

    let prices: PriceTable = [
        ("milk".to_string(), 2.5),
        ("bread".to_string(), 1.75),
        ("eggs".to_string(), 3.2),
    ]
    .into_iter()
    .collect();
    let roi = RoiPolygon::new(DEMO_ROI.iter().copied().map(Point::from).collect())?;
    let ledger = HttpLedger::new(&api.base_url(), LedgerTimeouts::default())?;
    let mut station = CheckoutStation::new(
        DetectionAdapter::new(Arc::new(LabelTaxonomy::parse(CLASSES)), 0.3),
        Arc::new(prices),
        Duration::from_secs(1),
        StationSettings {
            roi,
            payment: PaymentChoice::new(args.method.clone(), Some(args.payer.clone())),
            send_api: true,
        },
        ledger,
    );

    let clock = ManualClock::new();
    while let Some(frame) = source.next_frame(&clock)? {
        let outcome = station.process_frame(&mut backend, &frame)?;
        for label in &outcome.accepted {
            println!(
                "t={:>5}ms  + {:<6} cart total {:.2}",
                frame.timestamp.as_millis(),
                label,
                station.session().total()
            );
        }
        clock.advance(Duration::from_millis(args.frame_ms));
    }

    let summary = station.session().cart().summary();
    println!("{}", serde_json::to_string_pretty(&summary)?);

    station.handle(StationCommand::TriggerCheckout);
    match station.checkout_state() {
        CheckoutState::Settled { amount_paid, .. } => println!("paid {:.2}", amount_paid),
        other => println!("checkout did not settle: {:?}", other),
    }
    if let Some(message) = station.session().transaction_message() {
        println!("{}", message);
    }

    let ledger_items = station
        .ledger()
        .list_items(50)
        .map_err(|e| anyhow!("failed to list ledger items: {}", e))?;
    println!(
        "ledger holds {} item(s), {} paid",
        ledger_items.len(),
        ledger_items.iter().filter(|item| item.paid).count()
    );

    api.stop()?;
    Ok(())
}

/// Milk sits in the cart zone the whole run, bread is held above the zone
/// and then dropped in, eggs pass by outside the zone.
fn demo_script(frames: u64) -> Vec<ScriptedFrame> {
    let milk = RawDetection::new(0, 0.91, [300.0, 300.0, 360.0, 380.0]);
    let bread_above = RawDetection::new(1, 0.84, [250.0, 40.0, 330.0, 120.0]);
    let bread_in = RawDetection::new(1, 0.88, [220.0, 260.0, 300.0, 330.0]);
    let eggs_outside = RawDetection::new(2, 0.77, [0.0, 0.0, 60.0, 60.0]);
    let faint = RawDetection::new(2, 0.12, [300.0, 300.0, 340.0, 340.0]);

    (0..frames)
        .map(|i| {
            let mut detections = vec![milk.clone()];
            match i {
                0..=4 => detections.push(bread_above.clone()),
                5..=9 => detections.push(bread_in.clone()),
                _ => {}
            }
            if i % 3 == 0 {
                detections.push(eggs_outside.clone());
            }
            if i % 7 == 0 {
                detections.push(faint.clone());
            }
            ScriptedFrame { detections }
        })
        .collect()
}
