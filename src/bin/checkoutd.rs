//! checkoutd - self-checkout station daemon
//!
//! This daemon:
//! 1. Loads station config and the price/class catalog
//! 2. Ingests frames and runs the configured detector backend
//! 3. Counts items placed in the checkout ROI into the cart
//! 4. Reports added items and runs checkout against the ledger service
//! 5. Reads r (reset), p (pay) and q (quit) from stdin

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use checkout_kernel::{
    open_source, BackendRegistry, Catalog, CheckoutStation, DetectionAdapter, DetectorBackend,
    HttpLedger, MonotonicClock, Resolution, ScriptedBackend, StationCommand, StationConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Station config file (JSON, or TOML by extension).
    #[arg(long, env = "CHECKOUT_CONFIG")]
    config: Option<PathBuf>,
    /// Detection script for the scripted backend (overrides config).
    #[arg(long)]
    script: Option<PathBuf>,
    /// Frames per second to pull from the source.
    #[arg(long, default_value_t = 10)]
    fps: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }

    let mut cfg = StationConfig::load_from(args.config.as_deref())?;
    if let Some(script) = args.script {
        cfg.detector.script_path = Some(script);
    }
    let catalog = Catalog::load(&cfg.prices_file, &cfg.classes_file)?;

    let clock = MonotonicClock::new();
    let mut source = open_source(&cfg.source, cfg.roi.reference)?;
    log::info!("frame source: {}", source.describe());
    let first = source
        .next_frame(&clock)?
        .ok_or_else(|| anyhow!("frame source produced no frames"))?;
    let resolution = first.resolution();
    if resolution != cfg.roi.reference {
        log::info!(
            "rescaling ROI from {}x{} to {}x{}",
            cfg.roi.reference.width,
            cfg.roi.reference.height,
            resolution.width,
            resolution.height
        );
    }

    let mut backend = build_backend(&cfg, resolution)?;
    let ledger = HttpLedger::new(&cfg.backend_url, cfg.timeouts)?;
    let mut station = CheckoutStation::new(
        DetectionAdapter::new(catalog.taxonomy.clone(), cfg.detector.conf_threshold),
        catalog.prices.clone(),
        cfg.debounce,
        cfg.station_settings(resolution)?,
        ledger,
    );

    let (tx, rx) = mpsc::channel();
    let stdin_tx = tx.clone();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<StationCommand>() {
                Ok(cmd) => {
                    if stdin_tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(e) => log::warn!("{}", e),
            }
        }
    });
    ctrlc::set_handler(move || {
        let _ = tx.send(StationCommand::Quit);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!(
        "checkoutd running. backend={} ledger={} debounce={}ms send_api={}",
        backend.name(),
        cfg.backend_url,
        cfg.debounce.as_millis(),
        cfg.send_api
    );
    log::info!("commands: r = reset cart, p = pay, q = quit");

    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(args.fps));
    let mut last_health_log = Instant::now();
    let mut pending = Some(first);

    'frames: loop {
        if !drain_commands(&rx, &mut station) {
            break;
        }

        let frame = match pending.take() {
            Some(frame) => frame,
            None => match source.next_frame(&clock)? {
                Some(frame) => frame,
                None => {
                    log::info!("frame source ended; waiting for commands (r/p/q)");
                    for cmd in rx.iter() {
                        if !station.handle(cmd) {
                            break 'frames;
                        }
                    }
                    break;
                }
            },
        };

        match station.process_frame(backend.as_mut(), &frame) {
            Ok(outcome) if !outcome.accepted.is_empty() => {
                log::info!(
                    "cart: {} line(s), total {:.2}",
                    station.session().cart().lines().len(),
                    station.session().total()
                );
            }
            Ok(_) => {}
            Err(e) => log::warn!("frame {} skipped: {:#}", frame.sequence, e),
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            log::info!(
                "source={} frames={} cart_total={:.2}",
                source.describe(),
                source.frames_captured(),
                station.session().total()
            );
            last_health_log = Instant::now();
        }

        std::thread::sleep(frame_interval);
    }

    let summary = station.session().cart().summary();
    log::info!("final cart: {}", serde_json::to_string(&summary)?);
    Ok(())
}

/// Apply queued commands. Returns `false` once a quit was requested.
fn drain_commands<L: checkout_kernel::Ledger>(
    rx: &Receiver<StationCommand>,
    station: &mut CheckoutStation<L>,
) -> bool {
    loop {
        match rx.try_recv() {
            Ok(cmd) => {
                if !station.handle(cmd) {
                    return false;
                }
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return true,
        }
    }
}

fn build_backend(cfg: &StationConfig, resolution: Resolution) -> Result<Box<dyn DetectorBackend>> {
    let mut registry = BackendRegistry::new();

    let scripted = match &cfg.detector.script_path {
        Some(path) => ScriptedBackend::from_file(path)?,
        None => ScriptedBackend::new(Vec::new()),
    };
    registry.register(scripted);

    #[cfg(feature = "backend-tract")]
    if let Some(model_path) = &cfg.detector.model_path {
        let tract = checkout_kernel::detect::TractBackend::new(
            model_path,
            resolution.width,
            resolution.height,
        )?
        .with_threshold(cfg.detector.conf_threshold);
        registry.register(tract);
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        let _ = resolution;
        if cfg.detector.model_path.is_some() {
            log::warn!("model path configured but built without backend-tract; ignoring");
        }
    }

    log::info!("detector backends: {}", registry.list().join(", "));
    registry.set_default(&cfg.detector.backend)?;
    registry.take_default()
}
