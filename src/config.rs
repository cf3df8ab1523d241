use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cart::PriceTable;
use crate::checkout::PaymentChoice;
use crate::detect::{LabelTaxonomy, DEFAULT_CONF_THRESHOLD};
use crate::geometry::{Point, Resolution, RoiPolygon};
use crate::ledger::LedgerTimeouts;
use crate::station::StationSettings;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_PRICES_FILE: &str = "sample_prices.json";
const DEFAULT_CLASSES_FILE: &str = "classes.txt";
const DEFAULT_SOURCE: &str = "stub://checkout_camera";
const DEFAULT_DETECTOR: &str = "scripted";
const DEFAULT_DEBOUNCE_MS: u64 = 1000;
const DEFAULT_REFERENCE_WIDTH: u32 = 640;
const DEFAULT_REFERENCE_HEIGHT: u32 = 480;
const DEFAULT_ROI: [(i32, i32); 4] = [(100, 200), (540, 200), (600, 470), (40, 470)];
const DEFAULT_ADD_ITEM_TIMEOUT_MS: u64 = 600;
const DEFAULT_CHECKOUT_TIMEOUT_MS: u64 = 1000;
const DEFAULT_PAYMENT_METHOD: &str = "UPI";
const DEFAULT_PAYMENT_IDENTIFIER: &str = "user@upi";
const DEFAULT_LEDGER_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_LEDGER_DB: &str = "ledger.db";

#[derive(Debug, Deserialize, Default)]
struct StationConfigFile {
    backend_url: Option<String>,
    prices_file: Option<PathBuf>,
    classes_file: Option<PathBuf>,
    source: Option<String>,
    send_api: Option<bool>,
    debounce_ms: Option<u64>,
    detector: Option<DetectorConfigFile>,
    roi: Option<RoiConfigFile>,
    timeouts: Option<TimeoutConfigFile>,
    payment: Option<PaymentConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    script_path: Option<PathBuf>,
    conf_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct RoiConfigFile {
    reference_width: Option<u32>,
    reference_height: Option<u32>,
    points: Option<Vec<(i32, i32)>>,
}

#[derive(Debug, Deserialize, Default)]
struct TimeoutConfigFile {
    add_item_ms: Option<u64>,
    checkout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct PaymentConfigFile {
    method: Option<String>,
    identifier: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub backend_url: String,
    pub prices_file: PathBuf,
    pub classes_file: PathBuf,
    /// `stub://<name>` or an image directory.
    pub source: String,
    pub send_api: bool,
    pub debounce: Duration,
    pub detector: DetectorSettings,
    pub roi: RoiSettings,
    pub timeouts: LedgerTimeouts,
    pub payment: PaymentChoice,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Registry name of the backend to run (`scripted`, `tract`).
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub script_path: Option<PathBuf>,
    pub conf_threshold: f32,
}

/// ROI as configured, in reference-resolution pixels.
#[derive(Debug, Clone)]
pub struct RoiSettings {
    pub reference: Resolution,
    pub points: Vec<Point>,
}

impl RoiSettings {
    /// Polygon rescaled to the resolution frames actually arrive at.
    pub fn polygon_for(&self, actual: Resolution) -> Result<RoiPolygon> {
        RoiPolygon::new(self.points.clone())?.rescaled(self.reference, actual)
    }
}

impl StationConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CHECKOUT_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Same layering as `load`, with the file path given explicitly.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: StationConfigFile) -> Self {
        let detector = file.detector.unwrap_or_default();
        let roi = file.roi.unwrap_or_default();
        let timeouts = file.timeouts.unwrap_or_default();
        let payment = file.payment.unwrap_or_default();

        let defaults = LedgerTimeouts::default();
        Self {
            backend_url: file
                .backend_url
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            prices_file: file
                .prices_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PRICES_FILE)),
            classes_file: file
                .classes_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CLASSES_FILE)),
            source: file.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            send_api: file.send_api.unwrap_or(true),
            debounce: Duration::from_millis(file.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)),
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_DETECTOR.to_string()),
                model_path: detector.model_path,
                script_path: detector.script_path,
                conf_threshold: detector.conf_threshold.unwrap_or(DEFAULT_CONF_THRESHOLD),
            },
            roi: RoiSettings {
                reference: Resolution::new(
                    roi.reference_width.unwrap_or(DEFAULT_REFERENCE_WIDTH),
                    roi.reference_height.unwrap_or(DEFAULT_REFERENCE_HEIGHT),
                ),
                points: roi
                    .points
                    .unwrap_or_else(|| DEFAULT_ROI.to_vec())
                    .into_iter()
                    .map(Point::from)
                    .collect(),
            },
            timeouts: LedgerTimeouts {
                add_item: Duration::from_millis(
                    timeouts.add_item_ms.unwrap_or(DEFAULT_ADD_ITEM_TIMEOUT_MS),
                ),
                checkout: Duration::from_millis(
                    timeouts.checkout_ms.unwrap_or(DEFAULT_CHECKOUT_TIMEOUT_MS),
                ),
                list: defaults.list,
            },
            payment: PaymentChoice::new(
                payment
                    .method
                    .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
                Some(
                    payment
                        .identifier
                        .unwrap_or_else(|| DEFAULT_PAYMENT_IDENTIFIER.to_string()),
                ),
            ),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("CHECKOUT_BACKEND_URL") {
            if !url.trim().is_empty() {
                self.backend_url = url.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("CHECKOUT_PRICES_FILE") {
            if !path.trim().is_empty() {
                self.prices_file = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("CHECKOUT_CLASSES_FILE") {
            if !path.trim().is_empty() {
                self.classes_file = PathBuf::from(path);
            }
        }
        if let Ok(source) = std::env::var("CHECKOUT_SOURCE") {
            if !source.trim().is_empty() {
                self.source = source;
            }
        }
        if let Ok(path) = std::env::var("CHECKOUT_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(debounce) = std::env::var("CHECKOUT_DEBOUNCE_MS") {
            let millis: u64 = debounce.trim().parse().map_err(|_| {
                anyhow!("CHECKOUT_DEBOUNCE_MS must be an integer number of milliseconds")
            })?;
            self.debounce = Duration::from_millis(millis);
        }
        if let Ok(send_api) = std::env::var("CHECKOUT_SEND_API") {
            self.send_api = parse_flag(&send_api)
                .ok_or_else(|| anyhow!("CHECKOUT_SEND_API must be true/false"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.debounce.is_zero() {
            return Err(anyhow!("debounce window must be greater than zero"));
        }
        let threshold = self.detector.conf_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "confidence threshold {} must be within [0, 1]",
                threshold
            ));
        }
        if self.roi.reference.width == 0 || self.roi.reference.height == 0 {
            return Err(anyhow!("ROI reference resolution must be positive"));
        }
        RoiPolygon::new(self.roi.points.clone()).context("invalid ROI")?;
        if self.timeouts.add_item.is_zero() || self.timeouts.checkout.is_zero() {
            return Err(anyhow!("ledger timeouts must be greater than zero"));
        }
        url::Url::parse(&self.backend_url)
            .with_context(|| format!("invalid backend url '{}'", self.backend_url))?;
        self.detector.backend = self.detector.backend.trim().to_lowercase();
        Ok(())
    }

    /// Station settings for frames arriving at `actual` resolution.
    pub fn station_settings(&self, actual: Resolution) -> Result<StationSettings> {
        Ok(StationSettings {
            roi: self.roi.polygon_for(actual)?,
            payment: self.payment.clone(),
            send_api: self.send_api,
        })
    }
}

/// Configuration for the ledger service binary.
#[derive(Debug, Clone)]
pub struct LedgerApiConfig {
    pub addr: String,
    pub db_path: String,
}

#[derive(Debug, Deserialize, Default)]
struct LedgerApiConfigFile {
    addr: Option<String>,
    db_path: Option<String>,
}

impl LedgerApiConfig {
    pub fn load() -> Result<Self> {
        let file: LedgerApiConfigFile = match std::env::var("LEDGER_CONFIG").ok().as_deref() {
            Some(path) if !path.trim().is_empty() => parse_file(Path::new(path))?,
            _ => LedgerApiConfigFile::default(),
        };
        let mut cfg = Self {
            addr: file.addr.unwrap_or_else(|| DEFAULT_LEDGER_ADDR.to_string()),
            db_path: file
                .db_path
                .unwrap_or_else(|| DEFAULT_LEDGER_DB.to_string()),
        };
        if let Ok(addr) = std::env::var("LEDGER_API_ADDR") {
            if !addr.trim().is_empty() {
                cfg.addr = addr.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("LEDGER_DB_PATH") {
            if !path.trim().is_empty() {
                cfg.db_path = path;
            }
        }
        cfg.addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| anyhow!("invalid ledger api addr '{}': {}", cfg.addr, e))?;
        Ok(cfg)
    }
}

/// Price table and label taxonomy loaded at startup.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub prices: Arc<PriceTable>,
    pub taxonomy: Arc<LabelTaxonomy>,
}

impl Catalog {
    /// A missing file falls back to an empty table (or index-only labels);
    /// a malformed one is an error.
    pub fn load(prices_file: &Path, classes_file: &Path) -> Result<Self> {
        let prices = match std::fs::read_to_string(prices_file) {
            Ok(raw) => {
                let table: HashMap<String, f64> = serde_json::from_str(&raw)
                    .map_err(|e| anyhow!("invalid price file {}: {}", prices_file.display(), e))?;
                PriceTable::new(table)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::warn!(
                    "price file {} not found; every item is priced at 0.00",
                    prices_file.display()
                );
                PriceTable::default()
            }
            Err(err) => {
                return Err(anyhow!(
                    "failed to read price file {}: {}",
                    prices_file.display(),
                    err
                ))
            }
        };
        let taxonomy = match std::fs::read_to_string(classes_file) {
            Ok(raw) => LabelTaxonomy::parse(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::warn!(
                    "classes file {} not found; labels fall back to class indices",
                    classes_file.display()
                );
                LabelTaxonomy::default()
            }
            Err(err) => {
                return Err(anyhow!(
                    "failed to read classes file {}: {}",
                    classes_file.display(),
                    err
                ))
            }
        };
        log::info!(
            "catalog loaded: {} prices, {} classes",
            prices.len(),
            taxonomy.len()
        );
        Ok(Self {
            prices: Arc::new(prices),
            taxonomy: Arc::new(taxonomy),
        })
    }
}

fn read_config_file(path: &Path) -> Result<StationConfigFile> {
    parse_file(path)
}

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_setting() {
        let cfg = StationConfig::from_file(StationConfigFile::default());
        assert_eq!(cfg.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(cfg.debounce, Duration::from_secs(1));
        assert_eq!(cfg.detector.conf_threshold, 0.30);
        assert_eq!(cfg.roi.points.len(), 4);
        assert_eq!(cfg.roi.points[0], Point::new(100, 200));
        assert_eq!(cfg.timeouts.add_item, Duration::from_millis(600));
        assert_eq!(cfg.payment.method, "UPI");
        assert_eq!(cfg.payment.identifier.as_deref(), Some("user@upi"));
        assert!(cfg.send_api);
    }

    #[test]
    fn roi_rescales_to_frame_resolution() {
        let cfg = StationConfig::from_file(StationConfigFile::default());
        let roi = cfg.roi.polygon_for(Resolution::new(1280, 960)).unwrap();
        assert_eq!(roi.points()[0], Point::new(200, 400));
    }

    #[test]
    fn parses_flags() {
        assert_eq!(parse_flag(" Yes "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
