use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ureq::{Agent, AgentBuilder};
use url::Url;

use super::error::LedgerError;
use super::wire::{CheckoutRequest, CheckoutResponse, LedgerItem, NewItem};
use super::Ledger;

/// Per-call timeouts. Kept short so a stalled ledger never stalls the frame
/// loop for long.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerTimeouts {
    pub add_item: Duration,
    pub checkout: Duration,
    pub list: Duration,
}

impl Default for LedgerTimeouts {
    fn default() -> Self {
        Self {
            add_item: Duration::from_millis(600),
            checkout: Duration::from_millis(1000),
            list: Duration::from_millis(1000),
        }
    }
}

/// HTTP/JSON client for the ledger service.
pub struct HttpLedger {
    base: Url,
    add_item_agent: Agent,
    checkout_agent: Agent,
    list_agent: Agent,
}

impl HttpLedger {
    pub fn new(base_url: &str, timeouts: LedgerTimeouts) -> Result<Self> {
        let mut base = Url::parse(base_url).context("parse ledger base url")?;
        match base.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported ledger scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        // Endpoints are joined relative to the base path.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            add_item_agent: agent(timeouts.add_item),
            checkout_agent: agent(timeouts.checkout),
            list_agent: agent(timeouts.list),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, LedgerError> {
        self.base
            .join(path)
            .map_err(|e| LedgerError::Transport(format!("bad endpoint {}: {}", path, e)))
    }
}

fn agent(timeout: Duration) -> Agent {
    AgentBuilder::new().timeout(timeout).build()
}

impl Ledger for HttpLedger {
    fn add_item(&self, item: &NewItem) -> Result<LedgerItem, LedgerError> {
        let url = self.endpoint("add_item")?;
        let response = self
            .add_item_agent
            .post(url.as_str())
            .send_json(item)
            .map_err(classify)?;
        decode(response)
    }

    fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutResponse, LedgerError> {
        let url = self.endpoint("checkout")?;
        let response = self
            .checkout_agent
            .post(url.as_str())
            .send_json(request)
            .map_err(classify)?;
        decode(response)
    }

    fn list_items(&self, limit: usize) -> Result<Vec<LedgerItem>, LedgerError> {
        let url = self.endpoint("items")?;
        let response = self
            .list_agent
            .get(url.as_str())
            .query("limit", &limit.to_string())
            .call()
            .map_err(classify)?;
        decode(response)
    }
}

fn decode<T: serde::de::DeserializeOwned>(response: ureq::Response) -> Result<T, LedgerError> {
    response.into_json::<T>().map_err(|e| {
        if is_timeout_io(&e) {
            LedgerError::Timeout
        } else {
            LedgerError::Decode(e.to_string())
        }
    })
}

fn classify(err: ureq::Error) -> LedgerError {
    match err {
        ureq::Error::Status(code, response) => {
            let detail = response
                .into_json::<serde_json::Value>()
                .ok()
                .and_then(|body| body.get("detail").cloned())
                .map(|detail| match detail {
                    serde_json::Value::String(text) => text,
                    other => other.to_string(),
                })
                .unwrap_or_default();
            LedgerError::Status { code, detail }
        }
        ureq::Error::Transport(transport) => {
            if is_timeout(&transport) {
                LedgerError::Timeout
            } else {
                LedgerError::Transport(transport.to_string())
            }
        }
    }
}

fn is_timeout(transport: &ureq::Transport) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> =
        std::error::Error::source(transport);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if is_timeout_io(io) {
                return true;
            }
        }
        source = err.source();
    }
    transport.to_string().contains("timed out")
}

fn is_timeout_io(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let ledger = HttpLedger::new("http://127.0.0.1:8000/api", LedgerTimeouts::default())
            .unwrap();
        assert_eq!(
            ledger.endpoint("checkout").unwrap().as_str(),
            "http://127.0.0.1:8000/api/checkout"
        );
        let root = HttpLedger::new("http://127.0.0.1:8000", LedgerTimeouts::default()).unwrap();
        assert_eq!(
            root.endpoint("add_item").unwrap().as_str(),
            "http://127.0.0.1:8000/add_item"
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(HttpLedger::new("mqtt://broker:1883", LedgerTimeouts::default()).is_err());
        assert!(HttpLedger::new("not a url", LedgerTimeouts::default()).is_err());
    }

    #[test]
    fn refused_connection_is_a_transport_failure() {
        // Bind and drop to find a port with nothing listening.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let ledger =
            HttpLedger::new(&format!("http://127.0.0.1:{}", port), LedgerTimeouts::default())
                .unwrap();
        let err = ledger.list_items(5).unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)), "got {:?}", err);
    }
}
