//! Ledger HTTP service.
//!
//! Serves the ledger contract over a `LedgerStore`:
//!
//! - `GET /` liveness
//! - `POST /add_item` `{name, price}` -> `{id, name, price, paid}`
//! - `GET /items?limit=N` newest first, default 50
//! - `POST /checkout` -> `{status, amount_paid, transaction_id, message}`
//!
//! Errors are `{"detail": "..."}` with a 4xx/5xx status. One connection is
//! handled at a time; every response closes the connection.

use crate::ledger::{
    settle, CheckoutRequest, ErrorDetail, LedgerError, LedgerItem, LedgerStore, NewItem,
    DEFAULT_LIST_LIMIT,
};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const MAX_REQUEST_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    /// Base URL clients should use, e.g. `http://127.0.0.1:8000`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("ledger api thread panicked"))?;
        }
        Ok(())
    }
}

pub struct LedgerServer {
    cfg: ApiConfig,
    store: Box<dyn LedgerStore + Send>,
}

impl LedgerServer {
    pub fn new(cfg: ApiConfig, store: Box<dyn LedgerStore + Send>) -> Self {
        Self { cfg, store }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let mut store = self.store;
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, store.as_mut(), shutdown_thread) {
                log::error!("ledger api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    store: &mut (dyn LedgerStore + Send),
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, store) {
                    log::warn!("ledger api request rejected: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(10));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, store: &mut (dyn LedgerStore + Send)) -> Result<()> {
    stream.set_nonblocking(false)?;
    let request = read_request(&mut stream)?;
    log::debug!("{} {}", request.method, request.raw_path);

    let (status, body) = route(&request, store);
    write_response(&mut stream, status, "application/json", &body)?;
    Ok(())
}

fn route(request: &HttpRequest, store: &mut (dyn LedgerStore + Send)) -> (u16, Vec<u8>) {
    let result = match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/") => json_body(&serde_json::json!({"message": "Ledger service is running"})),
        ("POST", "/add_item") => add_item(request, store),
        ("GET", "/items") => list_items(request, store),
        ("POST", "/checkout") => checkout(request, store),
        (_, "/") | (_, "/add_item") | (_, "/items") | (_, "/checkout") => {
            Err(ApiError::new(405, "method not allowed"))
        }
        _ => Err(ApiError::new(404, "not found")),
    };
    match result {
        Ok(body) => (200, body),
        Err(err) => {
            let body = serde_json::to_vec(&ErrorDetail { detail: err.detail })
                .unwrap_or_else(|_| br#"{"detail":"internal error"}"#.to_vec());
            (err.status, body)
        }
    }
}

fn add_item(request: &HttpRequest, store: &mut (dyn LedgerStore + Send)) -> ApiResult {
    let item: NewItem = request.json()?;
    let id = store
        .insert_item(&item.name, item.price)
        .map_err(|e| ApiError::new(500, e.to_string()))?;
    json_body(&LedgerItem {
        id,
        name: item.name,
        price: item.price,
        paid: false,
    })
}

fn list_items(request: &HttpRequest, store: &mut (dyn LedgerStore + Send)) -> ApiResult {
    let limit = match request.query.get("limit") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ApiError::new(422, "limit must be a non-negative integer"))?,
        None => DEFAULT_LIST_LIMIT,
    };
    let items = store
        .list_items(limit)
        .map_err(|e| ApiError::new(500, e.to_string()))?;
    json_body(&items)
}

fn checkout(request: &HttpRequest, store: &mut (dyn LedgerStore + Send)) -> ApiResult {
    let cart: CheckoutRequest = request.json()?;
    match settle(store, &cart) {
        Ok(response) => json_body(&response),
        Err(LedgerError::Validation(detail)) => Err(ApiError::new(400, detail)),
        Err(LedgerError::Status { code, detail }) => Err(ApiError::new(code, detail)),
        Err(other) => Err(ApiError::new(500, other.to_string())),
    }
}

type ApiResult = std::result::Result<Vec<u8>, ApiError>;

#[derive(Debug)]
struct ApiError {
    status: u16,
    detail: String,
}

impl ApiError {
    fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

fn json_body<T: serde::Serialize>(value: &T) -> ApiResult {
    serde_json::to_vec(value).map_err(|e| ApiError::new(500, e.to_string()))
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    let header_end = loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed before end of headers"));
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length = match headers.get("content-length") {
        Some(value) => value
            .parse::<usize>()
            .map_err(|_| anyhow!("invalid content-length"))?,
        None => 0,
    };
    if header_end + content_length > MAX_REQUEST_BYTES {
        return Err(anyhow!("request too large"));
    }
    let mut body = data[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed mid-body"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let (path, query) = match raw_path.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (raw_path, HashMap::new()),
    };
    Ok(HttpRequest {
        method: method.to_string(),
        path: path.to_string(),
        query,
        raw_path: raw_path.to_string(),
        body,
    })
}

fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        422 => "HTTP/1.1 422 Unprocessable Entity",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    query: HashMap<String, String>,
    raw_path: String,
    body: Vec<u8>,
}

impl HttpRequest {
    fn json<T: serde::de::DeserializeOwned>(&self) -> std::result::Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::new(422, format!("invalid request body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedgerStore;

    fn request(method: &str, raw_path: &str, body: &str) -> HttpRequest {
        let (path, query) = match raw_path.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (raw_path, HashMap::new()),
        };
        HttpRequest {
            method: method.to_string(),
            path: path.to_string(),
            query,
            raw_path: raw_path.to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn detail(body: &[u8]) -> String {
        serde_json::from_slice::<ErrorDetail>(body).unwrap().detail
    }

    #[test]
    fn routes_add_list_and_checkout() {
        let mut store = MemoryLedgerStore::new();
        let (status, _) = route(
            &request("POST", "/add_item", r#"{"name":"milk","price":2.5}"#),
            &mut store,
        );
        assert_eq!(status, 200);

        let (status, body) = route(&request("GET", "/items?limit=5", ""), &mut store);
        assert_eq!(status, 200);
        let items: Vec<LedgerItem> = serde_json::from_slice(&body).unwrap();
        assert_eq!(items.len(), 1);
        assert!(!items[0].paid);

        let (status, body) = route(
            &request(
                "POST",
                "/checkout",
                r#"{"items":[{"name":"milk","price":2.5}],"payment_method":"Card"}"#,
            ),
            &mut store,
        );
        assert_eq!(status, 200);
        let response: crate::ledger::CheckoutResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(response.amount_paid, 2.5);
    }

    #[test]
    fn upi_checkout_without_id_is_bad_request() {
        let mut store = MemoryLedgerStore::new();
        let (status, body) = route(
            &request("POST", "/checkout", r#"{"items":[],"payment_method":"upi"}"#),
            &mut store,
        );
        assert_eq!(status, 400);
        assert_eq!(detail(&body), "UPI ID required for UPI/GPay payment");
    }

    #[test]
    fn rejects_unknown_paths_methods_and_bad_bodies() {
        let mut store = MemoryLedgerStore::new();
        assert_eq!(route(&request("GET", "/nope", ""), &mut store).0, 404);
        assert_eq!(route(&request("GET", "/checkout", ""), &mut store).0, 405);
        assert_eq!(
            route(&request("POST", "/add_item", "{not json"), &mut store).0,
            422
        );
        assert_eq!(
            route(&request("GET", "/items?limit=-1", ""), &mut store).0,
            422
        );
    }
}
