//! Vocab Gateway RPC Server: JSON-RPC over stdin/stdout.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"ai.generate", "params":{"caller_id":"...","prompt":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":{"code":"...","message":"..."}}
//!
//! Requests run concurrently; responses may arrive out of order and are
//! matched by `id`. Logs go to stderr.

use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use vocab_gateway::app::App;
use vocab_gateway::rpc_handler::{handle_method, RpcError};

/// Maximum RPC requests accepted per second.
const MAX_REQUESTS_PER_SECOND: u32 = 200;

/// Simple rate limiter: fixed one-second window.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

fn error_response(id: Value, error: &RpcError) -> Value {
    json!({"id": id, "error": error.to_json()})
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::args().nth(1);
    let app = Arc::new(App::new(config_path)?);

    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(message) = rx.recv().await {
            let line = format!("{}\n", message);
            if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let _ = tx.send(json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));
    info!("rpc server ready");

    let mut rate_limiter = RateLimiter::new(MAX_REQUESTS_PER_SECOND);
    let mut lines = BufReader::new(io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let _ = tx.send(error_response(Value::Null, &RpcError::new("parse_error", e.to_string())));
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            warn!("rpc rate limit exceeded");
            let _ = tx.send(error_response(id, &RpcError::new("rate_limit_exceeded", "rate limit exceeded")));
            continue;
        }

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let params = req.get("params").cloned().unwrap_or(json!({}));
        let app = app.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let response = match handle_method(&app, &method, &params).await {
                Ok(val) => json!({"id": id, "result": val}),
                Err(err) => error_response(id, &err),
            };
            let _ = tx.send(response);
        });
    }

    drop(tx);
    let _ = writer.await;
    Ok(())
}
