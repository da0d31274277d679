//! One-shot local HTTP endpoint for delegating login and signing to a browser.
//!
//! The page served at `/` talks to a NIP-07 extension or pairs with a NIP-46
//! remote signer over `wss://relay.nsec.app`, then POSTs the result back. The
//! endpoint hands the first completion to the waiting caller; any later
//! completion is answered with `409 Conflict`. Once the caller has the result
//! the server shuts down.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::Router;
use nostr::{Event, UnsignedEvent};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const PAGE_TEMPLATE: &str = include_str!("../assets/signer.html");

pub const SIGNED_PATH: &str = "/signed";
pub const PUBKEY_PATH: &str = "/pubkey";

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("local endpoint failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("no response from the browser within {0:?}")]
    Timeout(Duration),

    #[error("endpoint stopped before a response arrived")]
    Abandoned,

    #[error("invalid response from the browser: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Launch the system browser; otherwise only log the URL
    pub launch: bool,
    /// How long to wait for the page to answer
    pub timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            launch: true,
            timeout: Duration::from_secs(300),
        }
    }
}

struct Endpoint {
    page: String,
    completion: Mutex<Option<oneshot::Sender<String>>>,
}

async fn serve_page(State(endpoint): State<Arc<Endpoint>>) -> impl IntoResponse {
    (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Html(endpoint.page.clone()),
    )
}

async fn accept_completion(
    State(endpoint): State<Arc<Endpoint>>,
    body: String,
) -> impl IntoResponse {
    let cors = [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")];
    match endpoint.completion.lock().await.take() {
        Some(tx) => {
            debug!("Completion received ({} bytes)", body.len());
            let _ = tx.send(body);
            (StatusCode::OK, cors, "Received")
        }
        None => (StatusCode::CONFLICT, cors, "Already received"),
    }
}

/// A running endpoint waiting for its single completion.
pub struct PendingCompletion {
    addr: SocketAddr,
    completion: oneshot::Receiver<String>,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl PendingCompletion {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Wait for the completion body, then stop the server.
    pub async fn wait(mut self, limit: Duration) -> Result<String, BrowserError> {
        let result = match tokio::time::timeout(limit, &mut self.completion).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(_)) => Err(BrowserError::Abandoned),
            Err(_) => Err(BrowserError::Timeout(limit)),
        };
        self.shutdown().await;
        result
    }

    async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(mut server) = self.server.take() {
            if tokio::time::timeout(Duration::from_secs(1), &mut server)
                .await
                .is_err()
            {
                server.abort();
            }
        }
    }
}

/// Serve `page` at `/` and accept one POST at `completion_path` on an OS-assigned port.
pub async fn serve_once(
    page: String,
    completion_path: &str,
) -> Result<PendingCompletion, BrowserError> {
    let (completion_tx, completion_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let endpoint = Arc::new(Endpoint {
        page,
        completion: Mutex::new(Some(completion_tx)),
    });

    let app = Router::new()
        .route("/", get(serve_page))
        .route(completion_path, post(accept_completion))
        .with_state(endpoint);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            warn!("Local endpoint error: {}", e);
        }
        debug!("Local endpoint on {} stopped", addr);
    });

    Ok(PendingCompletion {
        addr,
        completion: completion_rx,
        shutdown: Some(shutdown_tx),
        server: Some(server),
    })
}

fn render_page(mode: &str, event: Option<&UnsignedEvent>) -> String {
    let event_json = event
        .and_then(|e| serde_json::to_string(e).ok())
        .unwrap_or_else(|| "null".to_string())
        // keep the JSON from closing the surrounding <script>
        .replace('<', "\\u003c");

    PAGE_TEMPLATE
        .replace("__MODE__", mode)
        .replace("__EVENT_JSON__", &event_json)
}

fn announce(url: &str, purpose: &str, options: &BrowserOptions) {
    if options.launch {
        info!("Opening browser at {} to {}", url, purpose);
        if let Err(e) = open::that(url) {
            warn!("Could not launch a browser ({}); open {} manually", e, url);
        }
    } else {
        info!("Open {} in a browser to {}", url, purpose);
    }
}

/// Ask the browser to sign `unsigned` and return whatever event it sends back.
///
/// The returned event is not checked here.
pub async fn request_signature(
    unsigned: &UnsignedEvent,
    options: &BrowserOptions,
) -> Result<Event, BrowserError> {
    let pending = serve_once(render_page("sign", Some(unsigned)), SIGNED_PATH).await?;
    announce(&pending.url(), "sign the recovered follow list", options);

    let body = pending.wait(options.timeout).await?;
    serde_json::from_str(&body).map_err(|e| BrowserError::InvalidResponse(e.to_string()))
}

#[derive(Deserialize)]
struct PubkeyResponse {
    pubkey: String,
}

/// Ask the browser for the user's public key. The key is returned unvalidated.
pub async fn request_public_key(options: &BrowserOptions) -> Result<String, BrowserError> {
    let pending = serve_once(render_page("login", None), PUBKEY_PATH).await?;
    announce(&pending.url(), "log in", options);

    let body = pending.wait(options.timeout).await?;
    let response: PubkeyResponse =
        serde_json::from_str(&body).map_err(|e| BrowserError::InvalidResponse(e.to_string()))?;
    Ok(response.pubkey)
}
