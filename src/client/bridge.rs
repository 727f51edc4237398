//! WhatsApp client implementation using a Node.js WebSocket bridge.
//!
//! The bridge uses `whatsapp-web.js` to handle the WhatsApp Web protocol,
//! session auth (QR login) and message transport. Communication between Rust
//! and Node.js is via WebSocket: requests carry a numeric `id` and the bridge
//! answers with a matching `response` frame.
//!
//! On startup, the client auto-spawns the bridge as a child process unless an
//! explicit URL is configured. Bridge files are embedded at compile time and
//! extracted to `~/.wabook/bridge/whatsapp/` on first run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{oneshot, Mutex as TokioMutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::chats::ChatEntry;
use crate::client::{ClientEvent, WhatsAppClient};
use crate::config::loader::get_data_dir;
use crate::config::schema::BridgeConfig;
use crate::errors::BridgeError;

/// Embedded bridge files (baked in at compile time for `cargo install` support).
const BRIDGE_INDEX_JS: &str = include_str!("../../bridge/whatsapp/index.js");
const BRIDGE_PACKAGE_JSON: &str = include_str!("../../bridge/whatsapp/package.json");

type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, String>>>;

/// WhatsApp client that talks to a Node.js bridge over WebSocket.
pub struct BridgeClient {
    config: BridgeConfig,
    event_tx: UnboundedSender<ClientEvent>,
    running: Arc<AtomicBool>,
    /// Sender for outgoing WebSocket frames (set once connected).
    ws_tx: Arc<TokioMutex<Option<UnboundedSender<String>>>>,
    /// In-flight requests awaiting a `response` frame.
    pending: Arc<TokioMutex<PendingMap>>,
    next_id: AtomicU64,
    /// Child bridge process (auto-spawned).
    bridge_process: StdMutex<Option<Child>>,
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.bridge_process.lock() {
            if let Some(ref mut child) = *slot {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

impl BridgeClient {
    /// Create a new `BridgeClient`. Call [`start`](Self::start) before use.
    pub fn new(config: BridgeConfig, event_tx: UnboundedSender<ClientEvent>) -> Self {
        Self {
            config,
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
            ws_tx: Arc::new(TokioMutex::new(None)),
            pending: Arc::new(TokioMutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            bridge_process: StdMutex::new(None),
        }
    }

    /// Resolve the bridge directory. Checks dev path first, then installed
    /// path. If neither has files, extracts embedded files to the installed
    /// path.
    fn resolve_bridge_dir() -> Result<PathBuf> {
        // Dev path: ./bridge/whatsapp/ (when running from a repo checkout).
        let dev_path = PathBuf::from("bridge/whatsapp");
        if dev_path.join("index.js").exists() && dev_path.join("package.json").exists() {
            info!("Using dev bridge at {}", dev_path.display());
            return Ok(dev_path);
        }

        let installed_path = get_data_dir().join("bridge").join("whatsapp");
        if !installed_path.join("index.js").exists() {
            info!(
                "Extracting embedded WhatsApp bridge to {}",
                installed_path.display()
            );
            std::fs::create_dir_all(&installed_path)?;
            std::fs::write(installed_path.join("index.js"), BRIDGE_INDEX_JS)?;
            std::fs::write(installed_path.join("package.json"), BRIDGE_PACKAGE_JSON)?;
        }

        Ok(installed_path)
    }

    /// Run `npm install` in the bridge directory if `node_modules/` doesn't exist.
    fn ensure_npm_deps(bridge_dir: &PathBuf) -> Result<()> {
        if bridge_dir.join("node_modules").exists() {
            return Ok(());
        }

        info!("Installing WhatsApp bridge dependencies...");
        let status = Command::new("npm")
            .arg("install")
            .arg("--no-audit")
            .arg("--no-fund")
            .current_dir(bridge_dir)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .context("Failed to run npm install — is Node.js installed?")?;

        if !status.success() {
            return Err(anyhow::anyhow!("npm install failed with status {}", status));
        }

        Ok(())
    }

    /// Spawn the Node.js bridge process.
    fn spawn_bridge(bridge_dir: &PathBuf, port: u16) -> Result<Child> {
        info!("Starting WhatsApp bridge on port {}...", port);
        let child = Command::new("node")
            .arg("index.js")
            .arg("--port")
            .arg(port.to_string())
            .current_dir(bridge_dir)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .context("Failed to spawn bridge process — is Node.js installed?")?;

        Ok(child)
    }

    /// Handle a JSON frame from the bridge.
    async fn handle_frame(
        data: &Value,
        event_tx: &UnboundedSender<ClientEvent>,
        pending: &Arc<TokioMutex<PendingMap>>,
    ) {
        let frame_type = data.get("type").and_then(|v| v.as_str()).unwrap_or("");

        match frame_type {
            "response" => {
                let Some(id) = data.get("id").and_then(|v| v.as_u64()) else {
                    warn!("Bridge response without id: {}", data);
                    return;
                };
                let Some(reply) = pending.lock().await.remove(&id) else {
                    debug!("Bridge response for unknown request id {}", id);
                    return;
                };
                let ok = data.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
                let outcome = if ok {
                    Ok(data.get("result").cloned().unwrap_or(Value::Null))
                } else {
                    let msg = data
                        .get("error")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown bridge error");
                    Err(msg.to_string())
                };
                let _ = reply.send(outcome);
            }
            "qr" => {
                let code = data.get("qr").and_then(|v| v.as_str()).unwrap_or("");
                let _ = event_tx.send(ClientEvent::Qr(code.to_string()));
            }
            "ready" => {
                let _ = event_tx.send(ClientEvent::Ready);
            }
            "disconnected" => {
                let reason = data
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                let _ = event_tx.send(ClientEvent::Disconnected(reason.to_string()));
            }
            "error" => {
                let err = data
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error");
                error!("WhatsApp bridge error: {}", err);
            }
            other => {
                debug!("WhatsApp bridge: unknown frame type '{}'", other);
            }
        }
    }

    /// Start the bridge link: spawn the Node process (unless an explicit URL
    /// is configured) and run the connect/read loop in the background.
    pub async fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);

        if self.config.url.is_none() {
            let bridge_dir = Self::resolve_bridge_dir()?;
            Self::ensure_npm_deps(&bridge_dir)?;
            let child = Self::spawn_bridge(&bridge_dir, self.config.port)?;
            if let Ok(mut slot) = self.bridge_process.lock() {
                *slot = Some(child);
            }
        }

        let bridge_url = self.config.effective_url();
        let event_tx = self.event_tx.clone();
        let running = self.running.clone();
        let ws_tx_slot = self.ws_tx.clone();
        let pending = self.pending.clone();

        info!("Connecting to WhatsApp bridge at {}...", bridge_url);

        tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                match tokio_tungstenite::connect_async(&bridge_url).await {
                    Ok((ws_stream, _)) => {
                        info!("Connected to WhatsApp bridge");
                        let (mut write, mut read) = ws_stream.split();

                        let (out_tx, mut out_rx) =
                            tokio::sync::mpsc::unbounded_channel::<String>();
                        {
                            let mut slot = ws_tx_slot.lock().await;
                            *slot = Some(out_tx);
                        }

                        let writer_handle = tokio::spawn(async move {
                            while let Some(text) = out_rx.recv().await {
                                if write.send(WsMessage::Text(text)).await.is_err() {
                                    break;
                                }
                            }
                        });

                        while let Some(msg_result) = read.next().await {
                            match msg_result {
                                Ok(WsMessage::Text(text)) => {
                                    match serde_json::from_str::<Value>(&text) {
                                        Ok(data) => {
                                            Self::handle_frame(&data, &event_tx, &pending).await;
                                        }
                                        Err(_) => {
                                            warn!(
                                                "Invalid JSON from bridge: {}",
                                                &text[..text.len().min(100)]
                                            );
                                        }
                                    }
                                }
                                Ok(WsMessage::Close(_)) => {
                                    info!("WhatsApp bridge closed connection");
                                    break;
                                }
                                Err(e) => {
                                    warn!("WhatsApp WebSocket error: {}", e);
                                    break;
                                }
                                _ => {}
                            }
                        }

                        // Fail everything in flight; dropping the reply
                        // senders resolves the waiters with an error.
                        {
                            let mut slot = ws_tx_slot.lock().await;
                            *slot = None;
                        }
                        pending.lock().await.clear();
                        writer_handle.abort();
                    }
                    Err(e) => {
                        warn!("WhatsApp bridge connection error: {}", e);
                    }
                }

                if running.load(Ordering::SeqCst) {
                    info!("Reconnecting to WhatsApp bridge in 5 seconds...");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        });

        Ok(())
    }

    /// Stop the bridge link and kill the spawned bridge process, if any.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        {
            let mut slot = self.ws_tx.lock().await;
            *slot = None;
        }
        self.pending.lock().await.clear();
        if let Ok(mut slot) = self.bridge_process.lock() {
            if let Some(ref mut child) = *slot {
                info!("Stopping WhatsApp bridge process...");
                let _ = child.kill();
                let _ = child.wait();
            }
            *slot = None;
        }
        info!("WhatsApp client stopped");
    }

    /// Send a request frame and await the matching `response`.
    async fn request(&self, mut payload: Value, timeout: Duration) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        payload["id"] = json!(id);

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().await.insert(id, reply_tx);

        let sent = {
            let slot = self.ws_tx.lock().await;
            match slot.as_ref() {
                Some(out) => out.send(payload.to_string()).is_ok(),
                None => false,
            }
        };
        if !sent {
            self.pending.lock().await.remove(&id);
            return Err(BridgeError::NotConnected.into());
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(msg))) => Err(BridgeError::Rejected(msg).into()),
            // Reply sender dropped: the connection went away mid-request.
            Ok(Err(_)) => Err(BridgeError::NotConnected.into()),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(BridgeError::Timeout.into())
            }
        }
    }
}

#[async_trait]
impl WhatsAppClient for BridgeClient {
    async fn list_chats(&self) -> Result<Vec<ChatEntry>> {
        let result = self
            .request(json!({"type": "listChats"}), Duration::from_secs(60))
            .await?;
        let chats: Vec<ChatEntry> =
            serde_json::from_value(result).context("malformed chat listing from bridge")?;
        Ok(chats)
    }

    async fn send_message(&self, address: &str, text: &str) -> Result<()> {
        self.request(
            json!({"type": "send", "to": address, "text": text}),
            Duration::from_secs(30),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> BridgeClient {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        BridgeClient::new(BridgeConfig::default(), tx)
    }

    #[tokio::test]
    async fn test_request_without_connection_fails_fast() {
        let client = test_client();
        let err = client
            .request(json!({"type": "send"}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BridgeError>(),
            Some(BridgeError::NotConnected)
        ));
        // The pending slot must not leak.
        assert!(client.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_response_frame_resolves_pending_request() {
        let client = test_client();

        // Wire up a fake connection so request() can enqueue its frame.
        let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        *client.ws_tx.lock().await = Some(out_tx);

        let pending = client.pending.clone();
        let (event_tx, _event_rx) = tokio::sync::mpsc::unbounded_channel();
        let responder = tokio::spawn(async move {
            let sent = out_rx.recv().await.unwrap();
            let frame: Value = serde_json::from_str(&sent).unwrap();
            let id = frame["id"].as_u64().unwrap();
            let response = json!({
                "type": "response",
                "id": id,
                "ok": true,
                "result": {"delivered": true},
            });
            BridgeClient::handle_frame(&response, &event_tx, &pending).await;
        });

        let result = client
            .request(json!({"type": "send"}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result["delivered"], json!(true));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_response_surfaces_bridge_message() {
        let client = test_client();
        let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        *client.ws_tx.lock().await = Some(out_tx);

        let pending = client.pending.clone();
        let (event_tx, _event_rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            let sent = out_rx.recv().await.unwrap();
            let frame: Value = serde_json::from_str(&sent).unwrap();
            let response = json!({
                "type": "response",
                "id": frame["id"],
                "ok": false,
                "error": "number not registered",
            });
            BridgeClient::handle_frame(&response, &event_tx, &pending).await;
        });

        let err = client
            .request(json!({"type": "send"}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "number not registered");
    }

    #[tokio::test]
    async fn test_lifecycle_frames_become_events() {
        let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
        let pending = Arc::new(TokioMutex::new(HashMap::new()));

        BridgeClient::handle_frame(&json!({"type": "qr", "qr": "QRDATA"}), &event_tx, &pending)
            .await;
        BridgeClient::handle_frame(&json!({"type": "ready"}), &event_tx, &pending).await;
        BridgeClient::handle_frame(
            &json!({"type": "disconnected", "reason": "logout"}),
            &event_tx,
            &pending,
        )
        .await;

        assert!(matches!(event_rx.try_recv(), Ok(ClientEvent::Qr(code)) if code == "QRDATA"));
        assert!(matches!(event_rx.try_recv(), Ok(ClientEvent::Ready)));
        assert!(
            matches!(event_rx.try_recv(), Ok(ClientEvent::Disconnected(r)) if r == "logout")
        );
    }
}
