// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Web sessions through an out-of-process bridge.
//!
//! The bridge owns the browser automation. Each [`BridgeClient`] holds one
//! WebSocket to it and speaks a small JSON protocol tagged by `type`:
//!
//! ```text
//! client -> bridge   init {clientId, dataPath} | send {requestId, to, body} | destroy
//! bridge -> client   qr | ready | change_state {state} | disconnected {reason}
//!                    error {message} | message {from, to, body, id}
//!                    sent {requestId, id} | send_failed {requestId, error}
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use fluxbot_core::types::{InboundPayload, LifecycleEvent, MessageId};
use fluxbot_core::{ClientHandle, ClientSpec, FluxbotError, WhatsAppClient, WhatsAppClientFactory};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};
use uuid::Uuid;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Outgoing {
    Init {
        #[serde(rename = "clientId")]
        client_id: String,
        #[serde(rename = "dataPath")]
        data_path: String,
    },
    Send {
        #[serde(rename = "requestId")]
        request_id: String,
        to: String,
        body: String,
    },
    Destroy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Incoming {
    Qr,
    Ready,
    ChangeState {
        state: String,
    },
    Disconnected {
        #[serde(default)]
        reason: Option<String>,
    },
    Error {
        message: String,
    },
    Message {
        from: String,
        to: String,
        #[serde(default)]
        body: String,
        #[serde(default)]
        id: Option<String>,
    },
    Sent {
        #[serde(rename = "requestId")]
        request_id: String,
        id: String,
    },
    SendFailed {
        #[serde(rename = "requestId")]
        request_id: String,
        error: String,
    },
}

/// What the reader does with one decoded frame.
#[derive(Debug, PartialEq)]
enum Dispatch {
    Event(LifecycleEvent),
    Ack {
        request_id: String,
        result: Result<MessageId, String>,
    },
}

impl From<Incoming> for Dispatch {
    fn from(frame: Incoming) -> Self {
        match frame {
            Incoming::Qr => Dispatch::Event(LifecycleEvent::QrPending),
            Incoming::Ready => Dispatch::Event(LifecycleEvent::Ready),
            Incoming::ChangeState { state } => Dispatch::Event(LifecycleEvent::StateChanged(state)),
            Incoming::Disconnected { reason } => {
                Dispatch::Event(LifecycleEvent::Disconnected { reason })
            }
            Incoming::Error { message } => Dispatch::Event(LifecycleEvent::Error { message }),
            Incoming::Message { from, to, body, id } => {
                Dispatch::Event(LifecycleEvent::MessageReceived(InboundPayload {
                    from,
                    to,
                    body,
                    external_id: id,
                }))
            }
            Incoming::Sent { request_id, id } => Dispatch::Ack {
                request_id,
                result: Ok(MessageId(id)),
            },
            Incoming::SendFailed { request_id, error } => Dispatch::Ack {
                request_id,
                result: Err(error),
            },
        }
    }
}

type PendingSends = Arc<DashMap<String, oneshot::Sender<Result<MessageId, String>>>>;

/// Drops the pending entry when a send is abandoned (e.g. timed out).
struct PendingGuard {
    pending: PendingSends,
    request_id: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove(&self.request_id);
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One WhatsApp Web session held open through the bridge.
pub struct BridgeClient {
    url: String,
    spec: ClientSpec,
    events: Mutex<Option<mpsc::Sender<LifecycleEvent>>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outgoing>>>,
    pending: PendingSends,
}

impl BridgeClient {
    fn new(url: String, spec: ClientSpec, events: mpsc::Sender<LifecycleEvent>) -> Self {
        Self {
            url,
            spec,
            events: Mutex::new(Some(events)),
            outbound: Mutex::new(None),
            pending: Arc::new(DashMap::new()),
        }
    }

    fn push(&self, frame: Outgoing) -> Result<(), FluxbotError> {
        lock(&self.outbound)
            .as_ref()
            .ok_or_else(|| FluxbotError::channel("bridge connection is not open"))?
            .send(frame)
            .map_err(|_| FluxbotError::channel("bridge connection closed"))
    }
}

#[async_trait]
impl WhatsAppClient for BridgeClient {
    async fn initialize(&self) -> Result<(), FluxbotError> {
        let events = lock(&self.events)
            .clone()
            .ok_or_else(|| FluxbotError::channel("client already destroyed"))?;

        let (mut socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| FluxbotError::Channel {
                message: format!("failed to reach bridge at {}: {e}", self.url),
                source: Some(Box::new(e)),
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Outgoing>();
        tx.send(Outgoing::Init {
            client_id: self.spec.client_id.clone(),
            data_path: self.spec.data_path.display().to_string(),
        })
        .map_err(|_| FluxbotError::channel("bridge writer closed"))?;

        // `destroy` takes `events` before `outbound`; holding `events` here
        // means a destroy either lands before the writer is installed or
        // finds it and sends the destroy frame.
        let installed = {
            let live = lock(&self.events);
            if live.is_some() {
                *lock(&self.outbound) = Some(tx);
            }
            live.is_some()
        };
        if !installed {
            debug!(client_id = %self.spec.client_id, "destroyed during bridge handshake");
            let _ = socket.close(None).await;
            return Err(FluxbotError::channel("destroyed during initialize"));
        }
        let (mut sink, mut stream) = socket.split();

        let client_id = self.spec.client_id.clone();
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "failed to encode bridge frame");
                        continue;
                    }
                };
                if let Err(e) = sink.send(WsMessage::text(text)).await {
                    debug!(client_id = %client_id, error = %e, "bridge write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let pending = Arc::clone(&self.pending);
        let client_id = self.spec.client_id.clone();
        tokio::spawn(async move {
            let mut reason = None;
            while let Some(next) = stream.next().await {
                let text = match next {
                    Ok(WsMessage::Text(text)) => text,
                    Ok(WsMessage::Close(frame)) => {
                        reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        reason = Some(format!("bridge connection error: {e}"));
                        break;
                    }
                };
                let frame = match serde_json::from_str::<Incoming>(text.as_str()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(client_id = %client_id, error = %e, "unrecognised bridge frame");
                        continue;
                    }
                };
                match Dispatch::from(frame) {
                    Dispatch::Event(event) => {
                        let ended = matches!(event, LifecycleEvent::Disconnected { .. });
                        if events.send(event).await.is_err() || ended {
                            return;
                        }
                    }
                    Dispatch::Ack { request_id, result } => {
                        if let Some((_, waiter)) = pending.remove(&request_id) {
                            let _ = waiter.send(result);
                        }
                    }
                }
            }
            pending.clear();
            let _ = events
                .send(LifecycleEvent::Disconnected {
                    reason: Some(reason.unwrap_or_else(|| "bridge connection closed".into())),
                })
                .await;
        });

        debug!(client_id = %self.spec.client_id, "bridge session initialized");
        Ok(())
    }

    async fn destroy(&self) -> Result<(), FluxbotError> {
        lock(&self.events).take();
        let result = self.push(Outgoing::Destroy);
        // Dropping the writer's sender closes the socket once the destroy frame is flushed.
        lock(&self.outbound).take();
        self.pending.clear();
        match result {
            Ok(()) => Ok(()),
            Err(_) => {
                debug!(client_id = %self.spec.client_id, "destroy on a client that never connected");
                Ok(())
            }
        }
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<MessageId, FluxbotError> {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);
        let _guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            request_id: request_id.clone(),
        };

        self.push(Outgoing::Send {
            request_id,
            to: to.to_string(),
            body: body.to_string(),
        })?;

        match rx.await {
            Ok(Ok(id)) => Ok(id),
            Ok(Err(reason)) => Err(FluxbotError::channel(format!("send failed: {reason}"))),
            Err(_) => Err(FluxbotError::channel("bridge connection closed before ack")),
        }
    }
}

/// Creates [`BridgeClient`]s against one bridge URL.
#[derive(Debug, Clone)]
pub struct BridgeClientFactory {
    url: String,
}

impl BridgeClientFactory {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl WhatsAppClientFactory for BridgeClientFactory {
    fn create(&self, spec: ClientSpec) -> Result<ClientHandle, FluxbotError> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let client = Arc::new(BridgeClient::new(self.url.clone(), spec, tx));
        Ok(ClientHandle { client, events: rx })
    }
}
