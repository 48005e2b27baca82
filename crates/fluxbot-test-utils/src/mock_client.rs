// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable WhatsApp client and factory.
//!
//! Each created client owns the sending half of its lifecycle event stream;
//! tests push events with [`MockWhatsAppClient::emit`]. Destroying a client
//! emits a final `Disconnected` and closes the stream, as the bridge does
//! when its socket shuts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use fluxbot_core::types::{DeviceId, LifecycleEvent, MessageId};
use fluxbot_core::{ClientHandle, ClientSpec, FluxbotError, WhatsAppClient, WhatsAppClientFactory};

/// Reason carried by the `Disconnected` event a destroyed client emits.
pub const CLOSED_REASON: &str = "bridge connection closed";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How newly created clients behave.
#[derive(Debug, Clone, Default)]
pub struct ClientBehavior {
    /// `create` itself fails with this message.
    pub fail_create: Option<String>,
    /// `initialize` fails with this message.
    pub fail_initialize: Option<String>,
    /// `destroy` fails with this message.
    pub fail_destroy: Option<String>,
    /// `send_text` fails with this message.
    pub fail_send: Option<String>,
    /// Time `initialize` takes before it resolves; a `destroy` landing in
    /// this window makes it fail.
    pub initialize_delay: Option<Duration>,
    /// Time `destroy` takes, e.g. to exceed the stop timeout.
    pub destroy_delay: Option<Duration>,
    /// Time `send_text` takes, e.g. to exceed the send timeout.
    pub send_delay: Option<Duration>,
    /// Emit [`LifecycleEvent::Ready`] once `initialize` succeeds.
    pub ready_on_initialize: bool,
}

pub struct MockWhatsAppClient {
    behavior: ClientBehavior,
    events: Mutex<Option<mpsc::Sender<LifecycleEvent>>>,
    initialized: AtomicUsize,
    destroyed: AtomicUsize,
    sent: Mutex<Vec<(String, String)>>,
}

impl MockWhatsAppClient {
    fn new(behavior: ClientBehavior, events: mpsc::Sender<LifecycleEvent>) -> Self {
        Self {
            behavior,
            events: Mutex::new(Some(events)),
            initialized: AtomicUsize::new(0),
            destroyed: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Push a lifecycle event to the session's event loop. Returns `false`
    /// if the stream is closed.
    pub async fn emit(&self, event: LifecycleEvent) -> bool {
        let sender = lock(&self.events).clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// `(to, body)` pairs accepted by `send_text`.
    pub fn sent(&self) -> Vec<(String, String)> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl WhatsAppClient for MockWhatsAppClient {
    async fn initialize(&self) -> Result<(), FluxbotError> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.behavior.initialize_delay {
            tokio::time::sleep(delay).await;
        }
        if lock(&self.events).is_none() {
            return Err(FluxbotError::channel("destroyed during initialize"));
        }
        if let Some(message) = &self.behavior.fail_initialize {
            return Err(FluxbotError::channel(message.clone()));
        }
        if self.behavior.ready_on_initialize {
            self.emit(LifecycleEvent::Ready).await;
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), FluxbotError> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.behavior.destroy_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.behavior.fail_destroy {
            return Err(FluxbotError::channel(message.clone()));
        }
        let sender = lock(&self.events).take();
        if let Some(tx) = sender {
            let _ = tx
                .send(LifecycleEvent::Disconnected {
                    reason: Some(CLOSED_REASON.into()),
                })
                .await;
        }
        Ok(())
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<MessageId, FluxbotError> {
        if let Some(delay) = self.behavior.send_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.behavior.fail_send {
            return Err(FluxbotError::channel(message.clone()));
        }
        let mut sent = lock(&self.sent);
        sent.push((to.to_string(), body.to_string()));
        Ok(MessageId(format!("mock-wamid-{}", sent.len())))
    }
}

/// Factory handing out [`MockWhatsAppClient`]s.
#[derive(Default)]
pub struct MockClientFactory {
    behavior: Mutex<ClientBehavior>,
    created: AtomicUsize,
    clients: Mutex<HashMap<DeviceId, Arc<MockWhatsAppClient>>>,
    history: Mutex<Vec<Arc<MockWhatsAppClient>>>,
    specs: Mutex<Vec<ClientSpec>>,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: ClientBehavior) -> Self {
        let factory = Self::default();
        factory.set_behavior(behavior);
        factory
    }

    /// Applies to clients created from now on.
    pub fn set_behavior(&self, behavior: ClientBehavior) {
        *lock(&self.behavior) = behavior;
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// The most recent client created for `device_id`.
    pub fn client(&self, device_id: DeviceId) -> Option<Arc<MockWhatsAppClient>> {
        lock(&self.clients).get(&device_id).cloned()
    }

    pub fn specs(&self) -> Vec<ClientSpec> {
        lock(&self.specs).clone()
    }

    /// Total `initialize` calls across every client created.
    pub fn total_initialize_calls(&self) -> usize {
        lock(&self.history)
            .iter()
            .map(|c| c.initialize_calls())
            .sum()
    }
}

impl WhatsAppClientFactory for MockClientFactory {
    fn create(&self, spec: ClientSpec) -> Result<ClientHandle, FluxbotError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let behavior = lock(&self.behavior).clone();
        if let Some(message) = &behavior.fail_create {
            return Err(FluxbotError::channel(message.clone()));
        }

        let (tx, rx) = mpsc::channel(32);
        let client = Arc::new(MockWhatsAppClient::new(behavior, tx));
        lock(&self.clients).insert(spec.device_id, Arc::clone(&client));
        lock(&self.history).push(Arc::clone(&client));
        lock(&self.specs).push(spec);
        Ok(ClientHandle {
            client,
            events: rx,
        })
    }
}
