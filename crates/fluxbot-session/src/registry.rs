// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory registry of live bot sessions, keyed by device id.
//!
//! The registry is authoritative only for "is there a live session object we
//! could tear down"; storage remains the system of record for device status.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use fluxbot_core::types::{DeviceId, Platform};
use fluxbot_core::WhatsAppClient;
use uuid::Uuid;

/// What a registered session can be driven through.
#[derive(Clone)]
pub enum SessionHandle {
    /// A live WhatsApp Web client.
    WhatsApp(Arc<dyn WhatsAppClient>),
    /// Marker for a stateless cloud device; there is nothing to tear down.
    Cloud,
}

/// One generation of a live session for a device.
///
/// Every session gets a fresh token so that cleanup triggered by an old
/// session can be told apart from the one currently registered.
pub struct BotSession {
    /// Generation token, unique per `start`.
    token: Uuid,
    platform: Platform,
    handle: SessionHandle,
    started_at: DateTime<Utc>,
    /// Set once an explicit stop or a failed start owns the teardown.
    closing: AtomicBool,
}

impl BotSession {
    pub fn whatsapp(client: Arc<dyn WhatsAppClient>) -> Self {
        Self::new(Platform::WhatsApp, SessionHandle::WhatsApp(client))
    }

    pub fn cloud() -> Self {
        Self::new(Platform::WhatsAppCloud, SessionHandle::Cloud)
    }

    fn new(platform: Platform, handle: SessionHandle) -> Self {
        Self {
            token: Uuid::new_v4(),
            platform,
            handle,
            started_at: Utc::now(),
            closing: AtomicBool::new(false),
        }
    }

    /// Generation token compared by [`BotRegistry::unregister_session`] and
    /// [`BotRegistry::is_current`].
    pub fn token(&self) -> Uuid {
        self.token
    }

    /// Platform the session was started for.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// How the session is driven: a live client or the cloud marker.
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// When the session was registered.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Marks the session as being torn down. Returns `true` for the first
    /// caller only; that caller records the final device status, and
    /// lifecycle events produced by the teardown itself must not.
    pub fn begin_close(&self) -> bool {
        !self.closing.swap(true, Ordering::SeqCst)
    }

    /// Whether [`begin_close`](Self::begin_close) has been called.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// The live client, if this is a WhatsApp Web session.
    pub fn client(&self) -> Option<&Arc<dyn WhatsAppClient>> {
        match &self.handle {
            SessionHandle::WhatsApp(client) => Some(client),
            SessionHandle::Cloud => None,
        }
    }
}

impl std::fmt::Debug for BotSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotSession")
            .field("token", &self.token)
            .field("platform", &self.platform)
            .field("started_at", &self.started_at)
            .field("closing", &self.is_closing())
            .finish_non_exhaustive()
    }
}

/// Concurrent map from device id to its live session.
#[derive(Default)]
pub struct BotRegistry {
    sessions: DashMap<DeviceId, Arc<BotSession>>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns the replaced session, if any.
    pub fn register(&self, device_id: DeviceId, session: Arc<BotSession>) -> Option<Arc<BotSession>> {
        self.sessions.insert(device_id, session)
    }

    /// Claim the slot for `device_id`. Returns `false`, leaving the existing
    /// session in place, when one is already registered.
    pub fn register_if_absent(&self, device_id: DeviceId, session: Arc<BotSession>) -> bool {
        match self.sessions.entry(device_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(session);
                true
            }
        }
    }

    /// The session registered for `device_id`, if any.
    pub fn get(&self, device_id: DeviceId) -> Option<Arc<BotSession>> {
        self.sessions.get(&device_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove whatever is registered for `device_id`. No-op when absent.
    pub fn unregister(&self, device_id: DeviceId) -> Option<Arc<BotSession>> {
        self.sessions.remove(&device_id).map(|(_, session)| session)
    }

    /// Remove the mapping only if it still holds the session with `token`.
    pub fn unregister_session(&self, device_id: DeviceId, token: Uuid) -> bool {
        self.sessions
            .remove_if(&device_id, |_, session| session.token == token)
            .is_some()
    }

    /// Whether the session with `token` is the one registered for `device_id`.
    pub fn is_current(&self, device_id: DeviceId, token: Uuid) -> bool {
        self.sessions
            .get(&device_id)
            .is_some_and(|entry| entry.token == token)
    }

    /// Snapshot of every registered session.
    pub fn list(&self) -> Vec<(DeviceId, Arc<BotSession>)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_overwrites() {
        let registry = BotRegistry::new();
        let first = Arc::new(BotSession::cloud());
        let second = Arc::new(BotSession::cloud());
        let first_token = first.token();

        assert!(registry.register(DeviceId(1), first).is_none());
        let replaced = registry.register(DeviceId(1), Arc::clone(&second)).unwrap();
        assert_eq!(replaced.token(), first_token);
        assert_eq!(registry.get(DeviceId(1)).unwrap().token(), second.token());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_if_absent_keeps_existing() {
        let registry = BotRegistry::new();
        let first = Arc::new(BotSession::cloud());
        let token = first.token();

        assert!(registry.register_if_absent(DeviceId(7), first));
        assert!(!registry.register_if_absent(DeviceId(7), Arc::new(BotSession::cloud())));
        assert_eq!(registry.get(DeviceId(7)).unwrap().token(), token);
    }

    #[test]
    fn unregister_absent_is_noop() {
        let registry = BotRegistry::new();
        assert!(registry.unregister(DeviceId(3)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn stale_generation_cannot_evict_newer_session() {
        let registry = BotRegistry::new();
        let old = Arc::new(BotSession::cloud());
        let old_token = old.token();
        registry.register(DeviceId(9), old);
        let new = Arc::new(BotSession::cloud());
        let new_token = new.token();
        registry.register(DeviceId(9), new);

        assert!(!registry.unregister_session(DeviceId(9), old_token));
        assert!(registry.is_current(DeviceId(9), new_token));
        assert!(!registry.is_current(DeviceId(9), old_token));
        assert!(registry.unregister_session(DeviceId(9), new_token));
        assert!(registry.get(DeviceId(9)).is_none());
    }

    #[test]
    fn closing_mark_is_shared_by_clones() {
        let registry = BotRegistry::new();
        let session = Arc::new(BotSession::cloud());
        registry.register(DeviceId(4), Arc::clone(&session));
        assert!(!session.is_closing());

        assert!(registry.get(DeviceId(4)).unwrap().begin_close());
        assert!(session.is_closing());
        assert!(!session.begin_close());
    }

    #[test]
    fn list_is_a_snapshot() {
        let registry = BotRegistry::new();
        registry.register(DeviceId(1), Arc::new(BotSession::cloud()));
        registry.register(DeviceId(2), Arc::new(BotSession::cloud()));

        let mut ids: Vec<_> = registry.list().into_iter().map(|(id, _)| id).collect();
        ids.sort();
        assert_eq!(ids, vec![DeviceId(1), DeviceId(2)]);

        registry.unregister(DeviceId(1));
        assert_eq!(ids.len(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let registry = Arc::new(BotRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.register_if_absent(DeviceId(1), Arc::new(BotSession::cloud()))
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
