//! Reactive state bridge.
//!
//! Holds the hydrated projections in memory, lets view code read them
//! synchronously and subscribe to changes, and persists changes back to the
//! repository.
//!
//! Two write paths:
//! - [`ReactiveBridge::write`] updates memory at once, marks the projection
//!   dirty and schedules a background flush; [`ReactiveBridge::flush`]
//!   persists it on demand.
//! - [`ReactiveBridge::update`] / [`ReactiveBridge::commit`] persist first and
//!   touch memory only on success. Session actions use this path.

mod projection;

pub use projection::{BridgeSnapshot, Projection, ProjectionValue};

use chatbox_core::error::Result;
use chatbox_core::session::Session;
use chatbox_core::storage::{Repository, RepositoryExt, Transaction, keys};
use chatbox_core::AppSettings;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

/// Callback invoked with the new value of a projection.
pub type Listener = Arc<dyn Fn(&ProjectionValue) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    projection: Projection,
    listener: Listener,
}

#[derive(Default)]
struct ListenerRegistry {
    entries: Vec<ListenerEntry>,
    next_id: u64,
}

/// Handle returned by [`ReactiveBridge::subscribe`].
///
/// The listener stays registered until [`Subscription::unsubscribe`] is called.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    projection: Projection,
    registry: Weak<Mutex<ListenerRegistry>>,
}

impl Subscription {
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Removes the listener. Returns false if the bridge is already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
        let before = registry.entries.len();
        registry.entries.retain(|entry| entry.id != self.id);
        registry.entries.len() != before
    }
}

#[derive(Default)]
struct BridgeState {
    snapshot: BridgeSnapshot,
    dirty: HashSet<Projection>,
}

/// In-memory mirror of the session store with change notification.
pub struct ReactiveBridge {
    repository: Arc<dyn Repository>,
    state: RwLock<BridgeState>,
    listeners: Arc<Mutex<ListenerRegistry>>,
    /// Serializes persistence so each commit sees the previous one's result.
    persist_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for ReactiveBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveBridge")
            .field("repository", &"<dyn Repository>")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl ReactiveBridge {
    /// Loads every projection from a migrated repository.
    ///
    /// The order list is reconciled with the stored records: ids without a
    /// record are dropped and records missing from the list are appended in
    /// key order. A current-session pointer to a missing session is cleared.
    pub async fn hydrate(repository: Arc<dyn Repository>) -> Result<Self> {
        let order: Vec<String> = repository
            .get_json(keys::SESSION_ORDER)
            .await?
            .unwrap_or_default();

        let record_keys = repository.list_keys(keys::SESSION_PREFIX).await?;
        let mut records: HashMap<String, Session> = HashMap::with_capacity(record_keys.len());
        for key in &record_keys {
            let Some(id) = keys::session_id_from_key(key) else {
                continue;
            };
            let Some(mut session) = repository.get_json::<Session>(key).await? else {
                continue;
            };
            if session.id != id {
                tracing::warn!("Session record '{}' carries id '{}'; using the key", key, session.id);
                session.id = id.to_string();
            }
            records.insert(id.to_string(), session);
        }

        let mut sessions = Vec::with_capacity(records.len());
        for id in order {
            match records.remove(&id) {
                Some(session) => sessions.push(session),
                None => tracing::warn!("Dropping order entry '{}' without a session record", id),
            }
        }
        for key in &record_keys {
            let Some(id) = keys::session_id_from_key(key) else {
                continue;
            };
            if let Some(session) = records.remove(id) {
                tracing::debug!("Appending unlisted session '{}'", id);
                sessions.push(session);
            }
        }

        let mut current_session_id: Option<String> =
            repository.get_json(keys::CURRENT_SESSION_ID).await?;
        if let Some(id) = current_session_id.as_deref() {
            if !sessions.iter().any(|s| s.id == id) {
                tracing::warn!("Current session '{}' does not exist; clearing", id);
                current_session_id = None;
            }
        }

        let settings: AppSettings = repository
            .get_json(keys::SETTINGS)
            .await?
            .unwrap_or_default();

        tracing::info!(
            "Hydrated {} sessions (current: {})",
            sessions.len(),
            current_session_id.as_deref().unwrap_or("none")
        );

        Ok(Self {
            repository,
            state: RwLock::new(BridgeState {
                snapshot: BridgeSnapshot {
                    sessions,
                    current_session_id,
                    settings,
                },
                dirty: HashSet::new(),
            }),
            listeners: Arc::new(Mutex::new(ListenerRegistry::default())),
            persist_lock: tokio::sync::Mutex::new(()),
        })
    }

    // ============================================================================
    // Reads
    // ============================================================================

    pub fn read(&self, projection: Projection) -> ProjectionValue {
        self.read_state().snapshot.get(projection)
    }

    /// Copies every projection under one lock.
    pub fn snapshot(&self) -> BridgeSnapshot {
        self.read_state().snapshot.clone()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.read_state().snapshot.sessions.clone()
    }

    pub fn session(&self, id: &str) -> Option<Session> {
        self.read_state().snapshot.session(id).cloned()
    }

    pub fn current_session_id(&self) -> Option<String> {
        self.read_state().snapshot.current_session_id.clone()
    }

    pub fn current_session(&self) -> Option<Session> {
        let state = self.read_state();
        let id = state.snapshot.current_session_id.as_deref()?;
        state.snapshot.session(id).cloned()
    }

    pub fn settings(&self) -> AppSettings {
        self.read_state().snapshot.settings.clone()
    }

    /// Returns true if the projection was written but not yet flushed.
    pub fn is_dirty(&self, projection: Projection) -> bool {
        self.read_state().dirty.contains(&projection)
    }

    // ============================================================================
    // Subscriptions
    // ============================================================================

    /// Registers a listener for one projection.
    ///
    /// Listeners run in subscription order after each change, outside every
    /// internal lock, so they may read from or write to the bridge.
    pub fn subscribe<F>(&self, projection: Projection, listener: F) -> Subscription
    where
        F: Fn(&ProjectionValue) + Send + Sync + 'static,
    {
        let mut registry = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push(ListenerEntry {
            id,
            projection,
            listener: Arc::new(listener),
        });

        Subscription {
            id,
            projection,
            registry: Arc::downgrade(&self.listeners),
        }
    }

    fn notify(&self, value: &ProjectionValue) {
        let projection = value.projection();
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .filter(|entry| entry.projection == projection)
            .map(|entry| Arc::clone(&entry.listener))
            .collect();

        for listener in listeners {
            listener(value);
        }
    }

    // ============================================================================
    // Writes
    // ============================================================================

    /// Updates memory at once, marks the projection dirty and schedules a
    /// flush on the current tokio runtime.
    ///
    /// A structurally equal value is ignored: nothing is notified or marked.
    /// Outside a runtime the projection stays dirty until [`Self::flush`].
    pub fn write(self: &Arc<Self>, value: ProjectionValue) {
        let changed = {
            let mut state = self.write_state();
            let changed = state.snapshot.replace(value.clone());
            if changed {
                state.dirty.insert(value.projection());
            }
            changed
        };

        if changed {
            self.notify(&value);
            self.schedule_flush();
        }
    }

    fn schedule_flush(self: &Arc<Self>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime; dirty projections wait for flush()");
            return;
        };
        let bridge = Arc::downgrade(self);
        runtime.spawn(async move {
            let Some(bridge) = bridge.upgrade() else {
                return;
            };
            // flush() logs its own failures and keeps the projections dirty
            let _ = bridge.flush().await;
        });
    }

    /// Persists every dirty projection in one repository transaction.
    ///
    /// On failure the projections stay dirty and memory is not rolled back.
    pub async fn flush(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;

        let pending: Vec<ProjectionValue> = {
            let mut state = self.write_state();
            let dirty = std::mem::take(&mut state.dirty);
            dirty
                .into_iter()
                .map(|projection| state.snapshot.get(projection))
                .collect()
        };
        if pending.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.persist(&pending).await {
            tracing::warn!("Failed to flush {} projections: {}", pending.len(), e);
            let mut state = self.write_state();
            state.dirty.extend(pending.iter().map(ProjectionValue::projection));
            return Err(e);
        }

        tracing::debug!("Flushed {} projections", pending.len());
        Ok(())
    }

    /// Persists `value`, then updates memory and notifies.
    ///
    /// All-or-nothing: if persistence fails, memory is untouched.
    pub async fn commit(&self, value: ProjectionValue) -> Result<()> {
        self.update(|_| Ok(((), vec![value]))).await
    }

    /// Runs a read-modify-write over the current snapshot.
    ///
    /// `f` sees a snapshot taken after every earlier commit has completed and
    /// returns its output plus the projections to replace. The replacements
    /// are persisted in one transaction and only then applied to memory. If
    /// `f` or persistence fails, nothing changes.
    pub async fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&BridgeSnapshot) -> Result<(T, Vec<ProjectionValue>)>,
    {
        let _guard = self.persist_lock.lock().await;

        let snapshot = self.snapshot();
        let (output, values) = f(&snapshot)?;
        let values: Vec<ProjectionValue> = values
            .into_iter()
            .filter(|value| snapshot.get(value.projection()) != *value)
            .collect();
        if values.is_empty() {
            return Ok(output);
        }

        if let Err(e) = self.persist(&values).await {
            tracing::warn!("Commit failed, in-memory state unchanged: {}", e);
            return Err(e);
        }

        let mut changed = Vec::with_capacity(values.len());
        {
            let mut state = self.write_state();
            for value in values {
                state.dirty.remove(&value.projection());
                if state.snapshot.replace(value.clone()) {
                    changed.push(value);
                }
            }
        }
        for value in &changed {
            self.notify(value);
        }
        Ok(output)
    }

    async fn persist(&self, values: &[ProjectionValue]) -> Result<()> {
        self.repository
            .transaction(|tx| {
                for value in values {
                    stage_projection(tx, value)?;
                }
                Ok(())
            })
            .await
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, BridgeState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, BridgeState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stages the repository writes that make storage match `value`.
fn stage_projection(tx: &mut Transaction<'_>, value: &ProjectionValue) -> Result<()> {
    match value {
        ProjectionValue::Sessions(sessions) => {
            let mut live = HashSet::with_capacity(sessions.len());
            for session in sessions {
                let key = keys::session_key(&session.id);
                let bytes = serde_json::to_vec(session)?;
                // Unchanged records are not rewritten
                if tx.get(&key)?.as_deref() != Some(bytes.as_slice()) {
                    tx.set(key, bytes);
                }
                live.insert(session.id.as_str());
            }

            let order: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
            tx.set_json(keys::SESSION_ORDER, &order)?;

            for key in tx.list_keys(keys::SESSION_PREFIX)? {
                let stale = keys::session_id_from_key(&key).is_some_and(|id| !live.contains(id));
                if stale {
                    tx.delete(key);
                }
            }
        }
        ProjectionValue::CurrentSession(Some(id)) => tx.set_json(keys::CURRENT_SESSION_ID, id)?,
        ProjectionValue::CurrentSession(None) => tx.delete(keys::CURRENT_SESSION_ID),
        ProjectionValue::Settings(settings) => tx.set_json(keys::SETTINGS, settings)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbox_core::session::SessionType;
    use chatbox_infrastructure::MemoryRepository;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn session_json(id: &str, name: &str) -> serde_json::Value {
        json!({"id": id, "name": name, "type": "chat", "starred": false, "messages": []})
    }

    fn seeded_repo() -> Arc<MemoryRepository> {
        Arc::new(MemoryRepository::with_json_entries([
            ("schema-version", json!(4)),
            ("session-order", json!(["b", "a"])),
            ("session:a", session_json("a", "Alpha")),
            ("session:b", session_json("b", "Beta")),
            ("current-session-id", json!("a")),
            ("settings", json!({"showSidebar": false})),
        ]))
    }

    async fn bridge_over(repo: &Arc<MemoryRepository>) -> Arc<ReactiveBridge> {
        Arc::new(ReactiveBridge::hydrate(repo.clone()).await.unwrap())
    }

    async fn settle(bridge: &ReactiveBridge, projection: Projection) {
        for _ in 0..100 {
            if !bridge.is_dirty(projection) {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_hydrate_follows_order_list() {
        let repo = seeded_repo();
        let bridge = bridge_over(&repo).await;

        let ids: Vec<String> = bridge.sessions().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(bridge.current_session_id().as_deref(), Some("a"));
        assert_eq!(bridge.current_session().unwrap().name, "Alpha");
        assert!(!bridge.settings().show_sidebar);
    }

    #[tokio::test]
    async fn test_hydrate_reconciles_order_and_pointer() {
        let repo = Arc::new(MemoryRepository::with_json_entries([
            ("session-order", json!(["ghost", "b"])),
            ("session:a", session_json("a", "Unlisted")),
            ("session:b", session_json("b", "Listed")),
            ("current-session-id", json!("ghost")),
        ]));
        let bridge = bridge_over(&repo).await;

        let ids: Vec<String> = bridge.sessions().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(bridge.current_session_id(), None);
        assert_eq!(bridge.settings(), AppSettings::default());
    }

    #[tokio::test]
    async fn test_listeners_fire_in_order_and_skip_equal_writes() {
        let repo = seeded_repo();
        let bridge = bridge_over(&repo).await;
        let calls = Arc::new(StdMutex::new(Vec::new()));

        let first = {
            let calls = calls.clone();
            bridge.subscribe(Projection::CurrentSession, move |value| {
                calls.lock().unwrap().push(format!("first:{:?}", value.as_current_session()));
            })
        };
        let _second = {
            let calls = calls.clone();
            bridge.subscribe(Projection::CurrentSession, move |_| {
                calls.lock().unwrap().push("second".to_string());
            })
        };
        let _other = {
            let calls = calls.clone();
            bridge.subscribe(Projection::Settings, move |_| {
                calls.lock().unwrap().push("settings".to_string());
            })
        };

        bridge.write(ProjectionValue::CurrentSession(Some("b".to_string())));
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["first:Some(Some(\"b\"))".to_string(), "second".to_string()]
        );

        // Structurally equal: nobody is notified
        bridge.write(ProjectionValue::CurrentSession(Some("b".to_string())));
        assert_eq!(calls.lock().unwrap().len(), 2);

        assert!(first.unsubscribe());
        bridge.write(ProjectionValue::CurrentSession(None));
        assert_eq!(calls.lock().unwrap().last().map(String::as_str), Some("second"));
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_flush_makes_repository_match_memory() {
        let repo = seeded_repo();
        let bridge = bridge_over(&repo).await;

        let mut sessions = bridge.sessions();
        sessions.retain(|s| s.id != "b");
        sessions.push(Session::new(SessionType::Picture, "Gamma"));
        bridge.write(ProjectionValue::Sessions(sessions));
        bridge.write(ProjectionValue::Settings(AppSettings::new().with_show_sidebar(true)));
        assert!(bridge.is_dirty(Projection::Sessions));

        bridge.flush().await.unwrap();
        assert!(!bridge.is_dirty(Projection::Sessions));
        assert!(repo.get("session:b").await.unwrap().is_none());

        let reloaded = bridge_over(&repo).await;
        assert_eq!(reloaded.snapshot(), bridge.snapshot());
    }

    #[tokio::test]
    async fn test_write_is_persisted_without_explicit_flush() {
        let repo = seeded_repo();
        let bridge = bridge_over(&repo).await;

        bridge.write(ProjectionValue::Settings(AppSettings::new().with_show_sidebar(true)));
        assert!(bridge.settings().show_sidebar);
        settle(&bridge, Projection::Settings).await;

        assert!(!bridge.is_dirty(Projection::Settings));
        let stored: AppSettings = repo.get_json("settings").await.unwrap().unwrap();
        assert!(stored.show_sidebar);
    }

    #[test]
    fn test_write_outside_runtime_waits_for_flush() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let repo = seeded_repo();
        let bridge = runtime.block_on(bridge_over(&repo));

        bridge.write(ProjectionValue::CurrentSession(Some("b".to_string())));
        assert!(bridge.is_dirty(Projection::CurrentSession));

        runtime.block_on(bridge.flush()).unwrap();
        let stored: Option<String> = runtime.block_on(repo.get_json("current-session-id")).unwrap();
        assert_eq!(stored.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_projection_dirty() {
        let repo = seeded_repo();
        let bridge = bridge_over(&repo).await;
        repo.set_read_only(true);

        bridge.write(ProjectionValue::Settings(AppSettings::new().with_show_sidebar(true)));
        let err = bridge.flush().await.unwrap_err();
        assert!(err.is_storage_unavailable());
        assert!(bridge.is_dirty(Projection::Settings));
        assert!(bridge.settings().show_sidebar);

        repo.set_read_only(false);
        bridge.flush().await.unwrap();
        assert!(!bridge.is_dirty(Projection::Settings));
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let repo = seeded_repo();
        let bridge = bridge_over(&repo).await;
        let notified = Arc::new(StdMutex::new(0));
        let _sub = {
            let notified = notified.clone();
            bridge.subscribe(Projection::CurrentSession, move |_| *notified.lock().unwrap() += 1)
        };

        repo.set_read_only(true);
        let err = bridge
            .commit(ProjectionValue::CurrentSession(Some("b".to_string())))
            .await
            .unwrap_err();
        assert!(err.is_storage_unavailable());
        assert_eq!(bridge.current_session_id().as_deref(), Some("a"));
        assert_eq!(*notified.lock().unwrap(), 0);

        repo.set_read_only(false);
        bridge
            .commit(ProjectionValue::CurrentSession(Some("b".to_string())))
            .await
            .unwrap();
        assert_eq!(bridge.current_session_id().as_deref(), Some("b"));
        assert_eq!(
            repo.get_json::<String>("current-session-id").await.unwrap().as_deref(),
            Some("b")
        );
        assert_eq!(*notified.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_with_no_changes_writes_nothing() {
        let repo = seeded_repo();
        let bridge = bridge_over(&repo).await;
        let before = repo.snapshot();
        repo.set_read_only(true);

        let id = bridge
            .update(|snapshot| {
                Ok((
                    snapshot.current_session_id.clone(),
                    vec![snapshot.get(Projection::Sessions)],
                ))
            })
            .await
            .unwrap();

        assert_eq!(id.as_deref(), Some("a"));
        assert_eq!(repo.snapshot(), before);
    }
}
