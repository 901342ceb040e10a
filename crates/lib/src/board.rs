use std::sync::Arc;

use anyhow::bail;
use log::{debug, error, info};
use reqwest::ClientBuilder;
use tokio::sync::{Mutex, mpsc};

use crate::{
    BoardConfig, BoloId, CallId, CallPatch, ChangeEvent, GroupId, LocalStorage, NewBolo, NewCall,
    NewUnit, RecordStore, RemoteStore, RestStore, Snapshot, SyncAdapter, UnitId, UnitStatus,
    ValidationError, mutation,
    store::Commit,
};

/// The dispatch board: one record store, its local blob, and optionally a
/// remote mirror.
///
/// Every mutation is applied to the store first. The local blob is then
/// rewritten and the matching remote writes are spawned without waiting for
/// them. Persistence failures are logged, never returned.
pub struct Board {
    store: RecordStore,
    storage: LocalStorage,
    sync: Option<SyncAdapter>,
    save_lock: Mutex<()>,
}

impl Board {
    pub async fn open(config: &BoardConfig) -> anyhow::Result<Self> {
        let remote: Option<Arc<dyn RemoteStore>> = match &config.remote {
            Some(remote) => {
                debug!("Mirroring board to {}", remote.url);
                Some(Arc::new(RestStore::new(ClientBuilder::new(), remote)?))
            }
            None => None,
        };
        Ok(Board::with_remote(LocalStorage::in_dir(&config.data_dir), remote).await)
    }

    pub async fn with_remote(storage: LocalStorage, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        let snapshot = storage.load().await;
        Board {
            store: RecordStore::new(snapshot),
            storage,
            sync: remote.map(SyncAdapter::new),
            save_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.read()
    }

    pub fn version(&self) -> u64 {
        self.store.version()
    }

    pub fn remote(&self) -> Option<&Arc<dyn RemoteStore>> {
        self.sync.as_ref().map(SyncAdapter::remote)
    }

    async fn publish<T>(&self, commit: Commit<T>) -> T {
        if let Some(sync) = &self.sync {
            sync.mirror(&commit.previous, &commit.current);
        }
        self.save().await;
        commit.value
    }

    async fn commit<T>(
        &self,
        f: impl FnOnce(&Snapshot) -> Result<(Snapshot, T), ValidationError>,
    ) -> Result<T, ValidationError> {
        let commit = self.store.update(f)?;
        Ok(self.publish(commit).await)
    }

    async fn apply(&self, f: impl FnOnce(&Snapshot) -> Snapshot) {
        let commit = self.store.apply(f);
        self.publish(commit).await
    }

    // Saves serialize on the lock and always write the latest snapshot, so an
    // older save can never land after a newer one.
    async fn save(&self) {
        let _guard = self.save_lock.lock().await;
        let snapshot = self.store.read();
        if let Err(err) = self.storage.save(&snapshot).await {
            error!(
                "Saving board to {} failed: {:#}",
                self.storage.path().display(),
                anyhow::Error::from(err)
            );
        }
    }

    pub async fn create_unit(&self, new: NewUnit) -> Result<UnitId, ValidationError> {
        self.commit(|s| mutation::create_unit(s, new)).await
    }

    pub async fn delete_unit(&self, id: &UnitId) {
        self.apply(|s| mutation::delete_unit(s, id)).await
    }

    pub async fn set_unit_status(&self, id: &UnitId, status: UnitStatus) {
        self.apply(|s| mutation::set_unit_status(s, id, status)).await
    }

    pub async fn create_group(
        &self,
        name: &str,
        members: Vec<UnitId>,
    ) -> Result<GroupId, ValidationError> {
        self.commit(|s| mutation::create_group(s, name, members)).await
    }

    pub async fn delete_group(&self, id: &GroupId) {
        self.apply(|s| mutation::delete_group(s, id)).await
    }

    pub async fn create_call(&self, new: NewCall) -> Result<CallId, ValidationError> {
        self.commit(|s| mutation::create_call(s, new)).await
    }

    pub async fn delete_call(&self, id: &CallId) {
        self.apply(|s| mutation::delete_call(s, id)).await
    }

    pub async fn toggle_call_active(&self, id: &CallId) {
        self.apply(|s| mutation::toggle_call_active(s, id)).await
    }

    pub async fn edit_call(&self, id: &CallId, patch: CallPatch) {
        self.apply(|s| mutation::edit_call(s, id, patch)).await
    }

    pub async fn assign_unit_to_call(&self, unit_id: &UnitId, call_id: &CallId) {
        self.apply(|s| mutation::assign_unit_to_call(s, unit_id, call_id))
            .await
    }

    pub async fn assign_group_to_call(&self, group_id: &GroupId, call_id: &CallId) {
        self.apply(|s| mutation::assign_group_to_call(s, group_id, call_id))
            .await
    }

    pub async fn remove_assigned_unit(&self, unit_id: &UnitId, call_id: &CallId) {
        self.apply(|s| mutation::remove_assigned_unit(s, unit_id, call_id))
            .await
    }

    pub async fn create_bolo(&self, new: NewBolo) -> Result<BoloId, ValidationError> {
        self.commit(|s| mutation::create_bolo(s, new)).await
    }

    pub async fn delete_bolo(&self, id: &BoloId) {
        self.apply(|s| mutation::delete_bolo(s, id)).await
    }

    pub async fn set_dispatch_notes(&self, notes: &str) {
        self.apply(|s| mutation::set_dispatch_notes(s, notes)).await
    }

    /// Replaces the four collections with the remote tables' contents.
    /// Dispatch notes are kept. Returns the version of the new snapshot.
    pub async fn reload(&self) -> anyhow::Result<u64> {
        let Some(sync) = &self.sync else {
            bail!("No remote store configured");
        };
        let remote = sync.reload().await?;

        let commit = self.store.apply(|current| Snapshot {
            dispatch_notes: current.dispatch_notes.clone(),
            ..remote
        });
        info!(
            "Reloaded board from remote: {} units, {} groups, {} calls, {} bolos (version {})",
            commit.current.units.len(),
            commit.current.groups.len(),
            commit.current.calls.len(),
            commit.current.bolos.len(),
            commit.version
        );
        self.save().await;
        Ok(commit.version)
    }

    /// Reloads on every event until the feed closes. `on_reload` sees each
    /// successfully installed snapshot.
    pub async fn watch(
        &self,
        mut events: mpsc::Receiver<ChangeEvent>,
        mut on_reload: impl FnMut(&ChangeEvent, u64, &Snapshot),
    ) {
        while let Some(event) = events.recv().await {
            debug!("{} change on {}, reloading", event.kind, event.table);
            match self.reload().await {
                Ok(version) => on_reload(&event, version, &self.snapshot()),
                Err(err) => error!("Reload after change on {} failed: {:#}", event.table, err),
            }
        }
    }

    /// Waits for the remote writes spawned so far.
    pub async fn settle(&self) {
        if let Some(sync) = &self.sync {
            sync.settle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::{ChangeKind, Table, UnitType, testing::MemoryRemote};

    async fn board(dir: &TempDir, remote: Option<Arc<MemoryRemote>>) -> Board {
        let remote = remote.map(|r| r as Arc<dyn RemoteStore>);
        Board::with_remote(LocalStorage::in_dir(dir.path()), remote).await
    }

    #[tokio::test]
    async fn local_board_survives_restart() {
        let dir = TempDir::new().unwrap();
        let first = board(&dir, None).await;
        let unit = first
            .create_unit(NewUnit::new("Unit 23", UnitType::Lasd))
            .await
            .unwrap();
        let call = first.create_call(NewCall::new("Robbery")).await.unwrap();
        first.assign_unit_to_call(&unit, &call).await;
        first.set_dispatch_notes("shift 2").await;

        let second = board(&dir, None).await;

        assert_eq!(*second.snapshot(), *first.snapshot());
        assert!(second.snapshot().call(&call).unwrap().assigned.contains(&unit));
    }

    #[tokio::test]
    async fn local_config_opens_without_remote() {
        let dir = TempDir::new().unwrap();
        let board = Board::open(&BoardConfig::local(dir.path())).await.unwrap();

        board
            .create_bolo(NewBolo {
                title: "Black SUV".to_string(),
                plate: "7ABC123".to_string(),
                note: String::new(),
                active: true,
            })
            .await
            .unwrap();

        assert!(board.remote().is_none());
        assert!(dir.path().join("erlc_cad_full_v2_v1.json").exists());
    }

    #[tokio::test]
    async fn rejected_mutations_change_nothing() {
        let dir = TempDir::new().unwrap();
        let board = board(&dir, None).await;

        let err = board
            .create_unit(NewUnit::new("", UnitType::Lasd))
            .await
            .unwrap_err();

        assert_eq!(err, ValidationError::EmptyField("unit name"));
        assert_eq!(board.version(), 0);
        assert!(board.snapshot().units.is_empty());
    }

    #[tokio::test]
    async fn mutations_are_mirrored_remotely() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let board = board(&dir, Some(remote.clone())).await;

        let unit = board
            .create_unit(NewUnit::new("Unit 23", UnitType::Chp))
            .await
            .unwrap();
        let group = board.create_group("Alpha", vec![unit.clone()]).await.unwrap();
        let call = board.create_call(NewCall::new("Robbery")).await.unwrap();
        board.assign_group_to_call(&group, &call).await;
        board.delete_unit(&unit).await;
        board.settle().await;

        assert!(remote.rows(Table::Units).is_empty());
        assert_eq!(remote.rows(Table::Groups)[0]["unitIds"], json!([]));
        assert_eq!(remote.rows(Table::Calls)[0]["assigned"], json!([]));
        assert_eq!(remote.rows(Table::Calls)[0]["title"], json!("Robbery"));
    }

    #[tokio::test]
    async fn failed_remote_writes_keep_local_state() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        remote.set_fail_writes(true);
        let board = board(&dir, Some(remote.clone())).await;

        let call = board.create_call(NewCall::new("Robbery")).await.unwrap();
        board.settle().await;

        assert!(board.snapshot().call(&call).is_some());
        assert!(remote.rows(Table::Calls).is_empty());
    }

    #[tokio::test]
    async fn reload_replaces_collections_but_keeps_notes() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let board = board(&dir, Some(remote.clone())).await;
        board.set_dispatch_notes("shift 2").await;
        board.create_call(NewCall::new("Stale local call")).await.unwrap();
        board.settle().await;
        remote.seed(Table::Calls, Vec::new());
        remote.seed(
            Table::Bolos,
            vec![json!({
                "id": "b_1", "title": "Black SUV", "plate": "7ABC123", "note": "",
                "active": true, "createdAt": "2025-01-02T03:04:05Z"
            })],
        );
        let before = board.version();

        let version = board.reload().await.unwrap();

        let snapshot = board.snapshot();
        assert!(version > before);
        assert!(snapshot.calls.is_empty());
        assert_eq!(snapshot.bolos[0].title, "Black SUV");
        assert_eq!(snapshot.dispatch_notes, "shift 2");
    }

    fn names<T>(items: &[T], name: impl Fn(&T) -> &str) -> Vec<String> {
        items.iter().map(|item| name(item).to_string()).collect()
    }

    #[tokio::test]
    async fn reload_keeps_local_order() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let board = board(&dir, Some(remote.clone())).await;
        for i in 0..8 {
            let unit = board
                .create_unit(NewUnit::new(format!("Unit {i}"), UnitType::Lasd))
                .await
                .unwrap();
            board.create_group(&format!("Group {i}"), vec![unit]).await.unwrap();
            board.create_call(NewCall::new(format!("Call {i}"))).await.unwrap();
        }
        for i in 0..3 {
            board
                .create_bolo(NewBolo {
                    title: format!("Bolo {i}"),
                    active: true,
                    ..Default::default()
                })
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        board.settle().await;
        let before = board.snapshot();

        board.reload().await.unwrap();

        let after = board.snapshot();
        let units = |s: &Snapshot| names(&s.units[..], |u| u.name.as_str());
        let groups = |s: &Snapshot| names(&s.groups[..], |g| g.name.as_str());
        let calls = |s: &Snapshot| names(&s.calls[..], |c| c.title.as_str());
        let bolos = |s: &Snapshot| names(&s.bolos[..], |b| b.title.as_str());
        assert_eq!(units(&before)[0], "Unit 0");
        assert_eq!(calls(&before)[0], "Call 7");
        assert_eq!(bolos(&before)[0], "Bolo 2");
        assert_eq!(units(&after), units(&before));
        assert_eq!(groups(&after), groups(&before));
        assert_eq!(calls(&after), calls(&before));
        assert_eq!(bolos(&after), bolos(&before));
    }

    #[tokio::test]
    async fn reloaded_bolos_are_newest_first() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let bolo = |id: &str, created_at: &str| {
            json!({
                "id": id, "title": id, "plate": "", "note": "",
                "active": true, "createdAt": created_at
            })
        };
        remote.seed(
            Table::Bolos,
            vec![
                bolo("b_older", "2025-01-02T03:04:05Z"),
                bolo("b_newest", "2025-01-02T03:04:06Z"),
                bolo("b_newer", "2025-01-02T03:04:05.5Z"),
            ],
        );
        let board = board(&dir, Some(remote)).await;

        board.reload().await.unwrap();

        assert_eq!(
            names(&board.snapshot().bolos[..], |b| b.id.as_str()),
            ["b_newest", "b_newer", "b_older"]
        );
    }

    #[tokio::test]
    async fn reload_without_remote_fails() {
        let dir = TempDir::new().unwrap();
        let board = board(&dir, None).await;
        assert!(board.reload().await.is_err());
    }

    #[tokio::test]
    async fn remote_changes_trigger_reloads() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let board = board(&dir, Some(remote.clone())).await;
        let mut feed = remote.subscribe();

        remote
            .insert(
                Table::Units,
                json!({"id": "u_other", "name": "Unit 45", "type": "DHS", "subdivision": "", "status": "Busy"}),
            )
            .await
            .unwrap();
        let event = feed.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);

        let (tx, events) = mpsc::channel(1);
        tx.send(event).await.unwrap();
        drop(tx);

        let mut seen = Vec::new();
        board
            .watch(events, |event, version, snapshot| {
                seen.push((event.table, version, snapshot.units.len()));
            })
            .await;

        assert_eq!(seen, vec![(Table::Units, 1, 1)]);
        assert_eq!(board.snapshot().unit(&UnitId::from("u_other")).unwrap().name, "Unit 45");
    }
}
