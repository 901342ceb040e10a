//! Mirroring of local mutations to the remote store, and full reloads from it.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, OnceLock},
};

use anyhow::Context;
use log::{debug, error};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};

use crate::{
    Bolo, Call, Group, RemoteStore, RemoteWrite, Snapshot, Table, Unit, remote::apply_write,
};

/// A record type stored as one row of a remote table.
pub trait Row: Serialize + DeserializeOwned + PartialEq {
    const TABLE: Table;

    fn row_id(&self) -> &str;
}

impl Row for Unit {
    const TABLE: Table = Table::Units;

    fn row_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Row for Group {
    const TABLE: Table = Table::Groups;

    fn row_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Row for Call {
    const TABLE: Table = Table::Calls;

    fn row_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Row for Bolo {
    const TABLE: Table = Table::Bolos;

    fn row_id(&self) -> &str {
        self.id.as_str()
    }
}

/// The row-level writes that turn `previous` into `current` on the remote
/// side. Dispatch notes are local-only and never produce writes.
pub fn writes_between(previous: &Snapshot, current: &Snapshot) -> serde_json::Result<Vec<RemoteWrite>> {
    let mut writes = Vec::new();
    diff_table(&previous.units, &current.units, &mut writes)?;
    diff_table(&previous.groups, &current.groups, &mut writes)?;
    diff_table(&previous.calls, &current.calls, &mut writes)?;
    diff_table(&previous.bolos, &current.bolos, &mut writes)?;
    Ok(writes)
}

fn diff_table<T: Row>(
    previous: &Arc<Vec<T>>,
    current: &Arc<Vec<T>>,
    writes: &mut Vec<RemoteWrite>,
) -> serde_json::Result<()> {
    if Arc::ptr_eq(previous, current) {
        return Ok(());
    }

    let before: HashMap<&str, &T> = previous.iter().map(|row| (row.row_id(), row)).collect();
    let after: HashSet<&str> = current.iter().map(Row::row_id).collect();

    for row in current.iter() {
        match before.get(row.row_id()) {
            None => writes.push(RemoteWrite::Insert {
                table: T::TABLE,
                row: serde_json::to_value(row)?,
            }),
            Some(old) if *old != row => writes.push(RemoteWrite::Update {
                table: T::TABLE,
                id: row.row_id().to_string(),
                patch: changed_fields(serde_json::to_value(old)?, serde_json::to_value(row)?),
            }),
            Some(_) => {}
        }
    }

    for row in previous.iter().filter(|row| !after.contains(row.row_id())) {
        writes.push(RemoteWrite::Delete {
            table: T::TABLE,
            id: row.row_id().to_string(),
        });
    }

    Ok(())
}

fn changed_fields(before: Value, after: Value) -> Value {
    match (before, after) {
        (Value::Object(before), Value::Object(after)) => Value::Object(
            after
                .into_iter()
                .filter(|(key, value)| before.get(key) != Some(value))
                .collect::<Map<_, _>>(),
        ),
        (_, after) => after,
    }
}

async fn fetch<T: Row>(remote: &dyn RemoteStore) -> anyhow::Result<Vec<T>> {
    let rows = remote
        .select_all(T::TABLE)
        .await
        .with_context(|| format!("Selecting {}", T::TABLE))?;

    rows.into_iter()
        .map(|row| serde_json::from_value(row).with_context(|| format!("Decoding a row of {}", T::TABLE)))
        .collect()
}

/// Reads all four tables. Any failure aborts the whole reload.
pub async fn fetch_all(remote: &dyn RemoteStore) -> anyhow::Result<Snapshot> {
    Ok(Snapshot {
        units: Arc::new(fetch::<Unit>(remote).await?),
        groups: Arc::new(fetch::<Group>(remote).await?),
        calls: Arc::new(fetch::<Call>(remote).await?),
        bolos: Arc::new(fetch::<Bolo>(remote).await?),
        dispatch_notes: String::new(),
    })
}

enum Job {
    Replay(Vec<RemoteWrite>),
    Flush(oneshot::Sender<()>),
}

async fn replay(remote: Arc<dyn RemoteStore>, mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Replay(writes) => {
                for write in writes {
                    let target = write.to_string();
                    match apply_write(remote.as_ref(), write).await {
                        Ok(()) => debug!("Remote {} done", target),
                        Err(err) => error!("Remote {} failed: {:#}", target, err),
                    }
                }
            }
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

/// Replays local changes on a remote store without ever blocking on it.
///
/// Writes go through a single background task, so the remote sees them in
/// mutation order.
pub struct SyncAdapter {
    remote: Arc<dyn RemoteStore>,
    queue: OnceLock<mpsc::UnboundedSender<Job>>,
}

impl SyncAdapter {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        SyncAdapter {
            remote,
            queue: OnceLock::new(),
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    fn queue(&self) -> &mpsc::UnboundedSender<Job> {
        self.queue.get_or_init(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(replay(self.remote.clone(), rx));
            tx
        })
    }

    /// Queues the writes for a `previous` → `current` transition. Failures
    /// are logged and dropped: no retry, no local rollback.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mirror(&self, previous: &Snapshot, current: &Snapshot) {
        let writes = match writes_between(previous, current) {
            Ok(writes) => writes,
            Err(err) => {
                error!("Encoding remote writes failed: {}", err);
                return;
            }
        };
        if writes.is_empty() {
            return;
        }

        if self.queue().send(Job::Replay(writes)).is_err() {
            error!("Remote writer is gone, dropping writes");
        }
    }

    pub async fn reload(&self) -> anyhow::Result<Snapshot> {
        fetch_all(self.remote.as_ref()).await
    }

    /// Waits for every write queued so far.
    pub async fn settle(&self) {
        let Some(queue) = self.queue.get() else {
            return;
        };
        let (tx, rx) = oneshot::channel();
        if queue.send(Job::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{NewCall, NewUnit, UnitType, mutation, testing::MemoryRemote};

    #[test]
    fn creation_is_an_insert() {
        let previous = Snapshot::default();
        let (current, id) = mutation::create_unit(&previous, NewUnit::new("Unit 23", UnitType::Lapd)).unwrap();

        let writes = writes_between(&previous, &current).unwrap();

        assert_eq!(writes.len(), 1);
        let RemoteWrite::Insert { table, row } = &writes[0] else {
            panic!("expected an insert, got {:?}", writes[0]);
        };
        assert_eq!(*table, Table::Units);
        assert_eq!(row["id"], json!(id.as_str()));
        assert_eq!(row["name"], json!("Unit 23"));
        assert_eq!(row["type"], json!("LAPD"));
    }

    #[test]
    fn cascade_produces_partial_updates() {
        let (s, u1) = mutation::create_unit(&Snapshot::default(), NewUnit::new("Unit 23", UnitType::Lapd)).unwrap();
        let (s, g1) = mutation::create_group(&s, "Alpha", vec![u1.clone()]).unwrap();
        let (s, c1) = mutation::create_call(&s, NewCall::new("Robbery")).unwrap();
        let previous = mutation::assign_group_to_call(&s, &g1, &c1);

        let current = mutation::delete_unit(&previous, &u1);
        let writes = writes_between(&previous, &current).unwrap();

        assert_eq!(
            writes,
            vec![
                RemoteWrite::Delete {
                    table: Table::Units,
                    id: u1.to_string(),
                },
                RemoteWrite::Update {
                    table: Table::Groups,
                    id: g1.to_string(),
                    patch: json!({"unitIds": []}),
                },
                RemoteWrite::Update {
                    table: Table::Calls,
                    id: c1.to_string(),
                    patch: json!({"assigned": []}),
                },
            ]
        );
    }

    #[test]
    fn notes_and_misses_produce_nothing() {
        let (previous, _) = mutation::create_call(&Snapshot::default(), NewCall::new("Robbery")).unwrap();

        let notes = mutation::set_dispatch_notes(&previous, "shift 2");
        let miss = mutation::toggle_call_active(&previous, &"c_missing".into());

        assert!(writes_between(&previous, &notes).unwrap().is_empty());
        assert!(writes_between(&previous, &miss).unwrap().is_empty());
    }

    #[tokio::test]
    async fn mirrored_writes_reach_the_remote() {
        let remote = Arc::new(MemoryRemote::new());
        let adapter = SyncAdapter::new(remote.clone());
        let previous = Snapshot::default();
        let (current, id) = mutation::create_unit(&previous, NewUnit::new("Unit 23", UnitType::Chp)).unwrap();

        adapter.mirror(&previous, &current);
        adapter.settle().await;

        let rows = remote.rows(Table::Units);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(id.as_str()));
    }

    #[tokio::test]
    async fn reload_reads_every_table() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed(
            Table::Units,
            vec![json!({"id": "u_1", "name": "Unit 23", "type": "CHP", "subdivision": "", "status": "Busy"})],
        );
        remote.seed(
            Table::Calls,
            vec![json!({"id": "c_1", "title": "Robbery", "priority": "1", "assigned": ["u_1"]})],
        );
        let adapter = SyncAdapter::new(remote);

        let snapshot = adapter.reload().await.unwrap();

        assert_eq!(snapshot.units.len(), 1);
        assert_eq!(snapshot.calls[0].assigned.len(), 1);
        assert!(snapshot.groups.is_empty());
        assert!(snapshot.bolos.is_empty());
    }

    #[tokio::test]
    async fn undecodable_rows_abort_the_reload() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed(Table::Groups, vec![json!({"name": "no id"})]);

        let err = fetch_all(remote.as_ref()).await.unwrap_err();

        assert!(format!("{err:#}").contains("groups"));
    }
}
