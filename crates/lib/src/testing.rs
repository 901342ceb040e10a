use std::{
    collections::HashMap,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{ChangeEvent, ChangeKind, RemoteStore, Table};

/// Remote store kept in memory, notifying subscribers on every write.
#[derive(Default)]
pub struct MemoryRemote {
    tables: Mutex<HashMap<Table, Vec<Value>>>,
    subscribers: Mutex<Vec<mpsc::Sender<ChangeEvent>>>,
    fail_writes: AtomicBool,
}

fn row_id(row: &Value) -> &str {
    row.get("id").and_then(Value::as_str).unwrap_or_default()
}

// Timestamps compare as instants; their text has a variable number of
// fractional digits.
fn compare_field(a: &Value, b: &Value, field: &str) -> std::cmp::Ordering {
    let a = a.get(field).and_then(Value::as_str).unwrap_or_default();
    let b = b.get(field).and_then(Value::as_str).unwrap_or_default();
    match (a.parse::<DateTime<Utc>>(), b.parse::<DateTime<Utc>>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        MemoryRemote::default()
    }

    /// Replaces a table's rows without notifying anyone.
    pub fn seed(&self, table: Table, rows: Vec<Value>) {
        self.lock().insert(table, rows);
    }

    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.lock().get(&table).cloned().unwrap_or_default()
    }

    pub fn subscribe(&self) -> mpsc::Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel(64);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Table, Vec<Value>>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, table: Table, kind: ChangeKind, f: impl FnOnce(&mut Vec<Value>)) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("remote unavailable");
        }
        f(self.lock().entry(table).or_default());
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| !matches!(tx.try_send(ChangeEvent { table, kind }), Err(TrySendError::Closed(_))));
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn select_all(&self, table: Table) -> anyhow::Result<Vec<Value>> {
        let mut rows = self.rows(table);
        let (field, direction) = table.ordering().split_once('.').unwrap_or((table.ordering(), "asc"));
        rows.sort_by(|a, b| compare_field(a, b, field));
        if direction == "desc" {
            rows.reverse();
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Value) -> anyhow::Result<()> {
        self.write(table, ChangeKind::Insert, |rows| rows.push(row))
    }

    async fn update(&self, table: Table, id: &str, patch: Value) -> anyhow::Result<()> {
        self.write(table, ChangeKind::Update, |rows| {
            let target = rows.iter_mut().find(|row| row_id(row) == id);
            if let (Some(Value::Object(row)), Value::Object(patch)) = (target, patch) {
                row.extend(patch);
            }
        })
    }

    async fn delete(&self, table: Table, id: &str) -> anyhow::Result<()> {
        self.write(table, ChangeKind::Delete, |rows| rows.retain(|row| row_id(row) != id))
    }
}
