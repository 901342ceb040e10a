use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use anyhow::{Context, bail};
use async_trait::async_trait;
use log::{debug, error, trace};
use reqwest::{
    ClientBuilder, Method, RequestBuilder, Response, Url,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;
use strum::{Display, EnumString};
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};

use crate::RemoteConfig;

/// The hosted tables mirroring the board's collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Table {
    Units,
    Groups,
    Calls,
    Bolos,
}

impl Table {
    pub const ALL: [Table; 4] = [Table::Units, Table::Groups, Table::Calls, Table::Bolos];

    /// Ordering applied when the whole table is selected. Ids sort by
    /// creation time, so this matches the local order of each collection.
    pub fn ordering(self) -> &'static str {
        match self {
            Table::Units | Table::Groups => "id.asc",
            Table::Calls => "id.desc",
            Table::Bolos => "createdAt.desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    #[strum(serialize = "*")]
    Any,
}

/// "Something changed in this table". Consumers reload rather than trust
/// any payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
}

/// A row-level change to replay on the remote store.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteWrite {
    Insert { table: Table, row: Value },
    Update { table: Table, id: String, patch: Value },
    Delete { table: Table, id: String },
}

impl fmt::Display for RemoteWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteWrite::Insert { table, row } => {
                let id = row.get("id").and_then(Value::as_str).unwrap_or("?");
                write!(f, "insert {table}/{id}")
            }
            RemoteWrite::Update { table, id, .. } => write!(f, "update {table}/{id}"),
            RemoteWrite::Delete { table, id } => write!(f, "delete {table}/{id}"),
        }
    }
}

/// Table-level access to the hosted store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select_all(&self, table: Table) -> anyhow::Result<Vec<Value>>;

    async fn insert(&self, table: Table, row: Value) -> anyhow::Result<()>;

    async fn update(&self, table: Table, id: &str, patch: Value) -> anyhow::Result<()>;

    async fn delete(&self, table: Table, id: &str) -> anyhow::Result<()>;
}

pub async fn apply_write(remote: &dyn RemoteStore, write: RemoteWrite) -> anyhow::Result<()> {
    match write {
        RemoteWrite::Insert { table, row } => remote.insert(table, row).await,
        RemoteWrite::Update { table, id, patch } => remote.update(table, &id, patch).await,
        RemoteWrite::Delete { table, id } => remote.delete(table, &id).await,
    }
}

/// Client for a PostgREST-style backend (`<url>/rest/v1/<table>`).
pub struct RestStore {
    client: reqwest::Client,
    headers: HeaderMap,
    rest_root: Url,
}

impl RestStore {
    pub fn new(cb: ClientBuilder, config: &RemoteConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key).context("API key is not a valid header")?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .context("API key is not a valid header")?;
        headers.append(HeaderName::from_static("apikey"), key);
        headers.append(AUTHORIZATION, bearer);
        headers.append(ACCEPT, HeaderValue::from_static("application/json"));

        let client = cb
            .timeout(config.timeout)
            .build()
            .context("Building HTTP client")?;

        Ok(RestStore {
            client,
            headers,
            rest_root: config
                .url
                .join("rest/v1/")
                .context("Deriving REST endpoint")?,
        })
    }

    fn endpoint(&self, table: Table) -> anyhow::Result<Url> {
        self.rest_root
            .join(&table.to_string())
            .with_context(|| format!("Building endpoint for {table}"))
    }

    fn request(&self, method: Method, table: Table) -> anyhow::Result<RequestBuilder> {
        Ok(self
            .client
            .request(method, self.endpoint(table)?)
            .headers(self.headers.clone()))
    }

    fn select_request(&self, table: Table) -> anyhow::Result<RequestBuilder> {
        Ok(self
            .request(Method::GET, table)?
            .query(&[("select", "*"), ("order", table.ordering())]))
    }

    fn insert_request(&self, table: Table, row: &Value) -> anyhow::Result<RequestBuilder> {
        Ok(self
            .request(Method::POST, table)?
            .header(PREFER, RETURN_MINIMAL)
            .json(&[row]))
    }

    fn update_request(&self, table: Table, id: &str, patch: &Value) -> anyhow::Result<RequestBuilder> {
        Ok(self
            .request(Method::PATCH, table)?
            .query(&[("id", format!("eq.{id}"))])
            .header(PREFER, RETURN_MINIMAL)
            .json(patch))
    }

    fn delete_request(&self, table: Table, id: &str) -> anyhow::Result<RequestBuilder> {
        Ok(self
            .request(Method::DELETE, table)?
            .query(&[("id", format!("eq.{id}"))])
            .header(PREFER, RETURN_MINIMAL))
    }

    fn trace_send_request(
        request: RequestBuilder,
    ) -> impl Future<Output = Result<Response, reqwest::Error>> {
        trace!("Sending request: {:?}", &request);
        request.send()
    }

    async fn trace_body_and_error_for_response(
        operation: &str,
        resp: Response,
    ) -> anyhow::Result<String> {
        let status = resp.status();
        debug!("{} status code: {}", operation, status);
        let body = resp.text().await.context("Reading response body")?;
        trace!("{} response body: {}", operation, body);

        if !status.is_success() {
            bail!("{} failed with {}: {}", operation, status, body);
        }
        Ok(body)
    }
}

const PREFER: &str = "Prefer";
const RETURN_MINIMAL: &str = "return=minimal";

#[async_trait]
impl RemoteStore for RestStore {
    async fn select_all(&self, table: Table) -> anyhow::Result<Vec<Value>> {
        let operation = format!("select {table}");
        let resp = Self::trace_send_request(self.select_request(table)?)
            .await
            .with_context(|| format!("GET request for {operation}"))?;

        let body = Self::trace_body_and_error_for_response(&operation, resp).await?;
        serde_json::from_str(&body).context("Parsing response body")
    }

    async fn insert(&self, table: Table, row: Value) -> anyhow::Result<()> {
        let operation = format!("insert {table}");
        let resp = Self::trace_send_request(self.insert_request(table, &row)?)
            .await
            .with_context(|| format!("POST request for {operation}"))?;

        Self::trace_body_and_error_for_response(&operation, resp).await?;
        Ok(())
    }

    async fn update(&self, table: Table, id: &str, patch: Value) -> anyhow::Result<()> {
        let operation = format!("update {table}/{id}");
        let resp = Self::trace_send_request(self.update_request(table, id, &patch)?)
            .await
            .with_context(|| format!("PATCH request for {operation}"))?;

        Self::trace_body_and_error_for_response(&operation, resp).await?;
        Ok(())
    }

    async fn delete(&self, table: Table, id: &str) -> anyhow::Result<()> {
        let operation = format!("delete {table}/{id}");
        let resp = Self::trace_send_request(self.delete_request(table, id)?)
            .await
            .with_context(|| format!("DELETE request for {operation}"))?;

        Self::trace_body_and_error_for_response(&operation, resp).await?;
        Ok(())
    }
}

/// Change feed built by polling: every `period`, each table is selected and
/// compared with the previous poll, emitting a [`ChangeKind::Any`] event for
/// every table that differs. The first poll only records the baseline.
///
/// The task stops once the returned receiver is dropped.
pub fn poll_changes(
    remote: Arc<dyn RemoteStore>,
    period: Duration,
) -> (mpsc::Receiver<ChangeEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(Table::ALL.len() * 4);

    let handle = tokio::spawn(async move {
        let mut last_seen: HashMap<Table, Vec<Value>> = HashMap::new();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                return;
            }

            for table in Table::ALL {
                let rows = match remote.select_all(table).await {
                    Ok(rows) => rows,
                    Err(err) => {
                        error!("Polling {} failed: {:#}", table, err);
                        continue;
                    }
                };

                let changed = last_seen
                    .get(&table)
                    .is_some_and(|previous| *previous != rows);
                last_seen.insert(table, rows);

                if changed {
                    debug!("Detected change on {}", table);
                    let event = ChangeEvent {
                        table,
                        kind: ChangeKind::Any,
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    (rx, handle)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;
    use crate::testing::MemoryRemote;

    #[test]
    fn table_names_and_orderings() {
        assert_eq!(Table::Bolos.to_string(), "bolos");
        assert_eq!(Table::from_str("units").unwrap(), Table::Units);
        assert_eq!(Table::Units.ordering(), "id.asc");
        assert_eq!(Table::Calls.ordering(), "id.desc");
        assert_eq!(Table::Bolos.ordering(), "createdAt.desc");
        assert_eq!(ChangeKind::Any.to_string(), "*");
    }

    fn rest_store() -> RestStore {
        let config = RemoteConfig {
            url: Url::parse("https://cad.example.com").unwrap(),
            api_key: "anon".to_string(),
            timeout: Duration::from_secs(5),
        };
        RestStore::new(ClientBuilder::new(), &config).unwrap()
    }

    fn body_json(request: &reqwest::Request) -> Value {
        let body = request.body().and_then(|body| body.as_bytes()).unwrap();
        serde_json::from_slice(body).unwrap()
    }

    #[test]
    fn rest_endpoints_hang_off_the_project_url() {
        assert_eq!(
            rest_store().endpoint(Table::Calls).unwrap().as_str(),
            "https://cad.example.com/rest/v1/calls"
        );
    }

    #[test]
    fn requests_carry_credentials() {
        let request = rest_store().select_request(Table::Units).unwrap().build().unwrap();

        assert_eq!(request.headers()["apikey"], "anon");
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer anon");
        assert_eq!(request.headers()[ACCEPT], "application/json");
    }

    #[test]
    fn selects_order_each_table() {
        let store = rest_store();
        let calls = store.select_request(Table::Calls).unwrap().build().unwrap();
        let bolos = store.select_request(Table::Bolos).unwrap().build().unwrap();

        assert_eq!(calls.method(), &Method::GET);
        assert_eq!(calls.url().path(), "/rest/v1/calls");
        assert_eq!(calls.url().query(), Some("select=*&order=id.desc"));
        assert_eq!(bolos.url().query(), Some("select=*&order=createdAt.desc"));
    }

    #[test]
    fn inserts_post_a_single_row_array() {
        let row = json!({"id": "u_1", "name": "Unit 23"});
        let request = rest_store()
            .insert_request(Table::Units, &row)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.url().query(), None);
        assert_eq!(request.headers()["Prefer"], "return=minimal");
        assert_eq!(body_json(&request), json!([row]));
    }

    #[test]
    fn updates_and_deletes_filter_by_id() {
        let store = rest_store();
        let patch = json!({"status": "Busy"});
        let update = store
            .update_request(Table::Units, "u_1", &patch)
            .unwrap()
            .build()
            .unwrap();
        let delete = store.delete_request(Table::Calls, "c_9").unwrap().build().unwrap();

        assert_eq!(update.method(), &Method::PATCH);
        assert_eq!(update.url().query(), Some("id=eq.u_1"));
        assert_eq!(update.headers()["Prefer"], "return=minimal");
        assert_eq!(body_json(&update), patch);

        assert_eq!(delete.method(), &Method::DELETE);
        assert_eq!(delete.url().path(), "/rest/v1/calls");
        assert_eq!(delete.url().query(), Some("id=eq.c_9"));
        assert!(delete.body().is_none());
    }

    #[test]
    fn writes_describe_their_target() {
        let insert = RemoteWrite::Insert {
            table: Table::Units,
            row: json!({"id": "u_1", "name": "Unit 23"}),
        };
        let delete = RemoteWrite::Delete {
            table: Table::Calls,
            id: "c_1".to_string(),
        };
        assert_eq!(insert.to_string(), "insert units/u_1");
        assert_eq!(delete.to_string(), "delete calls/c_1");
    }

    #[tokio::test]
    async fn polling_reports_changed_tables() {
        let remote = Arc::new(MemoryRemote::new());
        let (mut events, handle) = poll_changes(remote.clone(), Duration::from_millis(10));

        // Let the baseline poll happen before changing anything.
        tokio::time::sleep(Duration::from_millis(50)).await;
        remote
            .insert(Table::Groups, json!({"id": "g_1", "name": "Alpha", "unitIds": []}))
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ChangeEvent {
                table: Table::Groups,
                kind: ChangeKind::Any
            }
        );

        drop(events);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
