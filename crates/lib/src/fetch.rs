//! Remote data sources.
//!
//! The store has no wire protocol of its own: it consumes and produces
//! plain JSON at this boundary. A [`Source`] resolves to a JSON payload;
//! [`HttpSource`] is the HTTP-backed implementation, and callers can
//! implement the trait over anything else. The load methods emit `loading`
//! when the fetch starts and `load` once the store has been repopulated; on
//! a fetch failure the store is untouched.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::Result;
use crate::events::Event;
use crate::record::Record;
use crate::store::DataSet;
use crate::value::{Id, Value};

/// Failures at the remote boundary.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be performed or decoded.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The response decoded, but not into the expected shape.
    #[error("unexpected response shape: {reason}")]
    Shape { reason: String },
}

impl FetchError {
    pub fn is_transport_error(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }

    pub fn is_status_error(&self) -> bool {
        matches!(self, FetchError::Status { .. })
    }

    pub fn is_shape_error(&self) -> bool {
        matches!(self, FetchError::Shape { .. })
    }
}

impl From<FetchError> for crate::Error {
    fn from(err: FetchError) -> Self {
        crate::Error::Fetch(err)
    }
}

/// A provider of JSON payloads for the load and remote-remove paths.
#[async_trait]
pub trait Source: Send + Sync {
    async fn fetch(
        &self,
        params: &[(String, String)],
    ) -> std::result::Result<serde_json::Value, FetchError>;
}

/// HTTP-backed [`Source`]: GET with query parameters for loads, POST for
/// remote deletes.
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    post: bool,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn get(url: impl Into<String>) -> Self {
        HttpSource {
            url: url.into(),
            post: false,
            client: reqwest::Client::new(),
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        HttpSource {
            url: url.into(),
            post: true,
            client: reqwest::Client::new(),
        }
    }

    /// Reuses an existing client instead of building a fresh one.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Source for HttpSource {
    async fn fetch(
        &self,
        params: &[(String, String)],
    ) -> std::result::Result<serde_json::Value, FetchError> {
        let request = if self.post {
            self.client.post(&self.url).form(params)
        } else {
            self.client.get(&self.url).query(params)
        };
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

impl DataSet {
    /// Fetches a flat record list and replaces the store contents with it.
    /// Emits `loading` before the fetch and `load` after the replace; the
    /// intermediate clear-and-add runs muted.
    pub async fn load<S>(&mut self, source: &S, params: &[(String, String)]) -> Result<Vec<Id>>
    where
        S: Source + ?Sized,
    {
        self.emit(Event::Loading, None);
        let raw = source.fetch(params).await.map_err(crate::Error::from)?;
        let records = parse_records(raw)?;
        debug!(count = records.len(), "loaded records");
        self.replace_with(records)
    }

    /// Like [`load`](DataSet::load), with a hook that reshapes the raw
    /// response into a record array before ingestion.
    pub async fn load_with<S, F>(
        &mut self,
        source: &S,
        params: &[(String, String)],
        prepare: F,
    ) -> Result<Vec<Id>>
    where
        S: Source + ?Sized,
        F: FnOnce(serde_json::Value) -> serde_json::Value,
    {
        self.emit(Event::Loading, None);
        let raw = source.fetch(params).await.map_err(crate::Error::from)?;
        let records = parse_records(prepare(raw))?;
        debug!(count = records.len(), "loaded records");
        self.replace_with(records)
    }

    /// The synchronous counterpart of [`load`](DataSet::load): replaces the
    /// store contents with already-parsed records, emitting the same
    /// `loading`/`load` pair.
    pub fn load_data(&mut self, records: Vec<Record>) -> Result<Vec<Id>> {
        self.emit(Event::Loading, None);
        self.replace_with(records)
    }

    /// Fetches a hierarchical payload (nested children or flat with parent
    /// pointers) and replaces the store with its pre-order layout. With
    /// `reorder` set, sibling orders are renumbered 1..n.
    pub async fn load_tree<S>(
        &mut self,
        source: &S,
        params: &[(String, String)],
        reorder: bool,
    ) -> Result<Vec<Id>>
    where
        S: Source + ?Sized,
    {
        self.emit(Event::Loading, None);
        let raw = source.fetch(params).await.map_err(crate::Error::from)?;
        let records = parse_records(raw)?;
        debug!(count = records.len(), "loaded tree records");
        self.replace_tree(records, reorder)
    }

    /// [`load_tree`](DataSet::load_tree) with a response-reshaping hook.
    pub async fn load_tree_with<S, F>(
        &mut self,
        source: &S,
        params: &[(String, String)],
        reorder: bool,
        prepare: F,
    ) -> Result<Vec<Id>>
    where
        S: Source + ?Sized,
        F: FnOnce(serde_json::Value) -> serde_json::Value,
    {
        self.emit(Event::Loading, None);
        let raw = source.fetch(params).await.map_err(crate::Error::from)?;
        let records = parse_records(prepare(raw))?;
        debug!(count = records.len(), "loaded tree records");
        self.replace_tree(records, reorder)
    }

    /// The synchronous counterpart of [`load_tree`](DataSet::load_tree).
    pub fn load_tree_data(&mut self, records: Vec<Record>, reorder: bool) -> Result<Vec<Id>> {
        self.emit(Event::Loading, None);
        self.replace_tree(records, reorder)
    }

    /// Asks a remote endpoint which records to delete, then applies the
    /// (idempotent) local removal. The response must be an object whose
    /// `data` member lists ids or records.
    pub async fn remove_remote<S>(&mut self, source: &S) -> Result<Vec<Id>>
    where
        S: Source + ?Sized,
    {
        let raw = source.fetch(&[]).await.map_err(crate::Error::from)?;
        let data = raw
            .get("data")
            .cloned()
            .ok_or(FetchError::Shape {
                reason: "missing \"data\" member".to_string(),
            })
            .map_err(crate::Error::from)?;
        let ids = self.parse_id_list(data)?;
        Ok(self.remove(&ids))
    }

    fn replace_with(&mut self, records: Vec<Record>) -> Result<Vec<Id>> {
        let was_muted = self.bus.is_muted();
        self.bus.mute(true);
        self.wipe();
        let result = self.add(records);
        self.bus.mute(was_muted);
        let ids = result?;
        self.emit(Event::Load, None);
        Ok(ids)
    }

    fn replace_tree(&mut self, records: Vec<Record>, reorder: bool) -> Result<Vec<Id>> {
        let was_muted = self.bus.is_muted();
        self.bus.mute(true);
        // ingest flat first so the hierarchy can be renormalized in one go,
        // whichever shape the payload came in
        let tree_mode = self.options.tree;
        self.options.tree = false;
        self.wipe();
        let staged = self.add(records).and_then(|_| self.to_preorder(reorder));
        self.options.tree = tree_mode;
        let result = staged.and_then(|preorder| {
            self.wipe();
            self.add(preorder)
        });
        self.bus.mute(was_muted);
        let ids = result?;
        self.emit(Event::Load, None);
        Ok(ids)
    }

    fn parse_id_list(&self, data: serde_json::Value) -> Result<Vec<Id>> {
        let id_field = &self.options.id_field;
        let items = match data {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        };
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let value = Value::from_json(item);
            let id = match &value {
                Value::Map(record) => record.id(id_field),
                scalar => Id::from_value(scalar),
            };
            match id {
                Some(id) => ids.push(id),
                None => {
                    return Err(FetchError::Shape {
                        reason: format!("entry of type {} is not an id or record", value.type_name()),
                    }
                    .into());
                }
            }
        }
        Ok(ids)
    }
}

fn parse_records(raw: serde_json::Value) -> Result<Vec<Record>> {
    match raw {
        serde_json::Value::Array(items) => items.into_iter().map(Record::from_json).collect(),
        other => Err(FetchError::Shape {
            reason: format!(
                "expected a JSON array of records, found {}",
                Value::from_json(other).type_name()
            ),
        }
        .into()),
    }
}
