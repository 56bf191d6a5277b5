//! The in-memory collection store and its on-disk snapshot.
//!
//! Memory is the source of truth. Every mutation rewrites the whole
//! snapshot: serialize to `<file>.tmp`, fsync, rename over `<file>`. A
//! crash at any point leaves either the old or the new snapshot in place,
//! never a truncated one.
//!
//! Snapshot layout:
//!
//! ```json
//! {
//!   "_counters": {"artifacts": 2, ...},
//!   "artifacts": {"1": {"id": "1", ...}, "2": {...}},
//!   ...
//! }
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use playhub_protocol::{Record, Response, StoreRequest, collections};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::StoreError;

type Collection = BTreeMap<String, Record>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(rename = "_counters", default)]
    counters: BTreeMap<String, u64>,
    #[serde(flatten)]
    collections: BTreeMap<String, Collection>,
}

/// A collection-oriented record store backed by one JSON file.
///
/// Not synchronized on its own; the server wraps it in a single lock so
/// every operation is serialized.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    data: Snapshot,
}

impl Store {
    /// Opens the store at `path`.
    ///
    /// A missing file gives an empty store. So does a file that cannot be
    /// read or decoded; that case is logged, never fatal. A leftover
    /// `<file>.tmp` from an interrupted save is ignored.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = load_snapshot(&path);
        let mut store = Self { path, data };
        for name in collections::REQUIRED {
            store.collection_mut(name);
        }
        tracing::info!(
            path = %store.path.display(),
            collections = store.data.collections.len(),
            "store opened"
        );
        store
    }

    /// The canonical snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the collection, creating it and seeding its counter if
    /// either is missing.
    fn collection_mut(&mut self, name: &str) -> &mut Collection {
        let col = self.data.collections.entry(name.to_string()).or_default();
        if !self.data.counters.contains_key(name) {
            let highest = col.keys().filter_map(|k| k.parse::<u64>().ok()).max();
            let seed = highest.unwrap_or(0).max(col.len() as u64);
            self.data.counters.insert(name.to_string(), seed);
        }
        col
    }

    fn next_id(&mut self, name: &str) -> String {
        self.collection_mut(name);
        let counter = self.data.counters.entry(name.to_string()).or_default();
        *counter += 1;
        counter.to_string()
    }

    /// Writes the snapshot atomically.
    pub fn save(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&self.data).map_err(StoreError::Snapshot)?;
        let tmp = tmp_path(&self.path);
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Inserts `record` under a fresh id and returns it with `id` set.
    ///
    /// Any `id` in the input is overwritten. If the snapshot cannot be
    /// written the record stays in memory and the error is returned.
    pub fn create(&mut self, collection: &str, mut record: Record) -> Result<Record, StoreError> {
        let id = self.next_id(collection);
        record.insert("id".into(), Value::String(id.clone()));
        self.collection_mut(collection).insert(id, record.clone());
        self.save()?;
        Ok(record)
    }

    pub fn read(&self, collection: &str, id: &str) -> Option<&Record> {
        self.data.collections.get(collection)?.get(id)
    }

    /// Shallow-merges `patch` into the record. `id` cannot be patched.
    pub fn update(
        &mut self,
        collection: &str,
        id: &str,
        patch: Record,
    ) -> Result<Option<Record>, StoreError> {
        let Some(record) = self.collection_mut(collection).get_mut(id) else {
            return Ok(None);
        };
        for (key, value) in patch {
            if key != "id" {
                record.insert(key, value);
            }
        }
        let updated = record.clone();
        self.save()?;
        Ok(Some(updated))
    }

    /// Removes the record. Returns whether it existed.
    pub fn delete(&mut self, collection: &str, id: &str) -> Result<bool, StoreError> {
        if self.collection_mut(collection).remove(id).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// All records in ascending id order.
    pub fn list(&self, collection: &str) -> Vec<Record> {
        self.matching(collection, |_| true)
    }

    /// Records whose fields equal every entry of `filter`.
    pub fn query(&self, collection: &str, filter: &Record) -> Vec<Record> {
        self.matching(collection, |rec| {
            filter.iter().all(|(k, v)| rec.get(k) == Some(v))
        })
    }

    fn matching(&self, collection: &str, keep: impl Fn(&Record) -> bool) -> Vec<Record> {
        let Some(col) = self.data.collections.get(collection) else {
            return Vec::new();
        };
        let mut out: Vec<(&String, &Record)> = col.iter().filter(|(_, r)| keep(r)).collect();
        out.sort_by_key(|(id, _)| id.parse::<u64>().unwrap_or(u64::MAX));
        out.into_iter().map(|(_, r)| r.clone()).collect()
    }

    /// Executes one request and builds its reply.
    pub fn apply(&mut self, request: StoreRequest) -> Response {
        let action = request.action();
        let outcome = match request {
            StoreRequest::Ping => Ok(Response::ok(Value::from("pong"))),
            StoreRequest::Create { collection, record } => self
                .create(&collection, record)
                .map(|r| Response::ok(Value::Object(r))),
            StoreRequest::Read { collection, id } => Ok(match self.read(&collection, &id) {
                Some(r) => Response::ok(Value::Object(r.clone())),
                None => not_found(),
            }),
            StoreRequest::Update {
                collection,
                id,
                patch,
            } => self.update(&collection, &id, patch).map(|r| match r {
                Some(r) => Response::ok(Value::Object(r)),
                None => not_found(),
            }),
            StoreRequest::Delete { collection, id } => self
                .delete(&collection, &id)
                .map(|existed| Response::ok(Value::Bool(existed))),
            StoreRequest::List { collection } => Ok(records(self.list(&collection))),
            StoreRequest::Query { collection, filter } => {
                Ok(records(self.query(&collection, &filter)))
            }
        };
        outcome.unwrap_or_else(|e| {
            tracing::error!(action, error = %e, "store operation failed");
            Response::error(500, format!("exception: {e}"))
        })
    }
}

fn not_found() -> Response {
    Response::error(404, "not found")
}

fn records(list: Vec<Record>) -> Response {
    Response::ok(Value::Array(list.into_iter().map(Value::Object).collect()))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn load_snapshot(path: &Path) -> Snapshot {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Snapshot::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read store file, starting empty");
            return Snapshot::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot decode store file, starting empty");
            Snapshot::default()
        }
    }
}
