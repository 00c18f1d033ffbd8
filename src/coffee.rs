use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Coffee not found: {0}")]
    NotFound(u64),

    #[error("Id {body} in body does not match id {path} in path")]
    IdMismatch { path: u64, body: u64 },

    #[error("Invalid coffee: {0}")]
    Invalid(String),

    #[error("No coffee ids left to assign")]
    IdsExhausted,

    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Coffee {
    pub id: u64,
    pub title: String,
    pub bean_type: String,
}

/// Client-submitted coffee body used by both create and update.
///
/// `Id` is ignored on create. On update it may be omitted, but when present
/// it has to match the id being updated.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CoffeeDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub title: String,
    pub bean_type: String,
}

impl CoffeeDraft {
    pub fn new(title: impl Into<String>, bean_type: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            bean_type: bean_type.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(StoreError::Invalid("Title must not be blank".to_string()));
        }
        Ok(())
    }

    fn into_coffee(self, id: u64) -> Coffee {
        Coffee {
            id,
            title: self.title,
            bean_type: self.bean_type,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    next_id: u64,
    coffees: Vec<Coffee>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    next_id: u64,
    coffees: Vec<&'a Coffee>,
}

struct Inner {
    next_id: u64,
    coffees: BTreeMap<u64, Coffee>,
}

impl Inner {
    fn empty() -> Self {
        Self {
            next_id: 1,
            coffees: BTreeMap::new(),
        }
    }
}

/// Coffee records keyed by server-assigned id.
///
/// Ids start at 1 and only ever grow, so a deleted id is never handed out
/// again. When opened with a snapshot path, every successful mutation
/// rewrites the snapshot and a failed write rolls the mutation back.
pub struct Store {
    inner: Mutex<Inner>,
    snapshot_path: Option<PathBuf>,
}

impl Default for Store {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Store {
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner::empty()),
            snapshot_path: None,
        }
    }

    /// Opens a store backed by the snapshot at `path`.
    ///
    /// A missing file yields an empty store; the file is created on the
    /// first mutation.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = if path.exists() {
            load_snapshot(&path)?
        } else {
            Inner::empty()
        };

        Ok(Self {
            inner: Mutex::new(inner),
            snapshot_path: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.lock().coffees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn create(&self, draft: CoffeeDraft) -> Result<Coffee> {
        draft.validate()?;

        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id = id.checked_add(1).ok_or(StoreError::IdsExhausted)?;

        let coffee = draft.into_coffee(id);
        inner.coffees.insert(id, coffee.clone());

        if let Err(e) = self.persist(&inner) {
            inner.coffees.remove(&id);
            return Err(e);
        }

        Ok(coffee)
    }

    pub fn get(&self, id: u64) -> Result<Coffee> {
        self.lock()
            .coffees
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// All coffees, ordered by id.
    pub fn list(&self) -> Vec<Coffee> {
        self.lock().coffees.values().cloned().collect()
    }

    pub fn update(&self, id: u64, draft: CoffeeDraft) -> Result<Coffee> {
        if let Some(body) = draft.id
            && body != id
        {
            return Err(StoreError::IdMismatch { path: id, body });
        }
        draft.validate()?;

        let mut inner = self.lock();
        let slot = inner.coffees.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let updated = draft.into_coffee(id);
        let previous = std::mem::replace(slot, updated.clone());

        if let Err(e) = self.persist(&inner) {
            inner.coffees.insert(id, previous);
            return Err(e);
        }

        Ok(updated)
    }

    pub fn delete(&self, id: u64) -> Result<Coffee> {
        let mut inner = self.lock();
        let removed = inner.coffees.remove(&id).ok_or(StoreError::NotFound(id))?;

        if let Err(e) = self.persist(&inner) {
            inner.coffees.insert(id, removed);
            return Err(e);
        }

        Ok(removed)
    }

    // Mutations are applied only after validation, so a poisoned lock
    // still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Called with the store lock held; the write is synchronous and small.
    fn persist(&self, inner: &Inner) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = SnapshotRef {
            next_id: inner.next_id,
            coffees: inner.coffees.values().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;

        tracing::debug!(path = %path.display(), coffees = inner.coffees.len(), "snapshot written");
        Ok(())
    }
}

fn load_snapshot(path: &Path) -> Result<Inner> {
    let bytes = fs::read(path)?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;

    let mut coffees = BTreeMap::new();
    for coffee in snapshot.coffees {
        let id = coffee.id;
        if id == 0 {
            return Err(StoreError::Invalid("snapshot contains coffee with id 0".to_string()));
        }
        if coffees.insert(id, coffee).is_some() {
            return Err(StoreError::Invalid(format!(
                "snapshot contains duplicate id {}",
                id
            )));
        }
    }

    // next_id must stay ahead of every stored id
    let after_last = match coffees.keys().next_back() {
        Some(last) => last.checked_add(1).ok_or_else(|| {
            StoreError::Invalid(format!("snapshot id {} leaves no room for new ids", last))
        })?,
        None => 1,
    };
    let next_id = snapshot.next_id.max(after_last);

    Ok(Inner { next_id, coffees })
}
