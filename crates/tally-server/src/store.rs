use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("store unavailable")]
    Unavailable,
}

/// Keyed storage for server records
pub trait Store<V>: Send + Sync {
    /// Insert a new record, failing if the id is taken
    fn create(&self, id: &str, value: V) -> Result<(), StoreError>;
    fn get(&self, id: &str) -> Result<V, StoreError>;
    /// Replace an existing record
    fn put(&self, id: &str, value: V) -> Result<(), StoreError>;
    fn delete(&self, id: &str) -> Result<V, StoreError>;
    /// Every record, in no particular order
    fn list(&self) -> Result<Vec<V>, StoreError>;
}

/// Generate an id such as `thread_1a2b3c4d`
pub fn new_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &hex[..8])
}

/// In-process store. Records live as long as the server.
pub struct MemoryStore<V> {
    kind: &'static str,
    records: RwLock<HashMap<String, V>>,
}

impl<V> MemoryStore<V> {
    /// `kind` names the record type in not-found messages, e.g. "Thread"
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            records: RwLock::new(HashMap::new()),
        }
    }

    fn not_found(&self, id: &str) -> StoreError {
        StoreError::NotFound(format!("{} {} not found", self.kind, id))
    }
}

impl<V: Clone + Send + Sync> Store<V> for MemoryStore<V> {
    fn create(&self, id: &str, value: V) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Unavailable)?;
        if records.contains_key(id) {
            return Err(StoreError::AlreadyExists(format!("{} {}", self.kind, id)));
        }
        records.insert(id.to_string(), value);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<V, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Unavailable)?;
        records.get(id).cloned().ok_or_else(|| self.not_found(id))
    }

    fn put(&self, id: &str, value: V) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Unavailable)?;
        match records.get_mut(id) {
            Some(record) => {
                *record = value;
                Ok(())
            }
            None => Err(self.not_found(id)),
        }
    }

    fn delete(&self, id: &str) -> Result<V, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Unavailable)?;
        records.remove(id).ok_or_else(|| self.not_found(id))
    }

    fn list(&self) -> Result<Vec<V>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Unavailable)?;
        Ok(records.values().cloned().collect())
    }
}
