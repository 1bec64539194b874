//! In-memory record store.
//!
//! An ordered collection behind an async `RwLock`. Readers run concurrently;
//! `insert_with` holds the write lock while it picks the next id, so
//! concurrent creates never share an id.

use tokio::sync::RwLock;

/// A record with an integer identity.
pub trait Record: Clone + Send + Sync {
    fn id(&self) -> i64;
}

#[derive(Debug, Default)]
pub struct Store<T> {
    records: RwLock<Vec<T>>,
}

impl<T: Record> Store<T> {
    pub fn new(seed: Vec<T>) -> Self {
        Self {
            records: RwLock::new(seed),
        }
    }

    pub async fn list(&self) -> Vec<T> {
        self.records.read().await.clone()
    }

    pub async fn get(&self, id: i64) -> Option<T> {
        self.records.read().await.iter().find(|r| r.id() == id).cloned()
    }

    /// Records matching `predicate`, in insertion order.
    pub async fn filter<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    /// Build a record with id `len + 1` and append it.
    pub async fn insert_with<F>(&self, build: F) -> T
    where
        F: FnOnce(i64) -> T,
    {
        let mut records = self.records.write().await;
        let record = build(records.len() as i64 + 1);
        records.push(record.clone());
        record
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
