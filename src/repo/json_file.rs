use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} does not hold a valid JSON array: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode records for {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One mutex per file; writes go to `<file>.tmp` and are renamed into place.
pub struct JsonFile<T> {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
    _records: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonFile<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            lock: self.lock.clone(),
            _records: PhantomData,
        }
    }
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Clone + Send,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Vec<T>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    pub async fn append(&self, record: T) -> Result<T, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;
        records.push(record.clone());
        self.write_all(&records).await?;
        Ok(record)
    }

    pub async fn update_where<P, U>(&self, predicate: P, mut update: U) -> Result<Vec<T>, StoreError>
    where
        P: Fn(&T) -> bool,
        U: FnMut(&mut T),
    {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;

        let mut updated = Vec::new();
        for record in records.iter_mut().filter(|r| predicate(&**r)) {
            update(record);
            updated.push(record.clone());
        }

        if !updated.is_empty() {
            self.write_all(&records).await?;
        }
        Ok(updated)
    }

    pub async fn update_last_where<P, U>(&self, predicate: P, update: U) -> Result<Option<T>, StoreError>
    where
        P: Fn(&T) -> bool,
        U: FnOnce(&mut T),
    {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;

        let Some(record) = records.iter_mut().rev().find(|r| predicate(&**r)) else {
            return Ok(None);
        };
        update(record);
        let updated = record.clone();

        self.write_all(&records).await?;
        Ok(Some(updated))
    }

    async fn read_all(&self) -> Result<Vec<T>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn write_all(&self, records: &[T]) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let encoded = serde_json::to_string_pretty(records).map_err(|source| StoreError::Encode {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, encoded).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u32,
        hits: u32,
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFile<Row> = JsonFile::new(dir.path().join("nope.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_creates_parent_dirs_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFile<Row> = JsonFile::new(dir.path().join("nested/data/rows.json"));
        store.append(Row { id: 1, hits: 0 }).await.unwrap();
        store.append(Row { id: 2, hits: 0 }).await.unwrap();

        let reopened: JsonFile<Row> = JsonFile::new(store.path().to_path_buf());
        assert_eq!(reopened.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_where_only_touches_matches() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFile<Row> = JsonFile::new(dir.path().join("rows.json"));
        for id in 1..=3 {
            store.append(Row { id, hits: 0 }).await.unwrap();
        }

        let updated = store.update_where(|r| r.id == 2, |r| r.hits += 1).await.unwrap();
        assert_eq!(updated, vec![Row { id: 2, hits: 1 }]);

        let all = store.load().await.unwrap();
        assert_eq!(all.iter().map(|r| r.hits).sum::<u32>(), 1);
    }

    #[tokio::test]
    async fn update_last_where_picks_newest_match() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFile<Row> = JsonFile::new(dir.path().join("rows.json"));
        for id in 1..=3 {
            store.append(Row { id, hits: 0 }).await.unwrap();
        }

        let updated = store.update_last_where(|r| r.id < 3, |r| r.hits = 9).await.unwrap();
        assert_eq!(updated, Some(Row { id: 2, hits: 9 }));
        assert_eq!(store.update_last_where(|r| r.id > 5, |r| r.hits = 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        std::fs::write(&path, "{not json").unwrap();
        let store: JsonFile<Row> = JsonFile::new(path);
        assert!(matches!(store.load().await, Err(StoreError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFile<Row> = JsonFile::new(dir.path().join("rows.json"));

        let mut handles = Vec::new();
        for id in 0..25 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.append(Row { id, hits: 0 }).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(store.load().await.unwrap().len(), 25);
    }
}
