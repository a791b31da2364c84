use crate::repo::json_file::StoreError;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Clone)]
pub struct CatalogueRepo {
    pub path: PathBuf,
}

impl CatalogueRepo {
    pub async fn load(&self) -> Result<Value, StoreError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;

        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }
}
