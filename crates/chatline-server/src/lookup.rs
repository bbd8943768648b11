use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use chatline_engine::{EngineError, NameLookup};
use chatline_shared::NameKind;

use crate::error::ServerError;

/// Static contact/group directory loaded from a JSON file:
///
/// ```json
/// { "contacts": { "15551234567@s.whatsapp.net": "Alice" },
///   "groups":   { "120363012345678901@g.us": "Family" } }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryLookup {
    contacts: HashMap<String, String>,
    groups: HashMap<String, String>,
}

impl DirectoryLookup {
    pub async fn load(path: &Path) -> Result<Self, ServerError> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|source| ServerError::ContactsRead {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_slice(&raw).map_err(|source| ServerError::ContactsParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.contacts.len() + self.groups.len()
    }
}

#[async_trait]
impl NameLookup for DirectoryLookup {
    async fn lookup(&self, id: &str, kind: NameKind) -> Result<Option<String>, EngineError> {
        let table = match kind {
            NameKind::Contact => &self.contacts,
            NameKind::Group => &self.groups,
        };
        Ok(table.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_and_lookup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"contacts":{{"u1@s.whatsapp.net":"Alice"}},"groups":{{"g1@g.us":"Family"}}}}"#
        )
        .unwrap();

        let dir = DirectoryLookup::load(file.path()).await.unwrap();
        assert_eq!(dir.len(), 2);
        assert_eq!(
            dir.lookup("u1@s.whatsapp.net", NameKind::Contact).await.unwrap().as_deref(),
            Some("Alice")
        );
        assert_eq!(dir.lookup("g1@g.us", NameKind::Group).await.unwrap().as_deref(), Some("Family"));
        assert_eq!(dir.lookup("g1@g.us", NameKind::Contact).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partial_and_invalid_files() {
        let mut partial = tempfile::NamedTempFile::new().unwrap();
        write!(partial, r#"{{"groups":{{}}}}"#).unwrap();
        assert_eq!(DirectoryLookup::load(partial.path()).await.unwrap().len(), 0);

        let mut broken = tempfile::NamedTempFile::new().unwrap();
        write!(broken, "not json").unwrap();
        assert!(matches!(
            DirectoryLookup::load(broken.path()).await,
            Err(ServerError::ContactsParse { .. })
        ));
    }
}
