use crate::{CacheError, PartitionStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Logical role of a cache partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionRole {
    /// App shell: home document, offline page, manifest
    Static,
    /// API responses
    Api,
    Images,
    Fonts,
}

impl PartitionRole {
    pub const ALL: [PartitionRole; 4] = [
        PartitionRole::Static,
        PartitionRole::Api,
        PartitionRole::Images,
        PartitionRole::Fonts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionRole::Static => "static",
            PartitionRole::Api => "api",
            PartitionRole::Images => "images",
            PartitionRole::Fonts => "fonts",
        }
    }
}

impl fmt::Display for PartitionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of partition names that are current for one deployed version.
///
/// Names are `"{prefix}-{role}-v{version}"`; any other name found in the
/// store belongs to an older deploy (or to nobody) and is swept on
/// activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRegistry {
    prefix: String,
    version: u32,
}

impl PartitionRegistry {
    pub fn new(prefix: impl Into<String>, version: u32) -> Self {
        Self {
            prefix: prefix.into(),
            version,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Current partition name for a role.
    pub fn name(&self, role: PartitionRole) -> String {
        format!("{}-{}-v{}", self.prefix, role, self.version)
    }

    pub fn current_names(&self) -> Vec<String> {
        PartitionRole::ALL.iter().map(|r| self.name(*r)).collect()
    }

    pub fn is_current(&self, name: &str) -> bool {
        PartitionRole::ALL.iter().any(|r| self.name(*r) == name)
    }

    /// Role of a partition name of this prefix, regardless of version.
    pub fn role_of(&self, name: &str) -> Option<PartitionRole> {
        let rest = name.strip_prefix(&self.prefix)?.strip_prefix('-')?;
        let (role, version) = rest.rsplit_once("-v")?;
        version.parse::<u32>().ok()?;
        PartitionRole::ALL.into_iter().find(|r| r.as_str() == role)
    }

    /// Delete every partition not in the current set. Returns deleted names.
    pub async fn sweep_stale(
        &self,
        store: &dyn PartitionStore,
    ) -> Result<Vec<String>, CacheError> {
        let mut deleted = Vec::new();
        for name in store.partitions().await? {
            if self.is_current(&name) {
                continue;
            }
            if store.delete(&name).await? {
                match self.role_of(&name) {
                    Some(role) => info!(partition = %name, %role, "deleted stale cache partition"),
                    None => info!(partition = %name, "deleted foreign cache partition"),
                }
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryPartitionStore;

    #[test]
    fn test_names_are_versioned() {
        let registry = PartitionRegistry::new("carfix", 3);
        assert_eq!(registry.name(PartitionRole::Api), "carfix-api-v3");
        assert_eq!(
            registry.current_names(),
            vec![
                "carfix-static-v3",
                "carfix-api-v3",
                "carfix-images-v3",
                "carfix-fonts-v3"
            ]
        );
    }

    #[test]
    fn test_role_of() {
        let registry = PartitionRegistry::new("carfix", 3);
        assert_eq!(registry.role_of("carfix-api-v2"), Some(PartitionRole::Api));
        assert_eq!(
            registry.role_of("carfix-images-v3"),
            Some(PartitionRole::Images)
        );
        assert_eq!(registry.role_of("carfix-api-vX"), None);
        assert_eq!(registry.role_of("other-api-v3"), None);
        assert_eq!(registry.role_of("carfix-videos-v3"), None);
    }

    #[tokio::test]
    async fn test_sweep_keeps_current_names_only() {
        let registry = PartitionRegistry::new("carfix", 3);
        let store = InMemoryPartitionStore::new();
        for name in [
            "carfix-static-v3",
            "carfix-api-v3",
            "carfix-images-v3",
            "carfix-api-v2",
        ] {
            store.open(name).await.unwrap();
        }

        let deleted = registry.sweep_stale(&store).await.unwrap();

        assert_eq!(deleted, vec!["carfix-api-v2"]);
        assert_eq!(
            store.partitions().await.unwrap(),
            vec!["carfix-static-v3", "carfix-api-v3", "carfix-images-v3"]
        );
    }

    #[tokio::test]
    async fn test_sweep_deletes_foreign_partitions_too() {
        let registry = PartitionRegistry::new("carfix", 3);
        let store = InMemoryPartitionStore::new();
        for name in ["legacy-cache", "carfix-fonts-v1", "carfix-fonts-v3"] {
            store.open(name).await.unwrap();
        }

        let deleted = registry.sweep_stale(&store).await.unwrap();

        assert_eq!(deleted, vec!["legacy-cache", "carfix-fonts-v1"]);
        assert_eq!(registry.role_of("carfix-fonts-v1"), Some(PartitionRole::Fonts));
        assert_eq!(registry.role_of("legacy-cache"), None);
        assert_eq!(store.partitions().await.unwrap(), vec!["carfix-fonts-v3"]);
    }
}
