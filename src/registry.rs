//! # Client Registry
//!
//! One table-admin handle and one data handle per configured instance, plus a
//! project-wide instance-admin handle. Built once at startup and shared
//! read-only afterwards. Construction is all-or-nothing: if any handle cannot
//! be built the registry is not returned and the process must not serve.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

use crate::bigtable::{BigtableConnector, BigtableError, DataClient, InstanceAdmin, TableAdmin};
use crate::errors::{LookupError, LookupResult};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("project id must not be empty")]
    MissingProject,

    #[error("at least one instance id is required")]
    NoInstances,

    #[error("instance id must not be empty")]
    BlankInstance,

    #[error("instance '{0}' is configured more than once")]
    DuplicateInstance(String),

    #[error("failed to create {kind} client for instance '{instance}': {source}")]
    Connect {
        kind: &'static str,
        instance: String,
        #[source]
        source: BigtableError,
    },
}

/// Handles bound to one instance
#[derive(Clone)]
pub struct InstanceClients {
    pub admin: Arc<dyn TableAdmin>,
    pub data: Arc<dyn DataClient>,
}

/// Immutable map of instance id to client handles
pub struct ClientRegistry {
    project_id: String,
    instances: BTreeMap<String, InstanceClients>,
    instance_admin: Arc<dyn InstanceAdmin>,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("project_id", &self.project_id)
            .field("instances", &self.instances.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ClientRegistry {
    /// Build handles for every instance in `instance_ids`
    pub fn build(
        connector: &dyn BigtableConnector,
        project_id: &str,
        instance_ids: &[String],
    ) -> Result<Self, RegistryError> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(RegistryError::MissingProject);
        }
        if instance_ids.is_empty() {
            return Err(RegistryError::NoInstances);
        }

        let mut seen = HashSet::new();
        let mut instances = BTreeMap::new();
        for raw in instance_ids {
            let instance_id = raw.trim();
            if instance_id.is_empty() {
                return Err(RegistryError::BlankInstance);
            }
            if !seen.insert(instance_id.to_string()) {
                return Err(RegistryError::DuplicateInstance(instance_id.to_string()));
            }

            tracing::info!(
                project_id = %project_id,
                instance_id = %instance_id,
                connector = connector.name(),
                "connecting to bigtable instance"
            );
            let admin = connector
                .table_admin(project_id, instance_id)
                .map_err(|source| RegistryError::Connect {
                    kind: "table admin",
                    instance: instance_id.to_string(),
                    source,
                })?;
            let data = connector
                .data_client(project_id, instance_id)
                .map_err(|source| RegistryError::Connect {
                    kind: "data",
                    instance: instance_id.to_string(),
                    source,
                })?;
            instances.insert(instance_id.to_string(), InstanceClients { admin, data });
        }

        let instance_admin =
            connector
                .instance_admin(project_id)
                .map_err(|source| RegistryError::Connect {
                    kind: "instance admin",
                    instance: String::new(),
                    source,
                })?;

        tracing::info!(
            project_id = %project_id,
            instances = instances.len(),
            "client registry ready"
        );

        Ok(Self {
            project_id: project_id.to_string(),
            instances,
            instance_admin,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Handles for `instance_id`, or `InstanceNotFound`
    pub fn instance(&self, instance_id: &str) -> LookupResult<&InstanceClients> {
        self.instances
            .get(instance_id)
            .ok_or_else(|| LookupError::InstanceNotFound(instance_id.to_string()))
    }

    pub fn instance_ids(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    pub fn instance_admin(&self) -> &Arc<dyn InstanceAdmin> {
        &self.instance_admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigtable::{BigtableResult, MemoryConnector};

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_and_lookup() {
        let registry =
            ClientRegistry::build(&MemoryConnector::new(), "proj", &ids(&["a", " b "])).unwrap();

        assert_eq!(registry.project_id(), "proj");
        assert_eq!(registry.instance_ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(registry.instance("b").unwrap().admin.instance_id(), "b");
        assert_eq!(registry.instance("a").unwrap().data.instance_id(), "a");
        assert!(matches!(
            registry.instance("zzz"),
            Err(LookupError::InstanceNotFound(id)) if id == "zzz"
        ));
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let connector = MemoryConnector::new();
        assert!(matches!(
            ClientRegistry::build(&connector, " ", &ids(&["a"])),
            Err(RegistryError::MissingProject)
        ));
        assert!(matches!(
            ClientRegistry::build(&connector, "p", &[]),
            Err(RegistryError::NoInstances)
        ));
        assert!(matches!(
            ClientRegistry::build(&connector, "p", &ids(&["a", ""])),
            Err(RegistryError::BlankInstance)
        ));
        assert!(matches!(
            ClientRegistry::build(&connector, "p", &ids(&["a", "a"])),
            Err(RegistryError::DuplicateInstance(_))
        ));
    }

    struct FailingConnector;

    impl BigtableConnector for FailingConnector {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn table_admin(&self, p: &str, i: &str) -> BigtableResult<Arc<dyn TableAdmin>> {
            MemoryConnector::new().table_admin(p, i)
        }

        fn data_client(&self, _p: &str, i: &str) -> BigtableResult<Arc<dyn DataClient>> {
            Err(BigtableError::Transport(format!("cannot reach {}", i)))
        }

        fn instance_admin(&self, p: &str) -> BigtableResult<Arc<dyn InstanceAdmin>> {
            MemoryConnector::new().instance_admin(p)
        }
    }

    #[test]
    fn test_connect_failure_is_fatal() {
        let err = ClientRegistry::build(&FailingConnector, "p", &ids(&["a"])).unwrap_err();
        match err {
            RegistryError::Connect { kind, instance, .. } => {
                assert_eq!(kind, "data");
                assert_eq!(instance, "a");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
