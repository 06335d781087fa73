// crates/toolgate-core/src/store.rs
// ============================================================================
// Module: Toolgate In-Memory Stores
// Description: In-memory server records and trust policy for config and tests.
// Purpose: Back the store interfaces without an external database.
// Dependencies: async-trait, crate::interfaces, crate::model
// ============================================================================

//! ## Overview
//! These stores hold configuration-seeded records in process memory. They
//! implement the same interfaces a database-backed store would, so the
//! gateway cannot tell them apart.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::interfaces::ServerStore;
use crate::interfaces::StoreError;
use crate::interfaces::TrustPolicySource;
use crate::model::AgentTrustOverride;
use crate::model::Tier;
use crate::model::TrustDefault;
use crate::model::TrustRule;
use crate::model::UpstreamServer;

// ============================================================================
// SECTION: Server Store
// ============================================================================

/// In-memory upstream server records keyed by label.
#[derive(Debug, Default, Clone)]
pub struct InMemoryServerStore {
    /// Records keyed by label.
    servers: Arc<RwLock<BTreeMap<String, UpstreamServer>>>,
}

impl InMemoryServerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `servers`; later labels replace earlier ones.
    #[must_use]
    pub fn from_servers(servers: impl IntoIterator<Item = UpstreamServer>) -> Self {
        let map = servers.into_iter().map(|server| (server.label.clone(), server)).collect();
        Self {
            servers: Arc::new(RwLock::new(map)),
        }
    }

    /// Inserts or replaces a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn upsert(&self, server: UpstreamServer) -> Result<(), StoreError> {
        let mut guard = self
            .servers
            .write()
            .map_err(|_| StoreError::Store("server store lock poisoned".to_string()))?;
        guard.insert(server.label.clone(), server);
        Ok(())
    }
}

#[async_trait]
impl ServerStore for InMemoryServerStore {
    async fn get_by_label(&self, label: &str) -> Result<Option<UpstreamServer>, StoreError> {
        let guard = self
            .servers
            .read()
            .map_err(|_| StoreError::Store("server store lock poisoned".to_string()))?;
        Ok(guard.get(label).cloned())
    }

    async fn list_servers(&self) -> Result<Vec<UpstreamServer>, StoreError> {
        let guard = self
            .servers
            .read()
            .map_err(|_| StoreError::Store("server store lock poisoned".to_string()))?;
        Ok(guard.values().cloned().collect())
    }
}

// ============================================================================
// SECTION: Trust Policy
// ============================================================================

/// Policy tables held by [`InMemoryTrustPolicy`].
#[derive(Debug, Default)]
struct PolicyTables {
    /// `(agent_id, tool_name)` overrides.
    overrides: BTreeMap<(String, String), Tier>,
    /// Workspace rules in insertion order.
    rules: BTreeMap<String, Vec<TrustRule>>,
    /// Global defaults in insertion order.
    defaults: Vec<TrustDefault>,
}

/// In-memory trust policy source.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTrustPolicy {
    /// Policy tables.
    tables: Arc<RwLock<PolicyTables>>,
}

impl InMemoryTrustPolicy {
    /// Creates an empty policy (every classification resolves to review).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an agent override, replacing any existing one for the pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the policy lock is poisoned.
    pub fn add_agent_override(&self, entry: AgentTrustOverride) -> Result<(), StoreError> {
        self.write(|tables| {
            tables.overrides.insert((entry.agent_id, entry.tool_name), entry.tier);
        })
    }

    /// Appends a rule to a workspace.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the policy lock is poisoned.
    pub fn add_workspace_rule(&self, workspace_id: &str, rule: TrustRule) -> Result<(), StoreError> {
        self.write(|tables| {
            tables.rules.entry(workspace_id.to_string()).or_default().push(rule);
        })
    }

    /// Appends a global default.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the policy lock is poisoned.
    pub fn add_default(&self, default: TrustDefault) -> Result<(), StoreError> {
        self.write(|tables| tables.defaults.push(default))
    }

    /// Applies a mutation under the write lock.
    fn write(&self, apply: impl FnOnce(&mut PolicyTables)) -> Result<(), StoreError> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| StoreError::Store("trust policy lock poisoned".to_string()))?;
        apply(&mut guard);
        Ok(())
    }

    /// Reads under the read lock.
    fn read<T>(&self, view: impl FnOnce(&PolicyTables) -> T) -> Result<T, StoreError> {
        let guard = self
            .tables
            .read()
            .map_err(|_| StoreError::Store("trust policy lock poisoned".to_string()))?;
        Ok(view(&guard))
    }
}

#[async_trait]
impl TrustPolicySource for InMemoryTrustPolicy {
    async fn agent_override(
        &self,
        agent_id: &str,
        tool_name: &str,
    ) -> Result<Option<Tier>, StoreError> {
        let key = (agent_id.to_string(), tool_name.to_string());
        self.read(|tables| tables.overrides.get(&key).copied())
    }

    async fn workspace_rules(&self, workspace_id: &str) -> Result<Vec<TrustRule>, StoreError> {
        self.read(|tables| tables.rules.get(workspace_id).cloned().unwrap_or_default())
    }

    async fn trust_defaults(&self) -> Result<Vec<TrustDefault>, StoreError> {
        self.read(|tables| tables.defaults.clone())
    }
}
