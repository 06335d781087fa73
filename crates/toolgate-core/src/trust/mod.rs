// crates/toolgate-core/src/trust/mod.rs
// ============================================================================
// Module: Trust Classifier
// Description: Resolves a tool invocation to an authorization tier.
// Purpose: Apply agent, workspace, and global trust policy in a fixed order.
// Dependencies: crate::interfaces, crate::model
// ============================================================================

//! ## Overview
//! Classification consults three policy sources; the first that yields a
//! match wins:
//! 1. the agent's exact override for the tool (when an agent is given),
//! 2. the workspace's rules, first glob match in stored order (when a
//!    workspace is given),
//! 3. the global defaults, first glob match in ascending priority.
//!
//! When nothing matches the result is [`Tier::Review`]; classification never
//! falls back to [`Tier::Auto`]. A source that fails to load aborts the
//! classification with [`ClassifyError`] instead of degrading to a default.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod glob;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::interfaces::StoreError;
use crate::interfaces::TrustPolicySource;
use crate::model::ClassifyInput;
use crate::model::Tier;
pub use glob::glob_match;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Tier returned when no policy source matches.
pub const NO_MATCH_TIER: Tier = Tier::Review;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy source that failed during classification.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Agent override lookup failed.
    #[error("agent override lookup failed: {0}")]
    AgentOverride(#[source] StoreError),
    /// Workspace rule lookup failed.
    #[error("workspace trust rules lookup failed: {0}")]
    WorkspaceRules(#[source] StoreError),
    /// Global default lookup failed.
    #[error("trust defaults lookup failed: {0}")]
    Defaults(#[source] StoreError),
}

// ============================================================================
// SECTION: Classifier
// ============================================================================

/// Trust classifier over a [`TrustPolicySource`].
#[derive(Clone)]
pub struct TrustClassifier {
    /// Policy data.
    source: Arc<dyn TrustPolicySource>,
}

impl TrustClassifier {
    /// Creates a classifier reading from `source`.
    #[must_use]
    pub fn new(source: Arc<dyn TrustPolicySource>) -> Self {
        Self {
            source,
        }
    }

    /// Classifies one tool invocation.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError`] when any consulted policy source fails.
    pub async fn classify(&self, input: &ClassifyInput) -> Result<Tier, ClassifyError> {
        if let Some(agent_id) = non_empty(input.agent_id.as_deref()) {
            let found = self
                .source
                .agent_override(agent_id, &input.tool_name)
                .await
                .map_err(ClassifyError::AgentOverride)?;
            if let Some(tier) = found {
                return Ok(tier);
            }
        }

        if let Some(workspace_id) = non_empty(input.workspace_id.as_deref()) {
            let rules = self
                .source
                .workspace_rules(workspace_id)
                .await
                .map_err(ClassifyError::WorkspaceRules)?;
            if let Some(rule) =
                rules.iter().find(|rule| glob_match(&rule.tool_pattern, &input.tool_name))
            {
                return Ok(rule.tier);
            }
        }

        let mut defaults = self.source.trust_defaults().await.map_err(ClassifyError::Defaults)?;
        defaults.sort_by_key(|default| default.priority);
        Ok(defaults
            .iter()
            .find(|default| glob_match(&default.tool_pattern, &input.tool_name))
            .map_or(NO_MATCH_TIER, |default| default.tier))
    }
}

/// Treats empty identifiers as absent.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}
