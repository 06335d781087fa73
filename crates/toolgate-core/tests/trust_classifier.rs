// crates/toolgate-core/tests/trust_classifier.rs
// ============================================================================
// Module: Trust Classifier Tests
// Description: Precedence and failure tests for trust tier resolution.
// Purpose: Validate override > workspace > defaults ordering and fail-closed errors.
// Dependencies: toolgate-core, tokio
// ============================================================================

//! Trust classifier tests against in-memory and failing policy sources.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions use unwrap for clarity."
)]

use std::sync::Arc;

use async_trait::async_trait;
use toolgate_core::AgentTrustOverride;
use toolgate_core::ClassifyError;
use toolgate_core::ClassifyInput;
use toolgate_core::InMemoryTrustPolicy;
use toolgate_core::StoreError;
use toolgate_core::Tier;
use toolgate_core::TrustClassifier;
use toolgate_core::TrustDefault;
use toolgate_core::TrustPolicySource;
use toolgate_core::TrustRule;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn input(tool: &str, agent: Option<&str>, workspace: Option<&str>) -> ClassifyInput {
    ClassifyInput {
        tool_name: tool.to_string(),
        agent_id: agent.map(str::to_string),
        workspace_id: workspace.map(str::to_string),
    }
}

fn default_rule(pattern: &str, tier: Tier, priority: i32) -> TrustDefault {
    TrustDefault {
        tool_pattern: pattern.to_string(),
        tier,
        priority,
    }
}

fn layered_policy() -> InMemoryTrustPolicy {
    let policy = InMemoryTrustPolicy::new();
    policy
        .add_agent_override(AgentTrustOverride {
            agent_id: "agent-1".to_string(),
            tool_name: "delete_repo".to_string(),
            tier: Tier::Auto,
        })
        .unwrap();
    policy
        .add_workspace_rule(
            "ws-1",
            TrustRule {
                tool_pattern: "delete_*".to_string(),
                tier: Tier::Review,
            },
        )
        .unwrap();
    policy.add_default(default_rule("*", Tier::Block, 100)).unwrap();
    policy.add_default(default_rule("read_*", Tier::Auto, 10)).unwrap();
    policy
}

/// Policy source whose selected lookup fails.
struct FailingSource {
    fail_overrides: bool,
    fail_rules: bool,
    fail_defaults: bool,
}

#[async_trait]
impl TrustPolicySource for FailingSource {
    async fn agent_override(&self, _: &str, _: &str) -> Result<Option<Tier>, StoreError> {
        if self.fail_overrides {
            return Err(StoreError::Store("connection reset".to_string()));
        }
        Ok(None)
    }

    async fn workspace_rules(&self, _: &str) -> Result<Vec<TrustRule>, StoreError> {
        if self.fail_rules {
            return Err(StoreError::Store("connection reset".to_string()));
        }
        Ok(Vec::new())
    }

    async fn trust_defaults(&self) -> Result<Vec<TrustDefault>, StoreError> {
        if self.fail_defaults {
            return Err(StoreError::Store("connection reset".to_string()));
        }
        Ok(vec![default_rule("*", Tier::Auto, 1)])
    }
}

// ============================================================================
// SECTION: Precedence
// ============================================================================

#[tokio::test]
async fn agent_override_wins_over_workspace_and_defaults() {
    let classifier = TrustClassifier::new(Arc::new(layered_policy()));
    let tier = classifier
        .classify(&input("delete_repo", Some("agent-1"), Some("ws-1")))
        .await
        .unwrap();
    assert_eq!(tier, Tier::Auto);
}

#[tokio::test]
async fn override_is_exact_match_only() {
    let classifier = TrustClassifier::new(Arc::new(layered_policy()));
    let tier = classifier
        .classify(&input("delete_repos", Some("agent-1"), Some("ws-1")))
        .await
        .unwrap();
    assert_eq!(tier, Tier::Review);
}

#[tokio::test]
async fn workspace_rule_wins_over_defaults() {
    let classifier = TrustClassifier::new(Arc::new(layered_policy()));
    let tier =
        classifier.classify(&input("delete_repo", Some("agent-2"), Some("ws-1"))).await.unwrap();
    assert_eq!(tier, Tier::Review);
}

#[tokio::test]
async fn defaults_are_evaluated_by_ascending_priority() {
    let classifier = TrustClassifier::new(Arc::new(layered_policy()));
    let read = classifier.classify(&input("read_file", None, Some("ws-2"))).await.unwrap();
    assert_eq!(read, Tier::Auto);
    let other = classifier.classify(&input("write_file", None, None)).await.unwrap();
    assert_eq!(other, Tier::Block);
}

#[tokio::test]
async fn first_workspace_rule_in_stored_order_wins() {
    let policy = InMemoryTrustPolicy::new();
    for (pattern, tier) in [("*", Tier::Block), ("read_*", Tier::Auto)] {
        policy
            .add_workspace_rule(
                "ws",
                TrustRule {
                    tool_pattern: pattern.to_string(),
                    tier,
                },
            )
            .unwrap();
    }
    let classifier = TrustClassifier::new(Arc::new(policy));
    let tier = classifier.classify(&input("read_file", None, Some("ws"))).await.unwrap();
    assert_eq!(tier, Tier::Block);
}

#[tokio::test]
async fn no_match_resolves_to_review_never_auto() {
    let classifier = TrustClassifier::new(Arc::new(InMemoryTrustPolicy::new()));
    let tier = classifier.classify(&input("anything", Some("a"), Some("w"))).await.unwrap();
    assert_eq!(tier, Tier::Review);
}

// ============================================================================
// SECTION: Failures
// ============================================================================

#[tokio::test]
async fn source_failures_are_errors_not_defaults() {
    let cases = [(true, false, false), (false, true, false), (false, false, true)];
    for (fail_overrides, fail_rules, fail_defaults) in cases {
        let classifier = TrustClassifier::new(Arc::new(FailingSource {
            fail_overrides,
            fail_rules,
            fail_defaults,
        }));
        let result = classifier.classify(&input("tool", Some("agent"), Some("ws"))).await;
        match result {
            Err(ClassifyError::AgentOverride(_)) => assert!(fail_overrides),
            Err(ClassifyError::WorkspaceRules(_)) => assert!(fail_rules),
            Err(ClassifyError::Defaults(_)) => assert!(fail_defaults),
            Ok(tier) => panic!("expected error, got {tier:?}"),
        }
    }
}

#[tokio::test]
async fn skipped_sources_are_not_consulted() {
    let classifier = TrustClassifier::new(Arc::new(FailingSource {
        fail_overrides: true,
        fail_rules: true,
        fail_defaults: false,
    }));
    let tier = classifier.classify(&input("tool", None, None)).await.unwrap();
    assert_eq!(tier, Tier::Auto);
}
