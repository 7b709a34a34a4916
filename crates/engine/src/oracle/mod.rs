//! Decision oracle port - interface to the external decision maker
//!
//! The oracle turns a role-scoped prompt plus a schema into a structured
//! decision. Adapters live next to the port: an OpenAI-compatible HTTP
//! client and a retry wrapper. Returned decisions are validated against the
//! requested schema by the orchestrator before any state changes.

mod ollama;
mod resilient;

pub use ollama::OllamaOracle;
pub use resilient::{ResilientOracle, RetryConfig};

use async_trait::async_trait;
use thiserror::Error;

use howl_domain::{Decision, DecisionSchema};

/// One decision request: who is deciding, what they know, what is asked of
/// them, and the shape the answer must take.
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    /// The acting player
    pub player: String,
    /// Instruction for this specific turn
    pub prompt: String,
    /// The player's private context (impressions, knowledge, visible record)
    pub context: String,
    /// The decision shape expected back
    pub schema: DecisionSchema,
}

impl DecisionRequest {
    pub fn new(
        player: impl Into<String>,
        prompt: impl Into<String>,
        context: impl Into<String>,
        schema: DecisionSchema,
    ) -> Self {
        Self {
            player: player.into(),
            prompt: prompt.into(),
            context: context.into(),
            schema,
        }
    }
}

/// Failure modes of a decision call
///
/// All of these are recovered locally by the orchestrator as "no action for
/// this turn"; they never abort a round on their own.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The provider did not answer in time
    #[error("Decision request timed out")]
    Timeout,

    /// Transport or provider-side failure
    #[error("Decision provider error: {0}")]
    Provider(String),

    /// The provider answered, but not with a parseable decision
    #[error("Malformed decision: {0}")]
    Malformed(String),
}

/// Port for the external decision maker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Produce a structured decision for the given request
    async fn decide(&self, request: DecisionRequest) -> Result<Decision, OracleError>;
}

#[cfg(test)]
mod tests {
    use howl_domain::BaseDecision;

    use super::*;

    #[tokio::test]
    async fn test_port_contract_via_mock() {
        let mut oracle = MockDecisionOracle::new();
        oracle
            .expect_decide()
            .withf(|request| request.player == "Player1")
            .times(1)
            .returning(|_| Ok(Decision::Statement(BaseDecision::default())));

        let request =
            DecisionRequest::new("Player1", "speak", "context", DecisionSchema::Statement);
        let decision = oracle.decide(request).await.expect("decision");
        assert!(matches!(decision, Decision::Statement(_)));
    }
}
