//! Test doubles for the engine's ports
//!
//! Deterministic oracles and an in-memory knowledge archive, used by the
//! crate's own tests and by integration tests driving whole games.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;

use howl_domain::{
    BaseDecision, Decision, DecisionSchema, DiscussionDecision, HealDecision, KnowledgeDecision,
    PoisonDecision, ReflectionDecision, SeerDecision, ShotDecision, VoteDecision,
};

use crate::knowledge::KnowledgeArchive;
use crate::oracle::{DecisionOracle, DecisionRequest, OracleError};

/// The "do nothing" decision for a schema: abstain, decline potions, hold
/// fire, agree to end discussion, keep impressions. The seer has no no-op,
/// so the first candidate is checked.
pub fn default_decision(schema: &DecisionSchema) -> Decision {
    match schema {
        DecisionSchema::Statement => Decision::Statement(BaseDecision::default()),
        DecisionSchema::Discussion => Decision::Discussion(DiscussionDecision {
            base: BaseDecision::default(),
            reach_agreement: true,
        }),
        DecisionSchema::Vote { .. } => Decision::Vote(VoteDecision {
            base: BaseDecision::default(),
            vote: None,
        }),
        DecisionSchema::WitchHeal { .. } => Decision::WitchHeal(HealDecision {
            base: BaseDecision::default(),
            heal: false,
        }),
        DecisionSchema::WitchPoison { .. } => Decision::WitchPoison(PoisonDecision {
            base: BaseDecision::default(),
            poison: false,
            target: None,
        }),
        DecisionSchema::SeerCheck { candidates } => Decision::SeerCheck(SeerDecision {
            base: BaseDecision::default(),
            target: candidates.first().cloned().unwrap_or_default(),
        }),
        DecisionSchema::HunterShot { .. } => Decision::HunterShot(ShotDecision {
            base: BaseDecision::default(),
            shoot: false,
            target: None,
        }),
        DecisionSchema::Reflection => Decision::Reflection(ReflectionDecision {
            thought: String::new(),
            impression_updates: BTreeMap::new(),
        }),
        DecisionSchema::KnowledgeUpdate => Decision::KnowledgeUpdate(KnowledgeDecision {
            knowledge: String::new(),
        }),
    }
}

/// Convenience constructor for a ballot decision
pub fn vote_for(target: &str) -> Decision {
    Decision::Vote(VoteDecision {
        base: BaseDecision::default(),
        vote: Some(target.to_string()),
    })
}

/// Oracle driven by a closure over the full request
pub struct StubOracle {
    respond: Box<dyn Fn(&DecisionRequest) -> Result<Decision, OracleError> + Send + Sync>,
}

impl StubOracle {
    pub fn new(
        respond: impl Fn(&DecisionRequest) -> Result<Decision, OracleError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
        }
    }

    /// Answers every request with its schema's no-op decision
    pub fn abstaining() -> Self {
        Self::new(|request| Ok(default_decision(&request.schema)))
    }
}

#[async_trait]
impl DecisionOracle for StubOracle {
    async fn decide(&self, request: DecisionRequest) -> Result<Decision, OracleError> {
        (self.respond)(&request)
    }
}

/// Knowledge archive held entirely in memory
#[derive(Default)]
pub struct MemoryArchive {
    entries: BTreeMap<String, String>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KnowledgeArchive for MemoryArchive {
    fn load(&self, player: &str) -> String {
        self.entries.get(player).cloned().unwrap_or_default()
    }

    fn update(&mut self, player: &str, knowledge: &str) {
        self.entries.insert(player.to_string(), knowledge.to_string());
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        None
    }
}
