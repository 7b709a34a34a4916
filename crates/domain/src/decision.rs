//! Structured decisions produced by the decision oracle
//!
//! Every decision embeds the same base record (private thought, public
//! behavior, public speech); role-specific records compose the base via
//! `#[serde(flatten)]` rather than inheritance. The orchestrator names the
//! shape it expects with a [`DecisionSchema`], and the returned [`Decision`]
//! is validated against that schema at the oracle boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Shared fields of every spoken decision
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseDecision {
    /// Private reasoning, never shown to other players
    #[serde(default)]
    pub thought: String,
    /// A subjectless description of visible behavior
    #[serde(default)]
    pub behavior: String,
    /// What the other players hear
    #[serde(default)]
    pub speech: String,
}

/// Werewolf team discussion turn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionDecision {
    #[serde(flatten)]
    pub base: BaseDecision,
    /// Whether the team has reached agreement on a target
    #[serde(default)]
    pub reach_agreement: bool,
}

/// A ballot: `None` means abstention
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteDecision {
    #[serde(flatten)]
    pub base: BaseDecision,
    #[serde(default)]
    pub vote: Option<String>,
}

/// Witch heal response for the night's kill target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealDecision {
    #[serde(flatten)]
    pub base: BaseDecision,
    #[serde(default)]
    pub heal: bool,
}

/// Witch poison response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoisonDecision {
    #[serde(flatten)]
    pub base: BaseDecision,
    #[serde(default)]
    pub poison: bool,
    /// Required when `poison` is set
    #[serde(default)]
    pub target: Option<String>,
}

/// Seer identity check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeerDecision {
    #[serde(flatten)]
    pub base: BaseDecision,
    pub target: String,
}

/// Hunter's dying shot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotDecision {
    #[serde(flatten)]
    pub base: BaseDecision,
    #[serde(default)]
    pub shoot: bool,
    /// Required when `shoot` is set
    #[serde(default)]
    pub target: Option<String>,
}

/// End-of-round impression revision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionDecision {
    /// Private reasoning, never shown to other players
    #[serde(default)]
    pub thought: String,
    /// Partial update: only named players change, others keep prior values
    #[serde(default)]
    pub impression_updates: BTreeMap<String, String>,
}

/// Cross-game knowledge revision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeDecision {
    #[serde(default)]
    pub knowledge: String,
}

/// The shape of decision the orchestrator is asking for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionSchema {
    /// A plain statement: day discussion, last words, game summary
    Statement,
    /// Werewolf team discussion with an agreement flag
    Discussion,
    /// A vote restricted to `candidates`
    Vote {
        candidates: Vec<String>,
        allow_abstain: bool,
    },
    /// Witch heal offer for the named kill target
    WitchHeal { kill_target: String },
    /// Witch poison offer over `candidates`
    WitchPoison { candidates: Vec<String> },
    /// Seer check over `candidates`
    SeerCheck { candidates: Vec<String> },
    /// Hunter shot over `candidates`
    HunterShot { candidates: Vec<String> },
    /// End-of-round impression revision
    Reflection,
    /// Cross-game knowledge revision
    KnowledgeUpdate,
}

impl DecisionSchema {
    pub fn label(&self) -> &'static str {
        match self {
            DecisionSchema::Statement => "statement",
            DecisionSchema::Discussion => "discussion",
            DecisionSchema::Vote { .. } => "vote",
            DecisionSchema::WitchHeal { .. } => "witch_heal",
            DecisionSchema::WitchPoison { .. } => "witch_poison",
            DecisionSchema::SeerCheck { .. } => "seer_check",
            DecisionSchema::HunterShot { .. } => "hunter_shot",
            DecisionSchema::Reflection => "reflection",
            DecisionSchema::KnowledgeUpdate => "knowledge_update",
        }
    }
}

/// A validated decision, one variant per schema
#[derive(Debug, Clone)]
pub enum Decision {
    Statement(BaseDecision),
    Discussion(DiscussionDecision),
    Vote(VoteDecision),
    WitchHeal(HealDecision),
    WitchPoison(PoisonDecision),
    SeerCheck(SeerDecision),
    HunterShot(ShotDecision),
    Reflection(ReflectionDecision),
    KnowledgeUpdate(KnowledgeDecision),
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Statement(_) => "statement",
            Decision::Discussion(_) => "discussion",
            Decision::Vote(_) => "vote",
            Decision::WitchHeal(_) => "witch_heal",
            Decision::WitchPoison(_) => "witch_poison",
            Decision::SeerCheck(_) => "seer_check",
            Decision::HunterShot(_) => "hunter_shot",
            Decision::Reflection(_) => "reflection",
            Decision::KnowledgeUpdate(_) => "knowledge_update",
        }
    }

    /// The base record, where the variant carries one
    pub fn base(&self) -> Option<&BaseDecision> {
        match self {
            Decision::Statement(d) => Some(d),
            Decision::Discussion(d) => Some(&d.base),
            Decision::Vote(d) => Some(&d.base),
            Decision::WitchHeal(d) => Some(&d.base),
            Decision::WitchPoison(d) => Some(&d.base),
            Decision::SeerCheck(d) => Some(&d.base),
            Decision::HunterShot(d) => Some(&d.base),
            Decision::Reflection(_) | Decision::KnowledgeUpdate(_) => None,
        }
    }

    /// Check that this decision has the requested shape and that every named
    /// target is drawn from the offered candidate set.
    pub fn validate_against(&self, schema: &DecisionSchema) -> Result<(), DomainError> {
        match (self, schema) {
            (Decision::Statement(_), DecisionSchema::Statement) => Ok(()),
            (Decision::Discussion(_), DecisionSchema::Discussion) => Ok(()),
            (Decision::Vote(d), DecisionSchema::Vote { candidates, .. }) => {
                let target = d.vote.as_deref().map(str::trim);
                if crate::vote::is_abstain(target) {
                    Ok(())
                } else {
                    ensure_candidate(target.unwrap_or(""), candidates, "vote")
                }
            }
            (Decision::WitchHeal(_), DecisionSchema::WitchHeal { .. }) => Ok(()),
            (Decision::WitchPoison(d), DecisionSchema::WitchPoison { candidates }) => {
                match (d.poison, d.target.as_deref().map(str::trim)) {
                    (true, Some(target)) if !target.is_empty() => {
                        ensure_candidate(target, candidates, "poison")
                    }
                    (true, _) => Err(DomainError::invalid_decision(
                        "poison requested without a target",
                    )),
                    (false, _) => Ok(()),
                }
            }
            (Decision::SeerCheck(d), DecisionSchema::SeerCheck { candidates }) => {
                ensure_candidate(d.target.trim(), candidates, "seer check")
            }
            (Decision::HunterShot(d), DecisionSchema::HunterShot { candidates }) => {
                match (d.shoot, d.target.as_deref().map(str::trim)) {
                    (true, Some(target)) if !target.is_empty() => {
                        ensure_candidate(target, candidates, "shot")
                    }
                    // Shoot without a target is treated as holding fire
                    _ => Ok(()),
                }
            }
            (Decision::Reflection(_), DecisionSchema::Reflection) => Ok(()),
            (Decision::KnowledgeUpdate(_), DecisionSchema::KnowledgeUpdate) => Ok(()),
            (decision, schema) => Err(DomainError::invalid_decision(format!(
                "expected a {} decision, got {}",
                schema.label(),
                decision.label()
            ))),
        }
    }
}

fn ensure_candidate(
    target: &str,
    candidates: &[String],
    action: &str,
) -> Result<(), DomainError> {
    if candidates.iter().any(|c| c == target) {
        Ok(())
    } else {
        Err(DomainError::invalid_decision(format!(
            "{action} target {target:?} is not among the offered candidates"
        )))
    }
}
