//! howl domain model
//!
//! Pure game types for the werewolf engine: roles and player state,
//! structured decisions, vote resolution, round records, and the stable
//! event schema. No async and no I/O: everything here is deterministic
//! and directly unit-testable.

pub mod decision;
pub mod error;
pub mod events;
pub mod ids;
pub mod records;
pub mod role;
pub mod vote;

pub use decision::{
    BaseDecision, Decision, DecisionSchema, DiscussionDecision, HealDecision, KnowledgeDecision,
    PoisonDecision, ReflectionDecision, SeerDecision, ShotDecision, VoteDecision,
};
pub use error::DomainError;
pub use events::{agent_id_for, EventKind, GameEvent, GameStatus, PlayerInfo};
pub use ids::{GameId, SubscriberId};
pub use records::{PublicRecord, RecordScope, VoteRecord};
pub use role::{standard_distribution, Player, Role, RoleState};
pub use vote::{is_abstain, resolve, VoteOutcome, ABSTAIN_KEYWORDS};
