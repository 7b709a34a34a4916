//! Append-only round records
//!
//! Vote records accumulate for the whole game and feed later decision
//! contexts; public records are transient and cleared at the start of every
//! round.

use serde::{Deserialize, Serialize};

/// One ballot cast in any voting phase. Appended, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub round: u32,
    /// Phase label, e.g. "day vote", "pk vote #2"
    pub phase: String,
    pub voter: String,
    /// `None` records an abstention or invalid ballot
    pub target: Option<String>,
}

/// Visibility scope of a round public record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordScope {
    /// Visible to every player
    Public,
    /// Werewolf-private night chatter; filtered out of non-wolf contexts
    WolvesOnly,
}

/// One visible utterance or action within the current round
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRecord {
    pub player: String,
    pub speech: String,
    pub behavior: String,
    pub phase: String,
    pub scope: RecordScope,
}

impl PublicRecord {
    pub fn public(
        player: impl Into<String>,
        speech: impl Into<String>,
        behavior: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self {
            player: player.into(),
            speech: speech.into(),
            behavior: behavior.into(),
            phase: phase.into(),
            scope: RecordScope::Public,
        }
    }

    pub fn wolves_only(
        player: impl Into<String>,
        speech: impl Into<String>,
        behavior: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self {
            player: player.into(),
            speech: speech.into(),
            behavior: behavior.into(),
            phase: phase.into(),
            scope: RecordScope::WolvesOnly,
        }
    }
}
