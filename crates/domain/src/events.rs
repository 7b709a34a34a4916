//! Structured game events
//!
//! The wire shape is consumed by downstream clients (feed UIs, persistence),
//! so the field names here are stable: every event carries `type`, `round`,
//! `timestamp` and `gameId`; message events add the agent fields; lifecycle
//! events add `content` and optional roster lists.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Discriminant of a game event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Announcements, vote results, deaths, roster updates
    System,
    RoundStart,
    NightStart,
    DayStart,
    /// A player's thought/behavior/speech in some phase
    AgentMessage,
    /// A player's end-of-round reflection
    Memory,
    /// Terminal error surfaced to observers
    GameError,
}

/// One broadcastable game event
///
/// Optional fields are omitted from the wire encoding when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub round: u32,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub game_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<PlayerInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alive_players: Option<Vec<String>>,
}

/// Roster entry attached to the initial system event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub name: String,
    pub role: String,
}

impl GameEvent {
    fn bare(kind: EventKind) -> Self {
        Self {
            kind,
            round: 0,
            timestamp: 0,
            game_id: String::new(),
            agent_id: None,
            agent_name: None,
            category: None,
            action: None,
            thought: None,
            behavior: None,
            speech: None,
            content: None,
            players: None,
            alive_players: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::bare(EventKind::System)
        }
    }

    pub fn round_start(round: u32, content: impl Into<String>) -> Self {
        Self {
            round,
            content: Some(content.into()),
            ..Self::bare(EventKind::RoundStart)
        }
    }

    pub fn night_start() -> Self {
        Self {
            content: Some("Night falls".to_string()),
            ..Self::bare(EventKind::NightStart)
        }
    }

    pub fn day_start() -> Self {
        Self {
            content: Some("Day breaks".to_string()),
            ..Self::bare(EventKind::DayStart)
        }
    }

    pub fn agent_message(
        category: impl Into<String>,
        agent_name: impl Into<String>,
    ) -> Self {
        let agent_name = agent_name.into();
        Self {
            agent_id: Some(agent_id_for(&agent_name)),
            agent_name: Some(agent_name),
            category: Some(category.into()),
            ..Self::bare(EventKind::AgentMessage)
        }
    }

    pub fn memory(agent_name: impl Into<String>, content: impl Into<String>) -> Self {
        let agent_name = agent_name.into();
        Self {
            agent_id: Some(agent_id_for(&agent_name)),
            agent_name: Some(agent_name),
            content: Some(content.into()),
            ..Self::bare(EventKind::Memory)
        }
    }

    pub fn game_error(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::bare(EventKind::GameError)
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_fields(
        mut self,
        thought: impl Into<String>,
        behavior: impl Into<String>,
        speech: impl Into<String>,
    ) -> Self {
        self.thought = Some(thought.into());
        self.behavior = Some(behavior.into());
        self.speech = Some(speech.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_players(mut self, players: Vec<PlayerInfo>) -> Self {
        self.players = Some(players);
        self
    }

    pub fn with_alive_players(mut self, alive: Vec<String>) -> Self {
        self.alive_players = Some(alive);
        self
    }

    /// Stamp the envelope fields the emitter owns
    pub fn stamped(mut self, game_id: impl Into<String>, round: u32) -> Self {
        self.game_id = game_id.into();
        if self.round == 0 {
            self.round = round;
        }
        self.timestamp = Utc::now().timestamp_millis();
        self
    }
}

/// Map backend player names to the agent ids clients key on:
/// `Player7` becomes `player_7`; anything else passes through unchanged.
pub fn agent_id_for(name: &str) -> String {
    if let Some(suffix) = name.strip_prefix("Player") {
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            let n: u64 = suffix.parse().unwrap_or_default();
            return format!("player_{n}");
        }
    }
    name.to_string()
}

/// Lifecycle status of the game runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Idle,
    Running,
    Finished,
    Terminated,
    Errored,
}

impl GameStatus {
    pub fn label(self) -> &'static str {
        match self {
            GameStatus::Idle => "idle",
            GameStatus::Running => "running",
            GameStatus::Finished => "finished",
            GameStatus::Terminated => "terminated",
            GameStatus::Errored => "errored",
        }
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_mapping() {
        assert_eq!(agent_id_for("Player7"), "player_7");
        assert_eq!(agent_id_for("Player12"), "player_12");
        assert_eq!(agent_id_for("Moderator"), "Moderator");
        assert_eq!(agent_id_for("Player"), "Player");
    }

    #[test]
    fn test_wire_shape_is_stable() {
        let event = GameEvent::agent_message("day_discussion", "Player3")
            .with_fields("t", "b", "s")
            .with_content("s")
            .stamped("game-1", 2);
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["type"], "agent_message");
        assert_eq!(value["agentId"], "player_3");
        assert_eq!(value["agentName"], "Player3");
        assert_eq!(value["gameId"], "game-1");
        assert_eq!(value["round"], 2);
        assert_eq!(value["speech"], "s");
        // Unset optional fields never appear on the wire
        assert!(value.get("players").is_none());
    }

    #[test]
    fn test_stamp_preserves_explicit_round() {
        let event = GameEvent::round_start(5, "Round 5").stamped("g", 9);
        assert_eq!(event.round, 5);
        let plain = GameEvent::system("hello").stamped("g", 9);
        assert_eq!(plain.round, 9);
    }
}
