//! Game transcript and event emission
//!
//! Every log call does two things: appends a human-readable block to the
//! per-game transcript file (best effort, flushed on every write) and
//! publishes the corresponding structured event on the bus. File failures
//! are logged and never interrupt the game.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};

use howl_domain::{GameEvent, GameId, GameStatus, PlayerInfo};

use crate::bus::SharedEventBus;

/// Transcript writer plus event emitter for one game
pub struct GameLog {
    game_id: GameId,
    path: PathBuf,
    file: Option<File>,
    bus: SharedEventBus,
    current_round: u32,
    closed: bool,
}

impl GameLog {
    /// Create the transcript file under `log_dir` and write its header.
    /// A file that cannot be created degrades to event-only logging.
    pub fn new(game_id: GameId, log_dir: &Path, bus: SharedEventBus) -> Self {
        let path = log_dir.join(format!("game_{game_id}.log"));
        let file = create_log_file(log_dir, &path, game_id);
        Self {
            game_id,
            path,
            file,
            bus,
            current_round: 0,
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn emit(&self, event: GameEvent) {
        self.bus
            .publish(event.stamped(self.game_id.to_string(), self.current_round));
    }

    fn write(&mut self, text: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let result = file
            .write_all(text.as_bytes())
            .and_then(|()| file.flush());
        if let Err(e) = result {
            tracing::warn!(error = %e, path = %self.path.display(), "transcript write failed");
        }
    }

    fn timestamp() -> String {
        Local::now().format("%H:%M:%S").to_string()
    }

    /// Record the roster once roles are assigned
    pub fn players(&mut self, players: &[(String, String)]) {
        let mut block = String::from("\nPlayers:\n");
        for (name, role) in players {
            block.push_str(&format!("  - {name}: {role}\n"));
        }
        block.push_str(&format!("\n{}\n", "=".repeat(80)));
        self.write(&block);

        self.emit(
            GameEvent::system("Player roster initialized").with_players(
                players
                    .iter()
                    .map(|(name, role)| PlayerInfo {
                        name: name.clone(),
                        role: role.clone(),
                    })
                    .collect(),
            ),
        );
    }

    pub fn start_round(&mut self, round: u32) {
        self.current_round = round;
        self.write(&format!("\nRound {round}\n{}\n", "-".repeat(80)));
        self.emit(GameEvent::round_start(round, format!("Round {round}")));
    }

    pub fn start_night(&mut self) {
        self.write("\n[Night]\n\n");
        self.emit(GameEvent::night_start());
    }

    pub fn start_day(&mut self) {
        self.write("\n[Day]\n\n");
        self.emit(GameEvent::day_start());
    }

    /// A player's thought/behavior/speech in some phase, with an optional
    /// action note (e.g. "voted for D", "oracle fault: treated as no action")
    pub fn message(
        &mut self,
        category: &str,
        player: &str,
        thought: &str,
        behavior: &str,
        speech: &str,
        action: Option<&str>,
    ) {
        let mut header = format!("[{}] {category} | {player}", Self::timestamp());
        if let Some(action) = action {
            header.push_str(&format!(" -> {action}"));
        }
        let mut block = format!("{header}\n");
        write_field(&mut block, "thought", thought);
        write_field(&mut block, "behavior", behavior);
        write_field(&mut block, "speech", speech);
        block.push('\n');
        self.write(&block);

        let mut content_lines: Vec<String> = Vec::new();
        if !thought.is_empty() {
            content_lines.push(format!("(thought) {thought}"));
        }
        if !behavior.is_empty() {
            content_lines.push(format!("(behavior) {behavior}"));
        }
        if !speech.is_empty() {
            content_lines.push(format!("(speech) {speech}"));
        }
        let content = if content_lines.is_empty() {
            speech.to_string()
        } else {
            content_lines.join("\n")
        };

        let mut event = GameEvent::agent_message(category, player)
            .with_fields(thought, behavior, speech)
            .with_content(content);
        if let Some(action) = action {
            event = event.with_action(action);
        }
        self.emit(event);
    }

    pub fn vote(
        &mut self,
        category: &str,
        voter: &str,
        target: &str,
        thought: &str,
        behavior: &str,
        speech: &str,
    ) {
        self.message(
            category,
            voter,
            thought,
            behavior,
            speech,
            Some(&format!("voted for {target}")),
        );
    }

    pub fn vote_result(&mut self, category: &str, result: &str, tally: &str, action: &str) {
        let line = format!(
            "{}\n[{}] {category} {result} {action} ({tally})\n{}\n\n",
            "-".repeat(80),
            Self::timestamp(),
            "-".repeat(80),
        );
        self.write(&line);
        self.emit(
            GameEvent::system(format!("{category}: {result} {action} ({tally})"))
                .with_category(category),
        );
    }

    /// A special action without speech fields (seer check, witch potion use,
    /// hunter shot, PK arbitration)
    pub fn action(&mut self, category: &str, content: &str) {
        self.write(&format!("[{}] {category} {content}\n\n", Self::timestamp()));
        self.emit(GameEvent::system(format!("{category}: {content}")).with_category(category));
    }

    pub fn deaths(&mut self, category: &str, players: &[String]) {
        let list = if players.is_empty() {
            "none".to_string()
        } else {
            players.join(", ")
        };
        self.write(&format!("[{}] {category} {list}\n\n", Self::timestamp()));
        self.emit(
            GameEvent::system(format!("{category}: {list}"))
                .with_category(category)
                .with_players(
                    players
                        .iter()
                        .map(|name| PlayerInfo {
                            name: name.clone(),
                            role: String::new(),
                        })
                        .collect(),
                ),
        );
    }

    pub fn announcement(&mut self, content: &str) {
        self.write(&format!(
            "[{}] announcement\n    {content}\n\n",
            Self::timestamp()
        ));
        self.emit(GameEvent::system(content).with_category("announcement"));
    }

    pub fn alive_roster(&mut self, round: u32, alive: &[String]) {
        let list = if alive.is_empty() {
            "(nobody left alive)".to_string()
        } else {
            alive.join(", ")
        };
        self.write(&format!(
            "[{}] alive after round {round}: {list}\n\n",
            Self::timestamp()
        ));
        self.emit(
            GameEvent::system(format!("Alive after round {round}: {list}"))
                .with_category("alive_roster")
                .with_alive_players(alive.to_vec()),
        );
    }

    pub fn reflection(
        &mut self,
        round: u32,
        player: &str,
        thought: &str,
        impressions: &std::collections::BTreeMap<String, String>,
    ) {
        let impression_text = if impressions.is_empty() {
            "(no updates)".to_string()
        } else {
            impressions
                .iter()
                .map(|(name, text)| format!("{name}: {text}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let mut block = format!("[{}] [round {round} reflection] {player}\n", Self::timestamp());
        write_field(&mut block, "thought", thought);
        write_field(&mut block, "impressions", &impression_text);
        block.push('\n');
        self.write(&block);

        self.emit(GameEvent::memory(
            player,
            format!("(thought) {thought}\n\n(impressions)\n{impression_text}"),
        ));
    }

    pub fn error(&mut self, content: &str) {
        self.write(&format!("[{}] error: {content}\n\n", Self::timestamp()));
        self.emit(GameEvent::game_error(content));
    }

    /// Write the footer and announce the terminal status. Guarded against
    /// double invocation.
    pub fn close(&mut self, status: GameStatus) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.write(&format!(
            "\n{}\nGame ended: {}\nStatus: {status}\n{}\n",
            "=".repeat(80),
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            "=".repeat(80),
        ));
        self.emit(GameEvent::system(format!("Game over: {status}")).with_category("status"));
    }
}

fn write_field(block: &mut String, label: &str, content: &str) {
    if content.is_empty() {
        return;
    }
    let prefix = format!("    ({label}) ");
    let continuation = " ".repeat(prefix.len());
    for (idx, line) in content.lines().enumerate() {
        if idx == 0 {
            block.push_str(&prefix);
        } else {
            block.push_str(&continuation);
        }
        block.push_str(line.trim_end());
        block.push('\n');
    }
}

fn create_log_file(log_dir: &Path, path: &Path, game_id: GameId) -> Option<File> {
    if let Err(e) = fs::create_dir_all(log_dir) {
        tracing::warn!(error = %e, dir = %log_dir.display(), "could not create log directory");
        return None;
    }
    let mut file = match OpenOptions::new().create(true).write(true).truncate(true).open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "could not create transcript file");
            return None;
        }
    };
    let header = format!(
        "{eq}\nWerewolf game transcript\nGame ID: {game_id}\nStarted: {now}\n{eq}\n",
        eq = "=".repeat(80),
        now = Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
    );
    if let Err(e) = file.write_all(header.as_bytes()) {
        tracing::warn!(error = %e, "transcript header write failed");
    }
    Some(file)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use howl_domain::EventKind;

    use super::*;
    use crate::bus::EventBus;

    fn log_with_bus(dir: &Path) -> (GameLog, crate::bus::Subscription) {
        let bus: SharedEventBus = Arc::new(EventBus::default());
        let sub = bus.subscribe();
        (GameLog::new(GameId::new(), dir, bus), sub)
    }

    #[tokio::test]
    async fn test_message_writes_file_and_emits_event() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut log, mut sub) = log_with_bus(dir.path());
        log.start_round(1);
        log.message("day_discussion", "Player1", "t", "b", "s", None);

        let round_event = sub.receiver.recv().await.expect("round event");
        assert_eq!(round_event.kind, EventKind::RoundStart);

        let message = sub.receiver.recv().await.expect("message event");
        assert_eq!(message.kind, EventKind::AgentMessage);
        assert_eq!(message.agent_name.as_deref(), Some("Player1"));
        assert_eq!(message.agent_id.as_deref(), Some("player_1"));
        assert_eq!(message.round, 1);

        let transcript = fs::read_to_string(log.path()).expect("transcript");
        assert!(transcript.contains("Round 1"));
        assert!(transcript.contains("(speech) s"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut log, mut sub) = log_with_bus(dir.path());
        log.close(GameStatus::Finished);
        log.close(GameStatus::Finished);

        let first = sub.receiver.recv().await.expect("close event");
        assert!(first.content.as_deref().unwrap_or("").contains("finished"));
        assert!(sub.receiver.try_recv().is_err());

        let transcript = fs::read_to_string(log.path()).expect("transcript");
        assert_eq!(transcript.matches("Game ended").count(), 1);
    }

    #[test]
    fn test_unwritable_directory_degrades_to_events_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file_as_dir = dir.path().join("occupied");
        fs::write(&file_as_dir, b"x").expect("file");
        let bus: SharedEventBus = Arc::new(EventBus::default());
        // Must not panic; transcript is simply unavailable
        let mut log = GameLog::new(GameId::new(), &file_as_dir, bus);
        log.announcement("still works");
    }
}
