//! Round/phase state machine
//!
//! One [`GameSession`] owns everything a running game touches: the player
//! registry, the transcript/event log, the oracle handle, the knowledge
//! archive, and the per-round records. All state lives here and is passed
//! through the phase methods; there is no ambient global state.
//!
//! Concurrency discipline: night steps are strictly sequential (team
//! discussion and votes are serialized to prevent vote-herding); the day
//! vote and the reflection step fan out one oracle call per living player,
//! each with a small randomized stagger, and fold the results back in
//! registration order once the whole gather completes.

mod day;
mod night;
mod reflection;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use howl_domain::{
    is_abstain, standard_distribution, Decision, DecisionSchema, DomainError, GameId, GameStatus,
    PublicRecord, Role, VoteDecision, VoteRecord,
};

use crate::bus::SharedEventBus;
use crate::config::EngineConfig;
use crate::context::player_context;
use crate::game_log::GameLog;
use crate::knowledge::KnowledgeArchive;
use crate::oracle::{DecisionOracle, DecisionRequest, OracleError};
use crate::registry::{PlayerRegistry, WinAnnouncement};

/// Number of players in a standard game
pub const PLAYER_COUNT: usize = 9;

/// Hard cap on PK runoff rounds before the lexicographic fallback
pub const PK_MAX_ROUNDS: u32 = 3;

/// Everything a game run needs from the outside
pub struct SessionDeps {
    pub oracle: Arc<dyn DecisionOracle>,
    pub archive: Box<dyn KnowledgeArchive>,
    pub bus: SharedEventBus,
    pub config: EngineConfig,
    /// Fixed seating for tests and replays. `None` deals the standard
    /// distribution over Player1..Player9 at random.
    pub roster: Option<Vec<(String, Role)>>,
}

/// Paths produced by a finished run
#[derive(Debug, Clone)]
pub struct GameArtifacts {
    pub log_path: PathBuf,
    pub experience_path: Option<PathBuf>,
}

/// Terminal report of one game run
#[derive(Debug)]
pub struct GameOutcome {
    pub status: GameStatus,
    pub artifacts: GameArtifacts,
    /// Human-readable failure, retained only for the errored case
    pub error: Option<String>,
}

/// Fatal failures of a game run
///
/// Oracle faults never appear here; they are absorbed per turn as
/// no-actions. What does: the stop signal (a first-class termination path,
/// not an error) and invariant violations.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("game terminated by stop signal")]
    Terminated,

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Setup(#[from] anyhow::Error),
}

pub(crate) struct GameSession {
    pub(crate) game_id: GameId,
    pub(crate) registry: PlayerRegistry,
    pub(crate) log: GameLog,
    pub(crate) oracle: Arc<dyn DecisionOracle>,
    pub(crate) archive: Box<dyn KnowledgeArchive>,
    pub(crate) config: EngineConfig,
    pub(crate) stop: CancellationToken,
    pub(crate) round: u32,
    /// Public votes accumulated across the whole game
    pub(crate) vote_history: Vec<VoteRecord>,
    /// Visible speech/actions of the current round; cleared at round start
    pub(crate) round_records: Vec<PublicRecord>,
    roster: Option<Vec<(String, Role)>>,
}

/// Run one complete game to its terminal status.
///
/// This is the transport-facing entry point: events flow through the bus in
/// `deps`, cancellation comes in exclusively through `stop`, and the
/// returned outcome carries the transcript and knowledge archive paths.
pub async fn run_game(
    game_id: GameId,
    deps: SessionDeps,
    stop: CancellationToken,
) -> GameOutcome {
    let SessionDeps {
        oracle,
        archive,
        bus,
        config,
        roster,
    } = deps;

    let log = GameLog::new(game_id, &config.log_dir, bus);
    let mut session = GameSession {
        game_id,
        registry: PlayerRegistry::new(),
        log,
        oracle,
        archive,
        config,
        stop,
        round: 0,
        vote_history: Vec::new(),
        round_records: Vec::new(),
        roster,
    };

    let result = session.play().await;
    let (status, error) = match &result {
        Ok(()) => (GameStatus::Finished, None),
        Err(GameError::Terminated) => (GameStatus::Terminated, None),
        Err(e) => (GameStatus::Errored, Some(e.to_string())),
    };

    match (&status, &error) {
        (GameStatus::Terminated, _) => {
            tracing::info!(game_id = %session.game_id, "game terminated by stop signal");
        }
        (GameStatus::Errored, Some(msg)) => {
            tracing::error!(game_id = %session.game_id, error = %msg, "game errored");
            session.log.error(msg);
        }
        _ => {}
    }
    // The closed flag inside the log guards double finalization
    session.log.close(status);

    GameOutcome {
        status,
        artifacts: GameArtifacts {
            log_path: session.log.path().to_path_buf(),
            experience_path: session.archive.path().map(PathBuf::from),
        },
        error,
    }
}

impl GameSession {
    // =========================================================================
    // Top-level flow
    // =========================================================================

    async fn play(&mut self) -> Result<(), GameError> {
        self.setup()?;

        for round in 1..=self.config.max_game_rounds {
            self.check_stop()?;
            self.round = round;
            self.round_records.clear();
            self.log.start_round(round);

            if let Some(win) = self.play_round(round == 1).await? {
                self.log
                    .announcement(&format!("Game over: {}", win.message));
                break;
            }
        }

        // Closing reflections from everyone, dead and alive
        self.final_reflection().await;

        self.archive.bulk_update(&self.registry.export_knowledge());
        if let Err(e) = self.archive.flush() {
            tracing::warn!(error = %e, "knowledge archive flush failed");
        }
        Ok(())
    }

    /// One full round. Returns the win announcement if either win check
    /// fires.
    async fn play_round(&mut self, is_first_round: bool) -> Result<Option<WinAnnouncement>, GameError> {
        // --- Night ---
        self.log.start_night();
        self.check_stop()?;

        self.wolf_discussion().await?;
        let wolf_kill = self.wolf_vote().await?;
        let (wolf_kill, poisoned) = self.witch_turn(wolf_kill).await?;
        self.check_stop()?;
        self.seer_turn().await?;

        // --- Day ---
        self.log.start_day();

        // A hunter taken by the wolves (and not poisoned) fires before the
        // deaths are announced
        let hunter_shots = self
            .hunter_night_shots(wolf_kill.as_deref(), poisoned.as_deref())
            .await?;

        let mut dead_tonight: Vec<String> = Vec::new();
        for name in wolf_kill
            .iter()
            .chain(poisoned.iter())
            .chain(hunter_shots.iter())
        {
            if !dead_tonight.contains(name) {
                dead_tonight.push(name.clone());
            }
        }

        self.log.deaths("night_deaths", &dead_tonight);
        self.registry.mark_dead(&dead_tonight);

        if dead_tonight.is_empty() {
            self.announce("Dawn breaks. It was a peaceful night; no one was eliminated.");
        } else {
            self.announce(&format!(
                "Dawn breaks. Last night {} left us.",
                dead_tonight.join(", "),
            ));
            if is_first_round {
                // Only the wolves' and witch's victims speak; a player shot
                // by the hunter already had their moment
                let victims: Vec<String> = wolf_kill.iter().chain(poisoned.iter()).cloned().collect();
                self.last_words(&victims).await?;
            }
        }

        if let Some(win) = self.registry.check_winner() {
            return Ok(Some(win));
        }

        self.check_stop()?;
        self.day_discussion().await?;

        let voted_out = self.day_vote_with_runoff().await?;

        if let Some(victim) = &voted_out {
            self.last_words(std::slice::from_ref(victim)).await?;
        }

        let shot_by_day = self.hunter_day_shot(voted_out.as_deref()).await?;

        let mut dead_today: Vec<String> = Vec::new();
        for name in voted_out.iter().chain(shot_by_day.iter()) {
            if !dead_today.contains(name) {
                dead_today.push(name.clone());
            }
        }
        self.log.deaths("day_deaths", &dead_today);
        self.registry.mark_dead(&dead_today);

        self.check_stop()?;
        self.reflection_phase().await?;

        self.log.alive_roster(self.round, &self.registry.alive_names());

        Ok(self.registry.check_winner())
    }

    fn setup(&mut self) -> Result<(), GameError> {
        let roster = match self.roster.take() {
            Some(roster) => roster,
            None => {
                let mut roles = standard_distribution().to_vec();
                roles.shuffle(&mut rand::thread_rng());
                (1..=PLAYER_COUNT)
                    .zip(roles)
                    .map(|(n, role)| (format!("Player{n}"), role))
                    .collect()
            }
        };
        if roster.len() != PLAYER_COUNT {
            return Err(GameError::Invariant(format!(
                "the game needs exactly {PLAYER_COUNT} players, got {}",
                roster.len()
            )));
        }

        let names: Vec<String> = roster.iter().map(|(name, _)| name.clone()).collect();
        self.announce(&format!(
            "A new werewolf game begins. At the table: {}.",
            names.join(", "),
        ));

        for (name, role) in &roster {
            let knowledge = self.archive.load(name);
            self.registry.add_player(name.clone(), *role, knowledge)?;
        }

        let players_info: Vec<(String, String)> = roster
            .iter()
            .map(|(name, role)| (name.clone(), role.to_string()))
            .collect();
        self.log.players(&players_info);
        Ok(())
    }

    /// Closing statement from every participant once the game is decided
    async fn final_reflection(&mut self) {
        let everyone: Vec<String> = self
            .registry
            .all_players()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        for name in everyone {
            let prompt = "The game is over. Share your closing thoughts on how it played out.";
            if let Some(Decision::Statement(base)) = self
                .ask_logged(&name, prompt, "game_summary", DecisionSchema::Statement)
                .await
                .unwrap_or(None)
            {
                self.log.message(
                    "game_summary",
                    &name,
                    &base.thought,
                    &base.behavior,
                    &base.speech,
                    None,
                );
            }
        }
    }

    // =========================================================================
    // Shared helpers
    // =========================================================================

    /// Poll the stop signal; called at every phase boundary and at each
    /// iteration of multi-step loops.
    pub(crate) fn check_stop(&self) -> Result<(), GameError> {
        if self.stop.is_cancelled() {
            Err(GameError::Terminated)
        } else {
            Ok(())
        }
    }

    pub(crate) fn context_for(&self, player: &str, phase: &str) -> String {
        player_context(
            &self.registry,
            player,
            &self.vote_history,
            &self.round_records,
            self.round,
            phase,
        )
    }

    /// Moderator announcement: transcript, event stream, and the round's
    /// public record (so later oracle contexts can see it)
    pub(crate) fn announce(&mut self, content: &str) {
        self.log.announcement(content);
        self.round_records.push(PublicRecord::public(
            "Moderator",
            content,
            "",
            "announcement",
        ));
    }

    /// One sequential oracle call. Faults are absorbed: the anomaly is
    /// logged distinctly from a genuine abstention and `None` is returned.
    /// A well-formed decision naming an out-of-set target is an invariant
    /// violation and fails the game.
    pub(crate) async fn ask_logged(
        &mut self,
        player: &str,
        prompt: &str,
        phase: &str,
        schema: DecisionSchema,
    ) -> Result<Option<Decision>, GameError> {
        let context = self.context_for(player, phase);
        let request = DecisionRequest::new(player, prompt, context, schema.clone());
        match self.oracle.decide(request).await {
            Ok(decision) => {
                decision
                    .validate_against(&schema)
                    .map_err(|e| GameError::Invariant(format!("{player}: {e}")))?;
                Ok(Some(decision))
            }
            Err(e) => {
                self.note_oracle_fault(player, phase, &e);
                Ok(None)
            }
        }
    }

    pub(crate) fn note_oracle_fault(&mut self, player: &str, phase: &str, error: &OracleError) {
        tracing::warn!(player, phase, error = %error, "oracle fault, treating as no action");
        self.log.message(
            phase,
            player,
            "",
            "",
            "",
            Some(&format!("oracle fault: {error} (treated as no action)")),
        );
    }

    /// Issue one oracle call per listed player concurrently, each delayed by
    /// a small random stagger, and return results in the order of `players`
    /// (which callers pass in registration order). Nothing is logged here;
    /// callers fold and log after the whole gather completes.
    pub(crate) async fn fan_out(
        &self,
        players: &[String],
        prompt: &str,
        phase: &str,
        schema: DecisionSchema,
    ) -> Vec<(String, Result<Decision, OracleError>)> {
        let futures: Vec<_> = players
            .iter()
            .map(|name| {
                let name = name.clone();
                let schema = schema.clone();
                let prompt = prompt.to_string();
                async move {
                    if self.stop.is_cancelled() {
                        return (name, Err(OracleError::Provider("stop signal set".to_string())));
                    }
                    let delay = {
                        let mut rng = rand::thread_rng();
                        rng.gen_range(0..=self.config.stagger_ms)
                    };
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    let context = self.context_for(&name, phase);
                    let request = DecisionRequest::new(&name, prompt, context, schema);
                    let result = self.oracle.decide(request).await;
                    (name, result)
                }
            })
            .collect();
        futures_util::future::join_all(futures).await
    }

    /// Normalize a vote decision into a ballot: abstention keywords and
    /// empty targets become `None`.
    pub(crate) fn ballot_of(decision: &VoteDecision) -> Option<String> {
        let target = decision.vote.as_deref().map(str::trim);
        if is_abstain(target) {
            None
        } else {
            target.map(str::to_string)
        }
    }

    /// Validate a ballot against the offered candidates. Voting for a dead
    /// or unknown player is fatal to the game.
    pub(crate) fn ensure_ballot_target(
        &self,
        voter: &str,
        ballot: &Option<String>,
        candidates: &[String],
    ) -> Result<(), GameError> {
        if let Some(target) = ballot {
            if !candidates.contains(target) {
                return Err(GameError::Invariant(format!(
                    "{voter} voted for dead or unknown player {target:?}"
                )));
            }
        }
        Ok(())
    }

    /// Last words from newly eliminated players, deduplicated by name
    pub(crate) async fn last_words(&mut self, names: &[String]) -> Result<(), GameError> {
        let mut seen: Vec<&String> = Vec::new();
        for name in names {
            if name.is_empty() || seen.contains(&name) || !self.registry.contains(name) {
                continue;
            }
            seen.push(name);

            self.announce(&format!("{name}, you have been eliminated. Any last words?"));
            let prompt = "You have been eliminated from the game. Leave your last words.";
            if let Some(Decision::Statement(base)) = self
                .ask_logged(name, prompt, "last_words", DecisionSchema::Statement)
                .await?
            {
                self.log.message(
                    "last_words",
                    name,
                    &base.thought,
                    &base.behavior,
                    &base.speech,
                    None,
                );
                self.round_records.push(PublicRecord::public(
                    name.clone(),
                    base.speech,
                    base.behavior,
                    "last_words",
                ));
            }
        }
        Ok(())
    }
}
