//! Game runtime service
//!
//! Owns the lifecycle of the single active game: at most one game runs at a
//! time, the game task is spawned off the caller's context so request
//! handling never blocks on a round, cancellation is exposed as a stop
//! call, and the terminal status (with a retained error message for the
//! errored case) is queryable at any time.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use howl_domain::{GameEvent, GameId, GameStatus};

use crate::bus::SharedEventBus;
use crate::config::EngineConfig;
use crate::knowledge::JsonKnowledgeArchive;
use crate::oracle::DecisionOracle;
use crate::session::{run_game, GameArtifacts, SessionDeps};

/// Errors surfaced by the service API
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("a game is already running")]
    AlreadyRunning,
}

#[derive(Default)]
struct RuntimeState {
    status: Option<GameStatus>,
    game_id: Option<GameId>,
    stop: Option<CancellationToken>,
    artifacts: Option<GameArtifacts>,
    last_error: Option<String>,
    handle: Option<JoinHandle<()>>,
}

/// Queryable snapshot of the runtime
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub status: GameStatus,
    pub game_id: Option<GameId>,
    pub log_path: Option<std::path::PathBuf>,
    pub experience_path: Option<std::path::PathBuf>,
    /// Retained only for the errored case
    pub last_error: Option<String>,
}

struct Inner {
    config: EngineConfig,
    oracle: Arc<dyn DecisionOracle>,
    bus: SharedEventBus,
    state: Mutex<RuntimeState>,
}

/// Handle to the game runtime; cheap to clone
#[derive(Clone)]
pub struct GameService {
    inner: Arc<Inner>,
}

impl GameService {
    pub fn new(config: EngineConfig, oracle: Arc<dyn DecisionOracle>, bus: SharedEventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                oracle,
                bus,
                state: Mutex::new(RuntimeState::default()),
            }),
        }
    }

    pub fn bus(&self) -> &SharedEventBus {
        &self.inner.bus
    }

    /// Start a new game in its own task. Fails if one is already running.
    pub fn start(&self) -> Result<GameId, ServiceError> {
        let game_id = GameId::new();
        let stop = CancellationToken::new();

        {
            let mut state = lock(&self.inner.state);
            if state.status == Some(GameStatus::Running) {
                return Err(ServiceError::AlreadyRunning);
            }
            state.status = Some(GameStatus::Running);
            state.game_id = Some(game_id);
            state.stop = Some(stop.clone());
            state.artifacts = None;
            state.last_error = None;
        }

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            inner.bus.publish(
                GameEvent::system(format!("Game starting (id {game_id})"))
                    .stamped(game_id.to_string(), 0),
            );

            let archive = match JsonKnowledgeArchive::create(
                &inner.config.experience_dir,
                &inner.config.experience_id,
            ) {
                Ok(archive) => archive,
                Err(e) => {
                    tracing::error!(error = %e, "could not create knowledge archive");
                    inner.bus.publish(
                        GameEvent::game_error(format!("Game failed to start: {e}"))
                            .stamped(game_id.to_string(), 0),
                    );
                    let mut state = lock(&inner.state);
                    state.status = Some(GameStatus::Errored);
                    state.last_error = Some(e.to_string());
                    return;
                }
            };

            let deps = SessionDeps {
                oracle: inner.oracle.clone(),
                archive: Box::new(archive),
                bus: inner.bus.clone(),
                config: inner.config.clone(),
                roster: None,
            };
            let outcome = run_game(game_id, deps, stop).await;

            let mut state = lock(&inner.state);
            state.status = Some(outcome.status);
            state.artifacts = Some(outcome.artifacts);
            state.last_error = outcome.error;
        });

        lock(&self.inner.state).handle = Some(handle);
        Ok(game_id)
    }

    /// Request cancellation of the running game, if any. The game unwinds at
    /// its next phase-boundary check and reports the terminated status.
    pub fn stop(&self) {
        let state = lock(&self.inner.state);
        if let (Some(token), Some(game_id)) = (&state.stop, state.game_id) {
            if state.status == Some(GameStatus::Running) {
                self.inner.bus.publish(
                    GameEvent::system("Stop requested").stamped(game_id.to_string(), 0),
                );
                token.cancel();
            }
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        let state = lock(&self.inner.state);
        StatusSnapshot {
            status: state.status.unwrap_or(GameStatus::Idle),
            game_id: state.game_id,
            log_path: state.artifacts.as_ref().map(|a| a.log_path.clone()),
            experience_path: state
                .artifacts
                .as_ref()
                .and_then(|a| a.experience_path.clone()),
            last_error: state.last_error.clone(),
        }
    }

    /// Wait for the current game task to finish, if one was started
    pub async fn wait(&self) {
        let handle = lock(&self.inner.state).handle.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "game task panicked");
                let mut state = lock(&self.inner.state);
                state.status = Some(GameStatus::Errored);
                state.last_error = Some(e.to_string());
            }
        }
    }
}

fn lock(state: &Mutex<RuntimeState>) -> std::sync::MutexGuard<'_, RuntimeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::bus::EventBus;
    use crate::testing::StubOracle;

    fn service_with(config: EngineConfig) -> GameService {
        let bus: SharedEventBus = Arc::new(EventBus::default());
        // Answers every request with a bare statement; votes abstain. Games
        // run to the round cap, which is enough for lifecycle tests.
        let oracle = Arc::new(StubOracle::abstaining());
        GameService::new(config, oracle, bus)
    }

    fn tmp_config(dir: &std::path::Path) -> EngineConfig {
        EngineConfig {
            max_game_rounds: 1,
            stagger_ms: 0,
            log_dir: dir.join("logs"),
            experience_dir: dir.join("exp"),
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_only_one_game_at_a_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = service_with(tmp_config(dir.path()));

        service.start().expect("first start");
        assert!(matches!(
            service.start(),
            Err(ServiceError::AlreadyRunning)
        ));
        service.wait().await;

        // After the first game ends, a new one may start
        assert_ne!(service.status().status, GameStatus::Running);
        service.start().expect("second start");
        service.wait().await;
    }

    #[tokio::test]
    async fn test_stop_produces_terminated_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = tmp_config(dir.path());
        config.max_game_rounds = 30;
        config.stagger_ms = 50;
        let service = service_with(config);

        service.start().expect("start");
        tokio::time::sleep(Duration::from_millis(20)).await;
        service.stop();
        service.wait().await;

        let snapshot = service.status();
        assert_eq!(snapshot.status, GameStatus::Terminated);
        assert!(snapshot.last_error.is_none());
    }

    #[tokio::test]
    async fn test_finished_game_reports_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = service_with(tmp_config(dir.path()));
        service.start().expect("start");
        service.wait().await;

        let snapshot = service.status();
        assert_eq!(snapshot.status, GameStatus::Finished);
        assert!(snapshot.log_path.expect("log path").exists());
        assert!(snapshot.experience_path.expect("experience path").exists());
    }
}
