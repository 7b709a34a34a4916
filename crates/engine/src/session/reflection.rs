//! End-of-round reflection
//!
//! Every living player privately revises their impressions of the others
//! and their cross-game knowledge. Both requests fan out concurrently per
//! player; the results are folded into the registry in registration order
//! and persisted best-effort.

use std::time::Duration;

use howl_domain::{Decision, DecisionSchema, Role};

use crate::oracle::{DecisionRequest, OracleError};

use super::{GameError, GameSession};

struct ReflectionResult {
    player: String,
    reflection: Result<Decision, OracleError>,
    knowledge: Result<Decision, OracleError>,
}

impl GameSession {
    pub(crate) async fn reflection_phase(&mut self) -> Result<(), GameError> {
        let players = self.registry.alive_names();
        if players.is_empty() {
            return Ok(());
        }

        let results = self.gather_reflections(&players).await;
        self.check_stop()?;

        for result in results {
            match result.reflection {
                Ok(Decision::Reflection(reflection)) => {
                    self.registry
                        .apply_impression_updates(&result.player, &reflection.impression_updates);
                    let impressions = self.registry.impressions_of(&result.player, true);
                    self.log.reflection(
                        self.round,
                        &result.player,
                        &reflection.thought,
                        &impressions,
                    );
                }
                Ok(other) => {
                    return Err(GameError::Invariant(format!(
                        "{} answered the reflection with a {} decision",
                        result.player,
                        other.label()
                    )));
                }
                Err(e) => self.note_oracle_fault(&result.player, "reflection", &e),
            }

            match result.knowledge {
                Ok(Decision::KnowledgeUpdate(update)) => {
                    self.registry
                        .update_knowledge(&result.player, update.knowledge.clone());
                    self.archive.update(&result.player, &update.knowledge);
                }
                Ok(other) => {
                    return Err(GameError::Invariant(format!(
                        "{} answered the knowledge update with a {} decision",
                        result.player,
                        other.label()
                    )));
                }
                Err(e) => self.note_oracle_fault(&result.player, "knowledge_update", &e),
            }
        }

        // Persist so a later crash loses at most one round of knowledge
        if let Err(e) = self.archive.flush() {
            tracing::warn!(error = %e, "knowledge archive flush failed");
        }
        Ok(())
    }

    /// Concurrent per-player gather of the reflection pair. Results come
    /// back in the order of `players`, never in completion order.
    async fn gather_reflections(&self, players: &[String]) -> Vec<ReflectionResult> {
        let futures: Vec<_> = players
            .iter()
            .map(|name| {
                let name = name.clone();
                let is_wolf = self.registry.role_of(&name) == Some(Role::Werewolf);
                async move {
                    if self.stop.is_cancelled() {
                        let cancelled = || OracleError::Provider("stop signal set".to_string());
                        return ReflectionResult {
                            player: name,
                            reflection: Err(cancelled()),
                            knowledge: Err(cancelled()),
                        };
                    }
                    let delay = {
                        let mut rng = rand::thread_rng();
                        rand::Rng::gen_range(&mut rng, 0..=self.config.stagger_ms)
                    };
                    tokio::time::sleep(Duration::from_millis(delay)).await;

                    let context = self.context_for(&name, "reflection");
                    let wolf_note = if is_wolf {
                        " As a werewolf you know all of your teammates, \
                         including the eliminated ones."
                    } else {
                        ""
                    };
                    let reflection = self
                        .oracle
                        .decide(DecisionRequest::new(
                            &name,
                            format!(
                                "The round has ended. Revise your impressions of \
                                 the other living players. Name only the players \
                                 whose impression changed; the rest keep their \
                                 previous value. Your thought stays private.{wolf_note}"
                            ),
                            context.clone(),
                            DecisionSchema::Reflection,
                        ))
                        .await;

                    let knowledge = self
                        .oracle
                        .decide(DecisionRequest::new(
                            &name,
                            "Without leaking any specific speech or vote of this \
                             match, distill what you have learned into reusable \
                             understanding of the game. It will be stored as your \
                             personal experience and handed back to you in future \
                             games.",
                            context,
                            DecisionSchema::KnowledgeUpdate,
                        ))
                        .await;

                    ReflectionResult {
                        player: name,
                        reflection,
                        knowledge,
                    }
                }
            })
            .collect();

        futures_util::future::join_all(futures).await
    }
}
