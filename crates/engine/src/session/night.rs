//! Night sub-phases
//!
//! All night steps are strictly sequential. The werewolf discussion and
//! vote are serialized on purpose: concurrent calls would let later wolves
//! see nothing of earlier turns while a shared hub would invite
//! vote-following.

use howl_domain::{resolve, Decision, DecisionSchema, PublicRecord, Role};

use super::{GameError, GameSession};

impl GameSession {
    /// Werewolf team discussion: a round-robin of up to
    /// `max_discussion_rounds * wolf_count` turns, ended early when a
    /// teammate-boundary turn declares agreement.
    pub(crate) async fn wolf_discussion(&mut self) -> Result<(), GameError> {
        let wolves = self.registry.alive_with_role(Role::Werewolf);
        let n = wolves.len();
        if n == 0 {
            return Ok(());
        }

        let cap = self.config.max_discussion_rounds as usize * n;
        for turn in 1..=cap {
            self.check_stop()?;
            let wolf = wolves[turn % n].clone();
            let prompt = format!(
                "It is the werewolves' secret discussion (turn {turn}). Confer \
                 with your teammates about tonight's target. After the team is \
                 done, the witch and the seer act before the night ends."
            );
            let Some(Decision::Discussion(decision)) = self
                .ask_logged(&wolf, &prompt, "wolf_discussion", DecisionSchema::Discussion)
                .await?
            else {
                continue;
            };

            self.log.message(
                "wolf_discussion",
                &wolf,
                &decision.base.thought,
                &decision.base.behavior,
                &decision.base.speech,
                None,
            );
            // Night chatter stays within the pack
            self.round_records.push(PublicRecord::wolves_only(
                wolf,
                decision.base.speech,
                decision.base.behavior,
                "wolf_discussion",
            ));

            if turn % n == 0 && decision.reach_agreement {
                break;
            }
        }
        Ok(())
    }

    /// Werewolf kill vote, one sequential decision per wolf. Abstention is
    /// against the team's interest but tolerated; it is logged as anomalous.
    /// Returns the kill target, if the vote produced a unique one.
    pub(crate) async fn wolf_vote(&mut self) -> Result<Option<String>, GameError> {
        let wolves = self.registry.alive_with_role(Role::Werewolf);
        let candidates = self.registry.alive_names();
        let mut ballots: Vec<Option<String>> = Vec::new();

        for wolf in &wolves {
            self.check_stop()?;
            let prompt = "Werewolves, it is time to choose tonight's target. \
                          Cast your vote; a target is required.";
            let schema = DecisionSchema::Vote {
                candidates: candidates.clone(),
                allow_abstain: false,
            };
            match self.ask_logged(wolf, prompt, "wolf_vote", schema).await? {
                Some(Decision::Vote(decision)) => {
                    let ballot = Self::ballot_of(&decision);
                    self.ensure_ballot_target(wolf, &ballot, &candidates)?;
                    match &ballot {
                        Some(target) => self.log.vote(
                            "wolf_vote",
                            wolf,
                            target,
                            &decision.base.thought,
                            &decision.base.behavior,
                            &decision.base.speech,
                        ),
                        None => self.log.message(
                            "wolf_vote",
                            wolf,
                            &decision.base.thought,
                            &decision.base.behavior,
                            &decision.base.speech,
                            Some("no target chosen (a target was required)"),
                        ),
                    }
                    ballots.push(ballot);
                }
                _ => ballots.push(None),
            }
        }

        let outcome = resolve(&ballots);
        self.log.vote_result(
            "wolf_vote_result",
            outcome.winner.as_deref().unwrap_or("no one"),
            &outcome.tally,
            if outcome.winner.is_some() {
                "chosen as the kill target"
            } else {
                "no kill tonight"
            },
        );
        // Deferred result broadcast, visible to the pack only
        self.round_records.push(PublicRecord::wolves_only(
            "Moderator",
            match &outcome.winner {
                Some(target) => format!(
                    "Werewolf vote result ({}): {target} is tonight's target.",
                    outcome.tally
                ),
                None => format!(
                    "Werewolf vote result ({}): no agreement, no kill tonight.",
                    outcome.tally
                ),
            },
            "",
            "wolf_vote_result",
        ));

        Ok(outcome.winner)
    }

    /// Witch turn: a heal offer for the wolves' victim, then a poison offer.
    /// At most one potion per round; the heal is never offered for the witch
    /// herself.
    pub(crate) async fn witch_turn(
        &mut self,
        mut wolf_kill: Option<String>,
    ) -> Result<(Option<String>, Option<String>), GameError> {
        self.check_stop()?;
        let mut poisoned: Option<String> = None;

        let witches = self.registry.alive_with_role(Role::Witch);
        for witch in witches {
            let mut healed_this_round = false;

            let heal_offer = match &wolf_kill {
                Some(victim) if *victim != witch => {
                    let has_heal = self
                        .registry
                        .player(&witch)
                        .map(|p| p.heal_available())
                        .unwrap_or(false);
                    has_heal.then(|| victim.clone())
                }
                _ => None,
            };

            if let Some(victim) = heal_offer {
                let prompt = format!(
                    "You are the witch. Tonight the werewolves killed {victim}. \
                     Will you spend your only heal potion to save them?"
                );
                let schema = DecisionSchema::WitchHeal {
                    kill_target: victim.clone(),
                };
                if let Some(Decision::WitchHeal(decision)) = self
                    .ask_logged(&witch, &prompt, "witch_heal", schema)
                    .await?
                {
                    self.log.message(
                        "witch_heal",
                        &witch,
                        &decision.base.thought,
                        &decision.base.behavior,
                        &decision.base.speech,
                        None,
                    );
                    if decision.heal {
                        if let Some(player) = self.registry.player_mut(&witch) {
                            player.consume_heal().map_err(GameError::Domain)?;
                        }
                        self.log
                            .action("witch_heal", &format!("used the heal potion to save {victim}"));
                        wolf_kill = None;
                        healed_this_round = true;
                    }
                }
            }

            let has_poison = self
                .registry
                .player(&witch)
                .map(|p| p.poison_available())
                .unwrap_or(false);
            if has_poison && !healed_this_round {
                let candidates = self.registry.alive_names();
                let prompt = "You are the witch. Will you use your only poison \
                              tonight? Choose a target, or decline.";
                let schema = DecisionSchema::WitchPoison {
                    candidates: candidates.clone(),
                };
                if let Some(Decision::WitchPoison(decision)) = self
                    .ask_logged(&witch, prompt, "witch_poison", schema)
                    .await?
                {
                    self.log.message(
                        "witch_poison",
                        &witch,
                        &decision.base.thought,
                        &decision.base.behavior,
                        &decision.base.speech,
                        None,
                    );
                    if decision.poison {
                        if let Some(target) = decision.target.as_deref().map(str::trim) {
                            if let Some(player) = self.registry.player_mut(&witch) {
                                player.consume_poison().map_err(GameError::Domain)?;
                            }
                            self.log
                                .action("witch_poison", &format!("poisoned {target}"));
                            poisoned = Some(target.to_string());
                        }
                    }
                }
            }
        }

        Ok((wolf_kill, poisoned))
    }

    /// Seer turn: one private identity check per round. The result goes into
    /// the seer's journal and reaches only the seer through their context.
    pub(crate) async fn seer_turn(&mut self) -> Result<(), GameError> {
        let seers = self.registry.alive_with_role(Role::Seer);
        for seer in seers {
            let candidates = self.registry.alive_names();
            let prompt = "You are the seer. Choose one living player whose true \
                          identity you want revealed tonight.";
            let schema = DecisionSchema::SeerCheck {
                candidates: candidates.clone(),
            };
            if let Some(Decision::SeerCheck(decision)) = self
                .ask_logged(&seer, prompt, "seer_check", schema)
                .await?
            {
                self.log.message(
                    "seer_check",
                    &seer,
                    &decision.base.thought,
                    &decision.base.behavior,
                    &decision.base.speech,
                    None,
                );
                let subject = decision.target.trim().to_string();
                if let Some(role) = self.registry.role_of(&subject) {
                    if let Some(player) = self.registry.player_mut(&seer) {
                        player.record_check(&subject, role).map_err(GameError::Domain)?;
                    }
                    self.log
                        .action("seer_check", &format!("checked {subject}: {role}"));
                }
            }
        }
        Ok(())
    }

    /// A hunter among tonight's wolf kills (and not poisoned) fires one
    /// dying shot before the deaths are announced. Returns the extra deaths.
    pub(crate) async fn hunter_night_shots(
        &mut self,
        wolf_kill: Option<&str>,
        poisoned: Option<&str>,
    ) -> Result<Vec<String>, GameError> {
        let mut shots: Vec<String> = Vec::new();

        let hunters = self.registry.alive_with_role(Role::Hunter);
        for hunter in hunters {
            let taken_by_wolves = wolf_kill == Some(hunter.as_str());
            let also_poisoned = poisoned == Some(hunter.as_str());
            if !taken_by_wolves || also_poisoned {
                continue;
            }
            let death_set: Vec<&str> = wolf_kill.iter().chain(poisoned.iter()).copied().collect();
            let candidates: Vec<String> = self
                .registry
                .alive_names()
                .into_iter()
                .filter(|name| !death_set.contains(&name.as_str()))
                .collect();
            if candidates.is_empty() {
                continue;
            }
            if let Some(target) = self.hunter_shot(&hunter, &candidates).await? {
                shots.push(target);
            }
        }
        Ok(shots)
    }

    /// Shared hunter shot: solicit the decision, consume the one-shot
    /// ability, and announce the kill.
    pub(crate) async fn hunter_shot(
        &mut self,
        hunter: &str,
        candidates: &[String],
    ) -> Result<Option<String>, GameError> {
        let available = self
            .registry
            .player(hunter)
            .map(|p| p.shot_available())
            .unwrap_or(false);
        if !available {
            return Ok(None);
        }

        let prompt = "You are the hunter and you are dying. You may fire one \
                      last shot and take a player down with you, or hold fire.";
        let schema = DecisionSchema::HunterShot {
            candidates: candidates.to_vec(),
        };
        let Some(Decision::HunterShot(decision)) = self
            .ask_logged(hunter, prompt, "hunter_shot", schema)
            .await?
        else {
            return Ok(None);
        };

        self.log.message(
            "hunter_shot",
            hunter,
            &decision.base.thought,
            &decision.base.behavior,
            &decision.base.speech,
            None,
        );

        if !decision.shoot {
            return Ok(None);
        }
        let Some(target) = decision.target.as_deref().map(str::trim) else {
            return Ok(None);
        };

        if let Some(player) = self.registry.player_mut(hunter) {
            player.consume_shot().map_err(GameError::Domain)?;
        }
        self.log
            .action("hunter_shot", &format!("the hunter {hunter} shot {target}"));
        self.announce(&format!(
            "A shot rings out: the hunter {hunter} takes {target} down with them."
        ));
        Ok(Some(target.to_string()))
    }
}
