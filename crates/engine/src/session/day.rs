//! Day sub-phases
//!
//! Discussion is sequential so each speaker sees the turns before theirs.
//! The vote fans out across every living player; ballots are folded and
//! logged in registration order only after the whole gather completes, so
//! the emitted event order never depends on oracle latency.

use std::collections::BTreeSet;

use howl_domain::{resolve, Decision, DecisionSchema, PublicRecord, Role, VoteRecord};

use super::{GameError, GameSession, PK_MAX_ROUNDS};

impl GameSession {
    /// Every living player speaks once, in registration order
    pub(crate) async fn day_discussion(&mut self) -> Result<(), GameError> {
        self.announce("The village gathers to discuss. Everyone will speak once.");
        let speakers = self.registry.alive_names();
        for speaker in speakers {
            self.check_stop()?;
            let prompt = "It is your turn to address the village. Share your \
                          read of the situation.";
            if let Some(Decision::Statement(base)) = self
                .ask_logged(&speaker, prompt, "day_discussion", DecisionSchema::Statement)
                .await?
            {
                self.log.message(
                    "day_discussion",
                    &speaker,
                    &base.thought,
                    &base.behavior,
                    &base.speech,
                    None,
                );
                self.round_records.push(PublicRecord::public(
                    speaker,
                    base.speech,
                    base.behavior,
                    "day_discussion",
                ));
            }
        }
        Ok(())
    }

    /// Day vote with the PK runoff protocol. Returns the eliminated player,
    /// if any.
    pub(crate) async fn day_vote_with_runoff(&mut self) -> Result<Option<String>, GameError> {
        self.check_stop()?;
        let voters = self.registry.alive_names();
        let candidates = voters.clone();
        self.announce(&format!(
            "Time to vote. Choose who to eliminate from: {}. You may abstain.",
            candidates.join(", "),
        ));

        let mut round_votes: Vec<VoteRecord> = Vec::new();
        let ballots = self
            .collect_ballots(
                &voters,
                &candidates,
                true,
                "day vote",
                "day_vote",
                "Cast your vote for today's elimination, or abstain.",
                &mut round_votes,
            )
            .await?;

        let mut outcome = resolve(&ballots);
        let mut voted_out = outcome.winner.clone();
        let mut pk_round: u32 = 0;

        while voted_out.is_none() && outcome.top_candidates.len() > 1 {
            pk_round += 1;
            let tied: Vec<String> = outcome.top_candidates.iter().cloned().collect();
            self.announce(&format!(
                "The vote is tied between {} (runoff round {pk_round}). The tied \
                 players will speak once more, then everyone revotes among them only.",
                tied.join(", "),
            ));

            self.pk_speeches(&tied, pk_round).await?;

            let pk_phase_label = format!("pk vote #{pk_round}");
            let pk_voters = self.registry.alive_names();
            let pk_ballots = self
                .collect_ballots(
                    &pk_voters,
                    &tied,
                    false,
                    &pk_phase_label,
                    "pk_vote",
                    &format!(
                        "Runoff vote: you must choose one of the tied players: {}. \
                         Abstention is not allowed.",
                        tied.join(", "),
                    ),
                    &mut round_votes,
                )
                .await?;

            outcome = resolve(&pk_ballots);
            voted_out = outcome.winner.clone();

            match &voted_out {
                Some(winner) => {
                    self.log.vote_result(
                        &format!("pk_vote_result #{pk_round}"),
                        winner,
                        &outcome.tally,
                        "voted out",
                    );
                    self.announce(&format!(
                        "Runoff round {pk_round} result ({}): {winner} is eliminated.",
                        outcome.tally,
                    ));
                }
                None if outcome.top_candidates.len() > 1 => {
                    self.log.vote_result(
                        &format!("pk_vote_result #{pk_round}"),
                        "no one",
                        &outcome.tally,
                        "still tied",
                    );
                    self.announce(&format!(
                        "Runoff round {pk_round} is tied again ({}) between {}.",
                        outcome.tally,
                        outcome
                            .top_candidates
                            .iter()
                            .cloned()
                            .collect::<Vec<_>>()
                            .join(", "),
                    ));
                }
                None => {}
            }

            if voted_out.is_none()
                && pk_round >= PK_MAX_ROUNDS
                && outcome.top_candidates.len() > 1
            {
                // Deterministic fallback, announced as an arbitration rather
                // than a normal elimination
                voted_out = pick_lexicographic_first(&outcome.top_candidates);
                if let Some(chosen) = &voted_out {
                    self.log.action(
                        "pk_arbitration",
                        &format!(
                            "still tied after {pk_round} runoff rounds; {chosen} is \
                             eliminated by name order as a fallback"
                        ),
                    );
                    self.announce(&format!(
                        "After {pk_round} tied runoff rounds, the moderator applies \
                         the fallback rule: {chosen} is eliminated by name order. \
                         This is an arbitration, not a normal vote result.",
                    ));
                }
                break;
            }
        }

        // The PK ballots join the public history alongside the day vote
        self.vote_history.append(&mut round_votes);

        match &voted_out {
            Some(victim) => {
                self.log
                    .vote_result("day_vote_result", victim, &outcome.tally, "voted out");
                self.announce(&format!(
                    "The vote is settled ({}): {victim} is eliminated.",
                    outcome.tally,
                ));
            }
            None => {
                self.log
                    .vote_result("day_vote_result", "no one", &outcome.tally, "no elimination");
                self.announce(&format!(
                    "The vote ends with no elimination ({}).",
                    outcome.tally,
                ));
            }
        }

        Ok(voted_out)
    }

    /// Each tied-and-living candidate speaks once more before the revote
    async fn pk_speeches(&mut self, tied: &[String], pk_round: u32) -> Result<(), GameError> {
        let phase = format!("pk_speech #{pk_round}");
        for candidate in tied {
            self.check_stop()?;
            if !self.registry.is_alive(candidate) {
                continue;
            }
            let prompt = "You are tied in the vote. Make one more statement in \
                          your defense before the runoff.";
            if let Some(Decision::Statement(base)) = self
                .ask_logged(candidate, prompt, &phase, DecisionSchema::Statement)
                .await?
            {
                self.log.message(
                    &phase,
                    candidate,
                    &base.thought,
                    &base.behavior,
                    &base.speech,
                    Some(&format!("runoff round {pk_round}")),
                );
                self.round_records.push(PublicRecord::public(
                    candidate.clone(),
                    base.speech,
                    base.behavior,
                    phase.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Fan out one vote request per voter, then fold ballots back in
    /// registration order: validate targets, log each ballot, and append to
    /// the public record being built for this round.
    async fn collect_ballots(
        &mut self,
        voters: &[String],
        candidates: &[String],
        allow_abstain: bool,
        phase_label: &str,
        category: &str,
        prompt: &str,
        round_votes: &mut Vec<VoteRecord>,
    ) -> Result<Vec<Option<String>>, GameError> {
        let schema = DecisionSchema::Vote {
            candidates: candidates.to_vec(),
            allow_abstain,
        };
        let gathered = self.fan_out(voters, prompt, category, schema).await;
        self.check_stop()?;

        let mut ballots: Vec<Option<String>> = Vec::new();
        for (voter, result) in gathered {
            let ballot = match result {
                Ok(Decision::Vote(decision)) => {
                    let ballot = Self::ballot_of(&decision);
                    self.ensure_ballot_target(&voter, &ballot, candidates)?;
                    match &ballot {
                        Some(target) => self.log.vote(
                            category,
                            &voter,
                            target,
                            &decision.base.thought,
                            &decision.base.behavior,
                            &decision.base.speech,
                        ),
                        None => self.log.message(
                            category,
                            &voter,
                            &decision.base.thought,
                            &decision.base.behavior,
                            &decision.base.speech,
                            Some(if allow_abstain {
                                "abstained"
                            } else {
                                "abstained (a choice was required)"
                            }),
                        ),
                    }
                    ballot
                }
                Ok(other) => {
                    return Err(GameError::Invariant(format!(
                        "{voter} answered the vote with a {} decision",
                        other.label()
                    )));
                }
                Err(e) => {
                    self.note_oracle_fault(&voter, category, &e);
                    None
                }
            };

            round_votes.push(VoteRecord {
                round: self.round,
                phase: phase_label.to_string(),
                voter,
                target: ballot.clone(),
            });
            ballots.push(ballot);
        }
        Ok(ballots)
    }

    /// If the day's victim is the hunter with an unused shot, they fire one
    /// last time. Returns the extra death.
    pub(crate) async fn hunter_day_shot(
        &mut self,
        voted_out: Option<&str>,
    ) -> Result<Option<String>, GameError> {
        let Some(victim) = voted_out else {
            return Ok(None);
        };
        if self.registry.role_of(victim) != Some(Role::Hunter) {
            return Ok(None);
        }
        let candidates = self.registry.alive_names();
        self.hunter_shot(victim, &candidates).await
    }
}

fn pick_lexicographic_first(tied: &BTreeSet<String>) -> Option<String> {
    tied.iter().next().cloned()
}
