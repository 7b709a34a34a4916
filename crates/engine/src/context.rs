//! Per-player private context assembly
//!
//! Before every oracle call the orchestrator renders what this player is
//! allowed to know: their impressions of the living, their cross-game
//! knowledge, the werewolf roster (wolves only), the round's visible
//! records, and recent vote history. Werewolf-private records are filtered
//! out for everyone else here, and only here.

use howl_domain::{PublicRecord, RecordScope, VoteRecord};

use crate::registry::PlayerRegistry;

/// How many historical votes are rendered into a context
const RECENT_VOTES: usize = 8;

pub fn player_context(
    registry: &PlayerRegistry,
    player: &str,
    vote_history: &[VoteRecord],
    round_records: &[PublicRecord],
    round: u32,
    phase: &str,
) -> String {
    let is_wolf = registry.is_werewolf(player);

    let impression_lines: Vec<String> = registry
        .impressions_of(player, true)
        .into_iter()
        .map(|(name, text)| format!("{name}: {text}"))
        .collect();

    let record_lines: Vec<String> = round_records
        .iter()
        .filter(|rec| rec.scope != RecordScope::WolvesOnly || is_wolf)
        .filter_map(|rec| {
            let mut segment = format!("{}:", rec.player);
            if !rec.behavior.is_empty() {
                segment.push_str(&format!(" [{}]", rec.behavior));
            }
            if !rec.speech.is_empty() {
                segment.push_str(&format!(" {}", rec.speech));
            }
            (segment.len() > rec.player.len() + 1).then_some(segment)
        })
        .collect();

    let recent_votes: Vec<String> = vote_history
        .iter()
        .rev()
        .take(RECENT_VOTES)
        .rev()
        .map(|v| {
            format!(
                "round {} {}: {} -> {}",
                v.round,
                v.phase,
                v.voter,
                v.target.as_deref().unwrap_or("abstained/invalid"),
            )
        })
        .collect();

    let mut parts: Vec<String> = vec![
        format!("Current round: {round} ({phase})"),
        "Your impressions of the other living players:".to_string(),
        join_or(&impression_lines, "(none yet)"),
        "Your long-term understanding of the game (persists across games):".to_string(),
        {
            let knowledge = registry.knowledge(player);
            if knowledge.is_empty() {
                "(empty so far)".to_string()
            } else {
                knowledge.to_string()
            }
        },
    ];

    if is_wolf {
        let team_lines: Vec<String> = registry
            .wolf_team_status()
            .into_iter()
            .map(|(name, alive)| {
                format!("{name}: {}", if alive { "alive" } else { "eliminated" })
            })
            .collect();
        parts.push("Your confirmed werewolf teammates (including yourself):".to_string());
        parts.push(join_or(&team_lines, "(none)"));
        parts.push("Remember: werewolves always know their teammates.".to_string());
    }

    parts.push("Speech and actions visible to you this round:".to_string());
    parts.push(join_or(&record_lines, "(no public speech yet)"));
    parts.push(format!(
        "Public vote history (up to the last {RECENT_VOTES}):"
    ));
    parts.push(join_or(&recent_votes, "(no records yet)"));
    parts.push("Note: your private thought is never shown to other players.".to_string());

    parts.join("\n")
}

fn join_or(lines: &[String], fallback: &str) -> String {
    if lines.is_empty() {
        fallback.to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use howl_domain::Role;

    fn registry() -> PlayerRegistry {
        let mut registry = PlayerRegistry::new();
        registry.add_player("A", Role::Werewolf, "").expect("add");
        registry.add_player("B", Role::Werewolf, "").expect("add");
        registry
            .add_player("C", Role::Villager, "stay quiet early")
            .expect("add");
        registry
    }

    #[test]
    fn test_wolf_private_records_hidden_from_villagers() {
        let registry = registry();
        let records = vec![
            PublicRecord::wolves_only("A", "target C tonight", "", "wolf discussion"),
            PublicRecord::public("C", "good morning", "", "day discussion"),
        ];

        let villager_view = player_context(&registry, "C", &[], &records, 1, "day discussion");
        assert!(!villager_view.contains("target C tonight"));
        assert!(villager_view.contains("good morning"));

        let wolf_view = player_context(&registry, "A", &[], &records, 1, "wolf discussion");
        assert!(wolf_view.contains("target C tonight"));
    }

    #[test]
    fn test_wolf_team_roster_only_for_wolves() {
        let registry = registry();
        let wolf_view = player_context(&registry, "A", &[], &[], 1, "night");
        assert!(wolf_view.contains("werewolf teammates"));
        assert!(wolf_view.contains("B: alive"));

        let villager_view = player_context(&registry, "C", &[], &[], 1, "night");
        assert!(!villager_view.contains("werewolf teammates"));
    }

    #[test]
    fn test_recent_votes_are_capped() {
        let registry = registry();
        let votes: Vec<VoteRecord> = (1..=12)
            .map(|n| VoteRecord {
                round: n,
                phase: "day vote".to_string(),
                voter: "A".to_string(),
                target: Some("C".to_string()),
            })
            .collect();
        let view = player_context(&registry, "C", &votes, &[], 12, "day vote");
        assert!(!view.contains("round 4 day vote"));
        assert!(view.contains("round 5 day vote"));
        assert!(view.contains("round 12 day vote"));
    }

    #[test]
    fn test_knowledge_is_rendered() {
        let registry = registry();
        let view = player_context(&registry, "C", &[], &[], 1, "reflection");
        assert!(view.contains("stay quiet early"));
    }
}
