//! Plurality vote resolution
//!
//! Pure aggregation: identical multisets of ballots always resolve the same
//! way regardless of input order. Targets are whitespace-trimmed and compared
//! case-sensitively; abstention keywords are matched case-insensitively.

use std::collections::{BTreeMap, BTreeSet};

/// Ballots matching any of these (case-insensitively, after trimming) count
/// as abstentions. `弃权` is the localized abstain keyword accepted from
/// models that answer in Chinese.
pub const ABSTAIN_KEYWORDS: &[&str] = &[
    "abstain", "skip", "pass", "no vote", "novote", "none", "", "弃权",
];

/// Whether a ballot indicates abstention or is otherwise invalid
pub fn is_abstain(vote: Option<&str>) -> bool {
    match vote {
        None => true,
        Some(raw) => {
            let trimmed = raw.trim().to_lowercase();
            ABSTAIN_KEYWORDS.contains(&trimmed.as_str())
        }
    }
}

/// Result of resolving one round of ballots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    /// The single top candidate, if the plurality is unique
    pub winner: Option<String>,
    /// Human-readable tally summary
    pub tally: String,
    /// Every target achieving the maximum count; empty when nobody received
    /// a valid vote. The caller runs a tie-break protocol when it holds more
    /// than one name.
    pub top_candidates: BTreeSet<String>,
}

impl VoteOutcome {
    fn empty(tally: impl Into<String>) -> Self {
        Self {
            winner: None,
            tally: tally.into(),
            top_candidates: BTreeSet::new(),
        }
    }
}

/// Resolve a list of ballots into (winner-or-none, tally, top-candidate set)
pub fn resolve(votes: &[Option<String>]) -> VoteOutcome {
    if votes.is_empty() {
        return VoteOutcome::empty("no one voted");
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut abstain_count = 0usize;

    for vote in votes {
        if is_abstain(vote.as_deref()) {
            abstain_count += 1;
            continue;
        }
        if let Some(raw) = vote {
            *counts.entry(raw.trim().to_string()).or_insert(0) += 1;
        }
    }

    if counts.is_empty() {
        return VoteOutcome::empty(format!(
            "everyone abstained or cast invalid votes ({abstain_count})"
        ));
    }

    let mut parts: Vec<String> = counts
        .iter()
        .map(|(name, count)| format!("{name}: {count}"))
        .collect();
    if abstain_count > 0 {
        parts.push(format!("abstained/invalid: {abstain_count}"));
    }
    let tally = parts.join(", ");

    let max = counts.values().copied().max().unwrap_or(0);
    let top_candidates: BTreeSet<String> = counts
        .iter()
        .filter(|(_, count)| **count == max)
        .map(|(name, _)| name.clone())
        .collect();

    let winner = if top_candidates.len() == 1 {
        top_candidates.iter().next().cloned()
    } else {
        None
    };

    VoteOutcome {
        winner,
        tally,
        top_candidates,
    }
}
