//! Whole-game scenarios driven by scripted oracles
//!
//! Each test runs `run_game` against a deterministic oracle and asserts on
//! the terminal outcome plus the event stream captured from the bus.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use howl_domain::{
    Decision, DecisionSchema, EventKind, GameEvent, GameId, GameStatus, Role,
};
use howl_engine::oracle::DecisionRequest;
use howl_engine::testing::{default_decision, vote_for, MemoryArchive, StubOracle};
use howl_engine::{run_game, EngineConfig, EventBus, GameOutcome, SessionDeps, SharedEventBus};

fn roster() -> Vec<(String, Role)> {
    vec![
        ("A".to_string(), Role::Werewolf),
        ("B".to_string(), Role::Werewolf),
        ("C".to_string(), Role::Werewolf),
        ("D".to_string(), Role::Villager),
        ("E".to_string(), Role::Villager),
        ("F".to_string(), Role::Villager),
        ("G".to_string(), Role::Seer),
        ("H".to_string(), Role::Witch),
        ("I".to_string(), Role::Hunter),
    ]
}

fn is_wolf_vote(request: &DecisionRequest) -> bool {
    matches!(request.schema, DecisionSchema::Vote { .. })
        && request.prompt.contains("Werewolves")
}

async fn run_scripted(
    oracle: StubOracle,
    config: EngineConfig,
    stop: CancellationToken,
) -> (GameOutcome, Vec<GameEvent>) {
    let bus: SharedEventBus = Arc::new(EventBus::new(500, 1000));
    let mut subscription = bus.subscribe();

    let deps = SessionDeps {
        oracle: Arc::new(oracle),
        archive: Box::new(MemoryArchive::new()),
        bus,
        config,
        roster: Some(roster()),
    };
    let outcome = run_game(GameId::new(), deps, stop).await;

    let mut events = Vec::new();
    while let Ok(event) = subscription.receiver.try_recv() {
        events.push(event);
    }
    (outcome, events)
}

fn quick_config(dir: &std::path::Path) -> EngineConfig {
    EngineConfig {
        max_game_rounds: 1,
        stagger_ms: 0,
        log_dir: dir.to_path_buf(),
        ..EngineConfig::default()
    }
}

fn system_contents(events: &[GameEvent]) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.kind == EventKind::System)
        .filter_map(|e| e.content.clone())
        .collect()
}

#[tokio::test]
async fn first_round_kill_and_elimination() {
    let dir = tempfile::tempdir().expect("tempdir");

    // Wolves vote [D, D, E]; the village then votes out E; everyone else
    // takes the no-op action.
    let oracle = StubOracle::new(|request| {
        if is_wolf_vote(request) {
            return Ok(match request.player.as_str() {
                "A" | "B" => vote_for("D"),
                _ => vote_for("E"),
            });
        }
        if matches!(request.schema, DecisionSchema::Vote { .. }) {
            return Ok(vote_for("E"));
        }
        Ok(default_decision(&request.schema))
    });

    let (outcome, events) =
        run_scripted(oracle, quick_config(dir.path()), CancellationToken::new()).await;

    assert_eq!(outcome.status, GameStatus::Finished);
    assert!(outcome.error.is_none());
    assert!(outcome.artifacts.log_path.exists());

    let contents = system_contents(&events);

    // Wolf vote resolved with the expected tally and a unique winner
    assert!(
        contents
            .iter()
            .any(|c| c.contains("wolf_vote_result") && c.contains("D: 2, E: 1")),
        "missing wolf vote tally: {contents:?}"
    );

    // D died at night, E was voted out by day
    let night_deaths = events
        .iter()
        .find(|e| {
            e.content
                .as_deref()
                .is_some_and(|c| c.starts_with("night_deaths"))
        })
        .expect("night deaths event");
    let dead: Vec<&str> = night_deaths
        .players
        .as_ref()
        .expect("players list")
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(dead, vec!["D"]);

    assert!(contents
        .iter()
        .any(|c| c.contains("day_vote_result") && c.contains('E') && c.contains("voted out")));

    // 9 -> 7 alive, and no winner announced
    let roster_event = events
        .iter()
        .find(|e| e.alive_players.is_some())
        .expect("alive roster event");
    let alive = roster_event.alive_players.as_ref().expect("alive players");
    assert_eq!(alive.len(), 7);
    assert!(!alive.contains(&"D".to_string()));
    assert!(!alive.contains(&"E".to_string()));
    assert!(!contents.iter().any(|c| c.contains("Game over: The")));

    // The terminal status event closes the stream
    assert!(contents.iter().any(|c| c.contains("Game over: finished")));
}

#[tokio::test]
async fn stop_signal_mid_discussion_terminates_without_day_events() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stop = CancellationToken::new();

    // The first werewolf discussion turn trips the stop signal; the next
    // phase-boundary check unwinds the game.
    let trip = stop.clone();
    let oracle = StubOracle::new(move |request| {
        if matches!(request.schema, DecisionSchema::Discussion) {
            trip.cancel();
        }
        Ok(default_decision(&request.schema))
    });

    let mut config = quick_config(dir.path());
    config.max_game_rounds = 30;
    let (outcome, events) = run_scripted(oracle, config, stop).await;

    assert_eq!(outcome.status, GameStatus::Terminated);
    assert!(outcome.error.is_none());

    assert!(events.iter().any(|e| e.kind == EventKind::NightStart));
    assert!(
        !events.iter().any(|e| e.kind == EventKind::DayStart),
        "no day phase events may follow a mid-night termination"
    );
    assert!(system_contents(&events)
        .iter()
        .any(|c| c.contains("Game over: terminated")));
}

#[tokio::test]
async fn persistent_tie_falls_back_to_name_order_after_three_runoffs() {
    let dir = tempfile::tempdir().expect("tempdir");

    // No night kill; the day vote splits 4/4 between A and B with one
    // abstention, and every runoff repeats the split.
    let oracle = StubOracle::new(|request| {
        if is_wolf_vote(request) {
            return Ok(Decision::Vote(howl_domain::VoteDecision {
                base: howl_domain::BaseDecision::default(),
                vote: None,
            }));
        }
        if matches!(request.schema, DecisionSchema::Vote { .. }) {
            return Ok(match request.player.as_str() {
                "A" | "B" | "C" | "D" => vote_for("A"),
                "E" | "F" | "G" | "H" => vote_for("B"),
                _ => default_decision(&request.schema),
            });
        }
        Ok(default_decision(&request.schema))
    });

    let (outcome, events) =
        run_scripted(oracle, quick_config(dir.path()), CancellationToken::new()).await;

    assert_eq!(outcome.status, GameStatus::Finished);

    let contents = system_contents(&events);

    // Exactly three runoff rounds took place, then the arbitration
    assert!(contents
        .iter()
        .any(|c| c.contains("pk_vote_result #3") && c.contains("still tied")));
    assert!(!contents.iter().any(|c| c.contains("pk_vote_result #4")));

    let arbitration = contents
        .iter()
        .find(|c| c.contains("pk_arbitration"))
        .expect("arbitration event");
    assert!(arbitration.contains("A"));
    assert!(arbitration.contains("name order"));

    // The fallback is announced as an arbitration, distinct from a normal
    // elimination
    assert!(contents
        .iter()
        .any(|c| c.contains("arbitration, not a normal vote result")));

    // A (lexicographically first of the tie) is the day's death
    let day_deaths = events
        .iter()
        .find(|e| {
            e.content
                .as_deref()
                .is_some_and(|c| c.starts_with("day_deaths"))
        })
        .expect("day deaths event");
    let dead: Vec<&str> = day_deaths
        .players
        .as_ref()
        .expect("players list")
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(dead, vec!["A"]);
}

#[tokio::test]
async fn poisoned_hunter_does_not_shoot() {
    let dir = tempfile::tempdir().expect("tempdir");

    // Wolves take the hunter; the witch poisons the hunter as well. The
    // shot must never be offered.
    let oracle = StubOracle::new(|request| {
        if is_wolf_vote(request) {
            return Ok(vote_for("I"));
        }
        if matches!(request.schema, DecisionSchema::WitchPoison { .. }) {
            return Ok(Decision::WitchPoison(howl_domain::PoisonDecision {
                base: howl_domain::BaseDecision::default(),
                poison: true,
                target: Some("I".to_string()),
            }));
        }
        if matches!(request.schema, DecisionSchema::HunterShot { .. }) {
            panic!("a poisoned hunter must not be offered the shot");
        }
        Ok(default_decision(&request.schema))
    });

    let (outcome, events) =
        run_scripted(oracle, quick_config(dir.path()), CancellationToken::new()).await;

    assert_eq!(outcome.status, GameStatus::Finished);

    let night_deaths = events
        .iter()
        .find(|e| {
            e.content
                .as_deref()
                .is_some_and(|c| c.starts_with("night_deaths"))
        })
        .expect("night deaths event");
    let dead: Vec<&str> = night_deaths
        .players
        .as_ref()
        .expect("players list")
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(dead, vec!["I"]);
}

#[tokio::test]
async fn witch_heal_makes_the_night_peaceful() {
    let dir = tempfile::tempdir().expect("tempdir");

    let oracle = StubOracle::new(|request| {
        if is_wolf_vote(request) {
            return Ok(vote_for("D"));
        }
        if matches!(request.schema, DecisionSchema::WitchHeal { .. }) {
            return Ok(Decision::WitchHeal(howl_domain::HealDecision {
                base: howl_domain::BaseDecision::default(),
                heal: true,
            }));
        }
        Ok(default_decision(&request.schema))
    });

    let (outcome, events) =
        run_scripted(oracle, quick_config(dir.path()), CancellationToken::new()).await;

    assert_eq!(outcome.status, GameStatus::Finished);

    let contents = system_contents(&events);
    assert!(contents.iter().any(|c| c.contains("peaceful night")));

    // Nobody died at night, everyone is still standing after round one
    let roster_event = events
        .iter()
        .find(|e| e.alive_players.is_some())
        .expect("alive roster event");
    assert_eq!(
        roster_event.alive_players.as_ref().expect("alive").len(),
        9
    );
}

#[tokio::test]
async fn oracle_faults_are_absorbed_as_no_actions() {
    let dir = tempfile::tempdir().expect("tempdir");

    // Every single decision call fails; the game must still run its round
    // and finish cleanly with everyone alive.
    let oracle = StubOracle::new(|_request| {
        Err(howl_engine::oracle::OracleError::Provider(
            "provider down".to_string(),
        ))
    });

    let (outcome, events) =
        run_scripted(oracle, quick_config(dir.path()), CancellationToken::new()).await;

    assert_eq!(outcome.status, GameStatus::Finished);
    assert!(outcome.error.is_none());

    // Faults are logged distinctly from genuine abstentions
    assert!(events.iter().any(|e| {
        e.kind == EventKind::AgentMessage
            && e.action
                .as_deref()
                .is_some_and(|a| a.contains("oracle fault"))
    }));

    let roster_event = events
        .iter()
        .find(|e| e.alive_players.is_some())
        .expect("alive roster event");
    assert_eq!(
        roster_event.alive_players.as_ref().expect("alive").len(),
        9
    );
}
