//! Player registry
//!
//! Owns role assignment, alive/dead state, the per-player impression matrix,
//! per-player knowledge text, and the win check. Mutated only by the
//! orchestrator task; nothing here is shared across execution contexts.

use std::collections::{BTreeMap, HashMap};

use howl_domain::{DomainError, Player, Role};

/// Default impression for a player pair that has not interacted yet
pub const UNFAMILIAR: &str = "unfamiliar";

/// Which side won the game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Werewolves,
    Village,
}

/// The win announcement returned by the win check
#[derive(Debug, Clone)]
pub struct WinAnnouncement {
    pub side: Side,
    pub message: String,
}

/// Registry of all players in one game
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    /// Players in registration order; fan-out results are folded back in
    /// this order
    players: Vec<Player>,
    index: HashMap<String, usize>,
    /// observer -> subject -> free-text belief; square minus the diagonal
    impressions: HashMap<String, BTreeMap<String, String>>,
    /// Cross-game distilled experience, one text per player
    knowledge: HashMap<String, String>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player. Every existing player gains an `unfamiliar`
    /// impression of the newcomer and vice versa.
    pub fn add_player(
        &mut self,
        name: impl Into<String>,
        role: Role,
        initial_knowledge: impl Into<String>,
    ) -> Result<(), DomainError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(DomainError::duplicate_player(name));
        }

        for (existing, map) in self.impressions.iter_mut() {
            if existing != &name {
                map.insert(name.clone(), UNFAMILIAR.to_string());
            }
        }
        let mut own: BTreeMap<String, String> = BTreeMap::new();
        for other in self.index.keys() {
            own.insert(other.clone(), UNFAMILIAR.to_string());
        }
        self.impressions.insert(name.clone(), own);
        self.knowledge.insert(name.clone(), initial_knowledge.into());

        self.index.insert(name.clone(), self.players.len());
        self.players.push(Player::new(name, role));
        Ok(())
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.index.get(name).map(|&i| &self.players[i])
    }

    pub fn player_mut(&mut self, name: &str) -> Option<&mut Player> {
        let i = *self.index.get(name)?;
        Some(&mut self.players[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn role_of(&self, name: &str) -> Option<Role> {
        self.player(name).map(Player::role)
    }

    pub fn is_alive(&self, name: &str) -> bool {
        self.player(name).map(|p| p.alive).unwrap_or(false)
    }

    pub fn is_werewolf(&self, name: &str) -> bool {
        self.player(name).map(Player::is_werewolf).unwrap_or(false)
    }

    /// Mark the named players dead. Idempotent per name: already dead and
    /// unknown names are ignored. History (impressions, knowledge, role
    /// assignment) is kept.
    pub fn mark_dead<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            if let Some(player) = self.player_mut(name.as_ref()) {
                if player.alive {
                    player.mark_dead();
                    tracing::debug!(player = name.as_ref(), "player eliminated");
                }
            }
        }
    }

    /// All players in registration order, dead or alive
    pub fn all_players(&self) -> &[Player] {
        &self.players
    }

    /// Living players in registration order
    pub fn current_alive(&self) -> Vec<&Player> {
        self.players.iter().filter(|p| p.alive).collect()
    }

    pub fn alive_names(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| p.alive)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Living players holding the given role, in registration order
    pub fn alive_with_role(&self, role: Role) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| p.alive && p.role() == role)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Werewolf team roster with alive flags, dead teammates included.
    /// Werewolves always know each other; callers must only surface this to
    /// werewolf players.
    pub fn wolf_team_status(&self) -> Vec<(String, bool)> {
        self.players
            .iter()
            .filter(|p| p.is_werewolf())
            .map(|p| (p.name.clone(), p.alive))
            .collect()
    }

    /// The observer's impression map. With `alive_only`, entries for dead
    /// subjects are filtered out.
    pub fn impressions_of(&self, observer: &str, alive_only: bool) -> BTreeMap<String, String> {
        let Some(map) = self.impressions.get(observer) else {
            return BTreeMap::new();
        };
        map.iter()
            .filter(|(subject, _)| !alive_only || self.is_alive(subject))
            .map(|(subject, text)| (subject.clone(), text.clone()))
            .collect()
    }

    /// Fold a partial impression update into the observer's row. Subjects
    /// missing from `updates` keep their prior value; unknown subjects are
    /// ignored.
    pub fn apply_impression_updates(
        &mut self,
        observer: &str,
        updates: &BTreeMap<String, String>,
    ) {
        let known: Vec<String> = updates
            .keys()
            .filter(|subject| self.index.contains_key(*subject) && subject.as_str() != observer)
            .cloned()
            .collect();
        if let Some(map) = self.impressions.get_mut(observer) {
            for subject in known {
                if let Some(text) = updates.get(&subject) {
                    map.insert(subject, text.clone());
                }
            }
        }
    }

    pub fn knowledge(&self, name: &str) -> &str {
        self.knowledge.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn update_knowledge(&mut self, name: &str, text: impl Into<String>) {
        if self.index.contains_key(name) {
            self.knowledge.insert(name.to_string(), text.into());
        }
    }

    pub fn export_knowledge(&self) -> BTreeMap<String, String> {
        self.players
            .iter()
            .map(|p| (p.name.clone(), self.knowledge(&p.name).to_string()))
            .collect()
    }

    fn true_roles_summary(&self) -> String {
        let names_for = |role: Role| -> String {
            let names: Vec<&str> = self
                .players
                .iter()
                .filter(|p| p.role() == role)
                .map(|p| p.name.as_str())
                .collect();
            names.join(", ")
        };
        format!(
            "{} were the werewolves; {} were villagers; {} was the seer; {} was the witch; {} was the hunter.",
            names_for(Role::Werewolf),
            names_for(Role::Villager),
            names_for(Role::Seer),
            names_for(Role::Witch),
            names_for(Role::Hunter),
        )
    }

    /// Evaluate the win conditions, in their fixed precedence order:
    ///
    /// 1. Werewolves win by wiping a full bench (all specials dead or all
    ///    plain villagers dead) while at least one wolf lives.
    /// 2. Werewolves win by numerical parity (wolves >= half of the living).
    /// 3. The village wins once no werewolf remains and someone is alive.
    ///
    /// When both werewolf conditions hold on the same transition, the
    /// role-wipe wording is reported.
    pub fn check_winner(&self) -> Option<WinAnnouncement> {
        let alive = self.current_alive();
        let wolves = alive.iter().filter(|p| p.is_werewolf()).count();
        let villagers = alive.iter().filter(|p| p.role() == Role::Villager).count();
        let specials = alive.iter().filter(|p| p.role().is_special()).count();

        if wolves > 0 && (specials == 0 || villagers == 0) {
            let bench = if specials == 0 {
                "the special roles"
            } else {
                "the villagers"
            };
            return Some(WinAnnouncement {
                side: Side::Werewolves,
                message: format!(
                    "The werewolves win: {bench} have been wiped out. {} werewolves remain among {} living players. {}",
                    wolves,
                    alive.len(),
                    self.true_roles_summary(),
                ),
            });
        }

        if wolves * 2 >= alive.len() && wolves > 0 {
            return Some(WinAnnouncement {
                side: Side::Werewolves,
                message: format!(
                    "The werewolves win: they now match the village in numbers ({} of {} living players). {}",
                    wolves,
                    alive.len(),
                    self.true_roles_summary(),
                ),
            });
        }

        if !alive.is_empty() && wolves == 0 {
            return Some(WinAnnouncement {
                side: Side::Village,
                message: format!(
                    "The village wins: every werewolf has been eliminated. {}",
                    self.true_roles_summary(),
                ),
            });
        }

        None
    }
}
