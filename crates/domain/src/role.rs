//! Roles and per-player state
//!
//! Role-specific behavior is dispatched over the closed [`RoleState`] variant
//! rather than trait objects, so every night action is an exhaustive match.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The five roles of the nine-player setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Werewolf,
    Villager,
    Seer,
    Witch,
    Hunter,
}

impl Role {
    pub fn is_werewolf(self) -> bool {
        self == Role::Werewolf
    }

    /// Seer, witch and hunter form the "special" (non-wolf, non-villager) bench
    pub fn is_special(self) -> bool {
        matches!(self, Role::Seer | Role::Witch | Role::Hunter)
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Werewolf => "werewolf",
            Role::Villager => "villager",
            Role::Seer => "seer",
            Role::Witch => "witch",
            Role::Hunter => "hunter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "werewolf" => Ok(Role::Werewolf),
            "villager" => Ok(Role::Villager),
            "seer" => Ok(Role::Seer),
            "witch" => Ok(Role::Witch),
            "hunter" => Ok(Role::Hunter),
            other => Err(DomainError::validation(format!("unknown role: {other}"))),
        }
    }
}

/// The fixed distribution of the nine-player game: three wolves, three
/// villagers, and one of each special role.
pub fn standard_distribution() -> [Role; 9] {
    [
        Role::Werewolf,
        Role::Werewolf,
        Role::Werewolf,
        Role::Villager,
        Role::Villager,
        Role::Villager,
        Role::Seer,
        Role::Witch,
        Role::Hunter,
    ]
}

/// Role-specific mutable state, one closed variant per role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "role")]
pub enum RoleState {
    Werewolf,
    Villager,
    Seer {
        /// Private journal of checked players and their revealed roles
        checked: BTreeMap<String, Role>,
    },
    Witch {
        heal_used: bool,
        poison_used: bool,
    },
    Hunter {
        shot_used: bool,
    },
}

impl RoleState {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Werewolf => RoleState::Werewolf,
            Role::Villager => RoleState::Villager,
            Role::Seer => RoleState::Seer {
                checked: BTreeMap::new(),
            },
            Role::Witch => RoleState::Witch {
                heal_used: false,
                poison_used: false,
            },
            Role::Hunter => RoleState::Hunter { shot_used: false },
        }
    }

    pub fn role(&self) -> Role {
        match self {
            RoleState::Werewolf => Role::Werewolf,
            RoleState::Villager => Role::Villager,
            RoleState::Seer { .. } => Role::Seer,
            RoleState::Witch { .. } => Role::Witch,
            RoleState::Hunter { .. } => Role::Hunter,
        }
    }
}

/// A player in the game
///
/// Role assignment happens once at construction; the alive flag only ever
/// transitions from `true` to `false`; one-shot abilities are consumed at
/// most once each.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub name: String,
    pub state: RoleState,
    pub alive: bool,
}

impl Player {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            state: RoleState::for_role(role),
            alive: true,
        }
    }

    pub fn role(&self) -> Role {
        self.state.role()
    }

    pub fn is_werewolf(&self) -> bool {
        self.role().is_werewolf()
    }

    /// Mark the player dead. Alive-to-dead is monotonic; marking an already
    /// dead player is a no-op.
    pub fn mark_dead(&mut self) {
        self.alive = false;
    }

    /// Whether the witch's heal potion is still available
    pub fn heal_available(&self) -> bool {
        matches!(self.state, RoleState::Witch { heal_used: false, .. })
    }

    /// Whether the witch's poison is still available
    pub fn poison_available(&self) -> bool {
        matches!(
            self.state,
            RoleState::Witch {
                poison_used: false,
                ..
            }
        )
    }

    /// Whether the hunter's shot is still available
    pub fn shot_available(&self) -> bool {
        matches!(self.state, RoleState::Hunter { shot_used: false })
    }

    pub fn consume_heal(&mut self) -> Result<(), DomainError> {
        match &mut self.state {
            RoleState::Witch { heal_used, .. } if !*heal_used => {
                *heal_used = true;
                Ok(())
            }
            RoleState::Witch { .. } => Err(DomainError::validation("heal potion already used")),
            _ => Err(DomainError::validation("only the witch can heal")),
        }
    }

    pub fn consume_poison(&mut self) -> Result<(), DomainError> {
        match &mut self.state {
            RoleState::Witch { poison_used, .. } if !*poison_used => {
                *poison_used = true;
                Ok(())
            }
            RoleState::Witch { .. } => Err(DomainError::validation("poison already used")),
            _ => Err(DomainError::validation("only the witch can poison")),
        }
    }

    pub fn consume_shot(&mut self) -> Result<(), DomainError> {
        match &mut self.state {
            RoleState::Hunter { shot_used } if !*shot_used => {
                *shot_used = true;
                Ok(())
            }
            RoleState::Hunter { .. } => Err(DomainError::validation("shot already used")),
            _ => Err(DomainError::validation("only the hunter can shoot")),
        }
    }

    /// Record a seer check in the seer's private journal
    pub fn record_check(&mut self, subject: impl Into<String>, role: Role) -> Result<(), DomainError> {
        match &mut self.state {
            RoleState::Seer { checked } => {
                checked.insert(subject.into(), role);
                Ok(())
            }
            _ => Err(DomainError::validation("only the seer can check identities")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_shape() {
        let roles = standard_distribution();
        assert_eq!(roles.len(), 9);
        assert_eq!(roles.iter().filter(|r| r.is_werewolf()).count(), 3);
        assert_eq!(roles.iter().filter(|r| **r == Role::Villager).count(), 3);
        assert_eq!(roles.iter().filter(|r| r.is_special()).count(), 3);
    }

    #[test]
    fn test_witch_potions_are_one_shot() {
        let mut witch = Player::new("Player1", Role::Witch);
        assert!(witch.heal_available());
        witch.consume_heal().expect("first heal");
        assert!(!witch.heal_available());
        assert!(witch.consume_heal().is_err());

        // Poison is tracked independently of the heal
        assert!(witch.poison_available());
        witch.consume_poison().expect("first poison");
        assert!(witch.consume_poison().is_err());
    }

    #[test]
    fn test_only_hunter_shoots() {
        let mut villager = Player::new("Player2", Role::Villager);
        assert!(!villager.shot_available());
        assert!(villager.consume_shot().is_err());

        let mut hunter = Player::new("Player3", Role::Hunter);
        hunter.consume_shot().expect("first shot");
        assert!(hunter.consume_shot().is_err());
    }

    #[test]
    fn test_mark_dead_is_monotonic() {
        let mut player = Player::new("Player4", Role::Villager);
        assert!(player.alive);
        player.mark_dead();
        player.mark_dead();
        assert!(!player.alive);
    }

    #[test]
    fn test_seer_journal() {
        let mut seer = Player::new("Player5", Role::Seer);
        seer.record_check("Player1", Role::Werewolf).expect("check");
        match &seer.state {
            RoleState::Seer { checked } => {
                assert_eq!(checked.get("Player1"), Some(&Role::Werewolf));
            }
            _ => panic!("expected seer state"),
        }
    }
}
