//! Werewolf, a social-deduction game.
//!
//! Roles are dealt secretly at the start. The night/day phase is flipped
//! by the match host rather than by the engine, and every living player may
//! act at any time: one vote and one ability use per phase. Votes are
//! recorded without a tally and there is no win condition, so a match only
//! ends when the host closes it.

use crate::actions::PlayerAction;
use crate::engine::{Applied, PlayerCount, RuleEngine, TurnPolicy};
use crate::game::{BoardState, GameError, GameType, PrivateView};
use crate::player::{Player, PlayerId};
use crate::rng::GameRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const MIN_PLAYERS: usize = 5;
pub const MAX_PLAYERS: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Werewolf,
    Seer,
    Witch,
    Hunter,
    Villager,
}

impl Role {
    /// Abilities this role may use
    pub fn abilities(&self) -> &'static [Ability] {
        match self {
            Role::Werewolf => &[Ability::Kill],
            Role::Seer => &[Ability::Check],
            Role::Witch => &[Ability::Save, Ability::Poison],
            Role::Hunter => &[Ability::Shoot],
            Role::Villager => &[],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Werewolf => "werewolf",
            Role::Seer => "seer",
            Role::Witch => "witch",
            Role::Hunter => "hunter",
            Role::Villager => "villager",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Kill,
    Check,
    Save,
    Poison,
    Shoot,
}

impl Ability {
    /// Whether the ability removes its target from play
    fn is_lethal(&self) -> bool {
        matches!(self, Ability::Kill | Ability::Poison | Ability::Shoot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Night,
    Day,
}

impl Phase {
    pub fn flipped(self) -> Phase {
        match self {
            Phase::Night => Phase::Day,
            Phase::Day => Phase::Night,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Night => f.write_str("night"),
            Phase::Day => f.write_str("day"),
        }
    }
}

/// Deal `count` roles: two werewolves, a seer, a witch, a hunter, and
/// villagers for the remaining seats, in random order.
pub fn assign_roles(count: usize, rng: &mut GameRng) -> Vec<Role> {
    let mut roles = vec![Role::Werewolf, Role::Werewolf, Role::Seer, Role::Witch, Role::Hunter];
    roles.resize(count.max(roles.len()), Role::Villager);
    roles.truncate(count);
    rng.shuffle(&mut roles);
    roles
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WerewolfAction {
    Vote { target: PlayerId },
    UseAbility { ability: Ability, target: PlayerId },
}

/// Public view of a werewolf match; roles are not included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WerewolfBoard {
    pub phase: Phase,
    pub alive: Vec<PlayerId>,
    pub dead: Vec<PlayerId>,
    /// Voter to target, for the current phase
    pub votes: BTreeMap<PlayerId, PlayerId>,
}

#[derive(Debug, Clone)]
pub struct Werewolf {
    seats: Vec<PlayerId>,
    roles: Vec<Role>,
    phase: Phase,
    alive: Vec<PlayerId>,
    dead: Vec<PlayerId>,
    votes: BTreeMap<PlayerId, PlayerId>,
    /// Players who used an ability this phase
    acted: BTreeSet<PlayerId>,
}

impl Default for Werewolf {
    fn default() -> Self {
        Self {
            seats: Vec::new(),
            roles: Vec::new(),
            phase: Phase::Night,
            alive: Vec::new(),
            dead: Vec::new(),
            votes: BTreeMap::new(),
            acted: BTreeSet::new(),
        }
    }
}

impl Werewolf {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Flip between night and day, opening a fresh round of votes and abilities
    pub fn toggle_phase(&mut self) -> Phase {
        self.phase = self.phase.flipped();
        self.votes.clear();
        self.acted.clear();
        self.phase
    }

    pub fn role_of(&self, seat: usize) -> Option<Role> {
        self.roles.get(seat).copied()
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn is_alive(&self, id: &PlayerId) -> bool {
        self.alive.contains(id)
    }

    fn seat_of(&self, id: &PlayerId) -> Option<usize> {
        self.seats.iter().position(|p| p == id)
    }

    fn actor(&self, seat: usize) -> Result<(&PlayerId, Role), GameError> {
        let (Some(id), Some(role)) = (self.seats.get(seat), self.role_of(seat)) else {
            return Err(GameError::InvalidAction(format!("no player in seat {seat}")));
        };
        if !self.is_alive(id) {
            return Err(GameError::InvalidAction(format!("{id} is dead")));
        }
        Ok((id, role))
    }

    fn living_target(&self, target: &PlayerId) -> Result<(), GameError> {
        if self.seat_of(target).is_none() {
            return Err(GameError::UnknownPlayer(target.clone()));
        }
        if !self.is_alive(target) {
            return Err(GameError::InvalidMove(format!("{target} is already dead")));
        }
        Ok(())
    }
}

impl RuleEngine for Werewolf {
    const GAME_TYPE: GameType = GameType::Werewolf;

    fn player_count() -> PlayerCount {
        PlayerCount::between(MIN_PLAYERS, MAX_PLAYERS)
    }

    fn turn_policy(&self) -> TurnPolicy {
        TurnPolicy::Simultaneous
    }

    fn start(&mut self, players: &[Player], rng: &mut GameRng) -> Result<(), GameError> {
        let seats: Vec<PlayerId> = players.iter().map(|p| p.id.clone()).collect();
        *self = Self {
            roles: assign_roles(seats.len(), rng),
            alive: seats.clone(),
            seats,
            ..Self::default()
        };
        Ok(())
    }

    fn validate_action(&self, seat: usize, action: &PlayerAction) -> Result<(), GameError> {
        let (actor, role) = self.actor(seat)?;
        match action.decode::<WerewolfAction>()? {
            WerewolfAction::Vote { target } => {
                if self.votes.contains_key(actor) {
                    return Err(GameError::InvalidMove(format!(
                        "{actor} already voted this {}",
                        self.phase
                    )));
                }
                self.living_target(&target)
            }
            WerewolfAction::UseAbility { ability, target } => {
                if self.acted.contains(actor) {
                    return Err(GameError::InvalidMove(format!(
                        "{actor} already used an ability this {}",
                        self.phase
                    )));
                }
                if !role.abilities().contains(&ability) {
                    return Err(GameError::InvalidAction(format!(
                        "a {role} cannot use {ability:?}"
                    )));
                }
                if ability.is_lethal() {
                    self.living_target(&target)
                } else if self.seat_of(&target).is_none() {
                    Err(GameError::UnknownPlayer(target))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn apply_action(&mut self, seat: usize, action: &PlayerAction) -> Result<Applied, GameError> {
        self.validate_action(seat, action)?;
        let (actor, _) = self.actor(seat)?;
        let actor = actor.clone();

        match action.decode::<WerewolfAction>()? {
            WerewolfAction::Vote { target } => {
                let message = format!("Voted for {target}");
                self.votes.insert(actor, target);
                Ok(Applied::same_turn().with_message(message))
            }
            WerewolfAction::UseAbility { ability, target } if ability.is_lethal() => {
                self.acted.insert(actor);
                self.alive.retain(|p| p != &target);
                let message = format!("{target} is dead");
                self.dead.push(target);
                Ok(Applied::same_turn().with_message(message))
            }
            WerewolfAction::UseAbility {
                ability: Ability::Check,
                target,
            } => {
                let role = self
                    .seat_of(&target)
                    .and_then(|s| self.role_of(s))
                    .ok_or_else(|| GameError::UnknownPlayer(target.clone()))?;
                self.acted.insert(actor);
                Ok(Applied::same_turn().with_message(format!("{target} is a {role}")))
            }
            WerewolfAction::UseAbility { ability, target } => {
                self.acted.insert(actor);
                Ok(Applied::same_turn().with_message(format!("Used {ability:?} on {target}")))
            }
        }
    }

    fn board(&self) -> BoardState {
        BoardState::Werewolf(WerewolfBoard {
            phase: self.phase,
            alive: self.alive.clone(),
            dead: self.dead.clone(),
            votes: self.votes.clone(),
        })
    }

    fn is_game_over(&self) -> bool {
        false
    }

    fn winner(&self) -> Option<usize> {
        None
    }

    fn is_seat_active(&self, seat: usize) -> bool {
        self.seats.get(seat).is_some_and(|id| self.is_alive(id))
    }

    fn private_view(&self, seat: usize) -> Option<PrivateView> {
        self.role_of(seat).map(|role| PrivateView::Role { role })
    }

    fn is_healthy(&self) -> bool {
        self.roles.len() == self.seats.len()
            && self.alive.len() + self.dead.len() == self.seats.len()
    }
}
