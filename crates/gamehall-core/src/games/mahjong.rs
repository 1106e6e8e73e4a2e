//! Four-player mahjong with a 144-tile set.
//!
//! Turns go draw → discard → next player. A player holding fourteen tiles
//! may declare a win instead of discarding if the hand is four melds and a
//! pair, or seven pairs. Running out of wall at a draw ends the hand with
//! no winner.

use crate::actions::PlayerAction;
use crate::engine::{Applied, PlayerCount, RuleEngine};
use crate::game::{BoardState, GameError, GameType, PrivateView};
use crate::player::Player;
use crate::rng::GameRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const PLAYERS: usize = 4;
pub const TILE_COUNT: usize = 144;
pub const HAND_SIZE: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    Bamboo,
    Character,
    Dot,
}

impl Suit {
    pub const ALL: [Suit; 3] = [Suit::Bamboo, Suit::Character, Suit::Dot];

    fn name(&self) -> &'static str {
        match self {
            Suit::Bamboo => "bamboo",
            Suit::Character => "character",
            Suit::Dot => "dot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Honor {
    East,
    South,
    West,
    North,
    Red,
    Green,
    White,
}

impl Honor {
    pub const ALL: [Honor; 7] = [
        Honor::East,
        Honor::South,
        Honor::West,
        Honor::North,
        Honor::Red,
        Honor::Green,
        Honor::White,
    ];

    fn name(&self) -> &'static str {
        match self {
            Honor::East => "east",
            Honor::South => "south",
            Honor::West => "west",
            Honor::North => "north",
            Honor::Red => "red",
            Honor::Green => "green",
            Honor::White => "white",
        }
    }
}

/// A tile, serialized as a token such as `"bamboo_3"`, `"honor_east"` or
/// `"flower_1"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Tile {
    Suited { suit: Suit, rank: u8 },
    Honor(Honor),
    Flower(u8),
}

impl Tile {
    pub fn suited(suit: Suit, rank: u8) -> Self {
        Tile::Suited { suit, rank }
    }

    /// The tile one rank higher in the same suit
    fn successor(&self) -> Option<Tile> {
        match *self {
            Tile::Suited { suit, rank } if rank < 9 => Some(Tile::suited(suit, rank + 1)),
            _ => None,
        }
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tile::Suited { suit, rank } => write!(f, "{}_{}", suit.name(), rank),
            Tile::Honor(honor) => write!(f, "honor_{}", honor.name()),
            Tile::Flower(n) => write!(f, "flower_{n}"),
        }
    }
}

impl From<Tile> for String {
    fn from(tile: Tile) -> String {
        tile.to_string()
    }
}

impl TryFrom<String> for Tile {
    type Error = String;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        let bad = || format!("unknown tile {token:?}");
        let (family, value) = token.split_once('_').ok_or_else(bad)?;

        if family == "honor" {
            return Honor::ALL
                .into_iter()
                .find(|h| h.name() == value)
                .map(Tile::Honor)
                .ok_or_else(bad);
        }
        let n: u8 = value.parse().map_err(|_| bad())?;
        if family == "flower" {
            return if (1..=8).contains(&n) {
                Ok(Tile::Flower(n))
            } else {
                Err(bad())
            };
        }
        let suit = Suit::ALL
            .into_iter()
            .find(|s| s.name() == family)
            .ok_or_else(bad)?;
        if (1..=9).contains(&n) {
            Ok(Tile::suited(suit, n))
        } else {
            Err(bad())
        }
    }
}

/// Every tile of a set in a fixed order: four of each suited and honor
/// tile plus eight distinct flowers
pub fn full_set() -> Vec<Tile> {
    let mut tiles = Vec::with_capacity(TILE_COUNT);
    for _ in 0..4 {
        for suit in Suit::ALL {
            tiles.extend((1..=9).map(|rank| Tile::suited(suit, rank)));
        }
        tiles.extend(Honor::ALL.into_iter().map(Tile::Honor));
    }
    tiles.extend((1..=8).map(Tile::Flower));
    tiles
}

/// Whether fourteen tiles form four melds and a pair, or seven pairs.
/// Flowers never count towards a winning hand.
pub fn is_winning_hand(hand: &[Tile]) -> bool {
    if hand.len() != HAND_SIZE + 1 || hand.iter().any(|t| matches!(t, Tile::Flower(_))) {
        return false;
    }

    let mut counts: BTreeMap<Tile, u8> = BTreeMap::new();
    for tile in hand {
        *counts.entry(*tile).or_default() += 1;
    }

    if counts.values().all(|&n| n % 2 == 0) {
        return true;
    }

    let pairs: Vec<Tile> = counts
        .iter()
        .filter(|(_, &n)| n >= 2)
        .map(|(t, _)| *t)
        .collect();
    pairs.into_iter().any(|pair| {
        let mut rest = counts.clone();
        take(&mut rest, pair, 2);
        forms_melds(&mut rest)
    })
}

fn take(counts: &mut BTreeMap<Tile, u8>, tile: Tile, n: u8) {
    if let Some(count) = counts.get_mut(&tile) {
        *count -= n;
        if *count == 0 {
            counts.remove(&tile);
        }
    }
}

/// Whether the remaining tiles split exactly into pungs and chows
fn forms_melds(counts: &mut BTreeMap<Tile, u8>) -> bool {
    let Some((&lowest, &n)) = counts.iter().next() else {
        return true;
    };

    if n >= 3 {
        take(counts, lowest, 3);
        let ok = forms_melds(counts);
        *counts.entry(lowest).or_default() += 3;
        if ok {
            return true;
        }
    }

    // The lowest tile can only start a run, never sit in its middle
    let second = lowest.successor();
    let third = second.and_then(|t| t.successor());
    if let (Some(second), Some(third)) = (second, third) {
        if counts.contains_key(&second) && counts.contains_key(&third) {
            for tile in [lowest, second, third] {
                take(counts, tile, 1);
            }
            let ok = forms_melds(counts);
            for tile in [lowest, second, third] {
                *counts.entry(tile).or_default() += 1;
            }
            return ok;
        }
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Draw,
    Discard,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MahjongAction {
    Draw,
    Discard { tile: Tile },
    DeclareWin,
}

/// Public table view; concealed hands are only counted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MahjongTable {
    pub hand_sizes: Vec<usize>,
    pub discards: Vec<Tile>,
    pub wall_count: usize,
    pub step: Step,
    /// Prevailing wind, 1 = east
    pub wind: u8,
    pub round: u32,
    /// The wall ran out before anyone won
    pub exhausted: bool,
}

#[derive(Debug, Clone)]
pub struct Mahjong {
    wall: Vec<Tile>,
    hands: Vec<Vec<Tile>>,
    discards: Vec<Tile>,
    step: Step,
    wind: u8,
    round: u32,
    winner: Option<usize>,
    exhausted: bool,
}

impl Default for Mahjong {
    fn default() -> Self {
        Self {
            wall: Vec::new(),
            hands: Vec::new(),
            discards: Vec::new(),
            step: Step::Draw,
            wind: 1,
            round: 1,
            winner: None,
            exhausted: false,
        }
    }
}

impl Mahjong {
    pub fn hand(&self, seat: usize) -> Option<&[Tile]> {
        self.hands.get(seat).map(Vec::as_slice)
    }

    pub fn wall_count(&self) -> usize {
        self.wall.len()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    fn expect_step(&self, step: Step) -> Result<(), GameError> {
        if self.step == step {
            Ok(())
        } else {
            Err(GameError::InvalidMove(format!(
                "expected a {:?} step",
                self.step
            )))
        }
    }

    fn hand_of(&self, seat: usize) -> Result<&Vec<Tile>, GameError> {
        self.hands
            .get(seat)
            .ok_or_else(|| GameError::InvalidAction(format!("no hand for seat {seat}")))
    }
}

impl RuleEngine for Mahjong {
    const GAME_TYPE: GameType = GameType::Mahjong;

    fn player_count() -> PlayerCount {
        PlayerCount::exactly(PLAYERS)
    }

    fn start(&mut self, players: &[Player], rng: &mut GameRng) -> Result<(), GameError> {
        let mut wall = full_set();
        rng.shuffle(&mut wall);

        let mut hands = vec![Vec::with_capacity(HAND_SIZE + 1); players.len()];
        for _ in 0..HAND_SIZE {
            for hand in hands.iter_mut() {
                let tile = wall
                    .pop()
                    .ok_or_else(|| GameError::InvalidAction("wall exhausted while dealing".into()))?;
                hand.push(tile);
            }
        }

        *self = Self {
            wall,
            hands,
            ..Self::default()
        };
        Ok(())
    }

    fn validate_action(&self, seat: usize, action: &PlayerAction) -> Result<(), GameError> {
        match action.decode::<MahjongAction>()? {
            MahjongAction::Draw => {
                self.expect_step(Step::Draw)?;
                if self.wall.is_empty() {
                    return Err(GameError::InvalidMove("the wall is empty".into()));
                }
                Ok(())
            }
            MahjongAction::Discard { tile } => {
                self.expect_step(Step::Discard)?;
                if !self.hand_of(seat)?.contains(&tile) {
                    return Err(GameError::InvalidMove(format!("{tile} is not in your hand")));
                }
                Ok(())
            }
            MahjongAction::DeclareWin => {
                self.expect_step(Step::Discard)?;
                if !is_winning_hand(self.hand_of(seat)?) {
                    return Err(GameError::InvalidMove("not a winning hand".into()));
                }
                Ok(())
            }
        }
    }

    fn apply_action(&mut self, seat: usize, action: &PlayerAction) -> Result<Applied, GameError> {
        self.validate_action(seat, action)?;
        match action.decode::<MahjongAction>()? {
            MahjongAction::Draw => {
                let tile = self
                    .wall
                    .pop()
                    .ok_or_else(|| GameError::InvalidMove("the wall is empty".into()))?;
                if let Some(hand) = self.hands.get_mut(seat) {
                    hand.push(tile);
                }
                self.step = Step::Discard;
                Ok(Applied::same_turn().with_message(format!("Drew {tile}")))
            }
            MahjongAction::Discard { tile } => {
                if let Some(hand) = self.hands.get_mut(seat) {
                    if let Some(i) = hand.iter().position(|t| *t == tile) {
                        hand.remove(i);
                    }
                }
                self.discards.push(tile);
                self.step = Step::Draw;
                if self.wall.is_empty() {
                    self.exhausted = true;
                }
                Ok(Applied::next_turn())
            }
            MahjongAction::DeclareWin => {
                self.winner = Some(seat);
                Ok(Applied::same_turn().with_message("Mahjong!"))
            }
        }
    }

    fn board(&self) -> BoardState {
        BoardState::Mahjong(MahjongTable {
            hand_sizes: self.hands.iter().map(Vec::len).collect(),
            discards: self.discards.clone(),
            wall_count: self.wall.len(),
            step: self.step,
            wind: self.wind,
            round: self.round,
            exhausted: self.exhausted,
        })
    }

    fn is_game_over(&self) -> bool {
        self.winner.is_some() || self.exhausted
    }

    fn winner(&self) -> Option<usize> {
        self.winner
    }

    fn private_view(&self, seat: usize) -> Option<PrivateView> {
        self.hand(seat).map(|tiles| PrivateView::Hand {
            tiles: tiles.to_vec(),
        })
    }

    fn is_healthy(&self) -> bool {
        let in_play = self.wall.len()
            + self.discards.len()
            + self.hands.iter().map(Vec::len).sum::<usize>();
        in_play == 0 || in_play == TILE_COUNT
    }
}
