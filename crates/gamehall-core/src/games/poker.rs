//! A minimal poker-like betting game.
//!
//! Every player gets two hole cards from a shuffled 52-card deck. Players
//! fold, call the current bid or raise it; the last player who has not
//! folded wins the pot. There is no hand evaluation or showdown.

use crate::actions::PlayerAction;
use crate::engine::{Applied, PlayerCount, RuleEngine};
use crate::game::{BoardState, GameError, GameType, PrivateView};
use crate::player::Player;
use crate::rng::GameRng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DECK_SIZE: usize = 52;
pub const HOLE_CARDS: usize = 2;

const RANKS: &str = "23456789TJQKA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

    fn letter(&self) -> char {
        match self {
            Suit::Clubs => 'C',
            Suit::Diamonds => 'D',
            Suit::Hearts => 'H',
            Suit::Spades => 'S',
        }
    }
}

/// A playing card, serialized as rank and suit letters (`"AS"`, `"TD"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Card {
    /// 2..=14, ace high
    pub rank: u8,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: u8, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rank = RANKS
            .chars()
            .nth(usize::from(self.rank.saturating_sub(2)))
            .unwrap_or('?');
        write!(f, "{}{}", rank, self.suit.letter())
    }
}

impl From<Card> for String {
    fn from(card: Card) -> String {
        card.to_string()
    }
}

impl TryFrom<String> for Card {
    type Error = String;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        let mut chars = token.chars();
        let (Some(rank), Some(suit), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(format!("bad card {token:?}"));
        };
        let rank = RANKS
            .find(rank.to_ascii_uppercase())
            .ok_or_else(|| format!("bad rank in {token:?}"))?;
        let suit = Suit::ALL
            .into_iter()
            .find(|s| s.letter() == suit.to_ascii_uppercase())
            .ok_or_else(|| format!("bad suit in {token:?}"))?;
        Ok(Card::new(rank as u8 + 2, suit))
    }
}

/// The standard 52-card deck in a fixed order
pub fn full_deck() -> Vec<Card> {
    Suit::ALL
        .into_iter()
        .flat_map(|suit| (2..=14).map(move |rank| Card::new(rank, suit)))
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PokerAction {
    Fold,
    Call,
    Raise { amount: u64 },
}

/// Public table view; hole cards are only counted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokerTable {
    pub pot: u64,
    pub current_bid: u64,
    /// Seats that have folded
    pub folded: Vec<usize>,
    pub hole_card_counts: Vec<usize>,
    pub deck_remaining: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Poker {
    deck: Vec<Card>,
    hands: Vec<Vec<Card>>,
    folded: Vec<bool>,
    pot: u64,
    current_bid: u64,
}

impl Poker {
    pub fn hole_cards(&self, seat: usize) -> Option<&[Card]> {
        self.hands.get(seat).map(Vec::as_slice)
    }

    pub fn pot(&self) -> u64 {
        self.pot
    }

    pub fn current_bid(&self) -> u64 {
        self.current_bid
    }

    fn unfolded(&self) -> impl Iterator<Item = usize> + '_ {
        self.folded
            .iter()
            .enumerate()
            .filter(|(_, folded)| !**folded)
            .map(|(seat, _)| seat)
    }

    /// The pot once `stake` is added to it
    fn pot_after(&self, stake: u64) -> Result<u64, GameError> {
        self.pot.checked_add(stake).ok_or_else(|| {
            GameError::InvalidMove(format!("a stake of {stake} would overflow the pot"))
        })
    }
}

impl RuleEngine for Poker {
    const GAME_TYPE: GameType = GameType::Poker;

    fn player_count() -> PlayerCount {
        PlayerCount::between(2, 10)
    }

    fn start(&mut self, players: &[Player], rng: &mut GameRng) -> Result<(), GameError> {
        let mut deck = full_deck();
        rng.shuffle(&mut deck);

        let mut hands = Vec::with_capacity(players.len());
        for _ in players {
            if deck.len() < HOLE_CARDS {
                return Err(GameError::InvalidAction("deck exhausted while dealing".into()));
            }
            hands.push(deck.split_off(deck.len() - HOLE_CARDS));
        }

        *self = Self {
            deck,
            folded: vec![false; hands.len()],
            hands,
            pot: 0,
            current_bid: 0,
        };
        Ok(())
    }

    fn validate_action(&self, _seat: usize, action: &PlayerAction) -> Result<(), GameError> {
        match action.decode::<PokerAction>()? {
            PokerAction::Fold => Ok(()),
            PokerAction::Call => self.pot_after(self.current_bid).map(drop),
            PokerAction::Raise { amount } if amount > self.current_bid => {
                self.pot_after(amount).map(drop)
            }
            PokerAction::Raise { amount } => Err(GameError::InvalidMove(format!(
                "raise of {} does not exceed the current bid of {}",
                amount, self.current_bid
            ))),
        }
    }

    fn apply_action(&mut self, seat: usize, action: &PlayerAction) -> Result<Applied, GameError> {
        self.validate_action(seat, action)?;
        let applied = match action.decode::<PokerAction>()? {
            PokerAction::Fold => {
                let Some(folded) = self.folded.get_mut(seat) else {
                    return Err(GameError::InvalidAction(format!("no hand for seat {seat}")));
                };
                *folded = true;
                Applied::next_turn().with_message("Folded")
            }
            PokerAction::Call => {
                self.pot = self.pot_after(self.current_bid)?;
                Applied::next_turn().with_message(format!("Called {}", self.current_bid))
            }
            PokerAction::Raise { amount } => {
                self.pot = self.pot_after(amount)?;
                self.current_bid = amount;
                Applied::next_turn().with_message(format!("Raised to {amount}"))
            }
        };
        Ok(applied)
    }

    fn board(&self) -> BoardState {
        BoardState::Poker(PokerTable {
            pot: self.pot,
            current_bid: self.current_bid,
            folded: self
                .folded
                .iter()
                .enumerate()
                .filter(|(_, f)| **f)
                .map(|(seat, _)| seat)
                .collect(),
            hole_card_counts: self.hands.iter().map(Vec::len).collect(),
            deck_remaining: self.deck.len(),
        })
    }

    fn is_game_over(&self) -> bool {
        !self.folded.is_empty() && self.unfolded().count() == 1
    }

    fn winner(&self) -> Option<usize> {
        if self.is_game_over() {
            self.unfolded().next()
        } else {
            None
        }
    }

    fn is_seat_active(&self, seat: usize) -> bool {
        !self.folded.get(seat).copied().unwrap_or(true)
    }

    fn private_view(&self, seat: usize) -> Option<PrivateView> {
        self.hole_cards(seat).map(|cards| PrivateView::HoleCards {
            cards: cards.to_vec(),
        })
    }

    fn is_healthy(&self) -> bool {
        self.folded.len() == self.hands.len()
            && self.deck.len() + self.hands.iter().map(Vec::len).sum::<usize>()
                == if self.hands.is_empty() { 0 } else { DECK_SIZE }
    }
}
