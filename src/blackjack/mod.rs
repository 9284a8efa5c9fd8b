use std::fmt;
use std::str::FromStr;

use prettytable::{Cell, Row, Table};

use crate::error::{Error, Result};
use crate::solver::{Player, Policy};

pub mod shoe;

pub use shoe::{InfiniteShoe, Shoe, StackedShoe};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Card {
    Ace,
    Value(u32),
    Face,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Action {
    Hit,
    Stick,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Hand {
    cards: Vec<Card>,
}

/// What the player conditions on: own total, dealer's open card and whether
/// an ace in the player's hand currently counts as 11.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct State {
    pub player_total: u32,
    pub dealer_upcard: u32,
    pub usable_ace: bool,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transition {
    /// Hand continues, the player has to act in this state.
    Next(State),
    Terminal(Outcome),
}

impl Card {
    pub fn is_ace(&self) -> bool {
        match self {
            Card::Ace => true,
            _ => false,
        }
    }

    /// Blackjack value with the ace counted as 1.
    pub fn value(&self) -> u32 {
        match self {
            Card::Ace => 1,
            Card::Value(v) => *v,
            Card::Face => 10,
        }
    }

    fn from_value(value: u32) -> Card {
        match value {
            1 => Card::Ace,
            v => Card::Value(v),
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Card::Ace => write!(f, "A"),
            Card::Value(v) => write!(f, "{}", v),
            Card::Face => write!(f, "F"),
        }
    }
}

impl Action {
    pub const ALL: [Action; 2] = [Action::Hit, Action::Stick];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Hit => write!(f, "hit"),
            Action::Stick => write!(f, "stick"),
        }
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Action> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hit" => Ok(Action::Hit),
            "stick" | "stay" | "stand" => Ok(Action::Stick),
            other => Err(Error::InvalidAction(format!("unknown action '{}'", other))),
        }
    }
}

impl Hand {
    pub fn from_cards(cards: &[Card]) -> Hand {
        Hand {
            cards: cards.to_vec(),
        }
    }

    /// Builds a hand whose total and softness match the given values.
    /// Soft hands are an ace plus filler, hard hands never contain an ace.
    fn with_total(total: u32, usable_ace: bool) -> Hand {
        let mut cards = Vec::new();
        if usable_ace {
            cards.push(Card::Ace);
            cards.push(Card::from_value(total - 11));
        } else if total <= 20 {
            let first = (total - 2).min(10);
            cards.push(Card::from_value(first));
            cards.push(Card::from_value(total - first));
        } else {
            cards.extend_from_slice(&[Card::Face, Card::Value(9), Card::Value(2)]);
        }
        Hand { cards }
    }

    pub fn add_card(&mut self, card: Card) {
        self.cards.push(card);
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    fn hard_total(&self) -> u32 {
        self.cards.iter().map(|c| c.value()).sum()
    }

    pub fn total(&self) -> u32 {
        if self.is_soft() {
            self.hard_total() + 10
        } else {
            self.hard_total()
        }
    }

    /// An ace counts as 11 without busting the hand.
    pub fn is_soft(&self) -> bool {
        self.cards.iter().any(|c| c.is_ace()) && self.hard_total() + 10 <= 21
    }

    pub fn is_bust(&self) -> bool {
        self.total() > 21
    }

    pub fn is_blackjack(&self) -> bool {
        self.cards.len() == 2 && self.total() == 21
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cards: Vec<String> = self.cards.iter().map(|c| c.to_string()).collect();
        write!(f, "[{}] = {}", cards.join(" "), self.total())
    }
}

impl State {
    /// Creates a state, rejecting combinations no hand can be in while the player
    /// still has to act.
    pub fn new(player_total: u32, dealer_upcard: u32, usable_ace: bool) -> Result<State> {
        if !(4..=21).contains(&player_total) {
            return Err(Error::InvalidStateRange(format!(
                "player total {} outside [4, 21]",
                player_total
            )));
        }
        if !(1..=10).contains(&dealer_upcard) {
            return Err(Error::InvalidStateRange(format!(
                "dealer upcard {} outside [1, 10]",
                dealer_upcard
            )));
        }
        if usable_ace && player_total < 12 {
            return Err(Error::InvalidStateRange(format!(
                "usable ace with player total {}",
                player_total
            )));
        }
        Ok(State {
            player_total,
            dealer_upcard,
            usable_ace,
        })
    }

    /// Every state the player can face.
    pub fn all() -> Vec<State> {
        let mut states = Vec::new();
        for dealer_upcard in 1..=10 {
            for player_total in 4..=21 {
                states.push(State {
                    player_total,
                    dealer_upcard,
                    usable_ace: false,
                });
            }
            for player_total in 12..=21 {
                states.push(State {
                    player_total,
                    dealer_upcard,
                    usable_ace: true,
                });
            }
        }
        states
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} vs {}",
            if self.usable_ace { "soft " } else { "" },
            self.player_total,
            self.dealer_upcard
        )
    }
}

impl Outcome {
    /// Naturals are paid like any other win.
    pub fn reward(&self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Draw => 0.0,
            Outcome::Loss => -1.0,
        }
    }
}

impl Transition {
    pub fn reward(&self) -> f64 {
        match self {
            Transition::Next(_) => 0.0,
            Transition::Terminal(outcome) => outcome.reward(),
        }
    }

    pub fn is_done(&self) -> bool {
        match self {
            Transition::Next(_) => false,
            Transition::Terminal(_) => true,
        }
    }

    pub fn state(&self) -> Option<State> {
        match self {
            Transition::Next(state) => Some(*state),
            Transition::Terminal(_) => None,
        }
    }
}

/// Episodic environment the agents learn from.
pub trait Environment {
    /// Starts a new hand. With `force_start` the hand is arranged so that the
    /// player faces exactly that state (exploring starts).
    fn reset(&mut self, force_start: Option<State>) -> Result<Transition>;

    fn step(&mut self, action: Action) -> Result<Transition>;
}

/// A single hand of blackjack against a dealer that stands on all 17s.
#[derive(Clone, Debug)]
pub struct Blackjack<S: Shoe> {
    shoe: S,
    player: Hand,
    dealer: Hand,
    done: bool,
}

impl<S: Shoe> Blackjack<S> {
    pub fn new(shoe: S) -> Blackjack<S> {
        Blackjack {
            shoe,
            player: Hand::default(),
            dealer: Hand::default(),
            done: true,
        }
    }

    pub fn player(&self) -> &Hand {
        &self.player
    }

    /// Includes the hidden card.
    pub fn dealer(&self) -> &Hand {
        &self.dealer
    }

    pub fn shoe(&self) -> &S {
        &self.shoe
    }

    fn observe(&self) -> Result<State> {
        let upcard = self.dealer.cards().first().ok_or_else(|| {
            Error::InvalidStateRange("dealer has no upcard".to_string())
        })?;
        State::new(self.player.total(), upcard.value(), self.player.is_soft())
    }

    fn finish(&mut self, outcome: Outcome) -> Transition {
        self.done = true;
        log::trace!(
            "player {} dealer {} => {:?}",
            self.player,
            self.dealer,
            outcome
        );
        Transition::Terminal(outcome)
    }

    fn deal(&mut self) -> Result<Transition> {
        self.player = Hand::default();
        self.dealer = Hand::default();
        self.player.add_card(self.shoe.draw());
        self.dealer.add_card(self.shoe.draw());
        self.player.add_card(self.shoe.draw());
        self.dealer.add_card(self.shoe.draw());
        self.done = false;

        if self.player.is_blackjack() {
            let outcome = if self.dealer.is_blackjack() {
                Outcome::Draw
            } else {
                Outcome::Win
            };
            return Ok(self.finish(outcome));
        }
        Ok(Transition::Next(self.observe()?))
    }

    fn arrange(&mut self, state: State) -> Result<Transition> {
        let state = State::new(state.player_total, state.dealer_upcard, state.usable_ace)?;
        self.player = Hand::with_total(state.player_total, state.usable_ace);
        self.dealer = Hand::from_cards(&[Card::from_value(state.dealer_upcard)]);
        self.dealer.add_card(self.shoe.draw());
        self.done = false;

        let observed = self.observe()?;
        if observed != state {
            return Err(Error::InvalidStateRange(format!(
                "arranged {} but observed {}",
                state, observed
            )));
        }
        Ok(Transition::Next(observed))
    }

    fn play_dealer(&mut self) -> Outcome {
        // Dealer stands on all 17s, soft ones included.
        while self.dealer.total() < 17 {
            self.dealer.add_card(self.shoe.draw());
        }

        let player = self.player.total();
        let dealer = self.dealer.total();
        if self.dealer.is_bust() || player > dealer {
            Outcome::Win
        } else if player == dealer {
            Outcome::Draw
        } else {
            Outcome::Loss
        }
    }
}

impl<S: Shoe> Environment for Blackjack<S> {
    fn reset(&mut self, force_start: Option<State>) -> Result<Transition> {
        match force_start {
            Some(state) => self.arrange(state),
            None => self.deal(),
        }
    }

    fn step(&mut self, action: Action) -> Result<Transition> {
        if self.done {
            return Err(Error::InvalidAction(format!(
                "{} after the hand is over",
                action
            )));
        }

        match action {
            Action::Hit => {
                self.player.add_card(self.shoe.draw());
                if self.player.is_bust() {
                    return Ok(self.finish(Outcome::Loss));
                }
                Ok(Transition::Next(self.observe()?))
            }
            Action::Stick => {
                let outcome = self.play_dealer();
                Ok(self.finish(outcome))
            }
        }
    }
}

/// Fixed policy that only sticks at `threshold` or higher.
#[derive(Clone, Copy, Debug)]
pub struct StickAtPolicy {
    pub threshold: u32,
}

impl Player for StickAtPolicy {
    fn name(&self) -> String {
        format!("Stick at {}", self.threshold)
    }

    fn choose_action(&self, state: &State) -> Action {
        if state.player_total < self.threshold {
            Action::Hit
        } else {
            Action::Stick
        }
    }
}

pub fn print_policy(name: &str, policy: &Policy) {
    let mut table = Table::new();

    // Print header.
    let mut header = Vec::new();
    header.push(Cell::new(name));
    header.push(Cell::new("Ace?"));
    for dealer_upcard in (2..=10).chain(1..=1) {
        header.push(match dealer_upcard {
            1 => Cell::new("A"),
            v => Cell::new(&format!("{}", v)),
        });
    }
    table.add_row(Row::new(header));

    for usable_ace in &[false, true] {
        for player_total in 11..=21 {
            if *usable_ace && player_total < 12 {
                continue;
            }
            let mut cells = Vec::new();
            cells.push(Cell::new(&format!("{}", player_total)));
            cells.push(Cell::new(if *usable_ace { "Y" } else { "N" }));
            for dealer_upcard in (2..=10).chain(1..=1) {
                let state = State {
                    player_total,
                    dealer_upcard,
                    usable_ace: *usable_ace,
                };
                match policy.get(&state) {
                    Some(Action::Hit) => cells.push(Cell::new("H")),
                    Some(Action::Stick) => cells.push(Cell::new("S")),
                    None => cells.push(Cell::new("")),
                }
            }
            table.add_row(Row::new(cells));
        }
    }
    table.printstd();
}
