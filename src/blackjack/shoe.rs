use std::collections::VecDeque;

use rand::prelude::*;

use super::Card;

/// Source of cards for the environment.
pub trait Shoe {
    fn draw(&mut self) -> Card;
}

/// Infinite shoe: every card is drawn with replacement, so faces come up 4 times
/// as often as any other rank.
#[derive(Clone, Debug)]
pub struct InfiniteShoe<R: Rng> {
    rng: R,
}

impl<R: Rng> InfiniteShoe<R> {
    pub fn new(rng: R) -> InfiniteShoe<R> {
        InfiniteShoe { rng }
    }
}

impl InfiniteShoe<StdRng> {
    pub fn seeded(seed: Option<u64>) -> InfiniteShoe<StdRng> {
        InfiniteShoe::new(build_rng(seed))
    }
}

impl<R: Rng> Shoe for InfiniteShoe<R> {
    fn draw(&mut self) -> Card {
        match self.rng.gen_range(1..=13) {
            1 => Card::Ace,
            r @ 2..=10 => Card::Value(r),
            _ => Card::Face,
        }
    }
}

/// Deals a fixed sequence of cards, then falls back to the inner shoe.
/// Used to script hands.
#[derive(Clone, Debug)]
pub struct StackedShoe<S: Shoe> {
    stacked: VecDeque<Card>,
    inner: S,
}

impl<S: Shoe> StackedShoe<S> {
    pub fn new(cards: &[Card], inner: S) -> StackedShoe<S> {
        StackedShoe {
            stacked: cards.iter().copied().collect(),
            inner,
        }
    }

    pub fn push(&mut self, cards: &[Card]) {
        self.stacked.extend(cards.iter().copied());
    }

    pub fn remaining(&self) -> usize {
        self.stacked.len()
    }
}

impl<S: Shoe> Shoe for StackedShoe<S> {
    fn draw(&mut self) -> Card {
        match self.stacked.pop_front() {
            Some(card) => card,
            None => self.inner.draw(),
        }
    }
}

pub fn build_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
