use std::collections::{HashMap, HashSet};

use rand::prelude::*;

use crate::blackjack::shoe::build_rng;
use crate::blackjack::{Action, Environment, State, Transition};
use crate::error::{Error, Result};
use crate::solver::*;

/// Monte Carlo control with exploring starts.
///
/// Every episode starts from a uniformly random (state, action) pair and then
/// follows the greedy policy. Action values are first-visit averages of the
/// episode return. There is no discounting: blackjack only pays at the end.
#[derive(Clone, Debug)]
pub struct MonteCarloAgent {
    action_values: ValueTable,
    visits: HashMap<(State, Action), u32>,
    starts: Vec<State>,
    rng: StdRng,
}

impl MonteCarloAgent {
    pub fn new(seed: Option<u64>) -> MonteCarloAgent {
        MonteCarloAgent::with_values(ValueTable::new(), seed)
    }

    /// Resumes from stored estimates. Visit counts are not stored, so every
    /// estimate restarts with a count of 1.
    pub fn with_values(action_values: ValueTable, seed: Option<u64>) -> MonteCarloAgent {
        let visits = State::all()
            .into_iter()
            .flat_map(|s| Action::ALL.iter().map(move |a| (s, *a)))
            .filter(|(s, a)| action_values.contains(s, *a))
            .map(|key| (key, 1))
            .collect();
        MonteCarloAgent {
            action_values,
            visits,
            starts: State::all(),
            rng: build_rng(seed),
        }
    }

    pub fn visits(&self, state: &State, action: Action) -> u32 {
        *self.visits.get(&(*state, action)).unwrap_or(&0)
    }

    /// Incremental mean: Q ← Q + (G - Q) / N.
    pub fn update(&mut self, state: State, action: Action, returns: f64) {
        let count = self.visits.entry((state, action)).or_insert(0);
        *count += 1;
        let n = *count as f64;
        let value = self.action_values.get(&state, action);
        self.action_values
            .set(state, action, value + (returns - value) / n);
    }

    /// Greedy action, or a random one if neither action was tried in this state.
    fn behaviour_action(&mut self, state: &State) -> Action {
        if self.action_values.is_visited(state) {
            self.action_values.greedy_action(state)
        } else {
            random_action(&mut self.rng)
        }
    }

    fn exploring_start(&mut self) -> Result<(State, Action)> {
        let state = *self
            .starts
            .choose(&mut self.rng)
            .ok_or_else(|| Error::InvalidStateRange("no start states".to_string()))?;
        Ok((state, random_action(&mut self.rng)))
    }
}

pub fn random_action<R: Rng>(rng: &mut R) -> Action {
    if rng.gen::<f64>() < 0.5 {
        Action::Hit
    } else {
        Action::Stick
    }
}

impl Player for MonteCarloAgent {
    fn name(&self) -> String {
        "Monte Carlo".to_string()
    }

    fn choose_action(&self, state: &State) -> Action {
        self.action_values.greedy_action(state)
    }
}

impl Agent for MonteCarloAgent {
    fn value_table(&self) -> &ValueTable {
        &self.action_values
    }

    fn train_episode<E: Environment>(&mut self, env: &mut E) -> Result<()> {
        let (start_state, start_action) = self.exploring_start()?;

        // Generate a single episode.
        let mut episode: Vec<(State, Action)> = Vec::new();
        let mut transition = env.reset(Some(start_state))?;
        let returns = loop {
            match transition {
                Transition::Next(state) => {
                    let action = if episode.is_empty() {
                        start_action
                    } else {
                        self.behaviour_action(&state)
                    };
                    episode.push((state, action));
                    transition = env.step(action)?;
                }
                Transition::Terminal(outcome) => break outcome.reward(),
            }
        };

        // Only the final reward is non-zero, so every pair sees the same return.
        let mut first_visits = HashSet::new();
        for (state, action) in episode {
            if first_visits.insert((state, action)) {
                self.update(state, action, returns);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackjack::{Blackjack, InfiniteShoe, Outcome};
    use crate::solver::driver;

    fn state(player_total: u32, dealer_upcard: u32, usable_ace: bool) -> State {
        State::new(player_total, dealer_upcard, usable_ace).unwrap()
    }

    #[test]
    fn incremental_mean_test() {
        let mut agent = MonteCarloAgent::new(Some(0));
        let s = state(16, 10, false);
        for g in &[1.0, -1.0, -1.0, 0.0] {
            agent.update(s, Action::Stick, *g);
        }
        assert_eq!(agent.visits(&s, Action::Stick), 4);
        assert!((agent.value_table().get(&s, Action::Stick) - (-0.25)).abs() < 1e-12);
        assert_eq!(agent.visits(&s, Action::Hit), 0);
    }

    /// Starts in state A; any action ends the hand with a loss.
    struct LosingEnvironment {
        resets: Vec<Option<State>>,
        steps: Vec<Action>,
    }

    impl Environment for LosingEnvironment {
        fn reset(&mut self, force_start: Option<State>) -> Result<Transition> {
            self.resets.push(force_start);
            Ok(Transition::Next(force_start.unwrap_or(State::new(12, 2, false)?)))
        }

        fn step(&mut self, action: Action) -> Result<Transition> {
            self.steps.push(action);
            Ok(Transition::Terminal(Outcome::Loss))
        }
    }

    #[test]
    fn exploring_start_is_forced_test() {
        let mut agent = MonteCarloAgent::new(Some(9));
        let mut env = LosingEnvironment {
            resets: Vec::new(),
            steps: Vec::new(),
        };
        for _ in 0..200 {
            agent.train_episode(&mut env).unwrap();
        }

        assert!(env.resets.iter().all(|r| r.is_some()));
        let distinct: HashSet<State> = env.resets.iter().filter_map(|r| *r).collect();
        assert!(distinct.len() > 100);
        assert!(env.steps.contains(&Action::Hit));
        assert!(env.steps.contains(&Action::Stick));

        // One update per episode, each with the losing return.
        let total_visits: u32 = State::all()
            .iter()
            .flat_map(|s| Action::ALL.iter().map(move |a| (*s, *a)))
            .map(|(s, a)| agent.visits(&s, a))
            .sum();
        assert_eq!(total_visits, 200);
        for (s, _) in agent.policy().iter() {
            assert!(agent.value_table().max_value(s) <= 0.0);
        }
    }

    #[test]
    fn with_values_test() {
        let mut table = ValueTable::new();
        let s = state(19, 7, false);
        table.set(s, Action::Stick, 0.6);
        let mut agent = MonteCarloAgent::with_values(table, Some(1));
        assert_eq!(agent.visits(&s, Action::Stick), 1);
        agent.update(s, Action::Stick, 0.0);
        assert!((agent.value_table().get(&s, Action::Stick) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn learns_to_stand_on_20_test() {
        let mut agent = MonteCarloAgent::new(Some(2024));
        let mut env = Blackjack::new(InfiniteShoe::seeded(Some(2025)));
        driver::train(&mut agent, &mut env, 200_000).unwrap();

        let policy = agent.policy();
        for dealer_upcard in 1..=10 {
            assert_eq!(
                policy.get(&state(20, dealer_upcard, false)),
                Some(Action::Stick),
                "hard 20 vs {}",
                dealer_upcard
            );
            assert_eq!(policy.get(&state(21, dealer_upcard, false)), Some(Action::Stick));
        }

        // Hard 11 or less can never bust on a hit.
        let hits = (1..=10)
            .filter(|d| policy.get(&state(11, *d, false)) == Some(Action::Hit))
            .count();
        assert!(hits >= 8, "hits on hard 11 against only {} upcards", hits);
    }
}
