use rand::prelude::*;

use crate::blackjack::shoe::build_rng;
use crate::blackjack::{Action, Environment, State, Transition};
use crate::error::{Error, Result};
use crate::solver::monte_carlo::random_action;
use crate::solver::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QLearningParams {
    /// α
    pub learning_rate: f64,
    /// γ
    pub discount: f64,
    /// ε, probability of a random action while training.
    pub exploration_fraction: f64,
}

impl Default for QLearningParams {
    fn default() -> QLearningParams {
        QLearningParams {
            learning_rate: 0.1,
            discount: 1.0,
            exploration_fraction: 0.1,
        }
    }
}

impl QLearningParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(Error::Configuration(format!(
                "learning rate {} outside (0, 1]",
                self.learning_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return Err(Error::Configuration(format!(
                "discount {} outside [0, 1]",
                self.discount
            )));
        }
        if !(0.0..=1.0).contains(&self.exploration_fraction) {
            return Err(Error::Configuration(format!(
                "epsilon {} outside [0, 1]",
                self.exploration_fraction
            )));
        }
        Ok(())
    }
}

/// Off-policy TD control: behaves ε-greedily but always bootstraps from the
/// best next action.
#[derive(Clone, Debug)]
pub struct QLearningAgent {
    action_values: ValueTable,
    params: QLearningParams,
    rng: StdRng,
}

impl QLearningAgent {
    pub fn new(params: QLearningParams, seed: Option<u64>) -> Result<QLearningAgent> {
        QLearningAgent::with_values(ValueTable::new(), params, seed)
    }

    pub fn with_values(
        action_values: ValueTable,
        params: QLearningParams,
        seed: Option<u64>,
    ) -> Result<QLearningAgent> {
        params.validate()?;
        Ok(QLearningAgent {
            action_values,
            params,
            rng: build_rng(seed),
        })
    }

    pub fn params(&self) -> &QLearningParams {
        &self.params
    }

    /// Q(S, A) ← Q(S, A) + α∙[R + γ∙max_a Q(S₊₁, a) - Q(S, A)],
    /// where the max term is 0 once the hand is over.
    pub fn update(&mut self, state: State, action: Action, reward: f64, next_state: Option<&State>) {
        let current = self.action_values.get(&state, action);
        let returns = next_state.map_or(0.0, |s| self.action_values.max_value(s));
        let target = reward + self.params.discount * returns;
        self.action_values.set(
            state,
            action,
            current + self.params.learning_rate * (target - current),
        );
    }

    /// ε-greedy behaviour while training.
    fn behaviour_action(&mut self, state: &State) -> Action {
        if self.rng.gen::<f64>() < self.params.exploration_fraction {
            random_action(&mut self.rng)
        } else {
            self.action_values.greedy_action(state)
        }
    }
}

impl Player for QLearningAgent {
    fn name(&self) -> String {
        "Q-Learning".to_string()
    }

    fn choose_action(&self, state: &State) -> Action {
        self.action_values.greedy_action(state)
    }
}

impl Agent for QLearningAgent {
    fn value_table(&self) -> &ValueTable {
        &self.action_values
    }

    fn train_episode<E: Environment>(&mut self, env: &mut E) -> Result<()> {
        let mut transition = env.reset(None)?;
        while let Transition::Next(state) = transition {
            let action = self.behaviour_action(&state);
            transition = env.step(action)?;
            self.update(state, action, transition.reward(), transition.state().as_ref());
        }
        Ok(())
    }
}
