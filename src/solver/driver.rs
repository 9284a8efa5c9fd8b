use crate::blackjack::{Environment, Outcome, Transition};
use crate::error::{Error, Result};
use crate::solver::{Agent, Player};

/// Outcome tallies of an evaluation run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Evaluation {
    pub wins: u64,
    pub draws: u64,
    pub losses: u64,
}

impl Evaluation {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Draw => self.draws += 1,
            Outcome::Loss => self.losses += 1,
        }
    }

    pub fn episodes(&self) -> u64 {
        self.wins + self.draws + self.losses
    }

    fn rate(&self, count: u64) -> f64 {
        match self.episodes() {
            0 => 0.0,
            n => count as f64 / n as f64,
        }
    }

    pub fn win_rate(&self) -> f64 {
        self.rate(self.wins)
    }

    pub fn draw_rate(&self) -> f64 {
        self.rate(self.draws)
    }

    pub fn loss_rate(&self) -> f64 {
        self.rate(self.losses)
    }

    /// Average reward per hand.
    pub fn mean_return(&self) -> f64 {
        self.win_rate() - self.loss_rate()
    }
}

fn check_episodes(episodes: u64) -> Result<()> {
    if episodes == 0 {
        return Err(Error::Configuration(
            "episode count must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Runs `episodes` training episodes, logging progress every 1%.
pub fn train<A: Agent, E: Environment>(agent: &mut A, env: &mut E, episodes: u64) -> Result<()> {
    check_episodes(episodes)?;
    let one_percent = (episodes / 100).max(1);
    log::info!("Training {} for {} episodes", agent.name(), episodes);
    for episode in 0..episodes {
        if episode % one_percent == 0 {
            log::info!(
                "{} training progress: {:.2}%",
                agent.name(),
                episode as f64 / episodes as f64 * 100.0
            );
        }
        agent.train_episode(env)?;
    }
    log::info!(
        "{} finished training, {} action values",
        agent.name(),
        agent.value_table().len()
    );
    Ok(())
}

/// Plays `episodes` hands with the player's greedy choices and tallies the outcomes.
pub fn evaluate<P: Player, E: Environment>(
    player: &P,
    env: &mut E,
    episodes: u64,
) -> Result<Evaluation> {
    check_episodes(episodes)?;
    let mut evaluation = Evaluation::default();
    for _ in 0..episodes {
        let mut transition = env.reset(None)?;
        let outcome = loop {
            match transition {
                Transition::Next(state) => transition = env.step(player.choose_action(&state))?,
                Transition::Terminal(outcome) => break outcome,
            }
        };
        evaluation.record(outcome);
    }
    log::info!(
        "{}: wins {}, draws {}, losses {}",
        player.name(),
        evaluation.wins,
        evaluation.draws,
        evaluation.losses
    );
    Ok(evaluation)
}
