use std::path::PathBuf;

use clap::Parser;

use crate::error::{Error, Result};
use crate::solver::td::QLearningParams;

/// Trains Monte Carlo (exploring starts) and Q-Learning agents on blackjack and
/// compares their win rates.
#[derive(Parser, Clone, Debug, PartialEq)]
#[command(version)]
pub struct Config {
    /// Training episodes per agent.
    #[arg(long, default_value_t = 500_000)]
    pub episode_count_train: u64,

    /// Evaluation hands per agent.
    #[arg(long, default_value_t = 100_000)]
    pub episode_count_eval: u64,

    /// Q-Learning exploration rate.
    #[arg(long, default_value_t = 0.1)]
    pub epsilon: f64,

    /// Q-Learning step size.
    #[arg(long, default_value_t = 0.1)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 1.0)]
    pub discount: f64,

    /// Seed for every random source; entropy if absent.
    #[arg(long)]
    pub random_seed: Option<u64>,

    /// Print the learned policies.
    #[arg(long)]
    pub print_policy: bool,

    /// Directory to write both value tables to after training.
    #[arg(long)]
    pub save_tables: Option<PathBuf>,

    /// Directory to read value tables from instead of training.
    #[arg(long)]
    pub load_tables: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            episode_count_train: 500_000,
            episode_count_eval: 100_000,
            epsilon: 0.1,
            learning_rate: 0.1,
            discount: 1.0,
            random_seed: None,
            print_policy: false,
            save_tables: None,
            load_tables: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.episode_count_train == 0 {
            return Err(Error::Configuration(
                "episode_count_train must be positive".to_string(),
            ));
        }
        if self.episode_count_eval == 0 {
            return Err(Error::Configuration(
                "episode_count_eval must be positive".to_string(),
            ));
        }
        self.q_learning_params().validate()
    }

    pub fn q_learning_params(&self) -> QLearningParams {
        QLearningParams {
            learning_rate: self.learning_rate,
            discount: self.discount,
            exploration_fraction: self.epsilon,
        }
    }

    /// Seed for one random source. Each source gets its own offset so that no
    /// two of them replay the same sequence.
    pub fn seed(&self, offset: u64) -> Option<u64> {
        self.random_seed.map(|seed| seed.wrapping_add(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_test() {
        let config = Config::try_parse_from(["blackjack_rl"]).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.seed(3), None);
    }

    #[test]
    fn overrides_test() {
        let config = Config::try_parse_from([
            "blackjack_rl",
            "--episode-count-train",
            "1000",
            "--epsilon",
            "0.2",
            "--random-seed",
            "7",
        ])
        .unwrap();
        assert_eq!(config.episode_count_train, 1000);
        assert_eq!(config.q_learning_params().exploration_fraction, 0.2);
        assert_eq!(config.seed(0), Some(7));
        assert_eq!(config.seed(2), Some(9));
    }

    #[test]
    fn invalid_config_test() {
        let configs = [
            Config {
                episode_count_train: 0,
                ..Config::default()
            },
            Config {
                episode_count_eval: 0,
                ..Config::default()
            },
            Config {
                epsilon: 1.01,
                ..Config::default()
            },
            Config {
                learning_rate: -0.1,
                ..Config::default()
            },
        ];
        for config in configs.iter() {
            assert!(matches!(config.validate(), Err(Error::Configuration(_))));
        }
    }
}
