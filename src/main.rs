mod blackjack;
mod config;
mod error;
mod solver;

use std::fs;
use std::path::Path;

use clap::Parser;
use prettytable::{Cell, Row, Table};

use blackjack::{Blackjack, InfiniteShoe, StickAtPolicy};
use config::Config;
use error::{Error, Result};
use solver::driver::{self, Evaluation};
use solver::monte_carlo::MonteCarloAgent;
use solver::td::QLearningAgent;
use solver::*;

const MONTE_CARLO_TABLE: &str = "monte_carlo.json";
const Q_LEARNING_TABLE: &str = "q_learning.json";

// Offsets of the per-component seeds.
const MONTE_CARLO_ENV: u64 = 0;
const MONTE_CARLO_AGENT: u64 = 1;
const Q_LEARNING_ENV: u64 = 2;
const Q_LEARNING_AGENT: u64 = 3;
const EVALUATION_ENV: u64 = 4;

fn new_env(seed: Option<u64>) -> Blackjack<InfiniteShoe<rand::rngs::StdRng>> {
    Blackjack::new(InfiniteShoe::seeded(seed))
}

fn build_agents(config: &Config) -> Result<(MonteCarloAgent, QLearningAgent)> {
    if let Some(dir) = &config.load_tables {
        log::info!("Loading value tables from {}", dir.display());
        let monte_carlo = MonteCarloAgent::with_values(
            ValueTable::load(&dir.join(MONTE_CARLO_TABLE))?,
            config.seed(MONTE_CARLO_AGENT),
        );
        let q_learning = QLearningAgent::with_values(
            ValueTable::load(&dir.join(Q_LEARNING_TABLE))?,
            config.q_learning_params(),
            config.seed(Q_LEARNING_AGENT),
        )?;
        return Ok((monte_carlo, q_learning));
    }

    let mut monte_carlo = MonteCarloAgent::new(config.seed(MONTE_CARLO_AGENT));
    driver::train(
        &mut monte_carlo,
        &mut new_env(config.seed(MONTE_CARLO_ENV)),
        config.episode_count_train,
    )?;

    let mut q_learning =
        QLearningAgent::new(config.q_learning_params(), config.seed(Q_LEARNING_AGENT))?;
    driver::train(
        &mut q_learning,
        &mut new_env(config.seed(Q_LEARNING_ENV)),
        config.episode_count_train,
    )?;
    Ok((monte_carlo, q_learning))
}

fn save_tables(dir: &Path, monte_carlo: &MonteCarloAgent, q_learning: &QLearningAgent) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| Error::Io {
        operation: format!("create {}", dir.display()),
        source,
    })?;
    monte_carlo
        .value_table()
        .save(&dir.join(MONTE_CARLO_TABLE))?;
    q_learning.value_table().save(&dir.join(Q_LEARNING_TABLE))?;
    log::info!("Saved value tables to {}", dir.display());
    Ok(())
}

fn print_results(results: &[(String, Evaluation)]) {
    let mut table = Table::new();
    table.add_row(Row::new(
        ["Agent", "Wins", "Draws", "Losses", "Win rate", "Draw rate", "Loss rate"]
            .iter()
            .map(|h| Cell::new(h))
            .collect(),
    ));
    for (name, evaluation) in results {
        table.add_row(Row::new(vec![
            Cell::new(name),
            Cell::new(&format!("{}", evaluation.wins)),
            Cell::new(&format!("{}", evaluation.draws)),
            Cell::new(&format!("{}", evaluation.losses)),
            Cell::new(&format!("{:.2}%", evaluation.win_rate() * 100.0)),
            Cell::new(&format!("{:.2}%", evaluation.draw_rate() * 100.0)),
            Cell::new(&format!("{:.2}%", evaluation.loss_rate() * 100.0)),
        ]));
    }
    table.printstd();
}

fn run(config: &Config) -> Result<()> {
    config.validate()?;
    let (monte_carlo, q_learning) = build_agents(config)?;

    if let Some(dir) = &config.save_tables {
        save_tables(dir, &monte_carlo, &q_learning)?;
    }

    if config.print_policy {
        blackjack::print_policy(&monte_carlo.name(), &monte_carlo.policy());
        blackjack::print_policy(&q_learning.name(), &q_learning.policy());
    }

    // Every player sees the same hands.
    let episodes = config.episode_count_eval;
    let baseline = StickAtPolicy { threshold: 20 };
    let results = vec![
        (
            monte_carlo.name(),
            driver::evaluate(&monte_carlo, &mut new_env(config.seed(EVALUATION_ENV)), episodes)?,
        ),
        (
            q_learning.name(),
            driver::evaluate(&q_learning, &mut new_env(config.seed(EVALUATION_ENV)), episodes)?,
        ),
        (
            baseline.name(),
            driver::evaluate(&baseline, &mut new_env(config.seed(EVALUATION_ENV)), episodes)?,
        ),
    ];
    print_results(&results);
    println!(
        "Monte Carlo Agent win rate: {:.2}%, Q Learning Agent win rate: {:.2}%",
        results[0].1.win_rate() * 100.0,
        results[1].1.win_rate() * 100.0
    );
    Ok(())
}

fn main() {
    env_logger::init();
    let config = Config::parse();
    if let Err(err) = run(&config) {
        log::error!("{}", err);
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_tables_test() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            episode_count_train: 2_000,
            episode_count_eval: 1_000,
            random_seed: Some(17),
            save_tables: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        run(&config).unwrap();
        assert!(dir.path().join(MONTE_CARLO_TABLE).exists());
        assert!(dir.path().join(Q_LEARNING_TABLE).exists());

        let trained = build_agents(&config).unwrap();
        let loaded = build_agents(&Config {
            load_tables: Some(dir.path().to_path_buf()),
            save_tables: None,
            ..config.clone()
        })
        .unwrap();
        assert_eq!(trained.0.value_table(), loaded.0.value_table());
        assert_eq!(trained.1.value_table(), loaded.1.value_table());
        assert_eq!(trained.0.policy(), loaded.0.policy());
    }

    #[test]
    fn invalid_config_is_rejected_test() {
        let config = Config {
            epsilon: 2.0,
            ..Config::default()
        };
        assert!(matches!(run(&config), Err(Error::Configuration(_))));
    }
}
