use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::blackjack::{Action, Environment, State};
use crate::error::{Error, Result};

pub mod driver;
pub mod monte_carlo;
pub mod td;

/// Anything that can pick an action in a state without learning.
pub trait Player {
    fn name(&self) -> String;

    /// Deterministic choice, used for evaluation.
    fn choose_action(&self, state: &State) -> Action;
}

/// A player that learns action values from episodes.
pub trait Agent: Player {
    fn value_table(&self) -> &ValueTable;

    /// Plays one episode in `env`, updating the value table along the way.
    fn train_episode<E: Environment>(&mut self, env: &mut E) -> Result<()>;

    fn policy(&self) -> Policy {
        self.value_table().policy()
    }
}

/// Action value estimates Q(S, A). Pairs never updated read as 0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueTable {
    values: HashMap<(State, Action), f64>,
}

/// Greedy policy derived from a value table. Only covers states with at least
/// one estimated action.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Policy {
    actions: BTreeMap<State, Action>,
}

impl ValueTable {
    pub fn new() -> ValueTable {
        ValueTable::default()
    }

    pub fn get(&self, state: &State, action: Action) -> f64 {
        *self.values.get(&(*state, action)).unwrap_or(&0.0)
    }

    pub fn set(&mut self, state: State, action: Action, value: f64) {
        self.values.insert((state, action), value);
    }

    pub fn contains(&self, state: &State, action: Action) -> bool {
        self.values.contains_key(&(*state, action))
    }

    /// At least one action has an estimate in this state.
    pub fn is_visited(&self, state: &State) -> bool {
        Action::ALL.iter().any(|a| self.contains(state, *a))
    }

    pub fn max_value(&self, state: &State) -> f64 {
        Action::ALL
            .iter()
            .map(|a| self.get(state, *a))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Hits only when hitting is strictly better, so ties go to sticking.
    pub fn greedy_action(&self, state: &State) -> Action {
        if self.get(state, Action::Hit) > self.get(state, Action::Stick) {
            Action::Hit
        } else {
            Action::Stick
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn policy(&self) -> Policy {
        Policy {
            actions: self
                .values
                .keys()
                .map(|(state, _)| (*state, self.greedy_action(state)))
                .collect(),
        }
    }

    /// Writes the table as a JSON object keyed by
    /// `"<player_total>,<dealer_upcard>,<usable_ace>,<action>"`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|source| Error::Io {
            operation: format!("create {}", path.display()),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.to_keyed())?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<ValueTable> {
        let file = File::open(path).map_err(|source| Error::Io {
            operation: format!("open {}", path.display()),
            source,
        })?;
        let keyed: BTreeMap<String, f64> = serde_json::from_reader(BufReader::new(file))?;
        ValueTable::from_keyed(&keyed)
    }

    fn to_keyed(&self) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .map(|((state, action), value)| (encode_key(state, *action), *value))
            .collect()
    }

    fn from_keyed(keyed: &BTreeMap<String, f64>) -> Result<ValueTable> {
        let mut table = ValueTable::new();
        for (key, value) in keyed {
            let (state, action) = decode_key(key)?;
            table.set(state, action, *value);
        }
        Ok(table)
    }
}

fn encode_key(state: &State, action: Action) -> String {
    format!(
        "{},{},{},{}",
        state.player_total, state.dealer_upcard, state.usable_ace, action
    )
}

fn decode_key(key: &str) -> Result<(State, Action)> {
    let invalid = || Error::InvalidKey(key.to_string());
    let parts: Vec<&str> = key.split(',').map(|p| p.trim()).collect();
    if parts.len() != 4 {
        return Err(invalid());
    }
    let player_total = parts[0].parse::<u32>().map_err(|_| invalid())?;
    let dealer_upcard = parts[1].parse::<u32>().map_err(|_| invalid())?;
    let usable_ace = parts[2].parse::<bool>().map_err(|_| invalid())?;
    let action = parts[3].parse::<Action>().map_err(|_| invalid())?;
    let state = State::new(player_total, dealer_upcard, usable_ace)?;
    Ok((state, action))
}

impl Policy {
    pub fn get(&self, state: &State) -> Option<Action> {
        self.actions.get(state).copied()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&State, &Action)> {
        self.actions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(player_total: u32, dealer_upcard: u32, usable_ace: bool) -> State {
        State::new(player_total, dealer_upcard, usable_ace).unwrap()
    }

    #[test]
    fn unvisited_reads_zero_test() {
        let table = ValueTable::new();
        let s = state(15, 10, false);
        assert_eq!(table.get(&s, Action::Hit), 0.0);
        assert!(!table.is_visited(&s));
        assert_eq!(table.max_value(&s), 0.0);
        assert_eq!(table.greedy_action(&s), Action::Stick);
    }

    #[test]
    fn greedy_action_test() {
        let mut table = ValueTable::new();
        let s = state(12, 6, false);
        table.set(s, Action::Hit, -0.2);
        table.set(s, Action::Stick, -0.1);
        assert_eq!(table.greedy_action(&s), Action::Stick);

        table.set(s, Action::Hit, 0.3);
        assert_eq!(table.greedy_action(&s), Action::Hit);
        assert_eq!(table.max_value(&s), 0.3);

        // Ties go to sticking.
        table.set(s, Action::Stick, 0.3);
        assert_eq!(table.greedy_action(&s), Action::Stick);
    }

    #[test]
    fn policy_follows_table_test() {
        let mut table = ValueTable::new();
        let a = state(20, 10, false);
        let b = state(8, 3, false);
        table.set(a, Action::Stick, 0.5);
        table.set(b, Action::Hit, 0.1);

        let policy = table.policy();
        assert_eq!(policy.len(), 2);
        assert_eq!(policy.get(&a), Some(Action::Stick));
        assert_eq!(policy.get(&b), Some(Action::Hit));
        assert_eq!(policy.get(&state(13, 2, true)), None);

        // Re-derived, so it tracks later updates.
        table.set(b, Action::Stick, 0.4);
        assert_eq!(table.policy().get(&b), Some(Action::Stick));
    }

    #[test]
    fn key_test() {
        let s = state(20, 10, false);
        assert_eq!(encode_key(&s, Action::Stick), "20,10,false,stick");
        assert_eq!(decode_key("13, 1, true, hit").unwrap(), (state(13, 1, true), Action::Hit));

        assert!(matches!(decode_key("13,1,true"), Err(Error::InvalidKey(_))));
        assert!(matches!(decode_key("13,1,yes,hit"), Err(Error::InvalidKey(_))));
        assert!(matches!(decode_key("13,1,true,split"), Err(Error::InvalidKey(_))));
        assert!(matches!(
            decode_key("25,1,false,hit"),
            Err(Error::InvalidStateRange(_))
        ));
    }

    #[test]
    fn save_and_load_test() {
        let mut table = ValueTable::new();
        table.set(state(20, 10, false), Action::Stick, 0.44);
        table.set(state(20, 10, false), Action::Hit, -0.85);
        table.set(state(17, 1, true), Action::Hit, -0.05);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        table.save(&path).unwrap();
        let loaded = ValueTable::load(&path).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn load_missing_file_test() {
        let dir = tempfile::tempdir().unwrap();
        let result = ValueTable::load(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
