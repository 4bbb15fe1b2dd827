use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementPolicy {
    #[default]
    #[serde(alias = "LRU")]
    Lru,
    #[serde(alias = "MRU")]
    Mru,
    #[serde(alias = "Random", alias = "RANDOM")]
    Random,
}

impl FromStr for ReplacementPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "mru" => Ok(Self::Mru),
            "random" => Ok(Self::Random),
            _ => Err(format!(
                "unsupported replacement policy '{}', expected one of: lru, mru, random",
                value
            )),
        }
    }
}

/// Oldest way; ties go to the lowest way index.
pub(crate) fn lru_victim(ages: &[u64]) -> usize {
    let mut victim = 0;
    for (way, &age) in ages.iter().enumerate() {
        if age > ages[victim] {
            victim = way;
        }
    }
    victim
}

/// Youngest way; ties go to the lowest way index.
pub(crate) fn mru_victim(ages: &[u64]) -> usize {
    let mut victim = 0;
    for (way, &age) in ages.iter().enumerate() {
        if age < ages[victim] {
            victim = way;
        }
    }
    victim
}

/// Victim selection for a full set. Free ways are handled by the caller.
#[derive(Debug)]
pub struct Replacer {
    policy: ReplacementPolicy,
    rng: StdRng,
}

impl Replacer {
    pub fn new(policy: ReplacementPolicy, seed: u64) -> Self {
        Self {
            policy,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn policy(&self) -> ReplacementPolicy {
        self.policy
    }

    pub fn select_victim(&mut self, ages: &[u64]) -> usize {
        if ages.is_empty() {
            return 0;
        }
        match self.policy {
            ReplacementPolicy::Lru => lru_victim(ages),
            ReplacementPolicy::Mru => mru_victim(ages),
            ReplacementPolicy::Random => self.rng.gen_range(0..ages.len()),
        }
    }
}
