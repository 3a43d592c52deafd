//! Selection strategies over healthy candidates.
//!
//! Candidates arrive sorted by ascending probe latency, so `first` is the
//! fastest node. The other policies reduce left to right and keep the first
//! candidate found on ties.

use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::error::BalancerError;
use crate::health::prober::HealthRecord;
use crate::health::version::compare_version;

/// Named selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    First,
    Random,
    MaxFreshness,
    LatestVersion,
}

impl Strategy {
    /// Pick one candidate; `None` only when `candidates` is empty.
    pub fn select<'a>(&self, candidates: &'a [HealthRecord]) -> Option<&'a HealthRecord> {
        match self {
            Strategy::First => candidates.first(),
            Strategy::Random => pick_random(candidates, rand::thread_rng().gen::<f64>()),
            Strategy::MaxFreshness => candidates.iter().reduce(|best, current| {
                if current.freshness > best.freshness {
                    current
                } else {
                    best
                }
            }),
            Strategy::LatestVersion => candidates.iter().reduce(|latest, current| {
                if compare_version(&current.blockchain_version, &latest.blockchain_version).is_gt() {
                    current
                } else {
                    latest
                }
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::First => "first",
            Strategy::Random => "random",
            Strategy::MaxFreshness => "max_freshness",
            Strategy::LatestVersion => "latest_version",
        }
    }
}

/// Index by `floor(draw * len)` for a draw in `[0, 1)`.
pub fn pick_random<T>(candidates: &[T], draw: f64) -> Option<&T> {
    if candidates.is_empty() {
        return None;
    }
    let index = ((draw * candidates.len() as f64).floor() as usize).min(candidates.len() - 1);
    candidates.get(index)
}

impl FromStr for Strategy {
    type Err = BalancerError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "first" => Ok(Strategy::First),
            "random" => Ok(Strategy::Random),
            // older configs name freshness after the jussi number
            "max_freshness" | "max_jussi_number" => Ok(Strategy::MaxFreshness),
            "latest_version" => Ok(Strategy::LatestVersion),
            other => Err(BalancerError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
