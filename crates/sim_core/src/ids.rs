//! Identifier newtypes with strict parsers.
//!
//! Tokens (`DistrictId`, `PartyId`, `CandidateId`) share one charset rule:
//! 1..=64 bytes of `[A-Za-z0-9_.:-]`. `PersonaId` is district-scoped
//! (`<district>#<index>`), `ExperimentId` is timestamp + seed derived
//! (`sim_<YYYYmmdd_HHMMSS>_seed<N>`) so lexicographic order is creation order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

fn is_token(s: &str) -> bool {
    (1..=64).contains(&s.len())
        && s.bytes().all(|b| {
            matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b':' | b'.')
        })
}

macro_rules! def_token {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if is_token(s) {
                    Ok(Self(s.to_string()))
                } else {
                    Err(CoreError::InvalidToken(s.to_string()))
                }
            }
        }
    };
}

def_token!(
    /// Registry token for a single-member district (e.g. `13_1`).
    DistrictId
);
def_token!(
    /// Registry token for a party (e.g. `alpha`, `independent`).
    PartyId
);
def_token!(
    /// Registry token for a candidate.
    CandidateId
);
def_token!(
    /// Registry token for a multi-member proportional block.
    BlockId
);

/// District-scoped persona identifier: `<district>#<1-based index>`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonaId(String);

impl PersonaId {
    /// Mint the id for persona `index` (1-based) of `district`.
    pub fn new(district: &DistrictId, index: u32) -> Self {
        Self(format!("{}#{:03}", district.as_str(), index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn district_part(&self) -> Option<&str> {
        self.0.split_once('#').map(|(d, _)| d)
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PersonaId {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('#') {
            Some((district, index)) if is_token(district) && index.parse::<u32>().is_ok() => {
                Ok(Self(s.to_string()))
            }
            _ => Err(CoreError::InvalidId(s.to_string())),
        }
    }
}

/// Sortable experiment identifier: `sim_<YYYYmmdd_HHMMSS>_seed<N>`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(String);

impl ExperimentId {
    /// Build from a pre-formatted local timestamp (`YYYYmmdd_HHMMSS`) and seed.
    pub fn new(timestamp: &str, seed: u64) -> Result<Self, CoreError> {
        let id = format!("sim_{timestamp}_seed{seed}");
        id.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn seed(&self) -> Option<u64> {
        self.0.rsplit_once("_seed").and_then(|(_, s)| s.parse().ok())
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ExperimentId {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("sim_")
            .ok_or_else(|| CoreError::InvalidId(s.to_string()))?;
        // "<YYYYmmdd>_<HHMMSS>_seed<N>" — digits at the expected positions.
        let b = rest.as_bytes();
        let ts_ok = b.len() > 15
            && b[..8].iter().all(u8::is_ascii_digit)
            && b[8] == b'_'
            && b[9..15].iter().all(u8::is_ascii_digit);
        let seed_ok = rest
            .rsplit_once("_seed")
            .is_some_and(|(_, n)| !n.is_empty() && n.bytes().all(|c| c.is_ascii_digit()));
        if ts_ok && seed_ok {
            Ok(Self(s.to_string()))
        } else {
            Err(CoreError::InvalidId(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_charset_enforced() {
        assert!("13_1".parse::<DistrictId>().is_ok());
        assert!("alpha".parse::<PartyId>().is_ok());
        assert!("has space".parse::<PartyId>().is_err());
        assert!("".parse::<DistrictId>().is_err());
    }

    #[test]
    fn persona_id_round_trip() {
        let d: DistrictId = "13_1".parse().unwrap();
        let p = PersonaId::new(&d, 7);
        assert_eq!(p.as_str(), "13_1#007");
        assert_eq!(p.district_part(), Some("13_1"));
        assert!(p.as_str().parse::<PersonaId>().is_ok());
    }

    #[test]
    fn experiment_id_parse_and_seed() {
        let id: ExperimentId = "sim_20260215_093000_seed42".parse().unwrap();
        assert_eq!(id.seed(), Some(42));
        assert!("sim_2026_seed42".parse::<ExperimentId>().is_err());
        assert!("run_20260215_093000_seed42".parse::<ExperimentId>().is_err());
    }

    #[test]
    fn experiment_ids_sort_by_creation_time() {
        let a: ExperimentId = "sim_20260101_000000_seed9".parse().unwrap();
        let b: ExperimentId = "sim_20260102_000000_seed1".parse().unwrap();
        assert!(a < b);
    }
}
