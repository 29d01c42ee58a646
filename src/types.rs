// src/types.rs
use crate::miner::hash;
use crate::utils::error::PowError;
use std::fmt;

/// Largest difficulty a SHA-256 digest can express
pub const MAX_DIFFICULTY: u32 = 256;

/// A validated search request: the fixed candidate prefix and the
/// number of leading zero bits the digest must have
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchTarget {
    /// Fixed prefix every candidate starts with
    pub prefix: String,
    /// Required number of leading zero bits
    pub difficulty: u32,
}

impl SearchTarget {
    /// Creates a target, rejecting difficulties above [`MAX_DIFFICULTY`]
    pub fn new(prefix: impl Into<String>, difficulty: u32) -> Result<Self, PowError> {
        if difficulty > MAX_DIFFICULTY {
            return Err(PowError::InputError(format!(
                "difficulty must be between 0 and {}, got {}",
                MAX_DIFFICULTY, difficulty
            )));
        }
        Ok(SearchTarget {
            prefix: prefix.into(),
            difficulty,
        })
    }

    /// Builds a target from raw query parameters
    ///
    /// Both parameters are required. An empty prefix is allowed, a
    /// missing one is not.
    pub fn from_params(
        prefix: Option<String>,
        difficulty: Option<String>,
    ) -> Result<Self, PowError> {
        let prefix =
            prefix.ok_or_else(|| PowError::InputError("missing parameter: prefix".into()))?;
        let raw = difficulty
            .ok_or_else(|| PowError::InputError("missing parameter: difficulty".into()))?;
        let difficulty = raw.trim().parse::<u32>().map_err(|_| {
            PowError::InputError(format!("difficulty is not a valid integer: {:?}", raw))
        })?;
        Self::new(prefix, difficulty)
    }

    /// Checks that `solution` carries this prefix and meets the difficulty
    pub fn accepts(&self, solution: &str) -> bool {
        solution.starts_with(&self.prefix)
            && hash::meets_difficulty(solution.as_bytes(), self.difficulty)
    }
}

impl fmt::Display for SearchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prefix={:?} difficulty={}", self.prefix, self.difficulty)
    }
}

/// The first candidate found that satisfies a [`SearchTarget`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution(String);

impl Solution {
    /// Wraps the raw candidate bytes
    ///
    /// Candidates are a UTF-8 prefix followed by ASCII characters, so the
    /// conversion never loses data in practice.
    pub fn from_candidate(candidate: &[u8]) -> Self {
        Solution(String::from_utf8_lossy(candidate).into_owned())
    }

    /// The solution text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex-encoded SHA-256 digest of the solution
    pub fn digest_hex(&self) -> String {
        hex::encode(hash::digest(self.0.as_bytes()))
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Solution> for String {
    fn from(solution: Solution) -> Self {
        solution.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_params_requires_both_values() {
        let err = SearchTarget::from_params(None, Some("8".into())).unwrap_err();
        assert!(matches!(err, PowError::InputError(_)));

        let err = SearchTarget::from_params(Some("test".into()), None).unwrap_err();
        assert!(matches!(err, PowError::InputError(_)));
    }

    #[test]
    fn from_params_rejects_malformed_difficulty() {
        for bad in ["", "abc", "-1", "8.5", "257"] {
            let res = SearchTarget::from_params(Some("test".into()), Some(bad.into()));
            assert!(res.is_err(), "difficulty {:?} should be rejected", bad);
        }
    }

    #[test]
    fn from_params_accepts_empty_prefix() {
        let target = SearchTarget::from_params(Some(String::new()), Some(" 12 ".into())).unwrap();
        assert_eq!(target.prefix, "");
        assert_eq!(target.difficulty, 12);
    }

    #[test]
    fn accepts_checks_prefix_and_difficulty() {
        let target = SearchTarget::new("test", 0).unwrap();
        assert!(target.accepts("testXYZ"));
        assert!(!target.accepts("nope"));

        let hard = SearchTarget::new("test", MAX_DIFFICULTY).unwrap();
        assert!(!hard.accepts("testXYZ"));
    }
}
