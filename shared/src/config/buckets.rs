//! Histogram bucket boundaries.
//!
//! Every instrument created by the registry shares one set of boundaries, configured once
//! at startup from a comma-separated list such as `.005,.01,.025,.05,.1`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseFloatError;
use std::str::FromStr;
use thiserror::Error;

/// Default boundaries, tuned for request durations in seconds.
pub const DEFAULT_BUCKETS: &str = ".005,.01,.025,.05,.1,.25,.5,1,2.5,5,10";

/// Errors that can occur while building bucket boundaries.
#[derive(Debug, Error, PartialEq)]
pub enum BucketsError {
    /// No boundaries were given.
    #[error("At least one bucket boundary is required")]
    Empty,

    /// A list entry is not a number.
    #[error("Invalid bucket boundary '{value}': {source}")]
    InvalidNumber {
        /// The offending entry.
        value: String,
        /// The underlying parse error.
        source: ParseFloatError,
    },

    /// A boundary is zero, negative, NaN or infinite.
    #[error("Bucket boundary {0} must be a positive finite number")]
    NotPositive(f64),

    /// Boundaries are not strictly increasing.
    #[error("Bucket boundaries must be strictly increasing: {current} follows {previous}")]
    NotIncreasing {
        /// The boundary before the offending one.
        previous: f64,
        /// The offending boundary.
        current: f64,
    },
}

/// A validated, strictly increasing sequence of positive bucket boundaries.
///
/// # Example
///
/// ```
/// use shared::config::Buckets;
///
/// let buckets: Buckets = ".005, .01, .025".parse().unwrap();
/// assert_eq!(buckets.as_slice(), &[0.005, 0.01, 0.025]);
///
/// assert!("1,0.5".parse::<Buckets>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Buckets(Vec<f64>);

impl Buckets {
    /// Validates and wraps a list of boundaries.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, contains a non-positive or non-finite value,
    /// or is not strictly increasing.
    pub fn new(bounds: Vec<f64>) -> Result<Self, BucketsError> {
        if bounds.is_empty() {
            return Err(BucketsError::Empty);
        }

        for (i, &bound) in bounds.iter().enumerate() {
            if !bound.is_finite() || bound <= 0.0 {
                return Err(BucketsError::NotPositive(bound));
            }
            if i > 0 && bound <= bounds[i - 1] {
                return Err(BucketsError::NotIncreasing {
                    previous: bounds[i - 1],
                    current: bound,
                });
            }
        }

        Ok(Self(bounds))
    }

    /// The boundaries as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of boundaries, not counting the implicit `+Inf` bucket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Buckets {
    fn default() -> Self {
        Self(vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ])
    }
}

impl FromStr for Buckets {
    type Err = BucketsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(BucketsError::Empty);
        }

        let bounds = s
            .split(',')
            .map(|part| {
                let part = part.trim();
                part.parse::<f64>()
                    .map_err(|source| BucketsError::InvalidNumber {
                        value: part.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(bounds)
    }
}

impl TryFrom<Vec<f64>> for Buckets {
    type Error = BucketsError;

    fn try_from(bounds: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(bounds)
    }
}

impl From<Buckets> for Vec<f64> {
    fn from(buckets: Buckets) -> Self {
        buckets.0
    }
}

impl fmt::Display for Buckets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for bound in &self.0 {
            write!(f, "{sep}{bound}")?;
            sep = ",";
        }
        Ok(())
    }
}
