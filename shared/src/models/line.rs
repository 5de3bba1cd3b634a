//! Line-level data model.
//!
//! A parsed log line yields zero or more [`Observation`]s and exactly one [`LabelSet`]
//! that applies to every observation of that line.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::parser::quote;

/// A single named measurement extracted from a log line.
///
/// # Example
///
/// ```
/// use shared::models::Observation;
///
/// let obs = Observation::new("request_time", 0.023);
/// assert_eq!(obs.name, "request_time");
/// assert_eq!(obs.value, 0.023);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// The metric name (an identifier, never empty).
    pub name: String,
    /// The observed value.
    pub value: f64,
}

impl Observation {
    /// Creates a new observation.
    #[must_use]
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.value)
    }
}

/// An ordered set of label names and their values.
///
/// Names are unique and keep the order in which they were first inserted. That order is
/// significant: it is the positional contract used to compare label shapes and to pass
/// label values to an instrument.
///
/// # Example
///
/// ```
/// use shared::models::LabelSet;
///
/// let mut labels = LabelSet::new();
/// assert!(labels.insert("method", "GET"));
/// assert!(labels.insert("path", "/api/v1"));
/// assert!(!labels.insert("method", "POST"));
///
/// assert_eq!(labels.names(), ["method", "path"]);
/// assert_eq!(labels.get("method"), Some("GET"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelSet {
    names: Vec<String>,
    values: Vec<String>,
}

impl LabelSet {
    /// Creates an empty label set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a label.
    ///
    /// Returns `false` and leaves the set unchanged if `name` is already present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.names.contains(&name) {
            return false;
        }
        self.names.push(name);
        self.values.push(value.into());
        true
    }

    /// Adds a label, builder style. Duplicate names are ignored.
    #[must_use]
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Label names in insertion order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Label values, positionally matching [`LabelSet::names`].
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Returns the value of the label called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i].as_str())
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if there are no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns true if `names` matches this set's names exactly, order included.
    #[must_use]
    pub fn has_names(&self, names: &[String]) -> bool {
        self.names.as_slice() == names
    }

    /// Iterates over `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names
            .iter()
            .zip(&self.values)
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// The result of parsing one log line.
///
/// The `Display` implementation produces the canonical form of the line: observations as
/// `name:value`, then labels as `name="value"`, separated by single spaces. Parsing the
/// canonical form yields an equal `ParsedLine`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedLine {
    /// Observations in source order.
    pub observations: Vec<Observation>,
    /// Labels shared by every observation of the line.
    pub labels: LabelSet,
}

impl ParsedLine {
    /// Creates a parsed line from its parts.
    #[must_use]
    pub fn new(observations: Vec<Observation>, labels: LabelSet) -> Self {
        Self {
            observations,
            labels,
        }
    }

    /// Returns true if the line carried neither observations nor labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty() && self.labels.is_empty()
    }

    /// Splits the line into observations and labels.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Observation>, LabelSet) {
        (self.observations, self.labels)
    }
}

impl fmt::Display for ParsedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for obs in &self.observations {
            write!(f, "{sep}{obs}")?;
            sep = " ";
        }
        for (name, value) in self.labels.iter() {
            write!(f, "{sep}{name}={}", quote(value))?;
            sep = " ";
        }
        Ok(())
    }
}
