// src/job/depends.rs

//! Normalised dependency sets.
//!
//! Callers may name a single dependency or a collection of them; both are
//! folded into one [`DependencySet`] at the boundary so the rest of the
//! engine never deals with the "one or many" distinction.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::job::JobName;

/// Set of job names that must succeed before a job may be admitted.
///
/// Backed by a `BTreeSet`, so iteration order (and therefore the order of
/// dependency tokens handed to a backend) is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "OneOrMany")]
pub struct DependencySet(BTreeSet<JobName>);

/// Raw TOML shape: `depends_on = "A"` or `depends_on = ["A", "B"]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for DependencySet {
    fn from(raw: OneOrMany) -> Self {
        match raw {
            OneOrMany::One(name) => DependencySet::from(name),
            OneOrMany::Many(names) => names.into_iter().collect(),
        }
    }
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<JobName>) -> bool {
        self.0.insert(name.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }
}

impl From<&str> for DependencySet {
    fn from(name: &str) -> Self {
        DependencySet::from(name.to_string())
    }
}

impl From<String> for DependencySet {
    fn from(name: String) -> Self {
        let mut set = BTreeSet::new();
        set.insert(name);
        DependencySet(set)
    }
}

impl From<&String> for DependencySet {
    fn from(name: &String) -> Self {
        DependencySet::from(name.clone())
    }
}

impl From<Vec<String>> for DependencySet {
    fn from(names: Vec<String>) -> Self {
        names.into_iter().collect()
    }
}

impl From<Vec<&str>> for DependencySet {
    fn from(names: Vec<&str>) -> Self {
        names.into_iter().collect()
    }
}

impl<const N: usize> From<[&str; N]> for DependencySet {
    fn from(names: [&str; N]) -> Self {
        names.into_iter().collect()
    }
}

impl<S: Into<JobName>> FromIterator<S> for DependencySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        DependencySet(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a DependencySet {
    type Item = &'a JobName;
    type IntoIter = std::collections::btree_set::Iter<'a, JobName>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
