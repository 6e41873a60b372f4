//! Immutable CPU core set value type shared across the agent.
//!
//! A [`CpuSet`] is a set of logical core indices. Its textual form is the
//! kernel's cpulist format (comma-separated indices and inclusive ranges,
//! e.g. `0-3,7`), which is what the cgroup `cpuset.cpus` files speak. All
//! operations are pure; none mutates a set received as input.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::de;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

/// Error produced when cpulist text cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid cpulist format: {0:?}")]
    InvalidFormat(String),
}

/// An immutable set of CPU core indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CpuSet {
    cores: BTreeSet<u16>,
}

impl CpuSet {
    /// Build a set from any collection of core indices.
    pub fn new(cores: impl IntoIterator<Item = u16>) -> Self {
        Self {
            cores: cores.into_iter().collect(),
        }
    }

    /// The empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a new set containing the cores of both `self` and `other`.
    pub fn union(&self, other: &CpuSet) -> CpuSet {
        CpuSet {
            cores: self.cores.union(&other.cores).copied().collect(),
        }
    }

    /// Returns a new set containing the cores of `self` not in `other`.
    pub fn difference(&self, other: &CpuSet) -> CpuSet {
        CpuSet {
            cores: self.cores.difference(&other.cores).copied().collect(),
        }
    }

    pub fn contains(&self, core: u16) -> bool {
        self.cores.contains(&core)
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    /// Materialize the set as a sorted list of core indices.
    pub fn to_vec(&self) -> Vec<u16> {
        self.cores.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.cores.iter().copied()
    }
}

impl FromIterator<u16> for CpuSet {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl FromStr for CpuSet {
    type Err = ParseError;

    /// Parse kernel cpulist text. An empty or whitespace-only string parses
    /// to the empty set, matching what an unpopulated `cpuset.cpus` file
    /// reads back as.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Ok(CpuSet::empty());
        }

        let mut cores = BTreeSet::new();
        for part in text.split(',') {
            let part = part.trim();
            match part.split_once('-') {
                Some((lo, hi)) => {
                    let lo: u16 = lo
                        .trim()
                        .parse()
                        .map_err(|_| ParseError::InvalidFormat(s.to_string()))?;
                    let hi: u16 = hi
                        .trim()
                        .parse()
                        .map_err(|_| ParseError::InvalidFormat(s.to_string()))?;
                    if lo > hi {
                        return Err(ParseError::InvalidFormat(s.to_string()));
                    }
                    cores.extend(lo..=hi);
                }
                None => {
                    let core: u16 = part
                        .parse()
                        .map_err(|_| ParseError::InvalidFormat(s.to_string()))?;
                    cores.insert(core);
                }
            }
        }
        Ok(CpuSet { cores })
    }
}

impl fmt::Display for CpuSet {
    /// Render the canonical cpulist form, collapsing consecutive runs into
    /// inclusive ranges. Inverse of [`FromStr`] for any set.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut iter = self.cores.iter().copied().peekable();
        while let Some(start) = iter.next() {
            let mut end = start;
            while end
                .checked_add(1)
                .is_some_and(|next| iter.peek() == Some(&next))
            {
                end = iter.next().unwrap();
            }
            if !first {
                write!(f, ",")?;
            }
            first = false;
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}-{end}")?;
            }
        }
        Ok(())
    }
}

impl Serialize for CpuSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CpuSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_cores_and_ranges() {
        let set: CpuSet = "0,2,4-6".parse().unwrap();
        assert_eq!(set.to_vec(), vec![0, 2, 4, 5, 6]);

        let set: CpuSet = "3".parse().unwrap();
        assert_eq!(set.to_vec(), vec![3]);
    }

    #[test]
    fn parse_empty_and_whitespace() {
        assert_eq!("".parse::<CpuSet>().unwrap(), CpuSet::empty());
        assert_eq!(" \n".parse::<CpuSet>().unwrap(), CpuSet::empty());
    }

    #[test]
    fn parse_tolerates_spaces_around_parts() {
        let set: CpuSet = " 0 , 2 - 3 ".parse().unwrap();
        assert_eq!(set.to_vec(), vec![0, 2, 3]);
    }

    #[test]
    fn parse_rejects_malformed_input() {
        for bad in ["x", "1,", "1-", "-3", "5-2", "1,2,three"] {
            assert!(
                matches!(bad.parse::<CpuSet>(), Err(ParseError::InvalidFormat(_))),
                "expected InvalidFormat for {bad:?}"
            );
        }
    }

    #[test]
    fn display_collapses_runs() {
        assert_eq!(CpuSet::new([0, 1, 2, 3]).to_string(), "0-3");
        assert_eq!(CpuSet::new([0, 2, 3, 7]).to_string(), "0,2-3,7");
        assert_eq!(CpuSet::empty().to_string(), "");
    }

    #[test]
    fn display_handles_the_top_core_index() {
        assert_eq!(CpuSet::new([u16::MAX]).to_string(), "65535");
        assert_eq!(CpuSet::new([u16::MAX - 1, u16::MAX]).to_string(), "65534-65535");

        let top = CpuSet::new([0, u16::MAX]);
        let parsed: CpuSet = top.to_string().parse().unwrap();
        assert_eq!(parsed, top);
    }

    #[test]
    fn round_trip() {
        for cores in [
            vec![],
            vec![0],
            vec![0, 1],
            vec![0, 1, 2, 3],
            vec![1, 3, 5, 7],
            vec![0, 1, 4, 5, 6, 9],
        ] {
            let set = CpuSet::new(cores);
            let parsed: CpuSet = set.to_string().parse().unwrap();
            assert_eq!(parsed, set);
        }
    }

    #[test]
    fn union_and_difference_are_pure() {
        let a = CpuSet::new([0, 1, 2]);
        let b = CpuSet::new([2, 3]);

        assert_eq!(a.union(&b).to_vec(), vec![0, 1, 2, 3]);
        assert_eq!(a.difference(&b).to_vec(), vec![0, 1]);

        // inputs are untouched
        assert_eq!(a.to_vec(), vec![0, 1, 2]);
        assert_eq!(b.to_vec(), vec![2, 3]);
    }

    #[test]
    fn serde_uses_cpulist_text() {
        let set = CpuSet::new([0, 1, 2, 5]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "\"0-2,5\"");
        let back: CpuSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
