// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wildcard-aware capability sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An unordered set of capability strings, possibly containing patterns.
///
/// A pattern is either `*` (matches anything) or a prefix ending in `:*`
/// (`orders:*` matches `orders:order:cancel` but not the bare `orders`).
///
/// The `degraded` flag records that resolution failed and the set is the
/// conservative empty fallback; gates use it to report UNAUTHORIZED instead
/// of FORBIDDEN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    caps: BTreeSet<String>,
    #[serde(default)]
    degraded: bool,
}

impl CapabilitySet {
    /// The empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The empty set, flagged as the result of a failed resolution.
    pub fn degraded() -> Self {
        Self {
            caps: BTreeSet::new(),
            degraded: true,
        }
    }

    /// Build a set from capability strings.
    pub fn from_caps<I, S>(caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            caps: caps.into_iter().map(Into::into).collect(),
            degraded: false,
        }
    }

    /// Insert a capability or pattern.
    pub fn insert(&mut self, cap: impl Into<String>) {
        self.caps.insert(cap.into());
    }

    /// Union another set into this one.
    pub fn extend_from(&mut self, other: &CapabilitySet) {
        self.caps.extend(other.caps.iter().cloned());
    }

    /// Membership test: exact hit, global `*`, or any `p:*` pattern whose
    /// prefix (including the trailing colon) starts `cap`.
    pub fn has(&self, cap: &str) -> bool {
        if self.caps.contains(cap) || self.caps.contains("*") {
            return true;
        }
        self.caps.iter().any(|entry| {
            entry
                .strip_suffix('*')
                .is_some_and(|prefix| prefix.ends_with(':') && cap.starts_with(prefix))
        })
    }

    /// `true` iff every capability in `caps` is held.
    pub fn has_all<'a, I>(&self, caps: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        caps.into_iter().all(|c| self.has(c))
    }

    /// `true` iff at least one capability in `caps` is held.
    pub fn has_any<'a, I>(&self, caps: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        caps.into_iter().any(|c| self.has(c))
    }

    /// Number of entries (patterns count as one).
    pub fn len(&self) -> usize {
        self.caps.len()
    }

    /// `true` when the set holds no entries.
    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }

    /// Whether this set is a conservative fallback after resolver failure.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Iterate the raw entries.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.caps.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_caps(iter)
    }
}
