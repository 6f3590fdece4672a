// src/index.rs

//! Requirement resolution against the transaction's own elements
//!
//! Ordering only cares about relations between elements inside the
//! current transaction; anything satisfied by the installed system is a
//! non-edge. The index therefore has two scopes: added elements, keyed
//! in registration order, and removed elements, keyed as if appended
//! after the added range. Resolution covers provide names (with version
//! range checks) and owned file paths.

use crate::deps::Requirement;
use crate::element::{Element, ElementKey, ElementKind};
use semver::Version;
use std::collections::HashMap;
use tracing::debug;

/// Which side of the transaction a requirement resolves against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveScope {
    /// Elements being installed
    Added,
    /// Elements being erased
    Erased,
}

/// Resolution collaborator contract.
///
/// Implementations must be deterministic for repeated calls within one
/// ordering run.
pub trait PackageIndex {
    /// Resolve a requirement to the key of a satisfying element in the
    /// given scope, or `None` if it is satisfied outside the
    /// transaction.
    fn resolve(&self, requirement: &Requirement, scope: ResolveScope) -> Option<ElementKey>;
}

#[derive(Debug, Default)]
struct ScopeIndex {
    provides: HashMap<String, Vec<(ElementKey, Option<Version>)>>,
    paths: HashMap<String, Vec<ElementKey>>,
}

impl ScopeIndex {
    fn register(&mut self, element: &Element, key: ElementKey) {
        // Every element provides its own name at its own version.
        self.provides
            .entry(element.name().to_string())
            .or_default()
            .push((key, Some(element.version().clone())));

        for provide in element.provides() {
            self.provides
                .entry(provide.name.clone())
                .or_default()
                .push((key, provide.version.clone()));
        }

        for path in element.paths() {
            self.paths.entry(path.clone()).or_default().push(key);
        }
    }

    fn finish(&mut self) {
        // Lowest key wins ties, so keep candidate lists key-sorted.
        for entries in self.provides.values_mut() {
            entries.sort_by_key(|(key, _)| *key);
        }
        for keys in self.paths.values_mut() {
            keys.sort();
        }
    }

    fn resolve(&self, requirement: &Requirement) -> Option<ElementKey> {
        if requirement.name.starts_with('/') {
            return self.paths.get(&requirement.name).and_then(|keys| keys.first().copied());
        }

        let entries = self.provides.get(&requirement.name)?;
        entries
            .iter()
            .find(|(_, version)| match (&requirement.range, version) {
                (None, _) => true,
                (Some(range), Some(version)) => range.matches(version),
                // An unversioned provide never satisfies a versioned
                // requirement.
                (Some(_), None) => false,
            })
            .map(|(key, _)| *key)
    }
}

/// Index over the transaction's added and erased elements
#[derive(Debug, Default)]
pub struct ElementIndex {
    added: ScopeIndex,
    erased: ScopeIndex,
}

impl ElementIndex {
    /// Build the index, assigning every element its stable key: added
    /// elements take `0..n_added` in submission order, removed elements
    /// continue past the added range.
    pub fn build(elements: &mut [Element]) -> Self {
        let n_added = elements
            .iter()
            .filter(|e| e.kind() == ElementKind::Added)
            .count();

        let mut index = Self::default();
        let mut next_added = 0;
        let mut next_erased = 0;

        for element in elements.iter_mut() {
            let key = match element.kind() {
                ElementKind::Added => {
                    let key = ElementKey(next_added);
                    next_added += 1;
                    index.added.register(element, key);
                    key
                }
                ElementKind::Removed => {
                    let key = ElementKey(n_added + next_erased);
                    next_erased += 1;
                    index.erased.register(element, key);
                    key
                }
            };
            element.set_key(key);
        }

        index.added.finish();
        index.erased.finish();

        debug!(
            "indexed {} added and {} erased elements",
            next_added, next_erased
        );

        index
    }
}

impl PackageIndex for ElementIndex {
    fn resolve(&self, requirement: &Requirement, scope: ResolveScope) -> Option<ElementKey> {
        match scope {
            ResolveScope::Added => self.added.resolve(requirement),
            ResolveScope::Erased => self.erased.resolve(requirement),
        }
    }
}
