// src/element.rs

//! Transaction elements
//!
//! An element is one package instance being added to or removed from the
//! system in a transaction. The ordering engine borrows elements for the
//! duration of a call: it reads their dependency sets and writes the
//! scheduling-output attributes (predecessor count, tree, depth, breadth,
//! degree, parent) without interpreting them further.

use crate::deps::{Provide, Requirement};
use semver::Version;

/// Whether an element is being installed or erased
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Added,
    Removed,
}

impl ElementKind {
    pub fn as_str(&self) -> &str {
        match self {
            ElementKind::Added => "added",
            ElementKind::Removed => "removed",
        }
    }
}

/// Stable identity of an element within one transaction.
///
/// Added elements take the low key range in registration order; removed
/// elements are keyed past the added range, as if appended to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementKey(pub(crate) usize);

impl ElementKey {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One package instance in a transaction
#[derive(Debug, Clone)]
pub struct Element {
    kind: ElementKind,
    name: String,
    version: Version,
    affinity: u32,
    requires: Vec<Requirement>,
    provides: Vec<Provide>,
    paths: Vec<String>,
    key: Option<ElementKey>,
    // Scheduling outputs, written by the ordering engine.
    npreds: u32,
    tree: Option<u32>,
    depth: u32,
    breadth: u32,
    degree: u32,
    parent: Option<ElementKey>,
}

impl Element {
    /// Create a new element with no dependencies
    pub fn new(kind: ElementKind, name: impl Into<String>, version: Version) -> Self {
        Self {
            kind,
            name: name.into(),
            version,
            affinity: 0,
            requires: Vec::new(),
            provides: Vec::new(),
            paths: Vec::new(),
            key: None,
            npreds: 0,
            tree: None,
            depth: 0,
            breadth: 0,
            degree: 0,
            parent: None,
        }
    }

    pub fn with_affinity(mut self, affinity: u32) -> Self {
        self.affinity = affinity;
        self
    }

    pub fn with_requires(mut self, requires: Vec<Requirement>) -> Self {
        self.requires = requires;
        self
    }

    pub fn with_provides(mut self, provides: Vec<Provide>) -> Self {
        self.provides = provides;
        self
    }

    /// Set the file paths this element owns. Paths are kept sorted so
    /// ownership checks can binary-search.
    pub fn with_paths(mut self, mut paths: Vec<String>) -> Self {
        paths.sort();
        self.paths = paths;
        self
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Display identity, e.g. `nginx-1.21.0`
    pub fn ident(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    pub fn affinity(&self) -> u32 {
        self.affinity
    }

    pub fn requires(&self) -> &[Requirement] {
        &self.requires
    }

    pub fn provides(&self) -> &[Provide] {
        &self.provides
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Whether this element owns the given filesystem path. Used to
    /// suppress self-referential path dependencies.
    pub fn owns_path(&self, path: &str) -> bool {
        self.paths.binary_search_by(|p| p.as_str().cmp(path)).is_ok()
    }

    pub fn key(&self) -> Option<ElementKey> {
        self.key
    }

    pub(crate) fn set_key(&mut self, key: ElementKey) {
        self.key = Some(key);
    }

    /// Number of predecessor relations recorded for this element
    pub fn npreds(&self) -> u32 {
        self.npreds
    }

    pub(crate) fn set_npreds(&mut self, npreds: u32) {
        self.npreds = npreds;
    }

    /// Dependency tree this element was scheduled into
    pub fn tree(&self) -> Option<u32> {
        self.tree
    }

    pub(crate) fn set_tree(&mut self, tree: Option<u32>) {
        self.tree = tree;
    }

    /// Depth within the dependency tree
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub(crate) fn set_depth(&mut self, depth: u32) {
        self.depth = depth;
    }

    /// Position among peers at the same depth
    pub fn breadth(&self) -> u32 {
        self.breadth
    }

    pub(crate) fn set_breadth(&mut self, breadth: u32) {
        self.breadth = breadth;
    }

    /// Number of elements this element unblocked when scheduled
    pub fn degree(&self) -> u32 {
        self.degree
    }

    pub(crate) fn set_degree(&mut self, degree: u32) {
        self.degree = degree;
    }

    /// The element whose scheduling made this one ready
    pub fn parent(&self) -> Option<ElementKey> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ElementKey>) {
        self.parent = parent;
    }
}
