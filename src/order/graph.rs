// src/order/graph.rs

//! Relation graph construction
//!
//! Walks every element's dependency set, resolves each automatic
//! requirement against the transaction-scoped index, and records the
//! surviving relations into an arena of scheduling records indexed by
//! element position. A relation `q -> p` means `q` must be scheduled
//! before `p`; erasures are reversed installs, so a removed element's
//! requirements point the other way.

use crate::deps::DepSense;
use crate::element::{Element, ElementKey, ElementKind};
use crate::ignore::IgnoreList;
use crate::index::{PackageIndex, ResolveScope};
use std::collections::HashMap;
use tracing::debug;

/// One directed relation from a provider record to a dependent record.
#[derive(Debug, Clone)]
pub(crate) struct Relation {
    /// Arena index of the dependent element.
    pub(crate) succ: usize,
    /// Accumulated ordering-obligation bits; empty means the relation is
    /// a plain co-requisite and may be broken to resolve a loop.
    pub(crate) sense: DepSense,
    /// Element that declared the originating requirement.
    pub(crate) req_from: usize,
    /// Index of that requirement within the declaring element's set.
    pub(crate) req_ix: usize,
}

/// Transient per-element scheduling state. Created when ordering starts,
/// discarded when it ends.
#[derive(Debug, Default)]
pub(crate) struct SortRecord {
    /// Outstanding predecessor relations; zero means ready.
    pub(crate) count: u32,
    /// Number of dependents, used as a queue tie-break.
    pub(crate) succ_count: u32,
    /// Outgoing relations (this element enables each target).
    pub(crate) relations: Vec<Relation>,
    /// Reverse view kept only for diagnostics.
    pub(crate) forward: Vec<Relation>,
    /// Ready stamp: which scheduling wave queued this record. Zero when
    /// not queued.
    pub(crate) stamp: u32,
    /// Already emitted into the output sequence.
    pub(crate) scheduled: bool,
    /// Predecessor-chain link, used only during cycle detection.
    pub(crate) chain: Option<usize>,
    /// Chain-walk mark, used only during cycle detection.
    pub(crate) visited: bool,
}

/// The relation graph over all transaction elements.
#[derive(Debug)]
pub(crate) struct RelationGraph {
    pub(crate) records: Vec<SortRecord>,
    /// Deepest dependency chain seen while recording relations.
    pub(crate) max_depth: u32,
}

impl RelationGraph {
    /// Record all ordering relations for the given elements.
    ///
    /// Resolution failures are silently-skipped non-edges: a requirement
    /// satisfied outside the transaction imposes no ordering.
    pub(crate) fn build(
        elements: &mut [Element],
        index: &dyn PackageIndex,
        ignore: &IgnoreList,
    ) -> Self {
        let n = elements.len();
        let mut records: Vec<SortRecord> = Vec::new();
        records.resize_with(n, SortRecord::default);
        let mut max_depth = 0;

        let positions: HashMap<ElementKey, usize> = elements
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.key().map(|key| (key, i)))
            .collect();

        debug!("========== recording tsort relations");

        for p_ix in 0..n {
            // Per-requirer dedup; the self slot blocks trivial cycles.
            let mut selected = vec![false; n];
            selected[p_ix] = true;

            let kind = elements[p_ix].kind();
            let scope = match kind {
                ElementKind::Added => ResolveScope::Added,
                ElementKind::Removed => ResolveScope::Erased,
            };

            for d_ix in 0..elements[p_ix].requires().len() {
                let req = &elements[p_ix].requires()[d_ix];

                // Exclusion entries are never relations.
                if !req.sense.is_automatic() {
                    continue;
                }

                // System/environment probes are evaluated against the
                // host, not against other packages.
                if req.namespace.is_probe() {
                    continue;
                }

                // A path this element itself owns is a trivial self
                // dependency.
                if req.name.starts_with('/') && elements[p_ix].owns_path(&req.name) {
                    continue;
                }

                // Ordering depends only on relations inside this
                // transaction.
                let Some(key) = index.resolve(req, scope) else {
                    continue;
                };
                let Some(&q_ix) = positions.get(&key) else {
                    continue;
                };
                if q_ix == p_ix {
                    continue;
                }

                if ignore.is_ignored(elements[p_ix].name(), elements[q_ix].name()) {
                    continue;
                }

                // Erasures are reversed installs.
                let (dst, src) = match kind {
                    ElementKind::Added => (p_ix, q_ix),
                    ElementKind::Removed => (q_ix, p_ix),
                };

                let mut sense = match kind {
                    ElementKind::Added => req.sense.install_prereq(),
                    ElementKind::Removed => req.sense.erase_prereq(),
                };

                // Map the legacy combined prerequisite onto the script
                // phase it implies for this element kind.
                if req.sense.is_legacy_prereq() {
                    sense |= match kind {
                        ElementKind::Added => DepSense::SCRIPT_PRE,
                        ElementKind::Removed => DepSense::SCRIPT_PREUN,
                    };
                }

                if selected[q_ix] {
                    // Already related this pair: only union the flags.
                    union_sense(&mut records, src, dst, p_ix, sense);
                    continue;
                }
                selected[q_ix] = true;

                // Record the "src <- dst" relation: dst requires src.
                records[dst].count += 1;

                if elements[dst].depth() <= elements[src].depth() {
                    let depth = elements[src].depth() + 1;
                    elements[dst].set_depth(depth);
                    if depth > max_depth {
                        max_depth = depth;
                    }
                }

                records[src].relations.push(Relation {
                    succ: dst,
                    sense,
                    req_from: p_ix,
                    req_ix: d_ix,
                });
                records[src].succ_count += 1;

                records[dst].forward.push(Relation {
                    succ: src,
                    sense,
                    req_from: p_ix,
                    req_ix: d_ix,
                });
            }
        }

        RelationGraph {
            records,
            max_depth,
        }
    }
}

/// Union new sense bits into an already-recorded relation pair.
fn union_sense(
    records: &mut [SortRecord],
    src: usize,
    dst: usize,
    req_from: usize,
    sense: DepSense,
) {
    if let Some(rel) = records[src]
        .relations
        .iter_mut()
        .find(|rel| rel.succ == dst && rel.req_from == req_from)
    {
        rel.sense |= sense;
    }
    if let Some(rel) = records[dst]
        .forward
        .iter_mut()
        .find(|rel| rel.succ == src && rel.req_from == req_from)
    {
        rel.sense |= sense;
    }
}
