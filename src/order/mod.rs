// src/order/mod.rs

//! Transaction ordering engine
//!
//! Computes a safe apply order for a transaction's elements: relations
//! are recorded from each element's dependency set, zero-predecessor
//! elements seed a ready queue, and the queue is drained into the output
//! sequence while freeing dependents. If the queue empties with elements
//! remaining, the graph is cyclic: a loop-breaking pass removes a plain
//! co-requisite relation and the scan restarts, up to a fixed rescan
//! budget. The resulting key sequence is mapped back onto the element
//! array as the final permutation.

pub(crate) mod cycle;
pub(crate) mod graph;
pub(crate) mod queue;

use crate::element::{Element, ElementKey, ElementKind};
use crate::error::{Error, Result};
use crate::ignore::IgnoreList;
use crate::index::ElementIndex;
use crate::transaction::Transaction;
use graph::RelationGraph;
use queue::ReadyQueue;
use std::sync::OnceLock;
use tracing::{debug, error};

/// Number of full seed-and-drain passes allowed after loop breaking.
const MAX_RESCANS: usize = 100;

/// Depth limit of the per-depth breadth counters.
const PEER_DEPTH: usize = 128;

/// Diagnostics flag bitset for the ordering call.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrderFlags(u32);

impl OrderFlags {
    /// Raise loop and ignore-list diagnostics to a user-visible level.
    pub const LOOP_WARNINGS: Self = Self(1 << 0);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for OrderFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        OrderFlags(self.0 | rhs.0)
    }
}

/// Caller-supplied configuration for one ordering run.
///
/// The ignore list is materialized lazily from the configured source
/// text the first time a relation consults it, then memoized for the
/// lifetime of the config object.
#[derive(Debug, Default)]
pub struct OrderConfig {
    /// Preferred scheduling affinity; like-affinity elements are queued
    /// toward the front.
    pub pref_affinity: u32,
    /// Diagnostics flags.
    pub flags: OrderFlags,
    ignore_source: Option<String>,
    ignore: OnceLock<IgnoreList>,
}

impl OrderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pref_affinity(mut self, affinity: u32) -> Self {
        self.pref_affinity = affinity;
        self
    }

    pub fn with_flags(mut self, flags: OrderFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Configure the ignore-list source text (`requirer>provider`
    /// pairs). Parsed on first use.
    pub fn with_ignore_text(mut self, text: impl Into<String>) -> Self {
        self.ignore_source = Some(text.into());
        self
    }

    /// Supply an already-parsed ignore list.
    pub fn with_ignore_list(self, list: IgnoreList) -> Self {
        let _ = self.ignore.set(list);
        self
    }

    /// The materialized ignore list.
    pub fn ignore_list(&self) -> &IgnoreList {
        self.ignore.get_or_init(|| match &self.ignore_source {
            Some(text) => IgnoreList::parse(text, self.loud()),
            None => IgnoreList::empty(),
        })
    }

    fn loud(&self) -> bool {
        self.flags.contains(OrderFlags::LOOP_WARNINGS)
    }
}

/// Order the transaction's elements in place.
///
/// On success the element sequence is the computed permutation. On
/// failure the sequence is left as submitted, every element present
/// exactly once, and the error carries the unresolved count.
pub(crate) fn order_elements(tx: &mut Transaction, config: &OrderConfig) -> Result<()> {
    let n = tx.len();

    let index = ElementIndex::build(tx.elements_mut());
    let mut graph = RelationGraph::build(tx.elements_mut(), &index, config.ignore_list());

    let keys: Vec<ElementKey> = tx
        .elements()
        .iter()
        .map(|e| e.key())
        .collect::<Option<_>>()
        .ok_or_else(|| Error::Internal("element registered without a key".to_string()))?;

    tx.set_max_depth(graph.max_depth);

    // Save predecessor counts and mark tree roots. Builder depths only
    // fed the max-depth statistic; the drain assigns the real ones.
    let mut treex = 0;
    for (i, element) in tx.elements_mut().iter_mut().enumerate() {
        let npreds = graph.records[i].count;
        element.set_npreds(npreds);
        element.set_depth(0);
        if npreds == 0 {
            treex += 1;
            element.set_tree(Some(treex));
            element.set_breadth(treex);
        } else {
            element.set_tree(None);
        }
    }
    tx.set_ntrees(treex);

    let elements = tx.elements_mut();

    debug!(
        "========== tsorting packages (order, #predecessors, #successors, tree, depth, breadth)"
    );

    let mut ordering: Vec<ElementKey> = Vec::with_capacity(n);
    let mut peer = [0u32; PEER_DEPTH];
    let mut rescans = MAX_RESCANS;

    loop {
        // Seeding: queue every unscheduled zero-predecessor element in
        // submission order, stamped with the current wave.
        let mut ready = ReadyQueue::new();
        for i in 0..n {
            if graph.records[i].scheduled || graph.records[i].count != 0 {
                continue;
            }
            graph.records[i].stamp = (ordering.len() + 1) as u32;
            ready.insert(i, &graph.records, elements, config.pref_affinity);
        }

        // Draining: emit the head, erase its relations, queue dependents
        // whose last predecessor it was.
        while let Some(q) = ready.pop() {
            graph.records[q].stamp = 0;

            let tree = elements[q].tree();
            let depth = elements[q].depth();
            let breadth = if (depth as usize) < PEER_DEPTH {
                let b = peer[depth as usize];
                peer[depth as usize] += 1;
                b
            } else {
                0
            };
            elements[q].set_breadth(breadth);

            debug!(
                "{:5}{:5}{:5}{:5}{:5}{:5} {}{}{}",
                ordering.len(),
                elements[q].npreds(),
                graph.records[q].succ_count,
                tree.map(i64::from).unwrap_or(-1),
                depth,
                breadth,
                " ".repeat(2 * depth as usize),
                if elements[q].kind() == ElementKind::Removed {
                    '-'
                } else {
                    '+'
                },
                elements[q].ident(),
            );

            elements[q].set_degree(0);
            ordering.push(keys[q]);
            graph.records[q].scheduled = true;

            let relations = std::mem::take(&mut graph.records[q].relations);
            for rel in relations {
                let p = rel.succ;
                graph.records[p].count -= 1;
                if graph.records[p].count == 0 {
                    elements[p].set_tree(tree);
                    elements[p].set_depth(depth + 1);
                    elements[p].set_parent(Some(keys[q]));
                    elements[q].set_degree(elements[q].degree() + 1);

                    graph.records[p].stamp = (ordering.len() + 1) as u32;
                    ready.insert(p, &graph.records, elements, config.pref_affinity);
                }
            }
        }

        if ordering.len() == n {
            break;
        }

        // Stuck: break a loop and rescan, within budget.
        let nzaps = cycle::break_cycles(&mut graph.records, elements, config.loud());
        if nzaps > 0 && rescans > 0 {
            rescans -= 1;
            debug!("========== continuing tsort ...");
            continue;
        }

        let remaining = n - ordering.len();
        error!("ordering failed, {} elements remain", remaining);
        // Report what each stuck element still waits on.
        for i in 0..n {
            if graph.records[i].scheduled {
                continue;
            }
            for rel in &graph.records[i].forward {
                if !graph.records[rel.succ].scheduled {
                    debug!(
                        "    {} waits on {}",
                        elements[i].ident(),
                        elements[rel.succ].ident()
                    );
                }
            }
        }
        return Err(Error::DependencyLoop { remaining });
    }

    reassemble(tx, &ordering)
}

/// Map the key-based visiting order back onto the element array.
fn reassemble(tx: &mut Transaction, ordering: &[ElementKey]) -> Result<()> {
    let mut order_list: Vec<(ElementKey, usize)> = tx
        .elements()
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.key().map(|key| (key, i)))
        .collect();
    order_list.sort_by_key(|&(key, _)| key);

    let total = tx.len();
    let mut slots: Vec<Option<Element>> = tx.take_elements().into_iter().map(Some).collect();
    let mut new_order: Vec<Element> = Vec::with_capacity(total);

    for key in ordering {
        let Ok(found) = order_list.binary_search_by_key(key, |&(k, _)| k) else {
            continue;
        };
        let slot = order_list[found].1;
        if let Some(element) = slots[slot].take() {
            new_order.push(element);
        }
    }

    if new_order.len() != total {
        // A wrong permutation would corrupt a destructive operation.
        debug_assert_eq!(new_order.len(), total, "scheduled element count mismatch");
        let scheduled = new_order.len();
        new_order.extend(slots.into_iter().flatten());
        tx.set_elements(new_order);
        return Err(Error::Internal(format!(
            "scheduled {} of {} elements",
            scheduled, total
        )));
    }

    tx.set_elements(new_order);
    Ok(())
}
