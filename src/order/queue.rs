// src/order/queue.rs

//! Ready-list insertion policy
//!
//! The scheduler keeps ready elements in an ordered queue. A new entry
//! scans from the front and passes over queued entries according to four
//! rules, in order: elements whose affinity matches neither the
//! preferred affinity nor the scanned entry's are placed only relative
//! to like-affinity entries; a removal never overtakes a pending
//! install; entries stamped by a later wave drain before earlier waves
//! (FIFO within a wave); and within a wave, entries with fewer
//! dependents go first.

use crate::element::{Element, ElementKind};
use crate::order::graph::SortRecord;
use std::collections::VecDeque;

/// Ordered list of ready scheduling records, stored as arena indices.
#[derive(Debug, Default)]
pub(crate) struct ReadyQueue {
    items: VecDeque<usize>,
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn pop(&mut self) -> Option<usize> {
        self.items.pop_front()
    }

    /// Insert a newly ready record at its policy position. The record's
    /// ready stamp must already be set.
    pub(crate) fn insert(
        &mut self,
        node: usize,
        records: &[SortRecord],
        elements: &[Element],
        pref_affinity: u32,
    ) {
        let affinity = elements[node].affinity();
        let stamp = records[node].stamp;
        let succ_count = records[node].succ_count;

        // Removals queue behind every pending install.
        let start = if elements[node].kind() == ElementKind::Removed {
            self.items
                .iter()
                .rposition(|&q| elements[q].kind() == ElementKind::Added)
                .map_or(0, |i| i + 1)
        } else {
            0
        };

        let mut at = self.items.len();
        for (i, &q) in self.items.iter().enumerate().skip(start) {
            // Mismatched affinity is weighed only against its own kind;
            // preferred-affinity entries stay toward the front.
            if affinity != pref_affinity && affinity != elements[q].affinity() {
                continue;
            }

            let q_stamp = records[q].stamp;
            if q_stamp > stamp {
                continue;
            }
            // Within a wave: fewer dependents first, FIFO on ties.
            if q_stamp == stamp && records[q].succ_count <= succ_count {
                continue;
            }

            at = i;
            break;
        }

        self.items.insert(at, node);
    }
}
