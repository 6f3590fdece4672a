// src/order/cycle.rs

//! Dependency loop detection and breaking
//!
//! When the scheduler stalls with elements remaining, every unresolved
//! record is chained to one of its providers, the chains are walked to
//! find a node that reappears (the loop start), and the loop is walked
//! link by link. Plain co-requisite relations carry no script-ordering
//! obligation and are removed; prerequisite relations are reported but
//! kept. Each removal frees one predecessor count, so a subsequent
//! rescan can make progress.

use crate::element::Element;
use crate::order::graph::SortRecord;
use tracing::{debug, warn};

/// Run one loop-breaking pass over the stalled graph. Returns the number
/// of relations removed.
pub(crate) fn break_cycles(
    records: &mut [SortRecord],
    elements: &[Element],
    loud: bool,
) -> usize {
    let n = records.len();

    for record in records.iter_mut() {
        record.chain = None;
        record.visited = false;
    }

    // Chain every reachable dependent to one provider. Scheduled records
    // have no relations left, so they drop out naturally.
    for q in 0..n {
        if !records[q].relations.is_empty() {
            mark_chain(records, q, q);
        }
    }

    let mut nzaps = 0;

    for r in 0..n {
        // Walk the provider chain until a node repeats: that node starts
        // the loop. A chain that just ends carries no loop through r.
        let mut cursor = records[r].chain;
        while let Some(q) = cursor {
            if records[q].visited {
                break;
            }
            records[q].visited = true;
            cursor = records[q].chain;
        }

        // Walk the loop in (provider, dependent) pairs, consuming chain
        // links as they are reported.
        let mut printed = false;
        let mut walk = cursor;
        while let Some(p) = walk {
            let Some(q) = records[p].chain else {
                break;
            };
            records[p].chain = None;

            if !printed {
                if loud {
                    warn!("LOOP:");
                } else {
                    debug!("LOOP:");
                }
                printed = true;
            }

            zap_relation(records, elements, q, p, &mut nzaps, loud);
            walk = Some(q);
        }

        // Erase the linear part of r's chain as well.
        let mut p = r;
        while let Some(q) = records[p].chain {
            records[p].chain = None;
            records[p].visited = false;
            p = q;
        }
    }

    nzaps
}

/// Recursively chain each not-yet-chained dependent of `q` to `q`. The
/// walk never re-enters the root's own relation list, so a loop closing
/// back on the root terminates.
fn mark_chain(records: &mut [SortRecord], q: usize, root: usize) {
    for i in 0..records[q].relations.len() {
        let p = records[q].relations[i].succ;
        if records[p].chain.is_some() {
            continue;
        }
        records[p].chain = Some(q);
        if p != root && !records[p].relations.is_empty() {
            mark_chain(records, p, root);
        }
    }
}

/// Find the `q -> p` relation on a loop link and remove it if it is a
/// plain co-requisite. A missing relation is a data-model inconsistency,
/// recovered by reporting it and continuing the walk.
fn zap_relation(
    records: &mut [SortRecord],
    elements: &[Element],
    q: usize,
    p: usize,
    nzaps: &mut usize,
    loud: bool,
) {
    let Some(ix) = records[q].relations.iter().position(|rel| rel.succ == p) else {
        if loud {
            warn!(
                "    {:<40} relation from {} not found!?!",
                elements[p].ident(),
                elements[q].ident()
            );
        } else {
            debug!(
                "    {:<40} relation from {} not found!?!",
                elements[p].ident(),
                elements[q].ident()
            );
        }
        return;
    };

    let rel = &records[q].relations[ix];
    let requirement = &elements[rel.req_from].requires()[rel.req_ix];
    let dp = requirement.to_string();

    if !rel.sense.is_empty() {
        // A prerequisite relation: breaking it would reorder a script
        // dependency, so report the link and keep it.
        if loud {
            warn!("    {:<40} {}", elements[p].ident(), dp);
        } else {
            debug!("    {:<40} {}", elements[p].ident(), dp);
        }
        return;
    }

    if loud {
        warn!(
            "removing {} \"{}\" from tsort relations.",
            elements[p].ident(),
            dp
        );
    } else {
        debug!(
            "removing {} \"{}\" from tsort relations.",
            elements[p].ident(),
            dp
        );
    }

    records[q].relations.remove(ix);
    records[p].count -= 1;
    *nzaps += 1;
}
