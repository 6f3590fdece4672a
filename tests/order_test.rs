// tests/order_test.rs

//! Integration tests for Ordain
//!
//! These tests exercise the full ordering pipeline: relation recording,
//! queue-driven scheduling, loop breaking, and the final permutation.

use ordain::deps::{DepSense, Requirement};
use ordain::element::{Element, ElementKind};
use ordain::{OrderConfig, OrderFlags, Transaction};
use semver::Version;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

fn version(s: &str) -> Version {
    s.parse().unwrap()
}

fn added(name: &str, requires: Vec<Requirement>) -> Element {
    Element::new(ElementKind::Added, name, version("1.0.0")).with_requires(requires)
}

fn removed(name: &str, requires: Vec<Requirement>) -> Element {
    Element::new(ElementKind::Removed, name, version("1.0.0")).with_requires(requires)
}

fn names(tx: &Transaction) -> Vec<&str> {
    tx.elements().iter().map(|e| e.name()).collect()
}

/// Buffer collecting formatted diagnostics from a scoped subscriber.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn test_linear_chain() {
    // Scenario A: A requires B requires C, all added.
    let mut tx = Transaction::new();
    tx.push(added("a", vec![Requirement::new("b")]));
    tx.push(added("b", vec![Requirement::new("c")]));
    tx.push(added("c", vec![]));

    tx.order(&OrderConfig::new()).unwrap();

    assert_eq!(names(&tx), vec!["c", "b", "a"]);
}

#[test]
fn test_two_cycle_broken_and_resolved() {
    // Scenario B: A and B require each other; exactly one relation is a
    // plain co-requisite. The breaker removes it, a retry resolves, and
    // one removal diagnostic is logged.
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(buffer.clone())
        .finish();

    let mut tx = Transaction::new();
    tx.push(added("a", vec![Requirement::new("b")]));
    tx.push(added(
        "b",
        vec![Requirement::new("a").with_sense(DepSense::SCRIPT_PRE)],
    ));

    let config = OrderConfig::new().with_flags(OrderFlags::LOOP_WARNINGS);
    tracing::subscriber::with_default(subscriber, || {
        tx.order(&config).unwrap();
    });

    // The surviving relation is b's prerequisite on a, so a goes first.
    assert_eq!(names(&tx), vec!["a", "b"]);

    let logs = buffer.contents();
    assert_eq!(
        logs.matches("removing").count(),
        1,
        "exactly one relation should be removed: {}",
        logs
    );
    assert!(logs.contains("LOOP:"), "loop should be reported: {}", logs);
}

#[test]
fn test_erase_reversal() {
    // Scenario C: Y (removed) requires X (removed); erase relations are
    // reversed installs, so Y is erased while X is still present.
    let mut tx = Transaction::new();
    tx.push(removed(
        "x",
        vec![],
    ));
    tx.push(removed(
        "y",
        vec![Requirement::new("x").with_sense(DepSense::SCRIPT_PREUN)],
    ));

    tx.order(&OrderConfig::new()).unwrap();

    assert_eq!(names(&tx), vec!["y", "x"]);
}

#[test]
fn test_disjoint_subgraphs() {
    // Scenario D: {A,B} and {C,D} are unrelated pairs; each is ordered
    // internally and the waves follow submission order.
    let mut tx = Transaction::new();
    tx.push(added("a", vec![Requirement::new("b")]));
    tx.push(added("b", vec![]));
    tx.push(added("c", vec![Requirement::new("d")]));
    tx.push(added("d", vec![]));

    tx.order(&OrderConfig::new()).unwrap();

    assert_eq!(names(&tx), vec!["b", "a", "d", "c"]);
}

#[test]
fn test_determinism() {
    let build = || {
        let mut tx = Transaction::new();
        tx.push(added("app", vec![Requirement::new("lib1"), Requirement::new("lib2")]));
        tx.push(added("lib1", vec![Requirement::new("base")]));
        tx.push(added("lib2", vec![Requirement::new("base")]));
        tx.push(added("base", vec![]));
        tx.push(removed("legacy", vec![]));
        tx
    };

    let mut first = build();
    first.order(&OrderConfig::new()).unwrap();

    for _ in 0..5 {
        let mut tx = build();
        tx.order(&OrderConfig::new()).unwrap();
        assert_eq!(names(&tx), names(&first));
    }
}

#[test]
fn test_idempotence() {
    let mut tx = Transaction::new();
    tx.push(added("app", vec![Requirement::new("lib1"), Requirement::new("lib2")]));
    tx.push(added("lib1", vec![Requirement::new("base")]));
    tx.push(added("lib2", vec![Requirement::new("base")]));
    tx.push(added("base", vec![]));

    tx.order(&OrderConfig::new()).unwrap();
    let first = names(&tx)
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();

    // Reordering an already-ordered acyclic set changes nothing.
    tx.order(&OrderConfig::new()).unwrap();
    assert_eq!(names(&tx), first);
}

#[test]
fn test_order_correctness_diamond() {
    let mut tx = Transaction::new();
    tx.push(added("app", vec![Requirement::new("lib1"), Requirement::new("lib2")]));
    tx.push(added("lib1", vec![Requirement::new("base")]));
    tx.push(added("lib2", vec![Requirement::new("base")]));
    tx.push(added("base", vec![]));

    tx.order(&OrderConfig::new()).unwrap();

    let order = names(&tx);
    let pos = |name: &str| order.iter().position(|n| *n == name).unwrap();

    // Every provider precedes its dependents.
    assert!(pos("base") < pos("lib1"));
    assert!(pos("base") < pos("lib2"));
    assert!(pos("lib1") < pos("app"));
    assert!(pos("lib2") < pos("app"));
}

#[test]
fn test_scheduling_statistics() {
    // Submitted leaf-first so recorded depths accumulate along the
    // chain.
    let mut tx = Transaction::new();
    tx.push(added("base", vec![]));
    tx.push(added("lib1", vec![Requirement::new("base")]));
    tx.push(added("lib2", vec![Requirement::new("base")]));
    tx.push(added("app", vec![Requirement::new("lib1"), Requirement::new("lib2")]));

    tx.order(&OrderConfig::new()).unwrap();

    assert_eq!(tx.ntrees(), 1);
    assert_eq!(tx.max_depth(), 2);

    let by_name = |name: &str| {
        tx.elements()
            .iter()
            .find(|e| e.name() == name)
            .unwrap()
    };

    let base = by_name("base");
    assert_eq!(base.npreds(), 0);
    assert_eq!(base.depth(), 0);
    assert_eq!(base.degree(), 2);
    assert!(base.tree().is_some());

    let app = by_name("app");
    assert_eq!(app.npreds(), 2);
    assert_eq!(app.depth(), 2);
    assert!(app.parent().is_some());

    let lib1 = by_name("lib1");
    assert_eq!(lib1.depth(), 1);
    assert_eq!(lib1.parent(), base.key());
}

#[test]
fn test_unbreakable_cycle_fails_with_count() {
    // Both relations carry script obligations, so nothing can be
    // removed and ordering must fail with the stuck count.
    let mut tx = Transaction::new();
    tx.push(added(
        "a",
        vec![Requirement::new("b").with_sense(DepSense::SCRIPT_PRE)],
    ));
    tx.push(added(
        "b",
        vec![Requirement::new("a").with_sense(DepSense::SCRIPT_POST)],
    ));
    tx.push(added("standalone", vec![]));

    let err = tx.order(&OrderConfig::new()).unwrap_err();
    match err {
        ordain::Error::DependencyLoop { remaining } => assert_eq!(remaining, 2),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_failure_leaves_sequence_intact() {
    let mut tx = Transaction::new();
    tx.push(added(
        "a",
        vec![Requirement::new("b").with_sense(DepSense::SCRIPT_PRE)],
    ));
    tx.push(added(
        "b",
        vec![Requirement::new("a").with_sense(DepSense::SCRIPT_POST)],
    ));

    assert!(tx.order(&OrderConfig::new()).is_err());

    // Every element still present, in submission order.
    assert_eq!(names(&tx), vec!["a", "b"]);
}

#[test]
fn test_termination_on_tangled_graph() {
    // A knot of cycles with a mix of plain and prerequisite relations:
    // the engine must finish one way or the other within the rescan
    // budget.
    let mut tx = Transaction::new();
    for i in 0..8 {
        let next = format!("p{}", (i + 1) % 8);
        let skip = format!("p{}", (i + 3) % 8);
        let sense = if i % 2 == 0 {
            DepSense::SCRIPT_PRE
        } else {
            DepSense::empty()
        };
        tx.push(added(
            &format!("p{}", i),
            vec![
                Requirement::new(next).with_sense(sense),
                Requirement::new(skip),
            ],
        ));
    }

    match tx.order(&OrderConfig::new()) {
        Ok(()) => assert_eq!(tx.len(), 8),
        Err(ordain::Error::DependencyLoop { remaining }) => {
            assert!(remaining > 0 && remaining <= 8);
            assert_eq!(tx.len(), 8);
        }
        Err(other) => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_removal_waits_for_pending_installs() {
    let mut tx = Transaction::new();
    tx.push(removed("r1", vec![]));
    tx.push(removed("r2", vec![Requirement::new("r1")]));
    tx.push(added("b", vec![]));
    tx.push(added("c", vec![Requirement::new("b")]));

    tx.order(&OrderConfig::new()).unwrap();

    // Erase reversal schedules r2 first and frees r1 in a later wave
    // than b; r1 still queues behind the pending install, while c's
    // later wave does let it pass the removal.
    assert_eq!(names(&tx), vec!["r2", "b", "c", "r1"]);
}

#[test]
fn test_ignore_list_breaks_would_be_cycle() {
    // The configured pair suppresses one direction of the cycle up
    // front, so no loop breaking is needed.
    let mut tx = Transaction::new();
    tx.push(added("pam", vec![Requirement::new("initscripts")]));
    tx.push(added(
        "initscripts",
        vec![Requirement::new("pam").with_sense(DepSense::SCRIPT_PRE)],
    ));

    let config = OrderConfig::new().with_ignore_text("pam>initscripts");
    tx.order(&config).unwrap();

    // Only initscripts' prerequisite on pam remains.
    assert_eq!(names(&tx), vec!["pam", "initscripts"]);
}

#[test]
fn test_out_of_transaction_requirements_ignored() {
    let mut tx = Transaction::new();
    tx.push(added(
        "app",
        vec![Requirement::new("glibc"), Requirement::new("systemd")],
    ));

    tx.order(&OrderConfig::new()).unwrap();
    assert_eq!(names(&tx), vec!["app"]);
}

#[test]
fn test_versioned_requirement_inside_transaction() {
    let mut tx = Transaction::new();
    tx.push(
        Element::new(ElementKind::Added, "app", version("2.0.0")).with_requires(vec![
            Requirement::versioned("lib", ">=1.5".parse().unwrap()),
        ]),
    );
    tx.push(Element::new(ElementKind::Added, "lib", version("1.6.0")));

    tx.order(&OrderConfig::new()).unwrap();
    assert_eq!(names(&tx), vec!["lib", "app"]);
}

#[test]
fn test_mixed_upgrade_transaction() {
    // Upgrade shape: new versions installed, old versions erased, with
    // the erasures depending on each other.
    let mut tx = Transaction::new();
    tx.push(added("app", vec![Requirement::new("lib")]));
    tx.push(added("lib", vec![]));
    tx.push(removed("old-app", vec![Requirement::new("old-lib")]));
    tx.push(removed("old-lib", vec![]));

    tx.order(&OrderConfig::new()).unwrap();

    let order = names(&tx);
    let pos = |name: &str| order.iter().position(|n| *n == name).unwrap();

    assert!(pos("lib") < pos("app"));
    // Erase reversal: the requirer goes before what it required.
    assert!(pos("old-app") < pos("old-lib"));
    // Installs precede unrelated erasures.
    assert!(pos("app") < pos("old-app"));
    assert!(pos("lib") < pos("old-lib"));
}
