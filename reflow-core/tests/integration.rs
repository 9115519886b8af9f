//! Integration Tests for the Reactive Engine
//!
//! These tests verify that cells, memos, outputs and modules work together
//! correctly through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use reflow_core::filter::{FilterMethod, FilterPanel, Selection, Table, FILTERED};
use reflow_core::graph::DirtyState;
use reflow_core::{Graph, GraphConfig, Memo, ReactiveError, SessionRegistry};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

fn penguins() -> Table {
    Table::from_json(
        r#"[
            {"species": "Adelie", "bill_length_mm": 39.1, "body_mass_g": 3750},
            {"species": "Adelie", "bill_length_mm": 39.5, "body_mass_g": 3800},
            {"species": "Gentoo", "bill_length_mm": 46.1, "body_mass_g": 4500},
            {"species": "Gentoo", "bill_length_mm": 50.0, "body_mass_g": 5700},
            {"species": "Chinstrap", "bill_length_mm": 46.5, "body_mass_g": 3500},
            {"species": "Chinstrap", "bill_length_mm": 50.0, "body_mass_g": 3900}
        ]"#,
    )
    .unwrap()
}

/// A memo recomputes only when something it read moved forward.
#[test]
fn memo_recomputes_only_on_dependency_change() {
    init_tracing();
    let graph = Graph::new();
    let a = graph.cell("a", 1).unwrap();
    let unrelated = graph.cell("unrelated", 0).unwrap();
    let calls = counter();

    let a_clone = a.clone();
    let calls_clone = calls.clone();
    let memo = graph
        .memo("m", move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(a_clone.get() * 100)
        })
        .unwrap();

    assert_eq!(memo.get().unwrap(), 100);
    assert_eq!(memo.get().unwrap(), 100);
    assert_eq!(count(&calls), 1);

    unrelated.set(5);
    assert_eq!(memo.get().unwrap(), 100);
    assert_eq!(count(&calls), 1);

    a.set(2);
    assert_eq!(memo.get().unwrap(), 200);
    assert_eq!(count(&calls), 2);

    // Writing the same value still counts as a write
    a.set(2);
    assert_eq!(memo.get().unwrap(), 200);
    assert_eq!(count(&calls), 3);
}

/// Only the branch actually taken is a dependency.
#[test]
fn dynamic_dependencies_follow_the_branch_taken() {
    init_tracing();
    let graph = Graph::new();
    let use_a = graph.cell("use_a", true).unwrap();
    let a = graph.cell("a", 1).unwrap();
    let b = graph.cell("b", 2).unwrap();
    let calls = counter();

    let (c, a_clone, b_clone, calls_clone) = (use_a.clone(), a.clone(), b.clone(), calls.clone());
    let memo = graph
        .memo("pick", move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(if c.get() { a_clone.get() } else { b_clone.get() })
        })
        .unwrap();

    assert_eq!(memo.get().unwrap(), 1);
    assert_eq!(graph.snapshot().node("pick").unwrap().dependencies, ["use_a", "a"]);

    // B is not read yet, so writing it is free
    b.set(20);
    assert_eq!(memo.get().unwrap(), 1);
    assert_eq!(count(&calls), 1);

    use_a.set(false);
    assert_eq!(memo.get().unwrap(), 20);
    assert_eq!(count(&calls), 2);
    assert_eq!(graph.snapshot().node("pick").unwrap().dependencies, ["use_a", "b"]);

    // A dropped out of the dependency set
    a.set(10);
    assert_eq!(memo.state(), DirtyState::Clean);
    assert_eq!(memo.get().unwrap(), 20);
    assert_eq!(count(&calls), 2);

    b.set(30);
    assert_eq!(memo.get().unwrap(), 30);
    assert_eq!(count(&calls), 3);
}

/// D reads B and C, both of which read A. One write, one evaluation each.
#[test]
fn diamond_evaluates_each_node_once() {
    init_tracing();
    let graph = Graph::new();
    let a = graph.cell("a", 1).unwrap();
    let (b_calls, c_calls, d_calls) = (counter(), counter(), counter());

    let (a1, calls) = (a.clone(), b_calls.clone());
    let b = graph
        .memo("b", move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(a1.get() + 1)
        })
        .unwrap();

    let (a2, calls) = (a.clone(), c_calls.clone());
    let c = graph
        .memo("c", move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(a2.get() * 2)
        })
        .unwrap();

    let (b1, c1, calls) = (b.clone(), c.clone(), d_calls.clone());
    let d = graph
        .memo("d", move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(b1.get()? + c1.get()?)
        })
        .unwrap();

    assert_eq!(d.get().unwrap(), 4);
    assert_eq!((count(&b_calls), count(&c_calls), count(&d_calls)), (1, 1, 1));

    a.set(10);
    assert_eq!(d.get().unwrap(), 31);
    assert_eq!((count(&b_calls), count(&c_calls), count(&d_calls)), (2, 2, 2));

    // D records B and C, never A
    assert_eq!(graph.snapshot().node("d").unwrap().dependencies, ["b", "c"]);
}

/// Recomputing to an equal value stops propagation there.
#[test]
fn unchanged_intermediate_value_cuts_off_dependents() {
    init_tracing();
    let graph = Graph::new();
    let a = graph.cell("a", 3).unwrap();
    let d_calls = counter();

    let a1 = a.clone();
    let parity = graph.memo("parity", move || Ok(a1.get() % 2)).unwrap();

    let (p, calls) = (parity.clone(), d_calls.clone());
    let label = graph
        .memo("label", move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(if p.get()? == 0 { "even" } else { "odd" })
        })
        .unwrap();

    assert_eq!(label.get().unwrap(), "odd");
    a.set(7);
    assert_eq!(label.state(), DirtyState::MaybeDirty);
    assert_eq!(label.get().unwrap(), "odd");
    assert_eq!(parity.compute_count(), 2);
    assert_eq!(count(&d_calls), 1);

    a.set(8);
    assert_eq!(label.get().unwrap(), "even");
    assert_eq!(count(&d_calls), 2);
}

/// A reader that handles a failing memo still picks up its recovery.
#[test]
fn handled_failure_still_records_the_read() {
    init_tracing();
    let graph = Graph::new();
    let divisor = graph.cell("divisor", 0).unwrap();

    let d = divisor.clone();
    let quotient = graph
        .memo("quotient", move || {
            let d = d.get();
            if d == 0 {
                return Err(ReactiveError::compute("division by zero"));
            }
            Ok(100 / d)
        })
        .unwrap();

    let q = quotient.clone();
    let display = graph
        .memo("display", move || Ok(q.get().unwrap_or(-1)))
        .unwrap();

    assert_eq!(display.get().unwrap(), -1);
    assert_eq!(graph.snapshot().node("display").unwrap().dependencies, ["quotient"]);
    assert_eq!(graph.snapshot().node("quotient").unwrap().dependencies, ["divisor"]);

    divisor.set(4);
    assert_eq!(display.get().unwrap(), 25);
    assert_eq!(quotient.get().unwrap(), 25);
}

type Slot = Arc<RwLock<Option<Memo<i32>>>>;

fn slot() -> Slot {
    Arc::new(RwLock::new(None))
}

fn read_slot(slot: &Slot) -> reflow_core::Result<i32> {
    let memo = slot.read().clone();
    match memo {
        Some(memo) => memo.get(),
        None => Ok(0),
    }
}

/// A two-node cycle is reported on the first read and leaves the rest of
/// the graph usable.
#[test]
fn cycles_are_detected_without_overflow() {
    init_tracing();
    let graph = Graph::new();
    let (to_b, to_a) = (slot(), slot());

    let next = to_b.clone();
    let a = graph.memo("a", move || Ok(read_slot(&next)? + 1)).unwrap();
    let next = to_a.clone();
    let b = graph.memo("b", move || Ok(read_slot(&next)? + 1)).unwrap();

    *to_b.write() = Some(b.clone());
    *to_a.write() = Some(a.clone());

    match a.get().unwrap_err() {
        ReactiveError::CyclicDependency { cycle } => assert_eq!(cycle, ["a", "b", "a"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(b.get().unwrap_err().is_cycle());

    let healthy = graph.memo("healthy", || Ok(1)).unwrap();
    assert_eq!(healthy.get().unwrap(), 1);

    // Breaking the cycle makes both readable again
    to_a.write().take();
    assert_eq!(b.get().unwrap(), 1);
    assert_eq!(a.get().unwrap(), 2);

    to_b.write().take();
}

/// The reference scenario: a bill range filter over three rows.
#[test]
fn bill_range_filter_scenario() {
    init_tracing();
    let graph = Graph::new();
    let min_bill = graph.cell("minBill", 30.0).unwrap();
    let max_bill = graph.cell("maxBill", 50.0).unwrap();
    let rows = Table::from_json(r#"[{"bill": 35}, {"bill": 55}, {"bill": 45}]"#).unwrap();
    let calls = counter();

    let (lo, hi, calls_clone) = (min_bill.clone(), max_bill.clone(), calls.clone());
    let filtered = graph
        .memo("filtered", move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let range = Selection::Range(lo.get(), hi.get());
            Ok(rows.try_filter(|row| FilterMethod::Between.matches(&row["bill"], &range))?)
        })
        .unwrap();

    let expected = Table::from_json(r#"[{"bill": 35}, {"bill": 45}]"#).unwrap();
    assert_eq!(filtered.get().unwrap(), expected);
    assert_eq!(count(&calls), 1);

    max_bill.set(40.0);
    let expected = Table::from_json(r#"[{"bill": 35}]"#).unwrap();
    assert_eq!(filtered.get().unwrap(), expected);
    assert_eq!(count(&calls), 2);
}

/// The same panel instantiated twice keeps separate state.
#[test]
fn panel_instances_are_isolated() {
    init_tracing();
    let table = penguins();
    let panel = FilterPanel::for_columns(&table, &table.columns()).unwrap();
    let graph = Graph::new();

    let left = graph.instantiate(&panel, "left", table.clone()).unwrap();
    let right = graph.instantiate(&panel, "right", table.clone()).unwrap();

    left.cell::<Selection>("filter_species")
        .unwrap()
        .set(Selection::Set(vec!["Gentoo".into()]));

    let left_df: Memo<Table> = left.memo(FILTERED).unwrap();
    let right_df: Memo<Table> = right.memo(FILTERED).unwrap();

    assert_eq!(left_df.get().unwrap().len(), 2);
    assert_eq!(right_df.get().unwrap(), table);
    assert_eq!(right_df.compute_count(), 1);
}

/// An output rendering a module's exposed memo, as the presentation layer
/// would use it.
#[test]
fn output_follows_module_results() {
    init_tracing();
    let table = penguins();
    let panel = FilterPanel::for_columns(&table, &["species", "bill_length_mm"]).unwrap();
    let graph = Graph::new();
    let filters = graph.instantiate(&panel, "filters", table).unwrap();

    let df: Memo<Table> = filters.memo(FILTERED).unwrap();
    let view = graph
        .output("filtered_data", move || Ok(df.get()?.len()))
        .unwrap();

    let invalidations = counter();
    let inv = invalidations.clone();
    view.on_invalidate(move || {
        inv.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(view.render().unwrap(), 6);

    filters
        .cell::<Selection>("filter_bill_length_mm")
        .unwrap()
        .set(Selection::Range(40.0, 50.0));
    assert_eq!(count(&invalidations), 1);
    assert!(view.is_stale());
    assert_eq!(view.render().unwrap(), 4);
    assert_eq!(view.render_count(), 2);
}

/// Long chains stop at the configured depth instead of recursing forever.
#[test]
fn depth_limit_bounds_evaluation_chains() {
    init_tracing();
    let graph = Graph::with_config(GraphConfig::default().with_max_depth(4));
    let source = graph.cell("source", 1).unwrap();

    let s = source.clone();
    let mut last = graph.memo("m0", move || Ok(s.get())).unwrap();
    for i in 1..10 {
        let prev = last.clone();
        last = graph.memo(format!("m{i}"), move || Ok(prev.get()? + 1)).unwrap();
    }

    let err = last.get().unwrap_err();
    assert!(matches!(err, ReactiveError::DepthExceeded { limit: 4, .. }));
}

/// Readers on other threads never see a half-updated memo.
#[test]
fn concurrent_reads_are_consistent() {
    init_tracing();
    let graph = Graph::new();
    let a = graph.cell("a", 0_i64).unwrap();

    let a_clone = a.clone();
    let pair = graph
        .memo("pair", move || {
            let value = a_clone.get();
            Ok((value, value * 2))
        })
        .unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let pair = pair.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let (x, y) = pair.get().unwrap();
                    assert_eq!(y, x * 2);
                }
            })
        })
        .collect();

    for i in 1..=200 {
        a.set(i);
    }
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(pair.get().unwrap(), (200, 400));
}

/// Each session gets its own graph and module instances.
#[test]
fn sessions_do_not_share_cells() {
    init_tracing();
    let table = penguins();
    let panel = FilterPanel::for_columns(&table, &["species"]).unwrap();
    let registry = SessionRegistry::default();

    let (alice, _) = registry.open("alice");
    let (bob, _) = registry.open("bob");
    let alice_panel = alice.instantiate(&panel, "filters", table.clone()).unwrap();
    let bob_panel = bob.instantiate(&panel, "filters", table.clone()).unwrap();

    alice_panel
        .cell::<Selection>("filter_species")
        .unwrap()
        .set(Selection::Set(vec![]));

    assert!(alice_panel.memo::<Table>(FILTERED).unwrap().get().unwrap().is_empty());
    assert_eq!(bob_panel.memo::<Table>(FILTERED).unwrap().get().unwrap(), table);
}

/// The diagnostic snapshot serializes to JSON.
#[test]
fn snapshot_serializes() {
    init_tracing();
    let graph = Graph::new();
    let a = graph.cell("a", 1).unwrap();
    let a1 = a.clone();
    let m = graph.memo("m", move || Ok(a1.get() + 1)).unwrap();
    m.get().unwrap();

    let json = serde_json::to_value(graph.snapshot()).unwrap();
    let nodes = json["nodes"].as_array().unwrap();

    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[1]["name"], "m");
    assert_eq!(nodes[1]["kind"], "derived");
    assert_eq!(nodes[1]["state"], "clean");
    assert_eq!(nodes[1]["dependencies"][0], "a");
}
