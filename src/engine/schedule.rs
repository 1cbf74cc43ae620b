//! Per-tick task scheduling over a dependency graph.
//!
//! Each tick builds a fresh [`Schedule`]: systems request named tasks, each
//! declaring the components it touches through an [`Access`] set, and the
//! schedule derives a directed acyclic graph from those declarations plus any
//! explicit orderings. Execution partitions the graph into **levels** (a task's
//! level is one past its deepest predecessor) and runs each level's tasks in
//! parallel on the Rayon pool; levels themselves run sequentially, so every
//! edge is honoured.
//!
//! ## Edge derivation
//!
//! For every component `c`, in order (self-edges skipped):
//!
//! 1. readers-before-write of `c` precede writers of `c`,
//! 2. readers-before-write of `c` precede readers-after-write of `c`,
//! 3. writers of `c` are chained in registration order,
//! 4. writers of `c` precede readers-after-write of `c`,
//! 5. explicit [`set_order`](Schedule::set_order) edges.
//!
//! ## Failure model
//!
//! Registration problems recover locally: a duplicate task name keeps the
//! first registration and warns, an order reference to an unknown task warns
//! and is skipped. A cyclic graph is the only tick-level failure: a Graphviz
//! DOT rendering with the cycle's edges coloured red goes to the log sink, no
//! task body runs, and [`run`](Schedule::run) reports
//! [`ScheduleError::CycleDetected`].
//!
//! ## Safety
//!
//! Task bodies receive a [`WorldRef`] with no per-slice locking; the declared
//! access sets and the derived edges are the whole safety story. A task that
//! understates its access can race with its peers inside a level.

use std::collections::VecDeque;
use std::fmt::Write as _;

use fxhash::{FxHashMap, FxHashSet};
use log::{error, warn};
use rayon::prelude::*;

use crate::engine::error::ScheduleError;
use crate::engine::types::ComponentId;
use crate::engine::world::{WorldCell, WorldRef};

/// Declared component access of one task.
///
/// Three sets drive edge derivation:
///
/// - `read` — observe the component **before** any writer runs this tick,
/// - `write` — mutate the component,
/// - `read_after` — observe the component **after** every writer ran.
///
/// Built by value so declarations chain at the request site:
///
/// ```ignore
/// Access::new().read::<Position>().write::<Velocity>()
/// ```
#[derive(Clone, Debug, Default)]
pub struct Access {
    reads_before: Vec<ComponentId>,
    writes: Vec<ComponentId>,
    reads_after: Vec<ComponentId>,
}

impl Access {
    /// Empty access set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a read of `T` ordered before this tick's writers.
    pub fn read<T: 'static>(mut self) -> Self {
        self.reads_before.push(ComponentId::of::<T>());
        self
    }

    /// Declares a write of `T`.
    pub fn write<T: 'static>(mut self) -> Self {
        self.writes.push(ComponentId::of::<T>());
        self
    }

    /// Declares a read of `T` ordered after this tick's writers.
    pub fn read_after<T: 'static>(mut self) -> Self {
        self.reads_after.push(ComponentId::of::<T>());
        self
    }

    /// [`read`](Self::read) for a dynamically-named component.
    pub fn read_named(mut self, name: &str) -> Self {
        self.reads_before.push(ComponentId::named(name));
        self
    }

    /// [`write`](Self::write) for a dynamically-named component.
    pub fn write_named(mut self, name: &str) -> Self {
        self.writes.push(ComponentId::named(name));
        self
    }

    /// [`read_after`](Self::read_after) for a dynamically-named component.
    pub fn read_after_named(mut self, name: &str) -> Self {
        self.reads_after.push(ComponentId::named(name));
        self
    }
}

type TaskBody = Box<dyn Fn(WorldRef<'_>) + Send + Sync>;

/// One named unit of tick work with its declared access.
struct Task {
    name: String,
    access: Access,
    body: TaskBody,
}

/// One tick's task graph.
///
/// A schedule is ephemeral: systems populate it, [`run`](Schedule::run)
/// consumes it, and the next tick starts from an empty one.
#[derive(Default)]
pub struct Schedule {
    tasks: Vec<Task>,
    names: FxHashMap<String, usize>,
    ordered: Vec<(usize, usize)>,
}

impl Schedule {
    /// Empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered tasks.
    #[inline]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if no task was registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Registers a named task.
    ///
    /// Registration order is significant: writers of the same component run
    /// in the order they were requested. A duplicate name keeps the first
    /// registration and warns. Returns `&mut Self` so requests chain.
    pub fn request(
        &mut self,
        name: impl Into<String>,
        access: Access,
        body: impl Fn(WorldRef<'_>) + Send + Sync + 'static,
    ) -> &mut Self {
        let name = name.into();
        if self.names.contains_key(&name) {
            warn!("task {name:?} requested twice; keeping the first registration");
            return self;
        }
        self.names.insert(name.clone(), self.tasks.len());
        self.tasks.push(Task {
            name,
            access,
            body: Box::new(body),
        });
        self
    }

    /// Adds an explicit edge: `first` runs before `second`.
    ///
    /// References to unknown task names warn and are skipped; the rest of the
    /// schedule is unaffected.
    pub fn set_order(&mut self, first: &str, second: &str) -> &mut Self {
        match (self.names.get(first), self.names.get(second)) {
            (Some(&before), Some(&after)) => {
                if before != after {
                    self.ordered.push((before, after));
                }
            }
            (None, _) => {
                warn!("set_order references unknown task {first:?}; ignoring the constraint");
            }
            (_, None) => {
                warn!("set_order references unknown task {second:?}; ignoring the constraint");
            }
        }
        self
    }

    /// Derives the adjacency sets from access declarations and explicit
    /// orderings.
    fn build_edges(&self) -> Vec<FxHashSet<usize>> {
        #[derive(Default)]
        struct ComponentUse {
            readers_before: Vec<usize>,
            writers: Vec<usize>,
            readers_after: Vec<usize>,
        }

        fn add(edges: &mut [FxHashSet<usize>], from: usize, to: usize) {
            if from != to {
                edges[from].insert(to);
            }
        }

        let mut uses: FxHashMap<ComponentId, ComponentUse> = FxHashMap::default();
        for (task, entry) in self.tasks.iter().enumerate() {
            for &component in &entry.access.reads_before {
                uses.entry(component).or_default().readers_before.push(task);
            }
            for &component in &entry.access.writes {
                uses.entry(component).or_default().writers.push(task);
            }
            for &component in &entry.access.reads_after {
                uses.entry(component).or_default().readers_after.push(task);
            }
        }

        let mut edges = vec![FxHashSet::default(); self.tasks.len()];
        for usage in uses.values() {
            for &reader in &usage.readers_before {
                for &writer in &usage.writers {
                    add(&mut edges, reader, writer);
                }
                for &late_reader in &usage.readers_after {
                    add(&mut edges, reader, late_reader);
                }
            }
            for pair in usage.writers.windows(2) {
                add(&mut edges, pair[0], pair[1]);
            }
            for &writer in &usage.writers {
                for &late_reader in &usage.readers_after {
                    add(&mut edges, writer, late_reader);
                }
            }
        }
        for &(before, after) in &self.ordered {
            add(&mut edges, before, after);
        }
        edges
    }

    /// Renders the task graph as Graphviz DOT, colouring edges between
    /// cycle-participating tasks red.
    fn render_dot(&self, edges: &[FxHashSet<usize>], core: &FxHashSet<usize>) -> String {
        let mut out = String::from("digraph schedule {\n");
        for (node, task) in self.tasks.iter().enumerate() {
            let _ = writeln!(out, "    n{node} [label={:?}];", task.name);
        }
        for (from, successors) in edges.iter().enumerate() {
            let mut successors: Vec<usize> = successors.iter().copied().collect();
            successors.sort_unstable();
            for to in successors {
                if core.contains(&from) && core.contains(&to) {
                    let _ = writeln!(out, "    n{from} -> n{to} [color=red];");
                } else {
                    let _ = writeln!(out, "    n{from} -> n{to};");
                }
            }
        }
        out.push_str("}\n");
        out
    }

    /// Validates the graph and runs it to completion.
    ///
    /// Levels execute sequentially; tasks within a level execute in parallel
    /// on the Rayon pool. The call blocks until the graph drains (the tick is
    /// a barrier). On a cycle no task body runs and the error carries how
    /// much of the graph was unsortable.
    pub fn run(self, world: &WorldCell) -> Result<(), ScheduleError> {
        if self.tasks.is_empty() {
            return Ok(());
        }

        let edges = self.build_edges();
        let levels = match topological_levels(&edges) {
            Ok(levels) => levels,
            Err(unsorted) => {
                let core = cycle_core(&edges);
                error!(
                    "task dependency cycle; skipping this tick\n{}",
                    self.render_dot(&edges, &core)
                );
                return Err(ScheduleError::CycleDetected {
                    unsorted,
                    total: self.tasks.len(),
                });
            }
        };

        let tasks = &self.tasks;
        for level in levels {
            level
                .par_iter()
                .for_each(|&task| (tasks[task].body)(world.world_ref()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedule")
            .field("tasks", &self.tasks.len())
            .field("ordered", &self.ordered.len())
            .finish()
    }
}

/// Kahn's algorithm, additionally assigning each task its level (one past its
/// deepest predecessor). Returns the tasks grouped by level, or the number of
/// unsortable tasks when the graph is cyclic.
fn topological_levels(edges: &[FxHashSet<usize>]) -> Result<Vec<Vec<usize>>, usize> {
    let total = edges.len();
    let mut indegree = vec![0usize; total];
    for successors in edges {
        for &successor in successors {
            indegree[successor] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..total).filter(|&node| indegree[node] == 0).collect();
    let mut level = vec![0usize; total];
    let mut sorted = 0usize;

    while let Some(node) = queue.pop_front() {
        sorted += 1;
        for &successor in &edges[node] {
            level[successor] = level[successor].max(level[node] + 1);
            indegree[successor] -= 1;
            if indegree[successor] == 0 {
                queue.push_back(successor);
            }
        }
    }

    if sorted < total {
        return Err(total - sorted);
    }

    let depth = level.iter().map(|&l| l + 1).max().unwrap_or(0);
    let mut levels = vec![Vec::new(); depth];
    for (node, &l) in level.iter().enumerate() {
        levels[l].push(node);
    }
    Ok(levels)
}

/// Trims the graph to the tasks participating in a cycle: nodes with no
/// remaining predecessor or successor are peeled until a fixed point.
fn cycle_core(edges: &[FxHashSet<usize>]) -> FxHashSet<usize> {
    let total = edges.len();
    let mut residue: FxHashSet<usize> = (0..total).collect();

    loop {
        let mut removable: Vec<usize> = Vec::new();
        for &node in &residue {
            let has_successor = edges[node].iter().any(|s| residue.contains(s));
            let has_predecessor = residue
                .iter()
                .any(|&other| other != node && edges[other].contains(&node));
            if !has_successor || !has_predecessor {
                removable.push(node);
            }
        }
        if removable.is_empty() {
            return residue;
        }
        for node in removable {
            residue.remove(&node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Position;
    #[derive(Default)]
    struct Velocity;

    fn noop(_: WorldRef<'_>) {}

    fn edge(edges: &[FxHashSet<usize>], from: usize, to: usize) -> bool {
        edges[from].contains(&to)
    }

    #[test]
    fn readers_before_precede_writers() {
        let mut schedule = Schedule::new();
        schedule
            .request("observe", Access::new().read::<Position>(), noop)
            .request("integrate", Access::new().write::<Position>(), noop);
        let edges = schedule.build_edges();
        assert!(edge(&edges, 0, 1));
        assert!(!edge(&edges, 1, 0));
    }

    #[test]
    fn writers_chain_in_registration_order() {
        let mut schedule = Schedule::new();
        schedule
            .request("first", Access::new().write::<Position>(), noop)
            .request("second", Access::new().write::<Position>(), noop)
            .request("third", Access::new().write::<Position>(), noop);
        let edges = schedule.build_edges();
        assert!(edge(&edges, 0, 1));
        assert!(edge(&edges, 1, 2));
        assert!(!edge(&edges, 2, 0));
    }

    #[test]
    fn writers_precede_readers_after() {
        let mut schedule = Schedule::new();
        schedule
            .request("settle", Access::new().read_after::<Velocity>(), noop)
            .request("integrate", Access::new().write::<Velocity>(), noop);
        let edges = schedule.build_edges();
        assert!(edge(&edges, 1, 0));
    }

    #[test]
    fn self_access_produces_no_self_edge() {
        let mut schedule = Schedule::new();
        schedule.request(
            "mixed",
            Access::new().read::<Position>().write::<Position>(),
            noop,
        );
        let edges = schedule.build_edges();
        assert!(edges[0].is_empty());
    }

    #[test]
    fn duplicate_name_keeps_first_registration() {
        let mut schedule = Schedule::new();
        schedule
            .request("tick", Access::new().write::<Position>(), noop)
            .request("tick", Access::new().write::<Velocity>(), noop);
        assert_eq!(schedule.len(), 1);
        assert!(schedule.tasks[0].access.writes == vec![ComponentId::of::<Position>()]);
    }

    #[test]
    fn unknown_order_reference_is_skipped() {
        let mut schedule = Schedule::new();
        schedule
            .request("known", Access::new(), noop)
            .set_order("known", "missing")
            .set_order("missing", "known");
        assert!(schedule.ordered.is_empty());
    }

    #[test]
    fn levels_respect_edge_depth() {
        let mut schedule = Schedule::new();
        schedule
            .request("a", Access::new().write::<Position>(), noop)
            .request("b", Access::new().write::<Position>(), noop)
            .request("c", Access::new().read_after::<Position>(), noop)
            .request("free", Access::new(), noop);
        let levels = topological_levels(&schedule.build_edges()).unwrap();
        assert_eq!(levels[0], vec![0, 3]);
        assert_eq!(levels[1], vec![1]);
        assert_eq!(levels[2], vec![2]);
    }

    #[test]
    fn cycle_is_detected_and_cored() {
        let mut schedule = Schedule::new();
        schedule
            .request("a", Access::new(), noop)
            .request("b", Access::new(), noop)
            .request("lone", Access::new(), noop)
            .set_order("a", "b")
            .set_order("b", "a");
        let edges = schedule.build_edges();
        assert_eq!(topological_levels(&edges), Err(2));

        let core = cycle_core(&edges);
        assert!(core.contains(&0));
        assert!(core.contains(&1));
        assert!(!core.contains(&2));

        let dot = schedule.render_dot(&edges, &core);
        assert!(dot.contains("color=red"));
    }
}
