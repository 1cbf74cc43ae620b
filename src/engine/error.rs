//! Error types for world mutation and schedule validation.
//!
//! The taxonomy follows the engine's recovery policy: everything that can go
//! wrong at registration time (duplicate task names, unknown order
//! references) is recovered locally with a warning at the call site and never
//! surfaces as an error value. Query-style component access reports absence
//! through `Option`, not through `Result`. What remains here are the few
//! conditions a caller can actually observe:
//!
//! * [`ScheduleError::CycleDetected`] — the one tick-level failure. The
//!   schedule is rejected before any task body runs and the engine continues
//!   to the next tick.
//! * [`WorldError`] — structural failures during entity creation.

use thiserror::Error;

/// Failure raised while validating or running one tick's schedule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// The task dependency graph contains at least one cycle.
    ///
    /// No task body was executed; a DOT rendering of the offending graph was
    /// written to the log sink before this was returned.
    #[error("task dependency graph contains a cycle ({unsorted} of {total} tasks unsortable)")]
    CycleDetected {
        /// Number of tasks left unsorted by topological ordering.
        unsorted: usize,
        /// Total number of tasks registered this tick.
        total: usize,
    },
}

/// Failure raised by structural world operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    /// The entity allocator ran out of addressable slots.
    #[error("entity limit reached ({needed} needed; capacity {capacity})")]
    Capacity {
        /// Total entity slots the operation required.
        needed: u64,
        /// Addressable slot capacity of the allocator.
        capacity: u64,
    },

    /// An entity was created with an empty component set.
    #[error("cannot create an entity with no components")]
    EmptyComponentSet,

    /// A dynamic component descriptor was registered twice with conflicting
    /// layouts.
    #[error("dynamic component {name:?} redeclared with a different size ({size} != {previous})")]
    DynamicRedeclared {
        /// Component name.
        name: String,
        /// Size supplied by the conflicting declaration.
        size: usize,
        /// Size recorded by the first declaration.
        previous: usize,
    },
}
