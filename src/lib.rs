//! # Weft
//!
//! Archetype-based Entity-Component-System runtime with dependency-graph
//! tick scheduling.
//!
//! ## Design Goals
//! - Archetype storage in fixed-size columnar chunks for cache efficiency
//! - Per-tick task graphs derived from declared component access
//! - Parallel CPU execution of independent tasks on the Rayon pool
//! - Recover-and-warn error policy: a cyclic graph is the only tick failure
//!
//! ## Model
//!
//! Entities are grouped by their exact component set into **archetypes**;
//! each archetype stores component values in per-chunk columns. Systems are
//! long-lived and contribute short-lived **tasks** each tick; the schedule
//! orders tasks by their declared read/write/read-after access and runs
//! independent ones concurrently.

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

// Core ECS types

pub use engine::world::{
    EntityView,
    World,
    WorldCell,
    WorldRef,
};

pub use engine::manager::EntityManager;

pub use engine::component::{
    ComponentInfo,
    ComponentSet,
};

pub use engine::archetype::Archetype;

pub use engine::query::{
    ComponentChecker,
    Filter,
};

pub use engine::systems::{System, SystemManager};
pub use engine::schedule::{
    Access,
    Schedule,
};

pub use engine::error::{
    ScheduleError,
    WorldError,
};

pub use engine::types::{
    ArchetypeId,
    ComponentId,
    EntityId,
    CHUNK_SIZE,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used ECS types.
///
/// Import with:
/// ```rust
/// use weft::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Access,
        ComponentInfo,
        ComponentSet,
        EntityId,
        Filter,
        Schedule,
        System,
        World,
        WorldRef,
    };
}
