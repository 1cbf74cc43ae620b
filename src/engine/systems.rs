//! System lifecycle and per-tick task contribution.
//!
//! A **system** is a long-lived unit of behaviour registered on the world.
//! Unlike tasks, which live for one tick, a system persists and reacts to a
//! small set of lifecycle events through the hooks on the [`System`] trait.
//! Every hook has a provided no-op default, so a system implements only the
//! events it cares about:
//!
//! - `on_create` / `on_destroy` — bracket the registration lifetime,
//! - `on_enable` / `on_disable` — bracket active periods; both transitions
//!   are idempotent and fire the hook exactly once,
//! - `on_update` — called once per tick while enabled, in registration
//!   order, to contribute tasks to that tick's [`Schedule`].
//!
//! Systems never execute work inside `on_update`; they only describe it. The
//! schedule decides ordering and parallelism from the declared access sets.

use std::any::{type_name, TypeId};

use fxhash::FxHashMap;
use log::{debug, warn};

use crate::engine::schedule::Schedule;
use crate::engine::world::WorldRef;

/// Long-lived unit of behaviour with lifecycle hooks.
///
/// All hooks default to no-ops. Systems must be `Send + Sync`: the manager
/// lives inside the world, which crosses thread boundaries during ticks.
pub trait System: Send + Sync {
    /// Fired once when the system is first registered.
    fn on_create(&mut self, _world: WorldRef<'_>) {}

    /// Fired when the system transitions from disabled to enabled.
    fn on_enable(&mut self, _world: WorldRef<'_>) {}

    /// Fired once per tick while enabled; contributes this tick's tasks.
    fn on_update(&mut self, _schedule: &mut Schedule) {}

    /// Fired when the system transitions from enabled to disabled.
    fn on_disable(&mut self, _world: WorldRef<'_>) {}

    /// Fired once when the system is unregistered.
    fn on_destroy(&mut self, _world: WorldRef<'_>) {}
}

struct SystemEntry {
    name: &'static str,
    type_id: TypeId,
    enabled: bool,
    system: Box<dyn System>,
}

/// Registry of systems, keyed by type, iterated in registration order.
///
/// ## Invariants
/// - `index` maps every entry's `TypeId` to its position in `entries`.
/// - Lifecycle hooks fire exactly once per transition; redundant enable or
///   disable calls are no-ops.
#[derive(Default)]
pub struct SystemManager {
    entries: Vec<SystemEntry>,
    index: FxHashMap<TypeId, usize>,
}

impl SystemManager {
    /// Number of registered systems.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no system is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers `S`, firing `on_create` then `on_enable`. Registering an
    /// already-known system is a no-op.
    pub(crate) fn register<S: System + Default + 'static>(&mut self, world: WorldRef<'_>) {
        let type_id = TypeId::of::<S>();
        if self.index.contains_key(&type_id) {
            debug!("system {} is already registered", type_name::<S>());
            return;
        }

        let mut system: Box<dyn System> = Box::new(S::default());
        system.on_create(world);
        system.on_enable(world);

        self.index.insert(type_id, self.entries.len());
        self.entries.push(SystemEntry {
            name: type_name::<S>(),
            type_id,
            enabled: true,
            system,
        });
    }

    /// Enables `S`; the hook fires only on a disabled-to-enabled transition.
    pub(crate) fn enable<S: System + 'static>(&mut self, world: WorldRef<'_>) {
        match self.index.get(&TypeId::of::<S>()) {
            Some(&position) => {
                let entry = &mut self.entries[position];
                if !entry.enabled {
                    entry.enabled = true;
                    entry.system.on_enable(world);
                }
            }
            None => warn!("enable of unregistered system {}", type_name::<S>()),
        }
    }

    /// Disables `S`; the hook fires only on an enabled-to-disabled transition.
    pub(crate) fn disable<S: System + 'static>(&mut self, world: WorldRef<'_>) {
        match self.index.get(&TypeId::of::<S>()) {
            Some(&position) => {
                let entry = &mut self.entries[position];
                if entry.enabled {
                    entry.enabled = false;
                    entry.system.on_disable(world);
                }
            }
            None => warn!("disable of unregistered system {}", type_name::<S>()),
        }
    }

    /// Unregisters `S`: force-disables it (firing `on_disable` if it was
    /// enabled), fires `on_destroy`, and erases the entry.
    pub(crate) fn unregister<S: System + 'static>(&mut self, world: WorldRef<'_>) {
        let Some(position) = self.index.remove(&TypeId::of::<S>()) else {
            warn!("unregister of unregistered system {}", type_name::<S>());
            return;
        };

        let mut entry = self.entries.remove(position);
        if entry.enabled {
            entry.system.on_disable(world);
        }
        entry.system.on_destroy(world);
        debug!("unregistered system {}", entry.name);

        // Removal shifted everything after `position` left by one.
        for (new_position, entry) in self.entries.iter().enumerate().skip(position) {
            self.index.insert(entry.type_id, new_position);
        }
    }

    /// Returns `true` if `S` is registered and currently enabled.
    pub(crate) fn is_enabled<S: System + 'static>(&self) -> bool {
        self.index
            .get(&TypeId::of::<S>())
            .map(|&position| self.entries[position].enabled)
            .unwrap_or(false)
    }

    /// Lets every enabled system, in registration order, contribute tasks.
    pub(crate) fn update(&mut self, schedule: &mut Schedule) {
        for entry in self.entries.iter_mut().filter(|entry| entry.enabled) {
            entry.system.on_update(schedule);
        }
    }
}
