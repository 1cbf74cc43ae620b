//! World orchestration layer.
//!
//! [`World`] is the single caller-owned entry point: it owns the entity data
//! behind a [`WorldCell`] and the registered systems, and drives one tick per
//! [`update`](World::update) call. There is no global registry; dropping the
//! world drops everything it owns.
//!
//! ## Concurrency model
//!
//! Entity data is internally mutable: the cell wraps the [`EntityManager`] in
//! an `UnsafeCell` so task bodies running on worker threads can reach storage
//! through a lightweight [`WorldRef`]. Safety is enforced by *API
//! discipline*, not the borrow checker:
//!
//! * structural mutation outside a tick goes through `&mut World`,
//! * during a tick, the schedule's derived edges keep conflicting accesses on
//!   different levels; tasks within a level must not overlap on writes.
//!
//! ## Safety
//!
//! The unsafe code here is confined to the cell: `Sync` for [`WorldCell`] and
//! the two dereferences in [`WorldRef`]. Both rely on the scheduling
//! invariants above.

use std::cell::UnsafeCell;

use crate::engine::component::{ComponentInfo, ComponentSet};
use crate::engine::error::{ScheduleError, WorldError};
use crate::engine::manager::EntityManager;
use crate::engine::schedule::Schedule;
use crate::engine::systems::{System, SystemManager};
use crate::engine::types::EntityId;

/// Interior-mutable owner of the entity data.
///
/// ## Role
/// Shared across worker threads during a tick; every access goes through a
/// [`WorldRef`] handed out by [`world_ref`](WorldCell::world_ref).
pub struct WorldCell {
    inner: UnsafeCell<EntityManager>,
}

// Shared access from worker threads is mediated by the schedule's edge
// derivation; the cell itself never hands out overlapping exclusive borrows.
unsafe impl Sync for WorldCell {}

impl WorldCell {
    pub(crate) fn new(entities: EntityManager) -> Self {
        Self {
            inner: UnsafeCell::new(entities),
        }
    }

    /// Returns a lightweight handle to the entity data.
    ///
    /// ## Safety
    /// The handle permits both shared and exclusive access; callers rely on
    /// the schedule (or on holding `&mut World`) to avoid conflicting use.
    #[inline]
    pub fn world_ref(&self) -> WorldRef<'_> {
        WorldRef { inner: &self.inner }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self) -> &mut EntityManager {
        self.inner.get_mut()
    }
}

/// Non-owning handle granting access to the entity data.
///
/// ## Safety
/// Exposes raw access through the cell; no aliasing guarantees are enforced
/// at compile time. Task access declarations are the contract.
#[derive(Clone, Copy)]
pub struct WorldRef<'a> {
    inner: &'a UnsafeCell<EntityManager>,
}

impl<'a> WorldRef<'a> {
    /// Shared view of the entity data.
    ///
    /// ## Safety
    /// No exclusive access may be active for the duration of the borrow.
    #[inline]
    pub fn data(&self) -> &'a EntityManager {
        unsafe { &*self.inner.get() }
    }

    /// Exclusive view of the entity data.
    ///
    /// ## Safety
    /// The caller must be the only active accessor; for task bodies this
    /// means every touched component is covered by the task's write set.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub fn data_mut(&self) -> &'a mut EntityManager {
        unsafe { &mut *self.inner.get() }
    }
}

/// Read-only view of one entity's component set.
#[derive(Clone, Copy)]
pub struct EntityView<'a> {
    entities: &'a EntityManager,
    entity: EntityId,
}

impl<'a> EntityView<'a> {
    /// Handle this view refers to.
    #[inline]
    pub fn id(&self) -> EntityId {
        self.entity
    }

    /// Returns `true` if the handle is live and current-generation.
    #[inline]
    pub fn alive(&self) -> bool {
        self.entities.is_alive(self.entity)
    }

    /// Returns `true` if the entity holds component `T`.
    pub fn has<T: 'static>(&self) -> bool {
        self.entities.has::<T>(self.entity)
    }

    /// Returns `true` if the entity holds the named component.
    pub fn has_named(&self, name: &str) -> bool {
        self.entities.has_named(self.entity, name)
    }

    /// The entity's component `T`, if present.
    pub fn get<T: 'static>(&self) -> Option<&'a T> {
        self.entities.get(self.entity)
    }

    /// Byte view of the entity's dynamically-named component, if present.
    pub fn get_named(&self, name: &str) -> Option<&'a [u8]> {
        self.entities.get_named(self.entity, name)
    }
}

/// Caller-owned ECS world: entity data plus registered systems.
#[derive(Default)]
pub struct World {
    cell: WorldCell,
    systems: SystemManager,
}

impl Default for WorldCell {
    fn default() -> Self {
        Self::new(EntityManager::new())
    }
}

impl World {
    /// Empty world with no entities and no systems.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the entity data.
    pub fn entities(&self) -> &EntityManager {
        // `&self` excludes `&mut World` mutators; ticks only run under
        // `&mut self` in `update`, so no task body is live here.
        self.cell.world_ref().data()
    }

    /// Exclusive view of the entity data.
    pub fn entities_mut(&mut self) -> &mut EntityManager {
        self.cell.get_mut()
    }

    /// The interior-mutable cell, for driving a [`Schedule`] by hand.
    pub fn cell(&self) -> &WorldCell {
        &self.cell
    }

    /// Creates one entity whose component set is the tuple `B`.
    pub fn create<B: ComponentSet>(&mut self) -> Result<EntityId, WorldError> {
        self.entities_mut().create::<B>()
    }

    /// Creates `count` entities sharing the component set `B`.
    pub fn create_many<B: ComponentSet>(&mut self, count: u32) -> Result<Vec<EntityId>, WorldError> {
        self.entities_mut().create_many::<B>(count)
    }

    /// Creates one entity from explicit descriptors (static and dynamic mix).
    pub fn create_with(&mut self, infos: Vec<ComponentInfo>) -> Result<EntityId, WorldError> {
        self.entities_mut().create_with(infos)
    }

    /// Creates `count` entities from explicit descriptors.
    pub fn create_many_with(
        &mut self,
        count: u32,
        infos: Vec<ComponentInfo>,
    ) -> Result<Vec<EntityId>, WorldError> {
        self.entities_mut().create_many_with(count, infos)
    }

    /// Destroys `entity`; dead and stale handles are silently ignored.
    pub fn destroy(&mut self, entity: EntityId) -> bool {
        self.entities_mut().destroy(entity)
    }

    /// Returns `true` if `entity` is a live, current-generation handle.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities().is_alive(entity)
    }

    /// Number of live entities.
    pub fn num_entities(&self) -> usize {
        self.entities().num_entities()
    }

    /// Shared access to `entity`'s component `T`.
    pub fn get<T: 'static>(&self, entity: EntityId) -> Option<&T> {
        self.entities().get(entity)
    }

    /// Exclusive access to `entity`'s component `T`.
    pub fn get_mut<T: 'static>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.entities_mut().get_mut(entity)
    }

    /// Byte view of `entity`'s dynamically-named component.
    pub fn get_named(&self, entity: EntityId, name: &str) -> Option<&[u8]> {
        self.entities().get_named(entity, name)
    }

    /// Mutable byte view of `entity`'s dynamically-named component.
    pub fn get_named_mut(&mut self, entity: EntityId, name: &str) -> Option<&mut [u8]> {
        self.entities_mut().get_named_mut(entity, name)
    }

    /// Adds component `T` to `entity`, migrating its archetype if needed.
    pub fn emplace<T: Default + Send + Sync + 'static>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> bool {
        self.entities_mut().emplace(entity, value)
    }

    /// Removes component `T` from `entity`, migrating its archetype if needed.
    pub fn remove<T: 'static>(&mut self, entity: EntityId) -> bool {
        self.entities_mut().remove::<T>(entity)
    }

    /// Adds the dynamically-named component `name` holding `bytes`.
    pub fn emplace_named(
        &mut self,
        entity: EntityId,
        name: &str,
        bytes: &[u8],
    ) -> Result<bool, WorldError> {
        self.entities_mut().emplace_named(entity, name, bytes)
    }

    /// Removes the dynamically-named component `name` from `entity`.
    pub fn remove_named(&mut self, entity: EntityId, name: &str) -> bool {
        self.entities_mut().remove_named(entity, name)
    }

    /// Read-only view of `entity`'s component set.
    pub fn entity(&self, entity: EntityId) -> EntityView<'_> {
        EntityView {
            entities: self.entities(),
            entity,
        }
    }

    /// Registers system `S`, firing `on_create` then `on_enable`.
    ///
    /// Re-registration of an already-known system is a no-op.
    pub fn register_system<S: System + Default + 'static>(&mut self) {
        self.systems.register::<S>(self.cell.world_ref());
    }

    /// Enables system `S`; firing `on_enable` only on the transition.
    pub fn enable_system<S: System + 'static>(&mut self) {
        self.systems.enable::<S>(self.cell.world_ref());
    }

    /// Disables system `S`; firing `on_disable` only on the transition.
    pub fn disable_system<S: System + 'static>(&mut self) {
        self.systems.disable::<S>(self.cell.world_ref());
    }

    /// Removes system `S`, firing `on_disable` (if enabled) then `on_destroy`.
    pub fn unregister_system<S: System + 'static>(&mut self) {
        self.systems.unregister::<S>(self.cell.world_ref());
    }

    /// Returns `true` if system `S` is registered and enabled.
    pub fn system_enabled<S: System + 'static>(&self) -> bool {
        self.systems.is_enabled::<S>()
    }

    /// Runs one tick.
    ///
    /// Builds a fresh [`Schedule`], lets every enabled system contribute
    /// tasks in registration order, and runs the graph to completion. A
    /// detected cycle skips the whole tick: no task body runs and the world
    /// is left untouched.
    pub fn update(&mut self) -> Result<(), ScheduleError> {
        let mut schedule = Schedule::new();
        self.systems.update(&mut schedule);
        schedule.run(&self.cell)
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.num_entities())
            .field("systems", &self.systems.len())
            .finish()
    }
}
