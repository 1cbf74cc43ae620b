//! Entity and archetype bookkeeping.
//!
//! The [`EntityManager`] owns the entity allocator, every [`Archetype`], and
//! the registry of dynamically-named component layouts. It is the single
//! authority for the entity lifecycle:
//!
//! - **Creation** canonicalises the declared component set, derives the
//!   [`ArchetypeId`] from the sorted ids, and reuses the existing archetype or
//!   lazily creates one. Any permutation of the same component set lands in
//!   the same archetype.
//! - **Destruction** is a silent no-op for dead or stale handles; for live
//!   ones it swap-removes the storage row and retires the handle in one step.
//! - **Emplace/remove** migrate the entity's row between archetypes, moving
//!   shared component values and dropping the rest.
//!
//! Component access is `Option`-shaped end to end: a dead handle, a missing
//! component, or a type mismatch all answer `None` rather than erroring.

use fxhash::FxHashMap;
use log::debug;

use crate::engine::archetype::Archetype;
use crate::engine::component::{ComponentInfo, ComponentSet};
use crate::engine::entity::EntityAllocator;
use crate::engine::error::WorldError;
use crate::engine::query::{ComponentChecker, Filter};
use crate::engine::types::{ArchetypeId, ComponentId, EntityId};

/// Central store of entities, archetypes and dynamic component layouts.
#[derive(Default)]
pub struct EntityManager {
    allocator: EntityAllocator,
    archetypes: Vec<Archetype>,
    by_id: FxHashMap<ArchetypeId, usize>,
    dynamic: FxHashMap<ComponentId, ComponentInfo>,
}

/// Sorts descriptors into canonical order and drops duplicate ids, keeping
/// the first occurrence of each.
fn canonical_infos(mut infos: Vec<ComponentInfo>) -> Vec<ComponentInfo> {
    infos.sort();
    infos.dedup_by(|a, b| a.id() == b.id());
    infos
}

impl EntityManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Validates dynamic descriptors against the registry, recording
    /// first-seen layouts and rejecting redeclarations with a different size.
    fn register_dynamic(&mut self, infos: &[ComponentInfo]) -> Result<(), WorldError> {
        for info in infos.iter().filter(|info| info.rust_type().is_none()) {
            match self.dynamic.get(&info.id()) {
                Some(known) if known.size() != info.size() => {
                    return Err(WorldError::DynamicRedeclared {
                        name: info.name().to_owned(),
                        size: info.size(),
                        previous: known.size(),
                    });
                }
                Some(_) => {}
                None => {
                    self.dynamic.insert(info.id(), info.clone());
                }
            }
        }
        Ok(())
    }

    /// Index of the archetype for a canonical descriptor set, creating the
    /// archetype on first use.
    fn get_or_create_archetype(&mut self, infos: Vec<ComponentInfo>) -> usize {
        let ids: Vec<ComponentId> = infos.iter().map(ComponentInfo::id).collect();
        let id = ArchetypeId::new(ids.iter());
        match self.by_id.get(&id) {
            Some(&index) => index,
            None => {
                debug!(
                    "creating archetype {} with {} component(s)",
                    id,
                    infos.len()
                );
                let index = self.archetypes.len();
                self.archetypes.push(Archetype::new(id, infos));
                self.by_id.insert(id, index);
                index
            }
        }
    }

    /// Creates one entity whose component set is the tuple `B`.
    ///
    /// Every component is default-constructed. Declaration order within the
    /// tuple does not matter.
    pub fn create<B: ComponentSet>(&mut self) -> Result<EntityId, WorldError> {
        self.create_with(B::component_infos())
    }

    /// Creates `count` entities sharing the component set `B`.
    pub fn create_many<B: ComponentSet>(&mut self, count: u32) -> Result<Vec<EntityId>, WorldError> {
        self.create_many_with(count, B::component_infos())
    }

    /// Creates one entity from explicit descriptors, which may mix
    /// statically-typed and dynamically-named components.
    pub fn create_with(&mut self, infos: Vec<ComponentInfo>) -> Result<EntityId, WorldError> {
        if infos.is_empty() {
            return Err(WorldError::EmptyComponentSet);
        }
        let infos = canonical_infos(infos);
        self.register_dynamic(&infos)?;
        let archetype = self.get_or_create_archetype(infos);
        let entity = self.allocator.spawn(archetype)?;
        self.archetypes[archetype].allocate_for(entity);
        Ok(entity)
    }

    /// Creates `count` entities from explicit descriptors.
    ///
    /// The archetype is resolved once; each entity is spawned into it with
    /// default-constructed (or zero-filled, for dynamic) component values.
    pub fn create_many_with(
        &mut self,
        count: u32,
        infos: Vec<ComponentInfo>,
    ) -> Result<Vec<EntityId>, WorldError> {
        if infos.is_empty() {
            return Err(WorldError::EmptyComponentSet);
        }
        let infos = canonical_infos(infos);
        self.register_dynamic(&infos)?;
        let archetype = self.get_or_create_archetype(infos);

        let mut entities = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let entity = self.allocator.spawn(archetype)?;
            self.archetypes[archetype].allocate_for(entity);
            entities.push(entity);
        }
        Ok(entities)
    }

    /// Destroys `entity`, dropping its component values.
    ///
    /// Dead or stale handles are ignored; destroying an entity twice is safe
    /// and reports `false` the second time.
    pub fn destroy(&mut self, entity: EntityId) -> bool {
        let Some(archetype) = self.allocator.archetype_of(entity) else {
            return false;
        };
        self.archetypes[archetype].deallocate_for(entity);
        self.allocator.despawn(entity)
    }

    /// Returns `true` if `entity` is a live, current-generation handle.
    #[inline]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of live entities across all archetypes.
    pub fn num_entities(&self) -> usize {
        self.allocator.live_count()
    }

    /// The archetype `entity` currently resides in, if it is alive.
    pub fn archetype_of(&self, entity: EntityId) -> Option<&Archetype> {
        self.allocator
            .archetype_of(entity)
            .map(|index| &self.archetypes[index])
    }

    /// Shared access to `entity`'s component `T`.
    pub fn get<T: 'static>(&self, entity: EntityId) -> Option<&T> {
        self.archetype_of(entity)?.get(entity)
    }

    /// Exclusive access to `entity`'s component `T`.
    pub fn get_mut<T: 'static>(&mut self, entity: EntityId) -> Option<&mut T> {
        let index = self.allocator.archetype_of(entity)?;
        self.archetypes[index].get_mut(entity)
    }

    /// Byte view of `entity`'s dynamically-named component.
    pub fn get_named(&self, entity: EntityId, name: &str) -> Option<&[u8]> {
        self.archetype_of(entity)?
            .get_raw(ComponentId::named(name), entity)
    }

    /// Mutable byte view of `entity`'s dynamically-named component.
    pub fn get_named_mut(&mut self, entity: EntityId, name: &str) -> Option<&mut [u8]> {
        let index = self.allocator.archetype_of(entity)?;
        self.archetypes[index].get_raw_mut(ComponentId::named(name), entity)
    }

    /// Returns `true` if `entity` is alive and holds component `T`.
    pub fn has<T: 'static>(&self, entity: EntityId) -> bool {
        self.archetype_of(entity)
            .map(|archetype| archetype.has::<T>())
            .unwrap_or(false)
    }

    /// Returns `true` if `entity` is alive and holds the named component.
    pub fn has_named(&self, entity: EntityId, name: &str) -> bool {
        self.archetype_of(entity)
            .map(|archetype| archetype.has_id(ComponentId::named(name)))
            .unwrap_or(false)
    }

    /// Adds component `T` to `entity` with the given value.
    ///
    /// If the component is already present its value is overwritten in place.
    /// Otherwise the entity's row migrates to the archetype extended by `T`:
    /// shared component values move, `value` fills the new column. Returns
    /// `false` for dead or stale handles.
    pub fn emplace<T: Default + Send + Sync + 'static>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> bool {
        let Some(source) = self.allocator.archetype_of(entity) else {
            return false;
        };
        if let Some(slot) = self.archetypes[source].get_mut::<T>(entity) {
            *slot = value;
            return true;
        }

        let mut infos = self.archetypes[source].component_infos().to_vec();
        infos.push(ComponentInfo::of::<T>());
        let infos = canonical_infos(infos);
        let destination = self.get_or_create_archetype(infos);

        self.migrate(entity, source, destination);
        let written = self.archetypes[destination]
            .component_ptr(ComponentId::of::<T>(), entity)
            .map(|ptr| unsafe { std::ptr::write(ptr.cast::<T>(), value) })
            .is_some();
        debug_assert!(written);
        written
    }

    /// Removes component `T` from `entity`.
    ///
    /// Absent components and dead handles are no-ops reporting `false`.
    /// Removing the last component destroys the entity outright, since an
    /// empty component set is not a valid residence.
    pub fn remove<T: 'static>(&mut self, entity: EntityId) -> bool {
        self.remove_id(entity, ComponentId::of::<T>())
    }

    /// Adds the dynamically-named component `name` holding `bytes`.
    ///
    /// The component's size is `bytes.len()`; the first emplace of a name
    /// fixes its layout, and later emplaces with a different size are
    /// rejected. Present components are overwritten in place.
    pub fn emplace_named(
        &mut self,
        entity: EntityId,
        name: &str,
        bytes: &[u8],
    ) -> Result<bool, WorldError> {
        let Some(source) = self.allocator.archetype_of(entity) else {
            return Ok(false);
        };
        let info = ComponentInfo::named(name, bytes.len());
        self.register_dynamic(std::slice::from_ref(&info))?;

        let id = info.id();
        if let Some(slot) = self.archetypes[source].get_raw_mut(id, entity) {
            slot.copy_from_slice(bytes);
            return Ok(true);
        }

        let mut infos = self.archetypes[source].component_infos().to_vec();
        infos.push(info);
        let infos = canonical_infos(infos);
        let destination = self.get_or_create_archetype(infos);

        self.migrate(entity, source, destination);
        // The migrated row's new column is still uninitialised; fill it
        // through the raw pointer rather than a byte view.
        if let Some(ptr) = self.archetypes[destination].component_ptr(id, entity) {
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len()) };
        }
        Ok(true)
    }

    /// Removes the dynamically-named component `name` from `entity`.
    pub fn remove_named(&mut self, entity: EntityId, name: &str) -> bool {
        self.remove_id(entity, ComponentId::named(name))
    }

    fn remove_id(&mut self, entity: EntityId, id: ComponentId) -> bool {
        let Some(source) = self.allocator.archetype_of(entity) else {
            return false;
        };
        if !self.archetypes[source].has_id(id) {
            return false;
        }

        let infos: Vec<ComponentInfo> = self.archetypes[source]
            .component_infos()
            .iter()
            .filter(|info| info.id() != id)
            .cloned()
            .collect();
        if infos.is_empty() {
            return self.destroy(entity);
        }

        let destination = self.get_or_create_archetype(infos);
        self.migrate(entity, source, destination);
        true
    }

    /// Moves `entity`'s row from archetype `source` to `destination`,
    /// repointing the allocator entry.
    fn migrate(&mut self, entity: EntityId, source: usize, destination: usize) {
        debug_assert_ne!(source, destination);
        let (source_ref, destination_ref) = self.archetype_pair_mut(source, destination);
        let dest_slot = destination_ref.allocate_uninit(entity);
        source_ref.move_row_into(destination_ref, entity, dest_slot);
        self.allocator.set_archetype(entity, destination);
    }

    /// Splits the archetype list into exclusive references to two distinct
    /// entries.
    fn archetype_pair_mut(&mut self, a: usize, b: usize) -> (&mut Archetype, &mut Archetype) {
        debug_assert_ne!(a, b);
        if a < b {
            let (head, tail) = self.archetypes.split_at_mut(b);
            (&mut head[a], &mut tail[0])
        } else {
            let (head, tail) = self.archetypes.split_at_mut(a);
            (&mut tail[0], &mut head[b])
        }
    }

    /// All archetypes, in creation order.
    #[inline]
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    /// Archetypes whose component sets satisfy `filter`.
    pub fn archetypes_matching<'a>(
        &'a self,
        filter: &'a Filter,
    ) -> impl Iterator<Item = &'a Archetype> {
        self.archetypes
            .iter()
            .filter(move |archetype| filter.matches(&ComponentChecker::new(archetype)))
    }

    /// Archetypes matching `filter`, with exclusive access.
    pub fn archetypes_matching_mut<'a>(
        &'a mut self,
        filter: &'a Filter,
    ) -> impl Iterator<Item = &'a mut Archetype> {
        self.archetypes
            .iter_mut()
            .filter(move |archetype| filter.matches(&ComponentChecker::new(archetype)))
    }

    /// Visits every live entity holding component `T` immutably.
    pub fn for_each<T: 'static>(&self, mut f: impl FnMut(EntityId, &T)) {
        for archetype in &self.archetypes {
            archetype.for_each(&mut f);
        }
    }

    /// Visits every live entity holding component `T` mutably.
    pub fn for_each_mut<T: 'static>(&mut self, mut f: impl FnMut(EntityId, &mut T)) {
        for archetype in &mut self.archetypes {
            archetype.for_each_mut(&mut f);
        }
    }
}

impl std::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("entities", &self.num_entities())
            .field("archetypes", &self.archetypes.len())
            .finish()
    }
}
