//! Chunked columnar storage for one component-type set.
//!
//! An [`Archetype`] owns every entity sharing exactly one set of component
//! types. Storage is split into fixed-size **chunks**; inside a chunk each
//! component occupies one contiguous column, so iteration over a single
//! component is cache-friendly and branch-free.
//!
//! ## Layout
//!
//! At construction the archetype computes, once:
//!
//! - `rows_per_chunk` — the largest row count for which every aligned column
//!   region fits the [`CHUNK_SIZE`] budget,
//! - a per-component byte offset table.
//!
//! The address of component `c` for the row at `(chunk, row)` is then
//! `chunk.base + offset[c] + row * size[c]`.
//!
//! ## Row lifecycle
//!
//! - `allocate_for` appends to the last chunk (opening a new chunk when
//!   full) and default-constructs every column slot.
//! - `deallocate_for` swap-removes: when the victim is not the last living
//!   row, the last row's values are move-constructed into the freed slot and
//!   the relocated entity's index entry is updated **in the same operation**,
//!   so no entity index is ever stale. A chunk that empties is dropped.
//!
//! ## Invariants
//! - All chunks except the last are full; only the last is partially filled.
//! - `index` and the per-chunk entity arrays agree at every public-API
//!   boundary.
//! - Every live slot holds an initialised value (statically-typed components
//!   are default-constructed, dynamic ones zero-filled).

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;

use fxhash::FxHashMap;

use crate::engine::component::ComponentInfo;
use crate::engine::types::{ArchetypeId, ChunkIndex, ComponentId, EntityId, RowIndex, CHUNK_SIZE};

/// Storage coordinates of one entity row.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct Slot {
    /// Chunk the row lives in.
    pub chunk: ChunkIndex,
    /// Row within that chunk.
    pub row: RowIndex,
}

/// One fixed-size storage block: a raw aligned byte buffer holding every
/// column for `rows_per_chunk` rows, plus the resident entity ids.
struct Chunk {
    data: NonNull<u8>,
    layout: Layout,
    entities: Vec<EntityId>,
}

// Raw buffers hold component values whose types are constrained to
// `Send + Sync` at descriptor construction; dynamic components are plain
// bytes. The pointers never alias across chunks.
unsafe impl Send for Chunk {}
unsafe impl Sync for Chunk {}

impl Chunk {
    fn new(layout: Layout, rows: usize) -> Self {
        let data = unsafe { alloc(layout) };
        let Some(data) = NonNull::new(data) else {
            handle_alloc_error(layout);
        };
        Chunk {
            data,
            layout,
            entities: Vec::with_capacity(rows),
        }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        unsafe { dealloc(self.data.as_ptr(), self.layout) }
    }
}

/// Computed chunk geometry: row capacity, per-column offsets, buffer layout.
struct ChunkGeometry {
    rows_per_chunk: usize,
    offsets: Vec<usize>,
    layout: Layout,
}

const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Finds the largest `rows_per_chunk` whose aligned column regions fit
/// [`CHUNK_SIZE`], and the matching offset table. A single row wider than the
/// budget degrades to one-row chunks of the required size.
fn compute_geometry(infos: &[ComponentInfo]) -> ChunkGeometry {
    let row_bytes: usize = infos.iter().map(|info| info.size()).sum();
    let align = infos.iter().map(|info| info.align()).max().unwrap_or(1);

    let mut rows = if row_bytes == 0 {
        CHUNK_SIZE
    } else {
        (CHUNK_SIZE / row_bytes).max(1)
    };

    loop {
        let mut offsets = Vec::with_capacity(infos.len());
        let mut cursor = 0usize;
        for info in infos {
            cursor = align_up(cursor, info.align());
            offsets.push(cursor);
            cursor += rows * info.size();
        }

        if cursor <= CHUNK_SIZE || rows == 1 {
            let size = cursor.max(1);
            let layout = Layout::from_size_align(align_up(size, align), align)
                .expect("chunk layout must be constructible");
            return ChunkGeometry {
                rows_per_chunk: rows,
                offsets,
                layout,
            };
        }
        rows -= 1;
    }
}

/// Storage partition holding every entity that shares one component set.
pub struct Archetype {
    id: ArchetypeId,
    infos: Vec<ComponentInfo>,
    column_of: FxHashMap<ComponentId, usize>,
    offsets: Vec<usize>,
    rows_per_chunk: usize,
    chunk_layout: Layout,
    chunks: Vec<Chunk>,
    index: FxHashMap<EntityId, Slot>,
}

impl Archetype {
    /// Builds an archetype for a component-info set.
    ///
    /// `infos` must already be sorted by the descriptors' canonical order and
    /// free of duplicates; [`ArchetypeId`] derivation and the offset table
    /// both depend on that order.
    pub(crate) fn new(id: ArchetypeId, infos: Vec<ComponentInfo>) -> Self {
        debug_assert!(infos.windows(2).all(|pair| pair[0] < pair[1]));
        let geometry = compute_geometry(&infos);
        let column_of = infos
            .iter()
            .enumerate()
            .map(|(column, info)| (info.id(), column))
            .collect();
        Archetype {
            id,
            infos,
            column_of,
            offsets: geometry.offsets,
            rows_per_chunk: geometry.rows_per_chunk,
            chunk_layout: geometry.layout,
            chunks: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Canonical archetype id.
    #[inline]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Descriptors of the stored components, in canonical order.
    #[inline]
    pub fn component_infos(&self) -> &[ComponentInfo] {
        &self.infos
    }

    /// Returns `true` if this archetype stores the component with `id`.
    #[inline]
    pub fn has_id(&self, id: ComponentId) -> bool {
        self.column_of.contains_key(&id)
    }

    /// Returns `true` if this archetype stores component type `T`.
    #[inline]
    pub fn has<T: 'static>(&self) -> bool {
        self.has_id(ComponentId::of::<T>())
    }

    /// Number of entities currently resident.
    pub fn num_entities(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.entities.len()).sum()
    }

    /// Number of allocated chunks.
    #[inline]
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Maximum rows held by one chunk.
    #[inline]
    pub fn rows_per_chunk(&self) -> usize {
        self.rows_per_chunk
    }

    /// Returns `true` if `entity` resides in this archetype.
    #[inline]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.index.contains_key(&entity)
    }

    /// Entities resident in chunk `chunk`, in row order.
    pub fn chunk_entities(&self, chunk: ChunkIndex) -> &[EntityId] {
        self.chunks
            .get(chunk as usize)
            .map(|c| c.entities.as_slice())
            .unwrap_or(&[])
    }

    #[inline]
    fn column_base(&self, chunk: usize, column: usize) -> *mut u8 {
        unsafe { self.chunks[chunk].data.as_ptr().add(self.offsets[column]) }
    }

    #[inline]
    fn slot_ptr(&self, slot: Slot, column: usize) -> *mut u8 {
        unsafe {
            self.column_base(slot.chunk as usize, column)
                .add(slot.row as usize * self.infos[column].size())
        }
    }

    /// Appends a row for `entity`, default-constructing every column slot,
    /// and records the entity's storage coordinates.
    pub(crate) fn allocate_for(&mut self, entity: EntityId) -> Slot {
        let slot = self.allocate_raw(entity);
        for column in 0..self.infos.len() {
            unsafe { self.infos[column].construct(self.slot_ptr(slot, column)) };
        }
        slot
    }

    /// Appends a row for `entity` without constructing any column slot.
    ///
    /// The caller must initialise every column before the row is observed by
    /// any accessor or released. Used by archetype migration, which fills the
    /// slots by moving values out of the source archetype.
    pub(crate) fn allocate_uninit(&mut self, entity: EntityId) -> Slot {
        self.allocate_raw(entity)
    }

    fn allocate_raw(&mut self, entity: EntityId) -> Slot {
        debug_assert!(!self.index.contains_key(&entity));
        let needs_chunk = self
            .chunks
            .last()
            .map(|chunk| chunk.entities.len() == self.rows_per_chunk)
            .unwrap_or(true);
        if needs_chunk {
            self.chunks
                .push(Chunk::new(self.chunk_layout, self.rows_per_chunk));
        }
        let chunk = self.chunks.len() - 1;
        let row = self.chunks[chunk].entities.len();
        self.chunks[chunk].entities.push(entity);
        let slot = Slot {
            chunk: chunk as ChunkIndex,
            row: row as RowIndex,
        };
        self.index.insert(entity, slot);
        slot
    }

    /// Removes `entity`'s row, destructing its column values.
    ///
    /// If the row was not the archetype's last living row, the last row is
    /// relocated into the freed slot and the moved entity's index entry is
    /// updated atomically with respect to later reads. Returns the relocated
    /// entity, if any.
    pub(crate) fn deallocate_for(&mut self, entity: EntityId) -> Option<EntityId> {
        self.swap_release(entity, true)
    }

    /// Releases `entity`'s row after its values were moved out.
    ///
    /// Identical to [`deallocate_for`](Self::deallocate_for) except that no
    /// destructor runs on the freed slot: every column is already moved-from
    /// or dropped by the migration code.
    pub(crate) fn release_moved(&mut self, entity: EntityId) -> Option<EntityId> {
        self.swap_release(entity, false)
    }

    fn swap_release(&mut self, entity: EntityId, drop_row: bool) -> Option<EntityId> {
        let slot = self.index.remove(&entity)?;

        if drop_row {
            for column in 0..self.infos.len() {
                unsafe { self.infos[column].destroy(self.slot_ptr(slot, column)) };
            }
        }

        let last_chunk = self.chunks.len() - 1;
        let last_row = self.chunks[last_chunk].entities.len() - 1;
        let last = Slot {
            chunk: last_chunk as ChunkIndex,
            row: last_row as RowIndex,
        };

        let relocated = if slot != last {
            let moved = self.chunks[last_chunk].entities[last_row];
            for column in 0..self.infos.len() {
                let src = self.slot_ptr(last, column);
                let dst = self.slot_ptr(slot, column);
                unsafe { self.infos[column].relocate(src, dst) };
            }
            self.chunks[slot.chunk as usize].entities[slot.row as usize] = moved;
            // The moved entity resolves to the freed slot from here on.
            self.index.insert(moved, slot);
            Some(moved)
        } else {
            None
        };

        self.chunks[last_chunk].entities.pop();
        if self.chunks[last_chunk].entities.is_empty() {
            self.chunks.pop();
        }
        relocated
    }

    /// Moves `entity`'s row into `destination` at `dest_slot`.
    ///
    /// Components present in both archetypes are relocated; components the
    /// destination lacks are dropped in place. The source row is then
    /// released without running destructors. Returns the source entity
    /// relocated by the swap-release, if any.
    pub(crate) fn move_row_into(
        &mut self,
        destination: &mut Archetype,
        entity: EntityId,
        dest_slot: Slot,
    ) -> Option<EntityId> {
        let slot = *self.index.get(&entity)?;
        for column in 0..self.infos.len() {
            let info = &self.infos[column];
            let src = self.slot_ptr(slot, column);
            match destination.column_of.get(&info.id()) {
                Some(&dest_column) => {
                    let dst = destination.slot_ptr(dest_slot, dest_column);
                    unsafe { info.relocate(src, dst) };
                }
                None => unsafe { info.destroy(src) },
            }
        }
        self.release_moved(entity)
    }

    /// Raw pointer to `entity`'s value of component `component`.
    ///
    /// The formula is `chunk.base + offset[component] + row * size`.
    pub(crate) fn component_ptr(&self, component: ComponentId, entity: EntityId) -> Option<*mut u8> {
        let column = *self.column_of.get(&component)?;
        let slot = *self.index.get(&entity)?;
        Some(self.slot_ptr(slot, column))
    }

    /// Typed shared access to `entity`'s component `T`.
    ///
    /// Validates the stored descriptor's type identity before casting;
    /// returns `None` when the component is absent or not of type `T`.
    pub fn get<T: 'static>(&self, entity: EntityId) -> Option<&T> {
        let column = *self.column_of.get(&ComponentId::of::<T>())?;
        if !self.infos[column].matches_type::<T>() {
            return None;
        }
        let slot = *self.index.get(&entity)?;
        Some(unsafe { &*self.slot_ptr(slot, column).cast::<T>() })
    }

    /// Typed exclusive access to `entity`'s component `T`.
    pub fn get_mut<T: 'static>(&mut self, entity: EntityId) -> Option<&mut T> {
        let column = *self.column_of.get(&ComponentId::of::<T>())?;
        if !self.infos[column].matches_type::<T>() {
            return None;
        }
        let slot = *self.index.get(&entity)?;
        Some(unsafe { &mut *self.slot_ptr(slot, column).cast::<T>() })
    }

    /// Byte view of `entity`'s dynamically-named component.
    pub fn get_raw(&self, component: ComponentId, entity: EntityId) -> Option<&[u8]> {
        let column = *self.column_of.get(&component)?;
        let slot = *self.index.get(&entity)?;
        let size = self.infos[column].size();
        Some(unsafe { std::slice::from_raw_parts(self.slot_ptr(slot, column), size) })
    }

    /// Mutable byte view of `entity`'s dynamically-named component.
    pub fn get_raw_mut(&mut self, component: ComponentId, entity: EntityId) -> Option<&mut [u8]> {
        let column = *self.column_of.get(&component)?;
        let slot = *self.index.get(&entity)?;
        let size = self.infos[column].size();
        Some(unsafe { std::slice::from_raw_parts_mut(self.slot_ptr(slot, column), size) })
    }

    /// Shared typed view of one chunk's column for component `T`.
    pub fn column<T: 'static>(&self, chunk: ChunkIndex) -> Option<&[T]> {
        let column = *self.column_of.get(&ComponentId::of::<T>())?;
        if !self.infos[column].matches_type::<T>() {
            return None;
        }
        let rows = self.chunks.get(chunk as usize)?.entities.len();
        let base = self.column_base(chunk as usize, column).cast::<T>();
        Some(unsafe { std::slice::from_raw_parts(base, rows) })
    }

    /// Visits every resident entity's component `T` immutably.
    pub fn for_each<T: 'static>(&self, mut f: impl FnMut(EntityId, &T)) {
        let Some(&column) = self.column_of.get(&ComponentId::of::<T>()) else {
            return;
        };
        if !self.infos[column].matches_type::<T>() {
            return;
        }
        for chunk in 0..self.chunks.len() {
            let base = self.column_base(chunk, column).cast::<T>();
            for row in 0..self.chunks[chunk].entities.len() {
                let entity = self.chunks[chunk].entities[row];
                f(entity, unsafe { &*base.add(row) });
            }
        }
    }

    /// Visits every resident entity's component `T` mutably.
    pub fn for_each_mut<T: 'static>(&mut self, mut f: impl FnMut(EntityId, &mut T)) {
        let Some(&column) = self.column_of.get(&ComponentId::of::<T>()) else {
            return;
        };
        if !self.infos[column].matches_type::<T>() {
            return;
        }
        for chunk in 0..self.chunks.len() {
            let base = self.column_base(chunk, column).cast::<T>();
            for row in 0..self.chunks[chunk].entities.len() {
                let entity = self.chunks[chunk].entities[row];
                f(entity, unsafe { &mut *base.add(row) });
            }
        }
    }

    /// Exclusive typed view of one chunk's column for component `T`.
    pub fn column_mut<T: 'static>(&mut self, chunk: ChunkIndex) -> Option<&mut [T]> {
        let column = *self.column_of.get(&ComponentId::of::<T>())?;
        if !self.infos[column].matches_type::<T>() {
            return None;
        }
        let rows = self.chunks.get(chunk as usize)?.entities.len();
        let base = self.column_base(chunk as usize, column).cast::<T>();
        Some(unsafe { std::slice::from_raw_parts_mut(base, rows) })
    }
}

impl Drop for Archetype {
    fn drop(&mut self) {
        let needs_drop = self.infos.iter().any(|info| info.rust_type().is_some());
        if !needs_drop {
            return;
        }
        for chunk in 0..self.chunks.len() {
            for row in 0..self.chunks[chunk].entities.len() {
                let slot = Slot {
                    chunk: chunk as ChunkIndex,
                    row: row as RowIndex,
                };
                for column in 0..self.infos.len() {
                    unsafe { self.infos[column].destroy(self.slot_ptr(slot, column)) };
                }
            }
        }
    }
}

impl std::fmt::Debug for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("components", &self.infos.len())
            .field("entities", &self.num_entities())
            .finish()
    }
}
