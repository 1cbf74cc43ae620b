//! Core identifiers and bit-level layouts.
//!
//! This module defines the **fundamental identifier types and constants**
//! shared across all ECS subsystems: entity handles, canonical component and
//! archetype ids, and the chunk geometry used by columnar storage.
//!
//! ## Entity Representation
//!
//! Entities are encoded as a packed 64-bit integer:
//!
//! ```text
//! | generation | index |
//! ```
//!
//! - **Index** identifies the slot within the entity allocator.
//! - **Generation** is bumped every time a slot is retired, so a handle held
//!   across a destroy resolves to nothing instead of to the slot's next
//!   occupant.
//!
//! Bit widths are compile-time constants validated by static assertions.
//!
//! ## Canonical ids
//!
//! [`ComponentId`] and [`ArchetypeId`] are deterministic 64-bit hashes, stable
//! within one process run. Component ids cover both statically-typed
//! components (hashed from type identity) and dynamically-named ones (hashed
//! from the name bytes), so the two kinds mix freely inside one archetype.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use fxhash::FxHasher64;

/// Bit-width type used for compile-time layout calculations.
pub type Bits = u8;

/// Raw packed entity representation.
pub type EntityBits = u64;
/// Index within the entity allocator.
pub type IndexId = u32;
/// Generation counter used to detect stale entities.
pub type Generation = u32;

/// Total number of bits in a packed entity.
pub const ENTITY_BITS: Bits = 64;
/// Number of bits reserved for the generation counter.
pub const GENERATION_BITS: Bits = 32;
/// Number of bits reserved for the allocator index.
pub const INDEX_BITS: Bits = ENTITY_BITS - GENERATION_BITS;

const _: [(); 1] = [(); (INDEX_BITS > 0) as usize];
const _: [(); 1] = [(); (GENERATION_BITS > 0) as usize];
const _: [(); 1] = [(); (INDEX_BITS as u32 + GENERATION_BITS as u32 == 64) as usize];

const fn mask(bits: Bits) -> EntityBits {
    if bits == 0 {
        0
    } else {
        ((1 as EntityBits) << bits) - 1
    }
}

/// Mask selecting the index portion of a packed entity.
pub const INDEX_MASK: EntityBits = mask(INDEX_BITS);
/// Maximum number of entity slots addressable by the allocator.
pub const INDEX_CAP: IndexId = INDEX_MASK as IndexId;

/// Opaque handle identifying one logical row across some archetype's storage.
///
/// Handles are plain 64-bit values: cheap to copy, hash and store inside
/// components. Relationship components hold the raw id, never a pointer into
/// storage, because storage addresses change on swap-remove compaction.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) EntityBits);

#[inline]
pub(crate) const fn make_entity(index: IndexId, generation: Generation) -> EntityId {
    EntityId(((generation as EntityBits) << INDEX_BITS) | (index as EntityBits & INDEX_MASK))
}

impl EntityId {
    /// Returns the allocator index portion of this handle.
    #[inline]
    pub fn index(self) -> IndexId {
        (self.0 & INDEX_MASK) as IndexId
    }

    /// Returns the generation portion of this handle.
    #[inline]
    pub fn generation(self) -> Generation {
        (self.0 >> INDEX_BITS) as Generation
    }

    /// Returns the raw packed representation.
    #[inline]
    pub fn bits(self) -> EntityBits {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

/// Canonical identifier for a component type.
///
/// Usable for both statically-typed and dynamically-named components; the id
/// is a deterministic hash, stable within one process run (cross-process
/// stability is not guaranteed and not required).
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Canonical id for a statically-known component type.
    pub fn of<T: 'static>() -> Self {
        let mut hasher = FxHasher64::default();
        TypeId::of::<T>().hash(&mut hasher);
        ComponentId(hasher.finish())
    }

    /// Canonical id for a dynamically-named component.
    pub fn named(name: &str) -> Self {
        let mut hasher = FxHasher64::default();
        hasher.write(name.as_bytes());
        ComponentId(hasher.finish())
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({:#018x})", self.0)
    }
}

/// Canonical identifier for an archetype.
///
/// Derived by hashing the archetype's component ids in sorted order, so the
/// id is invariant under any permutation of the declared component set.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ArchetypeId(u64);

impl ArchetypeId {
    /// Hashes an iterator of **sorted** component ids into an archetype id.
    ///
    /// Callers sort first; hashing is order-sensitive, so the sort is the
    /// single place where canonicalisation happens.
    pub fn new<'a>(sorted: impl Iterator<Item = &'a ComponentId>) -> Self {
        let mut hasher = FxHasher64::default();
        for id in sorted {
            id.hash(&mut hasher);
        }
        ArchetypeId(hasher.finish())
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchetypeId({:#018x})", self.0)
    }
}

/// Chunk index within an archetype.
pub type ChunkIndex = u32;
/// Row index within a chunk.
pub type RowIndex = u32;

/// Target payload size of one storage chunk, in bytes.
///
/// Every archetype packs as many entity rows as fit this budget; a single row
/// wider than the budget degrades to one-row chunks of the required size.
pub const CHUNK_SIZE: usize = 2 * 1024;
