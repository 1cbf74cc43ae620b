//! Type-erased component descriptors.
//!
//! A [`ComponentInfo`] captures everything archetype storage needs to manage
//! a component column without compile-time knowledge of the element type:
//! size, alignment, and function pointers for default construction,
//! destruction and relocation. Descriptors exist for two kinds of component:
//!
//! - **Statically-typed** components, described by [`ComponentInfo::of`].
//!   Construction writes `T::default()`, destruction runs `T`'s drop glue
//!   (omitted when `T` has none), relocation is a typed move.
//! - **Dynamically-named** components, described by [`ComponentInfo::named`]:
//!   opaque byte blobs identified by a string-hashed id, zero-initialised on
//!   allocation, with no drop glue.
//!
//! ## Invariants
//! - Descriptors compare equal and order by `(size, id)` so component sets
//!   sort canonically for archetype-id derivation.
//! - `rust_type` is `Some` exactly for statically-typed components; typed
//!   accessors validate it before casting raw storage.
//! - The function pointers are only ever invoked on slots of exactly
//!   `size` bytes aligned to `align`.

use std::any::{type_name, TypeId};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::mem::{align_of, needs_drop, size_of};
use std::ptr;

use crate::engine::types::ComponentId;

/// Default-constructs a value in place. `size` is the slot width in bytes;
/// typed constructors ignore it.
pub type DefaultFn = unsafe fn(dst: *mut u8, size: usize);

/// Drops a value in place.
pub type DropFn = unsafe fn(slot: *mut u8);

/// Relocates a value from `src` to `dst`. The source slot is afterwards
/// treated as moved-from: it must not be dropped again.
pub type MoveFn = unsafe fn(src: *mut u8, dst: *mut u8, size: usize);

unsafe fn default_value<T: Default>(dst: *mut u8, _size: usize) {
    unsafe { ptr::write(dst.cast::<T>(), T::default()) }
}

unsafe fn default_zeroed(dst: *mut u8, size: usize) {
    unsafe { ptr::write_bytes(dst, 0, size) }
}

unsafe fn drop_value<T>(slot: *mut u8) {
    unsafe { ptr::drop_in_place(slot.cast::<T>()) }
}

unsafe fn move_value<T>(src: *mut u8, dst: *mut u8, _size: usize) {
    unsafe { ptr::write(dst.cast::<T>(), ptr::read(src.cast::<T>())) }
}

unsafe fn move_bytes(src: *mut u8, dst: *mut u8, size: usize) {
    unsafe { ptr::copy_nonoverlapping(src, dst, size) }
}

/// Type-erased descriptor for one component type.
///
/// Carries the canonical id, the human-readable name, the storage layout and
/// the constructor/destructor table used by [`Archetype`] columns.
///
/// [`Archetype`]: crate::engine::archetype::Archetype
#[derive(Clone)]
pub struct ComponentInfo {
    id: ComponentId,
    name: Cow<'static, str>,
    rust_type: Option<TypeId>,
    size: usize,
    align: usize,
    default_fn: DefaultFn,
    drop_fn: Option<DropFn>,
    move_fn: MoveFn,
}

impl ComponentInfo {
    /// Describes a statically-known component type.
    ///
    /// `T: Default` guarantees every allocated slot starts initialised, so
    /// storage never exposes uninitialised memory through a typed accessor.
    pub fn of<T: Default + Send + Sync + 'static>() -> Self {
        Self {
            id: ComponentId::of::<T>(),
            name: Cow::Borrowed(type_name::<T>()),
            rust_type: Some(TypeId::of::<T>()),
            size: size_of::<T>(),
            align: align_of::<T>(),
            default_fn: default_value::<T>,
            drop_fn: if needs_drop::<T>() {
                Some(drop_value::<T>)
            } else {
                None
            },
            move_fn: move_value::<T>,
        }
    }

    /// Describes a dynamically-named component of `size` opaque bytes.
    ///
    /// Dynamic components are zero-initialised on allocation and carry no
    /// drop glue; they are addressed through the byte-view accessors.
    pub fn named(name: impl Into<String>, size: usize) -> Self {
        let name = name.into();
        Self {
            id: ComponentId::named(&name),
            name: Cow::Owned(name),
            rust_type: None,
            size,
            align: 1,
            default_fn: default_zeroed,
            drop_fn: None,
            move_fn: move_bytes,
        }
    }

    /// Canonical component id.
    #[inline]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Human-readable component name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `TypeId` of the element type, if statically known.
    #[inline]
    pub fn rust_type(&self) -> Option<TypeId> {
        self.rust_type
    }

    /// Element size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Element alignment in bytes.
    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    /// Returns `true` if this descriptor refers to the Rust type `T`.
    #[inline]
    pub fn matches_type<T: 'static>(&self) -> bool {
        self.rust_type == Some(TypeId::of::<T>())
    }

    /// Default-constructs one element at `slot`.
    ///
    /// ## Safety
    /// `slot` must point to `size()` writable bytes aligned to `align()`,
    /// holding no live value.
    #[inline]
    pub(crate) unsafe fn construct(&self, slot: *mut u8) {
        unsafe { (self.default_fn)(slot, self.size) }
    }

    /// Drops the element at `slot` if the type has drop glue.
    ///
    /// ## Safety
    /// `slot` must hold a live, initialised element of this component type.
    #[inline]
    pub(crate) unsafe fn destroy(&self, slot: *mut u8) {
        if let Some(drop_fn) = self.drop_fn {
            unsafe { drop_fn(slot) }
        }
    }

    /// Relocates the element at `src` into `dst`; `src` becomes moved-from.
    ///
    /// ## Safety
    /// `src` must hold a live element, `dst` must be a free slot of this
    /// component type, and the two must not overlap.
    #[inline]
    pub(crate) unsafe fn relocate(&self, src: *mut u8, dst: *mut u8) {
        unsafe { (self.move_fn)(src, dst, self.size) }
    }
}

impl PartialEq for ComponentInfo {
    fn eq(&self, other: &Self) -> bool {
        (self.size, self.id) == (other.size, other.id)
    }
}

impl Eq for ComponentInfo {}

impl PartialOrd for ComponentInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.size, self.id).cmp(&(other.size, other.id))
    }
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish()
    }
}

impl fmt::Display for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ComponentInfo {{ id: {}, name: {}, size: {}, align: {} }}",
            self.id, self.name, self.size, self.align
        )
    }
}

/// A statically-known set of component types, spelled as a tuple.
///
/// Used by the `create`/`create_many` family to declare an entity's
/// component set at the call site: `world.create::<(Position, Velocity)>()`.
/// Declaration order is irrelevant — descriptors are canonicalised before
/// the archetype id is derived.
pub trait ComponentSet {
    /// Descriptors for every component in the set, in declaration order.
    fn component_infos() -> Vec<ComponentInfo>;
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Default + Send + Sync + 'static),+> ComponentSet for ($($name,)+) {
            fn component_infos() -> Vec<ComponentInfo> {
                vec![$(ComponentInfo::of::<$name>()),+]
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);
