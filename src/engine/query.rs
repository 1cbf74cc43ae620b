//! Archetype selection through presence-predicate combinators.
//!
//! A [`Filter`] is a small predicate tree over component presence, resolved
//! against archetypes through a [`ComponentChecker`] capability object. The
//! checker is the only surface a filter sees: it answers "does this archetype
//! contain component X" and nothing else, which keeps selection logic
//! decoupled from storage internals.
//!
//! ```ignore
//! let moving = Filter::all([Filter::has::<Position>(), Filter::has::<Velocity>()]);
//! for archetype in world.entities().archetypes_matching(&moving) { /* … */ }
//! ```

use crate::engine::archetype::Archetype;
use crate::engine::types::ComponentId;

/// Read-only capability exposing component presence for one archetype.
pub struct ComponentChecker<'a> {
    archetype: &'a Archetype,
}

impl<'a> ComponentChecker<'a> {
    pub(crate) fn new(archetype: &'a Archetype) -> Self {
        Self { archetype }
    }

    /// Returns `true` if the archetype stores component type `T`.
    #[inline]
    pub fn exists<T: 'static>(&self) -> bool {
        self.archetype.has::<T>()
    }

    /// Returns `true` if the archetype stores the dynamically-named
    /// component `name`.
    #[inline]
    pub fn exists_named(&self, name: &str) -> bool {
        self.archetype.has_id(ComponentId::named(name))
    }

    /// Returns `true` if the archetype stores the component with `id`.
    #[inline]
    pub fn exists_id(&self, id: ComponentId) -> bool {
        self.archetype.has_id(id)
    }
}

/// Predicate combinator selecting archetypes by component presence.
///
/// Leaves test a single component; `All` / `Any` / `None` compose
/// sub-filters. An empty `All` matches everything, an empty `Any` matches
/// nothing, an empty `None` matches everything.
#[derive(Clone, Debug)]
pub enum Filter {
    /// Matches archetypes containing the component with this id.
    Has(ComponentId),
    /// Matches when every sub-filter matches.
    All(Vec<Filter>),
    /// Matches when at least one sub-filter matches.
    Any(Vec<Filter>),
    /// Matches when no sub-filter matches.
    None(Vec<Filter>),
}

impl Filter {
    /// Leaf filter for a statically-typed component.
    pub fn has<T: 'static>() -> Self {
        Filter::Has(ComponentId::of::<T>())
    }

    /// Leaf filter for a dynamically-named component.
    pub fn named(name: &str) -> Self {
        Filter::Has(ComponentId::named(name))
    }

    /// Conjunction of sub-filters.
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::All(filters.into_iter().collect())
    }

    /// Disjunction of sub-filters.
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Any(filters.into_iter().collect())
    }

    /// Negated disjunction of sub-filters.
    pub fn none(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::None(filters.into_iter().collect())
    }

    /// Evaluates this filter against one archetype's checker.
    pub fn matches(&self, checker: &ComponentChecker<'_>) -> bool {
        match self {
            Filter::Has(id) => checker.exists_id(*id),
            Filter::All(filters) => filters.iter().all(|f| f.matches(checker)),
            Filter::Any(filters) => filters.iter().any(|f| f.matches(checker)),
            Filter::None(filters) => !filters.iter().any(|f| f.matches(checker)),
        }
    }
}
