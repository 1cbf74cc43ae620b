use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use weft::{ComponentInfo, Filter, World, WorldError};

#[derive(Clone, Copy, Debug, PartialEq, Default)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
struct Health(u32);

/// Counts drops through a shared counter, so storage teardown paths can be
/// observed from outside.
#[derive(Default)]
struct DropProbe {
    hits: Option<Arc<AtomicUsize>>,
}

impl Drop for DropProbe {
    fn drop(&mut self) {
        if let Some(hits) = &self.hits {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn created_components_start_at_default() {
    let mut world = World::new();
    let entity = world.create::<(Position, Velocity)>().unwrap();

    assert_eq!(world.get::<Position>(entity), Some(&Position::default()));
    assert_eq!(world.get::<Velocity>(entity), Some(&Velocity::default()));
    assert!(world.get::<Health>(entity).is_none());
}

#[test]
fn empty_component_set_is_rejected() {
    let mut world = World::new();
    assert_eq!(
        world.create_with(Vec::new()),
        Err(WorldError::EmptyComponentSet)
    );
}

#[test]
fn destroy_is_a_silent_no_op_on_dead_handles() {
    let mut world = World::new();
    let entity = world.create::<(Position,)>().unwrap();

    assert!(world.destroy(entity));
    assert!(!world.destroy(entity));
    assert!(!world.is_alive(entity));
    assert!(world.get::<Position>(entity).is_none());
    assert_eq!(world.num_entities(), 0);
}

#[test]
fn stale_handles_do_not_resolve_to_slot_reuse() {
    let mut world = World::new();
    let first = world.create::<(Health,)>().unwrap();
    world.get_mut::<Health>(first).unwrap().0 = 7;
    world.destroy(first);

    // The freed slot is reissued with a bumped generation.
    let second = world.create::<(Health,)>().unwrap();
    world.get_mut::<Health>(second).unwrap().0 = 99;

    assert!(!world.is_alive(first));
    assert!(world.get::<Health>(first).is_none());
    assert_eq!(world.get::<Health>(second), Some(&Health(99)));
}

#[test]
fn swap_remove_keeps_survivors_addressable() {
    let mut world = World::new();
    let handles = world.create_many::<(Health,)>(3).unwrap();
    for (value, &entity) in handles.iter().enumerate() {
        world.get_mut::<Health>(entity).unwrap().0 = value as u32;
    }

    // Removing the first row relocates the last row into its slot.
    world.destroy(handles[0]);

    assert_eq!(world.get::<Health>(handles[1]), Some(&Health(1)));
    assert_eq!(world.get::<Health>(handles[2]), Some(&Health(2)));
    assert_eq!(world.num_entities(), 2);
}

#[test]
fn emplace_migrates_and_preserves_values() {
    let mut world = World::new();
    let entity = world.create::<(Position,)>().unwrap();
    world.get_mut::<Position>(entity).unwrap().x = 4.5;

    assert!(world.emplace(entity, Velocity { dx: 1.0, dy: 2.0 }));

    let view = world.entity(entity);
    assert!(view.has::<Position>());
    assert!(view.has::<Velocity>());
    assert_eq!(world.get::<Position>(entity).unwrap().x, 4.5);
    assert_eq!(world.get::<Velocity>(entity), Some(&Velocity { dx: 1.0, dy: 2.0 }));
    assert_eq!(world.entities().archetypes().len(), 2);
}

#[test]
fn emplace_on_present_component_overwrites_in_place() {
    let mut world = World::new();
    let entity = world.create::<(Health,)>().unwrap();

    assert!(world.emplace(entity, Health(10)));
    assert!(world.emplace(entity, Health(20)));

    assert_eq!(world.get::<Health>(entity), Some(&Health(20)));
    assert_eq!(world.entities().archetypes().len(), 1);
}

#[test]
fn remove_returns_to_the_original_archetype() {
    let mut world = World::new();
    let plain = world.create::<(Position,)>().unwrap();
    let moving = world.create::<(Position, Velocity)>().unwrap();
    world.get_mut::<Position>(moving).unwrap().y = -3.0;

    assert!(world.remove::<Velocity>(moving));
    assert!(!world.remove::<Velocity>(moving));

    assert_eq!(world.get::<Position>(moving).unwrap().y, -3.0);
    // Both entities now share the Position-only archetype.
    let archetypes = world.entities().archetypes();
    assert_eq!(archetypes.len(), 2);
    let holder = world.entities().archetype_of(plain).unwrap();
    assert!(holder.contains(moving));
}

#[test]
fn removing_the_last_component_destroys_the_entity() {
    let mut world = World::new();
    let entity = world.create::<(Health,)>().unwrap();

    assert!(world.remove::<Health>(entity));
    assert!(!world.is_alive(entity));
    assert_eq!(world.num_entities(), 0);
}

#[test]
fn emplace_and_remove_ignore_dead_handles() {
    let mut world = World::new();
    let entity = world.create::<(Position,)>().unwrap();
    world.destroy(entity);

    assert!(!world.emplace(entity, Velocity::default()));
    assert!(!world.remove::<Position>(entity));
}

#[test]
fn dynamic_components_round_trip_bytes() {
    let mut world = World::new();
    let entity = world
        .create_with(vec![
            ComponentInfo::of::<Position>(),
            ComponentInfo::named("hitpoints", 4),
        ])
        .unwrap();

    // Dynamic slots start zero-filled.
    assert_eq!(world.get_named(entity, "hitpoints"), Some(&[0u8; 4][..]));

    world
        .get_named_mut(entity, "hitpoints")
        .unwrap()
        .copy_from_slice(&42u32.to_le_bytes());
    assert_eq!(
        world.get_named(entity, "hitpoints"),
        Some(&42u32.to_le_bytes()[..])
    );

    assert!(world.entity(entity).has_named("hitpoints"));
    assert!(world.remove_named(entity, "hitpoints"));
    assert!(world.get_named(entity, "hitpoints").is_none());
}

#[test]
fn dynamic_redeclaration_with_another_size_is_rejected() {
    let mut world = World::new();
    let entity = world.create::<(Position,)>().unwrap();
    world.emplace_named(entity, "flags", &[1u8, 2, 3, 4]).unwrap();

    let error = world.emplace_named(entity, "flags", &[0u8; 8]).unwrap_err();
    assert_eq!(
        error,
        WorldError::DynamicRedeclared {
            name: "flags".to_owned(),
            size: 8,
            previous: 4,
        }
    );
}

#[test]
fn filters_select_archetypes_by_presence() {
    let mut world = World::new();
    world.create::<(Position,)>().unwrap();
    world.create::<(Position, Velocity)>().unwrap();
    world.create::<(Health,)>().unwrap();

    let entities = world.entities();
    let moving = Filter::all([Filter::has::<Position>(), Filter::has::<Velocity>()]);
    assert_eq!(entities.archetypes_matching(&moving).count(), 1);

    let any_body = Filter::any([Filter::has::<Position>(), Filter::has::<Health>()]);
    assert_eq!(entities.archetypes_matching(&any_body).count(), 3);

    let still = Filter::all([
        Filter::has::<Position>(),
        Filter::none([Filter::has::<Velocity>()]),
    ]);
    assert_eq!(entities.archetypes_matching(&still).count(), 1);
}

#[test]
fn destroy_runs_component_drop_glue_exactly_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut world = World::new();

    let tracked = world.create::<(DropProbe,)>().unwrap();
    let survivor = world.create::<(DropProbe,)>().unwrap();
    world.get_mut::<DropProbe>(tracked).unwrap().hits = Some(hits.clone());

    // Swap-remove relocates the survivor; relocation must not drop it.
    world.destroy(tracked);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(world.is_alive(survivor));

    world.get_mut::<DropProbe>(survivor).unwrap().hits = Some(hits.clone());
    drop(world);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn migration_does_not_double_drop() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut world = World::new();

    let entity = world.create::<(DropProbe,)>().unwrap();
    world.get_mut::<DropProbe>(entity).unwrap().hits = Some(hits.clone());

    // Moving the row between archetypes relocates the probe without dropping.
    world.emplace(entity, Health(1));
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    world.remove::<Health>(entity);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    world.destroy(entity);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
