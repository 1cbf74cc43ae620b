use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use weft::engine::schedule::{Access, Schedule};
use weft::{EntityId, ScheduleError, System, World, WorldRef};

#[derive(Clone, Copy, Debug, PartialEq, Default)]
struct Position(f32);

#[derive(Clone, Copy, Debug, PartialEq, Default)]
struct Velocity(f32);

#[derive(Clone, Copy, Debug, PartialEq, Default)]
struct Counter(u64);

#[test]
fn writers_run_before_read_after_readers() {
    let mut world = World::new();
    world.create_many::<(Position, Velocity)>(16).unwrap();
    world
        .entities_mut()
        .for_each_mut::<Velocity>(|_, velocity| velocity.0 = 2.0);

    let saw_written_values = Arc::new(AtomicBool::new(true));
    let saw = saw_written_values.clone();

    let mut schedule = Schedule::new();
    // The observer is registered first; the read-after edge must still place
    // it behind the writer.
    schedule
        .request("observe", Access::new().read_after::<Position>(), move |world| {
            world.data().for_each::<Position>(|_, position| {
                if position.0 != 2.0 {
                    saw.store(false, Ordering::SeqCst);
                }
            });
        })
        .request(
            "integrate",
            Access::new().read::<Velocity>().write::<Position>(),
            |world| {
                let entities = world.data_mut();
                entities.for_each_mut::<Position>(|entity, position| {
                    if let Some(velocity) = world.data().get::<Velocity>(entity) {
                        position.0 += velocity.0;
                    }
                });
            },
        );

    schedule.run(world.cell()).unwrap();
    assert!(saw_written_values.load(Ordering::SeqCst));
}

#[test]
fn writers_of_one_component_run_in_registration_order() {
    let world = World::new();
    let trace: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let mut schedule = Schedule::new();
    for name in ["first", "second", "third"] {
        let trace = trace.clone();
        schedule.request(name, Access::new().write::<Counter>(), move |_| {
            trace.lock().unwrap().push(name);
        });
    }

    schedule.run(world.cell()).unwrap();
    assert_eq!(*trace.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn explicit_order_constrains_unrelated_tasks() {
    let world = World::new();
    let trace: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let mut schedule = Schedule::new();
    for name in ["late", "early"] {
        let trace = trace.clone();
        schedule.request(name, Access::new(), move |_| {
            trace.lock().unwrap().push(name);
        });
    }
    schedule.set_order("early", "late");

    schedule.run(world.cell()).unwrap();
    assert_eq!(*trace.lock().unwrap(), vec!["early", "late"]);
}

#[test]
fn unknown_order_reference_leaves_the_schedule_runnable() {
    let world = World::new();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();

    let mut schedule = Schedule::new();
    schedule
        .request("real", Access::new(), move |_| {
            flag.store(true, Ordering::SeqCst);
        })
        .set_order("real", "phantom");

    schedule.run(world.cell()).unwrap();
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn duplicate_task_names_keep_the_first_body() {
    let world = World::new();
    let executed = Arc::new(Mutex::new(Vec::new()));

    let mut schedule = Schedule::new();
    let first = executed.clone();
    let second = executed.clone();
    schedule
        .request("tick", Access::new(), move |_| first.lock().unwrap().push("first"))
        .request("tick", Access::new(), move |_| second.lock().unwrap().push("second"));

    assert_eq!(schedule.len(), 1);
    schedule.run(world.cell()).unwrap();
    assert_eq!(*executed.lock().unwrap(), vec!["first"]);
}

#[test]
fn an_access_cycle_skips_the_whole_tick() {
    let world = World::new();
    let bodies_run = Arc::new(AtomicUsize::new(0));

    let mut schedule = Schedule::new();
    // Mutually dependent: each task reads what the other writes, so rule 1
    // produces an edge in both directions.
    let accesses = [
        ("advance", Access::new().write::<Position>().read::<Velocity>()),
        ("steer", Access::new().write::<Velocity>().read::<Position>()),
        ("aside", Access::new().write::<Counter>()),
    ];
    for (name, access) in accesses {
        let counter = bodies_run.clone();
        schedule.request(name, access, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    let error = schedule.run(world.cell()).unwrap_err();
    assert_eq!(error, ScheduleError::CycleDetected { unsorted: 2, total: 3 });
    assert_eq!(bodies_run.load(Ordering::SeqCst), 0, "no body may run on a cycle");
}

/// Advances every `Counter` by one each tick.
#[derive(Default)]
struct CountingSystem;

impl System for CountingSystem {
    fn on_update(&mut self, schedule: &mut Schedule) {
        schedule.request("count", Access::new().write::<Counter>(), |world| {
            world
                .data_mut()
                .for_each_mut::<Counter>(|_, counter| counter.0 += 1);
        });
    }
}

#[test]
fn world_update_drives_registered_systems() {
    let mut world = World::new();
    let handles = world.create_many::<(Counter,)>(8).unwrap();
    world.register_system::<CountingSystem>();

    world.update().unwrap();
    world.update().unwrap();

    for entity in handles {
        assert_eq!(world.get::<Counter>(entity), Some(&Counter(2)));
    }
}

#[test]
fn disabled_systems_contribute_nothing() {
    let mut world = World::new();
    let entity = world.create::<(Counter,)>().unwrap();
    world.register_system::<CountingSystem>();

    world.update().unwrap();
    world.disable_system::<CountingSystem>();
    world.update().unwrap();
    assert_eq!(world.get::<Counter>(entity), Some(&Counter(1)));

    world.enable_system::<CountingSystem>();
    world.update().unwrap();
    assert_eq!(world.get::<Counter>(entity), Some(&Counter(2)));
}

static CREATES: AtomicUsize = AtomicUsize::new(0);
static ENABLES: AtomicUsize = AtomicUsize::new(0);
static DISABLES: AtomicUsize = AtomicUsize::new(0);
static DESTROYS: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
struct LifecycleSystem;

impl System for LifecycleSystem {
    fn on_create(&mut self, _world: WorldRef<'_>) {
        CREATES.fetch_add(1, Ordering::SeqCst);
    }
    fn on_enable(&mut self, _world: WorldRef<'_>) {
        ENABLES.fetch_add(1, Ordering::SeqCst);
    }
    fn on_disable(&mut self, _world: WorldRef<'_>) {
        DISABLES.fetch_add(1, Ordering::SeqCst);
    }
    fn on_destroy(&mut self, _world: WorldRef<'_>) {
        DESTROYS.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn lifecycle_hooks_fire_once_per_transition() {
    let mut world = World::new();

    world.register_system::<LifecycleSystem>();
    world.register_system::<LifecycleSystem>();
    assert_eq!(CREATES.load(Ordering::SeqCst), 1);
    assert_eq!(ENABLES.load(Ordering::SeqCst), 1);
    assert!(world.system_enabled::<LifecycleSystem>());

    world.enable_system::<LifecycleSystem>();
    assert_eq!(ENABLES.load(Ordering::SeqCst), 1);

    world.disable_system::<LifecycleSystem>();
    world.disable_system::<LifecycleSystem>();
    assert_eq!(DISABLES.load(Ordering::SeqCst), 1);
    assert!(!world.system_enabled::<LifecycleSystem>());

    world.unregister_system::<LifecycleSystem>();
    assert_eq!(DISABLES.load(Ordering::SeqCst), 1, "already disabled");
    assert_eq!(DESTROYS.load(Ordering::SeqCst), 1);
    assert!(!world.system_enabled::<LifecycleSystem>());
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
struct Local(f32);

#[derive(Clone, Copy, Debug, PartialEq, Default)]
struct Global(f32);

#[derive(Clone, Copy, Debug, PartialEq, Default)]
struct ChildGlobal(f32);

/// Relationship component: the raw parent handle, never a storage pointer.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
struct Parent(Option<EntityId>);

#[test]
fn hierarchy_propagates_through_entity_handles() {
    let mut world = World::new();

    let root = world.create::<(Local, Global)>().unwrap();
    world.get_mut::<Local>(root).unwrap().0 = 10.0;

    let children = world.create_many::<(Local, Parent, ChildGlobal)>(4).unwrap();
    for (offset, &child) in children.iter().enumerate() {
        world.get_mut::<Local>(child).unwrap().0 = offset as f32;
        world.get_mut::<Parent>(child).unwrap().0 = Some(root);
    }

    let mut schedule = Schedule::new();
    // Children are requested first; the read-after edge on Global orders them
    // behind the root pass anyway.
    schedule
        .request(
            "propagate_children",
            Access::new()
                .read::<Local>()
                .read_after::<Global>()
                .write::<ChildGlobal>(),
            |world| {
                let entities = world.data_mut();
                entities.for_each_mut::<ChildGlobal>(|entity, child_global| {
                    let data = world.data();
                    let parent = data
                        .get::<Parent>(entity)
                        .and_then(|parent| parent.0)
                        .and_then(|parent| data.get::<Global>(parent));
                    if let (Some(parent), Some(local)) = (parent, data.get::<Local>(entity)) {
                        child_global.0 = parent.0 + local.0;
                    }
                });
            },
        )
        .request(
            "propagate_roots",
            Access::new().read::<Local>().write::<Global>(),
            |world| {
                let entities = world.data_mut();
                entities.for_each_mut::<Global>(|entity, global| {
                    if let Some(local) = world.data().get::<Local>(entity) {
                        global.0 = local.0;
                    }
                });
            },
        );

    schedule.run(world.cell()).unwrap();

    for (offset, &child) in children.iter().enumerate() {
        assert_eq!(
            world.get::<ChildGlobal>(child),
            Some(&ChildGlobal(10.0 + offset as f32))
        );
    }
}
