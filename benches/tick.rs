use criterion::*;
use std::hint::black_box;

use weft::engine::schedule::{Access, Schedule};
use weft::World;

const AGENTS_SMALL: u32 = 10_000;
const AGENTS_MED: u32 = 100_000;

#[derive(Clone, Copy, Default)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Default)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Default)]
struct Wealth {
    value: f32,
}

fn make_world(agents: u32) -> World {
    let mut world = World::new();
    world
        .create_many::<(Position, Velocity, Wealth)>(agents)
        .unwrap();
    world.entities_mut().for_each_mut::<Velocity>(|_, velocity| {
        velocity.dx = 1.0;
        velocity.dy = -1.0;
    });
    world.entities_mut().for_each_mut::<Wealth>(|_, wealth| {
        wealth.value = 100.0;
    });
    world
}

fn make_schedule() -> Schedule {
    let mut schedule = Schedule::new();

    // Task 1: position integration
    schedule.request(
        "integrate",
        Access::new().read::<Velocity>().write::<Position>(),
        |world| {
            let entities = world.data_mut();
            entities.for_each_mut::<Position>(|entity, position| {
                if let Some(velocity) = world.data().get::<Velocity>(entity) {
                    position.x += velocity.dx;
                    position.y += velocity.dy;
                }
            });
        },
    );

    // Task 2: wealth decay, independent of task 1 (same level)
    schedule.request("decay", Access::new().write::<Wealth>(), |world| {
        world
            .data_mut()
            .for_each_mut::<Wealth>(|_, wealth| wealth.value *= 0.9999);
    });

    // Task 3: settles after both writers
    schedule.request(
        "audit",
        Access::new().read_after::<Position>().read_after::<Wealth>(),
        |world| {
            let mut total = 0.0f32;
            world
                .data()
                .for_each::<Wealth>(|_, wealth| total += wealth.value);
            black_box(total);
        },
    );

    schedule
}

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    group.bench_function("spawn_10k", |b| {
        b.iter(|| black_box(make_world(AGENTS_SMALL)));
    });

    group.finish();
}

fn tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    group.bench_function("tick_3_tasks_100k", |b| {
        b.iter_batched(
            || make_world(AGENTS_MED),
            |world| {
                make_schedule().run(world.cell()).unwrap();
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, spawn_benchmark, tick_benchmark);
criterion_main!(benches);
