//! Arena: a headless top-down shooter running for a fixed number of frames.
//!
//! Turrets fire pooled projectiles at drifting enemies. Hits are sent as typed
//! `Damage` commands; dead enemies are despawned through the command buffer
//! and respawned from a prefab.
//!
//! Pass a JSON config path to override the world settings:
//!
//! ```text
//! RUST_LOG=info cargo run -p hearth --example arena -- arena.json
//! ```

use glam::Vec2;
use hearth::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const FRAMES: u32 = 240;
const DT: f32 = 1.0 / 60.0;
const ARENA_HALF: f32 = 50.0;
const HIT_RADIUS: f32 = 1.5;

// ── Components ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Transform {
    position: Vec2,
}
impl Component for Transform {}

#[derive(Debug, Clone)]
struct Velocity(Vec2);
impl Component for Velocity {}

#[derive(Debug, Clone)]
struct Health {
    current: i32,
    max: i32,
}

impl Component for Health {
    fn on_activate(&mut self) {
        self.current = self.max;
    }
}

#[derive(Debug, Clone)]
struct Enemy;
impl Component for Enemy {}

#[derive(Debug, Clone)]
struct Turret {
    cooldown: f32,
    rate: f32,
}
impl Component for Turret {}

#[derive(Debug, Clone)]
struct Projectile {
    ttl: f32,
    owner: Option<EntityHandle>,
}

impl Component for Projectile {
    fn on_attach(&mut self, owner: EntityHandle) {
        self.owner = Some(owner);
    }

    fn on_acquire(&mut self) {
        self.ttl = 1.5;
    }

    fn on_release(&mut self) {
        self.ttl = 0.0;
    }
}

// ── Commands and resources ───────────────────────────────────────────────

struct Damage(i32);

#[derive(Debug, Default)]
struct Score {
    shots: u32,
    hits: u32,
    kills: u32,
}

struct Prefabs {
    enemy: EntityHandle,
}

/// Random point inside the arena. The world's RNG is seeded, so runs are
/// reproducible.
fn random_point(rng: &mut ChaCha8Rng) -> Vec2 {
    Vec2::new(
        rng.gen_range(-ARENA_HALF..ARENA_HALF),
        rng.gen_range(-ARENA_HALF..ARENA_HALF),
    )
}

fn main() {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => WorldConfig::from_file(&path).unwrap_or_else(|e| {
            log::error!("{e}; falling back to defaults");
            WorldConfig::default()
        }),
        None => WorldConfig::default(),
    };

    let mut world = GameWorld::with_config(config);
    setup(&mut world);

    let mut schedule = Schedule::new();
    schedule
        .add_system(Phase::PreUpdate, fire_turrets)
        .add_system(Phase::Update, integrate)
        .add_system(Phase::Update, detect_hits)
        .add_system(Phase::PostUpdate, expire_projectiles)
        .add_system(Phase::PostUpdate, reap_and_respawn);

    for frame in 0..FRAMES {
        schedule.run(&mut world);
        let stats = world.take_frame_stats();
        if frame % 60 == 0 {
            log::info!("frame {}: {}", frame, stats.to_json());
        }
    }

    let score = world.resource::<Score>();
    println!(
        "{} frames: {} shots, {} hits, {} kills, {} entities alive",
        FRAMES,
        score.shots,
        score.hits,
        score.kills,
        world.entities().entity_count()
    );
}

fn setup(world: &mut GameWorld) {
    world.register_components(|r| {
        r.register_type::<Transform>();
        r.register_type::<Velocity>();
        r.register_type::<Health>();
        r.register_type::<Enemy>();
        r.register_type::<Turret>();
        r.register_type::<Projectile>();
    });
    world.insert_resource(Score::default());
    world.insert_resource(ChaCha8Rng::seed_from_u64(0x9E37_79B9));

    let enemy = world.spawn_inactive();
    if let Some(obj) = world.object(enemy) {
        obj.with(Transform {
            position: Vec2::ZERO,
        })
        .with(Velocity(Vec2::new(3.0, -2.0)))
        .with(Health { current: 3, max: 3 })
        .with(Enemy);
    }

    let projectile = world.spawn_inactive();
    if let Some(obj) = world.object(projectile) {
        obj.with(Transform {
            position: Vec2::ZERO,
        })
        .with(Velocity(Vec2::ZERO))
        .with(Projectile {
            ttl: 0.0,
            owner: None,
        });
    }
    world.create_pool("projectiles", projectile);
    world.prewarm_pool("projectiles", 32);
    world.insert_resource(Prefabs { enemy });

    for corner in [Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0)] {
        let turret = world.spawn();
        if let Some(obj) = world.object(turret) {
            obj.with(Transform {
                position: corner * (ARENA_HALF * 0.8),
            })
            .with(Turret {
                cooldown: 0.0,
                rate: 0.25,
            });
        }
    }

    for _ in 0..6 {
        let position = random_point(world.resource_mut::<ChaCha8Rng>());
        let e = world.instantiate(enemy);
        if let Some(t) = world.entities_mut().get_mut::<Transform>(e) {
            t.position = position;
        }
    }

    world.on_command::<Damage>(|target, damage| {
        let Some(health) = target.get_mut::<Health>() else {
            return;
        };
        health.current -= damage.0;
        if health.current <= 0 {
            log::debug!("{} destroyed", target.handle());
            target.set_active(false);
        }
    });
}

// ── Systems ──────────────────────────────────────────────────────────────

fn fire_turrets(world: &mut GameWorld) {
    let targets: Vec<Vec2> = world
        .find::<(&Transform, &Enemy)>()
        .iter()
        .map(|(_, (t, _))| t.position)
        .collect();
    if targets.is_empty() {
        return;
    }

    let mut shots = Vec::new();
    world.each_mut::<(&Transform, &mut Turret)>(GameObjectFilter::default(), |_, (t, turret)| {
        turret.cooldown -= DT;
        if turret.cooldown > 0.0 {
            return;
        }
        turret.cooldown = turret.rate;
        let nearest = targets
            .iter()
            .copied()
            .min_by(|a, b| {
                a.distance_squared(t.position)
                    .total_cmp(&b.distance_squared(t.position))
            })
            .unwrap_or(Vec2::X);
        shots.push((t.position, (nearest - t.position).normalize_or_zero() * 40.0));
    });

    for (origin, velocity) in shots {
        let Some(p) = world.acquire("projectiles") else {
            return;
        };
        if let Some(t) = world.entities_mut().get_mut::<Transform>(p) {
            t.position = origin;
        }
        if let Some(v) = world.entities_mut().get_mut::<Velocity>(p) {
            v.0 = velocity;
        }
        world.resource_mut::<Score>().shots += 1;
    }
}

fn integrate(world: &mut GameWorld) {
    world.each_mut::<(&mut Transform, &mut Velocity)>(GameObjectFilter::default(), |_, (t, v)| {
        t.position += v.0 * DT;
        // Bounce off the arena walls.
        if t.position.x.abs() > ARENA_HALF {
            v.0.x = -v.0.x;
        }
        if t.position.y.abs() > ARENA_HALF {
            v.0.y = -v.0.y;
        }
        t.position = t.position.clamp(Vec2::splat(-ARENA_HALF), Vec2::splat(ARENA_HALF));
    });
}

fn detect_hits(world: &mut GameWorld) {
    let enemies: Vec<(EntityHandle, Vec2)> = world
        .find::<(&Transform, &Enemy)>()
        .iter()
        .map(|(e, (t, _))| (e, t.position))
        .collect();

    let mut hits = Vec::new();
    for (projectile, (t, _)) in world.find::<(&Transform, &Projectile)>() {
        if let Some(&(enemy, _)) = enemies
            .iter()
            .find(|(_, pos)| pos.distance(t.position) < HIT_RADIUS)
        {
            hits.push((projectile, enemy));
        }
    }

    for (projectile, enemy) in hits {
        world.commands().send(enemy, Damage(1));
        world.commands().add(projectile, SetActive(false));
        world.resource_mut::<Score>().hits += 1;
    }
}

fn expire_projectiles(world: &mut GameWorld) {
    let mut expired = Vec::new();
    world.each_mut::<&mut Projectile>(GameObjectFilter::default(), |e, p| {
        p.ttl -= DT;
        if p.ttl <= 0.0 {
            expired.push(e);
        }
    });
    for e in expired {
        world.release("projectiles", e);
    }

    // Projectiles deactivated by a hit go back to the pool too.
    let spent: Vec<_> = world
        .find_filtered::<&Projectile>(GameObjectFilter::INACTIVE | GameObjectFilter::ANY_COMPONENT)
        .iter()
        .filter(|(_, p)| p.ttl > 0.0)
        .map(|(e, _)| e)
        .collect();
    for e in spent {
        world.release("projectiles", e);
    }
}

fn reap_and_respawn(world: &mut GameWorld) {
    let prefab = world.resource::<Prefabs>().enemy;
    let dead: Vec<_> = world
        .find_filtered::<(&Enemy, &Health)>(GameObjectFilter::INACTIVE | GameObjectFilter::ANY_COMPONENT)
        .iter()
        .filter(|(e, (_, h))| *e != prefab && h.current <= 0)
        .map(|(e, _)| e)
        .collect();

    for e in dead {
        world.commands().add(e, Despawn);
        world.commands().add_world_fn(move |w| {
            let position = random_point(w.resource_mut::<ChaCha8Rng>());
            let enemy = w.instantiate(prefab);
            if let Some(t) = w.entities_mut().get_mut::<Transform>(enemy) {
                t.position = position;
            }
            w.resource_mut::<Score>().kills += 1;
            log::debug!("respawned {} at {}", enemy, position);
        });
    }

    // Keep a minimum population even if respawns were skipped.
    if world.find::<&Enemy>().count() < 3 {
        world.commands().add_world(SpawnFrom::new(prefab));
    }
}
