//! Headless asteroid arena driving the physics core.

use std::collections::BTreeMap;

use arcade_physics::{
    BodyId, BodyRef, CollisionEvent, ConstraintId, LockRotationToZ, LockZAxis, RigidBody, Shape,
    Simulation, SimulationConfig,
};
use glam::{Mat3, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::event_bus::{EventBus, GameEvent};
use crate::objects::{filter_collisions, ObjectType};
use crate::prefab::Prefab;

/// Tunables of the arena. Distances in world units, times in seconds.
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Half extent of the square play field; bodies wrap around at the edge.
    pub half_size: f32,
    pub ship_thrust: f32,
    /// Ship turn rate in radians per second.
    pub ship_turn_rate: f32,
    pub ship_damping: f32,
    pub fire_interval: f32,
    pub missile_speed: f32,
    pub missile_lifetime: f32,
    /// Fragments are spawned down to this level.
    pub max_fragment_level: u32,
    pub simulation: SimulationConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            half_size: 40.0,
            ship_thrust: 20.0,
            ship_turn_rate: std::f32::consts::PI,
            ship_damping: 0.5,
            fire_interval: 0.25,
            missile_speed: 50.0,
            missile_lifetime: 1.5,
            max_fragment_level: 2,
            simulation: SimulationConfig::default(),
        }
    }
}

/// Player controls for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShipInput {
    /// Turn direction in `[-1, 1]`, positive is counter-clockwise.
    pub turn: f32,
    pub thrust: bool,
    pub fire: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    pub frames: u64,
    pub collisions: u64,
    pub bumps: u64,
    pub missiles_fired: u64,
    pub missile_hits: u64,
    pub asteroids_destroyed: u64,
    pub ships_lost: u64,
    pub wave: u32,
}

struct Asteroid {
    body: BodyRef,
    lock: ConstraintId,
    energy: i32,
    size: f32,
    level: u32,
}

struct Missile {
    body: BodyRef,
    age: f32,
}

struct Ship {
    body: BodyRef,
    locks: [ConstraintId; 2],
    heading: f32,
    cooldown: f32,
}

pub struct Arena {
    config: ArenaConfig,
    sim: Simulation,
    bus: EventBus,
    rng: StdRng,
    rocks: Vec<Prefab>,
    fighter: Prefab,
    ship: Option<Ship>,
    asteroids: BTreeMap<BodyId, Asteroid>,
    missiles: BTreeMap<BodyId, Missile>,
    stats: ArenaStats,
}

impl Arena {
    pub fn new(config: ArenaConfig, seed: u64) -> anyhow::Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let rocks = vec![
            Prefab::rock("asteroid1", &mut rng)?,
            Prefab::rock("asteroid2", &mut rng)?,
        ];
        let fighter = Prefab::fighter()?;

        let bus = EventBus::new();
        let sim = Simulation::new(config.simulation.clone())
            .with_filter(filter_collisions)
            .with_notifier(bus.clone());

        let mut arena = Self {
            config,
            sim,
            bus,
            rng,
            rocks,
            fighter,
            ship: None,
            asteroids: BTreeMap::new(),
            missiles: BTreeMap::new(),
            stats: ArenaStats::default(),
        };
        arena.spawn_ship();
        arena.next_wave();
        Ok(arena)
    }

    pub fn stats(&self) -> ArenaStats {
        self.stats
    }

    pub fn asteroid_count(&self) -> usize {
        self.asteroids.len()
    }

    pub fn missile_count(&self) -> usize {
        self.missiles.len()
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Ship position and heading direction, if a ship is alive.
    pub fn ship_pose(&self) -> Option<(Vec3, Vec3)> {
        self.ship.as_ref().map(|ship| {
            let position = ship.body.borrow().position();
            (position, heading_direction(ship.heading))
        })
    }

    pub fn asteroid_positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.asteroids.values().map(|a| a.body.borrow().position())
    }

    /// Advance the arena by one frame of `dt` seconds.
    pub fn update(&mut self, dt: f32, input: ShipInput) {
        self.stats.frames += 1;
        self.steer_ship(dt, input);
        self.age_missiles(dt);

        self.sim.step(dt as f64);

        self.wrap_around();
        self.handle_events();
    }

    fn steer_ship(&mut self, dt: f32, input: ShipInput) {
        let Some(ship) = self.ship.as_mut() else {
            return;
        };
        ship.heading += input.turn.clamp(-1.0, 1.0) * self.config.ship_turn_rate * dt;
        ship.cooldown = (ship.cooldown - dt).max(0.0);

        let orientation = Mat3::from_rotation_z(ship.heading);
        let (origin, velocity) = {
            let mut body = ship.body.borrow_mut();
            body.set_orientation(orientation);
            if input.thrust {
                body.add_force(orientation * Vec3::new(0.0, self.config.ship_thrust, 0.0));
            }
            (body.position(), body.linear_velocity())
        };

        if input.fire && ship.cooldown <= 0.0 {
            ship.cooldown = self.config.fire_interval;
            let direction = heading_direction(ship.heading);
            self.fire_missile(origin + direction * 2.5, direction, velocity);
        }
    }

    fn fire_missile(&mut self, origin: Vec3, direction: Vec3, carrier_velocity: Vec3) {
        let body = RigidBody::new(Shape::sphere(0.2))
            .with_mass(0.1)
            .with_position(origin)
            .with_linear_velocity(direction * self.config.missile_speed + carrier_velocity)
            .with_user_data(ObjectType::Missile.mask())
            .into_ref();
        let id = self.sim.add_body(&body);
        self.missiles.insert(id, Missile { body, age: 0.0 });
        self.stats.missiles_fired += 1;
    }

    fn age_missiles(&mut self, dt: f32) {
        let lifetime = self.config.missile_lifetime;
        let expired: Vec<BodyId> = self
            .missiles
            .iter_mut()
            .filter_map(|(id, missile)| {
                missile.age += dt;
                (missile.age >= lifetime).then_some(*id)
            })
            .collect();
        for id in expired {
            self.remove_missile(id);
        }
    }

    fn remove_missile(&mut self, id: BodyId) -> bool {
        match self.missiles.remove(&id) {
            Some(missile) => {
                self.sim.remove_body(&missile.body);
                true
            }
            None => false,
        }
    }

    fn spawn_ship(&mut self) {
        let mut shape = self.fighter.generate_hull(1.0);
        shape.set_restitution(0.5);
        let mut body = RigidBody::new(shape)
            .with_mass(5.0)
            .with_user_data(ObjectType::Ship.mask());
        body.linear_damping = self.config.ship_damping;
        let body = body.into_ref();

        self.sim.add_body(&body);
        let locks = [
            self.sim.constraints.insert(LockZAxis::new(body.clone())),
            self.sim.constraints.insert(LockRotationToZ::new(body.clone())),
        ];
        log::info!("ship {} launched", body.borrow().id().0);
        self.ship = Some(Ship {
            body,
            locks,
            heading: 0.0,
            cooldown: 0.0,
        });
    }

    fn destroy_ship(&mut self) {
        let Some(ship) = self.ship.take() else {
            return;
        };
        let id = ship.body.borrow().id();
        self.sim.remove_body(&ship.body);
        for lock in ship.locks {
            self.sim.constraints.remove(lock);
        }
        self.bus.publish(GameEvent::ShipDestroyed(id));
    }

    fn next_wave(&mut self) {
        self.stats.wave += 1;
        log::info!("wave {}", self.stats.wave);
        for _ in 0..self.stats.wave {
            let position = loop {
                let p = Vec3::new(
                    self.rng.gen_range(-1.0..1.0),
                    self.rng.gen_range(-1.0..1.0),
                    0.0,
                ) * self.config.half_size * 0.75;
                // Keep the spawn away from the ship.
                if p.length() > 12.0 {
                    break p;
                }
            };
            self.spawn_asteroid(0, position);
        }
    }

    fn spawn_asteroid(&mut self, level: u32, position: Vec3) -> BodyId {
        let level = level.min(16);
        let half = self.config.half_size;
        let position = Vec3::new(wrap(position.x, half), wrap(position.y, half), 0.0);
        let size = (6.0 + 0.5 * self.rng.gen::<f32>()) / (1u32 << level) as f32;
        let speed = 1.0 + self.rng.gen::<f32>() * 8.0 / size;
        let energy = ((3i32 >> level) + 2).pow(2);

        let prefab = &self.rocks[self.rng.gen_range(0..self.rocks.len())];
        let prefab_name = prefab.name();
        let shape = prefab
            .generate_hull(size)
            .with_friction(0.0)
            .with_restitution(1.0);

        let velocity = random_planar_direction(&mut self.rng) * self.rng.gen::<f32>() * speed;
        let spin = random_direction(&mut self.rng) * self.rng.gen::<f32>() * speed * 0.2;
        let body = RigidBody::new(shape)
            .with_mass(1000.0 * size)
            .with_position(position)
            .with_linear_velocity(velocity)
            .with_angular_velocity(spin)
            .with_user_data(ObjectType::Asteroid.mask())
            .into_ref();

        let id = self.sim.add_body(&body);
        let lock = self.sim.constraints.insert(LockZAxis::new(body.clone()));
        self.asteroids.insert(
            id,
            Asteroid {
                body,
                lock,
                energy,
                size,
                level,
            },
        );
        log::trace!("asteroid {} from {prefab_name}, level {level}, size {size:.2}", id.0);
        self.bus.publish(GameEvent::AsteroidCreated(id));
        id
    }

    fn destroy_asteroid(&mut self, id: BodyId) {
        let Some(asteroid) = self.asteroids.remove(&id) else {
            return;
        };
        self.sim.remove_body(&asteroid.body);
        self.sim.constraints.remove(asteroid.lock);

        if asteroid.level < self.config.max_fragment_level {
            let center = asteroid.body.borrow().position();
            for _ in 0..(3u32 << asteroid.level) {
                let offset = random_planar_direction(&mut self.rng) * asteroid.size * 0.3;
                self.spawn_asteroid(asteroid.level + 1, center + offset);
            }
        }
        self.bus.publish(GameEvent::AsteroidDestroyed(id));
    }

    fn wrap_around(&mut self) {
        let half = self.config.half_size;
        let bodies = self
            .asteroids
            .values()
            .map(|a| &a.body)
            .chain(self.missiles.values().map(|m| &m.body))
            .chain(self.ship.iter().map(|s| &s.body));
        for body in bodies {
            let mut body = body.borrow_mut();
            let p = body.position();
            let wrapped = Vec3::new(wrap(p.x, half), wrap(p.y, half), p.z);
            if wrapped != p {
                body.set_position(wrapped);
            }
        }
    }

    fn handle_events(&mut self) {
        while let Some(event) = self.bus.poll() {
            match event {
                GameEvent::Collision(collision) => self.on_collision(&collision),
                GameEvent::AsteroidCreated(id) => log::debug!("asteroid {} created", id.0),
                GameEvent::AsteroidDestroyed(id) => {
                    self.stats.asteroids_destroyed += 1;
                    log::debug!("asteroid {} destroyed", id.0);
                    if self.asteroids.is_empty() {
                        self.next_wave();
                    }
                }
                GameEvent::ShipDestroyed(id) => {
                    self.stats.ships_lost += 1;
                    log::info!("ship {} destroyed", id.0);
                    self.spawn_ship();
                }
            }
        }
    }

    fn on_collision(&mut self, collision: &CollisionEvent) {
        use ObjectType::{Asteroid, Missile, Ship};

        self.stats.collisions += 1;
        let kinds = (
            ObjectType::from_user_data(collision.user_data0),
            ObjectType::from_user_data(collision.user_data1),
        );
        if kinds.0 == Some(Ship) || kinds.1 == Some(Ship) {
            self.stats.bumps += 1;
        }

        match kinds {
            (Some(Missile), Some(Asteroid)) => self.on_missile_hit(collision.body0, collision.body1),
            (Some(Asteroid), Some(Missile)) => self.on_missile_hit(collision.body1, collision.body0),
            (Some(Ship), Some(Asteroid)) => self.on_ship_hit(collision.body0),
            (Some(Asteroid), Some(Ship)) => self.on_ship_hit(collision.body1),
            _ => {}
        }
    }

    fn on_missile_hit(&mut self, missile_id: BodyId, asteroid_id: BodyId) {
        // A missile only counts once even if several contacts were queued.
        if !self.remove_missile(missile_id) {
            return;
        }
        self.stats.missile_hits += 1;
        let destroyed = match self.asteroids.get_mut(&asteroid_id) {
            Some(rock) => {
                rock.energy -= 1;
                rock.energy <= 0
            }
            None => false,
        };
        if destroyed {
            self.destroy_asteroid(asteroid_id);
        }
    }

    fn on_ship_hit(&mut self, ship_id: BodyId) {
        let is_current = self
            .ship
            .as_ref()
            .is_some_and(|s| s.body.borrow().id() == ship_id);
        if is_current {
            self.destroy_ship();
        }
    }
}

/// Unit direction the ship's nose points at for a heading angle.
pub fn heading_direction(heading: f32) -> Vec3 {
    Mat3::from_rotation_z(heading) * Vec3::Y
}

fn wrap(value: f32, half: f32) -> f32 {
    if value > half {
        value - 2.0 * half
    } else if value < -half {
        value + 2.0 * half
    } else {
        value
    }
}

fn random_planar_direction(rng: &mut impl Rng) -> Vec3 {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    Vec3::new(angle.cos(), angle.sin(), 0.0)
}

fn random_direction(rng: &mut impl Rng) -> Vec3 {
    let z: f32 = rng.gen_range(-1.0..1.0);
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let r = (1.0 - z * z).sqrt();
    Vec3::new(r * angle.cos(), r * angle.sin(), z)
}
