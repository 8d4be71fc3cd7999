//! Queued gameplay event bus.
//!
//! Collision notifications arrive while the simulation is stepping, when
//! bodies are still borrowed. They are queued here and drained by the arena
//! once the step is over.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use arcade_physics::{BodyId, CollisionEvent, CollisionNotifier, COLLISION_EVENT};

pub const ASTEROID_CREATED: &str = "asteroid.created";
pub const ASTEROID_DESTROYED: &str = "asteroid.destroyed";
pub const SHIP_DESTROYED: &str = "ship.destroyed";

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Collision(CollisionEvent),
    AsteroidCreated(BodyId),
    AsteroidDestroyed(BodyId),
    ShipDestroyed(BodyId),
}

impl GameEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Collision(_) => COLLISION_EVENT,
            Self::AsteroidCreated(_) => ASTEROID_CREATED,
            Self::AsteroidDestroyed(_) => ASTEROID_DESTROYED,
            Self::ShipDestroyed(_) => SHIP_DESTROYED,
        }
    }
}

/// Cloneable handle to a shared event queue.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    queue: Rc<RefCell<VecDeque<GameEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: GameEvent) {
        log::trace!("event {}: {:?}", event.topic(), event);
        self.queue.borrow_mut().push_back(event);
    }

    /// Take the next queued event, oldest first.
    pub fn poll(&self) -> Option<GameEvent> {
        self.queue.borrow_mut().pop_front()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

impl CollisionNotifier for EventBus {
    fn notify(&mut self, topic: &str, event: &CollisionEvent) {
        if topic == COLLISION_EVENT {
            self.publish(GameEvent::Collision(*event));
        }
    }
}
