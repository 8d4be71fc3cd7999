//! Collision notifications sent to the gameplay layer.

use glam::Vec3;

use super::rigid_body::BodyId;

/// Topic under which every contact is published.
pub const COLLISION_EVENT: &str = "collision";

/// Payload published once per detected contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    pub body0: BodyId,
    pub body1: BodyId,
    pub user_data0: u64,
    pub user_data1: u64,
    /// Normal pointing from `body1` toward `body0`.
    pub normal: Vec3,
    pub penetration: f32,
}

impl CollisionEvent {
    pub fn involves(&self, id: BodyId) -> bool {
        self.body0 == id || self.body1 == id
    }

    /// Whether either body carries `user_data`.
    pub fn has_data(&self, user_data: u64) -> bool {
        self.user_data0 == user_data || self.user_data1 == user_data
    }

    /// The partner of `id` in this contact, if `id` takes part.
    pub fn other(&self, id: BodyId) -> Option<BodyId> {
        if self.body0 == id {
            Some(self.body1)
        } else if self.body1 == id {
            Some(self.body0)
        } else {
            None
        }
    }

    /// User data of the partner of `id`, if `id` takes part.
    pub fn other_data(&self, id: BodyId) -> Option<u64> {
        if self.body0 == id {
            Some(self.user_data1)
        } else if self.body1 == id {
            Some(self.user_data0)
        } else {
            None
        }
    }
}

/// Receiver of simulation notifications, typically a gameplay event bus.
pub trait CollisionNotifier {
    fn notify(&mut self, topic: &str, event: &CollisionEvent);
}

impl<F> CollisionNotifier for F
where
    F: FnMut(&str, &CollisionEvent),
{
    fn notify(&mut self, topic: &str, event: &CollisionEvent) {
        self(topic, event)
    }
}
