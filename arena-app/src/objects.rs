//! Gameplay tags stored in `RigidBody::user_data`.

use arcade_physics::RigidBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum ObjectType {
    Ship = 1,
    Asteroid = 2,
    Missile = 4,
}

impl ObjectType {
    pub fn mask(self) -> u64 {
        self as u64
    }

    pub fn from_user_data(data: u64) -> Option<Self> {
        match data {
            1 => Some(Self::Ship),
            2 => Some(Self::Asteroid),
            4 => Some(Self::Missile),
            _ => None,
        }
    }
}

/// The ship never collides with its own missiles.
pub fn filter_collisions(body0: &RigidBody, body1: &RigidBody) -> bool {
    (body0.user_data | body1.user_data) != (ObjectType::Ship.mask() | ObjectType::Missile.mask())
}
