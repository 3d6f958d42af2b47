use bevy::ecs::system::EntityCommands;
use bevy::prelude::*;
use bevy_rapier3d::prelude::{ActiveEvents, CollisionGroups, Group, Sensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionCategory {
    Vehicle,
    Obstacle,
    Goal,
    Boundary,
}

impl CollisionCategory {
    pub const fn bit(self) -> u32 {
        match self {
            Self::Vehicle => 1 << 0,
            Self::Obstacle => 1 << 1,
            Self::Goal => 1 << 2,
            Self::Boundary => 1 << 3,
        }
    }
}

/// Set of [`CollisionCategory`] bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollisionMask(u32);

impl CollisionMask {
    pub const EMPTY: Self = Self(0);

    pub const fn of(categories: &[CollisionCategory]) -> Self {
        let mut bits = 0;
        let mut index = 0;
        while index < categories.len() {
            bits |= categories[index].bit();
            index += 1;
        }
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, category: CollisionCategory) -> bool {
        self.0 & category.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Classification carried by every physics body in the driveway world.
///
/// `collision_mask` lists the categories this body physically blocks, `contact_mask` the
/// categories it wants contact-begin reports for. The two are independent: the goal and the
/// obstacles block nothing but still report the car touching them.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyFilter {
    pub category: CollisionCategory,
    pub collision_mask: CollisionMask,
    pub contact_mask: CollisionMask,
}

impl BodyFilter {
    pub const VEHICLE: Self = Self {
        category: CollisionCategory::Vehicle,
        collision_mask: CollisionMask::of(&[CollisionCategory::Boundary]),
        contact_mask: CollisionMask::of(&[CollisionCategory::Obstacle, CollisionCategory::Goal]),
    };

    pub const OBSTACLE: Self = Self {
        category: CollisionCategory::Obstacle,
        collision_mask: CollisionMask::EMPTY,
        contact_mask: CollisionMask::of(&[CollisionCategory::Vehicle]),
    };

    pub const GOAL: Self = Self {
        category: CollisionCategory::Goal,
        collision_mask: CollisionMask::EMPTY,
        contact_mask: CollisionMask::of(&[CollisionCategory::Vehicle]),
    };

    pub const BOUNDARY: Self = Self {
        category: CollisionCategory::Boundary,
        collision_mask: CollisionMask::of(&[CollisionCategory::Vehicle]),
        contact_mask: CollisionMask::EMPTY,
    };

    /// Both bodies must list each other for a physical response.
    pub fn blocks(&self, other: &Self) -> bool {
        self.collision_mask.contains(other.category) && other.collision_mask.contains(self.category)
    }

    /// Either side asking is enough for a contact report.
    pub fn reports_contact_with(&self, other: &Self) -> bool {
        self.contact_mask.contains(other.category) || other.contact_mask.contains(self.category)
    }

    /// Whether the physics engine considers the pair at all, solid or sensor.
    #[cfg(test)]
    pub fn interacts_with(&self, other: &Self) -> bool {
        let self_filter = self.collision_mask.union(self.contact_mask);
        let other_filter = other.collision_mask.union(other.contact_mask);
        self_filter.contains(other.category) && other_filter.contains(self.category)
    }

    pub fn is_sensor(&self) -> bool {
        self.collision_mask.is_empty()
    }

    pub fn collision_groups(&self) -> CollisionGroups {
        CollisionGroups::new(
            Group::from_bits_truncate(self.category.bit()),
            Group::from_bits_truncate(self.collision_mask.union(self.contact_mask).bits()),
        )
    }

    /// Rapier raises an event for a pair when either collider asks for it, so only sensors ask.
    /// Solid bodies (the car, walls) leave it to their counterparts; car/wall bumps stay silent.
    pub fn active_events(&self) -> ActiveEvents {
        if self.is_sensor() && !self.contact_mask.is_empty() {
            ActiveEvents::COLLISION_EVENTS
        } else {
            ActiveEvents::empty()
        }
    }

    pub fn insert_physics_filter(&self, entity: &mut EntityCommands) {
        entity.insert((*self, self.collision_groups(), self.active_events()));
        if self.is_sensor() {
            entity.insert(Sensor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BodyFilter; 4] = [
        BodyFilter::VEHICLE,
        BodyFilter::OBSTACLE,
        BodyFilter::GOAL,
        BodyFilter::BOUNDARY,
    ];

    #[test]
    fn categories_are_distinct_bits() {
        let bits = [
            CollisionCategory::Vehicle.bit(),
            CollisionCategory::Obstacle.bit(),
            CollisionCategory::Goal.bit(),
            CollisionCategory::Boundary.bit(),
        ];
        for (i, a) in bits.iter().enumerate() {
            assert_eq!(a.count_ones(), 1);
            for b in bits.iter().skip(i + 1) {
                assert_eq!(a & b, 0);
            }
        }
    }

    #[test]
    fn goal_reports_vehicle_but_never_blocks() {
        let goal = BodyFilter::GOAL;
        assert!(goal.collision_mask.is_empty());
        assert!(goal.contact_mask.contains(CollisionCategory::Vehicle));
        assert!(goal.is_sensor());
        assert!(!goal.blocks(&BodyFilter::VEHICLE));
        assert!(goal.reports_contact_with(&BodyFilter::VEHICLE));
        assert!(goal.active_events().contains(ActiveEvents::COLLISION_EVENTS));
    }

    #[test]
    fn boundary_blocks_vehicle_silently() {
        let boundary = BodyFilter::BOUNDARY;
        assert!(boundary.blocks(&BodyFilter::VEHICLE));
        assert!(!boundary.reports_contact_with(&BodyFilter::VEHICLE));
        assert!(!boundary.is_sensor());
        assert!(boundary.active_events().is_empty());
    }

    #[test]
    fn vehicle_passes_through_obstacles() {
        assert!(!BodyFilter::VEHICLE.blocks(&BodyFilter::OBSTACLE));
        assert!(BodyFilter::VEHICLE.reports_contact_with(&BodyFilter::OBSTACLE));
        assert!(BodyFilter::VEHICLE.interacts_with(&BodyFilter::OBSTACLE));
    }

    #[test]
    fn engine_events_match_contact_policy_for_every_pair() {
        for a in ALL {
            for b in ALL {
                let engine_reports = a.interacts_with(&b)
                    && (!a.active_events().is_empty() || !b.active_events().is_empty());
                assert_eq!(
                    engine_reports,
                    a.reports_contact_with(&b),
                    "{:?} vs {:?}",
                    a.category,
                    b.category
                );
            }
        }
    }

    #[test]
    fn static_pieces_never_touch_each_other() {
        let statics = [BodyFilter::OBSTACLE, BodyFilter::GOAL, BodyFilter::BOUNDARY];
        for a in statics {
            for b in statics {
                assert!(!a.interacts_with(&b));
            }
        }
    }
}
