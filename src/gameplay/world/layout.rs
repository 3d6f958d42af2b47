use crate::config::{ObstacleFieldConfig, WorldConfig};
use crate::gameplay::collision::BodyFilter;
use crate::gameplay::contact::{GOAL_NAME, OBSTACLE_NAME};
use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const GROUND_THICKNESS: f32 = 1.0;
const HOUSE_SIZE: Vec3 = Vec3::new(5.0, 3.0, 4.0);
const HOUSE_CENTER: Vec3 = Vec3::new(0.0, 1.5, -17.0);
const ROOF_SIZE: Vec3 = Vec3::new(6.0, 2.0, 5.0);
const ROOF_CENTER: Vec3 = Vec3::new(0.0, 4.0, -17.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObstacleKind {
    TrashBin,
    Bicycle,
    Pet,
    Pedestrian,
}

impl ObstacleKind {
    pub const ALL: [Self; 4] = [Self::TrashBin, Self::Bicycle, Self::Pet, Self::Pedestrian];

    pub fn label(self) -> &'static str {
        match self {
            Self::TrashBin => "trash bin",
            Self::Bicycle => "bicycle",
            Self::Pet => "pet",
            Self::Pedestrian => "pedestrian",
        }
    }

    /// Collider (and body mesh) of the obstacle.
    pub fn shape(self) -> ObstacleShape {
        match self {
            Self::TrashBin => ObstacleShape::Cylinder {
                radius: 0.4,
                height: 1.0,
            },
            Self::Bicycle => ObstacleShape::Cuboid {
                size: Vec3::new(0.1, 0.8, 1.5),
            },
            Self::Pet => ObstacleShape::Ball { radius: 0.3 },
            Self::Pedestrian => ObstacleShape::Cylinder {
                radius: 0.2,
                height: 1.2,
            },
        }
    }

    /// Height of the body center above the road plane.
    pub fn rest_height(self) -> f32 {
        match self {
            Self::TrashBin => 0.5,
            Self::Bicycle => 0.4,
            Self::Pet => 0.3,
            Self::Pedestrian => 0.6,
        }
    }

    /// Visual-only head for pedestrians, as (radius, offset above body center).
    pub fn head(self) -> Option<(f32, f32)> {
        match self {
            Self::Pedestrian => Some((0.25, 0.8)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObstacleShape {
    Cylinder { radius: f32, height: f32 },
    Cuboid { size: Vec3 },
    Ball { radius: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstaclePlacement {
    pub kind: ObstacleKind,
    pub position: Vec3,
}

impl ObstaclePlacement {
    pub fn name(&self) -> &'static str {
        OBSTACLE_NAME
    }

    pub fn filter(&self) -> BodyFilter {
        BodyFilter::OBSTACLE
    }
}

/// Static box with a fixed body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidPiece {
    pub name: &'static str,
    pub center: Vec3,
    pub size: Vec3,
    pub filter: BodyFilter,
}

/// Mesh-only scenery, no body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoration {
    pub name: &'static str,
    pub center: Vec3,
    pub size: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldLayout {
    pub ground: SolidPiece,
    pub road: SolidPiece,
    pub goal: SolidPiece,
    pub walls: [SolidPiece; 4],
    pub house: Decoration,
    pub roof: Decoration,
    pub obstacles: Vec<ObstaclePlacement>,
    pub rejected_candidates: u32,
}

impl WorldLayout {
    pub fn generate(
        world: &WorldConfig,
        field: &ObstacleFieldConfig,
        rng: &mut impl Rng,
    ) -> Self {
        let (obstacles, rejected_candidates) = place_obstacles(field, rng);

        Self {
            ground: SolidPiece {
                name: "ground",
                center: Vec3::new(0.0, world.ground_top_y - GROUND_THICKNESS * 0.5, 0.0),
                size: Vec3::new(
                    world.ground_half_extent * 2.0,
                    GROUND_THICKNESS,
                    world.ground_half_extent * 2.0,
                ),
                filter: BodyFilter::BOUNDARY,
            },
            road: SolidPiece {
                name: "road",
                center: Vec3::ZERO,
                size: Vec3::new(world.road_width, world.road_height, world.road_length),
                filter: BodyFilter::BOUNDARY,
            },
            goal: SolidPiece {
                name: GOAL_NAME,
                center: Vec3::new(0.0, 0.0, world.goal_z),
                size: Vec3::new(world.goal_width, world.goal_height, world.goal_length),
                filter: BodyFilter::GOAL,
            },
            walls: boundary_walls(world),
            house: Decoration {
                name: "house",
                center: HOUSE_CENTER,
                size: HOUSE_SIZE,
            },
            roof: Decoration {
                name: "roof",
                center: ROOF_CENTER,
                size: ROOF_SIZE,
            },
            obstacles,
            rejected_candidates,
        }
    }

    pub fn solid_pieces(&self) -> impl Iterator<Item = &SolidPiece> {
        [&self.ground, &self.road, &self.goal]
            .into_iter()
            .chain(self.walls.iter())
    }
}

/// Seeded when configured, otherwise from OS entropy.
pub fn obstacle_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// One draw per candidate, no retry: a candidate landing in the spawn lane is dropped.
fn place_obstacles(
    field: &ObstacleFieldConfig,
    rng: &mut impl Rng,
) -> (Vec<ObstaclePlacement>, u32) {
    let mut placements = Vec::with_capacity(field.count as usize);
    let mut rejected = 0;

    for _ in 0..field.count {
        let kind = ObstacleKind::ALL[rng.gen_range(0..ObstacleKind::ALL.len())];
        let x = rng.gen_range(field.x_min..=field.x_max);
        let z = rng.gen_range(field.z_min..=field.z_max);

        if in_spawn_lane(field, x, z) {
            debug!(
                "Rejected {} candidate at ({x:.2}, {z:.2}) inside the spawn lane.",
                kind.label()
            );
            rejected += 1;
            continue;
        }

        placements.push(ObstaclePlacement {
            kind,
            position: Vec3::new(x, kind.rest_height(), z),
        });
    }

    (placements, rejected)
}

fn in_spawn_lane(field: &ObstacleFieldConfig, x: f32, z: f32) -> bool {
    x.abs() < field.spawn_lane_half_width && z > field.spawn_lane_min_z
}

/// Left, right, front, back. Side walls run from the front wall to the back wall behind the goal
/// so the driveway stays enclosed.
fn boundary_walls(world: &WorldConfig) -> [SolidPiece; 4] {
    let thickness = world.wall_thickness;
    let center_y = world.ground_top_y + world.wall_height * 0.5;
    let front_z = world.road_length * 0.5 + thickness * 0.5;
    let back_z = world.goal_z - world.goal_length * 0.5 - thickness * 0.5;
    let side_x = world.road_width * 0.5 + thickness * 0.5;
    let side_length = front_z - back_z + thickness;
    let side_center_z = (front_z + back_z) * 0.5;
    let cross_width = world.road_width + thickness * 2.0;

    let wall = |name, center, size| SolidPiece {
        name,
        center,
        size,
        filter: BodyFilter::BOUNDARY,
    };

    [
        wall(
            "wall_left",
            Vec3::new(-side_x, center_y, side_center_z),
            Vec3::new(thickness, world.wall_height, side_length),
        ),
        wall(
            "wall_right",
            Vec3::new(side_x, center_y, side_center_z),
            Vec3::new(thickness, world.wall_height, side_length),
        ),
        wall(
            "wall_front",
            Vec3::new(0.0, center_y, front_z),
            Vec3::new(cross_width, world.wall_height, thickness),
        ),
        wall(
            "wall_back",
            Vec3::new(0.0, center_y, back_z),
            Vec3::new(cross_width, world.wall_height, thickness),
        ),
    ]
}
