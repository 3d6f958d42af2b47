pub mod layout;

use crate::config::GameConfig;
use crate::gameplay::contact::GOAL_NAME;
use crate::states::GameState;
use bevy::asset::RenderAssetUsages;
use bevy::mesh::PrimitiveTopology;
use bevy::prelude::*;
use bevy_rapier3d::prelude::{Collider, RigidBody};
use layout::{obstacle_rng, Decoration, ObstacleKind, ObstacleShape, SolidPiece, WorldLayout};

pub struct DrivewayWorldPlugin;

impl Plugin for DrivewayWorldPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(GameState::Playing),
            spawn_driveway_world.run_if(resource_exists::<GameConfig>),
        )
        .add_systems(OnEnter(GameState::Menu), despawn_driveway_world);
    }
}

/// Root of every static piece of a run.
#[derive(Component)]
pub struct DrivewayWorld;

#[derive(Component, Debug, Clone, Copy)]
pub struct Obstacle {
    pub kind: ObstacleKind,
}

fn spawn_driveway_world(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    config: Res<GameConfig>,
    existing_world: Query<Entity, With<DrivewayWorld>>,
) {
    for entity in &existing_world {
        commands.entity(entity).try_despawn();
    }

    let mut rng = obstacle_rng(config.game.obstacles.seed);
    let layout = WorldLayout::generate(&config.game.world, &config.game.obstacles, &mut rng);

    let house_material = materials.add(Color::srgb(0.55, 0.36, 0.20));
    let roof_material = materials.add(Color::srgb(0.78, 0.16, 0.14));
    let house_mesh = meshes.add(Cuboid::from_size(layout.house.size));
    let roof_mesh = meshes.add(pyramid_mesh(layout.roof.size));

    let mut obstacle_visuals = Vec::with_capacity(layout.obstacles.len());
    for placement in &layout.obstacles {
        let kind = placement.kind;
        let mesh = meshes.add(obstacle_mesh(kind.shape()));
        let material = materials.add(obstacle_color(kind));
        let head = kind.head().map(|(radius, offset_y)| {
            (
                meshes.add(Sphere::new(radius)),
                materials.add(Color::srgb(0.96, 0.80, 0.66)),
                offset_y,
            )
        });
        obstacle_visuals.push((mesh, material, head));
    }

    let mut solid_visuals = Vec::new();
    for piece in layout.solid_pieces() {
        let visual = solid_color(piece).map(|color| {
            (
                meshes.add(Cuboid::from_size(piece.size)),
                materials.add(color),
            )
        });
        solid_visuals.push((*piece, visual));
    }

    commands
        .spawn((
            Name::new("DrivewayWorld"),
            DrivewayWorld,
            Transform::default(),
            Visibility::default(),
        ))
        .with_children(|parent| {
            for (piece, visual) in solid_visuals {
                let mut entity = parent.spawn((
                    Name::new(piece.name),
                    RigidBody::Fixed,
                    Collider::cuboid(piece.size.x * 0.5, piece.size.y * 0.5, piece.size.z * 0.5),
                    Transform::from_translation(piece.center),
                ));
                piece.filter.insert_physics_filter(&mut entity);

                match visual {
                    Some((mesh, material)) => {
                        entity.insert((Mesh3d(mesh), MeshMaterial3d(material)));
                    }
                    None => {
                        entity.insert(Visibility::Hidden);
                    }
                }
            }

            spawn_decoration(parent, &layout.house, house_mesh, house_material);
            spawn_decoration(parent, &layout.roof, roof_mesh, roof_material);

            for (placement, (mesh, material, head)) in
                layout.obstacles.iter().zip(obstacle_visuals)
            {
                let mut entity = parent.spawn((
                    Name::new(placement.name()),
                    Obstacle {
                        kind: placement.kind,
                    },
                    RigidBody::Fixed,
                    obstacle_collider(placement.kind.shape()),
                    Mesh3d(mesh),
                    MeshMaterial3d(material),
                    Transform::from_translation(placement.position),
                ));
                placement.filter().insert_physics_filter(&mut entity);

                if let Some((head_mesh, head_material, offset_y)) = head {
                    entity.with_children(|body| {
                        body.spawn((
                            Name::new("pedestrian_head"),
                            Mesh3d(head_mesh),
                            MeshMaterial3d(head_material),
                            Transform::from_xyz(0.0, offset_y, 0.0),
                        ));
                    });
                }
            }
        });

    info!(
        "Built driveway world: {} obstacles placed, {} candidates rejected.",
        layout.obstacles.len(),
        layout.rejected_candidates
    );
}

fn spawn_decoration(
    parent: &mut ChildSpawnerCommands<'_>,
    decoration: &Decoration,
    mesh: Handle<Mesh>,
    material: Handle<StandardMaterial>,
) {
    parent.spawn((
        Name::new(decoration.name),
        Mesh3d(mesh),
        MeshMaterial3d(material),
        Transform::from_translation(decoration.center),
    ));
}

fn despawn_driveway_world(
    mut commands: Commands,
    world_query: Query<Entity, With<DrivewayWorld>>,
) {
    for entity in &world_query {
        commands.entity(entity).try_despawn();
    }
}

/// Walls have no visual.
fn solid_color(piece: &SolidPiece) -> Option<Color> {
    match piece.name {
        "ground" => Some(Color::srgb(0.30, 0.62, 0.28)),
        "road" => Some(Color::srgb(0.29, 0.29, 0.29)),
        GOAL_NAME => Some(Color::srgb(0.67, 0.67, 0.67)),
        _ => None,
    }
}

fn obstacle_color(kind: ObstacleKind) -> Color {
    match kind {
        ObstacleKind::TrashBin => Color::srgb(0.20, 0.35, 0.22),
        ObstacleKind::Bicycle => Color::srgb(0.10, 0.32, 0.80),
        ObstacleKind::Pet => Color::srgb(0.62, 0.42, 0.22),
        ObstacleKind::Pedestrian => Color::srgb(0.85, 0.55, 0.15),
    }
}

fn obstacle_mesh(shape: ObstacleShape) -> Mesh {
    match shape {
        ObstacleShape::Cylinder { radius, height } => Cylinder::new(radius, height).into(),
        ObstacleShape::Cuboid { size } => Cuboid::from_size(size).into(),
        ObstacleShape::Ball { radius } => Sphere::new(radius).into(),
    }
}

fn obstacle_collider(shape: ObstacleShape) -> Collider {
    match shape {
        ObstacleShape::Cylinder { radius, height } => Collider::cylinder(height * 0.5, radius),
        ObstacleShape::Cuboid { size } => {
            Collider::cuboid(size.x * 0.5, size.y * 0.5, size.z * 0.5)
        }
        ObstacleShape::Ball { radius } => Collider::ball(radius),
    }
}

/// Square-based pyramid centered on its bounding box, flat shaded.
fn pyramid_mesh(size: Vec3) -> Mesh {
    let half = size * 0.5;
    let apex = [0.0, half.y, 0.0];
    let corners = [
        [-half.x, -half.y, -half.z],
        [half.x, -half.y, -half.z],
        [half.x, -half.y, half.z],
        [-half.x, -half.y, half.z],
    ];

    let mut positions = Vec::with_capacity(18);
    for index in 0..corners.len() {
        positions.extend([corners[index], apex, corners[(index + 1) % corners.len()]]);
    }
    positions.extend([corners[0], corners[1], corners[2]]);
    positions.extend([corners[0], corners[2], corners[3]]);

    Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    )
    .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
    .with_computed_flat_normals()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::mesh::VertexAttributeValues;

    #[test]
    fn pyramid_faces_point_outward() {
        let mesh = pyramid_mesh(Vec3::new(6.0, 2.0, 5.0));

        let Some(VertexAttributeValues::Float32x3(positions)) =
            mesh.attribute(Mesh::ATTRIBUTE_POSITION)
        else {
            panic!("pyramid positions missing");
        };
        let Some(VertexAttributeValues::Float32x3(normals)) =
            mesh.attribute(Mesh::ATTRIBUTE_NORMAL)
        else {
            panic!("pyramid normals missing");
        };
        assert_eq!(positions.len(), 18);

        for (position, normal) in positions.iter().zip(normals) {
            // Every face normal points away from the centroid of the pyramid.
            let centroid_to_vertex = Vec3::from(*position) - Vec3::new(0.0, -0.5, 0.0);
            assert!(Vec3::from(*normal).dot(centroid_to_vertex) > 0.0);
        }
    }

    #[test]
    fn spawned_world_tags_each_placed_obstacle() {
        let mut config = crate::config::tests::sample_config();
        config.game.obstacles.seed = Some(11);
        let expected: Vec<ObstacleKind> = WorldLayout::generate(
            &config.game.world,
            &config.game.obstacles,
            &mut obstacle_rng(Some(11)),
        )
        .obstacles
        .iter()
        .map(|placement| placement.kind)
        .collect();

        let mut app = App::new();
        app.init_resource::<Assets<Mesh>>()
            .init_resource::<Assets<StandardMaterial>>()
            .insert_resource(config)
            .add_systems(Update, spawn_driveway_world);
        app.update();

        let mut obstacles = app.world_mut().query::<(&Obstacle, &Name)>();
        let mut spawned: Vec<ObstacleKind> = obstacles
            .iter(app.world())
            .map(|(obstacle, name)| {
                assert_eq!(name.as_str(), "obstacle");
                obstacle.kind
            })
            .collect();
        let mut expected = expected;
        spawned.sort_by_key(|kind| kind.label());
        expected.sort_by_key(|kind| kind.label());
        assert!(!spawned.is_empty());
        assert_eq!(spawned, expected);

        let mut roots = app.world_mut().query_filtered::<Entity, With<DrivewayWorld>>();
        assert_eq!(roots.iter(app.world()).count(), 1);
    }

    #[test]
    fn walls_are_the_only_invisible_solids() {
        let config = crate::config::tests::sample_config();
        let layout = WorldLayout::generate(
            &config.game.world,
            &config.game.obstacles,
            &mut obstacle_rng(Some(1)),
        );

        for piece in layout.solid_pieces() {
            let is_wall = piece.name.starts_with("wall_");
            assert_eq!(solid_color(piece).is_none(), is_wall, "{}", piece.name);
        }
    }
}
