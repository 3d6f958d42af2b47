pub mod control;

use crate::assets::AssetRegistry;
use crate::config::{GameConfig, VehicleConfig};
use crate::gameplay::collision::BodyFilter;
use crate::gameplay::contact::{RunPhase, CAR_NAME};
use crate::gameplay::CarPositionUpdated;
use crate::states::GameState;
use bevy::asset::LoadState;
use bevy::prelude::*;
use bevy_rapier3d::prelude::{
    Collider, ColliderMassProperties, Damping, ExternalForce, Friction, Restitution, RigidBody,
    Sleeping, Velocity,
};
use control::{apply_control, ControlTuning, Direction, TickThrottle};

const PRIMITIVE_BODY_COLOR: Color = Color::srgb(0.93, 0.34, 0.24);

pub struct VehicleGameplayPlugin;

impl Plugin for VehicleGameplayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ControlInput>()
            .init_resource::<HeldDirections>()
            .init_resource::<VehicleInputBindings>()
            .init_resource::<VehicleTickState>()
            .init_resource::<VehicleTelemetry>()
            .add_systems(
                OnEnter(GameState::Playing),
                (reset_vehicle_input, reset_tick_state, spawn_vehicle)
                    .run_if(resource_exists::<GameConfig>),
            )
            .add_systems(OnExit(GameState::Playing), release_vehicle_controls)
            .add_systems(OnEnter(GameState::Menu), despawn_vehicle)
            .add_systems(
                Update,
                (read_vehicle_input, drive_vehicle, update_vehicle_telemetry)
                    .chain()
                    .run_if(in_state(GameState::Playing))
                    .run_if(resource_exists::<GameConfig>),
            )
            .add_systems(Update, fallback_failed_vehicle_model);
    }
}

#[derive(Component)]
pub struct PlayerCar;

/// Collider extents, kept for rebuilding the primitive visual.
#[derive(Component, Debug, Clone, Copy)]
struct VehicleChassis {
    size: Vec3,
}

#[derive(Component)]
struct VehicleModelVisual;

#[derive(Component)]
struct PrimitiveVehicleVisual;

/// Latest directional input. Overwritten on change, read once per tick.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlInput {
    direction: Option<Direction>,
}

impl ControlInput {
    pub fn set_direction(&mut self, direction: Option<Direction>) {
        self.direction = direction;
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }
}

/// Held directions in press order; the last one is active.
#[derive(Resource, Debug, Clone, Default)]
struct HeldDirections(Vec<Direction>);

#[derive(Resource, Debug, Clone)]
struct VehicleInputBindings {
    up: Vec<KeyCode>,
    down: Vec<KeyCode>,
    left: Vec<KeyCode>,
    right: Vec<KeyCode>,
}

impl Default for VehicleInputBindings {
    fn default() -> Self {
        Self {
            up: vec![KeyCode::KeyW, KeyCode::ArrowUp],
            down: vec![KeyCode::KeyS, KeyCode::ArrowDown],
            left: vec![KeyCode::KeyA, KeyCode::ArrowLeft],
            right: vec![KeyCode::KeyD, KeyCode::ArrowRight],
        }
    }
}

impl VehicleInputBindings {
    fn keys(&self, direction: Direction) -> &[KeyCode] {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
            Direction::Left => &self.left,
            Direction::Right => &self.right,
        }
    }
}

const ALL_DIRECTIONS: [Direction; 4] = [
    Direction::Up,
    Direction::Down,
    Direction::Left,
    Direction::Right,
];

#[derive(Resource, Debug, Clone, Default)]
struct VehicleTickState {
    throttle: TickThrottle,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct VehicleTelemetry {
    pub speed_mps: f32,
    pub direction: Option<Direction>,
}

fn reset_vehicle_input(mut control: ResMut<ControlInput>, mut held: ResMut<HeldDirections>) {
    control.set_direction(None);
    held.0.clear();
}

fn reset_tick_state(config: Res<GameConfig>, mut tick_state: ResMut<VehicleTickState>) {
    tick_state.throttle = TickThrottle::new(config.game.app.logic_tick_interval_s);
}

fn spawn_vehicle(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    config: Res<GameConfig>,
    registry: Option<Res<AssetRegistry>>,
    existing_car: Query<Entity, With<PlayerCar>>,
) {
    for entity in &existing_car {
        commands.entity(entity).try_despawn();
    }

    let Some(vehicle) = config.active_vehicle() else {
        error!(
            "Vehicle `{}` is missing from config; no car spawned.",
            config.game.app.default_vehicle
        );
        return;
    };

    let size = Vec3::from_array(vehicle.chassis_size);
    let half = size * 0.5;
    let spawn_position = Vec3::from_array(config.game.world.vehicle_spawn);

    let mut car = commands.spawn((
        Name::new(CAR_NAME),
        PlayerCar,
        VehicleChassis { size },
        RigidBody::Dynamic,
        Collider::cuboid(half.x, half.y, half.z),
        ColliderMassProperties::Mass(vehicle.mass),
        Restitution::coefficient(vehicle.restitution),
        Friction::coefficient(vehicle.friction),
        vehicle_damping(vehicle),
        Velocity::zero(),
        ExternalForce::default(),
        Sleeping::disabled(),
        Transform::from_translation(spawn_position),
        Visibility::default(),
    ));
    BodyFilter::VEHICLE.insert_physics_filter(&mut car);

    let model_scene = vehicle
        .model_id
        .as_deref()
        .and_then(|model_id| registry.as_deref()?.model_scene(model_id));

    match model_scene {
        Some(scene) => {
            car.with_children(|parent| {
                parent.spawn((
                    Name::new("car_model"),
                    VehicleModelVisual,
                    SceneRoot(scene),
                    Transform::default(),
                ));
            });
        }
        None => {
            if let Some(model_id) = vehicle.model_id.as_deref() {
                warn!("Vehicle model `{model_id}` unavailable; using primitive body.");
            }
            let visual = primitive_visual(&mut meshes, &mut materials, size);
            car.with_children(|parent| {
                parent.spawn(visual);
            });
        }
    }

    info!(
        "Spawned vehicle `{}` at ({:.1}, {:.1}, {:.1}).",
        vehicle.id, spawn_position.x, spawn_position.y, spawn_position.z
    );
}

/// Rapier has no rolling-friction term, so it slows travel instead.
/// Angular velocity decays only through the per-tick control damping.
fn vehicle_damping(vehicle: &VehicleConfig) -> Damping {
    Damping {
        linear_damping: vehicle.rolling_friction,
        angular_damping: 0.0,
    }
}

fn primitive_visual(
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    size: Vec3,
) -> impl Bundle {
    (
        Name::new("car_body"),
        PrimitiveVehicleVisual,
        Mesh3d(meshes.add(Cuboid::from_size(size))),
        MeshMaterial3d(materials.add(PRIMITIVE_BODY_COLOR)),
        Transform::default(),
    )
}

fn fallback_failed_vehicle_model(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    model_query: Query<(Entity, &SceneRoot, &ChildOf), With<VehicleModelVisual>>,
    chassis_query: Query<&VehicleChassis>,
) {
    for (entity, scene_root, child_of) in &model_query {
        if !matches!(
            asset_server.load_state(scene_root.0.id()),
            LoadState::Failed(_)
        ) {
            continue;
        }

        let car = child_of.parent();
        let Ok(chassis) = chassis_query.get(car) else {
            continue;
        };

        warn!("Vehicle model failed to load; falling back to primitive body.");
        commands.entity(entity).try_despawn();
        let visual = primitive_visual(&mut meshes, &mut materials, chassis.size);
        commands.entity(car).with_children(|parent| {
            parent.spawn(visual);
        });
    }
}

fn read_vehicle_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<VehicleInputBindings>,
    mut held: ResMut<HeldDirections>,
    mut control: ResMut<ControlInput>,
) {
    let newly_pressed: Vec<Direction> = ALL_DIRECTIONS
        .into_iter()
        .filter(|direction| keyboard.any_just_pressed(bindings.keys(*direction).iter().copied()))
        .collect();

    let direction = most_recent_direction(&mut held.0, &newly_pressed, |direction| {
        keyboard.any_pressed(bindings.keys(direction).iter().copied())
    });

    if control.direction() != direction {
        control.set_direction(direction);
    }
}

/// Drops released directions, moves fresh presses to the back, returns the last one.
fn most_recent_direction(
    held: &mut Vec<Direction>,
    newly_pressed: &[Direction],
    is_held: impl Fn(Direction) -> bool,
) -> Option<Direction> {
    held.retain(|direction| is_held(*direction));
    for direction in newly_pressed {
        held.retain(|existing| existing != direction);
        held.push(*direction);
    }
    held.last().copied()
}

fn drive_vehicle(
    time: Res<Time>,
    config: Res<GameConfig>,
    control: Res<ControlInput>,
    phase: Res<RunPhase>,
    mut tick_state: ResMut<VehicleTickState>,
    mut car_query: Query<(&Transform, &mut Velocity, &mut ExternalForce), With<PlayerCar>>,
    mut position_updates: MessageWriter<CarPositionUpdated>,
) {
    if !phase.is_running() {
        return;
    }
    if !tick_state.throttle.should_tick(time.elapsed_secs_f64()) {
        return;
    }

    let Ok((transform, mut velocity, mut external_force)) = car_query.single_mut() else {
        return;
    };

    let tuning = config
        .active_vehicle()
        .map(ControlTuning::from)
        .unwrap_or_default();
    let step = apply_control(
        control.direction(),
        &tuning,
        transform.rotation,
        velocity.linvel,
        velocity.angvel,
    );

    external_force.force = step.force;
    external_force.torque = step.torque;
    velocity.linvel = step.linear_velocity;
    velocity.angvel = step.angular_velocity;

    position_updates.write(CarPositionUpdated(transform.translation));
}

fn update_vehicle_telemetry(
    control: Res<ControlInput>,
    car_query: Query<&Velocity, With<PlayerCar>>,
    mut telemetry: ResMut<VehicleTelemetry>,
) {
    let Ok(velocity) = car_query.single() else {
        return;
    };

    telemetry.speed_mps = velocity.linvel.length();
    telemetry.direction = control.direction();
}

fn release_vehicle_controls(
    mut control: ResMut<ControlInput>,
    mut held: ResMut<HeldDirections>,
    mut car_query: Query<&mut ExternalForce, With<PlayerCar>>,
) {
    control.set_direction(None);
    held.0.clear();
    for mut external_force in &mut car_query {
        *external_force = ExternalForce::default();
    }
}

fn despawn_vehicle(
    mut commands: Commands,
    car_query: Query<Entity, With<PlayerCar>>,
    mut telemetry: ResMut<VehicleTelemetry>,
) {
    for entity in &car_query {
        commands.entity(entity).try_despawn();
    }
    *telemetry = VehicleTelemetry::default();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use crate::gameplay::contact::RunOutcome;
    use bevy::ecs::message::Messages;
    use std::time::Duration;

    const SPAWN: Vec3 = Vec3::new(0.0, 0.5, 7.5);

    fn driver_app(phase: RunPhase, direction: Option<Direction>) -> (App, Entity) {
        let mut control = ControlInput::default();
        control.set_direction(direction);

        let mut app = App::new();
        app.add_message::<CarPositionUpdated>()
            .insert_resource(Time::<()>::default())
            .insert_resource(sample_config())
            .insert_resource(control)
            .insert_resource(phase)
            .init_resource::<VehicleTickState>()
            .add_systems(Update, drive_vehicle);

        let car = app
            .world_mut()
            .spawn((
                PlayerCar,
                Transform::from_translation(SPAWN),
                Velocity {
                    linvel: Vec3::ZERO,
                    angvel: Vec3::new(0.0, 1.0, 0.0),
                },
                ExternalForce::default(),
            ))
            .id();
        (app, car)
    }

    fn published_positions(app: &App) -> Vec<Vec3> {
        app.world()
            .resource::<Messages<CarPositionUpdated>>()
            .iter_current_update_messages()
            .map(|message| message.0)
            .collect()
    }

    fn advance_clock(app: &mut App, millis: u64) {
        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_millis(millis));
    }

    #[test]
    fn ended_run_leaves_car_untouched() {
        let (mut app, car) = driver_app(
            RunPhase::Ended(RunOutcome::CollidedWithObstacle),
            Some(Direction::Up),
        );

        for _ in 0..3 {
            advance_clock(&mut app, 20);
            app.update();
            assert!(published_positions(&app).is_empty());
        }

        let force = app.world().get::<ExternalForce>(car).expect("force");
        assert_eq!(force.force, Vec3::ZERO);
        assert_eq!(force.torque, Vec3::ZERO);
        let velocity = app.world().get::<Velocity>(car).expect("velocity");
        assert_eq!(velocity.angvel, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn running_tick_applies_control_and_publishes_position() {
        let (mut app, car) = driver_app(RunPhase::Running, Some(Direction::Up));

        app.update();

        assert_eq!(published_positions(&app), vec![SPAWN]);
        let force = app.world().get::<ExternalForce>(car).expect("force");
        assert!(force.force.abs_diff_eq(Vec3::new(0.0, 0.0, -0.2), 1e-6));
        assert_eq!(force.torque, Vec3::ZERO);
        let velocity = app.world().get::<Velocity>(car).expect("velocity");
        assert!(velocity.angvel.abs_diff_eq(Vec3::new(0.0, 0.9, 0.0), 1e-6));
    }

    #[test]
    fn frames_faster_than_the_tick_interval_are_skipped() {
        let (mut app, car) = driver_app(RunPhase::Running, Some(Direction::Up));
        app.update();
        assert_eq!(published_positions(&app).len(), 1);

        app.world_mut()
            .resource_mut::<ControlInput>()
            .set_direction(Some(Direction::Down));
        for _ in 0..3 {
            advance_clock(&mut app, 5);
            app.update();
            assert!(published_positions(&app).is_empty());
        }
        let force = app.world().get::<ExternalForce>(car).expect("force");
        assert!(force.force.abs_diff_eq(Vec3::new(0.0, 0.0, -0.2), 1e-6));

        advance_clock(&mut app, 5);
        app.update();

        assert_eq!(published_positions(&app), vec![SPAWN]);
        let force = app.world().get::<ExternalForce>(car).expect("force");
        assert!(force.force.abs_diff_eq(Vec3::new(0.0, 0.0, 0.1), 1e-6));
    }

    #[test]
    fn releasing_controls_zeroes_force_and_input() {
        let mut app = App::new();
        let mut control = ControlInput::default();
        control.set_direction(Some(Direction::Left));
        app.insert_resource(control)
            .insert_resource(HeldDirections(vec![Direction::Up, Direction::Left]))
            .add_systems(Update, release_vehicle_controls);
        let car = app
            .world_mut()
            .spawn((
                PlayerCar,
                ExternalForce {
                    force: Vec3::new(0.0, 0.0, -0.2),
                    torque: Vec3::new(0.0, 0.05, 0.0),
                },
            ))
            .id();

        app.update();

        let force = app.world().get::<ExternalForce>(car).expect("force");
        assert_eq!(force.force, Vec3::ZERO);
        assert_eq!(force.torque, Vec3::ZERO);
        assert_eq!(app.world().resource::<ControlInput>().direction(), None);
        assert!(app.world().resource::<HeldDirections>().0.is_empty());
    }

    #[test]
    fn rolling_friction_slows_travel_not_spin() {
        let config = sample_config();
        let vehicle = config.active_vehicle().expect("vehicle");

        let damping = vehicle_damping(vehicle);

        assert_eq!(damping.linear_damping, vehicle.rolling_friction);
        assert_eq!(damping.angular_damping, 0.0);
    }

    #[test]
    fn latest_press_wins_and_release_falls_back() {
        let mut held = Vec::new();

        let up = most_recent_direction(&mut held, &[Direction::Up], |_| true);
        assert_eq!(up, Some(Direction::Up));

        let left = most_recent_direction(&mut held, &[Direction::Left], |_| true);
        assert_eq!(left, Some(Direction::Left));

        let still_left = most_recent_direction(&mut held, &[], |_| true);
        assert_eq!(still_left, Some(Direction::Left));

        let back_to_up =
            most_recent_direction(&mut held, &[], |direction| direction == Direction::Up);
        assert_eq!(back_to_up, Some(Direction::Up));

        let none = most_recent_direction(&mut held, &[], |_| false);
        assert_eq!(none, None);
        assert!(held.is_empty());
    }

    #[test]
    fn repressing_moves_direction_to_the_front() {
        let mut held = vec![Direction::Up, Direction::Right];

        let active = most_recent_direction(&mut held, &[Direction::Up], |_| true);

        assert_eq!(active, Some(Direction::Up));
        assert_eq!(held, vec![Direction::Right, Direction::Up]);
    }

    #[test]
    fn default_bindings_cover_wasd_and_arrows() {
        let bindings = VehicleInputBindings::default();

        for direction in ALL_DIRECTIONS {
            assert_eq!(bindings.keys(direction).len(), 2);
        }
        assert!(bindings.keys(Direction::Up).contains(&KeyCode::KeyW));
        assert!(bindings.keys(Direction::Right).contains(&KeyCode::ArrowRight));
    }

    #[test]
    fn control_input_holds_latest_value() {
        let mut control = ControlInput::default();
        assert_eq!(control.direction(), None);

        control.set_direction(Some(Direction::Down));
        control.set_direction(Some(Direction::Left));
        assert_eq!(control.direction(), Some(Direction::Left));

        control.set_direction(None);
        assert_eq!(control.direction(), None);
    }
}
