use crate::gameplay::contact::{RunOutcome, RunPhase};
use crate::gameplay::{CarPositionUpdated, RunEnded};
use bevy::prelude::*;
use std::f32::consts::PI;

const CAMERA_POSITION: Vec3 = Vec3::new(0.0, 10.0, 15.0);
const CAMERA_PITCH_RAD: f32 = -PI / 6.0;
const SKY_COLOR: Color = Color::srgb(0.62, 0.80, 0.95);

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum GameState {
    #[default]
    Menu,
    Playing,
    GameOver,
    Success,
}

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Scoreboard>()
            .insert_resource(ClearColor(SKY_COLOR))
            .add_systems(Startup, setup_camera_and_lights)
            .add_systems(OnEnter(GameState::Menu), enter_menu)
            .add_systems(OnExit(GameState::Menu), cleanup_screen_overlay)
            .add_systems(Update, menu_controls.run_if(in_state(GameState::Menu)))
            .add_systems(OnEnter(GameState::Playing), enter_playing)
            .add_systems(
                Update,
                (record_car_position, apply_run_outcome, playing_controls)
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(OnEnter(GameState::GameOver), enter_game_over)
            .add_systems(OnExit(GameState::GameOver), cleanup_screen_overlay)
            .add_systems(OnEnter(GameState::Success), enter_success)
            .add_systems(OnExit(GameState::Success), cleanup_screen_overlay)
            .add_systems(
                Update,
                result_controls
                    .run_if(in_state(GameState::GameOver).or(in_state(GameState::Success))),
            );
    }
}

#[derive(Component)]
struct ScreenOverlayRoot;

/// Session counters. Nothing here outlives the process.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct Scoreboard {
    pub score: u32,
    pub attempts: u32,
    pub car_position: Vec3,
}

impl Scoreboard {
    pub fn start_run(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// State to move to for a run outcome; a reached goal scores before the transition.
    pub fn record_outcome(&mut self, outcome: RunOutcome) -> Option<GameState> {
        match outcome {
            RunOutcome::Continue => None,
            RunOutcome::CollidedWithObstacle => Some(GameState::GameOver),
            RunOutcome::ReachedGoal => {
                self.score = self.score.saturating_add(1);
                Some(GameState::Success)
            }
        }
    }
}

fn setup_camera_and_lights(mut commands: Commands) {
    commands.spawn((
        Name::new("MainCamera"),
        Camera3d::default(),
        Transform::from_translation(CAMERA_POSITION)
            .with_rotation(Quat::from_rotation_x(CAMERA_PITCH_RAD)),
    ));

    commands.spawn((
        Name::new("SunLight"),
        DirectionalLight {
            illuminance: 12_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(10.0, 20.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        Name::new("RimLight"),
        DirectionalLight {
            illuminance: 2_500.0,
            color: Color::srgb(0.80, 0.88, 1.00),
            ..default()
        },
        Transform::from_xyz(-15.0, 10.0, -15.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

fn enter_menu(mut commands: Commands, scoreboard: Res<Scoreboard>, mut phase: ResMut<RunPhase>) {
    phase.reset();

    let body = format!(
        "Score: {}\nAttempts: {}\n\nSteer with WASD or the arrow keys.\nReach the driveway, avoid everything on the road.\n\nSpace / Enter - Start",
        scoreboard.score, scoreboard.attempts
    );
    spawn_screen_overlay(&mut commands, "Car-Free Driveway", &body);

    info!("Entered state: Menu");
}

fn menu_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut scoreboard: ResMut<Scoreboard>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.any_just_pressed([KeyCode::Space, KeyCode::Enter]) {
        scoreboard.start_run();
        next_state.set(GameState::Playing);
    }
}

fn enter_playing(mut phase: ResMut<RunPhase>, scoreboard: Res<Scoreboard>) {
    phase.start();
    info!("Entered state: Playing (attempt {})", scoreboard.attempts);
}

fn record_car_position(
    mut position_updates: MessageReader<CarPositionUpdated>,
    mut scoreboard: ResMut<Scoreboard>,
) {
    if let Some(CarPositionUpdated(position)) = position_updates.read().last() {
        scoreboard.car_position = *position;
    }
}

fn apply_run_outcome(
    mut run_ended: MessageReader<RunEnded>,
    mut scoreboard: ResMut<Scoreboard>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    for message in run_ended.read() {
        if let Some(state) = scoreboard.record_outcome(message.outcome) {
            next_state.set(state);
            break;
        }
    }
}

fn playing_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        info!("Run abandoned.");
        next_state.set(GameState::Menu);
    }
}

fn enter_game_over(mut commands: Commands, scoreboard: Res<Scoreboard>) {
    let body = format!(
        "You hit something on the road.\n\nScore: {}\n\nSpace / Enter / Esc - Menu",
        scoreboard.score
    );
    spawn_screen_overlay(&mut commands, "GAME OVER", &body);
    info!("Entered state: GameOver");
}

fn enter_success(mut commands: Commands, scoreboard: Res<Scoreboard>) {
    let body = format!(
        "Parked in the driveway.\n\nScore: {}\n\nSpace / Enter / Esc - Menu",
        scoreboard.score
    );
    spawn_screen_overlay(&mut commands, "SUCCESS", &body);
    info!("Entered state: Success (score {})", scoreboard.score);
}

fn result_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.any_just_pressed([KeyCode::Space, KeyCode::Enter, KeyCode::Escape]) {
        next_state.set(GameState::Menu);
    }
}

fn spawn_screen_overlay(commands: &mut Commands, title: &str, body: &str) {
    commands
        .spawn((
            Name::new("ScreenOverlay"),
            ScreenOverlayRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(Color::srgba(0.01, 0.02, 0.03, 0.55)),
            ZIndex(300),
        ))
        .with_children(|parent| {
            parent
                .spawn((
                    Node {
                        min_width: Val::Px(420.0),
                        flex_direction: FlexDirection::Column,
                        row_gap: Val::Px(10.0),
                        padding: UiRect::all(Val::Px(16.0)),
                        border: UiRect::all(Val::Px(1.0)),
                        ..default()
                    },
                    BackgroundColor(Color::srgba(0.08, 0.10, 0.13, 0.96)),
                    BorderColor::all(Color::srgba(0.56, 0.62, 0.68, 0.92)),
                ))
                .with_children(|panel| {
                    panel.spawn((
                        Text::new(title),
                        TextFont {
                            font_size: 48.0,
                            ..default()
                        },
                        TextColor(Color::srgb(0.94, 0.97, 1.00)),
                    ));
                    panel.spawn((
                        Text::new(body),
                        TextFont {
                            font_size: 22.0,
                            ..default()
                        },
                        TextColor(Color::srgb(0.90, 0.94, 0.98)),
                    ));
                });
        });
}

fn cleanup_screen_overlay(
    mut commands: Commands,
    overlay_query: Query<Entity, With<ScreenOverlayRoot>>,
) {
    for entity in &overlay_query {
        commands.entity(entity).try_despawn();
    }
}
