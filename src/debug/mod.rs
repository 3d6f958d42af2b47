use crate::config::{GameConfig, VehicleConfig};
use crate::gameplay::contact::RunPhase;
use crate::gameplay::vehicle::control::ControlTuning;
use crate::gameplay::vehicle::VehicleTelemetry;
use crate::gameplay::world::layout::ObstacleKind;
use crate::gameplay::world::Obstacle;
use crate::states::{GameState, Scoreboard};
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DebugOverlayState>()
            .init_resource::<ControlTuningPanelState>()
            .add_systems(Update, spawn_debug_overlay)
            .add_systems(Update, toggle_debug_overlay)
            .add_systems(Update, toggle_control_tuning_panel)
            .add_systems(Update, sync_debug_overlay_visibility)
            .add_systems(
                Update,
                update_debug_overlay_text.run_if(resource_exists::<GameConfig>),
            )
            .add_systems(
                EguiPrimaryContextPass,
                control_tuning_panel_ui.run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component)]
struct DebugOverlayText;

#[derive(Resource, Debug, Clone, Copy)]
struct DebugOverlayState {
    visible: bool,
}

impl Default for DebugOverlayState {
    fn default() -> Self {
        Self { visible: true }
    }
}

#[derive(Resource, Debug, Default)]
struct ControlTuningPanelState {
    visible: bool,
    source_vehicle_id: String,
    params: Option<ControlTuning>,
    status: String,
}

fn spawn_debug_overlay(
    mut commands: Commands,
    overlay_state: Res<DebugOverlayState>,
    config: Option<Res<GameConfig>>,
    existing_overlay: Query<Entity, With<DebugOverlayText>>,
) {
    if !existing_overlay.is_empty() {
        return;
    }

    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    commands.spawn((
        DebugOverlayText,
        Text::new("debug overlay initializing..."),
        TextFont {
            font_size: 16.0,
            ..default()
        },
        TextColor(Color::srgb(0.92, 0.95, 0.97)),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            top: Val::Px(12.0),
            ..default()
        },
        if overlay_state.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        },
        ZIndex(100),
    ));
}

fn toggle_debug_overlay(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<DebugOverlayState>,
    config: Option<Res<GameConfig>>,
) {
    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    if keyboard.just_pressed(KeyCode::F1) {
        state.visible = !state.visible;
        info!(
            "Debug overlay {}.",
            if state.visible { "shown" } else { "hidden" }
        );
    }
}

fn sync_debug_overlay_visibility(
    state: Res<DebugOverlayState>,
    mut query: Query<&mut Visibility, With<DebugOverlayText>>,
) {
    if !state.is_changed() {
        return;
    }

    let next_visibility = if state.visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };

    for mut visibility in &mut query {
        *visibility = next_visibility;
    }
}

fn update_debug_overlay_text(
    diagnostics: Res<DiagnosticsStore>,
    telemetry: Res<VehicleTelemetry>,
    phase: Res<RunPhase>,
    scoreboard: Res<Scoreboard>,
    game_state: Res<State<GameState>>,
    obstacles: Query<&Obstacle>,
    mut overlay_query: Query<&mut Text, With<DebugOverlayText>>,
) {
    let Ok(mut text) = overlay_query.single_mut() else {
        return;
    };

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|value| value.smoothed())
        .unwrap_or(0.0);
    let position = scoreboard.car_position;

    *text = Text::new(format!(
        "FPS: {fps:>5.1}\nState: {state:?} | Phase: {phase}\nCar: ({x:>6.2}, {y:>5.2}, {z:>6.2})\nSpeed: {speed:>5.2} m/s\nInput: {input}\nObstacles: {obstacles}\nScore: {score} | Attempts: {attempts}\nHotkeys: F1 overlay | F2 tuning | F5 reload config",
        state = game_state.get(),
        phase = phase.label(),
        x = position.x,
        y = position.y,
        z = position.z,
        speed = telemetry.speed_mps,
        input = telemetry
            .direction
            .map(|direction| direction.label())
            .unwrap_or("none"),
        obstacles = obstacle_summary(obstacles.iter().map(|obstacle| obstacle.kind)),
        score = scoreboard.score,
        attempts = scoreboard.attempts,
    ));
}

/// Total count, then a per-kind breakdown of the kinds present.
fn obstacle_summary(kinds: impl Iterator<Item = ObstacleKind>) -> String {
    let mut counts = [0_usize; ObstacleKind::ALL.len()];
    for kind in kinds {
        if let Some(index) = ObstacleKind::ALL.iter().position(|candidate| *candidate == kind) {
            counts[index] += 1;
        }
    }

    let total: usize = counts.iter().sum();
    let breakdown: Vec<String> = ObstacleKind::ALL
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(kind, count)| format!("{} {count}", kind.label()))
        .collect();
    if breakdown.is_empty() {
        return total.to_string();
    }
    format!("{total} ({})", breakdown.join(", "))
}

fn toggle_control_tuning_panel(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut panel_state: ResMut<ControlTuningPanelState>,
    config: Option<Res<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F2) {
        return;
    }

    panel_state.visible = !panel_state.visible;
    if panel_state.visible {
        if let Some(config) = config {
            if let Err(error) = sync_panel_state_from_config(&mut panel_state, &config) {
                panel_state.status = error;
            }
        }
        info!("Control tuning panel shown.");
    } else {
        info!("Control tuning panel hidden.");
    }
}

fn control_tuning_panel_ui(
    mut egui_contexts: EguiContexts,
    mut panel_state: ResMut<ControlTuningPanelState>,
    mut config: ResMut<GameConfig>,
) {
    if !panel_state.visible {
        return;
    }

    if panel_state.params.is_none()
        || panel_state.source_vehicle_id != config.game.app.default_vehicle
    {
        if let Err(error) = sync_panel_state_from_config(&mut panel_state, &config) {
            panel_state.status = error;
            return;
        }
    }

    let Some(mut params) = panel_state.params else {
        return;
    };

    let mut window_open = panel_state.visible;
    let mut params_changed = false;
    let mut revert_clicked = false;
    let status = panel_state.status.clone();
    let vehicle_id = panel_state.source_vehicle_id.clone();

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Control Tuning")
        .open(&mut window_open)
        .resizable(true)
        .default_width(420.0)
        .show(ctx, |ui| {
            ui.label(format!("Active vehicle: {vehicle_id}"));
            ui.label("Edits apply from the next tick; F5 restores the files on disk.");
            ui.separator();

            params_changed |=
                tuning_slider_row(ui, "move_speed", &mut params.move_speed, 0.0..=100.0, 0.01);
            params_changed |= tuning_slider_row(
                ui,
                "reverse_speed_factor",
                &mut params.reverse_speed_factor,
                0.0..=1.0,
                0.01,
            );
            params_changed |= tuning_slider_row(
                ui,
                "rotation_speed",
                &mut params.rotation_speed,
                0.0..=150.0,
                0.005,
            );
            params_changed |= tuning_slider_row(
                ui,
                "angular_damping",
                &mut params.angular_damping,
                0.5..=1.0,
                0.005,
            );
            params_changed |=
                tuning_slider_row(ui, "max_speed", &mut params.max_speed, 0.5..=20.0, 0.05);

            ui.separator();
            if ui.button("Revert to loaded values").clicked() {
                revert_clicked = true;
            }
            if !status.is_empty() {
                ui.label(status);
            }
        });

    panel_state.visible = window_open;

    if revert_clicked {
        panel_state.params = None;
        panel_state.status = "Reverted to config values.".to_string();
        return;
    }

    if params_changed {
        panel_state.params = Some(params);
        match apply_control_tuning_to_runtime_config(&mut config, &vehicle_id, &params) {
            Ok(()) => panel_state.status = "Applied to runtime config.".to_string(),
            Err(error) => panel_state.status = error,
        }
    }
}

fn tuning_slider_row(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    slider_range: std::ops::RangeInclusive<f32>,
    drag_speed: f32,
) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label(label);
        changed |= ui
            .add(egui::Slider::new(value, slider_range).show_value(false))
            .changed();
        changed |= ui
            .add(egui::DragValue::new(value).speed(drag_speed as f64))
            .changed();
    });
    changed
}

fn sync_panel_state_from_config(
    panel_state: &mut ControlTuningPanelState,
    config: &GameConfig,
) -> Result<(), String> {
    let vehicle_id = config.game.app.default_vehicle.clone();
    let Some(vehicle) = config.vehicles_by_id.get(&vehicle_id) else {
        return Err(format!(
            "Control tuning panel: default vehicle `{vehicle_id}` not found in config."
        ));
    };

    panel_state.source_vehicle_id = vehicle_id;
    panel_state.params = Some(ControlTuning::from(vehicle));
    Ok(())
}

fn apply_tuning_to_vehicle(params: &ControlTuning, vehicle: &mut VehicleConfig) {
    vehicle.move_speed = params.move_speed;
    vehicle.reverse_speed_factor = params.reverse_speed_factor;
    vehicle.rotation_speed = params.rotation_speed;
    vehicle.angular_damping = params.angular_damping;
    vehicle.max_speed = params.max_speed;
}

fn apply_control_tuning_to_runtime_config(
    config: &mut GameConfig,
    vehicle_id: &str,
    params: &ControlTuning,
) -> Result<(), String> {
    let Some(vehicle) = config.vehicles_by_id.get_mut(vehicle_id) else {
        return Err(format!(
            "Control tuning panel: runtime vehicle `{vehicle_id}` not found in vehicles_by_id."
        ));
    };
    apply_tuning_to_vehicle(params, vehicle);

    let Some(vehicle) = config
        .vehicles
        .vehicles
        .iter_mut()
        .find(|v| v.id == vehicle_id)
    else {
        return Err(format!(
            "Control tuning panel: runtime vehicle `{vehicle_id}` not found in vehicles list."
        ));
    };
    apply_tuning_to_vehicle(params, vehicle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;

    #[test]
    fn tuning_edits_reach_both_vehicle_tables() {
        let mut config = sample_config();
        let params = ControlTuning {
            move_speed: 0.35,
            max_speed: 7.5,
            ..ControlTuning::default()
        };

        apply_control_tuning_to_runtime_config(&mut config, "hatchback", &params)
            .expect("vehicle exists");

        let active = config.active_vehicle().expect("active vehicle");
        assert_eq!(active.move_speed, 0.35);
        assert_eq!(active.max_speed, 7.5);
        assert_eq!(config.vehicles.vehicles[0].move_speed, 0.35);
        assert_eq!(ControlTuning::from(active), params);
    }

    #[test]
    fn tuning_unknown_vehicle_reports_error() {
        let mut config = sample_config();
        let error = apply_control_tuning_to_runtime_config(
            &mut config,
            "ghost",
            &ControlTuning::default(),
        )
        .expect_err("unknown vehicle");
        assert!(error.contains("ghost"));
    }

    #[test]
    fn obstacle_summary_counts_present_kinds() {
        let summary = obstacle_summary(
            [
                ObstacleKind::Pet,
                ObstacleKind::TrashBin,
                ObstacleKind::Pet,
            ]
            .into_iter(),
        );
        assert_eq!(summary, "3 (trash bin 1, pet 2)");
        assert_eq!(obstacle_summary(std::iter::empty()), "0");
    }

    #[test]
    fn panel_state_syncs_from_active_vehicle() {
        let config = sample_config();
        let mut panel_state = ControlTuningPanelState::default();

        sync_panel_state_from_config(&mut panel_state, &config).expect("sync");

        assert_eq!(panel_state.source_vehicle_id, "hatchback");
        assert_eq!(panel_state.params, Some(ControlTuning::default()));
    }
}
