use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "config";

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreStartup, load_game_config)
            .add_systems(Update, reload_game_config_hotkey);
    }
}

fn load_game_config(mut commands: Commands) {
    let config = GameConfig::load_from_dir(Path::new(CONFIG_DIR)).unwrap_or_else(|error| {
        panic!("failed to load configuration from `{CONFIG_DIR}`: {error}");
    });

    log_config_summary("Loaded", &config);
    info!("Press F5 to hot-reload config files from `{CONFIG_DIR}`; changes apply to the next run.");

    commands.insert_resource(config);
}

fn reload_game_config_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let Some(mut current_config) = game_config else {
        warn!("Config hot-reload requested, but `GameConfig` resource is not initialized yet.");
        return;
    };

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Hot-reloaded", &current_config);
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    info!(
        "{prefix} config: vehicle `{}`, {} obstacle candidates, {} vehicles, {} models.",
        config.game.app.default_vehicle,
        config.game.obstacles.count,
        config.vehicles_by_id.len(),
        config.model_assets_by_id.len()
    );
}

#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub game: GameFile,
    pub vehicles: VehiclesFile,
    pub assets: AssetsFile,
    pub vehicles_by_id: HashMap<String, VehicleConfig>,
    pub model_assets_by_id: HashMap<String, ModelAssetConfig>,
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let vehicles: VehiclesFile = read_toml(&config_dir.join("vehicles.toml"))?;
        let assets: AssetsFile = read_toml(&config_dir.join("assets.toml"))?;

        let config = Self {
            vehicles_by_id: to_index("vehicles.toml::vehicles", &vehicles.vehicles)?,
            model_assets_by_id: to_index("assets.toml::models", &assets.models)?,
            game,
            vehicles,
            assets,
        };

        config.validate_references()?;
        Ok(config)
    }

    /// The vehicle named by `game.toml::app.default_vehicle`; validation guarantees it exists.
    pub fn active_vehicle(&self) -> Option<&VehicleConfig> {
        self.vehicles_by_id.get(&self.game.app.default_vehicle)
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        if !self
            .vehicles_by_id
            .contains_key(&self.game.app.default_vehicle)
        {
            return Err(ConfigError::Validation(format!(
                "game.toml::app.default_vehicle references unknown vehicle id `{}`",
                self.game.app.default_vehicle
            )));
        }

        if self.game.app.logic_tick_interval_s < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::app.logic_tick_interval_s must be >= 0".to_string(),
            ));
        }

        let world = &self.game.world;
        if world.road_width <= 0.0 || world.road_length <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::world road dimensions must be > 0".to_string(),
            ));
        }
        if world.goal_width <= 0.0 || world.goal_length <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::world goal dimensions must be > 0".to_string(),
            ));
        }
        if world.wall_thickness <= 0.0 || world.wall_height <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::world wall dimensions must be > 0".to_string(),
            ));
        }
        if world.goal_z + world.goal_length * 0.5 > world.road_length * 0.5 {
            return Err(ConfigError::Validation(
                "game.toml::world.goal_z must place the goal at the far (-z) end of the road"
                    .to_string(),
            ));
        }

        let obstacles = &self.game.obstacles;
        if obstacles.x_min > obstacles.x_max {
            return Err(ConfigError::Validation(
                "game.toml::obstacles x range is inverted (x_min > x_max)".to_string(),
            ));
        }
        if obstacles.z_min > obstacles.z_max {
            return Err(ConfigError::Validation(
                "game.toml::obstacles z range is inverted (z_min > z_max)".to_string(),
            ));
        }
        if obstacles.spawn_lane_half_width < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::obstacles.spawn_lane_half_width must be >= 0".to_string(),
            ));
        }

        for (index, vehicle) in self.vehicles.vehicles.iter().enumerate() {
            if vehicle.mass <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].mass must be > 0"
                )));
            }
            if vehicle.move_speed <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].move_speed must be > 0"
                )));
            }
            if !(0.0..=1.0).contains(&vehicle.reverse_speed_factor) {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].reverse_speed_factor must be in [0, 1]"
                )));
            }
            if vehicle.rotation_speed < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].rotation_speed must be >= 0"
                )));
            }
            if !(0.0 < vehicle.angular_damping && vehicle.angular_damping <= 1.0) {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].angular_damping must be in (0, 1]"
                )));
            }
            if vehicle.max_speed <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].max_speed must be > 0"
                )));
            }
            if vehicle.chassis_size.iter().any(|extent| *extent <= 0.0) {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].chassis_size extents must be > 0"
                )));
            }
            if let Some(model_id) = &vehicle.model_id {
                if !self.model_assets_by_id.contains_key(model_id) {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].model_id references unknown model `{model_id}`"
                    )));
                }
            }
        }

        for (index, model) in self.assets.models.iter().enumerate() {
            if model.scene_path.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "assets.toml::models[{index}].scene_path cannot be empty"
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    pub world: WorldConfig,
    pub obstacles: ObstacleFieldConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub default_vehicle: String,
    pub debug_overlay: bool,
    #[serde(default = "default_logic_tick_interval_s")]
    pub logic_tick_interval_s: f32,
}

fn default_logic_tick_interval_s() -> f32 {
    0.016
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorldConfig {
    pub road_width: f32,
    pub road_length: f32,
    #[serde(default = "default_road_height")]
    pub road_height: f32,
    pub goal_width: f32,
    pub goal_length: f32,
    #[serde(default = "default_goal_height")]
    pub goal_height: f32,
    pub goal_z: f32,
    pub wall_thickness: f32,
    pub wall_height: f32,
    #[serde(default = "default_ground_top_y")]
    pub ground_top_y: f32,
    #[serde(default = "default_ground_half_extent")]
    pub ground_half_extent: f32,
    pub vehicle_spawn: [f32; 3],
}

fn default_road_height() -> f32 {
    0.1
}

fn default_goal_height() -> f32 {
    0.11
}

fn default_ground_top_y() -> f32 {
    -0.5
}

fn default_ground_half_extent() -> f32 {
    100.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObstacleFieldConfig {
    pub count: u32,
    pub x_min: f32,
    pub x_max: f32,
    pub z_min: f32,
    pub z_max: f32,
    pub spawn_lane_half_width: f32,
    pub spawn_lane_min_z: f32,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehiclesFile {
    pub vehicles: Vec<VehicleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleConfig {
    pub id: String,
    pub mass: f32,
    pub restitution: f32,
    pub friction: f32,
    pub rolling_friction: f32,
    pub chassis_size: [f32; 3],
    pub move_speed: f32,
    #[serde(default = "default_reverse_speed_factor")]
    pub reverse_speed_factor: f32,
    pub rotation_speed: f32,
    pub angular_damping: f32,
    pub max_speed: f32,
    #[serde(default)]
    pub model_id: Option<String>,
}

fn default_reverse_speed_factor() -> f32 {
    0.5
}

impl HasId for VehicleConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssetsFile {
    #[serde(default)]
    pub models: Vec<ModelAssetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelAssetConfig {
    pub id: String,
    pub scene_path: String,
}

impl HasId for ModelAssetConfig {
    fn id(&self) -> &str {
        &self.id
    }
}
