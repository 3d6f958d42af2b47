use crate::config::{GameConfig, ModelAssetConfig};
use bevy::prelude::*;
use std::collections::HashMap;
use std::path::Path;

const ASSET_ROOT_DIR: &str = "assets";

pub struct AssetRegistryPlugin;

impl Plugin for AssetRegistryPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            sync_asset_registry.run_if(resource_exists::<GameConfig>),
        );
    }
}

fn sync_asset_registry(
    mut commands: Commands,
    config: Res<GameConfig>,
    asset_server: Res<AssetServer>,
    registry: Option<ResMut<AssetRegistry>>,
) {
    if registry.is_some() && !config.is_changed() {
        return;
    }

    let new_registry =
        AssetRegistry::from_config(&config, &asset_server, Path::new(ASSET_ROOT_DIR));

    match registry {
        Some(mut existing_registry) => {
            *existing_registry = new_registry;
            log_asset_registry_summary("Updated", &existing_registry);
        }
        None => {
            log_asset_registry_summary("Initialized", &new_registry);
            commands.insert_resource(new_registry);
        }
    }
}

fn log_asset_registry_summary(prefix: &str, registry: &AssetRegistry) {
    info!(
        "{prefix} asset registry: models {}/{} present on disk.",
        registry.available_model_count(),
        registry.models.len(),
    );

    for (id, entry) in &registry.models {
        if !entry.exists_on_disk {
            warn!(
                "Model `{id}` not found at `{ASSET_ROOT_DIR}/{}`; primitive shapes will stand in.",
                entry.scene_path
            );
        }
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct AssetRegistry {
    pub models: HashMap<String, ModelAssetEntry>,
}

impl AssetRegistry {
    pub fn from_config(config: &GameConfig, asset_server: &AssetServer, asset_root: &Path) -> Self {
        let models = config
            .assets
            .models
            .iter()
            .map(|entry| {
                let model = ModelAssetEntry::from_config(entry, asset_server, asset_root);
                (entry.id.clone(), model)
            })
            .collect();

        Self { models }
    }

    /// Scene handle for a model that exists on disk, `None` when the caller should fall back.
    pub fn model_scene(&self, id: &str) -> Option<Handle<Scene>> {
        self.models.get(id).and_then(|entry| entry.handle.clone())
    }

    fn available_model_count(&self) -> usize {
        self.models
            .values()
            .filter(|entry| entry.exists_on_disk)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct ModelAssetEntry {
    pub scene_path: String,
    pub exists_on_disk: bool,
    pub handle: Option<Handle<Scene>>,
}

impl ModelAssetEntry {
    fn from_config(
        config: &ModelAssetConfig,
        asset_server: &AssetServer,
        asset_root: &Path,
    ) -> Self {
        let exists_on_disk = asset_exists(asset_root, &config.scene_path);
        let handle = exists_on_disk.then(|| asset_server.load(config.scene_path.clone()));

        Self {
            scene_path: config.scene_path.clone(),
            exists_on_disk,
            handle,
        }
    }
}

fn asset_exists(asset_root: &Path, path: &str) -> bool {
    let file_path = path.split('#').next().unwrap_or(path);
    asset_root.join(file_path).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_exists_ignores_sub_asset_label() {
        assert!(asset_exists(Path::new("."), "Cargo.toml#Scene0"));
        assert!(!asset_exists(Path::new("."), "models/not_here.glb#Scene0"));
    }

    #[test]
    fn missing_models_resolve_to_no_scene() {
        let mut registry = AssetRegistry::default();
        registry.models.insert(
            "car".to_string(),
            ModelAssetEntry {
                scene_path: "models/car.glb#Scene0".to_string(),
                exists_on_disk: false,
                handle: None,
            },
        );

        assert!(registry.model_scene("car").is_none());
        assert!(registry.model_scene("unknown").is_none());
        assert_eq!(registry.available_model_count(), 0);
    }
}
