pub mod collision;
pub mod contact;
pub mod vehicle;
pub mod world;

use bevy::prelude::*;
use contact::{ContactPlugin, RunOutcome};
use vehicle::VehicleGameplayPlugin;
use world::DrivewayWorldPlugin;

/// Car world position, published once per logical tick while a run is live.
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct CarPositionUpdated(pub Vec3);

/// Terminal result of a run. Written at most once per run.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunEnded {
    pub outcome: RunOutcome,
}

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<CarPositionUpdated>()
            .add_message::<RunEnded>()
            .add_plugins(DrivewayWorldPlugin)
            .add_plugins(VehicleGameplayPlugin)
            .add_plugins(ContactPlugin);
    }
}
