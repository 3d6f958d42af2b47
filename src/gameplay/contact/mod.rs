use crate::gameplay::RunEnded;
use bevy::prelude::*;
use bevy_rapier3d::prelude::CollisionEvent;

pub const CAR_NAME: &str = "car";
pub const OBSTACLE_NAME: &str = "obstacle";
pub const GOAL_NAME: &str = "goal";

pub struct ContactPlugin;

impl Plugin for ContactPlugin {
    fn build(&self, app: &mut App) {
        // Runs in every state so stale events are drained; the phase gates what counts.
        app.init_resource::<RunPhase>()
            .add_systems(Update, resolve_contact_events);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunOutcome {
    Continue,
    CollidedWithObstacle,
    ReachedGoal,
}

impl RunOutcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Continue)
    }
}

#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Ended(RunOutcome),
}

impl RunPhase {
    pub fn start(&mut self) {
        *self = Self::Running;
    }

    pub fn reset(&mut self) {
        *self = Self::Idle;
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Latches the first terminal outcome of a running run. Returns whether this call ended it.
    pub fn conclude(&mut self, outcome: RunOutcome) -> bool {
        if !outcome.is_terminal() || !self.is_running() {
            return false;
        }

        *self = Self::Ended(outcome);
        true
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Ended(RunOutcome::CollidedWithObstacle) => "ended (obstacle)",
            Self::Ended(RunOutcome::ReachedGoal) => "ended (goal)",
            Self::Ended(RunOutcome::Continue) => "ended",
        }
    }
}

/// Classifies a contact by the names of the two bodies, in either order.
pub fn resolve_contact(name_a: &str, name_b: &str) -> RunOutcome {
    let other = if name_a == CAR_NAME {
        name_b
    } else if name_b == CAR_NAME {
        name_a
    } else {
        return RunOutcome::Continue;
    };

    match other {
        OBSTACLE_NAME => RunOutcome::CollidedWithObstacle,
        GOAL_NAME => RunOutcome::ReachedGoal,
        _ => RunOutcome::Continue,
    }
}

fn resolve_contact_events(
    mut collision_events: MessageReader<CollisionEvent>,
    names: Query<&Name>,
    mut phase: ResMut<RunPhase>,
    mut run_ended: MessageWriter<RunEnded>,
) {
    for event in collision_events.read() {
        let CollisionEvent::Started(entity_a, entity_b, _) = event else {
            continue;
        };
        let (Ok(name_a), Ok(name_b)) = (names.get(*entity_a), names.get(*entity_b)) else {
            continue;
        };

        let outcome = resolve_contact(name_a.as_str(), name_b.as_str());
        if phase.conclude(outcome) {
            info!("Run ended: {outcome:?} ({name_a} touched {name_b}).");
            run_ended.write(RunEnded { outcome });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::message::Messages;
    use bevy_rapier3d::rapier::geometry::CollisionEventFlags;

    #[test]
    fn resolution_is_order_independent() {
        assert_eq!(
            resolve_contact("car", "obstacle"),
            RunOutcome::CollidedWithObstacle
        );
        assert_eq!(
            resolve_contact("obstacle", "car"),
            RunOutcome::CollidedWithObstacle
        );
        assert_eq!(resolve_contact("car", "goal"), RunOutcome::ReachedGoal);
        assert_eq!(resolve_contact("goal", "car"), RunOutcome::ReachedGoal);
    }

    #[test]
    fn unrelated_pairs_are_ignored() {
        for (a, b) in [
            ("car", "wall_left"),
            ("obstacle", "goal"),
            ("road", "ground"),
            ("car", "car"),
            ("", "obstacle"),
        ] {
            assert_eq!(resolve_contact(a, b), RunOutcome::Continue, "{a}/{b}");
        }
    }

    #[test]
    fn first_terminal_outcome_wins() {
        let mut phase = RunPhase::default();
        phase.start();

        assert!(!phase.conclude(resolve_contact("car", "road")));
        assert!(phase.is_running());
        assert!(phase.conclude(resolve_contact("car", "obstacle")));
        assert!(!phase.conclude(resolve_contact("car", "goal")));
        assert_eq!(phase, RunPhase::Ended(RunOutcome::CollidedWithObstacle));
    }

    #[test]
    fn idle_phase_ignores_contacts() {
        let mut phase = RunPhase::Idle;
        assert!(!phase.conclude(RunOutcome::ReachedGoal));
        assert_eq!(phase, RunPhase::Idle);
    }

    #[test]
    fn resolver_system_emits_one_outcome_per_run() {
        let mut app = App::new();
        app.add_message::<CollisionEvent>()
            .add_message::<RunEnded>()
            .insert_resource(RunPhase::Running)
            .add_systems(Update, resolve_contact_events);

        let car = app.world_mut().spawn(Name::new(CAR_NAME)).id();
        let goal = app.world_mut().spawn(Name::new(GOAL_NAME)).id();
        let obstacle = app.world_mut().spawn(Name::new(OBSTACLE_NAME)).id();
        let unnamed = app.world_mut().spawn_empty().id();

        let world = app.world_mut();
        world.write_message(CollisionEvent::Started(
            unnamed,
            car,
            CollisionEventFlags::SENSOR,
        ));
        world.write_message(CollisionEvent::Stopped(
            obstacle,
            car,
            CollisionEventFlags::SENSOR,
        ));
        world.write_message(CollisionEvent::Started(
            goal,
            car,
            CollisionEventFlags::SENSOR,
        ));
        world.write_message(CollisionEvent::Started(
            car,
            obstacle,
            CollisionEventFlags::SENSOR,
        ));
        app.update();

        let outcomes: Vec<RunOutcome> = app
            .world()
            .resource::<Messages<RunEnded>>()
            .iter_current_update_messages()
            .map(|message| message.outcome)
            .collect();
        assert_eq!(outcomes, vec![RunOutcome::ReachedGoal]);
        assert_eq!(
            *app.world().resource::<RunPhase>(),
            RunPhase::Ended(RunOutcome::ReachedGoal)
        );
    }
}
