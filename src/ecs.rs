pub mod physics;
pub mod scene;
pub mod systems;
pub mod types;

pub use physics::{ContactPhase, PhysicsConfig, PhysicsWorld};
pub use scene::{Scene, SceneComponent};
pub use systems::TimeDelta;
pub use types::*;
