// src/control/mod.rs
//
// Control layer: turns perception output into motor commands.
//
// Signal flow:
//   Blob -> SteeringController -> MotorCommand
//   Blob -> StallMonitor -> recovery events
//
// Steering is stateless proportional differential mixing; the stall
// monitor is the only stateful piece and owns the tracking/recovery
// state machine.

pub mod stall;
pub mod steering;

pub use stall::{StallEvent, StallMonitor};
pub use steering::SteeringController;
