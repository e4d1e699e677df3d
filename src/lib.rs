pub use cgmath;
pub use config::EnvConfig;
pub use direction::{ByDirection, Direction};
pub use engine::SimulationEngine;
pub use env::TrafficEnv;
pub use error::{Error, Result};
#[cfg(feature = "grid")]
pub use grid::{GridEngine, SignalCommit};
pub use junction::{JunctionId, LaneLayout, Topology};
pub use network::{EdgeMap, Network};
pub use phase::{PhaseSignals, PhaseTable};
pub use record::{CycleRecord, Recorder};
pub use signal::SignalController;
pub use telemetry::{DirectionalTraffic, JunctionTrafficInfo, VehicleName};
pub use transfer::compute_transfer_rate;

mod config;
mod direction;
pub mod engine;
mod env;
mod error;
#[cfg(feature = "grid")]
pub mod grid;
mod junction;
mod network;
mod phase;
mod record;
mod signal;
mod telemetry;
mod transfer;

/// Integer grid coordinates of a junction.
pub type Coord = cgmath::Point2<i32>;
