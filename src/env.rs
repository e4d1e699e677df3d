use crate::config::EnvConfig;
use crate::direction::Direction;
use crate::engine::SimulationEngine;
use crate::error::Result;
use crate::junction::JunctionId;
use crate::network::Network;
use crate::phase::PhaseTable;
use crate::record::{CycleRecord, Recorder};
use crate::signal::SignalController;
use std::collections::BTreeMap;

/// A traffic control environment wrapping a simulation engine.
///
/// Records junction telemetry in cycles and applies phase changes safely.
/// The engine is shut down exactly once, either by [Self::close] or when
/// the environment is dropped, so that no simulator is left running on
/// an error path.
pub struct TrafficEnv<'a, E: SimulationEngine> {
    /// The simulation engine.
    engine: E,
    /// The control loop timing.
    config: EnvConfig,
    /// Accumulates the active cycle's telemetry.
    recorder: Recorder,
    /// Drives the traffic lights.
    signals: SignalController<'a>,
    /// Whether the engine has been shut down.
    closed: bool,
}

impl<'a, E: SimulationEngine> TrafficEnv<'a, E> {
    /// Loads the network from the engine and commits phase 0 at every junction.
    ///
    /// The engine is shut down if initialization fails.
    pub fn initialize(mut engine: E, table: &'a PhaseTable, config: EnvConfig) -> Result<Self> {
        let setup = config.validate().and_then(|_| {
            let network = Network::load(&engine)?;
            let mut signals = SignalController::new(table, config.caution_duration);
            signals.initialize(&mut engine, network.junctions())?;
            Ok((Recorder::new(network), signals))
        });
        match setup {
            Ok((recorder, signals)) => {
                log::info!(
                    "traffic environment started with {} junctions",
                    recorder.network().junctions().len()
                );
                Ok(Self {
                    engine,
                    config,
                    recorder,
                    signals,
                    closed: false,
                })
            }
            Err(err) => {
                if let Err(shutdown_err) = engine.shutdown() {
                    log::warn!("failed to shut down engine: {}", shutdown_err);
                }
                Err(err)
            }
        }
    }

    /// Advances `n` ticks and returns the finalized telemetry of the cycle.
    pub fn run_cycle(&mut self, n: usize) -> Result<CycleRecord> {
        let record = self.recorder.run_cycle(&mut self.engine, n)?;
        log::info!("cycle of {} ticks recorded", n);
        Ok(record)
    }

    /// Runs one control cycle, leaving room for the caution interval.
    pub fn next_cycle(&mut self) -> Result<CycleRecord> {
        self.run_cycle(self.config.recording_ticks())
    }

    /// Moves junctions to new phases, passing through a shared caution interval.
    pub fn request_phase_change(&mut self, requests: &BTreeMap<JunctionId, usize>) -> Result<()> {
        self.signals
            .request_phase_change(&mut self.engine, &mut self.recorder, requests)
    }

    /// The number of distinct vehicles that entered a junction so far in the active cycle.
    pub fn total_vehicles_at_junction(&self, junction: &JunctionId) -> usize {
        self.recorder
            .record()
            .get(junction)
            .map_or(0, |info| info.total_incoming_vehicles())
    }

    /// The controlled neighbours of a junction, keyed by their direction.
    pub fn connected_junctions(
        &self,
        junction: &JunctionId,
    ) -> Result<BTreeMap<Direction, JunctionId>> {
        self.recorder.network().connected(&self.engine, junction)
    }

    /// The last committed phase of a junction.
    pub fn current_phase(&self, junction: &JunctionId) -> Option<usize> {
        self.signals.phase(junction)
    }

    /// The controlled junctions.
    pub fn junctions(&self) -> &[JunctionId] {
        self.recorder.network().junctions()
    }

    /// The telemetry of the active, unfinished cycle.
    pub fn record(&self) -> &CycleRecord {
        self.recorder.record()
    }

    /// The control loop timing.
    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Gets the underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Shuts down the engine.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.engine.shutdown()?;
        log::info!("traffic environment closed");
        Ok(())
    }
}

impl<'a, E: SimulationEngine> Drop for TrafficEnv<'a, E> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match self.engine.shutdown() {
            Ok(()) => log::info!("traffic environment closed"),
            Err(err) => log::warn!("failed to shut down engine: {}", err),
        }
    }
}
