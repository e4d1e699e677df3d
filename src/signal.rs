use crate::engine::SimulationEngine;
use crate::error::{Error, Result};
use crate::junction::JunctionId;
use crate::phase::PhaseTable;
use crate::record::Recorder;
use std::collections::{BTreeMap, HashMap};

/// Drives the traffic lights of the network through safe phase transitions.
///
/// A change between two differing phases always passes through the
/// caution signal of the phase being left. The caution interval is
/// shared by every junction changing in the same request.
pub struct SignalController<'a> {
    /// The signal strings of every phase.
    table: &'a PhaseTable,
    /// The number of ticks the caution signal is shown for.
    caution_duration: usize,
    /// The last committed phase of each junction.
    phases: HashMap<JunctionId, usize>,
}

/// A pending change of one junction's light.
struct Transition<'t> {
    junction: &'t JunctionId,
    phase: usize,
    signal: &'t str,
    caution: &'t str,
}

impl<'a> SignalController<'a> {
    /// Creates a controller. No signals are set until [Self::initialize] is called.
    pub fn new(table: &'a PhaseTable, caution_duration: usize) -> Self {
        Self {
            table,
            caution_duration,
            phases: HashMap::new(),
        }
    }

    /// Commits phase 0 at every junction, without a caution interval.
    pub fn initialize<E: SimulationEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        junctions: &[JunctionId],
    ) -> Result<()> {
        let table = self.table;
        for junction in junctions {
            let signal = &table.get(junction.topology(), 0)?.signal;
            engine.set_signal_state(&junction.light_id(), signal)?;
            self.phases.insert(junction.clone(), 0);
        }
        log::debug!("initialized {} traffic lights to phase 0", junctions.len());
        Ok(())
    }

    /// Gets the last committed phase of a junction.
    pub fn phase(&self, junction: &JunctionId) -> Option<usize> {
        self.phases.get(junction).copied()
    }

    /// Finds the phase whose signal is showing on a junction's light,
    /// falling back to the last committed phase when none matches.
    fn live_phase(&self, junction: &JunctionId, live: &str) -> Result<usize> {
        let phases = self.table.phases(junction.topology())?;
        if let Some(phase) = phases.iter().position(|p| p.signal == live) {
            return Ok(phase);
        }
        self.phases.get(junction).copied().ok_or_else(|| {
            Error::Config(format!("traffic light at {} was never initialized", junction))
        })
    }

    /// Moves the given junctions to their requested phases.
    ///
    /// Junctions whose live signal already matches the requested phase are
    /// left untouched. The others are switched to the caution signal of the
    /// phase they currently show, the simulation is advanced by the caution
    /// duration while telemetry keeps being recorded, and then the requested
    /// phases are committed.
    /// Every request is resolved against the phase table before any
    /// signal is changed.
    pub fn request_phase_change<E: SimulationEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        recorder: &mut Recorder,
        requests: &BTreeMap<JunctionId, usize>,
    ) -> Result<()> {
        let table = self.table;
        let mut transitions = vec![];
        for (junction, &phase) in requests {
            let signal = &table.get(junction.topology(), phase)?.signal;
            let live = engine.signal_state(&junction.light_id())?;
            if live == *signal {
                continue;
            }
            let current = self.live_phase(junction, &live)?;
            let caution = &table.get(junction.topology(), current)?.caution;
            transitions.push(Transition {
                junction,
                phase,
                signal,
                caution,
            });
        }

        if transitions.is_empty() {
            return Ok(());
        }

        for transition in &transitions {
            log::debug!(
                "{}: caution {:?} before phase {}",
                transition.junction,
                transition.caution,
                transition.phase
            );
            engine.set_signal_state(&transition.junction.light_id(), transition.caution)?;
        }

        recorder.run_ticks(engine, self.caution_duration)?;

        for transition in &transitions {
            engine.set_signal_state(&transition.junction.light_id(), transition.signal)?;
            self.phases.insert(transition.junction.clone(), transition.phase);
        }
        log::debug!("committed {} phase changes", transitions.len());
        Ok(())
    }
}
