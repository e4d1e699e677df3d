use crate::engine::SimulationEngine;
use crate::error::Result;
use crate::junction::JunctionId;
use crate::network::Network;
use crate::telemetry::JunctionTrafficInfo;
use crate::transfer::compute_transfer_rate;
use serde::Serialize;
use std::collections::BTreeMap;

/// The telemetry of every controlled junction over one control cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CycleRecord {
    junctions: BTreeMap<JunctionId, JunctionTrafficInfo>,
}

impl CycleRecord {
    /// Creates an empty record for the given junctions.
    pub fn new(junctions: &[JunctionId]) -> Self {
        Self {
            junctions: junctions
                .iter()
                .map(|id| (id.clone(), JunctionTrafficInfo::default()))
                .collect(),
        }
    }

    /// Gets the telemetry of a junction.
    pub fn get(&self, junction: &JunctionId) -> Option<&JunctionTrafficInfo> {
        self.junctions.get(junction)
    }

    /// Iterates over the junctions and their telemetry.
    pub fn iter(&self) -> impl Iterator<Item = (&JunctionId, &JunctionTrafficInfo)> {
        self.junctions.iter()
    }

    /// The number of junctions in the record.
    pub fn len(&self) -> usize {
        self.junctions.len()
    }

    /// Whether the record has no junctions.
    pub fn is_empty(&self) -> bool {
        self.junctions.is_empty()
    }
}

/// Ticks the simulation and accumulates the telemetry of the active cycle.
pub struct Recorder {
    /// The network being recorded.
    network: Network,
    /// The record of the active cycle.
    record: CycleRecord,
}

impl Recorder {
    /// Creates a recorder with an empty record for every controlled junction.
    pub fn new(network: Network) -> Self {
        let record = CycleRecord::new(network.junctions());
        Self { network, record }
    }

    /// Gets the network being recorded.
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Gets the record of the active cycle.
    pub fn record(&self) -> &CycleRecord {
        &self.record
    }

    /// Advances the simulation by one tick and merges the resulting
    /// measurements into the active record.
    pub fn tick<E: SimulationEngine + ?Sized>(&mut self, engine: &mut E) -> Result<()> {
        engine.advance()?;
        let engine: &E = engine;
        let samples = self
            .network
            .junctions()
            .iter()
            .map(|id| Ok((id, self.network.sample(engine, id)?)))
            .collect::<Result<Vec<_>>>()?;
        for (id, sample) in samples {
            if let Some(info) = self.record.junctions.get_mut(id) {
                info.merge(&sample);
            }
        }
        Ok(())
    }

    /// Advances the simulation by `n` ticks without closing the cycle.
    pub fn run_ticks<E: SimulationEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        n: usize,
    ) -> Result<()> {
        for _ in 0..n {
            self.tick(engine)?;
        }
        Ok(())
    }

    /// Advances the simulation by `n` ticks, then closes the cycle.
    ///
    /// Returns the finalized record, including transfer rates, and starts
    /// a fresh record for the next cycle.
    pub fn run_cycle<E: SimulationEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        n: usize,
    ) -> Result<CycleRecord> {
        self.run_ticks(engine, n)?;
        self.compute_transfer_rates(engine)?;
        let fresh = CycleRecord::new(self.network.junctions());
        Ok(std::mem::replace(&mut self.record, fresh))
    }

    /// Computes the transfer rate from every upstream neighbour of every junction.
    fn compute_transfer_rates<E: SimulationEngine + ?Sized>(&mut self, engine: &E) -> Result<()> {
        for id in self.network.junctions() {
            let upstream = self.network.upstream(engine, id)?;
            // Take the local record out so it can't alias an upstream one.
            let mut target = match self.record.junctions.remove(id) {
                Some(target) => target,
                None => continue,
            };
            let res = upstream.iter().try_for_each(|upstream_id| {
                match self.record.junctions.get(upstream_id) {
                    Some(upstream) => {
                        compute_transfer_rate(&mut target, id, upstream_id, upstream).map(|_| ())
                    }
                    None => {
                        log::trace!("{} is not recorded, skipping", upstream_id);
                        Ok(())
                    }
                }
            });
            self.record.junctions.insert(id.clone(), target);
            res?;
        }
        Ok(())
    }
}
