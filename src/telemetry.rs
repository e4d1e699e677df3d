use crate::direction::{ByDirection, Direction};
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashSet;

/// The identifier of a simulated vehicle.
pub type VehicleName = String;

/// The traffic observed at a junction over part of a control cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct JunctionTrafficInfo {
    /// The number of ticks merged so far.
    pub step_count: usize,
    /// Traffic on the edges entering the junction.
    pub incoming: ByDirection<DirectionalTraffic>,
    /// Traffic on the edges leaving the junction.
    pub outgoing: ByDirection<DirectionalTraffic>,
    /// The share of each upstream neighbour's traffic that flowed into
    /// this junction. Only populated when a cycle is closed.
    pub transfer_rate: ByDirection<f64>,
}

/// The traffic on the edge in one direction of a junction.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DirectionalTraffic {
    /// The mean of the edge's per-tick mean speed, in m/s.
    pub mean_speed: f64,
    /// Every vehicle seen on the edge so far.
    pub vehicles: HashSet<VehicleName>,
}

impl JunctionTrafficInfo {
    /// Creates a single-tick sample. Directions without an edge keep a
    /// zero speed and no vehicles.
    pub fn sample(
        incoming: ByDirection<DirectionalTraffic>,
        outgoing: ByDirection<DirectionalTraffic>,
    ) -> Self {
        Self {
            step_count: 0,
            incoming,
            outgoing,
            transfer_rate: Default::default(),
        }
    }

    /// Merges one tick's `sample` into this running aggregate.
    ///
    /// Each mean speed becomes the arithmetic mean over all merged ticks,
    /// each vehicle set grows to the union of all observed vehicles, and
    /// the step count increases by exactly one. Must be called once per
    /// tick, in tick order.
    pub fn merge(&mut self, sample: &JunctionTrafficInfo) {
        let steps = self.step_count as f64;
        let slots = self.incoming.iter_mut().chain(self.outgoing.iter_mut());
        let samples = sample.incoming.values().chain(sample.outgoing.values());
        for ((_, acc), sample) in slots.zip(samples) {
            acc.mean_speed = (acc.mean_speed * steps + sample.mean_speed) / (steps + 1.0);
            acc.vehicles.extend(sample.vehicles.iter().cloned());
        }
        self.step_count += 1;
    }

    /// The number of distinct vehicles seen entering from the given direction.
    pub fn incoming_vehicles(&self, dir: Direction) -> usize {
        self.incoming[dir].vehicles.len()
    }

    /// The number of distinct vehicles seen on any incoming edge.
    pub fn total_incoming_vehicles(&self) -> usize {
        self.incoming
            .values()
            .flat_map(|traffic| traffic.vehicles.iter())
            .unique()
            .count()
    }
}
