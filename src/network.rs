//! The road network topology, as reported by the simulation engine.

use crate::direction::{ByDirection, Direction};
use crate::engine::{is_internal, SimulationEngine};
use crate::error::Result;
use crate::junction::JunctionId;
use crate::telemetry::{DirectionalTraffic, JunctionTrafficInfo};
use std::collections::{BTreeMap, HashMap};

/// The junctions of the network, parsed once when the network is loaded.
#[derive(Clone, Debug)]
pub struct Network {
    /// Every non-internal node, keyed by its raw id.
    nodes: HashMap<String, JunctionId>,
    /// The controlled junctions, in sorted order.
    junctions: Vec<JunctionId>,
}

/// The edges connecting a junction to its neighbours, by direction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeMap {
    /// The edges entering the junction.
    pub incoming: ByDirection<Option<String>>,
    /// The edges leaving the junction.
    pub outgoing: ByDirection<Option<String>>,
}

impl Network {
    /// Loads the network from the engine.
    ///
    /// Every edge between two distinct junctions is checked here, so that
    /// junctions sharing coordinates are reported before any tick is run.
    pub fn load<E: SimulationEngine + ?Sized>(engine: &E) -> Result<Self> {
        let mut nodes = HashMap::new();
        for raw in engine.junction_ids()? {
            if is_internal(&raw) {
                continue;
            }
            let id = raw.parse::<JunctionId>()?;
            nodes.insert(raw, id);
        }

        let mut junctions = nodes
            .values()
            .filter(|id| !id.is_boundary())
            .cloned()
            .collect::<Vec<_>>();
        junctions.sort();

        let network = Self { nodes, junctions };
        for junction in &network.junctions {
            network.edge_map(engine, junction)?;
        }
        log::debug!(
            "loaded network with {} nodes, {} controlled",
            network.nodes.len(),
            network.junctions.len()
        );
        Ok(network)
    }

    /// The controlled junctions, excluding boundary nodes.
    pub fn junctions(&self) -> &[JunctionId] {
        &self.junctions
    }

    /// Looks up the junction with the given raw id.
    pub fn resolve(&self, raw: &str) -> Result<JunctionId> {
        match self.nodes.get(raw) {
            Some(id) => Ok(id.clone()),
            None => raw.parse(),
        }
    }

    /// Derives the edges connecting a junction to each of its neighbours.
    pub fn edge_map<E: SimulationEngine + ?Sized>(
        &self,
        engine: &E,
        junction: &JunctionId,
    ) -> Result<EdgeMap> {
        let raw = junction.to_string();
        let mut map = EdgeMap::default();

        for edge in engine.outgoing_edges(&raw)? {
            if is_internal(&edge) {
                continue;
            }
            let (_, to) = engine.edge_endpoints(&edge)?;
            if let Some(dir) = self.neighbour_direction(junction, &to)? {
                map.outgoing[dir] = Some(edge);
            }
        }
        for edge in engine.incoming_edges(&raw)? {
            if is_internal(&edge) {
                continue;
            }
            let (from, _) = engine.edge_endpoints(&edge)?;
            if let Some(dir) = self.neighbour_direction(junction, &from)? {
                map.incoming[dir] = Some(edge);
            }
        }
        Ok(map)
    }

    /// Measures one tick of traffic around a junction.
    pub fn sample<E: SimulationEngine + ?Sized>(
        &self,
        engine: &E,
        junction: &JunctionId,
    ) -> Result<JunctionTrafficInfo> {
        let edges = self.edge_map(engine, junction)?;
        let measure = |edge: &Option<String>| -> Result<DirectionalTraffic> {
            match edge {
                Some(edge) => Ok(DirectionalTraffic {
                    mean_speed: engine.edge_mean_speed(edge)?,
                    vehicles: engine.edge_vehicle_ids(edge)?.into_iter().collect(),
                }),
                None => Ok(Default::default()),
            }
        };

        let mut incoming = ByDirection::<DirectionalTraffic>::default();
        let mut outgoing = ByDirection::<DirectionalTraffic>::default();
        for dir in Direction::ALL {
            incoming[dir] = measure(&edges.incoming[dir])?;
            outgoing[dir] = measure(&edges.outgoing[dir])?;
        }
        Ok(JunctionTrafficInfo::sample(incoming, outgoing))
    }

    /// Lists the distinct controlled junctions with an edge into `junction`.
    /// Self-loops and boundary nodes are skipped.
    pub fn upstream<E: SimulationEngine + ?Sized>(
        &self,
        engine: &E,
        junction: &JunctionId,
    ) -> Result<Vec<JunctionId>> {
        let mut upstream = vec![];
        for edge in engine.incoming_edges(&junction.to_string())? {
            if is_internal(&edge) {
                continue;
            }
            let (from, _) = engine.edge_endpoints(&edge)?;
            let from = self.resolve(&from)?;
            if from == *junction || from.is_boundary() || upstream.contains(&from) {
                continue;
            }
            upstream.push(from);
        }
        Ok(upstream)
    }

    /// Finds the controlled junctions reachable over a single outgoing edge,
    /// keyed by their direction from `junction`.
    pub fn connected<E: SimulationEngine + ?Sized>(
        &self,
        engine: &E,
        junction: &JunctionId,
    ) -> Result<BTreeMap<Direction, JunctionId>> {
        let mut connected = BTreeMap::new();
        for edge in engine.outgoing_edges(&junction.to_string())? {
            if is_internal(&edge) {
                continue;
            }
            let (_, to) = engine.edge_endpoints(&edge)?;
            let to = self.resolve(&to)?;
            if to == *junction || to.is_boundary() {
                continue;
            }
            let dir = Direction::classify(junction.coord(), to.coord())?;
            connected.insert(dir, to);
        }
        Ok(connected)
    }

    /// Classifies the direction of a neighbouring node, or `None` for a self-loop.
    fn neighbour_direction(&self, junction: &JunctionId, raw: &str) -> Result<Option<Direction>> {
        let other = self.resolve(raw)?;
        if other == *junction {
            return Ok(None);
        }
        Direction::classify(junction.coord(), other.coord()).map(Some)
    }
}
