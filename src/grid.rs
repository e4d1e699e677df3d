//! A small in-memory simulation engine on a rectangular street grid.

use crate::engine::{is_internal, SimulationEngine};
use crate::error::{Error, Result};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;

new_key_type! {
    /// Unique ID of a [GridVehicle].
    struct GridVehicleId;
}

/// The length of every edge, in m.
const EDGE_LENGTH: f64 = 100.0;

/// The speed limit of every edge, in m/s.
const SPEED_LIMIT: f64 = 13.89;

/// The slowest speed a spawned vehicle may be assigned, in m/s.
const MIN_SPEED: f64 = 2.0;

/// A simulation engine moving vehicles around a network of junctions.
///
/// Each tick is one second. Vehicles drive at a constant speed and pick a
/// random onward edge at every junction, never turning back, until they
/// reach a boundary node. Traffic lights are stored and logged but do not
/// hold vehicles back.
pub struct GridEngine {
    /// The nodes, including boundary nodes.
    nodes: Vec<GridNode>,
    /// The directed edges, including internal ones.
    edges: Vec<GridEdge>,
    /// Node indices by raw id.
    node_index: HashMap<String, usize>,
    /// Edge indices by id.
    edge_index: HashMap<String, usize>,
    /// The vehicles on the network.
    vehicles: SlotMap<GridVehicleId, GridVehicle>,
    /// The signal string of every traffic light.
    lights: HashMap<String, String>,
    /// Every signal string committed so far.
    signal_log: Vec<SignalCommit>,
    /// The random number generator.
    rng: StdRng,
    /// The probability of a vehicle entering on each entry edge per tick.
    spawn_rate: f64,
    /// The mean and standard deviation of spawned vehicles' speeds, in m/s.
    speed: (f64, f64),
    /// The number of ticks simulated.
    tick: usize,
    /// The number of vehicles spawned.
    spawned: usize,
    /// Whether the engine has been shut down.
    closed: bool,
}

struct GridNode {
    id: String,
    boundary: bool,
    incoming: Vec<usize>,
    outgoing: Vec<usize>,
}

struct GridEdge {
    id: String,
    from: usize,
    to: usize,
    vehicles: Vec<GridVehicleId>,
}

struct GridVehicle {
    name: String,
    edge: usize,
    pos: f64,
    speed: f64,
}

/// A signal string set on a traffic light.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalCommit {
    /// The number of ticks simulated before the commit.
    pub tick: usize,
    /// The traffic light id.
    pub light: String,
    /// The committed signal string.
    pub state: String,
}

impl GridEngine {
    /// Creates an engine with no nodes, edges or traffic.
    pub fn empty(seed: u64) -> Self {
        Self {
            nodes: vec![],
            edges: vec![],
            node_index: HashMap::new(),
            edge_index: HashMap::new(),
            vehicles: SlotMap::with_key(),
            lights: HashMap::new(),
            signal_log: vec![],
            rng: StdRng::seed_from_u64(seed),
            spawn_rate: 0.0,
            speed: (10.0, 2.0),
            tick: 0,
            spawned: 0,
            closed: false,
        }
    }

    /// Creates a grid of `cols` by `rows` 4-way junctions at coordinates
    /// `1..=cols` and `1..=rows`, surrounded by boundary nodes.
    pub fn new(cols: i32, rows: i32, seed: u64) -> Self {
        let mut engine = Self::empty(seed);
        let junction = |x: i32, y: i32| format!("{}-{}-Junction_2_2_2_2", x, y);
        let boundary = |x: i32, y: i32| format!("{}-{}-end", x, y);

        // Node indices by coordinate, boundary nodes included.
        let mut nodes = HashMap::new();
        for (x, y) in (1..=cols).cartesian_product(1..=rows) {
            nodes.insert((x, y), engine.add_node(&junction(x, y)));
            engine
                .lights
                .insert(format!("{}-{}", x, y), "r".repeat(16));
        }
        for x in 1..=cols {
            nodes.insert((x, 0), engine.add_node(&boundary(x, 0)));
            nodes.insert((x, rows + 1), engine.add_node(&boundary(x, rows + 1)));
        }
        for y in 1..=rows {
            nodes.insert((0, y), engine.add_node(&boundary(0, y)));
            nodes.insert((cols + 1, y), engine.add_node(&boundary(cols + 1, y)));
        }

        for (x, y) in (1..=cols).cartesian_product(1..=rows) {
            let here = nodes[&(x, y)];
            engine.connect(here, nodes[&(x + 1, y)]);
            engine.connect(here, nodes[&(x, y + 1)]);
            if x == 1 {
                engine.connect(here, nodes[&(0, y)]);
            }
            if y == 1 {
                engine.connect(here, nodes[&(x, 0)]);
            }
            engine.push_edge(&format!(":{}-{}_0", x, y), here, here);
        }
        engine
    }

    /// Adds a node and returns its index. Nodes other than boundary nodes
    /// get a dark traffic light.
    pub fn add_node(&mut self, id: &str) -> usize {
        let boundary = id.ends_with("-end");
        if !boundary && !is_internal(id) {
            let light = id.splitn(3, '-').take(2).join("-");
            self.lights.entry(light).or_default();
        }
        let idx = self.nodes.len();
        self.node_index.insert(id.to_string(), idx);
        self.nodes.push(GridNode {
            id: id.to_string(),
            boundary,
            incoming: vec![],
            outgoing: vec![],
        });
        idx
    }

    /// Adds a directed edge between two existing nodes.
    pub fn add_edge(&mut self, id: &str, from: &str, to: &str) -> Result<()> {
        let from = self.node(from)?;
        let to = self.node(to)?;
        self.push_edge(id, from, to);
        Ok(())
    }

    /// Adds a directed edge between the nodes at the given indices.
    fn push_edge(&mut self, id: &str, from: usize, to: usize) {
        let idx = self.edges.len();
        self.edges.push(GridEdge {
            id: id.to_string(),
            from,
            to,
            vehicles: vec![],
        });
        self.edge_index.insert(id.to_string(), idx);
        self.nodes[from].outgoing.push(idx);
        self.nodes[to].incoming.push(idx);
    }

    /// Sets the probability of a vehicle entering on each entry edge per tick.
    pub fn set_spawn_rate(&mut self, rate: f64) {
        self.spawn_rate = rate.clamp(0.0, 1.0);
    }

    /// Sets the distribution of spawned vehicles' speeds, in m/s.
    pub fn set_speed_distribution(&mut self, mean: f64, stddev: f64) -> Result<()> {
        if !(mean > 0.0) || !(stddev >= 0.0) {
            return Err(Error::Config(format!(
                "invalid speed distribution: mean {}, stddev {}",
                mean, stddev
            )));
        }
        self.speed = (mean, stddev);
        Ok(())
    }

    /// Places a vehicle at the start of an edge.
    pub fn place_vehicle(&mut self, name: &str, edge: &str, speed: f64) -> Result<()> {
        let edge = self.edge(edge)?;
        let id = self.vehicles.insert(GridVehicle {
            name: name.to_string(),
            edge,
            pos: 0.0,
            speed,
        });
        self.edges[edge].vehicles.push(id);
        Ok(())
    }

    /// The number of ticks simulated so far.
    pub fn tick(&self) -> usize {
        self.tick
    }

    /// The number of vehicles on the network.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Every signal string committed so far, in order.
    pub fn signal_log(&self) -> &[SignalCommit] {
        &self.signal_log
    }

    /// Whether the engine has been shut down.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Resource("engine has been shut down".to_string()))
        } else {
            Ok(())
        }
    }

    fn node(&self, id: &str) -> Result<usize> {
        self.node_index
            .get(id)
            .copied()
            .ok_or_else(|| Error::Resource(format!("unknown junction {:?}", id)))
    }

    fn edge(&self, id: &str) -> Result<usize> {
        self.edge_index
            .get(id)
            .copied()
            .ok_or_else(|| Error::Resource(format!("unknown edge {:?}", id)))
    }

    /// Adds a pair of opposing edges between two nodes.
    fn connect(&mut self, a: usize, b: usize) {
        let light = |idx: usize| self.nodes[idx].id.splitn(3, '-').take(2).join("-");
        let (la, lb) = (light(a), light(b));
        self.push_edge(&format!("{}to{}", la, lb), a, b);
        self.push_edge(&format!("{}to{}", lb, la), b, a);
    }

    /// Spawns vehicles on the edges leaving boundary nodes.
    fn spawn_vehicles(&mut self) {
        let entries = self
            .nodes
            .iter()
            .filter(|node| node.boundary)
            .flat_map(|node| node.outgoing.iter().copied())
            .collect::<Vec<_>>();
        for edge in entries {
            if !self.rng.gen_bool(self.spawn_rate) {
                continue;
            }
            let (mean, stddev) = self.speed;
            let z: f64 = self.rng.sample(StandardNormal);
            let speed = (mean + stddev * z).clamp(MIN_SPEED, SPEED_LIMIT);
            let name = format!("veh{}", self.spawned);
            self.spawned += 1;
            let id = self.vehicles.insert(GridVehicle {
                name,
                edge,
                pos: 0.0,
                speed,
            });
            self.edges[edge].vehicles.push(id);
        }
    }

    /// Moves every vehicle forward, carrying it over junctions.
    fn move_vehicles(&mut self) {
        let mut exited = vec![];
        let ids = self.vehicles.keys().collect::<Vec<_>>();
        for id in ids {
            let vehicle = &mut self.vehicles[id];
            vehicle.pos += vehicle.speed;
            if vehicle.pos < EDGE_LENGTH {
                continue;
            }

            let edge = &self.edges[vehicle.edge];
            let node = &self.nodes[edge.to];
            let options = node
                .outgoing
                .iter()
                .copied()
                .filter(|&next| {
                    let next = &self.edges[next];
                    next.to != edge.from && next.to != next.from && !is_internal(&next.id)
                })
                .collect::<Vec<_>>();

            let current = vehicle.edge;
            self.edges[current].vehicles.retain(|v| *v != id);
            if node.boundary || options.is_empty() {
                exited.push(id);
                continue;
            }
            let next = options[self.rng.gen_range(0..options.len())];
            let vehicle = &mut self.vehicles[id];
            vehicle.edge = next;
            vehicle.pos -= EDGE_LENGTH;
            self.edges[next].vehicles.push(id);
        }
        for id in exited {
            self.vehicles.remove(id);
        }
    }
}

impl SimulationEngine for GridEngine {
    fn junction_ids(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.nodes.iter().map(|node| node.id.clone()).collect())
    }

    fn incoming_edges(&self, junction: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        let node = &self.nodes[self.node(junction)?];
        Ok(node.incoming.iter().map(|&e| self.edges[e].id.clone()).collect())
    }

    fn outgoing_edges(&self, junction: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        let node = &self.nodes[self.node(junction)?];
        Ok(node.outgoing.iter().map(|&e| self.edges[e].id.clone()).collect())
    }

    fn edge_mean_speed(&self, edge: &str) -> Result<f64> {
        self.ensure_open()?;
        let edge = &self.edges[self.edge(edge)?];
        if edge.vehicles.is_empty() {
            return Ok(SPEED_LIMIT);
        }
        let total = edge
            .vehicles
            .iter()
            .map(|&id| self.vehicles[id].speed)
            .sum::<f64>();
        Ok(total / edge.vehicles.len() as f64)
    }

    fn edge_vehicle_ids(&self, edge: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        let edge = &self.edges[self.edge(edge)?];
        Ok(edge
            .vehicles
            .iter()
            .map(|&id| self.vehicles[id].name.clone())
            .collect())
    }

    fn edge_endpoints(&self, edge: &str) -> Result<(String, String)> {
        self.ensure_open()?;
        let edge = &self.edges[self.edge(edge)?];
        Ok((
            self.nodes[edge.from].id.clone(),
            self.nodes[edge.to].id.clone(),
        ))
    }

    fn signal_state(&self, light: &str) -> Result<String> {
        self.ensure_open()?;
        self.lights
            .get(light)
            .cloned()
            .ok_or_else(|| Error::Resource(format!("unknown traffic light {:?}", light)))
    }

    fn set_signal_state(&mut self, light: &str, state: &str) -> Result<()> {
        self.ensure_open()?;
        let slot = self
            .lights
            .get_mut(light)
            .ok_or_else(|| Error::Resource(format!("unknown traffic light {:?}", light)))?;
        *slot = state.to_string();
        self.signal_log.push(SignalCommit {
            tick: self.tick,
            light: light.to_string(),
            state: state.to_string(),
        });
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.spawn_vehicles();
        self.move_vehicles();
        self.tick += 1;
        log::trace!("tick {}: {} vehicles", self.tick, self.vehicles.len());
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn grid_layout() {
        let engine = GridEngine::new(2, 1, 0);
        let ids = engine.junction_ids().unwrap();
        // 2 junctions + 2 top + 2 bottom + 2 side boundary nodes
        assert_eq!(ids.len(), 8);
        assert_eq!(
            engine.outgoing_edges("1-1-Junction_2_2_2_2").unwrap().len(),
            5
        );
        assert_eq!(
            engine.edge_endpoints("1-1to2-1").unwrap(),
            (
                "1-1-Junction_2_2_2_2".to_string(),
                "2-1-Junction_2_2_2_2".to_string()
            )
        );
        assert_eq!(
            engine.edge_endpoints("2-1to3-1").unwrap(),
            (
                "2-1-Junction_2_2_2_2".to_string(),
                "3-1-end".to_string()
            )
        );
        assert_eq!(
            engine.edge_endpoints(":1-1_0").unwrap(),
            (
                "1-1-Junction_2_2_2_2".to_string(),
                "1-1-Junction_2_2_2_2".to_string()
            )
        );
        assert_eq!(engine.signal_state("2-1").unwrap(), "r".repeat(16));
    }

    #[test]
    fn vehicles_cross_junctions_and_exit() {
        let mut engine = GridEngine::new(1, 1, 7);
        engine.place_vehicle("a", "1-0to1-1", 50.0).unwrap();
        assert_eq!(engine.edge_vehicle_ids("1-0to1-1").unwrap(), vec!["a"]);
        assert_eq!(engine.edge_mean_speed("1-0to1-1").unwrap(), 50.0);

        engine.advance().unwrap();
        engine.advance().unwrap();
        // Now past the junction, on an edge leading to a boundary node.
        assert!(engine.edge_vehicle_ids("1-0to1-1").unwrap().is_empty());
        assert_eq!(engine.vehicle_count(), 1);
        assert!(engine.edge_vehicle_ids("1-1to1-0").unwrap().is_empty());

        engine.advance().unwrap();
        engine.advance().unwrap();
        assert_eq!(engine.vehicle_count(), 0);
    }

    #[test]
    fn spawning_is_seeded() {
        let run = |seed| {
            let mut engine = GridEngine::new(2, 2, seed);
            engine.set_spawn_rate(0.5);
            for _ in 0..20 {
                engine.advance().unwrap();
            }
            (engine.vehicle_count(), engine.spawned)
        };
        assert_eq!(run(3), run(3));
        assert!(run(3).1 > 0);
    }

    #[test]
    fn closed_engine_fails() {
        let mut engine = GridEngine::new(1, 1, 0);
        engine.shutdown().unwrap();
        assert!(engine.is_closed());
        assert!(matches!(engine.advance(), Err(Error::Resource(_))));
        assert!(matches!(engine.shutdown(), Err(Error::Resource(_))));
    }
}
