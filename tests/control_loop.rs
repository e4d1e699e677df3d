//! Tests that drive a traffic environment over an in-memory grid.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use assert_approx_eq::assert_approx_eq;
use traffic_telemetry::{
    Direction, EnvConfig, Error, GridEngine, JunctionId, Network, PhaseTable, Recorder,
    SignalCommit, SignalController, SimulationEngine, TrafficEnv,
};

/// A two-phase table for the grid's junctions with short signal strings.
fn simple_table() -> PhaseTable {
    PhaseTable::from_json(
        r#"{"cross": {"2_2_2_2": [
            {"signal": "GGrr", "caution": "yyrr"},
            {"signal": "rrGG", "caution": "rryy"}
        ]}}"#,
    )
    .unwrap()
}

fn config(caution_duration: usize) -> EnvConfig {
    EnvConfig {
        caution_duration,
        cycle_duration: caution_duration + 5,
    }
}

fn junction(x: i32, y: i32) -> JunctionId {
    format!("{}-{}-Junction_2_2_2_2", x, y).parse().unwrap()
}

fn commit(tick: usize, light: &str, state: &str) -> SignalCommit {
    SignalCommit {
        tick,
        light: light.to_string(),
        state: state.to_string(),
    }
}

/// Wraps an engine and counts how often it is shut down.
struct Tracked {
    inner: GridEngine,
    shutdowns: Rc<Cell<usize>>,
}

impl Tracked {
    fn new(inner: GridEngine) -> (Self, Rc<Cell<usize>>) {
        let shutdowns = Rc::new(Cell::new(0));
        let tracked = Self {
            inner,
            shutdowns: shutdowns.clone(),
        };
        (tracked, shutdowns)
    }
}

impl SimulationEngine for Tracked {
    fn junction_ids(&self) -> traffic_telemetry::Result<Vec<String>> {
        self.inner.junction_ids()
    }

    fn incoming_edges(&self, junction: &str) -> traffic_telemetry::Result<Vec<String>> {
        self.inner.incoming_edges(junction)
    }

    fn outgoing_edges(&self, junction: &str) -> traffic_telemetry::Result<Vec<String>> {
        self.inner.outgoing_edges(junction)
    }

    fn edge_mean_speed(&self, edge: &str) -> traffic_telemetry::Result<f64> {
        self.inner.edge_mean_speed(edge)
    }

    fn edge_vehicle_ids(&self, edge: &str) -> traffic_telemetry::Result<Vec<String>> {
        self.inner.edge_vehicle_ids(edge)
    }

    fn edge_endpoints(&self, edge: &str) -> traffic_telemetry::Result<(String, String)> {
        self.inner.edge_endpoints(edge)
    }

    fn signal_state(&self, light: &str) -> traffic_telemetry::Result<String> {
        self.inner.signal_state(light)
    }

    fn set_signal_state(&mut self, light: &str, state: &str) -> traffic_telemetry::Result<()> {
        self.inner.set_signal_state(light, state)
    }

    fn advance(&mut self) -> traffic_telemetry::Result<()> {
        self.inner.advance()
    }

    fn shutdown(&mut self) -> traffic_telemetry::Result<()> {
        self.shutdowns.set(self.shutdowns.get() + 1);
        self.inner.shutdown()
    }
}

/// Test that a phase change passes through the caution signal of the
/// phase being left.
#[test]
fn caution_precedes_new_phase() {
    let table = simple_table();
    let mut env = TrafficEnv::initialize(GridEngine::new(1, 1, 0), &table, config(3)).unwrap();
    let id = junction(1, 1);
    assert_eq!(env.current_phase(&id), Some(0));

    env.request_phase_change(&BTreeMap::from([(id.clone(), 1)])).unwrap();

    assert_eq!(
        env.engine().signal_log(),
        &[
            commit(0, "1-1", "GGrr"),
            commit(0, "1-1", "yyrr"),
            commit(3, "1-1", "rrGG"),
        ]
    );
    assert_eq!(env.engine().tick(), 3);
    assert_eq!(env.engine().signal_state("1-1").unwrap(), "rrGG");
    assert_eq!(env.current_phase(&id), Some(1));

    // Going back shows the caution of phase 1.
    env.request_phase_change(&BTreeMap::from([(id, 0)])).unwrap();
    assert_eq!(env.engine().signal_log()[3], commit(3, "1-1", "rryy"));
    assert_eq!(env.engine().signal_log()[4], commit(6, "1-1", "GGrr"));
}

/// Test that the caution follows the phase showing on the light, even when
/// the simulator has changed it since the last commit.
#[test]
fn caution_follows_live_signal() {
    let table = simple_table();
    let mut engine = GridEngine::new(1, 1, 0);
    let mut recorder = Recorder::new(Network::load(&engine).unwrap());
    let mut signals = SignalController::new(&table, 2);
    let id = junction(1, 1);
    signals.initialize(&mut engine, &[id.clone()]).unwrap();

    engine.set_signal_state("1-1", "rrGG").unwrap();
    let requests = BTreeMap::from([(id.clone(), 0)]);
    signals.request_phase_change(&mut engine, &mut recorder, &requests).unwrap();

    assert_eq!(
        engine.signal_log(),
        &[
            commit(0, "1-1", "GGrr"),
            commit(0, "1-1", "rrGG"),
            commit(0, "1-1", "rryy"),
            commit(2, "1-1", "GGrr"),
        ]
    );
    assert_eq!(signals.phase(&id), Some(0));

    // A signal outside the table falls back to the last committed phase.
    engine.set_signal_state("1-1", "GGGG").unwrap();
    let requests = BTreeMap::from([(id.clone(), 1)]);
    signals.request_phase_change(&mut engine, &mut recorder, &requests).unwrap();
    assert_eq!(engine.signal_log()[5], commit(2, "1-1", "yyrr"));
    assert_eq!(engine.signal_log()[6], commit(4, "1-1", "rrGG"));
    assert_eq!(signals.phase(&id), Some(1));
}

/// Test that requesting the active phase does nothing.
#[test]
fn requesting_active_phase_is_noop() {
    let table = simple_table();
    let mut env = TrafficEnv::initialize(GridEngine::new(2, 1, 0), &table, config(3)).unwrap();
    let requests = env
        .junctions()
        .iter()
        .map(|id| (id.clone(), 0))
        .collect::<BTreeMap<_, _>>();

    env.request_phase_change(&requests).unwrap();

    assert_eq!(env.engine().tick(), 0);
    assert_eq!(env.engine().signal_log().len(), 2);
    assert_eq!(env.engine().signal_state("1-1").unwrap(), "GGrr");
}

/// Test that junctions changing together share a single caution interval.
#[test]
fn caution_interval_is_shared() {
    let table = simple_table();
    let mut env = TrafficEnv::initialize(GridEngine::new(3, 1, 0), &table, config(4)).unwrap();
    let requests = BTreeMap::from([
        (junction(1, 1), 1),
        (junction(2, 1), 0),
        (junction(3, 1), 1),
    ]);

    env.request_phase_change(&requests).unwrap();

    assert_eq!(env.engine().tick(), 4);
    assert_eq!(
        &env.engine().signal_log()[3..],
        &[
            commit(0, "1-1", "yyrr"),
            commit(0, "3-1", "yyrr"),
            commit(4, "1-1", "rrGG"),
            commit(4, "3-1", "rrGG"),
        ]
    );
    assert_eq!(env.current_phase(&junction(2, 1)), Some(0));
}

/// Test that an undefined phase is rejected before any light changes.
#[test]
fn undefined_phase_is_rejected() {
    let table = simple_table();
    let mut env = TrafficEnv::initialize(GridEngine::new(2, 1, 0), &table, config(3)).unwrap();
    let requests = BTreeMap::from([(junction(1, 1), 1), (junction(2, 1), 2)]);

    let res = env.request_phase_change(&requests);

    assert!(matches!(res, Err(Error::Config(_))));
    assert_eq!(env.engine().signal_log().len(), 2);
    assert_eq!(env.engine().tick(), 0);
}

/// Test that a cycle snapshot covers exactly the ticks since the last one.
#[test]
fn cycle_snapshot_covers_its_ticks() {
    let table = simple_table();
    let mut env = TrafficEnv::initialize(GridEngine::new(2, 2, 0), &table, config(3)).unwrap();

    let first = env.run_cycle(4).unwrap();
    assert_eq!(first.len(), 4);
    assert!(first.iter().all(|(_, info)| info.step_count == 4));
    assert!(env.record().iter().all(|(_, info)| info.step_count == 0));

    // Caution ticks are recorded into the following cycle.
    env.request_phase_change(&BTreeMap::from([(junction(1, 1), 1)])).unwrap();
    assert!(env.record().iter().all(|(_, info)| info.step_count == 3));
    let second = env.run_cycle(2).unwrap();
    assert!(second.iter().all(|(_, info)| info.step_count == 5));

    // The first snapshot is unaffected by later ticks.
    assert!(first.iter().all(|(_, info)| info.step_count == 4));
}

/// Test that the default cycle leaves room for the caution interval.
#[test]
fn next_cycle_runs_recording_ticks() {
    let mut env = TrafficEnv::initialize(
        GridEngine::new(1, 1, 0),
        PhaseTable::builtin(),
        EnvConfig::default(),
    )
    .unwrap();
    let record = env.next_cycle().unwrap();
    assert_eq!(env.engine().tick(), 5);
    assert_eq!(record.get(&junction(1, 1)).unwrap().step_count, 5);
}

/// Test the transfer rates and speeds of a scripted cycle.
#[test]
fn transfer_rates_from_scripted_traffic() {
    let mut engine = GridEngine::new(2, 1, 0);
    engine.place_vehicle("a", "0-1to1-1", 30.0).unwrap();
    engine.place_vehicle("b", "2-0to2-1", 20.0).unwrap();
    engine.place_vehicle("c", "3-1to2-1", 10.0).unwrap();
    let table = simple_table();
    let mut env = TrafficEnv::initialize(engine, &table, config(3)).unwrap();

    let record = env.run_cycle(2).unwrap();

    let west = record.get(&junction(1, 1)).unwrap();
    let east = record.get(&junction(2, 1)).unwrap();
    assert_eq!(west.incoming_vehicles(Direction::West), 1);
    assert_approx_eq!(west.incoming[Direction::West].mean_speed, 30.0);
    assert_eq!(east.total_incoming_vehicles(), 2);

    // Everything entering 1-1 came from the west, heading towards 2-1.
    assert_approx_eq!(east.transfer_rate[Direction::West], 1.0);
    // Half of the traffic entering 2-1 came from the east, towards 1-1.
    assert_approx_eq!(west.transfer_rate[Direction::East], 0.5);
    // Boundary nodes contribute no rate.
    assert_eq!(west.transfer_rate[Direction::West], 0.0);
    assert_eq!(east.transfer_rate[Direction::North], 0.0);
}

/// Test that vehicles seen during the active cycle are counted once.
#[test]
fn total_vehicles_in_active_cycle() {
    let mut engine = GridEngine::new(1, 1, 0);
    engine.place_vehicle("a", "0-1to1-1", 10.0).unwrap();
    engine.place_vehicle("b", "1-0to1-1", 10.0).unwrap();
    let table = simple_table();
    let mut env = TrafficEnv::initialize(engine, &table, config(3)).unwrap();
    let id = junction(1, 1);
    assert_eq!(env.total_vehicles_at_junction(&id), 0);

    env.request_phase_change(&BTreeMap::from([(id.clone(), 1)])).unwrap();
    assert_eq!(env.total_vehicles_at_junction(&id), 2);

    env.run_cycle(1).unwrap();
    assert_eq!(env.total_vehicles_at_junction(&id), 0);
}

/// Test that random traffic keeps every transfer rate within bounds.
#[test]
fn random_traffic_rates_are_fractions() {
    let mut engine = GridEngine::new(3, 3, 11);
    engine.set_spawn_rate(0.4);
    let mut env =
        TrafficEnv::initialize(engine, PhaseTable::builtin(), EnvConfig::default()).unwrap();
    for cycle in 0..10 {
        let record = env.next_cycle().unwrap();
        for (_, info) in record.iter() {
            assert_eq!(info.step_count, if cycle == 0 { 5 } else { 10 });
            assert!(info.transfer_rate.values().all(|r| (0.0..=1.0).contains(r)));
        }
        let requests = env
            .junctions()
            .iter()
            .map(|id| (id.clone(), (cycle + 1) % 2))
            .collect::<BTreeMap<_, _>>();
        env.request_phase_change(&requests).unwrap();
    }
    assert!(env.engine().vehicle_count() > 0);
}

#[test]
fn connected_junctions_skip_boundaries() {
    let table = simple_table();
    let env = TrafficEnv::initialize(GridEngine::new(2, 2, 0), &table, config(3)).unwrap();
    let connected = env.connected_junctions(&junction(1, 1)).unwrap();
    assert_eq!(
        connected,
        BTreeMap::from([
            (Direction::South, junction(1, 2)),
            (Direction::East, junction(2, 1)),
        ])
    );
}

#[test]
fn engine_is_shut_down_once() {
    let table = simple_table();

    let (engine, shutdowns) = Tracked::new(GridEngine::new(1, 1, 0));
    let env = TrafficEnv::initialize(engine, &table, config(3)).unwrap();
    env.close().unwrap();
    assert_eq!(shutdowns.get(), 1);

    let (engine, shutdowns) = Tracked::new(GridEngine::new(1, 1, 0));
    let mut env = TrafficEnv::initialize(engine, &table, config(3)).unwrap();
    env.run_cycle(1).unwrap();
    drop(env);
    assert_eq!(shutdowns.get(), 1);
}

#[test]
fn coincident_junctions_fail_at_load() {
    let mut engine = GridEngine::empty(0);
    engine.add_node("1-1-Junction_2_2_2_2");
    engine.add_node("1-1-end");
    engine.add_edge("in", "1-1-end", "1-1-Junction_2_2_2_2").unwrap();
    let (engine, shutdowns) = Tracked::new(engine);
    let table = simple_table();

    let res = TrafficEnv::initialize(engine, &table, config(3));

    assert!(matches!(res, Err(Error::Geometry { x: 1, y: 1 })));
    assert_eq!(shutdowns.get(), 1);
}

#[test]
fn unknown_layout_fails_at_load() {
    let mut engine = GridEngine::empty(0);
    engine.add_node("1-1-Junction_3_3_3_3");
    let (engine, shutdowns) = Tracked::new(engine);

    let res = TrafficEnv::initialize(engine, PhaseTable::builtin(), EnvConfig::default());

    assert!(matches!(res, Err(Error::Config(_))));
    assert_eq!(shutdowns.get(), 1);
}

#[test]
fn malformed_ids_fail_at_load() {
    let mut engine = GridEngine::empty(0);
    engine.add_node("roundabout");
    engine.add_node(":internal");
    let (engine, shutdowns) = Tracked::new(engine);

    let res = TrafficEnv::initialize(engine, PhaseTable::builtin(), EnvConfig::default());

    assert!(matches!(res, Err(Error::InvalidJunctionId(id)) if id == "roundabout"));
    assert_eq!(shutdowns.get(), 1);
}

#[test]
fn tee_junction_uses_its_orientation() {
    let mut engine = GridEngine::empty(0);
    engine.add_node("1-1-TJunction_w_2_2_2");
    engine.add_node("2-1-end");
    engine.add_edge("in", "2-1-end", "1-1-TJunction_w_2_2_2").unwrap();
    let mut env = TrafficEnv::initialize(
        engine,
        PhaseTable::builtin(),
        EnvConfig {
            caution_duration: 2,
            cycle_duration: 4,
        },
    )
    .unwrap();
    let id: JunctionId = "1-1-TJunction_w_2_2_2".parse().unwrap();
    assert_eq!(env.engine().signal_state("1-1").unwrap(), "rrrrrrGG");

    env.request_phase_change(&BTreeMap::from([(id, 1)])).unwrap();

    assert_eq!(
        &env.engine().signal_log()[1..],
        &[commit(0, "1-1", "rrrrrryy"), commit(2, "1-1", "GGGGGgrr")]
    );
}
