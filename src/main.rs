use std::collections::BTreeMap;
use std::time::Instant;

use traffic_telemetry::{EnvConfig, GridEngine, PhaseTable, TrafficEnv};

fn main() -> traffic_telemetry::Result<()> {
    let mut engine = GridEngine::new(3, 3, 42);
    engine.set_spawn_rate(0.3);
    let mut env = TrafficEnv::initialize(engine, PhaseTable::builtin(), EnvConfig::default())?;

    println!("Simulating...");
    let num_cycles: u32 = 20;
    let start = Instant::now();
    for cycle in 0..num_cycles {
        let record = env.next_cycle()?;
        let busiest = record
            .iter()
            .max_by_key(|(_, info)| info.total_incoming_vehicles());
        if let Some((id, info)) = busiest {
            println!(
                "cycle {:>2}: busiest junction {} ({} vehicles, transfer rates {:?})",
                cycle,
                id,
                info.total_incoming_vehicles(),
                info.transfer_rate.values().map(|r| format!("{:.2}", r)).collect::<Vec<_>>(),
            );
        }

        let phase = (cycle as usize + 1) % 2;
        let requests = env
            .junctions()
            .iter()
            .map(|id| (id.clone(), phase))
            .collect::<BTreeMap<_, _>>();
        env.request_phase_change(&requests)?;
    }

    println!(
        "Avg. cycle: {:?} ({} ticks, {} vehicles on the network)",
        start.elapsed() / num_cycles,
        env.engine().tick(),
        env.engine().vehicle_count(),
    );
    env.close()
}
