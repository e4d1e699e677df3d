use crate::error::Result;

/// The simulation engine that supplies measurements and accepts commands.
///
/// Identifiers are passed as the raw strings the simulator uses. The
/// engine may report simulator-internal junctions and edges (prefixed
/// with `:`) and boundary nodes; these are filtered out by the caller.
pub trait SimulationEngine {
    /// Lists the raw ids of every node in the network.
    fn junction_ids(&self) -> Result<Vec<String>>;

    /// Lists the edges ending at a junction.
    fn incoming_edges(&self, junction: &str) -> Result<Vec<String>>;

    /// Lists the edges starting at a junction.
    fn outgoing_edges(&self, junction: &str) -> Result<Vec<String>>;

    /// The mean speed on an edge during the last tick, in m/s.
    fn edge_mean_speed(&self, edge: &str) -> Result<f64>;

    /// The vehicles on an edge during the last tick.
    fn edge_vehicle_ids(&self, edge: &str) -> Result<Vec<String>>;

    /// The raw ids of the junctions an edge runs from and to.
    fn edge_endpoints(&self, edge: &str) -> Result<(String, String)>;

    /// Reads the live signal string of a traffic light.
    fn signal_state(&self, light: &str) -> Result<String>;

    /// Sets the signal string of a traffic light.
    fn set_signal_state(&mut self, light: &str, state: &str) -> Result<()>;

    /// Advances the simulation by one tick.
    fn advance(&mut self) -> Result<()>;

    /// Releases the simulator. Called exactly once.
    fn shutdown(&mut self) -> Result<()>;
}

/// Whether an id refers to a simulator-internal junction or edge.
pub fn is_internal(id: &str) -> bool {
    id.starts_with(':')
}
