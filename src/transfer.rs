use crate::direction::Direction;
use crate::error::Result;
use crate::junction::JunctionId;
use crate::telemetry::JunctionTrafficInfo;

/// Computes the transfer rate from the `upstream` junction into `local`,
/// writing it into `target`, the local junction's record.
///
/// With `d` the direction of the upstream junction as seen from the local
/// one, the rate is the share of all vehicles that entered the upstream
/// junction during the cycle which came in on its own `d` side, i.e. the
/// approach whose through movement heads towards `local`. An upstream
/// junction with no incoming vehicles yields a rate of 0.
///
/// Only the `d` slot of `target` is written. Must only be called on
/// finalized cycle totals.
pub fn compute_transfer_rate(
    target: &mut JunctionTrafficInfo,
    local: &JunctionId,
    upstream_id: &JunctionId,
    upstream: &JunctionTrafficInfo,
) -> Result<Direction> {
    let dir = Direction::classify(local.coord(), upstream_id.coord())?;
    let total = upstream.total_incoming_vehicles();
    target.transfer_rate[dir] = if total == 0 {
        0.0
    } else {
        upstream.incoming_vehicles(dir) as f64 / total as f64
    };
    Ok(dir)
}
