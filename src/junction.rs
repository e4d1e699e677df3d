//! Structured junction identifiers.

use crate::direction::Direction;
use crate::error::{Error, Result};
use crate::Coord;
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// The identifier of a junction in the road network.
///
/// Parsed once from the simulator's `x-y-typeinfo` string and compared
/// structurally from then on. Formatting with [Display](fmt::Display)
/// yields the canonical string again.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JunctionId {
    /// The grid x coordinate.
    x: i32,
    /// The grid y coordinate.
    y: i32,
    /// The shape of the junction.
    topology: Topology,
}

/// The shape of a junction.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Topology {
    /// A 4-way junction.
    Cross { lanes: LaneLayout },
    /// A 3-way junction with no arm on the `missing` side.
    Tee { missing: Direction, lanes: LaneLayout },
    /// A boundary node where traffic enters or leaves the network.
    End,
}

/// The lane counts of a junction's arms, e.g. `2_2_2_2`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LaneLayout(SmallVec<[u8; 4]>);

impl JunctionId {
    /// Creates a junction identifier.
    pub fn new(x: i32, y: i32, topology: Topology) -> Self {
        Self { x, y, topology }
    }

    /// Gets the junction's coordinates.
    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }

    /// Gets the junction's shape.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Whether this is a boundary node, which is never aggregated or controlled.
    pub fn is_boundary(&self) -> bool {
        self.topology == Topology::End
    }

    /// The id of the traffic light controlling this junction.
    pub fn light_id(&self) -> String {
        format!("{}-{}", self.x, self.y)
    }
}

impl FromStr for JunctionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidJunctionId(s.to_string());
        let mut parts = s.splitn(3, '-');
        let (x, y, info) = parts.next_tuple().ok_or_else(invalid)?;
        let x = x.parse::<i32>().map_err(|_| invalid())?;
        let y = y.parse::<i32>().map_err(|_| invalid())?;
        let topology = info.parse::<Topology>().map_err(|_| invalid())?;
        Ok(Self { x, y, topology })
    }
}

impl fmt::Display for JunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.x, self.y, self.topology)
    }
}

impl Serialize for JunctionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JunctionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Topology {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "end" {
            return Ok(Topology::End);
        }
        if let Some(lanes) = s.strip_prefix("TJunction_") {
            let (side, lanes) = lanes
                .split_once('_')
                .ok_or_else(|| Error::InvalidJunctionId(s.to_string()))?;
            let missing = Direction::from_code(side)
                .ok_or_else(|| Error::InvalidJunctionId(s.to_string()))?;
            return Ok(Topology::Tee {
                missing,
                lanes: lanes.parse()?,
            });
        }
        if let Some(lanes) = s.strip_prefix("Junction_") {
            return Ok(Topology::Cross {
                lanes: lanes.parse()?,
            });
        }
        Err(Error::InvalidJunctionId(s.to_string()))
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Cross { lanes } => write!(f, "Junction_{}", lanes),
            Topology::Tee { missing, lanes } => {
                write!(f, "TJunction_{}_{}", missing.code(), lanes)
            }
            Topology::End => f.write_str("end"),
        }
    }
}

impl LaneLayout {
    /// Creates a lane layout from the lane count of each arm.
    pub fn new(lanes: &[u8]) -> Self {
        Self(SmallVec::from_slice(lanes))
    }
}

impl FromStr for LaneLayout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.split('_')
            .map(|n| n.parse::<u8>())
            .collect::<Result<SmallVec<_>, _>>()
            .map(LaneLayout)
            .map_err(|_| Error::InvalidJunctionId(s.to_string()))
    }
}

impl fmt::Display for LaneLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join("_"))
    }
}
