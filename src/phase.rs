//! The static table of traffic-light signal strings.

use crate::direction::Direction;
use crate::error::{Error, Result};
use crate::junction::{LaneLayout, Topology};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The signal strings of one committed phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSignals {
    /// The signal string while the phase is active.
    pub signal: String,
    /// The signal string shown while leaving the phase.
    pub caution: String,
}

/// Signal strings for every supported junction shape, indexed by phase.
///
/// Built once and never mutated afterwards.
#[derive(Clone, Debug, Default)]
pub struct PhaseTable {
    cross: HashMap<LaneLayout, Vec<PhaseSignals>>,
    tee: HashMap<(LaneLayout, Direction), Vec<PhaseSignals>>,
}

/// The on-disk form of a [PhaseTable].
#[derive(Deserialize)]
struct RawPhaseTable {
    #[serde(default)]
    cross: HashMap<String, Vec<PhaseSignals>>,
    #[serde(default)]
    tee: HashMap<String, HashMap<Direction, Vec<PhaseSignals>>>,
}

static BUILTIN: Lazy<PhaseTable> = Lazy::new(|| {
    let phases = |entries: [(&str, &str); 2]| {
        entries
            .iter()
            .map(|(signal, caution)| PhaseSignals {
                signal: signal.to_string(),
                caution: caution.to_string(),
            })
            .collect::<Vec<_>>()
    };
    let tee = LaneLayout::new(&[2, 2, 2]);

    let mut table = PhaseTable::default();
    table.insert_cross(
        LaneLayout::new(&[2, 2, 2, 2]),
        phases([
            ("rrrrGGGgrrrrGGGg", "rrrryyyyrrrryyyy"),
            ("GGGgrrrrGGGgrrrr", "yyyyrrrryyyyrrrr"),
        ]),
    );
    table.insert_tee(
        tee.clone(),
        Direction::North,
        phases([("rrGGGGGg", "rryyyyyy"), ("GGrrrrrr", "yyrrrrrr")]),
    );
    table.insert_tee(
        tee.clone(),
        Direction::East,
        phases([("rrrGGrrr", "rrryyrrr"), ("GGgrrGGG", "yyyrryyy")]),
    );
    table.insert_tee(
        tee.clone(),
        Direction::South,
        phases([("GGgrrGGG", "yyyrryyy"), ("rrrGGrrr", "rrryyrrr")]),
    );
    table.insert_tee(
        tee,
        Direction::West,
        phases([("rrrrrrGG", "rrrrrryy"), ("GGGGGgrr", "yyyyyyrr")]),
    );
    table
});

impl PhaseTable {
    /// The table shipped with the crate, covering `2_2_2_2` crossings
    /// and `2_2_2` T-junctions in every orientation.
    pub fn builtin() -> &'static PhaseTable {
        &BUILTIN
    }

    /// Loads a table from JSON of the form
    /// `{"cross": {"2_2_2_2": [..]}, "tee": {"2_2_2": {"n": [..]}}}`,
    /// where each phase is `{"signal": .., "caution": ..}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawPhaseTable = serde_json::from_str(json)
            .map_err(|err| Error::Config(format!("invalid phase table: {}", err)))?;
        let layout = |s: &str| {
            s.parse::<LaneLayout>()
                .map_err(|_| Error::Config(format!("invalid lane layout {:?}", s)))
        };

        let mut table = PhaseTable::default();
        for (lanes, phases) in raw.cross {
            table.insert_cross(layout(&lanes)?, phases);
        }
        for (lanes, sides) in raw.tee {
            let lanes = layout(&lanes)?;
            for (missing, phases) in sides {
                table.insert_tee(lanes.clone(), missing, phases);
            }
        }
        Ok(table)
    }

    /// Adds or replaces the phases of a 4-way junction layout.
    pub fn insert_cross(&mut self, lanes: LaneLayout, phases: Vec<PhaseSignals>) {
        self.cross.insert(lanes, phases);
    }

    /// Adds or replaces the phases of a T-junction layout and orientation.
    pub fn insert_tee(&mut self, lanes: LaneLayout, missing: Direction, phases: Vec<PhaseSignals>) {
        self.tee.insert((lanes, missing), phases);
    }

    /// Gets every phase defined for a junction shape.
    pub fn phases(&self, topology: &Topology) -> Result<&[PhaseSignals]> {
        let phases = match topology {
            Topology::Cross { lanes } => self.cross.get(lanes),
            Topology::Tee { missing, lanes } => self.tee.get(&(lanes.clone(), *missing)),
            Topology::End => None,
        };
        phases
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Config(format!("no phases defined for {}", topology)))
    }

    /// Gets the signal strings of a single phase.
    pub fn get(&self, topology: &Topology, phase: usize) -> Result<&PhaseSignals> {
        self.phases(topology)?.get(phase).ok_or_else(|| {
            Error::Config(format!("phase {} is not defined for {}", phase, topology))
        })
    }
}
