//! Cardinal directions between junctions.

use crate::error::{Error, Result};
use crate::Coord;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// A cardinal direction on the network grid.
///
/// The y-axis grows southwards, so a junction with a smaller `y`
/// coordinate lies to the north.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "n")]
    North,
    #[serde(rename = "s")]
    South,
    #[serde(rename = "e")]
    East,
    #[serde(rename = "w")]
    West,
}

impl Direction {
    /// All four directions, in slot order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Classifies the direction of the `target` junction as seen from `local`.
    ///
    /// The quadrants overlap on the axes, so the order of the checks and
    /// the placement of the inclusive bounds decide which label an
    /// axis-aligned neighbour receives. Fails with [Error::Geometry] when
    /// the two coordinates coincide.
    pub fn classify(local: Coord, target: Coord) -> Result<Self> {
        let (lx, ly) = (local.x, local.y);
        let (x, y) = (target.x, target.y);
        if x <= lx && y < ly {
            Ok(Direction::North)
        } else if x < lx && y >= ly {
            Ok(Direction::West)
        } else if x >= lx && y > ly {
            Ok(Direction::South)
        } else if x > lx && y <= ly {
            Ok(Direction::East)
        } else {
            Err(Error::Geometry { x, y })
        }
    }

    /// The direction pointing the other way.
    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// The single-letter code used in junction identifiers.
    pub fn code(self) -> char {
        match self {
            Direction::North => 'n',
            Direction::South => 's',
            Direction::East => 'e',
            Direction::West => 'w',
        }
    }

    /// Parses a single-letter direction code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "n" => Some(Direction::North),
            "s" => Some(Direction::South),
            "e" => Some(Direction::East),
            "w" => Some(Direction::West),
            _ => None,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// One value per cardinal direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByDirection<T> {
    slots: [T; 4],
}

impl<T> ByDirection<T> {
    /// Creates the container from a value for each direction.
    pub fn from_fn(mut f: impl FnMut(Direction) -> T) -> Self {
        Self {
            slots: Direction::ALL.map(&mut f),
        }
    }

    /// Iterates over the directions and their values.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        Direction::ALL.into_iter().zip(self.slots.iter())
    }

    /// Iterates mutably over the directions and their values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Direction, &mut T)> {
        Direction::ALL.into_iter().zip(self.slots.iter_mut())
    }

    /// Iterates over the values in slot order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }
}

impl<T> Index<Direction> for ByDirection<T> {
    type Output = T;

    fn index(&self, dir: Direction) -> &T {
        &self.slots[dir.slot()]
    }
}

impl<T> IndexMut<Direction> for ByDirection<T> {
    fn index_mut(&mut self, dir: Direction) -> &mut T {
        &mut self.slots[dir.slot()]
    }
}
