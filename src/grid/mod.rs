//! Static world description: cells, actions and the immutable grid.
//!
//! Everything here is pure data. The grid is built once, validated, and then
//! shared read-only by the occupancy map, the sensors, the resolver and the
//! environment.

pub mod distance;

use std::fmt;

use crate::error::{GridError, Result};

pub use distance::{DistanceField, GridGraph};

/// Stable identifier of an agent for the lifetime of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// A cell coordinate `(row, col)`; row 0 is the north edge.
///
/// Coordinates are signed so that offsets past the border can be represented
/// and then rejected by [`Grid::contains`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Returns this position shifted by `(d_row, d_col)`.
    pub fn offset(&self, d_row: i32, d_col: i32) -> Self {
        Self::new(self.row + d_row, self.col + d_col)
    }

    pub fn manhattan(&self, other: &Position) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    pub fn chebyshev(&self, other: &Position) -> u32 {
        self.row.abs_diff(other.row).max(self.col.abs_diff(other.col))
    }
}

impl From<(i32, i32)> for Position {
    fn from((row, col): (i32, i32)) -> Self {
        Self::new(row, col)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Which movement actions are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MoveSet {
    /// Stay plus the four cardinal moves.
    #[default]
    Four,
    /// Stay plus cardinal and diagonal moves.
    Eight,
}

impl MoveSet {
    /// Number of legal action indices.
    pub fn action_count(&self) -> usize {
        match self {
            MoveSet::Four => 5,
            MoveSet::Eight => 9,
        }
    }

    pub fn actions(&self) -> &'static [Action] {
        &Action::ALL[..self.action_count()]
    }
}

/// The closed set of actions an agent may propose.
///
/// Indices are stable: learners exchange actions as `usize` and the kernel
/// validates them with [`Action::from_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    Stay,
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::Stay,
        Action::North,
        Action::South,
        Action::East,
        Action::West,
        Action::NorthEast,
        Action::NorthWest,
        Action::SouthEast,
        Action::SouthWest,
    ];

    /// Decodes an action index, checking it against the legal move set.
    pub fn from_index(index: usize, moves: MoveSet) -> Result<Self> {
        if index < moves.action_count() {
            Ok(Self::ALL[index])
        } else {
            Err(GridError::InvalidAction(index))
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Action::Stay => 0,
            Action::North => 1,
            Action::South => 2,
            Action::East => 3,
            Action::West => 4,
            Action::NorthEast => 5,
            Action::NorthWest => 6,
            Action::SouthEast => 7,
            Action::SouthWest => 8,
        }
    }

    /// Returns the `(row, col)` displacement of this action.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Action::Stay => (0, 0),
            Action::North => (-1, 0),
            Action::South => (1, 0),
            Action::East => (0, 1),
            Action::West => (0, -1),
            Action::NorthEast => (-1, 1),
            Action::NorthWest => (-1, -1),
            Action::SouthEast => (1, 1),
            Action::SouthWest => (1, -1),
        }
    }

    /// Destination of this action taken from `from` (possibly out of bounds).
    pub fn apply(&self, from: Position) -> Position {
        let (dr, dc) = self.offset();
        from.offset(dr, dc)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Stay => "stay",
            Action::North => "north",
            Action::South => "south",
            Action::East => "east",
            Action::West => "west",
            Action::NorthEast => "north-east",
            Action::NorthWest => "north-west",
            Action::SouthEast => "south-east",
            Action::SouthWest => "south-west",
        };
        f.write_str(s)
    }
}

/// Immutable world layout: dimensions, blocked cells and movement costs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Grid {
    width: u32,
    height: u32,
    blocked: Vec<bool>,
    cost: Vec<f64>,
}

impl Default for Grid {
    /// An open 5x5 grid.
    fn default() -> Self {
        Self {
            width: 5,
            height: 5,
            blocked: vec![false; 25],
            cost: vec![1.0; 25],
        }
    }
}

impl Grid {
    /// Creates an open grid with unit movement cost everywhere.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GridError::config(format!(
                "grid dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        let cells = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            blocked: vec![false; cells],
            cost: vec![1.0; cells],
        })
    }

    /// Parses a layout where `#` marks an obstacle, `.` an open cell and a
    /// digit `2`..`9` an open cell with that movement cost.
    ///
    /// ```
    /// use gridflock::grid::{Grid, Position};
    ///
    /// let grid = Grid::from_ascii("..#\n.3.\n...").unwrap();
    /// assert_eq!(grid.width(), 3);
    /// assert!(grid.is_blocked(Position::new(0, 2)));
    /// assert_eq!(grid.cost(Position::new(1, 1)), Some(3.0));
    /// ```
    pub fn from_ascii(layout: &str) -> Result<Self> {
        let rows: Vec<&str> = layout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let height = rows.len() as u32;
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0) as u32;
        let mut grid = Self::new(width, height)?;

        for (r, line) in rows.iter().enumerate() {
            if line.chars().count() as u32 != width {
                return Err(GridError::config(format!(
                    "layout row {} has {} cells, expected {}",
                    r,
                    line.chars().count(),
                    width
                )));
            }
            for (c, ch) in line.chars().enumerate() {
                let pos = Position::new(r as i32, c as i32);
                match ch {
                    '.' => {}
                    '#' => grid.block(pos)?,
                    '2'..='9' => grid.set_cost(pos, f64::from(ch as u8 - b'0'))?,
                    other => {
                        return Err(GridError::config(format!(
                            "unknown layout character '{}' at {}",
                            other, pos
                        )))
                    }
                }
            }
        }
        Ok(grid)
    }

    /// Marks the given cells as obstacles.
    pub fn with_obstacles<I>(mut self, cells: I) -> Result<Self>
    where
        I: IntoIterator<Item = Position>,
    {
        for pos in cells {
            self.block(pos)?;
        }
        Ok(self)
    }

    /// Overrides the movement cost of a single cell.
    pub fn with_cost(mut self, pos: Position, cost: f64) -> Result<Self> {
        self.set_cost(pos, cost)?;
        Ok(self)
    }

    fn block(&mut self, pos: Position) -> Result<()> {
        let idx = self.require_index(pos)?;
        self.blocked[idx] = true;
        Ok(())
    }

    fn set_cost(&mut self, pos: Position, cost: f64) -> Result<()> {
        if !cost.is_finite() || cost < 1.0 {
            return Err(GridError::config(format!(
                "movement cost at {} must be finite and >= 1.0, got {}",
                pos, cost
            )));
        }
        let idx = self.require_index(pos)?;
        self.cost[idx] = cost;
        Ok(())
    }

    /// Checks that the cell tables match the dimensions and every cost is
    /// usable. Always true for grids built through the constructors; a
    /// deserialized grid may violate it.
    pub(crate) fn check_layout(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GridError::config(format!(
                "grid dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        let cells = self.width as usize * self.height as usize;
        if self.blocked.len() != cells || self.cost.len() != cells {
            return Err(GridError::config(format!(
                "{}x{} grid needs {} cells, got {} obstacle flags and {} costs",
                self.width,
                self.height,
                cells,
                self.blocked.len(),
                self.cost.len()
            )));
        }
        if let Some(bad) = self.cost.iter().find(|c| !c.is_finite() || **c < 1.0) {
            return Err(GridError::config(format!(
                "movement costs must be finite and >= 1.0, got {}",
                bad
            )));
        }
        Ok(())
    }

    fn require_index(&self, pos: Position) -> Result<usize> {
        self.index(pos)
            .ok_or_else(|| GridError::config(format!("cell {} is outside the grid", pos)))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cell_count(&self) -> usize {
        self.blocked.len()
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.row >= 0
            && pos.col >= 0
            && (pos.row as u32) < self.height
            && (pos.col as u32) < self.width
    }

    /// Row-major flat index of an in-bounds cell.
    pub fn index(&self, pos: Position) -> Option<usize> {
        self.contains(pos)
            .then(|| pos.row as usize * self.width as usize + pos.col as usize)
    }

    /// Inverse of [`Grid::index`].
    pub fn position(&self, index: usize) -> Position {
        let w = self.width as usize;
        Position::new((index / w) as i32, (index % w) as i32)
    }

    /// True for obstacles. Out-of-bounds cells are not "blocked"; check
    /// [`Grid::contains`] separately.
    pub fn is_blocked(&self, pos: Position) -> bool {
        self.index(pos).is_some_and(|i| self.blocked[i])
    }

    /// True when an agent may stand on `pos`.
    pub fn is_free(&self, pos: Position) -> bool {
        self.index(pos).is_some_and(|i| !self.blocked[i])
    }

    /// Cost of entering `pos`, or `None` when out of bounds.
    pub fn cost(&self, pos: Position) -> Option<f64> {
        self.index(pos).map(|i| self.cost[i])
    }

    /// Iterator over every open cell in row-major order.
    pub fn free_cells(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.cell_count())
            .filter(|&i| !self.blocked[i])
            .map(|i| self.position(i))
    }
}
