//! Reverse-occupation sensors.
//!
//! Agents do not track their neighbours. Each observation is derived from the
//! global occupancy map instead: for every cell inside the agent's window the
//! sensor asks the map who stands there, and compares that with what the
//! agent's previous observation recorded for the same cell.

pub mod opposing;

use std::collections::BTreeMap;

use crate::agent::AgentState;
use crate::error::{GridError, Result};
use crate::grid::{AgentId, Grid, Position};
use crate::occupancy::OccupancyMap;

pub use opposing::{neighbour_coords, opposing_mask, NEIGHBOUR_COUNT};

/// Distance used to decide which cells fall inside the observation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VisibilityMetric {
    /// Square window.
    #[default]
    Chebyshev,
    /// Diamond window.
    Manhattan,
}

impl VisibilityMetric {
    fn within(&self, d_row: i32, d_col: i32, radius: u32) -> bool {
        match self {
            VisibilityMetric::Chebyshev => {
                d_row.unsigned_abs().max(d_col.unsigned_abs()) <= radius
            }
            VisibilityMetric::Manhattan => {
                u64::from(d_row.unsigned_abs()) + u64::from(d_col.unsigned_abs())
                    <= u64::from(radius)
            }
        }
    }

    /// Window offsets in row-major order.
    pub fn offsets(&self, radius: u32) -> Vec<(i32, i32)> {
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        (-r..=r)
            .flat_map(|dr| (-r..=r).map(move |dc| (dr, dc)))
            .filter(|&(dr, dc)| self.within(dr, dc, radius))
            .collect()
    }
}

/// What a visible cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellTag {
    OutOfBounds,
    Obstacle,
    /// The observing agent itself.
    SelfAgent,
    /// Another agent.
    Agent(AgentId),
    /// The observing agent's goal, currently unoccupied.
    Goal,
    Empty,
}

impl CellTag {
    /// True when an agent could step onto a cell with this tag right now.
    pub fn is_passable(&self) -> bool {
        matches!(self, CellTag::Goal | CellTag::Empty)
    }
}

/// One cell of an observation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObservedCell {
    /// Offset from the observing agent.
    pub offset: (i32, i32),
    pub tag: CellTag,
    /// Agent standing on the cell, the observer included.
    pub occupant: Option<AgentId>,
    /// Occupant differs from the one recorded by the previous observation.
    pub changed: bool,
}

/// Local view of one agent after a tick.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Observation {
    pub agent: AgentId,
    pub position: Position,
    pub goal: Position,
    /// Goal displacement normalized by the grid height and width.
    pub goal_offset: (f64, f64),
    pub cells: Vec<ObservedCell>,
    /// Neighbours (NW, N, NE, W, E, SW, S, SE) held by agents heading the
    /// other way. `None` when the opposing sensor is disabled.
    pub opposing: Option<[bool; NEIGHBOUR_COUNT]>,
}

impl Observation {
    /// Number of values per cell in [`Observation::features`].
    pub const CELL_FEATURE_DIM: usize = 5;

    /// Cell at the given offset from the observer, if inside the window.
    pub fn cell(&self, offset: (i32, i32)) -> Option<&ObservedCell> {
        self.cells.iter().find(|c| c.offset == offset)
    }

    /// Other agents currently visible.
    pub fn visible_agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.cells.iter().filter_map(|c| match c.tag {
            CellTag::Agent(id) => Some(id),
            _ => None,
        })
    }

    /// Flat encoding for learners.
    ///
    /// ```text
    /// [goal_dr, goal_dc]
    /// ++ per cell [out_of_bounds, obstacle, agent, goal, changed]
    /// ++ opposing(8)
    /// ```
    pub fn features(&self) -> Vec<f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let mut v = Vec::with_capacity(
            2 + self.cells.len() * Self::CELL_FEATURE_DIM + NEIGHBOUR_COUNT,
        );
        v.push(self.goal_offset.0);
        v.push(self.goal_offset.1);
        for cell in &self.cells {
            v.push(flag(cell.tag == CellTag::OutOfBounds));
            v.push(flag(cell.tag == CellTag::Obstacle));
            v.push(flag(matches!(cell.tag, CellTag::Agent(_))));
            v.push(flag(cell.tag == CellTag::Goal));
            v.push(flag(cell.changed));
        }
        let mask = self.opposing.unwrap_or([false; NEIGHBOUR_COUNT]);
        v.extend(mask.iter().map(|&b| flag(b)));
        v
    }
}

/// Builds observations from the global occupancy map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorModel {
    pub radius: u32,
    pub metric: VisibilityMetric,
    pub opposing: bool,
}

impl SensorModel {
    pub fn new(radius: u32, metric: VisibilityMetric) -> Self {
        Self {
            radius,
            metric,
            opposing: false,
        }
    }

    pub fn with_opposing(mut self, enabled: bool) -> Self {
        self.opposing = enabled;
        self
    }

    /// Length of [`Observation::features`] for this model.
    pub fn feature_dim(&self) -> usize {
        2 + self.metric.offsets(self.radius).len() * Observation::CELL_FEATURE_DIM
            + NEIGHBOUR_COUNT
    }

    /// Observes the neighbourhood of `agent_id`.
    ///
    /// Pure read of `agents`, `grid` and `occupancy`. The agent does not need
    /// to be on the map (it may have just been removed at its goal); its
    /// recorded position is used as the window centre.
    pub fn observe(
        &self,
        agent_id: AgentId,
        agents: &BTreeMap<AgentId, AgentState>,
        grid: &Grid,
        occupancy: &OccupancyMap,
        previous: Option<&Observation>,
    ) -> Result<Observation> {
        let agent = agents
            .get(&agent_id)
            .ok_or(GridError::UnknownAgent(agent_id))?;
        let centre = agent.position;

        let previous_occupants: BTreeMap<Position, Option<AgentId>> = previous
            .map(|prev| {
                prev.cells
                    .iter()
                    .map(|c| (prev.position.offset(c.offset.0, c.offset.1), c.occupant))
                    .collect()
            })
            .unwrap_or_default();

        let cells = self
            .metric
            .offsets(self.radius)
            .into_iter()
            .map(|(dr, dc)| {
                let pos = centre.offset(dr, dc);
                let occupant = if (dr, dc) == (0, 0) && !occupancy.contains_agent(agent_id) {
                    Some(agent_id)
                } else {
                    occupancy.occupant(pos)
                };
                let tag = classify(grid, pos, occupant, agent);
                let changed = previous_occupants
                    .get(&pos)
                    .is_some_and(|before| *before != occupant);
                ObservedCell {
                    offset: (dr, dc),
                    tag,
                    occupant,
                    changed,
                }
            })
            .collect();

        let goal_offset = (
            f64::from(agent.goal.row - centre.row) / f64::from(grid.height()),
            f64::from(agent.goal.col - centre.col) / f64::from(grid.width()),
        );

        Ok(Observation {
            agent: agent_id,
            position: centre,
            goal: agent.goal,
            goal_offset,
            cells,
            opposing: self
                .opposing
                .then(|| opposing_mask(agent, agents, grid, occupancy)),
        })
    }
}

fn classify(
    grid: &Grid,
    pos: Position,
    occupant: Option<AgentId>,
    observer: &AgentState,
) -> CellTag {
    if !grid.contains(pos) {
        return CellTag::OutOfBounds;
    }
    if grid.is_blocked(pos) {
        return CellTag::Obstacle;
    }
    match occupant {
        Some(id) if id == observer.id => CellTag::SelfAgent,
        Some(id) => CellTag::Agent(id),
        None if pos == observer.goal => CellTag::Goal,
        None => CellTag::Empty,
    }
}
