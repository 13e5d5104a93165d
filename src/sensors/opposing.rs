//! Opposing-heading neighbour mask.
//!
//! Flags each of the eight neighbouring cells that is held by an agent whose
//! heading toward its own goal points against the observer's heading. These
//! are the agents most likely to produce head-on conflicts next tick.

use std::collections::BTreeMap;

use crate::agent::AgentState;
use crate::grid::{AgentId, Grid, Position};
use crate::occupancy::OccupancyMap;

pub const NEIGHBOUR_COUNT: usize = 8;

/// The eight neighbours of `pos` in NW, N, NE, W, E, SW, S, SE order.
pub fn neighbour_coords(pos: Position) -> [Position; NEIGHBOUR_COUNT] {
    [
        pos.offset(-1, -1),
        pos.offset(-1, 0),
        pos.offset(-1, 1),
        pos.offset(0, -1),
        pos.offset(0, 1),
        pos.offset(1, -1),
        pos.offset(1, 0),
        pos.offset(1, 1),
    ]
}

/// Out-of-bounds neighbours are reported as `false`.
pub fn opposing_mask(
    agent: &AgentState,
    agents: &BTreeMap<AgentId, AgentState>,
    grid: &Grid,
    occupancy: &OccupancyMap,
) -> [bool; NEIGHBOUR_COUNT] {
    let mut mask = [false; NEIGHBOUR_COUNT];
    for (slot, pos) in neighbour_coords(agent.position).into_iter().enumerate() {
        if !grid.contains(pos) {
            continue;
        }
        mask[slot] = occupancy
            .occupant(pos)
            .filter(|id| *id != agent.id)
            .and_then(|id| agents.get(&id))
            .is_some_and(|other| agent.opposes(other));
    }
    mask
}
