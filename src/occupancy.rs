//! Authoritative cell ↔ agent assignment.
//!
//! The map keeps two indices in lockstep: a dense row-major vector of cell
//! occupants and an ordered agent → cell map. Batch updates are built on a
//! copy and swapped in only after the whole batch has been checked, so a
//! failed update leaves the map untouched.

use std::collections::BTreeMap;

use crate::error::{GridError, Result};
use crate::grid::{AgentId, Grid, Position};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyMap {
    width: u32,
    height: u32,
    cells: Vec<Option<AgentId>>,
    positions: BTreeMap<AgentId, Position>,
}

impl OccupancyMap {
    /// Creates an empty map sized to `grid`.
    pub fn new(grid: &Grid) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            cells: vec![None; grid.cell_count()],
            positions: BTreeMap::new(),
        }
    }

    fn index(&self, pos: Position) -> Option<usize> {
        (pos.row >= 0
            && pos.col >= 0
            && (pos.row as u32) < self.height
            && (pos.col as u32) < self.width)
            .then(|| pos.row as usize * self.width as usize + pos.col as usize)
    }

    /// Agent standing on `pos`, if any. Out-of-bounds cells are never occupied.
    pub fn occupant(&self, pos: Position) -> Option<AgentId> {
        self.index(pos).and_then(|i| self.cells[i])
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        self.occupant(pos).is_some()
    }

    pub fn position_of(&self, agent: AgentId) -> Option<Position> {
        self.positions.get(&agent).copied()
    }

    pub fn contains_agent(&self, agent: AgentId) -> bool {
        self.positions.contains_key(&agent)
    }

    /// Number of agents on the map.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Agents and their cells in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, Position)> + '_ {
        self.positions.iter().map(|(a, p)| (*a, *p))
    }

    /// Puts a new agent on an empty cell.
    pub fn place(&mut self, agent: AgentId, pos: Position) -> Result<()> {
        let idx = self.index(pos).ok_or_else(|| {
            GridError::config(format!(
                "cannot place {} outside the grid at {}",
                agent, pos
            ))
        })?;
        if self.positions.contains_key(&agent) {
            return Err(GridError::state(format!("{} is already on the map", agent)));
        }
        if let Some(other) = self.cells[idx] {
            return Err(GridError::state(format!(
                "cell {} is already occupied by {}",
                pos, other
            )));
        }
        self.cells[idx] = Some(agent);
        self.positions.insert(agent, pos);
        Ok(())
    }

    /// Takes an agent off the map, returning the cell it vacated.
    pub fn remove(&mut self, agent: AgentId) -> Option<Position> {
        let pos = self.positions.remove(&agent)?;
        if let Some(idx) = self.index(pos) {
            self.cells[idx] = None;
        }
        Some(pos)
    }

    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = None);
        self.positions.clear();
    }

    /// Applies a batch of moves and removals as one atomic update.
    ///
    /// Every mover must already be on the map. Agents not named in the batch
    /// keep their cells. The resulting assignment must hold at most one agent
    /// per cell; otherwise nothing is changed and `InvalidState` is returned.
    pub fn apply_batch(
        &mut self,
        moves: &[(AgentId, Position)],
        removals: &[AgentId],
    ) -> Result<()> {
        let mut positions = self.positions.clone();

        for (agent, dest) in moves {
            if self.index(*dest).is_none() {
                return Err(GridError::state(format!(
                    "move of {} targets {} outside the grid",
                    agent, dest
                )));
            }
            match positions.get_mut(agent) {
                Some(pos) => *pos = *dest,
                None => return Err(GridError::UnknownAgent(*agent)),
            }
        }
        // Removals apply after moves, so an agent may move and leave in one batch.
        for agent in removals {
            if positions.remove(agent).is_none() {
                return Err(GridError::UnknownAgent(*agent));
            }
        }

        let mut cells = vec![None; self.cells.len()];
        for (agent, pos) in &positions {
            // Bounds were checked above for movers and hold for everyone else.
            let Some(idx) = self.index(*pos) else {
                return Err(GridError::state(format!("{} is outside the grid", agent)));
            };
            if let Some(other) = cells[idx] {
                return Err(GridError::state(format!(
                    "batch would put {} and {} on {}",
                    other, agent, pos
                )));
            }
            cells[idx] = Some(*agent);
        }

        self.cells = cells;
        self.positions = positions;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> OccupancyMap {
        let grid = Grid::new(3, 3).unwrap();
        let mut map = OccupancyMap::new(&grid);
        map.place(AgentId(0), Position::new(0, 0)).unwrap();
        map.place(AgentId(1), Position::new(0, 1)).unwrap();
        map
    }

    #[test]
    fn lookup_both_directions() {
        let map = map();
        assert_eq!(map.occupant(Position::new(0, 1)), Some(AgentId(1)));
        assert_eq!(map.position_of(AgentId(0)), Some(Position::new(0, 0)));
        assert_eq!(map.occupant(Position::new(2, 2)), None);
        assert_eq!(map.occupant(Position::new(-1, 0)), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn place_on_occupied_cell_fails() {
        let mut map = map();
        let err = map.place(AgentId(2), Position::new(0, 0)).unwrap_err();
        assert!(matches!(err, GridError::InvalidState(_)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn place_twice_fails() {
        let mut map = map();
        assert!(map.place(AgentId(0), Position::new(2, 2)).is_err());
    }

    #[test]
    fn remove_frees_cell() {
        let mut map = map();
        assert_eq!(map.remove(AgentId(1)), Some(Position::new(0, 1)));
        assert!(!map.is_occupied(Position::new(0, 1)));
        assert_eq!(map.remove(AgentId(1)), None);
    }

    #[test]
    fn chained_batch_moves_into_vacated_cell() {
        let mut map = map();
        // 0 follows 1 eastward along row 0.
        map.apply_batch(
            &[
                (AgentId(0), Position::new(0, 1)),
                (AgentId(1), Position::new(0, 2)),
            ],
            &[],
        )
        .unwrap();
        assert_eq!(map.position_of(AgentId(0)), Some(Position::new(0, 1)));
        assert_eq!(map.position_of(AgentId(1)), Some(Position::new(0, 2)));
        assert_eq!(map.occupant(Position::new(0, 0)), None);
    }

    #[test]
    fn conflicting_batch_leaves_map_untouched() {
        let mut map = map();
        let before = map.clone();
        let err = map
            .apply_batch(&[(AgentId(0), Position::new(0, 1))], &[])
            .unwrap_err();
        assert!(matches!(err, GridError::InvalidState(_)));
        assert_eq!(map, before);
    }

    #[test]
    fn batch_with_unknown_agent_fails() {
        let mut map = map();
        let err = map
            .apply_batch(&[(AgentId(9), Position::new(2, 2))], &[])
            .unwrap_err();
        assert_eq!(err, GridError::UnknownAgent(AgentId(9)));
    }

    #[test]
    fn batch_removal_and_move_together() {
        let mut map = map();
        map.apply_batch(&[(AgentId(0), Position::new(0, 1))], &[AgentId(1)])
            .unwrap();
        assert_eq!(map.occupant(Position::new(0, 1)), Some(AgentId(0)));
        assert!(!map.contains_agent(AgentId(1)));
    }

    #[test]
    fn agent_can_move_and_leave_in_one_batch() {
        let mut map = map();
        map.apply_batch(&[(AgentId(1), Position::new(1, 1))], &[AgentId(1)])
            .unwrap();
        assert!(!map.contains_agent(AgentId(1)));
        assert_eq!(map.occupant(Position::new(1, 1)), None);
        assert_eq!(map.len(), 1);
    }
}
