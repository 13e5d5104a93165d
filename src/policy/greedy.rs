//! Greedy goal-seeking baseline.
//!
//! Moves to the visible neighbour closest to the goal, skipping cells the
//! observation shows as impassable. Cells outside the window are assumed
//! free. If no move gets closer the agent stays.

use super::trait_::Policy;
use crate::grid::{Action, AgentId, MoveSet, Position};
use crate::sensors::Observation;

/// Greedy heuristic policy over the local observation.
///
/// Distance is Manhattan for [`MoveSet::Four`] and Chebyshev for
/// [`MoveSet::Eight`], matching the cost of an unobstructed path. Ties go to
/// the action with the lower index, which keeps the policy deterministic.
pub struct GreedyPolicy {
    moves: MoveSet,
}

impl GreedyPolicy {
    /// Creates a new greedy policy for the given move set.
    pub fn new(moves: MoveSet) -> Self {
        Self { moves }
    }

    fn distance(&self, from: Position, to: Position) -> u32 {
        match self.moves {
            MoveSet::Four => from.manhattan(&to),
            MoveSet::Eight => from.chebyshev(&to),
        }
    }
}

impl Policy for GreedyPolicy {
    fn choose_action(&mut self, _agent: AgentId, observation: &Observation) -> Action {
        let here = self.distance(observation.position, observation.goal);
        let mut best = (Action::Stay, here);

        for &action in self.moves.actions() {
            if action == Action::Stay {
                continue;
            }
            let open = observation
                .cell(action.offset())
                .map_or(true, |cell| cell.tag.is_passable());
            if !open {
                continue;
            }
            let d = self.distance(action.apply(observation.position), observation.goal);
            if d < best.1 {
                best = (action, d);
            }
        }
        best.0
    }

    fn name(&self) -> &str {
        "greedy"
    }
}
