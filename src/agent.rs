//! Per-agent episode state.

use crate::grid::{AgentId, Position};

/// State of a single agent in the grid world.
///
/// Owned by the environment, updated from resolver outcomes each tick and
/// read (never written) by the sensors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AgentState {
    /// Unique identifier, stable for the episode.
    pub id: AgentId,
    /// Current cell.
    pub position: Position,
    /// Target cell.
    pub goal: Position,
    /// False once the agent reached its goal or the episode ended.
    pub active: bool,
    /// Ticks in which this agent was scheduled to act.
    pub steps: u32,
    /// Reward accumulated this episode.
    pub total_reward: f64,
    /// Collisions this agent was involved in.
    pub collisions: u32,
    /// Tick on which the goal was reached.
    pub arrived_at: Option<u32>,
}

impl AgentState {
    pub fn new(id: AgentId, position: Position, goal: Position) -> Self {
        Self {
            id,
            position,
            goal,
            active: true,
            steps: 0,
            total_reward: 0.0,
            collisions: 0,
            arrived_at: None,
        }
    }

    pub fn at_goal(&self) -> bool {
        self.position == self.goal
    }

    /// Sign of the displacement toward the goal, per axis.
    pub fn heading(&self) -> (i32, i32) {
        (
            (self.goal.row - self.position.row).signum(),
            (self.goal.col - self.position.col).signum(),
        )
    }

    /// True when the two agents are heading in opposite directions.
    pub fn opposes(&self, other: &AgentState) -> bool {
        let (a_r, a_c) = self.heading();
        let (b_r, b_c) = other.heading();
        a_r * b_r + a_c * b_c < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_points_to_goal() {
        let a = AgentState::new(AgentId(0), Position::new(3, 1), Position::new(0, 4));
        assert_eq!(a.heading(), (-1, 1));
        assert!(!a.at_goal());
    }

    #[test]
    fn opposing_headings() {
        let east = AgentState::new(AgentId(0), Position::new(2, 0), Position::new(2, 4));
        let west = AgentState::new(AgentId(1), Position::new(2, 3), Position::new(2, 0));
        let north = AgentState::new(AgentId(2), Position::new(4, 2), Position::new(0, 2));
        assert!(east.opposes(&west));
        assert!(west.opposes(&east));
        assert!(!east.opposes(&north));
    }
}
