//! Configuration for the grid-world environment.
//!
//! Everything here is supplied at construction and stays fixed for the
//! lifetime of an episode.

use std::collections::HashSet;

use crate::error::{GridError, Result};
use crate::grid::distance::GridGraph;
use crate::grid::{Grid, MoveSet, Position};
use crate::resolver::CollisionPolicy;
use crate::scheduler::SchedulerPolicy;
use crate::sensors::VisibilityMetric;

/// Start and goal cell of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AgentSpawn {
    pub start: Position,
    pub goal: Position,
}

impl AgentSpawn {
    pub fn new(start: impl Into<Position>, goal: impl Into<Position>) -> Self {
        Self {
            start: start.into(),
            goal: goal.into(),
        }
    }
}

/// How agents and goals are placed on reset.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Placement {
    /// Fixed starts and goals; agent `i` gets id `i`.
    Fixed(Vec<AgentSpawn>),
    /// Seeded random placement on distinct open cells with reachable goals.
    Random { agents: u32 },
}

impl Placement {
    pub fn agent_count(&self) -> usize {
        match self {
            Placement::Fixed(spawns) => spawns.len(),
            Placement::Random { agents } => *agents as usize,
        }
    }
}

/// Reward and penalty values handed out by the collision resolver.
///
/// Values are signed: penalties are negative.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RewardTable {
    /// Paid every tick an agent acts; scaled by the entered cell's cost on a move.
    pub step_penalty: f64,
    /// Bonus for an accepted move that lowers the cost-to-go.
    pub progress_reward: f64,
    /// Terminal bonus on goal arrival.
    pub goal_reward: f64,
    /// Penalty for convergent, swap or blocked collisions.
    pub collision_penalty: f64,
    /// Penalty for trying to leave the grid or enter an obstacle.
    pub boundary_penalty: f64,
    /// Penalty for an action index outside the legal set.
    pub invalid_action_penalty: f64,
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            step_penalty: -1.0,
            progress_reward: 0.5,
            goal_reward: 100.0,
            collision_penalty: -100.0,
            boundary_penalty: -10.0,
            invalid_action_penalty: -10.0,
        }
    }
}

impl RewardTable {
    fn values(&self) -> [f64; 6] {
        [
            self.step_penalty,
            self.progress_reward,
            self.goal_reward,
            self.collision_penalty,
            self.boundary_penalty,
            self.invalid_action_penalty,
        ]
    }
}

/// Configuration of a [`crate::env::GridWorldEnv`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvConfig {
    // --- World ---
    pub grid: Grid,
    pub placement: Placement,
    pub moves: MoveSet,

    // --- Sensing ---
    /// Radius of the observation window around each agent.
    pub visibility_radius: u32,
    pub visibility_metric: VisibilityMetric,
    /// Attach the opposing-heading neighbour mask to observations.
    pub opposing_sensor: bool,

    // --- Scheduling and resolution ---
    pub scheduler: SchedulerPolicy,
    pub collisions: CollisionPolicy,
    /// Permit two agents to exchange cells in one tick.
    pub allow_swaps: bool,

    // --- Episode ---
    pub rewards: RewardTable,
    /// Maximum number of ticks per episode.
    pub step_budget: u32,
    /// Take agents off the map once they reach their goal.
    pub remove_on_goal: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            grid: Grid::default(),
            placement: Placement::Random { agents: 4 },
            moves: MoveSet::Four,
            visibility_radius: 1,
            visibility_metric: VisibilityMetric::Chebyshev,
            opposing_sensor: true,
            scheduler: SchedulerPolicy::CentralClock,
            collisions: CollisionPolicy::Symmetric,
            allow_swaps: false,
            rewards: RewardTable::default(),
            step_budget: 100,
            remove_on_goal: true,
        }
    }
}

impl EnvConfig {
    /// Checks the configuration for placement and value errors.
    pub fn validate(&self) -> Result<()> {
        self.grid.check_layout()?;
        let max_radius = self.grid.width().max(self.grid.height());
        if self.visibility_radius > max_radius {
            return Err(GridError::config(format!(
                "visibility radius {} exceeds the grid's larger side {}",
                self.visibility_radius, max_radius
            )));
        }
        if self.step_budget == 0 {
            return Err(GridError::config("step budget must be positive"));
        }
        if self.rewards.values().iter().any(|v| !v.is_finite()) {
            return Err(GridError::config("reward table values must be finite"));
        }

        match &self.placement {
            Placement::Random { agents } => {
                if *agents == 0 {
                    return Err(GridError::config("at least one agent is required"));
                }
                let free = self.grid.free_cells().count();
                if free < 2 * *agents as usize {
                    return Err(GridError::config(format!(
                        "{} agents need {} open cells for starts and goals, grid has {}",
                        agents,
                        2 * agents,
                        free
                    )));
                }
            }
            Placement::Fixed(spawns) => self.validate_spawns(spawns)?,
        }
        Ok(())
    }

    fn validate_spawns(&self, spawns: &[AgentSpawn]) -> Result<()> {
        if spawns.is_empty() {
            return Err(GridError::config("at least one agent is required"));
        }

        let mut starts = HashSet::new();
        for (i, spawn) in spawns.iter().enumerate() {
            for (what, pos) in [("start", spawn.start), ("goal", spawn.goal)] {
                if !self.grid.contains(pos) {
                    return Err(GridError::config(format!(
                        "agent {} {} {} is outside the grid",
                        i, what, pos
                    )));
                }
                if self.grid.is_blocked(pos) {
                    return Err(GridError::config(format!(
                        "agent {} {} {} is an obstacle",
                        i, what, pos
                    )));
                }
            }
            if spawn.start == spawn.goal {
                return Err(GridError::config(format!(
                    "agent {} starts on its goal {}",
                    i, spawn.goal
                )));
            }
            if !starts.insert(spawn.start) {
                return Err(GridError::config(format!(
                    "agent {} shares start cell {} with another agent",
                    i, spawn.start
                )));
            }
        }

        let graph = GridGraph::new(&self.grid, self.moves);
        for (i, spawn) in spawns.iter().enumerate() {
            if !graph
                .distance_field(&self.grid, spawn.goal)
                .is_reachable(spawn.start)
            {
                return Err(GridError::config(format!(
                    "agent {} cannot reach goal {} from {}",
                    i, spawn.goal, spawn.start
                )));
            }
        }
        Ok(())
    }

    /// Number of agents placed on reset.
    pub fn agent_count(&self) -> usize {
        self.placement.agent_count()
    }
}
