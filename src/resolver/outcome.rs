//! Per-agent results of one resolved tick.

use std::fmt;

use crate::error::GridError;
use crate::grid::{Action, AgentId, Position};

/// Why a proposed move was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rejection {
    /// Destination lies outside the grid.
    OutOfBounds,
    /// Destination is a blocked cell.
    Obstacle,
    /// Two or more agents claimed the same destination.
    Collision,
    /// Two agents tried to exchange cells while swaps are disabled.
    Swap,
    /// Destination is held by an agent that does not move this tick.
    Blocked,
    /// The action index was outside the legal set; treated as stay.
    InvalidAction(usize),
}

impl Rejection {
    /// True for rejections caused by another agent.
    pub fn is_collision(&self) -> bool {
        matches!(self, Rejection::Collision | Rejection::Swap | Rejection::Blocked)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::OutOfBounds => write!(f, "out of bounds"),
            Rejection::Obstacle => write!(f, "obstacle"),
            Rejection::Collision => write!(f, "collision"),
            Rejection::Swap => write!(f, "swap"),
            Rejection::Blocked => write!(f, "blocked"),
            Rejection::InvalidAction(idx) => write!(f, "invalid action {}", idx),
        }
    }
}

/// What happened to one agent during a tick.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepOutcome {
    pub agent: AgentId,
    /// False for agents the scheduler did not let act this tick.
    pub acted: bool,
    /// Decoded action, if the agent acted with a legal one.
    pub action: Option<Action>,
    /// The proposal was carried out (a legal stay counts as accepted).
    pub accepted: bool,
    /// Cell before the tick.
    pub from: Position,
    /// Cell after the tick.
    pub position: Position,
    pub reward: f64,
    pub collided: bool,
    pub reached_goal: bool,
    pub rejection: Option<Rejection>,
}

impl StepOutcome {
    pub(crate) fn idle(agent: AgentId, at: Position) -> Self {
        Self {
            agent,
            acted: false,
            action: None,
            accepted: false,
            from: at,
            position: at,
            reward: 0.0,
            collided: false,
            reached_goal: false,
            rejection: None,
        }
    }

    pub fn moved(&self) -> bool {
        self.from != self.position
    }

    /// The recovered error for a malformed action, if any.
    pub fn error(&self) -> Option<GridError> {
        match self.rejection {
            Some(Rejection::InvalidAction(idx)) => Some(GridError::InvalidAction(idx)),
            _ => None,
        }
    }
}
