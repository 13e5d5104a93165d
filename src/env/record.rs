//! Structured per-step and per-episode records.
//!
//! The kernel performs no I/O; callers forward these records to whatever
//! logging or aggregation they use.

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

use crate::grid::AgentId;
use crate::resolver::StepOutcome;
use crate::sensors::Observation;

/// Bookkeeping for one tick.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepInfo {
    /// Tick number after this step (1 for the first step).
    pub tick: u32,
    /// Agents the scheduler let act, in tie-break order.
    pub turn_order: Vec<AgentId>,
    /// Outcome per agent that was active at the start of the tick.
    pub outcomes: BTreeMap<AgentId, StepOutcome>,
    /// Agents that collided this tick.
    pub collisions: usize,
    /// Agents that reached their goal this tick.
    pub arrivals: Vec<AgentId>,
    /// The step budget ended the episode before every agent arrived.
    pub truncated: bool,
    /// Running totals for the episode.
    pub total_reward: f64,
    pub total_collisions: u32,
    pub total_arrivals: u32,
}

/// Result of a single environment step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepResult {
    /// Observation per agent that was active at the start of the tick.
    pub observations: BTreeMap<AgentId, Observation>,
    pub rewards: BTreeMap<AgentId, f64>,
    /// Per-agent termination: goal reached or episode over.
    pub dones: BTreeMap<AgentId, bool>,
    /// The episode is over.
    pub done: bool,
    pub info: StepInfo,
}

/// Summary of one episode.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EpisodeRecord {
    /// Derived from the reset seed, so replays share an id.
    pub episode_id: Uuid,
    pub seed: u64,
    /// Ticks elapsed.
    pub steps: u32,
    pub agents: usize,
    pub arrived: usize,
    /// Fraction of agents that reached their goal.
    pub success_rate: f64,
    pub collisions: u32,
    /// Tick of arrival per agent (`None` if it never arrived).
    pub steps_to_goal: BTreeMap<AgentId, Option<u32>>,
    pub total_reward: f64,
    pub finished: bool,
}

impl EpisodeRecord {
    /// Mean arrival tick over agents that arrived.
    pub fn mean_steps_to_goal(&self) -> Option<f64> {
        let arrived: Vec<u32> = self.steps_to_goal.values().filter_map(|s| *s).collect();
        if arrived.is_empty() {
            None
        } else {
            Some(arrived.iter().map(|&s| f64::from(s)).sum::<f64>() / arrived.len() as f64)
        }
    }
}

impl fmt::Display for EpisodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Episode {} (seed {}) ===", self.episode_id, self.seed)?;
        writeln!(f, "  Steps:                {}", self.steps)?;
        writeln!(
            f,
            "  Arrived:              {}/{} ({:.1}%)",
            self.arrived,
            self.agents,
            self.success_rate * 100.0
        )?;
        writeln!(f, "  Collisions:           {}", self.collisions)?;
        match self.mean_steps_to_goal() {
            Some(mean) => writeln!(f, "  Mean steps to goal:   {:.1}", mean)?,
            None => writeln!(f, "  Mean steps to goal:   -")?,
        }
        write!(f, "  Total reward:         {:.2}", self.total_reward)
    }
}
