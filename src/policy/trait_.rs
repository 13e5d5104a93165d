//! Policy trait consumed by the environment.

use crate::grid::{Action, AgentId};
use crate::sensors::Observation;

/// Chooses one action for one agent from its local observation.
///
/// The environment only calls a policy for agents the scheduler lets act
/// this tick, and only hands over that agent's own observation.
pub trait Policy: Send + Sync {
    /// Picks the next action for `agent`.
    ///
    /// # Arguments
    ///
    /// * `agent` - The acting agent
    /// * `observation` - Its most recent observation
    fn choose_action(&mut self, agent: AgentId, observation: &Observation) -> Action;

    /// Returns a human-readable name for this policy.
    fn name(&self) -> &str;
}
