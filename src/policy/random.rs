//! Random policy for testing and baselines.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::trait_::Policy;
use crate::grid::{Action, AgentId, MoveSet};
use crate::sensors::Observation;

/// Uniformly random action from the move set, including stay.
///
/// Seeded so that runs replay exactly.
pub struct RandomPolicy {
    moves: MoveSet,
    rng: StdRng,
}

impl RandomPolicy {
    /// Creates a new random policy.
    ///
    /// # Arguments
    ///
    /// * `moves` - Move set to draw from
    /// * `seed` - Seed for the policy's own generator
    pub fn new(moves: MoveSet, seed: u64) -> Self {
        Self {
            moves,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn choose_action(&mut self, _agent: AgentId, _observation: &Observation) -> Action {
        self.moves
            .actions()
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(Action::Stay)
    }

    fn name(&self) -> &str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Position;

    fn blank() -> Observation {
        Observation {
            agent: AgentId(0),
            position: Position::new(2, 2),
            goal: Position::new(0, 0),
            goal_offset: (-0.4, -0.4),
            cells: Vec::new(),
            opposing: None,
        }
    }

    #[test]
    fn random_policy_stays_in_move_set() {
        let mut policy = RandomPolicy::new(MoveSet::Four, 3);
        let obs = blank();
        for _ in 0..200 {
            let action = policy.choose_action(AgentId(0), &obs);
            assert!(action.index() < MoveSet::Four.action_count());
        }
    }

    #[test]
    fn random_policy_is_reproducible() {
        let obs = blank();
        let mut a = RandomPolicy::new(MoveSet::Eight, 11);
        let mut b = RandomPolicy::new(MoveSet::Eight, 11);
        let left: Vec<Action> = (0..50).map(|_| a.choose_action(AgentId(0), &obs)).collect();
        let right: Vec<Action> = (0..50).map(|_| b.choose_action(AgentId(0), &obs)).collect();
        assert_eq!(left, right);
    }
}
