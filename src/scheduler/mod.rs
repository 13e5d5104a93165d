//! Turn scheduling: which agents act each tick, and in what order.
//!
//! Both policies share one rotation of agent ids and a cursor into it.
//! [`SchedulerPolicy::CentralClock`] lets every active agent act and uses the
//! rotation starting at the cursor as the tie-break priority;
//! [`SchedulerPolicy::RoundRobin`] lets only the first active agent at or
//! after the cursor act. Removed agents keep their slot in the rotation and
//! are skipped, so the relative order of the others never shifts.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{GridError, Result};
use crate::grid::AgentId;


/// Turn-ordering policy selected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SchedulerPolicy {
    /// All agents act each tick; the order only breaks ties.
    #[default]
    CentralClock,
    /// One agent acts per tick, cycling through a fixed rotation.
    RoundRobin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    /// Waiting for `next_turn_order`.
    Ready,
    /// An order was handed out and `advance` is due.
    Issued,
}

#[derive(Debug, Clone)]
struct Slot {
    agent: AgentId,
    active: bool,
}

/// Deterministic turn scheduler.
///
/// # Lifecycle
///
/// 1. [`TurnScheduler::reset`] with the episode's agent ids.
/// 2. Each tick: [`TurnScheduler::next_turn_order`], then
///    [`TurnScheduler::advance`].
/// 3. [`TurnScheduler::remove`] agents that leave the episode.
///
/// ```
/// use gridflock::grid::AgentId;
/// use gridflock::scheduler::{SchedulerPolicy, TurnScheduler};
///
/// let mut clock = TurnScheduler::new(SchedulerPolicy::RoundRobin);
/// clock.reset(&[AgentId(0), AgentId(1)]).unwrap();
/// assert_eq!(clock.next_turn_order().unwrap(), vec![AgentId(0)]);
/// clock.advance().unwrap();
/// assert_eq!(clock.next_turn_order().unwrap(), vec![AgentId(1)]);
/// ```
#[derive(Debug, Clone)]
pub struct TurnScheduler {
    policy: SchedulerPolicy,
    phase: Phase,
    rotation: Vec<Slot>,
    cursor: usize,
    /// Rotation slot of the agent handed out by the last RoundRobin order.
    issued_slot: Option<usize>,
}

impl TurnScheduler {
    pub fn new(policy: SchedulerPolicy) -> Self {
        Self {
            policy,
            phase: Phase::Uninitialized,
            rotation: Vec::new(),
            cursor: 0,
            issued_slot: None,
        }
    }

    pub fn policy(&self) -> SchedulerPolicy {
        self.policy
    }

    pub fn is_initialized(&self) -> bool {
        self.phase != Phase::Uninitialized
    }

    /// Initializes the rotation from `agent_ids`, in the given order.
    pub fn reset(&mut self, agent_ids: &[AgentId]) -> Result<()> {
        if agent_ids.is_empty() {
            return Err(GridError::config("scheduler needs at least one agent"));
        }
        let mut seen = HashSet::with_capacity(agent_ids.len());
        if let Some(dup) = agent_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(GridError::config(format!(
                "{} appears twice in the rotation",
                dup
            )));
        }

        self.rotation = agent_ids
            .iter()
            .map(|&agent| Slot {
                agent,
                active: true,
            })
            .collect();
        self.cursor = 0;
        self.issued_slot = None;
        self.phase = Phase::Ready;
        Ok(())
    }

    fn require_initialized(&self) -> Result<()> {
        if self.phase == Phase::Uninitialized {
            return Err(GridError::state("scheduler used before reset"));
        }
        Ok(())
    }

    /// Rotation slots starting at the cursor, wrapping once around.
    fn slots_from_cursor(&self) -> impl Iterator<Item = usize> + '_ {
        let n = self.rotation.len();
        (0..n).map(move |k| (self.cursor + k) % n)
    }

    fn first_active_slot(&self) -> Option<usize> {
        self.slots_from_cursor().find(|&s| self.rotation[s].active)
    }

    fn compute_order(&self) -> Vec<AgentId> {
        match self.policy {
            SchedulerPolicy::CentralClock => self
                .slots_from_cursor()
                .filter(|&s| self.rotation[s].active)
                .map(|s| self.rotation[s].agent)
                .collect(),
            SchedulerPolicy::RoundRobin => self
                .first_active_slot()
                .map(|s| vec![self.rotation[s].agent])
                .unwrap_or_default(),
        }
    }

    /// Returns the agents acting this tick, in tie-break order.
    ///
    /// Calling it again before [`TurnScheduler::advance`] returns the same
    /// order.
    pub fn next_turn_order(&mut self) -> Result<Vec<AgentId>> {
        self.require_initialized()?;
        let order = self.compute_order();
        self.issued_slot = match self.policy {
            SchedulerPolicy::CentralClock => None,
            SchedulerPolicy::RoundRobin => self.first_active_slot(),
        };
        self.phase = Phase::Issued;
        Ok(order)
    }

    /// The order [`TurnScheduler::next_turn_order`] would return, without
    /// issuing it.
    pub fn peek_turn_order(&self) -> Result<Vec<AgentId>> {
        self.require_initialized()?;
        Ok(self.compute_order())
    }

    /// Moves the rotation forward by one tick.
    pub fn advance(&mut self) -> Result<()> {
        match self.phase {
            Phase::Uninitialized => Err(GridError::state("scheduler advanced before reset")),
            Phase::Ready => Err(GridError::state(
                "scheduler advanced twice without a turn order in between",
            )),
            Phase::Issued => {
                let n = self.rotation.len();
                self.cursor = match (self.policy, self.issued_slot) {
                    (SchedulerPolicy::RoundRobin, Some(slot)) => (slot + 1) % n,
                    (SchedulerPolicy::RoundRobin, None) => self.cursor,
                    (SchedulerPolicy::CentralClock, _) => (self.cursor + 1) % n,
                };
                self.issued_slot = None;
                self.phase = Phase::Ready;
                Ok(())
            }
        }
    }

    /// Skips `agent` in all future turn orders.
    pub fn remove(&mut self, agent: AgentId) -> Result<()> {
        self.require_initialized()?;
        let slot = self
            .rotation
            .iter_mut()
            .find(|s| s.agent == agent)
            .ok_or(GridError::UnknownAgent(agent))?;
        slot.active = false;
        Ok(())
    }

    pub fn is_active(&self, agent: AgentId) -> bool {
        self.rotation.iter().any(|s| s.agent == agent && s.active)
    }

    pub fn active_count(&self) -> usize {
        self.rotation.iter().filter(|s| s.active).count()
    }

    /// Full rotation, including removed agents.
    pub fn rotation(&self) -> Vec<AgentId> {
        self.rotation.iter().map(|s| s.agent).collect()
    }

    /// Replaces the rotation with an explicit permutation of the scheduled ids
    /// and restarts it from the first slot. Removed agents stay removed.
    pub fn reorder(&mut self, order: &[AgentId]) -> Result<()> {
        self.require_initialized()?;
        let current: HashSet<AgentId> = self.rotation.iter().map(|s| s.agent).collect();
        let proposed: HashSet<AgentId> = order.iter().copied().collect();
        if order.len() != self.rotation.len() || current != proposed {
            return Err(GridError::config(
                "new order must be a permutation of the scheduled agents",
            ));
        }

        let inactive: HashSet<AgentId> = self
            .rotation
            .iter()
            .filter(|s| !s.active)
            .map(|s| s.agent)
            .collect();
        self.rotation = order
            .iter()
            .map(|&agent| Slot {
                agent,
                active: !inactive.contains(&agent),
            })
            .collect();
        self.cursor = 0;
        self.issued_slot = None;
        self.phase = Phase::Ready;
        Ok(())
    }

    /// Randomly permutes the rotation using `rng`.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        self.require_initialized()?;
        let mut order = self.rotation();
        order.shuffle(rng);
        self.reorder(&order)
    }
}
