//! Collision resolution for one tick of proposed moves.
//!
//! Resolution runs in four passes over the pre-tick occupancy snapshot:
//!
//! 1. decode actions and reject moves into walls, obstacles or off the grid;
//! 2. reject convergent claims (two or more movers, one destination) and,
//!    unless enabled, swaps;
//! 3. repeatedly reject movers whose destination is held by an agent that
//!    ends up not moving, until nothing changes;
//! 4. commit all surviving moves to the occupancy map in one batch.
//!
//! Because every decision reads the snapshot, chained moves (A into the cell
//! B vacates) succeed exactly when B's move succeeds, independent of the
//! order in which proposals were submitted.

pub mod outcome;

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace, warn};

use crate::agent::AgentState;
use crate::config::{EnvConfig, RewardTable};
use crate::error::{GridError, Result};
use crate::grid::{Action, AgentId, DistanceField, Grid, MoveSet, Position};
use crate::occupancy::OccupancyMap;

pub use outcome::{Rejection, StepOutcome};

/// How convergent claims on one cell are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CollisionPolicy {
    /// Every claimant is rejected and penalized.
    #[default]
    Symmetric,
    /// The claimant first in tie-break order keeps the cell; the rest are
    /// rejected and penalized.
    PriorityWins,
}

/// One agent's proposal for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposal {
    pub agent: AgentId,
    /// Raw action index, validated against the move set during resolution.
    pub action: usize,
}

impl Proposal {
    pub fn new(agent: AgentId, action: Action) -> Self {
        Self {
            agent,
            action: action.index(),
        }
    }

    pub fn raw(agent: AgentId, action: usize) -> Self {
        Self { agent, action }
    }
}

/// Result of resolving one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// One outcome per agent that was on the map before the tick.
    pub outcomes: BTreeMap<AgentId, StepOutcome>,
    /// Agents that reached their goal this tick.
    pub arrivals: Vec<AgentId>,
}

impl Resolution {
    /// Number of agents that collided this tick.
    pub fn collisions(&self) -> usize {
        self.outcomes.values().filter(|o| o.collided).count()
    }
}

#[derive(Debug, Clone, Copy)]
enum Plan {
    Stationary,
    Moving(Position),
}

#[derive(Debug, Clone)]
struct Entry {
    from: Position,
    acted: bool,
    action: Option<Action>,
    plan: Plan,
    rejection: Option<Rejection>,
}

impl Entry {
    fn reject(&mut self, why: Rejection) {
        self.plan = Plan::Stationary;
        self.rejection = Some(why);
    }
}

/// Turns a batch of proposals into a conflict-free set of moves.
#[derive(Debug, Clone)]
pub struct CollisionResolver {
    pub rewards: RewardTable,
    pub policy: CollisionPolicy,
    pub allow_swaps: bool,
    pub moves: MoveSet,
    pub remove_on_goal: bool,
}

impl CollisionResolver {
    pub fn from_config(config: &EnvConfig) -> Self {
        Self {
            rewards: config.rewards,
            policy: config.collisions,
            allow_swaps: config.allow_swaps,
            moves: config.moves,
            remove_on_goal: config.remove_on_goal,
        }
    }

    /// Resolves `proposals` and commits the accepted moves to `occupancy`.
    ///
    /// `tie_break` is the scheduler's order for this tick; it only matters
    /// under [`CollisionPolicy::PriorityWins`]. `distances` holds each agent's
    /// cost-to-go field and drives the progress reward; agents without a
    /// field get no progress reward.
    ///
    /// Fails with `UnknownAgent` for a proposal naming an agent that is not
    /// on the map and `InvalidState` for a second proposal from one agent. On
    /// failure the occupancy map is unchanged.
    pub fn resolve(
        &self,
        proposals: &[Proposal],
        tie_break: &[AgentId],
        agents: &BTreeMap<AgentId, AgentState>,
        grid: &Grid,
        distances: &BTreeMap<AgentId, DistanceField>,
        occupancy: &mut OccupancyMap,
    ) -> Result<Resolution> {
        let snapshot = occupancy.clone();

        let mut entries: BTreeMap<AgentId, Entry> = snapshot
            .iter()
            .map(|(agent, from)| {
                (
                    agent,
                    Entry {
                        from,
                        acted: false,
                        action: None,
                        plan: Plan::Stationary,
                        rejection: None,
                    },
                )
            })
            .collect();

        // Pass 1: decode and check against the static world.
        for proposal in proposals {
            let entry = entries
                .get_mut(&proposal.agent)
                .ok_or(GridError::UnknownAgent(proposal.agent))?;
            if entry.acted {
                return Err(GridError::state(format!(
                    "{} submitted more than one proposal",
                    proposal.agent
                )));
            }
            entry.acted = true;

            let action = match Action::from_index(proposal.action, self.moves) {
                Ok(action) => action,
                Err(err) => {
                    warn!(agent = %proposal.agent, %err, "treating malformed action as stay");
                    entry.reject(Rejection::InvalidAction(proposal.action));
                    continue;
                }
            };
            entry.action = Some(action);
            if action == Action::Stay {
                continue;
            }

            let dest = action.apply(entry.from);
            if !grid.contains(dest) {
                entry.reject(Rejection::OutOfBounds);
            } else if grid.is_blocked(dest) {
                entry.reject(Rejection::Obstacle);
            } else {
                entry.plan = Plan::Moving(dest);
            }
        }

        // Pass 2: convergent claims and swaps, both judged on the same mover set.
        let rank: HashMap<AgentId, usize> = tie_break
            .iter()
            .enumerate()
            .map(|(i, a)| (*a, i))
            .collect();
        let mut claims: BTreeMap<Position, Vec<AgentId>> = BTreeMap::new();
        for (agent, entry) in &entries {
            if let Plan::Moving(dest) = entry.plan {
                claims.entry(dest).or_default().push(*agent);
            }
        }

        let mut rejected: BTreeMap<AgentId, Rejection> = BTreeMap::new();
        for (cell, mut claimants) in claims {
            if claimants.len() < 2 {
                continue;
            }
            trace!(%cell, claimants = claimants.len(), "convergent claim");
            let losers = match self.policy {
                CollisionPolicy::Symmetric => claimants,
                CollisionPolicy::PriorityWins => {
                    claimants.sort_by_key(|a| (rank.get(a).copied().unwrap_or(usize::MAX), *a));
                    claimants.split_off(1)
                }
            };
            for agent in losers {
                rejected.insert(agent, Rejection::Collision);
            }
        }

        if !self.allow_swaps {
            for (agent, entry) in &entries {
                let Plan::Moving(dest) = entry.plan else {
                    continue;
                };
                let Some(other) = snapshot.occupant(dest) else {
                    continue;
                };
                let swaps_back = entries
                    .get(&other)
                    .is_some_and(|o| matches!(o.plan, Plan::Moving(d) if d == entry.from));
                if swaps_back {
                    trace!(a = %agent, b = %other, "swap rejected");
                    rejected.entry(*agent).or_insert(Rejection::Swap);
                }
            }
        }

        for (agent, why) in rejected {
            if let Some(entry) = entries.get_mut(&agent) {
                entry.reject(why);
            }
        }

        // Pass 3: movers into cells whose holder stays put.
        loop {
            let blocked: Vec<AgentId> = entries
                .iter()
                .filter_map(|(agent, entry)| {
                    let Plan::Moving(dest) = entry.plan else {
                        return None;
                    };
                    let holder = snapshot.occupant(dest)?;
                    let holder_stays = holder != *agent
                        && entries
                            .get(&holder)
                            .is_some_and(|h| matches!(h.plan, Plan::Stationary));
                    holder_stays.then_some(*agent)
                })
                .collect();
            if blocked.is_empty() {
                break;
            }
            for agent in blocked {
                trace!(%agent, "move blocked by stationary agent");
                if let Some(entry) = entries.get_mut(&agent) {
                    entry.reject(Rejection::Blocked);
                }
            }
        }

        // Pass 4: outcomes, rewards and the atomic commit.
        let mut moves = Vec::new();
        let mut arrivals = Vec::new();
        let mut outcomes = BTreeMap::new();

        for (agent, entry) in &entries {
            let goal = agents.get(agent).map(|a| a.goal);
            let position = match entry.plan {
                Plan::Moving(dest) => {
                    moves.push((*agent, dest));
                    dest
                }
                Plan::Stationary => entry.from,
            };

            let mut outcome = StepOutcome::idle(*agent, entry.from);
            if entry.acted {
                let reached_goal = entry.rejection.is_none()
                    && position != entry.from
                    && goal == Some(position);
                if reached_goal {
                    arrivals.push(*agent);
                }
                outcome = StepOutcome {
                    acted: true,
                    action: entry.action,
                    accepted: entry.rejection.is_none(),
                    position,
                    reward: self.reward(entry, position, reached_goal, grid, distances.get(agent)),
                    collided: entry.rejection.is_some_and(|r| r.is_collision()),
                    reached_goal,
                    rejection: entry.rejection,
                    ..outcome
                };
            }
            outcomes.insert(*agent, outcome);
        }

        let removals: &[AgentId] = if self.remove_on_goal { &arrivals } else { &[] };
        occupancy.apply_batch(&moves, removals)?;

        let resolution = Resolution { outcomes, arrivals };
        debug!(
            proposals = proposals.len(),
            moved = moves.len(),
            collisions = resolution.collisions(),
            arrivals = resolution.arrivals.len(),
            "tick resolved"
        );
        Ok(resolution)
    }

    fn reward(
        &self,
        entry: &Entry,
        position: Position,
        reached_goal: bool,
        grid: &Grid,
        field: Option<&DistanceField>,
    ) -> f64 {
        let r = &self.rewards;
        match entry.rejection {
            Some(Rejection::InvalidAction(_)) => r.invalid_action_penalty,
            Some(Rejection::OutOfBounds | Rejection::Obstacle) => r.boundary_penalty,
            Some(_) => r.collision_penalty,
            None if position == entry.from => r.step_penalty,
            None => {
                let mut reward = r.step_penalty * grid.cost(position).unwrap_or(1.0);
                let progressed = field
                    .and_then(|f| Some((f.cost_from(entry.from)?, f.cost_from(position)?)))
                    .is_some_and(|(before, after)| after < before);
                if progressed {
                    reward += r.progress_reward;
                }
                if reached_goal {
                    reward += r.goal_reward;
                }
                reward
            }
        }
    }
}

#[cfg(test)]
mod tests;
