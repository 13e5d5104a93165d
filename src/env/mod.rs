//! Multi-agent grid-world environment.
//!
//! Ties the kernel together: placement at reset, the turn scheduler, the
//! collision resolver and the sensor model. One call to
//! [`GridWorldEnv::step`] advances exactly one tick.

pub mod record;

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::agent::AgentState;
use crate::config::{AgentSpawn, EnvConfig, Placement};
use crate::error::{GridError, Result};
use crate::grid::{Action, AgentId, DistanceField, Grid, GridGraph, Position};
use crate::occupancy::OccupancyMap;
use crate::policy::Policy;
use crate::resolver::{CollisionResolver, Proposal};
use crate::scheduler::TurnScheduler;
use crate::sensors::{Observation, SensorModel};

pub use record::{EpisodeRecord, StepInfo, StepResult};

/// Shuffles tried before random placement gives up on reachable goals.
const MAX_PLACEMENT_ATTEMPTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Finished,
}

/// The multi-agent navigation environment.
///
/// # Lifecycle
///
/// 1. Call [`GridWorldEnv::new`] with a configuration.
/// 2. Call [`GridWorldEnv::reset`] with a seed to place agents and goals.
/// 3. Call [`GridWorldEnv::step`] (or [`GridWorldEnv::step_with`]) until the
///    returned `done` flag is set.
/// 4. Read the summary with [`GridWorldEnv::episode_record`].
#[derive(Debug)]
pub struct GridWorldEnv {
    config: EnvConfig,
    grid: Arc<Grid>,
    graph: GridGraph,
    sensors: SensorModel,
    resolver: CollisionResolver,
    scheduler: TurnScheduler,
    occupancy: OccupancyMap,
    agents: BTreeMap<AgentId, AgentState>,
    distances: BTreeMap<AgentId, DistanceField>,
    observations: BTreeMap<AgentId, Observation>,
    phase: Phase,
    tick: u32,
    seed: u64,
    episode_id: Uuid,
    total_reward: f64,
    total_collisions: u32,
    total_arrivals: u32,
}

impl GridWorldEnv {
    /// Creates an environment after validating `config`.
    ///
    /// # Arguments
    ///
    /// * `config` - World, placement, reward and policy settings
    pub fn new(config: EnvConfig) -> Result<Self> {
        config.validate()?;
        let grid = Arc::new(config.grid.clone());
        let graph = GridGraph::new(&grid, config.moves);
        let sensors = SensorModel::new(config.visibility_radius, config.visibility_metric)
            .with_opposing(config.opposing_sensor);
        let resolver = CollisionResolver::from_config(&config);
        let scheduler = TurnScheduler::new(config.scheduler);
        let occupancy = OccupancyMap::new(&grid);

        Ok(Self {
            config,
            grid,
            graph,
            sensors,
            resolver,
            scheduler,
            occupancy,
            agents: BTreeMap::new(),
            distances: BTreeMap::new(),
            observations: BTreeMap::new(),
            phase: Phase::Idle,
            tick: 0,
            seed: 0,
            episode_id: Uuid::nil(),
            total_reward: 0.0,
            total_collisions: 0,
            total_arrivals: 0,
        })
    }

    /// Starts a new episode and returns the initial observation per agent.
    ///
    /// Agents are numbered from zero in placement order. With random
    /// placement the same seed always produces the same starts and goals.
    ///
    /// # Arguments
    ///
    /// * `seed` - Seed for placement and the episode id
    pub fn reset(&mut self, seed: u64) -> Result<BTreeMap<AgentId, Observation>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let (spawns, distances) = match &self.config.placement {
            Placement::Fixed(spawns) => {
                let distances: Vec<DistanceField> = spawns
                    .iter()
                    .map(|s| self.graph.distance_field(&self.grid, s.goal))
                    .collect();
                (spawns.clone(), distances)
            }
            Placement::Random { agents } => self.random_spawns(*agents as usize, &mut rng)?,
        };

        let mut occupancy = OccupancyMap::new(&self.grid);
        let mut agents = BTreeMap::new();
        let mut fields = BTreeMap::new();
        for (i, (spawn, field)) in spawns.iter().zip(distances).enumerate() {
            let id = AgentId(i as u32);
            occupancy.place(id, spawn.start)?;
            agents.insert(id, AgentState::new(id, spawn.start, spawn.goal));
            fields.insert(id, field);
        }
        let ids: Vec<AgentId> = agents.keys().copied().collect();
        self.scheduler.reset(&ids)?;

        self.occupancy = occupancy;
        self.agents = agents;
        self.distances = fields;
        self.phase = Phase::Running;
        self.tick = 0;
        self.seed = seed;
        self.episode_id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
        self.total_reward = 0.0;
        self.total_collisions = 0;
        self.total_arrivals = 0;

        let mut observations = BTreeMap::new();
        for id in &ids {
            let obs = self
                .sensors
                .observe(*id, &self.agents, &self.grid, &self.occupancy, None)?;
            observations.insert(*id, obs);
        }
        self.observations = observations.clone();

        debug!(
            episode = %self.episode_id,
            seed,
            agents = ids.len(),
            scheduler = ?self.config.scheduler,
            "episode reset"
        );
        Ok(observations)
    }

    /// Draws distinct starts and goals from the free cells until every goal
    /// is reachable from its start.
    fn random_spawns(
        &self,
        count: usize,
        rng: &mut StdRng,
    ) -> Result<(Vec<AgentSpawn>, Vec<DistanceField>)> {
        let mut cells: Vec<Position> = self.grid.free_cells().collect();
        if cells.len() < 2 * count {
            return Err(GridError::config(format!(
                "{} agents need {} free cells, grid has {}",
                count,
                2 * count,
                cells.len()
            )));
        }

        for attempt in 0..MAX_PLACEMENT_ATTEMPTS {
            cells.shuffle(rng);
            let (starts, rest) = cells.split_at(count);
            let goals = &rest[..count];

            let fields: Vec<DistanceField> = goals
                .iter()
                .map(|g| self.graph.distance_field(&self.grid, *g))
                .collect();
            if starts
                .iter()
                .zip(&fields)
                .all(|(start, field)| field.is_reachable(*start))
            {
                let spawns = starts
                    .iter()
                    .zip(goals)
                    .map(|(s, g)| AgentSpawn::new(*s, *g))
                    .collect();
                return Ok((spawns, fields));
            }
            trace!(attempt, "placement had an unreachable goal, reshuffling");
        }

        Err(GridError::config(format!(
            "no placement with reachable goals after {} attempts",
            MAX_PLACEMENT_ATTEMPTS
        )))
    }

    /// Advances one tick.
    ///
    /// `actions` maps agents to raw action indices. Only agents the
    /// scheduler lets act this tick are consulted; an acting agent without
    /// an entry stays put. Malformed indices are penalized as a stay.
    ///
    /// # Errors
    ///
    /// `InvalidState` before [`reset`](Self::reset) or once the episode is
    /// over, `UnknownAgent` for an entry naming an unknown or inactive
    /// agent. Nothing changes when an error is returned.
    pub fn step(&mut self, actions: &BTreeMap<AgentId, usize>) -> Result<StepResult> {
        self.ensure_running()?;
        for agent in actions.keys() {
            if !self.agents.get(agent).is_some_and(|a| a.active) {
                return Err(GridError::UnknownAgent(*agent));
            }
        }

        let order = self.scheduler.next_turn_order()?;
        let proposals: Vec<Proposal> = order
            .iter()
            .map(|agent| {
                let action = actions
                    .get(agent)
                    .copied()
                    .unwrap_or(Action::Stay.index());
                Proposal::raw(*agent, action)
            })
            .collect();
        for agent in actions.keys().filter(|a| !order.contains(*a)) {
            trace!(%agent, "ignoring action from agent without a turn");
        }

        let resolution = self.resolver.resolve(
            &proposals,
            &order,
            &self.agents,
            &self.grid,
            &self.distances,
            &mut self.occupancy,
        )?;
        self.scheduler.advance()?;
        self.tick += 1;

        let participants: Vec<AgentId> = self
            .agents
            .values()
            .filter(|a| a.active)
            .map(|a| a.id)
            .collect();

        let mut outcomes = BTreeMap::new();
        let mut rewards = BTreeMap::new();
        for id in &participants {
            let Some(outcome) = resolution.outcomes.get(id) else {
                continue;
            };
            if let Some(agent) = self.agents.get_mut(id) {
                agent.position = outcome.position;
                agent.total_reward += outcome.reward;
                if outcome.acted {
                    agent.steps += 1;
                }
                if outcome.collided {
                    agent.collisions += 1;
                }
            }
            rewards.insert(*id, outcome.reward);
            outcomes.insert(*id, outcome.clone());
        }

        for id in &resolution.arrivals {
            if let Some(agent) = self.agents.get_mut(id) {
                agent.active = false;
                agent.arrived_at = Some(self.tick);
            }
            self.scheduler.remove(*id)?;
            debug!(agent = %id, tick = self.tick, "agent reached goal");
        }

        let all_arrived = self.agents.values().all(|a| a.arrived_at.is_some());
        let out_of_budget = self.tick >= self.config.step_budget;
        let done = all_arrived || out_of_budget;
        if done {
            self.phase = Phase::Finished;
            for agent in self.agents.values_mut() {
                agent.active = false;
            }
        }

        let collisions = resolution.collisions();
        let step_reward: f64 = rewards.values().sum();
        self.total_reward += step_reward;
        self.total_collisions += collisions as u32;
        self.total_arrivals += resolution.arrivals.len() as u32;

        let mut observations = BTreeMap::new();
        for id in &participants {
            let obs = self.sensors.observe(
                *id,
                &self.agents,
                &self.grid,
                &self.occupancy,
                self.observations.get(id),
            )?;
            observations.insert(*id, obs);
        }
        self.observations.extend(observations.clone());

        let dones = participants
            .iter()
            .map(|id| (*id, self.agents.get(id).is_some_and(|a| !a.active)))
            .collect();

        debug!(
            tick = self.tick,
            acted = order.len(),
            reward = step_reward,
            collisions,
            arrivals = resolution.arrivals.len(),
            done,
            "step"
        );

        Ok(StepResult {
            observations,
            rewards,
            dones,
            done,
            info: StepInfo {
                tick: self.tick,
                turn_order: order,
                outcomes,
                collisions,
                arrivals: resolution.arrivals,
                truncated: done && !all_arrived,
                total_reward: self.total_reward,
                total_collisions: self.total_collisions,
                total_arrivals: self.total_arrivals,
            },
        })
    }

    /// [`step`](Self::step) with typed actions.
    pub fn step_actions(&mut self, actions: &BTreeMap<AgentId, Action>) -> Result<StepResult> {
        let raw = actions.iter().map(|(id, a)| (*id, a.index())).collect();
        self.step(&raw)
    }

    /// Asks `policy` for an action for each agent acting this tick, then
    /// steps.
    pub fn step_with(&mut self, policy: &mut dyn Policy) -> Result<StepResult> {
        self.ensure_running()?;
        let order = self.scheduler.peek_turn_order()?;
        let mut actions = BTreeMap::new();
        for agent in order {
            let obs = self
                .observations
                .get(&agent)
                .ok_or(GridError::UnknownAgent(agent))?;
            actions.insert(agent, policy.choose_action(agent, obs).index());
        }
        self.step(&actions)
    }

    fn ensure_running(&self) -> Result<()> {
        match self.phase {
            Phase::Idle => Err(GridError::state("step called before reset")),
            Phase::Finished => Err(GridError::state("episode is over, call reset")),
            Phase::Running => Ok(()),
        }
    }

    /// Summary of the current (or just finished) episode.
    pub fn episode_record(&self) -> EpisodeRecord {
        let steps_to_goal: BTreeMap<AgentId, Option<u32>> = self
            .agents
            .values()
            .map(|a| (a.id, a.arrived_at))
            .collect();
        let arrived = steps_to_goal.values().filter(|s| s.is_some()).count();
        let success_rate = if self.agents.is_empty() {
            0.0
        } else {
            arrived as f64 / self.agents.len() as f64
        };

        EpisodeRecord {
            episode_id: self.episode_id,
            seed: self.seed,
            steps: self.tick,
            agents: self.agents.len(),
            arrived,
            success_rate,
            collisions: self.total_collisions,
            steps_to_goal,
            total_reward: self.total_reward,
            finished: self.phase == Phase::Finished,
        }
    }

    /// ASCII picture of the world.
    ///
    /// Obstacles are `#`, agents are drawn by id (`0`-`9`, then `a`-`z`,
    /// `@` beyond) and goals of active agents as `*`. Every other cell is
    /// `.` whatever its traversal cost.
    pub fn render(&self) -> String {
        let mut canvas: Vec<Vec<char>> = (0..self.grid.height())
            .map(|row| {
                (0..self.grid.width())
                    .map(|col| {
                        if self.grid.is_blocked(Position::new(row as i32, col as i32)) {
                            '#'
                        } else {
                            '.'
                        }
                    })
                    .collect()
            })
            .collect();

        let mut paint = |pos: Position, glyph: char| {
            if let Some(cell) = canvas
                .get_mut(pos.row as usize)
                .and_then(|row| row.get_mut(pos.col as usize))
            {
                *cell = glyph;
            }
        };
        for agent in self.agents.values().filter(|a| a.active) {
            paint(agent.goal, '*');
        }
        for (id, pos) in self.occupancy.iter() {
            paint(pos, agent_glyph(id));
        }

        canvas
            .into_iter()
            .map(|row| row.into_iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Shared handle to the static grid.
    pub fn grid(&self) -> Arc<Grid> {
        Arc::clone(&self.grid)
    }

    pub fn agents(&self) -> &BTreeMap<AgentId, AgentState> {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&AgentState> {
        self.agents.get(&id)
    }

    pub fn occupancy(&self) -> &OccupancyMap {
        &self.occupancy
    }

    pub fn scheduler(&self) -> &TurnScheduler {
        &self.scheduler
    }

    /// Latest observation per agent.
    pub fn observations(&self) -> &BTreeMap<AgentId, Observation> {
        &self.observations
    }

    /// Cost-to-go field toward `id`'s goal.
    pub fn distance_field(&self, id: AgentId) -> Option<&DistanceField> {
        self.distances.get(&id)
    }

    /// Ticks elapsed in the current episode.
    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Length of [`Observation::features`] under this configuration.
    pub fn observation_dim(&self) -> usize {
        self.sensors.feature_dim()
    }
}

fn agent_glyph(id: AgentId) -> char {
    match id.0 {
        n @ 0..=9 => char::from(b'0' + n as u8),
        n @ 10..=35 => char::from(b'a' + (n - 10) as u8),
        _ => '@',
    }
}
