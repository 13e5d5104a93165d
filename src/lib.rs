//! gridflock - turn-based multi-agent grid-world simulation kernel
//!
//! Agents move on a discrete grid toward individual goals. Each tick a turn
//! scheduler decides who acts, a collision resolver turns the proposed moves
//! into a conflict-free set, and agents observe a local window around
//! themselves. The [`env::GridWorldEnv`] wraps all of it behind
//! `reset(seed)` / `step(actions)`.
//!
//! ```
//! use std::collections::BTreeMap;
//! use gridflock::{Action, AgentId, AgentSpawn, EnvConfig, GridWorldEnv, Placement};
//!
//! let config = EnvConfig {
//!     placement: Placement::Fixed(vec![
//!         AgentSpawn::new((0, 0), (0, 4)),
//!         AgentSpawn::new((0, 2), (4, 2)),
//!     ]),
//!     ..EnvConfig::default()
//! };
//! let mut env = GridWorldEnv::new(config)?;
//! env.reset(42)?;
//!
//! let actions = BTreeMap::from([(AgentId(0), Action::East), (AgentId(1), Action::West)]);
//! let result = env.step_actions(&actions)?;
//! assert_eq!(result.info.collisions, 2);
//! # Ok::<(), gridflock::GridError>(())
//! ```

pub mod agent;
pub mod config;
pub mod env;
pub mod error;
pub mod grid;
pub mod occupancy;
pub mod policy;
pub mod resolver;
pub mod scheduler;
pub mod sensors;

pub use agent::AgentState;
pub use config::{AgentSpawn, EnvConfig, Placement, RewardTable};
pub use env::{EpisodeRecord, GridWorldEnv, StepInfo, StepResult};
pub use error::{GridError, Result};
pub use grid::{Action, AgentId, DistanceField, Grid, MoveSet, Position};
pub use occupancy::OccupancyMap;
pub use policy::{GreedyPolicy, Policy, RandomPolicy};
pub use resolver::{CollisionPolicy, CollisionResolver, Rejection, StepOutcome};
pub use scheduler::{SchedulerPolicy, TurnScheduler};
pub use sensors::{CellTag, Observation, SensorModel, VisibilityMetric};
