//! Test suite for collision resolution.

use super::*;
use crate::grid::distance::GridGraph;

struct Fixture {
    grid: Grid,
    agents: BTreeMap<AgentId, AgentState>,
    occupancy: OccupancyMap,
    distances: BTreeMap<AgentId, DistanceField>,
    resolver: CollisionResolver,
}

impl Fixture {
    /// `agents[i]` is `(start, goal)` of agent `i`.
    fn new(grid: Grid, agents: &[((i32, i32), (i32, i32))]) -> Self {
        let config = EnvConfig::default();
        let mut occupancy = OccupancyMap::new(&grid);
        let mut states = BTreeMap::new();
        for (i, (start, goal)) in agents.iter().enumerate() {
            let id = AgentId(i as u32);
            occupancy.place(id, (*start).into()).unwrap();
            states.insert(id, AgentState::new(id, (*start).into(), (*goal).into()));
        }
        Self {
            grid,
            agents: states,
            occupancy,
            distances: BTreeMap::new(),
            resolver: CollisionResolver::from_config(&config),
        }
    }

    fn open(agents: &[((i32, i32), (i32, i32))]) -> Self {
        Self::new(Grid::new(5, 5).unwrap(), agents)
    }

    fn with_distances(mut self) -> Self {
        let graph = GridGraph::new(&self.grid, self.resolver.moves);
        self.distances = self
            .agents
            .values()
            .map(|a| (a.id, graph.distance_field(&self.grid, a.goal)))
            .collect();
        self
    }

    fn resolve_ordered(&mut self, moves: &[(u32, Action)], tie_break: &[u32]) -> Resolution {
        let proposals: Vec<Proposal> = moves
            .iter()
            .map(|(id, a)| Proposal::new(AgentId(*id), *a))
            .collect();
        let order: Vec<AgentId> = tie_break.iter().map(|i| AgentId(*i)).collect();
        self.resolver
            .resolve(
                &proposals,
                &order,
                &self.agents,
                &self.grid,
                &self.distances,
                &mut self.occupancy,
            )
            .unwrap()
    }

    fn resolve(&mut self, moves: &[(u32, Action)]) -> Resolution {
        let order: Vec<u32> = (0..self.agents.len() as u32).collect();
        self.resolve_ordered(moves, &order)
    }

    fn at(&self, id: u32) -> Option<Position> {
        self.occupancy.position_of(AgentId(id))
    }
}

fn outcome(res: &Resolution, id: u32) -> &StepOutcome {
    &res.outcomes[&AgentId(id)]
}

fn p(row: i32, col: i32) -> Position {
    Position::new(row, col)
}

#[cfg(test)]
mod scenarios {
    use super::*;

    #[test]
    fn test_parallel_moves_do_not_conflict() {
        let mut f = Fixture::open(&[((0, 0), (4, 4)), ((0, 2), (4, 4))]);
        let res = f.resolve(&[(0, Action::East), (1, Action::East)]);
        assert!(outcome(&res, 0).accepted);
        assert!(outcome(&res, 1).accepted);
        assert_eq!(f.at(0), Some(p(0, 1)));
        assert_eq!(f.at(1), Some(p(0, 3)));
        assert_eq!(res.collisions(), 0);
    }

    #[test]
    fn test_convergent_moves_are_both_rejected() {
        let mut f = Fixture::open(&[((0, 0), (4, 4)), ((0, 2), (4, 4))]);
        let res = f.resolve(&[(0, Action::East), (1, Action::West)]);
        for id in [0, 1] {
            let o = outcome(&res, id);
            assert!(!o.accepted);
            assert!(o.collided);
            assert_eq!(o.rejection, Some(Rejection::Collision));
            assert_eq!(o.reward, f.resolver.rewards.collision_penalty);
        }
        assert_eq!(f.at(0), Some(p(0, 0)));
        assert_eq!(f.at(1), Some(p(0, 2)));
        assert_eq!(res.collisions(), 2);
    }

    #[test]
    fn test_collision_detection_ignores_tie_break_order() {
        let moves = [(0, Action::East), (1, Action::West), (2, Action::North)];
        let agents = [((0, 0), (4, 4)), ((0, 2), (4, 4)), ((1, 1), (4, 4))];

        let mut forward = Fixture::open(&agents);
        let mut backward = Fixture::open(&agents);
        let a = forward.resolve_ordered(&moves, &[0, 1, 2]);
        let b = backward.resolve_ordered(&moves, &[2, 1, 0]);
        assert_eq!(a, b);
        assert_eq!(a.collisions(), 3);
    }

    #[test]
    fn test_priority_wins_lets_first_claimant_through() {
        let mut f = Fixture::open(&[((0, 0), (4, 4)), ((0, 2), (4, 4))]);
        f.resolver.policy = CollisionPolicy::PriorityWins;
        let res = f.resolve_ordered(&[(0, Action::East), (1, Action::West)], &[1, 0]);
        assert!(outcome(&res, 1).accepted);
        assert_eq!(f.at(1), Some(p(0, 1)));
        assert!(outcome(&res, 0).collided);
        assert_eq!(f.at(0), Some(p(0, 0)));
    }

    #[test]
    fn test_boundary_move_is_rejected_alone() {
        let mut f = Fixture::open(&[((0, 0), (4, 4)), ((2, 2), (4, 4))]);
        let res = f.resolve(&[(0, Action::North), (1, Action::South)]);
        let edge = outcome(&res, 0);
        assert_eq!(edge.rejection, Some(Rejection::OutOfBounds));
        assert!(!edge.collided);
        assert_eq!(edge.reward, f.resolver.rewards.boundary_penalty);
        assert_eq!(f.at(0), Some(p(0, 0)));
        assert!(outcome(&res, 1).accepted);
        assert_eq!(f.at(1), Some(p(3, 2)));
    }

    #[test]
    fn test_obstacle_move_is_rejected() {
        let grid = Grid::new(3, 3)
            .unwrap()
            .with_obstacles([p(1, 1)])
            .unwrap();
        let mut f = Fixture::new(grid, &[((1, 0), (2, 2))]);
        let res = f.resolve(&[(0, Action::East)]);
        assert_eq!(outcome(&res, 0).rejection, Some(Rejection::Obstacle));
        assert_eq!(f.at(0), Some(p(1, 0)));
    }

    #[test]
    fn test_swap_is_a_collision_by_default() {
        let mut f = Fixture::open(&[((0, 0), (4, 4)), ((0, 1), (4, 4))]);
        let res = f.resolve(&[(0, Action::East), (1, Action::West)]);
        assert_eq!(outcome(&res, 0).rejection, Some(Rejection::Swap));
        assert_eq!(outcome(&res, 1).rejection, Some(Rejection::Swap));
        assert!(outcome(&res, 0).collided && outcome(&res, 1).collided);
        assert_eq!(f.at(0), Some(p(0, 0)));
        assert_eq!(f.at(1), Some(p(0, 1)));
    }

    #[test]
    fn test_swap_allowed_when_enabled() {
        let mut f = Fixture::open(&[((0, 0), (4, 4)), ((0, 1), (4, 4))]);
        f.resolver.allow_swaps = true;
        let res = f.resolve(&[(0, Action::East), (1, Action::West)]);
        assert!(outcome(&res, 0).accepted && outcome(&res, 1).accepted);
        assert_eq!(f.at(0), Some(p(0, 1)));
        assert_eq!(f.at(1), Some(p(0, 0)));
    }
}

#[cfg(test)]
mod chains {
    use super::*;

    #[test]
    fn test_follower_moves_into_vacated_cell() {
        let mut f = Fixture::open(&[((0, 0), (4, 4)), ((0, 1), (4, 4))]);
        // Submission order must not matter.
        let res = f.resolve(&[(0, Action::East), (1, Action::East)]);
        assert!(outcome(&res, 0).accepted && outcome(&res, 1).accepted);
        assert_eq!(f.at(0), Some(p(0, 1)));
        assert_eq!(f.at(1), Some(p(0, 2)));
    }

    #[test]
    fn test_follower_blocked_by_stationary_leader() {
        let mut f = Fixture::open(&[((0, 0), (4, 4)), ((0, 1), (4, 4))]);
        let res = f.resolve(&[(0, Action::East), (1, Action::Stay)]);
        let follower = outcome(&res, 0);
        assert_eq!(follower.rejection, Some(Rejection::Blocked));
        assert!(follower.collided);
        let leader = outcome(&res, 1);
        assert!(leader.accepted && !leader.collided);
        assert_eq!(leader.reward, f.resolver.rewards.step_penalty);
    }

    #[test]
    fn test_blocked_by_idle_agent() {
        let mut f = Fixture::open(&[((0, 0), (4, 4)), ((0, 1), (4, 4))]);
        let res = f.resolve(&[(0, Action::East)]);
        assert_eq!(outcome(&res, 0).rejection, Some(Rejection::Blocked));
        let idle = outcome(&res, 1);
        assert!(!idle.acted);
        assert_eq!(idle.reward, 0.0);
    }

    #[test]
    fn test_rejection_cascades_down_a_chain() {
        // 2 hits the east wall, so 1 and then 0 cannot advance.
        let mut f = Fixture::open(&[((0, 2), (4, 4)), ((0, 3), (4, 4)), ((0, 4), (4, 4))]);
        let res = f.resolve(&[(0, Action::East), (1, Action::East), (2, Action::East)]);
        assert_eq!(outcome(&res, 2).rejection, Some(Rejection::OutOfBounds));
        assert_eq!(outcome(&res, 1).rejection, Some(Rejection::Blocked));
        assert_eq!(outcome(&res, 0).rejection, Some(Rejection::Blocked));
        assert_eq!(f.at(0), Some(p(0, 2)));
    }

    #[test]
    fn test_collision_cascades_to_followers() {
        // 1 and 2 collide on (1, 1); 0 was following 1.
        let mut f = Fixture::open(&[((1, 0), (4, 4)), ((1, 1), (4, 4)), ((1, 3), (4, 4))]);
        let res = f.resolve(&[(0, Action::East), (1, Action::East), (2, Action::West)]);
        assert_eq!(outcome(&res, 1).rejection, Some(Rejection::Collision));
        assert_eq!(outcome(&res, 2).rejection, Some(Rejection::Collision));
        assert_eq!(outcome(&res, 0).rejection, Some(Rejection::Blocked));
    }

    #[test]
    fn test_rotation_cycle_is_permitted() {
        let mut f = Fixture::open(&[
            ((0, 0), (4, 4)),
            ((0, 1), (4, 4)),
            ((1, 1), (4, 4)),
            ((1, 0), (4, 4)),
        ]);
        let res = f.resolve(&[
            (0, Action::East),
            (1, Action::South),
            (2, Action::West),
            (3, Action::North),
        ]);
        assert!(res.outcomes.values().all(|o| o.accepted));
        assert_eq!(f.at(0), Some(p(0, 1)));
        assert_eq!(f.at(1), Some(p(1, 1)));
        assert_eq!(f.at(2), Some(p(1, 0)));
        assert_eq!(f.at(3), Some(p(0, 0)));
    }
}

#[cfg(test)]
mod failures {
    use super::*;

    #[test]
    fn test_malformed_action_becomes_penalized_stay() {
        let mut f = Fixture::open(&[((2, 2), (4, 4))]);
        let res = f
            .resolver
            .resolve(
                &[Proposal::raw(AgentId(0), 42)],
                &[AgentId(0)],
                &f.agents,
                &f.grid,
                &f.distances,
                &mut f.occupancy,
            )
            .unwrap();
        let o = outcome(&res, 0);
        assert_eq!(o.rejection, Some(Rejection::InvalidAction(42)));
        assert_eq!(o.error(), Some(GridError::InvalidAction(42)));
        assert_eq!(o.reward, f.resolver.rewards.invalid_action_penalty);
        assert!(!o.collided);
        assert_eq!(f.at(0), Some(p(2, 2)));
    }

    #[test]
    fn test_diagonal_is_illegal_with_four_moves() {
        let mut f = Fixture::open(&[((2, 2), (4, 4))]);
        let res = f.resolve(&[(0, Action::SouthEast)]);
        assert_eq!(outcome(&res, 0).rejection, Some(Rejection::InvalidAction(7)));

        f.resolver.moves = MoveSet::Eight;
        let res = f.resolve(&[(0, Action::SouthEast)]);
        assert!(outcome(&res, 0).accepted);
        assert_eq!(f.at(0), Some(p(3, 3)));
    }

    #[test]
    fn test_unknown_agent_leaves_map_untouched() {
        let mut f = Fixture::open(&[((0, 0), (4, 4))]);
        let before = f.occupancy.clone();
        let err = f
            .resolver
            .resolve(
                &[
                    Proposal::new(AgentId(0), Action::East),
                    Proposal::new(AgentId(5), Action::East),
                ],
                &[],
                &f.agents,
                &f.grid,
                &f.distances,
                &mut f.occupancy,
            )
            .unwrap_err();
        assert_eq!(err, GridError::UnknownAgent(AgentId(5)));
        assert_eq!(f.occupancy, before);
    }

    #[test]
    fn test_duplicate_proposal_is_invalid_state() {
        let mut f = Fixture::open(&[((0, 0), (4, 4))]);
        let err = f
            .resolver
            .resolve(
                &[
                    Proposal::new(AgentId(0), Action::East),
                    Proposal::new(AgentId(0), Action::South),
                ],
                &[],
                &f.agents,
                &f.grid,
                &f.distances,
                &mut f.occupancy,
            )
            .unwrap_err();
        assert!(matches!(err, GridError::InvalidState(_)));
    }
}

#[cfg(test)]
mod rewards {
    use super::*;

    #[test]
    fn test_progress_and_cell_cost() {
        let grid = Grid::new(5, 1)
            .unwrap()
            .with_cost(p(0, 1), 3.0)
            .unwrap();
        let mut f = Fixture::new(grid, &[((0, 0), (0, 4))]).with_distances();
        let res = f.resolve(&[(0, Action::East)]);
        let r = f.resolver.rewards;
        assert_eq!(
            outcome(&res, 0).reward,
            r.step_penalty * 3.0 + r.progress_reward
        );

        // Moving away from the goal earns no progress bonus.
        let res = f.resolve(&[(0, Action::West)]);
        assert_eq!(outcome(&res, 0).reward, r.step_penalty);
    }

    #[test]
    fn test_goal_arrival_pays_bonus_and_leaves_map() {
        let mut f = Fixture::open(&[((0, 0), (0, 1)), ((3, 3), (4, 4))]).with_distances();
        let res = f.resolve(&[(0, Action::East), (1, Action::Stay)]);
        let o = outcome(&res, 0);
        let r = f.resolver.rewards;
        assert!(o.reached_goal);
        assert_eq!(o.reward, r.step_penalty + r.progress_reward + r.goal_reward);
        assert_eq!(res.arrivals, vec![AgentId(0)]);
        assert!(!f.occupancy.contains_agent(AgentId(0)));
        assert!(!f.occupancy.is_occupied(p(0, 1)));
    }

    #[test]
    fn test_goal_arrival_can_keep_agent_on_map() {
        let mut f = Fixture::open(&[((0, 0), (0, 1))]);
        f.resolver.remove_on_goal = false;
        let res = f.resolve(&[(0, Action::East)]);
        assert!(outcome(&res, 0).reached_goal);
        assert_eq!(f.at(0), Some(p(0, 1)));
    }
}
