//! Cost-to-go fields over the weighted grid graph.
//!
//! The grid is lifted into a `petgraph` graph whose nodes are open cells.
//! Edges are stored reversed (`to → from`, weighted by the cost of entering
//! `to`) so a single Dijkstra run from a goal yields the cost of reaching
//! that goal from every cell.

use petgraph::algo::dijkstra;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use super::{Action, Grid, MoveSet, Position};

/// Graph view of a grid for a given move set.
#[derive(Debug, Clone)]
pub struct GridGraph {
    graph: DiGraph<Position, f64>,
    /// Flat cell index → graph node (None for obstacles).
    nodes: Vec<Option<NodeIndex>>,
    cell_count: usize,
}

impl GridGraph {
    pub fn new(grid: &Grid, moves: MoveSet) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = vec![None; grid.cell_count()];

        for pos in grid.free_cells() {
            if let Some(idx) = grid.index(pos) {
                nodes[idx] = Some(graph.add_node(pos));
            }
        }

        for from in grid.free_cells() {
            let Some(from_node) = grid.index(from).and_then(|i| nodes[i]) else {
                continue;
            };
            for action in moves.actions().iter().filter(|a| **a != Action::Stay) {
                let to = action.apply(from);
                let (Some(to_node), Some(cost)) =
                    (grid.index(to).and_then(|i| nodes[i]), grid.cost(to))
                else {
                    continue;
                };
                graph.add_edge(to_node, from_node, cost);
            }
        }

        Self {
            graph,
            nodes,
            cell_count: grid.cell_count(),
        }
    }

    /// Computes the cost-to-go toward `goal` from every open cell.
    pub fn distance_field(&self, grid: &Grid, goal: Position) -> DistanceField {
        let mut costs = vec![None; self.cell_count];
        if let Some(goal_node) = grid.index(goal).and_then(|i| self.nodes[i]) {
            let reached = dijkstra(&self.graph, goal_node, None, |e| *e.weight());
            for (node, cost) in reached {
                if let Some(idx) = grid.index(self.graph[node]) {
                    costs[idx] = Some(cost);
                }
            }
        }
        DistanceField {
            goal,
            width: grid.width(),
            costs,
        }
    }
}

/// Cost of the cheapest path from each cell to one goal.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceField {
    goal: Position,
    width: u32,
    costs: Vec<Option<f64>>,
}

impl DistanceField {
    pub fn goal(&self) -> Position {
        self.goal
    }

    /// Cost-to-go from `pos`; `None` if out of bounds, blocked or unreachable.
    pub fn cost_from(&self, pos: Position) -> Option<f64> {
        if pos.row < 0 || pos.col < 0 || pos.col as u32 >= self.width {
            return None;
        }
        let idx = pos.row as usize * self.width as usize + pos.col as usize;
        self.costs.get(idx).copied().flatten()
    }

    pub fn is_reachable(&self, pos: Position) -> bool {
        self.cost_from(pos).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_grid_matches_manhattan() {
        let grid = Grid::new(5, 5).unwrap();
        let graph = GridGraph::new(&grid, MoveSet::Four);
        let goal = Position::new(4, 4);
        let field = graph.distance_field(&grid, goal);
        assert_eq!(field.cost_from(goal), Some(0.0));
        assert_eq!(field.cost_from(Position::new(0, 0)), Some(8.0));
        assert_eq!(field.cost_from(Position::new(2, 3)), Some(3.0));
    }

    #[test]
    fn diagonal_moves_shorten_paths() {
        let grid = Grid::new(5, 5).unwrap();
        let graph = GridGraph::new(&grid, MoveSet::Eight);
        let field = graph.distance_field(&grid, Position::new(4, 4));
        assert_eq!(field.cost_from(Position::new(0, 0)), Some(4.0));
    }

    #[test]
    fn costly_cells_are_avoided() {
        let grid = Grid::from_ascii(
            "...
             .9.
             ...",
        )
        .unwrap();
        let graph = GridGraph::new(&grid, MoveSet::Four);
        let field = graph.distance_field(&grid, Position::new(2, 1));
        // Straight through the centre would cost 9 + 1; going around costs 4.
        assert_eq!(field.cost_from(Position::new(0, 1)), Some(4.0));
    }

    #[test]
    fn walled_off_cells_are_unreachable() {
        let grid = Grid::from_ascii(
            "..#.
             ..#.
             ..#.",
        )
        .unwrap();
        let graph = GridGraph::new(&grid, MoveSet::Four);
        let field = graph.distance_field(&grid, Position::new(0, 0));
        assert!(field.is_reachable(Position::new(2, 1)));
        assert!(!field.is_reachable(Position::new(0, 3)));
        assert!(!field.is_reachable(Position::new(0, 2)));
        assert!(!field.is_reachable(Position::new(-1, 0)));
    }
}
