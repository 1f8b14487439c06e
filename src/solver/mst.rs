//! Initial tours from a minimum spanning tree: Kruskal over the drive
//! distances, then a depth-first walk of the tree from the depot. With the
//! nearest-neighbour option each node's children are visited closest
//! first. For geometric instances the MST weight also yields a simple
//! lower bound on the optimal makespan.

use crate::instance::Instance;
use crate::solution::Solution;
use crate::solver::Solver;
use crate::unionfind::UnionFind;
use crate::{map_with_capacity, Cost, Loc, Map, Result, Set, DEPOT};
use tracing::instrument;

#[derive(Debug, Default)]
pub struct MstSolver {
  nearest_neighbour: bool,
  tighter_bound: bool,
  last_mst_weight: Cost,
}

impl MstSolver {
  pub fn new() -> Self {
    MstSolver::default()
  }

  pub fn nearest_neighbour() -> Self {
    MstSolver { nearest_neighbour: true, ..MstSolver::default() }
  }

  pub fn with_tighter_bound(mut self) -> Self {
    self.tighter_bound = true;
    self
  }

  /// Total weight of the MST built by the last `solve` call.
  pub fn last_mst_weight(&self) -> Cost {
    self.last_mst_weight
  }

  fn build_mst(&mut self, instance: &Instance) -> Map<Loc, Vec<Loc>> {
    let drive = instance.drive();
    let n = instance.node_count();
    let mut edges = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
      for j in i + 1..n {
        edges.push((i, j, drive.context_free(i, j)));
      }
    }
    edges.sort_by(|a, b| a.2.partial_cmp(&b.2).expect("distances must not be NaN"));

    let mut adjacency: Map<Loc, Vec<Loc>> = map_with_capacity(n);
    for loc in instance.locations() {
      adjacency.insert(loc, Vec::new());
    }
    let mut components = UnionFind::new(n);
    self.last_mst_weight = 0.0;
    for (a, b, w) in edges {
      if components.union(a, b) {
        adjacency.get_mut(&a).unwrap().push(b);
        adjacency.get_mut(&b).unwrap().push(a);
        self.last_mst_weight += w;
      }
    }
    adjacency
  }

  fn tree_to_sequence(&self, instance: &Instance, mst: &Map<Loc, Vec<Loc>>) -> Vec<Loc> {
    let drive = instance.drive();
    let mut visited: Set<Loc> = Set::default();
    let mut sequence = vec![DEPOT];
    visited.insert(DEPOT);
    let mut stack: Vec<Vec<Loc>> = Vec::new();
    let mut roots = Vec::new();
    for &child in &mst[&DEPOT] {
      visited.insert(child);
      roots.push(child);
    }
    stack.push(roots);
    let mut cur = DEPOT;
    while let Some(frontier) = stack.last_mut() {
      if frontier.is_empty() {
        stack.pop();
        continue;
      }
      if self.nearest_neighbour {
        frontier.sort_by(|&a, &b| {
          drive
            .context_free(cur, a)
            .partial_cmp(&drive.context_free(cur, b))
            .expect("distances must not be NaN")
        });
      }
      let node = frontier.remove(0);
      sequence.push(node);
      cur = node;
      let mut children = Vec::new();
      for &child in &mst[&node] {
        if visited.insert(child) {
          children.push(child);
        }
      }
      stack.push(children);
    }
    sequence.push(DEPOT);
    sequence
  }

  /// A lower bound on the optimal makespan of a geometric instance,
  /// derived from the MST weight and the speed ratio. Zero when no bound
  /// is known for the instance kind.
  pub fn lower_bound(&mut self, instance: &Instance) -> Result<Cost> {
    let (drive_speed, fly_speed) = match instance {
      Instance::Geometric(g) => (g.drive_speed(), g.fly_speed()),
      _ => return Ok(0.0),
    };
    self.solve(instance)?;
    let frac = if self.tighter_bound {
      let alpha = drive_speed.max(fly_speed) / drive_speed.min(fly_speed);
      2.0 / (2.0 + alpha)
    } else {
      drive_speed.min(fly_speed) / (drive_speed + fly_speed)
    };
    Ok(frac * self.last_mst_weight)
  }
}

impl Solver for MstSolver {
  #[instrument(level = "debug", skip_all, fields(n = instance.node_count()))]
  fn solve(&mut self, instance: &Instance) -> Result<Solution> {
    let mst = self.build_mst(instance);
    let sequence = self.tree_to_sequence(instance, &mst);
    Ok(Solution::from_order(instance, &sequence))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::{geometric_instances, line_instance};

  #[test]
  fn produces_feasible_truck_tours() {
    for i in geometric_instances(50, 12) {
      let mut mst = MstSolver::new();
      let sol = mst.solve(&i).unwrap();
      assert!(sol.is_feasible(&i));
      assert!(sol.fly_nodes().count() == 0);
      assert!(mst.last_mst_weight() > 0.0);
    }
  }

  #[test]
  fn nearest_neighbour_is_also_feasible() {
    for i in geometric_instances(20, 12) {
      let sol = MstSolver::nearest_neighbour().solve(&i).unwrap();
      assert!(sol.is_feasible(&i));
    }
  }

  #[test]
  fn line_mst_tour() {
    let i = line_instance(2.0);
    let sol = MstSolver::new().solve(&i).unwrap();
    assert!(sol.is_feasible(&i));
    // both customers hang off the depot, so the walk is out-and-back twice
    assert!((sol.total_cost() - 4.0).abs() < 1e-9);
  }

  #[test]
  fn lower_bound_is_below_any_tour() {
    for i in geometric_instances(20, 10) {
      let mut mst = MstSolver::new();
      let tour = mst.solve(&i).unwrap();
      let bound = mst.lower_bound(&i).unwrap();
      assert!(bound <= tour.total_cost() + 1e-9);
    }
  }
}
