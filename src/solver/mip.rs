//! The exact solver: enumerate the operation table, assemble and solve the
//! MIP, stitch the selected operations into a tour with the Eulerian
//! assembler and simplify the result.

use crate::euler;
use crate::instance::Instance;
use crate::model::mp::OpTableMip;
use crate::optable::{build_constraints, OpTable};
use crate::solution::Solution;
use crate::solver::Solver;
use crate::{CancelToken, Error, Result, DEPOT, EXACT_SIZE_CAP};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct MipStats {
  pub table_entries: usize,
  pub table_millis: u128,
  pub mip_millis: u128,
}

pub struct MipSolver {
  /// Upper bound on truck-only customers per operation; negative means
  /// unrestricted.
  pub max_cardinality: i32,
  /// Fly-range factor relative to the longest drone leg; 2 or more
  /// imposes nothing.
  pub max_range_factor: f64,
  pub size_cap: usize,
  cancel: CancelToken,
  stats: MipStats,
}

impl Default for MipSolver {
  fn default() -> Self {
    MipSolver {
      max_cardinality: -1,
      max_range_factor: 2.0,
      size_cap: EXACT_SIZE_CAP,
      cancel: CancelToken::new(),
      stats: MipStats::default(),
    }
  }
}

impl MipSolver {
  pub fn new() -> Self {
    MipSolver::default()
  }

  pub fn with_limits(max_cardinality: i32, max_range_factor: f64) -> Self {
    MipSolver { max_cardinality, max_range_factor, ..MipSolver::default() }
  }

  pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
    self.cancel = cancel;
    self
  }

  /// Statistics of the last `solve` call.
  pub fn stats(&self) -> MipStats {
    self.stats
  }
}

impl Solver for MipSolver {
  #[instrument(level = "info", skip_all, fields(n = instance.node_count()))]
  fn solve(&mut self, instance: &Instance) -> Result<Solution> {
    let n = instance.node_count();
    if n > self.size_cap {
      return Err(Error::InstanceTooLarge { locations: n, cap: self.size_cap });
    }
    let constraints = build_constraints(instance, self.max_range_factor, self.max_cardinality);

    let started = Instant::now();
    let table = OpTable::build(instance, &constraints, &self.cancel)?;
    self.stats.table_entries = table.len();
    self.stats.table_millis = started.elapsed().as_millis();
    if instance.locations().all(|from| table.entries(from, DEPOT).next().is_none()) {
      return Err(Error::Infeasible);
    }

    let started = Instant::now();
    let mut mip = OpTableMip::from_table(&table)?;
    self.cancel.check()?;
    mip.solve()?;
    let ops = mip.selected_operations()?;
    self.stats.mip_millis = started.elapsed().as_millis();
    info!(
      entries = self.stats.table_entries,
      table_ms = self.stats.table_millis as u64,
      mip_ms = self.stats.mip_millis as u64,
      "exact solve finished"
    );

    let solution = euler::build_solution(instance, ops)?.simplify(instance);
    if !solution.is_feasible(instance) {
      return Err(Error::Infeasible);
    }
    Ok(solution)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::solver::brute::BruteForceSolver;
  use crate::test::{geometric_instances, line_instance, triangle_instance};

  #[test]
  fn line_optimum_is_two() {
    let i = line_instance(2.0);
    let sol = MipSolver::new().solve(&i).unwrap();
    assert!(sol.is_feasible(&i));
    assert!((sol.total_cost() - 2.0).abs() < 1e-6);
  }

  #[test]
  fn triangle_matches_the_dp() {
    let i = triangle_instance(0.5);
    let exact = MipSolver::new().solve(&i).unwrap();
    let brute = BruteForceSolver::new().solve(&i).unwrap();
    assert!((exact.total_cost() - brute.total_cost()).abs() < 1e-6);
  }

  #[test]
  fn matches_brute_force_on_small_instances() {
    for i in geometric_instances(5, 5) {
      let exact = MipSolver::new().solve(&i).unwrap();
      let brute = BruteForceSolver::new().solve(&i).unwrap();
      assert!(exact.is_feasible(&i));
      assert!(exact.total_cost() <= brute.total_cost() + 1e-6);
    }
  }

  #[test]
  fn unrestricted_wrapper_changes_nothing() {
    for i in geometric_instances(5, 5) {
      let base = MipSolver::new().solve(&i).unwrap();
      let restricted = i.clone().restrict_by_factor(f64::INFINITY).unwrap();
      let wrapped = MipSolver::new().solve(&restricted).unwrap();
      assert!((base.total_cost() - wrapped.total_cost()).abs() < 1e-8);
    }
  }

  #[test]
  fn restricted_line_keeps_left_on_the_truck() {
    let i = line_instance(2.0);
    let restricted = Instance::Restricted {
      inner: Box::new(i),
      rules: crate::instance::Restrictions {
        max_fly: f64::INFINITY,
        forbidden: crate::Set::default(),
        no_visit: [1usize].into_iter().collect(),
      },
    };
    let sol = MipSolver::new().solve(&restricted).unwrap();
    assert!(sol.is_feasible(&restricted));
    assert!(sol.fly_nodes().all(|f| f != 1));
    assert!((sol.total_cost() - 2.0).abs() < 1e-6);
  }

  #[test]
  fn size_cap_is_enforced() {
    let mut solver = MipSolver::new();
    let i = geometric_instances(1, 30).pop().unwrap();
    assert!(matches!(solver.solve(&i), Err(Error::InstanceTooLarge { .. })));
  }
}
