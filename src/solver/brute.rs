//! Exhaustive reference solver: every customer permutation, each split
//! optimally by the fixed-order DP. Exact, and only sensible for very
//! small instances.

use crate::instance::Instance;
use crate::solution::Solution;
use crate::solver::dp::FixedOrderDp;
use crate::solver::{FixedOrderSolver, Solver};
use crate::utils::Permutator;
use crate::{CancelToken, Loc, Result, DEPOT};
use tracing::instrument;

#[derive(Debug, Default)]
pub struct BruteForceSolver {
  cancel: CancelToken,
}

impl BruteForceSolver {
  pub fn new() -> Self {
    BruteForceSolver::default()
  }

  pub fn with_cancel(cancel: CancelToken) -> Self {
    BruteForceSolver { cancel }
  }
}

impl Solver for BruteForceSolver {
  #[instrument(level = "debug", skip_all, fields(n = instance.node_count()))]
  fn solve(&mut self, instance: &Instance) -> Result<Solution> {
    let dp = FixedOrderDp::with_cancel(self.cancel.clone());
    let customers: Vec<Loc> = instance.customers().collect();
    let mut permutator = Permutator::new(customers);
    let mut best: Option<Solution> = None;
    let mut order = Vec::with_capacity(instance.node_count() + 1);
    while permutator.advance() {
      self.cancel.check()?;
      order.clear();
      order.push(DEPOT);
      order.extend_from_slice(permutator.current());
      order.push(DEPOT);
      let sol = dp.solve_order(instance, &order)?;
      if best.as_ref().map_or(true, |b| sol.total_cost() < b.total_cost()) {
        best = Some(sol);
      }
    }
    Ok(best.expect("at least the identity permutation is visited"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::{line_instance, triangle_instance};

  #[test]
  fn solves_the_line_exactly() {
    let i = line_instance(2.0);
    let sol = BruteForceSolver::new().solve(&i).unwrap();
    assert!(sol.is_feasible(&i));
    assert!((sol.total_cost() - 2.0).abs() < 1e-9);
  }

  #[test]
  fn solves_the_triangle_exactly() {
    let i = triangle_instance(0.5);
    let sol = BruteForceSolver::new().solve(&i).unwrap();
    assert!(sol.is_feasible(&i));
    assert!((sol.total_cost() - 2.0).abs() < 1e-9);
  }

  #[test]
  fn useless_drone_degenerates_to_the_tsp() {
    // an infinite fly factor makes every sortie infinitely long, so the
    // optimum is the plain truck tour
    let i = triangle_instance(f64::INFINITY);
    let sol = BruteForceSolver::new().solve(&i).unwrap();
    assert!(sol.is_feasible(&i));
    assert_eq!(sol.fly_nodes().count(), 0);
    assert!((sol.total_cost() - (2.0 + 2.0f64.sqrt())).abs() < 1e-9);
  }

  #[test]
  fn depot_and_single_customer() {
    let i = line_instance(2.0).sub_instance(|l| l == 1);
    let sol = BruteForceSolver::new().solve(&i).unwrap();
    assert!(sol.is_feasible(&i));
    // either the truck round trip (2.0) or the drone round trip (1.0)
    assert!((sol.total_cost() - 1.0).abs() < 1e-9);
  }
}
