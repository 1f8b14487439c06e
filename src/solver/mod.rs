//! The solver family. A [`Solver`] turns an instance into a feasible
//! solution on its own; a [`FixedOrderSolver`] additionally receives a
//! linear visiting order (depot first and last) and optimally or
//! heuristically splits it between the truck and the drone.

pub mod brute;
pub mod dp;
pub mod greedy;
pub mod improve;
#[cfg(feature = "gurobi")]
pub mod mip;
pub mod mst;
pub mod murray_chu;
pub mod random;

use crate::instance::Instance;
use crate::solution::Solution;
use crate::{Cost, Error, Loc, Result, COST_TOL, DEPOT};

pub trait Solver {
  fn solve(&mut self, instance: &Instance) -> Result<Solution>;
}

pub trait FixedOrderSolver {
  /// `order` must be a tour over all locations: depot first, depot last,
  /// every customer exactly once in between.
  fn solve_order(&self, instance: &Instance, order: &[Loc]) -> Result<Solution>;
}

/// Validates the fixed-order contract shared by all implementations.
pub(crate) fn check_order(instance: &Instance, order: &[Loc]) -> Result<()> {
  if order.len() != instance.node_count() + 1
    || order.first() != Some(&DEPOT)
    || order.last() != Some(&DEPOT)
  {
    return Err(Error::invalid_input("the order must start and end at the depot and span all locations"));
  }
  let mut seen = vec![false; instance.node_count()];
  for &loc in &order[1..order.len() - 1] {
    if loc >= instance.node_count() || loc == DEPOT || seen[loc] {
      return Err(Error::invalid_input(format!("order is not a permutation of the customers: {}", loc)));
    }
    seen[loc] = true;
  }
  Ok(())
}

/// Runs a sequence of fixed-order solvers, feeding each the order obtained
/// from the previous result. The tour may only improve; a worsening step
/// indicates a broken solver.
pub struct ChainSolver<'a> {
  solvers: Vec<&'a dyn FixedOrderSolver>,
  allow_decrease: bool,
}

impl<'a> ChainSolver<'a> {
  pub fn new() -> Self {
    ChainSolver { solvers: Vec::new(), allow_decrease: false }
  }

  pub fn allow_decrease(mut self) -> Self {
    self.allow_decrease = true;
    self
  }

  pub fn push(mut self, solver: &'a dyn FixedOrderSolver) -> Self {
    self.solvers.push(solver);
    self
  }
}

impl FixedOrderSolver for ChainSolver<'_> {
  fn solve_order(&self, instance: &Instance, order: &[Loc]) -> Result<Solution> {
    let mut current_order = order.to_vec();
    let mut current = Solution::from_order(instance, order);
    for solver in &self.solvers {
      let next = solver.solve_order(instance, &current_order)?;
      if !self.allow_decrease && next.total_cost() - COST_TOL > current.total_cost() {
        return Err(Error::Solver(format!(
          "chained solver worsened the tour from {} to {}",
          current.total_cost(),
          next.total_cost()
        )));
      }
      current_order = next.full_order();
      current = next;
    }
    Ok(current)
  }
}

/// Composes an initial-tour solver with a fixed-order solver: the classic
/// route-first, split-second arrangement.
pub struct OrderThenSplit<I, F> {
  pub initial: I,
  pub split: F,
}

impl<I: Solver, F: FixedOrderSolver> OrderThenSplit<I, F> {
  pub fn new(initial: I, split: F) -> Self {
    OrderThenSplit { initial, split }
  }
}

impl<I: Solver, F: FixedOrderSolver> Solver for OrderThenSplit<I, F> {
  fn solve(&mut self, instance: &Instance) -> Result<Solution> {
    let init = self.initial.solve(instance)?;
    let order = init.order()?;
    self.split.solve_order(instance, &order)
  }
}

/// Cost of the truck-only tour given by `order`; convenience for
/// heuristics that compare against their seed.
pub fn order_cost(instance: &Instance, order: &[Loc]) -> Cost {
  Solution::from_order(instance, order).total_cost()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::line_instance;

  #[test]
  fn order_contract_is_enforced() {
    let i = line_instance(2.0);
    assert!(check_order(&i, &[0, 1, 2, 0]).is_ok());
    assert!(check_order(&i, &[0, 1, 0]).is_err());
    assert!(check_order(&i, &[0, 1, 1, 0]).is_err());
    assert!(check_order(&i, &[1, 0, 2, 0]).is_err());
    assert!(check_order(&i, &[0, 1, 2, 1, 0]).is_err());
  }

  #[test]
  fn chain_runs_in_sequence() {
    let i = line_instance(2.0);
    let dp = dp::FixedOrderDp::new();
    let chain = ChainSolver::new().push(&dp).push(&dp);
    let sol = chain.solve_order(&i, &[0, 1, 2, 0]).unwrap();
    assert!(sol.is_feasible(&i));
    assert!(sol.total_cost() <= order_cost(&i, &[0, 1, 2, 0]) + COST_TOL);
  }
}
