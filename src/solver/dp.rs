//! Optimal truck/drone partition of a fixed visiting order.
//!
//! With `f(j)` the best cost of serving the order prefix up to position `j`,
//! `f(j) = min over i < j, i <= k < j of f(i) + opcost(i, j, k)` where `k`
//! picks the drone customer inside the operation spanning positions `i..j`
//! (`k = i` means no drone). `O(n³)` time, `O(n²)` space.

use crate::instance::Instance;
use crate::operation::Operation;
use crate::solution::Solution;
use crate::solver::{check_order, FixedOrderSolver};
use crate::{CancelToken, Cost, Error, Loc, Result};
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct FixedOrderDp {
  cancel: CancelToken,
}

impl FixedOrderDp {
  pub fn new() -> Self {
    FixedOrderDp::default()
  }

  pub fn with_cancel(cancel: CancelToken) -> Self {
    FixedOrderDp { cancel }
  }
}

impl FixedOrderSolver for FixedOrderDp {
  #[instrument(level = "debug", skip_all, fields(n = order.len()))]
  fn solve_order(&self, instance: &Instance, order: &[Loc]) -> Result<Solution> {
    check_order(instance, order)?;
    let n = order.len();
    let drive = instance.drive();
    let fly = instance.fly();

    // cumulative drive times along the order
    let mut dist = vec![vec![0.0; n]; n];
    for i in 0..n {
      for j in i + 1..n {
        let prior = dist[i][j - 1];
        dist[i][j] = prior + drive.context_free_prior(order[j - 1], order[j], prior);
      }
    }

    // opcost(i, j, k) flattened over the k axis
    let mut ops = OpCosts::new(n);
    for i in 0..n {
      for j in i + 1..n {
        ops.set(i, j, i, dist[i][j]);
        for k in i + 1..j {
          let shortcut = dist[i][j]
            - drive.context_free(order[k - 1], order[k])
            - drive.context_free(order[k], order[k + 1])
            + drive.context_free(order[k - 1], order[k + 1]);
          let fly_cost = fly.fly_triangle(order[i], order[j], order[k]);
          ops.set(i, j, k, shortcut.max(fly_cost));
        }
      }
    }

    let mut value = vec![0.0 as Cost; n];
    let mut best_i = vec![0usize; n];
    let mut best_k = vec![0usize; n];
    for j in 1..n {
      self.cancel.check()?;
      let mut best = Cost::INFINITY;
      for i in 0..j {
        for k in i..j {
          let cost = value[i] + ops.get(i, j, k);
          if cost < best {
            best = cost;
            best_i[j] = i;
            best_k[j] = k;
          }
        }
      }
      if !best.is_finite() {
        return Err(Error::Infeasible);
      }
      value[j] = best;
    }

    let mut result = Vec::new();
    let mut cur = n - 1;
    while cur != 0 {
      let i = best_i[cur];
      let k = best_k[cur];
      let fly_node = if i == k { None } else { Some(order[k]) };
      let path: Vec<Loc> =
        (i..=cur).map(|p| order[p]).filter(|&l| Some(l) != fly_node).collect();
      result.push(Operation::from_path(&path, fly_node));
      cur = i;
    }
    result.reverse();
    Ok(Solution::new(instance, result))
  }
}

/// Dense `n × n × n` table of per-operation costs.
struct OpCosts {
  n: usize,
  data: Vec<Cost>,
}

impl OpCosts {
  fn new(n: usize) -> Self {
    OpCosts { n, data: vec![Cost::INFINITY; n * n * n] }
  }

  #[inline]
  fn set(&mut self, i: usize, j: usize, k: usize, v: Cost) {
    self.data[(i * self.n + j) * self.n + k] = v;
  }

  #[inline]
  fn get(&self, i: usize, j: usize, k: usize) -> Cost {
    self.data[(i * self.n + j) * self.n + k]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::solver::order_cost;
  use crate::test::{line_instance, triangle_instance};

  #[test]
  fn line_prefers_the_truck() {
    let i = line_instance(2.0);
    let sol = FixedOrderDp::new().solve_order(&i, &[0, 1, 2, 0]).unwrap();
    assert!(sol.is_feasible(&i));
    assert!((sol.total_cost() - 2.0).abs() < 1e-9);
  }

  #[test]
  fn triangle_uses_the_drone() {
    let i = triangle_instance(0.5);
    let sol = FixedOrderDp::new().solve_order(&i, &[0, 1, 2, 0]).unwrap();
    assert!(sol.is_feasible(&i));
    // serve one customer by truck (out and back: 2) while the drone does
    // the round trip to the other (2 * 0.5 = 1): makespan 2
    assert!((sol.total_cost() - 2.0).abs() < 1e-9);
    assert_eq!(sol.fly_nodes().count(), 1);
  }

  #[test]
  fn never_worse_than_the_mst_seed() {
    use crate::solver::mst::MstSolver;
    use crate::solver::Solver;
    for i in crate::test::geometric_instances(100, 20) {
      let seed = MstSolver::new().solve(&i).unwrap();
      let order = seed.order().unwrap();
      let sol = FixedOrderDp::new().solve_order(&i, &order).unwrap();
      assert!(sol.is_feasible(&i));
      assert!(sol.total_cost() <= seed.total_cost() + 1e-9);
    }
  }

  #[test]
  fn no_visit_rule_pushes_the_customer_onto_the_truck() {
    let base = line_instance(2.0);
    let i = Instance::Restricted {
      inner: Box::new(base),
      rules: crate::instance::Restrictions {
        max_fly: f64::INFINITY,
        forbidden: crate::Set::default(),
        no_visit: [1 as Loc].into_iter().collect(),
      },
    };
    let sol = FixedOrderDp::new().solve_order(&i, &[0, 1, 2, 0]).unwrap();
    assert!(sol.is_feasible(&i));
    assert!(sol.fly_nodes().all(|f| f != 1));
    // flying to the right customer still reaches the unrestricted optimum
    assert!((sol.total_cost() - 2.0).abs() < 1e-9);
  }

  #[test]
  fn duplicate_customers_are_rejected() {
    let i = line_instance(2.0);
    assert!(matches!(
      FixedOrderDp::new().solve_order(&i, &[0, 1, 1, 0]),
      Err(Error::InvalidInput(_))
    ));
  }

  #[test]
  fn cancellation_propagates() {
    let i = line_instance(2.0);
    let token = CancelToken::new();
    token.cancel();
    assert!(matches!(
      FixedOrderDp::with_cancel(token).solve_order(&i, &[0, 1, 2, 0]),
      Err(Error::Cancelled)
    ));
  }
}
