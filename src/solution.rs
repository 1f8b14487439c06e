//! A solution is an ordered list of operations whose endpoints chain,
//! starting and ending at the depot, covering every location. Solutions
//! are immutable value objects; every derived scalar is computed once at
//! construction.

use crate::instance::Instance;
use crate::operation::Operation;
use crate::{Cost, Error, Loc, Result, Set, DEPOT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
  operations: Vec<Operation>,
  total_cost: Cost,
  truck_cost: Cost,
  drone_cost: Cost,
  truck_wait: Cost,
  drone_wait: Cost,
  max_truck_cost: Cost,
  max_drone_cost: Cost,
  max_truck_wait: Cost,
  max_drone_wait: Cost,
  fly_nodes: Set<Loc>,
  drive_nodes: Set<Loc>,
}

impl Solution {
  pub fn new(instance: &Instance, operations: Vec<Operation>) -> Self {
    let mut sol = Solution {
      operations,
      total_cost: 0.0,
      truck_cost: 0.0,
      drone_cost: 0.0,
      truck_wait: 0.0,
      drone_wait: 0.0,
      max_truck_cost: 0.0,
      max_drone_cost: 0.0,
      max_truck_wait: 0.0,
      max_drone_wait: 0.0,
      fly_nodes: Set::default(),
      drive_nodes: Set::default(),
    };
    let drive = instance.drive();
    let fly = instance.fly();
    for op in &sol.operations {
      let dc = op.drive_cost(&drive);
      let fc = op.fly_cost(&fly);
      let cost = dc.max(fc);
      sol.total_cost += cost;
      sol.truck_cost += dc;
      sol.drone_cost += fc;
      sol.truck_wait += cost - dc;
      if op.has_fly() {
        sol.drone_wait += cost - fc;
        sol.max_drone_wait = sol.max_drone_wait.max(cost - fc);
      }
      sol.max_truck_cost = sol.max_truck_cost.max(dc);
      sol.max_drone_cost = sol.max_drone_cost.max(fc);
      sol.max_truck_wait = sol.max_truck_wait.max(cost - dc);
      if let Some(f) = op.fly() {
        sol.fly_nodes.insert(f);
      }
      for l in op.drive_path() {
        sol.drive_nodes.insert(l);
      }
    }
    sol
  }

  /// A truck-only tour visiting `order` with one direct operation per leg.
  pub fn from_order(instance: &Instance, order: &[Loc]) -> Self {
    let ops = order.windows(2).map(|w| Operation::direct(w[0], w[1])).collect();
    Solution::new(instance, ops)
  }

  pub fn operations(&self) -> &[Operation] {
    &self.operations
  }

  pub fn operation_count(&self) -> usize {
    self.operations.len()
  }

  pub fn total_cost(&self) -> Cost {
    self.total_cost
  }

  pub fn truck_cost(&self) -> Cost {
    self.truck_cost
  }

  pub fn drone_cost(&self) -> Cost {
    self.drone_cost
  }

  pub fn truck_wait(&self) -> Cost {
    self.truck_wait
  }

  pub fn drone_wait(&self) -> Cost {
    self.drone_wait
  }

  pub fn max_truck_cost(&self) -> Cost {
    self.max_truck_cost
  }

  pub fn max_drone_cost(&self) -> Cost {
    self.max_drone_cost
  }

  pub fn fly_nodes(&self) -> impl Iterator<Item = Loc> + '_ {
    self.operations.iter().filter_map(|op| op.fly())
  }

  /// Endpoints chain and the tour closes.
  pub fn is_tour(&self) -> bool {
    let first = match self.operations.first() {
      Some(op) => op.start(),
      None => return false,
    };
    let mut cur = first;
    for op in &self.operations {
      if op.start() != cur {
        return false;
      }
      cur = op.end();
    }
    cur == first
  }

  pub fn covers_all(&self, instance: &Instance) -> bool {
    self.non_covered(instance).is_empty()
  }

  pub fn non_covered(&self, instance: &Instance) -> Vec<Loc> {
    instance
      .locations()
      .filter(|l| !self.drive_nodes.contains(l) && !self.fly_nodes.contains(l))
      .collect()
  }

  pub fn depot_correct(&self) -> bool {
    match (self.operations.first(), self.operations.last()) {
      (Some(first), Some(last)) => first.start() == DEPOT && last.end() == DEPOT,
      _ => false,
    }
  }

  pub fn is_feasible(&self, instance: &Instance) -> bool {
    self.is_tour() && self.covers_all(instance) && self.depot_correct()
  }

  /// No location is entered twice by the truck or served twice.
  pub fn is_strict(&self) -> bool {
    let mut covered = Set::default();
    for op in &self.operations {
      if !covered.insert(op.start()) {
        return false;
      }
      for l in op.internal_nodes(true) {
        if !covered.insert(l) {
          return false;
        }
      }
    }
    true
  }

  /// The visiting order of a tour without drone sorties. Fails on
  /// operations with fly nodes, whose position in the order is ambiguous.
  pub fn order(&self) -> Result<Vec<Loc>> {
    let mut order = Vec::new();
    for op in &self.operations {
      if op.has_fly() {
        return Err(Error::invalid_input(
          "cannot extract a linear order from a tour with drone sorties",
        ));
      }
      if order.is_empty() {
        order.push(op.start());
      }
      order.extend(op.internal_nodes(false));
      order.push(op.end());
    }
    Ok(order)
  }

  /// A linear order compatible with this tour: each operation contributes
  /// its start, its internal stops and its fly node, in sequence.
  pub fn full_order(&self) -> Vec<Loc> {
    let mut order = Vec::new();
    if let Some(first) = self.operations.first() {
      order.push(first.start());
    }
    for op in &self.operations {
      order.extend(op.internal_nodes(true));
      order.push(op.end());
    }
    order
  }

  /// The truck's visiting order, skipping fly nodes.
  pub fn drive_order(&self) -> Vec<Loc> {
    let mut order = Vec::new();
    if let Some(first) = self.operations.first() {
      order.push(first.start());
    }
    for op in &self.operations {
      order.extend(op.internal_nodes(false));
      order.push(op.end());
    }
    order
  }

  /// Drop redundant revisits: interior truck stops at already-covered
  /// locations are deleted (endpoints stay pinned), and an already-covered
  /// fly node is dropped by splitting its operation into atomic legs.
  /// Idempotent, and cost-equivalent for tours produced by the solvers.
  pub fn simplify(&self, instance: &Instance) -> Solution {
    let mut res = Vec::new();
    let mut covered: Set<Loc> = Set::default();
    for op in &self.operations {
      let mut drive = op.drive_path();
      let mut i = 0;
      while i < drive.len() && drive.len() > 2 {
        let loc = drive[i];
        if i > 0 && i + 1 < drive.len() && covered.contains(&loc) {
          drive.remove(i);
        } else {
          covered.insert(loc);
          i += 1;
        }
      }
      match op.fly() {
        Some(f) if !covered.contains(&f) => {
          res.push(Operation::from_path(&drive, Some(f)));
        }
        _ => {
          for w in drive.windows(2) {
            res.push(Operation::direct(w[0], w[1]));
          }
        }
      }
    }
    Solution::new(instance, res)
  }

  pub fn stats(&self) -> SolutionStats {
    SolutionStats {
      total_cost: self.total_cost,
      truck_cost: self.truck_cost,
      drone_cost: self.drone_cost,
      truck_wait: self.truck_wait,
      drone_wait: self.drone_wait,
      max_truck_cost: self.max_truck_cost,
      max_drone_cost: self.max_drone_cost,
      max_truck_wait: self.max_truck_wait,
      max_drone_wait: self.max_drone_wait,
      operations: self.operations.len(),
      truck_nodes: self.operations.iter().map(|op| op.drive().len()).sum(),
      drone_nodes: self.fly_nodes().count(),
    }
  }
}

/// Serialisable summary of a solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionStats {
  pub total_cost: Cost,
  pub truck_cost: Cost,
  pub drone_cost: Cost,
  pub truck_wait: Cost,
  pub drone_wait: Cost,
  pub max_truck_cost: Cost,
  pub max_drone_cost: Cost,
  pub max_truck_wait: Cost,
  pub max_drone_wait: Cost,
  pub operations: usize,
  pub truck_nodes: usize,
  pub drone_nodes: usize,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::line_instance;

  #[test]
  fn truck_tour_scalars() {
    let i = line_instance(2.0);
    let sol = Solution::from_order(&i, &[0, 1, 2, 0]);
    assert!(sol.is_feasible(&i));
    assert_eq!(sol.total_cost(), 4.0);
    assert_eq!(sol.truck_cost(), 4.0);
    assert_eq!(sol.drone_cost(), 0.0);
    assert_eq!(sol.operation_count(), 3);
  }

  #[test]
  fn feasibility_requires_coverage() {
    let i = line_instance(2.0);
    let sol = Solution::from_order(&i, &[0, 1, 0]);
    assert!(sol.is_tour());
    assert!(sol.depot_correct());
    assert!(!sol.covers_all(&i));
    assert_eq!(sol.non_covered(&i), vec![2]);
  }

  #[test]
  fn order_round_trip() {
    let i = line_instance(2.0);
    let sol = Solution::from_order(&i, &[0, 2, 1, 0]);
    assert_eq!(sol.order().unwrap(), vec![0, 2, 1, 0]);
    let flown = Solution::new(&i, vec![Operation::with_fly(0, 0, 1)]);
    assert!(flown.order().is_err());
  }

  #[test]
  fn simplify_drops_interior_revisits() {
    let i = line_instance(2.0);
    // 0 -> 1 -> 0(revisit) -> 2 with fly at none, then 2 -> 0
    let sol = Solution::new(
      &i,
      vec![Operation::new(0, [1, 0, 1], 2, None), Operation::direct(2, 0)],
    );
    let simple = sol.simplify(&i);
    assert!(simple.is_feasible(&i));
    assert!(simple.is_strict());
    let again = simple.simplify(&i);
    assert_eq!(simple, again);
  }

  #[test]
  fn simplify_drops_covered_fly_node() {
    let i = line_instance(2.0);
    let sol = Solution::new(
      &i,
      vec![Operation::new(0, [1], 2, None), Operation::with_fly(2, 0, 1)],
    );
    let simple = sol.simplify(&i);
    // the fly node was already covered by the truck, so the second
    // operation degenerates to a direct leg
    assert!(simple.operations().iter().all(|op| !op.has_fly()));
    assert!(simple.is_feasible(&i));
    assert_eq!(simple, simple.simplify(&i));
  }
}
