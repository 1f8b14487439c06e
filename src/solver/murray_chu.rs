//! Murray-Chu style local search on a doubly-linked truck chain with drone
//! cross-links.
//!
//! Each node may carry `next_fly` (it launches the drone toward that node)
//! and `prev_fly` (it receives the drone from that node). A truck move
//! re-splices a node elsewhere in the chain; a drone move lifts a node out
//! of the chain and installs it as the sortie between a launch and a
//! rendezvous node. Every candidate action is applied, measured and undone;
//! the best strictly improving action is committed until none remains.

use crate::instance::Instance;
use crate::operation::Operation;
use crate::solution::Solution;
use crate::solver::{check_order, FixedOrderSolver};
use crate::{CancelToken, Cost, Loc, Result};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
struct Node {
  loc: Loc,
  prev: Option<usize>,
  next: Option<usize>,
  next_fly: Option<usize>,
  prev_fly: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McAction {
  /// Detach `subject` from its chain position and splice it in directly
  /// after `target`.
  Truck { subject: usize, target: usize },
  /// Remove `subject` from the chain and fly it between `target_from`
  /// (launch) and `target_to` (rendezvous).
  Drone { subject: usize, target_from: usize, target_to: usize },
}

struct Search<'a> {
  instance: &'a Instance,
  nodes: Vec<Node>,
  /// `prev` of the subject at do-time, needed to undo.
  saved_prev: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MurrayChuSolver {
  cancel: CancelToken,
}

impl MurrayChuSolver {
  pub fn new() -> Self {
    MurrayChuSolver::default()
  }

  pub fn with_cancel(cancel: CancelToken) -> Self {
    MurrayChuSolver { cancel }
  }
}

impl FixedOrderSolver for MurrayChuSolver {
  #[instrument(level = "debug", skip_all, fields(n = order.len()))]
  fn solve_order(&self, instance: &Instance, order: &[Loc]) -> Result<Solution> {
    check_order(instance, order)?;
    let mut search = Search::init(instance, order);
    let mut steps = 0usize;
    while search.step(&self.cancel)? {
      steps += 1;
    }
    debug!(steps, "local search converged");
    let sol = search.solution();
    assert!(sol.is_feasible(instance), "local search must preserve feasibility");
    Ok(sol)
  }
}

impl<'a> Search<'a> {
  fn init(instance: &'a Instance, order: &[Loc]) -> Self {
    let n = order.len();
    let nodes = order
      .iter()
      .enumerate()
      .map(|(v, &loc)| Node {
        loc,
        prev: v.checked_sub(1),
        next: if v + 1 < n { Some(v + 1) } else { None },
        next_fly: None,
        prev_fly: None,
      })
      .collect();
    Search { instance, nodes, saved_prev: None }
  }

  /// Commits the best improving action; false once the neighbourhood is
  /// exhausted.
  fn step(&mut self, cancel: &CancelToken) -> Result<bool> {
    let current = self.cost();
    let mut best: Option<McAction> = None;
    let mut best_savings = 0.0;
    for action in self.neighbourhood() {
      cancel.check()?;
      self.do_action(action);
      let savings = current - self.cost();
      self.undo_action(action);
      if savings > best_savings {
        best = Some(action);
        best_savings = savings;
      }
    }
    match best {
      Some(action) => {
        self.do_action(action);
        Ok(true)
      }
      None => Ok(false),
    }
  }

  fn cost(&self) -> Cost {
    let drive = self.instance.drive();
    let fly = self.instance.fly();
    self.operations().iter().map(|op| op.cost_with(&drive, &fly)).sum()
  }

  fn operations(&self) -> Vec<Operation> {
    let mut ops = Vec::new();
    let mut cur = 0usize;
    while let Some(next) = self.nodes[cur].next {
      match self.nodes[cur].next_fly {
        None => {
          ops.push(Operation::direct(self.nodes[cur].loc, self.nodes[next].loc));
          cur = next;
        }
        Some(fly) => {
          let rendezvous = self.nodes[fly].next_fly.expect("a flying node knows its rendezvous");
          // collect the truck path backwards from the rendezvous
          let mut path = Vec::new();
          let mut walk = rendezvous;
          while walk != cur {
            path.push(self.nodes[walk].loc);
            walk = self.nodes[walk].prev.expect("the chain connects rendezvous back to launch");
          }
          path.push(self.nodes[cur].loc);
          path.reverse();
          ops.push(Operation::from_path(&path, Some(self.nodes[fly].loc)));
          cur = rendezvous;
        }
      }
    }
    ops
  }

  fn solution(&self) -> Solution {
    Solution::new(self.instance, self.operations())
  }

  fn chain(&self) -> ChainIter<'_> {
    ChainIter { nodes: &self.nodes, cur: Some(0) }
  }

  fn neighbourhood(&self) -> Vec<McAction> {
    let mut actions = Vec::new();
    for subject in self.chain() {
      if self.instance.is_depot(self.nodes[subject].loc) {
        continue;
      }
      for target in self.chain() {
        if self.nodes[target].next.is_some()
          && self.nodes[target].next != Some(subject)
          && target != subject
        {
          let action = McAction::Truck { subject, target };
          if self.truck_legal(subject) {
            actions.push(action);
          }
        }
      }
    }
    for subject in self.chain() {
      if self.instance.is_depot(self.nodes[subject].loc) {
        continue;
      }
      for target_from in self.chain() {
        if self.nodes[target_from].next.is_none()
          || self.nodes[target_from].next == Some(subject)
          || target_from == subject
        {
          continue;
        }
        let mut cur = self.nodes[target_from].next;
        while let Some(target_to) = cur {
          if target_to != subject {
            let action = McAction::Drone { subject, target_from, target_to };
            if self.drone_legal(subject, target_from, target_to) {
              actions.push(action);
            }
          }
          cur = self.nodes[target_to].next;
        }
      }
    }
    actions
  }

  fn truck_legal(&self, subject: usize) -> bool {
    self.nodes[subject].next_fly.is_none() && self.nodes[subject].prev_fly.is_none()
  }

  fn drone_legal(&self, subject: usize, target_from: usize, target_to: usize) -> bool {
    if self.nodes[subject].next_fly.is_some() || self.nodes[subject].prev_fly.is_some() {
      return false;
    }
    // the launch node must not already have a sortie out
    if self.nodes[target_from].next_fly.is_some() {
      return false;
    }
    // nothing on the walk from launch to rendezvous may carry drone links
    let mut cur = Some(target_from);
    while let Some(c) = cur {
      if c == target_to {
        break;
      }
      if self.nodes[c].prev_fly.is_some() || self.nodes[c].next_fly.is_some() {
        return false;
      }
      cur = self.nodes[c].next;
    }
    if cur != Some(target_to) {
      return false;
    }
    // beyond the rendezvous, an incoming drone would mean a sortie was
    // already open across it; an outgoing one belongs to a later
    // operation and is fine
    let mut cur = Some(target_to);
    while let Some(c) = cur {
      if self.nodes[c].prev_fly.is_some() {
        return false;
      }
      if self.nodes[c].next_fly.is_some() {
        return true;
      }
      cur = self.nodes[c].next;
    }
    true
  }

  fn do_action(&mut self, action: McAction) {
    match action {
      McAction::Truck { subject, target } => {
        debug_assert!(self.nodes[target].next != Some(subject), "action already performed");
        debug_assert!(self.truck_legal(subject));
        let source = self.nodes[subject].prev.expect("subject is never the chain head");
        self.saved_prev = Some(source);
        let t_right = self.nodes[target].next.expect("target has a successor");
        let s_right = self.nodes[subject].next.expect("subject is never the chain tail");

        self.nodes[target].next = Some(subject);
        self.nodes[subject].prev = Some(target);
        self.nodes[subject].next = Some(t_right);
        self.nodes[t_right].prev = Some(subject);

        self.nodes[source].next = Some(s_right);
        self.nodes[s_right].prev = Some(source);
      }
      McAction::Drone { subject, target_from, target_to } => {
        debug_assert!(self.nodes[target_from].next_fly != Some(subject), "action already performed");
        debug_assert!(self.truck_legal(subject));
        let source = self.nodes[subject].prev.expect("subject is never the chain head");
        self.saved_prev = Some(source);
        let s_right = self.nodes[subject].next.expect("subject is never the chain tail");

        self.nodes[source].next = Some(s_right);
        self.nodes[s_right].prev = Some(source);

        self.nodes[target_from].next_fly = Some(subject);
        self.nodes[subject].prev_fly = Some(target_from);
        self.nodes[subject].prev = None;
        self.nodes[subject].next = None;
        self.nodes[subject].next_fly = Some(target_to);
        self.nodes[target_to].prev_fly = Some(subject);
      }
    }
  }

  fn undo_action(&mut self, action: McAction) {
    let source = self.saved_prev.expect("undo must follow do");
    match action {
      McAction::Truck { subject, .. } => {
        debug_assert!(self.nodes[source].next != Some(subject), "action not performed");
        let s_right = self.nodes[source].next.expect("chain stays connected");
        let o_left = self.nodes[subject].prev.expect("subject sits in the chain");
        let o_right = self.nodes[subject].next.expect("subject sits in the chain");

        self.nodes[source].next = Some(subject);
        self.nodes[subject].prev = Some(source);
        self.nodes[subject].next = Some(s_right);
        self.nodes[s_right].prev = Some(subject);

        self.nodes[o_left].next = Some(o_right);
        self.nodes[o_right].prev = Some(o_left);
      }
      McAction::Drone { subject, target_from, target_to } => {
        debug_assert!(self.nodes[subject].next_fly.is_some() && self.nodes[subject].prev_fly.is_some());
        let s_right = self.nodes[source].next.expect("chain stays connected");

        self.nodes[target_from].next_fly = None;
        self.nodes[target_to].prev_fly = None;
        self.nodes[subject].next_fly = None;
        self.nodes[subject].prev_fly = None;

        self.nodes[source].next = Some(subject);
        self.nodes[subject].prev = Some(source);
        self.nodes[subject].next = Some(s_right);
        self.nodes[s_right].prev = Some(subject);
      }
    }
  }
}

struct ChainIter<'a> {
  nodes: &'a [Node],
  cur: Option<usize>,
}

impl Iterator for ChainIter<'_> {
  type Item = usize;

  fn next(&mut self) -> Option<usize> {
    let cur = self.cur?;
    self.cur = self.nodes[cur].next;
    Some(cur)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::solver::mst::MstSolver;
  use crate::solver::Solver;
  use crate::test::{geometric_instances, line_instance, triangle_instance};

  fn search<'a>(instance: &'a Instance, order: &[Loc]) -> Search<'a> {
    Search::init(instance, order)
  }

  #[test]
  fn do_undo_restores_the_list() {
    let i = triangle_instance(0.5);
    let mut s = search(&i, &[0, 1, 2, 0]);
    let before: Vec<_> = s.nodes.clone();
    for action in s.neighbourhood() {
      s.do_action(action);
      s.undo_action(action);
      for (a, b) in s.nodes.iter().zip(&before) {
        assert_eq!(a.prev, b.prev);
        assert_eq!(a.next, b.next);
        assert_eq!(a.next_fly, b.next_fly);
        assert_eq!(a.prev_fly, b.prev_fly);
      }
    }
  }

  #[test]
  fn drone_action_builds_an_operation() {
    let i = triangle_instance(0.5);
    let mut s = search(&i, &[0, 1, 2, 0]);
    // fly node 1 between the depot and node 2
    s.do_action(McAction::Drone { subject: 1, target_from: 0, target_to: 2 });
    let sol = s.solution();
    assert!(sol.is_feasible(&i));
    assert_eq!(sol.fly_nodes().collect::<Vec<_>>(), vec![1]);
  }

  #[test]
  fn converges_and_improves_the_triangle() {
    let i = triangle_instance(0.5);
    let sol = MurrayChuSolver::new().solve_order(&i, &[0, 1, 2, 0]).unwrap();
    assert!(sol.is_feasible(&i));
    assert!((sol.total_cost() - 2.0).abs() < 1e-6);
  }

  #[test]
  fn mst_seed_monotonicity_and_drone_use() {
    let mut improved_with_drone = 0;
    let instances = geometric_instances(100, 20);
    for i in &instances {
      let seed = MstSolver::new().solve(i).unwrap();
      let order = seed.order().unwrap();
      let sol = MurrayChuSolver::new().solve_order(i, &order).unwrap();
      assert!(sol.is_feasible(i));
      assert!(sol.total_cost() <= seed.total_cost() + 1e-9);
      if sol.total_cost() < seed.total_cost() && sol.fly_nodes().count() > 0 {
        improved_with_drone += 1;
      }
    }
    assert!(
      improved_with_drone >= instances.len() * 8 / 10,
      "only {} of {} runs improved with a sortie",
      improved_with_drone,
      instances.len()
    );
  }

  #[test]
  fn launch_with_open_sortie_is_illegal() {
    let i = triangle_instance(0.5);
    let mut s = search(&i, &[0, 1, 2, 0]);
    s.do_action(McAction::Drone { subject: 1, target_from: 0, target_to: 2 });
    // node 2 cannot fly inside the span of the open sortie
    assert!(!s.drone_legal(2, 0, 3));
    // and a second sortie from the same launch node is out
    assert!(!s.drone_legal(2, 0, 2));
  }
}
