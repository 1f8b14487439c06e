//! Heap-driven greedy partition of a fixed visiting order.
//!
//! Every location becomes a node of a doubly-linked list in order. A node
//! is SIMPLE until a move consumes it: MakeFly turns a simple node into
//! the drone customer of a fresh operation between its two neighbours,
//! PushLeft/PushRight merge a simple node into the adjacent operation by
//! extending its truck path. An indexed max-heap keys every simple node by
//! the best savings any of its moves would realise; the loop keeps
//! applying the top node's best move until no helpful move remains.

use crate::heap::{IndexedMaxHeap, TrackPosition};
use crate::instance::Instance;
use crate::operation::Operation;
use crate::solution::Solution;
use crate::solver::{check_order, FixedOrderSolver};
use crate::{CancelToken, Cost, Loc, Result};
use tracing::{instrument, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
  Simple,
  Terminal,
  Internal,
  Fly,
}

#[derive(Debug, Clone)]
struct Node {
  loc: Loc,
  label: Label,
  left: Option<usize>,
  right: Option<usize>,
  /// On a terminal: the fly node of the operation this node closes /
  /// opens. On a fly node: the launching / receiving terminal.
  fly_from: Option<usize>,
  fly_to: Option<usize>,
  drive_before: Cost,
  drive_after: Cost,
  fly_before: Cost,
  fly_after: Cost,
  heap_pos: Option<usize>,
}

impl Node {
  fn new(loc: Loc) -> Self {
    Node {
      loc,
      label: Label::Simple,
      left: None,
      right: None,
      fly_from: None,
      fly_to: None,
      drive_before: 0.0,
      drive_after: 0.0,
      fly_before: 0.0,
      fly_after: 0.0,
      heap_pos: None,
    }
  }
}

struct Nodes(Vec<Node>);

impl TrackPosition<usize> for Nodes {
  fn position_changed(&mut self, key: usize, pos: Option<usize>) {
    self.0[key].heap_pos = pos;
  }
}

/// Greedy fixed-order heuristic. With `non_negative` the loop only stops
/// once no move exists at all, accepting worsening moves along the way; in
/// that mode `two_pass` re-runs with the first pass's best total as an
/// explicit target, capturing the savings the overshoot left behind.
#[derive(Debug, Clone)]
pub struct FixedOrderHeuristic {
  pub non_negative: bool,
  pub two_pass: bool,
  cancel: CancelToken,
}

impl Default for FixedOrderHeuristic {
  fn default() -> Self {
    FixedOrderHeuristic { non_negative: false, two_pass: true, cancel: CancelToken::new() }
  }
}

impl FixedOrderHeuristic {
  pub fn new(non_negative: bool, two_pass: bool) -> Self {
    FixedOrderHeuristic { non_negative, two_pass, cancel: CancelToken::new() }
  }

  pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
    self.cancel = cancel;
    self
  }
}

impl FixedOrderSolver for FixedOrderHeuristic {
  #[instrument(level = "debug", skip_all, fields(n = order.len()))]
  fn solve_order(&self, instance: &Instance, order: &[Loc]) -> Result<Solution> {
    check_order(instance, order)?;
    let mut run = Run::init(instance, order, self.non_negative, &self.cancel);
    let result = run.pass(Cost::INFINITY)?;
    if self.two_pass && result >= 0.0 {
      run = Run::init(instance, order, self.non_negative, &self.cancel);
      run.pass(result)?;
    }
    run.solution()
  }
}

struct Run<'a> {
  instance: &'a Instance,
  cancel: &'a CancelToken,
  non_negative: bool,
  nodes: Nodes,
  heap: IndexedMaxHeap<usize>,
}

impl<'a> Run<'a> {
  fn init(
    instance: &'a Instance,
    order: &[Loc],
    non_negative: bool,
    cancel: &'a CancelToken,
  ) -> Self {
    let mut nodes = Nodes(order.iter().map(|&l| Node::new(l)).collect());
    let n = nodes.0.len();
    for v in 0..n {
      nodes.0[v].left = v.checked_sub(1);
      nodes.0[v].right = if v + 1 < n { Some(v + 1) } else { None };
    }
    let mut run =
      Run { instance, cancel, non_negative, nodes, heap: IndexedMaxHeap::with_capacity(n + 2) };
    for v in 0..n {
      let savings = run.max_savings(v);
      run.heap.insert(v, savings, &mut run.nodes);
    }
    run
  }

  /// One greedy pass; stops when the top node's best savings is negative
  /// (non-finite in `non_negative` mode) or when applying it would push
  /// the accumulated total to `target` or beyond. Returns the best total
  /// seen mid-pass, or -1 when the pass never dipped below it.
  fn pass(&mut self, target: Cost) -> Result<Cost> {
    let mut cur_savings = 0.0;
    let mut best_total: Cost = 0.0;
    while let Some((v, _)) = self.heap.peek() {
      self.cancel.check()?;
      let max_savings = self.max_savings(v);
      if (self.non_negative && max_savings.is_infinite())
        || (!self.non_negative && max_savings < 0.0)
        || cur_savings + max_savings >= target
      {
        break;
      }
      cur_savings += max_savings;
      best_total = best_total.max(cur_savings);
      trace!(node = self.nodes.0[v].loc, savings = max_savings, "applying move");
      self.apply_best_move(v);
    }
    // remaining simple nodes become atomic stops
    for node in &mut self.nodes.0 {
      if node.label == Label::Simple {
        node.label = Label::Terminal;
      }
    }
    if cur_savings == best_total {
      Ok(-1.0)
    } else {
      Ok(best_total)
    }
  }

  fn solution(&self) -> Result<Solution> {
    let mut ops = Vec::new();
    let mut path: Vec<Loc> = Vec::new();
    let mut fly = None;
    for node in &self.nodes.0 {
      match node.label {
        Label::Terminal => {
          if !path.is_empty() {
            path.push(node.loc);
            ops.push(Operation::from_path(&path, fly));
          }
          path = vec![node.loc];
          fly = None;
        }
        Label::Internal => path.push(node.loc),
        Label::Fly => {
          debug_assert!(fly.is_none(), "one drone sortie per operation");
          fly = Some(node.loc);
        }
        Label::Simple => unreachable!("simple nodes are closed at the end of a pass"),
      }
    }
    if path.len() > 1 {
      ops.push(Operation::from_path(&path, fly));
    }
    Ok(Solution::new(self.instance, ops))
  }

  // -- move availability ----------------------------------------------------

  fn can_make_fly(&self, v: usize) -> bool {
    let node = &self.nodes.0[v];
    node.label == Label::Simple
      && node.left.is_some()
      && node.right.is_some()
      && !self.instance.is_depot(node.loc)
  }

  fn can_push_left(&self, v: usize) -> bool {
    let node = &self.nodes.0[v];
    node.label == Label::Simple
      && node.left.map_or(false, |l| self.nodes.0[l].label == Label::Terminal)
  }

  fn can_push_right(&self, v: usize) -> bool {
    let node = &self.nodes.0[v];
    node.label == Label::Simple
      && node.right.map_or(false, |r| self.nodes.0[r].label == Label::Terminal)
  }

  fn max_savings(&self, v: usize) -> Cost {
    let mut savings = Cost::NEG_INFINITY;
    if self.can_make_fly(v) {
      savings = savings.max(self.make_fly_savings(v));
    }
    if self.can_push_left(v) {
      savings = savings.max(self.push_left_savings(v));
    }
    if self.can_push_right(v) {
      savings = savings.max(self.push_right_savings(v));
    }
    savings
  }

  // -- savings --------------------------------------------------------------

  fn make_fly_savings(&self, v: usize) -> Cost {
    let drive = self.instance.drive();
    let fly = self.instance.fly();
    let node = &self.nodes.0[v];
    let left = self.nodes.0[node.left.unwrap()].loc;
    let right = self.nodes.0[node.right.unwrap()].loc;
    let current = drive.context_free(left, node.loc) + drive.context_free(node.loc, right);
    let fly_cost = fly.fly_triangle(left, right, node.loc);
    let direct = drive.context_free(left, right);
    current - fly_cost.max(direct)
  }

  fn push_left_savings(&self, v: usize) -> Cost {
    let drive = self.instance.drive();
    let fly = self.instance.fly();
    let node = &self.nodes.0[v];
    let l = node.left.unwrap();
    let left = &self.nodes.0[l];
    let fly_node = left.fly_from.expect("a terminal left of a simple node closes an operation");
    let op_start = self.nodes.0[fly_node].fly_from.unwrap();
    let new_drive = left.drive_before + drive.context_free(left.loc, node.loc);
    let new_fly =
      fly.fly_triangle(self.nodes.0[op_start].loc, node.loc, self.nodes.0[fly_node].loc);
    left.drive_before.max(left.fly_before) - new_drive.max(new_fly)
  }

  fn push_right_savings(&self, v: usize) -> Cost {
    let drive = self.instance.drive();
    let fly = self.instance.fly();
    let node = &self.nodes.0[v];
    let r = node.right.unwrap();
    let right = &self.nodes.0[r];
    let fly_node = right.fly_to.expect("a terminal right of a simple node opens an operation");
    let op_end = self.nodes.0[fly_node].fly_to.unwrap();
    let new_drive = right.drive_after + drive.context_free(node.loc, right.loc);
    let new_fly = fly.fly_triangle(node.loc, self.nodes.0[op_end].loc, self.nodes.0[fly_node].loc);
    right.drive_after.max(right.fly_after) - new_drive.max(new_fly)
  }

  // -- moves ----------------------------------------------------------------

  fn apply_best_move(&mut self, v: usize) {
    let mut fly_savings = Cost::NEG_INFINITY;
    let mut left_savings = Cost::NEG_INFINITY;
    let mut right_savings = Cost::NEG_INFINITY;
    if self.can_make_fly(v) {
      fly_savings = self.make_fly_savings(v);
    }
    if self.can_push_left(v) {
      left_savings = self.push_left_savings(v);
    }
    if self.can_push_right(v) {
      right_savings = self.push_right_savings(v);
    }
    if fly_savings >= left_savings && fly_savings >= right_savings {
      self.make_fly(v);
    } else if left_savings.is_finite() && left_savings >= right_savings {
      self.push_left(v);
    } else if right_savings.is_finite() {
      self.push_right(v);
    } else {
      unreachable!("a node in the heap must have a move");
    }
  }

  fn make_fly(&mut self, v: usize) {
    debug_assert!(self.can_make_fly(v));
    let drive = self.instance.drive();
    let fly = self.instance.fly();
    let l = self.nodes.0[v].left.unwrap();
    let r = self.nodes.0[v].right.unwrap();
    let (left_loc, right_loc, v_loc) =
      (self.nodes.0[l].loc, self.nodes.0[r].loc, self.nodes.0[v].loc);

    let d = drive.context_free(left_loc, right_loc);
    let f = fly.fly_triangle(left_loc, right_loc, v_loc);

    self.nodes.0[v].label = Label::Fly;
    self.nodes.0[l].drive_after = d;
    self.nodes.0[r].drive_before = d;
    self.nodes.0[l].fly_after = f;
    self.nodes.0[r].fly_before = f;
    self.nodes.0[l].fly_to = Some(v);
    self.nodes.0[r].fly_from = Some(v);
    // the drone customer leaves the truck chain
    self.nodes.0[l].right = Some(r);
    self.nodes.0[r].left = Some(l);
    self.nodes.0[v].fly_from = Some(l);
    self.nodes.0[v].fly_to = Some(r);

    self.remove_from_heap(v);
    if self.nodes.0[l].label == Label::Simple {
      self.remove_from_heap(l);
      self.nodes.0[l].label = Label::Terminal;
    }
    if self.nodes.0[r].label == Label::Simple {
      self.remove_from_heap(r);
      self.nodes.0[r].label = Label::Terminal;
    }
    if let Some(ll) = self.nodes.0[l].left {
      self.refresh(ll);
    }
    if let Some(rr) = self.nodes.0[r].right {
      self.refresh(rr);
    }
  }

  fn push_left(&mut self, v: usize) {
    debug_assert!(self.can_push_left(v));
    let drive = self.instance.drive();
    let fly = self.instance.fly();
    let l = self.nodes.0[v].left.unwrap();
    let fly_node = self.nodes.0[l].fly_from.expect("push-left needs an operation on the left");
    let op_start = self.nodes.0[fly_node].fly_from.unwrap();

    let drive_before =
      self.nodes.0[l].drive_before + drive.context_free(self.nodes.0[l].loc, self.nodes.0[v].loc);
    let fly_before = fly.fly_triangle(
      self.nodes.0[op_start].loc,
      self.nodes.0[v].loc,
      self.nodes.0[fly_node].loc,
    );

    self.nodes.0[l].label = Label::Internal;
    self.nodes.0[v].label = Label::Terminal;
    self.nodes.0[v].drive_before = drive_before;
    self.nodes.0[v].fly_before = fly_before;
    self.nodes.0[v].fly_from = Some(fly_node);
    self.nodes.0[fly_node].fly_to = Some(v);
    self.nodes.0[op_start].fly_after = fly_before;
    self.nodes.0[op_start].drive_after = drive_before;

    self.remove_from_heap(v);
    if let Some(r) = self.nodes.0[v].right {
      if self.nodes.0[r].label == Label::Simple {
        self.refresh(r);
      }
    }
  }

  fn push_right(&mut self, v: usize) {
    debug_assert!(self.can_push_right(v));
    let drive = self.instance.drive();
    let fly = self.instance.fly();
    let r = self.nodes.0[v].right.unwrap();
    let fly_node = self.nodes.0[r].fly_to.expect("push-right needs an operation on the right");
    let op_end = self.nodes.0[fly_node].fly_to.unwrap();

    let drive_after =
      self.nodes.0[r].drive_after + drive.context_free(self.nodes.0[v].loc, self.nodes.0[r].loc);
    let fly_after = fly.fly_triangle(
      self.nodes.0[v].loc,
      self.nodes.0[op_end].loc,
      self.nodes.0[fly_node].loc,
    );

    self.nodes.0[r].label = Label::Internal;
    self.nodes.0[v].label = Label::Terminal;
    self.nodes.0[v].fly_to = Some(fly_node);
    self.nodes.0[fly_node].fly_from = Some(v);
    self.nodes.0[op_end].fly_before = fly_after;
    self.nodes.0[op_end].drive_before = drive_after;
    self.nodes.0[v].drive_after = drive_after;
    self.nodes.0[v].fly_after = fly_after;

    self.remove_from_heap(v);
    if let Some(l) = self.nodes.0[v].left {
      if self.nodes.0[l].label == Label::Simple {
        self.refresh(l);
      }
    }
  }

  fn remove_from_heap(&mut self, v: usize) {
    if let Some(pos) = self.nodes.0[v].heap_pos {
      self.heap.remove(pos, &mut self.nodes);
    }
  }

  fn refresh(&mut self, v: usize) {
    if self.nodes.0[v].label != Label::Simple {
      return;
    }
    let savings = self.max_savings(v);
    if let Some(pos) = self.nodes.0[v].heap_pos {
      self.heap.update(pos, savings, &mut self.nodes);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::solver::order_cost;
  use crate::solver::mst::MstSolver;
  use crate::solver::Solver;
  use crate::test::{geometric_instances, line_instance, triangle_instance};

  #[test]
  fn triangle_sends_the_drone() {
    let i = triangle_instance(0.5);
    let sol = FixedOrderHeuristic::default().solve_order(&i, &[0, 1, 2, 0]).unwrap();
    assert!(sol.is_feasible(&i));
    assert!(sol.total_cost() <= order_cost(&i, &[0, 1, 2, 0]) + 1e-9);
    assert_eq!(sol.fly_nodes().count(), 1);
  }

  #[test]
  fn line_never_worse_than_order() {
    let i = line_instance(2.0);
    let sol = FixedOrderHeuristic::default().solve_order(&i, &[0, 1, 2, 0]).unwrap();
    assert!(sol.is_feasible(&i));
    assert!(sol.total_cost() <= 4.0 + 1e-9);
  }

  #[test]
  fn mst_seed_monotonicity() {
    for i in geometric_instances(100, 20) {
      let seed = MstSolver::new().solve(&i).unwrap();
      let order = seed.order().unwrap();
      let sol = FixedOrderHeuristic::default().solve_order(&i, &order).unwrap();
      assert!(sol.is_feasible(&i));
      assert!(sol.total_cost() <= seed.total_cost() + 1e-9);
    }
  }

  #[test]
  fn non_negative_mode_terminates() {
    for i in geometric_instances(10, 12) {
      let seed = MstSolver::new().solve(&i).unwrap();
      let order = seed.order().unwrap();
      let sol = FixedOrderHeuristic::new(true, true).solve_order(&i, &order).unwrap();
      assert!(sol.is_feasible(&i));
    }
  }
}
