//! Iterative improvement over the customer order. Enumerates a combined
//! swap / 2-opt / insert neighbourhood on the interior of the current
//! order, scores each candidate with an inner fixed-order solver, commits
//! the best strictly improving move and repeats until none helps. All
//! moves are self-inverting given matching indices.

use crate::instance::Instance;
use crate::solution::Solution;
use crate::solver::{check_order, FixedOrderSolver};
use crate::{CancelToken, Loc, Result, DEPOT};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
  /// Exchange positions `i` and `j`.
  Swap(usize, usize),
  /// Reverse the subsequence `[i..=j]`.
  TwoOpt(usize, usize),
  /// Remove the element at `i` and reinsert it at `j`.
  Insert(usize, usize),
}

impl Move {
  pub fn apply(self, order: &mut Vec<Loc>) {
    match self {
      Move::Swap(i, j) => order.swap(i, j),
      Move::TwoOpt(i, j) => order[i..=j].reverse(),
      Move::Insert(i, j) => {
        let element = order.remove(i);
        if j > i {
          order.insert(j - 1, element);
        } else {
          order.insert(j, element);
        }
      }
    }
  }

  pub fn undo(self, order: &mut Vec<Loc>) {
    match self {
      Move::Swap(..) | Move::TwoOpt(..) => self.apply(order),
      Move::Insert(i, j) => {
        let element = if j > i { order.remove(j - 1) } else { order.remove(j) };
        order.insert(i, element);
      }
    }
  }
}

/// Which neighbourhoods the driver enumerates.
#[derive(Debug, Clone, Copy)]
pub struct Neighbourhoods {
  pub swap: bool,
  pub two_opt: bool,
  pub insert: bool,
}

impl Default for Neighbourhoods {
  fn default() -> Self {
    Neighbourhoods { swap: true, two_opt: true, insert: true }
  }
}

impl Neighbourhoods {
  pub fn two_opt_only() -> Self {
    Neighbourhoods { swap: false, two_opt: true, insert: false }
  }

  fn moves(&self, n: usize) -> Vec<Move> {
    let mut moves = Vec::new();
    if self.swap {
      for i in 0..n {
        for j in i + 1..n {
          moves.push(Move::Swap(i, j));
        }
      }
    }
    if self.two_opt {
      for i in 0..n {
        for j in i + 1..n {
          moves.push(Move::TwoOpt(i, j));
        }
      }
    }
    if self.insert {
      for i in 0..n {
        for j in 0..n {
          if i != j {
            moves.push(Move::Insert(i, j));
          }
        }
      }
    }
    moves
  }
}

/// Best-improvement search around any inner fixed-order solver. The
/// mutable order is the interior customer sequence; the depot endpoints
/// are affixed only when invoking the inner solver, so no move can
/// displace them.
pub struct IterativeImprovement<S> {
  pub inner: S,
  pub neighbourhoods: Neighbourhoods,
  cancel: CancelToken,
}

impl<S: FixedOrderSolver> IterativeImprovement<S> {
  pub fn new(inner: S, neighbourhoods: Neighbourhoods) -> Self {
    IterativeImprovement { inner, neighbourhoods, cancel: CancelToken::new() }
  }

  pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
    self.cancel = cancel;
    self
  }

  fn score(&self, instance: &Instance, interior: &[Loc]) -> Result<Solution> {
    let mut order = Vec::with_capacity(interior.len() + 2);
    order.push(DEPOT);
    order.extend_from_slice(interior);
    order.push(DEPOT);
    self.inner.solve_order(instance, &order)
  }
}

impl<S: FixedOrderSolver> FixedOrderSolver for IterativeImprovement<S> {
  #[instrument(level = "debug", skip_all, fields(n = order.len()))]
  fn solve_order(&self, instance: &Instance, order: &[Loc]) -> Result<Solution> {
    check_order(instance, order)?;
    let mut interior: Vec<Loc> = order[1..order.len() - 1].to_vec();
    let mut best = self.score(instance, &interior)?;
    loop {
      let mut improving: Option<(Move, Solution)> = None;
      for mv in self.neighbourhoods.moves(interior.len()) {
        self.cancel.check()?;
        mv.apply(&mut interior);
        let candidate = self.score(instance, &interior)?;
        mv.undo(&mut interior);
        let beats_best = candidate.total_cost() < best.total_cost();
        let beats_incumbent =
          improving.as_ref().map_or(true, |(_, s)| candidate.total_cost() < s.total_cost());
        if beats_best && beats_incumbent {
          improving = Some((mv, candidate));
        }
      }
      match improving {
        Some((mv, sol)) => {
          debug!(?mv, cost = sol.total_cost(), "committing move");
          mv.apply(&mut interior);
          best = sol;
        }
        None => return Ok(best),
      }
    }
  }
}
