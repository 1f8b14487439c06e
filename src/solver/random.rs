//! Random truck tours: the best of `repeat` uniformly shuffled visiting
//! orders. Useful as a baseline and as a seed for the local searches.

use crate::instance::Instance;
use crate::solution::Solution;
use crate::solver::Solver;
use crate::{Loc, Result, DEPOT};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Debug)]
pub struct RandomSolver {
  rng: ChaCha8Rng,
  repeat: usize,
}

impl RandomSolver {
  pub fn new(seed: u64) -> Self {
    RandomSolver::with_repeat(seed, 1)
  }

  pub fn with_repeat(seed: u64, repeat: usize) -> Self {
    assert!(repeat > 0);
    RandomSolver { rng: ChaCha8Rng::seed_from_u64(seed), repeat }
  }
}

impl Solver for RandomSolver {
  fn solve(&mut self, instance: &Instance) -> Result<Solution> {
    let mut best: Option<Solution> = None;
    for _ in 0..self.repeat {
      let mut order: Vec<Loc> = instance.customers().collect();
      order.shuffle(&mut self.rng);
      order.insert(0, DEPOT);
      order.push(DEPOT);
      let sol = Solution::from_order(instance, &order);
      if best.as_ref().map_or(true, |b| sol.total_cost() < b.total_cost()) {
        best = Some(sol);
      }
    }
    Ok(best.expect("repeat is positive"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::geometric_instances;

  #[test]
  fn random_tours_are_feasible() {
    for i in geometric_instances(10, 10) {
      for seed in 0..10 {
        let sol = RandomSolver::new(seed).solve(&i).unwrap();
        assert!(sol.is_feasible(&i));
      }
    }
  }

  #[test]
  fn repeats_never_hurt() {
    for i in geometric_instances(5, 10) {
      let single = RandomSolver::new(7).solve(&i).unwrap();
      let multi = RandomSolver::with_repeat(7, 20).solve(&i).unwrap();
      assert!(multi.total_cost() <= single.total_cost() + 1e-9);
    }
  }
}
