//! Random instance generators: uniform grids, Gaussian customer clusters
//! around one or two centres, and sparse random graphs.

use crate::instance::{GeometricInstance, GraphBuilder, GraphInstance, Point};
use crate::{Loc, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// `n` customers on a `grid × grid` integer grid (or the unit square for
/// `grid <= 1`), depot uniform in the unit square.
pub fn uniform(n: usize, rng: &mut impl Rng, drive_speed: f64, fly_speed: f64, grid: u32) -> GeometricInstance {
  let mut points = Vec::with_capacity(n + 1);
  points.push(Point::new(rng.gen::<f64>(), rng.gen::<f64>(), "depot"));
  for t in 0..n {
    let (x, y) = if grid > 1 {
      (rng.gen_range(0..grid) as f64, rng.gen_range(0..grid) as f64)
    } else {
      (rng.gen::<f64>(), rng.gen::<f64>())
    };
    points.push(Point::new(x, y, format!("loc{}", t + 1)));
  }
  GeometricInstance::new(points, drive_speed, fly_speed).expect("generated speeds are valid")
}

fn gaussian_ring(rng: &mut impl Rng, std_dev: f64) -> (f64, f64) {
  let normal = Normal::new(0.0, std_dev).expect("std dev is finite and positive");
  let r = normal.sample(rng);
  let angle = rng.gen_range(0.0..2.0 * PI);
  (r * angle.cos(), r * angle.sin())
}

/// `n - 1` customers and the depot scattered around a single centre with
/// Gaussian radial spread.
pub fn single_center(n: usize, rng: &mut impl Rng, std_dev: f64, fly_speed: f64) -> GeometricInstance {
  let mut points = Vec::with_capacity(n);
  let (x, y) = gaussian_ring(rng, std_dev);
  points.push(Point::new(x, y, "depot"));
  for t in 1..n {
    let (x, y) = gaussian_ring(rng, std_dev);
    points.push(Point::new(x, y, format!("v{}", t)));
  }
  GeometricInstance::new(points, 1.0, fly_speed).expect("generated speeds are valid")
}

/// Two centres `distance` apart; each customer joins the first centre with
/// probability `prob`. The depot sits midway.
pub fn double_center(
  n: usize,
  rng: &mut impl Rng,
  fly_speed: f64,
  std_dev1: f64,
  std_dev2: f64,
  distance: f64,
  prob: f64,
) -> GeometricInstance {
  let half = distance / 2.0;
  let mut points = Vec::with_capacity(n);
  points.push(Point::new(0.0, 0.0, "depot"));
  for t in 1..n {
    let (first, std_dev) = if rng.gen::<f64>() <= prob { (true, std_dev1) } else { (false, std_dev2) };
    let (x, y) = gaussian_ring(rng, std_dev);
    let cx = if first { -half } else { half };
    points.push(Point::new(x + cx, y, format!("v{}", t)));
  }
  GeometricInstance::new(points, 1.0, fly_speed).expect("generated speeds are valid")
}

/// Connected sparse graph: a random path through all locations plus each
/// remaining pair with probability `prob`.
pub fn random_graph(n: usize, prob: f64, rng: &mut impl Rng, fly_factor: f64) -> Result<GraphInstance> {
  let mut builder = GraphBuilder::new(n, true);
  for k in 1..n {
    builder.add_edge(k - 1, k, rng.gen::<f64>(), rng.gen::<f64>() * fly_factor)?;
  }
  for i in 0..n as Loc {
    for j in i + 2..n {
      if rng.gen::<f64>() <= prob {
        builder.add_edge(i, j, rng.gen::<f64>(), rng.gen::<f64>() * fly_factor)?;
      }
    }
  }
  builder.build()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::instance::Instance;
  use rand::SeedableRng;
  use rand_chacha::ChaCha8Rng;

  #[test]
  fn uniform_has_requested_size() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let g = uniform(10, &mut rng, 1.0, 0.5, 100);
    assert_eq!(g.points().len(), 11);
    assert_eq!(g.points()[0].name, "depot");
    assert_eq!(g.fly_speed(), 0.5);
  }

  #[test]
  fn generators_are_reproducible() {
    let a = uniform(8, &mut ChaCha8Rng::seed_from_u64(9), 1.0, 0.5, 100);
    let b = uniform(8, &mut ChaCha8Rng::seed_from_u64(9), 1.0, 0.5, 100);
    assert_eq!(a, b);
  }

  #[test]
  fn clustered_generators_produce_usable_instances() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let single = Instance::Geometric(single_center(12, &mut rng, 50.0, 0.5));
    assert_eq!(single.node_count(), 12);
    let double = Instance::Geometric(double_center(12, &mut rng, 0.5, 50.0, 50.0, 200.0, 0.5));
    assert_eq!(double.node_count(), 12);
    assert!(double.drive().context_free(0, 1).is_finite());
  }

  #[test]
  fn random_graphs_are_connected() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let g = Instance::Graph(random_graph(10, 0.3, &mut rng, 0.5).unwrap());
    for i in g.locations() {
      for j in g.locations() {
        assert!(g.drive().context_free(i, j).is_finite());
      }
    }
  }
}
