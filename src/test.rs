//! Shared fixtures for the colocated test modules.

use crate::generate;
use crate::instance::{GeometricInstance, Instance, Point};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Depot at the origin, one customer at (-1, 0) and one at (1, 0). The
/// drone is `alpha` times as fast as the truck.
pub fn line_instance(alpha: f64) -> Instance {
  Instance::Geometric(
    GeometricInstance::new(
      vec![
        Point::new(0.0, 0.0, "depot"),
        Point::new(-1.0, 0.0, "left"),
        Point::new(1.0, 0.0, "right"),
      ],
      1.0,
      1.0 / alpha,
    )
    .unwrap(),
  )
}

/// Depot at the origin, customers at (1, 0) and (0, 1).
pub fn triangle_instance(fly_speed: f64) -> Instance {
  Instance::Geometric(
    GeometricInstance::new(
      vec![
        Point::new(0.0, 0.0, "depot"),
        Point::new(1.0, 0.0, "east"),
        Point::new(0.0, 1.0, "north"),
      ],
      1.0,
      fly_speed,
    )
    .unwrap(),
  )
}

/// A reproducible family of random geometric instances with `customers`
/// customers each, drone twice as fast as the truck.
pub fn geometric_instances(count: usize, customers: usize) -> Vec<Instance> {
  let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
  (0..count)
    .map(|_| Instance::Geometric(generate::uniform(customers, &mut rng, 1.0, 0.5, 100)))
    .collect()
}
