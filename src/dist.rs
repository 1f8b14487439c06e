//! Contextual pairwise distances for the truck and the drone.
//!
//! Every leg carries the action performed at each endpoint and the distance
//! accumulated since the drone's last departure, so that a restricted
//! overlay can veto individual legs by returning `+∞`. The truck ignores
//! the actions entirely.

use crate::instance::{Point, Restrictions};
use crate::{Cost, Loc};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
  Departure,
  Visit,
  Arrival,
  Undefined,
}

/// A distance measure over location indices. The matrix variant backs graph
/// and matrix instances, the euclidean variant geometric ones, and the
/// restricted variant wraps an inner measure with flight-range and
/// node-prohibition rules.
pub enum Dist<'a> {
  Matrix { matrix: &'a [Vec<Cost>] },
  Euclid { points: &'a [Point], factor: f64 },
  Restricted { inner: Box<Dist<'a>>, rules: &'a Restrictions },
}

impl Dist<'_> {
  pub fn get(&self, from: Loc, to: Loc, from_action: Action, to_action: Action, prior: Cost) -> Cost {
    match self {
      Dist::Matrix { matrix } => matrix[from][to],
      Dist::Euclid { points, factor } => points[from].euclidean(&points[to]) * factor,
      Dist::Restricted { inner, rules } => {
        if from_action == Action::Undefined || to_action == Action::Undefined {
          // a restricted drone leg without a stated purpose cannot be
          // admitted
          return Cost::INFINITY;
        }
        if rules.forbidden.contains(&from)
          || rules.forbidden.contains(&to)
          || (from_action == Action::Visit && rules.no_visit.contains(&from))
          || (to_action == Action::Visit && rules.no_visit.contains(&to))
        {
          return Cost::INFINITY;
        }
        let d = inner.get(from, to, from_action, to_action, prior);
        if prior + d > rules.max_fly {
          return Cost::INFINITY;
        }
        d
      }
    }
  }

  pub fn depart_visit(&self, from: Loc, to: Loc) -> Cost {
    self.get(from, to, Action::Departure, Action::Visit, 0.0)
  }

  pub fn depart_arrive(&self, from: Loc, to: Loc) -> Cost {
    self.get(from, to, Action::Departure, Action::Arrival, 0.0)
  }

  pub fn visit_twice(&self, from: Loc, to: Loc, prior: Cost) -> Cost {
    self.get(from, to, Action::Visit, Action::Visit, prior)
  }

  pub fn visit_arrive(&self, from: Loc, to: Loc, prior: Cost) -> Cost {
    self.get(from, to, Action::Visit, Action::Arrival, prior)
  }

  pub fn context_free(&self, from: Loc, to: Loc) -> Cost {
    self.get(from, to, Action::Undefined, Action::Undefined, -1.0)
  }

  pub fn context_free_prior(&self, from: Loc, to: Loc, prior: Cost) -> Cost {
    self.get(from, to, Action::Undefined, Action::Undefined, prior)
  }

  /// Launch-visit-rendezvous triangle: the `Departure→Visit` leg plus the
  /// `Visit→Arrival` leg with the first leg's length as the prior.
  pub fn fly_triangle(&self, from: Loc, to: Loc, fly: Loc) -> Cost {
    let leg1 = self.depart_visit(from, fly);
    leg1 + self.visit_arrive(fly, to, leg1)
  }

  /// Distance of a truck path with correctly tagged endpoint actions.
  pub fn path(&self, start: Loc, end: Loc, intermediate: &[Loc]) -> Cost {
    if intermediate.is_empty() {
      return self.depart_arrive(start, end);
    }
    let mut result = 0.0;
    let mut prev = None;
    for &e in intermediate {
      match prev {
        None => result += self.depart_visit(start, e),
        Some(p) => result += self.visit_twice(p, e, result),
      }
      prev = Some(e);
    }
    result + self.visit_arrive(prev.unwrap(), end, result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Set;

  fn matrix() -> Vec<Vec<Cost>> {
    vec![
      vec![0.0, 1.0, 4.0],
      vec![1.0, 0.0, 2.0],
      vec![4.0, 2.0, 0.0],
    ]
  }

  #[test]
  fn path_distance_sums_tagged_legs() {
    let m = matrix();
    let d = Dist::Matrix { matrix: &m };
    assert_eq!(d.path(0, 2, &[]), 4.0);
    assert_eq!(d.path(0, 2, &[1]), 3.0);
    assert_eq!(d.path(0, 0, &[1, 2]), 7.0);
  }

  #[test]
  fn fly_triangle_accumulates_prior() {
    let m = matrix();
    let d = Dist::Matrix { matrix: &m };
    assert_eq!(d.fly_triangle(0, 2, 1), 3.0);
  }

  #[test]
  fn restricted_vetoes() {
    let m = matrix();
    let rules = Restrictions {
      max_fly: 3.5,
      forbidden: Set::default(),
      no_visit: [1 as Loc].into_iter().collect(),
    };
    let d = Dist::Restricted { inner: Box::new(Dist::Matrix { matrix: &m }), rules: &rules };
    // visiting the no-visit node is out, overflying it is fine
    assert!(d.fly_triangle(0, 2, 1).is_infinite());
    assert!(d.depart_arrive(1, 0).is_finite());
    // range cap
    assert!(d.fly_triangle(0, 0, 2).is_infinite());
    assert!(d.fly_triangle(1, 1, 0).is_finite());
    // undefined purpose is never admitted
    assert!(d.context_free(0, 2).is_infinite());
  }
}
