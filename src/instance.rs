//! Instance variants. An instance is an ordered sequence of locations
//! (index 0 is the depot) together with a drive and a fly distance measure;
//! it is immutable once constructed. The restricted variant overlays an
//! inner instance with flight-range and node-prohibition rules.

use crate::dist::Dist;
use crate::{Cost, Error, Loc, Result, Set, DEPOT};
use rand::seq::SliceRandom;
use rand::Rng;

/// A named point in the plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
  pub x: f64,
  pub y: f64,
  pub name: String,
}

impl Point {
  pub fn new(x: f64, y: f64, name: impl Into<String>) -> Self {
    Point { x, y, name: name.into() }
  }

  pub fn euclidean(&self, other: &Point) -> f64 {
    let dx = self.x - other.x;
    let dy = self.y - other.y;
    (dx * dx + dy * dy).sqrt()
  }
}

/// Planar instance; travel time is euclidean distance scaled by a
/// per-vehicle factor.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometricInstance {
  points: Vec<Point>,
  drive_speed: f64,
  fly_speed: f64,
}

impl GeometricInstance {
  /// `points[0]` is the depot.
  pub fn new(points: Vec<Point>, drive_speed: f64, fly_speed: f64) -> Result<Self> {
    if points.is_empty() {
      return Err(Error::invalid_input("a geometric instance needs at least a depot"));
    }
    // an infinite fly factor models a uselessly slow drone and stays legal
    if drive_speed.is_nan() || fly_speed.is_nan() || drive_speed < 0.0 || fly_speed < 0.0 {
      return Err(Error::invalid_input("speed factors must be non-negative"));
    }
    Ok(GeometricInstance { points, drive_speed, fly_speed })
  }

  pub fn drive_speed(&self) -> f64 {
    self.drive_speed
  }

  pub fn fly_speed(&self) -> f64 {
    self.fly_speed
  }

  pub fn points(&self) -> &[Point] {
    &self.points
  }
}

/// Dense distance matrices, row-major, indexed by location.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixInstance {
  drive: Vec<Vec<Cost>>,
  fly: Vec<Vec<Cost>>,
}

impl MatrixInstance {
  pub fn new(drive: Vec<Vec<Cost>>, fly: Vec<Vec<Cost>>) -> Result<Self> {
    let n = drive.len();
    if n == 0 || fly.len() != n || drive.iter().chain(&fly).any(|row| row.len() != n) {
      return Err(Error::invalid_input("distance matrices must be square and equally sized"));
    }
    Ok(MatrixInstance { drive, fly })
  }

  pub fn drive_matrix(&self) -> &[Vec<Cost>] {
    &self.drive
  }

  pub fn fly_matrix(&self) -> &[Vec<Cost>] {
    &self.fly
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
  pub from: Loc,
  pub to: Loc,
  pub drive: Cost,
  pub fly: Cost,
}

/// Sparse edge-list instance. Missing pairs default to infinite distance;
/// the builder completes both matrices by Floyd-Warshall all-pairs shortest
/// paths before the instance can be used.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphInstance {
  n: usize,
  bidirectional: bool,
  edges: Vec<Edge>,
  drive: Vec<Vec<Cost>>,
  fly: Vec<Vec<Cost>>,
}

impl GraphInstance {
  pub fn n(&self) -> usize {
    self.n
  }

  pub fn bidirectional(&self) -> bool {
    self.bidirectional
  }

  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }
}

pub struct GraphBuilder {
  n: usize,
  bidirectional: bool,
  edges: Vec<Edge>,
}

impl GraphBuilder {
  pub fn new(n: usize, bidirectional: bool) -> Self {
    GraphBuilder { n, bidirectional, edges: Vec::new() }
  }

  pub fn add_edge(&mut self, from: Loc, to: Loc, drive: Cost, fly: Cost) -> Result<()> {
    if from >= self.n || to >= self.n {
      return Err(Error::invalid_input(format!("edge endpoint out of range: {} {}", from, to)));
    }
    if self.edges.iter().any(|e| {
      (e.from == from && e.to == to) || (self.bidirectional && e.from == to && e.to == from)
    }) {
      return Err(Error::invalid_input(format!("distance {} -> {} defined twice", from, to)));
    }
    self.edges.push(Edge { from, to, drive, fly });
    Ok(())
  }

  pub fn build(self) -> Result<GraphInstance> {
    if self.n == 0 {
      return Err(Error::invalid_input("a graph instance needs at least a depot"));
    }
    let n = self.n;
    let mut drive = vec![vec![Cost::INFINITY; n]; n];
    let mut fly = vec![vec![Cost::INFINITY; n]; n];
    for i in 0..n {
      drive[i][i] = 0.0;
      fly[i][i] = 0.0;
    }
    for e in &self.edges {
      drive[e.from][e.to] = drive[e.from][e.to].min(e.drive);
      fly[e.from][e.to] = fly[e.from][e.to].min(e.fly);
      if self.bidirectional {
        drive[e.to][e.from] = drive[e.to][e.from].min(e.drive);
        fly[e.to][e.from] = fly[e.to][e.from].min(e.fly);
      }
    }
    for m in [&mut drive, &mut fly] {
      for k in 0..n {
        for i in 0..n {
          for j in 0..n {
            let via = m[i][k] + m[k][j];
            if via < m[i][j] {
              m[i][j] = via;
            }
          }
        }
      }
    }
    Ok(GraphInstance { n, bidirectional: self.bidirectional, edges: self.edges, drive, fly })
  }
}

/// Flight-range and node-prohibition rules layered over an inner instance.
/// The drone may neither depart from, arrive at nor visit a forbidden
/// location; it may overfly a no-visit location but not visit it.
#[derive(Debug, Clone, PartialEq)]
pub struct Restrictions {
  pub max_fly: Cost,
  pub forbidden: Set<Loc>,
  pub no_visit: Set<Loc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
  Geometric(GeometricInstance),
  Graph(GraphInstance),
  Matrix(MatrixInstance),
  Restricted { inner: Box<Instance>, rules: Restrictions },
}

impl Instance {
  /// Number of locations, depot included.
  pub fn node_count(&self) -> usize {
    match self {
      Instance::Geometric(g) => g.points.len(),
      Instance::Graph(g) => g.n,
      Instance::Matrix(m) => m.drive.len(),
      Instance::Restricted { inner, .. } => inner.node_count(),
    }
  }

  pub fn customer_count(&self) -> usize {
    self.node_count() - 1
  }

  pub fn is_depot(&self, loc: Loc) -> bool {
    loc == DEPOT
  }

  pub fn locations(&self) -> std::ops::Range<Loc> {
    0..self.node_count()
  }

  pub fn customers(&self) -> std::ops::Range<Loc> {
    1..self.node_count()
  }

  pub fn drive(&self) -> Dist<'_> {
    match self {
      Instance::Geometric(g) => Dist::Euclid { points: &g.points, factor: g.drive_speed },
      Instance::Graph(g) => Dist::Matrix { matrix: &g.drive },
      Instance::Matrix(m) => Dist::Matrix { matrix: &m.drive },
      // restrictions never apply to the truck
      Instance::Restricted { inner, .. } => inner.drive(),
    }
  }

  pub fn fly(&self) -> Dist<'_> {
    match self {
      Instance::Geometric(g) => Dist::Euclid { points: &g.points, factor: g.fly_speed },
      Instance::Graph(g) => Dist::Matrix { matrix: &g.fly },
      Instance::Matrix(m) => Dist::Matrix { matrix: &m.fly },
      Instance::Restricted { inner, rules } => {
        Dist::Restricted { inner: Box::new(inner.fly()), rules }
      }
    }
  }

  pub fn point(&self, loc: Loc) -> Option<&Point> {
    match self {
      Instance::Geometric(g) => g.points.get(loc),
      Instance::Restricted { inner, .. } => inner.point(loc),
      _ => None,
    }
  }

  pub fn restrictions(&self) -> Option<&Restrictions> {
    match self {
      Instance::Restricted { rules, .. } => Some(rules),
      _ => None,
    }
  }

  /// The sub-instance over the depot and the customers satisfying `keep`.
  /// Customers are reindexed densely in their original order; restriction
  /// rules are remapped onto the new indices.
  pub fn sub_instance(&self, keep: impl Fn(Loc) -> bool) -> Instance {
    let kept: Vec<Loc> =
      std::iter::once(DEPOT).chain(self.customers().filter(|&l| keep(l))).collect();
    self.project(&kept)
  }

  fn project(&self, kept: &[Loc]) -> Instance {
    match self {
      Instance::Geometric(g) => Instance::Geometric(GeometricInstance {
        points: kept.iter().map(|&l| g.points[l].clone()).collect(),
        drive_speed: g.drive_speed,
        fly_speed: g.fly_speed,
      }),
      Instance::Matrix(m) => Instance::Matrix(MatrixInstance {
        drive: submatrix(&m.drive, kept),
        fly: submatrix(&m.fly, kept),
      }),
      // the completed all-pairs matrices already capture the graph; a
      // sub-instance keeps them as a matrix instance
      Instance::Graph(g) => Instance::Matrix(MatrixInstance {
        drive: submatrix(&g.drive, kept),
        fly: submatrix(&g.fly, kept),
      }),
      Instance::Restricted { inner, rules } => {
        let remap = |set: &Set<Loc>| -> Set<Loc> {
          kept
            .iter()
            .enumerate()
            .filter(|(_, old)| set.contains(*old))
            .map(|(new, _)| new)
            .collect()
        };
        Instance::Restricted {
          inner: Box::new(inner.project(kept)),
          rules: Restrictions {
            max_fly: rules.max_fly,
            forbidden: remap(&rules.forbidden),
            no_visit: remap(&rules.no_visit),
          },
        }
      }
    }
  }

  /// Wrap an instance with a flight-range cap of `factor` times the longest
  /// single drone leg. A factor of at least 2 imposes no restriction, since
  /// no launch-visit-rendezvous triangle exceeds twice the longest leg.
  pub fn restrict_by_factor(self, factor: f64) -> Result<Instance> {
    if factor < 0.0 || factor.is_nan() {
      return Err(Error::invalid_input("the fly-range factor must be non-negative"));
    }
    let max_fly = if factor < 2.0 { factor * self.max_fly_leg() } else { Cost::INFINITY };
    Ok(Instance::Restricted {
      inner: Box::new(self),
      rules: Restrictions { max_fly, forbidden: Set::default(), no_visit: Set::default() },
    })
  }

  /// Wrap an instance with a randomly drawn prohibited customer set
  /// covering roughly `fraction` of the customers. With `no_fly` the drawn
  /// customers are fully forbidden, otherwise they only exclude visits.
  pub fn restrict_random(
    self,
    factor: f64,
    fraction: f64,
    no_fly: bool,
    rng: &mut impl Rng,
  ) -> Result<Instance> {
    if !(0.0..=1.0).contains(&fraction) {
      return Err(Error::invalid_input("the prohibited fraction must lie in [0, 1]"));
    }
    let max_fly = if factor < 2.0 { factor * self.max_fly_leg() } else { Cost::INFINITY };
    let mut customers: Vec<Loc> = self.customers().collect();
    customers.shuffle(rng);
    let count = ((customers.len() as f64) * fraction).round() as usize;
    let drawn: Set<Loc> = customers.into_iter().take(count).collect();
    let (forbidden, no_visit) =
      if no_fly { (drawn, Set::default()) } else { (Set::default(), drawn) };
    Ok(Instance::Restricted {
      inner: Box::new(self),
      rules: Restrictions { max_fly, forbidden, no_visit },
    })
  }

  /// Longest finite single drone leg in the instance, over both departure
  /// and rendezvous directions.
  pub fn max_fly_leg(&self) -> Cost {
    let fly = self.fly();
    let mut max = 0.0;
    for f in self.locations() {
      for t in self.locations() {
        let out = fly.depart_visit(f, t);
        let back = fly.visit_arrive(f, t, 0.0);
        if out.is_finite() {
          max = out.max(max);
        }
        if back.is_finite() {
          max = back.max(max);
        }
      }
    }
    max
  }
}

fn submatrix(m: &[Vec<Cost>], kept: &[Loc]) -> Vec<Vec<Cost>> {
  kept.iter().map(|&i| kept.iter().map(|&j| m[i][j]).collect()).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn line() -> Instance {
    Instance::Geometric(
      GeometricInstance::new(
        vec![
          Point::new(0.0, 0.0, "depot"),
          Point::new(-1.0, 0.0, "left"),
          Point::new(1.0, 0.0, "right"),
        ],
        1.0,
        0.5,
      )
      .unwrap(),
    )
  }

  #[test]
  fn geometric_distances_scale_by_speed() {
    let i = line();
    assert_eq!(i.drive().context_free(1, 2), 2.0);
    assert_eq!(i.fly().context_free(1, 2), 1.0);
    assert_eq!(i.fly().fly_triangle(0, 0, 2), 1.0);
  }

  #[test]
  fn graph_builder_completes_shortest_paths() {
    let mut b = GraphBuilder::new(3, true);
    b.add_edge(0, 1, 1.0, 1.0).unwrap();
    b.add_edge(1, 2, 1.0, 1.0).unwrap();
    let g = Instance::Graph(b.build().unwrap());
    assert_eq!(g.drive().context_free(0, 2), 2.0);
    assert_eq!(g.drive().context_free(2, 0), 2.0);
  }

  #[test]
  fn graph_builder_rejects_duplicate_edges() {
    let mut b = GraphBuilder::new(3, true);
    b.add_edge(0, 1, 1.0, 1.0).unwrap();
    assert!(matches!(b.add_edge(1, 0, 2.0, 2.0), Err(Error::InvalidInput(_))));
  }

  #[test]
  fn sub_instance_reindexes() {
    let i = line();
    let sub = i.sub_instance(|l| l == 2);
    assert_eq!(sub.node_count(), 2);
    // old index 2 became customer 1
    assert_eq!(sub.drive().context_free(0, 1), 1.0);
    assert_eq!(sub.point(1).unwrap().name, "right");
  }

  #[test]
  fn restricted_sub_instance_remaps_rules() {
    let i = line();
    let restricted = Instance::Restricted {
      inner: Box::new(i),
      rules: Restrictions {
        max_fly: Cost::INFINITY,
        forbidden: Set::default(),
        no_visit: [2 as Loc].into_iter().collect(),
      },
    };
    let sub = restricted.sub_instance(|l| l == 2);
    assert!(sub.restrictions().unwrap().no_visit.contains(&1));
  }

  #[test]
  fn factor_two_imposes_nothing() {
    let i = line().restrict_by_factor(2.0).unwrap();
    assert!(i.restrictions().unwrap().max_fly.is_infinite());
    assert!(i.fly().fly_triangle(0, 0, 1).is_finite());
  }

  #[test]
  fn max_fly_leg_is_longest_leg() {
    let i = line();
    assert_eq!(i.max_fly_leg(), 1.0);
  }
}
