//! A joint truck-drone movement. At the start of an operation the drone may
//! leave the truck to serve a single customer, rejoining it at the end
//! while the truck drives through any number of intermediate stops; the
//! faster vehicle waits, so the operation costs the maximum of the two
//! path times.

use crate::dist::Dist;
use crate::instance::Instance;
use crate::{Cost, Loc, Set};
use smallvec::SmallVec;

pub type DrivePath = SmallVec<[Loc; 4]>;

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
  start: Loc,
  /// Internal truck stops, excluding start and end.
  drive: DrivePath,
  end: Loc,
  fly: Option<Loc>,
}

impl Operation {
  pub fn new(start: Loc, drive: impl IntoIterator<Item = Loc>, end: Loc, fly: Option<Loc>) -> Self {
    let drive: DrivePath = drive.into_iter().collect();
    debug_assert!(fly.map_or(true, |f| !drive.contains(&f)));
    Operation { start, drive, end, fly }
  }

  pub fn direct(start: Loc, end: Loc) -> Self {
    Operation::new(start, std::iter::empty(), end, None)
  }

  pub fn with_fly(start: Loc, end: Loc, fly: Loc) -> Self {
    Operation::new(start, std::iter::empty(), end, Some(fly))
  }

  /// Build from a full truck path (start and end included).
  pub fn from_path(path: &[Loc], fly: Option<Loc>) -> Self {
    debug_assert!(path.len() >= 2);
    Operation::new(path[0], path[1..path.len() - 1].iter().copied(), *path.last().unwrap(), fly)
  }

  pub fn start(&self) -> Loc {
    self.start
  }

  pub fn end(&self) -> Loc {
    self.end
  }

  pub fn fly(&self) -> Option<Loc> {
    self.fly
  }

  pub fn has_fly(&self) -> bool {
    self.fly.is_some()
  }

  pub fn drive(&self) -> &[Loc] {
    &self.drive
  }

  /// The truck path including start and end.
  pub fn drive_path(&self) -> Vec<Loc> {
    let mut path = Vec::with_capacity(self.drive.len() + 2);
    path.push(self.start);
    path.extend_from_slice(&self.drive);
    path.push(self.end);
    path
  }

  /// Internal nodes, optionally with the fly node appended.
  pub fn internal_nodes(&self, include_fly: bool) -> Vec<Loc> {
    let mut nodes: Vec<Loc> = self.drive.to_vec();
    if include_fly {
      if let Some(f) = self.fly {
        nodes.push(f);
      }
    }
    nodes
  }

  /// All locations touched by this operation.
  pub fn covered(&self) -> Set<Loc> {
    let mut set: Set<Loc> = self.drive.iter().copied().collect();
    set.insert(self.start);
    set.insert(self.end);
    if let Some(f) = self.fly {
      set.insert(f);
    }
    set
  }

  pub fn drive_cost(&self, drive: &Dist) -> Cost {
    drive.path(self.start, self.end, &self.drive)
  }

  pub fn fly_cost(&self, fly: &Dist) -> Cost {
    match self.fly {
      Some(f) => fly.fly_triangle(self.start, self.end, f),
      None => 0.0,
    }
  }

  pub fn cost_with(&self, drive: &Dist, fly: &Dist) -> Cost {
    self.drive_cost(drive).max(self.fly_cost(fly))
  }

  pub fn cost(&self, instance: &Instance) -> Cost {
    self.cost_with(&instance.drive(), &instance.fly())
  }

  pub fn truck_wait(&self, instance: &Instance) -> Cost {
    let drive = self.drive_cost(&instance.drive());
    let fly = self.fly_cost(&instance.fly());
    drive.max(fly) - drive
  }

  pub fn drone_wait(&self, instance: &Instance) -> Cost {
    if self.fly.is_none() {
      return 0.0;
    }
    let drive = self.drive_cost(&instance.drive());
    let fly = self.fly_cost(&instance.fly());
    drive.max(fly) - fly
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::line_instance;

  #[test]
  fn cost_is_max_of_vehicle_times() {
    let i = line_instance(2.0);
    // truck 0 -> 1 takes 1.0, drone triangle 0 -> 2 -> 1 takes 0.5 + 1.0
    let op = Operation::with_fly(0, 1, 2);
    assert_eq!(op.drive_cost(&i.drive()), 1.0);
    assert_eq!(op.fly_cost(&i.fly()), 1.5);
    assert_eq!(op.cost(&i), 1.5);
    assert_eq!(op.truck_wait(&i), 0.5);
    assert_eq!(op.drone_wait(&i), 0.0);
  }

  #[test]
  fn no_fly_means_zero_drone_cost() {
    let i = line_instance(2.0);
    let op = Operation::new(0, [1], 2, None);
    assert_eq!(op.fly_cost(&i.fly()), 0.0);
    assert_eq!(op.cost(&i), 3.0);
    assert_eq!(op.drone_wait(&i), 0.0);
  }

  #[test]
  fn waits_complement_each_other() {
    let i = line_instance(2.0);
    // drone 0 -> 1 -> 0 costs 1, truck stays: truck waits 1
    let op = Operation::with_fly(0, 0, 1);
    assert_eq!(op.truck_wait(&i), 1.0);
    assert_eq!(op.drone_wait(&i), 0.0);
  }

  #[test]
  fn covered_includes_everything() {
    let op = Operation::new(3, [1, 4], 0, Some(2));
    let covered = op.covered();
    for l in [0, 1, 2, 3, 4] {
      assert!(covered.contains(&l));
    }
    assert_eq!(covered.len(), 5);
  }
}
