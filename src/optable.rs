//! Dynamic-programming enumeration of all efficient operations.
//!
//! Phase 1 grows truck-only entries keyed by (origin, destination,
//! covered-set), keeping only the cheapest drive for each key. Phase 2
//! augments every truck entry with each possible fly node, keeping the
//! cheapest `max(drive, fly)` per key. Entries live in an arena and refer
//! to their predecessors by index, so reconstructing the truck path is a
//! walk down the predecessor chain.

use crate::bitset::LocSet;
use crate::dist::Dist;
use crate::instance::Instance;
use crate::operation::Operation;
use crate::{map_with_capacity, CancelToken, Cost, Error, Loc, Map, Result, COST_TOL, MAX_LOCATIONS};
use tracing::{debug, instrument};

pub type EntryId = u32;

#[derive(Debug, Clone, Copy)]
pub struct OpEntry {
  pub first: Loc,
  pub last: Loc,
  pub set: LocSet,
  pub fly: Option<Loc>,
  pub prev: Option<EntryId>,
  pub drive: Cost,
  pub fly_cost: Cost,
  /// `max(drive, fly_cost)`.
  pub cost: Cost,
  pub node_count: usize,
  /// Set once the truck revisits a covered location; repeated entries are
  /// never expanded again.
  pub repetition: bool,
}

impl OpEntry {
  fn seed(loc: Loc) -> Self {
    OpEntry {
      first: loc,
      last: loc,
      set: LocSet::singleton(loc),
      fly: None,
      prev: None,
      drive: 0.0,
      fly_cost: 0.0,
      cost: 0.0,
      node_count: 1,
      repetition: false,
    }
  }

  /// Covered locations the truck serves alone: everything except the
  /// start, the end (when distinct) and the fly node (when distinct from
  /// both).
  pub fn truck_only_count(&self) -> usize {
    let mut minus = 0;
    if self.fly.is_some() {
      minus += 1;
    }
    if Some(self.first) != self.fly {
      minus += 1;
    }
    if self.last != self.first && Some(self.last) != self.fly {
      minus += 1;
    }
    self.node_count - minus
  }
}

/// Insertion-time predicate on candidate entries.
#[derive(Debug, Clone, Copy)]
pub enum OpConstraint {
  /// Bounds the drone triangle. Truck-only entries are rejected once both
  /// they and their predecessor exceed the bound, because no later fly
  /// augmentation can bring the operation cost back down.
  MaxFly(Cost),
  /// Bounds the number of truck-only covered locations.
  Cardinality(usize),
}

impl OpConstraint {
  fn is_valid(&self, entry: &OpEntry, arena: &[OpEntry]) -> bool {
    match *self {
      OpConstraint::MaxFly(max_fly) => {
        if entry.fly.is_some() {
          return entry.fly_cost <= max_fly;
        }
        if entry.truck_only_count() > 0 && entry.drive > max_fly {
          if let Some(prev) = entry.prev {
            if arena[prev as usize].drive > max_fly {
              return false;
            }
          }
        }
        true
      }
      OpConstraint::Cardinality(k) => entry.truck_only_count() <= k,
    }
  }
}

/// The standard constraint set: a fly range of `max_range_factor` times the
/// longest single drone leg (a factor of 2 or more imposes nothing, and
/// restricted instances enforce their own range through their distances),
/// plus a truck-only cardinality bound when `max_cardinality` is
/// non-negative.
pub fn build_constraints(
  instance: &Instance,
  max_range_factor: f64,
  max_cardinality: i32,
) -> Vec<OpConstraint> {
  let mut constraints = Vec::new();
  if max_range_factor.is_finite() && instance.restrictions().is_none() {
    constraints.push(OpConstraint::MaxFly(instance.max_fly_leg() * max_range_factor));
  }
  if max_cardinality >= 0 {
    constraints.push(OpConstraint::Cardinality(max_cardinality as usize));
  }
  constraints
}

pub struct OpTable<'a> {
  instance: &'a Instance,
  arena: Vec<OpEntry>,
  index: Map<Loc, Map<Loc, Map<LocSet, EntryId>>>,
  size: usize,
}

impl<'a> OpTable<'a> {
  #[instrument(level = "debug", skip_all, fields(n = instance.node_count()))]
  pub fn build(
    instance: &'a Instance,
    constraints: &[OpConstraint],
    cancel: &CancelToken,
  ) -> Result<OpTable<'a>> {
    let n = instance.node_count();
    if n > MAX_LOCATIONS {
      return Err(Error::InstanceTooLarge { locations: n, cap: MAX_LOCATIONS });
    }
    let mut table = OpTable {
      instance,
      arena: Vec::new(),
      index: map_with_capacity(n),
      size: 0,
    };
    table.expand_truck_entries(constraints, cancel)?;
    table.augment_fly_nodes(constraints, cancel)?;
    debug!(entries = table.size, arena = table.arena.len(), "operation table built");
    Ok(table)
  }

  /// Number of distinct (origin, destination, covered-set) keys stored.
  pub fn len(&self) -> usize {
    self.size
  }

  pub fn is_empty(&self) -> bool {
    self.size == 0
  }

  pub fn instance(&self) -> &'a Instance {
    self.instance
  }

  pub fn entries(&self, from: Loc, to: Loc) -> impl Iterator<Item = &OpEntry> + '_ {
    self
      .index
      .get(&from)
      .and_then(|sub| sub.get(&to))
      .into_iter()
      .flat_map(move |subsub| subsub.values().map(move |&id| &self.arena[id as usize]))
  }

  pub fn all_entries(&self) -> impl Iterator<Item = &OpEntry> + '_ {
    self
      .index
      .values()
      .flat_map(|sub| sub.values())
      .flat_map(move |subsub| subsub.values().map(move |&id| &self.arena[id as usize]))
  }

  pub fn entry(&self, from: Loc, to: Loc, covered: LocSet) -> Option<&OpEntry> {
    self.get(from, to, covered).map(|id| &self.arena[id as usize])
  }

  fn get(&self, from: Loc, to: Loc, covered: LocSet) -> Option<EntryId> {
    self.index.get(&from)?.get(&to)?.get(&covered).copied()
  }

  fn store(&mut self, entry: OpEntry) -> EntryId {
    let id = self.arena.len() as EntryId;
    self.arena.push(entry);
    let subsub = self.index.entry(entry.first).or_default().entry(entry.last).or_default();
    if subsub.insert(entry.set, id).is_none() {
      self.size += 1;
    }
    id
  }

  fn expand_truck_entries(
    &mut self,
    constraints: &[OpConstraint],
    cancel: &CancelToken,
  ) -> Result<()> {
    let drive = self.instance.drive();
    let mut expand: Vec<EntryId> = Vec::with_capacity(self.instance.node_count());
    for loc in self.instance.locations() {
      expand.push(self.store(OpEntry::seed(loc)));
    }
    while !expand.is_empty() {
      cancel.check()?;
      let mut next_layer = Vec::new();
      for &id in &expand {
        let e = self.arena[id as usize];
        for to in self.instance.locations() {
          let new_set = e.set.insert(to);
          let new_drive = e.drive + drive.context_free_prior(e.last, to, e.drive);
          if !new_drive.is_finite() {
            continue;
          }
          let old = self.get(e.first, to, new_set);
          if old.map_or(true, |o| new_drive < self.arena[o as usize].drive) {
            let revisit = e.set.contains(to) && new_set.len() > 1;
            let entry = OpEntry {
              first: e.first,
              last: to,
              set: new_set,
              fly: None,
              prev: Some(id),
              drive: new_drive,
              fly_cost: 0.0,
              cost: new_drive,
              node_count: new_set.len(),
              repetition: e.repetition || revisit,
            };
            if constraints.iter().all(|c| c.is_valid(&entry, &self.arena)) {
              let stored = self.store(entry);
              // entries ending at the depot are complete and repeated
              // entries can only get worse
              if !self.instance.is_depot(to) && !entry.repetition {
                next_layer.push(stored);
              }
            }
          }
        }
      }
      expand = next_layer;
    }
    Ok(())
  }

  fn augment_fly_nodes(&mut self, constraints: &[OpConstraint], cancel: &CancelToken) -> Result<()> {
    let n = self.instance.node_count();
    let fly = self.instance.fly();
    let mut fly_entries = Vec::new();
    for from in self.instance.locations() {
      cancel.check()?;
      for to in self.instance.locations() {
        for e in self.entries(from, to) {
          if e.fly.is_some() {
            continue;
          }
          for fly_node in e.set.complement(n).iter() {
            if self.instance.is_depot(fly_node) {
              continue;
            }
            let fly_cost = fly.fly_triangle(from, to, fly_node);
            if !fly_cost.is_finite() {
              continue;
            }
            let new_set = e.set.insert(fly_node);
            let entry = OpEntry {
              first: from,
              last: to,
              set: new_set,
              fly: Some(fly_node),
              prev: self.get(from, to, e.set),
              drive: e.drive,
              fly_cost,
              cost: e.drive.max(fly_cost),
              node_count: new_set.len(),
              repetition: e.repetition,
            };
            let improves = self
              .get(from, to, new_set)
              .map_or(true, |o| self.arena[o as usize].cost > entry.cost);
            if improves && constraints.iter().all(|c| c.is_valid(&entry, &self.arena)) {
              fly_entries.push(entry);
            }
          }
        }
      }
    }
    for entry in fly_entries {
      let improves = self
        .get(entry.first, entry.last, entry.set)
        .map_or(true, |o| self.arena[o as usize].cost > entry.cost);
      if improves {
        self.store(entry);
      }
    }
    Ok(())
  }

  /// Reconstruct the operation an entry stands for, cross-checking the
  /// stored cost against a fresh evaluation.
  pub fn operation(&self, entry: &OpEntry) -> Result<Operation> {
    let mut cur = entry;
    if entry.fly.is_some() {
      // the fly augmentation reuses its predecessor's truck path
      cur = &self.arena[entry.prev.expect("fly entries keep their truck predecessor") as usize];
    }
    let mut path = vec![cur.last];
    while let Some(prev) = cur.prev {
      cur = &self.arena[prev as usize];
      path.push(cur.last);
    }
    path.reverse();
    let op = if path.len() == 1 {
      Operation::new(path[0], std::iter::empty(), path[0], entry.fly)
    } else {
      Operation::from_path(&path, entry.fly)
    };
    let recomputed = op.cost(self.instance);
    if (recomputed - entry.cost).abs() > COST_TOL {
      return Err(Error::TableIntegrity { stored: entry.cost, recomputed });
    }
    Ok(op)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::{line_instance, triangle_instance};
  use crate::Set;

  fn unconstrained(instance: &Instance) -> OpTable<'_> {
    OpTable::build(instance, &[], &CancelToken::new()).unwrap()
  }

  #[test]
  fn entries_cover_singletons_and_legs() {
    let i = line_instance(2.0);
    let table = unconstrained(&i);
    // singleton
    let seed = table.entry(1, 1, LocSet::singleton(1)).unwrap();
    assert_eq!(seed.drive, 0.0);
    // direct leg 0 -> 1
    let leg = table.entry(0, 1, LocSet::from_iter([0, 1])).unwrap();
    assert_eq!(leg.drive, 1.0);
    assert!(leg.fly.is_none());
  }

  #[test]
  fn fly_augmentation_dominates() {
    let i = line_instance(2.0);
    let table = unconstrained(&i);
    // 0 -> 1 with drone serving 2: drive 1.0, drone 0.5 + 1.0
    let e = table.entry(0, 1, LocSet::from_iter([0, 1, 2])).unwrap();
    let covered_by_truck = table
      .all_entries()
      .filter(|e| e.first == 0 && e.last == 1 && e.set == LocSet::from_iter([0, 1, 2]))
      .count();
    assert_eq!(covered_by_truck, 1);
    assert!((e.cost - e.drive.max(e.fly_cost)).abs() < COST_TOL);
  }

  #[test]
  fn entry_costs_reconstruct() {
    let i = triangle_instance(0.5);
    let table = unconstrained(&i);
    for from in i.locations() {
      for to in i.locations() {
        for e in table.entries(from, to) {
          let op = table.operation(e).unwrap();
          assert!((op.cost(&i) - e.cost).abs() < COST_TOL);
          assert_eq!(op.start(), e.first);
          assert_eq!(op.end(), e.last);
          assert_eq!(op.fly(), e.fly);
        }
      }
    }
  }

  #[test]
  fn depot_ending_entries_exist() {
    let i = triangle_instance(0.5);
    let table = unconstrained(&i);
    assert!(i.locations().any(|from| table.entries(from, 0).next().is_some()));
  }

  #[test]
  fn cardinality_bounds_truck_only_nodes() {
    let i = triangle_instance(0.5);
    let table =
      OpTable::build(&i, &[OpConstraint::Cardinality(0)], &CancelToken::new()).unwrap();
    for e in table.all_entries() {
      assert!(e.truck_only_count() == 0);
    }
  }

  #[test]
  fn max_fly_prunes_long_triangles() {
    let i = line_instance(2.0);
    // longest drone leg is 1.0 (depot to either customer, scaled by 0.5)
    let table =
      OpTable::build(&i, &[OpConstraint::MaxFly(0.9)], &CancelToken::new()).unwrap();
    for e in table.all_entries() {
      if e.fly.is_some() {
        assert!(e.fly_cost <= 0.9);
      }
    }
  }

  #[test]
  fn restricted_rules_prune_fly_entries() {
    let i = line_instance(2.0);
    let restricted = Instance::Restricted {
      inner: Box::new(i),
      rules: crate::instance::Restrictions {
        max_fly: f64::INFINITY,
        forbidden: Set::default(),
        no_visit: [1 as Loc].into_iter().collect(),
      },
    };
    let table = unconstrained(&restricted);
    assert!(table.all_entries().all(|e| e.fly != Some(1)));
    assert!(table.all_entries().any(|e| e.fly == Some(2)));
  }

  #[test]
  fn too_many_locations_rejected() {
    let pts = (0..33)
      .map(|t| crate::instance::Point::new(t as f64, 0.0, format!("p{}", t)))
      .collect();
    let i = Instance::Geometric(
      crate::instance::GeometricInstance::new(pts, 1.0, 0.5).unwrap(),
    );
    assert!(matches!(
      OpTable::build(&i, &[], &CancelToken::new()),
      Err(Error::InstanceTooLarge { .. })
    ));
  }

  #[test]
  fn cancellation_aborts_the_build() {
    let i = triangle_instance(0.5);
    let token = CancelToken::new();
    token.cancel();
    assert!(matches!(
      OpTable::build(&i, &[], &token),
      Err(Error::Cancelled)
    ));
  }
}
