//! Assembles a multiset of operation arcs into a single closed tour from
//! the depot. Builds an initial walk by Hierholzer's rule, then repeatedly
//! constructs sub-walks from visited vertices that still have outgoing
//! arcs and splices them into the main walk.

use crate::instance::Instance;
use crate::operation::Operation;
use crate::solution::Solution;
use crate::{Error, Loc, Map, Result, DEPOT};
use tracing::trace;

pub fn build_solution(instance: &Instance, ops: Vec<Operation>) -> Result<Solution> {
  let mut adjacency: Map<Loc, Vec<Operation>> = Map::default();
  for op in ops {
    adjacency.entry(op.start()).or_insert_with(Vec::new).push(op);
  }
  let tour = build_tours(adjacency, DEPOT)?;
  Ok(Solution::new(instance, tour))
}

fn build_tours(mut map: Map<Loc, Vec<Operation>>, start: Loc) -> Result<Vec<Operation>> {
  let mut walks: Vec<(Loc, Vec<Operation>)> = Vec::new();
  let main = build_walk(&mut map, start)?;
  walks.push((start, main));

  // peel off closed sub-walks anchored at vertices the existing walks
  // already pass through
  while !map.is_empty() {
    let anchor = walks
      .iter()
      .flat_map(|(_, walk)| walk.iter())
      .map(|op| op.end())
      .find(|end| map.contains_key(end))
      .ok_or(Error::IllFormedGraph)?;
    let walk = build_walk(&mut map, anchor)?;
    walks.push((anchor, walk));
  }

  let mut result = walks.remove(0).1;
  while !walks.is_empty() {
    let mut spliced = None;
    'searching: for (idx, op) in result.iter().enumerate() {
      for (w, (anchor, _)) in walks.iter().enumerate() {
        if op.end() == *anchor {
          spliced = Some((idx, w));
          break 'searching;
        }
      }
    }
    let (idx, w) = spliced.ok_or(Error::IllFormedGraph)?;
    let (_, sub) = walks.remove(w);
    // insert the sub-walk right after the arc arriving at its anchor
    let tail = result.split_off(idx + 1);
    result.extend(sub);
    result.extend(tail);
  }
  Ok(result)
}

/// One closed walk from `start`, consuming arcs from the adjacency map.
fn build_walk(map: &mut Map<Loc, Vec<Operation>>, start: Loc) -> Result<Vec<Operation>> {
  let mut walk = Vec::new();
  let mut cur = start;
  while cur != start || map.get(&start).map_or(false, |arcs| !arcs.is_empty()) {
    let arcs = map.get_mut(&cur).ok_or(Error::IllFormedGraph)?;
    let arc = arcs.remove(0);
    if arcs.is_empty() {
      map.remove(&cur);
    }
    cur = arc.end();
    trace!(from = arc.start(), to = cur, "walk arc");
    walk.push(arc);
    if cur != start && map.get(&cur).map_or(true, |arcs| arcs.is_empty()) {
      return Err(Error::IllFormedGraph);
    }
  }
  Ok(walk)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::line_instance;

  #[test]
  fn chains_a_simple_tour() {
    let i = line_instance(2.0);
    let ops = vec![
      Operation::direct(2, 0),
      Operation::direct(0, 1),
      Operation::direct(1, 2),
    ];
    let sol = build_solution(&i, ops).unwrap();
    assert!(sol.is_feasible(&i));
    assert_eq!(sol.order().unwrap(), vec![0, 1, 2, 0]);
  }

  #[test]
  fn splices_disjoint_loops() {
    let i = line_instance(2.0);
    // main loop 0 -> 1 -> 0 plus a detached loop 1 -> 2 -> 1
    let ops = vec![
      Operation::direct(0, 1),
      Operation::direct(1, 0),
      Operation::direct(1, 2),
      Operation::direct(2, 1),
    ];
    let sol = build_solution(&i, ops).unwrap();
    assert!(sol.is_feasible(&i));
    assert_eq!(sol.operation_count(), 4);
  }

  #[test]
  fn unbalanced_arcs_fail() {
    let i = line_instance(2.0);
    let ops = vec![Operation::direct(0, 1), Operation::direct(1, 2)];
    assert!(matches!(build_solution(&i, ops), Err(Error::IllFormedGraph)));
  }

  #[test]
  fn unreachable_component_fails() {
    let i = line_instance(2.0);
    // 0 -> 0 self loop plus disconnected 1 -> 2 -> 1
    let ops = vec![
      Operation::with_fly(0, 0, 1),
      Operation::direct(1, 2),
      Operation::direct(2, 1),
    ];
    assert!(matches!(build_solution(&i, ops), Err(Error::IllFormedGraph)));
  }
}
