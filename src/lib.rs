#![deny(unused_must_use)]
//! Exact and heuristic solvers for the traveling salesman problem with
//! drone (TSP-D). A single truck and a single drone jointly serve a set of
//! customers; the tour decomposes into operations, each combining a truck
//! path with at most one drone sortie, and the objective is the makespan.

pub use fnv::{FnvHashMap as Map, FnvHashSet as Set};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stable index of a location. Index 0 is always the depot.
pub type Loc = usize;

/// Travel times and objective values.
pub type Cost = f64;

pub const DEPOT: Loc = 0;

pub fn map_with_capacity<K, V>(capacity: usize) -> Map<K, V> {
  Map::with_capacity_and_hasher(capacity, fnv::FnvBuildHasher::default())
}

pub fn set_with_capacity<T>(capacity: usize) -> Set<T> {
  Set::with_capacity_and_hasher(capacity, fnv::FnvBuildHasher::default())
}

#[derive(Debug, Clone)]
pub enum Error {
  /// Malformed file or illegal parameter.
  InvalidInput(String),
  /// More locations than the bitset tables (hard) or the exact solver
  /// (soft) can handle.
  InstanceTooLarge { locations: usize, cap: usize },
  /// No feasible tour exists for the given table / model.
  Infeasible,
  /// Opaque failure reported by the optimization backend, verbatim.
  Solver(String),
  /// A table entry's stored cost disagrees with its recomputed operation
  /// cost beyond `COST_TOL`.
  TableIntegrity { stored: Cost, recomputed: Cost },
  /// The selected operation multiset does not admit an Eulerian walk.
  IllFormedGraph,
  /// Cooperative cancellation was requested.
  Cancelled,
}

impl Error {
  pub fn invalid_input(msg: impl Into<String>) -> Self {
    Error::InvalidInput(msg.into())
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
      Error::InstanceTooLarge { locations, cap } => {
        write!(f, "instance has {} locations, solver cap is {}", locations, cap)
      }
      Error::Infeasible => f.write_str("the instance admits no feasible tour"),
      Error::Solver(msg) => write!(f, "optimization backend error: {}", msg),
      Error::TableIntegrity { stored, recomputed } => write!(
        f,
        "table cost {} disagrees with recomputed operation cost {}",
        stored, recomputed
      ),
      Error::IllFormedGraph => f.write_str("operation multiset is not Eulerian"),
      Error::Cancelled => f.write_str("cancelled"),
    }
  }
}

impl std::error::Error for Error {}

#[cfg(feature = "gurobi")]
impl From<grb::Error> for Error {
  fn from(e: grb::Error) -> Self {
    Error::Solver(e.to_string())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Cooperative cancellation flag shared between a solver and its caller.
/// Long-running builds check it between expansion layers, DP rows and heap
/// pops; a cancelled solver releases its resources and returns
/// [`Error::Cancelled`].
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    CancelToken::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::Relaxed);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Relaxed)
  }

  pub fn check(&self) -> Result<()> {
    if self.is_cancelled() {
      Err(Error::Cancelled)
    } else {
      Ok(())
    }
  }
}

mod constants;
pub use constants::*;

pub mod bitset;
pub mod dist;
pub mod euler;
pub mod generate;
pub mod heap;
pub mod instance;
pub mod io;
pub mod logging;
#[cfg(feature = "gurobi")]
pub mod model;
pub mod operation;
pub mod optable;
pub mod solution;
pub mod solver;
pub mod unionfind;
mod utils;

pub use instance::Instance;
pub use operation::Operation;
pub use solution::Solution;

#[cfg(test)]
pub(crate) mod test;
