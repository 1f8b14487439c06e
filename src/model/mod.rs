//! Mixed-integer model over the operation table. Only compiled with the
//! `gurobi` feature; the heuristic solvers carry no backend dependency.

pub mod mp;
