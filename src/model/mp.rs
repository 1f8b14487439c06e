//! Set-cover / Eulerian-subgraph formulation over the operation table.
//!
//! One binary per table entry selects the operation, one binary per
//! location tells whether the tour touches it (the depot's is fixed to 1).
//! Coverage, degree balance and activity bounds are linear; sub-tour
//! elimination constraints are enumerated over every depot-free subset and
//! either parked in the solver's lazy pool or added eagerly.

use crate::bitset::LocSet;
use crate::operation::Operation;
use crate::optable::OpTable;
use crate::solution::Solution;
use crate::{Error, Instance, Loc, Map, Result, COST_TOL, DEPOT};
use grb::prelude::*;
use itertools::Itertools;
use tracing::{debug, instrument};

pub struct MipVars {
  /// Selection variable per operation, with the operation it stands for.
  pub x: Vec<(Operation, Var)>,
  /// Activity variable per location.
  pub z: Map<Loc, Var>,
}

impl MipVars {
  fn build(instance: &Instance, ops: Vec<Operation>, model: &mut Model) -> Result<Self> {
    let mut x = Vec::with_capacity(ops.len());
    for (idx, op) in ops.into_iter().enumerate() {
      let cost = op.cost(instance);
      let var = add_binvar!(model, name: &format!("x[{}]", idx), obj: cost)?;
      x.push((op, var));
    }
    let mut z = Map::default();
    for loc in instance.locations() {
      let var = add_binvar!(model, name: &format!("z[{}]", loc))?;
      if instance.is_depot(loc) {
        model.set_obj_attr(attr::LB, &var, 1.0)?;
      }
      z.insert(loc, var);
    }
    Ok(MipVars { x, z })
  }
}

pub struct MipConstraints {
  pub cover: Map<Loc, Constr>,
  /// Redundant given the balance constraints, kept to speed up presolve.
  pub depot_cover: Constr,
  pub balance: Map<Loc, Constr>,
  pub activity: Map<Loc, Constr>,
  pub subtour: Vec<Constr>,
}

impl MipConstraints {
  fn build(instance: &Instance, vars: &MipVars, model: &mut Model, lazy: bool) -> Result<Self> {
    let n = instance.node_count();

    let mut cover = Map::default();
    for loc in instance.locations() {
      let xsum = vars
        .x
        .iter()
        .filter(|(op, _)| op.covered().contains(&loc))
        .map(|(_, var)| *var)
        .grb_sum();
      let c = model.add_constr(&format!("cover[{}]", loc), c!(xsum >= 1))?;
      cover.insert(loc, c);
    }

    let depot_cover = {
      let xsum =
        vars.x.iter().filter(|(op, _)| op.end() == DEPOT).map(|(_, var)| *var).grb_sum();
      model.add_constr("cover_depot", c!(xsum >= 1))?
    };

    let mut balance = Map::default();
    let mut activity = Map::default();
    for loc in instance.locations() {
      let outgoing = vars
        .x
        .iter()
        .filter(|(op, _)| op.start() == loc)
        .map(|(_, var)| *var)
        .grb_sum();
      let incoming = vars
        .x
        .iter()
        .filter(|(op, _)| op.end() == loc)
        .map(|(_, var)| *var)
        .grb_sum();
      let c = model.add_constr(&format!("inout[{}]", loc), c!(outgoing == incoming.clone()))?;
      balance.insert(loc, c);
      let c = model
        .add_constr(&format!("count[{}]", loc), c!(incoming <= (n as f64) * vars.z[&loc]))?;
      activity.insert(loc, c);
    }

    // one cut per (depot-free subset, member): arcs entering the subset
    // must activate each member
    let mut subtour = Vec::new();
    let customers = LocSet::full(n).remove(DEPOT);
    for subset in customers.subsets() {
      let entering = vars
        .x
        .iter()
        .filter(|(op, _)| !subset.contains(op.start()) && subset.contains(op.end()))
        .map(|(_, var)| *var)
        .grb_sum();
      for member in subset.iter() {
        let name = format!("st[{}|z{}]", subset.iter().join("_"), member);
        let c =
          model.add_constr(&name, c!(entering.clone() >= vars.z[&member]))?;
        if lazy {
          model.set_obj_attr(attr::Lazy, &c, 1)?;
        }
        subtour.push(c);
      }
    }
    Ok(MipConstraints { cover, depot_cover, balance, activity, subtour })
  }
}

/// The assembled model. Owns the backend handles; dropping it releases
/// them on every exit path.
pub struct OpTableMip {
  pub model: Model,
  pub vars: MipVars,
  pub cons: MipConstraints,
}

impl OpTableMip {
  /// Model over every efficient operation in the table. Sub-tour cuts go
  /// to the lazy pool.
  #[instrument(level = "debug", skip_all, fields(entries = table.len()))]
  pub fn from_table(table: &OpTable<'_>) -> Result<Self> {
    let instance = table.instance();
    let mut ops = Vec::with_capacity(table.len());
    for entry in table.all_entries() {
      ops.push(table.operation(entry)?);
    }
    OpTableMip::build(instance, ops, true)
  }

  /// Model restricted to the operations of a known solution, with eager
  /// sub-tour cuts; used to revalidate a tour.
  pub fn from_solution(instance: &Instance, solution: &Solution) -> Result<Self> {
    OpTableMip::build(instance, solution.operations().to_vec(), false)
  }

  fn build(instance: &Instance, ops: Vec<Operation>, lazy: bool) -> Result<Self> {
    let env = {
      let mut env = Env::empty()?;
      env.set(param::OutputFlag, 0)?;
      env.start()?
    };
    let mut model = Model::with_env("tspd_ops", &env)?;
    let vars = MipVars::build(instance, ops, &mut model)?;
    let cons = MipConstraints::build(instance, &vars, &mut model, lazy)?;
    model.set_attr(attr::ModelSense, ModelSense::Minimize)?;
    Ok(OpTableMip { model, vars, cons })
  }

  pub fn solve(&mut self) -> Result<()> {
    self.model.optimize()?;
    match self.model.status()? {
      Status::Optimal => Ok(()),
      Status::Infeasible | Status::InfOrUnbd => Err(Error::Infeasible),
      status => Err(Error::Solver(format!("unexpected status: {:?}", status))),
    }
  }

  /// The operations selected by the incumbent.
  pub fn selected_operations(&self) -> Result<Vec<Operation>> {
    let mut ops = Vec::new();
    for (op, var) in &self.vars.x {
      let value = self.model.get_obj_attr(attr::X, var)?;
      if value >= 1.0 - COST_TOL {
        ops.push(op.clone());
      }
    }
    debug!(selected = ops.len(), "extracted incumbent");
    Ok(ops)
  }
}
