use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use structopt::StructOpt;
use tracing::info;
use tspd::io::{self, Format};
use tspd::solver::dp::FixedOrderDp;
use tspd::solver::greedy::FixedOrderHeuristic;
use tspd::solver::improve::{IterativeImprovement, Neighbourhoods};
use tspd::solver::mst::MstSolver;
use tspd::solver::murray_chu::MurrayChuSolver;
use tspd::solver::random::RandomSolver;
use tspd::solver::{FixedOrderSolver, OrderThenSplit, Solver};

#[derive(Debug, StructOpt)]
#[structopt(name = "tspd", about = "Solve traveling salesman problem with drone instances")]
struct Args {
  /// Instance file
  instance: PathBuf,

  /// Instance format: geometric, graph or matrix
  #[structopt(long, default_value = "geometric")]
  format: String,

  /// Solver: mst, random, dp, greedy, murray-chu, iterative or mip
  #[structopt(long, short, default_value = "murray-chu")]
  solver: String,

  /// Seed for the random solver
  #[structopt(long, default_value = "54321")]
  seed: u64,

  /// Truck-only customers allowed per operation in the exact solver
  /// (negative = unrestricted)
  #[structopt(long, default_value = "-1")]
  max_cardinality: i32,

  /// Fly-range factor for the exact solver (2 or more = unrestricted)
  #[structopt(long, default_value = "2.0")]
  max_range: f64,

  /// Write the solution here instead of stdout
  #[structopt(long, short)]
  output: Option<PathBuf>,

  /// Log progress to stderr
  #[structopt(long)]
  verbose: bool,
}

fn main() -> Result<()> {
  let args = Args::from_args();
  tspd::logging::init_logging(args.verbose);

  let format = match args.format.as_str() {
    "geometric" => Format::Geometric,
    "graph" => Format::Graph,
    "matrix" => Format::Matrix,
    other => bail!("unknown instance format `{}`", other),
  };
  let instance = io::read_instance(&args.instance, format)
    .with_context(|| format!("reading {}", args.instance.display()))?;
  info!(n = instance.node_count(), "instance loaded");

  let mst_order = || -> Result<Vec<usize>> {
    let seed = MstSolver::new().solve(&instance)?;
    Ok(seed.order().expect("MST tours carry no drone sorties"))
  };

  let solution = match args.solver.as_str() {
    "mst" => MstSolver::new().solve(&instance)?,
    "random" => RandomSolver::new(args.seed).solve(&instance)?,
    "dp" => FixedOrderDp::new().solve_order(&instance, &mst_order()?)?,
    "greedy" => FixedOrderHeuristic::default().solve_order(&instance, &mst_order()?)?,
    "murray-chu" => MurrayChuSolver::new().solve_order(&instance, &mst_order()?)?,
    "iterative" => {
      let mut solver = OrderThenSplit::new(
        MstSolver::new(),
        IterativeImprovement::new(FixedOrderDp::new(), Neighbourhoods::default()),
      );
      solver.solve(&instance)?
    }
    #[cfg(feature = "gurobi")]
    "mip" => {
      tspd::solver::mip::MipSolver::with_limits(args.max_cardinality, args.max_range)
        .solve(&instance)?
    }
    #[cfg(not(feature = "gurobi"))]
    "mip" => bail!("this build has no MIP backend; rebuild with --features gurobi"),
    other => bail!("unknown solver `{}`", other),
  };

  info!(cost = solution.total_cost(), operations = solution.operation_count(), "solved");
  let rendered = io::write_solution(&instance, &solution);
  match &args.output {
    Some(path) => std::fs::write(path, rendered)
      .with_context(|| format!("writing {}", path.display()))?,
    None => print!("{}", rendered),
  }
  eprintln!(
    "cost {} with {} operations",
    solution.total_cost(),
    solution.operation_count()
  );
  Ok(())
}
