use anyhow::{bail, Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use tspd::generate;
use tspd::instance::GeometricInstance;
use tspd::io;

#[derive(Debug, StructOpt)]
#[structopt(name = "tspd-gen", about = "Generate random TSP-D instances")]
struct Args {
  /// Seed for the generator
  #[structopt(long, default_value = "54321")]
  seed: u64,

  /// Relative speed of the drone compared to the truck
  #[structopt(long, default_value = "2.0")]
  alpha: f64,

  /// Directory instances are written to
  #[structopt(long, short, default_value = ".")]
  output: PathBuf,

  /// Prefix filenames with the current date
  #[structopt(long)]
  date: bool,

  /// Overwrite existing output files
  #[structopt(long)]
  overwrite: bool,

  /// Group output into a subfolder per instance type
  #[structopt(long)]
  subfolder: bool,

  #[structopt(subcommand)]
  command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
  /// Uniformly distributed customers on a grid
  GenUniform {
    instances: usize,
    locations: usize,
    #[structopt(default_value = "100")]
    grid_size: u32,
  },
  /// Customers clustered around a single centre
  GenSinglecenter {
    instances: usize,
    locations: usize,
    #[structopt(default_value = "50")]
    std_dev: f64,
  },
  /// Customers split over two centres
  GenDoublecenter {
    instances: usize,
    locations: usize,
    #[structopt(default_value = "50")]
    std_dev1: f64,
    #[structopt(default_value = "50")]
    std_dev2: f64,
    #[structopt(default_value = "200")]
    distance: f64,
    #[structopt(default_value = "0.5")]
    prob: f64,
  },
}

fn main() -> Result<()> {
  let args = Args::from_args();
  if args.alpha <= 0.0 || !args.alpha.is_finite() {
    bail!("the value of alpha must be a positive number");
  }
  let fly = 1.0 / args.alpha;
  let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

  let (kind, count, locations): (&str, usize, usize) = match &args.command {
    Command::GenUniform { instances, locations, .. } => ("uniform", *instances, *locations),
    Command::GenSinglecenter { instances, locations, .. } => {
      ("singlecenter", *instances, *locations)
    }
    Command::GenDoublecenter { instances, locations, .. } => {
      ("doublecenter", *instances, *locations)
    }
  };

  let dir = if args.subfolder { args.output.join(kind) } else { args.output.clone() };
  std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

  for index in 0..count {
    let instance: GeometricInstance = match &args.command {
      Command::GenUniform { locations, grid_size, .. } => {
        // the generator counts customers, the CLI counts locations
        generate::uniform(locations - 1, &mut rng, 1.0, fly, *grid_size)
      }
      Command::GenSinglecenter { locations, std_dev, .. } => {
        generate::single_center(*locations, &mut rng, *std_dev, fly)
      }
      Command::GenDoublecenter { locations, std_dev1, std_dev2, distance, prob, .. } => {
        generate::double_center(*locations, &mut rng, fly, *std_dev1, *std_dev2, *distance, *prob)
      }
    };
    let path = output_path(&dir, kind, args.date, args.alpha, locations, index);
    if path.exists() && !args.overwrite {
      bail!("{} exists; pass --overwrite to replace it", path.display());
    }
    std::fs::write(&path, io::write_geometric(&instance))
      .with_context(|| format!("writing {}", path.display()))?;
    println!("{}", path.display());
  }
  Ok(())
}

fn output_path(
  dir: &Path,
  kind: &str,
  date: bool,
  alpha: f64,
  locations: usize,
  index: usize,
) -> PathBuf {
  let mut name = format!("{}-", kind);
  if date {
    // seconds since the epoch keeps the filename sortable without
    // pulling in a clock library
    let secs =
      std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    name.push_str(&format!("{}-", secs.as_secs()));
  }
  name.push_str(&format!("n{}-a{}-{}.txt", locations, alpha, index));
  dir.join(name)
}
