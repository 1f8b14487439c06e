//! Reading and writing of instances and solutions.
//!
//! All formats are whitespace-tokenized text; comments enclosed in
//! `/* ... */` are stripped before tokenizing. A restricted instance is an
//! overlay of `#MAXFLY` / `#FORBID` / `#NOVISIT` lines prefixed to any base
//! instance format.

use crate::instance::{
  GeometricInstance, GraphBuilder, GraphInstance, Instance, MatrixInstance, Point, Restrictions,
};
use crate::operation::Operation;
use crate::solution::Solution;
use crate::{Cost, Error, Loc, Result, Set};
use regex::Regex;
use std::fmt::Write as _;
use std::path::Path;

const MAXFLY: &str = "#MAXFLY";
const FORBID: &str = "#FORBID";
const NOVISIT: &str = "#NOVISIT";

const IDENTIFIER_CHARS: &str = "A-Za-z0-9_=\\-\\[\\],\\.";

/// Rewrite a name so it survives tokenization: every character outside the
/// identifier set becomes an underscore.
pub fn transform_name(name: &str) -> String {
  let re = Regex::new(&format!("[^{}]", IDENTIFIER_CHARS)).unwrap();
  re.replace_all(name, "_").into_owned()
}

pub fn strip_comments(input: &str) -> String {
  let comments = Regex::new(r"(?s)/\*.*?\*/").unwrap();
  let stripped = comments.replace_all(input, "");
  stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Token stream over comment-stripped input.
pub struct Tokens {
  tokens: Vec<String>,
  pos: usize,
}

impl Tokens {
  pub fn new(input: &str) -> Self {
    Tokens { tokens: strip_comments(input).split_whitespace().map(String::from).collect(), pos: 0 }
  }

  pub fn has_next(&self) -> bool {
    self.pos < self.tokens.len()
  }

  fn next(&mut self) -> Result<&str> {
    let tok =
      self.tokens.get(self.pos).ok_or_else(|| Error::invalid_input("unexpected end of input"))?;
    self.pos += 1;
    Ok(tok)
  }

  pub fn next_f64(&mut self) -> Result<f64> {
    let tok = self.next()?;
    tok.parse().map_err(|_| Error::invalid_input(format!("expected a number, found `{}`", tok)))
  }

  pub fn next_usize(&mut self) -> Result<usize> {
    let tok = self.next()?;
    tok.parse().map_err(|_| Error::invalid_input(format!("expected an integer, found `{}`", tok)))
  }

  pub fn next_isize(&mut self) -> Result<isize> {
    let tok = self.next()?;
    tok.parse().map_err(|_| Error::invalid_input(format!("expected an integer, found `{}`", tok)))
  }

  pub fn next_bool(&mut self) -> Result<bool> {
    let tok = self.next()?;
    tok.parse().map_err(|_| Error::invalid_input(format!("expected true/false, found `{}`", tok)))
  }

  pub fn next_identifier(&mut self) -> Result<String> {
    let tok = self.next()?;
    let re = Regex::new(&format!("^[{}]+$", IDENTIFIER_CHARS)).unwrap();
    if !re.is_match(tok) {
      return Err(Error::invalid_input(format!("`{}` is not an identifier", tok)));
    }
    Ok(tok.to_string())
  }
}

// --- geometric instances ---------------------------------------------------

pub fn parse_geometric(input: &str) -> Result<GeometricInstance> {
  let mut ts = Tokens::new(input);
  let drive = ts.next_f64()?;
  let fly = ts.next_f64()?;
  let n = ts.next_usize()?;
  let mut points = Vec::with_capacity(n);
  for _ in 0..n {
    let x = ts.next_f64()?;
    let y = ts.next_f64()?;
    let name = ts.next_identifier()?;
    points.push(Point::new(x, y, name));
  }
  GeometricInstance::new(points, drive, fly)
}

pub fn write_geometric(instance: &GeometricInstance) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "/*The speed of the Truck*/");
  let _ = writeln!(out, "{}", instance.drive_speed());
  let _ = writeln!(out, "/*The speed of the Drone*/");
  let _ = writeln!(out, "{}", instance.fly_speed());
  let _ = writeln!(out, "/*Number of Nodes*/");
  let _ = writeln!(out, "{}", instance.points().len());
  let _ = writeln!(out, "/*The Locations (x_coor y_coor name)*/");
  for p in instance.points() {
    let _ = writeln!(out, "{} {} {}", p.x, p.y, transform_name(&p.name));
  }
  out
}

// --- graph instances -------------------------------------------------------

pub fn parse_graph(input: &str) -> Result<GraphInstance> {
  let mut ts = Tokens::new(input);
  let n = ts.next_usize()?;
  let bidirectional = ts.next_bool()?;
  let mut builder = GraphBuilder::new(n, bidirectional);
  while ts.has_next() {
    let from = ts.next_usize()?;
    let to = ts.next_usize()?;
    let drive = ts.next_f64()?;
    let fly = ts.next_f64()?;
    builder.add_edge(from, to, drive, fly)?;
  }
  builder.build()
}

pub fn write_graph(instance: &GraphInstance) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "/*Number of Locations including Depot*/");
  let _ = writeln!(out, "{}", instance.n());
  let _ = writeln!(out, "/*Is this a bidirectional instance?*/");
  let _ = writeln!(out, "{}", instance.bidirectional());
  let _ = writeln!(out, "/*Edges (from to drive_distance fly_distance)*/");
  for e in instance.edges() {
    let _ = writeln!(out, "{} {} {} {}", e.from, e.to, e.drive, e.fly);
  }
  out
}

// --- matrix instances ------------------------------------------------------

pub fn parse_matrix(input: &str) -> Result<MatrixInstance> {
  let mut ts = Tokens::new(input);
  let n = ts.next_usize()?;
  let drive = read_square_matrix(&mut ts, n)?;
  let fly = read_square_matrix(&mut ts, n)?;
  MatrixInstance::new(drive, fly)
}

fn read_square_matrix(ts: &mut Tokens, n: usize) -> Result<Vec<Vec<Cost>>> {
  let mut matrix = Vec::with_capacity(n);
  for _ in 0..n {
    let mut row = Vec::with_capacity(n);
    for _ in 0..n {
      row.push(ts.next_f64()?);
    }
    matrix.push(row);
  }
  Ok(matrix)
}

pub fn write_matrix(instance: &MatrixInstance) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "/* Number of Locations including the Depot */");
  let _ = writeln!(out, "{}", instance.drive_matrix().len());
  for (matrix, what) in [(instance.drive_matrix(), "driving"), (instance.fly_matrix(), "flying")] {
    let _ = writeln!(out, "/* The distance matrix for {} */", what);
    for row in matrix {
      for d in row {
        let _ = write!(out, "{} ", d);
      }
      let _ = writeln!(out);
    }
  }
  out
}

// --- restricted overlay ----------------------------------------------------

fn is_overlay_line(line: &str) -> bool {
  [MAXFLY, FORBID, NOVISIT].iter().any(|t| line.starts_with(t))
}

/// Split off the restriction overlay and parse the remaining lines as the
/// base instance via `parse_base`.
pub fn parse_restricted<F>(input: &str, parse_base: F) -> Result<Instance>
where
  F: FnOnce(&str) -> Result<Instance>,
{
  let base: String =
    input.lines().filter(|l| !is_overlay_line(l)).collect::<Vec<_>>().join("\n");
  let instance = parse_base(&base)?;
  let n = instance.node_count();

  let mut max_fly = Cost::INFINITY;
  let mut forbidden = Set::default();
  let mut no_visit = Set::default();
  let check = |index: Loc| -> Result<Loc> {
    if index >= n {
      Err(Error::invalid_input(format!("restricted location {} is out of range", index)))
    } else {
      Ok(index)
    }
  };
  for line in input.lines().filter(|l| is_overlay_line(l)) {
    if let Some(rest) = line.strip_prefix(MAXFLY) {
      let value: f64 = rest
        .trim()
        .parse()
        .map_err(|_| Error::invalid_input(format!("bad {} line: `{}`", MAXFLY, line)))?;
      max_fly = max_fly.min(value);
    } else if let Some(rest) = line.strip_prefix(FORBID) {
      let index: Loc = rest
        .trim()
        .parse()
        .map_err(|_| Error::invalid_input(format!("bad {} line: `{}`", FORBID, line)))?;
      forbidden.insert(check(index)?);
    } else if let Some(rest) = line.strip_prefix(NOVISIT) {
      let index: Loc = rest
        .trim()
        .parse()
        .map_err(|_| Error::invalid_input(format!("bad {} line: `{}`", NOVISIT, line)))?;
      no_visit.insert(check(index)?);
    }
  }
  Ok(Instance::Restricted {
    inner: Box::new(instance),
    rules: Restrictions { max_fly, forbidden, no_visit },
  })
}

pub fn write_restrictions(rules: &Restrictions, n: usize) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "{} {}", MAXFLY, rules.max_fly);
  for index in 0..n {
    if rules.forbidden.contains(&index) {
      let _ = writeln!(out, "{} {}", FORBID, index);
    }
    if rules.no_visit.contains(&index) {
      let _ = writeln!(out, "{} {}", NOVISIT, index);
    }
  }
  out
}

// --- any instance ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
  Geometric,
  Graph,
  Matrix,
}

pub fn parse_instance(input: &str, format: Format) -> Result<Instance> {
  let base = |data: &str| -> Result<Instance> {
    match format {
      Format::Geometric => Ok(Instance::Geometric(parse_geometric(data)?)),
      Format::Graph => Ok(Instance::Graph(parse_graph(data)?)),
      Format::Matrix => Ok(Instance::Matrix(parse_matrix(data)?)),
    }
  };
  if input.lines().any(is_overlay_line) {
    parse_restricted(input, base)
  } else {
    base(input)
  }
}

pub fn write_instance(instance: &Instance) -> String {
  match instance {
    Instance::Geometric(g) => write_geometric(g),
    Instance::Graph(g) => write_graph(g),
    Instance::Matrix(m) => write_matrix(m),
    Instance::Restricted { inner, rules } => {
      let mut out = write_restrictions(rules, inner.node_count());
      out.push_str(&write_instance(inner));
      out
    }
  }
}

pub fn read_instance(path: impl AsRef<Path>, format: Format) -> Result<Instance> {
  let data = std::fs::read_to_string(path.as_ref())
    .map_err(|e| Error::invalid_input(format!("{}: {}", path.as_ref().display(), e)))?;
  parse_instance(&data, format)
}

// --- solutions -------------------------------------------------------------

pub fn parse_solution(instance: &Instance, input: &str) -> Result<Solution> {
  let mut ts = Tokens::new(input);
  let n = instance.node_count();
  let count = ts.next_usize()?;
  let mut ops = Vec::with_capacity(count);
  let loc = |idx: usize| -> Result<Loc> {
    if idx < n {
      Ok(idx)
    } else {
      Err(Error::invalid_input(format!("location index {} out of range", idx)))
    }
  };
  for _ in 0..count {
    let start = loc(ts.next_usize()?)?;
    let end = loc(ts.next_usize()?)?;
    let fly = match ts.next_isize()? {
      -1 => None,
      f if f >= 0 => Some(loc(f as usize)?),
      f => return Err(Error::invalid_input(format!("bad fly index {}", f))),
    };
    let internal_count = ts.next_usize()?;
    let mut internal = Vec::with_capacity(internal_count);
    for _ in 0..internal_count {
      internal.push(loc(ts.next_usize()?)?);
    }
    ops.push(Operation::new(start, internal, end, fly));
  }
  Ok(Solution::new(instance, ops))
}

pub fn write_solution(instance: &Instance, solution: &Solution) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "/* Number of Operations */");
  let _ = writeln!(out, "{}", solution.operation_count());
  let _ = writeln!(out, "/* List of Operations. */");
  let _ = writeln!(out, "/* Start\tEnd\tFly\t#Internal\tLocations...*/");
  for op in solution.operations() {
    let _ = write!(out, "{}\t{}\t", op.start(), op.end());
    match op.fly() {
      Some(f) => {
        let _ = write!(out, "{}", f);
      }
      None => {
        let _ = write!(out, "-1");
      }
    }
    let _ = write!(out, "\t{}", op.drive().len());
    for l in op.drive() {
      let _ = write!(out, "\t{}", l);
    }
    let _ = writeln!(out, "\t/* Operation cost : {}*/", op.cost(instance));
  }
  let _ = writeln!(out, "/* Total cost : {} */", solution.total_cost());
  out
}

pub fn read_solution(instance: &Instance, path: impl AsRef<Path>) -> Result<Solution> {
  let data = std::fs::read_to_string(path.as_ref())
    .map_err(|e| Error::invalid_input(format!("{}: {}", path.as_ref().display(), e)))?;
  parse_solution(instance, &data)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::operation::Operation;
  use crate::test::line_instance;

  #[test]
  fn comments_are_stripped() {
    let s = strip_comments("1 /* a comment\nover lines */ 2\n3");
    assert_eq!(s, "1 2 3");
  }

  #[test]
  fn names_are_transformed() {
    assert_eq!(transform_name("a location!"), "a_location_");
    assert_eq!(transform_name("x=1.5,y=[2]"), "x=1.5,y=[2]");
  }

  #[test]
  fn geometric_round_trip() {
    let text = "1.0\n0.5\n3\n0 0 depot\n-1 0 left\n1 0 right\n";
    let parsed = parse_geometric(text).unwrap();
    let written = write_geometric(&parsed);
    let reparsed = parse_geometric(&written).unwrap();
    assert_eq!(written, write_geometric(&reparsed));
    assert_eq!(parsed, reparsed);
  }

  #[test]
  fn graph_round_trip() {
    let text = "3\ntrue\n0 1 1.0 0.5\n1 2 1.0 0.5\n";
    let parsed = parse_graph(text).unwrap();
    let written = write_graph(&parsed);
    let reparsed = parse_graph(&written).unwrap();
    assert_eq!(written, write_graph(&reparsed));
    assert_eq!(parsed, reparsed);
  }

  #[test]
  fn matrix_round_trip() {
    let text = "2\n0 1\n1 0\n0 0.5\n0.5 0\n";
    let parsed = parse_matrix(text).unwrap();
    let written = write_matrix(&parsed);
    let reparsed = parse_matrix(&written).unwrap();
    assert_eq!(written, write_matrix(&reparsed));
    assert_eq!(parsed, reparsed);
  }

  #[test]
  fn restricted_overlay_round_trip() {
    let text = "#MAXFLY 2.5\n#NOVISIT 1\n1.0\n0.5\n3\n0 0 depot\n-1 0 left\n1 0 right\n";
    let parsed = parse_instance(text, Format::Geometric).unwrap();
    let rules = parsed.restrictions().unwrap();
    assert_eq!(rules.max_fly, 2.5);
    assert!(rules.no_visit.contains(&1));
    assert!(rules.forbidden.is_empty());
    let written = write_instance(&parsed);
    let reparsed = parse_instance(&written, Format::Geometric).unwrap();
    assert_eq!(written, write_instance(&reparsed));
    assert_eq!(parsed, reparsed);
  }

  #[test]
  fn solution_round_trip() {
    let i = line_instance(2.0);
    let sol = Solution::new(
      &i,
      vec![Operation::new(0, [1], 0, Some(2))],
    );
    let written = write_solution(&i, &sol);
    let reparsed = parse_solution(&i, &written).unwrap();
    assert_eq!(reparsed, sol);
    assert_eq!(write_solution(&i, &reparsed), written);
  }

  #[test]
  fn malformed_input_is_invalid() {
    assert!(matches!(parse_geometric("1.0"), Err(Error::InvalidInput(_))));
    assert!(matches!(parse_geometric("x y z"), Err(Error::InvalidInput(_))));
    let i = line_instance(2.0);
    assert!(parse_solution(&i, "1\n0 5 -1 0\n").is_err());
  }
}
