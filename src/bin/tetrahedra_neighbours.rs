//! CLI front-end for the parallel neighbours worked example (§4.7, §6).
//!
//! `tetrahedra_neighbours -in <input_mesh> -out <output_mesh> [-nproc <n>]`
//!
//! Reads a tetrahedral mesh, computes tet<->tet face adjacency with
//! [`lplib::neighbours`], extracts the boundary/interface triangle skin, and
//! writes the result back out. Reports reading time, neighbour time, writing
//! time, and triangle count on standard output (§6).

use anyhow::{anyhow, Context, Result};
use lplib::{mesh, neighbours, wall_clock, Scheduler};
use std::path::Path;
use std::process::ExitCode;

const USAGE_HEADING: &str = "usage: tetrahedra_neighbours -in <input_mesh> -out <output_mesh> [-nproc <n>]";

const USAGE_BODY: &str = "Computes tetrahedron-to-tetrahedron face adjacency for a mesh and writes the \
boundary/material-interface triangle skin alongside the input vertices and tetrahedra.";

const USAGE_FLAGS: &str = "  -in <path>     input mesh; `.meshb` is appended if the path has no `.mesh`
                 or `.meshb` suffix
  -out <path>    output mesh; same suffix rule as -in
  -nproc <n>     worker count, clamped to [1,128]; default is all available
                 hardware parallelism";

struct Args {
    input: String,
    output: String,
    nproc: usize,
}

fn default_nproc() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Parses the single-dash flag syntax of §6. Returns `Ok(None)` for the
/// no-arguments usage-banner case.
fn parse_args(argv: &[String]) -> Result<Option<Args>> {
    if argv.is_empty() {
        return Ok(None);
    }

    let mut input = None;
    let mut output = None;
    let mut nproc = None;

    let mut i = 0;
    while i < argv.len() {
        match argv[i].as_str() {
            "-in" => {
                i += 1;
                input = Some(argv.get(i).context("-in requires a path argument")?.clone());
            }
            "-out" => {
                i += 1;
                output = Some(argv.get(i).context("-out requires a path argument")?.clone());
            }
            "-nproc" => {
                i += 1;
                let raw = argv.get(i).context("-nproc requires a numeric argument")?;
                let n: usize = raw.parse().with_context(|| format!("-nproc: not a number: {raw}"))?;
                nproc = Some(n);
            }
            other => return Err(anyhow!("unrecognized argument: {other}")),
        }
        i += 1;
    }

    let input = input.context("missing required -in argument")?;
    let output = output.context("missing required -out argument")?;
    let nproc = nproc.unwrap_or_else(default_nproc).clamp(1, 128);

    Ok(Some(Args { input: mesh::normalize_path(&input), output: mesh::normalize_path(&output), nproc }))
}

fn run(args: Args) -> Result<()> {
    let read_start = wall_clock();
    let input_mesh = mesh::read(Path::new(&args.input))
        .with_context(|| format!("failed to read mesh {}", args.input))?;
    let reading_time = wall_clock() - read_start;

    let scheduler = Scheduler::init(args.nproc);

    let neighbour_start = wall_clock();
    let adjacency = neighbours::compute(&scheduler, &input_mesh)
        .map_err(|e| anyhow!("{e}"))
        .context("failed to compute tetrahedron neighbours")?;
    let triangles = neighbours::extract_boundary(&input_mesh, &adjacency);
    let neighbour_time = wall_clock() - neighbour_start;

    scheduler.shutdown();

    let mut output_mesh = input_mesh;
    output_mesh.triangles = triangles;

    let write_start = wall_clock();
    mesh::write(Path::new(&args.output), &output_mesh)
        .with_context(|| format!("failed to write mesh {}", args.output))?;
    let writing_time = wall_clock() - write_start;

    println!("reading time:   {reading_time:.3}s");
    println!("neighbour time: {neighbour_time:.3}s");
    println!("writing time:   {writing_time:.3}s");
    println!("triangles:      {}", output_mesh.triangles.len());

    Ok(())
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    match parse_args(&argv) {
        Ok(None) => {
            println!("{USAGE_HEADING}\n");
            println!("{}\n", textwrap::fill(USAGE_BODY, 78));
            println!("{USAGE_FLAGS}");
            ExitCode::SUCCESS
        }
        Ok(Some(args)) => match run(args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                println!("{err:#}");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            println!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
