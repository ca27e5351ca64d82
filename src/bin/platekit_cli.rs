use anyhow::{Context, Result, anyhow, bail};
use platekit::config::{OutputMode, PlannerConfig};
use platekit::transfer::TransferPlan;
use platekit::{basic, biobricks, moclo, report};
use std::env;
use std::fs::File;
use std::path::PathBuf;

fn usage() {
    eprintln!(
        "Usage:\n  \
  platekit_cli --version\n  \
  platekit_cli plan basic      --constructs FILE --parts FILE [--parts FILE]... --out DIR\n  \
  platekit_cli plan biobricks  --constructs FILE --parts FILE [--parts FILE]... --out DIR\n  \
  platekit_cli plan moclo      --constructs FILE --plate-map FILE --out DIR [--triplicate]\n\n  \
  Writes <chemistry>_metainformation.csv and <chemistry>_plan.json into DIR."
    );
}

struct PlanArgs {
    constructs: PathBuf,
    parts: Vec<PathBuf>,
    plate_map: Option<PathBuf>,
    out: PathBuf,
    triplicate: bool,
}

fn parse_plan_args(args: &[String]) -> Result<PlanArgs> {
    let mut constructs = None;
    let mut parts = vec![];
    let mut plate_map = None;
    let mut out = None;
    let mut triplicate = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--constructs" | "--parts" | "--plate-map" | "--out" => {
                let flag = &args[i];
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("Missing value for {flag}"))?;
                match flag.as_str() {
                    "--constructs" => constructs = Some(PathBuf::from(value)),
                    "--parts" => parts.push(PathBuf::from(value)),
                    "--plate-map" => plate_map = Some(PathBuf::from(value)),
                    _ => out = Some(PathBuf::from(value)),
                }
                i += 2;
            }
            "--triplicate" => {
                triplicate = true;
                i += 1;
            }
            other => bail!("Unknown argument '{other}'"),
        }
    }
    Ok(PlanArgs {
        constructs: constructs.ok_or_else(|| anyhow!("Missing --constructs"))?,
        parts,
        plate_map,
        out: out.ok_or_else(|| anyhow!("Missing --out"))?,
        triplicate,
    })
}

fn open(path: &PathBuf) -> Result<File> {
    File::open(path).with_context(|| format!("Could not open '{}'", path.display()))
}

fn compile_plan(chemistry: &str, args: &PlanArgs, config: &PlannerConfig) -> Result<TransferPlan> {
    let constructs = open(&args.constructs)?;
    let plan = match chemistry {
        "basic" | "biobricks" => {
            if args.parts.is_empty() {
                bail!("{chemistry} needs at least one --parts file");
            }
            let mut part_files = vec![];
            for path in &args.parts {
                part_files.push(open(path)?);
            }
            if chemistry == "basic" {
                basic::plan(constructs, part_files, config)?
            } else {
                biobricks::plan(constructs, part_files, config)?
            }
        }
        "moclo" => {
            let plate_map = args
                .plate_map
                .as_ref()
                .ok_or_else(|| anyhow!("moclo needs --plate-map"))?;
            moclo::plan(constructs, open(plate_map)?, config)?
        }
        other => bail!("Unknown chemistry '{other}', expected basic, biobricks or moclo"),
    };
    Ok(plan)
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        bail!("Missing command");
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("platekit {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if args[1] != "plan" {
        usage();
        bail!("Unknown command '{}'", args[1]);
    }
    if args.len() <= 2 {
        usage();
        bail!("Missing chemistry");
    }

    let chemistry = &args[2];
    let plan_args = parse_plan_args(&args[3..]).inspect_err(|_| usage())?;
    let config = PlannerConfig {
        output_mode: if plan_args.triplicate {
            OutputMode::Triplicate
        } else {
            OutputMode::Single
        },
        ..PlannerConfig::default()
    };

    let plan = compile_plan(chemistry, &plan_args, &config)?;
    std::fs::create_dir_all(&plan_args.out)
        .with_context(|| format!("Could not create '{}'", plan_args.out.display()))?;
    let paths = report::save(&plan, &config, &plan_args.out)?;

    println!(
        "Planned {} constructs, {} reactions, {} reagent wells ({} chemistry)",
        plan.constructs.len(),
        plan.reactions.len(),
        plan.reagents.len(),
        plan.chemistry
    );
    for path in paths {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
