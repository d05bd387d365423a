use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, bail};
use semdist::ontology::ingest;
use semdist::{DistanceEngine, DistanceMatrix, IndexBuilder, OntologySnapshot, SemDistConfig};
use strum::{EnumString, IntoStaticStr};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Clone, Copy, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
enum Command {
    Build,
    Distance,
    Sets,
    Dispersion,
    CommonAncestor,
    MostSpecific,
    Matrix,
    Stats,
}

#[derive(Default)]
struct Args {
    config: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    matrix: Option<PathBuf>,
    parents: Option<PathBuf>,
    usage: Option<PathBuf>,
    catalog: Option<PathBuf>,
    out: Option<PathBuf>,
    first: Vec<String>,
    second: Vec<String>,
    force: bool,
    terms: Vec<String>,
}

fn split_terms(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_args(raw: &[String]) -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut i = 0;
    while i < raw.len() {
        let flag = raw[i].as_str();
        let mut value = || -> anyhow::Result<String> {
            i += 1;
            raw.get(i)
                .cloned()
                .with_context(|| format!("missing value for {}", flag))
        };
        match flag {
            "--config" | "-c" => args.config = Some(PathBuf::from(value()?)),
            "--snapshot" | "-s" => args.snapshot = Some(PathBuf::from(value()?)),
            "--matrix" | "-m" => args.matrix = Some(PathBuf::from(value()?)),
            "--parents" => args.parents = Some(PathBuf::from(value()?)),
            "--usage" => args.usage = Some(PathBuf::from(value()?)),
            "--catalog" => args.catalog = Some(PathBuf::from(value()?)),
            "--out" | "-o" => args.out = Some(PathBuf::from(value()?)),
            "--first" => args.first = split_terms(&value()?),
            "--second" => args.second = split_terms(&value()?),
            "--force" | "-f" => args.force = true,
            other if other.starts_with('-') => bail!("unknown option '{}'", other),
            term => args.terms.push(term.to_string()),
        }
        i += 1;
    }
    Ok(args)
}

fn print_help() {
    println!("semdist - semantic distance between ontology terms");
    println!();
    println!("USAGE:");
    println!("    semdist <COMMAND> [OPTIONS] [TERMS...]");
    println!();
    println!("COMMANDS:");
    println!("    build            --parents FILE --usage FILE [--catalog FILE] --out FILE");
    println!("    distance         TERM TERM");
    println!("    sets             --first T1,T2 --second T3,T4 [--force]");
    println!("    dispersion       TERM TERM... [--force]");
    println!("    common-ancestor  TERM...");
    println!("    most-specific    TERM...");
    println!("    matrix           --out FILE [TERM...]");
    println!("    stats");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config FILE      Configuration file (SEMDIST_* variables override it)");
    println!("    -s, --snapshot FILE    Precomputed snapshot");
    println!("    -m, --matrix FILE      Precomputed distance matrix");
    println!("    -f, --force            Skip pairs that cannot be compared");
}

fn build(args: &Args) -> anyhow::Result<()> {
    let parents_path = args.parents.as_ref().context("--parents is required")?;
    let usage_path = args.usage.as_ref().context("--usage is required")?;
    let out = args.out.as_ref().context("--out is required")?;

    let parents = ingest::load_parents(parents_path)?;
    let usage = ingest::load_usage(usage_path)?;
    let mut builder = IndexBuilder::new(parents, usage)?;

    match &args.catalog {
        Some(path) => {
            let catalog = ingest::load_catalog(path)?;
            for category in catalog.categories() {
                let terms = catalog.terms_in(category);
                info!("Category '{}': {} terms", category, terms.len());
                builder.find_ancestors(Some(&terms))?;
                builder.calculate_probabilities(Some(&terms))?;
            }
        }
        None => {
            builder.find_ancestors(None)?;
            builder.calculate_probabilities(None)?;
        }
    }

    for root in builder.roots() {
        info!("Root '{}'", root);
    }
    let snapshot = builder.into_snapshot();
    snapshot.save(out)?;

    let stats = snapshot.stats();
    println!(
        "{} terms, {} with information content, roots: {}",
        stats.total_terms,
        stats.informative_terms,
        stats.roots.join(", ")
    );
    Ok(())
}

/// The stored matrix to answer queries from. `matrix` recomputes from the
/// snapshot, so it never reads one.
fn matrix_source<'a>(
    command: Command,
    args: &'a Args,
    config: &'a SemDistConfig,
) -> Option<&'a PathBuf> {
    match command {
        Command::Build | Command::Matrix => None,
        _ => args.matrix.as_ref().or(config.matrix_path.as_ref()),
    }
}

fn open_engine(
    command: Command,
    args: &Args,
    config: &SemDistConfig,
) -> anyhow::Result<DistanceEngine> {
    let path = args
        .snapshot
        .as_ref()
        .or(config.snapshot_path.as_ref())
        .context("no snapshot given (use --snapshot or SEMDIST_SNAPSHOT_PATH)")?;
    let snapshot = OntologySnapshot::load(path)
        .with_context(|| format!("failed to load snapshot {}", path.display()))?;

    let mut engine =
        DistanceEngine::new(Arc::new(snapshot))?.with_pair_cache(config.pair_cache_size);

    if let Some(path) = matrix_source(command, args, config) {
        engine = engine.with_matrix(Arc::new(DistanceMatrix::load(path)?));
    }

    Ok(engine)
}

fn run(command: Command, args: &Args, config: &SemDistConfig) -> anyhow::Result<()> {
    let engine = match command {
        Command::Build => return build(args),
        _ => open_engine(command, args, config)?,
    };
    let force = args.force || config.force;

    match command {
        Command::Build => {}
        Command::Distance => {
            let [a, b] = args.terms.as_slice() else {
                bail!("distance expects exactly two terms");
            };
            println!("{}", engine.distance_between(a, b)?);
        }
        Command::Sets => {
            println!("{}", engine.distance_between_sets(&args.first, &args.second, force)?);
        }
        Command::Dispersion => {
            println!("{}", engine.dispersion(&args.terms, force)?);
        }
        Command::CommonAncestor => match engine.best_common_ancestor(&args.terms)? {
            Some(term) => println!("{}", term),
            None => println!("no common ancestor with information content"),
        },
        Command::MostSpecific => {
            for term in engine.exclude_ancestors(&args.terms) {
                println!("{}", term);
            }
        }
        Command::Matrix => {
            let out = args.out.as_ref().context("--out is required")?;
            let terms: Vec<String> = if args.terms.is_empty() {
                engine.snapshot().probabilities.keys().cloned().collect()
            } else {
                engine.exclude_without_information_content(&args.terms)
            };
            let matrix = DistanceMatrix::precompute(&engine, &terms)?;
            matrix.save(out)?;
            println!("{} distances written to {}", matrix.len(), out.display());
        }
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&engine.snapshot().stats())?);
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let raw: Vec<String> = std::env::args().skip(1).collect();

    let Some(first) = raw.first() else {
        print_help();
        return Ok(());
    };
    if first == "--help" || first == "-h" {
        print_help();
        return Ok(());
    }

    let command = Command::from_str(first)
        .with_context(|| format!("unknown command '{}' (see --help)", first))?;
    let args = parse_args(&raw[1..])?;
    let config = SemDistConfig::load(args.config.as_deref())?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(config.log_filter.parse()?))
        .init();

    let name: &'static str = command.into();
    info!("Running '{}'", name);

    run(command, &args, &config)
}
