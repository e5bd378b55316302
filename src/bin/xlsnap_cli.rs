//! CLI tool for xlsnap - renders a spreadsheet to a PNG snapshot
//!
//! Usage:
//!   xlsnap_cli <input.xlsx>                          # Render, print artifact path
//!   xlsnap_cli <input.ods> -p 100 -t five-by-five    # Identity for the cache key
//!   xlsnap_cli <input.xlsx> -o out.png               # Also copy the artifact
//!
//! Configuration comes from `XLSNAP_*` variables (a `.env` file is honored).

#![allow(clippy::exit)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;
use xlsnap::{Config, DocumentIdentity, DocumentSource, RenderPipeline};

const USAGE: &str = "Usage: xlsnap_cli <input.(xlsx|ods)> [-p parameter] [-t template] [-o output.png]";

struct Args {
    input: PathBuf,
    parameter: f64,
    template: Option<String>,
    output: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut iter = args.iter().skip(1);
    let input = iter.next().ok_or_else(|| USAGE.to_string())?;
    let mut parsed = Args {
        input: PathBuf::from(input),
        parameter: 0.0,
        template: None,
        output: None,
    };
    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .ok_or_else(|| format!("missing value for {flag}\n{USAGE}"))?;
        match flag.as_str() {
            "-p" => {
                parsed.parameter = value
                    .parse()
                    .map_err(|_| format!("parameter must be a number, got {value:?}"))?;
            }
            "-t" => parsed.template = Some(value.clone()),
            "-o" => parsed.output = Some(PathBuf::from(value)),
            other => return Err(format!("unknown option {other}\n{USAGE}")),
        }
    }
    Ok(parsed)
}

/// Template reference defaults to the input's file name.
fn template_for(args: &Args) -> String {
    args.template.clone().unwrap_or_else(|| {
        args.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    })
}

fn run(args: &Args) -> xlsnap::Result<PathBuf> {
    let config = Config::from_env()?;
    let pipeline = RenderPipeline::new(&config)?;
    pipeline.cache().cleanup();
    let identity = DocumentIdentity::new(args.parameter, template_for(args));
    let artifact = pipeline.render(&identity, &DocumentSource::new(&args.input))?;
    if let Some(output) = &args.output {
        copy_artifact(&artifact, output)?;
    }
    Ok(artifact)
}

fn copy_artifact(artifact: &Path, output: &Path) -> xlsnap::Result<()> {
    fs::copy(artifact, output)?;
    tracing::info!(path = %output.display(), "copied artifact");
    Ok(())
}

fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("xlsnap=info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let args = match parse_args(&args) {
        Ok(a) => a,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    match run(&args) {
        Ok(path) => println!("{}", path.display()),
        Err(e) => {
            eprintln!("Error rendering {}: {e}", args.input.display());
            std::process::exit(1);
        }
    }
}
