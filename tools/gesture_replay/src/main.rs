mod replay;
#[cfg(test)]
mod replay_tests;
mod trace;

use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use probtouch::config::{load_scene, load_session_config, SessionConfig};
use probtouch::Session;

use replay::Replayer;
use trace::{parse_expected, parse_trace_file};

#[derive(Debug, Parser)]
#[command(name = "gesture_replay")]
#[command(about = "Replays a recorded touch trace through a probtouch scene")]
struct Cli {
    /// CSV trace with `touch_trace,ms,kind,pointer,x,y[,pressure,minor,major,orientation]` rows.
    trace: PathBuf,
    #[arg(long)]
    scene: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    /// File with one `kind:interactor` decision per line.
    #[arg(long)]
    expect: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .init();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_session_config(path)?,
        None => SessionConfig::default(),
    };
    let scene = load_scene(&cli.scene)?;
    let session = Session::from_scene(&config, &scene).context("failed to build scene")?;
    let rows = parse_trace_file(&cli.trace)?;
    log::info!(
        "replay_start trace={} rows={} interactors={}",
        cli.trace.display(),
        rows.len(),
        session.interactors().len()
    );

    let mut replayer = Replayer::new(session, scene.surface.into());
    for row in rows {
        replayer.feed(row)?;
    }

    println!("decision,ms,kind,interactor");
    for decision in replayer.decisions() {
        println!("{}", decision.csv());
    }

    if let Some(expect_path) = cli.expect {
        let raw = fs::read_to_string(&expect_path)
            .with_context(|| format!("failed to open {}", expect_path.display()))?;
        let expected = parse_expected(&raw)
            .with_context(|| format!("invalid expectations {}", expect_path.display()))?;
        let actual: Vec<String> = replayer.decisions().iter().map(|d| d.key()).collect();
        if actual != expected {
            eprintln!("expected decisions: {}", expected.join(","));
            eprintln!("actual decisions:   {}", actual.join(","));
            bail!("decision sequence mismatch");
        }
    }
    Ok(())
}
