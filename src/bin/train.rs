//! Offline trainer.
//!
//! Reads a labeled JSONL dataset (or generates a synthetic one), trains the
//! ensemble, evaluates it on a held-out slice and writes the versioned
//! model artifact plus its checksum sidecar.
//!
//! Usage:
//!   train [--data events.jsonl] [--out model.json] [--seed N] [--fast]

use std::path::PathBuf;
use std::process::ExitCode;

use contextgate::dataset::{self, SyntheticConfig};
use contextgate::model::{EnsembleParams, ModelArtifact};
use contextgate::training::train_and_evaluate;

struct Args {
    data: Option<PathBuf>,
    out: PathBuf,
    seed: u64,
    fast: bool,
}

fn default_out() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("contextgate")
        .join("model.json")
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        data: None,
        out: default_out(),
        seed: 42,
        fast: false,
    };

    let mut argv = std::env::args().skip(1);
    while let Some(flag) = argv.next() {
        match flag.as_str() {
            "--data" => {
                let value = argv.next().ok_or("--data needs a path")?;
                args.data = Some(PathBuf::from(value));
            }
            "--out" => {
                let value = argv.next().ok_or("--out needs a path")?;
                args.out = PathBuf::from(value);
            }
            "--seed" => {
                let value = argv.next().ok_or("--seed needs a number")?;
                args.seed = value.parse().map_err(|_| format!("bad seed: {value}"))?;
            }
            "--fast" => args.fast = true,
            "--help" | "-h" => {
                return Err(
                    "usage: train [--data events.jsonl] [--out model.json] [--seed N] [--fast]"
                        .to_string(),
                );
            }
            other => return Err(format!("unknown flag: {other}")),
        }
    }
    Ok(args)
}

fn run(args: Args) -> contextgate::Result<()> {
    let events = match &args.data {
        Some(path) => dataset::read_jsonl(path)?,
        None => {
            log::info!("no --data given, generating a synthetic dataset");
            dataset::synthetic::generate(&SyntheticConfig {
                users: 20,
                events_per_user: 60,
                anomaly_rate: 0.12,
                seed: args.seed,
            })
        }
    };

    let params = if args.fast {
        EnsembleParams::fast()
    } else {
        EnsembleParams::default()
    };

    let (model, report) = train_and_evaluate(events, &params, args.seed)?;
    log::info!(
        "evaluation: auc={:.3} accuracy={:.3} f1={:.3} threshold={:.2}",
        report.roc_auc,
        report.accuracy,
        report.best_f1,
        report.trained_threshold
    );

    ModelArtifact::new(model).save(&args.out)?;
    println!("model artifact written to {}", args.out.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("training failed: {err}");
            eprintln!("training failed: {err}");
            ExitCode::FAILURE
        }
    }
}
