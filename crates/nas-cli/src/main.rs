use std::path::Path;
use std::process::ExitCode;

use nas_bdf::ModelSummary;
use nas_cli::{DecodeArgs, run_decode, run_xref, summarize};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn usage() {
    eprintln!("usage:");
    eprintln!("  nas-cli summary <model.json>");
    eprintln!("  nas-cli xref <model.json> [--options <opts.json>]");
    eprintln!(
        "  nas-cli decode <table.bin> --element-type N --num-wide W [--device-code D] \
         [--mag-phase] [--big-endian] [--dt X] [--sort2 EID] [--strain]"
    );
}

fn print_summary(summary: &ModelSummary) {
    println!("total_cards: {}", summary.total_cards);
    for (card, count) in &summary.card_counts {
        println!("  {card}: {count}");
    }
    println!("cross_referenced: {}", summary.cross_referenced);
    println!("spoints: {}", summary.spoints);
    println!("has_aero: {}", summary.has_aero);
    println!("has_optimization: {}", summary.has_optimization);
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{text}");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        usage();
        return ExitCode::from(2);
    };

    match (command.as_str(), &args[2..]) {
        ("summary", [path]) => match summarize(Path::new(path)) {
            Ok(summary) => {
                print_summary(&summary);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("load error: {err}");
                ExitCode::from(1)
            }
        },
        ("xref", [path, rest @ ..]) => {
            let options = match rest {
                [] => None,
                [flag, opts] if flag == "--options" => Some(Path::new(opts)),
                _ => {
                    usage();
                    return ExitCode::from(2);
                }
            };
            let report = match run_xref(Path::new(path), options) {
                Ok(report) => report,
                Err(err) => {
                    eprintln!("load error: {err}");
                    return ExitCode::from(1);
                }
            };
            if let Err(err) = print_json(&report) {
                eprintln!("output error: {err}");
                return ExitCode::from(1);
            }
            if let Some(fatal) = &report.fatal {
                eprintln!("xref error: {fatal}");
                return ExitCode::from(1);
            }
            ExitCode::SUCCESS
        }
        ("decode", rest) => {
            let args = match DecodeArgs::parse(rest) {
                Ok(args) => args,
                Err(err) => {
                    eprintln!("{err}");
                    usage();
                    return ExitCode::from(2);
                }
            };
            match run_decode(&args).and_then(|report| {
                print_json(&report)?;
                eprintln!("residual_bytes: {}", report.decoded.residual);
                Ok(())
            }) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("decode error: {err}");
                    ExitCode::from(1)
                }
            }
        }
        _ => {
            usage();
            ExitCode::from(2)
        }
    }
}
