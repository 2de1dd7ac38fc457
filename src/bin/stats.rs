use clap::Parser;
use leurre::analysis::{export_csv, load_events, AttackReport};
use log::error;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "leurre-stats")]
#[command(version = "0.1.0")]
#[command(about = "Offline statistics and export over captured attack records")]
struct Args {
    /// Directory holding the attacks_*.json day files
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Also export every record as a flat CSV
    #[arg(long, action = clap::ArgAction::SetTrue)]
    export_csv: bool,

    /// CSV output path
    #[arg(long, default_value = "analysis/attacks_export.csv")]
    output: PathBuf,
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    let events = match load_events(&args.log_dir) {
        Ok(events) => events,
        Err(e) => {
            error!("Unable to read attack records from {:?}: {}", args.log_dir, e);
            std::process::exit(1);
        }
    };

    if events.is_empty() {
        println!(
            "No attack records found in {}. Run the honeypot first.",
            args.log_dir.display()
        );
        return;
    }

    let report = AttackReport::build(&events);
    println!("{}", report);

    if args.export_csv {
        match export_csv(&events, &args.output) {
            Ok(()) => println!("Exported {} record(s) to {}", events.len(), args.output.display()),
            Err(e) => {
                error!("CSV export to {:?} failed: {}", args.output, e);
                std::process::exit(1);
            }
        }
    }
}
