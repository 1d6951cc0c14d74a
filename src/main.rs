use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use photosync::config::Config;
use photosync::coordinator::{Coordinator, RunOutcome, Session};
use photosync::db::Database;
use photosync::lock::{self, RunLock};
use photosync::logging;
use photosync::remote::{HttpThumbnailSink, S3Store};

#[derive(Default)]
struct Args {
    config_path: Option<PathBuf>,
    force: bool,
    status: bool,
    wait: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("photosync {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--force" | "-f" => parsed.force = true,
            "--status" | "-s" => parsed.status = true,
            "--wait" | "-w" => parsed.wait = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"photosync - import a photo tree into the catalog and object storage

USAGE:
    photosync [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --force, -f         Treat every directory as changed
    --status, -s        Report whether an import is running and exit
    --wait, -w          Wait until no import is running and exit
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PHOTOSYNC_CONFIG    Path to config file (overrides default location)
    PHOTOSYNC_LOG       Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/photosync/config.toml
A LOGLEVEL file in the working directory also sets the log level.

See also: photosync-gallery --help"#
    );
}

fn main() -> Result<()> {
    let args = parse_args();

    let _ = logging::init(Some(Config::config_dir().join("logs")));

    let mut config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    if args.force {
        config.force_resync = true;
    }

    if args.status {
        let busy = lock::is_processing(&config.lock_path)?;
        println!("{}", if busy { "processing" } else { "idle" });
        return Ok(());
    }

    if args.wait {
        let held = RunLock::acquire(&config.lock_path)?;
        info!("No import running ({})", held.path().display());
        return Ok(());
    }

    let coordinator = Coordinator::new(config);
    let outcome = coordinator.run(|| connect(coordinator.config()))?;

    match outcome {
        RunOutcome::Locked => {}
        RunOutcome::Unchanged => info!("Nothing to import"),
        RunOutcome::Synced(report) => {
            info!(
                "Imported {} photos from {} directories: {} new, {} updated, {} unchanged; {} uploaded, {} thumbnails",
                report.photos,
                report.directories,
                report.inserted,
                report.updated,
                report.unchanged,
                report.uploaded,
                report.thumbnails,
            );
            let stats = Database::open(&coordinator.config().database)?.stats()?;
            info!(
                "Catalog holds {} images in {} albums ({} memberships)",
                stats.images, stats.albums, stats.memberships
            );
        }
    }

    Ok(())
}

fn connect(config: &Config) -> Result<Session> {
    Ok(Session {
        db: Database::open(&config.database)?,
        store: Box::new(S3Store::connect(&config.storage)?),
        thumbs: Box::new(HttpThumbnailSink::new(&config.transfer.thumbnail_url)?),
    })
}
