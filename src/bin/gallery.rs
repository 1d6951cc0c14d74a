//! Upload a local gallery folder to object storage.
//!
//! Every non-hidden file under the gallery directory is published to
//! `<container>/<relative path>` unless an object with that key already
//! exists. Nothing is resized, catalogued or tracked between runs.
//!
//! ## Usage
//!
//! ```bash
//! photosync-gallery                      # gallery.dir from the config file
//! photosync-gallery --dir ~/site/gallery # explicit folder
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use photosync::config::Config;
use photosync::gallery::upload_gallery;
use photosync::logging;
use photosync::remote::S3Store;

#[derive(Default)]
struct GalleryArgs {
    config_path: Option<PathBuf>,
    dir: Option<PathBuf>,
    container: Option<String>,
}

fn main() -> Result<()> {
    let args = parse_args();

    let _ = logging::init(Some(Config::config_dir().join("logs")));

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let dir = args.dir.unwrap_or_else(|| config.gallery.dir.clone());
    let container = args
        .container
        .unwrap_or_else(|| config.gallery.container.clone());

    if !dir.is_dir() {
        anyhow::bail!("Gallery folder {} does not exist", dir.display());
    }

    let store = S3Store::connect(&config.storage).context("Failed to connect to object storage")?;
    info!("Uploading {} to {}", dir.display(), container);
    let report = upload_gallery(&dir, &container, &store)?;
    info!("{} uploaded, {} already present", report.uploaded, report.skipped);

    Ok(())
}

fn parse_args() -> GalleryArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = GalleryArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--dir" | "-d" => {
                if i + 1 < args.len() {
                    parsed.dir = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--container" => {
                if i + 1 < args.len() {
                    parsed.container = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--version" | "-V" => {
                println!("photosync-gallery {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
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
        r#"photosync-gallery - upload a gallery folder, skipping existing objects

USAGE:
    photosync-gallery [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --dir, -d PATH      Gallery folder (default: gallery.dir from config)
    --container NAME    Object prefix (default: gallery.container from config)
    --version, -V       Show version
    --help, -h          Show this help message
"#
    );
}
