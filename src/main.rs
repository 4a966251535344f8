//! thumbcache - fetch media thumbnails from a device through the cache
#![allow(clippy::uninlined_format_args)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use thumbcache::{Config, HttpThumbnailSource, Owner, ThumbnailService, decode_thumbnail};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG=debug for verbose output)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match parse_args()? {
        Command::Fetch {
            uids,
            device,
            out,
            config,
        } => fetch_cli(&uids, device, out, config).await,
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            println!("thumbcache {}", thumbcache::VERSION);
            Ok(())
        }
    }
}

/// CLI commands
enum Command {
    Fetch {
        uids: Vec<String>,
        device: Option<String>,
        out: Option<PathBuf>,
        config: Option<PathBuf>,
    },
    Help,
    Version,
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    let Some(command) = args.get(1) else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),

        "fetch" => {
            let mut uids = Vec::new();
            let mut device = None;
            let mut out = None;
            let mut config = None;

            let mut rest = args[2..].iter();
            while let Some(arg) = rest.next() {
                match arg.as_str() {
                    "--device" | "-d" => {
                        device = Some(rest.next().context("Missing value for --device")?.clone());
                    }
                    "--out" | "-o" => {
                        out = Some(PathBuf::from(rest.next().context("Missing value for --out")?));
                    }
                    "--config" | "-c" => {
                        config = Some(PathBuf::from(
                            rest.next().context("Missing value for --config")?,
                        ));
                    }
                    uid => uids.push(uid.to_string()),
                }
            }

            if uids.is_empty() {
                return Err(anyhow::anyhow!("Missing media or resource uid"));
            }

            Ok(Command::Fetch {
                uids,
                device,
                out,
                config,
            })
        }

        other => Err(anyhow::anyhow!(
            "Unknown command: {other}\nRun 'thumbcache --help' for usage"
        )),
    }
}

fn print_help() {
    let config_path = Config::default_path()
        .map_or_else(|_| "Unknown".to_string(), |p| p.display().to_string());

    println!(
        r#"thumbcache - fetch media thumbnails from a device

USAGE:
    thumbcache fetch <uid>... [OPTIONS]

    Resource uids are written as <media uid>/<resource uid>.

OPTIONS:
    -d, --device <url>                 Device base URL
    -o, --out <dir>                    Output directory
    -c, --config <path>                Config file
    -h, --help                         Show this help message
    -v, --version                      Show version information

CONFIG:
    {}
"#,
        config_path
    );
}

async fn fetch_cli(
    uids: &[String],
    device: Option<String>,
    out: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    if let Some(device) = device {
        config.device_url = device;
    }
    if let Some(out) = out {
        config.output_dir = out;
    }

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    let source = Arc::new(HttpThumbnailSource::new(
        &config.device_url,
        config.request_timeout(),
    ));
    let service = ThumbnailService::spawn(&source, config.max_cache_size);

    // Queue everything first so duplicate uids share a download
    let requests: Vec<_> = uids
        .iter()
        .map(|uid| (uid, service.get(Owner::from_uid(uid))))
        .collect();

    let mut failures = 0;
    for (uid, request) in requests {
        let Some(thumbnail) = request.await else {
            println!("✗ {uid}: no thumbnail");
            failures += 1;
            continue;
        };

        let path = config
            .output_dir
            .join(thumbcache::paths::thumbnail_file_name(uid));
        std::fs::write(&path, &thumbnail.data)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        match decode_thumbnail(&thumbnail, config.max_thumbnail_dimension) {
            Ok(image) => println!(
                "✓ {uid}: {} bytes, {}x{} → {}",
                thumbnail.size(),
                image.width(),
                image.height(),
                path.display()
            ),
            Err(e) => {
                tracing::warn!("{e}");
                println!("✓ {uid}: {} bytes → {}", thumbnail.size(), path.display());
            }
        }
    }

    if let Some(stats) = service.stats().await {
        println!(
            "\nCache: {} thumbnails, {}/{} bytes",
            stats.images, stats.size, stats.max_size
        );
    }
    service.shutdown();

    if failures > 0 {
        return Err(anyhow::anyhow!("{failures} of {} thumbnails failed", uids.len()));
    }

    Ok(())
}
