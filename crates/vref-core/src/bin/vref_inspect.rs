//! vref-inspect - print the contents of a channel reference settings file
//!
//! ## Usage
//!
//! ```text
//! vref-inspect <settings.yaml> [--channels N]
//! ```
//!
//! Each stream's matrix is sized to `N` channels, or to the largest
//! channel/reference index the file mentions for that stream.

use std::path::PathBuf;

use vref_core::config::{default_config_path, ReferencingConfig};
use vref_core::settings::{load_settings, ReferenceSettings};
use vref_core::{ReferencingEngine, StreamInfo};

struct Args {
    path: PathBuf,
    channels: Option<usize>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut path = None;
    let mut channels = None;

    while let Some(arg) = args.next() {
        if arg == "--channels" {
            let value = args.next().ok_or("--channels needs a value")?;
            let n = value
                .parse::<usize>()
                .map_err(|_| format!("Invalid channel count: {}", value))?;
            channels = Some(n);
        } else if path.is_none() {
            path = Some(PathBuf::from(arg));
        } else {
            return Err(format!("Unexpected argument: {}", arg));
        }
    }

    let path = path.ok_or("Usage: vref-inspect <settings.yaml> [--channels N]")?;
    Ok(Args { path, channels })
}

/// Streams implied by a settings document
fn streams_for(settings: &ReferenceSettings, channels: Option<usize>) -> Vec<StreamInfo> {
    settings
        .streams
        .iter()
        .filter(|s| s.id != 0)
        .map(|s| {
            let largest = s
                .channels
                .iter()
                .flat_map(|c| std::iter::once(c.index).chain(c.references.iter().map(|r| r.index)))
                .max()
                .unwrap_or(0);
            StreamInfo::contiguous(s.id, 0, channels.unwrap_or(largest))
        })
        .collect()
}

fn run(args: &Args) -> Result<(), vref_core::ReferencingError> {
    let config = ReferencingConfig::load(&default_config_path());
    let settings = load_settings(&args.path)?;

    let mut engine = ReferencingEngine::new(&config)?;
    engine.on_streams_changed(&streams_for(&settings, args.channels))?;
    let restored = engine.restore(&settings);

    println!("Type:        {}", settings.kind);
    println!("Global gain: {}", engine.global_gain());
    println!("Streams:     {}", restored.len());

    for id in restored {
        let Some(matrix) = engine.matrix_for(id) else {
            continue;
        };
        println!();
        println!("Stream {} ({} channels)", id, matrix.channel_count());
        print!("{}", matrix);
    }
    Ok(())
}

fn main() {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&args) {
        eprintln!("Failed to inspect {:?}: {}", args.path, e);
        std::process::exit(1);
    }
}
