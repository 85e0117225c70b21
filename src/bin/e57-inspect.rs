//! E57 Inspector
//!
//! Opens an E57 file read-only, validates it and prints its header,
//! namespaces and element tree.

use anyhow::{Context, Result};
use clap::Parser;
use e57_container::{Dump, ImageFile, ImageFileConfig, OpenMode, ReadChecksumPolicy};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "e57-inspect")]
#[command(about = "Validate and inspect ASTM E57 files")]
struct Args {
    /// Path to the E57 file
    file: PathBuf,

    /// Print the header and summary as JSON
    #[arg(long)]
    json: bool,

    /// Dump the full container state and element tree
    #[arg(long)]
    tree: bool,

    /// Percentage of pages whose checksum is verified (0-100)
    #[arg(long)]
    checksum_policy: Option<i64>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ImageFileConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ImageFileConfig::default(),
    };
    if let Some(policy) = args.checksum_policy {
        config = config.with_checksum_policy(ReadChecksumPolicy::new(policy));
    }

    info!("Inspecting {}", args.file.display());
    let imf = ImageFile::open(&args.file, OpenMode::Reader, config)
        .with_context(|| format!("opening {}", args.file.display()))?;

    let header = imf
        .file_header()
        .context("reader opened without a decoded header")?;
    let root = imf.root()?;

    let mut namespaces = Vec::new();
    for index in 0..imf.extensions_count()? {
        namespaces.push((imf.extensions_prefix(index)?, imf.extensions_uri(index)?));
    }

    if args.json {
        let summary = serde_json::json!({
            "file": imf.file_name(),
            "header": header,
            "namespaces": namespaces
                .iter()
                .map(|(prefix, uri)| serde_json::json!({ "prefix": prefix, "uri": uri }))
                .collect::<Vec<_>>(),
            "root_children": root.child_names(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if args.tree {
        print!("{}", imf.dump_string());
    } else {
        println!("{}", imf.file_name());
        print!("{}", header.dump_string());
        for (prefix, uri) in &namespaces {
            println!("xmlns:{}=\"{}\"", prefix, uri);
        }
        println!("root elements: {}", root.child_names().join(", "));
    }

    imf.close()?;
    Ok(())
}
