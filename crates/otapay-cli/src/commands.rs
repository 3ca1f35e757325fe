use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use otapay_builder::{
    discover_images, parse_partition_list, PartitionSummary, PayloadBuilder, PayloadConfig,
    PayloadReader, PayloadSummary,
};
use otapay_manifest::Sha256Digest;
use serde::Serialize;
use tracing::info;

use crate::cli::*;

const DEFAULT_OUTPUT: &str = "payload.bin";

#[derive(Serialize)]
struct BuildReport<'a> {
    output: &'a Path,
    #[serde(flatten)]
    summary: &'a PayloadSummary,
}

#[derive(Serialize)]
struct InspectReport {
    version: u64,
    manifest_size: u64,
    metadata_signature_size: u32,
    minor_version: u32,
    blob_region_size: u64,
    partitions: Vec<PartitionSummary>,
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Build(args) => cmd_build(args, &format),
        Command::Inspect(args) => cmd_inspect(args, &format),
    }
}

/// Register partitions from whichever source the arguments name.
fn prepare_builder(args: &BuildArgs) -> anyhow::Result<PayloadBuilder> {
    let config = match &args.config {
        Some(path) => PayloadConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PayloadConfig::default(),
    };
    let output = args
        .output
        .clone()
        .or_else(|| config.output.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let mut builder = PayloadBuilder::new(&output);

    if let Some(list) = &args.partitions {
        for spec in parse_partition_list(list)? {
            let name = spec.name.clone();
            builder
                .add_spec(spec)
                .with_context(|| format!("adding partition {name}"))?;
        }
    } else if let Some(dir) = &args.input {
        let extension = args.extension.as_deref().unwrap_or(&config.image_extension);
        let specs = discover_images(dir, extension)?;
        info!(count = specs.len(), dir = %dir.display(), "found partition images");
        for spec in specs {
            builder.add_spec(spec)?;
        }
    } else if args.config.is_some() {
        config.register(&mut builder)?;
    } else {
        anyhow::bail!("must specify either --input directory, --partitions list, or --config file");
    }

    Ok(builder)
}

fn cmd_build(args: BuildArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let builder = prepare_builder(&args)?;
    let output = builder.output().to_path_buf();
    let summary = builder
        .build()
        .with_context(|| format!("building payload {}", output.display()))?;

    match format {
        OutputFormat::Json => {
            let report = BuildReport { output: &output, summary: &summary };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("{} Payload created: {}", "✓".green().bold(), output.display().to_string().bold());
            print_partitions(&summary.partitions);
            println!(
                "  Manifest: {} bytes, blobs: {} bytes, total: {} bytes",
                summary.manifest_size, summary.blob_region_size, summary.total_size
            );
        }
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let reader = PayloadReader::open(&args.payload)
        .with_context(|| format!("reading payload {}", args.payload.display()))?;
    let report = inspect_report(&reader);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("Payload {}", args.payload.display().to_string().bold());
            println!("  Version: {}  Minor: {}", report.version, report.minor_version);
            println!(
                "  Manifest: {} bytes, metadata signature: {} bytes",
                report.manifest_size, report.metadata_signature_size
            );
            println!("  Blob region: {} bytes", report.blob_region_size);
            print_partitions(&report.partitions);
        }
    }
    Ok(())
}

fn inspect_report(reader: &PayloadReader) -> InspectReport {
    let manifest = reader.manifest();
    let partitions = manifest
        .partitions
        .iter()
        .map(|p| {
            let info = p.new_partition_info.as_ref();
            let first = p.operations.first();
            PartitionSummary {
                name: p.partition_name.clone(),
                size: info.and_then(|i| i.size).unwrap_or(0),
                offset: first.and_then(|op| op.data_offset).unwrap_or(0),
                length: p.operations.iter().map(|op| op.data_length.unwrap_or(0)).sum(),
                hash: info
                    .and_then(|i| i.hash.as_deref())
                    .and_then(|h| Sha256Digest::from_slice(h).ok())
                    .map(|d| d.to_hex())
                    .unwrap_or_default(),
            }
        })
        .collect();

    InspectReport {
        version: reader.header().version,
        manifest_size: reader.header().manifest_size,
        metadata_signature_size: reader.header().metadata_signature_size,
        minor_version: manifest.minor_version.unwrap_or(0),
        blob_region_size: reader.blob_region().len() as u64,
        partitions,
    }
}

fn print_partitions(partitions: &[PartitionSummary]) {
    for p in partitions {
        let short = p.hash.get(..8).unwrap_or(&p.hash);
        println!(
            "  {:<16} size {:>12}  offset {:>12}  length {:>12}  {}",
            p.name.yellow(),
            p.size,
            p.offset,
            p.length,
            short.dimmed()
        );
    }
}
