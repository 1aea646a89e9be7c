use crate::manifest::Manifest;
use crate::openapi_builder::{generate_document, OpenApiBuilder, DEFAULT_API_VERSION};
use crate::parser::SourceFile;
use crate::scanner::FileScanner;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use crate::type_loader::TypeLoader;
use crate::type_registry::TypeRegistry;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Generate an OpenAPI document from endpoint descriptors and Rust type definitions
#[derive(Parser, Debug)]
#[command(name = "openapi-from-metadata")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Endpoint manifest (YAML, or JSON with a .json extension)
    #[arg(short = 'e', long = "endpoints", value_name = "FILE")]
    pub endpoints: PathBuf,

    /// Rust project whose structs and enums describe the endpoint types
    #[arg(short = 's', long = "source", value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Document title; defaults to the manifest title, then the program name
    #[arg(long)]
    pub title: Option<String>,

    /// Document version; defaults to the manifest version, then 1.0
    #[arg(long = "api-version")]
    pub api_version: Option<String>,

    /// Server address, may be repeated; replaces the manifest's servers
    #[arg(long = "server", value_name = "URL")]
    pub servers: Vec<String>,

    /// Fail when two endpoints share a route and method
    #[arg(long = "deny-duplicates")]
    pub deny_duplicates: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.endpoints.is_file() {
        anyhow::bail!("Endpoint manifest does not exist: {}", args.endpoints.display());
    }
    if let Some(source) = &args.source {
        if !source.is_dir() {
            anyhow::bail!("Source path is not a directory: {}", source.display());
        }
    }

    info!("Endpoint manifest: {}", args.endpoints.display());
    match &args.source {
        Some(source) => info!("Type sources: {}", source.display()),
        None => info!("Type sources: manifest only"),
    }
    info!("Output format: {:?}", args.output_format);
    match &args.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }

    Ok(args)
}

/// Load types from a source tree
fn load_sources(source: &Path) -> Result<(TypeRegistry, usize)> {
    info!("Scanning {} for type definitions...", source.display());
    let scan_result = FileScanner::new(source).scan()?;
    if scan_result.rust_files.is_empty() {
        warn!("No Rust files found in {}", source.display());
    }

    let files = SourceFile::parse_files(&scan_result.rust_files);
    info!(
        "Parsed {} of {} Rust files",
        files.len(),
        scan_result.rust_files.len()
    );
    Ok((TypeLoader::load(&files), scan_result.rust_files.len()))
}

/// Build the document builder from flags, falling back to the manifest
fn document_builder(args: &CliArgs, manifest: &Manifest) -> OpenApiBuilder {
    let mut builder = OpenApiBuilder::new();
    let title = args
        .title
        .clone()
        .or_else(|| manifest.title.clone())
        .unwrap_or_else(|| builder.info().title.clone());
    let version = args
        .api_version
        .clone()
        .or_else(|| manifest.version.clone())
        .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
    let servers = if args.servers.is_empty() {
        manifest.servers.clone()
    } else {
        args.servers.clone()
    };

    builder = builder
        .with_info(title, version, manifest.description.clone())
        .with_servers(servers)
        .deny_duplicate_routes(args.deny_duplicates);
    builder
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting OpenAPI document generation...");

    let manifest = Manifest::load(&args.endpoints)?;
    if manifest.endpoints.is_empty() {
        warn!("No endpoints declared in {}", args.endpoints.display());
    }

    let (mut registry, files_scanned) = match &args.source {
        Some(source) => load_sources(source)?,
        None => (TypeRegistry::new(), 0),
    };
    // Manifest shapes override what the sources say
    manifest.register_types(&mut registry)?;

    info!("Building OpenAPI document...");
    let builder = document_builder(&args, &manifest);
    let document = generate_document(&manifest, &registry, &builder)
        .context("Failed to generate OpenAPI document")?;

    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };

    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
    } else {
        println!("{}", content);
    }

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Files scanned: {}", files_scanned);
    info!("  - Endpoints: {}", manifest.endpoints.len());
    info!("  - Paths: {}", document.paths.len());
    info!("  - Component schemas: {}", document.components.schemas.len());
    info!("  - Tags: {}", document.tags.len());

    Ok(())
}
