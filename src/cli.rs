use crate::assets::DirAssets;
use crate::config::{load_overrides_file, ParserConfig, PropNamingStrategy, TagFilter};
use crate::golist::GoListCommand;
use crate::scanner::OsFs;
use crate::serializer::{write_to_file, OutputType};
use crate::swagger_builder::SwaggerBuilder;
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULT_OVERRIDES_FILE: &str = ".swaggo";

/// Generate a Swagger 2.0 document from annotated Go sources
#[derive(Parser, Debug)]
#[command(name = "swagger-from-source")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Directories to parse, comma separated; the first one holds the general info file
    #[arg(short = 'd', long = "dir", value_name = "DIRS", default_value = "./")]
    pub dirs: String,

    /// Go file with the general API annotations, relative to the first directory
    #[arg(short = 'g', long = "generalInfo", value_name = "FILE", default_value = "main.go")]
    pub general_info: PathBuf,

    /// Output directory for the generated documents
    #[arg(short = 'o', long = "output", value_name = "DIR", default_value = "./docs")]
    pub output: PathBuf,

    /// Output types to generate, comma separated (json, yaml)
    #[arg(long = "outputTypes", value_name = "TYPES", default_value = "json,yaml")]
    pub output_types: String,

    /// Property naming strategy: snakecase, camelcase or pascalcase
    #[arg(short = 'p', long = "propertyStrategy", default_value = "camelcase")]
    pub property_strategy: String,

    /// Fail on warnings such as duplicate routes
    #[arg(long = "strict")]
    pub strict: bool,

    /// Mark every struct field as required unless it is tagged omitempty
    #[arg(long = "requiredByDefault")]
    pub required_by_default: bool,

    /// Parse Go files of dependency packages
    #[arg(long = "parseDependency")]
    pub parse_dependency: bool,

    /// Parse Go files in the vendor folder
    #[arg(long = "parseVendor")]
    pub parse_vendor: bool,

    /// Parse Go files in internal packages
    #[arg(long = "parseInternal")]
    pub parse_internal: bool,

    /// Directories to exclude when scanning, comma separated
    #[arg(long = "exclude", value_name = "DIRS", default_value = "")]
    pub exclude: String,

    /// Directory of markdown files referenced by description.markdown
    #[arg(long = "markdownFiles", value_name = "DIR")]
    pub markdown_files: Option<PathBuf>,

    /// Directory of code sample files referenced by x-codeSamples
    #[arg(long = "codeExampleFiles", value_name = "DIR")]
    pub code_example_files: Option<PathBuf>,

    /// Default collection format of query array parameters
    #[arg(long = "collectionFormat", default_value = "csv")]
    pub collection_format: String,

    /// File with type overrides
    #[arg(long = "overridesFile", value_name = "FILE", default_value = DEFAULT_OVERRIDES_FILE)]
    pub overrides_file: PathBuf,

    /// Only include operations with these tags, comma separated; prefix with ! to exclude
    #[arg(short = 't', long = "tags", default_value = "")]
    pub tags: String,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl CliArgs {
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        split_list(&self.dirs).map(PathBuf::from).collect()
    }

    pub fn excludes(&self) -> Vec<PathBuf> {
        split_list(&self.exclude).map(PathBuf::from).collect()
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    let dirs = args.search_dirs();
    if dirs.is_empty() {
        bail!("At least one search directory is required");
    }
    for dir in &dirs {
        if !dir.is_dir() {
            bail!("Search directory does not exist: {}", dir.display());
        }
    }
    if PropNamingStrategy::parse(&args.property_strategy).is_none() {
        bail!(
            "Unsupported property strategy: {} (expected snakecase, camelcase or pascalcase)",
            args.property_strategy
        );
    }
    if !matches!(
        args.collection_format.as_str(),
        "csv" | "ssv" | "tsv" | "pipes" | "multi"
    ) {
        bail!("Unsupported collection format: {}", args.collection_format);
    }
    OutputType::parse_list(&args.output_types)?;

    info!("Search directories: {:?}", dirs);
    info!("General info: {}", args.general_info.display());
    info!("Output directory: {}", args.output.display());

    Ok(args)
}

/// Builds the parser configuration the arguments describe.
pub fn build_config(args: &CliArgs) -> Result<ParserConfig> {
    let naming_strategy = PropNamingStrategy::parse(&args.property_strategy)
        .with_context(|| format!("Unsupported property strategy: {}", args.property_strategy))?;
    let mut config = ParserConfig::default()
        .with_naming_strategy(naming_strategy)
        .with_strict(args.strict)
        .with_required_by_default(args.required_by_default)
        .with_parse_dependency(args.parse_dependency)
        .with_tags(TagFilter::parse(&args.tags));
    config.parse_vendor = args.parse_vendor;
    config.parse_internal = args.parse_internal;
    config.excludes = args.excludes();
    config.markdown_dir = args.markdown_files.clone();
    config.code_examples_dir = args.code_example_files.clone();
    config.collection_format_in_query = args.collection_format.clone();
    config.goroot = std::env::var_os("GOROOT").map(PathBuf::from);

    if let Some(overrides) = read_overrides(&args.overrides_file)? {
        info!("Using overrides from {}", args.overrides_file.display());
        config = config.with_overrides(overrides);
    }
    Ok(config)
}

/// The default overrides file is optional; an explicitly named one is not.
fn read_overrides(path: &Path) -> Result<Option<BTreeMap<String, String>>> {
    if path == Path::new(DEFAULT_OVERRIDES_FILE) && !path.exists() {
        return Ok(None);
    }
    load_overrides_file(path).map(Some)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting Swagger document generation...");
    let config = build_config(&args)?;
    let output_types = OutputType::parse_list(&args.output_types)?;

    let fs = OsFs;
    let assets = DirAssets::new(config.markdown_dir.clone(), config.code_examples_dir.clone());
    let lister = GoListCommand::new(config.dependency_timeout);
    let search_dirs = args.search_dirs();

    let swagger = SwaggerBuilder::new(config, &fs, &assets)
        .with_dependency_lister(&lister)
        .build(&search_dirs, &args.general_info)
        .context("Failed to generate the Swagger document")?;

    for output_type in output_types {
        let content = output_type.serialize(&swagger)?;
        let path = args.output.join(output_type.file_name());
        write_to_file(&content, &path)?;
        info!("Created {}", path.display());
    }
    Ok(())
}
