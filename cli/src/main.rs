//! pagemark CLI - convert extracted document fragments to Markdown.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use pagemark::{ConfigProfile, ConversionPipeline, ConversionResult, DocumentDump};

#[derive(Parser)]
#[command(name = "pagemark")]
#[command(version)]
#[command(about = "Convert extracted document fragments to Markdown", long_about = None)]
struct Cli {
    /// Input fragment dump (JSON), or a directory with --batch
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output Markdown file or directory
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a fragment dump to Markdown
    Convert {
        /// Input fragment dump (JSON), or a directory with --batch
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output Markdown file, or directory in batch mode
        #[arg(value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Keep image references and write the asset map next to the output
        #[arg(long)]
        extract_images: bool,

        /// Treat INPUT as a directory and convert every *.json inside
        #[arg(long)]
        batch: bool,

        /// Configuration file (JSON, merged onto defaults)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Named profile preset (default, github, minimal, documentation,
        /// publishing)
        #[arg(long, value_name = "NAME")]
        preset: Option<String>,
    },

    /// Show metadata and content statistics for a fragment dump
    Info {
        /// Input fragment dump (JSON)
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let outcome = match cli.command {
        Some(Commands::Convert {
            input,
            output,
            extract_images,
            batch,
            config,
            preset,
        }) => cmd_convert(
            &input,
            output.as_deref(),
            extract_images,
            batch,
            config.as_deref(),
            preset.as_deref(),
            cli.quiet,
        ),
        Some(Commands::Info { input }) => cmd_info(&input),
        None => match cli.input {
            Some(input) => cmd_convert(
                &input,
                cli.output.as_deref(),
                false,
                false,
                None,
                None,
                cli.quiet,
            ),
            None => {
                println!("{}", "Usage: pagemark convert <INPUT> [OUTPUT]".yellow());
                println!("       pagemark --help for more information");
                Ok(())
            }
        },
    };

    if let Err(e) = outcome {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

/// Resolve the profile from --preset and/or --config. A config file is
/// merged onto the preset (or the defaults when no preset is given).
fn resolve_config(
    config_path: Option<&Path>,
    preset: Option<&str>,
) -> Result<ConfigProfile, Box<dyn std::error::Error>> {
    let base = match preset {
        Some(name) => ConfigProfile::preset(name)?,
        None => ConfigProfile::default(),
    };

    match config_path {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            let overrides: serde_json::Value = serde_json::from_str(&text)?;
            let mut value = serde_json::to_value(&base)?;
            merge_values(&mut value, overrides);
            let profile = ConfigProfile::from_json_value(value)?;
            Ok(profile)
        }
        None => Ok(base),
    }
}

fn merge_values(base: &mut serde_json::Value, overrides: serde_json::Value) {
    match (base, overrides) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(over_map)) => {
            for (key, over_value) in over_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge_values(slot, over_value),
                    None => {
                        base_map.insert(key, over_value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn cmd_convert(
    input: &Path,
    output: Option<&Path>,
    extract_images: bool,
    batch: bool,
    config_path: Option<&Path>,
    preset: Option<&str>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(config_path, preset)?;

    if batch {
        return cmd_convert_batch(input, output, extract_images, config, quiet);
    }

    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("md"));

    let result = convert_one(input, &output_path, extract_images, &config)?;

    if !result.success {
        let message = result
            .error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "conversion failed".to_string());
        return Err(message.into());
    }

    if !quiet {
        print_result(input, &output_path, &result);
    }
    Ok(())
}

fn cmd_convert_batch(
    input_dir: &Path,
    output_dir: Option<&Path>,
    extract_images: bool,
    config: ConfigProfile,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input_dir.is_dir() {
        return Err(format!("{} is not a directory", input_dir.display()).into());
    }

    let mut inputs: Vec<PathBuf> = fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|e| e == "json").unwrap_or(false))
        .collect();
    inputs.sort();

    if inputs.is_empty() {
        return Err(format!("no .json dumps in {}", input_dir.display()).into());
    }

    if let Some(dir) = output_dir {
        fs::create_dir_all(dir)?;
    }

    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(inputs.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("valid progress template")
                .progress_chars("#>-"),
        );
        bar
    };

    // Documents are independent; one bad dump never aborts the batch.
    let failures: Vec<(PathBuf, String)> = inputs
        .par_iter()
        .filter_map(|input| {
            let output = match output_dir {
                Some(dir) => dir.join(input.file_stem().unwrap_or_default()).with_extension("md"),
                None => input.with_extension("md"),
            };
            let outcome = convert_one(input, &output, extract_images, &config);
            bar.inc(1);
            match outcome {
                Ok(result) if result.success => None,
                Ok(result) => Some((
                    input.clone(),
                    result
                        .error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "conversion failed".to_string()),
                )),
                Err(e) => Some((input.clone(), e.to_string())),
            }
        })
        .collect();

    bar.finish_and_clear();

    let converted = inputs.len() - failures.len();
    if !quiet {
        println!(
            "{} {} of {} documents converted",
            "Done!".green().bold(),
            converted,
            inputs.len()
        );
    }
    for (path, message) in &failures {
        eprintln!("{} {}: {}", "Failed".red(), path.display(), message);
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!("{} document(s) failed", failures.len()).into())
    }
}

/// Convert a single dump file and write the Markdown (plus the asset map
/// when images are kept).
fn convert_one(
    input: &Path,
    output: &Path,
    extract_images: bool,
    config: &ConfigProfile,
) -> Result<ConversionResult, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(input)?;
    let mut dump = DocumentDump::from_json(&text)?;

    if !extract_images {
        for page in &mut dump.pages {
            page.images.clear();
        }
    }

    let pipeline = ConversionPipeline::new(config.clone())?;
    let result = pipeline.convert(&mut dump.into_source());
    log::debug!(
        "{}: success={} in {:.2?}",
        input.display(),
        result.success,
        result.stats.elapsed
    );

    if let Some(ref markdown) = result.output_text {
        if result.success {
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(output, markdown)?;

            if extract_images && !result.assets.is_empty() {
                let map_path = output.with_extension("assets.json");
                fs::write(&map_path, serde_json::to_string_pretty(&result.assets)?)?;
            }
        }
    }

    Ok(result)
}

fn print_result(input: &Path, output: &Path, result: &ConversionResult) {
    println!(
        "{} {} {} {}",
        "Converted".green().bold(),
        input.display(),
        "→".dimmed(),
        output.display()
    );

    let stats = &result.stats;
    println!(
        "  {} pages, {} headings, {} paragraphs, {} lists, {} tables, {} images ({:.2?})",
        stats.page_count,
        stats.heading_count,
        stats.paragraph_count,
        stats.list_count,
        stats.table_count,
        stats.image_count,
        stats.elapsed,
    );

    for warning in &stats.warnings {
        println!("  {} {}", "warning:".yellow(), warning);
    }
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(input)?;
    let dump = DocumentDump::from_json(&text)?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    if let Some(ref title) = dump.metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref author) = dump.metadata.author {
        println!("{}: {}", "Author".bold(), author);
    }
    if let Some(ref source) = dump.metadata.source_file {
        println!("{}: {}", "Source".bold(), source);
    }
    println!("{}: {}", "Pages".bold(), dump.pages.len());

    let fragments: usize = dump.pages.iter().map(|p| p.fragments.len()).sum();
    let images: usize = dump.pages.iter().map(|p| p.images.len()).sum();
    let words: usize = dump
        .pages
        .iter()
        .flat_map(|p| p.fragments.iter())
        .map(|f| f.text.split_whitespace().count())
        .sum();

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Fragments".bold(), fragments);
    println!("{}: {}", "Words".bold(), words);
    println!("{}: {}", "Images".bold(), images);

    Ok(())
}
