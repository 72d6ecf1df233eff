//! argsmith: generate argparse front-ends from documented Python classes.
//!
//! - `parse-code`: extract the IR from Python files
//! - `write-code`: synthesize the CLI from a persisted IR
//! - `generate-argparser`: both in one pass

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use argsmith::config::WriterConfig;
use argsmith::docstring::Convention;
use argsmith::logging::{self, LogLevel};
use argsmith::pipeline::{ArgWriter, IrOutput, PRINT};

/// Extensions picked up when a directory is given as input
const SUPPORTED_EXTENSIONS: &[&str] = &["py"];

#[derive(Parser)]
#[command(
    name = "argsmith",
    version,
    about = "Generate argparse command-line interfaces from documented Python classes"
)]
struct Cli {
    /// Log verbosity (RUST_LOG overrides)
    #[arg(long, value_enum, ignore_case = true, default_value_t = LogLevel::Warn, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract the structure of Python classes into YAML or JSON
    ParseCode {
        /// Python files, directories or glob patterns
        #[arg(long = "input", num_args = 1.., required = true)]
        files: Vec<String>,

        /// "." prints to stdout; a .yaml, .yml or .json path writes a file
        #[arg(long, default_value = PRINT)]
        output: PathBuf,

        #[command(flatten)]
        docs: DocOptions,

        /// Overwrite an existing output file without asking
        #[arg(short, long)]
        force: bool,
    },

    /// Generate the CLI package from a YAML or JSON structure file
    WriteCode {
        /// Structure file written by parse-code
        #[arg(long = "input")]
        file: PathBuf,

        #[command(flatten)]
        write: WriteOptions,
    },

    /// Extract and generate in one pass
    GenerateArgparser {
        /// Python files, directories or glob patterns
        #[arg(long = "input", num_args = 1.., required = true)]
        files: Vec<String>,

        #[command(flatten)]
        docs: DocOptions,

        #[command(flatten)]
        write: WriteOptions,
    },
}

#[derive(Args)]
struct DocOptions {
    /// Docstring convention of the input files
    #[arg(long, value_enum, default_value_t = Convention::Google)]
    docstring_format: Convention,

    /// Fail on public methods with parameters but no docstring
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct WriteOptions {
    /// Directory the generated package is written to
    #[arg(long, default_value = PRINT)]
    output: PathBuf,

    /// Format generated files with black
    #[arg(short, long)]
    pretty: bool,

    /// Overwrite existing files without asking
    #[arg(short, long)]
    force: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level).map_err(|e| anyhow!("failed to initialise logging: {e}"))?;

    match cli.command {
        Command::ParseCode {
            files,
            output,
            docs,
            force,
        } => {
            let config = WriterConfig {
                force,
                convention: docs.docstring_format,
                strict_docs: docs.strict,
                ..WriterConfig::default()
            };
            let inputs = expand_globs(&files)?;
            ArgWriter::new(config)
                .parse_code(&inputs, &IrOutput::from_arg(Some(output.as_path())))
                .context("failed to extract structure")?;
        }
        Command::WriteCode { file, write } => {
            let config = WriterConfig {
                force: write.force,
                pretty: write.pretty,
                ..WriterConfig::default()
            };
            ArgWriter::new(config)
                .write_code(&file, &write.output)
                .with_context(|| format!("failed to generate code from {}", file.display()))?;
        }
        Command::GenerateArgparser { files, docs, write } => {
            let config = WriterConfig {
                force: write.force,
                pretty: write.pretty,
                convention: docs.docstring_format,
                strict_docs: docs.strict,
                ..WriterConfig::default()
            };
            let inputs = expand_globs(&files)?;
            ArgWriter::new(config)
                .generate_parser(&inputs, &write.output)
                .with_context(|| format!("failed to generate code into {}", write.output.display()))?;
        }
    }
    Ok(())
}

/// Expand files, directories and glob patterns, keeping the order patterns
/// were given in so module order follows the command line.
fn expand_globs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        let mut matched = if path.is_file() {
            vec![path.to_path_buf()]
        } else if path.is_dir() {
            // non-recursive scan for supported extensions
            fs::read_dir(path)
                .with_context(|| format!("failed to read directory: {}", path.display()))?
                .flatten()
                .map(|entry| entry.path())
                .filter(|p| p.is_file())
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
                })
                .collect()
        } else {
            glob::glob(pattern)
                .with_context(|| format!("invalid glob pattern: {}", pattern))?
                .filter_map(|r| r.ok())
                .filter(|p| p.is_file())
                .collect()
        };
        if matched.is_empty() {
            warn!("no files matched: {}", pattern);
        }
        matched.sort();
        for file in matched {
            if !files.contains(&file) {
                files.push(file);
            }
        }
    }
    if files.is_empty() {
        anyhow::bail!("no input files");
    }
    Ok(files)
}
