//! Reading and writing the IR, and guarded file creation.

use std::fs;
use std::io::{self, BufRead, IsTerminal};
use std::path::Path;

use dialoguer::Confirm;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::model::{ModuleCollection, Structure};

/// Textual IR formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrFormat {
    Json,
    Yaml,
}

impl IrFormat {
    /// Format for `path`. A path without an extension yields `Ok(None)`.
    pub fn from_path(path: &Path) -> Result<Option<Self>> {
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            return Ok(None);
        };
        match extension.to_ascii_lowercase().as_str() {
            "json" => Ok(Some(IrFormat::Json)),
            "yaml" | "yml" => Ok(Some(IrFormat::Yaml)),
            _ => Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            }),
        }
    }

    fn required(path: &Path) -> Result<Self> {
        IrFormat::from_path(path)?.ok_or_else(|| Error::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: String::new(),
        })
    }
}

/// Load a persisted IR file.
pub fn load_ir(path: &Path) -> Result<ModuleCollection> {
    let format = IrFormat::required(path)?;
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let data: Value = match format {
        IrFormat::Json => serde_json::from_str(&text)?,
        IrFormat::Yaml => serde_yaml::from_str(&text)?,
    };
    ModuleCollection::from_dict(&data)
}

/// Serialize the IR in the given format.
pub fn render_ir(modules: &ModuleCollection, format: IrFormat) -> Result<String> {
    Ok(match format {
        IrFormat::Json => serde_json::to_string_pretty(modules)? + "\n",
        IrFormat::Yaml => serde_yaml::to_string(modules)?,
    })
}

/// Write the IR to `path`, format inferred from the extension.
///
/// Returns whether a file was written. A path with no extension is logged
/// and skipped; an unknown extension is an error.
pub fn save_ir(modules: &ModuleCollection, path: &Path, gate: &dyn OverwriteGate) -> Result<bool> {
    let Some(format) = IrFormat::from_path(path)? else {
        error!(path = %path.display(), "output has no file extension, nothing written");
        return Ok(false);
    };
    let text = render_ir(modules, format)?;
    create_file(path, &text, gate)
}

/// Decides whether an existing file may be replaced.
pub trait OverwriteGate {
    fn confirm_overwrite(&self, path: &Path) -> Result<bool>;
}

/// Always overwrite.
pub struct ForceOverwrite;

impl OverwriteGate for ForceOverwrite {
    fn confirm_overwrite(&self, _path: &Path) -> Result<bool> {
        Ok(true)
    }
}

/// Ask on the terminal, defaulting to yes.
///
/// Without a terminal one answer line is read from stdin: empty or `y`
/// confirms, end of input declines.
pub struct TerminalPrompt;

impl OverwriteGate for TerminalPrompt {
    fn confirm_overwrite(&self, path: &Path) -> Result<bool> {
        let question = format!("{} already exists. Overwrite it?", path.display());
        if io::stdin().is_terminal() {
            return Confirm::new()
                .with_prompt(question)
                .default(true)
                .interact()
                .map_err(|e| Error::Prompt(e.to_string()));
        }

        eprint!("{question} [Y, n]: ");
        let mut answer = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut answer)
            .map_err(|e| Error::Prompt(e.to_string()))?;
        if read == 0 {
            warn!(path = %path.display(), "no answer on stdin, keeping existing file");
            return Ok(false);
        }
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "" | "y" | "yes"))
    }
}

/// Write `contents` to `path`, consulting `gate` when the file exists.
///
/// Returns `false` when the gate declined; that is not an error.
pub fn create_file(path: &Path, contents: &str, gate: &dyn OverwriteGate) -> Result<bool> {
    if path.exists() && !gate.confirm_overwrite(path)? {
        info!(path = %path.display(), "kept existing file");
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_directory(parent)?;
    }
    fs::write(path, contents).map_err(|e| Error::io(path, e))?;
    info!(path = %path.display(), "wrote file");
    Ok(true)
}

pub fn create_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::io(path, e))
}
