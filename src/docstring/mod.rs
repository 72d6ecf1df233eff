//! Documentation comment parsers, one per docstring convention.
//!
//! Every parser answers three questions about a class or method: its one-line
//! summary, the help text of each declared parameter, and the description of
//! the return value. Absent documentation never fails here; it degrades to
//! [`NO_DOCUMENTATION`].

pub mod epytext;
pub mod google;
pub mod numpy;
pub mod rest;

use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::error::Error;
use crate::syntax::{ClassDef, FunctionDef};

/// Filler for anything the docstring does not describe.
pub const NO_DOCUMENTATION: &str = "--no-documentation-exists--";

/// Supported docstring conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Convention {
    #[default]
    Google,
    Epytext,
    Rest,
    #[value(name = "numpydoc", alias = "numpy")]
    Numpydoc,
}

impl Convention {
    pub fn as_str(&self) -> &'static str {
        match self {
            Convention::Google => "google",
            Convention::Epytext => "epytext",
            Convention::Rest => "rest",
            Convention::Numpydoc => "numpydoc",
        }
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Convention {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Convention::Google),
            "epytext" => Ok(Convention::Epytext),
            "rest" => Ok(Convention::Rest),
            "numpydoc" | "numpy" => Ok(Convention::Numpydoc),
            _ => Err(Error::UnknownConvention(s.to_string())),
        }
    }
}

/// Build the parser for a convention.
pub fn create_parser(convention: Convention) -> Box<dyn DocstringParser> {
    match convention {
        Convention::Google => Box::new(google::GoogleParser),
        Convention::Epytext => Box::new(epytext::EpytextParser),
        Convention::Rest => Box::new(rest::RestParser),
        Convention::Numpydoc => Box::new(numpy::NumpyParser),
    }
}

/// A syntax node that may carry a docstring.
pub trait Documented {
    fn name(&self) -> &str;
    fn docstring(&self) -> Option<&str>;
}

impl Documented for ClassDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn docstring(&self) -> Option<&str> {
        self.docstring.as_deref()
    }
}

impl Documented for FunctionDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn docstring(&self) -> Option<&str> {
        self.docstring.as_deref()
    }
}

/// Convention-specific reading of a cleaned docstring.
pub trait DocstringParser {
    fn convention(&self) -> Convention;

    /// Summary line of a docstring, markup excluded.
    fn summary_line(&self, doc: &str) -> Option<String>;

    /// Parameter descriptions the docstring actually contains, in order.
    fn documented_args(&self, doc: &str) -> IndexMap<String, String>;

    /// Return-value description, if the docstring has one.
    fn documented_return(&self, doc: &str) -> Option<String>;

    fn summary(&self, item: &dyn Documented) -> String {
        match item.docstring() {
            Some(doc) => self
                .summary_line(doc)
                .unwrap_or_else(|| NO_DOCUMENTATION.to_string()),
            None => {
                info!(name = item.name(), "no docstring found");
                NO_DOCUMENTATION.to_string()
            }
        }
    }

    /// One entry per declared parameter, receiver excluded.
    fn argument_help(&self, function: &FunctionDef) -> IndexMap<String, String> {
        let params: Vec<&str> = function
            .explicit_params()
            .map(|p| p.name.as_str())
            .collect();
        if params.is_empty() {
            return IndexMap::new();
        }

        let Some(doc) = function.docstring.as_deref() else {
            return params
                .into_iter()
                .map(|name| (name.to_string(), NO_DOCUMENTATION.to_string()))
                .collect();
        };

        let mut documented = self.documented_args(doc);
        let mut help: IndexMap<String, String> = params
            .into_iter()
            .map(|name| {
                let text = documented
                    .shift_remove(name)
                    .filter(|text| !text.is_empty())
                    .unwrap_or_else(|| NO_DOCUMENTATION.to_string());
                (name.to_string(), text)
            })
            .collect();
        help.extend(documented);
        help
    }

    fn return_help(&self, function: &FunctionDef) -> String {
        function
            .docstring
            .as_deref()
            .and_then(|doc| self.documented_return(doc))
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| NO_DOCUMENTATION.to_string())
    }
}

pub(crate) fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// A rule line of repeated dashes (`-------`).
pub(crate) fn is_rule(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c == '-')
}

/// First non-blank line accepted by `keep`, trimmed.
pub(crate) fn first_line_where(doc: &str, keep: impl Fn(&str) -> bool) -> Option<String> {
    doc.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && keep(line))
        .map(str::to_string)
}

/// Join description fragments with single spaces.
pub(crate) fn join_words<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
