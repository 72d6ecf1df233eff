//! argsmith: generate argparse command-line front-ends from documented
//! Python classes.
//!
//! The pipeline has two halves joined by a serializable IR:
//!
//! 1. [`extract`] walks a parsed Python file ([`syntax`]), reads docstrings in
//!    one of four conventions ([`docstring`]) and resolves argsmith decorators
//!    ([`annotation`]) into a [`model::ModuleCollection`].
//! 2. [`codegen`] turns that collection into a `parser.py` setup file and a
//!    `__main__.py` entry point.
//!
//! [`pipeline::ArgWriter`] ties both halves to the filesystem.

pub mod annotation;
pub mod codegen;
pub mod config;
pub mod docstring;
pub mod error;
pub mod extract;
pub mod format;
pub mod logging;
pub mod model;
pub mod persist;
pub mod pipeline;
pub mod syntax;

pub use error::{Error, Result};
