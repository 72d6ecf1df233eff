//! Code synthesis: text primitives, builders, and the argparse generator.

pub mod block;
pub mod builders;
pub mod generator;
pub mod python;

pub use block::{Block, Content, Line, TAB_SIZE};
pub use generator::{CodeGenerator, GeneratedCode, ImportResolver};
