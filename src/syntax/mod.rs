//! Closed syntax tree for Python modules.
//!
//! The tree-sitter parse is lowered once into [`Node`] variants so the
//! extractor and the annotation resolver match exhaustively on statement
//! kinds instead of inspecting raw grammar node names.

mod lower;

pub use lower::cleandoc;

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::model::Literal;

static RE_DOTTED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap()
});

/// A parsed Python module.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    pub body: Vec<Node>,
}

impl SyntaxTree {
    /// Parse Python source. `location` only labels syntax errors.
    pub fn parse(source: &str, location: &str) -> Result<Self> {
        lower::parse_module(source, location)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&source, &path.display().to_string())
    }
}

/// Statement kinds the walker distinguishes.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    ClassDef(ClassDef),
    FunctionDef(FunctionDef),
    Import(Vec<Alias>),
    ImportFrom(ImportFrom),
    Assign(Assign),
    /// Statements nested in the blocks of `if`, `for`, `try`, `with`, ...
    Compound(Vec<Node>),
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub decorators: Vec<Expr>,
    pub docstring: Option<String>,
    pub body: Vec<Node>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub parameters: Parameters,
    pub decorators: Vec<Expr>,
    pub returns: Option<TypeExpr>,
    pub docstring: Option<String>,
    pub body: Vec<Node>,
    /// 1-based line of the `def`
    pub line: usize,
}

impl FunctionDef {
    /// Whether any decorator is the bare name `name` (`@staticmethod`).
    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators
            .iter()
            .any(|d| matches!(d, Expr::Name(n) if n == name))
    }

    pub fn is_static(&self) -> bool {
        self.has_decorator("staticmethod")
    }

    /// Number of leading positional parameters that are the implicit receiver.
    pub fn receiver_count(&self) -> usize {
        usize::from(!self.is_static() && !self.parameters.args.is_empty())
    }

    /// Declared parameters except the implicit receiver, positional first.
    pub fn explicit_params(&self) -> impl Iterator<Item = &Param> {
        self.parameters
            .args
            .iter()
            .skip(self.receiver_count())
            .chain(self.parameters.kwonly.iter())
    }
}

/// `import a.b as c` binds `c`; `import a.b` binds `a`.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

impl Alias {
    pub fn new(name: impl Into<String>, asname: Option<String>) -> Self {
        Self {
            name: name.into(),
            asname,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportFrom {
    /// Module path, leading dots kept for relative imports
    pub module: String,
    pub names: Vec<Alias>,
    pub wildcard: bool,
}

/// Names bound by an assignment statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub targets: Vec<String>,
}

/// Parameter list in the shape of Python's own `ast.arguments`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    /// Positional parameters, positional-only ones included
    pub args: Vec<Param>,
    /// Defaults for the trailing `defaults.len()` entries of `args`
    pub defaults: Vec<Expr>,
    pub kwonly: Vec<Param>,
    /// One slot per `kwonly` entry
    pub kw_defaults: Vec<Option<Expr>>,
    pub vararg: Option<Param>,
    pub kwarg: Option<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub annotation: Option<TypeExpr>,
}

/// Expression subset needed for decorators and defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<(String, Expr)>,
    },
    Literal(Literal),
    List(Vec<Expr>),
    /// Anything else, kept as source text
    Other(String),
}

impl Expr {
    /// Evaluate a statically known value.
    pub fn literal(&self) -> Option<Literal> {
        match self {
            Expr::Literal(value) => Some(value.clone()),
            Expr::List(items) => items
                .iter()
                .map(Expr::literal)
                .collect::<Option<Vec<_>>>()
                .map(Literal::List),
            _ => None,
        }
    }

    /// Dotted name of a `Name`/`Attribute` chain (`a.b.c`).
    pub fn dotted(&self) -> Option<String> {
        match self {
            Expr::Name(name) => Some(name.clone()),
            Expr::Attribute { value, attr } => value.dotted().map(|base| format!("{base}.{attr}")),
            _ => None,
        }
    }

    /// Short source-like rendering for log messages.
    pub fn describe(&self) -> String {
        match self {
            Expr::Other(text) => text.clone(),
            Expr::Call { func, .. } => format!("{}(...)", func.describe()),
            other => other
                .dotted()
                .or_else(|| other.literal().map(|l| format!("{l:?}")))
                .unwrap_or_else(|| "<expression>".to_string()),
        }
    }
}

/// A type annotation, parsed from its source text.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Name(String),
    Subscript { base: String, args: Vec<TypeExpr> },
    Other(String),
}

impl TypeExpr {
    pub fn parse(text: &str) -> TypeExpr {
        let text = text.trim();
        let unquoted = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')));
        if let Some(inner) = unquoted {
            return TypeExpr::parse(inner);
        }

        let union = split_top_level(text, '|');
        if union.len() > 1 {
            let mut rest: Vec<&str> = union.into_iter().filter(|part| *part != "None").collect();
            return match rest.len() {
                1 => TypeExpr::parse(rest.remove(0)),
                _ => TypeExpr::Other(text.to_string()),
            };
        }

        if let Some(open) = text.find('[') {
            let base = text[..open].trim();
            if let Some(inner) = text[open + 1..].strip_suffix(']') {
                if RE_DOTTED_NAME.is_match(base) {
                    let args = split_top_level(inner, ',')
                        .into_iter()
                        .filter(|part| !part.is_empty())
                        .map(TypeExpr::parse)
                        .collect();
                    return TypeExpr::Subscript {
                        base: base.to_string(),
                        args,
                    };
                }
            }
            return TypeExpr::Other(text.to_string());
        }

        if RE_DOTTED_NAME.is_match(text) {
            TypeExpr::Name(text.to_string())
        } else {
            TypeExpr::Other(text.to_string())
        }
    }

    /// Last segment of a dotted name or subscript base (`typing.List` → `List`).
    pub fn base_name(&self) -> Option<&str> {
        match self {
            TypeExpr::Name(name) | TypeExpr::Subscript { base: name, .. } => {
                name.rsplit('.').next()
            }
            TypeExpr::Other(_) => None,
        }
    }
}

/// Split on `sep` outside brackets, trimming each piece.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}
