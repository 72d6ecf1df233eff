//! Rendering of values as Python source.

use crate::model::{Argument, Literal};

/// Single-quoted Python string literal.
pub fn py_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

pub fn py_literal(value: &Literal) -> String {
    match value {
        Literal::None => "None".to_string(),
        Literal::Bool(true) => "True".to_string(),
        Literal::Bool(false) => "False".to_string(),
        Literal::Int(i) => i.to_string(),
        Literal::Float(f) if f.is_nan() => "float('nan')".to_string(),
        Literal::Float(f) if f.is_infinite() => {
            let sign = if *f < 0.0 { "-" } else { "" };
            format!("{sign}float('inf')")
        }
        Literal::Float(f) => format!("{f:?}"),
        Literal::Str(s) => py_str(s),
        Literal::List(items) => {
            let items: Vec<String> = items.iter().map(py_literal).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

/// Keyword arguments reading each destination from the parsed `args` dict.
pub fn call_args(args: &[Argument]) -> String {
    args.iter()
        .map(|arg| format!("{0}=args['{0}']", arg.destination))
        .collect::<Vec<_>>()
        .join(", ")
}
