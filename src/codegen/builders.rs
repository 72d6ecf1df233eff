//! Function and match/case shaped blocks.

use std::ops::{Deref, DerefMut};

use super::block::{Block, Content};
use super::python::py_str;

/// A `def` statement whose body is appended one level in.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    block: Block,
}

impl Function {
    /// `params` are `(name, annotation)` pairs; an empty annotation is omitted.
    pub fn new(name: impl Into<String>, params: &[(&str, &str)], returns: Option<&str>) -> Self {
        let name = name.into();
        let signature = params
            .iter()
            .map(|(param, annotation)| match *annotation {
                "" => (*param).to_string(),
                annotation => format!("{param}: {annotation}"),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let header = match returns {
            Some(returns) => format!("def {name}({signature}) -> {returns}:"),
            None => format!("def {name}({signature}):"),
        };

        let mut block = Block::new();
        block.append_line(header).indent();
        Self { name, block }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_block(self) -> Block {
        self.block
    }
}

impl Deref for Function {
    type Target = Block;

    fn deref(&self) -> &Block {
        &self.block
    }
}

impl DerefMut for Function {
    fn deref_mut(&mut self) -> &mut Block {
        &mut self.block
    }
}

impl From<Function> for Content {
    fn from(function: Function) -> Self {
        Content::Block(function.block)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Str(String),
    Int(i64),
    /// The `_` wildcard
    Default,
}

impl Pattern {
    fn render(&self) -> String {
        match self {
            Pattern::Str(value) => py_str(value),
            Pattern::Int(value) => value.to_string(),
            Pattern::Default => "_".to_string(),
        }
    }
}

/// One `case` arm.
#[derive(Debug, Clone)]
pub struct Case {
    pub pattern: Pattern,
    pub body: Block,
}

impl Case {
    pub fn new(pattern: Pattern, body: impl Into<Content>) -> Self {
        let mut block = Block::new();
        block.append(body);
        Self {
            pattern,
            body: block,
        }
    }

    pub fn default_case(body: impl Into<Content>) -> Self {
        Self::new(Pattern::Default, body)
    }

    pub fn to_block(&self) -> Block {
        let mut block = Block::new();
        block
            .append_line(format!("case {}:", self.pattern.render()))
            .indent()
            .append(self.body.clone());
        block
    }
}

/// A `match` statement over `subject`.
#[derive(Debug, Clone)]
pub struct MatchCase {
    pub subject: String,
    pub cases: Vec<Case>,
}

impl MatchCase {
    pub fn new(subject: impl Into<String>, cases: Vec<Case>) -> Self {
        Self {
            subject: subject.into(),
            cases,
        }
    }

    pub fn to_block(&self) -> Block {
        let mut block = Block::new();
        block.append_line(format!("match {}:", self.subject)).indent();
        for case in &self.cases {
            block.append(case.to_block());
        }
        block
    }
}

impl From<MatchCase> for Content {
    fn from(match_case: MatchCase) -> Self {
        Content::Block(match_case.to_block())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_header_and_body() {
        let mut function = Function::new(
            "add_args",
            &[("parser", "ArgumentParser")],
            Some("ArgumentParser"),
        );
        function.append_line("return parser");
        assert_eq!(function.name(), "add_args");
        assert_eq!(
            function.to_string(),
            "def add_args(parser: ArgumentParser) -> ArgumentParser:\n    return parser\n"
        );

        let main = Function::new("main", &[], None);
        assert_eq!(main.to_string(), "def main():\n");
    }

    #[test]
    fn match_with_nested_match() {
        let mut inner_body = Block::single("module = A()");
        inner_body.append(MatchCase::new(
            "args['command']",
            vec![
                Case::new(Pattern::Str("run-all".into()), "module.run_all()"),
                Case::default_case("return False"),
            ],
        ));
        let outer = MatchCase::new(
            "args['module']",
            vec![
                Case::new(Pattern::Str("A".into()), inner_body),
                Case::new(Pattern::Int(3), "pass"),
            ],
        );

        let expected = "\
match args['module']:
    case 'A':
        module = A()
        match args['command']:
            case 'run-all':
                module.run_all()
            case _:
                return False
    case 3:
        pass
";
        assert_eq!(outer.to_block().to_string(), expected);
    }
}
