//! Lowering of a tree-sitter Python parse into [`Node`].

use tree_sitter::Parser;
use tracing::debug;

use super::*;

type TsNode<'t> = tree_sitter::Node<'t>;

pub(super) fn parse_module(source: &str, location: &str) -> Result<SyntaxTree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| Error::Syntax {
            location: location.to_string(),
            line: 0,
            message: format!("cannot load Python grammar: {e}"),
        })?;
    let tree = parser.parse(source, None).ok_or_else(|| Error::Syntax {
        location: location.to_string(),
        line: 0,
        message: "parser produced no tree".to_string(),
    })?;

    let root = tree.root_node();
    if root.has_error() {
        let line = first_error(root).map_or(0, |n| n.start_position().row + 1);
        return Err(Error::Syntax {
            location: location.to_string(),
            line,
            message: "invalid Python syntax".to_string(),
        });
    }

    let lowering = Lowering { src: source };
    Ok(SyntaxTree {
        body: lowering.block(root),
    })
}

fn first_error(node: TsNode<'_>) -> Option<TsNode<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    children(node)
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error)
}

fn children(node: TsNode<'_>) -> Vec<TsNode<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn named_children(node: TsNode<'_>) -> Vec<TsNode<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

struct Lowering<'s> {
    src: &'s str,
}

impl<'s> Lowering<'s> {
    fn text(&self, node: TsNode<'_>) -> &'s str {
        &self.src[node.byte_range()]
    }

    fn block(&self, node: TsNode<'_>) -> Vec<Node> {
        named_children(node)
            .into_iter()
            .map(|stmt| self.statement(stmt))
            .collect()
    }

    fn statement(&self, node: TsNode<'_>) -> Node {
        match node.kind() {
            "class_definition" => self.class(node, Vec::new()),
            "function_definition" => self.function(node, Vec::new()),
            "decorated_definition" => self.decorated(node),
            "import_statement" => Node::Import(self.import_names(node)),
            "import_from_statement" => self.import_from(node),
            "expression_statement" => self.expression_statement(node),
            _ => {
                let nested = self.nested_blocks(node);
                if nested.is_empty() {
                    Node::Other
                } else {
                    Node::Compound(nested)
                }
            }
        }
    }

    /// Statements of every block below a compound statement's clauses.
    fn nested_blocks(&self, node: TsNode<'_>) -> Vec<Node> {
        let mut nested = Vec::new();
        for child in named_children(node) {
            if child.kind() == "block" {
                nested.extend(self.block(child));
            } else if child.kind().ends_with("_clause") {
                nested.extend(self.nested_blocks(child));
            }
        }
        nested
    }

    fn decorated(&self, node: TsNode<'_>) -> Node {
        let decorators = named_children(node)
            .into_iter()
            .filter(|child| child.kind() == "decorator")
            .filter_map(|decorator| named_children(decorator).into_iter().next())
            .map(|expr| self.expr(expr))
            .collect();
        match node.child_by_field_name("definition") {
            Some(def) if def.kind() == "class_definition" => self.class(def, decorators),
            Some(def) if def.kind() == "function_definition" => self.function(def, decorators),
            _ => Node::Other,
        }
    }

    fn class(&self, node: TsNode<'_>, decorators: Vec<Expr>) -> Node {
        let name = self.field_text(node, "name");
        let body = node.child_by_field_name("body");
        Node::ClassDef(ClassDef {
            name,
            decorators,
            docstring: body.and_then(|b| self.docstring(b)),
            body: body.map(|b| self.block(b)).unwrap_or_default(),
            line: node.start_position().row + 1,
        })
    }

    fn function(&self, node: TsNode<'_>, decorators: Vec<Expr>) -> Node {
        let name = self.field_text(node, "name");
        let body = node.child_by_field_name("body");
        Node::FunctionDef(FunctionDef {
            name,
            parameters: node
                .child_by_field_name("parameters")
                .map(|p| self.parameters(p))
                .unwrap_or_default(),
            decorators,
            returns: node
                .child_by_field_name("return_type")
                .map(|t| TypeExpr::parse(self.text(t))),
            docstring: body.and_then(|b| self.docstring(b)),
            body: body.map(|b| self.block(b)).unwrap_or_default(),
            line: node.start_position().row + 1,
        })
    }

    fn field_text(&self, node: TsNode<'_>, field: &str) -> String {
        node.child_by_field_name(field)
            .map(|n| self.text(n).to_string())
            .unwrap_or_default()
    }

    /// Cleaned docstring when the block opens with a string statement.
    fn docstring(&self, block: TsNode<'_>) -> Option<String> {
        let first = named_children(block).into_iter().next()?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let expr = named_children(first).into_iter().next()?;
        let raw = match expr.kind() {
            "string" => decode_string(self.text(expr))?,
            "concatenated_string" => named_children(expr)
                .into_iter()
                .map(|part| decode_string(self.text(part)))
                .collect::<Option<String>>()?,
            _ => return None,
        };
        Some(cleandoc(&raw))
    }

    fn parameters(&self, node: TsNode<'_>) -> Parameters {
        let mut params = Parameters::default();
        let mut keyword_only = false;

        for child in named_children(node) {
            let (param, default) = match child.kind() {
                "identifier" => (self.param(child, None), None),
                "typed_parameter" => {
                    let annotation = child
                        .child_by_field_name("type")
                        .map(|t| TypeExpr::parse(self.text(t)));
                    let Some(inner) = named_children(child).into_iter().next() else {
                        continue;
                    };
                    match inner.kind() {
                        "list_splat_pattern" => {
                            params.vararg = self.splat(inner, annotation);
                            keyword_only = true;
                            continue;
                        }
                        "dictionary_splat_pattern" => {
                            params.kwarg = self.splat(inner, annotation);
                            continue;
                        }
                        _ => (self.param(inner, annotation), None),
                    }
                }
                "default_parameter" | "typed_default_parameter" => {
                    let Some(name) = child.child_by_field_name("name") else {
                        continue;
                    };
                    let annotation = child
                        .child_by_field_name("type")
                        .map(|t| TypeExpr::parse(self.text(t)));
                    let default = child.child_by_field_name("value").map(|v| self.expr(v));
                    (self.param(name, annotation), default)
                }
                "list_splat_pattern" => {
                    params.vararg = self.splat(child, None);
                    keyword_only = true;
                    continue;
                }
                "dictionary_splat_pattern" => {
                    params.kwarg = self.splat(child, None);
                    continue;
                }
                "keyword_separator" => {
                    keyword_only = true;
                    continue;
                }
                other => {
                    debug!(kind = other, "skipping parameter node");
                    continue;
                }
            };

            if keyword_only {
                params.kwonly.push(param);
                params.kw_defaults.push(default);
            } else {
                params.args.push(param);
                if let Some(default) = default {
                    params.defaults.push(default);
                }
            }
        }
        params
    }

    fn param(&self, name: TsNode<'_>, annotation: Option<TypeExpr>) -> Param {
        Param {
            name: self.text(name).to_string(),
            annotation,
        }
    }

    fn splat(&self, node: TsNode<'_>, annotation: Option<TypeExpr>) -> Option<Param> {
        named_children(node)
            .into_iter()
            .find(|child| child.kind() == "identifier")
            .map(|ident| self.param(ident, annotation))
    }

    fn import_names(&self, node: TsNode<'_>) -> Vec<Alias> {
        let mut cursor = node.walk();
        node.children_by_field_name("name", &mut cursor)
            .map(|name| self.alias(name))
            .collect()
    }

    fn alias(&self, node: TsNode<'_>) -> Alias {
        if node.kind() == "aliased_import" {
            Alias::new(
                self.field_text(node, "name"),
                node.child_by_field_name("alias")
                    .map(|a| self.text(a).to_string()),
            )
        } else {
            Alias::new(self.text(node), None)
        }
    }

    fn import_from(&self, node: TsNode<'_>) -> Node {
        let wildcard = named_children(node)
            .iter()
            .any(|child| child.kind() == "wildcard_import");
        Node::ImportFrom(ImportFrom {
            module: self.field_text(node, "module_name"),
            names: self.import_names(node),
            wildcard,
        })
    }

    fn expression_statement(&self, node: TsNode<'_>) -> Node {
        let Some(inner) = named_children(node).into_iter().next() else {
            return Node::Other;
        };
        if inner.kind() != "assignment" {
            return Node::Other;
        }
        let mut targets = Vec::new();
        let mut current = Some(inner);
        // `a = b = 1` nests the second assignment in `right`
        while let Some(assignment) = current.filter(|n| n.kind() == "assignment") {
            if let Some(left) = assignment.child_by_field_name("left") {
                self.collect_targets(left, &mut targets);
            }
            current = assignment.child_by_field_name("right");
        }
        Node::Assign(Assign { targets })
    }

    fn collect_targets(&self, node: TsNode<'_>, targets: &mut Vec<String>) {
        match node.kind() {
            "identifier" => targets.push(self.text(node).to_string()),
            "pattern_list" | "tuple_pattern" | "list_pattern" => {
                for child in named_children(node) {
                    self.collect_targets(child, targets);
                }
            }
            _ => {}
        }
    }

    fn expr(&self, node: TsNode<'_>) -> Expr {
        let text = self.text(node);
        match node.kind() {
            "identifier" => Expr::Name(text.to_string()),
            "attribute" => match (
                node.child_by_field_name("object"),
                node.child_by_field_name("attribute"),
            ) {
                (Some(object), Some(attr)) => Expr::Attribute {
                    value: Box::new(self.expr(object)),
                    attr: self.text(attr).to_string(),
                },
                _ => Expr::Other(text.to_string()),
            },
            "call" => self.call(node),
            "integer" => parse_int(text)
                .map(|i| Expr::Literal(Literal::Int(i)))
                .unwrap_or_else(|| Expr::Other(text.to_string())),
            "float" => text
                .replace('_', "")
                .parse::<f64>()
                .map(|f| Expr::Literal(Literal::Float(f)))
                .unwrap_or_else(|_| Expr::Other(text.to_string())),
            "string" => decode_string(text)
                .map(|s| Expr::Literal(Literal::Str(s)))
                .unwrap_or_else(|| Expr::Other(text.to_string())),
            "concatenated_string" => named_children(node)
                .into_iter()
                .map(|part| decode_string(self.text(part)))
                .collect::<Option<String>>()
                .map(|s| Expr::Literal(Literal::Str(s)))
                .unwrap_or_else(|| Expr::Other(text.to_string())),
            "true" => Expr::Literal(Literal::Bool(true)),
            "false" => Expr::Literal(Literal::Bool(false)),
            "none" => Expr::Literal(Literal::None),
            "list" | "tuple" => Expr::List(
                named_children(node)
                    .into_iter()
                    .map(|item| self.expr(item))
                    .collect(),
            ),
            "parenthesized_expression" => named_children(node)
                .into_iter()
                .next()
                .map(|inner| self.expr(inner))
                .unwrap_or_else(|| Expr::Other(text.to_string())),
            "unary_operator" => self.unary(node),
            _ => Expr::Other(text.to_string()),
        }
    }

    fn unary(&self, node: TsNode<'_>) -> Expr {
        let operator = node.child_by_field_name("operator").map(|op| self.text(op));
        let operand = node.child_by_field_name("argument").map(|arg| self.expr(arg));
        match (operator, operand) {
            (Some("-"), Some(Expr::Literal(Literal::Int(i)))) => Expr::Literal(Literal::Int(-i)),
            (Some("-"), Some(Expr::Literal(Literal::Float(f)))) => {
                Expr::Literal(Literal::Float(-f))
            }
            (Some("+"), Some(value @ Expr::Literal(Literal::Int(_) | Literal::Float(_)))) => value,
            _ => Expr::Other(self.text(node).to_string()),
        }
    }

    fn call(&self, node: TsNode<'_>) -> Expr {
        let Some(func) = node.child_by_field_name("function") else {
            return Expr::Other(self.text(node).to_string());
        };
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        match node.child_by_field_name("arguments") {
            Some(arguments) if arguments.kind() == "argument_list" => {
                for argument in named_children(arguments) {
                    if argument.kind() == "keyword_argument" {
                        let name = self.field_text(argument, "name");
                        let value = argument
                            .child_by_field_name("value")
                            .map(|v| self.expr(v))
                            .unwrap_or_else(|| Expr::Other(String::new()));
                        keywords.push((name, value));
                    } else {
                        args.push(self.expr(argument));
                    }
                }
            }
            // generator argument: `f(x for x in y)`
            Some(generator) => args.push(Expr::Other(self.text(generator).to_string())),
            None => {}
        }
        Expr::Call {
            func: Box::new(self.expr(func)),
            args,
            keywords,
        }
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let digits = text.replace('_', "");
    let lower = digits.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else {
        lower.parse().ok()
    }
}

/// Decode a Python string literal. Byte and f-strings yield `None`.
fn decode_string(literal: &str) -> Option<String> {
    let quote_at = literal.find(['"', '\''])?;
    let prefix = literal[..quote_at].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }
    let raw = prefix.contains('r');
    let body = &literal[quote_at..];

    let inner = ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find_map(|q| body.strip_prefix(q).and_then(|b| b.strip_suffix(q)))?;

    Some(if raw {
        inner.to_string()
    } else {
        unescape(inner)
    })
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Normalise docstring indentation the way Python's `inspect.cleandoc` does.
pub fn cleandoc(doc: &str) -> String {
    let expanded = doc.replace('\t', "        ");
    let lines: Vec<&str> = expanded.split('\n').collect();

    let margin = lines
        .iter()
        .skip(1)
        .filter_map(|line| {
            let content = line.trim_start();
            (!content.is_empty()).then(|| line.chars().count() - content.chars().count())
        })
        .min();

    let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());
    if let Some(first) = lines.first() {
        cleaned.push(first.trim_start().to_string());
    }
    for line in lines.iter().skip(1) {
        let stripped: String = match margin {
            Some(margin) => line.chars().skip(margin).collect(),
            None => line.to_string(),
        };
        cleaned.push(stripped);
    }

    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    let leading = cleaned.iter().take_while(|l| l.is_empty()).count();
    cleaned.drain(..leading);
    cleaned.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> SyntaxTree {
        SyntaxTree::parse(src, "test.py").unwrap()
    }

    fn only_class(tree: &SyntaxTree) -> &ClassDef {
        match &tree.body[..] {
            [Node::ClassDef(class)] => class,
            other => panic!("expected one class, got {other:?}"),
        }
    }

    fn methods(class: &ClassDef) -> Vec<&FunctionDef> {
        class
            .body
            .iter()
            .filter_map(|n| match n {
                Node::FunctionDef(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn class_with_methods_and_docstrings() {
        let tree = parse(
            r#"
class Calculator:
    """A calculator.

    Does sums.
    """

    def add(self, a: float, b: float = 1.5) -> float:
        """Returns the sum of two numbers."""
        return a + b
"#,
        );
        let class = only_class(&tree);
        assert_eq!(class.name, "Calculator");
        assert_eq!(class.docstring.as_deref(), Some("A calculator.\n\nDoes sums."));

        let add = methods(class)[0];
        assert_eq!(add.name, "add");
        assert_eq!(add.line, 8);
        assert_eq!(add.docstring.as_deref(), Some("Returns the sum of two numbers."));
        assert_eq!(add.returns, Some(TypeExpr::Name("float".into())));

        let names: Vec<_> = add.parameters.args.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["self", "a", "b"]);
        assert_eq!(add.parameters.args[0].annotation, None);
        assert_eq!(
            add.parameters.args[1].annotation,
            Some(TypeExpr::Name("float".into()))
        );
        assert_eq!(
            add.parameters.defaults,
            vec![Expr::Literal(Literal::Float(1.5))]
        );
    }

    #[test]
    fn comment_before_docstring_is_skipped() {
        let tree = parse("def f():\n    # note\n    'doc'\n");
        match &tree.body[0] {
            Node::FunctionDef(f) => assert_eq!(f.docstring.as_deref(), Some("doc")),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn non_string_first_statement_is_not_a_docstring() {
        let tree = parse("def f():\n    x = 1\n    'late'\n");
        match &tree.body[0] {
            Node::FunctionDef(f) => assert_eq!(f.docstring, None),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn keyword_only_and_splats() {
        let tree = parse("def f(a, /, b=-2, *rest, c: int, d=None, **extra): pass\n");
        let Node::FunctionDef(f) = &tree.body[0] else {
            panic!("expected function");
        };
        let p = &f.parameters;
        assert_eq!(p.args.len(), 2);
        assert_eq!(p.defaults, vec![Expr::Literal(Literal::Int(-2))]);
        assert_eq!(p.vararg.as_ref().map(|v| v.name.as_str()), Some("rest"));
        assert_eq!(p.kwarg.as_ref().map(|v| v.name.as_str()), Some("extra"));
        let kwonly: Vec<_> = p.kwonly.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(kwonly, ["c", "d"]);
        assert_eq!(p.kw_defaults, vec![None, Some(Expr::Literal(Literal::None))]);
    }

    #[test]
    fn decorators_are_lowered() {
        let tree = parse(
            "class A:\n    @staticmethod\n    def s(x): pass\n\n    @deco.add_hydra('conf', config_name=\"main\")\n    def h(self, conf): pass\n",
        );
        let class = only_class(&tree);
        let m = methods(class);
        assert!(m[0].has_decorator("staticmethod"));
        match &m[1].decorators[0] {
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                assert_eq!(func.dotted().as_deref(), Some("deco.add_hydra"));
                assert_eq!(args, &vec![Expr::Literal(Literal::Str("conf".into()))]);
                assert_eq!(keywords[0].0, "config_name");
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn imports_are_lowered() {
        let tree = parse(
            "import os.path, json as j\nfrom argsmith.decorator import add_hydra as ah, other\nfrom . import *\n",
        );
        assert_eq!(
            tree.body[0],
            Node::Import(vec![
                Alias::new("os.path", None),
                Alias::new("json", Some("j".into())),
            ])
        );
        assert_eq!(
            tree.body[1],
            Node::ImportFrom(ImportFrom {
                module: "argsmith.decorator".into(),
                names: vec![
                    Alias::new("add_hydra", Some("ah".into())),
                    Alias::new("other", None),
                ],
                wildcard: false,
            })
        );
        match &tree.body[2] {
            Node::ImportFrom(from) => {
                assert_eq!(from.module, ".");
                assert!(from.wildcard);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn assignments_record_targets() {
        let tree = parse("a = b = 1\nc, d = 1, 2\nprint(a)\n");
        assert_eq!(
            tree.body[0],
            Node::Assign(Assign {
                targets: vec!["a".into(), "b".into()]
            })
        );
        assert_eq!(
            tree.body[1],
            Node::Assign(Assign {
                targets: vec!["c".into(), "d".into()]
            })
        );
        assert_eq!(tree.body[2], Node::Other);
    }

    #[test]
    fn compound_statements_keep_nested_definitions() {
        let tree = parse("if True:\n    class A:\n        pass\nelse:\n    class B:\n        pass\n");
        match &tree.body[0] {
            Node::Compound(nested) => {
                assert_eq!(nested.len(), 2);
                assert!(matches!(&nested[1], Node::ClassDef(c) if c.name == "B"));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn syntax_errors_report_a_line() {
        let err = SyntaxTree::parse("x = 1\ndef broken(:\n", "bad.py").unwrap_err();
        match err {
            Error::Syntax { location, line, .. } => {
                assert_eq!(location, "bad.py");
                assert!(line >= 1);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn string_literals_decode() {
        assert_eq!(decode_string(r#""a\tb""#).as_deref(), Some("a\tb"));
        assert_eq!(decode_string(r#"r"a\tb""#).as_deref(), Some(r"a\tb"));
        assert_eq!(decode_string("'''x'''").as_deref(), Some("x"));
        assert_eq!(decode_string("f'{x}'"), None);
    }

    #[test]
    fn integers_in_every_base() {
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("0xff"), Some(255));
        assert_eq!(parse_int("0o17"), Some(15));
        assert_eq!(parse_int("0b101"), Some(5));
    }

    #[test]
    fn cleandoc_strips_common_margin() {
        let doc = "Summary.\n\n        Args:\n            x: value\n        ";
        assert_eq!(cleandoc(doc), "Summary.\n\nArgs:\n    x: value");
        assert_eq!(cleandoc("\n    Only body.\n"), "Only body.");
    }
}
