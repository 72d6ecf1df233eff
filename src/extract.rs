//! Structural extractor: Python classes → [`ModuleCollection`].
//!
//! Each class becomes a [`Module`]. Its `__init__` parameters become the
//! module arguments and every public method becomes a [`Command`]. Methods
//! whose name starts with `_` are skipped.

use indexmap::IndexMap;
use tracing::{debug, error, info, warn};

use crate::annotation::{resolve_annotations, ImportMap, MarkerRegistry};
use crate::docstring::{create_parser, Convention, DocstringParser, NO_DOCUMENTATION};
use crate::error::{Error, Result};
use crate::model::{Argument, Command, Module, ModuleCollection, Multiplicity, TypeTag};
use crate::syntax::{ClassDef, Expr, FunctionDef, Node, Param, SyntaxTree, TypeExpr};

const CONSTRUCTOR: &str = "__init__";

const SEQUENCE_TYPES: [&str; 8] = [
    "list", "List", "tuple", "Tuple", "set", "Set", "Sequence", "Iterable",
];

/// Accumulates modules across one or more parsed files.
pub struct Extractor {
    parser: Box<dyn DocstringParser>,
    registry: MarkerRegistry,
    strict: bool,
    modules: ModuleCollection,
}

impl Extractor {
    pub fn new(convention: Convention) -> Self {
        Self {
            parser: create_parser(convention),
            registry: MarkerRegistry::default(),
            strict: false,
            modules: ModuleCollection::new(),
        }
    }

    /// Fail on public methods that take parameters but have no docstring.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_registry(mut self, registry: MarkerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn modules(&self) -> &ModuleCollection {
        &self.modules
    }

    pub fn into_modules(self) -> ModuleCollection {
        self.modules
    }

    /// Add every class in `tree` to the collection.
    ///
    /// Decorators resolve against the bindings in effect where each class is
    /// defined. On error nothing from this tree is added.
    pub fn extract(&mut self, tree: &SyntaxTree, location: &str) -> Result<&ModuleCollection> {
        let mut imports = ImportMap::default();
        let mut found = Vec::new();
        self.visit(&tree.body, location, &mut imports, &mut found)?;
        info!(location, modules = found.len(), "extracted modules");
        for module in found {
            self.modules.push(module);
        }
        Ok(&self.modules)
    }

    fn visit(
        &self,
        nodes: &[Node],
        location: &str,
        imports: &mut ImportMap,
        found: &mut Vec<Module>,
    ) -> Result<()> {
        for node in nodes {
            match node {
                Node::ClassDef(class) => found.push(self.module(class, location, imports)?),
                Node::FunctionDef(function) => {
                    // Local bindings inside the function stay local.
                    let mut scope = imports.clone();
                    self.visit(&function.body, location, &mut scope, found)?;
                }
                Node::Compound(nested) => {
                    self.visit(nested, location, imports, found)?;
                    continue;
                }
                Node::Import(_) | Node::ImportFrom(_) | Node::Assign(_) | Node::Other => {}
            }
            imports.record(node);
        }
        Ok(())
    }

    fn module(&self, class: &ClassDef, location: &str, imports: &ImportMap) -> Result<Module> {
        let mut module = Module::new(&class.name, location);
        module.help_text = match class.docstring {
            Some(_) => self.parser.summary(class),
            None => {
                info!(class = %class.name, "class has no docstring, help left empty");
                String::new()
            }
        };

        for (name, method) in methods(&class.body) {
            if name == CONSTRUCTOR {
                module.args = self.arguments(&class.name, method, &[])?;
            } else if name.starts_with('_') {
                debug!(class = %class.name, method = name, "skipping non-public method");
            } else {
                module.commands.push(self.command(&class.name, method, imports)?);
            }
        }
        Ok(module)
    }

    fn command(&self, class: &str, method: &FunctionDef, imports: &ImportMap) -> Result<Command> {
        let flags = resolve_annotations(method, imports, &self.registry);
        let attached = self.registry.attached_params(&flags);

        let mut command = Command::new(&method.name);
        command.help_text = self.parser.summary(method);
        command.args = self.arguments(class, method, &attached)?;
        command.annotation_flags = flags;
        Ok(command)
    }

    /// Arguments for the explicit parameters of `method`, minus `excluded`.
    fn arguments(&self, class: &str, method: &FunctionDef, excluded: &[String]) -> Result<Vec<Argument>> {
        if self.strict && method.docstring.is_none() && method.explicit_params().next().is_some() {
            error!(class, method = %method.name, "missing docstring");
            return Err(Error::MissingDocumentation {
                class: class.to_string(),
                method: method.name.clone(),
            });
        }
        let help = self.parser.argument_help(method);

        let params = &method.parameters;
        let offset = params.args.len().saturating_sub(params.defaults.len());
        let positional = params
            .args
            .iter()
            .enumerate()
            .skip(method.receiver_count())
            .map(|(i, param)| (param, i.checked_sub(offset).and_then(|d| params.defaults.get(d))));
        let keyword = params
            .kwonly
            .iter()
            .zip(params.kw_defaults.iter().map(Option::as_ref));

        if let Some(vararg) = &params.vararg {
            debug!(method = %method.name, param = %vararg.name, "variadic parameter not exposed");
        }

        let mut arguments = Vec::new();
        for (param, default) in positional.chain(keyword) {
            if excluded.contains(&param.name) {
                debug!(method = %method.name, param = %param.name, "parameter populated by annotation");
                continue;
            }
            arguments.push(self.argument(method, param, default, &help));
        }
        Ok(arguments)
    }

    fn argument(
        &self,
        method: &FunctionDef,
        param: &Param,
        default: Option<&Expr>,
        help: &IndexMap<String, String>,
    ) -> Argument {
        let mut argument = Argument::new(&param.name);
        argument.help_text = help
            .get(&param.name)
            .cloned()
            .unwrap_or_else(|| NO_DOCUMENTATION.to_string());
        if let Some(annotation) = &param.annotation {
            let (kind, multiplicity) = typing(annotation);
            argument.kind = kind;
            argument.multiplicity = multiplicity;
        }
        if let Some(expr) = default {
            match expr.literal() {
                Some(value) => argument.default_value = Some(value),
                None => warn!(
                    method = %method.name,
                    param = %param.name,
                    default = %expr.describe(),
                    "non-literal default dropped"
                ),
            }
        }
        argument
    }
}

/// Methods of a class body in definition order; a redefinition replaces the
/// earlier method in place.
fn methods(body: &[Node]) -> IndexMap<&str, &FunctionDef> {
    let mut found = IndexMap::new();
    collect_methods(body, &mut found);
    found
}

fn collect_methods<'a>(body: &'a [Node], found: &mut IndexMap<&'a str, &'a FunctionDef>) {
    for node in body {
        match node {
            Node::FunctionDef(function) => {
                found.insert(function.name.as_str(), function);
            }
            Node::Compound(nested) => collect_methods(nested, found),
            _ => {}
        }
    }
}

/// Scalar type and multiplicity for an annotation.
fn typing(annotation: &TypeExpr) -> (Option<TypeTag>, Option<Multiplicity>) {
    match annotation {
        TypeExpr::Name(_) => {
            let base = annotation.base_name().unwrap_or_default();
            if SEQUENCE_TYPES.contains(&base) {
                (None, Some(Multiplicity::List))
            } else {
                (TypeTag::from_name(base), None)
            }
        }
        TypeExpr::Subscript { args, .. } => match annotation.base_name() {
            Some("Optional") => args.first().map_or((None, None), typing),
            Some(base) if SEQUENCE_TYPES.contains(&base) => {
                let item = args.first().and_then(TypeExpr::base_name).and_then(TypeTag::from_name);
                (item, Some(Multiplicity::List))
            }
            _ => (None, None),
        },
        TypeExpr::Other(text) => {
            debug!(annotation = %text, "annotation not mapped to a type");
            (None, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Literal;

    const CALCULATOR: &str = r#"
class Calculator:
    """Simple arithmetic."""

    def __init__(self):
        pass

    def add(self, a: float, b: float):
        """Returns the sum of two numbers.

        Args:
            a (float): first operand
            b (float): second operand
        """
        return a + b

    def subtract(self, a, b):
        return a - b

    def _helper(self):
        pass

    def __repr__(self):
        return "Calculator"
"#;

    fn extract(src: &str) -> ModuleCollection {
        let tree = SyntaxTree::parse(src, "calc.py").unwrap();
        let mut extractor = Extractor::new(Convention::Google);
        extractor.extract(&tree, "calc.py").unwrap();
        extractor.into_modules()
    }

    #[test]
    fn calculator_scenario() {
        let modules = extract(CALCULATOR);
        assert_eq!(modules.len(), 1);
        let module = &modules.modules[0];
        assert_eq!(module.name, "Calculator");
        assert_eq!(module.help_text, "Simple arithmetic.");
        assert_eq!(module.location, "calc.py");
        assert!(module.args.is_empty());

        let names: Vec<_> = module.commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["add", "subtract"]);

        let add = &module.commands[0];
        assert_eq!(add.help_text, "Returns the sum of two numbers.");
        assert_eq!(add.args.len(), 2);
        assert!(add.args.iter().all(|a| a.kind == Some(TypeTag::Float)));
        assert_eq!(add.args[0].help_text, "first operand");

        let subtract = &module.commands[1];
        assert_eq!(subtract.help_text, NO_DOCUMENTATION);
        assert!(subtract.args.iter().all(|a| a.help_text == NO_DOCUMENTATION));
        assert!(subtract.args.iter().all(|a| a.kind.is_none()));
    }

    #[test]
    fn constructor_args_and_trailing_defaults() {
        let modules = extract(
            "class Shop:\n    def __init__(self, owner: str, city='Berlin'):\n        pass\n\n    def buy(self, item: str, count: int = 1, rush: bool = False, *, note=None):\n        pass\n",
        );
        let module = &modules.modules[0];
        assert_eq!(module.help_text, "");
        assert_eq!(module.args[0].default_value, None);
        assert_eq!(
            module.args[1].default_value,
            Some(Literal::Str("Berlin".into()))
        );

        let buy = &module.commands[0].args;
        let defaults: Vec<_> = buy.iter().map(|a| a.default_value.clone()).collect();
        assert_eq!(
            defaults,
            [
                None,
                Some(Literal::Int(1)),
                Some(Literal::Bool(false)),
                Some(Literal::None)
            ]
        );
        assert_eq!(buy[2].kind, Some(TypeTag::Bool));
    }

    #[test]
    fn list_and_optional_annotations() {
        let modules = extract(
            "from typing import List, Optional\n\nclass Job:\n    def run(self, files: List[str], tags: list[int], limit: Optional[int] = None, raw: list = None):\n        pass\n",
        );
        let args = &modules.modules[0].commands[0].args;
        assert_eq!(args[0].kind, Some(TypeTag::Str));
        assert!(args[0].is_list());
        assert_eq!(args[1].kind, Some(TypeTag::Int));
        assert!(args[1].is_list());
        assert_eq!(args[2].kind, Some(TypeTag::Int));
        assert!(!args[2].is_list());
        assert_eq!(args[3].kind, None);
        assert!(args[3].is_list());
    }

    #[test]
    fn static_methods_keep_their_first_parameter() {
        let modules = extract(
            "class M:\n    @staticmethod\n    def scale(x: int, factor: int = 2):\n        pass\n",
        );
        let args = &modules.modules[0].commands[0].args;
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].destination, "x");
        assert_eq!(args[1].default_value, Some(Literal::Int(2)));
    }

    #[test]
    fn hydra_parameter_is_excluded() {
        let modules = extract(
            "from argsmith.decorator import add_hydra\n\nclass Trainer:\n    @add_hydra('cfg', config_path='conf')\n    def train(self, cfg, epochs: int = 3):\n        pass\n",
        );
        let train = &modules.modules[0].commands[0];
        assert_eq!(train.annotation_flags.len(), 1);
        let names: Vec<_> = train.args.iter().map(|a| a.destination.as_str()).collect();
        assert_eq!(names, ["epochs"]);
    }

    #[test]
    fn later_shadowing_does_not_hide_the_marker() {
        let modules = extract(
            "from argsmith import add_hydra\n\nclass Trainer:\n    @add_hydra('cfg')\n    def train(self, cfg, epochs: int = 3):\n        pass\n\ndef add_hydra(name):\n    return name\n",
        );
        let train = &modules.modules[0].commands[0];
        assert_eq!(train.annotation_flags.len(), 1);
        let names: Vec<_> = train.args.iter().map(|a| a.destination.as_str()).collect();
        assert_eq!(names, ["epochs"]);
    }

    #[test]
    fn later_import_does_not_turn_a_local_into_a_marker() {
        let modules = extract(
            "def add_hydra(name):\n    return lambda f: f\n\nclass Trainer:\n    @add_hydra('cfg')\n    def train(self, cfg):\n        pass\n\nfrom argsmith.decorator import add_hydra\n",
        );
        let train = &modules.modules[0].commands[0];
        assert!(train.annotation_flags.is_empty());
        let names: Vec<_> = train.args.iter().map(|a| a.destination.as_str()).collect();
        assert_eq!(names, ["cfg"]);
    }

    #[test]
    fn nested_classes_are_not_modules() {
        let modules = extract(
            "class Outer:\n    class Inner:\n        def hidden(self):\n            pass\n\n    def visible(self):\n        pass\n\ndef factory():\n    class Built:\n        def go(self):\n            pass\n    return Built\n",
        );
        assert_eq!(modules.names(), ["Outer", "Built"]);
        assert_eq!(modules.modules[0].commands.len(), 1);
    }

    #[test]
    fn redefined_methods_keep_their_position() {
        let modules = extract(
            "class P:\n    def a(self):\n        pass\n    def b(self):\n        pass\n    def a(self, x):\n        pass\n",
        );
        let commands = &modules.modules[0].commands;
        assert_eq!(commands[0].name, "a");
        assert_eq!(commands[0].args.len(), 1);
        assert_eq!(commands[1].name, "b");
    }

    #[test]
    fn non_literal_defaults_are_dropped() {
        let modules = extract("LIMIT = 3\n\nclass Q:\n    def go(self, n=LIMIT):\n        pass\n");
        assert_eq!(modules.modules[0].commands[0].args[0].default_value, None);
    }

    #[test]
    fn strict_mode_rejects_undocumented_methods() {
        let tree = SyntaxTree::parse(CALCULATOR, "calc.py").unwrap();
        let mut extractor = Extractor::new(Convention::Google).strict(true);
        let err = extractor.extract(&tree, "calc.py").unwrap_err();
        match err {
            Error::MissingDocumentation { class, method } => {
                assert_eq!(class, "Calculator");
                assert_eq!(method, "subtract");
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(extractor.modules().is_empty());
    }

    #[test]
    fn extraction_accumulates_across_files() {
        let first = SyntaxTree::parse("class A:\n    def x(self):\n        pass\n", "a.py").unwrap();
        let second = SyntaxTree::parse("class B:\n    def y(self):\n        pass\n", "b.py").unwrap();
        let mut extractor = Extractor::new(Convention::Rest);
        extractor.extract(&first, "a.py").unwrap();
        let modules = extractor.extract(&second, "b.py").unwrap();
        assert_eq!(modules.locations(), [("A", "a.py"), ("B", "b.py")]);
    }
}
