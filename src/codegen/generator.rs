//! Synthesis of the argparse front-end from the IR.
//!
//! Two files come out of a run. The setup file holds one `add_*_args` helper
//! per command, one `setup_<module>_parser` per module, and `setup_parser`.
//! The entry point holds the imports, `execute` (a dispatcher over the parsed
//! arguments), `create_parser`, and `main`.
//!
//! With one module the commands sit directly under the top-level parser. With
//! several, each module gets its own subparser and `execute` matches on the
//! module before the command. Output order follows IR order, so a given IR
//! always produces the same text.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, info, warn};

use super::block::Block;
use super::builders::{Case, Function, MatchCase, Pattern};
use super::python::{call_args, py_literal, py_str};
use crate::annotation::{ADD_HYDRA, DEFAULT_NAMESPACE};
use crate::error::{Error, Result};
use crate::model::{Argument, Command, Literal, Module, ModuleCollection, TypeTag};

const ARGPARSE_IMPORT: &str = "from argparse import ArgumentParser";
const PARSER_PARAM: &[(&str, &str)] = &[("parser", "ArgumentParser")];
const PARSER_TYPE: Option<&str> = Some("ArgumentParser");

/// `add_<infix>_args(parser)`: one `add_argument` call per argument.
pub struct AddArguments {
    function: Function,
}

impl AddArguments {
    pub fn new(infix: &str, arguments: &[Argument]) -> Result<Self> {
        check_identifier(infix)?;
        let mut function = Function::new(format!("add_{infix}_args"), PARSER_PARAM, PARSER_TYPE);
        for argument in arguments {
            function.append_line(format!("parser.add_argument({})", argument_options(argument)));
        }
        function.append_line("return parser");
        Ok(Self { function })
    }

    pub fn name(&self) -> &str {
        self.function.name()
    }

    pub fn into_block(self) -> Block {
        self.function.into_block()
    }
}

/// `setup_<module>_parser(parser)`: registers one subcommand per command.
pub struct SetupCommandParser {
    function: Function,
    module: String,
    imports: Vec<String>,
}

impl SetupCommandParser {
    /// `imports` are emitted above the helpers; pass none to leave them out.
    pub fn new(module_name: &str, imports: Vec<String>) -> Result<Self> {
        let module = module_name.to_lowercase();
        check_identifier(&module)?;
        let function = Function::new(format!("setup_{module}_parser"), PARSER_PARAM, PARSER_TYPE);
        Ok(Self {
            function,
            module,
            imports,
        })
    }

    pub fn name(&self) -> &str {
        self.function.name()
    }

    pub fn generate_code(&mut self, commands: &[Command]) -> Result<()> {
        self.function
            .append_line("command_subparser = parser.add_subparsers(dest='command', title='command')");

        // helpers go above this function, in command order
        let mut position = 0;
        for command in commands {
            let var = variable_name(&command.name);
            let add_args = AddArguments::new(&format!("{}_{var}", self.module), &command.args)?;
            let parser_var = format!("{var}_parser");

            self.function.append_line(format!(
                "{parser_var} = command_subparser.add_parser({}, help={})",
                py_str(&command_name(&command.name)),
                help(&command.help_text)
            ));
            self.function
                .append_line(format!("{parser_var} = {}({parser_var})", add_args.name()));
            if command.flag(ADD_HYDRA).is_some() {
                self.function
                    .append_line(format!("{parser_var} = add_hydra_parser({parser_var})"));
            }

            let helper = spaced(add_args.into_block());
            let inserted = helper.len();
            self.function.insert(helper, position);
            position += inserted;
        }
        self.function.append_line("return parser");

        if !self.imports.is_empty() {
            self.function.insert(spaced(import_block(&self.imports)), 0);
        }
        Ok(())
    }

    pub fn into_block(self) -> Block {
        self.function.into_block()
    }
}

/// `setup_parser(parser)`: the function the entry point calls.
pub struct SetupParser {
    function: Function,
    runtime: String,
}

impl SetupParser {
    /// `runtime` is the Python package providing `add_hydra_parser`.
    pub fn new(runtime: &str) -> Self {
        Self {
            function: Function::new("setup_parser", PARSER_PARAM, PARSER_TYPE),
            runtime: runtime.to_string(),
        }
    }

    pub fn generate_code(&mut self, modules: &ModuleCollection) -> Result<()> {
        let mut imports = vec![ARGPARSE_IMPORT.to_string()];
        if uses_hydra(modules) {
            imports.push(format!("from {}.api.hydra import add_hydra_parser", self.runtime));
        }

        match modules.modules.as_slice() {
            [] => {
                info!("no modules given, setup_parser registers nothing");
                self.function.append_line("return parser");
                self.function.insert(spaced(import_block(&imports)), 0);
            }
            [module] => {
                let module = with_inherited_args(module);
                let mut setup = SetupCommandParser::new(&module.name, imports)?;
                setup.generate_code(&module.commands)?;
                self.function
                    .append_line(format!("parser = {}(parser)", setup.name()));
                self.function.append_line("return parser");
                self.function.insert(spaced(setup.into_block()), 0);
            }
            modules => {
                self.function
                    .append_line("module_subparser = parser.add_subparsers(dest='module', title='module')");
                let mut position = 0;
                for module in modules {
                    let module = with_inherited_args(module);
                    let var = format!("{}_parser", module.name.to_lowercase());
                    self.function.append_line(format!(
                        "{var} = module_subparser.add_parser(name={}, help={})",
                        py_str(&module.name),
                        help(&module.help_text)
                    ));

                    // only the first builder carries the shared imports
                    let mut setup = SetupCommandParser::new(&module.name, std::mem::take(&mut imports))?;
                    setup.generate_code(&module.commands)?;
                    self.function
                        .append_line(format!("{var} = {}({var})", setup.name()));

                    let block = spaced(setup.into_block());
                    let inserted = block.len();
                    self.function.insert(block, position);
                    position += inserted;
                }
                self.function.append_line("return parser");
            }
        }
        Ok(())
    }

    pub fn into_block(self) -> Block {
        self.function.into_block()
    }
}

/// `create_parser()`: builds the top-level `ArgumentParser`.
pub struct CreateParser {
    function: Function,
}

impl Default for CreateParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CreateParser {
    pub fn new() -> Self {
        Self {
            function: Function::new("create_parser", &[], PARSER_TYPE),
        }
    }

    pub fn generate_code(&mut self, modules: &ModuleCollection) {
        let description = match modules.modules.as_slice() {
            [] => String::new(),
            [module] => module.help_text.clone(),
            _ => format!(
                "Command-line interface for python modules: {}",
                modules.names().join(", ")
            ),
        };
        self.function.append_line(format!(
            "parser = ArgumentParser(description={})",
            help(&description)
        ));
        self.function.append_line("parser = setup_parser(parser)");
        self.function.append_line("return parser");
    }

    pub fn into_block(self) -> Block {
        self.function.into_block()
    }
}

/// `execute(args)`: calls the selected method, `False` when nothing matched.
///
/// The module is only constructed inside a command arm, so a missing command
/// reaches the fallback before any constructor argument is read.
pub struct Execute {
    function: Function,
    runtime: String,
}

impl Execute {
    pub fn new(runtime: &str) -> Self {
        Self {
            function: Function::new("execute", &[("args", "dict")], Some("bool")),
            runtime: runtime.to_string(),
        }
    }

    /// `parser_file` is where the setup file will be written; it is imported
    /// through `resolver` like the modules are.
    pub fn generate_code(
        &mut self,
        modules: &ModuleCollection,
        resolver: &ImportResolver,
        parser_file: &Path,
    ) {
        match modules.modules.as_slice() {
            [] => error!("no modules to dispatch to"),
            [module] => {
                self.function.append(command_match(module));
            }
            modules => {
                let mut cases: Vec<Case> = modules
                    .iter()
                    .map(|module| Case::new(Pattern::Str(module.name.clone()), command_match(module)))
                    .collect();
                cases.push(Case::default_case("return False"));
                self.function
                    .append(MatchCase::new("args['module']", cases));
            }
        }
        self.function.append_line("return True");

        let mut imports = Block::single(ARGPARSE_IMPORT);
        for (name, location) in modules.locations() {
            let line = format!("from {} import {name}", resolver.module_path(location));
            if !imports.contains(&line) {
                imports.append_line(line);
            }
        }
        let parser_module = resolver.module_path(&parser_file.to_string_lossy());
        imports.append_line(format!("from {parser_module} import setup_parser"));
        if uses_hydra(modules) {
            imports.append_line(format!("from {}.api.hydra import hydra_wrapper", self.runtime));
        }
        self.function.insert(spaced(imports), 0);
        self.function.set_cursor(0);
    }

    pub fn into_block(self) -> Block {
        self.function.into_block()
    }
}

/// `main()`: parse, dispatch, print usage when nothing ran.
pub struct MainFunc {
    function: Function,
}

impl Default for MainFunc {
    fn default() -> Self {
        Self::new()
    }
}

impl MainFunc {
    pub fn new() -> Self {
        Self {
            function: Function::new("main", &[], None),
        }
    }

    pub fn generate_code(&mut self) {
        self.function
            .append_line("parser = create_parser()")
            .append_line("args = parser.parse_args()")
            .append_line("args_dict = vars(args)")
            .append_line("if not execute(args_dict):")
            .indent()
            .append_line("parser.print_usage()")
            .dedent()
            .dedent();
    }

    pub fn into_block(self) -> Block {
        self.function.into_block()
    }
}

/// The `if __name__ == '__main__':` guard.
pub struct MainCaller;

impl MainCaller {
    pub fn to_block(&self) -> Block {
        let mut block = Block::single("if __name__ == '__main__':");
        block.indent().append_line("main()");
        block
    }
}

/// The two generated files.
#[derive(Debug, Clone)]
pub struct GeneratedCode {
    pub setup_parser: Block,
    pub entry_point: Block,
}

/// Turns a [`ModuleCollection`] into [`GeneratedCode`].
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    resolver: ImportResolver,
    runtime: String,
}

impl CodeGenerator {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            resolver: ImportResolver::new(project_root),
            runtime: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Python package the generated code imports its runtime helpers from.
    pub fn with_runtime_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.runtime = namespace.into();
        self
    }

    /// Synthesize both files; `parser_file` is where the setup file will live.
    pub fn generate(&self, modules: &ModuleCollection, parser_file: &Path) -> Result<GeneratedCode> {
        debug!(modules = modules.len(), parser_file = %parser_file.display(), "generating code");
        let mut seen = HashSet::new();
        for name in modules.names() {
            if !seen.insert(name.to_lowercase()) {
                warn!(module = name, "duplicate module name, generated functions will collide");
            }
        }

        let mut setup = SetupParser::new(&self.runtime);
        setup.generate_code(modules)?;

        let mut execute = Execute::new(&self.runtime);
        execute.generate_code(modules, &self.resolver, parser_file);
        let mut create = CreateParser::new();
        create.generate_code(modules);

        let mut entry = execute.into_block();
        separate(&mut entry).append(create.into_block());

        let mut main = MainFunc::new();
        main.generate_code();
        let mut entry_point = main.into_block();
        entry_point.insert(spaced(entry), 0);
        separate(&mut entry_point).append(MainCaller.to_block());

        Ok(GeneratedCode {
            setup_parser: setup.into_block(),
            entry_point,
        })
    }
}

/// Maps file locations onto dotted Python module paths under a project root.
#[derive(Debug, Clone)]
pub struct ImportResolver {
    project_root: PathBuf,
}

impl ImportResolver {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// `pkg/calc.py` becomes `pkg.calc`. Locations under the project root are
    /// made relative to it first.
    pub fn module_path(&self, location: &str) -> String {
        let path = Path::new(location);
        let relative = path.strip_prefix(&self.project_root).unwrap_or(path);
        let mut parts: Vec<String> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if let Some(last) = parts.last_mut() {
            if let Some(stem) = last.strip_suffix(".py") {
                *last = stem.to_string();
            }
        }
        parts.join(".")
    }
}

/// Internal names must be lowercase and free of whitespace and hyphens.
fn check_identifier(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name.contains(char::is_whitespace) {
        "whitespace is not allowed"
    } else if name.contains('-') {
        "'-' is not allowed"
    } else if name != name.to_lowercase() {
        "must be lowercase"
    } else {
        return Ok(());
    };
    Err(Error::IdentifierFormat {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// Keyword options of one `add_argument` call.
fn argument_options(argument: &Argument) -> String {
    let mut options = vec![
        py_str(&format!("--{}", argument.name)),
        format!("dest={}", py_str(&argument.destination)),
    ];

    let switch = argument.kind == Some(TypeTag::Bool)
        || (argument.kind.is_none() && matches!(argument.default_value, Some(Literal::Bool(_))));
    if switch {
        let action = match argument.default_value {
            Some(Literal::Bool(true)) => "store_false",
            _ => "store_true",
        };
        options.push(format!("action={}", py_str(action)));
    } else {
        if let Some(kind) = argument.kind {
            options.push(format!("type={}", kind.as_str()));
        }
        if argument.is_list() {
            options.push("nargs='+'".to_string());
        }
    }

    options.push(format!("help={}", help(&argument.help_text)));

    if !switch {
        match &argument.default_value {
            None => options.push("required=True".to_string()),
            Some(Literal::None) => {}
            Some(value) => options.push(format!("default={}", py_literal(value))),
        }
    }
    options.join(", ")
}

/// `match args['command']` over the commands of `module` with a `return False`
/// fallback. Each arm builds the instance before calling into it.
fn command_match(module: &Module) -> MatchCase {
    let mut cases: Vec<Case> = module
        .commands
        .iter()
        .map(|command| {
            let mut body = Block::single(instantiate(module));
            body.append_line(invocation(command));
            Case::new(Pattern::Str(command_name(&command.name)), body)
        })
        .collect();
    cases.push(Case::default_case("return False"));
    MatchCase::new("args['command']", cases)
}

/// Call of the method behind `command` on the `module` instance.
fn invocation(command: &Command) -> String {
    let Some(flag) = command.flag(ADD_HYDRA) else {
        return format!("module.{}({})", command.name, call_args(&command.args));
    };
    let mut parts = vec![
        format!("module.{}", command.name),
        "args".to_string(),
        "create_parser()".to_string(),
    ];
    parts.extend(
        flag.values
            .iter()
            .map(|(key, value)| format!("{key}={}", py_literal(value))),
    );
    format!("hydra_wrapper({})", parts.join(", "))
}

fn instantiate(module: &Module) -> String {
    format!("module = {}({})", module.name, call_args(&module.args))
}

fn with_inherited_args(module: &Module) -> Module {
    let mut module = module.clone();
    module.inherit_args();
    module
}

fn uses_hydra(modules: &ModuleCollection) -> bool {
    modules
        .iter()
        .flat_map(|module| &module.commands)
        .any(|command| command.flag(ADD_HYDRA).is_some())
}

fn variable_name(name: &str) -> String {
    name.replace('-', "_").to_lowercase()
}

/// Subcommand name as typed on the command line.
fn command_name(name: &str) -> String {
    name.replace('_', "-")
}

/// Help strings pass through %-formatting in argparse.
fn help(text: &str) -> String {
    py_str(&text.replace('%', "%%"))
}

fn import_block(imports: &[String]) -> Block {
    let mut block = Block::new();
    for line in imports {
        block.append_line(line.as_str());
    }
    block
}

/// Two blank lines after a top-level definition.
fn separate(block: &mut Block) -> &mut Block {
    block.blank_line().blank_line()
}

fn spaced(mut block: Block) -> Block {
    separate(&mut block);
    block
}
