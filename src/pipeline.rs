//! The three user-facing operations: extract, synthesize, or both.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::annotation::MarkerRegistry;
use crate::codegen::CodeGenerator;
use crate::config::WriterConfig;
use crate::error::Result;
use crate::extract::Extractor;
use crate::format::{BlackFormatter, Formatter};
use crate::model::ModuleCollection;
use crate::persist::{self, ForceOverwrite, OverwriteGate, TerminalPrompt};
use crate::syntax::SyntaxTree;

/// Output path that prints the IR instead of writing it.
pub const PRINT: &str = ".";

/// Where `parse_code` sends the extracted IR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrOutput {
    /// Pretty JSON on stdout
    Print,
    /// Keep it in memory only
    Keep,
    /// Persist, format chosen by extension
    File(PathBuf),
}

impl IrOutput {
    /// `"."` prints, no path keeps, anything else is a file.
    pub fn from_arg(output: Option<&Path>) -> Self {
        match output {
            None => IrOutput::Keep,
            Some(path) if path == Path::new(PRINT) => IrOutput::Print,
            Some(path) => IrOutput::File(path.to_path_buf()),
        }
    }
}

/// Paths of the generated front-end under an output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub setup_parser: PathBuf,
    pub entry_point: PathBuf,
    pub package_marker: PathBuf,
}

impl OutputLayout {
    pub fn new(dir: &Path) -> Self {
        Self {
            setup_parser: dir.join("utils").join("parser.py"),
            entry_point: dir.join("__main__.py"),
            package_marker: dir.join("__init__.py"),
        }
    }
}

/// Drives extraction, persistence, synthesis and formatting.
pub struct ArgWriter {
    config: WriterConfig,
    gate: Box<dyn OverwriteGate>,
    formatter: Box<dyn Formatter>,
    modules: ModuleCollection,
}

impl ArgWriter {
    pub fn new(config: WriterConfig) -> Self {
        let gate: Box<dyn OverwriteGate> = if config.force {
            Box::new(ForceOverwrite)
        } else {
            Box::new(TerminalPrompt)
        };
        Self {
            config,
            gate,
            formatter: Box::new(BlackFormatter::default()),
            modules: ModuleCollection::new(),
        }
    }

    pub fn with_gate(mut self, gate: Box<dyn OverwriteGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_formatter(mut self, formatter: Box<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// IR from the last `parse_code` or `write_code`.
    pub fn modules(&self) -> &ModuleCollection {
        &self.modules
    }

    /// Extract the IR of every class in `files`.
    ///
    /// Any failing file aborts the whole run and leaves the previous IR in place.
    pub fn parse_code(&mut self, files: &[PathBuf], output: &IrOutput) -> Result<&ModuleCollection> {
        let registry = MarkerRegistry::builtin(&self.config.marker_namespace);
        let mut extractor = Extractor::new(self.config.convention)
            .strict(self.config.strict_docs)
            .with_registry(registry);
        for file in files {
            debug!(file = %file.display(), "parsing");
            let tree = SyntaxTree::from_file(file)?;
            extractor.extract(&tree, &file.to_string_lossy())?;
        }
        self.modules = extractor.into_modules();
        info!(files = files.len(), modules = self.modules.len(), "extraction finished");

        match output {
            IrOutput::Print => println!("{}", self.modules),
            IrOutput::Keep => {}
            IrOutput::File(path) => {
                persist::save_ir(&self.modules, path, self.gate.as_ref())?;
            }
        }
        Ok(&self.modules)
    }

    /// Synthesize the front-end from a persisted IR file into `output`.
    pub fn write_code(&mut self, file: &Path, output: &Path) -> Result<OutputLayout> {
        self.modules = persist::load_ir(file)?;
        info!(file = %file.display(), modules = self.modules.len(), "loaded IR");
        self.write_generated(output)
    }

    /// Extract from `files` and synthesize into `output` in one pass.
    pub fn generate_parser(&mut self, files: &[PathBuf], output: &Path) -> Result<OutputLayout> {
        self.parse_code(files, &IrOutput::Keep)?;
        self.write_generated(output)
    }

    fn write_generated(&self, output: &Path) -> Result<OutputLayout> {
        let layout = OutputLayout::new(output);
        let code = CodeGenerator::new(&self.config.project_root)
            .with_runtime_namespace(self.config.marker_namespace.as_str())
            .generate(&self.modules, &layout.setup_parser)?;

        if let Some(utils) = layout.setup_parser.parent() {
            persist::create_directory(utils)?;
        }
        let gate = self.gate.as_ref();
        code.setup_parser.write(&layout.setup_parser, gate)?;
        code.entry_point.write(&layout.entry_point, gate)?;
        persist::create_file(&layout.package_marker, "", gate)?;

        if self.config.pretty {
            info!("formatting generated code with {}", self.formatter.name());
            self.formatter
                .format(&[layout.setup_parser.clone(), layout.entry_point.clone()]);
        }
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::persist::tests::Answer;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    const CALCULATOR: &str = r#"
class Calculator:
    """A tiny calculator."""

    def add(self, a: float, b: float):
        """Returns the sum of two numbers.

        Args:
            a (float): First operand.
            b (float): Second operand.
        """
        print(f"a={a}, b={b}")

    def subtract(self, a, b):
        """Subtract b from a."""
        print(a - b)
"#;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<PathBuf>>>);

    impl Formatter for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn format(&self, files: &[PathBuf]) {
            self.0.borrow_mut().extend(files.iter().cloned());
        }
    }

    fn workspace() -> (tempfile::TempDir, PathBuf, WriterConfig) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("calc.py");
        fs::write(&source, CALCULATOR).unwrap();
        let config = WriterConfig {
            force: true,
            project_root: dir.path().to_path_buf(),
            ..WriterConfig::default()
        };
        (dir, source, config)
    }

    #[test]
    fn output_argument_conventions() {
        assert_eq!(IrOutput::from_arg(Some(Path::new("."))), IrOutput::Print);
        assert_eq!(IrOutput::from_arg(None), IrOutput::Keep);
        assert_eq!(
            IrOutput::from_arg(Some(Path::new("ir.yaml"))),
            IrOutput::File(PathBuf::from("ir.yaml"))
        );
    }

    #[test]
    fn parse_code_extracts_the_calculator() {
        let (_dir, source, config) = workspace();
        let mut writer = ArgWriter::new(config);
        let modules = writer.parse_code(&[source], &IrOutput::Keep).unwrap();

        assert_eq!(modules.names(), vec!["Calculator"]);
        let module = &modules.modules[0];
        assert_eq!(module.help_text, "A tiny calculator.");
        let commands: Vec<&str> = module.commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(commands, vec!["add", "subtract"]);
    }

    #[test]
    fn parse_then_write_round_trips_through_yaml() {
        let (dir, source, config) = workspace();
        let ir = dir.path().join("ir.yaml");
        let out = dir.path().join("cli");

        let mut writer = ArgWriter::new(config.clone());
        writer.parse_code(&[source], &IrOutput::File(ir.clone())).unwrap();
        let extracted = writer.modules().clone();

        let mut writer = ArgWriter::new(config);
        let layout = writer.write_code(&ir, &out).unwrap();
        assert_eq!(writer.modules(), &extracted);

        let main = fs::read_to_string(&layout.entry_point).unwrap();
        assert!(main.contains("from calc import Calculator\n"));
        assert!(main.contains("from cli.utils.parser import setup_parser\n"));
        assert!(fs::read_to_string(&layout.setup_parser)
            .unwrap()
            .contains("def setup_calculator_parser"));
        assert_eq!(fs::read_to_string(&layout.package_marker).unwrap(), "");
    }

    #[test]
    fn generate_parser_writes_the_layout() {
        let (dir, source, config) = workspace();
        let out = dir.path().join("cli");
        let layout = ArgWriter::new(config)
            .generate_parser(&[source], &out)
            .unwrap();
        assert_eq!(layout, OutputLayout::new(&out));
        assert!(out.join("utils/parser.py").is_file());
        assert!(out.join("__main__.py").is_file());
        assert!(out.join("__init__.py").is_file());
    }

    #[test]
    fn declined_overwrites_keep_existing_files() {
        let (dir, source, config) = workspace();
        let out = dir.path().join("cli");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("__main__.py"), "# mine\n").unwrap();

        ArgWriter::new(config)
            .with_gate(Box::new(Answer::new(false)))
            .generate_parser(&[source], &out)
            .unwrap();
        assert_eq!(fs::read_to_string(out.join("__main__.py")).unwrap(), "# mine\n");
        assert!(out.join("utils/parser.py").is_file());
    }

    #[test]
    fn pretty_runs_the_formatter_on_both_files() {
        let (dir, source, mut config) = workspace();
        config.pretty = true;
        let recorder = Recorder::default();
        let out = dir.path().join("cli");
        ArgWriter::new(config)
            .with_formatter(Box::new(recorder.clone()))
            .generate_parser(&[source], &out)
            .unwrap();
        assert_eq!(
            *recorder.0.borrow(),
            vec![out.join("utils/parser.py"), out.join("__main__.py")]
        );
    }

    #[test]
    fn failing_file_aborts_the_run() {
        let (dir, source, mut config) = workspace();
        config.strict_docs = true;
        let undocumented = dir.path().join("bare.py");
        fs::write(&undocumented, "class Bare:\n    def run(self, n):\n        pass\n").unwrap();

        let mut writer = ArgWriter::new(config);
        let result = writer.parse_code(&[source, undocumented], &IrOutput::Keep);
        assert!(matches!(result, Err(Error::MissingDocumentation { .. })));
        assert!(writer.modules().is_empty());
    }

    #[test]
    fn unknown_ir_extension_is_fatal() {
        let (dir, source, config) = workspace();
        let mut writer = ArgWriter::new(config);
        let result = writer.parse_code(&[source], &IrOutput::File(dir.path().join("ir.txt")));
        assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
    }
}
