//! Annotation markers: which decorators belong to argsmith, and what they say.
//!
//! A decorator only counts as a marker when its callee resolves, through the
//! file's own imports, into the marker namespace. A same-named function
//! defined locally or imported from another package is ignored.

use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::Error;
use crate::model::{AnnotationFlag, Literal};
use crate::syntax::{Expr, FunctionDef, Node};

/// Marker that hands one parameter over to an external configuration loader.
pub const ADD_HYDRA: &str = "add_hydra";

/// Python package user code imports markers from.
pub const DEFAULT_NAMESPACE: &str = "argsmith";

/// Declared parameters of one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub name: String,
    /// Parameters in declaration order with their default values
    pub params: IndexMap<String, Literal>,
    /// Parameter whose value names a method argument the marker populates
    pub attach_param: Option<String>,
}

/// Static registry of the markers a namespace provides.
#[derive(Debug, Clone)]
pub struct MarkerRegistry {
    namespace: String,
    markers: IndexMap<String, MarkerSpec>,
}

impl Default for MarkerRegistry {
    fn default() -> Self {
        Self::builtin(DEFAULT_NAMESPACE)
    }
}

impl MarkerRegistry {
    /// Registry holding the built-in markers under `namespace`.
    pub fn builtin(namespace: &str) -> Self {
        let hydra = MarkerSpec {
            name: ADD_HYDRA.to_string(),
            params: IndexMap::from([
                ("config_var_name".to_string(), Literal::Str("cfg".to_string())),
                ("version_base".to_string(), Literal::None),
                ("config_path".to_string(), Literal::None),
                ("config_name".to_string(), Literal::None),
            ]),
            attach_param: Some("config_var_name".to_string()),
        };
        Self {
            namespace: namespace.to_string(),
            markers: IndexMap::from([(hydra.name.clone(), hydra)]),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get(&self, name: &str) -> Option<&MarkerSpec> {
        self.markers.get(name)
    }

    /// Marker for a fully qualified callee, `argsmith.decorator.add_hydra` or
    /// the package-level re-export `argsmith.add_hydra`.
    pub fn lookup(&self, qualified: &str) -> Option<&MarkerSpec> {
        let rest = qualified
            .strip_prefix(self.namespace.as_str())?
            .strip_prefix('.')?;
        let name = rest.strip_prefix("decorator.").unwrap_or(rest);
        self.markers.get(name)
    }

    /// Whether `module` is a namespace module that exports markers.
    fn exports(&self, module: &str) -> bool {
        module == self.namespace || module == format!("{}.decorator", self.namespace)
    }

    /// Argument names populated by the markers in `flags` instead of by flags.
    pub fn attached_params(&self, flags: &[AnnotationFlag]) -> Vec<String> {
        flags
            .iter()
            .filter_map(|flag| {
                let spec = self.markers.get(&flag.name)?;
                let key = spec.attach_param.as_deref()?;
                flag.value(key)?.as_str().map(str::to_string)
            })
            .collect()
    }
}

/// Local names bound at module level, mapped to what they refer to.
///
/// Built statement by statement, so a map taken partway through a module
/// reflects the bindings in effect at that point.
#[derive(Debug, Clone, Default)]
pub struct ImportMap {
    /// Local name → qualified origin; `None` for local definitions
    bindings: HashMap<String, Option<String>>,
    wildcards: Vec<String>,
}

impl ImportMap {
    /// Apply the bindings one statement makes. Later bindings replace earlier ones.
    pub fn record(&mut self, node: &Node) {
        match node {
            Node::Import(aliases) => {
                for alias in aliases {
                    match &alias.asname {
                        Some(local) => self.bind(local, Some(alias.name.clone())),
                        None => {
                            let head = alias.name.split('.').next().unwrap_or(&alias.name);
                            self.bind(head, Some(head.to_string()));
                        }
                    }
                }
            }
            Node::ImportFrom(from) => {
                if from.wildcard {
                    self.wildcards.push(from.module.clone());
                }
                for alias in &from.names {
                    let local = alias.asname.as_deref().unwrap_or(&alias.name);
                    self.bind(local, Some(format!("{}.{}", from.module, alias.name)));
                }
            }
            Node::ClassDef(class) => self.bind(&class.name, None),
            Node::FunctionDef(function) => self.bind(&function.name, None),
            Node::Assign(assign) => {
                for target in &assign.targets {
                    self.bind(target, None);
                }
            }
            Node::Compound(nested) => {
                for node in nested {
                    self.record(node);
                }
            }
            Node::Other => {}
        }
    }

    fn bind(&mut self, local: &str, origin: Option<String>) {
        self.bindings.insert(local.to_string(), origin);
    }

    /// Qualified name of a dotted reference, following the head through imports.
    pub fn qualify(&self, dotted: &str) -> Option<String> {
        let (head, rest) = match dotted.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (dotted, None),
        };
        let origin = self.bindings.get(head)?.as_ref()?;
        Some(match rest {
            Some(rest) => format!("{origin}.{rest}"),
            None => origin.clone(),
        })
    }

    fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}

/// Materialize the markers decorating `function`.
///
/// Decorators with arguments that cannot be evaluated statically are logged
/// and skipped.
pub fn resolve_annotations(
    function: &FunctionDef,
    imports: &ImportMap,
    registry: &MarkerRegistry,
) -> Vec<AnnotationFlag> {
    function
        .decorators
        .iter()
        .filter_map(|decorator| {
            let spec = marker_for(decorator, imports, registry)?;
            match materialize(spec, decorator, &function.name) {
                Ok(flag) => Some(flag),
                Err(err) => {
                    warn!(%err, "ignoring annotation");
                    None
                }
            }
        })
        .collect()
}

fn marker_for<'r>(
    decorator: &Expr,
    imports: &ImportMap,
    registry: &'r MarkerRegistry,
) -> Option<&'r MarkerSpec> {
    let callee = match decorator {
        Expr::Call { func, .. } => func.as_ref(),
        other => other,
    };
    let dotted = callee.dotted()?;

    if let Some(qualified) = imports.qualify(&dotted) {
        return registry.lookup(&qualified);
    }

    // `from argsmith.decorator import *` brings unbound marker names in
    if !dotted.contains('.') && !imports.is_bound(&dotted) {
        let via_wildcard = imports.wildcards.iter().any(|m| registry.exports(m));
        if via_wildcard {
            return registry.get(&dotted);
        }
    }
    debug!(
        decorator = %dotted,
        namespace = registry.namespace(),
        "decorator is not a marker"
    );
    None
}

fn materialize(spec: &MarkerSpec, decorator: &Expr, method: &str) -> Result<AnnotationFlag, Error> {
    let mut values = spec.params.clone();
    let unresolved = |reason: String| Error::UnresolvedAnnotation {
        marker: spec.name.clone(),
        method: method.to_string(),
        reason,
    };

    if let Expr::Call { args, keywords, .. } = decorator {
        if args.len() > spec.params.len() {
            return Err(unresolved(format!(
                "takes at most {} positional arguments, got {}",
                spec.params.len(),
                args.len()
            )));
        }
        let positional = spec.params.keys().zip(args);
        let named = keywords.iter().map(|(key, value)| (key, value));
        for (key, expr) in positional.chain(named) {
            if !spec.params.contains_key(key) {
                return Err(unresolved(format!("unexpected keyword argument '{key}'")));
            }
            let value = expr
                .literal()
                .ok_or_else(|| unresolved(format!("'{}' is not a literal", expr.describe())))?;
            values.insert(key.clone(), value);
        }
    }

    Ok(AnnotationFlag {
        name: spec.name.clone(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SyntaxTree;

    fn flags_of(src: &str) -> Vec<AnnotationFlag> {
        let tree = SyntaxTree::parse(src, "markers.py").unwrap();
        let mut imports = ImportMap::default();
        for node in &tree.body {
            imports.record(node);
        }
        let registry = MarkerRegistry::default();
        let class = tree
            .body
            .iter()
            .find_map(|n| match n {
                Node::ClassDef(c) => Some(c),
                _ => None,
            })
            .unwrap();
        class
            .body
            .iter()
            .filter_map(|n| match n {
                Node::FunctionDef(f) => Some(resolve_annotations(f, &imports, &registry)),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn locally_defined_marker_is_ignored() {
        let flags = flags_of(
            "def add_hydra(*a, **k):\n    return lambda f: f\n\nclass A:\n    @add_hydra('cfg')\n    def run(self, cfg):\n        pass\n",
        );
        assert!(flags.is_empty());
    }

    #[test]
    fn imported_marker_is_resolved() {
        let flags = flags_of(
            "from argsmith.decorator import add_hydra\n\nclass A:\n    @add_hydra('conf', config_name='main')\n    def run(self, conf):\n        pass\n",
        );
        assert_eq!(flags.len(), 1);
        let flag = &flags[0];
        assert_eq!(flag.name, ADD_HYDRA);
        assert_eq!(flag.value("config_var_name"), Some(&Literal::Str("conf".into())));
        assert_eq!(flag.value("config_name"), Some(&Literal::Str("main".into())));
        assert_eq!(flag.value("config_path"), Some(&Literal::None));
        let keys: Vec<_> = flag.values.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["config_var_name", "version_base", "config_path", "config_name"]
        );
    }

    #[test]
    fn same_name_from_other_package_is_ignored() {
        let flags = flags_of(
            "from other.tools import add_hydra\n\nclass A:\n    @add_hydra()\n    def run(self, cfg):\n        pass\n",
        );
        assert!(flags.is_empty());
    }

    #[test]
    fn module_and_alias_imports_resolve() {
        let flags = flags_of(
            "import argsmith\nimport argsmith.decorator as deco\n\nclass A:\n    @argsmith.decorator.add_hydra()\n    def one(self, cfg):\n        pass\n\n    @deco.add_hydra\n    def two(self, cfg):\n        pass\n",
        );
        assert_eq!(flags.len(), 2);
        assert!(flags
            .iter()
            .all(|f| f.value("config_var_name") == Some(&Literal::Str("cfg".into()))));
    }

    #[test]
    fn wildcard_import_resolves_unbound_names() {
        let flags = flags_of(
            "from argsmith.decorator import *\n\nclass A:\n    @add_hydra(config_path='conf')\n    def run(self, cfg):\n        pass\n",
        );
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].value("config_path"), Some(&Literal::Str("conf".into())));
    }

    #[test]
    fn non_literal_arguments_drop_the_flag() {
        let flags = flags_of(
            "from argsmith.decorator import add_hydra\nNAME = 'cfg'\n\nclass A:\n    @add_hydra(NAME)\n    def run(self, cfg):\n        pass\n",
        );
        assert!(flags.is_empty());
    }

    #[test]
    fn unknown_keywords_drop_the_flag() {
        let flags = flags_of(
            "from argsmith import add_hydra\n\nclass A:\n    @add_hydra(strict=True)\n    def run(self, cfg):\n        pass\n",
        );
        assert!(flags.is_empty());
    }

    #[test]
    fn attached_params_follow_the_configured_name() {
        let registry = MarkerRegistry::default();
        let flags = flags_of(
            "from argsmith.decorator import add_hydra\n\nclass A:\n    @add_hydra(config_var_name='settings')\n    def run(self, settings, n: int):\n        pass\n",
        );
        assert_eq!(registry.attached_params(&flags), ["settings"]);
    }

    #[test]
    fn custom_namespace() {
        let registry = MarkerRegistry::builtin("tools.cli");
        assert_eq!(registry.namespace(), "tools.cli");
        assert!(registry.lookup("tools.cli.decorator.add_hydra").is_some());
        assert!(registry.lookup("argsmith.decorator.add_hydra").is_none());
        assert!(registry.lookup("tools.clix.add_hydra").is_none());
    }
}
