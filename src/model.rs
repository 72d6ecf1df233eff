//! Format-agnostic intermediate representation of class-shaped APIs.
//!
//! One [`Module`] per class, one [`Command`] per public method, one
//! [`Argument`] per parameter. Every type projects symmetrically to and from a
//! JSON-shaped dictionary through [`Structure`].

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::Result;

/// Scalar type of an argument value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Int,
    Float,
    Str,
    Bool,
}

impl TypeTag {
    /// Map a Python builtin type name onto a tag.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(TypeTag::Int),
            "float" => Some(TypeTag::Float),
            "str" => Some(TypeTag::Str),
            "bool" => Some(TypeTag::Bool),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Str => "str",
            TypeTag::Bool => "bool",
        }
    }
}

/// Whether an argument takes one value or a list of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    #[default]
    Single,
    List,
}

/// A statically known value: parameter defaults and annotation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// A single parameter surfaced as a command-line flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    /// Externally visible flag form, hyphenated (`input-file`)
    pub name: String,
    /// Identifier the parsed value is stored under (`input_file`)
    #[serde(rename = "dest")]
    pub destination: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TypeTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplicity: Option<Multiplicity>,
    #[serde(rename = "help", default)]
    pub help_text: String,
    /// `Some(Literal::None)` is an explicit `None` default, `None` means no default
    #[serde(
        rename = "default",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub default_value: Option<Literal>,
}

impl Argument {
    /// Build an argument for a parameter, deriving the flag name from it.
    pub fn new(parameter: &str) -> Self {
        Self {
            name: parameter.replace('_', "-"),
            destination: parameter.to_string(),
            kind: None,
            multiplicity: None,
            help_text: String::new(),
            default_value: None,
        }
    }

    pub fn is_list(&self) -> bool {
        self.multiplicity == Some(Multiplicity::List)
    }
}

/// A field that is present deserializes to `Some`, even when it holds `null`.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Literal>, D::Error>
where
    D: Deserializer<'de>,
{
    Literal::deserialize(deserializer).map(Some)
}

/// Effective configuration of a resolved annotation marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationFlag {
    pub name: String,
    #[serde(default)]
    pub values: IndexMap<String, Literal>,
}

impl AnnotationFlag {
    pub fn value(&self, key: &str) -> Option<&Literal> {
        self.values.get(key)
    }
}

/// One invokable public method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(rename = "help", default)]
    pub help_text: String,
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotation_flags: Vec<AnnotationFlag>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help_text: String::new(),
            args: Vec::new(),
            annotation_flags: Vec::new(),
        }
    }

    pub fn flag(&self, name: &str) -> Option<&AnnotationFlag> {
        self.annotation_flags.iter().find(|f| f.name == name)
    }
}

/// One class definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(rename = "help", default)]
    pub help_text: String,
    /// Constructor parameters
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default)]
    pub commands: Vec<Command>,
    /// Source file the class was read from; import paths derive from it
    pub location: String,
}

impl Module {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help_text: String::new(),
            args: Vec::new(),
            commands: Vec::new(),
            location: location.into(),
        }
    }

    /// Copy the constructor arguments onto every command.
    pub fn inherit_args(&mut self) {
        for command in &mut self.commands {
            command.args.extend(self.args.iter().cloned());
        }
    }
}

/// Ordered collection of modules, in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleCollection {
    pub modules: Vec<Module>,
}

impl ModuleCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn push(&mut self, module: Module) {
        self.modules.push(module);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Module> {
        self.modules.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    /// `(module name, location)` pairs in collection order.
    pub fn locations(&self) -> Vec<(&str, &str)> {
        self.modules
            .iter()
            .map(|m| (m.name.as_str(), m.location.as_str()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a ModuleCollection {
    type Item = &'a Module;
    type IntoIter = std::slice::Iter<'a, Module>;

    fn into_iter(self) -> Self::IntoIter {
        self.modules.iter()
    }
}

/// Symmetric dictionary projection shared by every IR type.
pub trait Structure: Sized {
    fn to_dict(&self) -> Result<Value>;
    fn from_dict(data: &Value) -> Result<Self>;
}

impl<T> Structure for T
where
    T: IrNode + Serialize + DeserializeOwned,
{
    fn to_dict(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_dict(data: &Value) -> Result<Self> {
        Ok(T::deserialize(data)?)
    }
}

/// Marker for the types that take part in the IR projection.
pub trait IrNode {}

impl IrNode for Argument {}
impl IrNode for AnnotationFlag {}
impl IrNode for Command {}
impl IrNode for Module {}
impl IrNode for ModuleCollection {}

impl fmt::Display for ModuleCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
