//! Definition model for a container
//!
//! The declarative, language-agnostic description parsed from YAML:
//! which Go modules are imported (and under which alias), and how each
//! service is constructed — by calling a factory func or by populating a
//! struct. Values may be constants, `@service` references, lists, or
//! field mappings, nested arbitrarily deep.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::error::{CanisterError, CanisterResult};

/// Default name for the generated container type
pub const DEFAULT_CONTAINER_NAME: &str = "Container";

/// Default Go package name for the generated file
pub const DEFAULT_CONTAINER_PACKAGE: &str = "container";

/// Default import path of the runtime support package (parameters bag)
pub const DEFAULT_RUNTIME_MODULE: &str = "github.com/canister-di/canister/runtime";

/// A parsed container definition
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ContainerDef {
    /// Name of the generated container type
    #[serde(default)]
    pub name: Option<String>,

    /// Doc comment for the container type
    #[serde(default)]
    pub docs: Option<String>,

    /// Go package the generated file belongs to
    #[serde(default)]
    pub package: Option<String>,

    /// Import path of the runtime support package
    #[serde(default)]
    pub runtime: Option<String>,

    /// Modules referenced by factory/struct declarations
    #[serde(default, alias = "packages")]
    pub modules: Vec<ModuleImport>,

    /// Services managed by the container, keyed by name
    #[serde(default)]
    pub services: BTreeMap<String, ServiceDef>,
}

impl ContainerDef {
    /// Container type name, falling back to the default
    pub fn container_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_CONTAINER_NAME)
    }

    /// Doc comment for the container type
    pub fn container_docs(&self) -> String {
        self.docs
            .clone()
            .unwrap_or_else(|| format!("{} is a container", self.container_name()))
    }

    /// Go package name for the generated file
    pub fn container_package(&self) -> &str {
        self.package.as_deref().unwrap_or(DEFAULT_CONTAINER_PACKAGE)
    }

    /// Import path of the runtime support package
    pub fn runtime_module(&self) -> &str {
        self.runtime.as_deref().unwrap_or(DEFAULT_RUNTIME_MODULE)
    }

    /// Check that every service declares exactly one construction mode
    pub fn validate(&self) -> CanisterResult<()> {
        for (name, service) in &self.services {
            service.construction().map_err(|_| {
                CanisterError::InvalidConstruction {
                    service: name.clone(),
                }
            })?;
        }
        Ok(())
    }
}

/// A module referenced by the container, with an optional import alias
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleImport {
    /// Import path, e.g. `github.com/acme/reports`
    pub path: String,
    /// Alias to import the module under, when its natural name collides
    pub alias: Option<String>,
}

impl<'de> Deserialize<'de> for ModuleImport {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_yaml_ng::Value::deserialize(deserializer)?;
        match raw {
            serde_yaml_ng::Value::String(path) => Ok(ModuleImport { path, alias: None }),
            serde_yaml_ng::Value::Mapping(map) if map.len() == 1 => {
                let (key, value) = map.into_iter().next().expect("len checked");
                match (key, value) {
                    (serde_yaml_ng::Value::String(path), serde_yaml_ng::Value::String(alias)) => {
                        Ok(ModuleImport {
                            path,
                            alias: Some(alias),
                        })
                    }
                    _ => Err(serde::de::Error::custom(
                        "module import mapping must be path: alias",
                    )),
                }
            }
            _ => Err(serde::de::Error::custom(
                "module import must be a string or a single-entry mapping of path to alias",
            )),
        }
    }
}

/// Construction mode of a service, borrowed from its definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construction<'a> {
    /// Call a factory func with ordered arguments
    Factory(&'a str),
    /// Initialize a struct with named fields
    Initialization(&'a str),
}

/// A single service declaration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDef {
    /// Factory reference, `alias.Func`
    #[serde(default)]
    pub factory: Option<String>,

    /// Ordered factory arguments
    #[serde(default)]
    pub arguments: Vec<ValueDef>,

    /// Struct reference, `alias.Type`
    #[serde(default, rename = "struct", alias = "record")]
    pub record: Option<String>,

    /// Struct field values, keyed by field name
    #[serde(default)]
    pub fields: BTreeMap<String, ValueDef>,
}

impl ServiceDef {
    /// Create a by-factory service declaration
    pub fn by_factory(factory: impl Into<String>, arguments: Vec<ValueDef>) -> Self {
        Self {
            factory: Some(factory.into()),
            arguments,
            record: None,
            fields: BTreeMap::new(),
        }
    }

    /// Create a by-initialization service declaration
    pub fn by_initialization(
        record: impl Into<String>,
        fields: BTreeMap<String, ValueDef>,
    ) -> Self {
        Self {
            factory: None,
            arguments: Vec::new(),
            record: Some(record.into()),
            fields,
        }
    }

    /// The construction mode, or `Err(())` when the declaration is ambiguous
    pub fn construction(&self) -> Result<Construction<'_>, ()> {
        match (&self.factory, &self.record) {
            (Some(factory), None) => Ok(Construction::Factory(factory)),
            (None, Some(record)) => Ok(Construction::Initialization(record)),
            _ => Err(()),
        }
    }

    /// Names of all services referenced anywhere in this declaration
    pub fn referenced_services(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        for value in self.arguments.iter().chain(self.fields.values()) {
            value.collect_service_refs(&mut refs);
        }
        refs
    }
}

/// A declared value: constant, service reference, list, or field mapping
#[derive(Debug, Clone, PartialEq)]
pub enum ValueDef {
    /// Literal scalar, typed against the binding site
    Constant(String),
    /// Reference to another service by name (`@name` in YAML)
    ServiceRef(String),
    /// Ordered sequence of values
    List(Vec<ValueDef>),
    /// Field-name to value mapping
    Record(BTreeMap<String, ValueDef>),
}

impl ValueDef {
    /// Short kind label used in binding error messages
    pub fn kind(&self) -> &'static str {
        match self {
            ValueDef::Constant(_) => "constant",
            ValueDef::ServiceRef(_) => "service reference",
            ValueDef::List(_) => "list",
            ValueDef::Record(_) => "record",
        }
    }

    fn collect_service_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ValueDef::Constant(_) => {}
            ValueDef::ServiceRef(name) => out.push(name),
            ValueDef::List(values) => {
                for value in values {
                    value.collect_service_refs(out);
                }
            }
            ValueDef::Record(fields) => {
                for value in fields.values() {
                    value.collect_service_refs(out);
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for ValueDef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_yaml_ng::Value::deserialize(deserializer)?;
        convert_value(raw).map_err(serde::de::Error::custom)
    }
}

fn convert_value(raw: serde_yaml_ng::Value) -> Result<ValueDef, String> {
    match raw {
        serde_yaml_ng::Value::String(s) => match s.strip_prefix('@') {
            Some(service) => Ok(ValueDef::ServiceRef(service.to_string())),
            None => Ok(ValueDef::Constant(s)),
        },
        serde_yaml_ng::Value::Bool(b) => Ok(ValueDef::Constant(b.to_string())),
        serde_yaml_ng::Value::Number(n) => Ok(ValueDef::Constant(n.to_string())),
        serde_yaml_ng::Value::Sequence(seq) => {
            let values = seq
                .into_iter()
                .map(convert_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ValueDef::List(values))
        }
        serde_yaml_ng::Value::Mapping(map) => {
            let mut fields = BTreeMap::new();
            for (key, value) in map {
                let serde_yaml_ng::Value::String(field) = key else {
                    return Err("record value keys must be strings".to_string());
                };
                fields.insert(field, convert_value(value)?);
            }
            Ok(ValueDef::Record(fields))
        }
        _ => Err("value must be a scalar, a sequence, or a mapping".to_string()),
    }
}

/// Parse a YAML container definition
pub fn parse_definition(source: &str) -> CanisterResult<ContainerDef> {
    let def: ContainerDef = serde_yaml_ng::from_str(source)?;
    def.validate()?;
    Ok(def)
}
