//! Module catalog interface
//!
//! The catalog is the source of truth for what a referenced Go module
//! exports: func signatures and struct field shapes, with types reported
//! as Go type literals qualified by full import path (the form
//! `go/types` prints). The real source-inspection backend lives outside
//! this crate; resolution only sees the [`ModuleCatalog`] trait, so tests
//! run against hand-built in-memory catalogs and the CLI reads catalogs
//! from JSON files.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use serde::Deserialize;

use crate::error::{CanisterError, CanisterResult};

/// Signature of an exported func
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FuncSig {
    /// Exported name
    pub name: String,
    /// Parameter type literals; for variadic funcs the last entry is the
    /// slice form of the variadic parameter
    #[serde(default)]
    pub params: Vec<String>,
    /// Result type literals
    #[serde(default)]
    pub results: Vec<String>,
    /// Whether the last parameter is variadic
    #[serde(default)]
    pub variadic: bool,
}

/// Field shape of an exported struct
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordShape {
    /// Exported name
    pub name: String,
    /// Exported fields, name to type literal
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// Everything the generator needs to know about one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Natural package name (last identifier of the import path unless
    /// the package declares otherwise)
    pub name: String,
    /// Import path
    pub path: String,
    /// Exported funcs, keyed by name
    pub funcs: BTreeMap<String, FuncSig>,
    /// Exported structs, keyed by name
    pub records: BTreeMap<String, RecordShape>,
}

impl ModuleInfo {
    /// Create an empty module description
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            funcs: BTreeMap::new(),
            records: BTreeMap::new(),
        }
    }

    /// Add an exported func signature
    pub fn with_func(mut self, func: FuncSig) -> Self {
        self.funcs.insert(func.name.clone(), func);
        self
    }

    /// Add an exported struct shape
    pub fn with_record(mut self, record: RecordShape) -> Self {
        self.records.insert(record.name.clone(), record);
        self
    }

    /// Human-readable listing of the module's exports
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "module: {} ({})", self.name, self.path);

        let _ = writeln!(out, "  funcs:");
        for func in self.funcs.values() {
            let mut params = func.params.clone();
            if func.variadic {
                // The last entry is the slice form of the variadic
                // parameter; show it as `...elem`.
                if let Some(last) = params.last_mut() {
                    if let Some(elem) = last.strip_prefix("[]") {
                        *last = format!("...{elem}");
                    }
                }
            }
            let _ = writeln!(
                out,
                "    {}({}) ({})",
                func.name,
                params.join(", "),
                func.results.join(", ")
            );
        }

        let _ = writeln!(out, "  structs:");
        for record in self.records.values() {
            let _ = writeln!(out, "    {} {{", record.name);
            for (field, ty) in &record.fields {
                let _ = writeln!(out, "      {} {}", field, ty);
            }
            let _ = writeln!(out, "    }}");
        }

        out
    }
}

/// Source of module export information
pub trait ModuleCatalog {
    /// Look up a module by import path
    ///
    /// Fails with [`CanisterError::ModuleNotFound`] when the path is not
    /// known to the catalog.
    fn lookup(&self, path: &str) -> CanisterResult<&ModuleInfo>;
}

/// In-memory catalog, the backing store for tests and JSON files
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    modules: BTreeMap<String, ModuleInfo>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module description
    pub fn insert(&mut self, module: ModuleInfo) {
        self.modules.insert(module.path.clone(), module);
    }

    /// Builder-style [`MemoryCatalog::insert`]
    pub fn with_module(mut self, module: ModuleInfo) -> Self {
        self.insert(module);
        self
    }

    /// Iterate all known modules, sorted by path
    pub fn modules(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.modules.values()
    }
}

impl ModuleCatalog for MemoryCatalog {
    fn lookup(&self, path: &str) -> CanisterResult<&ModuleInfo> {
        self.modules
            .get(path)
            .ok_or_else(|| CanisterError::ModuleNotFound {
                module: path.to_string(),
            })
    }
}

/// Raw JSON shape of a catalog file
#[derive(Debug, Deserialize)]
struct CatalogFile {
    modules: BTreeMap<String, CatalogModule>,
}

#[derive(Debug, Deserialize)]
struct CatalogModule {
    name: Option<String>,
    #[serde(default)]
    funcs: Vec<FuncSig>,
    #[serde(default)]
    records: Vec<RecordShape>,
}

/// Load a catalog from a JSON document
///
/// Shape:
/// ```json
/// {
///   "modules": {
///     "github.com/acme/example": {
///       "name": "example",
///       "funcs": [{"name": "NewIDo", "params": [], "results": ["github.com/acme/example.Doer"]}],
///       "records": [{"name": "JustDo", "fields": {"That": "string"}}]
///     }
///   }
/// }
/// ```
///
/// A missing `name` falls back to the last path segment.
pub fn parse_catalog(source: &str) -> CanisterResult<MemoryCatalog> {
    let file: CatalogFile = serde_json::from_str(source)?;

    let mut catalog = MemoryCatalog::new();
    for (path, raw) in file.modules {
        let name = raw
            .name
            .unwrap_or_else(|| natural_module_name(&path).to_string());

        let mut module = ModuleInfo::new(path, name);
        for func in raw.funcs {
            module.funcs.insert(func.name.clone(), func);
        }
        for record in raw.records {
            module.records.insert(record.name.clone(), record);
        }
        catalog.insert(module);
    }

    Ok(catalog)
}

/// Load a catalog from a JSON file on disk
pub fn load_catalog(path: &Path) -> CanisterResult<MemoryCatalog> {
    let source = std::fs::read_to_string(path)?;
    parse_catalog(&source)
}

/// Last segment of an import path, the package's natural name
pub fn natural_module_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
