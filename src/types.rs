//! Type registry
//!
//! Canonicalizes the Go type literals reported by the module catalog into
//! memoized descriptors held in an arena: registering the same literal
//! twice yields the same [`TypeId`], so later shape checks are cheap
//! identity comparisons. The registry also owns the import table, because
//! registering a named type must make its defining module importable
//! (auto-registered under its natural name when the definition did not
//! declare it).

use std::collections::HashMap;

use crate::catalog::ModuleCatalog;
use crate::error::{CanisterError, CanisterResult};

/// Identity-stable handle to a canonical type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(usize);

/// Handle to an entry in the import table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(usize);

/// Channel direction, part of the rendered type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// Canonical representation of a concrete Go type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    /// Scalar or otherwise unqualified type (`string`, `int`, `func(...)`)
    Basic { name: String },
    /// Pointer to another registered type
    Pointer { elem: TypeId },
    /// Named type whose module catalog lists it as a struct
    Record { module: ModuleId, name: String },
    /// Named type with no struct shape in the catalog (interface or opaque)
    Interface { module: ModuleId, name: String },
    /// Fixed-size array
    Array { len: u64, elem: TypeId },
    /// Slice
    Slice { elem: TypeId },
    /// Map
    Map { key: TypeId, elem: TypeId },
    /// Channel
    Chan { dir: ChanDir, elem: TypeId },
}

/// One entry in the import table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    /// Import path
    pub path: String,
    /// Natural package name
    pub name: String,
    /// Alias from the definition, when present
    pub alias: Option<String>,
}

impl ModuleEntry {
    /// The name code refers to the module by: alias if given, else the
    /// natural name. Unique across the import table.
    pub fn unique_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Arena of canonical type descriptors plus the import table
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    interned: HashMap<String, TypeId>,
    modules: Vec<ModuleEntry>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module import
    ///
    /// `alias: None` is idempotent on the path (used by named-type
    /// auto-registration); an explicit re-import of a known path is an
    /// error, as is any usable-name collision.
    pub fn register_module(
        &mut self,
        path: &str,
        alias: Option<&str>,
        catalog: &dyn ModuleCatalog,
    ) -> CanisterResult<ModuleId> {
        if let Some(at) = self.modules.iter().position(|m| m.path == path) {
            if alias.is_some() {
                return Err(CanisterError::DuplicateModule {
                    module: path.to_string(),
                });
            }
            return Ok(ModuleId(at));
        }

        let info = catalog.lookup(path)?;
        let entry = ModuleEntry {
            path: path.to_string(),
            name: info.name.clone(),
            alias: alias.map(str::to_string),
        };

        if self
            .modules
            .iter()
            .any(|m| m.unique_name() == entry.unique_name())
        {
            return Err(CanisterError::DuplicateModuleAlias {
                alias: entry.unique_name().to_string(),
            });
        }

        tracing::debug!(path, unique_name = entry.unique_name(), "registered module");
        self.modules.push(entry);
        Ok(ModuleId(self.modules.len() - 1))
    }

    /// Register a Go type literal, returning its canonical id
    pub fn register(
        &mut self,
        literal: &str,
        catalog: &dyn ModuleCatalog,
    ) -> CanisterResult<TypeId> {
        let literal = literal.trim();
        if let Some(&id) = self.interned.get(literal) {
            return Ok(id);
        }

        let descriptor = self.parse(literal, catalog)?;
        let id = TypeId(self.types.len());
        self.types.push(descriptor);
        self.interned.insert(literal.to_string(), id);
        Ok(id)
    }

    fn parse(&mut self, literal: &str, catalog: &dyn ModuleCatalog) -> CanisterResult<TypeDescriptor> {
        if literal.is_empty() {
            return Err(CanisterError::MalformedTypeLiteral {
                literal: literal.to_string(),
            });
        }

        if let Some(rest) = literal.strip_prefix('*') {
            let elem = self.register(rest, catalog)?;
            return Ok(TypeDescriptor::Pointer { elem });
        }

        if let Some(rest) = literal.strip_prefix("[]") {
            let elem = self.register(rest, catalog)?;
            return Ok(TypeDescriptor::Slice { elem });
        }

        if let Some(rest) = literal.strip_prefix('[') {
            let close = rest.find(']').ok_or_else(|| CanisterError::MalformedTypeLiteral {
                literal: literal.to_string(),
            })?;
            let len: u64 =
                rest[..close]
                    .parse()
                    .map_err(|_| CanisterError::MalformedTypeLiteral {
                        literal: literal.to_string(),
                    })?;
            let elem = self.register(&rest[close + 1..], catalog)?;
            return Ok(TypeDescriptor::Array { len, elem });
        }

        if let Some(rest) = literal.strip_prefix("map[") {
            let close = matching_bracket(rest).ok_or_else(|| {
                CanisterError::MalformedTypeLiteral {
                    literal: literal.to_string(),
                }
            })?;
            let key = self.register(&rest[..close], catalog)?;
            let elem = self.register(&rest[close + 1..], catalog)?;
            return Ok(TypeDescriptor::Map { key, elem });
        }

        if let Some(rest) = literal.strip_prefix("<-chan ") {
            let elem = self.register(rest, catalog)?;
            return Ok(TypeDescriptor::Chan {
                dir: ChanDir::Recv,
                elem,
            });
        }
        if let Some(rest) = literal.strip_prefix("chan<- ") {
            let elem = self.register(rest, catalog)?;
            return Ok(TypeDescriptor::Chan {
                dir: ChanDir::Send,
                elem,
            });
        }
        if let Some(rest) = literal.strip_prefix("chan ") {
            let elem = self.register(rest, catalog)?;
            return Ok(TypeDescriptor::Chan {
                dir: ChanDir::Both,
                elem,
            });
        }

        // Function types stay opaque; the generator only ever renders them.
        if literal.starts_with("func(") || literal.starts_with("func ") {
            return Ok(TypeDescriptor::Basic {
                name: literal.to_string(),
            });
        }

        if literal.contains('.') {
            let (path, name) =
                literal
                    .rsplit_once('.')
                    .ok_or_else(|| CanisterError::MalformedTypeLiteral {
                        literal: literal.to_string(),
                    })?;
            if path.is_empty() || name.is_empty() || name.contains('/') {
                return Err(CanisterError::MalformedTypeLiteral {
                    literal: literal.to_string(),
                });
            }

            let module = self.register_module(path, None, catalog)?;
            let is_record = catalog.lookup(path)?.records.contains_key(name);
            return Ok(if is_record {
                TypeDescriptor::Record {
                    module,
                    name: name.to_string(),
                }
            } else {
                TypeDescriptor::Interface {
                    module,
                    name: name.to_string(),
                }
            });
        }

        if literal.contains(['/', ' ', '[', ']']) {
            return Err(CanisterError::MalformedTypeLiteral {
                literal: literal.to_string(),
            });
        }

        Ok(TypeDescriptor::Basic {
            name: literal.to_string(),
        })
    }

    /// The canonical descriptor for an id
    pub fn descriptor(&self, id: TypeId) -> &TypeDescriptor {
        &self.types[id.0]
    }

    /// The import table entry for a module id
    pub fn module(&self, id: ModuleId) -> &ModuleEntry {
        &self.modules[id.0]
    }

    /// All registered imports, in registration order
    pub fn modules(&self) -> &[ModuleEntry] {
        &self.modules
    }

    /// Find an import by the name code refers to it by
    pub fn module_by_unique_name(&self, name: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .position(|m| m.unique_name() == name)
            .map(ModuleId)
    }

    /// Whether the zero value of this type is `nil` (usable directly as a
    /// cache slot without taking an address)
    pub fn is_nilable(&self, id: TypeId) -> bool {
        match self.descriptor(id) {
            TypeDescriptor::Pointer { .. }
            | TypeDescriptor::Interface { .. }
            | TypeDescriptor::Slice { .. }
            | TypeDescriptor::Map { .. }
            | TypeDescriptor::Chan { .. } => true,
            TypeDescriptor::Basic { name } => name.starts_with("func"),
            TypeDescriptor::Record { .. } | TypeDescriptor::Array { .. } => false,
        }
    }

    /// Render the type as it appears in Go source
    pub fn render(&self, id: TypeId) -> String {
        match self.descriptor(id) {
            TypeDescriptor::Basic { name } => name.clone(),
            TypeDescriptor::Pointer { elem } => format!("*{}", self.render(*elem)),
            TypeDescriptor::Record { module, name }
            | TypeDescriptor::Interface { module, name } => {
                format!("{}.{}", self.module(*module).unique_name(), name)
            }
            TypeDescriptor::Array { len, elem } => format!("[{}]{}", len, self.render(*elem)),
            TypeDescriptor::Slice { elem } => format!("[]{}", self.render(*elem)),
            TypeDescriptor::Map { key, elem } => {
                format!("map[{}]{}", self.render(*key), self.render(*elem))
            }
            TypeDescriptor::Chan { dir, elem } => match dir {
                ChanDir::Both => format!("chan {}", self.render(*elem)),
                ChanDir::Send => format!("chan<- {}", self.render(*elem)),
                ChanDir::Recv => format!("<-chan {}", self.render(*elem)),
            },
        }
    }

    /// Render the nullable cache-slot form of the type: already-nilable
    /// types stay as-is, everything else gets a pointer
    pub fn render_as_pointer(&self, id: TypeId) -> String {
        if self.is_nilable(id) {
            self.render(id)
        } else {
            format!("*{}", self.render(id))
        }
    }
}

/// Index of the `]` closing the bracket opened just before `rest`,
/// accounting for nested brackets in the key type
fn matching_bracket(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (at, ch) in rest.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                if depth == 0 {
                    return Some(at);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}
