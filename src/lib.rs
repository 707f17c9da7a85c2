//! Canister - build-time dependency injection container generator
//!
//! Canister reads a declarative YAML definition of services (factory
//! calls or struct initializations, with constants, `@service`
//! references, lists, and field mappings as inputs) plus a JSON catalog
//! of module exports, validates the whole graph up front, and emits a
//! statically typed Go container with one lazily cached accessor per
//! service.

pub mod catalog;
pub mod def;
pub mod emit;
pub mod error;
pub mod graph;
pub mod resolve;
pub mod types;
pub mod values;

// Re-exports for convenience
pub use catalog::{load_catalog, parse_catalog, FuncSig, MemoryCatalog, ModuleCatalog, ModuleInfo, RecordShape};
pub use def::{parse_definition, ContainerDef, ModuleImport, ServiceDef, ValueDef};
pub use emit::{emit, GofmtFormatter, PassthroughFormatter, SourceFormatter};
pub use error::{CanisterError, CanisterResult};
pub use graph::check_circular_references;
pub use resolve::{resolve, ResolvedContainer, ResolvedService, ServiceKind};
pub use types::{TypeDescriptor, TypeId, TypeRegistry};
pub use values::BoundValue;
