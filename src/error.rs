//! Error types for Canister
//!
//! Uses `thiserror` for library errors; the CLI boundary wraps these
//! with `anyhow` for user-facing context.

use thiserror::Error;

/// Result type alias for Canister operations
pub type CanisterResult<T> = Result<T, CanisterError>;

/// Main error type for Canister operations
///
/// Everything except [`CanisterError::FormatFailed`] describes a problem
/// with the user's definition or catalog and aborts generation before any
/// output is produced. `FormatFailed` indicates a defect in the generator
/// itself and carries the raw generated text for diagnosis.
#[derive(Error, Debug)]
pub enum CanisterError {
    /// Service declares both `factory` and `struct`, or neither
    #[error("service \"{service}\" must declare exactly one of 'factory' or 'struct'")]
    InvalidConstruction { service: String },

    /// Service reference chain loops back on itself
    #[error("circular service reference: @{}", .path.join(" -> @"))]
    CircularReference { path: Vec<String> },

    /// A referenced service is not declared in the definition
    #[error("service \"{service}\" not found (referenced via @{})", .path.join(" -> @"))]
    ServiceNotFound { service: String, path: Vec<String> },

    /// The catalog has no entry for a module path
    #[error("module not found in catalog: {module}")]
    ModuleNotFound { module: String },

    /// The same module path was imported twice
    #[error("module \"{module}\" is imported more than once")]
    DuplicateModule { module: String },

    /// Two imports resolve to the same usable name
    #[error("a module is already imported under the name \"{alias}\"")]
    DuplicateModuleAlias { alias: String },

    /// A factory/struct reference names an import alias that does not exist
    #[error("there is no imported module named \"{alias}\"")]
    UnknownModuleAlias { alias: String },

    /// A factory/struct reference has no `alias.Name` qualifier
    #[error("reference \"{reference}\" must be qualified as alias.Name")]
    UnqualifiedReference { reference: String },

    /// The module exports no function with this name
    #[error("there is no func named \"{func}\" in module {module}")]
    UnknownCallable { func: String, module: String },

    /// The module exports no struct with this name
    #[error("there is no struct named \"{record}\" in module {module}")]
    UnknownRecord { record: String, module: String },

    /// A declared field does not exist on the target struct
    #[error("there is no field \"{field}\" on struct {record} (service \"{service}\")")]
    UnknownField {
        field: String,
        record: String,
        service: String,
    },

    /// Wrong number of arguments for a non-variadic factory
    #[error("func {func} expects {expected} arguments, {given} given")]
    ArityMismatch {
        func: String,
        expected: usize,
        given: usize,
    },

    /// Too few arguments for a variadic factory
    #[error("func {func} expects at least {min} arguments, {given} given")]
    VariadicArityMismatch {
        func: String,
        min: usize,
        given: usize,
    },

    /// Factory must return one value, or one value plus an error
    #[error("func {func} must return one value, or one value and an error")]
    InvalidResultShape { func: String },

    /// A variadic function whose last parameter is not a slice
    #[error("func {func} is variadic but its last parameter is not a slice")]
    InvalidVariadicSignature { func: String },

    /// Declared value kind does not match the expected type
    #[error("cannot bind {value} value to {expected} (service \"{service}\")")]
    IncompatibleValue {
        value: String,
        expected: String,
        service: String,
    },

    /// The catalog reported a type literal the registry cannot parse
    #[error("malformed type literal \"{literal}\" in catalog")]
    MalformedTypeLiteral { literal: String },

    /// The canonical formatter rejected the generated source.
    ///
    /// This is a generator defect, never a user-input problem; the raw
    /// text is included so the defect can be diagnosed. The field is
    /// named `generated` because `thiserror` reserves `source` for the
    /// error cause chain.
    #[error("generated source failed formatting: {message}\n--- generated source ---\n{generated}")]
    FormatFailed { message: String, generated: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}
