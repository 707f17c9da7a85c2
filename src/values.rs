//! Value binding
//!
//! Converts declared values into bound values carrying the concrete
//! expected type and the emission metadata the accessor bodies need:
//! whether a temporary variable is required (literals are not
//! addressable, so a constant bound to a pointer parameter needs one),
//! how the value's expression reads, and the scoped names of any
//! temporaries. Binding fails eagerly on any shape mismatch; a partially
//! bound service is never installed.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::catalog::ModuleCatalog;
use crate::def::ValueDef;
use crate::error::{CanisterError, CanisterResult};
use crate::types::{TypeDescriptor, TypeId, TypeRegistry};

/// A value resolved against a concrete expected type, ready for emission
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Constant(ConstantValue),
    ServiceRef(ServiceRefValue),
    List(ListValue),
    Record(RecordValue),
}

/// A literal bound to a scalar or pointer-to-scalar site
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantValue {
    /// Literal as it appears in Go source (strings already quoted)
    pub literal: String,
    /// Pointer-expected: the literal must live in an addressable temporary
    pub needs_var: bool,
    var_name: Option<String>,
}

/// A `@service` reference bound through the target's accessor
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRefValue {
    /// Referenced service name
    pub service: String,
    /// Accessor returns a pointer slot but the site wants the value
    pub deref: bool,
}

/// A list bound to a slice/array site
#[derive(Debug, Clone, PartialEq)]
pub struct ListValue {
    /// Rendered slice/array type for the composite literal
    pub rendered_type: String,
    pub elems: Vec<BoundValue>,
    /// The site expects a pointer to the list
    pub pointer: bool,
    var_name: Option<String>,
}

/// A field mapping bound to a struct-typed site
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    /// Rendered struct type for the composite literal
    pub rendered_type: String,
    /// Bound fields, sorted by name
    pub fields: Vec<(String, BoundValue)>,
    /// The site expects a pointer to the struct
    pub pointer: bool,
    var_name: Option<String>,
}

impl BoundValue {
    /// Whether emission must introduce a temporary before the use site
    pub fn needs_variable(&self) -> bool {
        match self {
            BoundValue::Constant(v) => v.needs_var,
            BoundValue::ServiceRef(_) => false,
            BoundValue::List(v) => {
                v.pointer || v.elems.iter().any(BoundValue::needs_variable)
            }
            BoundValue::Record(v) => {
                v.pointer || v.fields.iter().any(|(_, f)| f.needs_variable())
            }
        }
    }

    /// Assign temporary names, scoping children under `base` so sibling
    /// values never collide
    pub fn assign_variables(&mut self, base: &str) {
        match self {
            BoundValue::Constant(v) => v.var_name = Some(base.to_string()),
            BoundValue::ServiceRef(_) => {}
            BoundValue::List(v) => {
                v.var_name = Some(base.to_string());
                for (at, elem) in v.elems.iter_mut().enumerate() {
                    elem.assign_variables(&format!("{base}_{at}"));
                }
            }
            BoundValue::Record(v) => {
                v.var_name = Some(base.to_string());
                for (at, (_, field)) in v.fields.iter_mut().enumerate() {
                    field.assign_variables(&format!("{base}_{at}"));
                }
            }
        }
    }

    /// Go statements declaring this value's temporaries, children first.
    /// Empty when no temporary is needed.
    pub fn variable_statements(&self) -> Vec<String> {
        let mut statements = Vec::new();
        self.collect_variable_statements(&mut statements);
        statements
    }

    fn collect_variable_statements(&self, out: &mut Vec<String>) {
        match self {
            BoundValue::Constant(v) => {
                if v.needs_var {
                    out.push(format!("{} := {}", v.var(), v.literal));
                }
            }
            BoundValue::ServiceRef(_) => {}
            BoundValue::List(v) => {
                for elem in &v.elems {
                    elem.collect_variable_statements(out);
                }
                if v.pointer {
                    out.push(format!("{} := {}", v.var(), v.composite()));
                }
            }
            BoundValue::Record(v) => {
                for (_, field) in &v.fields {
                    field.collect_variable_statements(out);
                }
                if v.pointer {
                    out.push(format!("{} := {}", v.var(), v.composite()));
                }
            }
        }
    }

    /// The Go expression for this value at its use site
    pub fn render_use(&self) -> String {
        match self {
            BoundValue::Constant(v) => {
                if v.needs_var {
                    format!("&{}", v.var())
                } else {
                    v.literal.clone()
                }
            }
            BoundValue::ServiceRef(v) => {
                if v.deref {
                    format!("*c.Get{}()", v.service)
                } else {
                    format!("c.Get{}()", v.service)
                }
            }
            BoundValue::List(v) => {
                if v.pointer {
                    format!("&{}", v.var())
                } else {
                    v.composite()
                }
            }
            BoundValue::Record(v) => {
                if v.pointer {
                    format!("&{}", v.var())
                } else {
                    v.composite()
                }
            }
        }
    }
}

impl ConstantValue {
    fn var(&self) -> &str {
        self.var_name.as_deref().unwrap_or("v")
    }
}

impl ListValue {
    fn var(&self) -> &str {
        self.var_name.as_deref().unwrap_or("v")
    }

    fn composite(&self) -> String {
        let mut out = format!("{}{{\n", self.rendered_type);
        for elem in &self.elems {
            out.push_str(&elem.render_use());
            out.push_str(",\n");
        }
        out.push('}');
        out
    }
}

impl RecordValue {
    fn var(&self) -> &str {
        self.var_name.as_deref().unwrap_or("v")
    }

    fn composite(&self) -> String {
        let mut out = format!("{}{{\n", self.rendered_type);
        for (name, field) in &self.fields {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&field.render_use());
            out.push_str(",\n");
        }
        out.push('}');
        out
    }
}

/// Everything binding needs from the surrounding resolution pass
pub(crate) struct BindContext<'a> {
    pub registry: &'a mut TypeRegistry,
    pub catalog: &'a dyn ModuleCatalog,
    /// Result types of services already resolved (dependency order
    /// guarantees every referenced service is here)
    pub results: &'a BTreeMap<String, TypeId>,
    /// Enclosing service, for error messages
    pub service: &'a str,
}

impl BindContext<'_> {
    fn incompatible(&self, value: &ValueDef, expected: TypeId) -> CanisterError {
        CanisterError::IncompatibleValue {
            value: value.kind().to_string(),
            expected: self.registry.render(expected),
            service: self.service.to_string(),
        }
    }
}

/// Bind a declared value against the concrete type its site expects
pub(crate) fn bind_value(
    ctx: &mut BindContext<'_>,
    value: &ValueDef,
    expected: TypeId,
) -> CanisterResult<BoundValue> {
    match value {
        ValueDef::Constant(literal) => bind_constant(ctx, value, literal, expected),
        ValueDef::ServiceRef(service) => bind_service_ref(ctx, service, expected),
        ValueDef::List(elems) => bind_list(ctx, value, elems, expected),
        ValueDef::Record(fields) => bind_record(ctx, value, fields, expected),
    }
}

fn bind_constant(
    ctx: &mut BindContext<'_>,
    value: &ValueDef,
    literal: &str,
    expected: TypeId,
) -> CanisterResult<BoundValue> {
    let (scalar, needs_var) = match ctx.registry.descriptor(expected) {
        TypeDescriptor::Basic { name } => (name.clone(), false),
        TypeDescriptor::Pointer { elem } => match ctx.registry.descriptor(*elem) {
            TypeDescriptor::Basic { name } => (name.clone(), true),
            _ => return Err(ctx.incompatible(value, expected)),
        },
        _ => return Err(ctx.incompatible(value, expected)),
    };

    let literal = if scalar == "string" {
        quote_go_string(literal)
    } else {
        literal.to_string()
    };

    Ok(BoundValue::Constant(ConstantValue {
        literal,
        needs_var,
        var_name: None,
    }))
}

/// Quote a string the way Go's `strconv.Quote` does, so the emitted
/// literal is valid Go whatever the YAML constant contained. Rust's
/// `{:?}` is close but escapes control characters as `\u{..}`, which Go
/// rejects.
fn quote_go_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for ch in raw.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            ch if (ch as u32) < 0x20 => {
                let _ = write!(out, "\\x{:02x}", ch as u32);
            }
            // DEL and the C1 controls are unprintable but not byte-sized
            // escapes in Go source.
            ch if ('\u{7f}'..='\u{9f}').contains(&ch) => {
                let _ = write!(out, "\\u{:04x}", ch as u32);
            }
            ch => out.push(ch),
        }
    }
    out.push('"');
    out
}

fn bind_service_ref(
    ctx: &mut BindContext<'_>,
    service: &str,
    expected: TypeId,
) -> CanisterResult<BoundValue> {
    let result = *ctx.results.get(service).ok_or_else(|| {
        // Reachable only if resolution ran without the cycle/missing pass.
        CanisterError::ServiceNotFound {
            service: service.to_string(),
            path: vec![ctx.service.to_string()],
        }
    })?;

    // The accessor returns the nullable slot form of the target's result
    // type; dereference when the site wants the plain value.
    let accessor_is_pointer = !ctx.registry.is_nilable(result);
    let site_wants_pointer = matches!(
        ctx.registry.descriptor(expected),
        TypeDescriptor::Pointer { .. }
    );

    Ok(BoundValue::ServiceRef(ServiceRefValue {
        service: service.to_string(),
        deref: accessor_is_pointer && !site_wants_pointer,
    }))
}

fn bind_list(
    ctx: &mut BindContext<'_>,
    value: &ValueDef,
    elems: &[ValueDef],
    expected: TypeId,
) -> CanisterResult<BoundValue> {
    let (pointer, list_type) = match ctx.registry.descriptor(expected) {
        TypeDescriptor::Slice { .. } | TypeDescriptor::Array { .. } => (false, expected),
        TypeDescriptor::Pointer { elem } => match ctx.registry.descriptor(*elem) {
            TypeDescriptor::Slice { .. } | TypeDescriptor::Array { .. } => (true, *elem),
            _ => return Err(ctx.incompatible(value, expected)),
        },
        _ => return Err(ctx.incompatible(value, expected)),
    };

    let elem_type = match ctx.registry.descriptor(list_type) {
        TypeDescriptor::Slice { elem } | TypeDescriptor::Array { elem, .. } => *elem,
        _ => unreachable!("list_type is slice or array by construction"),
    };

    let bound = elems
        .iter()
        .map(|elem| bind_value(ctx, elem, elem_type))
        .collect::<CanisterResult<Vec<_>>>()?;

    Ok(BoundValue::List(ListValue {
        rendered_type: ctx.registry.render(list_type),
        elems: bound,
        pointer,
        var_name: None,
    }))
}

fn bind_record(
    ctx: &mut BindContext<'_>,
    value: &ValueDef,
    fields: &BTreeMap<String, ValueDef>,
    expected: TypeId,
) -> CanisterResult<BoundValue> {
    let (pointer, record_type) = match ctx.registry.descriptor(expected) {
        TypeDescriptor::Record { .. } => (false, expected),
        TypeDescriptor::Pointer { elem } => match ctx.registry.descriptor(*elem) {
            TypeDescriptor::Record { .. } => (true, *elem),
            _ => return Err(ctx.incompatible(value, expected)),
        },
        _ => return Err(ctx.incompatible(value, expected)),
    };

    let (module, record_name) = match ctx.registry.descriptor(record_type) {
        TypeDescriptor::Record { module, name } => (*module, name.clone()),
        _ => unreachable!("record_type is a record by construction"),
    };
    let module_path = ctx.registry.module(module).path.clone();

    let shape = ctx
        .catalog
        .lookup(&module_path)?
        .records
        .get(&record_name)
        .cloned()
        .ok_or_else(|| CanisterError::UnknownRecord {
            record: record_name.clone(),
            module: module_path.clone(),
        })?;

    let mut bound = Vec::with_capacity(fields.len());
    for (field, field_value) in fields {
        let literal =
            shape
                .fields
                .get(field)
                .ok_or_else(|| CanisterError::UnknownField {
                    field: field.clone(),
                    record: ctx.registry.render(record_type),
                    service: ctx.service.to_string(),
                })?;
        let field_type = ctx.registry.register(literal, ctx.catalog)?;
        bound.push((field.clone(), bind_value(ctx, field_value, field_type)?));
    }

    Ok(BoundValue::Record(RecordValue {
        rendered_type: ctx.registry.render(record_type),
        fields: bound,
        pointer,
        var_name: None,
    }))
}
