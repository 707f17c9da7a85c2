//! Go source emission
//!
//! Renders a resolved container as a single Go file: import block,
//! container struct with one lazy cache slot per service, the parameters
//! bag plumbing, a `Get<Name>` accessor per service, and a by-name `Get`
//! lookup. The emitted text is piped through `gofmt` so the output is
//! byte-identical to what a Go author would commit; the raw renderer only
//! has to be syntactically correct, not pretty.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write as _;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{CanisterError, CanisterResult};
use crate::resolve::{ResolvedContainer, ResolvedService, ServiceKind};

/// Canonical formatting step applied to the rendered source
pub trait SourceFormatter {
    fn format(&self, source: &str) -> CanisterResult<String>;
}

/// Pipes the source through the `gofmt` binary
pub struct GofmtFormatter;

impl SourceFormatter for GofmtFormatter {
    fn format(&self, source: &str) -> CanisterResult<String> {
        let mut child = Command::new("gofmt")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| CanisterError::FormatFailed {
                message: format!("could not run gofmt: {err}"),
                generated: source.to_string(),
            })?;

        // stdin is piped above, so the handle is always present
        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(source.as_bytes())
                .map_err(|err| CanisterError::FormatFailed {
                    message: format!("could not write to gofmt: {err}"),
                    generated: source.to_string(),
                })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|err| CanisterError::FormatFailed {
                message: format!("could not read gofmt output: {err}"),
                generated: source.to_string(),
            })?;

        if !output.status.success() {
            return Err(CanisterError::FormatFailed {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                generated: source.to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Returns the rendered source unchanged; used by tests and `--no-format`
pub struct PassthroughFormatter;

impl SourceFormatter for PassthroughFormatter {
    fn format(&self, source: &str) -> CanisterResult<String> {
        Ok(source.to_string())
    }
}

/// Render a resolved container to Go source
pub fn emit(
    container: &ResolvedContainer,
    formatter: &dyn SourceFormatter,
) -> CanisterResult<String> {
    let failable = container.services.values().any(|service| {
        matches!(service.kind, ServiceKind::Factory { failable: true, .. })
    });

    let imports = ImportBlock::build(container, failable);

    let mut out = String::new();
    let _ = writeln!(out, "// Code generated by canister; DO NOT EDIT.");
    let _ = writeln!(out, "package {}", container.package);
    out.push('\n');
    imports.render(&mut out);

    render_struct(&mut out, container, &imports);
    render_bag_accessors(&mut out, container, &imports);
    if failable {
        render_init_error(&mut out, container, &imports);
    }
    for service in container.services.values() {
        render_accessor(&mut out, container, service);
    }
    render_lookup(&mut out, container, &imports);

    debug!(
        services = container.services.len(),
        bytes = out.len(),
        "rendered container source"
    );
    formatter.format(&out)
}

/// The import block plus the names the generated code refers to the
/// synthesized (non-definition) imports by
struct ImportBlock {
    /// alias to path, sorted by path at render time
    entries: Vec<(String, String)>,
    runtime: String,
    strings: String,
    fmt: Option<String>,
}

impl ImportBlock {
    fn build(container: &ResolvedContainer, failable: bool) -> Self {
        let mut entries: Vec<(String, String)> = container
            .registry
            .modules()
            .iter()
            .map(|module| (module.unique_name().to_string(), module.path.clone()))
            .collect();

        let runtime = free_alias(&entries, "runtime");
        entries.push((runtime.clone(), container.runtime.clone()));

        let strings = free_alias(&entries, "strings");
        entries.push((strings.clone(), "strings".to_string()));

        let fmt = failable.then(|| {
            let fmt = free_alias(&entries, "fmt");
            entries.push((fmt.clone(), "fmt".to_string()));
            fmt
        });

        entries.sort_by(|a, b| a.1.cmp(&b.1));
        Self {
            entries,
            runtime,
            strings,
            fmt,
        }
    }

    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "import (");
        for (alias, path) in &self.entries {
            let _ = writeln!(out, "\t{alias} {path:?}");
        }
        let _ = writeln!(out, ")");
        out.push('\n');
    }
}

/// First of `base`, `base2`, `base3`, ... not already used as an alias
fn free_alias(entries: &[(String, String)], base: &str) -> String {
    let mut candidate = base.to_string();
    let mut n = 1;
    while entries.iter().any(|(alias, _)| *alias == candidate) {
        n += 1;
        candidate = format!("{base}{n}");
    }
    candidate
}

fn render_struct(out: &mut String, container: &ResolvedContainer, imports: &ImportBlock) {
    let _ = writeln!(out, "// {}", container.docs);
    let _ = writeln!(out, "type {} struct {{", container.name);
    let _ = writeln!(out, "\tparametersBag {}.ParametersBag", imports.runtime);
    out.push('\n');
    for service in container.services.values() {
        let _ = writeln!(
            out,
            "\t{} {}",
            slot_name(&service.name),
            container.registry.render_as_pointer(service.result)
        );
    }
    let _ = writeln!(out, "}}");
    out.push('\n');
}

fn render_bag_accessors(out: &mut String, container: &ResolvedContainer, imports: &ImportBlock) {
    let name = &container.name;
    let runtime = &imports.runtime;

    let _ = writeln!(out, "// SetParametersBag sets the parameters bag");
    let _ = writeln!(
        out,
        "func (c *{name}) SetParametersBag(bag {runtime}.ParametersBag) {{"
    );
    let _ = writeln!(out, "\tc.parametersBag = bag");
    let _ = writeln!(out, "}}");
    out.push('\n');

    let _ = writeln!(out, "// GetParametersBag returns the parameters bag");
    let _ = writeln!(
        out,
        "func (c *{name}) GetParametersBag() {runtime}.ParametersBag {{"
    );
    let _ = writeln!(out, "\treturn c.parametersBag");
    let _ = writeln!(out, "}}");
    out.push('\n');
}

fn render_init_error(out: &mut String, container: &ResolvedContainer, imports: &ImportBlock) {
    let fmt = imports.fmt.as_deref().unwrap_or("fmt");
    let _ = writeln!(
        out,
        "func (c *{}) onInitError(name string, err error) {{",
        container.name
    );
    let _ = writeln!(
        out,
        "\tpanic({fmt}.Errorf(\"service %q failed to initialize: %v\", name, err))"
    );
    let _ = writeln!(out, "}}");
    out.push('\n');
}

fn render_accessor(out: &mut String, container: &ResolvedContainer, service: &ResolvedService) {
    let registry = &container.registry;
    let slot = slot_name(&service.name);
    let slot_type = registry.render_as_pointer(service.result);
    let nilable = registry.is_nilable(service.result);

    let _ = writeln!(
        out,
        "// Get{} returns the \"{}\" service",
        service.name, service.name
    );
    let _ = writeln!(
        out,
        "func (c *{}) Get{}() {} {{",
        container.name, service.name, slot_type
    );
    let _ = writeln!(out, "\tif c.{slot} == nil {{");

    match &service.kind {
        ServiceKind::Factory {
            module,
            func,
            args,
            failable,
        } => {
            for arg in args {
                for statement in arg.variable_statements() {
                    let _ = writeln!(out, "\t\t{statement}");
                }
            }

            let call = format!(
                "{}.{}({})",
                registry.module(*module).unique_name(),
                func,
                args.iter()
                    .map(|arg| arg.render_use())
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            match (failable, nilable) {
                (false, true) => {
                    let _ = writeln!(out, "\t\tc.{slot} = {call}");
                }
                (false, false) => {
                    let _ = writeln!(out, "\t\tt := {call}");
                    let _ = writeln!(out, "\t\tc.{slot} = &t");
                }
                (true, nilable) => {
                    let _ = writeln!(out, "\t\tt, err := {call}");
                    let _ = writeln!(out, "\t\tif err != nil {{");
                    let _ = writeln!(
                        out,
                        "\t\t\tc.onInitError({:?}, err)",
                        service.name
                    );
                    let _ = writeln!(out, "\t\t}}");
                    if nilable {
                        let _ = writeln!(out, "\t\tc.{slot} = t");
                    } else {
                        let _ = writeln!(out, "\t\tc.{slot} = &t");
                    }
                }
            }
        }
        ServiceKind::Initialization {
            module,
            record,
            fields,
        } => {
            for (_, field) in fields {
                for statement in field.variable_statements() {
                    let _ = writeln!(out, "\t\t{statement}");
                }
            }

            let mut literal = format!(
                "{}.{}{{\n",
                registry.module(*module).unique_name(),
                record
            );
            for (field, value) in fields {
                let _ = writeln!(literal, "{}: {},", field, value.render_use());
            }
            literal.push('}');
            let _ = writeln!(out, "\t\tc.{slot} = &{literal}");
        }
    }

    let _ = writeln!(out, "\t}}");
    let _ = writeln!(out, "\treturn c.{slot}");
    let _ = writeln!(out, "}}");
    out.push('\n');
}

fn render_lookup(out: &mut String, container: &ResolvedContainer, imports: &ImportBlock) {
    let strings = &imports.strings;

    let _ = writeln!(out, "// Get returns a service by its name");
    let _ = writeln!(
        out,
        "func (c *{}) Get(name string) interface{{}} {{",
        container.name
    );
    let _ = writeln!(out, "\tswitch {strings}.ToLower(name) {{");
    let _ = writeln!(out, "\tcase \"parametersbag\":");
    let _ = writeln!(out, "\t\treturn c.GetParametersBag()");

    // Case labels are pre-lowered; duplicates after lowering keep the
    // first service in name order.
    let mut seen = BTreeMap::new();
    for service in container.services.values() {
        let lowered = service.name.to_lowercase();
        if seen.insert(lowered.clone(), ()).is_some() {
            continue;
        }
        let _ = writeln!(out, "\tcase {lowered:?}:");
        let _ = writeln!(out, "\t\treturn c.Get{}()", service.name);
    }

    let _ = writeln!(out, "\t}}");
    let _ = writeln!(out, "\treturn nil");
    let _ = writeln!(out, "}}");
}

/// Cache-slot field name for a service: the name with its first rune
/// lowered
fn slot_name(service: &str) -> String {
    let mut chars = service.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
