//! Service resolution
//!
//! Turns a validated definition into a fully typed, emission-ready
//! container: imports registered, every factory/struct reference matched
//! against the module catalog, every argument and field bound. Services
//! resolve in dependency order (safe: the cycle detector ran first), so
//! a service reference can always adopt the target's resolved result
//! type. Everything is keyed and emitted in name order, making the
//! output byte-identical for identical input.

use std::collections::BTreeMap;

use tracing::debug;

use crate::catalog::{FuncSig, ModuleCatalog};
use crate::def::{Construction, ContainerDef, ValueDef};
use crate::error::{CanisterError, CanisterResult};
use crate::graph::check_circular_references;
use crate::types::{ModuleId, TypeDescriptor, TypeId, TypeRegistry};
use crate::values::{bind_value, BindContext, BoundValue};

/// How a resolved service is constructed
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceKind {
    /// Call a factory func
    Factory {
        module: ModuleId,
        func: String,
        args: Vec<BoundValue>,
        /// The func also returns an error that must abort startup
        failable: bool,
    },
    /// Initialize a struct literal
    Initialization {
        module: ModuleId,
        record: String,
        /// Bound fields, sorted by name
        fields: Vec<(String, BoundValue)>,
    },
}

/// A service matched against the catalog and fully bound
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedService {
    pub name: String,
    /// Concrete type the construction produces
    pub result: TypeId,
    pub kind: ServiceKind,
}

/// The fully resolved container, input to the emitter
#[derive(Debug)]
pub struct ResolvedContainer {
    /// Generated container type name
    pub name: String,
    /// Doc comment for the container type
    pub docs: String,
    /// Go package of the generated file
    pub package: String,
    /// Import path of the runtime support package
    pub runtime: String,
    /// Canonical types and the import table
    pub registry: TypeRegistry,
    /// Resolved services in name order
    pub services: BTreeMap<String, ResolvedService>,
}

/// Resolve a definition against a module catalog
pub fn resolve(
    def: &ContainerDef,
    catalog: &dyn ModuleCatalog,
) -> CanisterResult<ResolvedContainer> {
    def.validate()?;
    check_circular_references(def)?;

    let mut registry = TypeRegistry::new();
    for import in &def.modules {
        registry.register_module(&import.path, import.alias.as_deref(), catalog)?;
    }

    let mut resolver = Resolver {
        def,
        catalog,
        registry,
        services: BTreeMap::new(),
        results: BTreeMap::new(),
    };

    for name in def.services.keys() {
        resolver.resolve_service(name)?;
    }

    Ok(ResolvedContainer {
        name: def.container_name().to_string(),
        docs: def.container_docs(),
        package: def.container_package().to_string(),
        runtime: def.runtime_module().to_string(),
        registry: resolver.registry,
        services: resolver.services,
    })
}

struct Resolver<'a> {
    def: &'a ContainerDef,
    catalog: &'a dyn ModuleCatalog,
    registry: TypeRegistry,
    services: BTreeMap<String, ResolvedService>,
    results: BTreeMap<String, TypeId>,
}

impl Resolver<'_> {
    fn resolve_service(&mut self, name: &str) -> CanisterResult<()> {
        if self.results.contains_key(name) {
            return Ok(());
        }

        // Borrow through the definition itself, not `self`, so dependency
        // resolution below can take `&mut self`.
        let def = self.def;
        let service = &def.services[name];

        // Dependencies first, so their result types are known when this
        // service's references bind. Acyclic by the earlier check.
        for dep in service.referenced_services() {
            self.resolve_service(dep)?;
        }

        debug!(service = name, "resolving service");
        let resolved = match service.construction() {
            Ok(Construction::Factory(factory)) => {
                self.resolve_by_factory(name, factory, &service.arguments)?
            }
            Ok(Construction::Initialization(record)) => {
                self.resolve_by_initialization(name, record, &service.fields)?
            }
            Err(()) => {
                return Err(CanisterError::InvalidConstruction {
                    service: name.to_string(),
                })
            }
        };

        self.results.insert(name.to_string(), resolved.result);
        self.services.insert(name.to_string(), resolved);
        Ok(())
    }

    fn resolve_by_factory(
        &mut self,
        name: &str,
        factory: &str,
        args: &[ValueDef],
    ) -> CanisterResult<ResolvedService> {
        let (alias, func_name) = split_reference(factory)?;
        let module = self.module_by_alias(alias)?;
        let module_path = self.registry.module(module).path.clone();

        let sig = self
            .catalog
            .lookup(&module_path)?
            .funcs
            .get(func_name)
            .cloned()
            .ok_or_else(|| CanisterError::UnknownCallable {
                func: func_name.to_string(),
                module: module_path.clone(),
            })?;

        let qualified = format!("{alias}.{func_name}");
        check_arity(&qualified, &sig, args.len())?;

        let failable = match sig.results.as_slice() {
            [_] => false,
            [_, second] if second == "error" => true,
            _ => {
                return Err(CanisterError::InvalidResultShape { func: qualified });
            }
        };

        let result = self.registry.register(&sig.results[0], self.catalog)?;

        let variadic_elem = if sig.variadic {
            Some(self.variadic_elem(&qualified, &sig)?)
        } else {
            None
        };

        let mut bound = Vec::with_capacity(args.len());
        for (at, arg) in args.iter().enumerate() {
            // Everything at or past the variadic slot binds against the
            // variadic element type.
            let expected = match variadic_elem {
                Some(elem) if at >= sig.params.len() - 1 => elem,
                _ => self.registry.register(&sig.params[at], self.catalog)?,
            };

            let mut ctx = BindContext {
                registry: &mut self.registry,
                catalog: self.catalog,
                results: &self.results,
                service: name,
            };
            let mut value = bind_value(&mut ctx, arg, expected)?;
            value.assign_variables(&format!("v{at}"));
            bound.push(value);
        }

        Ok(ResolvedService {
            name: name.to_string(),
            result,
            kind: ServiceKind::Factory {
                module,
                func: func_name.to_string(),
                args: bound,
                failable,
            },
        })
    }

    fn resolve_by_initialization(
        &mut self,
        name: &str,
        record: &str,
        fields: &BTreeMap<String, ValueDef>,
    ) -> CanisterResult<ResolvedService> {
        let (alias, record_name) = split_reference(record)?;
        let module = self.module_by_alias(alias)?;
        let module_path = self.registry.module(module).path.clone();

        let shape = self
            .catalog
            .lookup(&module_path)?
            .records
            .get(record_name)
            .cloned()
            .ok_or_else(|| CanisterError::UnknownRecord {
                record: record_name.to_string(),
                module: module_path.clone(),
            })?;

        let result = self
            .registry
            .register(&format!("{module_path}.{record_name}"), self.catalog)?;

        let mut bound = Vec::with_capacity(fields.len());
        for (at, (field, value)) in fields.iter().enumerate() {
            let literal =
                shape
                    .fields
                    .get(field)
                    .ok_or_else(|| CanisterError::UnknownField {
                        field: field.clone(),
                        record: format!("{alias}.{record_name}"),
                        service: name.to_string(),
                    })?;
            let expected = self.registry.register(literal, self.catalog)?;

            let mut ctx = BindContext {
                registry: &mut self.registry,
                catalog: self.catalog,
                results: &self.results,
                service: name,
            };
            let mut value = bind_value(&mut ctx, value, expected)?;
            value.assign_variables(&format!("f{at}"));
            bound.push((field.clone(), value));
        }

        Ok(ResolvedService {
            name: name.to_string(),
            result,
            kind: ServiceKind::Initialization {
                module,
                record: record_name.to_string(),
                fields: bound,
            },
        })
    }

    fn module_by_alias(&self, alias: &str) -> CanisterResult<ModuleId> {
        self.registry
            .module_by_unique_name(alias)
            .ok_or_else(|| CanisterError::UnknownModuleAlias {
                alias: alias.to_string(),
            })
    }

    fn variadic_elem(&mut self, qualified: &str, sig: &FuncSig) -> CanisterResult<TypeId> {
        let last = sig
            .params
            .last()
            .ok_or_else(|| CanisterError::InvalidVariadicSignature {
                func: qualified.to_string(),
            })?;
        let last = self.registry.register(last, self.catalog)?;
        match self.registry.descriptor(last) {
            TypeDescriptor::Slice { elem } => Ok(*elem),
            _ => Err(CanisterError::InvalidVariadicSignature {
                func: qualified.to_string(),
            }),
        }
    }
}

fn check_arity(qualified: &str, sig: &FuncSig, given: usize) -> CanisterResult<()> {
    if !sig.variadic && given != sig.params.len() {
        return Err(CanisterError::ArityMismatch {
            func: qualified.to_string(),
            expected: sig.params.len(),
            given,
        });
    }

    if sig.variadic {
        let min = sig.params.len().saturating_sub(1);
        if given < min {
            return Err(CanisterError::VariadicArityMismatch {
                func: qualified.to_string(),
                min,
                given,
            });
        }
    }

    Ok(())
}

/// Split an `alias.Name` reference into its parts
fn split_reference(reference: &str) -> CanisterResult<(&str, &str)> {
    match reference.rsplit_once('.') {
        Some((alias, name)) if !alias.is_empty() && !name.is_empty() => Ok((alias, name)),
        _ => Err(CanisterError::UnqualifiedReference {
            reference: reference.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryCatalog, ModuleInfo, RecordShape};
    use crate::def::{ModuleImport, ServiceDef};

    const EXAMPLE: &str = "github.com/acme/example";

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new().with_module(
            ModuleInfo::new(EXAMPLE, "example")
                .with_func(FuncSig {
                    name: "NewIDo".into(),
                    params: vec![],
                    results: vec![format!("{EXAMPLE}.Doer")],
                    variadic: false,
                })
                .with_func(FuncSig {
                    name: "NewSomethingDo".into(),
                    params: vec![format!("{EXAMPLE}.Doer")],
                    results: vec![format!("{EXAMPLE}.SomethingDo")],
                    variadic: false,
                })
                .with_func(FuncSig {
                    name: "NewComposed".into(),
                    params: vec![format!("[]{EXAMPLE}.Doer")],
                    results: vec![format!("{EXAMPLE}.Doer")],
                    variadic: true,
                })
                .with_func(FuncSig {
                    name: "NewFailable".into(),
                    params: vec![],
                    results: vec![format!("{EXAMPLE}.Doer"), "error".into()],
                    variadic: false,
                })
                .with_func(FuncSig {
                    name: "NewWeird".into(),
                    params: vec![],
                    results: vec![format!("{EXAMPLE}.Doer"), "string".into()],
                    variadic: false,
                })
                .with_func(FuncSig {
                    name: "NewVoid".into(),
                    params: vec![],
                    results: vec![],
                    variadic: false,
                })
                .with_record(RecordShape {
                    name: "SomethingDo".into(),
                    fields: [("Something".to_string(), format!("{EXAMPLE}.Doer"))].into(),
                })
                .with_record(RecordShape {
                    name: "JustDo".into(),
                    fields: [("That".to_string(), "string".to_string())].into(),
                }),
        )
    }

    fn definition(services: Vec<(&str, ServiceDef)>) -> ContainerDef {
        ContainerDef {
            modules: vec![ModuleImport {
                path: EXAMPLE.to_string(),
                alias: None,
            }],
            services: services
                .into_iter()
                .map(|(name, service)| (name.to_string(), service))
                .collect(),
            ..ContainerDef::default()
        }
    }

    #[test]
    fn test_factory_with_service_reference_resolves() {
        let def = definition(vec![
            ("IDo", ServiceDef::by_factory("example.NewIDo", vec![])),
            (
                "SomethingDo",
                ServiceDef::by_factory(
                    "example.NewSomethingDo",
                    vec![ValueDef::ServiceRef("IDo".into())],
                ),
            ),
        ]);

        let container = resolve(&def, &catalog()).unwrap();
        assert_eq!(container.services.len(), 2);

        let something = &container.services["SomethingDo"];
        match &something.kind {
            ServiceKind::Factory { func, args, failable, .. } => {
                assert_eq!(func, "NewSomethingDo");
                assert!(!failable);
                assert_eq!(args[0].render_use(), "c.GetIDo()");
            }
            other => panic!("expected factory, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_dependency_fails_before_catalog_work() {
        let def = definition(vec![(
            "Dependent",
            ServiceDef::by_factory(
                "example.NewSomethingDo",
                vec![ValueDef::ServiceRef("Dependency".into())],
            ),
        )]);

        let err = resolve(&def, &catalog()).unwrap_err();
        assert!(err.to_string().contains("\"Dependency\" not found"));
    }

    #[test]
    fn test_two_service_cycle_fails() {
        let def = definition(vec![
            (
                "Service1",
                ServiceDef::by_factory(
                    "example.NewSomethingDo",
                    vec![ValueDef::ServiceRef("Service2".into())],
                ),
            ),
            (
                "Service2",
                ServiceDef::by_factory(
                    "example.NewSomethingDo",
                    vec![ValueDef::ServiceRef("Service1".into())],
                ),
            ),
        ]);

        let err = resolve(&def, &catalog()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("circular"));
        assert!(msg.contains("Service1"));
        assert!(msg.contains("Service2"));
    }

    #[test]
    fn test_unknown_module_alias() {
        let def = definition(vec![("S", ServiceDef::by_factory("nope.New", vec![]))]);
        let err = resolve(&def, &catalog()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "there is no imported module named \"nope\""
        );
    }

    #[test]
    fn test_unknown_callable() {
        let def = definition(vec![(
            "S",
            ServiceDef::by_factory("example.NewNothing", vec![]),
        )]);
        let err = resolve(&def, &catalog()).unwrap_err();
        assert!(matches!(err, CanisterError::UnknownCallable { .. }));
    }

    #[test]
    fn test_exact_arity_enforced() {
        let def = definition(vec![(
            "S",
            ServiceDef::by_factory("example.NewIDo", vec![ValueDef::Constant("extra".into())]),
        )]);
        let err = resolve(&def, &catalog()).unwrap_err();
        assert_eq!(err.to_string(), "func example.NewIDo expects 0 arguments, 1 given");
    }

    #[test]
    fn test_variadic_allows_params_minus_one_or_more() {
        // Zero arguments: allowed, the variadic slot may stay empty.
        let def = definition(vec![(
            "Composed",
            ServiceDef::by_factory("example.NewComposed", vec![]),
        )]);
        resolve(&def, &catalog()).unwrap();

        // Several arguments: every one binds against the element type.
        let def = definition(vec![
            ("A", ServiceDef::by_factory("example.NewIDo", vec![])),
            ("B", ServiceDef::by_factory("example.NewIDo", vec![])),
            (
                "Composed",
                ServiceDef::by_factory(
                    "example.NewComposed",
                    vec![
                        ValueDef::ServiceRef("A".into()),
                        ValueDef::ServiceRef("B".into()),
                    ],
                ),
            ),
        ]);
        let container = resolve(&def, &catalog()).unwrap();
        match &container.services["Composed"].kind {
            ServiceKind::Factory { args, .. } => assert_eq!(args.len(), 2),
            other => panic!("expected factory, got {other:?}"),
        }
    }

    #[test]
    fn test_failable_factory_tagged() {
        let def = definition(vec![(
            "Flaky",
            ServiceDef::by_factory("example.NewFailable", vec![]),
        )]);
        let container = resolve(&def, &catalog()).unwrap();
        match &container.services["Flaky"].kind {
            ServiceKind::Factory { failable, .. } => assert!(failable),
            other => panic!("expected factory, got {other:?}"),
        }
    }

    #[test]
    fn test_non_error_second_result_rejected() {
        let def = definition(vec![(
            "Weird",
            ServiceDef::by_factory("example.NewWeird", vec![]),
        )]);
        let err = resolve(&def, &catalog()).unwrap_err();
        assert!(matches!(err, CanisterError::InvalidResultShape { .. }));
    }

    #[test]
    fn test_zero_results_rejected() {
        let def = definition(vec![(
            "Void",
            ServiceDef::by_factory("example.NewVoid", vec![]),
        )]);
        let err = resolve(&def, &catalog()).unwrap_err();
        assert!(matches!(err, CanisterError::InvalidResultShape { .. }));
    }

    #[test]
    fn test_initialization_resolves_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("That".to_string(), ValueDef::Constant("other thing".into()));
        let def = definition(vec![(
            "JustDo",
            ServiceDef::by_initialization("example.JustDo", fields),
        )]);

        let container = resolve(&def, &catalog()).unwrap();
        let service = &container.services["JustDo"];
        match &service.kind {
            ServiceKind::Initialization { record, fields, .. } => {
                assert_eq!(record, "JustDo");
                assert_eq!(fields[0].0, "That");
                assert_eq!(fields[0].1.render_use(), "\"other thing\"");
            }
            other => panic!("expected initialization, got {other:?}"),
        }
        assert_eq!(container.registry.render(service.result), "example.JustDo");
    }

    #[test]
    fn test_initialization_unknown_field() {
        let mut fields = BTreeMap::new();
        fields.insert("Whatever".to_string(), ValueDef::Constant("x".into()));
        let def = definition(vec![(
            "JustDo",
            ServiceDef::by_initialization("example.JustDo", fields),
        )]);

        let err = resolve(&def, &catalog()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "there is no field \"Whatever\" on struct example.JustDo (service \"JustDo\")"
        );
    }

    #[test]
    fn test_unknown_record() {
        let def = definition(vec![(
            "S",
            ServiceDef::by_initialization("example.NoSuch", BTreeMap::new()),
        )]);
        let err = resolve(&def, &catalog()).unwrap_err();
        assert!(matches!(err, CanisterError::UnknownRecord { .. }));
    }

    #[test]
    fn test_unqualified_reference() {
        let def = definition(vec![("S", ServiceDef::by_factory("banana", vec![]))]);
        let err = resolve(&def, &catalog()).unwrap_err();
        assert!(matches!(err, CanisterError::UnqualifiedReference { .. }));
    }

    #[test]
    fn test_registry_identity_across_services() {
        let def = definition(vec![
            ("A", ServiceDef::by_factory("example.NewIDo", vec![])),
            ("B", ServiceDef::by_factory("example.NewIDo", vec![])),
        ]);
        let container = resolve(&def, &catalog()).unwrap();
        assert_eq!(
            container.services["A"].result,
            container.services["B"].result
        );
    }
}
