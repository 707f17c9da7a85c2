//! Service reference validation
//!
//! Walks the definition's implicit dependency graph (service A's value
//! tree mentions `@B`) before any type work happens, so resolution can
//! assume the graph is acyclic and fully named. The visited path is
//! per-branch: a service reachable through several independent branches
//! is not a cycle.

use crate::def::{Construction, ContainerDef, ServiceDef, ValueDef};
use crate::error::{CanisterError, CanisterResult};

/// Check that no service depends on itself, directly or transitively,
/// and that every referenced service is declared
pub fn check_circular_references(def: &ContainerDef) -> CanisterResult<()> {
    for name in def.services.keys() {
        let mut path = Vec::new();
        walk_service(name, def, &mut path)?;
    }
    Ok(())
}

fn walk_service(name: &str, def: &ContainerDef, path: &mut Vec<String>) -> CanisterResult<()> {
    if let Some(first) = path.iter().position(|visited| visited == name) {
        let mut cycle: Vec<String> = path[first..].to_vec();
        cycle.push(name.to_string());
        return Err(CanisterError::CircularReference { path: cycle });
    }

    let Some(service) = def.services.get(name) else {
        return Err(CanisterError::ServiceNotFound {
            service: name.to_string(),
            path: path.clone(),
        });
    };

    path.push(name.to_string());
    walk_declaration(service, def, path)?;
    path.pop();

    Ok(())
}

fn walk_declaration(
    service: &ServiceDef,
    def: &ContainerDef,
    path: &mut Vec<String>,
) -> CanisterResult<()> {
    match service.construction() {
        Ok(Construction::Factory(_)) => {
            for value in &service.arguments {
                walk_value(value, def, path)?;
            }
        }
        Ok(Construction::Initialization(_)) => {
            for value in service.fields.values() {
                walk_value(value, def, path)?;
            }
        }
        // Ambiguous declarations are reported by ContainerDef::validate;
        // here they just terminate the branch.
        Err(()) => {}
    }
    Ok(())
}

fn walk_value(value: &ValueDef, def: &ContainerDef, path: &mut Vec<String>) -> CanisterResult<()> {
    match value {
        ValueDef::Constant(_) => Ok(()),
        ValueDef::ServiceRef(name) => walk_service(name, def, path),
        ValueDef::List(values) => {
            for value in values {
                walk_value(value, def, path)?;
            }
            Ok(())
        }
        ValueDef::Record(fields) => {
            for value in fields.values() {
                walk_value(value, def, path)?;
            }
            Ok(())
        }
    }
}
