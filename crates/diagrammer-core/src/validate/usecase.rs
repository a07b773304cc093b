//! Use-case diagrams are extracted fragment by fragment, so besides the
//! whole-diagram [`validate`] this module checks each fragment against the
//! names extracted before it.
//!
//! Every package can see every other package: a reference resolves if the
//! name is declared anywhere in the diagram.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{list_or_none, reference, resolve_name, Cursor, Result};
use crate::usecase::*;

pub fn validate(json: &Value) -> Result<UseCaseDiagram> {
    let root = Cursor::root(json);
    root.as_object()?;
    let items = root.non_empty_array("Packages")?;

    // Declarations first, so references may point into later packages.
    let mut actors: Vec<String> = Vec::new();
    let mut use_cases: Vec<String> = Vec::new();
    let mut declared = Vec::with_capacity(items.len());
    let mut package_names: Vec<String> = Vec::new();
    for item in &items {
        let name_field = item.field("Name")?;
        let name = name_field.text()?;
        if resolve_name(&name, &package_names).is_some() {
            return Err(name_field.error(format!("duplicate package `{name}`")));
        }
        package_names.push(name.clone());
        let package_actors = named_list(item, "Actors", false, &mut actors, "actor", actor)?;
        let package_use_cases =
            named_list(item, "UseCases", false, &mut use_cases, "use case", use_case)?;
        declared.push((name, package_actors, package_use_cases));
    }
    if use_cases.is_empty() {
        return Err(root.error("diagram declares no use cases"));
    }

    let mut packages = Vec::with_capacity(items.len());
    for (item, (name, actor_list, use_case_list)) in items.iter().zip(declared) {
        let (includes, extends) = include_extend(item, &use_cases)?;
        packages.push(Package {
            name,
            actors: actor_list,
            use_cases: use_case_list,
            associations: association_items(item, false, &actors, &use_cases)?,
            includes,
            extends,
        });
    }
    Ok(UseCaseDiagram { packages })
}

/// `{"Actors": [{"Name", "Description"}]}`
pub fn actor_list(json: &Value) -> Result<Vec<Actor>> {
    let root = Cursor::root(json);
    root.as_object()?;
    named_list(&root, "Actors", true, &mut Vec::new(), "actor", actor)
}

/// `{"UseCases": [{"Name", "Description"}]}`
pub fn use_case_list(json: &Value) -> Result<Vec<UseCase>> {
    let root = Cursor::root(json);
    root.as_object()?;
    named_list(&root, "UseCases", true, &mut Vec::new(), "use case", use_case)
}

/// `{"Associations": [{"Actor", "UseCase"}]}`
pub fn associations(
    json: &Value,
    actors: &[String],
    use_cases: &[String],
) -> Result<Vec<Association>> {
    let root = Cursor::root(json);
    root.as_object()?;
    association_items(&root, true, actors, use_cases)
}

/// `{"Includes": [...], "Extends": [...]}`; both lists may be empty.
pub fn relationships(json: &Value, use_cases: &[String]) -> Result<(Vec<Include>, Vec<Extend>)> {
    let root = Cursor::root(json);
    root.as_object()?;
    include_extend(&root, use_cases)
}

/// A package grouping from the packages step: names only, each resolved to
/// its declared spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageGroup {
    pub name: String,
    pub actors: Vec<String>,
    pub use_cases: Vec<String>,
}

/// `{"Packages": [{"Name", "Actors": [names], "UseCases": [names]}]}`.
///
/// Every use case must land in exactly one package. Actors may be left out.
pub fn package_groups(
    json: &Value,
    actors: &[String],
    use_cases: &[String],
) -> Result<Vec<PackageGroup>> {
    let root = Cursor::root(json);
    root.as_object()?;
    let mut groups: Vec<PackageGroup> = Vec::new();
    let mut placed_actors: Vec<String> = Vec::new();
    let mut placed_use_cases: Vec<String> = Vec::new();
    for item in root.non_empty_array("Packages")? {
        let name_field = item.field("Name")?;
        let name = name_field.text()?;
        if groups.iter().any(|g| g.name.eq_ignore_ascii_case(&name)) {
            return Err(name_field.error(format!("duplicate package `{name}`")));
        }
        let actor_names = placed_names(&item, "Actors", actors, &mut placed_actors, "actor")?;
        let use_case_names =
            placed_names(&item, "UseCases", use_cases, &mut placed_use_cases, "use case")?;
        groups.push(PackageGroup {
            name,
            actors: actor_names,
            use_cases: use_case_names,
        });
    }

    let missing: Vec<String> = use_cases
        .iter()
        .filter(|u| !placed_use_cases.contains(u))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(root.error(format!(
            "use cases not assigned to any package: {}",
            missing.join(", ")
        )));
    }
    Ok(groups)
}

fn actor(name: String, description: String) -> Actor {
    Actor { name, description }
}

fn use_case(name: String, description: String) -> UseCase {
    UseCase { name, description }
}

fn named_list<T>(
    parent: &Cursor<'_>,
    key: &str,
    required: bool,
    seen: &mut Vec<String>,
    what: &str,
    build: fn(String, String) -> T,
) -> Result<Vec<T>> {
    let items = if required {
        parent.non_empty_array(key)?
    } else {
        parent.optional_array(key)?
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let name_field = item.field("Name")?;
        let name = name_field.text()?;
        if resolve_name(&name, seen).is_some() {
            return Err(name_field.error(format!("duplicate {what} `{name}`")));
        }
        seen.push(name.clone());
        out.push(build(name, item.string_or_empty("Description")?));
    }
    Ok(out)
}

fn association_items(
    parent: &Cursor<'_>,
    required: bool,
    actors: &[String],
    use_cases: &[String],
) -> Result<Vec<Association>> {
    let items = if required {
        parent.array("Associations")?
    } else {
        parent.optional_array("Associations")?
    };
    items
        .iter()
        .map(|item| -> Result<Association> {
            Ok(Association {
                actor: reference(item, "Actor", actors, "actor")?,
                use_case: reference(item, "UseCase", use_cases, "use case")?,
            })
        })
        .collect()
}

fn include_extend(
    parent: &Cursor<'_>,
    use_cases: &[String],
) -> Result<(Vec<Include>, Vec<Extend>)> {
    let mut includes = Vec::new();
    for item in parent.optional_array("Includes")? {
        let base = reference(&item, "Base", use_cases, "use case")?;
        let included = reference(&item, "Included", use_cases, "use case")?;
        if base == included {
            return Err(item.error(format!("use case `{base}` cannot include itself")));
        }
        includes.push(Include { base, included });
    }

    let mut extends = Vec::new();
    for item in parent.optional_array("Extends")? {
        let base = reference(&item, "Base", use_cases, "use case")?;
        let extension = reference(&item, "Extension", use_cases, "use case")?;
        if base == extension {
            return Err(item.error(format!("use case `{base}` cannot extend itself")));
        }
        extends.push(Extend {
            base,
            extension,
            condition: item.optional_string("Condition")?,
        });
    }
    Ok((includes, extends))
}

fn placed_names(
    item: &Cursor<'_>,
    key: &str,
    declared: &[String],
    placed: &mut Vec<String>,
    what: &str,
) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in item.optional_array(key)? {
        let raw = entry.text()?;
        let name = resolve_name(&raw, declared).cloned().ok_or_else(|| {
            entry.error(format!(
                "unknown {what} `{raw}`; declared: {}",
                list_or_none(declared)
            ))
        })?;
        if placed.contains(&name) {
            return Err(entry.error(format!("{what} `{name}` is already in another package")));
        }
        placed.push(name.clone());
        out.push(name);
    }
    Ok(out)
}
