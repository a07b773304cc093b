//! ER models are extracted in two steps, so the entity list and the
//! relationship list can each be validated on their own. [`validate`] checks
//! a complete model.

use serde_json::Value;

use super::{kind_of, list_or_none, Cursor, Result};
use crate::er::*;

pub fn validate(json: &Value) -> Result<ErModel> {
    let entities = entities(json)?;
    let names: Vec<String> = entities.iter().map(|e| e.name.clone()).collect();
    let root = Cursor::root(json);
    let relationships = root
        .optional_array("Relationships")?
        .iter()
        .map(|r| relationship(r, &names))
        .collect::<Result<Vec<_>>>()?;
    Ok(ErModel {
        entities,
        relationships,
    })
}

/// Validate `{"Entities": [...]}`. Names are normalized and must be unique.
pub fn entities(json: &Value) -> Result<Vec<Entity>> {
    let root = Cursor::root(json);
    root.as_object()?;
    let mut out: Vec<Entity> = Vec::new();
    for item in root.non_empty_array("Entities")? {
        let name_field = item.field("Name")?;
        let name = normalize_entity_name(&name_field.text()?);
        if out.iter().any(|e| e.name == name) {
            return Err(name_field.error(format!("duplicate entity `{name}`")));
        }
        let properties = item
            .optional_array("Properties")?
            .iter()
            .map(property)
            .collect::<Result<Vec<_>>>()?;
        out.push(Entity { name, properties });
    }
    Ok(out)
}

/// Validate `{"Relationships": [...]}` against already-extracted entity names.
pub fn relationships(json: &Value, entity_names: &[String]) -> Result<Vec<Relationship>> {
    let root = Cursor::root(json);
    root.as_object()?;
    root.array("Relationships")?
        .iter()
        .map(|r| relationship(r, entity_names))
        .collect()
}

fn property(item: &Cursor<'_>) -> Result<Property> {
    let role = match item.get("Role") {
        None => KeyRole::None,
        Some(c) => match c.value() {
            Value::String(raw) => KeyRole::parse(raw.trim()).ok_or_else(|| {
                c.error(format!("invalid value `{raw}`, expected one of PK, FK, \"\""))
            })?,
            other => {
                return Err(c.error(format!("expected a string, found {}", kind_of(other))))
            }
        },
    };
    Ok(Property {
        type_name: item.string("Type")?,
        name: item.string("Name")?,
        role,
        description: item.string_or_empty("Description")?,
    })
}

fn relationship(item: &Cursor<'_>, names: &[String]) -> Result<Relationship> {
    let allowed: Vec<&str> = Cardinality::ALL.iter().map(|c| c.name()).collect();
    Ok(Relationship {
        source_entity_name: entity_ref(item, "SourceEntityName", names)?,
        dest_entity_name: entity_ref(item, "DestinationEntityName", names)?,
        source_cardinality: item.choice("SourceCardinality", Cardinality::parse, &allowed)?,
        dest_cardinality: item.choice("DestinationCardinality", Cardinality::parse, &allowed)?,
        description: item.string_or_empty("Description")?,
    })
}

fn entity_ref(item: &Cursor<'_>, key: &str, names: &[String]) -> Result<String> {
    let field = item.field(key)?;
    let name = normalize_entity_name(&field.text()?);
    if names.contains(&name) {
        Ok(name)
    } else {
        Err(field.error(format!(
            "unknown entity `{name}`; declared: {}",
            list_or_none(names)
        )))
    }
}
