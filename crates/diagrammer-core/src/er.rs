use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum Cardinality {
    ZeroOrOne,
    ExactlyOne,
    ZeroOrMore,
    OneOrMore,
}

impl Cardinality {
    pub const ALL: [Cardinality; 4] = [
        Cardinality::ZeroOrOne,
        Cardinality::ExactlyOne,
        Cardinality::ZeroOrMore,
        Cardinality::OneOrMore,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Cardinality::ZeroOrOne => "ZeroOrOne",
            Cardinality::ExactlyOne => "ExactlyOne",
            Cardinality::ZeroOrMore => "ZeroOrMore",
            Cardinality::OneOrMore => "OneOrMore",
        }
    }

    /// Crow's-foot token as written on the left-hand (source) side.
    pub fn token(self) -> &'static str {
        match self {
            Cardinality::ZeroOrOne => "|o",
            Cardinality::ExactlyOne => "||",
            Cardinality::ZeroOrMore => "}o",
            Cardinality::OneOrMore => "}|",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|c| c.name().eq_ignore_ascii_case(s))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum KeyRole {
    #[serde(rename = "PK")]
    Primary,
    #[serde(rename = "FK")]
    Foreign,
    #[default]
    #[serde(rename = "")]
    None,
}

impl KeyRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PK" => Some(KeyRole::Primary),
            "FK" => Some(KeyRole::Foreign),
            "" => Some(KeyRole::None),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyRole::Primary => "PK",
            KeyRole::Foreign => "FK",
            KeyRole::None => "",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Property {
    /// Column type, e.g. "int", "string", "datetime"
    #[serde(rename = "Type")]
    pub type_name: String,
    pub name: String,
    /// "PK", "FK" or ""
    #[serde(default)]
    pub role: KeyRole,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Entity {
    /// Unique entity name in UPPER_SNAKE_CASE
    pub name: String,
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Relationship {
    pub source_entity_name: String,
    #[serde(rename = "DestinationEntityName")]
    pub dest_entity_name: String,
    pub source_cardinality: Cardinality,
    #[serde(rename = "DestinationCardinality")]
    pub dest_cardinality: Cardinality,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ErModel {
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// Canonical entity name: upper case, inner whitespace collapsed to `_`.
pub fn normalize_entity_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_names_normalize() {
        assert_eq!(normalize_entity_name(" order  item "), "ORDER_ITEM");
        assert_eq!(normalize_entity_name("Customer"), "CUSTOMER");
    }

    #[test]
    fn key_role_parses_case_insensitively() {
        assert_eq!(KeyRole::parse("pk"), Some(KeyRole::Primary));
        assert_eq!(KeyRole::parse(""), Some(KeyRole::None));
        assert_eq!(KeyRole::parse("UK"), None);
    }
}
