use super::{escape_label, indent, safe_id, IdMap};
use crate::er::*;

/// Render as a Mermaid `erDiagram`.
pub fn render(model: &ErModel) -> String {
    let mut names = IdMap::default();
    for entity in &model.entities {
        names.declare(&entity.name, safe_id(&entity.name));
    }

    let mut out = String::with_capacity(1024);
    out.push_str("erDiagram\n");
    for entity in &model.entities {
        indent(&mut out, 1);
        out.push_str(&names.get(&entity.name, safe_id));
        out.push_str(" {\n");
        for p in &entity.properties {
            indent(&mut out, 2);
            out.push_str(&column_type(&p.type_name));
            out.push(' ');
            out.push_str(&safe_id(&p.name));
            if p.role != KeyRole::None {
                out.push(' ');
                out.push_str(p.role.as_str());
            }
            if !p.description.is_empty() {
                out.push_str(" \"");
                out.push_str(&escape_label(&p.description));
                out.push('"');
            }
            out.push('\n');
        }
        indent(&mut out, 1);
        out.push_str("}\n");
    }
    for r in &model.relationships {
        indent(&mut out, 1);
        out.push_str(&format!(
            "{} {} {} : \"{}\"\n",
            names.get(&r.source_entity_name, safe_id),
            connector(r.source_cardinality, r.dest_cardinality),
            names.get(&r.dest_entity_name, safe_id),
            escape_label(&r.description)
        ));
    }
    out
}

/// `||` + `--` + mirrored `}o`, e.g. `||--o{`.
pub fn connector(source: Cardinality, dest: Cardinality) -> String {
    format!("{}--{}", source.token(), mirror(dest.token()))
}

/// Read a left-side token from the right: reverse it and turn the crow's
/// foot around.
fn mirror(token: &str) -> String {
    token
        .chars()
        .rev()
        .map(|c| match c {
            '}' => '{',
            '{' => '}',
            other => other,
        })
        .collect()
}

/// Mermaid attribute types are single words.
fn column_type(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join("_")
}
