//! Deterministic text rendering of validated models.
//!
//! Sequence, ER and flowchart models render to Mermaid; use-case diagrams to
//! PlantUML. Renderers trust the model: references were checked by the
//! validator and are not checked again.

pub mod er;
pub mod flow;
pub mod sequence;
pub mod usecase;

use std::collections::{HashMap, HashSet};

use crate::DiagramModel;

pub fn render(model: &DiagramModel) -> String {
    match model {
        DiagramModel::Sequence(d) => sequence::render(d),
        DiagramModel::Er(m) => er::render(m),
        DiagramModel::Flowchart(g) => flow::render(g),
        DiagramModel::UseCase(d) => usecase::render(d),
    }
}

/// Identifier safe for Mermaid and PlantUML: anything outside `[A-Za-z0-9_]`
/// becomes `_`, and a leading digit gets a `_` prefix.
pub fn safe_id(raw: &str) -> String {
    let mut out: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Markup ids for declared names. Distinct names whose safe forms collide
/// get `_2`, `_3`, ... in order of declaration.
#[derive(Debug, Default)]
pub struct IdMap<'a> {
    ids: HashMap<&'a str, String>,
    taken: HashSet<String>,
}

impl<'a> IdMap<'a> {
    pub fn declare(&mut self, name: &'a str, base: String) {
        if self.ids.contains_key(name) {
            return;
        }
        let id = self.fresh(base);
        self.ids.insert(name, id);
    }

    /// Reserve an id not bound to any name.
    pub fn fresh(&mut self, base: String) -> String {
        let mut id = base.clone();
        let mut n = 2;
        while !self.taken.insert(id.clone()) {
            id = format!("{base}_{n}");
            n += 1;
        }
        id
    }

    /// The id declared for `name`, or `fallback` applied to it.
    pub fn get(&self, name: &str, fallback: fn(&str) -> String) -> String {
        self.ids
            .get(name)
            .cloned()
            .unwrap_or_else(|| fallback(name))
    }
}

/// Label text for a double-quoted Mermaid string.
pub fn escape_label(raw: &str) -> String {
    raw.replace('"', "#quot;").replace('\n', " ")
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("    ");
    }
}
