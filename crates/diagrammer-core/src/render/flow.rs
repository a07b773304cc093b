use super::{escape_label, indent, safe_id, IdMap};
use crate::flow::*;

/// Subflows with at most this many nodes are drawn inline.
pub const INLINE_SUBFLOW_MAX: usize = 3;

/// Render as a Mermaid `graph TD`.
pub fn render(graph: &FlowGraph) -> String {
    let mut ids = IdMap::default();
    let all_nodes = graph
        .nodes
        .iter()
        .chain(graph.subflows.iter().flat_map(|s| s.nodes.iter()));
    for node in all_nodes {
        ids.declare(&node.id, node_id(&node.id));
    }

    let mut out = String::with_capacity(1024);
    out.push_str("graph TD\n");
    for node in &graph.nodes {
        write_node(&mut out, &ids, node, 1);
    }
    for sub in &graph.subflows {
        if sub.nodes.len() <= INLINE_SUBFLOW_MAX {
            for node in &sub.nodes {
                write_node(&mut out, &ids, node, 1);
            }
        } else {
            let sub_id = ids.fresh(node_id(&sub.id));
            indent(&mut out, 1);
            out.push_str(&format!(
                "subgraph {}[\"{}\"]\n",
                sub_id,
                escape_label(&sub.title)
            ));
            for node in &sub.nodes {
                write_node(&mut out, &ids, node, 2);
            }
            indent(&mut out, 1);
            out.push_str("end\n");
        }
    }
    let edges = graph
        .edges
        .iter()
        .chain(graph.subflows.iter().flat_map(|s| s.edges.iter()));
    for edge in edges {
        write_edge(&mut out, &ids, edge);
    }
    out
}

/// Mermaid reads a bare `end` as the close of a subgraph.
fn node_id(raw: &str) -> String {
    let id = safe_id(raw);
    if id.eq_ignore_ascii_case("end") {
        format!("{id}_")
    } else {
        id
    }
}

fn write_node(out: &mut String, ids: &IdMap<'_>, node: &FlowNode, depth: usize) {
    let (open, close) = shape(node.node_type);
    indent(out, depth);
    out.push_str(&format!(
        "{}{}\"{}\"{}\n",
        ids.get(&node.id, node_id),
        open,
        escape_label(&node.label),
        close
    ));
}

fn shape(node_type: NodeType) -> (&'static str, &'static str) {
    match node_type {
        NodeType::Start | NodeType::End => ("([", "])"),
        NodeType::Process => ("[", "]"),
        NodeType::Decision => ("{", "}"),
        NodeType::InputOutput => ("[/", "/]"),
        NodeType::Subroutine => ("[[", "]]"),
        NodeType::Document => (">", "]"),
        NodeType::Database => ("[(", ")]"),
        NodeType::Connector => ("((", "))"),
    }
}

fn connector(edge_type: EdgeType) -> &'static str {
    match edge_type {
        EdgeType::Solid => "-->",
        EdgeType::Dotted => "-.->",
        EdgeType::Thick => "==>",
        EdgeType::Open => "---",
    }
}

fn write_edge(out: &mut String, ids: &IdMap<'_>, edge: &FlowEdge) {
    indent(out, 1);
    out.push_str(&ids.get(&edge.source_id, node_id));
    out.push(' ');
    out.push_str(connector(edge.edge_type));
    if let Some(label) = edge.label.as_deref().filter(|l| !l.is_empty()) {
        out.push_str(&format!("|\"{}\"|", escape_label(label)));
    }
    out.push(' ');
    out.push_str(&ids.get(&edge.target_id, node_id));
    out.push('\n');
}
