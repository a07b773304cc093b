use serde_json::Value;

use super::{reference, Cursor, Result};
use crate::flow::*;

pub fn validate(json: &Value) -> Result<FlowGraph> {
    let root = Cursor::root(json);
    root.as_object()?;

    let mut ids = Vec::new();
    let nodes = node_list(&root, "Nodes", true, &mut ids)?;

    let subflow_items = root.optional_array("Subflows")?;
    let mut subflows = Vec::with_capacity(subflow_items.len());
    let mut subflow_nodes = Vec::with_capacity(subflow_items.len());
    for item in &subflow_items {
        subflow_nodes.push(node_list(item, "Nodes", true, &mut ids)?);
    }

    let edges = edge_list(&root, "Edges", true, &ids)?;
    for (item, nodes) in subflow_items.iter().zip(subflow_nodes) {
        subflows.push(Subflow {
            id: item.string("Id")?,
            title: item.string("Title")?,
            nodes,
            edges: edge_list(item, "Edges", false, &ids)?,
        });
    }

    let graph = FlowGraph {
        nodes,
        edges,
        subflows,
    };
    check_terminals(&root, &graph)?;
    Ok(graph)
}

/// Nodes under `key`. Each id is appended to `ids`, which must not already
/// contain it.
pub fn node_list(
    parent: &Cursor<'_>,
    key: &str,
    required: bool,
    ids: &mut Vec<String>,
) -> Result<Vec<FlowNode>> {
    let items = if required {
        parent.non_empty_array(key)?
    } else {
        parent.optional_array(key)?
    };
    let allowed: Vec<&str> = NodeType::ALL.iter().map(|t| t.name()).collect();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let id_field = item.field("Id")?;
        let id = id_field.text()?;
        if ids.contains(&id) {
            return Err(id_field.error(format!("duplicate node id `{id}`")));
        }
        ids.push(id.clone());
        out.push(FlowNode {
            id,
            label: item.string("Label")?,
            node_type: item.choice("Type", NodeType::parse, &allowed)?,
        });
    }
    Ok(out)
}

/// Edges under `key`, each endpoint resolved against `ids`.
pub fn edge_list(
    parent: &Cursor<'_>,
    key: &str,
    required: bool,
    ids: &[String],
) -> Result<Vec<FlowEdge>> {
    let items = if required {
        parent.non_empty_array(key)?
    } else {
        parent.optional_array(key)?
    };
    let allowed: Vec<&str> = EdgeType::ALL.iter().map(|t| t.name()).collect();
    items
        .iter()
        .map(|item| -> Result<FlowEdge> {
            let edge_type = if item.has("Type") {
                item.choice("Type", EdgeType::parse, &allowed)?
            } else {
                EdgeType::default()
            };
            Ok(FlowEdge {
                source_id: reference(item, "SourceId", ids, "node")?,
                target_id: reference(item, "TargetId", ids, "node")?,
                edge_type,
                label: item.optional_string("Label")?,
            })
        })
        .collect()
}

fn check_terminals(root: &Cursor<'_>, graph: &FlowGraph) -> Result<()> {
    let starts: Vec<&str> = graph
        .all_nodes()
        .filter(|n| n.node_type == NodeType::Start)
        .map(|n| n.id.as_str())
        .collect();
    match starts.len() {
        1 => {}
        0 => return Err(root.error("flow has no Start node; exactly one is required")),
        _ => {
            return Err(root.error(format!(
                "flow has {} Start nodes ({}); exactly one is required",
                starts.len(),
                starts.join(", ")
            )))
        }
    }
    if !graph.all_nodes().any(|n| n.node_type == NodeType::End) {
        return Err(root.error("flow has no End node; at least one is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph() -> Value {
        json!({
            "Nodes": [
                {"Id": "start", "Label": "Start", "Type": "Start"},
                {"Id": "login", "Label": "Enter credentials", "Type": "InputOutput"},
                {"Id": "end", "Label": "Done", "Type": "End"}
            ],
            "Edges": [
                {"SourceId": "start", "TargetId": "login"},
                {"SourceId": "login", "TargetId": "end", "Type": "Thick", "Label": "ok"}
            ]
        })
    }

    #[test]
    fn valid_graph_defaults_edge_type() {
        let graph = validate(&graph()).unwrap();
        assert_eq!(graph.edges[0].edge_type, EdgeType::Solid);
        assert_eq!(graph.edges[1].edge_type, EdgeType::Thick);
        assert_eq!(graph.edges[1].label.as_deref(), Some("ok"));
    }

    #[test]
    fn zero_start_nodes_fail() {
        let mut json = graph();
        json["Nodes"][0]["Type"] = json!("Process");
        let err = validate(&json).unwrap_err();
        assert!(err.reason.contains("no Start node"));
    }

    #[test]
    fn two_start_nodes_fail() {
        let mut json = graph();
        json["Nodes"][1]["Type"] = json!("Start");
        let err = validate(&json).unwrap_err();
        assert!(err.reason.contains("2 Start nodes"));
    }

    #[test]
    fn missing_end_fails() {
        let mut json = graph();
        json["Nodes"][2]["Type"] = json!("Process");
        let err = validate(&json).unwrap_err();
        assert!(err.reason.contains("no End node"));
    }

    #[test]
    fn edge_may_target_subflow_node() {
        let mut json = graph();
        json["Subflows"] = json!([{
            "Id": "retry", "Title": "Retry path",
            "Nodes": [{"Id": "retry_1", "Label": "Show error", "Type": "Process"}],
            "Edges": [{"SourceId": "retry_1", "TargetId": "login", "Type": "Dotted"}]
        }]);
        json["Edges"]
            .as_array_mut()
            .unwrap()
            .push(json!({"SourceId": "login", "TargetId": "retry_1"}));
        let graph = validate(&json).unwrap();
        assert_eq!(graph.subflows[0].edges[0].edge_type, EdgeType::Dotted);
        assert!(graph.node("retry_1").is_some());
    }

    #[test]
    fn dangling_edge_reports_path() {
        let mut json = graph();
        json["Edges"][1]["TargetId"] = json!("nowhere");
        let err = validate(&json).unwrap_err();
        assert_eq!(err.path, "Edges[1].TargetId");
        assert!(err.reason.contains("unknown node `nowhere`"));
    }

    #[test]
    fn duplicate_ids_across_subflows_fail() {
        let mut json = graph();
        json["Subflows"] = json!([{
            "Id": "s", "Title": "Dup",
            "Nodes": [{"Id": "login", "Label": "Again", "Type": "Process"}]
        }]);
        let err = validate(&json).unwrap_err();
        assert_eq!(err.path, "Subflows[0].Nodes[0].Id");
    }
}
