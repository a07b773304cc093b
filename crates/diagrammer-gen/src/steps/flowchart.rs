//! Flowcharts are extracted as one basic flow plus independent alternative
//! and exception flows. A branch-point step says where each extra flow
//! leaves the basic flow and where it rejoins. Decision nodes are then
//! inserted without another LLM call.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use diagrammer_core::validate::flow::{edge_list, node_list};
use diagrammer_core::validate::{flow, reference, resolve_name, Cursor};
use diagrammer_core::{
    DiagramModel, EdgeType, FlowEdge, FlowGraph, FlowNode, NodeType, Subflow, ValidationError,
};

use super::{revalidate, wire, Plan};
use crate::error::PipelineError;
use crate::pipeline::{OrderedStep, Stage, StepOutputs};
use crate::prompt::{self, PromptContext};

pub const BASIC_FLOW: &str = "basic_flow";
pub const ALTERNATIVE_FLOWS: &str = "alternative_flows";
pub const EXCEPTION_FLOWS: &str = "exception_flows";
pub const BRANCH_POINTS: &str = "branch_points";

const NODE_TYPES: &str = "Start, End, Process, Decision, InputOutput, Subroutine, Document, \
                          Database, Connector";

const BASIC_SCHEMA: &str = r#"{
  "Nodes": [
    {"Id": "start", "Label": "Start", "Type": "Start"},
    {"Id": "enter_credentials", "Label": "User enters credentials", "Type": "InputOutput"},
    {"Id": "end", "Label": "Logged in", "Type": "End"}
  ],
  "Edges": [
    {"SourceId": "start", "TargetId": "enter_credentials", "Type": "Solid"},
    {"SourceId": "enter_credentials", "TargetId": "end", "Type": "Solid", "Label": "optional"}
  ]
}"#;

const BRANCH_SCHEMA: &str = r#"{
  "Flows": [
    {
      "Name": "Invalid password",
      "Condition": "Password is wrong",
      "Nodes": [{"Id": "show_error", "Label": "Show error message", "Type": "Process"}],
      "Edges": []
    }
  ]
}
Edges connect nodes of the same flow only. Return an empty Flows list when there are none."#;

const BRANCH_POINTS_SCHEMA: &str = r#"{
  "BranchPoints": [
    {"FlowId": "alt_1", "BranchNodeId": "enter_credentials", "RejoinNodeId": "enter_credentials"},
    {"FlowId": "exc_1", "BranchNodeId": "enter_credentials", "RejoinNodeId": null}
  ]
}
Give exactly one entry per flow id. RejoinNodeId is null when the flow ends on its own."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchKind {
    Alternative,
    Exception,
}

impl BranchKind {
    fn prefix(self) -> &'static str {
        match self {
            BranchKind::Alternative => "alt",
            BranchKind::Exception => "exc",
        }
    }

    fn step(self) -> &'static str {
        match self {
            BranchKind::Alternative => ALTERNATIVE_FLOWS,
            BranchKind::Exception => EXCEPTION_FLOWS,
        }
    }
}

/// An alternative or exception flow as extracted, with node ids local to
/// the flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BranchFlow {
    pub name: String,
    pub condition: String,
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BranchPoint {
    pub flow_id: String,
    pub branch_node_id: String,
    #[serde(default)]
    pub rejoin_node_id: Option<String>,
}

pub fn plan() -> Plan {
    Plan {
        stages: vec![
            Stage::Concurrent(vec![
                OrderedStep {
                    name: BASIC_FLOW,
                    progress: "Extracting basic flow...",
                    prompt: basic_prompt,
                    validate: basic,
                    skip: None,
                },
                OrderedStep {
                    name: ALTERNATIVE_FLOWS,
                    progress: "Extracting alternative flows...",
                    prompt: alternative_prompt,
                    validate: branch_flows,
                    skip: None,
                },
                OrderedStep {
                    name: EXCEPTION_FLOWS,
                    progress: "Extracting exception flows...",
                    prompt: exception_prompt,
                    validate: branch_flows,
                    skip: None,
                },
            ]),
            Stage::Single(OrderedStep {
                name: BRANCH_POINTS,
                progress: "Locating branch points...",
                prompt: branch_points_prompt,
                validate: branch_points,
                skip: Some(no_branches),
            }),
        ],
        assemble,
    }
}

fn basic_prompt(input: &str, _: &StepOutputs) -> Result<PromptContext, PipelineError> {
    Ok(PromptContext::new(prompt::task(
        BASIC_FLOW,
        &format!(
            "Describe the main success scenario of the use case as a flowchart. Exactly one node \
             has Type Start and at least one has Type End. Node Ids are unique snake_case. Node \
             Type is one of {NODE_TYPES}. Edge Type is one of Solid, Dotted, Thick, Open. Leave \
             out alternative and exception paths."
        ),
        BASIC_SCHEMA,
        input,
    )))
}

fn basic(json: &Value, _: &StepOutputs) -> Result<Value, ValidationError> {
    wire(&flow::validate(json)?)
}

fn alternative_prompt(input: &str, _: &StepOutputs) -> Result<PromptContext, PipelineError> {
    Ok(PromptContext::new(prompt::task(
        ALTERNATIVE_FLOWS,
        &format!(
            "List the alternative flows of the use case: other ways the goal can still be \
             reached. Give each flow the condition that triggers it and only the steps that \
             differ from the main scenario. Node Type is one of {NODE_TYPES} except Start."
        ),
        BRANCH_SCHEMA,
        input,
    )))
}

fn exception_prompt(input: &str, _: &StepOutputs) -> Result<PromptContext, PipelineError> {
    Ok(PromptContext::new(prompt::task(
        EXCEPTION_FLOWS,
        &format!(
            "List the exception flows of the use case: errors and failures that stop the goal \
             from being reached. Give each flow the condition that triggers it and its steps. \
             Node Type is one of {NODE_TYPES} except Start; end a flow with an End node when \
             the use case stops there."
        ),
        BRANCH_SCHEMA,
        input,
    )))
}

/// `{"Flows": [...]}` with node ids unique within each flow.
fn branch_flows(json: &Value, _: &StepOutputs) -> Result<Value, ValidationError> {
    let root = Cursor::root(json);
    root.as_object()?;
    let mut flows = Vec::new();
    let mut names: Vec<String> = Vec::new();
    for item in root.array("Flows")? {
        let name_field = item.field("Name")?;
        let name = name_field.text()?;
        if resolve_name(&name, &names).is_some() {
            return Err(name_field.error(format!("duplicate flow `{name}`")));
        }
        names.push(name.clone());

        let mut ids = Vec::new();
        let nodes = node_list(&item, "Nodes", true, &mut ids)?;
        if let Some(i) = nodes.iter().position(|n| n.node_type == NodeType::Start) {
            return Err(ValidationError::new(
                format!("{}.Nodes[{i}].Type", item.path()),
                "only the basic flow may contain a Start node",
            ));
        }
        flows.push(BranchFlow {
            name,
            condition: item.string("Condition")?,
            nodes,
            edges: edge_list(&item, "Edges", false, &ids)?,
        });
    }
    wire(&flows)
}

fn no_branches(outputs: &StepOutputs) -> bool {
    branch_ids(outputs).is_empty()
}

/// Ids the branch-point step refers to flows by, e.g. `alt_1`, `exc_2`.
fn branch_ids(outputs: &StepOutputs) -> Vec<String> {
    [BranchKind::Alternative, BranchKind::Exception]
        .into_iter()
        .flat_map(|kind| {
            let count = outputs
                .value(kind.step())
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            (1..=count).map(move |i| format!("{}_{i}", kind.prefix()))
        })
        .collect()
}

fn branch_points_prompt(
    input: &str,
    outputs: &StepOutputs,
) -> Result<PromptContext, PipelineError> {
    let mut flows = serde_json::Map::new();
    for kind in [BranchKind::Alternative, BranchKind::Exception] {
        let list: Vec<BranchFlow> = outputs.get(kind.step())?;
        for (i, f) in list.iter().enumerate() {
            flows.insert(
                format!("{}_{}", kind.prefix(), i + 1),
                json!({"Name": f.name, "Condition": f.condition}),
            );
        }
    }
    let context = PromptContext::new(prompt::task(
        BRANCH_POINTS,
        "For every alternative and exception flow, name the node of the basic flow where it \
         branches off and, if it returns to the basic flow, the node where it rejoins. Use \
         node ids from the basic flow and the flow ids given.",
        BRANCH_POINTS_SCHEMA,
        input,
    ));
    Ok(context
        .with_input(BASIC_FLOW, outputs.value(BASIC_FLOW).cloned().unwrap_or_default())
        .with_input("flows", Value::Object(flows)))
}

fn branch_points(json: &Value, outputs: &StepOutputs) -> Result<Value, ValidationError> {
    let root = Cursor::root(json);
    root.as_object()?;
    let flow_ids = branch_ids(outputs);
    let basic: FlowGraph = outputs
        .get(BASIC_FLOW)
        .map_err(|e| root.error(e.to_string()))?;
    let node_ids: Vec<String> = basic.nodes.iter().map(|n| n.id.clone()).collect();

    let mut points: Vec<BranchPoint> = Vec::new();
    for item in root.array("BranchPoints")? {
        let flow_id = reference(&item, "FlowId", &flow_ids, "flow id")?;
        if points.iter().any(|p| p.flow_id == flow_id) {
            return Err(item.error(format!("flow `{flow_id}` has more than one branch point")));
        }
        let branch_node_id =
            reference(&item, "BranchNodeId", &node_ids, "node")?;
        if basic.node(&branch_node_id).map(|n| n.node_type) == Some(NodeType::End) {
            return Err(item.error(format!("cannot branch from End node `{branch_node_id}`")));
        }
        let rejoin_node_id = match item.optional_string("RejoinNodeId")? {
            None => None,
            Some(_) => Some(reference(&item, "RejoinNodeId", &node_ids, "node")?),
        };
        points.push(BranchPoint {
            flow_id,
            branch_node_id,
            rejoin_node_id,
        });
    }

    let missing: Vec<&str> = flow_ids
        .iter()
        .filter(|id| !points.iter().any(|p| &p.flow_id == *id))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(root.error(format!("missing branch points for: {}", missing.join(", "))));
    }
    wire(&points)
}

fn assemble(outputs: &StepOutputs) -> Result<DiagramModel, PipelineError> {
    let basic: FlowGraph = outputs.get(BASIC_FLOW)?;
    let mut branches = Vec::new();
    for kind in [BranchKind::Alternative, BranchKind::Exception] {
        let flows: Vec<BranchFlow> = outputs.get(kind.step())?;
        for (i, flow) in flows.into_iter().enumerate() {
            branches.push((format!("{}_{}", kind.prefix(), i + 1), kind, flow));
        }
    }
    let points: Vec<BranchPoint> = if branches.is_empty() {
        Vec::new()
    } else {
        outputs.get(BRANCH_POINTS)?
    };

    let graph = insert_decisions(basic, branches, &points)?;
    revalidate(&DiagramModel::Flowchart(graph))
}

/// Attach each branch flow to the basic flow through a decision node.
///
/// One decision node is created per branch node. The branch node's original
/// outgoing edges leave the decision instead, labelled `otherwise` when they
/// had no label. Each branch becomes a subflow whose node ids are prefixed
/// with the flow id; it is entered from the decision on its condition and,
/// when a rejoin node is given, its last node leads back to it. Exception
/// paths are drawn dotted.
pub fn insert_decisions(
    mut basic: FlowGraph,
    branches: Vec<(String, BranchKind, BranchFlow)>,
    points: &[BranchPoint],
) -> Result<FlowGraph, PipelineError> {
    let mut taken: Vec<String> = basic.all_nodes().map(|n| n.id.clone()).collect();
    let mut decisions: Vec<(String, String)> = Vec::new();

    for (flow_id, kind, flow) in branches {
        let point = points
            .iter()
            .find(|p| p.flow_id == flow_id)
            .ok_or_else(|| PipelineError::Assembly(format!("no branch point for `{flow_id}`")))?;

        let decision = match decisions.iter().find(|(branch, _)| *branch == point.branch_node_id) {
            Some((_, decision)) => decision.clone(),
            None => {
                let decision = add_decision(&mut basic, &point.branch_node_id, &mut taken)?;
                decisions.push((point.branch_node_id.clone(), decision.clone()));
                decision
            }
        };

        let local = |id: &str| format!("{flow_id}_{id}");
        let connector = match kind {
            BranchKind::Alternative => EdgeType::Solid,
            BranchKind::Exception => EdgeType::Dotted,
        };
        let nodes: Vec<FlowNode> = flow
            .nodes
            .iter()
            .map(|n| FlowNode {
                id: local(&n.id),
                ..n.clone()
            })
            .collect();
        let mut edges: Vec<FlowEdge> = flow
            .edges
            .iter()
            .map(|e| FlowEdge {
                source_id: local(&e.source_id),
                target_id: local(&e.target_id),
                ..e.clone()
            })
            .collect();
        for node in &nodes {
            if taken.contains(&node.id) {
                return Err(PipelineError::Assembly(format!("node id `{}` is not unique", node.id)));
            }
            taken.push(node.id.clone());
        }

        let (first, last) = match (nodes.first(), nodes.last()) {
            (Some(first), Some(last)) => (first.id.clone(), last.clone()),
            _ => return Err(PipelineError::Assembly(format!("flow `{flow_id}` has no nodes"))),
        };
        edges.insert(
            0,
            FlowEdge {
                source_id: decision.clone(),
                target_id: first,
                edge_type: connector,
                label: Some(flow.condition.clone()),
            },
        );
        if let Some(rejoin) = &point.rejoin_node_id {
            if last.node_type != NodeType::End {
                edges.push(FlowEdge {
                    source_id: last.id.clone(),
                    target_id: rejoin.clone(),
                    edge_type: connector,
                    label: None,
                });
            }
        }

        basic.subflows.push(Subflow {
            id: flow_id,
            title: flow.name,
            nodes,
            edges,
        });
    }
    Ok(basic)
}

/// Put a decision node after `branch_node`, returning its id.
fn add_decision(
    graph: &mut FlowGraph,
    branch_node: &str,
    taken: &mut Vec<String>,
) -> Result<String, PipelineError> {
    let label = graph
        .node(branch_node)
        .map(|n| n.label.clone())
        .ok_or_else(|| PipelineError::Assembly(format!("unknown branch node `{branch_node}`")))?;

    let mut id = format!("{branch_node}_decision");
    let mut n = 2;
    while taken.contains(&id) {
        id = format!("{branch_node}_decision_{n}");
        n += 1;
    }
    taken.push(id.clone());

    for edge in graph.edges.iter_mut().filter(|e| e.source_id == branch_node) {
        edge.source_id = id.clone();
        edge.label.get_or_insert_with(|| "otherwise".to_string());
    }
    graph.edges.push(FlowEdge {
        source_id: branch_node.to_string(),
        target_id: id.clone(),
        edge_type: EdgeType::Solid,
        label: None,
    });
    graph.nodes.push(FlowNode {
        id: id.clone(),
        label: format!("Outcome of: {label}"),
        node_type: NodeType::Decision,
    });
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, node_type: NodeType) -> FlowNode {
        FlowNode {
            id: id.into(),
            label: id.to_uppercase(),
            node_type,
        }
    }

    fn edge(from: &str, to: &str) -> FlowEdge {
        FlowEdge {
            source_id: from.into(),
            target_id: to.into(),
            edge_type: EdgeType::Solid,
            label: None,
        }
    }

    fn basic() -> FlowGraph {
        FlowGraph {
            nodes: vec![
                node("start", NodeType::Start),
                node("login", NodeType::InputOutput),
                node("done", NodeType::End),
            ],
            edges: vec![edge("start", "login"), edge("login", "done")],
            subflows: vec![],
        }
    }

    fn branch(name: &str, nodes: Vec<FlowNode>, edges: Vec<FlowEdge>) -> BranchFlow {
        BranchFlow {
            name: name.into(),
            condition: format!("{name} happens"),
            nodes,
            edges,
        }
    }

    #[test]
    fn decision_reroutes_branch_node_edges() {
        let branches = vec![
            (
                "alt_1".to_string(),
                BranchKind::Alternative,
                branch("Retry", vec![node("retry", NodeType::Process)], vec![]),
            ),
            (
                "exc_1".to_string(),
                BranchKind::Exception,
                branch(
                    "Locked",
                    vec![node("lock", NodeType::Process), node("stop", NodeType::End)],
                    vec![edge("lock", "stop")],
                ),
            ),
        ];
        let points = vec![
            BranchPoint {
                flow_id: "alt_1".into(),
                branch_node_id: "login".into(),
                rejoin_node_id: Some("login".into()),
            },
            BranchPoint {
                flow_id: "exc_1".into(),
                branch_node_id: "login".into(),
                rejoin_node_id: None,
            },
        ];

        let graph = insert_decisions(basic(), branches, &points).unwrap();

        let decisions: Vec<&FlowNode> = graph
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Decision)
            .collect();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].id, "login_decision");

        let rerouted = graph
            .edges
            .iter()
            .find(|e| e.target_id == "done")
            .unwrap();
        assert_eq!(rerouted.source_id, "login_decision");
        assert_eq!(rerouted.label.as_deref(), Some("otherwise"));

        let alt = &graph.subflows[0];
        assert_eq!(alt.nodes[0].id, "alt_1_retry");
        assert_eq!(alt.edges[0].label.as_deref(), Some("Retry happens"));
        assert_eq!(alt.edges[1].target_id, "login");

        let exc = &graph.subflows[1];
        assert_eq!(exc.edges[0].edge_type, EdgeType::Dotted);
        assert_eq!(exc.edges[1].source_id, "exc_1_lock");
        assert_eq!(exc.edges.len(), 2);

        let json = serde_json::to_value(&graph).unwrap();
        assert!(flow::validate(&json).is_ok());
    }

    #[test]
    fn decision_id_avoids_collisions() {
        let mut graph = basic();
        graph.nodes.push(node("login_decision", NodeType::Process));
        graph.edges.push(edge("login_decision", "done"));
        let mut taken: Vec<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        let id = add_decision(&mut graph, "login", &mut taken).unwrap();
        assert_eq!(id, "login_decision_2");
    }

    #[test]
    fn branch_flows_reject_start_nodes() {
        let json = json!({"Flows": [{
            "Name": "Odd", "Condition": "c",
            "Nodes": [{"Id": "s", "Label": "S", "Type": "Start"}]
        }]});
        let err = branch_flows(&json, &StepOutputs::default()).unwrap_err();
        assert_eq!(err.path, "Flows[0].Nodes[0].Type");
    }

    #[test]
    fn branch_points_must_cover_every_flow() {
        let mut outputs = StepOutputs::default();
        outputs.insert(BASIC_FLOW, serde_json::to_value(basic()).unwrap());
        outputs.insert(ALTERNATIVE_FLOWS, json!([{"Name": "a", "Condition": "c", "Nodes": []}]));
        outputs.insert(EXCEPTION_FLOWS, json!([{"Name": "e", "Condition": "c", "Nodes": []}]));

        let json = json!({"BranchPoints": [
            {"FlowId": "alt_1", "BranchNodeId": "login", "RejoinNodeId": "login"}
        ]});
        let err = branch_points(&json, &outputs).unwrap_err();
        assert!(err.reason.contains("exc_1"));

        let json = json!({"BranchPoints": [
            {"FlowId": "alt_1", "BranchNodeId": "done"}
        ]});
        let err = branch_points(&json, &outputs).unwrap_err();
        assert!(err.reason.contains("End node"));
    }

    #[test]
    fn no_branches_skips_branch_points() {
        let mut outputs = StepOutputs::default();
        outputs.insert(ALTERNATIVE_FLOWS, json!([]));
        outputs.insert(EXCEPTION_FLOWS, json!([]));
        assert!(no_branches(&outputs));
    }

    fn branch_outputs(alternatives: Value) -> StepOutputs {
        let mut outputs = StepOutputs::default();
        outputs.insert(BASIC_FLOW, serde_json::to_value(basic()).unwrap());
        outputs.insert(ALTERNATIVE_FLOWS, alternatives);
        outputs.insert(EXCEPTION_FLOWS, json!([]));
        outputs
    }

    #[test]
    fn branch_points_prompt_names_flows_by_id() {
        let retry = branch("Retry", vec![node("retry", NodeType::Process)], vec![]);
        let outputs = branch_outputs(serde_json::to_value(vec![retry]).unwrap());

        let text = branch_points_prompt("input", &outputs).unwrap().render();
        assert!(text.contains(r#""alt_1":{"#));
        assert!(text.contains(r#""Condition":"Retry happens""#));
    }

    #[test]
    fn unreadable_branch_flows_fail_the_prompt() {
        let outputs = branch_outputs(json!({"Flows": "not a list"}));

        let err = branch_points_prompt("input", &outputs).unwrap_err();
        assert!(matches!(err, PipelineError::Assembly(ref m) if m.contains(ALTERNATIVE_FLOWS)));
    }
}
