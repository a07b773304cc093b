use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeType {
    Start,
    End,
    Process,
    Decision,
    InputOutput,
    Subroutine,
    Document,
    Database,
    Connector,
}

impl NodeType {
    pub const ALL: [NodeType; 9] = [
        NodeType::Start,
        NodeType::End,
        NodeType::Process,
        NodeType::Decision,
        NodeType::InputOutput,
        NodeType::Subroutine,
        NodeType::Document,
        NodeType::Database,
        NodeType::Connector,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NodeType::Start => "Start",
            NodeType::End => "End",
            NodeType::Process => "Process",
            NodeType::Decision => "Decision",
            NodeType::InputOutput => "InputOutput",
            NodeType::Subroutine => "Subroutine",
            NodeType::Document => "Document",
            NodeType::Database => "Database",
            NodeType::Connector => "Connector",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|t| t.name().eq_ignore_ascii_case(s))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum EdgeType {
    #[default]
    Solid,
    Dotted,
    Thick,
    Open,
}

impl EdgeType {
    pub const ALL: [EdgeType; 4] = [
        EdgeType::Solid,
        EdgeType::Dotted,
        EdgeType::Thick,
        EdgeType::Open,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EdgeType::Solid => "Solid",
            EdgeType::Dotted => "Dotted",
            EdgeType::Thick => "Thick",
            EdgeType::Open => "Open",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|t| t.name().eq_ignore_ascii_case(s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct FlowNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "Type")]
    pub node_type: NodeType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct FlowEdge {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "Type", default)]
    pub edge_type: EdgeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A named group of nodes, e.g. one alternative or exception path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Subflow {
    pub id: String,
    pub title: String,
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subflows: Vec<Subflow>,
}

impl FlowGraph {
    /// All nodes, top-level first, then each subflow in order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.nodes
            .iter()
            .chain(self.subflows.iter().flat_map(|s| s.nodes.iter()))
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.all_nodes().find(|n| n.id == id)
    }
}
