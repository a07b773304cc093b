pub mod er;
pub mod flow;
pub mod render;
pub mod sequence;
pub mod usecase;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

pub use er::{Cardinality, Entity, ErModel, KeyRole, Property, Relationship};
pub use flow::{EdgeType, FlowEdge, FlowGraph, FlowNode, NodeType, Subflow};
pub use render::render;
pub use sequence::{
    AltBlock, AltBranch, ArrowType, CriticalBlock, LoopBlock, OptionBlock, ParallelBlock,
    ParallelBranch, SequenceDiagram, SequenceElement, Statement,
};
pub use usecase::{Actor, Association, Extend, Include, Package, UseCase, UseCaseDiagram};
pub use validate::{validate, ValidationError};

// --- Diagram types ---

/// Selects which prompts, validators and renderers handle a request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DiagramType {
    Flowchart,
    Sequence,
    Er,
    UseCase,
    State,
}

impl DiagramType {
    /// Types with a complete prompt → validate → render chain.
    pub const WIRED: [DiagramType; 4] = [
        DiagramType::Flowchart,
        DiagramType::Er,
        DiagramType::Sequence,
        DiagramType::UseCase,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DiagramType::Flowchart => "flowchart",
            DiagramType::Sequence => "sequence",
            DiagramType::Er => "er",
            DiagramType::UseCase => "usecase",
            DiagramType::State => "state",
        }
    }
}

impl fmt::Display for DiagramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown diagram type `{0}` (expected flowchart, sequence, er, usecase or state)")]
pub struct UnknownDiagramType(pub String);

impl FromStr for DiagramType {
    type Err = UnknownDiagramType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flowchart" | "flow" => Ok(DiagramType::Flowchart),
            "sequence" | "seq" => Ok(DiagramType::Sequence),
            "er" | "entity" | "entity-relationship" => Ok(DiagramType::Er),
            "usecase" | "use-case" | "use_case" => Ok(DiagramType::UseCase),
            "state" => Ok(DiagramType::State),
            _ => Err(UnknownDiagramType(s.to_string())),
        }
    }
}

/// A fully validated diagram, owned by the request that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DiagramModel {
    Sequence(SequenceDiagram),
    Er(ErModel),
    Flowchart(FlowGraph),
    UseCase(UseCaseDiagram),
}

impl DiagramModel {
    pub fn diagram_type(&self) -> DiagramType {
        match self {
            DiagramModel::Sequence(_) => DiagramType::Sequence,
            DiagramModel::Er(_) => DiagramType::Er,
            DiagramModel::Flowchart(_) => DiagramType::Flowchart,
            DiagramModel::UseCase(_) => DiagramType::UseCase,
        }
    }

    /// Serialize to the same JSON shape the validators accept.
    pub fn to_wire(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

// --- AI Settings ---

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
}

/// Resolve the per-user data directory (~/.diagrammer/).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".diagrammer")
}

fn settings_path() -> PathBuf {
    data_dir().join("settings.json")
}

/// Read the saved AI settings. Missing or unreadable files yield defaults.
pub fn read_settings() -> AiSettings {
    let path = settings_path();
    if !path.exists() {
        return AiSettings::default();
    }
    match fs::read_to_string(&path)
        .map_err(SettingsError::from)
        .and_then(|s| serde_json::from_str(&s).map_err(SettingsError::from))
    {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!(path:? = path; "Ignoring unreadable settings file: {e}");
            AiSettings::default()
        }
    }
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}
