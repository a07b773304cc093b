//! Step catalogue per diagram type.

pub mod er;
pub mod flowchart;
pub mod sequence;
pub mod usecase;

use serde::Serialize;
use serde_json::Value;

use diagrammer_core::{DiagramModel, DiagramType, ValidationError};

use crate::error::PipelineError;
use crate::pipeline::{Stage, StepOutputs};

/// How one diagram type is extracted and put back together.
pub struct Plan {
    pub stages: Vec<Stage>,
    pub assemble: fn(&StepOutputs) -> Result<DiagramModel, PipelineError>,
}

pub fn plan(diagram_type: DiagramType) -> Option<Plan> {
    match diagram_type {
        DiagramType::Sequence => Some(sequence::plan()),
        DiagramType::Er => Some(er::plan()),
        DiagramType::Flowchart => Some(flowchart::plan()),
        DiagramType::UseCase => Some(usecase::plan()),
        DiagramType::State => None,
    }
}

/// Canonical wire form of a validated fragment.
fn wire<T: Serialize>(fragment: &T) -> Result<Value, ValidationError> {
    serde_json::to_value(fragment).map_err(|e| ValidationError::new("", e.to_string()))
}

/// Re-run the whole-model validator on an assembled model.
fn revalidate(model: &DiagramModel) -> Result<DiagramModel, PipelineError> {
    let json = model
        .to_wire()
        .map_err(|e| PipelineError::Assembly(e.to_string()))?;
    diagrammer_core::validate(&json, model.diagram_type())
        .map_err(|e| PipelineError::Assembly(e.to_string()))
}
