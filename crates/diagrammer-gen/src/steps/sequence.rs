use serde_json::Value;

use diagrammer_core::validate::sequence;
use diagrammer_core::{DiagramModel, SequenceDiagram, ValidationError};

use super::{wire, Plan};
use crate::error::PipelineError;
use crate::pipeline::{OrderedStep, Stage, StepOutputs};
use crate::prompt::{self, PromptContext};

pub const ELEMENTS: &str = "elements";

pub const SCHEMA: &str = r#"{
  "Elements": [
    {"Participant1": "User", "Participant2": "WebApp", "Message": "Submit credentials", "ArrowType": "SolidArrow"},
    {"AltBlock": {"Branches": [
      {"Condition": "Credentials valid", "Elements": [ ...elements... ]},
      {"Condition": "Credentials invalid", "Elements": [ ...elements... ]}
    ]}},
    {"LoopBlock": {"Title": "For each item", "Elements": [ ...elements... ]}},
    {"ParallelBlock": {"Branches": [{"Title": "Send email", "Elements": [ ...elements... ]}]}},
    {"CriticalBlock": {"Title": "Save order", "Elements": [ ...elements... ],
      "Options": [{"Condition": "Timeout", "Elements": [ ...elements... ]}]}}
  ]
}
Each element is either a message (Participant1, Participant2, Message, ArrowType) or an
object with exactly one of AltBlock, LoopBlock, ParallelBlock, CriticalBlock.
ArrowType is one of SolidLine, DottedLine, SolidArrow, DottedArrow, SolidCross,
DottedCross, SolidOpen, DottedOpen. Use DottedArrow for replies."#;

pub fn plan() -> Plan {
    Plan {
        stages: vec![Stage::Single(OrderedStep {
            name: ELEMENTS,
            progress: "Extracting sequence elements...",
            prompt,
            validate,
            skip: None,
        })],
        assemble,
    }
}

fn prompt(input: &str, _: &StepOutputs) -> Result<PromptContext, PipelineError> {
    Ok(PromptContext::new(prompt::task(
        ELEMENTS,
        "Describe the interaction in the use case as a sequence diagram. List the messages \
         between participants in the order they happen. Model conditional outcomes with \
         AltBlock, repetition with LoopBlock and concurrent work with ParallelBlock.",
        SCHEMA,
        input,
    )))
}

fn validate(json: &Value, _: &StepOutputs) -> Result<Value, ValidationError> {
    wire(&sequence::validate(json)?)
}

fn assemble(outputs: &StepOutputs) -> Result<DiagramModel, PipelineError> {
    outputs
        .get::<SequenceDiagram>(ELEMENTS)
        .map(DiagramModel::Sequence)
}
