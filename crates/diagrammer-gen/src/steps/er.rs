use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use diagrammer_core::validate::er;
use diagrammer_core::{DiagramModel, Entity, ErModel, Relationship, ValidationError};

use super::{revalidate, wire, Plan};
use crate::error::PipelineError;
use crate::pipeline::{OrderedStep, Stage, StepOutputs};
use crate::prompt::{self, PromptContext};

pub const ENTITIES: &str = "entities";
pub const RELATIONSHIPS: &str = "relationships";

// Answer shapes, used only for their schemas.
#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
#[allow(dead_code)]
struct EntitiesAnswer {
    entities: Vec<Entity>,
}

#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
#[allow(dead_code)]
struct RelationshipsAnswer {
    relationships: Vec<Relationship>,
}

pub fn plan() -> Plan {
    Plan {
        stages: vec![
            Stage::Single(OrderedStep {
                name: ENTITIES,
                progress: "Extracting entities...",
                prompt: entities_prompt,
                validate: entities,
                skip: None,
            }),
            Stage::Single(OrderedStep {
                name: RELATIONSHIPS,
                progress: "Extracting relationships...",
                prompt: relationships_prompt,
                validate: relationships,
                skip: None,
            }),
        ],
        assemble,
    }
}

fn entities_prompt(input: &str, _: &StepOutputs) -> Result<PromptContext, PipelineError> {
    Ok(PromptContext::new(prompt::task(
        ENTITIES,
        "List the data entities the use case stores or reads, with their properties. Entity \
         names are UPPER_SNAKE_CASE and unique. Mark primary keys with Role \"PK\" and foreign \
         keys with \"FK\"; leave Role empty otherwise.",
        &prompt::schema_of::<EntitiesAnswer>(),
        input,
    )))
}

fn entities(json: &Value, _: &StepOutputs) -> Result<Value, ValidationError> {
    wire(&er::entities(json)?)
}

fn relationships_prompt(
    input: &str,
    outputs: &StepOutputs,
) -> Result<PromptContext, PipelineError> {
    let context = PromptContext::new(prompt::task(
        RELATIONSHIPS,
        "List the relationships between the entities from the earlier step. Use only those \
         entity names. Cardinality values are ZeroOrOne, ExactlyOne, ZeroOrMore or OneOrMore. \
         Return an empty list if the entities are unrelated.",
        &prompt::schema_of::<RelationshipsAnswer>(),
        input,
    ));
    Ok(context.with_input(ENTITIES, outputs.value(ENTITIES).cloned().unwrap_or_default()))
}

fn relationships(json: &Value, outputs: &StepOutputs) -> Result<Value, ValidationError> {
    wire(&er::relationships(json, &outputs.names(ENTITIES))?)
}

fn assemble(outputs: &StepOutputs) -> Result<DiagramModel, PipelineError> {
    let model = DiagramModel::Er(ErModel {
        entities: outputs.get(ENTITIES)?,
        relationships: outputs.get(RELATIONSHIPS)?,
    });
    revalidate(&model)
}
