use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use diagrammer_core::validate::usecase::{self, PackageGroup};
use diagrammer_core::{
    Actor, Association, DiagramModel, Extend, Include, Package, UseCase, UseCaseDiagram,
    ValidationError,
};

use super::{revalidate, wire, Plan};
use crate::error::PipelineError;
use crate::pipeline::{OrderedStep, Stage, StepOutputs};
use crate::prompt::{self, PromptContext};

pub const ACTORS: &str = "actors";
pub const USE_CASES: &str = "use_cases";
pub const ASSOCIATIONS: &str = "associations";
pub const RELATIONSHIPS: &str = "relationships";
pub const PACKAGES: &str = "packages";

// The answer shapes below are only used for their schemas.
#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
#[allow(dead_code)]
struct ActorsAnswer {
    actors: Vec<Actor>,
}

#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
#[allow(dead_code)]
struct UseCasesAnswer {
    use_cases: Vec<UseCase>,
}

#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
#[allow(dead_code)]
struct AssociationsAnswer {
    associations: Vec<Association>,
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
struct RelationshipsAnswer {
    #[serde(default)]
    includes: Vec<Include>,
    #[serde(default)]
    extends: Vec<Extend>,
}

const PACKAGES_SCHEMA: &str = r#"{
  "Packages": [
    {"Name": "Ordering", "Actors": ["Customer"], "UseCases": ["Place order", "Track order"]}
  ]
}
Every use case appears in exactly one package. Actors may be listed in the package
they mainly belong to or left out."#;

pub fn plan() -> Plan {
    Plan {
        stages: vec![
            step(ACTORS, "Extracting actors...", actors_prompt, actors),
            step(USE_CASES, "Extracting use cases...", use_cases_prompt, use_cases),
            step(
                ASSOCIATIONS,
                "Extracting associations...",
                associations_prompt,
                associations,
            ),
            step(
                RELATIONSHIPS,
                "Extracting include and extend relationships...",
                relationships_prompt,
                relationships,
            ),
            step(PACKAGES, "Grouping use cases into packages...", packages_prompt, packages),
        ],
        assemble,
    }
}

fn step(
    name: &'static str,
    progress: &'static str,
    prompt: fn(&str, &StepOutputs) -> Result<PromptContext, PipelineError>,
    validate: fn(&Value, &StepOutputs) -> Result<Value, ValidationError>,
) -> Stage {
    Stage::Single(OrderedStep {
        name,
        progress,
        prompt,
        validate,
        skip: None,
    })
}

fn with_names(context: PromptContext, outputs: &StepOutputs, steps: &[&str]) -> PromptContext {
    steps.iter().fold(context, |ctx, step| {
        ctx.with_input(*step, json!(outputs.names(step)))
    })
}

fn actors_prompt(input: &str, _: &StepOutputs) -> Result<PromptContext, PipelineError> {
    Ok(PromptContext::new(prompt::task(
        ACTORS,
        "List the actors of the use case: people, roles or external systems that interact \
         with the system under design. Names are short nouns and unique.",
        &prompt::schema_of::<ActorsAnswer>(),
        input,
    )))
}

fn actors(json: &Value, _: &StepOutputs) -> Result<Value, ValidationError> {
    wire(&usecase::actor_list(json)?)
}

fn use_cases_prompt(input: &str, outputs: &StepOutputs) -> Result<PromptContext, PipelineError> {
    let context = PromptContext::new(prompt::task(
        USE_CASES,
        "List the use cases: goals an actor achieves with the system. Name each with a short \
         verb phrase such as \"Place order\". Names are unique.",
        &prompt::schema_of::<UseCasesAnswer>(),
        input,
    ));
    Ok(with_names(context, outputs, &[ACTORS]))
}

fn use_cases(json: &Value, _: &StepOutputs) -> Result<Value, ValidationError> {
    wire(&usecase::use_case_list(json)?)
}

fn associations_prompt(input: &str, outputs: &StepOutputs) -> Result<PromptContext, PipelineError> {
    let context = PromptContext::new(prompt::task(
        ASSOCIATIONS,
        "Connect actors to the use cases they take part in. Use only actor and use case \
         names from the earlier steps.",
        &prompt::schema_of::<AssociationsAnswer>(),
        input,
    ));
    Ok(with_names(context, outputs, &[ACTORS, USE_CASES]))
}

fn associations(json: &Value, outputs: &StepOutputs) -> Result<Value, ValidationError> {
    wire(&usecase::associations(
        json,
        &outputs.names(ACTORS),
        &outputs.names(USE_CASES),
    )?)
}

fn relationships_prompt(
    input: &str,
    outputs: &StepOutputs,
) -> Result<PromptContext, PipelineError> {
    let context = PromptContext::new(prompt::task(
        RELATIONSHIPS,
        "List include relationships (Base always performs Included) and extend relationships \
         (Extension optionally adds to Base, under Condition). Use only use case names from \
         the earlier steps. Both lists may be empty.",
        &prompt::schema_of::<RelationshipsAnswer>(),
        input,
    ));
    Ok(with_names(context, outputs, &[USE_CASES]))
}

fn relationships(json: &Value, outputs: &StepOutputs) -> Result<Value, ValidationError> {
    let (includes, extends) = usecase::relationships(json, &outputs.names(USE_CASES))?;
    wire(&RelationshipsAnswer { includes, extends })
}

fn packages_prompt(input: &str, outputs: &StepOutputs) -> Result<PromptContext, PipelineError> {
    let context = PromptContext::new(prompt::task(
        PACKAGES,
        "Group the use cases into packages by functional area. A small system may use a \
         single package named after the system.",
        PACKAGES_SCHEMA,
        input,
    ));
    Ok(with_names(context, outputs, &[ACTORS, USE_CASES]))
}

fn packages(json: &Value, outputs: &StepOutputs) -> Result<Value, ValidationError> {
    wire(&usecase::package_groups(
        json,
        &outputs.names(ACTORS),
        &outputs.names(USE_CASES),
    )?)
}

/// Build packages from the groups. Relationships go to the package of the
/// use case they start from; actors no group claimed go to the first one.
fn assemble(outputs: &StepOutputs) -> Result<DiagramModel, PipelineError> {
    let actors: Vec<Actor> = outputs.get(ACTORS)?;
    let use_cases: Vec<UseCase> = outputs.get(USE_CASES)?;
    let associations: Vec<Association> = outputs.get(ASSOCIATIONS)?;
    let relations: RelationshipsAnswer = outputs.get(RELATIONSHIPS)?;
    let groups: Vec<PackageGroup> = outputs.get(PACKAGES)?;

    let mut packages: Vec<Package> = groups
        .iter()
        .map(|group| Package {
            name: group.name.clone(),
            actors: actors
                .iter()
                .filter(|a| group.actors.contains(&a.name))
                .cloned()
                .collect(),
            use_cases: use_cases
                .iter()
                .filter(|u| group.use_cases.contains(&u.name))
                .cloned()
                .collect(),
            associations: associations
                .iter()
                .filter(|a| group.use_cases.contains(&a.use_case))
                .cloned()
                .collect(),
            includes: relations
                .includes
                .iter()
                .filter(|i| group.use_cases.contains(&i.base))
                .cloned()
                .collect(),
            extends: relations
                .extends
                .iter()
                .filter(|e| group.use_cases.contains(&e.base))
                .cloned()
                .collect(),
        })
        .collect();

    let first = packages
        .first_mut()
        .ok_or_else(|| PipelineError::Assembly("no packages".to_string()))?;
    for actor in &actors {
        if !groups.iter().any(|g| g.actors.contains(&actor.name)) {
            first.actors.push(actor.clone());
        }
    }

    revalidate(&DiagramModel::UseCase(UseCaseDiagram { packages }))
}
