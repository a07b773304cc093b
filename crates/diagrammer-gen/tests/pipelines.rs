use diagrammer_core::{DiagramModel, DiagramType, NodeType};
use diagrammer_gen::mock::ScriptedProvider;
use diagrammer_gen::{generate_diagram, DiagramRequest, PipelineOptions, RunContext};

fn no_review() -> PipelineOptions {
    PipelineOptions {
        evaluate: false,
        ..PipelineOptions::default()
    }
}

async fn generate(
    provider: &ScriptedProvider,
    diagram_type: DiagramType,
) -> diagrammer_gen::GeneratedDiagram {
    let ctx = RunContext::new(provider, no_review());
    let request = DiagramRequest {
        diagram_type,
        input_text: "A customer places and tracks orders.".to_string(),
    };
    generate_diagram(&ctx, &request).await.unwrap()
}

#[tokio::test]
async fn er_relationships_see_entities() {
    let provider = ScriptedProvider::default()
        .route(
            "## Task: entities",
            [r#"{"Entities": [
                {"Name": "Customer", "Properties": [{"Type": "int", "Name": "id", "Role": "PK"}]},
                {"Name": "order", "Properties": [
                    {"Type": "int", "Name": "id", "Role": "PK"},
                    {"Type": "int", "Name": "customer_id", "Role": "FK"}
                ]}
            ]}"#],
        )
        .route(
            "## Task: relationships",
            [
                r#"{"Relationships": [{"SourceEntityName": "CUSTOMER", "DestinationEntityName": "INVOICE",
                    "SourceCardinality": "ExactlyOne", "DestinationCardinality": "ZeroOrMore"}]}"#,
                r#"{"Relationships": [{"SourceEntityName": "customer", "DestinationEntityName": "ORDER",
                    "SourceCardinality": "ExactlyOne", "DestinationCardinality": "ZeroOrMore",
                    "Description": "places"}]}"#,
            ],
        );

    let diagram = generate(&provider, DiagramType::Er).await;

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[1].contains("### entities"));
    assert!(prompts[1].contains("\"CUSTOMER\""));
    assert!(prompts[2].contains("Relationships[0].DestinationEntityName"));

    assert!(diagram.markup.starts_with("erDiagram\n"));
    assert!(diagram.markup.contains("    CUSTOMER ||--o{ ORDER : \"places\"\n"));
    assert!(diagram.markup.contains("        int customer_id FK\n"));
}

#[tokio::test]
async fn use_case_steps_run_in_order() {
    let provider = ScriptedProvider::default()
        .route(
            "## Task: actors",
            [r#"{"Actors": [{"Name": "Customer"}, {"Name": "Courier", "Description": "Delivers"}]}"#],
        )
        .route(
            "## Task: use_cases",
            [r#"{"UseCases": [{"Name": "Place order"}, {"Name": "Pay online"}, {"Name": "Track order"}]}"#],
        )
        .route(
            "## Task: associations",
            [r#"{"Associations": [
                {"Actor": "Customer", "UseCase": "Place order"},
                {"Actor": "customer", "UseCase": "track order"}
            ]}"#],
        )
        .route(
            "## Task: relationships",
            [r#"{"Includes": [{"Base": "Place order", "Included": "Pay online"}], "Extends": []}"#],
        )
        .route(
            "## Task: packages",
            [r#"{"Packages": [
                {"Name": "Ordering", "Actors": ["Customer"], "UseCases": ["Place order", "Pay online"]},
                {"Name": "Tracking", "Actors": [], "UseCases": ["Track order"]}
            ]}"#],
        );

    let diagram = generate(&provider, DiagramType::UseCase).await;

    let prompts = provider.prompts();
    let tasks: Vec<&str> = prompts
        .iter()
        .filter_map(|p| p.lines().next())
        .collect();
    assert_eq!(
        tasks,
        [
            "## Task: actors",
            "## Task: use_cases",
            "## Task: associations",
            "## Task: relationships",
            "## Task: packages"
        ]
    );
    assert!(prompts[2].contains("### actors"));
    assert!(prompts[2].contains("### use_cases"));

    let DiagramModel::UseCase(model) = &diagram.model else {
        panic!("expected a use case model");
    };
    assert_eq!(model.packages.len(), 2);
    let ordering = &model.packages[0];
    let actors: Vec<&str> = ordering.actors.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(actors, ["Customer", "Courier"]);
    assert_eq!(model.packages[1].associations[0].use_case, "Track order");

    let text = &diagram.markup;
    assert!(text.starts_with("@startuml\n"));
    assert!(text.contains("package \"Tracking\" {\n"));
    assert!(text.contains("UC_Place_order ..> UC_Pay_online : <<include>>\n"));
    assert!(text.contains("A_Customer --> UC_Track_order\n"));
    assert!(text.ends_with("@enduml\n"));
}

const BASIC_FLOW: &str = r#"{
  "Nodes": [
    {"Id": "start", "Label": "Start", "Type": "Start"},
    {"Id": "enter", "Label": "Enter credentials", "Type": "InputOutput"},
    {"Id": "check", "Label": "Check password", "Type": "Process"},
    {"Id": "done", "Label": "Logged in", "Type": "End"}
  ],
  "Edges": [
    {"SourceId": "start", "TargetId": "enter"},
    {"SourceId": "enter", "TargetId": "check"},
    {"SourceId": "check", "TargetId": "done"}
  ]
}"#;

#[tokio::test]
async fn flowchart_branches_get_decisions() {
    let provider = ScriptedProvider::default()
        .route("## Task: basic_flow", [BASIC_FLOW])
        .route(
            "## Task: alternative_flows",
            [r#"{"Flows": [{"Name": "Remember me", "Condition": "Remember me ticked",
                "Nodes": [{"Id": "save_cookie", "Label": "Save cookie", "Type": "Process"}]}]}"#],
        )
        .route(
            "## Task: exception_flows",
            [r#"{"Flows": [{"Name": "Wrong password", "Condition": "Password is wrong",
                "Nodes": [
                    {"Id": "show_error", "Label": "Show error", "Type": "Process"},
                    {"Id": "stop", "Label": "Rejected", "Type": "End"}
                ],
                "Edges": [{"SourceId": "show_error", "TargetId": "stop"}]}]}"#],
        )
        .route(
            "## Task: branch_points",
            [r#"{"BranchPoints": [
                {"FlowId": "alt_1", "BranchNodeId": "enter", "RejoinNodeId": "check"},
                {"FlowId": "exc_1", "BranchNodeId": "check", "RejoinNodeId": null}
            ]}"#],
        );

    let diagram = generate(&provider, DiagramType::Flowchart).await;

    assert_eq!(provider.calls(), 4);
    let branch_prompt = provider
        .prompts()
        .into_iter()
        .find(|p| p.starts_with("## Task: branch_points"))
        .unwrap();
    assert!(branch_prompt.contains("### basic_flow"));
    assert!(branch_prompt.contains("Password is wrong"));

    let DiagramModel::Flowchart(graph) = &diagram.model else {
        panic!("expected a flowchart");
    };
    let decisions = graph
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Decision)
        .count();
    assert_eq!(decisions, 2);
    assert_eq!(graph.subflows.len(), 2);

    let text = &diagram.markup;
    assert!(text.starts_with("graph TD\n"));
    assert!(text.contains("    check_decision -->|\"otherwise\"| done\n"));
    assert!(text.contains("    check_decision -.->|\"Password is wrong\"| exc_1_show_error\n"));
    assert!(text.contains("    enter_decision -->|\"Remember me ticked\"| alt_1_save_cookie\n"));
    assert!(text.contains("    alt_1_save_cookie --> check\n"));
}

#[tokio::test]
async fn flowchart_without_branches_skips_branch_points() {
    let provider = ScriptedProvider::default()
        .route("## Task: basic_flow", [BASIC_FLOW])
        .route("## Task: alternative_flows", [r#"{"Flows": []}"#])
        .route("## Task: exception_flows", [r#"{"Flows": []}"#]);

    let diagram = generate(&provider, DiagramType::Flowchart).await;

    assert_eq!(provider.calls(), 3);
    assert!(diagram.markup.contains("    check --> done\n"));
}

#[tokio::test]
async fn failed_concurrent_step_fails_the_run() {
    let provider = ScriptedProvider::default()
        .route("## Task: basic_flow", [BASIC_FLOW])
        .route("## Task: alternative_flows", [r#"{"Flows": []}"#])
        .route("## Task: exception_flows", ["no", "still no", "nope"]);
    let ctx = RunContext::new(&provider, no_review());
    let request = DiagramRequest {
        diagram_type: DiagramType::Flowchart,
        input_text: "Log in".to_string(),
    };

    let err = generate_diagram(&ctx, &request).await.unwrap_err();

    assert_eq!(err.attempts(), Some(3));
    assert!(err.to_string().starts_with("step `exception_flows`"));
}
