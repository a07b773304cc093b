use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;

use diagrammer_core::{ai_configured, AiSettings, DiagramType};
use diagrammer_gen::{
    generate_diagram, DiagramRequest, EngineOptions, LlmEngine, LlmProvider, PipelineError,
    PipelineOptions, RunContext,
};

// --- Tool parameter types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GenerateDiagramRequest {
    /// One of: flowchart, sequence, er, usecase
    diagram_type: String,
    /// Use case description in plain text
    input_text: String,
}

// --- Server ---

#[derive(Clone)]
pub struct DiagrammerServer {
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl DiagrammerServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List the diagram types generate_diagram accepts")]
    fn list_diagram_types(&self) -> Result<CallToolResult, McpError> {
        let names: Vec<&str> = DiagramType::WIRED.iter().map(|t| t.as_str()).collect();
        Ok(CallToolResult::success(vec![Content::text(names.join("\n"))]))
    }

    #[tool(
        description = "Generate a diagram from a use case description. Returns Mermaid text for flowchart, sequence and er diagrams and PlantUML for usecase diagrams. Uses the AI provider saved in ~/.diagrammer/settings.json."
    )]
    async fn generate_diagram(
        &self,
        Parameters(req): Parameters<GenerateDiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        let diagram_type: DiagramType = match req.diagram_type.parse() {
            Ok(t) => t,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(format!("{e}"))])),
        };

        let settings = diagrammer_core::read_settings();
        let engine = match engine(settings) {
            Ok(engine) => engine,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };

        match generate(&engine, diagram_type, req.input_text).await {
            Ok(markup) => Ok(CallToolResult::success(vec![Content::text(markup)])),
            Err(e) => {
                log::warn!(diagram_type = diagram_type.as_str(); "Generation failed: {e}");
                Ok(CallToolResult::error(vec![Content::text(e.terminal_message())]))
            }
        }
    }
}

#[tool_handler]
impl ServerHandler for DiagrammerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// --- Helpers ---

fn engine(settings: AiSettings) -> Result<LlmEngine, String> {
    if !ai_configured(&settings) {
        return Err(
            "No AI provider configured. Save provider, model and API key in ~/.diagrammer/settings.json."
                .to_string(),
        );
    }
    LlmEngine::new(settings, EngineOptions::default()).map_err(|e| e.to_string())
}

async fn generate(
    provider: &dyn LlmProvider,
    diagram_type: DiagramType,
    input_text: String,
) -> Result<String, PipelineError> {
    let ctx = RunContext::new(provider, PipelineOptions::default());
    let request = DiagramRequest {
        diagram_type,
        input_text,
    };
    generate_diagram(&ctx, &request)
        .await
        .map(|diagram| diagram.markup)
}

const INSTRUCTIONS: &str = r#"diagrammer turns use case descriptions into diagrams.

## Tools
- `list_diagram_types`: the accepted diagram types.
- `generate_diagram`: pass `diagram_type` and the use case text as `input_text`. The result is diagram markup: Mermaid for flowchart, sequence and er, PlantUML for usecase.

## Writing input
Describe the actors, the main success scenario step by step, and any alternative or error paths. Generation takes several model calls; a failure message names the step and the last complaint, so rephrase the input and retry."#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let service = DiagrammerServer::new()
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| log::error!("MCP server error: {e}"))?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use diagrammer_gen::mock::ScriptedProvider;

    #[test]
    fn state_is_not_listed() {
        assert!(!DiagramType::WIRED.contains(&DiagramType::State));
    }

    #[test]
    fn unconfigured_settings_are_rejected() {
        let err = engine(AiSettings::default()).unwrap_err();
        assert!(err.contains("settings.json"));
    }

    #[tokio::test]
    async fn exhaustion_reads_as_one_line() {
        let provider = ScriptedProvider::repeating("no json at all");
        let err = generate(&provider, DiagramType::Sequence, "A user logs in.".into())
            .await
            .unwrap_err();
        assert_eq!(
            err.terminal_message(),
            "diagram generation failed after 3 attempts: no JSON object found in the response"
        );
    }
}
