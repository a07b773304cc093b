//! CLI logic for the `diagrammer` command.
//!
//! Reads a use case description from a file or stdin, runs the diagram
//! pipeline and writes the markup (or the validated model as JSON).

mod args;
pub mod config;

pub use args::Args;

use std::{fs, io};

use log::info;
use thiserror::Error;

use diagrammer_core::{ai_configured, AiSettings, DiagramType, UnknownDiagramType};
use diagrammer_gen::{
    generate_diagram, DiagramRequest, EngineOptions, LlmEngine, LlmError, LlmProvider,
    PipelineError, PipelineOptions, RunContext,
};

use config::{AiConfig, AppConfig, ConfigError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    DiagramType(#[from] UnknownDiagramType),

    #[error("read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("write {path}: {source}")]
    Write { path: String, source: io::Error },

    #[error("the use case description is empty")]
    EmptyInput,

    #[error(
        "no AI provider configured; set provider and model in config.toml, pass --provider \
         and --model, or save them in ~/.diagrammer/settings.json"
    )]
    NotConfigured,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("{}", .0.terminal_message())]
    Pipeline(#[from] PipelineError),

    #[error("encode model: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run the CLI application.
pub async fn run(args: &Args) -> Result<(), CliError> {
    let diagram_type: DiagramType = args.diagram_type.parse()?;
    let config = config::load_config(args.config.as_deref())?;
    let options = pipeline_options(args, &config)?;

    let settings = resolve_settings(args, &config.ai, diagrammer_core::read_settings(), |name| {
        std::env::var(name).ok()
    });
    if !ai_configured(&settings) {
        return Err(CliError::NotConfigured);
    }
    info!(provider = settings.provider, model = settings.model; "Using AI provider");
    let engine = LlmEngine::new(
        settings,
        EngineOptions {
            timeout_secs: config.ai.timeout_secs,
            temperature: config.ai.temperature,
        },
    )?;

    let input = read_input(args.input.as_deref())?;
    let text = produce(args, &engine, options, diagram_type, &input).await?;
    write_output(args.output.as_deref(), &text)
}

/// Generate the output text for one request.
pub async fn produce(
    args: &Args,
    provider: &dyn LlmProvider,
    options: PipelineOptions,
    diagram_type: DiagramType,
    input: &str,
) -> Result<String, CliError> {
    if input.trim().is_empty() {
        return Err(CliError::EmptyInput);
    }
    let ctx = RunContext::new(provider, options);

    let cancel = ctx.cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });

    let request = DiagramRequest {
        diagram_type,
        input_text: input.to_string(),
    };
    let result = generate_diagram(&ctx, &request).await;
    interrupt.abort();
    let diagram = result?;

    if args.json {
        let mut json = serde_json::to_string_pretty(&diagram.model)?;
        json.push('\n');
        Ok(json)
    } else {
        Ok(diagram.markup)
    }
}

/// Pipeline options from the config file, overridden by flags.
pub fn pipeline_options(args: &Args, config: &AppConfig) -> Result<PipelineOptions, CliError> {
    let mut options = config.pipeline;
    if let Some(max_attempts) = args.max_attempts {
        config::check_attempts(max_attempts)?;
        options.max_attempts = max_attempts;
    }
    if args.no_evaluate {
        options.evaluate = false;
    }
    Ok(options)
}

/// AI settings with flags over the config file over the saved settings.
/// The key comes from the environment variable named in the config when
/// that variable is set.
pub fn resolve_settings(
    args: &Args,
    config: &AiConfig,
    saved: AiSettings,
    env: impl Fn(&str) -> Option<String>,
) -> AiSettings {
    let pick = |flag: &Option<String>, file: &Option<String>, saved: String| {
        flag.clone().or_else(|| file.clone()).unwrap_or(saved)
    };
    AiSettings {
        provider: pick(&args.provider, &config.provider, saved.provider),
        model: pick(&args.model, &config.model, saved.model),
        api_key: config
            .api_key_env
            .as_deref()
            .and_then(env)
            .unwrap_or(saved.api_key),
    }
}

fn read_input(path: Option<&str>) -> Result<String, CliError> {
    match path {
        None | Some("-") => io::read_to_string(io::stdin()).map_err(|source| CliError::Read {
            path: "stdin".to_string(),
            source,
        }),
        Some(path) => fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_string(),
            source,
        }),
    }
}

fn write_output(path: Option<&str>, text: &str) -> Result<(), CliError> {
    match path {
        None => {
            print!("{text}");
            Ok(())
        }
        Some(path) => {
            fs::write(path, text).map_err(|source| CliError::Write {
                path: path.to_string(),
                source,
            })?;
            info!(output_file = path; "Diagram written");
            Ok(())
        }
    }
}
