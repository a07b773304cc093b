use std::fs;

use clap::Parser;
use diagrammer_cli::config::ConfigError;
use diagrammer_cli::{run, Args, CliError};
use diagrammer_gen::LlmError;

fn args(argv: &[&str]) -> Args {
    Args::parse_from(std::iter::once("diagrammer").chain(argv.iter().copied()))
}

#[tokio::test]
async fn unknown_diagram_type_fails_first() {
    let err = run(&args(&["gantt"])).await.unwrap_err();
    assert!(matches!(err, CliError::DiagramType(_)));
    assert!(err.to_string().contains("gantt"));
}

#[tokio::test]
async fn explicit_config_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("config.toml");
    let err = run(&args(&["er", "-c", missing.to_str().unwrap()]))
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Config(ConfigError::MissingFile(_))));
}

#[tokio::test]
async fn unknown_provider_is_rejected_before_any_call() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        "[ai]\nprovider = \"bogus\"\nmodel = \"m\"\napi_key_env = \"DIAGRAMMER_RUN_TEST_KEY\"\n",
    )
    .unwrap();
    std::env::set_var("DIAGRAMMER_RUN_TEST_KEY", "secret");

    let input = dir.path().join("input.txt");
    fs::write(&input, "A user logs in.").unwrap();
    let err = run(&args(&[
        "sequence",
        input.to_str().unwrap(),
        "-c",
        config.to_str().unwrap(),
    ]))
    .await
    .unwrap_err();

    assert!(matches!(err, CliError::Llm(LlmError::UnknownProvider(ref p)) if p == "bogus"));
}
