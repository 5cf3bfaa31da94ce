// tests/config_loading.rs

mod common;
use crate::common::{Dataset, init_tracing, raw_bold, read_file, with_timeout};

use std::io::Write;

use neuroflow::config::{load_and_validate, load_from_str};
use neuroflow::exec::{Number, Token};
use neuroflow::pipeline::Node;
use neuroflow::{
    Artifact, IdempotencyPolicy, Input, NamingMode, NeuroflowError, StepOutcome,
};

const VALID: &str = r#"
[run]
policy = "skip-if-exists"
logger = "mefmri"

[pipeline]
name = "preprocess"
auto_input = true
derivatives_place = ["derivatives"]
format = { naming = "simplified-bids" }

[artifact.bold]
suffix = "bold"
datatype = "func"
task = "rest"
extension = "nii"

[artifact.bold_copy]
from = "bold"
desc = "copy"

[artifact.bold_again]
from = "bold_copy"
desc = "again"
echo = 2

[[step]]
name = "copy"
inputs = ["bold"]
outputs = ["bold_copy"]
cmd = ["cp", "@bold", "@bold_copy"]

[[step]]
name = "again"
inputs = ["@auto"]
auto_match = { desc = "copy" }
outputs = ["bold_again"]
cmd = ["cp", "@auto", ["@bold_again"], 2, 0.5, "@@literal"]
"#;

fn expect_configuration(toml: &str) -> String {
    match load_from_str(toml) {
        Err(NeuroflowError::Configuration(msg)) => msg,
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn valid_file_resolves_sections_and_derived_artifacts() {
    let file = load_from_str(VALID).expect("valid pipeline file");

    assert_eq!(file.run.policy, Some(IdempotencyPolicy::SkipIfExists));
    assert_eq!(file.run.logger.as_deref(), Some("mefmri"));
    assert_eq!(file.pipeline.name, "preprocess");
    assert_eq!(file.pipeline.format.naming, Some(NamingMode::SimplifiedBids));

    let again = file.artifact("bold_again").unwrap();
    let expected = Artifact::new("bold")
        .with_datatype("func")
        .with_task("rest")
        .with_extension("nii")
        .with_desc("again")
        .with_echo(2);
    assert_eq!(again, &expected);
    assert!(matches!(
        file.artifact("missing"),
        Err(NeuroflowError::Configuration(_))
    ));
}

#[test]
fn build_pipeline_wires_auto_input_and_tokens() {
    let file = load_from_str(VALID).unwrap();
    let pipeline = file.build_pipeline().unwrap();

    assert_eq!(pipeline.name(), "preprocess");
    assert!(pipeline.auto_input());
    assert_eq!(pipeline.derivatives_place(), ["derivatives"]);

    let Node::Step(again) = &pipeline.children()[1] else {
        panic!("expected a step");
    };
    assert_eq!(
        again.inputs(),
        [Input::Artifact(file.artifact("bold_copy").unwrap().clone())]
    );

    let spec = match again.action() {
        neuroflow::Action::Command(spec) => spec,
        other => panic!("expected a command, got {other:?}"),
    };
    assert_eq!(
        spec.tokens()[3..],
        [
            Token::Number(Number::Int(2)),
            Token::Number(Number::Float(0.5)),
            Token::Literal("@literal".to_string()),
        ]
    );
    assert_eq!(
        spec.tokens()[2],
        Token::Decorated(vec![Token::Artifact(
            file.artifact("bold_again").unwrap().clone()
        )])
    );
}

#[test]
fn unknown_artifact_reference_is_rejected() {
    let msg = expect_configuration(
        r#"
[artifact.bold]
suffix = "bold"

[[step]]
name = "copy"
inputs = ["bold"]
cmd = ["cp", "@bold", "@nowhere"]
"#,
    );
    assert!(msg.contains("nowhere"), "{msg}");
}

#[test]
fn cmd_reference_must_be_a_step_input_or_output() {
    let msg = expect_configuration(
        r#"
[artifact.bold]
suffix = "bold"

[artifact.mask]
suffix = "bold"
desc = "mask"

[[step]]
name = "apply"
inputs = ["bold"]
cmd = ["3dcalc", "@bold", "@mask"]
"#,
    );
    assert!(msg.contains("apply") && msg.contains("mask"), "{msg}");
}

#[test]
fn bad_artifact_key_is_rejected() {
    expect_configuration(
        r#"
[artifact.1bold]
suffix = "bold"

[[step]]
name = "noop"
cmd = ["true"]
"#,
    );
}

#[test]
fn duplicate_step_names_are_rejected() {
    let msg = expect_configuration(
        r#"
[[step]]
name = "same"
cmd = ["true"]

[[step]]
name = "same"
cmd = ["false"]
"#,
    );
    assert!(msg.contains("same"), "{msg}");
}

#[test]
fn derivation_cycle_is_rejected() {
    let msg = expect_configuration(
        r#"
[artifact.a]
from = "b"
desc = "x"

[artifact.b]
from = "a"
desc = "y"

[[step]]
name = "noop"
cmd = ["true"]
"#,
    );
    assert!(msg.contains("cycle"), "{msg}");
}

#[test]
fn file_without_steps_is_rejected() {
    expect_configuration(
        r#"
[artifact.bold]
suffix = "bold"
"#,
    );
}

#[test]
fn auto_must_be_the_first_input() {
    expect_configuration(
        r#"
[artifact.bold]
suffix = "bold"

[[step]]
name = "late"
inputs = ["bold", "@auto"]
cmd = ["true"]
"#,
    );
}

#[test]
fn auto_match_needs_an_auto_input() {
    expect_configuration(
        r#"
[artifact.bold]
suffix = "bold"

[[step]]
name = "picky"
inputs = ["bold"]
auto_match = { desc = "copy" }
cmd = ["true"]
"#,
    );
}

#[test]
fn unknown_fields_fail_to_parse() {
    let err = load_from_str(
        r#"
[[step]]
name = "typo"
cmd = ["true"]
comand = ["oops"]
"#,
    )
    .unwrap_err();
    assert!(matches!(err, NeuroflowError::Toml(_)), "got {err:?}");
}

#[test]
fn load_and_validate_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("neuroflow.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(VALID.as_bytes()).unwrap();

    let loaded = load_and_validate(&path).unwrap();
    assert_eq!(loaded.steps.len(), 2);

    let missing = load_and_validate(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, NeuroflowError::Io { .. }), "got {missing:?}");
}

#[tokio::test]
async fn loaded_pipeline_runs_commands_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let ds = Dataset::new();
    let ctx = ds.ctx();
    ds.seed(&ctx, &raw_bold());

    let file = load_from_str(
        r#"
[pipeline]
name = "copies"
auto_input = true
derivatives_place = ["derivatives"]

[artifact.bold]
suffix = "bold"
datatype = "func"
task = "rest"
extension = "nii"

[artifact.bold_copy]
from = "bold"
desc = "copy"

[artifact.bold_again]
from = "bold"
desc = "again"

[[step]]
name = "copy"
inputs = ["bold"]
outputs = ["bold_copy"]
cmd = ["cp", "@bold", "@bold_copy"]

[[step]]
name = "again"
inputs = ["@auto"]
outputs = ["bold_again"]
cmd = ["cp", "@auto", "@bold_again"]
"#,
    )?;
    let pipeline = file.build_pipeline()?;

    let summary = with_timeout(pipeline.run(&ctx)).await?;
    assert_eq!(summary.count(StepOutcome::Executed), 2);
    assert_eq!(
        read_file(&ds.path("derivatives/sub-01/func/sub-01_task-rest_desc-again_bold.nii")),
        "raw"
    );
    Ok(())
}
