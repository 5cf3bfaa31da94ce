// tests/command_step.rs

mod common;
use crate::common::{Dataset, bold_desc, init_tracing, raw_bold, read_file, with_timeout};

use neuroflow::artifact::BoundArtifact;
use neuroflow::exec::command_line;
use neuroflow::step::prepare::Prepared;
use neuroflow::{
    ArtifactField, AutoInput, CommandSpec, NameFormat, NeuroflowError, Step, StepOutcome, Token,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn command_step(name: &str, spec: CommandSpec) -> Step {
    Step::builder(name)
        .input(raw_bold())
        .output(bold_desc("out"))
        .command(spec)
        .build()
        .expect("valid command step")
}

#[tokio::test]
async fn artifact_tokens_resolve_to_paths() -> TestResult {
    init_tracing();
    let ds = Dataset::new();
    let ctx = ds.ctx();
    ds.seed(&ctx, &raw_bold());

    let spec = CommandSpec::new(vec![
        Token::from("cp"),
        Token::from(raw_bold()),
        Token::from(bold_desc("out")),
    ]);
    let outcome = with_timeout(command_step("copy", spec).run(&ctx)).await?;

    assert_eq!(outcome, StepOutcome::Executed);
    assert_eq!(
        read_file(&ds.path("sub-01/func/sub-01_task-rest_desc-out_bold.nii")),
        "raw"
    );
    Ok(())
}

#[tokio::test]
async fn auto_token_resolves_to_first_input() -> TestResult {
    init_tracing();
    let ds = Dataset::new();
    let ctx = ds.ctx();
    ds.seed(&ctx, &raw_bold());

    let spec = CommandSpec::new(vec![
        Token::from("cp"),
        Token::from(AutoInput::any()),
        Token::from(bold_desc("out")),
    ]);
    with_timeout(command_step("copy", spec).run(&ctx)).await?;
    assert_eq!(
        read_file(&ds.path("sub-01/func/sub-01_task-rest_desc-out_bold.nii")),
        "raw"
    );
    Ok(())
}

#[tokio::test]
async fn stdout_is_saved_to_the_declared_output() -> TestResult {
    init_tracing();
    let ds = Dataset::new();
    let ctx = ds.ctx();
    ds.seed(&ctx, &raw_bold());

    let spec = CommandSpec::new(vec!["sh", "-c", "printf '%s' \"$NEUROFLOW_GREETING\""])
        .env("NEUROFLOW_GREETING", "hello")
        .save_stdout_to(bold_desc("out"));
    with_timeout(command_step("greet", spec).run(&ctx)).await?;

    assert_eq!(
        read_file(&ds.path("sub-01/func/sub-01_task-rest_desc-out_bold.nii")),
        "hello"
    );
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_carries_code_and_stderr() {
    init_tracing();
    let ds = Dataset::new();
    let ctx = ds.ctx();
    ds.seed(&ctx, &raw_bold());

    let spec = CommandSpec::new(vec!["sh", "-c", "echo oops >&2; exit 3"]);
    let err = with_timeout(command_step("fail", spec).run(&ctx))
        .await
        .unwrap_err();

    assert_eq!(err.trail(), Some("fail"));
    match err.root_cause() {
        NeuroflowError::CommandExecution {
            command,
            code,
            stderr,
        } => {
            assert_eq!(*code, 3);
            assert!(stderr.contains("oops"), "stderr was {stderr:?}");
            assert!(command.starts_with("sh -c"), "command was {command:?}");
        }
        other => panic!("expected command execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_executable_is_a_launch_error() {
    init_tracing();
    let ds = Dataset::new();
    let ctx = ds.ctx();
    ds.seed(&ctx, &raw_bold());

    let spec = CommandSpec::new(vec!["neuroflow-no-such-tool-4f1c"]);
    let err = with_timeout(command_step("launch", spec).run(&ctx))
        .await
        .unwrap_err();
    assert!(
        matches!(err.root_cause(), NeuroflowError::CommandLaunch { .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn stdout_is_kept_when_the_command_fails() {
    init_tracing();
    let ds = Dataset::new();
    let ctx = ds.ctx();
    ds.seed(&ctx, &raw_bold());

    let spec = CommandSpec::new(vec!["sh", "-c", "echo partial; exit 2"])
        .save_stdout_to(bold_desc("out"));
    let err = with_timeout(command_step("report", spec).run(&ctx))
        .await
        .unwrap_err();

    assert!(matches!(
        err.root_cause(),
        NeuroflowError::CommandExecution { code: 2, .. }
    ));
    assert_eq!(
        read_file(&ds.path("sub-01/func/sub-01_task-rest_desc-out_bold.nii")),
        "partial\n"
    );
}

#[test]
fn undeclared_artifact_token_is_rejected_at_build() {
    let plain = CommandSpec::new(vec![Token::from("cat"), Token::from(bold_desc("stranger"))]);
    let decorated = CommandSpec::new(vec![
        Token::from("cat"),
        Token::Decorated(vec![Token::from("-in="), Token::from(bold_desc("stranger"))]),
    ]);

    for spec in [plain, decorated] {
        let err = Step::builder("cat")
            .input(raw_bold())
            .output(bold_desc("out"))
            .command(spec)
            .build()
            .unwrap_err();
        match err {
            NeuroflowError::Validation(msg) => assert!(msg.contains("desc-stranger"), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}

#[test]
fn auto_token_with_predicate_is_rejected_at_build() {
    let spec = CommandSpec::new(vec![
        Token::from("cat"),
        Token::from(AutoInput::matching([(ArtifactField::Desc, "mc")])),
    ]);
    let err = Step::builder("cat")
        .input(raw_bold())
        .command(spec)
        .build()
        .unwrap_err();
    assert!(matches!(err, NeuroflowError::Validation(_)));
}

#[test]
fn stdout_target_must_be_an_output() {
    let spec = CommandSpec::new(vec!["echo", "hi"]).save_stdout_to(bold_desc("elsewhere"));
    let err = Step::builder("echo")
        .input(raw_bold())
        .output(bold_desc("out"))
        .command(spec)
        .build()
        .unwrap_err();
    assert!(matches!(err, NeuroflowError::Validation(_)));
}

#[test]
fn decorated_token_needs_exactly_one_artifact() {
    let two = Token::Decorated(vec![Token::from(raw_bold()), Token::from(bold_desc("out"))]);
    let none = Token::Decorated(vec![Token::from("-prefix="), Token::from(".1D")]);

    for bad in [two, none] {
        let err = Step::builder("bad")
            .input(raw_bold())
            .output(bold_desc("out"))
            .command(CommandSpec::new(vec![Token::from("tool"), bad]))
            .build()
            .unwrap_err();
        assert!(matches!(err, NeuroflowError::Validation(_)));
    }
}

#[test]
fn decoration_wraps_name_and_path() {
    let ds = Dataset::new();
    let ctx = ds.ctx();
    let prepared = Prepared {
        inputs: vec![BoundArtifact::new(raw_bold(), ctx.clone(), NameFormat::default())],
        outputs: vec![BoundArtifact::new(
            bold_desc("mc"),
            ctx.clone(),
            NameFormat::without_extension(),
        )],
        skip: false,
    };
    let dir = ds.path("sub-01/func");
    let out = dir.join("sub-01_task-rest_desc-mc_bold");
    let out = out.to_string_lossy();

    let spec = CommandSpec::new(vec![
        Token::from("3dvolreg"),
        Token::Decorated(vec![Token::from("-prefix="), Token::from(bold_desc("mc"))]),
        Token::Decorated(vec![Token::from(bold_desc("mc")), Token::from(".1D")]),
        Token::Decorated(vec![
            Token::from("-1Dmatrix_save "),
            Token::from("mat_"),
            Token::from(bold_desc("mc")),
            Token::from("_aff12"),
            Token::from(".1D"),
        ]),
        Token::from(2.0),
        Token::from(0.5),
        Token::from(3_i64),
    ]);

    let argv = spec.resolve("volreg", &prepared).unwrap();
    assert_eq!(
        argv,
        vec![
            "3dvolreg".to_string(),
            format!("-prefix={out}"),
            format!("{out}.1D"),
            format!(
                "-1Dmatrix_save {}_aff12.1D",
                dir.join("mat_sub-01_task-rest_desc-mc_bold").to_string_lossy()
            ),
            "2.0".to_string(),
            "0.5".to_string(),
            "3".to_string(),
        ]
    );
}

#[test]
fn command_line_quotes_unsafe_arguments() {
    let argv: Vec<String> = ["echo", "a b", "it's", "/tmp/x.nii"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(command_line(&argv), r"echo 'a b' 'it'\''s' /tmp/x.nii");
}
