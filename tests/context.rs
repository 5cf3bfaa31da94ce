// tests/context.rs

mod common;
use crate::common::{Dataset, init_tracing};

use neuroflow::{IdempotencyPolicy, Logger, NameFormat, NamingMode, NeuroflowError, RunContext};

#[test]
fn missing_root_is_a_configuration_error() {
    init_tracing();
    let ds = Dataset::new();
    let err = RunContext::builder(ds.root().join("nope"), "01")
        .build()
        .unwrap_err();
    assert!(matches!(err, NeuroflowError::Configuration(_)), "got {err:?}");
}

#[test]
fn subject_and_session_must_be_alphanumeric() {
    let ds = Dataset::new();
    assert!(matches!(
        RunContext::builder(ds.root(), "sub-01").build(),
        Err(NeuroflowError::Configuration(_))
    ));
    assert!(matches!(
        RunContext::builder(ds.root(), "01").session("a_b").build(),
        Err(NeuroflowError::Configuration(_))
    ));
}

#[test]
fn conflicting_policy_flags_are_rejected() {
    assert!(matches!(
        IdempotencyPolicy::from_flags(true, true),
        Err(NeuroflowError::Configuration(_))
    ));
    assert_eq!(
        IdempotencyPolicy::from_flags(false, true).unwrap(),
        IdempotencyPolicy::SkipIfExists
    );
    assert_eq!(
        IdempotencyPolicy::from_flags(false, false).unwrap(),
        IdempotencyPolicy::None
    );
}

#[test]
fn session_dir_requires_a_session() {
    let ds = Dataset::new();
    let ctx = ds.ctx();
    assert_eq!(ctx.subject_dir(), ds.root().join("sub-01"));
    assert!(matches!(
        ctx.session_dir(),
        Err(NeuroflowError::Configuration(_))
    ));

    let with_session = Dataset::new().with_session("2");
    let ctx = with_session.ctx();
    assert_eq!(
        ctx.session_dir().unwrap(),
        with_session.root().join("sub-01").join("ses2")
    );
    assert_eq!(
        ctx.session_segment(),
        std::path::PathBuf::from("sub-01/ses2")
    );
}

#[test]
fn descend_never_touches_the_parent() {
    let ds = Dataset::new();
    let root_ctx = ds.ctx();

    let child = root_ctx.descend("outer", &["derivatives".to_string()], &["d1".to_string()]);
    let grandchild = child.descend("inner", &["afni".to_string()], &[]);
    let sibling = child.descend("other", &[], &["d2".to_string()]);

    assert!(root_ctx.call_stack().is_empty());
    assert!(root_ctx.derivatives_prefix().is_empty());

    assert_eq!(child.trail(), "outer");
    assert_eq!(grandchild.trail(), "outer/inner");
    assert_eq!(grandchild.derivatives_prefix(), ["derivatives", "afni"]);
    assert_eq!(grandchild.data_prefix(), ["d1"]);

    // The sibling does not see what the grandchild added.
    assert_eq!(sibling.trail(), "outer/other");
    assert_eq!(sibling.derivatives_prefix(), ["derivatives"]);
    assert_eq!(sibling.data_prefix(), ["d1", "d2"]);
}

#[test]
fn outer_format_wins_over_inner() {
    let ds = Dataset::new();
    let ctx = ds
        .ctx()
        .with_format(NameFormat::naming(NamingMode::DescOnly))
        .with_format(NameFormat {
            naming: Some(NamingMode::SimplifiedBids),
            extension: Some(false),
        });

    let format = ctx.format_override();
    assert_eq!(format.naming, Some(NamingMode::DescOnly));
    assert_eq!(format.extension, Some(false));
}

#[test]
fn origin_drops_traversal_state_but_keeps_identity() {
    let ds = Dataset::new().with_session("1");
    let ctx = ds
        .context()
        .logger(Logger::new("mefmri"))
        .policy(IdempotencyPolicy::Overwrite)
        .build()
        .unwrap()
        .descend("p", &["derivatives".to_string()], &[])
        .with_format(NameFormat::without_extension());

    let origin = ctx.origin();
    assert!(origin.call_stack().is_empty());
    assert!(origin.derivatives_prefix().is_empty());
    assert!(origin.format_override().is_empty());
    assert_eq!(origin.session(), Some("1"));
    assert_eq!(origin.policy(), IdempotencyPolicy::Overwrite);
    assert_eq!(origin.logger().name(), "mefmri");
}
