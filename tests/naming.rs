// tests/naming.rs

mod common;
use crate::common::{Dataset, init_tracing, raw_bold};

use neuroflow::artifact::naming::{Identity, compose, entity_order};
use neuroflow::{
    Artifact, ArtifactField, ArtifactPatch, BoundArtifact, NameFormat, NamingMode, NeuroflowError,
};
use proptest::prelude::*;

fn echo_bold() -> Artifact {
    Artifact::new("bold")
        .with_datatype("func")
        .with_task("rest")
        .with_echo(2)
        .with_desc("copied")
        .with_extension("nii")
}

#[test]
fn run_bids_name_follows_bold_order() {
    init_tracing();
    let ds = Dataset::new().with_session("1");
    let ctx = ds.ctx();

    let bound = BoundArtifact::new(echo_bold(), ctx.clone(), NameFormat::default());
    assert_eq!(
        bound.resolve_name().unwrap(),
        "sub-01_ses-1_task-rest_echo-2_desc-copied_bold.nii"
    );
    assert_eq!(
        bound.resolve_path().unwrap(),
        ds.root()
            .join("sub-01/ses1/func/sub-01_ses-1_task-rest_echo-2_desc-copied_bold.nii")
    );
}

#[test]
fn order_does_not_depend_on_construction_order() {
    let a = Artifact::new("bold")
        .with_desc("x")
        .with_space("MNI")
        .with_task("rest")
        .with_extension("nii");
    let b = Artifact::new("bold")
        .with_task("rest")
        .with_extension("nii")
        .with_space("MNI")
        .with_desc("x");

    assert_eq!(a, b);
    let name = compose(&a, None, NamingMode::SimplifiedBids, false).unwrap();
    assert_eq!(name, "task-rest_space-MNI_desc-x_bold");
}

#[test]
fn fields_outside_the_suffix_table_are_omitted() {
    let fmap = Artifact::new("fmap").with_task("rest").with_acq("se").with_extension("nii");
    let name = compose(&fmap, None, NamingMode::SimplifiedBids, true).unwrap();
    assert_eq!(name, "acq-se_fmap.nii");
}

#[test]
fn unknown_suffix_is_a_validation_error() {
    let artifact = Artifact::new("dwi").with_extension("nii");
    let err = compose(&artifact, None, NamingMode::SimplifiedBids, false).unwrap_err();
    assert!(matches!(err, NeuroflowError::Validation(_)), "got {err:?}");
}

#[test]
fn extension_required_when_requested() {
    let artifact = Artifact::new("T1w").with_desc("brain");
    let err = compose(&artifact, None, NamingMode::SimplifiedBids, true).unwrap_err();
    assert!(matches!(err, NeuroflowError::Validation(_)));

    // Not requested: fine.
    assert_eq!(
        compose(&artifact, None, NamingMode::SimplifiedBids, false).unwrap(),
        "desc-brain_T1w"
    );
}

#[test]
fn use_extension_forces_the_extension() {
    let artifact = Artifact::new("T1w")
        .with_desc("brain")
        .with_extension("nii.gz")
        .with_use_extension(true);
    assert_eq!(
        compose(&artifact, None, NamingMode::SimplifiedBids, false).unwrap(),
        "desc-brain_T1w.nii.gz"
    );
}

#[test]
fn desc_only_mode() {
    let artifact = Artifact::new("bold").with_desc("motion").with_extension("1D");
    assert_eq!(
        compose(&artifact, None, NamingMode::DescOnly, true).unwrap(),
        "motion.1D"
    );

    let no_desc = Artifact::new("bold").with_extension("1D");
    assert!(matches!(
        compose(&no_desc, None, NamingMode::DescOnly, true),
        Err(NeuroflowError::Validation(_))
    ));
}

#[test]
fn run_bids_includes_subject_and_session() {
    let identity = Identity {
        subject: "07",
        session: Some("2"),
    };
    let name = compose(&raw_bold(), Some(identity), NamingMode::RunBids, true).unwrap();
    assert_eq!(name, "sub-07_ses-2_task-rest_bold.nii");
}

#[test]
fn non_alphanumeric_entity_value_is_rejected() {
    let artifact = Artifact::new("bold").with_desc("not-ok").with_extension("nii");
    assert!(matches!(
        compose(&artifact, None, NamingMode::SimplifiedBids, true),
        Err(NeuroflowError::Validation(_))
    ));
}

#[test]
fn format_override_changes_mode_and_extension() {
    let ds = Dataset::new();
    let ctx = ds.ctx();
    let format = NameFormat {
        naming: Some(NamingMode::SimplifiedBids),
        extension: Some(false),
    };
    let bound = BoundArtifact::new(echo_bold(), ctx, format);
    assert_eq!(
        bound.resolve_name().unwrap(),
        "task-rest_echo-2_desc-copied_bold"
    );
}

#[test]
fn derive_from_leaves_source_untouched() {
    let source = echo_bold();
    let before = compose(&source, None, NamingMode::SimplifiedBids, true).unwrap();

    let derived = Artifact::derive_from(
        &source,
        &ArtifactPatch::new().desc("smoothed").clear(ArtifactField::Echo),
    )
    .unwrap();

    assert_eq!(
        compose(&source, None, NamingMode::SimplifiedBids, true).unwrap(),
        before
    );
    assert_eq!(
        compose(&derived, None, NamingMode::SimplifiedBids, true).unwrap(),
        "task-rest_desc-smoothed_bold.nii"
    );
    assert_eq!(derived.datatype(), Some("func"));
}

#[test]
fn many_builds_one_artifact_per_variant() {
    let base = Artifact::new("bold").with_datatype("func").with_extension("nii");
    let shared = ArtifactPatch::new().task("rest");
    let echoes = Artifact::many(
        &base,
        &shared,
        (1..=3).map(|e| ArtifactPatch::new().echo(e)),
    )
    .unwrap();

    let names: Vec<String> = echoes
        .iter()
        .map(|a| compose(a, None, NamingMode::SimplifiedBids, true).unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "task-rest_echo-1_bold.nii",
            "task-rest_echo-2_bold.nii",
            "task-rest_echo-3_bold.nii",
        ]
    );
}

#[test]
fn derive_many_patches_every_source_and_keeps_them() {
    let sources: Vec<Artifact> = (1..=3)
        .map(|e| {
            Artifact::new("bold")
                .with_datatype("func")
                .with_task("rest")
                .with_echo(e)
                .with_extension("nii")
        })
        .collect();
    let before = sources.clone();

    let derived = Artifact::derive_many(&sources, &ArtifactPatch::new().desc("despike")).unwrap();

    assert_eq!(sources, before);
    let names: Vec<String> = derived
        .iter()
        .map(|a| compose(a, None, NamingMode::SimplifiedBids, true).unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "task-rest_echo-1_desc-despike_bold.nii",
            "task-rest_echo-2_desc-despike_bold.nii",
            "task-rest_echo-3_desc-despike_bold.nii",
        ]
    );
}

#[test]
fn many_rejects_variant_overlapping_shared_fields() {
    let base = Artifact::new("bold");
    let shared = ArtifactPatch::new().task("rest");
    let err = Artifact::many(&base, &shared, [ArtifactPatch::new().task("motor")]).unwrap_err();
    assert!(matches!(err, NeuroflowError::Validation(_)));
}

fn suffix_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["bold", "T1w", "MP2RAGE", "fmap"])
}

fn label() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z0-9]{1,6}")
}

proptest! {
    #[test]
    fn names_follow_the_suffix_table(
        suffix in suffix_strategy(),
        task in label(),
        acq in label(),
        space in label(),
        desc in label(),
        run in prop::option::of(1u32..20),
        echo in prop::option::of(1u32..6),
    ) {
        let mut artifact = Artifact::new(suffix);
        if let Some(v) = &task { artifact = artifact.with_task(v.clone()); }
        if let Some(v) = &acq { artifact = artifact.with_acq(v.clone()); }
        if let Some(v) = &space { artifact = artifact.with_space(v.clone()); }
        if let Some(v) = &desc { artifact = artifact.with_desc(v.clone()); }
        if let Some(v) = run { artifact = artifact.with_run(v); }
        if let Some(v) = echo { artifact = artifact.with_echo(v); }

        let name = compose(&artifact, None, NamingMode::SimplifiedBids, false).unwrap();
        let tokens: Vec<&str> = name.split('_').collect();

        // Suffix is always the last token.
        prop_assert_eq!(*tokens.last().unwrap(), suffix);

        let order = entity_order(suffix).unwrap();
        let positions: Vec<usize> = tokens[..tokens.len() - 1]
            .iter()
            .map(|t| {
                let key = t.split('-').next().unwrap();
                order.iter().position(|k| *k == key).unwrap()
            })
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));

        // Exactly the set fields that the table knows about appear.
        let expected = [
            ("task", task.is_some()),
            ("acq", acq.is_some()),
            ("run", run.is_some()),
            ("echo", echo.is_some()),
            ("space", space.is_some()),
            ("desc", desc.is_some()),
        ]
        .iter()
        .filter(|(key, set)| *set && order.contains(key))
        .count();
        prop_assert_eq!(tokens.len() - 1, expected);
    }
}
