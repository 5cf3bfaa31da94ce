#![allow(dead_code)]

pub use neuroflow_test_utils::builders::{Dataset, RAW_CONTENT, list_files, read_file, write_file};
pub use neuroflow_test_utils::recording::{Call, Recorder};
pub use neuroflow_test_utils::{init_tracing, with_timeout};

use neuroflow::Artifact;

/// `task-rest_bold.nii` under `func/`.
pub fn raw_bold() -> Artifact {
    Artifact::new("bold")
        .with_datatype("func")
        .with_task("rest")
        .with_extension("nii")
}

/// `raw_bold()` with a `desc` entity.
pub fn bold_desc(desc: &str) -> Artifact {
    raw_bold().with_desc(desc)
}
