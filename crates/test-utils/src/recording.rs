use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use neuroflow::Action;

/// One recorded action invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub action: String,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    /// Call-stack trail, for actions built with [`Recorder::context_action`].
    pub trail: Option<String>,
}

/// Hands out callback actions that record every call.
///
/// The actions behave like a well-mannered tool: each output is written
/// (a copy of the first input, or the action name when there is none), and
/// an output that is also an input gets the action name appended in place.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy_action(&self, name: &str) -> Action {
        let calls = Arc::clone(&self.calls);
        let action_name = name.to_string();
        Action::plain(name, move |inputs, outputs| {
            record(&calls, &action_name, inputs, outputs, None);
            produce(&action_name, inputs, outputs)
        })
    }

    pub fn context_action(&self, name: &str) -> Action {
        let calls = Arc::clone(&self.calls);
        let action_name = name.to_string();
        Action::with_context(name, move |inputs, outputs, ctx| {
            record(&calls, &action_name, inputs, outputs, Some(ctx.trail()));
            produce(&action_name, inputs, outputs)
        })
    }

    /// Records the call, writes nothing and fails with `message`.
    pub fn failing_action(&self, name: &str, message: &str) -> Action {
        let calls = Arc::clone(&self.calls);
        let action_name = name.to_string();
        let message = message.to_string();
        Action::plain(name, move |inputs, outputs| {
            record(&calls, &action_name, inputs, outputs, None);
            Err(anyhow::anyhow!("{message}"))
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.action).collect()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn record(
    calls: &Mutex<Vec<Call>>,
    action: &str,
    inputs: &[PathBuf],
    outputs: &[PathBuf],
    trail: Option<String>,
) {
    calls.lock().unwrap().push(Call {
        action: action.to_string(),
        inputs: inputs.to_vec(),
        outputs: outputs.to_vec(),
        trail,
    });
}

fn produce(action: &str, inputs: &[PathBuf], outputs: &[PathBuf]) -> anyhow::Result<()> {
    for output in outputs {
        if inputs.contains(output) {
            append(output, action)?;
        } else if let Some(first) = inputs.first().filter(|p| p.exists()) {
            fs::copy(first, output)?;
        } else {
            fs::write(output, action)?;
        }
    }
    Ok(())
}

fn append(path: &Path, text: &str) -> anyhow::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    write!(file, "+{text}")?;
    Ok(())
}
