//! External tool invocation shared by the acquirer and the streaming transformer
//!
//! Tools are described as a program plus an argument template; `{name}`
//! placeholders are substituted per invocation, so any tool honouring the same
//! contract can be swapped in through configuration.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::Level;

/// Number of trailing stderr lines kept for error messages
const STDERR_TAIL_LINES: usize = 5;

/// Program and argument template for an external tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new<S: Into<String>>(program: impl Into<String>, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Arguments with every `{key}` replaced by its value
    ///
    /// Each template argument is scanned once; substituted values are copied
    /// verbatim and never searched for further placeholders. Unknown `{...}`
    /// tokens are kept as written.
    pub fn render_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args.iter().map(|arg| render(arg, vars)).collect()
    }

    /// Tokio command with rendered arguments, null stdin, killed when dropped
    pub fn command(&self, vars: &[(&str, &str)]) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.render_args(vars))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                rendered.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                rendered.push('{');
                rest = after;
            }
        }
    }

    rendered.push_str(rest);
    rendered
}

/// Forward a child's output stream into operator logs, line by line
///
/// Resolves to the last few lines once the stream closes, for error messages.
pub fn spawn_log_forwarder<R>(stream: R, tool: String, level: Level) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if level == Level::WARN {
                        tracing::warn!(tool = %tool, "{}", line);
                    } else {
                        tracing::debug!(tool = %tool, "{}", line);
                    }
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(tool = %tool, error = %e, "Stopped reading tool output");
                    break;
                }
            }
        }

        tail.into_iter().collect()
    })
}

/// Join a forwarder's tail into a single message fragment
pub async fn collect_tail(handle: Option<JoinHandle<Vec<String>>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_default().join(" | "),
        None => String::new(),
    }
}
