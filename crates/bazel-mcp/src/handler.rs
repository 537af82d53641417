//! Tool Handler
//!
//! Handles tool calls: pulls the arguments out of the request, resolves the
//! target, plans the query and runs bazel.

use std::fmt;
use std::path::Path;

use bazel_mcp_core::query::default_depth;
use bazel_mcp_core::{plan, resolve, BazelRunner, DepthArg};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::protocol::ToolResult;
use crate::tools::Operation;

/// What a failing call was working on, for error messages
#[derive(Debug, Clone)]
pub struct CallContext {
    pub operation: Operation,
    pub target: String,
    pub project_path: String,
    pub label: Option<String>,
    pub depth: Option<i64>,
}

impl fmt::Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for target {:?}", self.operation.name(), self.target)?;
        if let Some(label) = self.label.as_deref().filter(|l| *l != self.target) {
            write!(f, " (resolved to {})", label)?;
        }
        write!(f, " in project {:?}", self.project_path)?;
        if let Some(depth) = self.depth {
            write!(f, " with depth {}", depth)?;
        }
        Ok(())
    }
}

/// A failed tool call, tagged with the stage that failed
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("invalid arguments for {tool}: {message}")]
    Arguments { tool: &'static str, message: String },

    #[error("failed to resolve input to a bazel target: {context}: {source}")]
    Resolve {
        context: CallContext,
        #[source]
        source: bazel_mcp_core::Error,
    },

    #[error("failed to plan query: {context}: {source}")]
    Plan {
        context: CallContext,
        #[source]
        source: bazel_mcp_core::Error,
    },

    #[error("failed to execute bazel: {context}: {source}")]
    Execute {
        context: CallContext,
        #[source]
        source: bazel_mcp_core::Error,
    },
}

/// Successful call: raw bazel output plus any depth warning
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutput {
    pub output: String,
    pub warning: Option<String>,
}

/// Helper to get a required string argument
fn get_str(op: Operation, args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ToolError::Arguments {
            tool: op.name(),
            message: format!("{} must be a string, got {}", key, other),
        }),
        None => Err(ToolError::Arguments {
            tool: op.name(),
            message: format!("missing required argument: {}", key),
        }),
    }
}

/// Dispatches tool calls to bazel
#[derive(Debug, Clone, Default)]
pub struct Handler {
    runner: BazelRunner,
}

impl Handler {
    pub fn new(runner: BazelRunner) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &BazelRunner {
        &self.runner
    }

    /// Handle a tool call, folding failures into an error result
    pub async fn handle_tool(&self, op: Operation, arguments: Map<String, Value>) -> ToolResult {
        match self.call(op, &arguments).await {
            Ok(CallOutput { output, warning }) => {
                let result = ToolResult::success(output);
                match warning {
                    Some(note) => result.with_note(format!("warning: {}", note)),
                    None => result,
                }
            }
            Err(e) => {
                warn!("{} failed: {}", op.name(), e);
                ToolResult::error(e.to_string())
            }
        }
    }

    pub async fn call(
        &self,
        op: Operation,
        arguments: &Map<String, Value>,
    ) -> Result<CallOutput, ToolError> {
        let target = get_str(op, arguments, "target")?;
        let project_path = get_str(op, arguments, "project_path")?;
        for (field, value) in [("target", &target), ("project_path", &project_path)] {
            if value.is_empty() {
                return Err(ToolError::Arguments {
                    tool: op.name(),
                    message: format!("{} cannot be empty", field),
                });
            }
        }

        let depth = match op.depth_field() {
            Some(field) => DepthArg::parse(field, arguments.get(field)),
            None => DepthArg {
                value: None,
                warning: None,
            },
        };

        let mut context = CallContext {
            operation: op,
            target: target.clone(),
            project_path: project_path.clone(),
            label: None,
            depth: depth.value.or_else(|| default_depth(op.mode())),
        };

        let label = if op.resolves_paths() {
            match resolve(&target, &project_path) {
                Ok(label) => label.into_string(),
                Err(source) => return Err(ToolError::Resolve { context, source }),
            }
        } else {
            target.clone()
        };
        context.label = Some(label.clone());

        let plan = match plan(op.mode(), &label, depth.value) {
            Ok(plan) => plan,
            Err(source) => return Err(ToolError::Plan { context, source }),
        };

        let args = plan.args();
        info!(
            "Executing bazel command with args: {:?} in directory: [{}]",
            args, project_path
        );

        match self.runner.run(Path::new(&project_path), &args).await {
            Ok(output) => Ok(CallOutput {
                output,
                warning: depth.warning,
            }),
            Err(source) => Err(ToolError::Execute { context, source }),
        }
    }
}
