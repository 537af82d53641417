//! Tool Definitions
//!
//! Every operation the server exposes, with the MCP schema it advertises.

use bazel_mcp_core::query::{DEFAULT_DEPS_DEPTH, DEFAULT_RDEPS_DEPTH};
use bazel_mcp_core::QueryMode;
use serde_json::{json, Value};

use crate::protocol::{InputSchema, Tool};

const PROJECT_PATH_DESCRIPTION: &str = "Where MODULE.bazel or WORKSPACE is located.";

/// An operation callable through `tools/call`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ReverseDependencies,
    Dependencies,
    Sources,
    Build,
    Test,
}

/// Registry of operations, in the order `tools/list` reports them
pub const OPERATIONS: [Operation; 5] = [
    Operation::ReverseDependencies,
    Operation::Dependencies,
    Operation::Sources,
    Operation::Build,
    Operation::Test,
];

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReverseDependencies => "reverse-dependencies",
            Self::Dependencies => "deps",
            Self::Sources => "sources",
            Self::Build => "build",
            Self::Test => "test",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        OPERATIONS.into_iter().find(|op| op.name() == name)
    }

    pub fn mode(&self) -> QueryMode {
        match self {
            Self::ReverseDependencies => QueryMode::ReverseDependencies,
            Self::Dependencies => QueryMode::Dependencies,
            Self::Sources => QueryMode::Sources,
            Self::Build => QueryMode::Build,
            Self::Test => QueryMode::Test,
        }
    }

    /// Whether `target` may be a file path that needs resolving to a label
    pub fn resolves_paths(&self) -> bool {
        matches!(
            self,
            Self::ReverseDependencies | Self::Dependencies | Self::Sources
        )
    }

    /// Name of the optional numeric depth argument, if the operation has one
    pub fn depth_field(&self) -> Option<&'static str> {
        match self {
            Self::ReverseDependencies => Some("max_depth"),
            Self::Dependencies => Some("depth"),
            Self::Sources | Self::Build | Self::Test => None,
        }
    }

    pub fn definition(&self) -> Tool {
        match self {
            Self::ReverseDependencies => tool(
                self.name(),
                "Given a bazel target, or file path, find all other bazel targets that depend on it.",
                json!({
                    "target": {
                        "type": "string",
                        "description": "The target to find reverse dependencies for."
                    },
                    "project_path": {"type": "string", "description": PROJECT_PATH_DESCRIPTION},
                    "max_depth": {
                        "type": "number",
                        "description": "The maximum depth to search for reverse dependencies. Set to -1 to search indefinitely. 1 finds the immediate targets.",
                        "default": DEFAULT_RDEPS_DEPTH
                    }
                }),
                vec!["target", "project_path"],
            ),
            Self::Dependencies => tool(
                self.name(),
                "Finds the dependencies of a given Bazel target or file path.",
                json!({
                    "target": {
                        "type": "string",
                        "description": "The Bazel target or file to find dependencies for (e.g., //foo:bar)."
                    },
                    "project_path": {"type": "string", "description": PROJECT_PATH_DESCRIPTION},
                    "depth": {
                        "type": "number",
                        "description": "The maximum depth for dependency search (default: 1 for direct deps, 0 for the target itself). Must be non-negative.",
                        "default": DEFAULT_DEPS_DEPTH
                    }
                }),
                vec!["target", "project_path"],
            ),
            Self::Sources => tool(
                self.name(),
                "Finds the source files associated with a given Bazel target or file path.",
                json!({
                    "target": {
                        "type": "string",
                        "description": "The Bazel target to find sources for (e.g., //foo:bar)."
                    },
                    "project_path": {"type": "string", "description": PROJECT_PATH_DESCRIPTION}
                }),
                vec!["target", "project_path"],
            ),
            Self::Build => tool(
                self.name(),
                "Builds a given Bazel target.",
                json!({
                    "target": {
                        "type": "string",
                        "description": "The Bazel target to build (e.g., //foo:bar)."
                    },
                    "project_path": {"type": "string", "description": PROJECT_PATH_DESCRIPTION}
                }),
                vec!["target", "project_path"],
            ),
            Self::Test => tool(
                self.name(),
                "Runs tests for a given Bazel target.",
                json!({
                    "target": {
                        "type": "string",
                        "description": "The Bazel target to test (e.g., //foo:test, //path/to/tests/...)."
                    },
                    "project_path": {"type": "string", "description": PROJECT_PATH_DESCRIPTION}
                }),
                vec!["target", "project_path"],
            ),
        }
    }
}

/// Create a tool definition with the given name, description, and schema properties
fn tool(name: &str, description: &str, properties: Value, required: Vec<&str>) -> Tool {
    let props = properties.as_object().cloned().unwrap_or_default();
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: InputSchema {
            schema_type: "object".to_string(),
            properties: props,
            required: required.into_iter().map(|s| s.to_string()).collect(),
        },
    }
}

/// Get all available tools
pub fn all_tools() -> Vec<Tool> {
    OPERATIONS.iter().map(Operation::definition).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tools_listed_in_order() {
        let names: Vec<String> = all_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["reverse-dependencies", "deps", "sources", "build", "test"]
        );
    }

    #[test]
    fn test_from_name_roundtrips() {
        for op in OPERATIONS {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
        assert_eq!(Operation::from_name("query"), None);
    }

    #[test]
    fn test_required_fields() {
        for tool in all_tools() {
            assert_eq!(tool.input_schema.required, vec!["target", "project_path"]);
            assert!(tool.input_schema.properties.contains_key("target"));
            assert!(tool.input_schema.properties.contains_key("project_path"));
        }
    }

    #[test]
    fn test_depth_fields_and_defaults() {
        let rdeps = Operation::ReverseDependencies.definition();
        assert_eq!(rdeps.input_schema.properties["max_depth"]["default"], json!(-1));

        let deps = Operation::Dependencies.definition();
        assert_eq!(deps.input_schema.properties["depth"]["default"], json!(1));

        for op in [Operation::Sources, Operation::Build, Operation::Test] {
            assert_eq!(op.depth_field(), None);
            assert_eq!(op.definition().input_schema.properties.len(), 2);
        }
    }

    #[test]
    fn test_build_and_test_do_not_resolve() {
        assert!(!Operation::Build.resolves_paths());
        assert!(!Operation::Test.resolves_paths());
        assert!(Operation::ReverseDependencies.resolves_paths());
    }
}
