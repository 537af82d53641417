//! Query planning
//!
//! Turns a label, a mode and an optional depth into the `bazel` command line.

use std::fmt;

use crate::error::{Error, Result};

/// Universe for reverse-dependency searches: everything in the workspace
pub const RDEPS_SCOPE: &str = "//...";

/// Default depth for dependency queries (direct deps only)
pub const DEFAULT_DEPS_DEPTH: i64 = 1;

/// Default depth for reverse-dependency queries (unlimited)
pub const DEFAULT_RDEPS_DEPTH: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Dependencies,
    ReverseDependencies,
    Sources,
    Build,
    Test,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::ReverseDependencies => "reverse dependencies",
            Self::Sources => "sources",
            Self::Build => "build",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value for `bazel query --output`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Label,
    Graph,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Graph => "graph",
        }
    }
}

/// A fully planned bazel invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    Query {
        expression: String,
        output: OutputFormat,
    },
    Build {
        target: String,
    },
    Test {
        target: String,
    },
}

impl QueryPlan {
    /// Arguments for the `bazel` binary, subcommand first
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::Query { expression, output } => vec![
                "query".to_string(),
                expression.clone(),
                "--output".to_string(),
                output.as_str().to_string(),
            ],
            Self::Build { target } => vec!["build".to_string(), target.clone()],
            Self::Test { target } => vec!["test".to_string(), target.clone()],
        }
    }

    pub fn expression(&self) -> Option<&str> {
        match self {
            Self::Query { expression, .. } => Some(expression.as_str()),
            _ => None,
        }
    }

    pub fn output(&self) -> Option<OutputFormat> {
        match self {
            Self::Query { output, .. } => Some(*output),
            _ => None,
        }
    }
}

/// The depth `plan` uses for `mode` when none is given
pub fn default_depth(mode: QueryMode) -> Option<i64> {
    match mode {
        QueryMode::Dependencies => Some(DEFAULT_DEPS_DEPTH),
        QueryMode::ReverseDependencies => Some(DEFAULT_RDEPS_DEPTH),
        QueryMode::Sources | QueryMode::Build | QueryMode::Test => None,
    }
}

/// Plan the bazel invocation for `label` in `mode`.
///
/// `depth` is ignored by modes that have no notion of depth. Build and test
/// take `label` verbatim as a positional argument.
pub fn plan(mode: QueryMode, label: &str, depth: Option<i64>) -> Result<QueryPlan> {
    let plan = match mode {
        QueryMode::Dependencies => {
            let depth = depth.unwrap_or(DEFAULT_DEPS_DEPTH);
            if depth < 0 {
                return Err(Error::invalid_argument(
                    "depth",
                    format!("depth argument cannot be negative, got {}", depth),
                ));
            }
            QueryPlan::Query {
                expression: format!("deps('{}', {})", label, depth),
                output: OutputFormat::Label,
            }
        }
        QueryMode::ReverseDependencies => {
            let depth = depth.unwrap_or(DEFAULT_RDEPS_DEPTH);
            // depth <= 0 means unbounded
            let expression = if depth > 0 {
                format!("rdeps({}, {}, {})", RDEPS_SCOPE, label, depth)
            } else {
                format!("rdeps({}, {})", RDEPS_SCOPE, label)
            };
            QueryPlan::Query {
                expression,
                output: OutputFormat::Graph,
            }
        }
        QueryMode::Sources => QueryPlan::Query {
            expression: format!("kind('source file', deps('{}'))", label),
            output: OutputFormat::Label,
        },
        QueryMode::Build => QueryPlan::Build {
            target: label.to_string(),
        },
        QueryMode::Test => QueryPlan::Test {
            target: label.to_string(),
        },
    };
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deps_default_depth() {
        let plan = plan(QueryMode::Dependencies, "//a:b", None).unwrap();
        assert_eq!(plan.expression(), Some("deps('//a:b', 1)"));
        assert_eq!(plan.output(), Some(OutputFormat::Label));
        assert_eq!(
            plan.args(),
            vec!["query", "deps('//a:b', 1)", "--output", "label"]
        );
    }

    #[test]
    fn test_deps_zero_and_explicit_depth() {
        let zero = plan(QueryMode::Dependencies, "//a:b", Some(0)).unwrap();
        assert_eq!(zero.expression(), Some("deps('//a:b', 0)"));

        let three = plan(QueryMode::Dependencies, "@ext//x:y", Some(3)).unwrap();
        assert_eq!(three.expression(), Some("deps('@ext//x:y', 3)"));
    }

    #[test]
    fn test_deps_negative_depth_rejected() {
        let err = plan(QueryMode::Dependencies, "//a:b", Some(-1)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { field: "depth", .. }));
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn test_rdeps_unlimited_by_default() {
        let plan = plan(QueryMode::ReverseDependencies, "//a:b", None).unwrap();
        assert_eq!(plan.expression(), Some("rdeps(//..., //a:b)"));
        assert_eq!(plan.output(), Some(OutputFormat::Graph));
    }

    #[test]
    fn test_rdeps_depth_bounds() {
        let one = plan(QueryMode::ReverseDependencies, "//a:b", Some(1)).unwrap();
        assert_eq!(one.expression(), Some("rdeps(//..., //a:b, 1)"));

        let zero = plan(QueryMode::ReverseDependencies, "//a:b", Some(0)).unwrap();
        assert_eq!(zero.expression(), Some("rdeps(//..., //a:b)"));

        let negative = plan(QueryMode::ReverseDependencies, "//a:b", Some(-7)).unwrap();
        assert_eq!(negative.expression(), Some("rdeps(//..., //a:b)"));
        assert_eq!(
            negative.args(),
            vec!["query", "rdeps(//..., //a:b)", "--output", "graph"]
        );
    }

    #[test]
    fn test_sources() {
        let plan = plan(QueryMode::Sources, "//foo:bar", None).unwrap();
        assert_eq!(
            plan.expression(),
            Some("kind('source file', deps('//foo:bar'))")
        );
        assert_eq!(plan.output(), Some(OutputFormat::Label));

        // depth has no meaning here
        let with_depth = super::plan(QueryMode::Sources, "//foo:bar", Some(-4)).unwrap();
        assert_eq!(with_depth, plan);
    }

    #[test]
    fn test_build_and_test_pass_target_through() {
        let build = plan(QueryMode::Build, "//foo/...", None).unwrap();
        assert_eq!(build.args(), vec!["build", "//foo/..."]);
        assert_eq!(build.expression(), None);
        assert_eq!(build.output(), None);

        let test = plan(QueryMode::Test, "src/not/a/label.go", Some(5)).unwrap();
        assert_eq!(test.args(), vec!["test", "src/not/a/label.go"]);
    }

    #[test]
    fn test_plan_is_deterministic() {
        for mode in [
            QueryMode::Dependencies,
            QueryMode::ReverseDependencies,
            QueryMode::Sources,
            QueryMode::Build,
            QueryMode::Test,
        ] {
            let a = plan(mode, "//a:b", Some(2)).unwrap();
            let b = plan(mode, "//a:b", Some(2)).unwrap();
            assert_eq!(a, b, "{mode}");
        }
    }

    #[test]
    fn test_default_depths() {
        assert_eq!(default_depth(QueryMode::Dependencies), Some(1));
        assert_eq!(default_depth(QueryMode::ReverseDependencies), Some(-1));
        assert_eq!(default_depth(QueryMode::Build), None);
    }
}
