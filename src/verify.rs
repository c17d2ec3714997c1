//! Proactive configuration check of a recipe against its module.
//!
//! Verification never fails: it returns every problem it finds so the caller
//! can attach them to the recipe entry and keep going.

use crate::invoke::is_injected;
use crate::recipe::{RecipeDocument, is_internal_field};
use crate::registry::RecipeModule;
use std::fmt;
use thiserror::Error;

/// What is wrong with a step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssueKind {
    #[error("'function_name' cannot be an empty string")]
    EmptyFunctionName,

    #[error("Missing module for function '{0}'")]
    MissingModule(String),

    #[error("Function '{0}' not found in module")]
    FunctionNotFound(String),

    #[error("Parameter '{param}' in prompt_for not found in function '{function}'")]
    UndeclaredPromptParameter { function: String, param: String },

    #[error("Parameter '{param}' not found in function '{function}'")]
    UnknownParameter { function: String, param: String },
}

/// One verification finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Display name of the offending step
    pub step: String,
    pub kind: IssueKind,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.kind)
    }
}

/// Check every step's function reference and parameters.
///
/// Statement-only steps are never flagged. An empty `function_name` is,
/// even though such a step runs as a statement.
pub fn verify_recipe(recipe: &RecipeDocument, module: Option<&RecipeModule>) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    for step in &recipe.steps {
        let mut push = |kind| {
            issues.push(ConfigIssue {
                step: step.display_name.clone(),
                kind,
            })
        };

        let Some(name) = step.function_name.as_deref() else {
            continue;
        };
        if name.is_empty() {
            push(IssueKind::EmptyFunctionName);
            continue;
        }
        let Some(module) = module else {
            push(IssueKind::MissingModule(name.to_string()));
            continue;
        };
        let Some(function) = module.function(name) else {
            push(IssueKind::FunctionNotFound(name.to_string()));
            continue;
        };

        for param in step.prompt_for.keys() {
            if !function.declares(param) {
                push(IssueKind::UndeclaredPromptParameter {
                    function: name.to_string(),
                    param: param.clone(),
                });
            }
        }

        for param in step.extra_params.keys() {
            if is_internal_field(param) || is_injected(param) || function.declares(param) {
                continue;
            }
            push(IssueKind::UnknownParameter {
                function: name.to_string(),
                param: param.clone(),
            });
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::Step;
    use crate::registry::RecipeFunction;
    use serde_json::json;

    fn recipe(steps: Vec<Step>) -> RecipeDocument {
        RecipeDocument {
            version: "1.1".to_string(),
            title: "T".to_string(),
            description: "D".to_string(),
            display_hints: None,
            steps,
        }
    }

    fn module() -> RecipeModule {
        RecipeModule::new("m").with_function(RecipeFunction::new(
            "copy",
            &["src", "dst", "console"],
            |_| Ok(json!(true)),
        ))
    }

    #[test]
    fn test_clean_recipe_has_no_issues() {
        let doc = recipe(vec![
            Step::statement("Step 1", "intro"),
            Step::statement("Step 2", "copy")
                .with_function("copy")
                .with_prompt("src", "From?")
                .with_param("dst", json!("/tmp"))
                .with_param("recipe_context", json!(null))
                .with_param("_comment", json!("ignored")),
        ]);
        assert!(verify_recipe(&doc, Some(&module())).is_empty());
    }

    #[test]
    fn test_statement_only_recipe_needs_no_module() {
        let doc = recipe(vec![Step::statement("Step 1", "just text")]);
        assert!(verify_recipe(&doc, None).is_empty());
    }

    #[test]
    fn test_reports_every_problem() {
        let doc = recipe(vec![
            Step::statement("Step 1", "a").with_function(""),
            Step::statement("Step 2", "b").with_function("missing"),
            Step::statement("Step 3", "c")
                .with_function("copy")
                .with_prompt("mode", "Mode?")
                .with_param("speed", json!(3)),
        ]);
        let issues: Vec<String> = verify_recipe(&doc, Some(&module()))
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            issues,
            vec![
                "Step 1: 'function_name' cannot be an empty string",
                "Step 2: Function 'missing' not found in module",
                "Step 3: Parameter 'mode' in prompt_for not found in function 'copy'",
                "Step 3: Parameter 'speed' not found in function 'copy'",
            ]
        );
    }

    #[test]
    fn test_missing_module() {
        let doc = recipe(vec![Step::statement("Step 1", "a").with_function("copy")]);
        let issues = verify_recipe(&doc, None);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::MissingModule("copy".into()));
    }
}
