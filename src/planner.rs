//! Planning: turn a goal into a validated plan.
//!
//! The [`Planner`] trait is the extension point. Any strategy must build a
//! candidate and validate the whole of it before returning; [`Plan`] can only
//! be constructed through validation, so that contract holds by type.

use serde_json::json;

use crate::config::PlannerConfig;
use crate::error::PlanResult;
use crate::plan::{Plan, PlanStep, Pointer};

/// Produces a validated plan from a goal.
pub trait Planner {
    fn plan(&self, goal: &str) -> PlanResult<Plan>;
}

/// A fixed search → fetch → parse template.
///
/// Only the search query depends on the goal, which is embedded verbatim.
/// Intended as a placeholder for real planning strategies.
#[derive(Debug, Clone, Default)]
pub struct TemplatePlanner {
    config: PlannerConfig,
}

impl TemplatePlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }
}

impl Planner for TemplatePlanner {
    fn plan(&self, goal: &str) -> PlanResult<Plan> {
        let steps = vec![
            PlanStep::new("search", "Searcher")
                .arg("query", goal)
                .arg("top_k", self.config.top_k),
            PlanStep::new("fetch", "Fetcher").arg("url", self.config.fetch_url.as_str()),
            PlanStep::new("parse", "Parser")
                .arg("raw", Pointer::new(1, "content"))
                .arg("schema", json!({"title": "css:h1"})),
        ];
        let plan = Plan::new(steps)?;
        tracing::debug!(goal, steps = plan.len(), "template plan generated");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlanError;

    #[test]
    fn template_has_three_steps_with_goal_embedded() {
        let plan = TemplatePlanner::default().plan("find car deals").unwrap();
        let tools: Vec<_> = plan.iter().map(|s| s.with.as_str()).collect();
        assert_eq!(tools, vec!["Searcher", "Fetcher", "Parser"]);
        assert_eq!(plan.steps()[0].args["query"], json!("find car deals"));
        assert_eq!(plan.steps()[0].args["top_k"], json!(3));
        assert_eq!(
            plan.steps()[2].args["raw"],
            json!({"from": 1, "field": "content"})
        );
    }

    #[test]
    fn invalid_configuration_fails_validation() {
        let planner = TemplatePlanner::new(PlannerConfig {
            top_k: 0,
            ..Default::default()
        });
        assert!(matches!(
            planner.plan("anything"),
            Err(PlanError::Validation { .. })
        ));

        let planner = TemplatePlanner::new(PlannerConfig {
            fetch_url: "::not a url".into(),
            ..Default::default()
        });
        assert!(matches!(
            planner.plan("anything"),
            Err(PlanError::Validation { .. })
        ));
    }
}
