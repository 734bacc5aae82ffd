use async_trait::async_trait;
use tracing::{debug, info};

use loam_core::{Plan, Result};
use loam_memory::ExperienceStore;

use crate::Planner;

/// A (predicate, template) pair. The predicate is a keyword list matched
/// case-insensitively against the goal; the template is a step list with
/// `{goal}` placeholders.
#[derive(Debug, Clone)]
pub struct TemplateRule {
    pub name: String,
    pub keywords: Vec<String>,
    pub steps: Vec<String>,
}

impl TemplateRule {
    pub fn new(name: &str, keywords: &[&str], steps: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn matches(&self, goal: &str) -> bool {
        let lower = goal.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    fn instantiate(&self, goal: &str) -> Vec<String> {
        self.steps.iter().map(|s| s.replace("{goal}", goal)).collect()
    }
}

/// Deterministic planner: memory retrieval first, then an ordered rule table.
///
/// Rule precedence is the literal order of the table — rules are evaluated
/// top-down and the first match wins. The final entry is the default
/// template, matched unconditionally.
pub struct TemplatePlanner {
    rules: Vec<TemplateRule>,
    default_rule: TemplateRule,
}

impl TemplatePlanner {
    pub fn new() -> Self {
        Self {
            rules: Self::default_rules(),
            default_rule: TemplateRule::new(
                "default",
                &[],
                &["Analyze {goal}", "Execute {goal}", "Validate result"],
            ),
        }
    }

    /// Replace the rule table. Order is precedence.
    pub fn with_rules(mut self, rules: Vec<TemplateRule>) -> Self {
        self.rules = rules;
        self
    }

    fn default_rules() -> Vec<TemplateRule> {
        vec![
            TemplateRule::new(
                "optimization",
                &["optimize", "optimization"],
                &[
                    "Analyze current {goal} metrics",
                    "Identify optimization opportunities",
                    "Execute optimization changes",
                    "Validate improvements",
                ],
            ),
            TemplateRule::new(
                "improvement",
                &["improve", "efficiency"],
                &[
                    "Measure the current baseline for {goal}",
                    "Identify the largest inefficiencies",
                    "Apply targeted changes",
                    "Verify the baseline moved",
                ],
            ),
            TemplateRule::new(
                "analysis",
                &["analyze", "analysis", "investigate"],
                &[
                    "Gather data relevant to {goal}",
                    "Analyze the collected data",
                    "Summarize findings",
                ],
            ),
        ]
    }

    fn template_plan(&self, goal: &str) -> Plan {
        let rule = self
            .rules
            .iter()
            .find(|r| r.matches(goal))
            .unwrap_or(&self.default_rule);
        debug!(goal, rule = %rule.name, "generating plan from template");
        let steps = rule.instantiate(goal);
        let minimum_length = steps.len();
        Plan::new(goal, steps).with_minimum_length(minimum_length)
    }
}

impl Default for TemplatePlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Planner for TemplatePlanner {
    async fn generate_plan(
        &self,
        goal: &str,
        store: &ExperienceStore,
        is_replan: bool,
    ) -> Result<Plan> {
        if !is_replan {
            if let Some(hit) = store.best_match(goal).await? {
                info!(
                    goal,
                    matched_task = %hit.experience.task,
                    similarity = hit.similarity,
                    combined = hit.combined,
                    "reusing plan from stored experience"
                );
                let reused = Plan::new(goal, hit.experience.plan.sub_goals.clone())
                    .with_minimum_length(hit.experience.plan.minimum_length);
                return Ok(reused);
            }
        }

        Ok(self.template_plan(goal))
    }

    async fn replan(
        &self,
        failed_plan: &Plan,
        store: &ExperienceStore,
        failure_index: usize,
    ) -> Result<Plan> {
        info!(
            goal = %failed_plan.goal,
            failure_index,
            "replanning after step failure"
        );
        // The retrieved plan just failed; go straight to the template path.
        self.generate_plan(&failed_plan.goal, store, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_matching_rule_wins() {
        let planner = TemplatePlanner::new();
        // "optimize" and "efficiency" both appear; the optimization rule is
        // listed first, so it takes precedence.
        let plan = planner.template_plan("Optimize process efficiency");
        assert_eq!(plan.sub_goals[1], "Identify optimization opportunities");
    }

    #[test]
    fn test_default_rule_closes_the_table() {
        let planner = TemplatePlanner::new();
        let plan = planner.template_plan("Bake a sourdough loaf");
        assert_eq!(plan.sub_goals.len(), 3);
        assert_eq!(plan.sub_goals[0], "Analyze Bake a sourdough loaf");
        assert_eq!(plan.sub_goals[2], "Validate result");
    }

    #[test]
    fn test_goal_substitution() {
        let planner = TemplatePlanner::new();
        let plan = planner.template_plan("Optimize General Operations");
        assert!(plan.sub_goals[0].contains("Optimize General Operations"));
        assert_eq!(plan.minimum_length, 4);
    }
}
