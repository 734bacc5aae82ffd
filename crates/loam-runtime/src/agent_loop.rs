use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use loam_core::{LoamError, Plan, Result};
use loam_executor::StepExecutor;
use loam_memory::{Experience, ExperienceMetrics, ExperienceStore};
use loam_planner::Planner;

/// The experience store as shared by concurrent runs. `store` and `retrieve`
/// serialize under this lock, so the capacity check and eviction are atomic
/// with the append.
pub type SharedStore = Arc<Mutex<ExperienceStore>>;

/// Lifecycle of one run. `Success` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Recovering,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Failed)
    }
}

/// Counters accumulated across the whole run, including replanned passes.
#[derive(Debug, Clone, Default)]
pub struct ExecutionMetrics {
    pub steps_completed: usize,
    pub steps_failed: usize,
    pub recovery_attempts: u32,
    /// Length of the initial plan; not rewritten by replanning.
    pub total_steps: usize,
}

impl ExecutionMetrics {
    pub fn completion_rate(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.steps_completed as f64 / self.total_steps as f64
    }

    pub fn failure_rate(&self) -> f64 {
        let attempts = self.steps_completed + self.steps_failed;
        if attempts == 0 {
            return 0.0;
        }
        self.steps_failed as f64 / attempts as f64
    }
}

/// The live, mutable record of one run. Owned by exactly one `AgentLoop`
/// invocation; never shared across concurrent runs.
#[derive(Debug)]
pub struct LoopState {
    pub goal: String,
    pub plan: Option<Plan>,
    /// Index into the plan's sub-goals — the sole cursor of progress.
    pub step_index: usize,
    pub status: ExecutionStatus,
    pub outputs: Vec<String>,
    pub metrics: ExecutionMetrics,
    pub error_log: Vec<String>,
}

impl LoopState {
    fn new(goal: &str) -> Self {
        Self {
            goal: goal.to_string(),
            plan: None,
            step_index: 0,
            status: ExecutionStatus::Running,
            outputs: Vec::new(),
            metrics: ExecutionMetrics::default(),
            error_log: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// The run's answer: the most recent step output, or empty when no step
    /// produced one (e.g. immediate success on an empty plan).
    pub fn last_output(&self) -> &str {
        self.outputs.last().map(String::as_str).unwrap_or("")
    }
}

/// Knobs for the loop itself.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Replanning budget; once spent, the next failure is terminal.
    pub max_recovery_attempts: u32,
    /// Whether successful runs are offered to the experience store.
    pub record_experience: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_recovery_attempts: 3,
            record_experience: true,
        }
    }
}

type StepObserver = dyn Fn(&LoopState, &str, &str) + Send + Sync;

/// The agent execution loop.
///
/// Orchestrates plan generation, sequential step dispatch, bounded recovery,
/// run scoring, and the experience commit. External calls (planner, step
/// executor) are awaited one at a time, so step order is strictly sequential.
pub struct AgentLoop {
    store: SharedStore,
    planner: Arc<dyn Planner>,
    executor: Arc<dyn StepExecutor>,
    config: LoopConfig,
    observer: Option<Box<StepObserver>>,
}

impl AgentLoop {
    pub fn new(store: SharedStore, planner: Arc<dyn Planner>, executor: Arc<dyn StepExecutor>) -> Self {
        Self {
            store,
            planner,
            executor,
            config: LoopConfig::default(),
            observer: None,
        }
    }

    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Install a hook invoked after each successful step. Side-effect only.
    pub fn with_observer(
        mut self,
        observer: impl Fn(&LoopState, &str, &str) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Execute a complete planning and execution cycle for `goal`.
    ///
    /// Step-executor failures are consumed by the recovery transition and end
    /// at worst in `status == Failed` — they are never returned as `Err`. The
    /// only error out of `run` is a planner failure on the *initial* plan,
    /// before anything has executed.
    pub async fn run(&self, goal: &str) -> Result<LoopState> {
        let mut state = LoopState::new(goal);

        let plan = {
            let store = self.store.lock().await;
            self.planner.generate_plan(goal, &store, false).await?
        };
        state.metrics.total_steps = plan.sub_goals.len();
        info!(goal, steps = plan.sub_goals.len(), executor = self.executor.name(), "starting run");
        state.plan = Some(plan);

        while !state.is_finished() {
            match self.execute_step(&mut state).await {
                Ok(()) => {}
                Err(e) => self.handle_failure(&mut state, e).await,
            }
        }

        if state.status == ExecutionStatus::Success && self.config.record_experience {
            self.record_experience(&state).await;
        }

        info!(
            goal,
            status = ?state.status,
            completed = state.metrics.steps_completed,
            failed = state.metrics.steps_failed,
            recoveries = state.metrics.recovery_attempts,
            "run finished"
        );
        Ok(state)
    }

    async fn execute_step(&self, state: &mut LoopState) -> Result<()> {
        let Some(plan) = state.plan.as_ref() else {
            state.status = ExecutionStatus::Success;
            return Ok(());
        };
        if state.step_index >= plan.sub_goals.len() {
            state.status = ExecutionStatus::Success;
            return Ok(());
        }

        let step = plan.sub_goals[state.step_index].clone();
        debug!(step_index = state.step_index, step = %step, "dispatching step");

        let prompt = build_step_prompt(&state.goal, &step, state.step_index);
        let output = self.executor.execute(&prompt).await?;

        state.outputs.push(output.clone());
        if let Some(plan) = state.plan.as_mut() {
            plan.add_step(&step);
        }
        state.metrics.steps_completed += 1;
        state.step_index += 1;

        if let Some(observer) = &self.observer {
            observer(state, &step, &output);
        }
        Ok(())
    }

    /// Recovery transition: log the failure, then either spend a recovery
    /// attempt on a fresh plan (restarting from step 0) or go terminal once
    /// the budget is exhausted.
    async fn handle_failure(&self, state: &mut LoopState, error: LoamError) {
        state.metrics.steps_failed += 1;
        state
            .error_log
            .push(format!("step {}: {}", state.step_index, error));
        warn!(step_index = state.step_index, error = %error, "step failed");

        if state.metrics.recovery_attempts >= self.config.max_recovery_attempts {
            warn!(
                attempts = state.metrics.recovery_attempts,
                "recovery budget exhausted, run failed"
            );
            state.status = ExecutionStatus::Failed;
            return;
        }

        state.status = ExecutionStatus::Recovering;
        state.metrics.recovery_attempts += 1;

        let failed_plan = state
            .plan
            .clone()
            .unwrap_or_else(|| Plan::new(&state.goal, Vec::new()));
        let replanned = {
            let store = self.store.lock().await;
            self.planner
                .replan(&failed_plan, &store, state.step_index)
                .await
        };

        match replanned {
            Ok(new_plan) => {
                info!(
                    attempt = state.metrics.recovery_attempts,
                    budget = self.config.max_recovery_attempts,
                    steps = new_plan.sub_goals.len(),
                    "recovered with a new plan"
                );
                state.plan = Some(new_plan);
                // Full restart against the new plan; partial resume is not attempted.
                state.step_index = 0;
                state.status = ExecutionStatus::Running;
            }
            Err(e) => {
                state.error_log.push(format!("replan failed: {e}"));
                warn!(error = %e, "replanning failed, run failed");
                state.status = ExecutionStatus::Failed;
            }
        }
    }

    /// Score the finished run and offer it to the store. Acceptance is
    /// logged; either way the terminal outcome stands.
    async fn record_experience(&self, state: &LoopState) {
        let Some(plan) = state.plan.clone() else {
            return;
        };

        let pei = self.calculate_pei(state);
        let frr = if state.metrics.recovery_attempts == 0 { 1.0 } else { 0.5 };
        let metrics = match ExperienceMetrics::new(pei)
            .and_then(|m| m.with_frr(frr))
            .and_then(|m| m.with_ti(1.0))
        {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "could not build run metrics");
                return;
            }
        };

        let experience = Experience::new(&state.goal, plan, state.last_output(), metrics);
        let mut store = self.store.lock().await;
        match store.store(experience).await {
            Ok(true) => info!(pei, "run recorded as experience"),
            Ok(false) => debug!(pei, "run below storage threshold, not recorded"),
            Err(e) => warn!(error = %e, "failed to record experience"),
        }
    }

    /// Performance-Efficiency Index: completion rate minus failure and
    /// recovery penalties, clamped to [0, 1].
    fn calculate_pei(&self, state: &LoopState) -> f64 {
        let completion = state.metrics.completion_rate();
        let failure_penalty = state.metrics.failure_rate() * 0.3;
        let recovery_penalty = state.metrics.recovery_attempts as f64
            / self.config.max_recovery_attempts.max(1) as f64
            * 0.2;
        (completion - failure_penalty - recovery_penalty).clamp(0.0, 1.0)
    }
}

fn build_step_prompt(goal: &str, step: &str, step_index: usize) -> String {
    format!(
        "You are an agent executing a procedural plan.\n\n\
         Overall Goal: {goal}\n\
         Current Step ({}): {step}\n\n\
         Execute this step and provide the result.\n\
         Be concise and action-oriented.",
        step_index + 1
    )
}
