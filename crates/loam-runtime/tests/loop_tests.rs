#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use loam_core::Plan;
    use loam_executor::{AlwaysFailingExecutor, MockExecutor};
    use loam_memory::{Experience, ExperienceMetrics, ExperienceStore};
    use loam_planner::{Planner, TemplatePlanner, TemplateRule};
    use loam_runtime::{AgentLoop, ExecutionStatus, LoopConfig, SharedStore};
    use loam_similarity::SimilarityEngine;

    fn shared_store() -> SharedStore {
        Arc::new(Mutex::new(ExperienceStore::new(SimilarityEngine::lexical())))
    }

    fn planner() -> Arc<dyn Planner> {
        Arc::new(TemplatePlanner::new())
    }

    // ── Happy path ─────────────────────────────────────────────

    #[tokio::test]
    async fn test_clean_run_reaches_success_with_pei_one() {
        let store = shared_store();
        let agent = AgentLoop::new(store.clone(), planner(), Arc::new(MockExecutor::new()));

        let state = agent.run("Analyze system performance").await.unwrap();

        assert_eq!(state.status, ExecutionStatus::Success);
        assert_eq!(state.metrics.steps_completed, state.metrics.total_steps);
        assert_eq!(state.metrics.steps_failed, 0);
        assert_eq!(state.metrics.recovery_attempts, 0);
        assert!(!state.last_output().is_empty());

        // Zero failures, zero recoveries → PEI == completion rate == 1.0
        let store = store.lock().await;
        assert_eq!(store.len(), 1);
        let top = store.top_experiences(1);
        assert_eq!(top[0].metrics.pei(), 1.0);
        assert_eq!(top[0].metrics.frr(), 1.0);
    }

    #[tokio::test]
    async fn test_run_answer_is_last_step_output() {
        let store = shared_store();
        let agent = AgentLoop::new(store, planner(), Arc::new(MockExecutor::new()));

        let state = agent.run("Analyze system performance").await.unwrap();
        assert_eq!(state.outputs.last().unwrap(), state.last_output());
        assert_eq!(state.outputs.len(), state.metrics.steps_completed);
    }

    // ── Recovery & liveness ────────────────────────────────────

    #[tokio::test]
    async fn test_perpetual_failure_terminates_after_budget() {
        let store = shared_store();
        let agent = AgentLoop::new(store.clone(), planner(), Arc::new(AlwaysFailingExecutor));

        let state = agent.run("Analyze system performance").await.unwrap();

        assert_eq!(state.status, ExecutionStatus::Failed);
        // Exactly max_recovery_attempts (default 3) recovery transitions,
        // then the next failure is terminal.
        assert_eq!(state.metrics.recovery_attempts, 3);
        assert_eq!(state.metrics.steps_failed, 4);
        assert_eq!(state.metrics.steps_completed, 0);
        assert_eq!(state.error_log.len(), 4);

        // Failed runs are never offered to the store
        assert_eq!(store.lock().await.len(), 0);
    }

    #[tokio::test]
    async fn test_zero_recovery_budget_fails_on_first_error() {
        let store = shared_store();
        let config = LoopConfig {
            max_recovery_attempts: 0,
            record_experience: true,
        };
        let agent = AgentLoop::new(store, planner(), Arc::new(AlwaysFailingExecutor))
            .with_config(config);

        let state = agent.run("Analyze system performance").await.unwrap();
        assert_eq!(state.status, ExecutionStatus::Failed);
        assert_eq!(state.metrics.recovery_attempts, 0);
        assert_eq!(state.metrics.steps_failed, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_and_completes() {
        let store = shared_store();
        let agent = AgentLoop::new(
            store.clone(),
            planner(),
            Arc::new(MockExecutor::new().with_failures(1)),
        );

        let state = agent.run("Analyze system performance").await.unwrap();

        assert_eq!(state.status, ExecutionStatus::Success);
        assert_eq!(state.metrics.recovery_attempts, 1);
        assert_eq!(state.metrics.steps_failed, 1);
        // The analysis template has 3 steps; the restarted pass completes all
        assert_eq!(state.metrics.steps_completed, 3);

        // PEI = 1.0 − (1/4)·0.3 − (1/3)·0.2
        let store = store.lock().await;
        assert_eq!(store.len(), 1);
        let pei = store.top_experiences(1)[0].metrics.pei();
        assert!((pei - (1.0 - 0.25 * 0.3 - 0.2 / 3.0)).abs() < 1e-9);
        // A recovered run gets the reduced failure-recovery ratio
        assert_eq!(store.top_experiences(1)[0].metrics.frr(), 0.5);
    }

    #[tokio::test]
    async fn test_recovery_restarts_from_step_zero() {
        let store = shared_store();
        let executor = Arc::new(MockExecutor::new().with_failures(1));
        let prompts = executor.recorded_prompts();
        let agent = AgentLoop::new(store, planner(), executor);

        let state = agent.run("Analyze system performance").await.unwrap();
        assert_eq!(state.status, ExecutionStatus::Success);

        // First dispatch fails, then the new plan starts over at step 1:
        // 1 failed call + 3 clean calls
        let prompts = prompts.lock();
        assert_eq!(prompts.len(), 4);
        assert!(prompts[0].contains("Current Step (1)"));
        assert!(prompts[1].contains("Current Step (1)"));
    }

    // ── Experience commit ──────────────────────────────────────

    #[tokio::test]
    async fn test_recording_disabled_leaves_store_untouched() {
        let store = shared_store();
        let config = LoopConfig {
            max_recovery_attempts: 3,
            record_experience: false,
        };
        let agent =
            AgentLoop::new(store.clone(), planner(), Arc::new(MockExecutor::new())).with_config(config);

        let state = agent.run("Analyze system performance").await.unwrap();
        assert_eq!(state.status, ExecutionStatus::Success);
        assert_eq!(store.lock().await.len(), 0);
    }

    #[tokio::test]
    async fn test_low_quality_run_rejected_by_threshold() {
        let store = Arc::new(Mutex::new(
            ExperienceStore::new(SimilarityEngine::lexical())
                .with_storage_threshold(0.9)
                .unwrap(),
        ));
        let agent = AgentLoop::new(
            store.clone(),
            planner(),
            Arc::new(MockExecutor::new().with_failures(1)),
        );

        let state = agent.run("Analyze system performance").await.unwrap();
        // The run succeeds, but its PEI (~0.86) is below the 0.9 gate
        assert_eq!(state.status, ExecutionStatus::Success);
        assert_eq!(store.lock().await.len(), 0);
    }

    // ── Memory-driven planning scenarios ───────────────────────

    async fn seed_operations_experience(store: &SharedStore) {
        let plan = Plan::new(
            "Optimize General Operations",
            vec![
                "Analyze current operational metrics".into(),
                "Identify optimization opportunities".into(),
                "Execute optimization algorithms".into(),
                "Validate improvements".into(),
            ],
        )
        .with_minimum_length(4);
        let exp = Experience::new(
            "Optimize General Operations",
            plan,
            "Success",
            ExperienceMetrics::new(0.95).unwrap(),
        );
        assert!(store.lock().await.store(exp).await.unwrap());
    }

    #[tokio::test]
    async fn test_matching_goal_reuses_stored_plan() {
        let store = shared_store();
        seed_operations_experience(&store).await;

        let executor = Arc::new(MockExecutor::new());
        let prompts = executor.recorded_prompts();
        let agent = AgentLoop::new(store, planner(), executor);

        let state = agent.run("Optimize General Operations").await.unwrap();

        assert_eq!(state.status, ExecutionStatus::Success);
        let plan = state.plan.as_ref().unwrap();
        assert_eq!(plan.sub_goals.len(), 4);
        assert_eq!(plan.sub_goals[0], "Analyze current operational metrics");

        // The executed prompts carry the retrieved steps, not template text
        let prompts = prompts.lock();
        assert!(prompts[0].contains("Analyze current operational metrics"));
        assert!(prompts[3].contains("Validate improvements"));
    }

    #[tokio::test]
    async fn test_unmatched_goal_generates_fresh_plan() {
        let store = shared_store(); // empty
        let agent = AgentLoop::new(store, planner(), Arc::new(MockExecutor::new()));

        let state = agent
            .run("Improve Inventory Management Efficiency")
            .await
            .unwrap();

        assert_eq!(state.status, ExecutionStatus::Success);
        let plan = state.plan.as_ref().unwrap();
        // The improvement template, distinct from the seeded operations plan
        assert_eq!(plan.sub_goals.len(), 4);
        assert!(plan.sub_goals[0].starts_with("Measure the current baseline"));
        assert_ne!(plan.sub_goals[0], "Analyze current operational metrics");
    }

    // ── Observer & edge cases ──────────────────────────────────

    #[tokio::test]
    async fn test_observer_fires_after_each_step() {
        let store = shared_store();
        let seen: Arc<parking_lot::Mutex<Vec<(usize, String)>>> =
            Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_hook = Arc::clone(&seen);

        let agent = AgentLoop::new(store, planner(), Arc::new(MockExecutor::new())).with_observer(
            move |state, step, output| {
                assert!(!output.is_empty());
                seen_hook.lock().push((state.step_index, step.to_string()));
            },
        );

        let state = agent.run("Analyze system performance").await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), state.metrics.steps_completed);
        // step_index has already advanced past the completed step
        assert_eq!(seen[0].0, 1);
    }

    #[tokio::test]
    async fn test_empty_plan_is_immediate_success() {
        let rules = vec![TemplateRule::new("noop", &["idle"], &[])];
        let planner: Arc<dyn Planner> = Arc::new(TemplatePlanner::new().with_rules(rules));
        let store = shared_store();
        let agent = AgentLoop::new(store.clone(), planner, Arc::new(MockExecutor::new()));

        let state = agent.run("idle wait").await.unwrap();

        assert_eq!(state.status, ExecutionStatus::Success);
        assert_eq!(state.last_output(), "");
        assert_eq!(state.metrics.total_steps, 0);
        // completion rate 0 → PEI 0 → below the default gate
        assert_eq!(store.lock().await.len(), 0);
    }

    #[tokio::test]
    async fn test_executor_errors_never_escape_run() {
        let store = shared_store();
        let agent = AgentLoop::new(store, planner(), Arc::new(AlwaysFailingExecutor));
        // Even a run that fails every step returns Ok(state)
        let result = agent.run("Analyze system performance").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_runs_share_one_store() {
        let store = shared_store();
        let planner = planner();

        let mut handles = Vec::new();
        for i in 0..4 {
            let agent = AgentLoop::new(
                store.clone(),
                Arc::clone(&planner),
                Arc::new(MockExecutor::new()),
            );
            let goal = format!("Analyze subsystem number {i}");
            handles.push(tokio::spawn(async move { agent.run(&goal).await }));
        }
        for handle in handles {
            let state = handle.await.unwrap().unwrap();
            assert_eq!(state.status, ExecutionStatus::Success);
        }

        // All four perfect runs were committed under the shared lock
        assert_eq!(store.lock().await.len(), 4);
    }
}
