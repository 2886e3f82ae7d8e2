//! The conversation run loop
//!
//! A run proceeds as a sequence of strictly ordered steps. Each step:
//! derive the phase from the completed tool invocations so far, advertise
//! the phase's registered tools, ask the provider for a completion,
//! evaluate every proposed tool call (concurrently, with a barrier before
//! anything else), then check termination. Statistics-tool `{error}`
//! results are ordinary tool results; only provider failures abort a run.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use sift_core::phase::tool_names;
use sift_core::tool::{error_value, ToolContext, ToolInput};
use sift_core::{next_phase, DatasetStore, Phase, PhaseCatalog, ToolRegistry};

use crate::config::SiftConfig;
use crate::prompts;
use crate::provider::{ChatClient, ChatMessage, ChatRequest, ProviderError, ToolCallRequest};

/// Runtime settings for one agent
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub model: String,
    pub temperature: f32,
    /// Hard step budget; the run stops when it is reached
    pub max_steps: usize,
    /// Dataset handed to the conversation context, if any
    pub dataset_id: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: "openai/gpt-oss-20b".to_string(),
            temperature: 0.2,
            max_steps: 100,
            dataset_id: None,
        }
    }
}

impl RunConfig {
    /// Derive run settings from the loaded configuration
    pub fn from_settings(config: &SiftConfig, dataset_id: Option<String>) -> Self {
        Self {
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_steps: config.runtime.max_steps,
            dataset_id,
        }
    }
}

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A terminal tool completed this step
    Finalized { tool: String },
    /// The model answered directly without requesting tools
    DirectAnswer,
    /// The fixed step budget was reached
    StepBudget,
    /// The run was cancelled between steps
    Cancelled,
}

/// Result of a finished run
#[derive(Debug)]
pub struct RunOutcome {
    /// Last assistant text seen, if any
    pub final_text: Option<String>,
    pub stop_reason: StopReason,
    /// Phase after the final step
    pub phase: Phase,
    pub steps_taken: usize,
    /// Full message transcript, tool results included
    pub transcript: Vec<ChatMessage>,
}

/// Run errors. Only provider/transport faults are fatal.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// The orchestrator: drives a conversation against a chat model, exposing
/// phase-gated tools and enforcing termination.
pub struct Agent {
    client: Arc<dyn ChatClient>,
    registry: ToolRegistry,
    catalog: PhaseCatalog,
    store: Arc<DatasetStore>,
    config: RunConfig,
}

impl Agent {
    /// Create an agent with the standard catalog and default run settings
    pub fn new(client: Arc<dyn ChatClient>, registry: ToolRegistry, store: Arc<DatasetStore>) -> Self {
        Self {
            client,
            registry,
            catalog: PhaseCatalog::standard(),
            store,
            config: RunConfig::default(),
        }
    }

    /// Replace the run settings
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the phase catalog
    pub fn with_catalog(mut self, catalog: PhaseCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Run one conversation to termination
    pub async fn run(&self, prompt: impl Into<String>) -> Result<RunOutcome, RunError> {
        self.run_with_cancellation(prompt, CancellationToken::new())
            .await
    }

    /// Run one conversation, checking the token between steps.
    ///
    /// Cancellation is cooperative and lossy: in-flight tool calls finish
    /// (they have no side effects to roll back) and no partial output is
    /// salvaged beyond the transcript so far.
    pub async fn run_with_cancellation(
        &self,
        prompt: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut transcript = vec![ChatMessage::user(prompt)];
        let mut completed: HashSet<String> = HashSet::new();
        let mut phase = Phase::initial();
        let mut final_text: Option<String> = None;
        let mut steps_taken = 0;
        let mut stop_reason = StopReason::StepBudget;

        for step_index in 0..self.config.max_steps {
            if cancel.is_cancelled() {
                stop_reason = StopReason::Cancelled;
                break;
            }

            phase = next_phase(phase, &completed);
            let active_tools = self.registry.metas_for(self.catalog.allowed(phase));
            let system = prompts::system_instructions(phase, self.config.dataset_id.as_deref());

            tracing::info!(
                run_id = %run_id,
                step = step_index,
                phase = %phase,
                active_tool_count = active_tools.len(),
                "agent step prepared"
            );

            let completion = self
                .client
                .complete(ChatRequest {
                    model: self.config.model.clone(),
                    temperature: self.config.temperature,
                    system,
                    messages: transcript.clone(),
                    tools: active_tools,
                })
                .await?;
            steps_taken = step_index + 1;

            if let Some(text) = completion.content.as_deref() {
                if !text.is_empty() {
                    final_text = Some(text.to_string());
                }
            }
            transcript.push(ChatMessage::assistant(
                completion.content.clone(),
                completion.tool_calls.clone(),
            ));

            if completion.tool_calls.is_empty() {
                stop_reason = StopReason::DirectAnswer;
                break;
            }

            // All of a step's tool calls complete before the phase and
            // termination checks see any of them.
            let results = self
                .evaluate_tool_calls(&completion.tool_calls, phase, &run_id, &cancel)
                .await;

            let mut step_completed: Vec<String> = Vec::new();
            for (call, executed, value) in &results {
                transcript.push(ChatMessage::tool_result(&call.id, &call.name, value));
                if *executed {
                    completed.insert(call.name.clone());
                    step_completed.push(call.name.clone());
                }
            }

            if let Some(tool) = step_completed
                .iter()
                .find(|name| tool_names::TERMINAL_TOOLS.contains(&name.as_str()))
            {
                tracing::info!(run_id = %run_id, step = step_index, tool = %tool, "run finalized");
                stop_reason = StopReason::Finalized { tool: tool.clone() };
                break;
            }
        }

        phase = next_phase(phase, &completed);
        tracing::info!(
            run_id = %run_id,
            steps = steps_taken,
            phase = %phase,
            stop_reason = ?stop_reason,
            "run finished"
        );

        Ok(RunOutcome {
            final_text,
            stop_reason,
            phase,
            steps_taken,
            transcript,
        })
    }

    /// Evaluate a step's tool calls concurrently; results come back in call
    /// order. Returns `(call, executed, result)` where `executed` is false
    /// for gated or unregistered tools; those still produce a structured
    /// result for the model but never count as completed invocations.
    async fn evaluate_tool_calls(
        &self,
        calls: &[ToolCallRequest],
        phase: Phase,
        run_id: &str,
        cancel: &CancellationToken,
    ) -> Vec<(ToolCallRequest, bool, Value)> {
        let mut in_flight = FuturesUnordered::new();
        for (index, call) in calls.iter().enumerate() {
            let call = call.clone();
            let permitted = self.catalog.permits(phase, &call.name);
            let tool = self.registry.get(&call.name);
            let store = self.store.clone();
            let run_id = run_id.to_string();
            let cancel = cancel.child_token();

            in_flight.push(async move {
                let (executed, value) = if !permitted {
                    tracing::warn!(
                        run_id = %run_id,
                        tool = %call.name,
                        phase = %phase,
                        "tool call rejected: not offered in current phase"
                    );
                    (
                        false,
                        error_value(format!(
                            "Tool '{}' is not available in the current phase '{}'.",
                            call.name, phase
                        )),
                    )
                } else if let Some(tool) = tool {
                    let ctx = ToolContext::with_cancellation_token(
                        run_id.clone(),
                        call.id.clone(),
                        store,
                        cancel,
                    );
                    let value = tool.call(ToolInput::with_params(call.arguments.clone()), ctx).await;
                    tracing::debug!(
                        run_id = %run_id,
                        tool = %call.name,
                        is_error = value.get("error").is_some(),
                        "tool call completed"
                    );
                    (true, value)
                } else {
                    (
                        false,
                        error_value(format!("Tool '{}' is not registered.", call.name)),
                    )
                };
                (index, call, executed, value)
            });
        }

        let mut results: Vec<Option<(ToolCallRequest, bool, Value)>> =
            (0..calls.len()).map(|_| None).collect();
        while let Some((index, call, executed, value)) = in_flight.next().await {
            results[index] = Some((call, executed, value));
        }
        results.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use sift_core::tool::{Tool, ToolMeta};
    use sift_core::ToolRegistry;
    use sift_eda::install_statistics_tools;

    use crate::provider::{ChatCompletion, MockChatClient};

    /// Stand-in for the external SQL-catalog tool group.
    struct StaticTool {
        name: &'static str,
        result: Value,
    }

    impl StaticTool {
        fn new(name: &'static str, result: Value) -> Arc<Self> {
            Arc::new(Self { name, result })
        }
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "external tool stub"
        }

        fn metadata(&self) -> ToolMeta {
            ToolMeta::new(self.name, "external tool stub")
        }

        async fn call(&self, _input: ToolInput, _ctx: ToolContext) -> Value {
            self.result.clone()
        }
    }

    fn store_with_dataset() -> (Arc<DatasetStore>, String) {
        let store = Arc::new(DatasetStore::new());
        let rows = vec![
            json!({"x": 1.0, "y": 2.0}),
            json!({"x": 2.0, "y": 4.0}),
            json!({"x": 3.0, "y": 6.0}),
        ]
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect();
        let summary = store.add_dataset("run.csv", rows).expect("add");
        (store, summary.id)
    }

    fn full_registry(store: &Arc<DatasetStore>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        install_statistics_tools(&mut registry, store);
        for name in [
            tool_names::SEARCH_CATALOG,
            tool_names::SEARCH_SCHEMA,
            tool_names::CLARIFY_INTENT,
            tool_names::FINALIZE_PLAN,
            tool_names::FINALIZE_NO_DATA,
            tool_names::BUILD_SQL,
            tool_names::VALIDATE_SQL,
            tool_names::FINALIZE_BUILD,
            tool_names::ESTIMATE_COST,
            tool_names::EXECUTE_SQL_WITH_REPAIR,
            tool_names::SANITY_CHECK,
            tool_names::FORMAT_RESULTS,
            tool_names::EXPLAIN_RESULTS,
            tool_names::FINALIZE_REPORT,
        ] {
            registry.register(StaticTool::new(name, json!({"ok": true})));
        }
        registry
    }

    fn agent_with_script(
        store: Arc<DatasetStore>,
        dataset_id: Option<String>,
        script: Vec<ChatCompletion>,
    ) -> (Agent, Arc<MockChatClient>) {
        let client = Arc::new(MockChatClient::new(script));
        let registry = full_registry(&store);
        let agent = Agent::new(client.clone(), registry, store).with_config(RunConfig {
            dataset_id,
            ..RunConfig::default()
        });
        (agent, client)
    }

    #[test]
    fn test_full_pipeline_walks_phases_and_stops_at_finalize_report() {
        tokio_test::block_on(async {
            let (store, dataset_id) = store_with_dataset();
            let script = vec![
                ChatCompletion::default()
                    .with_tool_call("DescribeDataset", json!({"datasetId": dataset_id.clone()}))
                    .with_tool_call("SummarizeColumns", json!({"datasetId": dataset_id.clone()})),
                ChatCompletion::default().with_tool_call("FinalizePlan", json!({})),
                ChatCompletion::default()
                    .with_tool_call("BuildSql", json!({}))
                    .with_tool_call("FinalizeBuild", json!({})),
                ChatCompletion::default().with_tool_call("ExecuteSqlWithRepair", json!({})),
                ChatCompletion::default().with_tool_call("FinalizeReport", json!({})),
            ];
            let (agent, client) =
                agent_with_script(store, Some(dataset_id.clone()), script);

            let outcome = agent.run("give me a full report").await.expect("run");

            assert_eq!(
                outcome.stop_reason,
                StopReason::Finalized {
                    tool: "FinalizeReport".to_string()
                }
            );
            assert_eq!(outcome.phase, Phase::Reporting);
            assert_eq!(outcome.steps_taken, 5);

            // Per-step instructions and tool lists follow the phase.
            let requests = client.recorded_requests();
            assert!(requests[0].system.contains("PlanningSpecialist"));
            assert!(requests[0].system.contains(&dataset_id));
            assert!(requests[1].system.contains("PlanningSpecialist"));
            assert!(requests[2].system.contains("BuildingSpecialist"));
            assert!(requests[3].system.contains("ExecutionManager"));
            assert!(requests[4].system.contains("ReportingSpecialist"));

            assert!(requests[0].tool_names.contains(&"SummarizeColumns".to_string()));
            assert!(!requests[2].tool_names.contains(&"SummarizeColumns".to_string()));
            assert!(requests[2].tool_names.contains(&"BuildSql".to_string()));
            assert_eq!(
                requests[3].tool_names,
                vec!["EstimateCost".to_string(), "ExecuteSqlWithRepair".to_string()]
            );
        });
    }

    #[test]
    fn test_finalize_no_data_terminates_well_before_step_budget() {
        tokio_test::block_on(async {
            let (store, _) = store_with_dataset();
            let script = vec![
                ChatCompletion::default().with_tool_call("FinalizeNoData", json!({})),
                // Never reached; the mock would serve it if the loop overran.
                ChatCompletion::text("should not be requested"),
            ];
            let (agent, _) = agent_with_script(store, None, script);

            let outcome = agent.run("is churn tracked?").await.expect("run");
            assert_eq!(
                outcome.stop_reason,
                StopReason::Finalized {
                    tool: "FinalizeNoData".to_string()
                }
            );
            assert_eq!(outcome.steps_taken, 1);
            assert_eq!(outcome.phase, Phase::Planning);
        });
    }

    #[test]
    fn test_clarify_intent_is_terminal() {
        tokio_test::block_on(async {
            let (store, _) = store_with_dataset();
            let script =
                vec![ChatCompletion::default().with_tool_call("ClarifyIntent", json!({}))];
            let (agent, _) = agent_with_script(store, None, script);

            let outcome = agent.run("show me the growth").await.expect("run");
            assert!(matches!(outcome.stop_reason, StopReason::Finalized { .. }));
        });
    }

    #[test]
    fn test_direct_answer_without_tools_ends_the_run() {
        tokio_test::block_on(async {
            let (store, _) = store_with_dataset();
            let script = vec![ChatCompletion::text("42 rows, 3 columns.")];
            let (agent, _) = agent_with_script(store, None, script);

            let outcome = agent.run("how big is it?").await.expect("run");
            assert_eq!(outcome.stop_reason, StopReason::DirectAnswer);
            assert_eq!(outcome.final_text.as_deref(), Some("42 rows, 3 columns."));
            assert_eq!(outcome.steps_taken, 1);
        });
    }

    #[test]
    fn test_step_budget_stops_a_run_that_never_finalizes() {
        tokio_test::block_on(async {
            let (store, dataset_id) = store_with_dataset();
            let step = || {
                ChatCompletion::default()
                    .with_tool_call("DescribeDataset", json!({"datasetId": dataset_id.clone()}))
            };
            let script = vec![step(), step(), step(), step(), step()];
            let client = Arc::new(MockChatClient::new(script));
            let registry = full_registry(&store);
            let agent = Agent::new(client, registry, store).with_config(RunConfig {
                max_steps: 3,
                dataset_id: Some(dataset_id.clone()),
                ..RunConfig::default()
            });

            let outcome = agent.run("loop forever").await.expect("run");
            assert_eq!(outcome.stop_reason, StopReason::StepBudget);
            assert_eq!(outcome.steps_taken, 3);
        });
    }

    #[test]
    fn test_out_of_phase_tool_call_is_rejected_not_executed() {
        tokio_test::block_on(async {
            let (store, _) = store_with_dataset();
            // BuildSql belongs to the building phase; the model proposes it
            // during planning.
            let script = vec![
                ChatCompletion::default().with_tool_call("BuildSql", json!({})),
                ChatCompletion::text("understood"),
            ];
            let (agent, client) = agent_with_script(store, None, script);

            let outcome = agent.run("jump ahead").await.expect("run");

            let rejection = outcome
                .transcript
                .iter()
                .find_map(|m| match m {
                    ChatMessage::Tool { name, content, .. } if name == "BuildSql" => {
                        Some(content.clone())
                    }
                    _ => None,
                })
                .expect("rejection result present");
            assert!(rejection.contains("not available in the current phase 'planning'"));

            // The rejected call never counts as completed: the run stays in
            // planning and continues normally.
            let requests = client.recorded_requests();
            assert!(requests[1].system.contains("PlanningSpecialist"));
            assert_eq!(outcome.stop_reason, StopReason::DirectAnswer);
        });
    }

    #[test]
    fn test_planning_shortcut_via_finalize_build_skips_building() {
        tokio_test::block_on(async {
            let (store, _) = store_with_dataset();
            let script = vec![
                ChatCompletion::default().with_tool_call("FinalizeBuild", json!({})),
                ChatCompletion::default().with_tool_call("ExecuteSqlWithRepair", json!({})),
                ChatCompletion::default().with_tool_call("FinalizeReport", json!({})),
            ];
            let (agent, client) = agent_with_script(store, None, script);

            let outcome = agent.run("cached query match").await.expect("run");
            assert_eq!(outcome.phase, Phase::Reporting);

            let requests = client.recorded_requests();
            assert!(requests[1].system.contains("ExecutionManager"));
        });
    }

    #[test]
    fn test_engine_error_result_does_not_abort_the_run() {
        tokio_test::block_on(async {
            let (store, _) = store_with_dataset();
            let script = vec![
                ChatCompletion::default()
                    .with_tool_call("SummarizeColumns", json!({"datasetId": "no-such-id"})),
                ChatCompletion::text("That dataset does not exist; please upload one."),
            ];
            let (agent, _) = agent_with_script(store, None, script);

            let outcome = agent.run("summarize it").await.expect("run");
            assert_eq!(outcome.stop_reason, StopReason::DirectAnswer);
            assert_eq!(outcome.steps_taken, 2);

            let error_result = outcome
                .transcript
                .iter()
                .find_map(|m| match m {
                    ChatMessage::Tool { content, .. } => Some(content.clone()),
                    _ => None,
                })
                .expect("tool result present");
            assert!(error_result.contains("not found"));
        });
    }

    #[test]
    fn test_pre_cancelled_run_stops_before_any_step() {
        tokio_test::block_on(async {
            let (store, _) = store_with_dataset();
            let script = vec![ChatCompletion::text("never used")];
            let (agent, client) = agent_with_script(store, None, script);

            let cancel = CancellationToken::new();
            cancel.cancel();
            let outcome = agent
                .run_with_cancellation("anything", cancel)
                .await
                .expect("run");

            assert_eq!(outcome.stop_reason, StopReason::Cancelled);
            assert_eq!(outcome.steps_taken, 0);
            assert!(client.recorded_requests().is_empty());
        });
    }

    #[test]
    fn test_unregistered_tool_produces_structured_error_result() {
        tokio_test::block_on(async {
            let (store, _) = store_with_dataset();
            let client = Arc::new(MockChatClient::new(vec![
                ChatCompletion::default().with_tool_call("SearchSchema", json!({"q": "churn"})),
                ChatCompletion::text("done"),
            ]));
            // Registry without the external planning tools.
            let mut registry = ToolRegistry::new();
            install_statistics_tools(&mut registry, &store);
            let agent = Agent::new(client, registry, store);

            let outcome = agent.run("is churn tracked?").await.expect("run");
            let result = outcome
                .transcript
                .iter()
                .find_map(|m| match m {
                    ChatMessage::Tool { content, .. } => Some(content.clone()),
                    _ => None,
                })
                .expect("tool result present");
            assert!(result.contains("not registered"));
        });
    }
}
