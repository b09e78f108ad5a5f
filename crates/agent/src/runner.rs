//! The orchestration loop.
//!
//! One [`Orchestrator::run`] call owns one run: a fresh history seeded
//! with the user's message, up to [`MAX_ITERATIONS`] reasoning cycles,
//! and a terminal `end` event whatever happens. Each cycle:
//!
//! 1. Check for cancellation
//! 2. Validate strict turn alternation (a violation is fatal)
//! 3. Call the LLM through the retry policy
//! 4. Relay surfaced thoughts and provider-side grounding as events
//! 5. Tool-free response: final answer, or a nudge when empty
//! 6. Tool calls: dispatch each, emit call/result events, collect
//!    structured artifacts, append the paired turns, loop
//!
//! The reserved `ask_user` tool never reaches the registry; the loop
//! emits the question and parks on the clarification broker instead.

use crate::AgentError;
use crate::clarify::{ClarificationBroker, PendingQuestion};
use crate::grounding;
use crate::retry;
use crate::sink::EventSink;
use arbor_core::provider::{FunctionCall, GenerateConfig, LlmClient, ToolDefinition};
use arbor_core::tool::{ToolRegistry, ToolResult};
use arbor_core::turn::{History, Turn};
use arbor_tools::{ASK_USER_TOOL, ask_user_declaration};
use arbor_trace::{QuestionType, RunStatus, TraceEvent, TracePayload};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const MAX_ITERATIONS: u32 = 10;

/// Consecutive empty responses tolerated before giving up.
const EMPTY_RESPONSE_LIMIT: u32 = 2;

const NUDGE: &str = "please continue and provide your answer";

const APOLOGY: &str =
    "I'm sorry, I was unable to produce a response. Please try rephrasing your request.";

const OUT_OF_STEPS: &str =
    "I ran out of steps while working on your request. Please try again with a simpler question.";

/// What a finished run hands back to its caller.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Final natural-language answer.
    pub text: String,

    /// Terminal status (mirrors the `end` event).
    pub status: RunStatus,

    /// Payloads of successful formatting tools, in execution order.
    pub structured_results: Vec<serde_json::Value>,

    /// Iterations consumed.
    pub iterations: u32,
}

/// The orchestration loop over one LLM client and one tool registry.
pub struct Orchestrator {
    client: Arc<dyn LlmClient>,
    model: String,
    system_prompt: Option<String>,
    tools: Arc<ToolRegistry>,
    /// Registry definitions plus the reserved `ask_user` declaration.
    declarations: Vec<ToolDefinition>,
    max_iterations: u32,
    clarifications: Arc<ClarificationBroker>,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        clarifications: Arc<ClarificationBroker>,
    ) -> Self {
        let mut declarations = tools.definitions();
        declarations.push(ask_user_declaration());
        Self {
            client,
            model: model.into(),
            system_prompt: None,
            tools,
            declarations,
            max_iterations: MAX_ITERATIONS,
            clarifications,
        }
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Execute one run for `user_message`, emitting every observable step
    /// into `sink`.
    pub async fn run(
        &self,
        user_message: &str,
        run_id: &str,
        sink: &EventSink,
    ) -> std::result::Result<RunOutcome, AgentError> {
        info!(run_id, model = %self.model, "Starting run");
        sink.emit(TraceEvent::new(
            run_id,
            0,
            TracePayload::Start {
                model: self.model.clone(),
                max_iterations: self.max_iterations,
                user_message: user_message.to_string(),
            },
        ));

        let mut history = History::new();
        history.push(Turn::user_text(user_message));
        self.run_loop(&mut history, run_id, sink).await
    }

    /// The iteration loop proper, over a caller-owned history.
    async fn run_loop(
        &self,
        history: &mut History,
        run_id: &str,
        sink: &EventSink,
    ) -> std::result::Result<RunOutcome, AgentError> {
        let started = Instant::now();
        let config = GenerateConfig {
            system_instruction: self.system_prompt.clone(),
            tools: self.declarations.clone(),
            search_grounding: false,
            include_thoughts: true,
        };

        let mut structured_results: Vec<serde_json::Value> = Vec::new();
        let mut empty_responses = 0u32;

        for iteration in 1..=self.max_iterations {
            if sink.is_cancelled() {
                info!(run_id, iteration, "Run cancelled");
                return Err(AgentError::Cancelled);
            }

            if let Err(e) = history.validate_alternation() {
                warn!(run_id, error = %e, "Corrupted turn order, aborting run");
                self.fail(run_id, iteration, started, e.to_string(), sink);
                return Err(e.into());
            }

            debug!(run_id, iteration, turns = history.len(), "Loop iteration");

            let response = match retry::generate_with_retry(
                self.client.as_ref(),
                &self.model,
                history.turns(),
                &config,
                run_id,
                iteration,
                sink,
            )
            .await
            {
                Ok(response) => response,
                Err(e) => {
                    self.fail(run_id, iteration, started, e.to_string(), sink);
                    return Err(e.into());
                }
            };

            for thought in response.thoughts() {
                sink.emit(TraceEvent::new(
                    run_id,
                    iteration,
                    TracePayload::Thinking {
                        text: thought.to_string(),
                    },
                ));
            }

            for event in grounding::synthesize(run_id, iteration, response.grounding.as_ref()) {
                sink.emit(event);
            }

            if response.function_calls.is_empty() {
                let text = response.text();
                if text.trim().is_empty() {
                    empty_responses += 1;
                    sink.emit(TraceEvent::new(
                        run_id,
                        iteration,
                        TracePayload::Error {
                            message: format!(
                                "Model returned an empty response ({empty_responses}/{EMPTY_RESPONSE_LIMIT})"
                            ),
                        },
                    ));
                    if empty_responses >= EMPTY_RESPONSE_LIMIT {
                        self.fail(run_id, iteration, started, APOLOGY.to_string(), sink);
                        return Err(AgentError::EmptyResponse);
                    }
                    // The empty model turn still goes into history so the
                    // synthetic nudge keeps strict alternation.
                    history.push(response.model_turn());
                    history.push(Turn::user_text(NUDGE));
                    continue;
                }

                sink.emit(TraceEvent::new(
                    run_id,
                    iteration,
                    TracePayload::Text { text: text.clone() },
                ));
                sink.emit(TraceEvent::new(
                    run_id,
                    iteration,
                    TracePayload::End {
                        status: RunStatus::Completed,
                        duration_ms: started.elapsed().as_millis() as u64,
                        total_iterations: iteration,
                    },
                ));
                info!(run_id, iteration, "Run completed");
                return Ok(RunOutcome {
                    text,
                    status: RunStatus::Completed,
                    structured_results,
                    iterations: iteration,
                });
            }

            empty_responses = 0;
            history.push(response.model_turn());

            let mut responses: Vec<(String, serde_json::Value)> = Vec::new();
            for call in &response.function_calls {
                let result = if call.name == ASK_USER_TOOL {
                    self.ask_user(run_id, iteration, call, sink).await
                } else {
                    self.dispatch(run_id, iteration, call, sink).await
                };

                if !result.is_error && result.result.get("type").is_some() {
                    structured_results.push(result.result.clone());
                }
                responses.push((call.name.clone(), result.result));
            }
            history.push(Turn::function_responses(responses));
        }

        // The exhaustion message travels in the outcome, not the trace.
        sink.emit(TraceEvent::new(
            run_id,
            self.max_iterations,
            TracePayload::End {
                status: RunStatus::MaxIterations,
                duration_ms: started.elapsed().as_millis() as u64,
                total_iterations: self.max_iterations,
            },
        ));
        warn!(run_id, iterations = self.max_iterations, "Run exhausted its iteration budget");
        Ok(RunOutcome {
            text: OUT_OF_STEPS.to_string(),
            status: RunStatus::MaxIterations,
            structured_results,
            iterations: self.max_iterations,
        })
    }

    /// Dispatch one registry tool, emitting the call/result event pair.
    async fn dispatch(
        &self,
        run_id: &str,
        iteration: u32,
        call: &FunctionCall,
        sink: &EventSink,
    ) -> ToolResult {
        sink.emit(TraceEvent::new(
            run_id,
            iteration,
            TracePayload::ToolCall {
                name: call.name.clone(),
                args: call.args.clone(),
            },
        ));

        let start = Instant::now();
        let result = self.tools.execute(&call.name, &call.args).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(run_id, tool = %call.name, duration_ms, is_error = result.is_error, "Tool executed");
        sink.emit(TraceEvent::new(
            run_id,
            iteration,
            TracePayload::ToolResult {
                name: call.name.clone(),
                result: result.result.clone(),
                duration_ms,
                is_error: result.is_error,
            },
        ));
        result
    }

    /// Handle the reserved clarification tool: emit the question, park on
    /// the broker, deliver the answer (or timeout) as a tool result.
    async fn ask_user(
        &self,
        run_id: &str,
        iteration: u32,
        call: &FunctionCall,
        sink: &EventSink,
    ) -> ToolResult {
        let question = call.args["question"].as_str().unwrap_or("").to_string();
        let question_type = match call.args["question_type"].as_str() {
            Some("select") => QuestionType::Select,
            Some("multi_select") => QuestionType::MultiSelect,
            Some("confirm") => QuestionType::Confirm,
            _ => QuestionType::Text,
        };
        let options = call.args["options"].as_array().map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect::<Vec<_>>()
        });
        let placeholder = call.args["placeholder"].as_str().map(String::from);

        let event = TraceEvent::new(
            run_id,
            iteration,
            TracePayload::AskUser {
                question: question.clone(),
                question_type,
                options: options.clone(),
                placeholder: placeholder.clone(),
                answer: None,
            },
        );
        let event_id = event.event_id.clone();
        sink.emit(event);

        let start = Instant::now();
        let outcome = self
            .clarifications
            .wait(
                &event_id,
                PendingQuestion {
                    question,
                    question_type,
                    options,
                    placeholder,
                },
            )
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(answer) => ToolResult::ok(serde_json::json!({ "answer": answer })),
            Err(e) => {
                warn!(run_id, event_id, error = %e, "Clarification failed");
                ToolResult::error(e.to_string())
            }
        };

        sink.emit(TraceEvent::new(
            run_id,
            iteration,
            TracePayload::ToolResult {
                name: ASK_USER_TOOL.into(),
                result: result.result.clone(),
                duration_ms,
                is_error: result.is_error,
            },
        ));
        result
    }

    /// Emit the terminal error/end pair for a failed run.
    fn fail(
        &self,
        run_id: &str,
        iteration: u32,
        started: Instant,
        message: String,
        sink: &EventSink,
    ) {
        sink.emit(TraceEvent::new(
            run_id,
            iteration,
            TracePayload::Error { message },
        ));
        sink.emit(TraceEvent::new(
            run_id,
            iteration,
            TracePayload::End {
                status: RunStatus::Error,
                duration_ms: started.elapsed().as_millis() as u64,
                total_iterations: iteration,
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use arbor_core::error::ProviderError;
    use arbor_tools::{CompareItemsTool, CreateChecklistTool};
    use tokio_util::sync::CancellationToken;

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(CompareItemsTool));
        registry.register(Box::new(CreateChecklistTool));
        Arc::new(registry)
    }

    fn orchestrator(script: Vec<std::result::Result<arbor_core::LlmResponse, ProviderError>>)
    -> (Arc<SequentialMockClient>, Orchestrator) {
        let client = Arc::new(SequentialMockClient::new(script));
        let orchestrator = Orchestrator::new(
            client.clone(),
            "mock-model",
            registry(),
            Arc::new(ClarificationBroker::new()),
        );
        (client, orchestrator)
    }

    async fn collect(
        mut rx: tokio::sync::mpsc::UnboundedReceiver<TraceEvent>,
    ) -> Vec<TraceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn kinds(events: &[TraceEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.payload.kind()).collect()
    }

    #[tokio::test]
    async fn immediate_text_answer_completes_in_one_iteration() {
        let (client, orchestrator) =
            orchestrator(vec![Ok(make_text_response("The answer is 42."))]);
        let (sink, rx) = EventSink::new(CancellationToken::new());

        let outcome = orchestrator.run("what is the answer?", "run-1", &sink).await.unwrap();
        assert_eq!(outcome.text, "The answer is 42.");
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.structured_results.is_empty());
        assert_eq!(client.call_count(), 1);

        let events = collect(rx).await;
        assert_eq!(kinds(&events), vec!["start", "text", "end"]);
        match &events[2].payload {
            TracePayload::End {
                status,
                total_iterations,
                ..
            } => {
                assert_eq!(*status, RunStatus::Completed);
                assert_eq!(*total_iterations, 1);
            }
            _ => panic!("expected end"),
        }
    }

    #[tokio::test]
    async fn thoughts_are_relayed_before_the_answer() {
        let (_, orchestrator) = orchestrator(vec![Ok(make_thinking_response(
            "comparing timetables",
            "Take the express.",
        ))]);
        let (sink, rx) = EventSink::new(CancellationToken::new());

        orchestrator.run("which train?", "run-t", &sink).await.unwrap();

        let events = collect(rx).await;
        assert_eq!(kinds(&events), vec!["start", "thinking", "text", "end"]);
        match &events[1].payload {
            TracePayload::Thinking { text } => assert_eq!(text, "comparing timetables"),
            _ => panic!("expected thinking"),
        }
    }

    #[tokio::test]
    async fn corrupted_turn_order_is_fatal_before_any_call() {
        let (client, orchestrator) = orchestrator(vec![]);
        let (sink, rx) = EventSink::new(CancellationToken::new());

        let mut history = History::new();
        history.push(Turn::user_text("one"));
        history.push(Turn::user_text("two"));

        let err = orchestrator
            .run_loop(&mut history, "run-c", &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::TurnOrder(_)));
        assert_eq!(client.call_count(), 0);

        let events = collect(rx).await;
        assert_eq!(kinds(&events), vec!["error", "end"]);
        match &events[1].payload {
            TracePayload::End { status, .. } => assert_eq!(*status, RunStatus::Error),
            _ => panic!("expected end"),
        }
    }

    #[tokio::test]
    async fn single_empty_response_gets_a_nudge() {
        let (client, orchestrator) = orchestrator(vec![
            Ok(make_empty_response()),
            Ok(make_text_response("Here it is.")),
        ]);
        let (sink, rx) = EventSink::new(CancellationToken::new());

        let outcome = orchestrator.run("hello", "run-n", &sink).await.unwrap();
        assert_eq!(outcome.text, "Here it is.");
        assert_eq!(outcome.iterations, 2);

        // The second call must see user, empty model turn, then the nudge.
        let second = client.history_of_call(1);
        assert_eq!(second.len(), 3);
        assert_eq!(second[1].role, arbor_core::Role::Model);
        assert_eq!(second[2].text(), NUDGE);

        let events = collect(rx).await;
        assert_eq!(kinds(&events), vec!["start", "error", "text", "end"]);
    }

    #[tokio::test]
    async fn two_consecutive_empty_responses_abort_with_apology() {
        let (client, orchestrator) =
            orchestrator(vec![Ok(make_empty_response()), Ok(make_empty_response())]);
        let (sink, rx) = EventSink::new(CancellationToken::new());

        let err = orchestrator.run("hello", "run-e", &sink).await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyResponse));
        assert_eq!(err.to_string(), APOLOGY);
        assert_eq!(client.call_count(), 2);

        let events = collect(rx).await;
        assert_eq!(kinds(&events), vec!["start", "error", "error", "error", "end"]);
        match &events[3].payload {
            TracePayload::Error { message } => assert_eq!(message, APOLOGY),
            _ => panic!("expected apology error"),
        }
        match &events[4].payload {
            TracePayload::End { status, .. } => assert_eq!(*status, RunStatus::Error),
            _ => panic!("expected end"),
        }
    }

    #[tokio::test]
    async fn tool_call_collects_structured_result() {
        let args = serde_json::json!({
            "title": "Trains",
            "columns": ["Attribute", "A", "B"],
            "rows": [["Speed", "320", "300"]]
        });
        let (client, orchestrator) = orchestrator(vec![
            Ok(make_call_response("compare_items", args)),
            Ok(make_text_response("See the comparison above.")),
        ]);
        let (sink, rx) = EventSink::new(CancellationToken::new());

        let outcome = orchestrator.run("compare trains", "run-s", &sink).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.structured_results.len(), 1);
        assert_eq!(outcome.structured_results[0]["type"], "comparison");

        // The second call sees the paired model/function-response turns.
        let second = client.history_of_call(1);
        assert_eq!(second.len(), 3);
        assert_eq!(second[1].role, arbor_core::Role::Model);
        assert_eq!(second[2].role, arbor_core::Role::User);

        let events = collect(rx).await;
        assert_eq!(
            kinds(&events),
            vec!["start", "tool_call", "tool_result", "text", "end"]
        );
    }

    #[tokio::test]
    async fn malformed_tool_call_is_not_collected_but_run_continues() {
        let (_, orchestrator) = orchestrator(vec![
            Ok(make_call_response(
                "compare_items",
                serde_json::json!({"title": "Trains", "columns": ["Attribute"]}),
            )),
            Ok(make_text_response("Sorry, let me answer directly.")),
        ]);
        let (sink, rx) = EventSink::new(CancellationToken::new());

        let outcome = orchestrator.run("compare", "run-m", &sink).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
        assert!(outcome.structured_results.is_empty());

        let events = collect(rx).await;
        let result = events
            .iter()
            .find_map(|e| match &e.payload {
                TracePayload::ToolResult { result, is_error, .. } => Some((result.clone(), *is_error)),
                _ => None,
            })
            .unwrap();
        assert!(result.1);
        assert_eq!(result.0["error"], "Missing required fields: rows");
    }

    #[tokio::test]
    async fn unknown_tool_feeds_error_back_to_the_model() {
        let (client, orchestrator) = orchestrator(vec![
            Ok(make_call_response("fly_to_moon", serde_json::json!({}))),
            Ok(make_text_response("I cannot do that.")),
        ]);
        let (sink, _rx) = EventSink::new(CancellationToken::new());

        let outcome = orchestrator.run("go", "run-u", &sink).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);

        let second = client.history_of_call(1);
        let response_turn = &second[2];
        match &response_turn.parts[0] {
            arbor_core::Part::FunctionResponse { name, response } => {
                assert_eq!(name, "fly_to_moon");
                assert_eq!(response["error"], "Unknown tool: fly_to_moon");
            }
            _ => panic!("expected function response"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let transient = || ProviderError::Api {
            status: 503,
            message: "overloaded".into(),
        };
        let (client, orchestrator) = orchestrator(vec![
            Err(transient()),
            Err(transient()),
            Ok(make_text_response("Recovered.")),
        ]);
        let (sink, rx) = EventSink::new(CancellationToken::new());

        let outcome = orchestrator.run("hi", "run-b", &sink).await.unwrap();
        assert_eq!(outcome.text, "Recovered.");
        assert_eq!(outcome.iterations, 1);
        assert_eq!(client.call_count(), 3);

        let events = collect(rx).await;
        assert_eq!(kinds(&events), vec!["start", "error", "error", "text", "end"]);
        match (&events[1].payload, &events[2].payload) {
            (TracePayload::Error { message: a }, TracePayload::Error { message: b }) => {
                assert!(a.contains("1000ms"), "{a}");
                assert!(b.contains("2000ms"), "{b}");
            }
            _ => panic!("expected retry errors"),
        }
    }

    #[tokio::test]
    async fn fatal_provider_error_ends_the_run() {
        let (client, orchestrator) = orchestrator(vec![Err(
            ProviderError::AuthenticationFailed("bad key".into()),
        )]);
        let (sink, rx) = EventSink::new(CancellationToken::new());

        let err = orchestrator.run("hi", "run-f", &sink).await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
        assert_eq!(client.call_count(), 1);

        let events = collect(rx).await;
        assert_eq!(kinds(&events), vec!["start", "error", "end"]);
    }

    #[tokio::test]
    async fn iteration_budget_exhaustion_reports_max_iterations() {
        let args = serde_json::json!({"title": "t", "items": ["x"]});
        let script: Vec<_> = (0..10)
            .map(|_| Ok(make_call_response("create_checklist", args.clone())))
            .collect();
        let (client, orchestrator) = orchestrator(script);
        let (sink, rx) = EventSink::new(CancellationToken::new());

        let outcome = orchestrator.run("loop forever", "run-x", &sink).await.unwrap();
        assert_eq!(outcome.status, RunStatus::MaxIterations);
        assert_eq!(outcome.text, OUT_OF_STEPS);
        assert_eq!(outcome.iterations, 10);
        assert_eq!(client.call_count(), 10);
        // Every iteration produced a checklist.
        assert_eq!(outcome.structured_results.len(), 10);

        let events = collect(rx).await;
        let end = events.last().unwrap();
        match &end.payload {
            TracePayload::End {
                status,
                total_iterations,
                ..
            } => {
                assert_eq!(*status, RunStatus::MaxIterations);
                assert_eq!(*total_iterations, 10);
            }
            _ => panic!("expected end"),
        }
        // No text event on this path: the message lives in the outcome only.
        assert!(
            events
                .iter()
                .all(|e| !matches!(e.payload, TracePayload::Text { .. }))
        );
    }

    #[tokio::test]
    async fn grounded_response_synthesizes_search_events() {
        let (_, orchestrator) = orchestrator(vec![Ok(make_grounded_response(
            "Grounded answer.",
            "train speeds",
            "Rail Journal",
        ))]);
        let (sink, rx) = EventSink::new(CancellationToken::new());

        orchestrator.run("how fast?", "run-g", &sink).await.unwrap();

        let events = collect(rx).await;
        assert_eq!(
            kinds(&events),
            vec!["start", "tool_call", "tool_result", "text", "end"]
        );
        match &events[1].payload {
            TracePayload::ToolCall { name, args } => {
                assert_eq!(name, "web_search");
                assert_eq!(args["queries"][0], "train speeds");
            }
            _ => panic!("expected synthetic tool_call"),
        }
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let cancel = CancellationToken::new();
        let (sink, rx) = EventSink::new(cancel.clone());
        let (client, orchestrator) = orchestrator(vec![]);

        cancel.cancel();
        let err = orchestrator.run("hi", "run-k", &sink).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(client.call_count(), 0);

        // The start event was emitted after cancel, so nothing arrives.
        let events = collect(rx).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn ask_user_suspends_until_answered() {
        let broker = Arc::new(ClarificationBroker::new());
        let client = Arc::new(SequentialMockClient::new(vec![
            Ok(make_call_response(
                "ask_user",
                serde_json::json!({
                    "question": "Window or aisle?",
                    "question_type": "select",
                    "options": ["window", "aisle"]
                }),
            )),
            Ok(make_text_response("Booked a window seat.")),
        ]));
        let orchestrator = Orchestrator::new(
            client.clone(),
            "mock-model",
            registry(),
            broker.clone(),
        );
        let (sink, mut rx) = EventSink::new(CancellationToken::new());

        let run = tokio::spawn(async move {
            orchestrator.run("book a seat", "run-a", &sink).await
        });

        // Pull events until the question appears, then answer it.
        let mut event_id = None;
        while event_id.is_none() {
            let event = rx.recv().await.unwrap();
            if let TracePayload::AskUser {
                question,
                question_type,
                options,
                ..
            } = &event.payload
            {
                assert_eq!(question, "Window or aisle?");
                assert_eq!(*question_type, QuestionType::Select);
                assert_eq!(options.as_ref().unwrap().len(), 2);
                event_id = Some(event.event_id.clone());
            }
        }
        assert!(broker.resolve(&event_id.unwrap(), "window"));

        let outcome = run.await.unwrap().unwrap();
        assert_eq!(outcome.text, "Booked a window seat.");

        // The model saw the answer as a function response.
        let second = client.history_of_call(1);
        match &second[2].parts[0] {
            arbor_core::Part::FunctionResponse { name, response } => {
                assert_eq!(name, "ask_user");
                assert_eq!(response["answer"], "window");
            }
            _ => panic!("expected function response"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ask_user_timeout_becomes_an_error_result() {
        let broker = Arc::new(ClarificationBroker::new());
        let client = Arc::new(SequentialMockClient::new(vec![
            Ok(make_call_response(
                "ask_user",
                serde_json::json!({"question": "Still there?"}),
            )),
            Ok(make_text_response("Proceeding without an answer.")),
        ]));
        let orchestrator =
            Orchestrator::new(client.clone(), "mock-model", registry(), broker);
        let (sink, _rx) = EventSink::new(CancellationToken::new());

        let outcome = orchestrator.run("hello?", "run-to", &sink).await.unwrap();
        assert_eq!(outcome.text, "Proceeding without an answer.");

        let second = client.history_of_call(1);
        match &second[2].parts[0] {
            arbor_core::Part::FunctionResponse { response, .. } => {
                assert!(
                    response["error"]
                        .as_str()
                        .unwrap()
                        .contains("No answer received"),
                    "{response}"
                );
            }
            _ => panic!("expected function response"),
        }
    }
}
