//! The dialogue turn state machine.
//!
//! A turn moves through [`TurnPhase`]s:
//!
//! ```text
//! AwaitingModel ─┬─> Direct ──────────────────────────────────────> Done
//!                └─> ToolSelected ─> ToolExecuted ─┬─> FinalResponse ─> Done
//!                                                  └────────────────> Done
//! ```
//!
//! History is written as the turn progresses: the user's message before the
//! first model call, then the model's answer or its tool-call decision, then
//! the closing response. Entries written before a failure are kept.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{OllamaError, ServiceError, ServiceResult};
use crate::history::Role;
use crate::ollama::{ChatModel, ChatRequest, ModelReply};
use crate::tools::registry::REGISTRY;
use crate::tools::{ToolCall, ToolContext, execute_tool, get_ollama_tool_definitions};

use super::AssistantService;
use super::prompts;
use super::state::{ActiveTurn, TurnPhase, TurnState};

impl<M: ChatModel> AssistantService<M> {
    /// Run one turn to completion.
    ///
    /// The turn executes in its own task, so a caller that goes away (e.g. an
    /// HTTP client disconnecting) does not stop it between history writes.
    pub async fn chat(self: &Arc<Self>, input: Vec<String>) -> ServiceResult<TurnState> {
        if input.last().is_none_or(|message| message.trim().is_empty()) {
            return Err(ServiceError::InvalidRequest {
                message: "input must contain a non-empty message".to_string(),
            });
        }

        let service = Arc::clone(self);
        tokio::spawn(async move { service.run_turn(input).await })
            .await
            .map_err(|e| ServiceError::TurnAborted {
                message: e.to_string(),
            })?
    }

    /// Drive a turn through every phase while holding the turn lock
    pub(crate) async fn run_turn(&self, input: Vec<String>) -> ServiceResult<TurnState> {
        let _turn = self.turn_lock.lock().await;

        let mut active = ActiveTurn::new();
        let mut state = TurnState::new(input);
        let mut used_tool = false;
        info!(turn_id = %active.id, "Turn started");

        while active.phase != TurnPhase::Done {
            debug!(turn_id = %active.id, phase = %active.phase, "Turn step");
            used_tool |= active.phase == TurnPhase::ToolSelected;

            match self.step(active.phase, &mut state).await {
                Ok(next) => active.phase = next,
                Err(e) => {
                    error!(
                        turn_id = %active.id,
                        phase = %active.phase,
                        error = %crate::error::format_error_chain(&e),
                        "Turn failed"
                    );
                    metrics::counter!("concierge_turns_total", "outcome" => "error").increment(1);
                    return Err(e);
                }
            }
        }

        let outcome = if used_tool { "tool" } else { "direct" };
        metrics::counter!("concierge_turns_total", "outcome" => outcome).increment(1);
        info!(
            turn_id = %active.id,
            outcome,
            elapsed_ms = active.started_at.elapsed().as_millis() as u64,
            "Turn complete"
        );

        Ok(state)
    }

    async fn step(&self, phase: TurnPhase, state: &mut TurnState) -> ServiceResult<TurnPhase> {
        Ok(match phase {
            TurnPhase::AwaitingModel => {
                self.invoke_model(state).await?;
                route_after_model(state)?
            }
            TurnPhase::ToolSelected => {
                self.invoke_tools(state)?;
                TurnPhase::ToolExecuted
            }
            TurnPhase::ToolExecuted => route_after_tools(state),
            TurnPhase::FinalResponse => {
                self.generate_final_response(state).await?;
                TurnPhase::Done
            }
            TurnPhase::Direct | TurnPhase::Done => TurnPhase::Done,
        })
    }

    /// One generation call, bounded by the configured turn timeout
    async fn call_model(&self, request: ChatRequest) -> ServiceResult<ModelReply> {
        let limit = self.config.turn.model_timeout();
        match tokio::time::timeout(limit, self.model.chat(request)).await {
            Ok(reply) => reply,
            Err(_) => {
                warn!(timeout_secs = limit.as_secs(), "Model call timed out");
                Err(OllamaError::Timeout {
                    secs: limit.as_secs(),
                }
                .into())
            }
        }
    }

    /// First generation call: answer directly or pick a tool
    pub(crate) async fn invoke_model(&self, state: &mut TurnState) -> ServiceResult<()> {
        let Some(latest) = state.input.last() else {
            return Err(ServiceError::InvalidRequest {
                message: "input must contain a non-empty message".to_string(),
            });
        };

        let history = self.history.load();
        self.history.append(Role::Human, latest);

        let system_prompt = prompts::build_system_prompt(
            self.product_type(),
            &self.profiles.load(),
            &self.catalog.summary(),
        );
        let request = ChatRequest {
            messages: prompts::build_model_messages(system_prompt, &history, &state.input),
            tools: get_ollama_tool_definitions(),
        };

        let reply = self.call_model(request).await?;

        if !reply.tool_calls.is_empty() {
            let calls: Vec<ToolCall> = reply
                .tool_calls
                .into_iter()
                .map(|call| ToolCall {
                    id: format!("call_{}", Uuid::new_v4().simple()),
                    tool: call.function.name,
                    args: normalize_arguments(call.function.arguments),
                })
                .collect();

            info!(
                tools = ?calls.iter().map(|c| c.tool.as_str()).collect::<Vec<_>>(),
                "Model requested tool calls"
            );
            self.history
                .append(Role::Ai, &prompts::tool_calls_entry(&calls));
            state.tool_calls = Some(calls);
        } else if !reply.content.trim().is_empty() {
            self.history.append(Role::Ai, &reply.content);
            state.result = Some(reply.content);
        } else {
            return Err(ServiceError::EmptyModelReply);
        }

        Ok(())
    }

    /// Execute the first requested tool against the catalog
    pub(crate) fn invoke_tools(&self, state: &mut TurnState) -> ServiceResult<()> {
        let calls = state.tool_calls.as_deref().unwrap_or_default();
        let Some(call) = calls.first() else {
            return Err(ServiceError::TurnAborted {
                message: "no tool calls to execute".to_string(),
            });
        };
        if calls.len() > 1 {
            warn!(
                requested = calls.len(),
                "Model requested several tools, executing only the first"
            );
        }

        let Some(name) = REGISTRY.resolve(&call.tool) else {
            return Err(ServiceError::UnknownTool {
                name: call.tool.clone(),
            });
        };

        let ctx = ToolContext {
            catalog: &self.catalog,
            assets: &self.assets,
            product_type: self.product_type(),
        };

        metrics::counter!("concierge_tool_calls_total", "tool" => name.to_string()).increment(1);
        let result = execute_tool(name, &call.args, &ctx);
        match result.as_error() {
            Some(tool_error) => {
                warn!(tool = %name, error = %tool_error.error, "Tool returned an error")
            }
            None => debug!(tool = %name, "Tool executed"),
        }

        state.tool_result = Some(result);
        Ok(())
    }

    /// Second generation call: explain what the tool showed.
    ///
    /// Without a tool result there is nothing to explain; the model is not
    /// called and `final_response` stays empty.
    pub(crate) async fn generate_final_response(&self, state: &mut TurnState) -> ServiceResult<()> {
        let Some(tool_result) = &state.tool_result else {
            state.final_response = None;
            return Ok(());
        };

        let tool = state
            .first_tool_call()
            .map(|call| call.tool.as_str())
            .unwrap_or("unknown tool");
        let context = prompts::build_tool_context(tool, tool_result, self.product_type());

        let history = self.history.load();
        let system_prompt =
            prompts::build_final_response_prompt(self.product_type(), &self.profiles.load());
        let request = ChatRequest {
            messages: prompts::build_final_messages(system_prompt, &history, context),
            tools: Vec::new(),
        };

        let reply = self.call_model(request).await?;
        if reply.content.trim().is_empty() {
            warn!("Final response was empty");
        }

        self.history.append(Role::Ai, &reply.content);
        state.final_response = Some(reply.content);
        Ok(())
    }
}

/// Direct answer or tool execution, depending on what the model produced
pub(crate) fn route_after_model(state: &TurnState) -> ServiceResult<TurnPhase> {
    match (&state.result, &state.tool_calls) {
        (Some(_), None) => Ok(TurnPhase::Direct),
        (None, Some(calls)) if !calls.is_empty() => Ok(TurnPhase::ToolSelected),
        _ => Err(ServiceError::TurnAborted {
            message: "model step produced neither a result nor tool calls".to_string(),
        }),
    }
}

pub(crate) fn route_after_tools(state: &TurnState) -> TurnPhase {
    if state.tool_result.is_some() {
        TurnPhase::FinalResponse
    } else {
        TurnPhase::Done
    }
}

/// Some models send arguments as a JSON-encoded string rather than an object
fn normalize_arguments(arguments: serde_json::Value) -> serde_json::Value {
    match arguments {
        serde_json::Value::String(raw) => {
            serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryEntry, seed_greeting};
    use crate::service::tests::{ScriptedModel, config_for, data_dir, service_with, text, tool_call};
    use crate::tools::ToolResult;
    use serde_json::json;
    use std::time::Duration;

    fn input(message: &str) -> Vec<String> {
        vec![message.to_string()]
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let dir = data_dir();
        let service = service_with(dir.path(), ScriptedModel::new([text("Happy to help!")]));

        let state = service.chat(input("hello")).await.unwrap();
        assert_eq!(state.result.as_deref(), Some("Happy to help!"));
        assert!(state.tool_calls.is_none());
        assert!(state.tool_result.is_none());
        assert!(state.final_response.is_none());

        assert_eq!(
            service.history(),
            vec![
                HistoryEntry::ai(seed_greeting("laptops")),
                HistoryEntry::human("hello"),
                HistoryEntry::ai("Happy to help!"),
            ]
        );
    }

    #[tokio::test]
    async fn test_first_request_shape() {
        let dir = data_dir();
        let service = service_with(dir.path(), ScriptedModel::new([text("Sure.")]));

        service
            .chat(vec!["earlier".to_string(), "latest".to_string()])
            .await
            .unwrap();

        let requests = service.model.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];

        assert_eq!(request.tools.len(), 3);
        let system = &request.messages[0];
        assert_eq!(system.role, "system");
        assert!(system.content.contains("Travels every week."));
        assert!(system.content.contains(
            "Here's the current catalog of available laptops:\nID: 1, name: Aero 14"
        ));

        // Seed from history, then both input messages; only the latest is logged
        let tail: Vec<(&str, &str)> = request.messages[1..]
            .iter()
            .map(|m| (m.role.as_str(), m.content.as_str()))
            .collect();
        assert_eq!(
            tail,
            vec![
                ("assistant", seed_greeting("laptops").as_str()),
                ("user", "earlier"),
                ("user", "latest"),
            ]
        );
        assert_eq!(service.history()[1], HistoryEntry::human("latest"));
    }

    #[tokio::test]
    async fn test_tool_turn() {
        let dir = data_dir();
        let model = ScriptedModel::new([
            tool_call("product-details", json!({"product_id": 1})),
            text("The Aero 14 is a great travel companion."),
        ]);
        let service = service_with(dir.path(), model);

        let state = service.chat(input("tell me about the aero")).await.unwrap();

        assert!(state.result.is_none());
        let calls = state.tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool, "product-details");
        assert!(matches!(state.tool_result, Some(ToolResult::Detail(_))));
        assert_eq!(
            state.final_response.as_deref(),
            Some("The Aero 14 is a great travel companion.")
        );

        let history = service.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[1], HistoryEntry::human("tell me about the aero"));
        assert!(history[2].content.starts_with("Tool Calls: [{"));
        assert!(history[2].content.contains(r#""type":"product-details""#));
        assert_eq!(history[3], HistoryEntry::ai("The Aero 14 is a great travel companion."));

        let requests = service.model.requests();
        assert_eq!(requests.len(), 2);
        let closing = &requests[1];
        assert!(closing.tools.is_empty());
        let context = closing.messages.last().unwrap();
        assert_eq!(context.role, "assistant");
        assert!(context.content.starts_with(
            "Context: I previously invoked a tool to show the user detailed information about Aero 14."
        ));
        assert!(context.content.contains("Marketing Content for Aero 14:\nThe Aero is featherlight."));
        // The reloaded history includes the tool-call decision
        assert_eq!(closing.messages[closing.messages.len() - 2].content, history[2].content);
    }

    #[tokio::test]
    async fn test_tool_error_is_explained_not_fatal() {
        let dir = data_dir();
        let model = ScriptedModel::new([
            tool_call("product-tiles", json!({"product_ids": ["41", "42"]})),
            text("I couldn't find those, but here is what we have."),
        ]);
        let service = service_with(dir.path(), model);

        let state = service.chat(input("show me 41 and 42")).await.unwrap();
        let error = state.tool_result.as_ref().unwrap().as_error().unwrap();
        assert_eq!(
            error.error,
            "No laptops found with the provided product IDs: 41, 42"
        );
        assert!(state.final_response.is_some());
    }

    #[tokio::test]
    async fn test_only_first_tool_call_executes() {
        let dir = data_dir();
        let mut reply = tool_call("product-details", json!({"product_id": "2"})).unwrap();
        reply.tool_calls.extend(
            tool_call("product-details", json!({"product_id": "3"}))
                .unwrap()
                .tool_calls,
        );
        let service = service_with(dir.path(), ScriptedModel::new([Ok(reply), text("Done.")]));

        let state = service.chat(input("two things")).await.unwrap();
        assert_eq!(state.tool_calls.as_ref().unwrap().len(), 2);
        match state.tool_result {
            Some(ToolResult::Detail(detail)) => assert_eq!(detail.product.row.product_id(), "2"),
            other => panic!("unexpected tool result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fatal() {
        let dir = data_dir();
        let service = service_with(
            dir.path(),
            ScriptedModel::new([tool_call("product-carousel", json!({}))]),
        );

        let err = service.chat(input("surprise me")).await.unwrap_err();
        assert!(matches!(err, ServiceError::UnknownTool { ref name } if name == "product-carousel"));

        // Entries written before the failure are kept
        let history = service.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], HistoryEntry::human("surprise me"));
        assert!(history[2].content.starts_with("Tool Calls: "));
    }

    #[tokio::test]
    async fn test_empty_reply_is_fatal() {
        let dir = data_dir();
        let service = service_with(dir.path(), ScriptedModel::new([text("  ")]));

        let err = service.chat(input("hello?")).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmptyModelReply));
        assert_eq!(service.history().len(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_keeps_human_entry() {
        let dir = data_dir();
        let service = service_with(
            dir.path(),
            ScriptedModel::new([Err(ServiceError::Ollama(OllamaError::ModelNotFound {
                model: "missing".to_string(),
            }))]),
        );

        let err = service.chat(input("hello")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Ollama(OllamaError::ModelNotFound { .. })));
        assert_eq!(service.history().last(), Some(&HistoryEntry::human("hello")));
    }

    #[tokio::test]
    async fn test_model_timeout() {
        let dir = data_dir();
        let mut config = config_for(dir.path());
        config.turn.model_timeout_secs = 1;
        let catalog = Arc::new(crate::catalog::Catalog::load_or_unavailable(&config.catalog_path()));
        let model = ScriptedModel::new([text("too late")]).with_delay(Duration::from_secs(30));
        let service = AssistantService::new(config, catalog, model);

        let err = service.run_turn(input("hello")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Ollama(OllamaError::Timeout { secs: 1 })));

        // No partial AI entry
        let history = service.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], HistoryEntry::human("hello"));
    }

    #[tokio::test]
    async fn test_empty_input_rejected_before_writing() {
        let dir = data_dir();
        let service = service_with(dir.path(), ScriptedModel::new([text("unused")]));

        for bad in [Vec::new(), input(""), input("   ")] {
            let err = service.chat(bad).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidRequest { .. }));
        }
        assert!(service.model.requests().is_empty());
        assert_eq!(service.history().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_turns_do_not_interleave() {
        let dir = data_dir();
        let model = ScriptedModel::new([text("first answer"), text("second answer")])
            .with_delay(Duration::from_millis(20));
        let service = service_with(dir.path(), model);

        let (a, b) = tokio::join!(service.chat(input("question a")), service.chat(input("question b")));
        a.unwrap();
        b.unwrap();

        let roles: Vec<Role> = service.history().iter().map(|e| e.role).collect();
        assert_eq!(
            roles,
            vec![Role::Ai, Role::Human, Role::Ai, Role::Human, Role::Ai]
        );
    }

    #[tokio::test]
    async fn test_sequential_turns_append_in_order() {
        let dir = data_dir();
        let model = ScriptedModel::new([text("one"), text("two"), text("three")]);
        let service = service_with(dir.path(), model);

        for message in ["a", "b", "c"] {
            service.chat(input(message)).await.unwrap();
        }

        let contents: Vec<String> = service
            .history()
            .into_iter()
            .skip(1)
            .map(|e| e.content)
            .collect();
        assert_eq!(contents, vec!["a", "one", "b", "two", "c", "three"]);

        // Each later turn sees everything before it
        let requests = service.model.requests();
        assert_eq!(requests[2].messages.len(), 1 + 5 + 1);
    }

    #[tokio::test]
    async fn test_final_response_without_tool_result_skips_model() {
        let dir = data_dir();
        let service = service_with(dir.path(), ScriptedModel::new([]));

        let mut state = TurnState::new(input("hi"));
        state.result = Some("direct".to_string());
        service.generate_final_response(&mut state).await.unwrap();

        assert!(state.final_response.is_none());
        assert!(service.model.requests().is_empty());
    }

    #[test]
    fn test_routing() {
        let mut state = TurnState::new(input("hi"));
        assert!(route_after_model(&state).is_err());

        state.result = Some("text".to_string());
        assert_eq!(route_after_model(&state).unwrap(), TurnPhase::Direct);

        let mut state = TurnState::new(input("hi"));
        state.tool_calls = Some(vec![ToolCall {
            id: "call_1".to_string(),
            tool: "product-tiles".to_string(),
            args: json!({}),
        }]);
        assert_eq!(route_after_model(&state).unwrap(), TurnPhase::ToolSelected);
        assert_eq!(route_after_tools(&state), TurnPhase::Done);

        state.result = Some("both".to_string());
        assert!(route_after_model(&state).is_err());
    }

    #[test]
    fn test_string_arguments_are_decoded() {
        assert_eq!(
            normalize_arguments(json!(r#"{"product_id": "2"}"#)),
            json!({"product_id": "2"})
        );
        assert_eq!(normalize_arguments(json!("not json")), json!("not json"));
        assert_eq!(normalize_arguments(json!({"a": 1})), json!({"a": 1}));
    }
}
