use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::hooks::{AgentEvent, AgentHook};
use crate::llm::{self, LanguageModel};
use crate::message::{Message, ToolCall, ToolResult};
use crate::tool::ToolRegistry;
use crate::tools::standard_toolkit;
use crate::transcript::Transcript;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant that can help users with various tasks.
You have access to several tools for getting information:
- Weather information for any location
- Book recommendations by topic
- Random jokes for entertainment
- Random dog pictures
- Trivia questions

When a user asks for help, determine which tools are needed and call them.
Always provide friendly, conversational responses that incorporate the tool results naturally.
If coordinates are mentioned, use them for weather. Parse requests carefully to identify all needed tools.";

const CANCELLED_BEFORE_EXECUTION: &str = "cancelled before execution";
const CANCELLED_DURING_EXECUTION: &str = "cancelled during execution";

/// Outcome of a run that ended with a final answer.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRun {
    pub run_id: String,
    pub answer: String,
    pub iterations: usize,
    pub transcript: Transcript,
}

impl AgentRun {
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.transcript.tool_calls().collect()
    }
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Done(String),
}

/// Tool-calling agent: alternates between the model and the tool registry
/// until the model answers or the iteration cap is reached.
pub struct Agent {
    model: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_iterations: usize,
    parallel_tools: bool,
    hooks: Vec<Arc<dyn AgentHook>>,
}

impl Agent {
    pub fn new(model: Arc<dyn LanguageModel>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            tools,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 10,
            parallel_tools: false,
            hooks: Vec::new(),
        }
    }

    /// Model client for the configured provider plus the five standard tools.
    pub fn from_config(cfg: &AgentConfig) -> Result<Self> {
        let model = llm::from_config(cfg)?;
        let tools = Arc::new(standard_toolkit(&cfg.tools)?);
        Ok(Self::new(model, tools).with_config(cfg))
    }

    /// Applies the loop settings of `cfg`; the model and tools stay as given.
    pub fn with_config(mut self, cfg: &AgentConfig) -> Self {
        self.max_iterations = cfg.max_iterations.max(1);
        self.parallel_tools = cfg.parallel_tools;
        match &cfg.system_prompt {
            Some(prompt) => self.with_system_prompt(prompt.clone()),
            None => self,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_parallel_tools(mut self, parallel: bool) -> Self {
        self.parallel_tools = parallel;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Runs one request to completion.
    pub async fn run(&self, user_input: impl Into<String>) -> Result<AgentRun> {
        self.run_with_cancel(user_input, &CancellationToken::new())
            .await
    }

    /// Like `run`, cancelled once `timeout` elapses.
    pub async fn run_with_timeout(
        &self,
        user_input: impl Into<String>,
        timeout: Duration,
    ) -> Result<AgentRun> {
        let token = CancellationToken::new();
        let deadline = token.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            deadline.cancel();
        });
        let result = self.run_with_cancel(user_input, &token).await;
        timer.abort();
        result
    }

    /// Runs one request, stopping at the next suspension point once `cancel`
    /// fires. A cancelled run answers every pending tool call with an error
    /// result before handing the transcript back.
    pub async fn run_with_cancel(
        &self,
        user_input: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<AgentRun> {
        let run_id = Uuid::new_v4().to_string();
        let input = user_input.into();
        let span = info_span!("agent_run", run_id = %run_id);

        async {
            self.emit(AgentEvent::RunStarted {
                run_id: run_id.clone(),
                input: input.clone(),
            })
            .await;

            let result = self.drive(&run_id, &input, cancel).await;
            match &result {
                Ok(run) => {
                    info!(iterations = run.iterations, "run finished");
                    self.emit(AgentEvent::RunFinished {
                        run_id: run_id.clone(),
                        iterations: run.iterations,
                        answer: run.answer.clone(),
                    })
                    .await;
                }
                Err(err) => {
                    warn!(kind = err.kind(), error = %err, "run failed");
                    self.emit(AgentEvent::RunFailed {
                        run_id: run_id.clone(),
                        kind: err.kind().to_string(),
                        error: err.to_string(),
                    })
                    .await;
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        run_id: &str,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentRun> {
        let schemas = self.tools.schemas();
        let mut transcript = Transcript::new(&self.system_prompt, input);
        let mut iterations = 0;
        let mut partial: Option<String> = None;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if iterations >= self.max_iterations {
                        warn!(max_iterations = self.max_iterations, "iteration cap reached");
                        return Err(AgentError::IterationExhausted {
                            max_iterations: self.max_iterations,
                            partial,
                        });
                    }
                    if cancel.is_cancelled() {
                        return Err(cancelled(iterations, transcript, &[]));
                    }

                    iterations += 1;
                    debug!(iteration = iterations, "calling model");
                    self.emit(AgentEvent::ModelRequested {
                        run_id: run_id.to_string(),
                        iteration: iterations,
                    })
                    .await;

                    let response = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        completion = self.model.complete_chat(transcript.messages(), &schemas) => Some(completion),
                    };
                    let Some(completion) = response else {
                        return Err(cancelled(iterations, transcript, &[]));
                    };
                    let completion = completion?;
                    let content = completion.content.filter(|c| !c.trim().is_empty());

                    if completion.tool_calls.is_empty() {
                        match content {
                            Some(answer) => LoopState::Done(answer),
                            None => {
                                return Err(AgentError::ModelUnavailable(
                                    "model returned neither an answer nor tool calls".into(),
                                ))
                            }
                        }
                    } else {
                        info!(
                            iteration = iterations,
                            calls = completion.tool_calls.len(),
                            "model requested tools"
                        );
                        if content.is_some() {
                            partial = content.clone();
                        }
                        transcript.push(Message::assistant_with_calls(
                            content,
                            completion.tool_calls.clone(),
                        ));
                        LoopState::ExecutingTools(completion.tool_calls)
                    }
                }
                LoopState::ExecutingTools(calls) => {
                    self.execute_batch(run_id, iterations, &calls, &mut transcript, cancel)
                        .await?;
                    LoopState::AwaitingModel
                }
                LoopState::Done(answer) => {
                    transcript.push(Message::assistant(answer.clone()));
                    return Ok(AgentRun {
                        run_id: run_id.to_string(),
                        answer,
                        iterations,
                        transcript,
                    });
                }
            };
        }
    }

    /// Executes one batch and appends exactly one tool message per call, in
    /// the order the model emitted them.
    async fn execute_batch(
        &self,
        run_id: &str,
        iteration: usize,
        calls: &[ToolCall],
        transcript: &mut Transcript,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.parallel_tools {
            for call in calls {
                self.emit_requested(run_id, iteration, call).await;
            }
            let batch = join_all(calls.iter().map(|call| self.tools.execute_call(call)));
            let results = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                results = batch => Some(results),
            };
            let Some(results) = results else {
                return Err(cancelled(iteration, std::mem::take(transcript), calls));
            };
            for result in results {
                self.emit(AgentEvent::ToolCompleted {
                    run_id: run_id.to_string(),
                    iteration,
                    result: result.clone(),
                })
                .await;
                transcript.push(Message::tool(result));
            }
            return Ok(());
        }

        for call in calls {
            if cancel.is_cancelled() {
                return Err(cancelled(iteration, std::mem::take(transcript), &[]));
            }
            self.emit_requested(run_id, iteration, call).await;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.tools.execute_call(call) => Some(result),
            };
            let Some(result) = result else {
                return Err(cancelled(
                    iteration,
                    std::mem::take(transcript),
                    std::slice::from_ref(call),
                ));
            };
            debug!(tool = %call.name, call_id = %call.id, failed = result.is_error(), "tool finished");
            self.emit(AgentEvent::ToolCompleted {
                run_id: run_id.to_string(),
                iteration,
                result: result.clone(),
            })
            .await;
            transcript.push(Message::tool(result));
        }
        Ok(())
    }

    async fn emit_requested(&self, run_id: &str, iteration: usize, call: &ToolCall) {
        info!(tool = %call.name, call_id = %call.id, arguments = %call.arguments, "calling tool");
        self.emit(AgentEvent::ToolRequested {
            run_id: run_id.to_string(),
            iteration,
            call: call.clone(),
        })
        .await;
    }

    async fn emit(&self, event: AgentEvent) {
        for hook in &self.hooks {
            hook.on_event(&event).await;
        }
    }
}

/// Answers the calls that were running when the token fired, then seals the
/// ones that never started.
fn cancelled(iterations: usize, mut transcript: Transcript, in_flight: &[ToolCall]) -> AgentError {
    for call in in_flight {
        transcript.push(Message::tool(ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            output: json!({ "error": CANCELLED_DURING_EXECUTION }),
        }));
    }
    let sealed = transcript.seal_unanswered(CANCELLED_BEFORE_EXECUTION);
    warn!(iterations, interrupted = in_flight.len(), sealed, "run cancelled");
    AgentError::Cancelled {
        iterations,
        transcript: Box::new(transcript),
    }
}
