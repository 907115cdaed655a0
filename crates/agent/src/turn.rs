use std::sync::Arc;

use tracing::{debug, info, warn};

use ringflow_core::config::LlmConfig;
use ringflow_core::transcript::{ContentBlock, Transcript};

use crate::llm::{ChatRequest, LlmClient, LlmError, ModelResponse};
use crate::prompt;
use crate::tools::{tool_definitions, ToolExecution};

/// Spoken to the caller whenever the exchange with the model cannot be
/// completed. A live phone call must always hear something well-formed.
pub const FALLBACK_UTTERANCE: &str =
    "I'm sorry, I'm having a little trouble on my end. Could you say that again?";

/// Drives one conversation turn against the model: submit the transcript,
/// execute any requested tools, feed the results back, and repeat until the
/// model produces plain text or the round ceiling trips.
pub struct TurnDriver {
    llm: Arc<dyn LlmClient>,
    tools: Arc<dyn ToolExecution>,
    model: String,
    max_tokens: u32,
    max_tool_rounds: u32,
    system_prompt: String,
}

impl TurnDriver {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<dyn ToolExecution>, config: &LlmConfig) -> Self {
        Self {
            llm,
            tools,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_tool_rounds: config.max_tool_rounds,
            system_prompt: prompt::SYSTEM_PROMPT.to_string(),
        }
    }

    /// Append the caller's utterance and produce the assistant's reply.
    ///
    /// Never fails: a model error or an exhausted tool budget degrades to
    /// [`FALLBACK_UTTERANCE`]. The transcript is not rolled back on failure,
    /// so the next turn still sees everything that happened.
    pub async fn advance_turn(&self, transcript: &mut Transcript, user_text: &str) -> String {
        transcript.push_user_text(user_text);

        match self.drive(transcript).await {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                warn!(
                    max_tool_rounds = self.max_tool_rounds,
                    "tool round ceiling reached; failing closed"
                );
                FALLBACK_UTTERANCE.to_string()
            }
            Err(error) => {
                warn!(error = %error, "model exchange failed; falling back");
                FALLBACK_UTTERANCE.to_string()
            }
        }
    }

    /// Returns `Ok(None)` when the round ceiling trips before the model
    /// settles on a text reply.
    async fn drive(&self, transcript: &mut Transcript) -> Result<Option<String>, LlmError> {
        let mut response = self.submit(transcript).await?;
        let mut rounds = 0u32;

        while response.requests_tools() {
            if rounds >= self.max_tool_rounds {
                return Ok(None);
            }
            rounds += 1;

            let invocations = response.tool_invocations();
            if invocations.is_empty() {
                // tool_use stop reason without tool_use blocks; treat the
                // response as final rather than resubmitting forever.
                break;
            }

            transcript.push_assistant_blocks(response.content.clone());

            // Every invocation gets exactly one paired result appended before
            // the next submission.
            let mut results = Vec::with_capacity(invocations.len());
            for (id, name, input) in &invocations {
                info!(tool = %name, round = rounds, "executing requested tool");
                let outcome = self.tools.execute(name, input).await;
                debug!(tool = %name, outcome = %outcome, "tool outcome");
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id.clone(),
                    content: outcome,
                });
            }
            transcript.push_tool_results(results);

            response = self.submit(transcript).await?;
        }

        let reply = response.text();
        transcript.push_assistant_text(reply.clone());
        Ok(Some(reply))
    }

    async fn submit(&self, transcript: &Transcript) -> Result<ModelResponse, LlmError> {
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: self.system_prompt.clone(),
            tools: tool_definitions(),
            messages: transcript.messages().to_vec(),
        };
        self.llm.complete(&request).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use ringflow_core::config::LlmConfig;
    use ringflow_core::transcript::{ContentBlock, Role, Transcript};

    use crate::llm::{ChatRequest, LlmClient, LlmError, ModelResponse, StopReason};
    use crate::tools::ToolExecution;
    use crate::turn::{TurnDriver, FALLBACK_UTTERANCE};

    struct ScriptedLlm {
        responses: Mutex<VecDeque<Result<ModelResponse, LlmError>>>,
        repeat: Option<ModelResponse>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedLlm {
        fn sequence(responses: Vec<Result<ModelResponse, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                repeat: None,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn repeating(response: ModelResponse) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(VecDeque::new()),
                repeat: Some(response),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn recorded_requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: &ChatRequest) -> Result<ModelResponse, LlmError> {
            self.requests.lock().expect("requests lock").push(request.clone());
            if let Some(next) = self.responses.lock().expect("responses lock").pop_front() {
                return next;
            }
            match &self.repeat {
                Some(response) => Ok(response.clone()),
                None => Err(LlmError::Status { status: 500, detail: "script exhausted".into() }),
            }
        }
    }

    struct RecordingExecutor {
        outcome: String,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingExecutor {
        fn with_outcome(outcome: &str) -> Arc<Self> {
            Arc::new(Self { outcome: outcome.to_string(), calls: Mutex::new(Vec::new()) })
        }

        fn recorded_calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl ToolExecution for RecordingExecutor {
        async fn execute(&self, name: &str, arguments: &Value) -> String {
            self.calls.lock().expect("calls lock").push((name.to_string(), arguments.clone()));
            self.outcome.clone()
        }
    }

    fn test_config() -> LlmConfig {
        LlmConfig {
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 300,
            max_tool_rounds: 3,
            timeout_secs: 5,
        }
    }

    fn text_reply(text: &str) -> ModelResponse {
        ModelResponse {
            content: vec![ContentBlock::Text { text: text.to_string() }],
            stop_reason: Some(StopReason::EndTurn),
        }
    }

    fn tool_request(id: &str, name: &str, input: Value) -> ModelResponse {
        ModelResponse {
            content: vec![ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }],
            stop_reason: Some(StopReason::ToolUse),
        }
    }

    #[tokio::test]
    async fn plain_text_reply_is_appended_and_returned() {
        let llm = ScriptedLlm::sequence(vec![Ok(text_reply("Hi! Is this a good time?"))]);
        let tools = RecordingExecutor::with_outcome("unused");
        let driver = TurnDriver::new(llm.clone(), tools.clone(), &test_config());

        let mut transcript = Transcript::new();
        let reply = driver.advance_turn(&mut transcript, "hello").await;

        assert_eq!(reply, "Hi! Is this a good time?");
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.messages()[1].role, Role::Assistant);
        assert!(tools.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn tool_round_trip_interleaves_invocation_and_result() {
        let llm = ScriptedLlm::sequence(vec![
            Ok(tool_request(
                "toolu_01",
                "check_availability",
                json!({"date_range_start": "2024-12-18", "date_range_end": "2024-12-20"}),
            )),
            Ok(text_reply("I have Wednesday at 9am open.")),
        ]);
        let tools = RecordingExecutor::with_outcome("AVAILABLE_SLOTS: 2024-12-18T09:00:00");
        let driver = TurnDriver::new(llm.clone(), tools.clone(), &test_config());

        let mut transcript = Transcript::new();
        let reply = driver.advance_turn(&mut transcript, "can we do a demo?").await;

        assert_eq!(reply, "I have Wednesday at 9am open.");

        // user, assistant tool_use, tool_result, assistant text - in order.
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript.messages()[0].role, Role::User);
        assert!(matches!(
            transcript.messages()[1].content[0],
            ContentBlock::ToolUse { ref name, .. } if name == "check_availability"
        ));
        assert!(transcript.messages()[2].is_tool_result());
        assert_eq!(transcript.messages()[3].text(), "I have Wednesday at 9am open.");

        let calls = tools.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "check_availability");
    }

    #[tokio::test]
    async fn tool_result_tag_reaches_the_next_submission_verbatim() {
        let llm = ScriptedLlm::sequence(vec![
            Ok(tool_request(
                "toolu_01",
                "check_availability",
                json!({"date_range_start": "2024-12-21", "date_range_end": "2024-12-22"}),
            )),
            Ok(text_reply("That weekend is fully booked, sadly.")),
        ]);
        let tagged = "NO_AVAILABILITY: no open demo slots between 2024-12-21 and 2024-12-22";
        let tools = RecordingExecutor::with_outcome(tagged);
        let driver = TurnDriver::new(llm.clone(), tools, &test_config());

        let mut transcript = Transcript::new();
        driver.advance_turn(&mut transcript, "anything this weekend?").await;

        let requests = llm.recorded_requests();
        assert_eq!(requests.len(), 2);
        let resubmission = &requests[1];
        let carried = resubmission.messages.iter().any(|message| {
            message.content.iter().any(|block| {
                matches!(block, ContentBlock::ToolResult { content, .. } if content == tagged)
            })
        });
        assert!(carried, "the NO_AVAILABILITY tag must be fed back verbatim");
    }

    #[tokio::test]
    async fn loop_fails_closed_at_the_round_ceiling() {
        let llm = ScriptedLlm::repeating(tool_request(
            "toolu_loop",
            "get_lead",
            json!({"lead_id": "42"}),
        ));
        let tools = RecordingExecutor::with_outcome("LEAD_INFO: John Smith");
        let driver = TurnDriver::new(llm.clone(), tools.clone(), &test_config());

        let mut transcript = Transcript::new();
        let reply = driver.advance_turn(&mut transcript, "who am I calling?").await;

        assert_eq!(reply, FALLBACK_UTTERANCE);
        // Ceiling of 3 rounds: initial submission plus one per round.
        assert_eq!(llm.recorded_requests().len(), 4);
        assert_eq!(tools.recorded_calls().len(), 3);
        // Every executed invocation still has its result in the transcript.
        let last = transcript.messages().last().expect("transcript not empty");
        assert!(last.is_tool_result());
    }

    #[tokio::test]
    async fn model_failure_returns_fallback_and_keeps_the_transcript() {
        let llm = ScriptedLlm::sequence(vec![Err(LlmError::Status {
            status: 429,
            detail: "rate limited".to_string(),
        })]);
        let tools = RecordingExecutor::with_outcome("unused");
        let driver = TurnDriver::new(llm, tools, &test_config());

        let mut transcript = Transcript::new();
        let reply = driver.advance_turn(&mut transcript, "hello?").await;

        assert_eq!(reply, FALLBACK_UTTERANCE);
        // Not rolled back: the user message stays so the next turn can proceed.
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].text(), "hello?");
    }

    #[tokio::test]
    async fn multiple_invocations_in_one_response_all_get_results() {
        let response = ModelResponse {
            content: vec![
                ContentBlock::ToolUse {
                    id: "toolu_01".to_string(),
                    name: "get_lead".to_string(),
                    input: json!({"lead_id": "42"}),
                },
                ContentBlock::ToolUse {
                    id: "toolu_02".to_string(),
                    name: "check_availability".to_string(),
                    input: json!({"date_range_start": "2024-12-18", "date_range_end": "2024-12-20"}),
                },
            ],
            stop_reason: Some(StopReason::ToolUse),
        };
        let llm = ScriptedLlm::sequence(vec![Ok(response), Ok(text_reply("All set."))]);
        let tools = RecordingExecutor::with_outcome("ok");
        let driver = TurnDriver::new(llm, tools.clone(), &test_config());

        let mut transcript = Transcript::new();
        driver.advance_turn(&mut transcript, "set things up").await;

        assert_eq!(tools.recorded_calls().len(), 2);
        let results_message = &transcript.messages()[2];
        assert!(results_message.is_tool_result());
        assert_eq!(results_message.content.len(), 2);
        assert!(matches!(
            results_message.content[0],
            ContentBlock::ToolResult { ref tool_use_id, .. } if tool_use_id == "toolu_01"
        ));
        assert!(matches!(
            results_message.content[1],
            ContentBlock::ToolResult { ref tool_use_id, .. } if tool_use_id == "toolu_02"
        ));
    }
}
