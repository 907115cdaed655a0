//! Agent Runtime - the tool-calling conversation loop
//!
//! This crate drives the multi-turn exchange between the voice call and the
//! language model:
//! - **LLM client** (`llm`) - Messages-API wire types and the `LlmClient`
//!   trait with the live HTTP implementation
//! - **Tool execution** (`tools`) - the closed tool set, its JSON schemas,
//!   and the executor that turns a tool invocation into one collaborator
//!   call and a short tagged result string
//! - **Turn driver** (`turn`) - submit, inspect the stop condition, execute
//!   requested tools, resubmit; bounded and fail-closed
//! - **Prompt** (`prompt`) - the sales-representative system prompt and the
//!   lead-context preamble
//!
//! # Safety Principle
//!
//! The executor never raises out of its contract: whatever happens upstream,
//! the model always receives a string, tagged so it can branch on the outcome
//! without parsing JSON. The driver never surfaces an error to the caller; a
//! failed exchange degrades to a fixed fallback utterance so a live phone
//! call keeps flowing.

pub mod llm;
pub mod prompt;
pub mod tools;
pub mod turn;

pub use llm::{AnthropicClient, ChatRequest, LlmClient, LlmError, ModelResponse, StopReason};
pub use tools::{tool_definitions, HttpToolExecutor, ServiceTargets, ToolExecution, ToolName};
pub use turn::{TurnDriver, FALLBACK_UTTERANCE};
