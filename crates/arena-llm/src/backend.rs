//! The gated LLM decision backend.
//!
//! Composition over inheritance: the backend *wraps* a rule-based
//! backend and delegates to it whenever the remote path fails for any
//! reason. The concurrency gate is a counted [`Semaphore`]; a permit
//! is held only for the remote round-trip and released (by drop)
//! before the fallback runs.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use arena_core::config::LlmConfig;
use arena_core::decision::{
    Decision, DecisionBackend, DecisionContext, ReflectionContext,
};
use arena_core::RuleBasedBackend;
use arena_types::ThinkingProcess;

use crate::client::{ChatRequest, CompletionApi, HttpChatClient};
use crate::error::LlmError;
use crate::parse::parse_decision;
use crate::prompt::PromptEngine;

/// Token budget for a decision completion.
const DECISION_MAX_TOKENS: u32 = 150;

/// Token budget for a reflection completion.
const REFLECTION_MAX_TOKENS: u32 = 100;

/// Stored prompt cap inside a [`ThinkingProcess`].
const MAX_PROMPT_LEN: usize = 2000;

/// Stored raw-response cap inside a [`ThinkingProcess`].
const MAX_RAW_RESPONSE_LEN: usize = 1000;

/// LLM-backed [`DecisionBackend`] with gate, deadline, and fallback.
pub struct LlmBackend<C: CompletionApi = HttpChatClient> {
    client: C,
    gate: Semaphore,
    fallback: RuleBasedBackend,
    prompts: PromptEngine,
    temperature: f64,
    deadline: Duration,
}

impl LlmBackend<HttpChatClient> {
    /// Build the production backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] if the embedded prompt templates
    /// fail to compile.
    pub fn from_config(config: &LlmConfig, deadline_ms: u64) -> Result<Self, LlmError> {
        Self::with_client(
            HttpChatClient::new(config),
            config.max_concurrency,
            config.temperature,
            Duration::from_millis(deadline_ms),
        )
    }
}

impl<C: CompletionApi> LlmBackend<C> {
    /// Build a backend around an arbitrary completion client (tests
    /// inject stubs here).
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] if the embedded prompt templates
    /// fail to compile.
    pub fn with_client(
        client: C,
        max_concurrency: usize,
        temperature: f64,
        deadline: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client,
            gate: Semaphore::new(max_concurrency.max(1)),
            fallback: RuleBasedBackend::new(),
            prompts: PromptEngine::new()?,
            temperature,
            deadline,
        })
    }

    /// The remote decision path: render, call, parse, annotate.
    async fn try_decide(&self, ctx: &DecisionContext) -> Result<Decision, LlmError> {
        let prompt = self.prompts.render_decision(ctx)?;
        let request = ChatRequest {
            system: prompt.system,
            user: prompt.user,
            max_tokens: DECISION_MAX_TOKENS,
            temperature: self.temperature,
        };
        let raw = self.client.complete(&request).await?;
        let mut decision = parse_decision(&raw, ctx)?;

        decision.thinking = Some(ThinkingProcess {
            action: action_label(&decision, ctx),
            reasoning: decision.reason.clone().unwrap_or_default(),
            prompt: Some(truncate(
                &format!("{}\n\n{}", request.system, request.user),
                MAX_PROMPT_LEN,
            )),
            raw_response: Some(truncate(&raw, MAX_RAW_RESPONSE_LEN)),
            timestamp: Utc::now(),
        });
        Ok(decision)
    }

    /// The remote reflection path.
    async fn try_reflect(&self, ctx: &ReflectionContext) -> Result<Option<String>, LlmError> {
        let prompt = self.prompts.render_reflection(ctx)?;
        let request = ChatRequest {
            system: prompt.system,
            user: prompt.user,
            max_tokens: REFLECTION_MAX_TOKENS,
            temperature: self.temperature,
        };
        let raw = self.client.complete(&request).await?;
        let text = raw.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("none") {
            Ok(None)
        } else {
            Ok(Some(text.to_owned()))
        }
    }
}

impl<C: CompletionApi> DecisionBackend for LlmBackend<C> {
    async fn decide(&self, ctx: &DecisionContext) -> Decision {
        let remote = async {
            // Closed-gate acquisition cannot fail: the semaphore lives
            // as long as the backend and is never closed.
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| LlmError::Backend(format!("gate closed: {e}")))?;
            tokio::time::timeout(self.deadline, self.try_decide(ctx))
                .await
                .map_err(|_| LlmError::Backend(String::from("decision deadline exceeded")))?
            // Permit drops here, before any fallback work begins.
        };

        match remote.await {
            Ok(decision) => {
                debug!(agent = %ctx.agent_id, kind = ?decision.kind, "LLM decision");
                decision
            }
            Err(e) => {
                warn!(agent = %ctx.agent_id, error = %e, "LLM decide failed, using rules");
                self.fallback.decide(ctx).await
            }
        }
    }

    async fn reflect(&self, ctx: &ReflectionContext) -> Option<String> {
        let remote = async {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| LlmError::Backend(format!("gate closed: {e}")))?;
            tokio::time::timeout(self.deadline, self.try_reflect(ctx))
                .await
                .map_err(|_| LlmError::Backend(String::from("reflection deadline exceeded")))?
        };

        match remote.await {
            Ok(reflection) => reflection,
            Err(e) => {
                warn!(agent = %ctx.agent_id, error = %e, "LLM reflect failed, using rules");
                self.fallback.reflect(ctx).await
            }
        }
    }
}

/// `"attack Vera"`-style label for the thinking history.
fn action_label(decision: &Decision, ctx: &DecisionContext) -> String {
    use arena_core::decision::TargetRef;

    let target = match decision.target {
        Some(TargetRef::Agent(id)) => ctx
            .perception
            .nearby_agents
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.name.clone()),
        Some(TargetRef::Item(id)) => ctx
            .perception
            .nearby_items
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.kind.clone()),
        None => None,
    };
    match target {
        Some(name) => format!("{} {name}", decision.kind.as_str()),
        None => decision.kind.as_str().to_owned(),
    }
}

/// Truncate on a char boundary, appending an ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_owned();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
