//! Model invocation with single-fallback resilience.
//!
//! One invocation is at most two transport attempts: the primary model, then
//! on any failure a fixed fallback model. Falling back to a *different* model
//! hedges against model-specific outages and degraded output, not just
//! transient network faults; the same model is never asked twice. If the
//! fallback also fails, the error is terminal — the decoder has its own
//! repair budget, and the pipeline has an overall time budget that a retry
//! storm would exhaust.
//!
//! The invoker returns raw text without inspecting its structure. Parsing is
//! the decoder's job.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::gateway::{Attribution, ChatGateway, ChatModel, ChatRequest, ProviderError};
use crate::stages::{StagePrompt, STAGE_MAX_OUTPUT_TOKENS, STAGE_TEMPERATURE};

/// Issues one inference request per stage, with primary→fallback policy.
pub struct ModelInvoker {
    gateway: Arc<dyn ChatGateway>,
    primary: ChatModel,
    fallback: ChatModel,
}

impl ModelInvoker {
    pub fn new(gateway: Arc<dyn ChatGateway>, primary: ChatModel, fallback: ChatModel) -> Self {
        Self {
            gateway,
            primary,
            fallback,
        }
    }

    /// Obtain raw response text for one stage prompt.
    ///
    /// Generation parameters are pinned per invocation: low temperature,
    /// large output ceiling, JSON response-format hint.
    pub async fn invoke(
        &self,
        prompt: &StagePrompt,
        attribution: Attribution,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest::new(
            self.primary.clone(),
            prompt.to_messages(),
            attribution.clone(),
        )
        .temperature(STAGE_TEMPERATURE)
        .max_tokens(STAGE_MAX_OUTPUT_TOKENS)
        .json();

        match self.gateway.chat(request.clone()).await {
            Ok(resp) => {
                debug!(
                    stage = prompt.stage.name(),
                    model = self.primary.model_id(),
                    output_tokens = resp.output_tokens,
                    "stage completion from primary model"
                );
                Ok(resp.content)
            }
            Err(err) if err.is_fallback_worthy() => {
                warn!(
                    stage = prompt.stage.name(),
                    model = self.primary.model_id(),
                    fallback = self.fallback.model_id(),
                    error = %err,
                    "primary model failed, trying fallback"
                );

                let resp = self
                    .gateway
                    .chat(request.with_model(self.fallback.clone()))
                    .await?;

                debug!(
                    stage = prompt.stage.name(),
                    model = self.fallback.model_id(),
                    output_tokens = resp.output_tokens,
                    "stage completion from fallback model"
                );
                Ok(resp.content)
            }
            Err(err) => Err(err),
        }
    }
}
