//! Pipeline coordinator: staged generation with dependency-aware concurrency.
//!
//! Five stages, one dependency graph:
//!
//! 1. **Core** — extract structured facts from the raw syllabus. Sequential,
//!    fatal on failure.
//! 2. **Analysis** + 3. **Content** — both consume Core only, run
//!    concurrently, both fatal.
//! 4. **Strategy** + 5. **Priority** — both consume Core and Analysis, run
//!    concurrently. Strategy is fatal; Priority is the one tolerated failure:
//!    the guide ships without it.
//!
//! The whole run sits under a single wall-clock budget. There is no
//! checkpoint/resume; a timed-out request is retried from Stage 1.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::decode::{decode, DecodeError};
use crate::gateway::{Attribution, ChatGateway, ChatModel, ProviderError};
use crate::guide::{AnalysisData, ContentData, CoreData, PriorityData, StrategyData, StudyGuide};
use crate::invoker::ModelInvoker;
use crate::stages::{
    analysis_prompt, content_prompt, core_prompt, priority_prompt, strategy_prompt, Stage,
    StagePrompt,
};

/// Default primary model. Cheap, fast, good at structured extraction.
pub const DEFAULT_PRIMARY_MODEL: &str = "meta-llama/llama-3.3-70b-instruct";

/// Default fallback model, deliberately from a different provider family.
pub const DEFAULT_FALLBACK_MODEL: &str = "openai/gpt-4o-mini";

/// Default wall-clock budget for one full generation run.
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(300);

// =============================================================================
// Errors
// =============================================================================

/// Terminal pipeline failure.
///
/// Raw upstream error text lives in `source` fields for logs and diagnostics;
/// it must never be forwarded verbatim to end users. Callers at the trust
/// boundary use [`GenerateError::public_message`].
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Primary and fallback model both failed to return usable text.
    #[error("stage {} invocation failed: {source}", stage.name())]
    Invocation {
        stage: Stage,
        source: ProviderError,
    },

    /// Text was returned but is not repairable into valid JSON.
    #[error("stage {} decode failed: {source}", stage.name())]
    Decode { stage: Stage, source: DecodeError },

    /// The overall request budget elapsed. Always pipeline-wide.
    #[error("generation exceeded the {budget:?} budget")]
    Timeout { budget: Duration },
}

impl GenerateError {
    /// Short category for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Invocation { .. } => "invocation_failure",
            Self::Decode { .. } => "decode_failure",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// The only string that may cross the trust boundary to end users.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "Study guide generation timed out. Please try again.",
            _ => "Study guide generation failed. Please try again.",
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Pipeline configuration. Construct with [`Default::default`] and override.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub primary_model: ChatModel,
    pub fallback_model: ChatModel,
    /// Wall-clock budget for the whole run.
    pub budget: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            primary_model: ChatModel::openrouter(DEFAULT_PRIMARY_MODEL),
            fallback_model: ChatModel::openrouter(DEFAULT_FALLBACK_MODEL),
            budget: DEFAULT_BUDGET,
        }
    }
}

impl PipelineConfig {
    /// Read model overrides from the environment, keeping defaults otherwise.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(m) = std::env::var("SYLLAGEN_PRIMARY_MODEL") {
            config.primary_model = ChatModel::openrouter(m);
        }
        if let Ok(m) = std::env::var("SYLLAGEN_FALLBACK_MODEL") {
            config.fallback_model = ChatModel::openrouter(m);
        }
        if let Some(secs) = std::env::var("SYLLAGEN_BUDGET_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.budget = Duration::from_secs(secs);
        }
        config
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Coordinates the five-stage generation run.
///
/// Holds no state beyond configuration; every call to [`generate`] is an
/// independent request with its own in-flight results.
///
/// [`generate`]: GuidePipeline::generate
pub struct GuidePipeline {
    invoker: ModelInvoker,
    budget: Duration,
}

impl GuidePipeline {
    pub fn new(gateway: Arc<dyn ChatGateway>, config: PipelineConfig) -> Self {
        Self {
            invoker: ModelInvoker::new(gateway, config.primary_model, config.fallback_model),
            budget: config.budget,
        }
    }

    /// Generate a study guide from raw syllabus text.
    ///
    /// The caller is responsible for input validation and rate limiting
    /// before invoking this; the pipeline assumes the text is acceptable.
    pub async fn generate(&self, syllabus_text: &str) -> Result<StudyGuide, GenerateError> {
        tokio::time::timeout(self.budget, self.run(syllabus_text))
            .await
            .map_err(|_| GenerateError::Timeout {
                budget: self.budget,
            })?
    }

    async fn run(&self, syllabus_text: &str) -> Result<StudyGuide, GenerateError> {
        let request_id = Uuid::new_v4();

        // Stage 1: everything downstream needs the core extraction.
        let core: CoreData = self.run_stage(core_prompt(syllabus_text), request_id).await?;
        info!(request_id = %request_id, course = %core.course_name, "core extraction complete");

        // Stages 2 + 3: independent of each other, both required downstream.
        // The pair joins as a unit: either failure aborts before Stage 4/5.
        let (analysis, content): (AnalysisData, ContentData) = tokio::try_join!(
            self.run_stage(analysis_prompt(&core), request_id),
            self.run_stage(content_prompt(&core), request_id),
        )?;
        info!(request_id = %request_id, "analysis and content complete");

        // Stages 4 + 5: both consume Core + Analysis. Priority intentionally
        // does not wait for Strategy output.
        let (strategy_res, priority_res) = tokio::join!(
            self.run_stage::<StrategyData>(strategy_prompt(&core, &analysis), request_id),
            self.run_stage::<PriorityData>(priority_prompt(&core, &analysis), request_id),
        );

        let strategy = strategy_res?;

        let priority = match priority_res {
            Ok(p) => Some(p),
            Err(err) => {
                warn!(
                    request_id = %request_id,
                    category = err.category(),
                    error = %err,
                    "priority stage failed, continuing without priority data"
                );
                None
            }
        };

        info!(request_id = %request_id, has_priority = priority.is_some(), "pipeline complete");
        Ok(StudyGuide::assemble(
            core, analysis, content, strategy, priority,
        ))
    }

    /// One stage: invoke, decode, shape.
    async fn run_stage<T: DeserializeOwned>(
        &self,
        prompt: StagePrompt,
        request_id: Uuid,
    ) -> Result<T, GenerateError> {
        let stage = prompt.stage;
        let attribution = Attribution::new(stage.caller()).with_request(request_id);

        let raw = self
            .invoker
            .invoke(&prompt, attribution)
            .await
            .map_err(|source| GenerateError::Invocation { stage, source })?;

        let value = decode(&raw).map_err(|source| GenerateError::Decode { stage, source })?;

        // Stage structs default every missing field, so this only fails on
        // structurally wrong JSON (e.g. an array where an object belongs).
        serde_json::from_value(value).map_err(|e| GenerateError::Decode {
            stage,
            source: DecodeError {
                message: format!("response shape unusable: {e}"),
                raw_preview: raw.chars().take(500).collect(),
            },
        })
    }
}
