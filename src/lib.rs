#![forbid(unsafe_code)]

//! # syllagen
//!
//! Turns raw course-syllabus text into a structured study guide by staging
//! five LLM calls over a dependency graph: core extraction first, then
//! analysis and study content in parallel, then semester strategy and
//! priority intelligence in parallel. The outputs merge into one
//! [`guide::StudyGuide`].
//!
//! Models return JSON that is frequently fenced, truncated or malformed;
//! [`decode`] repairs the common cases with a bounded pass. Each stage call
//! falls back to a secondary model once before failing. Priority intelligence
//! is the one stage whose failure the pipeline tolerates.
//!
//! The single entry point is [`pipeline::GuidePipeline::generate`]. Input
//! validation, rate limiting, storage and presentation all live with callers.

pub mod decode;
pub mod gateway;
pub mod guide;
pub mod invoker;
pub mod pipeline;
pub mod stages;

pub use decode::{decode, DecodeError};
pub use gateway::{Attribution, ChatGateway, NoopUsageSink, ProviderGateway, UsageSink};
pub use guide::StudyGuide;
pub use invoker::ModelInvoker;
pub use pipeline::{GenerateError, GuidePipeline, PipelineConfig};
