//! Coordinator tests against a scripted gateway.
//!
//! The gateway seam lets these tests assert the dependency graph directly:
//! which stages were invoked, against which models, and in what circumstances
//! the pipeline aborts versus degrades.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use syllagen::gateway::{
    ChatGateway, ChatRequest, ChatResponse, FinishReason, ProviderError,
};
use syllagen::pipeline::{
    GenerateError, GuidePipeline, PipelineConfig, DEFAULT_FALLBACK_MODEL, DEFAULT_PRIMARY_MODEL,
};

// A minimal but realistic ~150-character syllabus.
const SYLLABUS: &str = "PSY 101: Intro to Psychology. Instructor: Dr. Lin. MWF 9-10am. \
Grading: 2 midterms (40%), final (30%), weekly quizzes (30%). Weeks 1-14 cover ch. 1-14.";

const CORE_JSON: &str = r#"{
  "courseName": "Intro to Psychology",
  "courseCode": "PSY 101",
  "instructor": "Dr. Lin",
  "credits": 3,
  "weekByWeek": [
    {"week": 1, "dates": "Jan 20-24", "topics": ["History of psychology"], "readings": ["Ch. 1"], "assignments": [], "studyTips": "Make a timeline"}
  ],
  "keyDates": [{"date": "2026-03-01", "event": "Midterm 1", "type": "exam"}],
  "gradingBreakdown": {
    "components": [{"category": "Exams", "totalWeight": 70, "items": []}],
    "gradingScale": {"A": 93},
    "specialRules": []
  }
}"#;

const ANALYSIS_JSON: &str = r#"{
  "courseOverview": {"oneSentence": "Survey of psychology.", "whyItMatters": "", "biggestChallenge": "", "prerequisiteKnowledge": []},
  "topicAnalysis": [{"week": 1, "topic": "History", "conceptsYouMustKnow": ["structuralism"], "difficultyRating": 2, "hoursToMaster": 3, "commonMisconceptions": []}],
  "dangerZones": [{"weeks": [7], "warning": "midterm crunch", "reason": "", "prevention": ""}]
}"#;

const CONTENT_JSON: &str = r#"{
  "weeklyStudyContent": [{"week": 1, "topic": "History", "keyTerms": [], "practiceQuestions": [], "selfTestChecklist": []}],
  "flashcardDeck": [{"front": "Who founded structuralism?", "back": "Wundt/Titchener", "topic": "Week 1", "tags": []}]
}"#;

const STRATEGY_JSON: &str = r#"{
  "semesterStrategy": {"overallApproach": "Spaced repetition over cramming."},
  "examStrategy": [{"exam": "Midterm 1", "date": "2026-03-01", "weight": "20%", "coverage": ["Weeks 1-6"], "highYieldTopics": ["memory"], "commonMistakes": []}],
  "weeklyBattlePlan": [{"week": 1, "theme": "Foundations", "priority": "MEDIUM", "tasks": [], "totalHours": 6}]
}"#;

const PRIORITY_JSON: &str = r#"{
  "mustKnowList": ["Operant vs classical conditioning"],
  "topicPriority": [{"topic": "Memory", "week": 5, "roi": "HIGH", "examWeight": "25%", "effortLevel": "Medium", "verdict": "prioritize", "skipIfDesparate": false}]
}"#;

// =============================================================================
// Scripted gateway
// =============================================================================

#[derive(Clone)]
enum StageScript {
    /// Any model succeeds with this content.
    Ok(&'static str),
    /// Primary model errors; fallback succeeds with this content.
    OkOnFallback(&'static str),
    /// Both models error.
    FailBoth,
    /// Succeed after a delay (for budget tests).
    SlowOk(&'static str, Duration),
}

struct ScriptedGateway {
    scripts: HashMap<&'static str, StageScript>,
    /// (caller, model) per call, in arrival order.
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedGateway {
    fn new(scripts: HashMap<&'static str, StageScript>) -> Self {
        Self {
            scripts,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls_for(&self, caller: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == caller)
            .count()
    }

    fn models_for(&self, caller: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == caller)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

fn response(content: &str) -> ChatResponse {
    ChatResponse {
        content: content.to_string(),
        input_tokens: 100,
        output_tokens: 200,
        cost_nanodollars: 0,
        latency: Duration::from_millis(10),
        finish_reason: FinishReason::Stop,
    }
}

#[async_trait]
impl ChatGateway for ScriptedGateway {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let caller = req.attribution.caller;
        let model = req.model.model_id().to_string();
        self.calls
            .lock()
            .unwrap()
            .push((caller.to_string(), model.clone()));

        let script = self
            .scripts
            .get(caller)
            .unwrap_or_else(|| panic!("unexpected stage call: {caller}"));

        match script {
            StageScript::Ok(content) => Ok(response(content)),
            StageScript::OkOnFallback(content) => {
                if model == DEFAULT_PRIMARY_MODEL {
                    Err(ProviderError::provider("openrouter", "primary down", true))
                } else {
                    Ok(response(content))
                }
            }
            StageScript::FailBoth => {
                Err(ProviderError::provider("openrouter", "all down", true))
            }
            StageScript::SlowOk(content, delay) => {
                tokio::time::sleep(*delay).await;
                Ok(response(content))
            }
        }
    }
}

fn happy_scripts() -> HashMap<&'static str, StageScript> {
    HashMap::from([
        ("pipeline::core", StageScript::Ok(CORE_JSON)),
        ("pipeline::analysis", StageScript::Ok(ANALYSIS_JSON)),
        ("pipeline::content", StageScript::Ok(CONTENT_JSON)),
        ("pipeline::strategy", StageScript::Ok(STRATEGY_JSON)),
        ("pipeline::priority", StageScript::Ok(PRIORITY_JSON)),
    ])
}

fn pipeline_with(gateway: Arc<ScriptedGateway>) -> GuidePipeline {
    GuidePipeline::new(gateway, PipelineConfig::default())
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn all_stages_succeed_yields_full_guide() {
    let gateway = Arc::new(ScriptedGateway::new(happy_scripts()));
    let pipeline = pipeline_with(gateway.clone());

    let guide = pipeline.generate(SYLLABUS).await.unwrap();

    assert_eq!(guide.core.course_name, "Intro to Psychology");
    assert!(!guide.strategy.exam_strategy.is_empty());
    assert!(guide.priority_data.is_some());

    // One call per stage, primary model only.
    for caller in [
        "pipeline::core",
        "pipeline::analysis",
        "pipeline::content",
        "pipeline::strategy",
        "pipeline::priority",
    ] {
        assert_eq!(gateway.calls_for(caller), 1, "{caller}");
        assert_eq!(
            gateway.models_for(caller),
            vec![DEFAULT_PRIMARY_MODEL.to_string()],
            "{caller}"
        );
    }
}

#[tokio::test]
async fn fenced_and_truncated_responses_are_repaired_in_flight() {
    let mut scripts = happy_scripts();
    // Core arrives fenced; priority arrives truncated mid-array.
    scripts.insert(
        "pipeline::core",
        StageScript::Ok(
            "```json\n{\"courseName\": \"Intro to Psychology\", \"weekByWeek\": []}\n```",
        ),
    );
    scripts.insert(
        "pipeline::priority",
        StageScript::Ok(r#"{"mustKnowList": ["conditioning", "memory"#),
    );

    let pipeline = pipeline_with(Arc::new(ScriptedGateway::new(scripts)));
    let guide = pipeline.generate(SYLLABUS).await.unwrap();

    assert_eq!(guide.core.course_name, "Intro to Psychology");
    let priority = guide.priority_data.unwrap();
    assert_eq!(priority.must_know_list, vec!["conditioning".to_string()]);
}

#[tokio::test]
async fn stage_one_failure_invokes_nothing_downstream() {
    let mut scripts = happy_scripts();
    scripts.insert("pipeline::core", StageScript::FailBoth);

    let gateway = Arc::new(ScriptedGateway::new(scripts));
    let pipeline = pipeline_with(gateway.clone());

    let err = pipeline.generate(SYLLABUS).await.unwrap_err();
    assert!(matches!(err, GenerateError::Invocation { .. }));
    assert_eq!(err.category(), "invocation_failure");

    // Primary + fallback for Stage 1, nothing else.
    assert_eq!(gateway.calls_for("pipeline::core"), 2);
    for caller in [
        "pipeline::analysis",
        "pipeline::content",
        "pipeline::strategy",
        "pipeline::priority",
    ] {
        assert_eq!(gateway.calls_for(caller), 0, "{caller}");
    }
}

#[tokio::test]
async fn fallback_model_is_transparent_to_the_caller() {
    let mut scripts = happy_scripts();
    scripts.insert("pipeline::core", StageScript::OkOnFallback(CORE_JSON));

    let gateway = Arc::new(ScriptedGateway::new(scripts));
    let pipeline = pipeline_with(gateway.clone());

    let guide = pipeline.generate(SYLLABUS).await.unwrap();
    assert_eq!(guide.core.course_name, "Intro to Psychology");
    assert!(guide.priority_data.is_some());

    assert_eq!(
        gateway.models_for("pipeline::core"),
        vec![
            DEFAULT_PRIMARY_MODEL.to_string(),
            DEFAULT_FALLBACK_MODEL.to_string(),
        ]
    );
}

#[tokio::test]
async fn stage_two_double_failure_blocks_stages_four_and_five() {
    let mut scripts = happy_scripts();
    scripts.insert("pipeline::analysis", StageScript::FailBoth);

    let gateway = Arc::new(ScriptedGateway::new(scripts));
    let pipeline = pipeline_with(gateway.clone());

    let err = pipeline.generate(SYLLABUS).await.unwrap_err();
    assert!(matches!(
        err,
        GenerateError::Invocation { stage, .. } if stage.name() == "analysis"
    ));

    assert_eq!(gateway.calls_for("pipeline::analysis"), 2);
    assert_eq!(gateway.calls_for("pipeline::strategy"), 0);
    assert_eq!(gateway.calls_for("pipeline::priority"), 0);
}

#[tokio::test]
async fn stage_three_failure_blocks_stage_four_even_though_four_needs_only_two() {
    // The Stage 2/3 pair joins as a unit: Stage 4 must not start if Stage 3
    // failed, even though its prompt only consumes Stage 1 + 2 output.
    let mut scripts = happy_scripts();
    scripts.insert("pipeline::content", StageScript::FailBoth);

    let gateway = Arc::new(ScriptedGateway::new(scripts));
    let pipeline = pipeline_with(gateway.clone());

    let err = pipeline.generate(SYLLABUS).await.unwrap_err();
    assert!(matches!(
        err,
        GenerateError::Invocation { stage, .. } if stage.name() == "content"
    ));

    assert_eq!(gateway.calls_for("pipeline::strategy"), 0);
    assert_eq!(gateway.calls_for("pipeline::priority"), 0);
}

#[tokio::test]
async fn priority_invocation_failure_degrades_to_absent_priority() {
    let mut scripts = happy_scripts();
    scripts.insert("pipeline::priority", StageScript::FailBoth);

    let gateway = Arc::new(ScriptedGateway::new(scripts));
    let pipeline = pipeline_with(gateway.clone());

    let guide = pipeline.generate(SYLLABUS).await.unwrap();
    assert!(guide.priority_data.is_none());
    assert_eq!(guide.core.course_name, "Intro to Psychology");
    assert!(!guide.strategy.exam_strategy.is_empty());
    // Priority tried both models before giving up.
    assert_eq!(gateway.calls_for("pipeline::priority"), 2);
}

#[tokio::test]
async fn priority_decode_failure_degrades_to_absent_priority() {
    let mut scripts = happy_scripts();
    scripts.insert(
        "pipeline::priority",
        StageScript::Ok("The course is hard, good luck!"),
    );

    let pipeline = pipeline_with(Arc::new(ScriptedGateway::new(scripts)));
    let guide = pipeline.generate(SYLLABUS).await.unwrap();
    assert!(guide.priority_data.is_none());
}

#[tokio::test]
async fn strategy_decode_failure_is_fatal() {
    let mut scripts = happy_scripts();
    scripts.insert("pipeline::strategy", StageScript::Ok("not json at all"));

    let pipeline = pipeline_with(Arc::new(ScriptedGateway::new(scripts)));
    let err = pipeline.generate(SYLLABUS).await.unwrap_err();
    assert!(matches!(
        err,
        GenerateError::Decode { stage, .. } if stage.name() == "strategy"
    ));
    assert_eq!(err.category(), "decode_failure");
}

#[tokio::test]
async fn budget_overrun_surfaces_timeout() {
    let scripts = HashMap::from([(
        "pipeline::core",
        StageScript::SlowOk(CORE_JSON, Duration::from_millis(200)),
    )]);

    let config = PipelineConfig {
        budget: Duration::from_millis(20),
        ..Default::default()
    };
    let pipeline = GuidePipeline::new(Arc::new(ScriptedGateway::new(scripts)), config);

    let err = pipeline.generate(SYLLABUS).await.unwrap_err();
    assert!(matches!(err, GenerateError::Timeout { .. }));
    assert_eq!(err.category(), "timeout");
    assert_eq!(
        err.public_message(),
        "Study guide generation timed out. Please try again."
    );
}

#[tokio::test]
async fn public_message_never_leaks_provider_detail() {
    let mut scripts = happy_scripts();
    scripts.insert("pipeline::core", StageScript::FailBoth);

    let pipeline = pipeline_with(Arc::new(ScriptedGateway::new(scripts)));
    let err = pipeline.generate(SYLLABUS).await.unwrap_err();

    // The internal display carries provider detail; the public message is a
    // fixed generic string.
    assert!(err.to_string().contains("invocation failed"));
    assert!(!err.public_message().contains("openrouter"));
    assert!(!err.public_message().contains("all down"));
}
