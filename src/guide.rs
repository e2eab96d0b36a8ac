//! Typed stage outputs and the merged study guide.
//!
//! Five stages produce five distinct shapes. Their field sets are disjoint by
//! construction: [`StudyGuide`] is an explicit named-field union of the stage
//! structs rather than a runtime object spread, so merge order cannot affect
//! the result and a field collision is a compile-time concern, not a runtime
//! hope.
//!
//! Deserialization is deliberately lenient: every field defaults when absent.
//! The decoder guarantees syntactic validity only; a model that omits a field
//! degrades that field, not the whole document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Shared course structures (Stage 1)
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradeItem {
    pub name: String,
    pub weight: f64,
    pub date: Option<String>,
    pub category: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradingComponent {
    pub category: String,
    pub total_weight: f64,
    pub drop_lowest: Option<u32>,
    pub items: Vec<GradeItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradingBreakdown {
    pub components: Vec<GradingComponent>,
    pub grading_scale: BTreeMap<String, f64>,
    pub special_rules: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeekPlan {
    pub week: u32,
    pub dates: String,
    pub topics: Vec<String>,
    pub readings: Vec<String>,
    pub assignments: Vec<String>,
    pub study_tips: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyDateType {
    #[default]
    Class,
    Exam,
    Assignment,
    Study,
    Deadline,
    Milestone,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyDate {
    pub date: String,
    pub event: String,
    #[serde(rename = "type")]
    pub kind: KeyDateType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Textbook {
    pub title: String,
    pub author: String,
    pub required: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeetingSchedule {
    pub days: Vec<String>,
    pub start_time: String,
    pub end_time: String,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Policies {
    pub late_work: String,
    pub attendance: String,
    pub academic_honesty: String,
}

/// Stage 1 output: structured facts extracted from the raw syllabus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreData {
    pub course_name: String,
    pub course_code: String,
    pub instructor: String,
    pub semester: String,
    pub credits: f64,
    pub meeting_times: String,
    pub meeting_schedule: Option<MeetingSchedule>,
    pub location: String,
    pub office_hours: String,
    pub textbook: Option<Textbook>,
    pub week_by_week: Vec<WeekPlan>,
    pub key_dates: Vec<KeyDate>,
    pub grading_breakdown: GradingBreakdown,
    pub policies: Policies,
}

// =============================================================================
// Stage 2: analysis
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseOverview {
    pub one_sentence: String,
    pub why_it_matters: String,
    pub biggest_challenge: String,
    pub prerequisite_knowledge: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicAnalysis {
    pub week: u32,
    pub topic: String,
    pub concepts_you_must_know: Vec<String>,
    pub difficulty_rating: u32,
    pub hours_to_master: f64,
    pub common_misconceptions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DangerZone {
    pub weeks: Vec<u32>,
    pub warning: String,
    pub reason: String,
    pub prevention: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfessorInsights {
    pub grading_emphasis: String,
    pub likely_test_focus: Vec<String>,
    pub hidden_priorities: String,
}

/// Stage 2 output: tutor-style insight into the course structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisData {
    pub course_overview: CourseOverview,
    pub topic_analysis: Vec<TopicAnalysis>,
    pub danger_zones: Vec<DangerZone>,
    pub professor_insights: ProfessorInsights,
}

// =============================================================================
// Stage 3: study content
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyTerm {
    pub term: String,
    pub definition: String,
    pub example: String,
    pub common_confusion: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    #[default]
    Conceptual,
    Calculation,
    Application,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PracticeQuestion {
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub question: String,
    pub answer: String,
    pub difficulty: u32,
    pub topic: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeeklyStudyContent {
    pub week: u32,
    pub topic: String,
    pub key_terms: Vec<KeyTerm>,
    pub practice_questions: Vec<PracticeQuestion>,
    pub self_test_checklist: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
    pub topic: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormulaEntry {
    pub name: String,
    pub formula: String,
    pub when: String,
    pub notes: String,
}

/// Stage 3 output: study materials generated from the week-by-week plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentData {
    pub weekly_study_content: Vec<WeeklyStudyContent>,
    pub flashcard_deck: Vec<Flashcard>,
    pub formula_sheet: Vec<FormulaEntry>,
}

// =============================================================================
// Stage 4: semester strategy
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeCommitment {
    pub light: f64,
    pub normal: f64,
    pub heavy: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradeTargetPath {
    pub required_average: f64,
    pub strategy: String,
    pub risk_level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradeTargetPaths {
    #[serde(rename = "A")]
    pub a: GradeTargetPath,
    #[serde(rename = "B")]
    pub b: GradeTargetPath,
    #[serde(rename = "C")]
    pub c: GradeTargetPath,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemesterStrategy {
    pub overall_approach: String,
    pub weekly_time_commitment: TimeCommitment,
    pub grade_target_paths: GradeTargetPaths,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudyPhase {
    pub days: String,
    pub focus: String,
    pub hours: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudyPlan {
    pub start_date: String,
    pub phases: Vec<StudyPhase>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamStrategy {
    pub exam: String,
    pub date: String,
    pub weight: String,
    pub coverage: Vec<String>,
    pub predicted_format: BTreeMap<String, String>,
    pub study_plan: StudyPlan,
    pub high_yield_topics: Vec<String>,
    pub common_mistakes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeeklyTask {
    pub task: String,
    pub when: String,
    pub time: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeeklyBattlePlan {
    pub week: u32,
    pub dates: String,
    pub theme: String,
    pub priority: PlanPriority,
    pub tasks: Vec<WeeklyTask>,
    pub total_hours: f64,
    pub warnings: Vec<String>,
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalendarEvent {
    pub title: String,
    pub date: String,
    pub start_time: Option<String>,
    pub duration: Option<u32>,
    #[serde(rename = "type")]
    pub kind: KeyDateType,
    pub color: String,
}

/// Stage 4 output: the semester battle plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrategyData {
    pub semester_strategy: SemesterStrategy,
    pub exam_strategy: Vec<ExamStrategy>,
    pub weekly_battle_plan: Vec<WeeklyBattlePlan>,
    pub calendar_events: Vec<CalendarEvent>,
}

// =============================================================================
// Stage 5: priority intelligence (optional)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Roi {
    High,
    #[default]
    Medium,
    Low,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffortLevel {
    Easy,
    #[default]
    Medium,
    Hard,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicPriority {
    pub topic: String,
    pub week: u32,
    pub roi: Roi,
    pub exam_weight: String,
    pub effort_level: EffortLevel,
    pub verdict: String,
    // Field name matches the upstream schema, typo included.
    pub skip_if_desparate: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradePath {
    pub required_mastery: Option<String>,
    pub minimum_viable: Option<String>,
    pub time_per_week: String,
    pub non_negotiables: Option<Vec<String>>,
    pub can_slack_on: Option<Vec<String>>,
    pub recovery_room: Option<String>,
    pub safety_margin: Option<String>,
    pub survival_strategy: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradePaths {
    #[serde(rename = "A")]
    pub a: GradePath,
    #[serde(rename = "B")]
    pub b: GradePath,
    #[serde(rename = "C")]
    pub c: GradePath,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CramSheet {
    pub formulas: Vec<String>,
    pub definitions: Vec<String>,
    pub concepts: Vec<String>,
    pub common_tricks: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeeklyFocus {
    pub week: u32,
    pub one_thing_that_matters: String,
    pub timebox_warning: String,
    pub checkpoint_question: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Likelihood {
    #[serde(rename = "Very Likely")]
    VeryLikely,
    Likely,
    #[default]
    Possible,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PredictedTopic {
    pub topic: String,
    pub likelihood: Likelihood,
    pub points_prediction: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionTypePrediction {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: String,
    pub strategy: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeStrategy {
    pub total_minutes: u32,
    pub suggested_pacing: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamIntel {
    pub exam: String,
    pub predicted_topics: Vec<PredictedTopic>,
    pub question_type_predictions: Vec<QuestionTypePrediction>,
    pub time_strategy: TimeStrategy,
    pub night_before: Vec<String>,
    pub morning_of: Vec<String>,
    pub during_exam: Vec<String>,
}

/// Stage 5 output: grade-maximizing prioritization. The one optional stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriorityData {
    pub topic_priority: Vec<TopicPriority>,
    pub must_know_list: Vec<String>,
    pub can_skip_list: Vec<String>,
    pub grade_paths: GradePaths,
    pub cram_sheet: CramSheet,
    pub weekly_focus: Vec<WeeklyFocus>,
    pub exam_intel: Vec<ExamIntel>,
}

// =============================================================================
// Merged document
// =============================================================================

/// The final study guide: the union of all successful stage outputs.
///
/// CoreData, AnalysisData, ContentData and StrategyData are required;
/// PriorityData is optional and its absence does not invalidate the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyGuide {
    #[serde(flatten)]
    pub core: CoreData,
    #[serde(flatten)]
    pub analysis: AnalysisData,
    #[serde(flatten)]
    pub content: ContentData,
    #[serde(flatten)]
    pub strategy: StrategyData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_data: Option<PriorityData>,
    pub generated_at: DateTime<Utc>,
}

impl StudyGuide {
    /// Merge stage outputs into one document, stamped with the current time.
    pub fn assemble(
        core: CoreData,
        analysis: AnalysisData,
        content: ContentData,
        strategy: StrategyData,
        priority_data: Option<PriorityData>,
    ) -> Self {
        Self {
            core,
            analysis,
            content,
            strategy,
            priority_data,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample_core() -> CoreData {
        CoreData {
            course_name: "Physics 101".into(),
            course_code: "PHYS 101".into(),
            credits: 3.0,
            week_by_week: vec![WeekPlan {
                week: 1,
                topics: vec!["Kinematics".into()],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn stage_fields_stay_disjoint_in_merged_document() {
        let guide = StudyGuide::assemble(
            sample_core(),
            AnalysisData::default(),
            ContentData::default(),
            StrategyData::default(),
            Some(PriorityData::default()),
        );

        let value = serde_json::to_value(&guide).unwrap();
        let merged_keys = value.as_object().unwrap().len();

        let count = |v: Value| v.as_object().unwrap().len();
        let part_keys = count(serde_json::to_value(sample_core()).unwrap())
            + count(serde_json::to_value(AnalysisData::default()).unwrap())
            + count(serde_json::to_value(ContentData::default()).unwrap())
            + count(serde_json::to_value(StrategyData::default()).unwrap());

        // Every stage key survives, plus priorityData and generatedAt.
        assert_eq!(merged_keys, part_keys + 2);
    }

    #[test]
    fn absent_priority_is_not_serialized() {
        let guide = StudyGuide::assemble(
            sample_core(),
            AnalysisData::default(),
            ContentData::default(),
            StrategyData::default(),
            None,
        );
        let value = serde_json::to_value(&guide).unwrap();
        assert!(value.get("priorityData").is_none());
        assert!(value.get("generatedAt").is_some());
    }

    #[test]
    fn core_parses_from_model_style_json() {
        let json = r#"{
            "courseName": "Intro to Chemistry",
            "courseCode": "CHEM 110",
            "credits": 4,
            "weekByWeek": [
                {"week": 1, "dates": "Jan 20-24", "topics": ["Atoms"], "readings": [], "assignments": [], "studyTips": "Skim ch. 1"}
            ],
            "keyDates": [{"date": "2026-02-15", "event": "Midterm 1", "type": "exam"}],
            "gradingBreakdown": {
                "components": [{"category": "Exams", "totalWeight": 40, "dropLowest": 0, "items": []}],
                "gradingScale": {"A": 93, "B": 83},
                "specialRules": []
            }
        }"#;

        let core: CoreData = serde_json::from_str(json).unwrap();
        assert_eq!(core.course_name, "Intro to Chemistry");
        assert_eq!(core.key_dates[0].kind, KeyDateType::Exam);
        assert_eq!(core.grading_breakdown.components[0].total_weight, 40.0);
        // Missing fields default rather than fail.
        assert!(core.instructor.is_empty());
    }

    #[test]
    fn unknown_enum_labels_do_not_fail_deserialization() {
        let json = r#"{"topic": "Entropy", "week": 6, "roi": "EXTREME", "examWeight": "20%", "effortLevel": "Brutal", "verdict": "do it", "skipIfDesparate": false}"#;
        let tp: TopicPriority = serde_json::from_str(json).unwrap();
        assert_eq!(tp.roi, Roi::Other);
        assert_eq!(tp.effort_level, EffortLevel::Other);
    }

    #[test]
    fn likelihood_parses_spaced_label() {
        let json = r#"{"topic": "Gas laws", "likelihood": "Very Likely", "pointsPrediction": "~20 points"}"#;
        let pt: PredictedTopic = serde_json::from_str(json).unwrap();
        assert_eq!(pt.likelihood, Likelihood::VeryLikely);
    }

    #[test]
    fn guide_round_trips() {
        let guide = StudyGuide::assemble(
            sample_core(),
            AnalysisData::default(),
            ContentData::default(),
            StrategyData::default(),
            Some(PriorityData::default()),
        );
        let json = serde_json::to_string(&guide).unwrap();
        let back: StudyGuide = serde_json::from_str(&json).unwrap();
        assert_eq!(back.core.course_name, "Physics 101");
        assert!(back.priority_data.is_some());
    }
}
