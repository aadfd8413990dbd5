//! Built-in prompt templates, one per agent kind.

use super::templates::PromptTemplate;
use crate::agents::AgentKind;
use crate::context::{Grade, RequestContext, params};

const JSON_ONLY: &str = "Return ONLY a valid JSON object with exactly this structure, no explanations and no markdown:";

/// Builds the shipped template for `kind`.
pub(crate) fn template_for(kind: AgentKind) -> PromptTemplate {
    match kind {
        AgentKind::CoursePlanner => course_planner(),
        AgentKind::ActivityGenerator => activity_generator(),
        AgentKind::WorksheetGenerator => worksheet_generator(),
        AgentKind::AssessmentGenerator => assessment_generator(),
        AgentKind::VisualAidGenerator => visual_aid_generator(),
        AgentKind::PeerActivityGenerator => peer_activity_generator(),
    }
}

fn per_grade(context: &RequestContext, line: impl Fn(Grade, &str) -> String) -> String {
    context.grades().iter().map(|g| line(g, context.topic())).collect::<Vec<_>>().join("; ")
}

fn teach_objectives(ctx: &RequestContext) -> String {
    per_grade(ctx, |g, topic| format!("Teach {topic} at a level suited to {g}"))
}

fn engage_objectives(ctx: &RequestContext) -> String {
    per_grade(ctx, |g, topic| format!("Engage {g} students in {topic}"))
}

fn practice_objectives(ctx: &RequestContext) -> String {
    per_grade(ctx, |g, topic| format!("Practice {topic} skills for {g}"))
}

fn assess_objectives(ctx: &RequestContext) -> String {
    per_grade(ctx, |g, topic| format!("Assess {topic} understanding for {g}"))
}

fn visual_objectives(ctx: &RequestContext) -> String {
    per_grade(ctx, |g, topic| format!("Support visual learning of {topic} for {g}"))
}

fn peer_objectives(ctx: &RequestContext) -> String {
    format!("Foster peer learning in {} across grades", ctx.topic())
}

fn common(template: PromptTemplate, minutes: &str, objectives: fn(&RequestContext) -> String) -> PromptTemplate {
    template
        .with_default("chapter", "General")
        .with_default(params::DURATION_MINUTES, minutes)
        .with_default(params::CLASS_SIZE, "20")
        .with_derived_default(params::LEARNING_OBJECTIVES, objectives)
}

fn course_planner() -> PromptTemplate {
    let template = PromptTemplate::new(
        AgentKind::CoursePlanner,
        "You are a multigrade classroom course planning specialist. You create daily lesson plans \
         that serve several grade levels at once, with differentiated instruction and smooth \
         transitions between activities for each grade group.",
        r#"Create a detailed daily course plan for a multigrade classroom.

CONTEXT:
- Grades: {{grades}}
- Subject: {{subject}}
- Chapter: {{chapter}}
- Topic: {{topic}}
- Duration: {{duration_minutes}} minutes
- Class Size: {{class_size}} students
- Learning Objectives: {{learning_objectives}}

Every segment must list the grades it serves. Segment durations should add up to the total duration.

"#
        .to_string()
            + JSON_ONLY
            + r#"
{
  "lesson_title": "string",
  "total_duration_minutes": "integer",
  "segments": [
    {
      "time_slot": "string (e.g. 0-10 min)",
      "duration_minutes": "integer",
      "activity": "string",
      "grades": ["string (one of {{grades}})"],
      "teacher_role": "string",
      "grade_tasks": {"Grade N": "string"},
      "transitions": "string"
    }
  ],
  "materials_needed": ["string"],
  "assessment_checkpoints": [
    {"time": "string", "grade": "string", "assessment_type": "string", "success_criteria": "string"}
  ],
  "classroom_management": {"setup": "string", "behavior_strategies": ["string"], "attention_signals": ["string"]},
  "differentiation_strategies": {"support_students": ["string"], "advanced_students": ["string"]},
  "homework_assignments": [{"grade": "string", "task": "string", "estimated_time": "integer (minutes)"}]
}"#,
    );
    common(template, "45", teach_objectives)
}

fn activity_generator() -> PromptTemplate {
    let template = PromptTemplate::new(
        AgentKind::ActivityGenerator,
        "You are a creative educational activity designer specializing in multigrade classrooms. \
         You create engaging, hands-on activities that adapt to different grade levels while \
         keeping the core learning objectives.",
        r#"Generate a creative learning activity for a multigrade classroom.

CONTEXT:
- Grades: {{grades}}
- Subject: {{subject}}
- Chapter: {{chapter}}
- Topic: {{topic}}
- Duration: {{duration_minutes}} minutes
- Class Size: {{class_size}} students
- Activity Type: {{activity_type}}
- Learning Objectives: {{learning_objectives}}

Provide one grade adaptation for each of: {{grades}}.

"#
        .to_string()
            + JSON_ONLY
            + r#"
{
  "activity_title": "string",
  "activity_type": "string (individual/group/whole-class/stations)",
  "estimated_duration_minutes": "integer",
  "materials_needed": ["string"],
  "setup_instructions": "string",
  "grade_adaptations": [
    {"grade": "string", "instructions": "string", "examples": ["string"], "success_criteria": ["string"]}
  ],
  "steps": [
    {"step": "integer", "instruction": "string", "time_estimate": "integer (minutes)", "teacher_notes": "string"}
  ],
  "assessment_rubric": [
    {"criteria": "string", "beginner": "string", "developing": "string", "proficient": "string", "advanced": "string"}
  ],
  "variations": [{"variation_name": "string", "description": "string", "suitable_for": ["string"]}]
}"#,
    );
    common(template, "45", engage_objectives).with_default(params::ACTIVITY_TYPE, "group")
}

fn worksheet_generator() -> PromptTemplate {
    let template = PromptTemplate::new(
        AgentKind::WorksheetGenerator,
        "You are a worksheet creation specialist for multigrade classrooms. You design printable \
         worksheets that give each grade its own differentiated practice.",
        r#"Create a worksheet set for multigrade classroom practice.

CONTEXT:
- Grades: {{grades}}
- Subject: {{subject}}
- Chapter: {{chapter}}
- Topic: {{topic}}
- Time Available: {{duration_minutes}} minutes
- Difficulty Level: {{difficulty_level}}
- Learning Objectives: {{learning_objectives}}

Write one grade section for each of: {{grades}}. Number questions from 1 within each section
and give an answer for every question in the answer key.

"#
        .to_string()
            + JSON_ONLY
            + r#"
{
  "worksheet_title": "string",
  "instructions": "string (for students)",
  "grade_sections": [
    {
      "grade": "string",
      "difficulty_level": "string (beginner/intermediate/advanced)",
      "questions": [
        {
          "number": "integer",
          "prompt": "string",
          "question_type": "string (multiple_choice/fill_blank/short_answer/drawing/matching)",
          "options": ["string"],
          "points": "integer"
        }
      ]
    }
  ],
  "answer_key": [
    {"grade": "string", "question_number": "integer", "answer": "string", "explanation": "string"}
  ],
  "extension_activities": [{"activity": "string", "suitable_for": "string", "materials_needed": ["string"]}]
}"#,
    );
    common(template, "30", practice_objectives).with_default(params::DIFFICULTY_LEVEL, "mixed")
}

fn assessment_generator() -> PromptTemplate {
    let template = PromptTemplate::new(
        AgentKind::AssessmentGenerator,
        "You are an assessment design expert for multigrade classrooms. You create fair \
         assessments that evaluate understanding across grade levels and learning styles.",
        r#"Design an assessment for a multigrade classroom.

CONTEXT:
- Grades: {{grades}}
- Subject: {{subject}}
- Chapter: {{chapter}}
- Topic: {{topic}}
- Duration: {{duration_minutes}} minutes
- Assessment Type: {{assessment_type}}
- Learning Objectives: {{learning_objectives}}

Every component needs a task for each of: {{grades}}.

"#
        .to_string()
            + JSON_ONLY
            + r#"
{
  "assessment_title": "string",
  "assessment_type": "string (formative/summative/diagnostic)",
  "duration_minutes": "integer",
  "components": [
    {
      "name": "string",
      "weight_percentage": "integer",
      "description": "string",
      "grade_tasks": [
        {
          "grade": "string",
          "task": "string",
          "scoring_rubric": {"excellent": "string", "good": "string", "satisfactory": "string", "needs_improvement": "string"}
        }
      ]
    }
  ],
  "grade_adaptations": [{"grade": "string", "assessment_method": "string", "accommodations": ["string"]}],
  "formative_checks": [{"checkpoint": "string", "method": "string", "feedback_strategy": "string"}]
}"#,
    );
    common(template, "30", assess_objectives).with_default(params::ASSESSMENT_TYPE, "formative")
}

fn visual_aid_generator() -> PromptTemplate {
    let template = PromptTemplate::new(
        AgentKind::VisualAidGenerator,
        "You are a visual learning specialist who describes educational visual aids, charts, \
         diagrams and interactive displays suitable for multigrade classrooms.",
        r#"Design a visual aid for multigrade classroom instruction.

CONTEXT:
- Grades: {{grades}}
- Subject: {{subject}}
- Chapter: {{chapter}}
- Topic: {{topic}}
- Aid Type: {{aid_type}}
- Learning Objectives: {{learning_objectives}}

Describe what each of {{grades}} should focus on.

"#
        .to_string()
            + JSON_ONLY
            + r#"
{
  "visual_aid_title": "string",
  "aid_type": "string (poster/chart/diagram/interactive_board/manipulatives)",
  "materials_needed": ["string"],
  "size_specifications": "string",
  "content_description": {
    "main_visual": "string (detailed description)",
    "text_elements": ["string"],
    "color_scheme": "string",
    "layout_description": "string"
  },
  "grade_elements": [
    {"grade": "string", "visual_focus": "string", "interaction_method": "string", "learning_support": "string"}
  ],
  "usage_instructions": {"setup": "string", "introduction_script": "string", "interaction_activities": ["string"]}
}"#,
    );
    common(template, "45", visual_objectives).with_default(params::AID_TYPE, "poster")
}

fn peer_activity_generator() -> PromptTemplate {
    let template = PromptTemplate::new(
        AgentKind::PeerActivityGenerator,
        "You are a collaborative learning specialist who designs peer-to-peer activities that \
         promote cross-grade interaction and mentoring in multigrade settings.",
        r#"Create a peer learning activity for multigrade classroom collaboration.

CONTEXT:
- Grades: {{grades}}
- Subject: {{subject}}
- Chapter: {{chapter}}
- Topic: {{topic}}
- Duration: {{duration_minutes}} minutes
- Class Size: {{class_size}} students
- Collaboration Mode: {{collaboration_mode}}
- Learning Objectives: {{learning_objectives}}

Choose a group size that divides a class of {{class_size}} sensibly, and give every role the grades it suits.

"#
        .to_string()
            + JSON_ONLY
            + r#"
{
  "activity_title": "string",
  "collaboration_type": "string (buddy_system/mixed_groups/mentoring/stations)",
  "duration_minutes": "integer",
  "grouping_strategy": {
    "group_size": "integer",
    "grade_mixing": "string",
    "pairing_criteria": ["string"],
    "rotation_schedule": "string"
  },
  "roles": [
    {"role_name": "string", "suitable_grades": ["string"], "responsibilities": ["string"], "skills_developed": ["string"]}
  ],
  "activity_stations": [
    {"station_name": "string", "learning_objective": "string", "materials": ["string"], "time_allocation": "integer (minutes)"}
  ],
  "assessment_strategies": {"peer_feedback_forms": ["string"], "self_reflection_prompts": ["string"]}
}"#,
    );
    common(template, "45", peer_objectives).with_default(params::COLLABORATION_MODE, "mixed_groups")
}
