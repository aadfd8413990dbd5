//! Teacher-readable markdown view of an artifact.

use std::fmt::Write;

use super::bodies::{Activity, Assessment, CoursePlan, PeerActivity, VisualAid, Worksheet};
use super::model::{ArtifactBody, GeneratedArtifact};

/// Renders `artifact` as markdown.
pub fn render_markdown(artifact: &GeneratedArtifact) -> String {
    let header = &artifact.header;
    let mut out = String::new();
    let title = artifact.body.title().unwrap_or(&header.topic);
    let _ = writeln!(out, "# {title}\n");
    let _ = writeln!(out, "**Agent:** {}  ", header.agent_kind.label());
    let _ = writeln!(out, "**Subject:** {}  ", header.subject);
    if let Some(chapter) = &header.chapter {
        let _ = writeln!(out, "**Chapter:** {chapter}  ");
    }
    let _ = writeln!(out, "**Topic:** {}  ", header.topic);
    let _ = writeln!(out, "**Grades:** {}  ", header.applicable_grades);
    let _ = writeln!(out, "**Created:** {}\n", header.created_at.format("%Y-%m-%d %H:%M UTC"));

    match &artifact.body {
        ArtifactBody::CoursePlan(plan) => course_plan(&mut out, plan),
        ArtifactBody::Activity(activity) => activity_md(&mut out, activity),
        ArtifactBody::Worksheet(sheet) => worksheet(&mut out, sheet),
        ArtifactBody::Assessment(assessment) => assessment_md(&mut out, assessment),
        ArtifactBody::VisualAid(aid) => visual_aid(&mut out, aid),
        ArtifactBody::PeerActivity(peer) => peer_activity(&mut out, peer),
        ArtifactBody::Unstructured { raw_text, .. } => {
            out.push_str("> **Warning:** the generated content did not match the expected structure.\n");
            out.push_str("> Review it carefully before using it in class.\n\n");
            out.push_str(raw_text.trim());
            out.push('\n');
        }
    }
    out
}

fn bullets(out: &mut String, items: &[String]) {
    if items.is_empty() {
        out.push_str("-\n");
    }
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

fn materials(out: &mut String, items: Option<&Vec<String>>) {
    if let Some(items) = items {
        out.push_str("\n## Materials Needed\n");
        bullets(out, items);
    }
}

fn course_plan(out: &mut String, plan: &CoursePlan) {
    let _ = writeln!(out, "**Total Duration:** {} minutes\n", plan.total_duration_minutes);
    out.push_str("## Timeline\n\n| Time | Minutes | Activity | Grades |\n|---|---|---|---|\n");
    for seg in &plan.segments {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            seg.time_slot,
            seg.duration_minutes,
            seg.activity.replace('|', "/"),
            seg.grades.join(", ")
        );
    }
    materials(out, plan.materials_needed.as_ref());
}

fn activity_md(out: &mut String, activity: &Activity) {
    let _ = writeln!(out, "**Estimated Duration:** {} minutes", activity.estimated_duration_minutes);
    materials(out, activity.materials_needed.as_ref());
    out.push_str("\n## Steps\n");
    for step in &activity.steps {
        let _ = writeln!(out, "- Step {}: {}", step.step, step.instruction);
    }
    out.push_str("\n## Grade Adaptations\n");
    for adaptation in &activity.grade_adaptations {
        let _ = writeln!(out, "- **{}:** {}", adaptation.grade, adaptation.instructions);
    }
}

fn worksheet(out: &mut String, sheet: &Worksheet) {
    if let Some(instructions) = sheet.instructions.as_ref() {
        let _ = writeln!(out, "_{instructions}_");
    }
    for section in &sheet.grade_sections {
        let _ = writeln!(out, "\n## {}\n", section.grade);
        for q in &section.questions {
            let _ = writeln!(out, "{}. {}", q.number, q.prompt);
        }
    }
    out.push_str("\n## Answer Key\n");
    for entry in &sheet.answer_key {
        let _ = writeln!(out, "- {} Q{}: {}", entry.grade, entry.question_number, entry.answer);
    }
}

fn assessment_md(out: &mut String, assessment: &Assessment) {
    if let Some(kind) = assessment.assessment_type.as_ref() {
        let _ = writeln!(out, "**Assessment Type:** {kind}");
    }
    for component in &assessment.components {
        let _ = writeln!(out, "\n## {}\n", component.name);
        for task in &component.grade_tasks {
            let _ = writeln!(out, "- **{}:** {}", task.grade, task.task);
        }
    }
}

fn visual_aid(out: &mut String, aid: &VisualAid) {
    let _ = writeln!(out, "**Aid Type:** {}\n", aid.aid_type);
    out.push_str("## Main Visual\n");
    let _ = writeln!(out, "{}", aid.content_description.main_visual);
    out.push_str("\n## Grade Focus\n");
    for element in &aid.grade_elements {
        let _ = writeln!(out, "- **{}:** {}", element.grade, element.visual_focus);
    }
    materials(out, aid.materials_needed.as_ref());
}

fn peer_activity(out: &mut String, peer: &PeerActivity) {
    let _ = writeln!(out, "**Collaboration:** {}  ", peer.collaboration_type);
    let _ = writeln!(out, "**Group Size:** {}\n", peer.grouping_strategy.group_size);
    out.push_str("## Roles\n");
    for role in &peer.roles {
        let _ = writeln!(out, "\n### {} ({})", role.role_name, role.suitable_grades.join(", "));
        bullets(out, &role.responsibilities);
    }
}
