use serde::Serialize;
use std::collections::BTreeMap;

use super::BindError;
use super::templates::PromptTemplate;
use crate::agents::AgentKind;
use crate::context::RequestContext;

/// A fully rendered prompt, ready for the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundPrompt {
    pub kind: AgentKind,
    pub text: String,
}

/// Appended to a prompt whose output held no JSON.
pub const REPAIR_REQUEST: &str = "Your previous output was not valid JSON. Return ONLY valid JSON now, no explanations.";

impl BoundPrompt {
    /// The same prompt with a request to answer in JSON only.
    pub fn repair(&self) -> Self {
        Self { kind: self.kind, text: format!("{}\n\n{REPAIR_REQUEST}", self.text) }
    }
}

/// Renders `template` against `context`.
///
/// Each placeholder resolves, in order, from a context field, a classroom
/// parameter, then a template default. Parameters cannot shadow a context
/// field; [`RequestContextBuilder::build`](crate::context::RequestContextBuilder::build)
/// rejects them. Classroom parameters no placeholder
/// consumed are appended as `Additional Parameters: <json>` in key order,
/// and source text is appended when the template does not place it.
///
/// # Errors
///
/// Returns [`BindError::MissingField`] for a placeholder nothing resolves.
pub fn bind(template: &PromptTemplate, context: &RequestContext) -> Result<BoundPrompt, BindError> {
    let placeholders = template.placeholders();
    let mut values = BTreeMap::new();
    for name in &placeholders {
        let value = context
            .field(name)
            .or_else(|| context.param(name).map(str::to_string))
            .or_else(|| template.default_for(name).map(|d| d.resolve(context)))
            .ok_or_else(|| BindError::MissingField {
                kind: template.kind(),
                field: name.clone(),
            })?;
        values.insert(name.clone(), value);
    }

    let (system, body) = template.render(&values);
    let mut text = if system.trim().is_empty() { body } else { format!("{system}\n\n{body}") };

    let additional: BTreeMap<&str, &str> = context
        .classroom()
        .iter()
        .filter(|(key, _)| !values.contains_key(key.as_str()))
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    if !additional.is_empty() {
        let json = serde_json::to_string(&additional).map_err(|e| BindError::Render(e.to_string()))?;
        text.push_str("\n\nAdditional Parameters: ");
        text.push_str(&json);
    }

    if let Some(source) = context.source_text().filter(|_| !values.contains_key("source_text")) {
        text.push_str("\n\nSOURCE TEXT:\n\"\"\"\n");
        text.push_str(source);
        text.push_str("\n\"\"\"");
    }

    Ok(BoundPrompt { kind: template.kind(), text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GradeSet, params};
    use crate::prompts::TemplateRegistry;

    fn context() -> RequestContext {
        RequestContext::builder(GradeSet::parse_list("1,2").unwrap(), "Mathematics", "Addition")
            .class_size(18)
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolution_order() {
        let template = PromptTemplate::new(AgentKind::WorksheetGenerator, "Sys", "{{grades}}|{{class_size}}|{{tone}}")
            .with_default(params::CLASS_SIZE, "20")
            .with_default("tone", "friendly");
        let bound = bind(&template, &context()).unwrap();
        assert_eq!(bound.text, "Sys\n\nGrade 1, Grade 2|18|friendly");
        assert_eq!(bound.kind, AgentKind::WorksheetGenerator);
    }

    #[test]
    fn test_missing_field() {
        let template = PromptTemplate::new(AgentKind::AssessmentGenerator, "", "{{rubric_style}}");
        let err = bind(&template, &context()).unwrap_err();
        assert_eq!(
            err,
            BindError::MissingField { kind: AgentKind::AssessmentGenerator, field: "rubric_style".into() }
        );
    }

    #[test]
    fn test_unconsumed_params_are_appended_in_key_order() {
        let ctx = RequestContext::builder(GradeSet::parse_list("3").unwrap(), "Science", "Plants")
            .param("zeta", "last")
            .param("materials", "seeds")
            .build()
            .unwrap();
        let template = PromptTemplate::new(AgentKind::ActivityGenerator, "", "{{topic}}");
        let bound = bind(&template, &ctx).unwrap();
        assert_eq!(bound.text, r#"Plants

Additional Parameters: {"materials":"seeds","zeta":"last"}"#);
    }

    #[test]
    fn test_source_text_appended_once() {
        let ctx = RequestContext::builder(GradeSet::parse_list("1").unwrap(), "English", "Two Little Hands")
            .source_text("Two little hands go clap clap clap.")
            .build()
            .unwrap();
        let appended = bind(&PromptTemplate::new(AgentKind::CoursePlanner, "", "{{topic}}"), &ctx).unwrap();
        assert!(appended.text.ends_with("SOURCE TEXT:\n\"\"\"\nTwo little hands go clap clap clap.\n\"\"\""));

        let placed =
            bind(&PromptTemplate::new(AgentKind::CoursePlanner, "", "Text: {{source_text}}"), &ctx).unwrap();
        assert_eq!(placed.text, "Text: Two little hands go clap clap clap.");
    }

    #[test]
    fn test_builtin_templates_bind_with_minimal_context() {
        let registry = TemplateRegistry::builtin();
        let ctx = context();
        for kind in AgentKind::ALL {
            let bound = bind(registry.lookup(kind), &ctx).unwrap();
            assert!(bound.text.contains("Grade 1, Grade 2"), "{kind}");
            assert!(bound.text.contains("Addition"));
            assert!(!bound.text.contains("{{"), "{kind} left a placeholder unbound");
        }
    }

    #[test]
    fn test_derived_default_objectives() {
        let registry = TemplateRegistry::builtin();
        let bound = bind(registry.lookup(AgentKind::WorksheetGenerator), &context()).unwrap();
        assert!(bound.text.contains("Practice Addition skills for Grade 1; Practice Addition skills for Grade 2"));
        assert!(bound.text.contains("Time Available: 30 minutes"));
    }

    #[test]
    fn test_binding_is_idempotent() {
        let registry = TemplateRegistry::builtin();
        let ctx = context();
        for kind in AgentKind::ALL {
            let first = bind(registry.lookup(kind), &ctx).unwrap();
            let second = bind(registry.lookup(kind), &ctx).unwrap();
            assert_eq!(first.text.as_bytes(), second.text.as_bytes());
        }
    }

    #[test]
    fn test_repair_appends_json_request() {
        let prompt = bind(TemplateRegistry::builtin().lookup(AgentKind::WorksheetGenerator), &context()).unwrap();
        let repaired = prompt.repair();
        assert_eq!(repaired.kind, prompt.kind);
        assert!(repaired.text.starts_with(&prompt.text));
        assert!(repaired.text.ends_with(REPAIR_REQUEST));
    }
}
