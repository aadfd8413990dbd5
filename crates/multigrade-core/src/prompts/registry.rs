use std::path::PathBuf;
use tracing::{debug, info};

use super::RegistryError;
use super::builtin;
use super::templates::PromptTemplate;
use crate::agents::AgentKind;
use crate::artifacts::ArtifactSchema;

/// One prompt template per agent kind, fixed after construction.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: [PromptTemplate; AgentKind::ALL.len()],
}

impl TemplateRegistry {
    /// Registry with the shipped template for every kind.
    pub fn builtin() -> Self {
        Self { templates: AgentKind::ALL.map(builtin::template_for) }
    }

    /// Replaces the template for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::KindMismatch`] if the template was built for
    /// another kind and [`RegistryError::MissingPlaceholder`] if it omits a
    /// placeholder the kind's schema depends on.
    pub fn with_override(
        mut self,
        kind: AgentKind,
        template: PromptTemplate,
    ) -> Result<Self, RegistryError> {
        if template.kind() != kind {
            return Err(RegistryError::KindMismatch { expected: kind, found: template.kind() });
        }
        let placeholders = template.placeholders();
        for required in ArtifactSchema::required_placeholders(kind) {
            if !placeholders.iter().any(|p| p == required) {
                return Err(RegistryError::MissingPlaceholder {
                    kind,
                    placeholder: (*required).to_string(),
                });
            }
        }
        debug!(agent_kind = %kind, "Overriding prompt template");
        self.templates[kind.index()] = template;
        Ok(self)
    }

    /// Applies TOML template files over the current templates. A file's
    /// `[defaults]` table is layered over the defaults of the template it
    /// replaces.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Load`] for an unreadable file and the
    /// [`with_override`](Self::with_override) errors for an invalid one.
    pub fn with_template_files(
        self,
        files: &[(AgentKind, PathBuf)],
    ) -> Result<Self, RegistryError> {
        files.iter().try_fold(self, |registry, (kind, path)| {
            let template = PromptTemplate::load(*kind, path)?.inherit_defaults(registry.lookup(*kind));
            info!(agent_kind = %kind, path = %path.display(), "Loaded prompt template override");
            registry.with_override(*kind, template)
        })
    }

    /// Template for `kind`.
    pub fn lookup(&self, kind: AgentKind) -> &PromptTemplate {
        &self.templates[kind.index()]
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_kind_with_required_placeholders() {
        let registry = TemplateRegistry::builtin();
        for kind in AgentKind::ALL {
            let template = registry.lookup(kind);
            assert_eq!(template.kind(), kind);
            for required in ArtifactSchema::required_placeholders(kind) {
                assert!(template.has_placeholder(required), "{kind} template lacks {{{{{required}}}}}");
            }
        }
    }

    #[test]
    fn test_override_replaces_template() {
        let custom = PromptTemplate::new(
            AgentKind::AssessmentGenerator,
            "Examiner",
            "Quiz {{grades}} on {{topic}} in {{subject}}",
        );
        let registry = TemplateRegistry::builtin().with_override(AgentKind::AssessmentGenerator, custom).unwrap();
        assert_eq!(registry.lookup(AgentKind::AssessmentGenerator).system(), "Examiner");
    }

    #[test]
    fn test_override_missing_placeholder_is_rejected() {
        let custom = PromptTemplate::new(AgentKind::VisualAidGenerator, "", "Poster for {{grades}} on {{topic}} in {{subject}}");
        let err = TemplateRegistry::builtin()
            .with_override(AgentKind::VisualAidGenerator, custom)
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::MissingPlaceholder { kind: AgentKind::VisualAidGenerator, ref placeholder }
                if placeholder == "aid_type"
        ));
    }

    #[test]
    fn test_template_file_keeps_builtin_defaults() {
        use crate::context::{GradeSet, RequestContext};
        use crate::prompts::bind;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("planner.toml");
        std::fs::write(
            &path,
            "body = \"Plan {{duration_minutes}} minutes of {{topic}} ({{subject}}) for {{grades}}\"\n",
        )
        .unwrap();
        let registry = TemplateRegistry::builtin()
            .with_template_files(&[(AgentKind::CoursePlanner, path)])
            .unwrap();
        let ctx = RequestContext::builder(GradeSet::parse_list("2,3").unwrap(), "Maths", "Shapes").build().unwrap();
        let prompt = bind(registry.lookup(AgentKind::CoursePlanner), &ctx).unwrap();
        assert_eq!(prompt.text, "Plan 45 minutes of Shapes (Maths) for Grade 2, Grade 3");
    }

    #[test]
    fn test_template_file_missing_is_load_error() {
        let err = TemplateRegistry::builtin()
            .with_template_files(&[(AgentKind::CoursePlanner, PathBuf::from("/nonexistent/t.toml"))])
            .unwrap_err();
        assert!(matches!(err, RegistryError::Load { .. }));
    }

    #[test]
    fn test_override_kind_mismatch() {
        let custom = PromptTemplate::new(AgentKind::CoursePlanner, "", "{{grades}}");
        let err = TemplateRegistry::builtin()
            .with_override(AgentKind::WorksheetGenerator, custom)
            .unwrap_err();
        assert!(matches!(err, RegistryError::KindMismatch { .. }));
    }
}
