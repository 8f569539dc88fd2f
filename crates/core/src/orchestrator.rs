//! Generation orchestrator.
//!
//! Drives the text generator through the per-course protocol: one course
//! description, a locally built table of contents, then module content in
//! outline order. Any failed call aborts the whole course.

use crate::artifact::{CourseArtifact, ModuleArtifact};
use crate::classifier::{GenerationVariant, classify};
use crate::composer;
use crate::outline::{CourseOutline, ModuleOutline};
use crate::text_generation::{GenerationError, TemplateId, TemplateVars, TextGenerator};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Passed in place of the section list for a module that declares none.
pub const NO_SECTIONS: &str = "No specific sections";

/// Generation for a course was abandoned.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("generation failed for {}: {source}", failure_scope(.module))]
pub struct GenerationFailure {
    /// The module being generated, or `None` for the course description.
    pub module: Option<String>,
    #[source]
    pub source: GenerationError,
}

fn failure_scope(module: &Option<String>) -> String {
    match module {
        Some(module) => format!("module '{module}'"),
        None => "course description".to_string(),
    }
}

pub struct Orchestrator {
    generator: Arc<dyn TextGenerator>,
}

impl Orchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Generates every part of the course and assembles the artifact.
    ///
    /// The variant is decided once from the course category and applied to
    /// all modules.
    #[instrument(skip_all, fields(course = %outline.title, modules = outline.modules.len()))]
    pub async fn generate(&self, outline: &CourseOutline) -> Result<CourseArtifact, GenerationFailure> {
        let variant = classify(&outline.category);
        info!(category = %outline.category, ?variant, "Generating course content");

        let description = self
            .generator
            .render(TemplateId::CourseDescription, description_vars(outline))
            .await
            .map_err(|source| GenerationFailure {
                module: None,
                source,
            })?;

        let table_of_contents = composer::table_of_contents(&outline.modules);

        let mut modules = Vec::with_capacity(outline.modules.len());
        for module in &outline.modules {
            let artifact = self
                .generate_module(module, variant)
                .await
                .map_err(|source| GenerationFailure {
                    module: Some(module.title.clone()),
                    source,
                })?;
            debug!(module = %module.title, "Module generated");
            modules.push(artifact);
        }

        Ok(CourseArtifact {
            title: outline.title.clone(),
            description: description.trim().to_string(),
            table_of_contents,
            modules,
        })
    }

    async fn generate_module(
        &self,
        module: &ModuleOutline,
        variant: GenerationVariant,
    ) -> Result<ModuleArtifact, GenerationError> {
        let vars = module_vars(module);
        match variant {
            GenerationVariant::Standard => {
                let body = self.generator.render(TemplateId::ModuleBody, vars).await?;
                Ok(ModuleArtifact {
                    title: module.title.clone(),
                    body: body.trim().to_string(),
                    code_examples: None,
                })
            }
            GenerationVariant::CodeAnnotated => {
                // Independent calls; the module is complete only once both return.
                let (body, code) = tokio::try_join!(
                    self.generator
                        .render(TemplateId::ModuleBodyNoCode, vars.clone()),
                    self.generator.render(TemplateId::ModuleCodeExamples, vars),
                )?;
                Ok(ModuleArtifact {
                    title: module.title.clone(),
                    body: body.trim().to_string(),
                    code_examples: Some(code.trim().to_string()),
                })
            }
        }
    }
}

fn description_vars(outline: &CourseOutline) -> TemplateVars {
    TemplateVars::from([
        ("title".to_string(), outline.title.clone()),
        (
            "modules".to_string(),
            outline.module_titles().collect::<Vec<_>>().join(", "),
        ),
    ])
}

fn module_vars(module: &ModuleOutline) -> TemplateVars {
    let sections = if module.sections.is_empty() {
        NO_SECTIONS.to_string()
    } else {
        module.section_titles().collect::<Vec<_>>().join(", ")
    };
    TemplateVars::from([
        ("title".to_string(), module.title.clone()),
        ("sections".to_string(), sections),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::SectionOutline;
    use crate::text_generation::MockTextGenerator;

    fn outline(category: &str, modules: Vec<(&str, Vec<&str>)>) -> CourseOutline {
        CourseOutline {
            title: "Intro to Go".to_string(),
            category: category.to_string(),
            modules: modules
                .into_iter()
                .map(|(title, sections)| ModuleOutline {
                    title: title.to_string(),
                    sections: sections
                        .into_iter()
                        .map(|s| SectionOutline {
                            title: s.to_string(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Echoes the template id and module title back, padded with whitespace.
    fn echo(template: TemplateId, vars: TemplateVars) -> Result<String, GenerationError> {
        Ok(format!("\n  {} for {}  \n", template, vars["title"]))
    }

    #[tokio::test]
    async fn test_code_annotated_course_scenario() {
        let mut mock = MockTextGenerator::new();
        mock.expect_render()
            .withf(|t, v| *t == TemplateId::CourseDescription && v["modules"] == "Basics")
            .times(1)
            .returning(echo);
        mock.expect_render()
            .withf(|t, v| *t == TemplateId::ModuleBodyNoCode && v["sections"] == "Vars, Loops")
            .times(1)
            .returning(echo);
        mock.expect_render()
            .withf(|t, v| *t == TemplateId::ModuleCodeExamples && v["sections"] == "Vars, Loops")
            .times(1)
            .returning(echo);

        let orchestrator = Orchestrator::new(Arc::new(mock));
        let course = orchestrator
            .generate(&outline("programming", vec![("Basics", vec!["Vars", "Loops"])]))
            .await
            .unwrap();

        assert_eq!(course.description, "course_description for Intro to Go");
        assert_eq!(
            course.table_of_contents,
            "1. [Basics](#basics)\n   1.1. [Vars](#vars)\n   1.2. [Loops](#loops)"
        );
        assert_eq!(course.modules.len(), 1);
        assert_eq!(course.modules[0].body, "module_body_no_code for Basics");
        assert_eq!(
            course.modules[0].code_examples.as_deref(),
            Some("module_code_examples for Basics")
        );
        assert_eq!(course.modules[0].variant(), GenerationVariant::CodeAnnotated);
        assert!(course.to_markdown().contains("### Code Examples"));
    }

    #[tokio::test]
    async fn test_standard_course_uses_single_call_per_module() {
        let mut mock = MockTextGenerator::new();
        mock.expect_render()
            .withf(|t, _| *t == TemplateId::CourseDescription)
            .times(1)
            .returning(echo);
        mock.expect_render()
            .withf(|t, _| *t == TemplateId::ModuleBody)
            .times(2)
            .returning(echo);

        let orchestrator = Orchestrator::new(Arc::new(mock));
        let course = orchestrator
            .generate(&outline("History", vec![("Antiquity", vec!["Rome"]), ("Middle Ages", vec![])]))
            .await
            .unwrap();

        let titles: Vec<&str> = course.modules.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Antiquity", "Middle Ages"]);
        assert!(
            course
                .modules
                .iter()
                .all(|m| m.variant() == GenerationVariant::Standard)
        );
        assert!(!course.to_markdown().contains("### Code Examples"));
    }

    #[tokio::test]
    async fn test_module_without_sections_uses_sentinel() {
        let mut mock = MockTextGenerator::new();
        mock.expect_render()
            .withf(|t, _| *t == TemplateId::CourseDescription)
            .returning(echo);
        mock.expect_render()
            .withf(|t, v| *t == TemplateId::ModuleBody && v["sections"] == NO_SECTIONS)
            .times(1)
            .returning(echo);

        let orchestrator = Orchestrator::new(Arc::new(mock));
        let course = orchestrator
            .generate(&outline("", vec![("Overview", vec![])]))
            .await
            .unwrap();
        assert_eq!(course.modules[0].body, "module_body for Overview");
        assert_eq!(course.table_of_contents, "1. [Overview](#overview)");
    }

    #[tokio::test]
    async fn test_failure_on_second_module_aborts_course() {
        let mut mock = MockTextGenerator::new();
        mock.expect_render()
            .withf(|t, _| *t == TemplateId::CourseDescription)
            .returning(echo);
        mock.expect_render()
            .withf(|t, v| *t == TemplateId::ModuleBody && v["title"] == "One")
            .times(1)
            .returning(echo);
        mock.expect_render()
            .withf(|t, v| *t == TemplateId::ModuleBody && v["title"] == "Two")
            .times(1)
            .returning(|_, _| Err(GenerationError::Permanent("quota exceeded".to_string())));
        // The third module must never be requested.
        mock.expect_render()
            .withf(|_, v| v["title"] == "Three")
            .never();

        let orchestrator = Orchestrator::new(Arc::new(mock));
        let err = orchestrator
            .generate(&outline("History", vec![("One", vec![]), ("Two", vec![]), ("Three", vec![])]))
            .await
            .unwrap_err();

        assert_eq!(err.module.as_deref(), Some("Two"));
        assert_eq!(
            err.source,
            GenerationError::Permanent("quota exceeded".to_string())
        );
        assert!(err.to_string().contains("module 'Two'"));
    }

    #[tokio::test]
    async fn test_code_examples_failure_fails_module() {
        let mut mock = MockTextGenerator::new();
        mock.expect_render()
            .withf(|t, _| *t == TemplateId::CourseDescription)
            .returning(echo);
        mock.expect_render()
            .withf(|t, _| *t == TemplateId::ModuleBodyNoCode)
            .returning(echo);
        mock.expect_render()
            .withf(|t, _| *t == TemplateId::ModuleCodeExamples)
            .returning(|_, _| Err(GenerationError::Transient("timed out".to_string())));

        let orchestrator = Orchestrator::new(Arc::new(mock));
        let err = orchestrator
            .generate(&outline("Python", vec![("Basics", vec![])]))
            .await
            .unwrap_err();
        assert_eq!(err.module.as_deref(), Some("Basics"));
        assert!(err.source.is_transient());
    }

    #[tokio::test]
    async fn test_description_failure_has_no_module() {
        let mut mock = MockTextGenerator::new();
        mock.expect_render()
            .withf(|t, _| *t == TemplateId::CourseDescription)
            .times(1)
            .returning(|_, _| Err(GenerationError::Permanent("bad request".to_string())));
        mock.expect_render()
            .withf(|t, _| *t != TemplateId::CourseDescription)
            .never();

        let orchestrator = Orchestrator::new(Arc::new(mock));
        let err = orchestrator
            .generate(&outline("History", vec![("One", vec![])]))
            .await
            .unwrap_err();
        assert_eq!(err.module, None);
        assert!(err.to_string().contains("course description"));
    }
}
