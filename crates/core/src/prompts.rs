//! Prompt templates for the generation calls.
//!
//! Templates are plain text with `{name}` placeholders. The built-in set is
//! compiled in; a directory of `{template_id}.md` files may override any of
//! them at startup.

use crate::text_generation::{GenerationError, TemplateId, TemplateVars};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PromptTemplates {
    templates: HashMap<TemplateId, String>,
}

impl PromptTemplates {
    /// The templates shipped with the crate, one per `TemplateId`.
    pub fn builtin() -> Self {
        let templates = HashMap::from([
            (
                TemplateId::CourseDescription,
                include_str!("../prompts/course_description.md").to_string(),
            ),
            (
                TemplateId::ModuleBody,
                include_str!("../prompts/module_body.md").to_string(),
            ),
            (
                TemplateId::ModuleBodyNoCode,
                include_str!("../prompts/module_body_no_code.md").to_string(),
            ),
            (
                TemplateId::ModuleCodeExamples,
                include_str!("../prompts/module_code_examples.md").to_string(),
            ),
        ]);
        Self { templates }
    }

    /// Replaces built-in templates with `.md` files found in `dir`.
    ///
    /// The file stem selects the template (`module_body.md` overrides
    /// `module_body`). Files whose stem is not a known template are ignored.
    pub fn with_overrides_from(mut self, dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read prompts directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("md") {
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?;
            match TemplateId::from_name(stem) {
                Some(id) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    info!(template = %id, path = %path.display(), "Loaded prompt override");
                    self.templates.insert(id, content);
                }
                None => warn!(path = %path.display(), "Ignoring unknown prompt file"),
            }
        }
        Ok(self)
    }

    pub fn get(&self, id: TemplateId) -> Option<&str> {
        self.templates.get(&id).map(String::as_str)
    }

    /// Substitutes every `{name}` placeholder in the template.
    ///
    /// A placeholder with no matching variable is a permanent failure, since
    /// re-issuing the call would render the same incomplete prompt.
    pub fn render(&self, id: TemplateId, vars: &TemplateVars) -> Result<String, GenerationError> {
        let template = self
            .get(id)
            .ok_or_else(|| GenerationError::Permanent(format!("missing prompt template '{id}'")))?;

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_placeholder(&after[..close]) => {
                    let name = &after[..close];
                    let value = vars.get(name).ok_or_else(|| {
                        GenerationError::Permanent(format!(
                            "template '{id}' needs variable '{name}'"
                        ))
                    })?;
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn is_placeholder(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn vars(pairs: &[(&str, &str)]) -> TemplateVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_builtin_covers_every_template() {
        let prompts = PromptTemplates::builtin();
        for id in TemplateId::ALL {
            assert!(prompts.get(id).is_some(), "missing {id}");
        }
    }

    #[test]
    fn test_render_substitutes_variables() {
        let prompts = PromptTemplates::builtin();
        let rendered = prompts
            .render(
                TemplateId::ModuleBody,
                &vars(&[("title", "Basics"), ("sections", "Vars, Loops")]),
            )
            .unwrap();
        assert!(rendered.contains("a module titled \"Basics\""));
        assert!(rendered.contains("sections: Vars, Loops."));
        assert!(!rendered.contains("{title}"));
    }

    #[test]
    fn test_render_missing_variable_is_permanent() {
        let prompts = PromptTemplates::builtin();
        let err = prompts
            .render(TemplateId::CourseDescription, &vars(&[("title", "Go")]))
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("modules"));
    }

    #[test]
    fn test_non_placeholder_braces_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("module_code_examples.md"),
            "Code for {title}: fn main() { } and {Not A Var}",
        )
        .unwrap();

        let prompts = PromptTemplates::builtin()
            .with_overrides_from(dir.path())
            .unwrap();
        let rendered = prompts
            .render(TemplateId::ModuleCodeExamples, &vars(&[("title", "Basics")]))
            .unwrap();
        assert_eq!(rendered, "Code for Basics: fn main() { } and {Not A Var}");
    }

    #[test]
    fn test_overrides_ignore_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("module_body.md"), "Write about {title}.").unwrap();
        fs::write(dir.path().join("system_prompt.md"), "ignored").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let builtin = PromptTemplates::builtin();
        let prompts = builtin.clone().with_overrides_from(dir.path()).unwrap();

        assert_eq!(prompts.get(TemplateId::ModuleBody), Some("Write about {title}."));
        assert_eq!(
            prompts.get(TemplateId::CourseDescription),
            builtin.get(TemplateId::CourseDescription)
        );
    }

    #[test]
    fn test_overrides_from_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(PromptTemplates::builtin().with_overrides_from(&missing).is_err());
    }
}
