//! Generated course documents.

use crate::classifier::GenerationVariant;
use crate::composer;

/// Generated content for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleArtifact {
    pub title: String,
    pub body: String,
    /// Present iff the course was generated with `GenerationVariant::CodeAnnotated`.
    pub code_examples: Option<String>,
}

impl ModuleArtifact {
    pub fn variant(&self) -> GenerationVariant {
        match self.code_examples {
            Some(_) => GenerationVariant::CodeAnnotated,
            None => GenerationVariant::Standard,
        }
    }
}

/// A fully generated course, ready to render and persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseArtifact {
    pub title: String,
    pub description: String,
    pub table_of_contents: String,
    pub modules: Vec<ModuleArtifact>,
}

impl CourseArtifact {
    /// Renders the whole document as markdown.
    pub fn to_markdown(&self) -> String {
        composer::render_course(self)
    }
}
