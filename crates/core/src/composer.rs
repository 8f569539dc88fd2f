//! Markdown assembly for generated courses.
//!
//! Pure string functions: no I/O, no failure modes. Generated fragments are
//! trimmed before they are inserted, titles are used verbatim.

use crate::artifact::{CourseArtifact, ModuleArtifact};
use crate::outline::ModuleOutline;

/// Heading under which code examples are placed in a code-annotated module.
pub const CODE_EXAMPLES_HEADING: &str = "### Code Examples";

/// In-page link target for a heading title.
///
/// Lowercases and replaces spaces with hyphens, nothing else. Titles with
/// punctuation or titles that collide after slugging produce ambiguous
/// anchors; that is accepted rather than silently rewritten.
pub fn anchor(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}

/// Numbered table of contents, one line per module and one indented line per
/// section beneath it.
pub fn table_of_contents(modules: &[ModuleOutline]) -> String {
    let mut lines = Vec::new();
    for (i, module) in modules.iter().enumerate() {
        let i = i + 1;
        lines.push(format!("{i}. [{}](#{})", module.title, anchor(&module.title)));
        for (j, section) in module.sections.iter().enumerate() {
            let j = j + 1;
            lines.push(format!(
                "   {i}.{j}. [{}](#{})",
                section.title,
                anchor(&section.title)
            ));
        }
    }
    lines.join("\n")
}

pub fn render_module(module: &ModuleArtifact) -> String {
    match &module.code_examples {
        None => format!("## {}\n\n{}", module.title, module.body.trim()),
        Some(code) => format!(
            "## {}\n\n{}\n\n{CODE_EXAMPLES_HEADING}\n\n{}",
            module.title,
            module.body.trim(),
            code.trim()
        ),
    }
}

pub fn render_course(course: &CourseArtifact) -> String {
    let modules = course
        .modules
        .iter()
        .map(render_module)
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "# {}\n\n{}\n\n## Table of Contents\n{}\n\n{}",
        course.title,
        course.description.trim(),
        course.table_of_contents,
        modules
    )
}
