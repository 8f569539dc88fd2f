//! Course outline model and message decoding.
//!
//! An outline is the structured request that arrives on the message stream:
//! a course title, an optional category, and an ordered list of modules, each
//! with an optional ordered list of sections. Decoding is strict about the
//! fields the pipeline cannot work without and lenient about everything else.

use serde::Deserialize;

/// Why an inbound payload could not be turned into a `CourseOutline`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("payload is empty")]
    EmptyPayload,
    #[error("payload is not a valid outline: {0}")]
    Malformed(String),
    #[error("required field missing: {0}")]
    MissingField(&'static str),
    #[error("module {0} has no title")]
    UntitledModule(usize),
}

/// A single section heading within a module.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SectionOutline {
    pub title: String,
}

/// One module of a course, with its (possibly empty) list of sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutline {
    pub title: String,
    pub sections: Vec<SectionOutline>,
}

impl ModuleOutline {
    pub fn section_titles(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.title.as_str())
    }
}

/// A decoded course request. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOutline {
    pub title: String,
    /// Free-form category; empty when the message carried none.
    pub category: String,
    pub modules: Vec<ModuleOutline>,
}

impl CourseOutline {
    /// Decodes and validates a raw message payload.
    ///
    /// `title` and `modules` are required; `category` and per-module
    /// `sections` default to empty. Unknown fields are ignored.
    pub fn from_payload(payload: &[u8]) -> Result<Self, ValidationError> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Err(ValidationError::EmptyPayload);
        }
        let raw: RawCourse = serde_json::from_slice(payload)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        raw.validate()
    }

    pub fn module_titles(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.title.as_str())
    }
}

// Wire shapes. Everything optional so that absence is reported as a
// validation error naming the field rather than a serde message.

#[derive(Deserialize)]
struct RawCourse {
    title: Option<String>,
    category: Option<String>,
    modules: Option<Vec<RawModule>>,
}

#[derive(Deserialize)]
struct RawModule {
    title: Option<String>,
    sections: Option<Vec<SectionOutline>>,
}

impl RawCourse {
    fn validate(self) -> Result<CourseOutline, ValidationError> {
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or(ValidationError::MissingField("title"))?;
        let raw_modules = self
            .modules
            .ok_or(ValidationError::MissingField("modules"))?;

        let modules = raw_modules
            .into_iter()
            .enumerate()
            .map(|(idx, m)| {
                let title = m
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .ok_or(ValidationError::UntitledModule(idx + 1))?;
                Ok(ModuleOutline {
                    title,
                    sections: m.sections.unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(CourseOutline {
            title,
            category: self.category.unwrap_or_default(),
            modules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_outline() {
        let payload = br#"{
            "title": "Intro to Go",
            "category": "programming",
            "modules": [
                {"title": "Basics", "sections": [{"title": "Vars"}, {"title": "Loops"}]},
                {"title": "Concurrency"}
            ]
        }"#;

        let outline = CourseOutline::from_payload(payload).unwrap();
        assert_eq!(outline.title, "Intro to Go");
        assert_eq!(outline.category, "programming");
        assert_eq!(outline.modules.len(), 2);
        assert_eq!(
            outline.modules[0].section_titles().collect::<Vec<_>>(),
            vec!["Vars", "Loops"]
        );
        // A module without sections decodes to an empty list.
        assert!(outline.modules[1].sections.is_empty());
    }

    #[test]
    fn test_missing_category_defaults_to_empty() {
        let outline =
            CourseOutline::from_payload(br#"{"title": "History", "modules": []}"#).unwrap();
        assert_eq!(outline.category, "");
        assert!(outline.modules.is_empty());
    }

    #[test]
    fn test_missing_required_fields() {
        assert_eq!(
            CourseOutline::from_payload(br#"{"title": "No modules"}"#),
            Err(ValidationError::MissingField("modules"))
        );
        assert_eq!(
            CourseOutline::from_payload(br#"{"modules": []}"#),
            Err(ValidationError::MissingField("title"))
        );
        assert_eq!(
            CourseOutline::from_payload(br#"{"title": "  ", "modules": []}"#),
            Err(ValidationError::MissingField("title"))
        );
    }

    #[test]
    fn test_untitled_module_is_rejected() {
        let err = CourseOutline::from_payload(
            br#"{"title": "T", "modules": [{"title": "A"}, {"sections": []}]}"#,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::UntitledModule(2));
    }

    #[test]
    fn test_malformed_and_empty_payloads() {
        assert!(matches!(
            CourseOutline::from_payload(b"not json"),
            Err(ValidationError::Malformed(_))
        ));
        assert!(matches!(
            CourseOutline::from_payload(b"[1, 2, 3]"),
            Err(ValidationError::Malformed(_))
        ));
        assert_eq!(
            CourseOutline::from_payload(b""),
            Err(ValidationError::EmptyPayload)
        );
        assert_eq!(
            CourseOutline::from_payload(b" \n"),
            Err(ValidationError::EmptyPayload)
        );
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let outline = CourseOutline::from_payload(
            br#"{"title": "T", "level": "beginner", "modules": [{"title": "M", "hours": 3}]}"#,
        )
        .unwrap();
        assert_eq!(outline.module_titles().collect::<Vec<_>>(), vec!["M"]);
    }
}
