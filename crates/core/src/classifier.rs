//! Maps a course category onto the generation variant used for every module.

/// How module content is generated for a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationVariant {
    /// A single prose body per module.
    Standard,
    /// A prose body without code plus a separate set of code examples.
    CodeAnnotated,
}

/// Category fragments that mark a course as technical.
///
/// Matching is by substring, so `"java"` also matches `"javascript"` and
/// `"app"` matches `"applied history"`.
pub const CODE_KEYWORDS: &[&str] = &[
    "software",
    "programming",
    "coding",
    "development",
    "javascript",
    "python",
    "java",
    "c++",
    "web",
    "app",
    "database",
    "frontend",
    "backend",
    "fullstack",
    "data science",
    "machine learning",
];

/// Classifies a category string. Total and case-insensitive.
pub fn classify(category: &str) -> GenerationVariant {
    let category = category.to_lowercase();
    if CODE_KEYWORDS.iter().any(|kw| category.contains(kw)) {
        GenerationVariant::CodeAnnotated
    } else {
        GenerationVariant::Standard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_in_any_case_is_code_annotated() {
        for category in ["python", "Python", "PYTHON for beginners", "Advanced pYtHoN"] {
            assert_eq!(classify(category), GenerationVariant::CodeAnnotated, "{category}");
        }
    }

    #[test]
    fn test_non_technical_categories_are_standard() {
        assert_eq!(classify("History"), GenerationVariant::Standard);
        assert_eq!(classify("Philosophy"), GenerationVariant::Standard);
        assert_eq!(classify(""), GenerationVariant::Standard);
    }

    #[test]
    fn test_substring_matching_is_permissive() {
        assert_eq!(classify("Biosoftware"), GenerationVariant::CodeAnnotated);
        assert_eq!(classify("Cobweb weaving"), GenerationVariant::CodeAnnotated);
        assert_eq!(classify("Modern C++"), GenerationVariant::CodeAnnotated);
        assert_eq!(classify("Machine Learning"), GenerationVariant::CodeAnnotated);
    }
}
