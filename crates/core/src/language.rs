//! Programming-language inference used to route code to the editor's
//! syntax highlighter. Both lookups are advisory: a wrong answer only
//! changes how code is displayed.

/// Infers the language of a code skeleton returned by the tutor.
pub trait LanguageDetector: Send + Sync {
    /// Returns the detected language, or `fallback` when nothing matches.
    fn detect(&self, skeleton: &str, fallback: &str) -> String;
}

/// Ordered substring heuristics; the first matching rule wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicDetector;

const RULES: &[(&str, &[&str])] = &[
    ("python", &["def ", "import "]),
    ("javascript", &["function ", "const ", "let "]),
    ("java", &["public class", "public static void"]),
    ("cpp", &["#include", "int main"]),
];

impl LanguageDetector for HeuristicDetector {
    fn detect(&self, skeleton: &str, fallback: &str) -> String {
        RULES
            .iter()
            .find(|(_, markers)| markers.iter().any(|m| skeleton.contains(m)))
            .map(|(lang, _)| (*lang).to_string())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// A language resolved from an uploaded file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLanguage {
    pub language: &'static str,
    pub display_name: &'static str,
}

const UNKNOWN: FileLanguage = FileLanguage {
    language: "text",
    display_name: "Unknown",
};

/// Maps a file name to a language by its extension (case-insensitive).
pub fn language_for_file(file_name: &str) -> FileLanguage {
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return UNKNOWN;
    };
    let (language, display_name) = match ext.to_ascii_lowercase().as_str() {
        "py" => ("python", "Python"),
        "js" | "jsx" => ("javascript", "JavaScript"),
        "ts" | "tsx" => ("typescript", "TypeScript"),
        "java" => ("java", "Java"),
        "cpp" | "cc" | "cxx" | "h" | "hpp" => ("cpp", "C++"),
        "c" => ("c", "C"),
        "go" => ("go", "Go"),
        "rs" => ("rust", "Rust"),
        "rb" => ("ruby", "Ruby"),
        "php" => ("php", "PHP"),
        "swift" => ("swift", "Swift"),
        "kt" | "kts" => ("kotlin", "Kotlin"),
        "cs" => ("csharp", "C#"),
        _ => return UNKNOWN,
    };
    FileLanguage {
        language,
        display_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_skeleton() {
        let skeleton = "def binary_search(arr, target):\n    # TODO: set low and high\n    pass";
        assert_eq!(HeuristicDetector.detect(skeleton, "javascript"), "python");
    }

    #[test]
    fn test_python_wins_over_later_rules() {
        // Contains both a Python import and a C include; first rule wins.
        let skeleton = "import random\n// #include <vector>";
        assert_eq!(HeuristicDetector.detect(skeleton, "cpp"), "python");
    }

    #[test]
    fn test_javascript_java_cpp() {
        assert_eq!(
            HeuristicDetector.detect("const search = (arr) => {}", "python"),
            "javascript"
        );
        assert_eq!(
            HeuristicDetector.detect("public class Solution {\n}", "python"),
            "java"
        );
        assert_eq!(
            HeuristicDetector.detect("#include <iostream>\nint main() {}", "python"),
            "cpp"
        );
    }

    #[test]
    fn test_falls_back_to_active_language() {
        assert_eq!(HeuristicDetector.detect("fn main() {}", "rust"), "rust");
        assert_eq!(HeuristicDetector.detect("", "python"), "python");
    }

    #[test]
    fn test_language_for_file() {
        assert_eq!(language_for_file("solver.PY").language, "python");
        assert_eq!(language_for_file("App.tsx").display_name, "TypeScript");
        assert_eq!(language_for_file("vec.hpp").language, "cpp");
        assert_eq!(language_for_file("lib.rs").language, "rust");
    }

    #[test]
    fn test_language_for_unknown_file() {
        assert_eq!(language_for_file("Makefile"), UNKNOWN);
        assert_eq!(language_for_file("notes."), UNKNOWN);
        assert_eq!(language_for_file("data.csv").language, "text");
    }
}
