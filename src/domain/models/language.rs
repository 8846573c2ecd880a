use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
    CSharp,
    Css,
    Dockerfile,
    Go,
    Html,
    Java,
    JavaScript,
    Json,
    Kotlin,
    Makefile,
    Markdown,
    Php,
    Python,
    Ruby,
    Rust,
    Shell,
    Swift,
    Toml,
    TypeScript,
    Yaml,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "c" | "h" => Language::C,
            "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => Language::Cpp,
            "cs" => Language::CSharp,
            "css" => Language::Css,
            "go" => Language::Go,
            "html" | "htm" => Language::Html,
            "java" => Language::Java,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "json" => Language::Json,
            "kt" | "kts" => Language::Kotlin,
            "md" | "markdown" => Language::Markdown,
            "php" => Language::Php,
            "py" => Language::Python,
            "rb" => Language::Ruby,
            "rs" => Language::Rust,
            "sh" | "bash" | "zsh" => Language::Shell,
            "swift" => Language::Swift,
            "toml" => Language::Toml,
            "ts" | "tsx" => Language::TypeScript,
            "yml" | "yaml" => Language::Yaml,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        match path.file_name().and_then(|n| n.to_str()) {
            Some("Dockerfile") => return Language::Dockerfile,
            Some("Makefile") | Some("GNUmakefile") => return Language::Makefile,
            _ => {}
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Css => "css",
            Language::Dockerfile => "dockerfile",
            Language::Go => "go",
            Language::Html => "html",
            Language::Java => "java",
            Language::JavaScript => "javascript",
            Language::Json => "json",
            Language::Kotlin => "kotlin",
            Language::Makefile => "makefile",
            Language::Markdown => "markdown",
            Language::Php => "php",
            Language::Python => "python",
            Language::Ruby => "ruby",
            Language::Rust => "rust",
            Language::Shell => "shell",
            Language::Swift => "swift",
            Language::Toml => "toml",
            Language::TypeScript => "typescript",
            Language::Yaml => "yaml",
            Language::Unknown => "unknown",
        }
    }

    /// Human-facing name reported by `Commit.languages`.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::C => "C",
            Language::Cpp => "C++",
            Language::CSharp => "C#",
            Language::Css => "CSS",
            Language::Dockerfile => "Dockerfile",
            Language::Go => "Go",
            Language::Html => "HTML",
            Language::Java => "Java",
            Language::JavaScript => "JavaScript",
            Language::Json => "JSON",
            Language::Kotlin => "Kotlin",
            Language::Makefile => "Makefile",
            Language::Markdown => "Markdown",
            Language::Php => "PHP",
            Language::Python => "Python",
            Language::Ruby => "Ruby",
            Language::Rust => "Rust",
            Language::Shell => "Shell",
            Language::Swift => "Swift",
            Language::Toml => "TOML",
            Language::TypeScript => "TypeScript",
            Language::Yaml => "YAML",
            Language::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sorted, de-duplicated display names of the languages among `paths`.
pub fn detect_languages<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut found: Vec<Language> = paths
        .into_iter()
        .map(|p| Language::from_path(Path::new(p)))
        .filter(|l| *l != Language::Unknown)
        .collect();
    found.sort_by_key(|l| l.display_name());
    found.dedup();
    found.iter().map(|l| l.display_name().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("js"), Language::JavaScript);
        assert_eq!(Language::from_extension("ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("go"), Language::Go);
        assert_eq!(Language::from_extension("txt"), Language::Unknown);
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(
            Language::from_path(Path::new("src/main.rs")),
            Language::Rust
        );
        assert_eq!(
            Language::from_path(Path::new("script.py")),
            Language::Python
        );
        assert_eq!(
            Language::from_path(Path::new("build/Dockerfile")),
            Language::Dockerfile
        );
        assert_eq!(Language::from_path(Path::new("LICENSE")), Language::Unknown);
    }

    #[test]
    fn test_detect_languages_sorted_and_unique() {
        let langs = detect_languages(vec!["b.go", "a.rs", "c.go", "README", "x.ts"]);
        assert_eq!(langs, vec!["Go", "Rust", "TypeScript"]);
    }
}
