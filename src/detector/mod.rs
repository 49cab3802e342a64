//! Technology Detection
//!
//! Pure, deterministic mapping from changed-file paths to technology tags.
//! Detection looks only at extensions and well-known filenames; unknown
//! extensions are silently ignored. Order of the input list never affects
//! the result.

use std::collections::HashMap;

use crate::types::TechnologySet;

/// Built-in extension table: lowercase extension -> technology name.
const EXTENSIONS: &[(&str, &str)] = &[
    ("rs", "Rust"),
    ("go", "Go"),
    ("py", "Python"),
    ("js", "JavaScript"),
    ("jsx", "JavaScript"),
    ("mjs", "JavaScript"),
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("java", "Java"),
    ("kt", "Kotlin"),
    ("kts", "Kotlin"),
    ("rb", "Ruby"),
    ("php", "PHP"),
    ("c", "C"),
    ("h", "C"),
    ("cpp", "C++"),
    ("cc", "C++"),
    ("hpp", "C++"),
    ("cs", "C#"),
    ("swift", "Swift"),
    ("scala", "Scala"),
    ("ex", "Elixir"),
    ("exs", "Elixir"),
    ("erl", "Erlang"),
    ("hs", "Haskell"),
    ("lua", "Lua"),
    ("r", "R"),
    ("dart", "Dart"),
    ("sh", "Shell"),
    ("bash", "Shell"),
    ("zsh", "Shell"),
    ("ps1", "PowerShell"),
    ("sql", "SQL"),
    ("html", "HTML"),
    ("htm", "HTML"),
    ("css", "CSS"),
    ("scss", "Sass"),
    ("sass", "Sass"),
    ("less", "Less"),
    ("vue", "Vue.js"),
    ("svelte", "Svelte"),
    ("yml", "YAML"),
    ("yaml", "YAML"),
    ("toml", "TOML"),
    ("tf", "Terraform"),
    ("tfvars", "Terraform"),
    ("proto", "Protocol Buffers"),
    ("graphql", "GraphQL"),
    ("ipynb", "Jupyter"),
    ("md", "Markdown"),
    ("rst", "reStructuredText"),
];

/// Filename patterns (glob over the file name, case-sensitive) checked when
/// the extension alone is not informative.
const FILENAME_PATTERNS: &[(&str, &str)] = &[
    ("Dockerfile*", "Docker"),
    ("docker-compose*", "Docker Compose"),
    ("Makefile", "Make"),
    ("CMakeLists.txt", "CMake"),
    ("Cargo.toml", "Rust"),
    ("Cargo.lock", "Rust"),
    ("go.mod", "Go"),
    ("go.sum", "Go"),
    ("package.json", "Node.js"),
    ("package-lock.json", "Node.js"),
    ("yarn.lock", "Node.js"),
    ("pom.xml", "Maven"),
    ("build.gradle*", "Gradle"),
    ("requirements*.txt", "Python"),
    ("pyproject.toml", "Python"),
    ("Pipfile", "Python"),
    ("Gemfile", "Ruby"),
    ("composer.json", "PHP"),
    ("Jenkinsfile", "Jenkins"),
    ("Vagrantfile", "Vagrant"),
];

/// Path prefixes mapped to a technology, for tool directories whose files
/// carry generic extensions.
const PATH_PREFIXES: &[(&str, &str)] = &[
    (".github/workflows/", "GitHub Actions"),
    (".gitlab-ci", "GitLab CI"),
    ("helm/", "Helm"),
    ("charts/", "Helm"),
];

/// Detects technologies from changed-file paths.
///
/// The built-in mapping can be extended per run with `with_rule`; custom
/// rules take precedence over built-ins.
pub struct TechnologyDetector {
    extensions: HashMap<String, String>,
    filename_rules: Vec<(glob::Pattern, String)>,
}

impl Default for TechnologyDetector {
    fn default() -> Self {
        let extensions = EXTENSIONS
            .iter()
            .map(|(ext, name)| (ext.to_string(), name.to_string()))
            .collect();

        let filename_rules = FILENAME_PATTERNS
            .iter()
            .filter_map(|(pattern, name)| {
                glob::Pattern::new(pattern)
                    .ok()
                    .map(|p| (p, name.to_string()))
            })
            .collect();

        Self {
            extensions,
            filename_rules,
        }
    }
}

impl TechnologyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a custom filename pattern, tried before the built-in rules.
    pub fn with_rule(mut self, pattern: &str, technology: &str) -> Self {
        if let Ok(compiled) = glob::Pattern::new(pattern) {
            self.filename_rules.insert(0, (compiled, technology.into()));
        }
        self
    }

    /// Map a set of changed-file paths to aggregated technology tags.
    pub fn detect(&self, files: &[String]) -> TechnologySet {
        let mut set = TechnologySet::new();
        for file in files {
            if let Some(name) = self.classify(file) {
                set.record(name, 1);
            }
        }
        set
    }

    /// Classify a single path; `None` when nothing is recognized.
    pub fn classify(&self, path: &str) -> Option<&str> {
        for (prefix, name) in PATH_PREFIXES {
            if path.starts_with(prefix) {
                return Some(*name);
            }
        }

        let file_name = path.rsplit('/').next().unwrap_or(path);
        for (pattern, name) in &self.filename_rules {
            if pattern.matches(file_name) {
                return Some(name.as_str());
            }
        }

        let extension = file_name.rsplit_once('.').map(|(_, ext)| ext)?;
        self.extensions
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn detect(files: &[&str]) -> TechnologySet {
        let files: Vec<String> = files.iter().map(|s| s.to_string()).collect();
        TechnologyDetector::new().detect(&files)
    }

    #[test]
    fn test_extension_mapping() {
        let set = detect(&["src/main.rs", "src/lib.rs", "scripts/deploy.py"]);
        let counts: Vec<_> = set.iter().map(|(n, c)| (n.to_string(), c)).collect();
        assert_eq!(
            counts,
            vec![("Python".to_string(), 1), ("Rust".to_string(), 2)]
        );
    }

    #[test]
    fn test_filename_patterns() {
        let set = detect(&["Dockerfile", "Dockerfile.prod", "docker-compose.yml"]);
        let counts: std::collections::BTreeMap<_, _> =
            set.iter().map(|(n, c)| (n.to_string(), c)).collect();
        assert_eq!(counts["Docker"], 2);
        assert_eq!(counts["Docker Compose"], 1);
    }

    #[test]
    fn test_path_prefixes() {
        let set = detect(&[".github/workflows/ci.yml"]);
        assert_eq!(set.iter().next().map(|(n, _)| n), Some("GitHub Actions"));
    }

    #[test]
    fn test_unknown_extensions_ignored() {
        let set = detect(&["data.bin", "LICENSE", "notes.xyz"]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_case_insensitive_extension() {
        let set = detect(&["Main.RS", "APP.PY"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_custom_rule_takes_precedence() {
        let detector = TechnologyDetector::new().with_rule("*.rs", "Custom Rust");
        assert_eq!(detector.classify("src/main.rs"), Some("Custom Rust"));
    }

    #[test]
    fn test_manifest_files() {
        let set = detect(&["Cargo.toml", "go.mod", "package.json", "pom.xml"]);
        let names: Vec<_> = set.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["Go", "Maven", "Node.js", "Rust"]);
    }

    proptest! {
        // Detection is a pure function over the multiset of paths: shuffling
        // the input never changes the aggregated result.
        #[test]
        fn prop_order_independent(mut files in proptest::collection::vec("[a-z]{1,8}\\.(rs|go|py|md|bin)", 0..20)) {
            let detector = TechnologyDetector::new();
            let forward = detector.detect(&files);
            files.reverse();
            let backward = detector.detect(&files);
            prop_assert_eq!(forward, backward);
        }
    }
}
