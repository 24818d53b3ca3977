use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;

use itertools::Itertools;

use crate::config::InterpreterPaths;
use crate::core::domain::{Language, LanguageSpec};

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("Unsupported language: {language}. Supported: {supported}")]
    UnsupportedLanguage { language: String, supported: String },
}

/// Fixed table of languages the service is willing to launch.
#[derive(Clone, Debug)]
pub struct LanguageRegistry {
    specs: HashMap<Language, LanguageSpec>,
}

impl LanguageRegistry {
    pub fn new(interpreters: &InterpreterPaths) -> Self {
        let specs = [
            LanguageSpec {
                language: Language::JavaScript,
                file_extension: "js",
                launch_command: interpreters.node.clone(),
                build_args: file_only,
            },
            LanguageSpec {
                language: Language::Python,
                file_extension: "py",
                launch_command: interpreters.python.clone(),
                build_args: file_only,
            },
            LanguageSpec {
                language: Language::TypeScript,
                file_extension: "ts",
                launch_command: interpreters.npx.clone(),
                build_args: ts_node,
            },
        ]
        .into_iter()
        .map(|spec| (spec.language, spec))
        .collect();

        Self { specs }
    }

    pub fn resolve(&self, language: &str) -> Result<&LanguageSpec, RegistryError> {
        language
            .parse::<Language>()
            .ok()
            .and_then(|language| self.specs.get(&language))
            .ok_or_else(|| RegistryError::UnsupportedLanguage {
                language: language.to_string(),
                supported: self.supported().map(|l| l.id()).join(", "),
            })
    }

    /// Registered languages in declaration order.
    pub fn supported(&self) -> impl Iterator<Item = Language> + '_ {
        Language::ALL
            .into_iter()
            .filter(|language| self.specs.contains_key(language))
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new(&InterpreterPaths::default())
    }
}

fn file_only(source: &Path) -> Vec<OsString> {
    vec![source.into()]
}

fn ts_node(source: &Path) -> Vec<OsString> {
    vec!["ts-node".into(), source.into()]
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_resolve_known_languages() {
        let registry = LanguageRegistry::default();
        let file = PathBuf::from("/tmp/exec_1.ts");

        let js = registry.resolve("javascript").unwrap();
        assert_eq!(js.file_extension, "js");
        assert_eq!(js.launch_command, "node");

        let py = registry.resolve("python").unwrap();
        assert_eq!(py.file_extension, "py");
        assert_eq!(py.launch_command, "python3");

        let ts = registry.resolve("typescript").unwrap();
        assert_eq!(ts.launch_command, "npx");
        assert_eq!(
            ts.args_for(&file),
            vec![OsString::from("ts-node"), OsString::from("/tmp/exec_1.ts")]
        );
    }

    #[test]
    fn test_resolve_unknown_language() {
        let registry = LanguageRegistry::default();

        let err = registry.resolve("brainfuck").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported language: brainfuck. Supported: javascript, python, typescript"
        );
    }

    #[test]
    fn test_interpreter_overrides() {
        let registry = LanguageRegistry::new(&InterpreterPaths {
            python: "/usr/local/bin/python3.12".into(),
            ..InterpreterPaths::default()
        });

        assert_eq!(
            registry.resolve("python").unwrap().launch_command,
            "/usr/local/bin/python3.12"
        );
    }
}
