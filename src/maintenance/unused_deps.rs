use crate::error::{Result, TastebaseError};
use log::debug;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use walkdir::WalkDir;

const SOURCE_DIRS: &[&str] = &["src", "tests", "benches", "examples"];

/// Declared crates that no Rust source in the package refers to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnusedDependencies {
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
}

impl UnusedDependencies {
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty() && self.dev_dependencies.is_empty()
    }
}

/// Keys of a dependency table. A renamed dependency (`package = ...`) is
/// referred to in code by its key, so the key is what we look for.
fn declared(manifest: &toml::Table, table: &str) -> Vec<String> {
    manifest
        .get(table)
        .and_then(|t| t.as_table())
        .map(|t| t.keys().cloned().collect())
        .unwrap_or_default()
}

fn sources(manifest_dir: &Path) -> Result<String> {
    let mut all = String::new();

    let build_rs = manifest_dir.join("build.rs");
    if build_rs.is_file() {
        all.push_str(&std::fs::read_to_string(build_rs)?);
        all.push('\n');
    }

    for dir in SOURCE_DIRS {
        let dir = manifest_dir.join(dir);
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir) {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            let is_rust = entry.file_type().is_file()
                && entry.path().extension().is_some_and(|e| e == "rs");
            if is_rust {
                all.push_str(&std::fs::read_to_string(entry.path())?);
                all.push('\n');
            }
        }
    }
    Ok(all)
}

fn is_referenced(source: &str, name: &str) -> Result<bool> {
    let ident = regex::escape(&name.replace('-', "_"));
    let pattern = Regex::new(&format!(
        r"(?:^|[^\w:])(?:{ident}::|use\s+{ident}\b|extern\s+crate\s+{ident}\b)"
    ))
    .map_err(|e| TastebaseError::InvalidInput(format!("bad crate name '{name}': {e}")))?;
    Ok(pattern.is_match(source))
}

/// Compare `Cargo.toml` in `manifest_dir` with the crate's Rust sources.
pub fn find_unused_dependencies(manifest_dir: &Path) -> Result<UnusedDependencies> {
    let manifest_path = manifest_dir.join("Cargo.toml");
    let manifest: toml::Table = std::fs::read_to_string(&manifest_path)?.parse()?;
    let source = sources(manifest_dir)?;

    let unused = |table: &str| -> Result<Vec<String>> {
        let mut names = Vec::new();
        for name in declared(&manifest, table) {
            if !is_referenced(&source, &name)? {
                debug!("{} in [{}] looks unused", name, table);
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    };

    Ok(UnusedDependencies {
        dependencies: unused("dependencies")?,
        dev_dependencies: unused("dev-dependencies")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reference_patterns() {
        let src = "use serde::Deserialize;\n#[tokio::main]\nextern crate libc;\nlet x = crate::log::info;\nuse foo_bar;";
        assert!(is_referenced(src, "serde").unwrap());
        assert!(is_referenced(src, "tokio").unwrap());
        assert!(is_referenced(src, "libc").unwrap());
        assert!(is_referenced(src, "foo-bar").unwrap());
        assert!(!is_referenced(src, "log").unwrap());
        assert!(!is_referenced(src, "serde_json").unwrap());
        assert!(!is_referenced("use serde_json::json;", "serde").unwrap());
    }

    #[test]
    fn test_finds_unused_in_each_table() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(
            root.join("Cargo.toml"),
            r#"
[package]
name = "demo"

[dependencies]
serde = "1"
regex = "1"
json = { package = "serde_json", version = "1" }
unused-thing = "0.1"

[dev-dependencies]
tempfile = "3"
mockito = "1"
"#,
        )
        .unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("tests")).unwrap();
        std::fs::write(
            root.join("src/lib.rs"),
            "use serde::Serialize;\npub fn f() { let _ = json::Value::Null; }\n",
        )
        .unwrap();
        std::fs::write(root.join("build.rs"), "fn main() { regex::Regex::new(\"a\"); }\n").unwrap();
        std::fs::write(root.join("tests/t.rs"), "use tempfile::TempDir;\n").unwrap();

        let unused = find_unused_dependencies(root).unwrap();
        assert_eq!(unused.dependencies, vec!["unused-thing"]);
        assert_eq!(unused.dev_dependencies, vec!["mockito"]);
    }

    #[test]
    fn test_missing_manifest_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(find_unused_dependencies(dir.path()).is_err());
    }
}
