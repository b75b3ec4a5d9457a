use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::violation::{Violation, ViolationKind};
use crate::PolicyError;

/// Where to look and what is allowed
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Directories scanned recursively for `.rs` files, relative to the root
    pub source_dirs: Vec<PathBuf>,

    /// The one file allowed to invoke plugins, relative to the root
    pub runner_file: PathBuf,

    /// Lifecycle state variant names that may appear in code
    pub approved_states: Vec<String>,

    /// Path components that exclude a file from scanning
    pub skip_dirs: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            source_dirs: vec![PathBuf::from("crates"), PathBuf::from("op-runtime-service")],
            runner_file: PathBuf::from("crates/op-tools/src/runner.rs"),
            approved_states: ["Loaded", "Initialized", "Running", "Failed", "Unavailable"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            skip_dirs: vec!["target".to_string()],
        }
    }
}

pub struct PolicyChecker {
    config: PolicyConfig,
    approved: BTreeSet<String>,
    invocation: Regex,
    state_path: Regex,
    state_enum: Regex,
    variant: Regex,
    drop_impl: Regex,
    test_attr: Regex,
}

impl PolicyChecker {
    pub fn new(config: PolicyConfig) -> Result<Self, PolicyError> {
        Ok(Self {
            approved: config.approved_states.iter().cloned().collect(),
            config,
            invocation: Regex::new(
                r"\.\s*invoke\s*\(|\bPlugin\s*::\s*invoke\b|<[^<>]*\bPlugin\s*>\s*::\s*invoke\b",
            )?,
            state_path: Regex::new(r"\bLifecycleState::([A-Z]\w*)")?,
            state_enum: Regex::new(r"\benum\s+LifecycleState\b")?,
            variant: Regex::new(r"^([A-Za-z_]\w*)")?,
            drop_impl: Regex::new(r"\bimpl\b[^{;]*\bDrop\s+for\b")?,
            test_attr: Regex::new(r"#\[cfg\(test\)\]")?,
        })
    }

    /// Run every rule over the sources under `root`
    pub fn check(&self, root: &Path) -> Result<Vec<Violation>, PolicyError> {
        let root = &root.canonicalize().map_err(|source| PolicyError::Read {
            path: root.to_path_buf(),
            source,
        })?;
        let files = self.source_files(root)?;
        info!(root = %root.display(), files = files.len(), "Scanning sources");

        let mut violations = Vec::new();
        let mut runner_seen = false;

        for path in &files {
            let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
            let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
                path: path.clone(),
                source,
            })?;
            let source = self.production_source(&content);
            let is_runner = relative == self.config.runner_file;

            if is_runner {
                runner_seen = true;
                violations.extend(self.check_cleanup(&relative, &source));
            } else {
                violations.extend(self.check_invocations(&relative, &source));
            }
            violations.extend(self.check_states(&relative, &source));
        }

        if !runner_seen {
            violations.push(Violation::new(
                ViolationKind::MissingCleanup,
                self.config.runner_file.clone(),
                0,
                "runner file not found",
            ));
        }

        violations.sort_by(|a, b| a.path.cmp(&b.path).then(a.line.cmp(&b.line)));
        debug!(count = violations.len(), "Scan finished");
        Ok(violations)
    }

    fn source_files(&self, root: &Path) -> Result<Vec<PathBuf>, PolicyError> {
        let mut files = Vec::new();
        for dir in &self.config.source_dirs {
            let base = root.join(dir);
            let pattern = format!("{}/**/*.rs", glob::Pattern::escape(&base.to_string_lossy()));
            for entry in glob::glob(&pattern)? {
                let path = entry?;
                if !self.is_skipped(root, &path) {
                    files.push(path);
                }
            }
        }
        files.sort();
        files.dedup();
        Ok(files)
    }

    fn is_skipped(&self, root: &Path, path: &Path) -> bool {
        path.strip_prefix(root)
            .unwrap_or(path)
            .components()
            .any(|c| self.config.skip_dirs.iter().any(|skip| c.as_os_str() == skip.as_str()))
    }

    fn check_invocations(&self, path: &Path, source: &str) -> Vec<Violation> {
        self.invocation
            .find_iter(source)
            .map(|found| {
                Violation::new(
                    ViolationKind::DirectInvocation,
                    path,
                    line_of(source, found.start()),
                    format!(
                        "plugin invoked outside {}",
                        self.config.runner_file.display()
                    ),
                )
            })
            .collect()
    }

    fn check_cleanup(&self, path: &Path, source: &str) -> Vec<Violation> {
        let mut last_line = 1;
        for found in self.drop_impl.find_iter(source) {
            last_line = line_of(source, found.start());
            if let Some((open, close)) = block_after(source, found.end()) {
                if source[open + 1..close].contains("update_execution_metrics") {
                    return Vec::new();
                }
            }
        }
        vec![Violation::new(
            ViolationKind::MissingCleanup,
            path,
            last_line,
            "no `impl Drop` block calls update_execution_metrics",
        )]
    }

    fn check_states(&self, path: &Path, source: &str) -> Vec<Violation> {
        let mut violations = Vec::new();
        let mut in_enum = false;

        for (idx, line) in source.lines().enumerate() {
            for cap in self.state_path.captures_iter(line) {
                let name = &cap[1];
                if !self.approved.contains(name) {
                    violations.push(self.unknown_state(path, idx + 1, name));
                }
            }

            if self.state_enum.is_match(line) {
                in_enum = true;
                continue;
            }
            if in_enum {
                let trimmed = line.trim();
                if trimmed.starts_with('}') {
                    in_enum = false;
                    continue;
                }
                if trimmed.starts_with("#[") {
                    continue;
                }
                if let Some(cap) = self.variant.captures(trimmed) {
                    let name = &cap[1];
                    if !self.approved.contains(name) {
                        violations.push(self.unknown_state(path, idx + 1, name));
                    }
                }
            }
        }
        violations
    }

    /// Source with comment lines and `#[cfg(test)]` items blanked.
    ///
    /// Line numbering of the remaining code is preserved.
    fn production_source(&self, content: &str) -> String {
        let mut source = String::with_capacity(content.len() + 1);
        for line in content.lines() {
            if !line.trim_start().starts_with("//") {
                source.push_str(line);
            }
            source.push('\n');
        }

        let mut from = 0;
        while let Some(found) = self.test_attr.find_at(&source, from) {
            let start = found.start();
            let end = item_end(&source, found.end()).unwrap_or(source.len());
            from = blank(&mut source, start, end);
        }
        source
    }

    fn unknown_state(&self, path: &Path, line: usize, name: &str) -> Violation {
        Violation::new(
            ViolationKind::UnknownLifecycleState,
            path,
            line,
            format!("lifecycle state `{}` is not one of the approved states", name),
        )
    }
}

/// Replace everything in `start..end` except newlines with spaces
fn blank(source: &mut String, start: usize, end: usize) -> usize {
    let blanked: String = source[start..end]
        .chars()
        .map(|c| if c == '\n' { '\n' } else { ' ' })
        .collect();
    source.replace_range(start..end, &blanked);
    start + blanked.len()
}

/// End of the item starting at `from`: past its `;` or its closing brace
fn item_end(source: &str, from: usize) -> Option<usize> {
    let stop = from + source[from..].find(|c: char| c == '{' || c == ';')?;
    if source[stop..].starts_with(';') {
        return Some(stop + 1);
    }
    block_after(source, stop).map(|(_, close)| close + 1)
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

/// Byte offsets of the braces around the block opening at or after `from`
fn block_after(source: &str, from: usize) -> Option<(usize, usize)> {
    let open = from + source[from..].find('{')?;
    let mut depth = 0usize;
    for (idx, ch) in source[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((open, open + idx));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const GOOD_RUNNER: &str = r#"
struct MetricsGuard;

impl Drop for MetricsGuard {
    fn drop(&mut self) {
        self.registry.update_execution_metrics(name, state, 1, false);
    }
}

async fn run(plugin: &BoxedPlugin, payload: Payload) {
    plugin.invoke(payload).await;
}
"#;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn workspace(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "crates/op-tools/src/runner.rs", GOOD_RUNNER);
        for (path, content) in files {
            write(dir.path(), path, content);
        }
        dir
    }

    fn check(dir: &TempDir) -> Vec<Violation> {
        crate::check_workspace(dir.path(), &PolicyConfig::default()).unwrap()
    }

    fn kinds(violations: &[Violation]) -> Vec<ViolationKind> {
        violations.iter().map(|v| v.kind).collect()
    }

    #[test]
    fn test_clean_workspace() {
        let dir = workspace(&[(
            "crates/op-core/src/types.rs",
            "pub enum LifecycleState {\n    #[default]\n    Loaded,\n    Initialized,\n    Running,\n    Failed,\n    Unavailable,\n}\n",
        )]);
        assert!(check(&dir).is_empty());
    }

    #[test]
    fn test_direct_invocation_outside_runner() {
        let dir = workspace(&[(
            "crates/op-execution-tracker/src/job_service.rs",
            "fn sneak() {\n    let x = 1;\n    plugin.invoke(request);\n}\n",
        )]);
        let violations = check(&dir);

        assert_eq!(kinds(&violations), vec![ViolationKind::DirectInvocation]);
        assert_eq!(violations[0].line, 3);
        assert_eq!(
            violations[0].path,
            PathBuf::from("crates/op-execution-tracker/src/job_service.rs")
        );
    }

    #[test]
    fn test_comments_and_test_tail_ignored() {
        let dir = workspace(&[(
            "crates/op-tools/src/builtin.rs",
            "/// calls plugin.invoke(request)\nfn real() {}\n\n#[cfg(test)]\nmod tests {\n    fn t() { plugin.invoke(request); }\n}\n",
        )]);
        assert!(check(&dir).is_empty());
    }

    #[test]
    fn test_skip_target_dir() {
        let dir = workspace(&[("crates/op-tools/target/debug/gen.rs", "plugin.invoke(x);\n")]);
        assert!(check(&dir).is_empty());
    }

    #[test]
    fn test_runner_without_drop_guard() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "crates/op-tools/src/runner.rs",
            "async fn run() {\n    registry.update_execution_metrics(name, state, 1, false);\n}\n",
        );
        assert_eq!(kinds(&check(&dir)), vec![ViolationKind::MissingCleanup]);
    }

    #[test]
    fn test_drop_guard_must_update_metrics() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "crates/op-tools/src/runner.rs",
            "impl Drop for Guard {\n    fn drop(&mut self) {\n        log();\n    }\n}\n\nfn other() { update_execution_metrics(); }\n",
        );
        let violations = check(&dir);
        assert_eq!(kinds(&violations), vec![ViolationKind::MissingCleanup]);
        assert_eq!(violations[0].line, 1);
    }

    #[test]
    fn test_missing_runner_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "crates/op-core/src/lib.rs", "pub mod types;\n");
        let violations = check(&dir);
        assert_eq!(kinds(&violations), vec![ViolationKind::MissingCleanup]);
        assert_eq!(violations[0].message, "runner file not found");
    }

    #[test]
    fn test_unknown_state_path() {
        let dir = workspace(&[(
            "crates/op-tools/src/registry.rs",
            "fn f() {\n    let a = LifecycleState::Initialized;\n    let b = LifecycleState::Paused;\n    let c = LifecycleState::default();\n}\n",
        )]);
        let violations = check(&dir);
        assert_eq!(kinds(&violations), vec![ViolationKind::UnknownLifecycleState]);
        assert_eq!(violations[0].line, 3);
        assert!(violations[0].message.contains("Paused"));
    }

    #[test]
    fn test_unknown_enum_variant() {
        let dir = workspace(&[(
            "crates/op-core/src/types.rs",
            "pub enum LifecycleState {\n    Loaded,\n    Degraded,\n}\n\npub enum JobStatus {\n    Pending,\n}\n",
        )]);
        let violations = check(&dir);
        assert_eq!(kinds(&violations), vec![ViolationKind::UnknownLifecycleState]);
        assert_eq!(violations[0].line, 3);
    }

    #[test]
    fn test_qualified_invocation_outside_runner() {
        let dir = workspace(&[
            (
                "crates/op-execution-tracker/src/a.rs",
                "async fn a(p: BoxedPlugin, req: Payload) {\n    Plugin::invoke(p.as_ref(), req).await;\n}\n",
            ),
            (
                "crates/op-execution-tracker/src/b.rs",
                "async fn b(p: &Echo, req: Payload) {\n    <Echo as Plugin>::invoke(p, req).await;\n}\n",
            ),
            (
                "crates/op-execution-tracker/src/c.rs",
                "async fn c(p: &dyn Plugin, req: Payload) {\n    op_tools::Plugin :: invoke(p, req).await;\n}\n",
            ),
        ]);
        let violations = check(&dir);

        assert_eq!(violations.len(), 3);
        assert!(violations
            .iter()
            .all(|v| v.kind == ViolationKind::DirectInvocation && v.line == 2));
    }

    #[test]
    fn test_invocation_split_across_lines() {
        let dir = workspace(&[(
            "crates/op-execution-tracker/src/split.rs",
            "async fn split(p: BoxedPlugin, req: Payload) {\n    p\n        .invoke\n        (req)\n        .await;\n}\n",
        )]);
        let violations = check(&dir);

        assert_eq!(kinds(&violations), vec![ViolationKind::DirectInvocation]);
        assert_eq!(violations[0].line, 3);
    }

    #[test]
    fn test_cfg_test_item_only_hides_itself() {
        let dir = workspace(&[(
            "crates/op-execution-tracker/src/helpers.rs",
            "#[cfg(test)]\nfn helper() {\n    p.invoke(req);\n}\n\n#[cfg(test)]\nuse std::mem;\n\nasync fn sneak(p: BoxedPlugin, req: Payload) {\n    p.invoke(req).await;\n}\n",
        )]);
        let violations = check(&dir);

        assert_eq!(kinds(&violations), vec![ViolationKind::DirectInvocation]);
        assert_eq!(violations[0].line, 10);
    }

    #[test]
    fn test_block_after() {
        let source = "impl Drop for G { fn drop(&mut self) { inner(); } } tail";
        let (open, close) = block_after(source, 0).unwrap();
        assert_eq!(&source[open + 1..close], " fn drop(&mut self) { inner(); } ");
        assert_eq!(block_after("no braces", 0), None);
    }

    #[test]
    fn test_item_end() {
        assert_eq!(item_end("use a::b;\nfn x() {}", 0), Some(9));
        assert_eq!(item_end("fn x() { { } }\nrest", 0), Some(14));
    }
}
