//! Per-commit enrichment: ticket references, project tag and file-type buckets.
//!
//! Project categorisation tries, in order:
//! 1. branch names against project branch globs, then a project learned from
//!    the branch shape (`feature/<project>`, `PROJ-123-...`);
//! 2. touched file paths against project file globs, then a project learned
//!    from `src/<project>/...`, `packages/<project>/...` or `apps/<project>/...`;
//! 3. message keywords.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::commit::{Commit, FileStat};

static JIRA_TICKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][A-Z0-9]*-[0-9]+)\b").unwrap());

static GITHUB_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)(?:#|GH-)(\d+)").unwrap());

/// `feature/` and `bugfix/` branches named after a ticket.
static PREFIXED_TICKET_BRANCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:feature|bugfix)/([A-Z]+-\d+)").unwrap());

/// Branches that start with a ticket key, e.g. `PROJ-789-cleanup`.
static TICKET_BRANCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([A-Z]+-\d+)").unwrap());

/// Top-level directories whose first child names a project.
const PROJECT_ROOTS: &[&str] = &["src", "packages", "apps"];

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("invalid {kind} pattern {pattern:?} for project {project}: {source}")]
    InvalidPattern {
        project: String,
        kind: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// How to recognise commits belonging to one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMapping {
    /// Branch name globs (`*` any run of characters, `?` one character).
    pub branches: Vec<String>,
    /// File path globs.
    pub files: Vec<String>,
    /// Case-insensitive substrings of the commit message.
    pub keywords: Vec<String>,
}

impl ProjectMapping {
    fn new(branches: &[&str], files: &[&str], keywords: &[&str]) -> Self {
        let owned = |items: &[&str]| -> Vec<String> { items.iter().map(ToString::to_string).collect() };
        Self {
            branches: owned(branches),
            files: owned(files),
            keywords: owned(keywords),
        }
    }
}

/// Built-in project mappings, in evaluation order.
pub fn default_project_mappings() -> Vec<(String, ProjectMapping)> {
    vec![
        (
            "frontend".to_string(),
            ProjectMapping::new(
                &["feature/frontend/*", "fix/frontend/*", "frontend/*"],
                &["src/components/**", "src/pages/**", "src/styles/**", "*.tsx", "*.jsx"],
                &["frontend", "ui", "component", "react", "vue", "angular"],
            ),
        ),
        (
            "backend".to_string(),
            ProjectMapping::new(
                &["feature/backend/*", "fix/backend/*", "api/*"],
                &["src/api/**", "src/server/**", "src/controllers/**", "*.py", "*.java", "*.go"],
                &["backend", "api", "server", "endpoint"],
            ),
        ),
        (
            "mobile".to_string(),
            ProjectMapping::new(
                &["feature/mobile/*", "fix/mobile/*", "ios/*", "android/*"],
                &["ios/**", "android/**", "*.swift", "*.kt"],
                &["mobile", "ios", "android", "react-native"],
            ),
        ),
        (
            "infrastructure".to_string(),
            ProjectMapping::new(
                &["feature/infra/*", "fix/infra/*"],
                &["docker/**", "kubernetes/**", "terraform/**", "*.tf", "*.yml"],
                &["infrastructure", "devops", "deployment", "ci/cd"],
            ),
        ),
    ]
}

/// Convert a glob into an anchored regex.
fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}

#[derive(Debug)]
struct ProjectRule {
    name: String,
    branches: Vec<Regex>,
    files: Vec<Regex>,
    keywords: Vec<String>,
}

impl ProjectRule {
    fn compile(name: &str, mapping: &ProjectMapping) -> Result<Self, AnalyzerError> {
        let compile_all = |kind: &'static str, globs: &[String]| {
            globs
                .iter()
                .map(|g| {
                    glob_to_regex(g).map_err(|source| AnalyzerError::InvalidPattern {
                        project: name.to_string(),
                        kind,
                        pattern: g.clone(),
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            name: name.to_string(),
            branches: compile_all("branch", &mapping.branches)?,
            files: compile_all("file", &mapping.files)?,
            keywords: mapping
                .keywords
                .iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        })
    }
}

/// File classification used for buckets and estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Test,
    Doc,
    Config,
    Frontend,
    Backend,
    Other,
}

/// Classify a path. Test detection runs before extension checks.
pub fn classify_path(path: &str) -> FileKind {
    let lower = path.to_lowercase();
    let (dirs, file_name) = lower.rsplit_once('/').unwrap_or(("", lower.as_str()));

    let in_test_dir = dirs
        .split('/')
        .any(|d| matches!(d, "test" | "tests" | "__tests__" | "spec"));
    if in_test_dir
        || file_name.contains(".test.")
        || file_name.contains(".spec.")
        || file_name.contains("_test.")
    {
        return FileKind::Test;
    }

    let ext = file_name
        .rsplit_once('.')
        .map_or("", |(stem, ext)| if stem.is_empty() { "" } else { ext });
    match ext {
        "md" | "rst" | "txt" | "adoc" => FileKind::Doc,
        "json" | "yaml" | "yml" | "toml" | "ini" | "conf" => FileKind::Config,
        "tsx" | "jsx" | "ts" | "js" | "css" | "scss" | "vue" | "svelte" => FileKind::Frontend,
        "py" | "java" | "go" | "rs" | "rb" | "php" | "cpp" | "c" => FileKind::Backend,
        _ => FileKind::Other,
    }
}

/// Touched paths grouped by [`FileKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTypeBuckets {
    pub frontend: Vec<String>,
    pub backend: Vec<String>,
    pub tests: Vec<String>,
    pub docs: Vec<String>,
    pub config: Vec<String>,
    pub other: Vec<String>,
}

impl FileTypeBuckets {
    pub fn from_stats(stats: &[FileStat]) -> Self {
        let mut buckets = Self::default();
        for stat in stats {
            let bucket = match classify_path(&stat.path) {
                FileKind::Test => &mut buckets.tests,
                FileKind::Doc => &mut buckets.docs,
                FileKind::Config => &mut buckets.config,
                FileKind::Frontend => &mut buckets.frontend,
                FileKind::Backend => &mut buckets.backend,
                FileKind::Other => &mut buckets.other,
            };
            bucket.push(stat.path.clone());
        }
        buckets
    }
}

/// Ticket references in a commit message.
///
/// Recognises `ABC-123` keys and GitHub `#123` / `GH-123` references; the
/// latter are stored as the bare number.
pub fn extract_tickets(message: &str) -> BTreeSet<String> {
    let keys = JIRA_TICKET_RE
        .captures_iter(message)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()));
    let refs = GITHUB_REF_RE
        .captures_iter(message)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()));
    keys.chain(refs).collect()
}

/// Project learned from a branch name, without configured rules.
///
/// Tried in order: a ticket after `feature/` or `bugfix/`, the second path
/// segment, then a leading ticket key.
pub fn project_from_branch(branch: &str) -> Option<String> {
    if let Some(m) = PREFIXED_TICKET_BRANCH_RE.captures(branch).and_then(|c| c.get(1)) {
        return Some(m.as_str().to_string());
    }
    let mut parts = branch.split('/');
    if let (Some(_), Some(second)) = (parts.next(), parts.next()) {
        if !second.is_empty() {
            return Some(second.to_string());
        }
    }
    TICKET_BRANCH_RE
        .captures(branch)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Project learned from a file path such as `packages/<project>/...`.
///
/// Needs a file below the project directory, so `src/main.rs` yields nothing.
pub fn project_from_path(path: &str) -> Option<String> {
    let parts: Vec<&str> = path.split('/').collect();
    match parts.as_slice() {
        [root, project, _, ..] if PROJECT_ROOTS.contains(root) && !project.is_empty() => {
            Some((*project).to_string())
        }
        _ => None,
    }
}

/// Derives tickets, project and file-type buckets for commits.
#[derive(Debug)]
pub struct CommitAnalyzer {
    rules: Vec<ProjectRule>,
}

impl CommitAnalyzer {
    /// Build with user mappings evaluated first, then the built-in ones they
    /// do not override.
    pub fn new(user_mappings: &BTreeMap<String, ProjectMapping>) -> Result<Self, AnalyzerError> {
        let mut rules = user_mappings
            .iter()
            .map(|(name, mapping)| ProjectRule::compile(name, mapping))
            .collect::<Result<Vec<_>, _>>()?;
        for (name, mapping) in default_project_mappings() {
            if !user_mappings.contains_key(&name) {
                rules.push(ProjectRule::compile(&name, &mapping)?);
            }
        }
        Ok(Self { rules })
    }

    /// Analyzer using only the built-in mappings.
    pub fn with_defaults() -> Result<Self, AnalyzerError> {
        Self::new(&BTreeMap::new())
    }

    /// Project name for a commit, if any rule matches.
    pub fn categorize(&self, commit: &Commit) -> Option<String> {
        for branch in &commit.branches {
            if let Some(rule) = self
                .rules
                .iter()
                .find(|r| r.branches.iter().any(|re| re.is_match(branch)))
            {
                return Some(rule.name.clone());
            }
            if let Some(project) = project_from_branch(branch) {
                return Some(project);
            }
        }

        if !commit.file_stats.is_empty() {
            let matched = self.rules.iter().find(|r| {
                r.files
                    .iter()
                    .any(|re| commit.file_stats.iter().any(|s| re.is_match(&s.path)))
            });
            if let Some(rule) = matched {
                return Some(rule.name.clone());
            }
            if let Some(project) = commit
                .file_stats
                .iter()
                .find_map(|s| project_from_path(&s.path))
            {
                return Some(project);
            }
        }

        let message = commit.message.to_lowercase();
        self.rules
            .iter()
            .find(|r| r.keywords.iter().any(|k| message.contains(k.as_str())))
            .map(|r| r.name.clone())
    }

    /// Fill in tickets, project and file-type buckets. Nothing else changes.
    pub fn analyze(&self, mut commit: Commit) -> Commit {
        commit.tickets = extract_tickets(&commit.message);
        commit.project = self.categorize(&commit);
        commit.file_types = commit
            .has_file_stats()
            .then(|| FileTypeBuckets::from_stats(&commit.file_stats));
        commit
    }

    pub fn analyze_batch(&self, commits: Vec<Commit>) -> Vec<Commit> {
        commits.into_iter().map(|c| self.analyze(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::commit::{RawCommit, normalize};

    fn commit(message: &str, branches: &[&str], paths: &[&str]) -> Commit {
        normalize(RawCommit {
            hash: Some("abc1234".to_string()),
            date: Some(Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap().into()),
            message: Some(message.to_string()),
            branches: branches.iter().map(ToString::to_string).collect(),
            file_stats: paths.iter().map(|p| FileStat::new(*p, 5, 1)).collect(),
            ..RawCommit::default()
        })
        .unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn extracts_jira_and_github_tickets() {
        let tickets = extract_tickets("PROJ-12: fix login #45, see GH-7 and PROJ-12 again");
        assert_eq!(tickets, set(&["PROJ-12", "45", "GH-7", "7"]));
        assert!(extract_tickets("no refs here, issue#3 inline").is_empty());
        assert_eq!(extract_tickets("#9 at start"), set(&["9"]));
    }

    #[test]
    fn lowercase_keys_are_not_jira_tickets() {
        assert!(extract_tickets("utf-8 and abc-123").is_empty());
    }

    #[test]
    fn configured_branch_glob_wins() {
        let analyzer = CommitAnalyzer::with_defaults().unwrap();
        let c = commit("tweak", &["feature/frontend/login"], &[]);
        assert_eq!(analyzer.categorize(&c).as_deref(), Some("frontend"));
    }

    #[test]
    fn branch_shape_is_learned() {
        let analyzer = CommitAnalyzer::with_defaults().unwrap();
        let c = commit("tweak", &["feature/billing"], &[]);
        assert_eq!(analyzer.categorize(&c).as_deref(), Some("billing"));
        assert_eq!(project_from_branch("PROJ-789-cleanup").as_deref(), Some("PROJ-789"));
        assert_eq!(project_from_branch("main"), None);
    }

    #[test]
    fn branch_ticket_shapes_take_precedence() {
        assert_eq!(project_from_branch("feature/PROJ-12-login").as_deref(), Some("PROJ-12"));
        assert_eq!(project_from_branch("bugfix/ops-7").as_deref(), Some("ops-7"));
        assert_eq!(project_from_branch("release/PROJ-3-notes").as_deref(), Some("PROJ-3-notes"));
        assert_eq!(project_from_branch("wip/").as_deref(), None);
    }

    #[test]
    fn file_globs_then_learned_paths() {
        let analyzer = CommitAnalyzer::with_defaults().unwrap();
        let c = commit("tweak", &["main"], &["src/api/users.rs"]);
        assert_eq!(analyzer.categorize(&c).as_deref(), Some("backend"));

        let c = commit("tweak", &[], &["packages/payments/Button.tsx", "README.md"]);
        assert_eq!(analyzer.categorize(&c).as_deref(), Some("frontend"));

        let c = commit("tweak", &[], &["packages/payments/lib.rs"]);
        assert_eq!(analyzer.categorize(&c).as_deref(), Some("payments"));
        assert_eq!(project_from_path("src/main.rs"), None);
    }

    #[test]
    fn keywords_are_last_resort() {
        let analyzer = CommitAnalyzer::with_defaults().unwrap();
        let c = commit("Deployment script for staging", &[], &[]);
        assert_eq!(analyzer.categorize(&c).as_deref(), Some("infrastructure"));
        assert_eq!(analyzer.categorize(&commit("tidy", &[], &[])), None);
    }

    #[test]
    fn user_mappings_override_and_go_first() {
        let mut user = BTreeMap::new();
        user.insert(
            "frontend".to_string(),
            ProjectMapping {
                keywords: vec!["pixels".to_string()],
                ..ProjectMapping::default()
            },
        );
        user.insert(
            "docs-site".to_string(),
            ProjectMapping {
                files: vec!["docs/*".to_string()],
                keywords: vec!["ui".to_string()],
                ..ProjectMapping::default()
            },
        );
        let analyzer = CommitAnalyzer::new(&user).unwrap();

        // Default frontend globs no longer apply.
        let c = commit("tweak", &[], &["src/components/Button.tsx"]);
        assert_eq!(analyzer.categorize(&c).as_deref(), Some("components"));

        let c = commit("ui polish", &[], &[]);
        assert_eq!(analyzer.categorize(&c).as_deref(), Some("docs-site"));
    }

    #[test]
    fn glob_escapes_regex_metacharacters() {
        let re = glob_to_regex("v1.0/*").unwrap();
        assert!(re.is_match("v1.0/x"));
        assert!(!re.is_match("v100/x"));
        assert!(glob_to_regex("a?c").unwrap().is_match("abc"));
    }

    #[test]
    fn classifies_paths() {
        assert_eq!(classify_path("src/app.test.ts"), FileKind::Test);
        assert_eq!(classify_path("tests/pipeline.rs"), FileKind::Test);
        assert_eq!(classify_path("pkg/parser_test.go"), FileKind::Test);
        assert_eq!(classify_path("README.md"), FileKind::Doc);
        assert_eq!(classify_path("package.json"), FileKind::Config);
        assert_eq!(classify_path("src/App.tsx"), FileKind::Frontend);
        assert_eq!(classify_path("src/main.rs"), FileKind::Backend);
        assert_eq!(classify_path("Makefile"), FileKind::Other);
        assert_eq!(classify_path(".gitignore"), FileKind::Other);
    }

    #[test]
    fn analyze_fills_derived_fields_only() {
        let analyzer = CommitAnalyzer::with_defaults().unwrap();
        let original = commit("PROJ-1 add button", &["feature/frontend/x"], &["src/a.tsx", "docs/x.md"]);
        let analyzed = analyzer.analyze(original.clone());

        assert_eq!(analyzed.tickets, set(&["PROJ-1"]));
        assert_eq!(analyzed.project.as_deref(), Some("frontend"));
        let buckets = analyzed.file_types.as_ref().unwrap();
        assert_eq!(buckets.frontend, vec!["src/a.tsx".to_string()]);
        assert_eq!(buckets.docs, vec!["docs/x.md".to_string()]);

        assert_eq!(analyzed.hash, original.hash);
        assert_eq!(analyzed.timestamp, original.timestamp);
        assert_eq!(analyzed.file_stats, original.file_stats);

        let no_stats = analyzer.analyze(commit("tidy", &[], &[]));
        assert!(no_stats.file_types.is_none());
    }
}
