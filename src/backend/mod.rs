//! Language-analysis backend abstraction
//!
//! [`BackendQuery`] is the interface the completion core needs from an hsdev-like
//! analysis service. Implementations may fail in any method; the coordinator
//! never calls them directly but goes through [`GuardedBackend`], which turns
//! unavailability, errors and timeouts into empty results.

pub mod static_index;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::candidate::{Candidate, SourceLocation, Suggest};
use crate::error::{BackendError, BackendResult};

pub use static_index::StaticBackend;

/// How a module lookup name is matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    Exact,
    Prefix,
    Infix,
}

impl SearchType {
    pub fn matches(self, candidate: &str, lookup: &str) -> bool {
        match self {
            SearchType::Exact => candidate == lookup,
            SearchType::Prefix => candidate.starts_with(lookup),
            SearchType::Infix => candidate.contains(lookup),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Where a module comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleLocation {
    /// Defined in a source file, optionally belonging to a project
    Source {
        file: PathBuf,
        #[serde(default)]
        project: Option<PathBuf>,
    },
    /// Provided by an installed package, optionally from a specific package db
    Installed {
        package: PackageRef,
        #[serde(default)]
        db: Option<String>,
    },
}

/// A module as listed by scope and module-list queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRef {
    pub name: String,
    pub location: ModuleLocation,
}

impl ModuleRef {
    pub fn by_source(&self) -> bool {
        matches!(self.location, ModuleLocation::Source { .. })
    }

    pub fn by_cabal(&self) -> bool {
        matches!(self.location, ModuleLocation::Installed { .. })
    }

    pub fn filename(&self) -> Option<&Path> {
        match &self.location {
            ModuleLocation::Source { file, .. } => Some(file),
            ModuleLocation::Installed { .. } => None,
        }
    }

    pub fn package(&self) -> Option<&str> {
        match &self.location {
            ModuleLocation::Installed { package, .. } => Some(&package.name),
            ModuleLocation::Source { .. } => None,
        }
    }

    pub fn db(&self) -> Option<&str> {
        match &self.location {
            ModuleLocation::Installed { db, .. } => db.as_deref(),
            ModuleLocation::Source { .. } => None,
        }
    }
}

/// One `import` line of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub module: String,
    #[serde(default)]
    pub qualified: bool,
    #[serde(default, rename = "as")]
    pub import_as: Option<String>,
}

impl Import {
    /// Name a symbol from this import must be qualified with, if any
    pub fn qualifier(&self) -> &str {
        self.import_as.as_deref().unwrap_or(&self.module)
    }
}

/// A declaration exported by a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, rename = "type")]
    pub type_sig: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub location: Option<SourceLocation>,
}

fn default_kind() -> String {
    "function".to_string()
}

impl Suggest for Declaration {
    fn suggest(&self) -> Candidate {
        let detail = match (&self.type_sig, &self.module) {
            (Some(sig), _) => format!(":: {}", sig),
            (None, Some(module)) => format!("{} {}", self.kind, module),
            (None, None) => self.kind.clone(),
        };
        let candidate = Candidate::with_kind(&self.name, &detail, self.name.clone());
        match &self.location {
            Some(location) => candidate.at(location.clone()),
            None => candidate,
        }
    }
}

/// A fully described module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub location: ModuleLocation,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

impl ModuleDescriptor {
    pub fn module_ref(&self) -> ModuleRef {
        ModuleRef {
            name: self.name.clone(),
            location: self.location.clone(),
        }
    }

    pub fn project(&self) -> Option<&Path> {
        match &self.location {
            ModuleLocation::Source { project, .. } => project.as_deref(),
            ModuleLocation::Installed { .. } => None,
        }
    }
}

/// Parameters of a module lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleQuery {
    pub lookup: Option<String>,
    pub file: Option<PathBuf>,
    pub search_type: SearchType,
    pub package: Option<String>,
    pub db: Option<String>,
}

impl ModuleQuery {
    pub fn by_file(file: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(file.into()),
            ..Default::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            lookup: Some(name.into()),
            search_type: SearchType::Exact,
            ..Default::default()
        }
    }

    pub fn in_package(mut self, package: Option<&str>) -> Self {
        self.package = package.map(str::to_string);
        self
    }

    pub fn in_db(mut self, db: Option<&str>) -> Self {
        self.db = db.map(str::to_string);
        self
    }

    pub fn in_file(mut self, file: Option<&Path>) -> Self {
        self.file = file.map(Path::to_path_buf);
        self
    }
}

/// Which set of symbols a prefix completion searches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionScope {
    /// Everything visible from a file; `wide` also searches modules it does not import
    File { file: PathBuf, wide: bool },
    /// Symbols of installed packages
    Installed,
    /// Symbols of all project sources
    Sources,
}

/// Which modules a module listing covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeSelector {
    /// All installed-package modules
    Cabal,
    /// Modules a project depends on (its own and its packages)
    Project(PathBuf),
    /// Modules installed in a sandbox
    Sandbox(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub path: PathBuf,
}

/// Queries the completion core issues against the analysis backend
#[async_trait::async_trait]
pub trait BackendQuery: Send + Sync {
    /// Whether a session with the backend currently exists
    fn is_connected(&self) -> bool;

    /// Declarations whose (possibly qualified) name starts with `prefix`
    async fn prefix_complete(&self, prefix: &str, scope: &CompletionScope) -> BackendResult<Vec<Declaration>>;

    async fn module_info(&self, query: &ModuleQuery) -> BackendResult<Vec<ModuleDescriptor>>;

    /// Modules visible from `file`, optionally filtered by name
    async fn scope_modules(
        &self,
        file: &Path,
        lookup: Option<&str>,
        search_type: SearchType,
    ) -> BackendResult<Vec<ModuleRef>>;

    /// The module defined in `file`; with `exports` its declarations are included
    async fn resolve_module(&self, file: &Path, exports: bool) -> BackendResult<Option<ModuleDescriptor>>;

    async fn list_modules(&self, selector: &ScopeSelector) -> BackendResult<Vec<ModuleRef>>;

    async fn project(&self, path: &Path) -> BackendResult<Option<ProjectInfo>>;

    async fn sandbox(&self, path: &Path) -> BackendResult<Option<PathBuf>>;

    async fn language_pragmas(&self) -> BackendResult<Vec<String>>;

    async fn compiler_flags(&self) -> BackendResult<Vec<String>>;

    /// Tell the backend a file changed and needs reinspection
    async fn mark_file_dirty(&self, _file: &Path) -> BackendResult<()> {
        Ok(())
    }

    /// Get a human-readable name for this backend (for logging/debugging)
    fn backend_name(&self) -> &'static str;
}

/// Default time allowed for a single backend query
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// A backend handle that never fails
///
/// Every method checks availability first and returns the empty value of its
/// type when there is no connected backend. Errors and timeouts are logged and
/// absorbed the same way.
#[derive(Clone)]
pub struct GuardedBackend {
    backend: Option<Arc<dyn BackendQuery>>,
    timeout: Duration,
}

impl std::fmt::Debug for GuardedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedBackend")
            .field("backend", &self.backend.as_ref().map(|b| b.backend_name()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GuardedBackend {
    pub fn new(backend: Arc<dyn BackendQuery>, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            timeout,
        }
    }

    /// A handle with no backend behind it; every query yields an empty result
    pub fn disconnected() -> Self {
        Self {
            backend: None,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_available(&self) -> bool {
        self.connected().is_some()
    }

    fn connected(&self) -> Option<&Arc<dyn BackendQuery>> {
        self.backend.as_ref().filter(|backend| backend.is_connected())
    }

    async fn absorb<T, F>(&self, what: &'static str, query: F) -> Option<T>
    where
        F: Future<Output = BackendResult<T>>,
    {
        match tokio::time::timeout(self.timeout, query).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) if err.is_miss() => {
                debug!("{}: {}", what, err);
                None
            }
            Ok(Err(err)) => {
                warn!("{}: {}", what, err);
                None
            }
            Err(_) => {
                debug!("{}: {}", what, BackendError::Timeout(self.timeout));
                None
            }
        }
    }

    pub async fn prefix_complete(&self, prefix: &str, scope: &CompletionScope) -> Vec<Declaration> {
        let Some(backend) = self.connected() else {
            return Vec::new();
        };
        self.absorb("prefix_complete", backend.prefix_complete(prefix, scope))
            .await
            .unwrap_or_default()
    }

    /// First module matching `query`
    pub async fn module(&self, query: &ModuleQuery) -> Option<ModuleDescriptor> {
        let backend = self.connected()?;
        self.absorb("module_info", backend.module_info(query))
            .await
            .and_then(|modules| modules.into_iter().next())
    }

    pub async fn scope_modules(
        &self,
        file: &Path,
        lookup: Option<&str>,
        search_type: SearchType,
    ) -> Vec<ModuleRef> {
        let Some(backend) = self.connected() else {
            return Vec::new();
        };
        self.absorb("scope_modules", backend.scope_modules(file, lookup, search_type))
            .await
            .unwrap_or_default()
    }

    pub async fn resolve_module(&self, file: &Path, exports: bool) -> Option<ModuleDescriptor> {
        let backend = self.connected()?;
        self.absorb("resolve_module", backend.resolve_module(file, exports))
            .await
            .flatten()
    }

    pub async fn list_modules(&self, selector: &ScopeSelector) -> Vec<ModuleRef> {
        let Some(backend) = self.connected() else {
            return Vec::new();
        };
        self.absorb("list_modules", backend.list_modules(selector))
            .await
            .unwrap_or_default()
    }

    pub async fn project(&self, path: &Path) -> Option<ProjectInfo> {
        let backend = self.connected()?;
        self.absorb("project", backend.project(path)).await.flatten()
    }

    pub async fn sandbox(&self, path: &Path) -> Option<PathBuf> {
        let backend = self.connected()?;
        self.absorb("sandbox", backend.sandbox(path)).await.flatten()
    }

    pub async fn language_pragmas(&self) -> Vec<String> {
        let Some(backend) = self.connected() else {
            return Vec::new();
        };
        self.absorb("language_pragmas", backend.language_pragmas())
            .await
            .unwrap_or_default()
    }

    pub async fn compiler_flags(&self) -> Vec<String> {
        let Some(backend) = self.connected() else {
            return Vec::new();
        };
        self.absorb("compiler_flags", backend.compiler_flags())
            .await
            .unwrap_or_default()
    }

    pub async fn mark_file_dirty(&self, file: &Path) {
        if let Some(backend) = self.connected() {
            self.absorb("mark_file_dirty", backend.mark_file_dirty(file)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_type_matching() {
        assert!(SearchType::Exact.matches("Data.List", "Data.List"));
        assert!(!SearchType::Exact.matches("Data.List", "Data"));
        assert!(SearchType::Prefix.matches("Data.List", "Data"));
        assert!(SearchType::Infix.matches("Data.List", "a.L"));
    }

    #[test]
    fn test_declaration_suggestion() {
        let decl = Declaration {
            name: "foldr".to_string(),
            kind: "function".to_string(),
            type_sig: Some("(a -> b -> b) -> b -> [a] -> b".to_string()),
            module: Some("Data.List".to_string()),
            location: None,
        };
        let candidate = decl.suggest();
        assert_eq!(candidate.display, "foldr\t:: (a -> b -> b) -> b -> [a] -> b");
        assert_eq!(candidate.insert, "foldr");
        assert!(!candidate.has_source_location());
    }

    #[test]
    fn test_import_qualifier() {
        let aliased = Import { module: "Data.Map".into(), qualified: true, import_as: Some("M".into()) };
        let bare = Import { module: "Data.List".into(), qualified: false, import_as: None };
        assert_eq!(aliased.qualifier(), "M");
        assert_eq!(bare.qualifier(), "Data.List");
    }

    #[tokio::test]
    async fn test_disconnected_guard_returns_defaults() {
        let backend = GuardedBackend::disconnected();
        assert!(!backend.is_available());
        assert!(backend.prefix_complete("", &CompletionScope::Installed).await.is_empty());
        assert!(backend.module(&ModuleQuery::by_name("Data.List")).await.is_none());
        assert!(backend.list_modules(&ScopeSelector::Cabal).await.is_empty());
        assert!(backend.language_pragmas().await.is_empty());
    }
}
