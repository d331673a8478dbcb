//! In-memory backend loaded from a JSON snapshot of an hsdev database
//!
//! The snapshot lists modules (with their imports and declarations), projects,
//! sandboxes and the toolchain's LANGUAGE / OPTIONS_GHC vocabularies. Queries
//! answer from that snapshot, which makes the backend deterministic enough for
//! tests and for driving the CLI without a live analysis service.
//!
//! ```json
//! {
//!   "modules": [
//!     { "name": "Data.List",
//!       "location": { "installed": { "package": { "name": "base" } } },
//!       "declarations": [ { "name": "foldr", "type": "(a -> b -> b) -> b -> [a] -> b" } ] }
//!   ],
//!   "languages": ["OverloadedStrings"],
//!   "flags": ["-Wall"]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::{
    BackendQuery, CompletionScope, Declaration, ModuleDescriptor, ModuleLocation, ModuleQuery,
    ModuleRef, ProjectInfo, ScopeSelector, SearchType,
};
use crate::error::{BackendError, BackendResult};

/// On-disk shape of the snapshot
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexSnapshot {
    #[serde(default)]
    pub modules: Vec<ModuleDescriptor>,
    #[serde(default)]
    pub projects: Vec<ProjectInfo>,
    #[serde(default)]
    pub sandboxes: Vec<PathBuf>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
    /// Artificial delay applied to every query
    #[serde(default)]
    pub latency_ms: u64,
}

/// Backend answering queries from an [`IndexSnapshot`]
#[derive(Debug, Clone)]
pub struct StaticBackend {
    index: Arc<IndexSnapshot>,
    connected: Arc<AtomicBool>,
    queries: Arc<AtomicUsize>,
}

impl StaticBackend {
    pub fn new(index: IndexSnapshot) -> Self {
        Self {
            index: Arc::new(index),
            connected: Arc::new(AtomicBool::new(true)),
            queries: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_json(json: &str) -> BackendResult<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn from_path(path: &Path) -> BackendResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Simulate losing or regaining the backend session
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Number of queries answered so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    async fn begin(&self, what: &str) -> BackendResult<()> {
        if !self.is_connected() {
            return Err(BackendError::Unavailable);
        }
        self.queries.fetch_add(1, Ordering::SeqCst);
        debug!("static backend: {}", what);
        if self.index.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.index.latency_ms)).await;
        }
        Ok(())
    }

    fn module_at(&self, file: &Path) -> Option<&ModuleDescriptor> {
        self.index.modules.iter().find(|m| match &m.location {
            ModuleLocation::Source { file: f, .. } => f == file,
            ModuleLocation::Installed { .. } => false,
        })
    }

    fn module_named(&self, name: &str) -> impl Iterator<Item = &ModuleDescriptor> {
        self.index.modules.iter().filter(move |m| m.name == name)
    }

    fn installed(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.index.modules.iter().filter(|m| m.module_ref().by_cabal())
    }

    fn sources(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.index.modules.iter().filter(|m| m.module_ref().by_source())
    }

    fn in_project<'a>(&'a self, project: &'a Path) -> impl Iterator<Item = &'a ModuleDescriptor> + 'a {
        self.sources().filter(move |m| m.project() == Some(project))
    }

    /// Modules visible from `file`: its project's sources (or just itself) plus installed packages
    fn visible_from(&self, file: &Path) -> Vec<&ModuleDescriptor> {
        let mut visible: Vec<&ModuleDescriptor> = match self.module_at(file) {
            Some(module) => match module.project() {
                Some(project) => self.in_project(project).collect(),
                None => vec![module],
            },
            None => Vec::new(),
        };
        visible.extend(self.installed());
        visible
    }

    fn with_module(decls: &[Declaration], module: &str) -> Vec<Declaration> {
        decls
            .iter()
            .map(|d| Declaration {
                module: d.module.clone().or_else(|| Some(module.to_string())),
                ..d.clone()
            })
            .collect()
    }

    fn complete_in_file(&self, prefix: &str, file: &Path, wide: bool) -> Vec<Declaration> {
        let Some(current) = self.module_at(file) else {
            return Vec::new();
        };

        // `Q.na` completes `na` among modules imported as `Q`
        let (qualifier, name_prefix) = match prefix.rsplit_once('.') {
            Some((q, n)) => (Some(q), n),
            None => (None, prefix),
        };

        let mut found = Vec::new();
        if qualifier.is_none() {
            found.extend(Self::with_module(&current.declarations, &current.name));
        }

        if wide {
            for module in self.visible_from(file) {
                if qualifier.is_none_or(|q| module.name == q) {
                    found.extend(Self::with_module(&module.declarations, &module.name));
                }
            }
        } else {
            for import in &current.imports {
                let reachable = match qualifier {
                    Some(q) => import.qualifier() == q || import.module == q,
                    None => !import.qualified,
                };
                if reachable {
                    for module in self.module_named(&import.module) {
                        found.extend(Self::with_module(&module.declarations, &module.name));
                    }
                }
            }
        }

        found.retain(|d| d.name.starts_with(name_prefix));
        found
    }
}

#[async_trait::async_trait]
impl BackendQuery for StaticBackend {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn prefix_complete(&self, prefix: &str, scope: &CompletionScope) -> BackendResult<Vec<Declaration>> {
        self.begin("complete").await?;
        let decls = match scope {
            CompletionScope::File { file, wide } => self.complete_in_file(prefix, file, *wide),
            CompletionScope::Installed => self
                .installed()
                .flat_map(|m| Self::with_module(&m.declarations, &m.name))
                .filter(|d| d.name.starts_with(prefix))
                .collect(),
            CompletionScope::Sources => self
                .sources()
                .flat_map(|m| Self::with_module(&m.declarations, &m.name))
                .filter(|d| d.name.starts_with(prefix))
                .collect(),
        };
        Ok(decls)
    }

    async fn module_info(&self, query: &ModuleQuery) -> BackendResult<Vec<ModuleDescriptor>> {
        self.begin("module").await?;
        let found = self
            .index
            .modules
            .iter()
            .filter(|m| {
                let r = m.module_ref();
                query
                    .lookup
                    .as_deref()
                    .is_none_or(|lookup| query.search_type.matches(&m.name, lookup))
                    && query.file.as_deref().is_none_or(|f| r.filename() == Some(f))
                    && query.package.as_deref().is_none_or(|p| r.package() == Some(p))
                    && query.db.as_deref().is_none_or(|db| r.db() == Some(db))
            })
            .cloned()
            .collect();
        Ok(found)
    }

    async fn scope_modules(
        &self,
        file: &Path,
        lookup: Option<&str>,
        search_type: SearchType,
    ) -> BackendResult<Vec<ModuleRef>> {
        self.begin("scope modules").await?;
        Ok(self
            .visible_from(file)
            .into_iter()
            .filter(|m| lookup.is_none_or(|l| search_type.matches(&m.name, l)))
            .map(ModuleDescriptor::module_ref)
            .collect())
    }

    async fn resolve_module(&self, file: &Path, exports: bool) -> BackendResult<Option<ModuleDescriptor>> {
        self.begin("resolve").await?;
        Ok(self.module_at(file).map(|module| {
            let mut resolved = module.clone();
            if !exports {
                resolved.declarations.clear();
            }
            resolved
        }))
    }

    async fn list_modules(&self, selector: &ScopeSelector) -> BackendResult<Vec<ModuleRef>> {
        self.begin("modules").await?;
        let modules = match selector {
            ScopeSelector::Cabal => self.installed().map(ModuleDescriptor::module_ref).collect(),
            ScopeSelector::Project(path) => self
                .in_project(path)
                .chain(self.installed())
                .map(ModuleDescriptor::module_ref)
                .collect(),
            ScopeSelector::Sandbox(path) => {
                let sandbox = path.to_string_lossy();
                self.installed()
                    .map(ModuleDescriptor::module_ref)
                    .filter(|m| m.db() == Some(&*sandbox))
                    .collect()
            }
        };
        Ok(modules)
    }

    async fn project(&self, path: &Path) -> BackendResult<Option<ProjectInfo>> {
        self.begin("project").await?;
        Ok(self
            .index
            .projects
            .iter()
            .find(|p| path.starts_with(&p.path))
            .cloned())
    }

    async fn sandbox(&self, path: &Path) -> BackendResult<Option<PathBuf>> {
        self.begin("sandbox").await?;
        Ok(self
            .index
            .sandboxes
            .iter()
            .find(|s| s.parent().is_some_and(|root| path.starts_with(root)))
            .cloned())
    }

    async fn language_pragmas(&self) -> BackendResult<Vec<String>> {
        self.begin("langs").await?;
        Ok(self.index.languages.clone())
    }

    async fn compiler_flags(&self) -> BackendResult<Vec<String>> {
        self.begin("flags").await?;
        Ok(self.index.flags.clone())
    }

    fn backend_name(&self) -> &'static str {
        "static-index"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const INDEX: &str = indoc! {r#"
        {
          "modules": [
            { "name": "Main",
              "location": { "source": { "file": "/p/src/Main.hs", "project": "/p" } },
              "imports": [ { "module": "Data.List" },
                           { "module": "Data.Map", "qualified": true, "as": "M" } ],
              "declarations": [ { "name": "main", "type": "IO ()" } ] },
            { "name": "Data.List",
              "location": { "installed": { "package": { "name": "base" } } },
              "declarations": [ { "name": "foldr" }, { "name": "filter" } ] },
            { "name": "Data.Map",
              "location": { "installed": { "package": { "name": "containers" } } },
              "declarations": [ { "name": "fromList" }, { "name": "filter" } ] }
          ],
          "projects": [ { "name": "demo", "path": "/p" } ],
          "languages": ["GADTs"],
          "flags": ["-Wall"]
        }
    "#};

    fn names(decls: &[Declaration]) -> Vec<&str> {
        let mut names: Vec<_> = decls.iter().map(|d| d.name.as_str()).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_file_scope_respects_qualified_imports() {
        let backend = StaticBackend::from_json(INDEX).unwrap();
        let scope = CompletionScope::File { file: "/p/src/Main.hs".into(), wide: false };

        let all = backend.prefix_complete("", &scope).await.unwrap();
        assert_eq!(names(&all), vec!["filter", "foldr", "main"]);

        let qualified = backend.prefix_complete("M.f", &scope).await.unwrap();
        assert_eq!(names(&qualified), vec!["filter", "fromList"]);
        assert!(qualified.iter().all(|d| d.module.as_deref() == Some("Data.Map")));
    }

    #[tokio::test]
    async fn test_wide_scope_sees_unimported_modules() {
        let backend = StaticBackend::from_json(INDEX).unwrap();
        let scope = CompletionScope::File { file: "/p/src/Main.hs".into(), wide: true };
        let found = backend.prefix_complete("from", &scope).await.unwrap();
        assert_eq!(names(&found), vec!["fromList"]);
    }

    #[tokio::test]
    async fn test_disconnected_reports_unavailable() {
        let backend = StaticBackend::from_json(INDEX).unwrap();
        backend.set_connected(false);
        let err = backend.language_pragmas().await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable));
        assert_eq!(backend.query_count(), 0);
    }

    #[tokio::test]
    async fn test_project_lookup_by_ancestor() {
        let backend = StaticBackend::from_json(INDEX).unwrap();
        let project = backend.project(Path::new("/p/src")).await.unwrap();
        assert_eq!(project.map(|p| p.name), Some("demo".to_string()));
        assert!(backend.project(Path::new("/elsewhere")).await.unwrap().is_none());
    }

    #[test]
    fn test_malformed_snapshot() {
        assert!(matches!(StaticBackend::from_json("{ not json"), Err(BackendError::Json(_))));
    }
}
