//! Completion coordinator
//!
//! Owns the [`SharedCompletionCache`] and answers every completion request from
//! the editor layer. Requests are classified by cursor context and served from
//! one of several candidate sources:
//!
//! ```text
//! get_completions
//!   ├─ symbol has a module
//!   │    ├─ import list  → declarations of that module (source or package)
//!   │    └─ qualified    → backend prefix completion for `Module.prefix`
//!   └─ plain            → wide ? global : file entry, else global
//! get_import_completions   → module path segments (+ `qualified ` hint)
//! get_special_completions  → LANGUAGE / OPTIONS_GHC vocabularies (memoized)
//! ```
//!
//! Keywords always come first and the result is deduplicated on
//! `(display, insert)`.
//!
//! # Population
//!
//! Per-file entries are filled by [`CompletionCoordinator::ensure_file_completions`],
//! which only ever runs on the background [`TaskRunner`]. Two concurrent
//! populations of the same file may both miss the cache and both resolve it;
//! the second write simply replaces the first. Resolution is deterministic, so
//! last-write-wins is observationally the same as a single population.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::backend::{CompletionScope, Declaration, GuardedBackend, ModuleQuery, ScopeSelector, SearchType};
use crate::cache::SharedCompletionCache;
use crate::candidate::{
    Candidate, CandidateList, dedup_preserving_order, keyword_candidates, make_completions, make_locations,
    sorted_completions,
};
use crate::config::CompletionSettings;
use crate::context::{ContextClassifier, CursorContext, PragmaKind, QualifiedSymbol, RegexClassifier};
use crate::editor::{EditorView, Location, ViewId, Workspace};
use crate::worker::TaskRunner;

/// Result of a combined completion query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionResponse {
    pub items: CandidateList,
    /// The editor should suppress its own word completions
    pub inhibit: bool,
}

pub struct CompletionCoordinator {
    backend: GuardedBackend,
    cache: SharedCompletionCache,
    settings: CompletionSettings,
    runner: Arc<dyn TaskRunner>,
    classifier: Arc<dyn ContextClassifier>,
    workspace: Option<Arc<dyn Workspace>>,
    keywords: CandidateList,
    language_pragmas: Mutex<Vec<String>>,
    compiler_flags: Mutex<Vec<String>>,
    current_file: Mutex<Option<PathBuf>>,
    wide_completion: Mutex<Option<ViewId>>,
}

impl std::fmt::Debug for CompletionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionCoordinator")
            .field("backend", &self.backend)
            .field("settings", &self.settings)
            .field("current_file", &*self.current_file.lock())
            .finish()
    }
}

impl CompletionCoordinator {
    pub fn new(backend: GuardedBackend, runner: Arc<dyn TaskRunner>, settings: CompletionSettings) -> Self {
        Self {
            backend,
            cache: SharedCompletionCache::new(),
            settings,
            runner,
            classifier: Arc::new(RegexClassifier),
            workspace: None,
            keywords: keyword_candidates(),
            language_pragmas: Mutex::new(Vec::new()),
            compiler_flags: Mutex::new(Vec::new()),
            current_file: Mutex::new(None),
            wide_completion: Mutex::new(None),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ContextClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_workspace(mut self, workspace: Arc<dyn Workspace>) -> Self {
        self.workspace = Some(workspace);
        self
    }

    pub fn cache(&self) -> &SharedCompletionCache {
        &self.cache
    }

    pub fn keyword_candidates(&self) -> &CandidateList {
        &self.keywords
    }

    /// Last file a completion request was served for
    pub fn current_file(&self) -> Option<PathBuf> {
        self.current_file.lock().clone()
    }

    /// Make the next plain completion request for `view` use the global list
    pub fn mark_wide_completion(&self, view: ViewId) {
        *self.wide_completion.lock() = Some(view);
    }

    /// Consume the wide marker if it is set for `view`
    fn take_wide(&self, view: ViewId) -> bool {
        let mut marker = self.wide_completion.lock();
        if *marker == Some(view) {
            *marker = None;
            true
        } else {
            false
        }
    }

    fn classify(&self, view: &dyn EditorView, locations: &[Location]) -> CursorContext {
        let location = locations.first().copied().unwrap_or_default();
        let line = view.line_contents(location);
        let context = self.classifier.classify(&line);
        debug!("cursor context for {:?}: {:?}", line, context);
        context
    }

    fn with_keywords(&self, candidates: impl IntoIterator<Item = Candidate>) -> CandidateList {
        dedup_preserving_order(self.keywords.iter().cloned().chain(candidates))
    }

    /// Completions for the symbol under the first cursor
    pub async fn get_completions(&self, view: &dyn EditorView, locations: &[Location]) -> CandidateList {
        if !self.backend.is_available() {
            return Vec::new();
        }

        let file = view.file_name();
        if file.is_some() {
            *self.current_file.lock() = file.clone();
        }

        let context = self.classify(view, locations);
        let qsymbol = context.symbol;
        debug!(
            "current file {:?} qualified prefix {}",
            file,
            qsymbol.qualified_name()
        );

        let wide = self.take_wide(view.id());

        if let Some(module) = qsymbol.module.as_deref() {
            let suggestions = match file.as_deref() {
                Some(file) if qsymbol.is_import_list => self.import_list_declarations(file, module).await,
                Some(file) => {
                    let scope = CompletionScope::File { file: file.to_path_buf(), wide };
                    self.backend.prefix_complete(&qsymbol.qualified_name(), &scope).await
                }
                None => Vec::new(),
            };
            return self.with_keywords(make_completions(&suggestions));
        }

        let completions = match file.as_deref() {
            Some(file) if !wide => self.cache.file_or_global(file),
            _ => self.cache.global_candidates(),
        };
        self.with_keywords(completions)
    }

    /// Declarations `module` exports, as seen from `file`'s project
    async fn import_list_declarations(&self, file: &Path, module: &str) -> Vec<Declaration> {
        let current = self.backend.module(&ModuleQuery::by_file(file)).await;
        if current.as_ref().and_then(|m| m.project()).is_none() {
            return Vec::new();
        }

        let scoped = self.backend.scope_modules(file, Some(module), SearchType::Exact).await;
        let Some(target) = scoped.into_iter().next() else {
            return Vec::new();
        };

        if let Some(source) = target.filename() {
            self.backend
                .resolve_module(source, true)
                .await
                .map(|m| m.declarations)
                .unwrap_or_default()
        } else {
            let query = ModuleQuery::by_name(&target.name).in_package(target.package());
            self.backend
                .module(&query)
                .await
                .map(|m| m.declarations)
                .unwrap_or_default()
        }
    }

    /// Declarations of `module`, looked up in `file`'s scope when a file is given
    pub async fn completions_for_module(&self, module: &str, file: Option<&Path>) -> CandidateList {
        if !self.backend.is_available() || module.is_empty() {
            return Vec::new();
        }

        let scoped = match file {
            Some(file) => self.backend.scope_modules(file, Some(module), SearchType::Exact).await,
            None => Vec::new(),
        };
        let first = scoped.first();

        let query = ModuleQuery::by_name(module)
            .in_file(first.and_then(|m| m.filename()))
            .in_db(first.and_then(|m| m.db()))
            .in_package(first.and_then(|m| m.package()));

        match self.backend.module(&query).await {
            Some(found) => make_completions(&found.declarations),
            None => Vec::new(),
        }
    }

    /// Completions on `import` lines: import lists, module paths and the `qualified` hint
    pub async fn get_import_completions(&self, view: &dyn EditorView, locations: &[Location]) -> CandidateList {
        if !self.backend.is_available() {
            return Vec::new();
        }

        let file = view.file_name();
        *self.current_file.lock() = file.clone();

        if !self.settings.auto_complete_imports {
            return Vec::new();
        }

        let context = self.classify(view, locations);

        if let Some(module) = context.import_list_module() {
            return self.completions_for_module(module, file.as_deref()).await;
        }

        if let Some(prefix) = context.import_prefix.as_deref() {
            let modules = self.get_module_completions_for(prefix, None, None).await;
            if context.wants_qualified_hint() {
                let mut with_hint = vec![Candidate::new("qualified", "qualified ")];
                with_hint.extend(modules);
                return with_hint;
            }
            return modules;
        }

        Vec::new()
    }

    /// Pragma value completions (LANGUAGE extensions, OPTIONS_GHC flags)
    pub async fn get_special_completions(&self, view: &dyn EditorView, locations: &[Location]) -> CandidateList {
        if !self.backend.is_available() || !self.settings.auto_complete_language_pragmas {
            return Vec::new();
        }

        let values = match self.classify(view, locations).pragma {
            Some(PragmaKind::Language) => {
                Self::memoized(&self.language_pragmas, self.backend.language_pragmas()).await
            }
            Some(PragmaKind::OptionsGhc) => {
                Self::memoized(&self.compiler_flags, self.backend.compiler_flags()).await
            }
            None => return Vec::new(),
        };
        values.into_iter().map(Candidate::plain).collect()
    }

    /// Return the cached list, fetching it first if it is still empty
    ///
    /// The first non-empty fetch is kept for the rest of the process.
    async fn memoized(
        cell: &Mutex<Vec<String>>,
        fetch: impl std::future::Future<Output = Vec<String>>,
    ) -> Vec<String> {
        let cached = cell.lock().clone();
        if !cached.is_empty() {
            return cached;
        }
        let fetched = fetch.await;
        let mut cell = cell.lock();
        if cell.is_empty() {
            *cell = fetched;
        }
        cell.clone()
    }

    /// Next module path segments for a typed dotted prefix
    ///
    /// `Control.Con` against `Control.Concurrent.MVar` yields `Concurrent`: the
    /// editor replaces only the segment being typed, so only that segment is offered.
    pub async fn get_module_completions_for(
        &self,
        qualified_prefix: &str,
        modules: Option<&[String]>,
        current_dir: Option<&Path>,
    ) -> CandidateList {
        if !self.backend.is_available() {
            return Vec::new();
        }

        let module_list: Vec<String> = match modules {
            Some(modules) if !modules.is_empty() => modules.to_vec(),
            _ => self.current_module_completions(current_dir).await.into_iter().collect(),
        };

        let depth = qualified_prefix.split('.').count();
        sorted_completions(
            module_list
                .iter()
                .filter(|name| name.starts_with(qualified_prefix))
                .filter_map(|name| name.split('.').nth(depth - 1))
                .map(|segment| Candidate::with_kind(segment, "module", segment)),
        )
    }

    /// Names of the modules in scope
    ///
    /// With a current file, its scope; otherwise for `current_dir` the
    /// dependencies of the enclosing project, or the modules of the enclosing
    /// sandbox; with neither, every installed-package module.
    pub async fn current_module_completions(&self, current_dir: Option<&Path>) -> BTreeSet<String> {
        if !self.backend.is_available() {
            return BTreeSet::new();
        }

        let modules = if let Some(file) = self.current_file() {
            self.backend.scope_modules(&file, None, SearchType::Exact).await
        } else if let Some(dir) = current_dir {
            if let Some(project) = self.backend.project(dir).await {
                self.backend.list_modules(&ScopeSelector::Project(project.path)).await
            } else if let Some(sandbox) = self.backend.sandbox(dir).await {
                self.backend.list_modules(&ScopeSelector::Sandbox(sandbox)).await
            } else {
                Vec::new()
            }
        } else {
            self.backend.list_modules(&ScopeSelector::Cabal).await
        };

        modules.into_iter().map(|m| m.name).collect()
    }

    /// Whether a module-qualified completion can be served for `info`
    pub async fn can_complete_qualified_symbol(&self, info: &QualifiedSymbol) -> bool {
        let Some(module) = info.module.as_deref() else {
            return false;
        };
        let in_scope = self.current_module_completions(None).await;
        if info.is_import_list {
            in_scope.contains(module)
        } else {
            in_scope.iter().any(|m| m.starts_with(module))
        }
    }

    /// Resolve and cache the completions visible in `file`
    ///
    /// Returns the cached entry when present. Without a file name, or when the
    /// file's module cannot be resolved, the global list is returned; it is only
    /// stored under the file when a file name was given.
    pub async fn ensure_file_completions(&self, file: Option<&Path>) -> CandidateList {
        if !self.backend.is_available() {
            return Vec::new();
        }

        if let Some(cached) = file.and_then(|f| self.cache.get_file_candidates(f)) {
            trace!("completions: {}", cached.len());
            return cached;
        }

        let (update_cabal, update_sources) = self.cache.empty_partitions();
        if update_cabal {
            self.update_cabal_completions().await;
        }
        if update_sources {
            self.update_sources_completions().await;
        }
        let global = self.cache.global_candidates();

        let Some(file) = file else {
            trace!("completions: {}", global.len());
            return global;
        };

        debug!("preparing completions for {}", file.display());
        let completions = match self.backend.resolve_module(file, false).await {
            Some(module) => {
                let scope = CompletionScope::File { file: file.to_path_buf(), wide: false };
                let visible = self.backend.prefix_complete("", &scope).await;

                // A module imported `as X` can only be referred to as `X`
                let import_names = module.imports.iter().map(|i| match &i.import_as {
                    Some(alias) => Candidate::with_kind(alias, &format!("module {}", i.module), alias.clone()),
                    None => Candidate::with_kind(&i.module, "module", i.module.clone()),
                });

                sorted_completions(make_completions(&visible).into_iter().chain(import_names))
            }
            None => global,
        };

        trace!("completions: {}", completions.len());
        self.cache.set_file_candidates(file, completions.clone());
        completions
    }

    /// Refresh the installed-package partition
    pub async fn update_cabal_completions(&self) {
        let decls = self.backend.prefix_complete("", &CompletionScope::Installed).await;
        let completions = make_completions(&decls);
        debug!("cabal completions: {}", completions.len());
        self.cache.set_cabal_partition(completions);
    }

    /// Refresh the project-source partition and its source locations
    pub async fn update_sources_completions(&self) {
        let decls = self.backend.prefix_complete("", &CompletionScope::Sources).await;
        let completions = make_completions(&decls);
        debug!("source completions: {}", completions.len());
        self.cache.set_source_locations(make_locations(&completions));
        self.cache.set_source_partition(completions);
    }

    /// Drop one file's entry, or every entry when `file` is `None`
    pub fn drop_completions(&self, file: Option<&Path>) {
        match file {
            Some(file) => {
                debug!("drop prepared completions for {}", file.display());
                self.cache.invalidate(file);
            }
            None => {
                let dropped = self.cache.invalidate_all();
                info!("dropped prepared completions for {} files", dropped);
            }
        }
    }

    /// Populate the active view's file, if it is a saved Haskell source
    pub async fn init_completions(&self) {
        let Some(view) = self.workspace.as_ref().and_then(|w| w.active_view()) else {
            return;
        };
        if !view.is_haskell_source() {
            return;
        }
        if let Some(file) = view.file_name() {
            self.ensure_file_completions(Some(&file)).await;
        }
    }

    pub fn ensure_file_completions_async(self: &Arc<Self>, file: Option<PathBuf>) {
        let label = match &file {
            Some(file) => format!("get completions for {}", file.display()),
            None => "get global completions".to_string(),
        };
        let this = Arc::clone(self);
        self.runner.submit(
            label,
            async move {
                this.ensure_file_completions(file.as_deref()).await;
            }
            .boxed(),
        );
    }

    pub fn invalidate_file_completions(self: &Arc<Self>, file: PathBuf) {
        let this = Arc::clone(self);
        self.runner.submit(
            "drop completions".to_string(),
            async move { this.drop_completions(Some(&file)) }.boxed(),
        );
    }

    pub fn invalidate_all_completions(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.runner.submit(
            "drop all completions".to_string(),
            async move { this.drop_completions(None) }.boxed(),
        );
    }

    /// Drop stale entries, then repopulate the active view's file
    ///
    /// Both steps run in one task so repopulation always observes the drop.
    pub fn update_completions(self: &Arc<Self>, files: Vec<PathBuf>, drop_all: bool) {
        let this = Arc::clone(self);
        self.runner.submit(
            "update completions".to_string(),
            async move {
                if drop_all {
                    this.drop_completions(None);
                } else {
                    for file in &files {
                        this.drop_completions(Some(file));
                    }
                }
                this.init_completions().await;
            }
            .boxed(),
        );
    }

    /// Import, pragma and symbol completions for one editor query
    pub async fn query_completions(&self, view: &dyn EditorView, locations: &[Location]) -> CompletionResponse {
        if !view.is_haskell_source() {
            return CompletionResponse::default();
        }

        let started = Instant::now();
        let import = self.get_import_completions(view, locations).await;
        let special = self.get_special_completions(view, locations).await;
        let symbols = self.get_completions(view, locations).await;

        let items = dedup_preserving_order(symbols.into_iter().chain(import).chain(special));
        debug!("time to get completions: {:?}", started.elapsed());

        let inhibit = self.settings.inhibit_completions && !items.is_empty();
        CompletionResponse { items, inhibit }
    }

    /// View gained focus: prepare its completions in the background
    pub fn on_activated(self: &Arc<Self>, view: &dyn EditorView) {
        if view.is_haskell_source() {
            if let Some(file) = view.file_name() {
                self.ensure_file_completions_async(Some(file));
            }
        }
    }

    /// View was created, loaded or saved: reinspect it and rebuild all file entries
    pub fn on_file_changed(self: &Arc<Self>, view: &dyn EditorView) {
        if !view.is_inspected_source() {
            return;
        }
        let Some(file) = view.file_name() else {
            return;
        };
        let this = Arc::clone(self);
        self.runner.submit(
            format!("mark {} dirty", file.display()),
            async move {
                this.backend.mark_file_dirty(&file).await;
                this.update_completions(Vec::new(), true);
            }
            .boxed(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::TextView;
    use crate::worker::TokioTaskRunner;

    fn disconnected() -> CompletionCoordinator {
        CompletionCoordinator::new(
            GuardedBackend::disconnected(),
            Arc::new(TokioTaskRunner::current()),
            CompletionSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_wide_marker_is_per_view_and_one_shot() {
        let coordinator = disconnected();
        coordinator.mark_wide_completion(ViewId(1));
        assert!(!coordinator.take_wide(ViewId(2)));
        assert!(coordinator.take_wide(ViewId(1)));
        assert!(!coordinator.take_wide(ViewId(1)));
    }

    #[tokio::test]
    async fn test_every_entry_point_is_empty_without_backend() {
        let coordinator = disconnected();
        coordinator.cache().set_source_partition(vec![Candidate::plain("x")]);
        let view = TextView::new(1, Some("/p/A.hs".into()), "import ");
        let at = [view.end()];

        assert!(coordinator.get_completions(&view, &at).await.is_empty());
        assert!(coordinator.get_import_completions(&view, &at).await.is_empty());
        assert!(coordinator.get_special_completions(&view, &at).await.is_empty());
        assert!(coordinator.ensure_file_completions(Some(Path::new("/p/A.hs"))).await.is_empty());
        assert!(coordinator.current_module_completions(None).await.is_empty());
        assert!(coordinator.query_completions(&view, &at).await.items.is_empty());
    }

    #[tokio::test]
    async fn test_memoized_keeps_first_non_empty_value() {
        let cell = Mutex::new(Vec::new());
        let empty = CompletionCoordinator::memoized(&cell, async { Vec::new() }).await;
        assert!(empty.is_empty());

        let first = CompletionCoordinator::memoized(&cell, async { vec!["GADTs".to_string()] }).await;
        assert_eq!(first, vec!["GADTs"]);

        let again = CompletionCoordinator::memoized(&cell, async { vec!["Other".to_string()] }).await;
        assert_eq!(again, vec!["GADTs"]);
    }
}
