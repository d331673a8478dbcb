//! Shared fixtures for coordinator integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use indoc::indoc;

use hs_autocomplete::backend::{GuardedBackend, StaticBackend};
use hs_autocomplete::config::CompletionSettings;
use hs_autocomplete::coordinator::CompletionCoordinator;
use hs_autocomplete::editor::{EditorView, TextView, Workspace};
use hs_autocomplete::worker::TokioTaskRunner;

pub const MAIN_HS: &str = "/work/demo/src/Main.hs";
pub const UTIL_HS: &str = "/work/demo/src/Demo/Util.hs";

/// A small project: `Main` imports `Demo.Util`, `Data.List` and `Data.Map as M`
pub const INDEX: &str = indoc! {r#"
    {
      "modules": [
        { "name": "Main",
          "location": { "source": { "file": "/work/demo/src/Main.hs", "project": "/work/demo" } },
          "imports": [ { "module": "Demo.Util" },
                       { "module": "Data.List" },
                       { "module": "Data.Map", "qualified": true, "as": "M" } ],
          "declarations": [ { "name": "main", "type": "IO ()",
                              "location": { "file": "/work/demo/src/Main.hs", "position": { "line": 8, "column": 1 } } } ] },
        { "name": "Demo.Util",
          "location": { "source": { "file": "/work/demo/src/Demo/Util.hs", "project": "/work/demo" } },
          "declarations": [ { "name": "helper", "type": "Int -> Int",
                              "location": { "file": "/work/demo/src/Demo/Util.hs", "position": { "line": 3, "column": 1 } } },
                            { "name": "Config", "kind": "type" } ] },
        { "name": "Data.List",
          "location": { "installed": { "package": { "name": "base", "version": "4.18" } } },
          "declarations": [ { "name": "foldr" }, { "name": "sortOn" } ] },
        { "name": "Data.Map",
          "location": { "installed": { "package": { "name": "containers" } } },
          "declarations": [ { "name": "fromList" }, { "name": "insert" } ] },
        { "name": "Control.Concurrent.MVar",
          "location": { "installed": { "package": { "name": "base" } } },
          "declarations": [ { "name": "newMVar" } ] },
        { "name": "Control.Concurrent",
          "location": { "installed": { "package": { "name": "base" } } },
          "declarations": [ { "name": "forkIO" } ] },
        { "name": "Control.Monad",
          "location": { "installed": { "package": { "name": "base" } } },
          "declarations": [ { "name": "forM_" } ] }
      ],
      "projects": [ { "name": "demo", "path": "/work/demo" } ],
      "languages": ["GADTs", "OverloadedStrings", "LambdaCase"],
      "flags": ["-Wall", "-Werror"]
    }
"#};

pub struct Fixture {
    pub backend: StaticBackend,
    pub runner: Arc<TokioTaskRunner>,
    pub coordinator: Arc<CompletionCoordinator>,
}

pub struct ActiveView(pub Option<Arc<dyn EditorView>>);

impl Workspace for ActiveView {
    fn active_view(&self) -> Option<Arc<dyn EditorView>> {
        self.0.clone()
    }
}

/// Must be called from inside a tokio runtime
pub fn fixture_with(settings: CompletionSettings, active: Option<Arc<dyn EditorView>>) -> Fixture {
    let backend = StaticBackend::from_json(INDEX).expect("fixture index parses");
    let runner = Arc::new(TokioTaskRunner::current());
    let guarded = GuardedBackend::new(Arc::new(backend.clone()), settings.backend_timeout());
    let coordinator = CompletionCoordinator::new(guarded, runner.clone(), settings)
        .with_workspace(Arc::new(ActiveView(active)));
    Fixture {
        backend,
        runner,
        coordinator: Arc::new(coordinator),
    }
}

pub fn fixture() -> Fixture {
    fixture_with(CompletionSettings::default(), None)
}

/// A view on `file` whose only line is `line`, cursor at its end
pub fn view(id: u64, file: Option<&str>, line: &str) -> TextView {
    TextView::new(id, file.map(PathBuf::from), line)
}

pub fn inserts(items: &[hs_autocomplete::Candidate]) -> Vec<&str> {
    items.iter().map(|c| c.insert.as_str()).collect()
}
