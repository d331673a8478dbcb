//! Editor-side view abstraction
//!
//! The completion core only needs three things from an editor view: a stable
//! identity, the file it shows (if saved) and the text of a line up to a cursor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of an editor view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub u64);

/// A cursor position (0-based line and character column)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

pub fn is_haskell_file(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("hs" | "lhs" | "hsc"))
}

pub fn is_cabal_file(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("cabal"))
        || path.file_name().and_then(|n| n.to_str()) == Some("package.yaml")
}

pub trait EditorView: Send + Sync {
    fn id(&self) -> ViewId;

    /// Path of the file shown in the view; `None` for unsaved buffers
    fn file_name(&self) -> Option<PathBuf>;

    /// Text of the line at `location`, up to the cursor
    fn line_contents(&self, location: Location) -> String;

    fn is_haskell_source(&self) -> bool {
        self.file_name().is_some_and(|f| is_haskell_file(&f))
    }

    /// Sources whose changes the backend must reinspect (Haskell and package files)
    fn is_inspected_source(&self) -> bool {
        self.file_name().is_some_and(|f| is_haskell_file(&f) || is_cabal_file(&f))
    }
}

/// The editor window as seen by background population
pub trait Workspace: Send + Sync {
    fn active_view(&self) -> Option<Arc<dyn EditorView>>;
}

/// A view over an in-memory text buffer
#[derive(Debug, Clone)]
pub struct TextView {
    id: ViewId,
    file: Option<PathBuf>,
    text: String,
}

impl TextView {
    pub fn new(id: u64, file: Option<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            id: ViewId(id),
            file,
            text: text.into(),
        }
    }

    /// Location just past the last character of the buffer
    pub fn end(&self) -> Location {
        let line = self.text.split('\n').count().saturating_sub(1);
        let column = self.text.rsplit('\n').next().map_or(0, |l| l.chars().count());
        Location::new(line as u32, column as u32)
    }
}

impl EditorView for TextView {
    fn id(&self) -> ViewId {
        self.id
    }

    fn file_name(&self) -> Option<PathBuf> {
        self.file.clone()
    }

    fn line_contents(&self, location: Location) -> String {
        self.text
            .split('\n')
            .nth(location.line as usize)
            .map(|line| line.chars().take(location.column as usize).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_contents_up_to_cursor() {
        let view = TextView::new(1, None, "module Main where\nimport Data.List\n");
        assert_eq!(view.line_contents(Location::new(1, 9)), "import Da");
        assert_eq!(view.line_contents(Location::new(7, 0)), "");
    }

    #[test]
    fn test_end_location() {
        let view = TextView::new(1, None, "a\nimport Con");
        assert_eq!(view.end(), Location::new(1, 10));
        assert_eq!(view.line_contents(view.end()), "import Con");
    }

    #[test]
    fn test_source_kinds() {
        let hs = TextView::new(1, Some("/p/src/Main.hs".into()), "");
        let cabal = TextView::new(2, Some("/p/demo.cabal".into()), "");
        let unsaved = TextView::new(3, None, "");
        assert!(hs.is_haskell_source() && hs.is_inspected_source());
        assert!(!cabal.is_haskell_source() && cabal.is_inspected_source());
        assert!(!unsaved.is_haskell_source());
    }
}
