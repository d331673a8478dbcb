//! Cursor context classification
//!
//! Looks at the text of the current line up to the cursor and decides what kind
//! of completion is being asked for: an `import` module path, an explicit
//! import list, a pragma value, a qualified symbol or a plain identifier.
//! Lines that match nothing classify as plain identifier completion.

use once_cell::sync::Lazy;
use regex::Regex;

/// `{-# LANGUAGE ...`
static LANGUAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{-#\s+LANGUAGE").unwrap());

/// `{-# OPTIONS_GHC ...`
static OPTIONS_GHC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{-#\s+OPTIONS_GHC").unwrap());

/// `import [qualified] Some.Mod` with the cursor still in the module path
static IMPORT_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*import(?:\s+qualified)?\s+(?P<prefix>[\w.]*)$").unwrap());

/// `import <word>` where `<word>` might still become `qualified`
static IMPORT_QUALIFIED_POSSIBLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"import\s+(?P<qualifiedprefix>\S*)$").unwrap());

/// `import [qualified] Some.Mod [as X] [hiding] (a, b, c`
static IMPORT_SYMBOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\bimport(?:\s+qualified)?\s+",
        r"(?P<module>[A-Z][\w']*(?:\.[A-Z][\w']*)*)",
        r"(?:\s+as\s+[A-Z][\w']*)?(?:\s+hiding)?\s*\(",
        r"(?:.*[,(]\s*)?(?P<identifier>[\w']*)$",
    ))
    .unwrap()
});

/// `Some.Mod.ident` or `ident` at the end of the line
static SYMBOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:(?P<module>[A-Z][\w']*(?:\.[A-Z][\w']*)*)\.)?(?P<identifier>[\w']*)$").unwrap()
});

/// Symbol under the cursor, possibly module-qualified
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualifiedSymbol {
    pub module: Option<String>,
    pub name: String,
    /// The symbol sits inside an `import M (...)` list, `module` is `M`
    pub is_import_list: bool,
}

impl QualifiedSymbol {
    /// `Module.name`, or just `name` when unqualified
    pub fn qualified_name(&self) -> String {
        match &self.module {
            Some(module) => format!("{}.{}", module, self.name),
            None => self.name.clone(),
        }
    }
}

/// Which pragma the cursor is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PragmaKind {
    Language,
    OptionsGhc,
}

/// Everything the coordinator needs to know about the cursor position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorContext {
    pub symbol: QualifiedSymbol,
    /// Typed module path of an `import` line still being written
    pub import_prefix: Option<String>,
    /// The word right after `import `, when `qualified` could still be typed there
    pub qualified_prefix: Option<String>,
    pub pragma: Option<PragmaKind>,
}

impl CursorContext {
    /// Module whose import list the cursor is in
    pub fn import_list_module(&self) -> Option<&str> {
        if self.symbol.is_import_list {
            self.symbol.module.as_deref()
        } else {
            None
        }
    }

    /// Whether a `qualified ` hint belongs in front of import suggestions
    pub fn wants_qualified_hint(&self) -> bool {
        self.qualified_prefix
            .as_deref()
            .is_some_and(|prefix| prefix.is_empty() || "qualified".starts_with(prefix))
    }
}

/// Turns line text into a [`CursorContext`]
pub trait ContextClassifier: Send + Sync {
    /// `line` is the current line's text up to the cursor
    fn classify(&self, line: &str) -> CursorContext;
}

/// Pattern-based classifier for Haskell source lines
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexClassifier;

impl RegexClassifier {
    pub fn qualified_symbol(line: &str) -> QualifiedSymbol {
        if let Some(caps) = IMPORT_SYMBOL_RE.captures(line) {
            return QualifiedSymbol {
                module: caps.name("module").map(|m| m.as_str().to_string()),
                name: caps.name("identifier").map_or_else(String::new, |m| m.as_str().to_string()),
                is_import_list: true,
            };
        }
        match SYMBOL_RE.captures(line) {
            Some(caps) => QualifiedSymbol {
                module: caps.name("module").map(|m| m.as_str().to_string()),
                name: caps.name("identifier").map_or_else(String::new, |m| m.as_str().to_string()),
                is_import_list: false,
            },
            None => QualifiedSymbol::default(),
        }
    }
}

impl ContextClassifier for RegexClassifier {
    fn classify(&self, line: &str) -> CursorContext {
        let pragma = if LANGUAGE_RE.is_match(line) {
            Some(PragmaKind::Language)
        } else if OPTIONS_GHC_RE.is_match(line) {
            Some(PragmaKind::OptionsGhc)
        } else {
            None
        };

        let import_prefix = IMPORT_PREFIX_RE
            .captures(line)
            .and_then(|caps| caps.name("prefix"))
            .map(|m| m.as_str().to_string());

        let qualified_prefix = IMPORT_QUALIFIED_POSSIBLE_RE
            .captures(line)
            .and_then(|caps| caps.name("qualifiedprefix"))
            .map(|m| m.as_str().to_string());

        CursorContext {
            symbol: Self::qualified_symbol(line),
            import_prefix,
            qualified_prefix,
            pragma,
        }
    }
}
