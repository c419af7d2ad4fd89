//! Definition → call site correlation.
//!
//! The [`Matcher`] asks the analyzer for matching definitions, asks a
//! [`ReferenceProvider`] (gopls in production) where each one is used, and
//! turns every in-workspace use into a [`ResultEntry`] describing the call
//! and the function it sits in.

use crate::analyze::format::format_snippet;
use crate::analyze::{Analyzer, DefinitionSite, EnclosingContext};
use crate::error::Result;
use crate::lsp::ReferenceLocation;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Source of references for a symbol position.
pub trait ReferenceProvider {
    /// References to the symbol whose identifier is at the 1-based
    /// `line`/`column` of `file`.
    fn references(
        &mut self,
        file: &Path,
        line: usize,
        column: usize,
    ) -> Result<Vec<ReferenceLocation>>;
}

/// One call site of a matched definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultEntry {
    /// File containing the call.
    pub file: PathBuf,

    /// Line of the reference (1-based).
    pub line: usize,

    /// Column of the reference (1-based, UTF-16 code units).
    pub column: usize,

    /// Display name of the definition being called.
    pub target: String,

    /// Enclosing function, method or scope; displays as e.g. `Foo(...)`.
    pub context: EnclosingContext,

    /// Call expression exactly as written.
    pub source: String,

    /// Call expression re-rendered canonically.
    pub pretty_source: String,
}

/// Correlates definitions with their call sites.
pub struct Matcher<P: ReferenceProvider> {
    analyzer: Analyzer,
    provider: P,
    workspace_root: PathBuf,
    entries: Vec<ResultEntry>,
}

impl<P: ReferenceProvider> Matcher<P> {
    /// Create a matcher; `workspace_root` must be absolute.
    pub fn new(analyzer: Analyzer, provider: P, workspace_root: impl Into<PathBuf>) -> Self {
        Matcher {
            analyzer,
            provider,
            workspace_root: workspace_root.into(),
            entries: Vec::new(),
        }
    }

    /// Add the call sites of every definition in `package` matching any of
    /// `patterns`. May be called repeatedly; entries accumulate.
    ///
    /// Any failure aborts the call; entries added before it are kept.
    pub fn find_references<S: AsRef<str>>(&mut self, package: &str, patterns: &[S]) -> Result<()> {
        let definitions = self.analyzer.find_definitions(package, patterns)?;
        for def in &definitions {
            log::debug!(
                "found {} -> {} at {}:{}:{}",
                def.package,
                def.display_name(),
                def.file.display(),
                def.line,
                def.column
            );
        }

        for def in &definitions {
            let references = self.provider.references(&def.file, def.line, def.column)?;
            log::debug!(
                "{} references to {}",
                references.len(),
                def.display_name()
            );
            for reference in references {
                if !self.is_candidate(def, &reference) {
                    continue;
                }
                let entry = self.entry_for(def, &reference)?;
                self.entries.push(entry);
            }
        }
        Ok(())
    }

    fn is_candidate(&self, def: &DefinitionSite, reference: &ReferenceLocation) -> bool {
        if reference.file == def.file
            && reference.start_line == def.line
            && reference.start_column == def.column
        {
            // The declaration itself, echoed because includeDeclaration is set.
            return false;
        }
        if !within_workspace(&self.workspace_root, &reference.file) {
            log::debug!(
                "skipping {}:{}: outside workspace",
                reference.file.display(),
                reference.start_line
            );
            return false;
        }
        true
    }

    fn entry_for(
        &mut self,
        def: &DefinitionSite,
        reference: &ReferenceLocation,
    ) -> Result<ResultEntry> {
        let (file, line, column) = (&reference.file, reference.start_line, reference.start_column);
        let context = self.analyzer.enclosing_context(file, line, column)?;
        let source = self.analyzer.call_expression_at(file, line, column)?;
        Ok(ResultEntry {
            file: file.clone(),
            line,
            column,
            target: def.display_name(),
            context,
            pretty_source: format_snippet(&source),
            source,
        })
    }

    /// Order entries by file path bytes then line. Stable, so entries on the
    /// same line keep discovery order.
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            a.file
                .as_os_str()
                .cmp(b.file.as_os_str())
                .then(a.line.cmp(&b.line))
        });
    }

    /// Entries collected so far.
    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    /// Consume the matcher, returning its entries.
    pub fn into_entries(self) -> Vec<ResultEntry> {
        self.entries
    }

    /// The reference provider.
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }
}

/// Under `root` (component-wise) but not under `root/vendor`.
fn within_workspace(root: &Path, file: &Path) -> bool {
    file.starts_with(root) && !file.starts_with(root.join("vendor"))
}
