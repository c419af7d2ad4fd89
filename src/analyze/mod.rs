//! Go syntax-tree analysis.
//!
//! This module parses Go source files with tree-sitter-go, caches the trees
//! for the lifetime of one run, finds exported function and method
//! declarations matching name patterns, and answers positional queries
//! ("which call expression / which function encloses this position?").

pub mod format;
pub mod pattern;
pub mod position;

use crate::error::{GocallsError, Result};
use crate::resolve::PackageResolver;
use pattern::FuncPattern;
use ropey::Rope;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name reported for positions inside a function literal.
pub const ANONYMOUS_FUNCTION: &str = "anonymous function";

/// Name reported for positions outside any function.
pub const GLOBAL_SCOPE: &str = "global scope";

/// Create a tree-sitter parser for Go.
pub(crate) fn go_parser(path: &Path) -> Result<tree_sitter::Parser> {
    let mut parser = tree_sitter::Parser::new();
    let language: tree_sitter::Language = tree_sitter_go::LANGUAGE.into();
    parser
        .set_language(&language)
        .map_err(|e| GocallsError::Parse {
            file: path.to_path_buf(),
            message: format!("Failed to set Go language: {:?}", e),
        })?;
    Ok(parser)
}

/// A parsed Go source file.
///
/// Owns the source text, a rope for line/column conversion and the syntax
/// tree. Never mutated after parsing.
///
/// Syntax the grammar does not know (newer Go releases run ahead of
/// tree-sitter-go) is tolerated: error nodes are recorded and only queries
/// that touch them fail.
pub struct SourceFile {
    path: PathBuf,
    text: String,
    rope: Rope,
    tree: tree_sitter::Tree,
    line_count: usize,
    errors: Vec<Range<usize>>,
}

impl SourceFile {
    /// Parse Go source text that belongs to `path`.
    ///
    /// Fails with [`GocallsError::Parse`] only when the file has syntax
    /// errors and not even its package clause parses.
    pub fn parse(path: &Path, text: String) -> Result<Self> {
        let mut parser = go_parser(path)?;
        let tree = parser
            .parse(&text, None)
            .ok_or_else(|| GocallsError::Parse {
                file: path.to_path_buf(),
                message: "Parse failed - no tree returned".to_string(),
            })?;

        let rope = Rope::from_str(&text);
        let line_count = position::go_line_count(&text, rope.len_lines());
        let errors = syntax_errors(tree.root_node());
        let file = SourceFile {
            path: path.to_path_buf(),
            text,
            rope,
            tree,
            line_count,
            errors,
        };

        if let Some(first) = file.errors.first() {
            let (line, column) = file.line_column(first.start);
            if !has_package_clause(file.tree.root_node()) {
                return Err(GocallsError::Parse {
                    file: path.to_path_buf(),
                    message: format!("syntax error at {}:{}", line, column),
                });
            }
            log::warn!(
                "{}:{}:{}: {} syntax error(s), continuing with a partial tree",
                path.display(),
                line,
                column,
                file.errors.len()
            );
        }

        Ok(file)
    }

    /// Byte spans of error and missing nodes, in source order.
    pub fn syntax_errors(&self) -> &[Range<usize>] {
        &self.errors
    }

    /// Fail if `span` overlaps a syntax error.
    fn ensure_parsed(&self, span: Range<usize>) -> Result<()> {
        // Missing nodes are zero-width; they count when they sit inside or
        // at either edge of the span.
        let overlapping = self.errors.iter().find(|e| {
            if e.is_empty() || span.is_empty() {
                e.start <= span.end && span.start <= e.end
            } else {
                e.start < span.end && span.start < e.end
            }
        });
        match overlapping {
            Some(error) => {
                let (line, column) = self.line_column(error.start);
                Err(GocallsError::Parse {
                    file: self.path.clone(),
                    message: format!("syntax error at {}:{}", line, column),
                })
            }
            None => Ok(()),
        }
    }

    /// Path this file was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of lines, Go convention.
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// The syntax tree.
    pub fn tree(&self) -> &tree_sitter::Tree {
        &self.tree
    }

    fn node_text(&self, node: tree_sitter::Node) -> &str {
        &self.text[node.byte_range()]
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("path", &self.path)
            .field("line_count", &self.line_count)
            .finish()
    }
}

/// Spans of the outermost error nodes and of every missing node.
fn syntax_errors(root: tree_sitter::Node) -> Vec<Range<usize>> {
    let mut errors = Vec::new();
    if !root.has_error() {
        return errors;
    }
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            errors.push(node.byte_range());
            continue;
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            // Reverse so errors come out leftmost first.
            stack.extend(children.into_iter().rev());
        }
    }
    errors
}

fn has_package_clause(root: tree_sitter::Node) -> bool {
    let mut cursor = root.walk();
    let found = root
        .named_children(&mut cursor)
        .any(|n| n.kind() == "package_clause" && !n.has_error());
    found
}

/// An exported function or method declaration matched by a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionSite {
    /// Package identifier the definition was found through.
    pub package: String,

    /// Declared receiver type (e.g. `*Client`), empty for functions.
    pub receiver_type: String,

    /// Receiver variable name, empty if anonymous or no receiver.
    pub receiver_name: String,

    /// Function or method name.
    pub name: String,

    /// File containing the declaration.
    pub file: PathBuf,

    /// Line of the name identifier (1-based).
    pub line: usize,

    /// Column of the name identifier (1-based, UTF-16 code units).
    pub column: usize,
}

impl DefinitionSite {
    /// Human readable signature, e.g. `(c *Client) Do(...)`.
    pub fn display_name(&self) -> String {
        signature(&self.receiver_type, &self.receiver_name, &self.name)
    }
}

/// What lexically encloses a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// A top-level `func` declaration.
    Function,
    /// A method declaration with a receiver.
    Method,
    /// A `func` literal.
    FuncLiteral,
    /// Outside any function.
    Global,
}

/// The function or method that encloses a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnclosingContext {
    /// Kind of enclosing scope.
    pub kind: ScopeKind,

    /// Function name, or one of [`ANONYMOUS_FUNCTION`] / [`GLOBAL_SCOPE`].
    pub function: String,

    /// Receiver type for methods, empty otherwise.
    pub receiver_type: String,

    /// Receiver variable name for methods, empty if anonymous.
    pub receiver_name: String,
}

impl EnclosingContext {
    fn synthetic(kind: ScopeKind, name: &str) -> Self {
        EnclosingContext {
            kind,
            function: name.to_string(),
            receiver_type: String::new(),
            receiver_name: String::new(),
        }
    }
}

impl fmt::Display for EnclosingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScopeKind::Function | ScopeKind::Method => f.write_str(&signature(
                &self.receiver_type,
                &self.receiver_name,
                &self.function,
            )),
            ScopeKind::FuncLiteral | ScopeKind::Global => f.write_str(&self.function),
        }
    }
}

fn signature(receiver_type: &str, receiver_name: &str, name: &str) -> String {
    match (receiver_type.is_empty(), receiver_name.is_empty()) {
        (true, _) => format!("{}(...)", name),
        (false, true) => format!("({}) {}(...)", receiver_type, name),
        (false, false) => format!("({} {}) {}(...)", receiver_name, receiver_type, name),
    }
}

/// Parses and caches Go files, and answers definition and position queries.
pub struct Analyzer {
    resolver: Box<dyn PackageResolver>,
    files: HashMap<PathBuf, Arc<SourceFile>>,
}

impl Analyzer {
    /// Create an analyzer that resolves packages through `resolver`.
    pub fn new(resolver: Box<dyn PackageResolver>) -> Self {
        Self {
            resolver,
            files: HashMap::new(),
        }
    }

    /// Parse a file, or return the cached parse from an earlier call.
    pub fn parse_file(&mut self, path: &Path) -> Result<Arc<SourceFile>> {
        let path = std::path::absolute(path).map_err(|e| GocallsError::io(path, e))?;
        if let Some(file) = self.files.get(&path) {
            return Ok(Arc::clone(file));
        }

        let bytes = std::fs::read(&path).map_err(|e| GocallsError::io(&path, e))?;
        let text = String::from_utf8(bytes).map_err(|e| GocallsError::Parse {
            file: path.clone(),
            message: format!("source is not valid UTF-8: {}", e.utf8_error()),
        })?;
        let file = Arc::new(SourceFile::parse(&path, text)?);
        log::trace!("parsed {} ({} lines)", path.display(), file.line_count());

        self.files.insert(path, Arc::clone(&file));
        Ok(file)
    }

    /// Find exported top-level functions and methods of `package` matching
    /// any of `patterns`.
    ///
    /// A pattern is a glob on the function name, or `TypeGlob.MethodGlob`
    /// to match methods whose receiver type (pointer stripped) matches.
    pub fn find_definitions<S: AsRef<str>>(
        &mut self,
        package: &str,
        patterns: &[S],
    ) -> Result<Vec<DefinitionSite>> {
        let patterns = patterns
            .iter()
            .map(|p| FuncPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let resolved = self.resolver.resolve(package)?;
        log::debug!(
            "package {} resolved to {} ({} files)",
            package,
            resolved.dir.display(),
            resolved.files.len()
        );

        let mut definitions = Vec::new();
        for path in &resolved.files {
            let file = self.parse_file(path)?;
            let root = file.tree().root_node();
            let mut cursor = root.walk();
            for decl in root.named_children(&mut cursor) {
                if !matches!(decl.kind(), "function_declaration" | "method_declaration") {
                    continue;
                }
                let Some(name_node) = decl.child_by_field_name("name") else {
                    continue;
                };
                let name = file.node_text(name_node);
                if !is_exported(name) {
                    continue;
                }

                let (receiver_type, receiver_name) = receiver(&file, decl);
                if !patterns
                    .iter()
                    .any(|p| p.matches(receiver_type.as_deref(), name))
                {
                    continue;
                }
                file.ensure_parsed(decl.byte_range())?;

                let (line, column) = file.line_column(name_node.start_byte());
                definitions.push(DefinitionSite {
                    package: package.to_string(),
                    receiver_type: receiver_type.unwrap_or_default(),
                    receiver_name,
                    name: name.to_string(),
                    file: file.path().to_path_buf(),
                    line,
                    column,
                });
            }
        }

        Ok(definitions)
    }

    /// Describe the innermost function, method or func literal containing
    /// the position.
    pub fn enclosing_context(
        &mut self,
        path: &Path,
        line: usize,
        column: usize,
    ) -> Result<EnclosingContext> {
        let file = self.parse_file(path)?;
        let offset = file.offset(line, column)?;
        file.ensure_parsed(offset..offset)?;

        let node = smallest_enclosing(
            file.tree().root_node(),
            offset,
            &["function_declaration", "method_declaration", "func_literal"],
        );
        let Some(node) = node else {
            return Ok(EnclosingContext::synthetic(ScopeKind::Global, GLOBAL_SCOPE));
        };

        if node.kind() == "func_literal" {
            return Ok(EnclosingContext::synthetic(
                ScopeKind::FuncLiteral,
                ANONYMOUS_FUNCTION,
            ));
        }

        let function = node
            .child_by_field_name("name")
            .map(|n| file.node_text(n).to_string())
            .unwrap_or_default();
        let (receiver_type, receiver_name) = receiver(&file, node);
        let kind = if node.kind() == "method_declaration" {
            ScopeKind::Method
        } else {
            ScopeKind::Function
        };

        Ok(EnclosingContext {
            kind,
            function,
            receiver_type: receiver_type.unwrap_or_default(),
            receiver_name,
        })
    }

    /// Exact source text of the innermost call expression containing the
    /// position.
    pub fn call_expression_at(&mut self, path: &Path, line: usize, column: usize) -> Result<String> {
        let file = self.parse_file(path)?;
        let offset = file.offset(line, column)?;
        file.ensure_parsed(offset..offset)?;

        smallest_enclosing(file.tree().root_node(), offset, &["call_expression"])
            .map(|node| file.node_text(node).to_string())
            .ok_or_else(|| GocallsError::NoCallExpression {
                file: file.path().to_path_buf(),
                line,
                column,
            })
    }
}

/// Go exports identifiers starting with an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Receiver type and variable name of a method declaration.
///
/// Returns `(None, "")` for plain functions and for receiver lists that do
/// not hold exactly one parameter.
fn receiver(file: &SourceFile, decl: tree_sitter::Node) -> (Option<String>, String) {
    let Some(list) = decl.child_by_field_name("receiver") else {
        return (None, String::new());
    };
    let mut cursor = list.walk();
    let params: Vec<_> = list
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "parameter_declaration")
        .collect();
    let [param] = params.as_slice() else {
        return (None, String::new());
    };

    let receiver_type = param
        .child_by_field_name("type")
        .map(|n| file.node_text(n).split_whitespace().collect::<Vec<_>>().join(" "));
    let receiver_name = param
        .child_by_field_name("name")
        .map(|n| file.node_text(n).to_string())
        .unwrap_or_default();
    (receiver_type, receiver_name)
}

/// Smallest node of one of `kinds` whose span contains `offset` (end
/// inclusive).
fn smallest_enclosing<'t>(
    root: tree_sitter::Node<'t>,
    offset: usize,
    kinds: &[&str],
) -> Option<tree_sitter::Node<'t>> {
    let mut best: Option<tree_sitter::Node<'t>> = None;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.start_byte() > offset || node.end_byte() < offset {
            continue;
        }
        if kinds.contains(&node.kind())
            && best.map_or(true, |b| node.byte_range().len() <= b.byte_range().len())
        {
            best = Some(node);
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ResolvedPackage;
    use std::io::Write;
    use tempfile::TempDir;

    struct FixedPackage(ResolvedPackage);

    impl PackageResolver for FixedPackage {
        fn resolve(&self, package: &str) -> Result<ResolvedPackage> {
            if package == self.0.import_path {
                Ok(self.0.clone())
            } else {
                Err(GocallsError::Resolution {
                    package: package.to_string(),
                    message: "not found".to_string(),
                })
            }
        }
    }

    const CLIENT_GO: &str = r#"package client

type Client struct{}

type List[T any] struct{}

func New() *Client { return &Client{} }

func helper() {}

func (c *Client) Do(req string) error {
	return nil
}

func (Client) Close() {}

func (c *Client) internal() {}

func (l *List[T]) Push(v T) {}

var handler = func() {
	Run(Wrap(New()))
}

func Run(fns ...interface{}) {
	go func() {
		New().Do("x")
	}()
}

func Wrap(c *Client) interface{} { return c }
"#;

    fn workspace() -> (TempDir, Analyzer, PathBuf) {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("client.go");
        let mut f = std::fs::File::create(&path).expect("create");
        f.write_all(CLIENT_GO.as_bytes()).expect("write");

        let resolver = FixedPackage(ResolvedPackage {
            import_path: "example.com/client".to_string(),
            dir: dir.path().to_path_buf(),
            files: vec![path.clone()],
        });
        (dir, Analyzer::new(Box::new(resolver)), path)
    }

    fn names(defs: &[DefinitionSite]) -> Vec<String> {
        defs.iter().map(|d| d.display_name()).collect()
    }

    fn position_of(needle: &str) -> (usize, usize) {
        let offset = CLIENT_GO.find(needle).expect("needle");
        let before = &CLIENT_GO[..offset];
        let line = before.matches('\n').count() + 1;
        let column = offset - before.rfind('\n').map_or(0, |i| i + 1) + 1;
        (line, column)
    }

    #[test]
    fn test_parse_file_is_cached() {
        let (_dir, mut analyzer, path) = workspace();
        let first = analyzer.parse_file(&path).unwrap();
        let second = analyzer.parse_file(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.go");
        std::fs::write(&path, "}}} not go at all {{{\n").unwrap();
        let mut analyzer = Analyzer::new(Box::new(FixedPackage(ResolvedPackage {
            import_path: "x".to_string(),
            dir: dir.path().to_path_buf(),
            files: vec![],
        })));

        match analyzer.parse_file(&path) {
            Err(GocallsError::Parse { file, .. }) => assert_eq!(file, path),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    /// Generic type aliases (Go 1.24) are newer than the grammar.
    const ALIAS_GO: &str = "package lib

type Set[T comparable] = map[T]struct{}

func Bar() {}

func Foo() { Bar() }
";

    #[test]
    fn test_unknown_syntax_is_tolerated_outside_queries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alias.go");
        std::fs::write(&path, ALIAS_GO).unwrap();
        let mut analyzer = Analyzer::new(Box::new(FixedPackage(ResolvedPackage {
            import_path: "example.com/lib".to_string(),
            dir: dir.path().to_path_buf(),
            files: vec![path.clone()],
        })));

        let file = analyzer.parse_file(&path).unwrap();
        let first_error = file.syntax_errors().first().cloned().expect("alias is an error");
        assert_eq!(file.line_column(first_error.start).0, 3);

        let defs = analyzer.find_definitions("example.com/lib", &["Bar"]).unwrap();
        assert_eq!(names(&defs), vec!["Bar(...)"]);
        assert_eq!((defs[0].line, defs[0].column), (5, 6));

        assert_eq!(analyzer.call_expression_at(&path, 7, 14).unwrap(), "Bar()");
        assert_eq!(
            analyzer.enclosing_context(&path, 7, 14).unwrap().to_string(),
            "Foo(...)"
        );

        let (line, column) = file.line_column(first_error.start);
        assert!(matches!(
            analyzer.call_expression_at(&path, line, column),
            Err(GocallsError::Parse { .. })
        ));
        assert!(matches!(
            analyzer.enclosing_context(&path, line, column),
            Err(GocallsError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let (dir, mut analyzer, _) = workspace();
        let missing = dir.path().join("nope.go");
        assert!(matches!(
            analyzer.parse_file(&missing),
            Err(GocallsError::Io { .. })
        ));
    }

    #[test]
    fn test_find_bare_function_glob() {
        let (_dir, mut analyzer, _) = workspace();
        let defs = analyzer
            .find_definitions("example.com/client", &["New", "R*"])
            .unwrap();
        assert_eq!(names(&defs), vec!["New(...)", "Run(...)"]);

        let new = &defs[0];
        assert_eq!((new.line, new.column), position_of("New() *Client"));
        assert_eq!(new.package, "example.com/client");
    }

    #[test]
    fn test_find_receiver_patterns() {
        let (_dir, mut analyzer, _) = workspace();
        let defs = analyzer
            .find_definitions("example.com/client", &["Client.*"])
            .unwrap();
        assert_eq!(names(&defs), vec!["(c *Client) Do(...)", "(Client) Close(...)"]);
        assert_eq!((defs[0].line, defs[0].column), position_of("Do(req"));

        // Generic receivers keep their type parameters.
        let defs = analyzer
            .find_definitions("example.com/client", &["List*.Push"])
            .unwrap();
        assert_eq!(names(&defs), vec!["(l *List[T]) Push(...)"]);
    }

    #[test]
    fn test_unexported_and_receiverless_never_match() {
        let (_dir, mut analyzer, _) = workspace();
        let defs = analyzer
            .find_definitions("example.com/client", &["helper", "Client.internal", "*.New"])
            .unwrap();
        assert!(defs.is_empty(), "unexpected: {:?}", names(&defs));
    }

    #[test]
    fn test_unknown_package_is_resolution_error() {
        let (_dir, mut analyzer, _) = workspace();
        assert!(matches!(
            analyzer.find_definitions("example.com/missing", &["New"]),
            Err(GocallsError::Resolution { .. })
        ));
    }

    #[test]
    fn test_call_expression_innermost_wins() {
        let (_dir, mut analyzer, path) = workspace();
        let (line, column) = position_of("New()))");
        assert_eq!(analyzer.call_expression_at(&path, line, column).unwrap(), "New()");

        let (line, column) = position_of("Wrap(New");
        assert_eq!(
            analyzer.call_expression_at(&path, line, column).unwrap(),
            "Wrap(New())"
        );

        let (line, column) = position_of("Do(\"x\")");
        assert_eq!(
            analyzer.call_expression_at(&path, line, column).unwrap(),
            "New().Do(\"x\")"
        );
    }

    #[test]
    fn test_call_expression_missing() {
        let (_dir, mut analyzer, path) = workspace();
        let (line, column) = position_of("Client struct{}");
        assert!(matches!(
            analyzer.call_expression_at(&path, line, column),
            Err(GocallsError::NoCallExpression { .. })
        ));
    }

    #[test]
    fn test_enclosing_contexts() {
        let (_dir, mut analyzer, path) = workspace();

        let (line, column) = position_of("nil\n");
        let ctx = analyzer.enclosing_context(&path, line, column).unwrap();
        assert_eq!(ctx.kind, ScopeKind::Method);
        assert_eq!(ctx.to_string(), "(c *Client) Do(...)");

        let (line, column) = position_of("&Client{}");
        let ctx = analyzer.enclosing_context(&path, line, column).unwrap();
        assert_eq!(ctx.kind, ScopeKind::Function);
        assert_eq!(ctx.function, "New");

        let (line, column) = position_of("Do(\"x\")");
        let ctx = analyzer.enclosing_context(&path, line, column).unwrap();
        assert_eq!(ctx.kind, ScopeKind::FuncLiteral);
        assert_eq!(ctx.function, ANONYMOUS_FUNCTION);

        let (line, column) = position_of("handler");
        let ctx = analyzer.enclosing_context(&path, line, column).unwrap();
        assert_eq!(ctx.kind, ScopeKind::Global);
        assert_eq!(ctx.to_string(), GLOBAL_SCOPE);
    }

    #[test]
    fn test_positions_out_of_range() {
        let (_dir, mut analyzer, path) = workspace();
        for line in [0, 10_000] {
            assert!(matches!(
                analyzer.enclosing_context(&path, line, 1),
                Err(GocallsError::Position { .. })
            ));
            assert!(matches!(
                analyzer.call_expression_at(&path, line, 1),
                Err(GocallsError::Position { .. })
            ));
        }
    }
}
