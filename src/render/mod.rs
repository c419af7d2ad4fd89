//! Output formats for result entries.
//!
//! Both renderers expect entries already sorted by the matcher.

use crate::analyze::EnclosingContext;
use crate::correlate::ResultEntry;
use crate::error::Result;
use std::io::Write;

/// One JSON object per entry, one entry per line.
pub fn json_lines<W: Write>(entries: &[ResultEntry], writer: &mut W) -> Result<()> {
    for entry in entries {
        serde_json::to_writer(&mut *writer, entry)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Human readable listing grouped by file and enclosing function.
///
/// ```text
///
/// +++ /w/lib.go:6
///
/// Foo(...)
///     6  Bar()
/// ...
///     7  Bar()
/// ```
///
/// Each file starts with a `+++ file:line` header. The enclosing function
/// is printed whenever it changes; a further call in the same function is
/// marked with `...`. Snippet lines are numbered from the call's line.
pub fn pretty<W: Write>(entries: &[ResultEntry], writer: &mut W) -> Result<()> {
    let mut last_file = None;
    let mut last_context: Option<&EnclosingContext> = None;

    for entry in entries {
        if last_file != Some(&entry.file) {
            writeln!(writer)?;
            writeln!(writer, "+++ {}:{}", entry.file.display(), entry.line)?;
            last_file = Some(&entry.file);
            last_context = None;
        }

        if last_context == Some(&entry.context) {
            writeln!(writer, "...")?;
        } else {
            writeln!(writer)?;
            writeln!(writer, "{}", entry.context)?;
            last_context = Some(&entry.context);
        }

        for (i, line) in entry.pretty_source.split('\n').enumerate() {
            writeln!(writer, "{:5}  {}", entry.line + i, line)?;
        }
    }
    writer.flush()?;
    Ok(())
}
