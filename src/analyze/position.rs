//! Line/column ↔ byte offset conversion for parsed Go files.
//!
//! Public positions are 1-based lines and 1-based columns counted in UTF-16
//! code units, which is what gopls speaks (shifted to 0-based on the wire).
//! For ASCII source a column is simply the byte offset within the line plus one.

use super::SourceFile;
use crate::error::{GocallsError, Result};

impl SourceFile {
    /// Convert a 1-based (line, column) into a byte offset into the source.
    ///
    /// One past the last character of a line is accepted so that end
    /// positions of spans can be converted too.
    pub fn offset(&self, line: usize, column: usize) -> Result<usize> {
        if line == 0 || line > self.line_count {
            return Err(self.position_error(
                line,
                column,
                format!("line outside 1..={}", self.line_count),
            ));
        }
        if column == 0 {
            return Err(self.position_error(line, column, "columns are 1-based".to_string()));
        }

        let line_idx = line - 1;
        let line_len = self.line_len_utf16(line_idx);
        if column - 1 > line_len {
            return Err(self.position_error(
                line,
                column,
                format!("column past end of line ({} code units)", line_len),
            ));
        }

        let line_start = self.rope.line_to_char(line_idx);
        let start_cu = self.rope.char_to_utf16_cu(line_start);
        let char_idx = self.rope.utf16_cu_to_char(start_cu + column - 1);
        Ok(self.rope.char_to_byte(char_idx))
    }

    /// Convert a byte offset into a 1-based (line, column).
    pub fn line_column(&self, byte: usize) -> (usize, usize) {
        let char_idx = self.rope.byte_to_char(byte.min(self.rope.len_bytes()));
        let line_idx = self.rope.char_to_line(char_idx);
        let line_start = self.rope.line_to_char(line_idx);
        let column = self.rope.char_to_utf16_cu(char_idx) - self.rope.char_to_utf16_cu(line_start);
        (line_idx + 1, column + 1)
    }

    /// Length of a line in UTF-16 code units, excluding its newline.
    fn line_len_utf16(&self, line_idx: usize) -> usize {
        let line = self.rope.line(line_idx);
        let len = line.len_utf16_cu();
        let chars = line.len_chars();
        if chars > 0 && line.char(chars - 1) == '\n' {
            len - 1
        } else {
            len
        }
    }

    fn position_error(&self, line: usize, column: usize, message: String) -> GocallsError {
        GocallsError::Position {
            file: self.path.clone(),
            line,
            column,
            message,
        }
    }
}

/// Number of lines the Go toolchain would report: a trailing newline does not
/// start a new line, and an empty file still has one.
pub(crate) fn go_line_count(text: &str, rope_lines: usize) -> usize {
    if text.ends_with('\n') {
        rope_lines - 1
    } else {
        rope_lines
    }
}

#[cfg(test)]
mod tests {
    use crate::analyze::SourceFile;
    use crate::error::GocallsError;
    use std::path::Path;

    fn source(text: &str) -> SourceFile {
        SourceFile::parse(Path::new("/w/pos.go"), text.to_string()).expect("parse")
    }

    #[test]
    fn test_ascii_offsets() {
        let file = source("package p\n\nfunc F() {}\n");
        assert_eq!(file.line_count(), 3);
        assert_eq!(file.offset(1, 1).unwrap(), 0);
        assert_eq!(file.offset(3, 6).unwrap(), 16);
        assert_eq!(&file.text()[16..17], "F");
        assert_eq!(file.line_column(16), (3, 6));
    }

    #[test]
    fn test_multibyte_columns_count_utf16_units() {
        // 'é' is 2 bytes / 1 unit, '😀' is 4 bytes / 2 units.
        let text = "package p\n\nvar s = \"é😀\" + F()\n";
        let file = source(text);
        let f_byte = text.find("F()").unwrap();
        let (line, column) = file.line_column(f_byte);
        assert_eq!(line, 3);
        // `var s = "` is 9 units, é 1, 😀 2, `" + ` 4.
        assert_eq!(column, 17);
        assert_eq!(file.offset(line, column).unwrap(), f_byte);
    }

    #[test]
    fn test_line_zero_and_past_end_fail() {
        let file = source("package p\n\nfunc F() {}\n");
        for (line, column) in [(0, 1), (4, 1), (1, 0), (1, 12)] {
            match file.offset(line, column) {
                Err(GocallsError::Position { .. }) => {}
                other => panic!("expected PositionError for {line}:{column}, got {other:?}"),
            }
        }
        // One past the last character is still a valid end position.
        assert_eq!(file.offset(1, 10).unwrap(), 9);
    }

    #[test]
    fn test_round_trip_is_identity() {
        let text = "package p\n\n// ünïcode ✓\nfunc F() { G(\"😀\") }\n";
        let file = source(text);
        for (idx, line) in text.lines().enumerate() {
            let units = line.encode_utf16().count();
            for column in 1..=units + 1 {
                let offset = file.offset(idx + 1, column).unwrap();
                let (l, c) = file.line_column(offset);
                if (l, c) != (idx + 1, column) {
                    // Only the middle of a surrogate pair may round down.
                    assert_eq!(l, idx + 1);
                    assert_eq!(c, column - 1);
                }
            }
        }
    }
}
