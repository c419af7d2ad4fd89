//! `Content-Length` framing for JSON-RPC over stdio.
//!
//! Each message is a header block (`Name: value\r\n` lines ended by an empty
//! line) followed by exactly `Content-Length` bytes of JSON.

use crate::error::{GocallsError, Result};
use std::io::{BufRead, Write};

/// Write one framed message and flush.
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> Result<()> {
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(body)?;
    writer.flush()?;
    Ok(())
}

/// Read one framed message.
///
/// Returns `Ok(None)` on a clean end of stream before any header byte.
pub fn read_frame<R: BufRead>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut content_length: Option<usize> = None;
    let mut first = true;

    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            if first {
                return Ok(None);
            }
            return Err(GocallsError::Protocol(
                "unexpected end of stream in message header".to_string(),
            ));
        }
        first = false;

        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        if line.is_empty() {
            break;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| GocallsError::Protocol(format!("invalid header line: {}", line)))?;
        if name.trim().eq_ignore_ascii_case("Content-Length") {
            let value = value.trim();
            let length = value.parse().map_err(|_| {
                GocallsError::Protocol(format!("invalid Content-Length: {}", value))
            })?;
            content_length = Some(length);
        }
    }

    let length = content_length
        .ok_or_else(|| GocallsError::Protocol("missing Content-Length header".to_string()))?;

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).map_err(|e| {
        GocallsError::Protocol(format!("short message body ({} bytes expected): {}", length, e))
    })?;
    Ok(Some(body))
}
