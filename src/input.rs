//! Line input that tolerates invalid UTF-8.
//!
//! MkDocs plugins occasionally print raw bytes; those are replaced with
//! U+FFFD instead of aborting the read.

use anyhow::{Context, Result};
use std::io::{self, BufRead};

/// Iterator over the lines of a reader, without line terminators.
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

pub fn lossy_lines<R: BufRead>(reader: R) -> LossyLines<R> {
    LossyLines {
        reader,
        buf: Vec::new(),
    }
}

/// Read every line until end of input.
pub fn read_all_lines<R: BufRead>(reader: R) -> Result<Vec<String>> {
    lossy_lines(reader)
        .collect::<io::Result<Vec<_>>>()
        .context("Failed to read input")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_strips_terminators() {
        let input: &[u8] = b"one\r\ntwo\n\nthree";
        let lines = read_all_lines(input).unwrap();
        assert_eq!(lines, vec!["one", "two", "", "three"]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let input: &[u8] = b"ok\n\xffbad\n";
        let lines = read_all_lines(input).unwrap();
        assert_eq!(lines[0], "ok");
        assert_eq!(lines[1], "\u{FFFD}bad");
    }

    #[test]
    fn empty_input_has_no_lines() {
        let input: &[u8] = b"";
        assert!(read_all_lines(input).unwrap().is_empty());
    }
}
