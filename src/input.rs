//! Pose stream reader (one JSON object per line).

use std::io::BufRead;

use crate::error::InputError;
use crate::pose::PoseFrame;

/// Yields frames in file order; blank lines are skipped.
pub struct PoseReader<R> {
    reader: R,
    line_no: usize,
    buf: String,
}

impl<R: BufRead> PoseReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for PoseReader<R> {
    type Item = Result<PoseFrame, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line_no += 1;
            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(line).map_err(|source| InputError::Parse {
                    line: self.line_no,
                    source,
                }),
            );
        }
    }
}
