// LineSource - one sample token per text line
//
// Works for stdin, plain files, CSV recordings and character devices opened
// as files (a serial TTY). Bytes are decoded as Latin-1 so line noise from a
// device never fails decoding; it just produces a malformed token.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Stdin};
use std::path::Path;

use super::{SampleSource, SourceRead};
use crate::error::PipelineError;

pub struct LineSource<R: BufRead> {
    reader: R,
    column: Option<usize>,
    buf: Vec<u8>,
    lines_read: u64,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            column: None,
            buf: Vec::with_capacity(64),
            lines_read: 0,
        }
    }

    /// Take the token from comma-separated column `column` (zero-based)
    ///
    /// Recorded sessions are `Timestamp,Signal,Label`, so column 1 replays
    /// the signal. The header row comes back as a malformed token.
    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }
}

impl LineSource<BufReader<File>> {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl LineSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

impl<R: BufRead> SampleSource for LineSource<R> {
    fn read_sample(&mut self) -> Result<SourceRead, PipelineError> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(SourceRead::Closed);
        }
        self.lines_read += 1;

        let line = decode_latin1(&self.buf);
        let line = line.trim_end_matches(['\r', '\n']);

        let token = match self.column {
            None => line.to_string(),
            Some(column) => match line.split(',').nth(column) {
                Some(field) => field.to_string(),
                None => {
                    return Err(PipelineError::MalformedSample {
                        token: line.to_string(),
                    })
                }
            },
        };
        Ok(SourceRead::Token(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tokens<R: BufRead>(source: &mut LineSource<R>) -> Vec<Result<SourceRead, PipelineError>> {
        let mut out = Vec::new();
        loop {
            let read = source.read_sample();
            if matches!(read, Ok(SourceRead::Closed)) {
                return out;
            }
            out.push(read);
        }
    }

    #[test]
    fn yields_one_token_per_line() {
        let mut source = LineSource::new(Cursor::new("512\r\n498\n\n501"));
        let read = tokens(&mut source);
        assert_eq!(
            read,
            vec![
                Ok(SourceRead::Token("512".to_string())),
                Ok(SourceRead::Token("498".to_string())),
                Ok(SourceRead::Token(String::new())),
                Ok(SourceRead::Token("501".to_string())),
            ]
        );
        assert_eq!(source.lines_read(), 4);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let bytes: Vec<u8> = vec![0xff, b'1', b'2', b'\n'];
        let mut source = LineSource::new(Cursor::new(bytes));
        assert_eq!(
            source.read_sample().unwrap(),
            SourceRead::Token("\u{ff}12".to_string())
        );
    }

    #[test]
    fn csv_column_selection() {
        let csv = "Timestamp,Signal,Label\n2024-01-01 10:00:00.000,512,0\nshort\n";
        let mut source = LineSource::new(Cursor::new(csv)).with_column(1);

        assert_eq!(
            source.read_sample().unwrap(),
            SourceRead::Token("Signal".to_string())
        );
        assert_eq!(
            source.read_sample().unwrap(),
            SourceRead::Token("512".to_string())
        );
        assert!(matches!(
            source.read_sample(),
            Err(PipelineError::MalformedSample { .. })
        ));
        assert_eq!(source.read_sample().unwrap(), SourceRead::Closed);
    }
}
