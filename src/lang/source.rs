use std::io::BufRead;

use crate::lang::exception::Result;

/// Pull based supplier of input lines
///
/// The interpreter asks for a line whenever it needs one: at the top level, while capturing a
/// block body, and from `read`/`read_string`. Sources block for as long as they need to.
pub trait Source {
    /// Returns the next line without its line terminator, or `None` once the source is exhausted
    fn next_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Reads lines from a file, a pipe or an in-memory script
pub struct ScriptSource<R: BufRead> {
    reader: R,
}

impl<R: BufRead> ScriptSource<R> {
    pub fn new(reader: R) -> Self {
        ScriptSource { reader }
    }
}

impl<R: BufRead> Source for ScriptSource<R> {
    fn next_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => {
                let len = line.trim_end_matches(&['\n', '\r'][..]).len();
                line.truncate(len);
                Ok(Some(line))
            }
            Err(e) => fail!(Io, "Failed to read input", e.to_string()),
        }
    }
}

#[test]
fn test_script_source() {
    let mut source = ScriptSource::new("let x = 1\r\n\nprint(x)".as_bytes());

    let mut lines = Vec::new();
    while let Some(line) = source.next_line("").unwrap() {
        lines.push(line);
    }

    assert_eq!(lines, vec!["let x = 1", "", "print(x)"]);
}
