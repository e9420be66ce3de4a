use std::fmt;
use std::io::Write;

use log::info;

use crate::lang::eval::Interpreter;
use crate::lang::exception::Result;
use crate::lang::source::Source;
use crate::lang::value::Value;

pub enum EvalResult {
    Ok,
    Quit,
    Err(String),
}

impl fmt::Display for EvalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalResult::Ok => Ok(()),
            EvalResult::Quit => write!(f, "Quit"),
            EvalResult::Err(msg) => write!(f, "{}", msg),
        }
    }
}

pub struct Runtime<'a> {
    interpreter: Interpreter<'a>,
    interactive: bool,
}

impl<'a> Runtime<'a> {
    /// Create a new `Runtime` instance
    ///
    /// `sink` is where output should be written. eg. result of `print` statements
    ///
    /// `source` supplies statements until it runs dry. Files pulled in with `load` are stacked on
    /// top of it.
    ///
    /// `interactive` sets whether or not expression statements should print the result (useful
    /// when human is at a REPL)
    pub fn new(sink: &'a mut dyn Write, source: Box<dyn Source + 'a>, interactive: bool) -> Self {
        Self {
            interpreter: Interpreter::new(sink, source),
            interactive,
        }
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.interpreter.set_strict(strict);
    }

    pub fn eval(&mut self, line: &str) -> EvalResult {
        if line.trim() == "quit" {
            self.interpreter.kill();
            return EvalResult::Quit;
        }

        match self.interpreter.interpret(line) {
            Value::Exception(e) => return EvalResult::Err(e.to_string()),
            v => {
                if self.interactive && !v.is_nil() {
                    if let Err(e) = self.interpreter.write_line(&format!("-> {}", v)) {
                        return EvalResult::Err(e.to_string());
                    }
                }
            }
        }

        if self.interpreter.is_alive() {
            EvalResult::Ok
        } else {
            EvalResult::Quit
        }
    }

    /// Reads and evaluates statements until the input runs out or the program halts
    pub fn run(&mut self) -> Result<()> {
        loop {
            let prompt = format!("{} > ", self.interpreter.line() + 1);
            let line = match self.interpreter.read_line(&prompt)? {
                Some(l) => l,
                None if self.interpreter.pop_source() => {
                    info!("finished loaded source");
                    continue;
                }
                None => break,
            };

            match self.eval(&line) {
                EvalResult::Ok => (),
                EvalResult::Quit => break,
                EvalResult::Err(e) => {
                    self.interpreter.write_line(&e)?;
                    if !self.interpreter.is_alive() {
                        break;
                    }
                }
            }
        }

        self.interpreter.write_line("Interpreter execution halted")
    }
}

#[cfg(test)]
fn run_script(script: &str, interactive: bool) -> String {
    use crate::lang::source::ScriptSource;

    let mut output = Vec::new();
    {
        let source = Box::new(ScriptSource::new(script.as_bytes()));
        let mut runtime = Runtime::new(&mut output, source, interactive);
        runtime.run().expect("Failed to run script");
    }

    String::from_utf8(output).expect("Output not utf-8")
}

#[test]
fn test_interactive_echo() {
    let script = "let x = 2\nx * 3\nprint(\"hi\")\nnil\nquit\nprint(1)";
    let expected = "-> x = 2\n-> 6\nhi\nInterpreter execution halted\n";

    assert_eq!(run_script(script, true), expected);
}

#[test]
fn test_script() {
    let tests = vec![
        ("let x = 2\nprint(x * 3)", "6\nInterpreter execution halted\n"),
        (
            "1 + 1\nfoo\nprint(2)",
            "*** Warning! Variable or function with identifier 'foo' not found on line 2\n2\nInterpreter execution halted\n",
        ),
        (
            "#STRICT yes\nfoo\nprint(2)",
            "Interpreter running in strict mode\n*** Fatal error! Variable or function with identifier 'foo' not found on line 2\nInterpreter execution halted\n",
        ),
        ("print(1)\nexit()\nprint(2)", "1\nInterpreter execution halted\n"),
        (
            "let n = 0\nwhile yes,\nlet n = n + 1\nif n = 2, exit()\nend\nprint(n)",
            "Interpreter execution halted\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run_script(input, false), expected, "{}", input);
    }
}

#[test]
fn test_strict_from_flag() {
    let mut output = Vec::new();
    {
        let source = Box::new(crate::lang::source::ScriptSource::new("foo\nprint(1)".as_bytes()));
        let mut runtime = Runtime::new(&mut output, source, false);
        runtime.set_strict(true);
        runtime.run().expect("Failed to run script");
    }

    assert_eq!(
        String::from_utf8(output).expect("Output not utf-8"),
        "*** Fatal error! Variable or function with identifier 'foo' not found on line 1\nInterpreter execution halted\n"
    );
}

#[test]
fn test_load() {
    let path = std::env::temp_dir().join(format!("toast_load_{}.toast", std::process::id()));
    std::fs::write(&path, "let y = 7\nlet sq(n) = n * n\nprint(sq(y))\n").expect("Failed to write script");

    let script = format!(
        "load(\"{}\")\nprint(\"after\")\nprint(sq(3))",
        path.display()
    );
    let output = run_script(&script, false);
    let _ = std::fs::remove_file(&path);

    assert_eq!(output, "49\nafter\n9\nInterpreter execution halted\n");

    let output = run_script("load(\"/nonexistent/script.toast\")", false);
    assert!(output.starts_with("*** Warning! Could not load '/nonexistent/script.toast' on line 1"));
}
