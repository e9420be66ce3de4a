/// Classification of everything that can go wrong while evaluating a statement
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq)]
pub enum ErrorKind {
    /// Unterminated string, unbalanced brackets, malformed directive or expression
    #[error("SyntaxError")]
    Syntax,
    /// Unknown identifier or function
    #[error("NameError")]
    Name,
    /// Operand kind mismatch
    #[error("TypeError")]
    Type,
    /// Wrong argument count for a fixed arity function
    #[error("ArityError")]
    Arity,
    /// Illegal reference, duplicate else, stdlib redefinition
    #[error("SemanticError")]
    Semantic,
    /// Keyword used outside of a construct that accepts it, or runaway recursion
    #[error("ControlError")]
    Control,
    /// Division by zero, integer overflow
    #[error("ArithmeticError")]
    Arithmetic,
    /// Underlying input source failed
    #[error("IoError")]
    Io,
}

/// ` (hint)`, or nothing when there is no hint
fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!(" ({})", hint)
    }
}

/// Error carried through the evaluator
///
/// This is not yet an `Exception`: it has no line number and no notion of strictness. The
/// interpreter stamps both on when the error reaches a statement boundary.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
#[error("{kind}: {message}{}", hint_suffix(.hint))]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub hint: String,
}

impl Error {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Error {
            kind,
            message: message.into(),
            hint: String::new(),
        }
    }

    pub fn with_hint<S: Into<String>>(mut self, hint: S) -> Self {
        self.hint = hint.into();
        self
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Early return with an `Error`, in the spirit of `anyhow::bail!`
///
///     fail!(Type, "Expected boolean");
///     fail!(Arity, format!("Bad call to '{}'", name), "1 out of 2 given");
macro_rules! fail {
    ($kind:ident, $msg:expr) => {
        return Err($crate::lang::exception::Error::new(
            $crate::lang::exception::ErrorKind::$kind,
            $msg,
        ))
    };
    ($kind:ident, $msg:expr, $hint:expr) => {
        return Err($crate::lang::exception::Error::new(
            $crate::lang::exception::ErrorKind::$kind,
            $msg,
        )
        .with_hint($hint))
    };
}

/// A failure surfaced to the user
///
/// `fatal` is fixed from the interpreter's strict flag when the exception is created.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
#[error(
    "*** {}! {} on line {line}{}",
    severity(.fatal),
    message(.error),
    hint_suffix(hint(.error))
)]
pub struct Exception {
    pub error: Error,
    pub fatal: bool,
    pub line: usize,
}

fn severity(fatal: &bool) -> &'static str {
    if *fatal {
        "Fatal error"
    } else {
        "Warning"
    }
}

fn message(error: &Error) -> &str {
    &error.message
}

fn hint(error: &Error) -> &str {
    &error.hint
}

#[test]
fn test_exception_display() {
    let tests = vec![
        (
            Error::new(ErrorKind::Syntax, "Too few closing brackets").with_hint("1 required"),
            false,
            3,
            "*** Warning! Too few closing brackets on line 3 (1 required)",
        ),
        (
            Error::new(ErrorKind::Name, "Variable or function with identifier 'q' not found"),
            true,
            0,
            "*** Fatal error! Variable or function with identifier 'q' not found on line 0",
        ),
    ];

    for (error, fatal, line, expected) in tests {
        let exception = Exception { error, fatal, line };
        assert_eq!(format!("{}", exception), expected);
    }
}

#[test]
fn test_fail_macro() {
    fn check(ok: bool) -> Result<u32> {
        if !ok {
            fail!(Arity, "Incorrect number of arguments", "1 out of 2 given");
        }

        Ok(7)
    }

    assert_eq!(check(true), Ok(7));
    let err = check(false).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Arity);
    assert_eq!(err.hint, "1 out of 2 given");
}

#[test]
fn test_error_display() {
    let err = Error::new(ErrorKind::Semantic, "Illegal assignment attempted")
        .with_hint("circular reference detected");
    assert_eq!(
        err.to_string(),
        "SemanticError: Illegal assignment attempted (circular reference detected)"
    );
    assert_eq!(Error::new(ErrorKind::Io, "Failed").to_string(), "IoError: Failed");

    let err: anyhow::Error = err.into();
    assert!(err.to_string().starts_with("SemanticError"));
}
