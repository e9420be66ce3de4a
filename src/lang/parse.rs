//! Turns one line of text into a tree of `Group`s.
//!
//! There is no persistent syntax tree: a line is split into symbols, string literals are pulled out
//! as values, and brackets nest symbols into sub-groups. Everything else (precedence, keywords,
//! function application) is decided by the evaluator walking the group.
//!
//! The modulus bar `|` doubles as a bracket. The first `|` opens a sub-group and the next one closes
//! it. Both bars are also left in the parent group so the evaluator can find the pair. Nested
//! modulus pairs are not supported.

use std::fmt;
use std::iter::FromIterator;
use std::str::FromStr;

use pom::parser::{end, is_a, one_of, sym, Parser};

use crate::lang::exception::Result;
use crate::lang::value::Value;

pub const STRING_CHARACTER: char = '"';
pub const DIRECTIVE_CHARACTER: &str = "#";
pub const REFERENCE_CHARACTER: &str = "@";
pub const DEREFERENCE_CHARACTER: &str = "~";
pub const MODULUS_CHARACTER: &str = "|";

/// Characters that always form a symbol of their own (before two character operators are repaired)
const SPLIT_CHARACTERS: &str = "^/*+-,|><=\"{}[]()#@~";

/// Two character operators that splitting tears apart
const REPAIRED_OPERATORS: [&str; 4] = ["~=", ">=", "<=", "/="];

pub const RESERVED_WORDS: [&str; 14] = [
    "let", "yes", "no", "nil", "if", "else", "otherwise", "begin", "end", "while", "for", "break",
    "or", "and",
];

/// Symbols that take a left operand. A `-` following one of these is a negation.
const INFIX_OPERATORS: [&str; 15] = [
    "^", "/", "*", "+", "-", "~=", "/=", ",", ">", "<", ">=", "<=", "=", "and", "or",
];

#[derive(Clone, Debug)]
pub enum Item {
    Symbol(String),
    Value(Value),
    Group(Group),
}

impl Item {
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Item::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_symbol(&self, s: &str) -> bool {
        self.symbol() == Some(s)
    }
}

/// An ordered, appendable sequence of symbols, literals and nested groups
#[derive(Clone, Debug, Default)]
pub struct Group {
    pub items: Vec<Item>,
}

impl Group {
    pub fn new(items: Vec<Item>) -> Self {
        Group { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first_symbol(&self) -> Option<&str> {
        self.items.first().and_then(Item::symbol)
    }

    pub fn last_symbol(&self) -> Option<&str> {
        self.items.last().and_then(Item::symbol)
    }

    /// Index of the first top level occurrence of `symbol`
    pub fn position(&self, symbol: &str) -> Option<usize> {
        self.items.iter().position(|i| i.is_symbol(symbol))
    }

    /// Number of top level occurrences of `symbol`
    pub fn count(&self, symbol: &str) -> usize {
        self.items.iter().filter(|i| i.is_symbol(symbol)).count()
    }

    /// A new group holding a copy of `range`
    pub fn slice(&self, range: std::ops::Range<usize>) -> Group {
        Group::new(self.items[range].to_vec())
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Symbol(s) => write!(f, "{}", s),
            Item::Value(v) => write!(f, "{}", v),
            Item::Group(g) => write!(f, "{}", g),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for item in &self.items {
            write!(f, " {}", item)?;
        }
        write!(f, " )")
    }
}

pub fn is_infix_operator(symbol: &str) -> bool {
    INFIX_OPERATORS.contains(&symbol)
}

fn digits<'a>() -> Parser<'a, char, String> {
    one_of("0123456789")
        .repeat(1..)
        .collect()
        .map(String::from_iter)
}

fn real<'a>() -> Parser<'a, char, Value> {
    let number = digits() + sym('.') + digits();
    number
        .collect()
        .map(String::from_iter)
        .convert(|s| f64::from_str(&s))
        .map(Value::Real)
}

fn integer<'a>() -> Parser<'a, char, Value> {
    digits().convert(|s| i64::from_str(&s)).map(Value::Integer)
}

/// Integer literals that do not fit in 64 bits are read as reals
fn wide_integer<'a>() -> Parser<'a, char, Value> {
    digits().convert(|s| f64::from_str(&s)).map(Value::Real)
}

fn literal<'a>() -> Parser<'a, char, Value> {
    (real() | integer() | wide_integer()) - end()
}

fn identifier<'a>() -> Parser<'a, char, String> {
    let first = is_a(|c: char| c.is_alphabetic() || c == '_');
    let rest = is_a(|c: char| c.is_alphanumeric() || c == '_');

    (first + rest.repeat(0..))
        .collect()
        .map(String::from_iter)
}

/// Parses a numeric literal symbol. Signs are separate symbols and never part of a literal.
pub fn parse_literal(symbol: &str) -> Option<Value> {
    let input: Vec<char> = symbol.chars().collect();
    let value = literal().parse(&input).ok();
    value
}

/// Whether `symbol` can name a variable, function or parameter
pub fn is_identifier(symbol: &str) -> bool {
    if RESERVED_WORDS.contains(&symbol) {
        return false;
    }

    let input: Vec<char> = symbol.chars().collect();
    let matched = (identifier() - end()).parse(&input).is_ok();
    matched
}

enum Token {
    Symbol(String),
    Str(String),
}

/// Splits a line into symbols and string literals
fn split(line: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    fn flush(current: &mut String, tokens: &mut Vec<Token>) {
        if !current.is_empty() {
            tokens.push(Token::Symbol(std::mem::take(current)));
        }
    }

    while let Some(c) = chars.next() {
        if c == STRING_CHARACTER {
            flush(&mut current, &mut tokens);

            let mut s = String::new();
            loop {
                match chars.next() {
                    Some(STRING_CHARACTER) => break,
                    Some(c) => s.push(c),
                    None => fail!(Syntax, "String not closed", "another \" required"),
                }
            }
            tokens.push(Token::Str(s));
        } else if SPLIT_CHARACTERS.contains(c) {
            flush(&mut current, &mut tokens);
            tokens.push(Token::Symbol(c.to_string()));
        } else if c.is_whitespace() {
            flush(&mut current, &mut tokens);
        } else {
            current.push(c);
        }
    }
    flush(&mut current, &mut tokens);

    // Glue `~ =`, `> =`, `< =` and `/ =` back together
    let mut repaired: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let (Token::Symbol(s), Some(Token::Symbol(prev))) = (&token, repaired.last_mut()) {
            if s == "=" {
                let merged = format!("{}=", prev);
                if REPAIRED_OPERATORS.contains(&merged.as_str()) {
                    *prev = merged;
                    continue;
                }
            }
        }
        repaired.push(token);
    }

    Ok(repaired)
}

/// Tokenizes one line into a tree of groups
pub fn tokenize(line: &str) -> Result<Group> {
    let tokens = split(line)?;

    let mut stack: Vec<Group> = vec![Group::default()];
    let mut excess_closing = 0;
    let mut modulus_open = false;

    for token in tokens {
        let s = match token {
            Token::Str(s) => {
                push_item(&mut stack, Item::Value(Value::String(s)));
                continue;
            }
            Token::Symbol(s) => s,
        };

        let opens = s == "(" || (s == MODULUS_CHARACTER && !modulus_open);
        let closes = s == ")" || (s == MODULUS_CHARACTER && modulus_open);

        if opens {
            if s == MODULUS_CHARACTER {
                modulus_open = true;
                push_item(&mut stack, Item::Symbol(s));
            }
            stack.push(Group::default());
        } else if closes {
            if stack.len() > 1 {
                if let Some(group) = stack.pop() {
                    push_item(&mut stack, Item::Group(group));
                }
            } else {
                excess_closing += 1;
            }

            if s == MODULUS_CHARACTER {
                modulus_open = false;
                push_item(&mut stack, Item::Symbol(s));
            }
        } else {
            push_item(&mut stack, Item::Symbol(s));
        }
    }

    if excess_closing > 0 {
        fail!(
            Syntax,
            "Too many closing brackets",
            format!("remove {}", excess_closing)
        );
    }

    let unclosed = stack.len() - 1;
    if unclosed > 0 {
        fail!(
            Syntax,
            "Too few closing brackets",
            format!("{} required", unclosed)
        );
    }

    Ok(stack.pop().unwrap_or_default())
}

fn push_item(stack: &mut Vec<Group>, item: Item) {
    if let Some(group) = stack.last_mut() {
        group.items.push(item);
    }
}

#[test]
fn test_literals() {
    let tests = vec![
        ("0", Some("0")),
        ("42", Some("42")),
        ("3.25", Some("3.25")),
        ("99999999999999999999", Some("100000000000000000000")),
        ("1.", None),
        (".5", None),
        ("x1", None),
        ("1e5", None),
    ];

    for (input, expected) in tests {
        assert_eq!(
            parse_literal(input).map(|v| v.to_string()),
            expected.map(String::from),
            "{}",
            input
        );
    }
}

#[test]
fn test_identifiers() {
    let tests = vec![
        ("x", true),
        ("_tmp2", true),
        ("fooBar", true),
        ("2x", false),
        ("let", false),
        ("while", false),
        ("+", false),
        ("a.b", false),
    ];

    for (input, expected) in tests {
        assert_eq!(is_identifier(input), expected, "{}", input);
    }
}

#[test]
fn test_tokenize() {
    let tests = vec![
        ("1 + 2", "( 1 + 2 )"),
        ("let x=5", "( let x = 5 )"),
        ("a>=b", "( a >= b )"),
        ("a ~= b", "( a ~= b )"),
        ("a/=b", "( a /= b )"),
        ("a < = b", "( a <= b )"),
        ("f(1, (2))", "( f ( 1 , ( 2 ) ) )"),
        ("|x - 3| * 2", "( | ( x - 3 ) | * 2 )"),
        (r#"print("a + b", 2)"#, r#"( print ( "a + b" , 2 ) )"#),
        ("let y = @x", "( let y = @ x )"),
        ("#STRICT yes", "( # STRICT yes )"),
        ("", "( )"),
    ];

    for (input, expected) in tests {
        let group = tokenize(input).expect("Failed to tokenize");
        assert_eq!(group.to_string(), expected);
    }
}

#[test]
fn test_tokenize_errors() {
    let tests = vec![
        ("(1 + 2", "Too few closing brackets", "1 required"),
        ("((1 + 2", "Too few closing brackets", "2 required"),
        ("1 + 2)", "Too many closing brackets", "remove 1"),
        (r#"print "abc"#, "String not closed", "another \" required"),
    ];

    for (input, message, hint) in tests {
        let err = tokenize(input).unwrap_err();
        assert_eq!(err.message, message);
        assert_eq!(err.hint, hint);
    }
}
