use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::lang::block::Block;
use crate::lang::exception::{Exception, Result};
use crate::lang::functions::Function;
use crate::lang::number::{Fraction, Number};

/// Longest reference chain that will be followed before giving up
pub const MAX_REFERENCE_DEPTH: usize = 256;

pub type VariableRef = Rc<RefCell<Variable>>;
pub type FunctionRef = Rc<RefCell<Function>>;

#[derive(Clone, Debug)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Fraction(Fraction),
    Boolean(bool),
    String(String),
    Nil,
    Break,
    ArgumentList(Vec<Value>),
    ParameterList(Vec<String>),
    /// A named slot. When the slot holds another `Variable` it is a reference.
    Variable(VariableRef),
    Function(FunctionRef),
    Block(Rc<Block>),
    Exception(Exception),
}

#[derive(Debug)]
pub struct Variable {
    pub identifier: String,
    pub value: Value,
}

impl Variable {
    pub fn new<S: Into<String>>(identifier: S, value: Value) -> VariableRef {
        Rc::new(RefCell::new(Variable {
            identifier: identifier.into(),
            value,
        }))
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Fraction(_) => "fraction",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Nil => "nil",
            Value::Break => "break",
            Value::ArgumentList(_) => "argument list",
            Value::ParameterList(_) => "parameter list",
            Value::Variable(_) => "variable",
            Value::Function(_) => "function",
            Value::Block(_) => "block",
            Value::Exception(_) => "exception",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// The value held by a variable, one level deep. Other values are returned as is.
    pub fn held(&self) -> Value {
        match self {
            Value::Variable(var) => var.borrow().value.clone(),
            v => v.clone(),
        }
    }

    /// Follows variables and references down to the first non-variable value
    pub fn dereferenced(&self) -> Result<Value> {
        let mut cur = self.clone();
        for _ in 0..MAX_REFERENCE_DEPTH {
            match cur {
                Value::Variable(var) => {
                    let next = var.borrow().value.clone();
                    cur = next;
                }
                v => return Ok(v),
            }
        }

        fail!(Semantic, "Reference chain too long", "circular reference detected");
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Integer(i) => Some(Number::Integer(*i)),
            Value::Real(r) => Some(Number::Real(*r)),
            Value::Fraction(f) => Some(Number::Fraction(*f)),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Result<bool> {
        match self.dereferenced()? {
            Value::Boolean(b) => Ok(b),
            v => fail!(Type, format!("Expected boolean, got '{}'", v.type_name()), "yes or no"),
        }
    }

    pub fn as_string(&self) -> Result<String> {
        match self.dereferenced()? {
            Value::String(s) => Ok(s),
            v => fail!(Type, format!("Expected string, got '{}'", v.type_name())),
        }
    }

    /// Function held directly or through one variable
    pub fn as_function(&self) -> Option<FunctionRef> {
        match self {
            Value::Function(f) => Some(f.clone()),
            Value::Variable(var) => match &var.borrow().value {
                Value::Function(f) => Some(f.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Block held directly or through one variable
    pub fn as_block(&self) -> Option<Rc<Block>> {
        match self {
            Value::Block(b) => Some(b.clone()),
            Value::Variable(var) => match &var.borrow().value {
                Value::Block(b) => Some(b.clone()),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(i) => Value::Integer(i),
            Number::Real(r) => Value::Real(r),
            Number::Fraction(f) => Value::Fraction(f),
        }
    }
}

/// Appends to an argument list, flattening nested lists and passing variables by value
pub fn push_argument(args: &mut Vec<Value>, value: Value) {
    match value.held() {
        Value::ArgumentList(list) => {
            for v in list {
                push_argument(args, v);
            }
        }
        v => args.push(v),
    }
}

/// Comma separated, as used for argument lists and `print`
pub fn join(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Fraction(frac) => write!(f, "{}", frac),
            Value::Boolean(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Nil => write!(f, "nil"),
            Value::Break => write!(f, "break"),
            Value::ArgumentList(args) => write!(f, "{}", join(args)),
            Value::ParameterList(params) => write!(f, "({})", params.join(", ")),
            Value::Variable(var) => write!(f, "{}", var.borrow()),
            Value::Function(func) => write!(f, "{}", func.borrow().name),
            Value::Block(_) => write!(f, "block"),
            Value::Exception(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::Variable(_) => write!(f, "{} => {}", self.identifier, self.value),
            v => write!(f, "{} = {}", self.identifier, v),
        }
    }
}

#[test]
fn test_display() {
    let x = Variable::new("x", Value::Integer(10));
    let y = Variable::new("y", Value::Variable(x.clone()));

    let tests = vec![
        (Value::Integer(-4), "-4"),
        (Value::Real(1.5), "1.5"),
        (Value::Real(2.0), "2"),
        (Value::Fraction(Fraction::new(6, -4).unwrap()), "-3/2"),
        (Value::Boolean(true), "yes"),
        (Value::Boolean(false), "no"),
        (Value::String("abc".to_string()), "\"abc\""),
        (Value::Nil, "nil"),
        (
            Value::ArgumentList(vec![Value::Integer(1), Value::String("a".to_string())]),
            "1, \"a\"",
        ),
        (
            Value::ParameterList(vec!["a".to_string(), "b".to_string()]),
            "(a, b)",
        ),
        (Value::Variable(x), "x = 10"),
        (Value::Variable(y), "y => x = 10"),
    ];

    for (value, expected) in tests {
        assert_eq!(value.to_string(), expected);
    }
}

#[test]
fn test_push_argument() {
    let x = Variable::new("x", Value::Integer(3));
    let mut args = Vec::new();

    push_argument(&mut args, Value::Integer(1));
    push_argument(
        &mut args,
        Value::ArgumentList(vec![Value::Integer(2), Value::Variable(x)]),
    );

    assert_eq!(join(&args), "1, 2, 3");
}

#[test]
fn test_dereferenced() {
    let x = Variable::new("x", Value::Boolean(true));
    let y = Variable::new("y", Value::Variable(x));
    let y = Value::Variable(y);

    assert!(y.as_boolean().unwrap());
    assert!(matches!(y.held(), Value::Variable(_)));
    assert!(Value::Integer(1).as_boolean().is_err());
}
