use std::fmt;
use std::rc::Rc;

use crate::lang::exception::Result;
use crate::lang::number::{Arithmetic, Number};
use crate::lang::value::Value;

/// Relative tolerance used by `=` when a real is involved
const EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Comparison {
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Comparison::Less => "<",
            Comparison::Greater => ">",
            Comparison::LessEqual => "<=",
            Comparison::GreaterEqual => ">=",
        };

        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Equality {
    /// `=`: exact for integers and fractions, within a relative epsilon once a real is involved
    Equal,
    /// `~=`: numbers are equal when they round to the same integer
    Approximate,
    /// `/=`
    NotEqual,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Logic {
    And,
    Or,
}

fn operation_name(op: Arithmetic) -> &'static str {
    match op {
        Arithmetic::Add => "addition",
        Arithmetic::Subtract => "subtraction",
        Arithmetic::Multiply => "multiplication",
        Arithmetic::Divide => "division",
    }
}

fn number(v: &Value, what: &str) -> Result<Number> {
    match v.as_number() {
        Some(n) => Ok(n),
        None => fail!(
            Type,
            format!("Value of type '{}' is not a number", v.type_name()),
            format!("{} requires numbers", what)
        ),
    }
}

/// `+ - * /`
pub fn arithmetic(op: Arithmetic, a: &Value, b: &Value) -> Result<Value> {
    let a = a.dereferenced()?;
    let b = b.dereferenced()?;

    match (&a, &b) {
        (Value::String(l), Value::String(r)) if op == Arithmetic::Add => {
            Ok(Value::String(format!("{}{}", l, r)))
        }
        (Value::String(_), r) if op == Arithmetic::Add && r.as_number().is_some() => {
            fail!(Type, "Attempted addition of a number to a string")
        }
        (l, Value::String(_)) if op == Arithmetic::Add && l.as_number().is_some() => {
            fail!(Type, "Attempted addition of a string to a number")
        }
        (Value::String(_), _) | (_, Value::String(_)) => fail!(
            Type,
            format!("Strings cannot be used in {} operations", operation_name(op))
        ),
        _ => {
            let what = operation_name(op);
            let res = number(&a, what)?.arithmetic(op, number(&b, what)?)?;
            Ok(res.into())
        }
    }
}

/// `^`
pub fn pow(a: &Value, b: &Value) -> Result<Value> {
    let a = number(&a.dereferenced()?, "exponentiation")?;
    let b = number(&b.dereferenced()?, "exponentiation")?;

    Ok(a.pow(b)?.into())
}

/// `|x|`
pub fn modulus(v: &Value) -> Result<Value> {
    let v = number(&v.dereferenced()?, "modulus")?;

    Ok(v.abs()?.into())
}

/// Unary `-`
pub fn negate(v: &Value) -> Result<Value> {
    let v = v.dereferenced()?;
    match v.as_number() {
        Some(n) => Ok(n.negate()?.into()),
        None => fail!(
            Type,
            "Failed to make value negative",
            format!("values of type '{}' cannot be made negative", v.type_name())
        ),
    }
}

pub fn compare(op: Comparison, a: &Value, b: &Value) -> Result<Value> {
    let what = format!("'{}'", op);
    let a = number(&a.dereferenced()?, &what)?.to_f64();
    let b = number(&b.dereferenced()?, &what)?.to_f64();

    Ok(Value::Boolean(match op {
        Comparison::Less => a < b,
        Comparison::Greater => a > b,
        Comparison::LessEqual => a <= b,
        Comparison::GreaterEqual => a >= b,
    }))
}

pub fn equality(op: Equality, a: &Value, b: &Value) -> Result<Value> {
    let res = match op {
        Equality::Equal => equal(a, b, false)?,
        Equality::Approximate => equal(a, b, true)?,
        Equality::NotEqual => !equal(a, b, false)?,
    };

    Ok(Value::Boolean(res))
}

fn numbers_equal(a: Number, b: Number, approximate: bool) -> Result<bool> {
    if approximate {
        let a = a.to_f64().round();
        let b = b.to_f64().round();
        return Ok(a == b);
    }

    Ok(match (a, b) {
        (Number::Real(_), _) | (_, Number::Real(_)) => {
            let (a, b) = (a.to_f64(), b.to_f64());
            let scale = a.abs().max(b.abs()).max(1.0);
            (a - b).abs() <= EPSILON * scale
        }
        (a, b) => a.to_fraction() == b.to_fraction(),
    })
}

fn equal(a: &Value, b: &Value, approximate: bool) -> Result<bool> {
    // Two references are equal when they point at the same variable
    if let (Value::Variable(l), Value::Variable(r)) = (a.held(), b.held()) {
        return Ok(Rc::ptr_eq(&l, &r));
    }

    let a = a.dereferenced()?;
    let b = b.dereferenced()?;

    if let (Some(l), Some(r)) = (a.as_number(), b.as_number()) {
        return numbers_equal(l, r, approximate);
    }

    Ok(match (&a, &b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Nil, _) | (_, Value::Nil) => false,
        (Value::Boolean(l), Value::Boolean(r)) => l == r,
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
        (Value::Block(l), Value::Block(r)) => Rc::ptr_eq(l, r),
        (Value::ArgumentList(l), Value::ArgumentList(r)) => {
            if l.len() != r.len() {
                return Ok(false);
            }
            for (l, r) in l.iter().zip(r.iter()) {
                if !equal(l, r, approximate)? {
                    return Ok(false);
                }
            }
            true
        }
        (l, r) => fail!(
            Type,
            format!(
                "Cannot compare values of type '{}' and '{}'",
                l.type_name(),
                r.type_name()
            )
        ),
    })
}

/// `and`/`or`. Both operands are already evaluated.
pub fn logic(op: Logic, a: &Value, b: &Value) -> Result<Value> {
    let a = a.as_boolean()?;
    let b = b.as_boolean()?;

    Ok(Value::Boolean(match op {
        Logic::And => a && b,
        Logic::Or => a || b,
    }))
}

#[test]
fn test_arithmetic() {
    let s = |s: &str| Value::String(s.to_string());
    let tests = vec![
        (Arithmetic::Add, s("abc"), s("def"), Ok("\"abcdef\"")),
        (Arithmetic::Add, s("abc"), Value::Integer(1), Err("Attempted addition of a number to a string")),
        (Arithmetic::Add, Value::Integer(1), s("abc"), Err("Attempted addition of a string to a number")),
        (Arithmetic::Multiply, s("a"), s("b"), Err("Strings cannot be used in multiplication operations")),
        (Arithmetic::Divide, Value::Integer(6), Value::Integer(-4), Ok("-3/2")),
        (Arithmetic::Subtract, Value::Integer(6), Value::Integer(4), Ok("2")),
        (Arithmetic::Add, Value::Boolean(true), Value::Integer(4), Err("Value of type 'boolean' is not a number")),
    ];

    for (op, a, b, expected) in tests {
        match (arithmetic(op, &a, &b), expected) {
            (Ok(v), Ok(e)) => assert_eq!(v.to_string(), e),
            (Err(err), Err(e)) => assert_eq!(err.message, e),
            (res, e) => panic!("{} {} {}: got {:?}, expected {:?}", a, op, b, res, e),
        }
    }
}

#[test]
fn test_equality() {
    let third = Value::Fraction(crate::lang::number::Fraction::new(1, 3).unwrap());
    let tests = vec![
        (Equality::Equal, Value::Integer(1), Value::Real(1.0), true),
        (Equality::Equal, Value::Real(0.1 + 0.2), Value::Real(0.3), true),
        (Equality::Equal, Value::Integer(1), Value::Real(1.4), false),
        (Equality::Approximate, Value::Integer(1), Value::Real(1.4), true),
        (Equality::NotEqual, Value::Integer(1), Value::Integer(2), true),
        (Equality::Equal, third.clone(), third, true),
        (Equality::Equal, Value::Boolean(true), Value::Boolean(true), true),
        (Equality::Equal, Value::Nil, Value::Integer(0), false),
    ];

    for (op, a, b, expected) in tests {
        match equality(op, &a, &b).unwrap() {
            Value::Boolean(res) => assert_eq!(res, expected, "{} {:?} {}", a, op, b),
            v => panic!("unexpected {}", v),
        }
    }

    assert!(equality(Equality::Equal, &Value::Boolean(true), &Value::Integer(1)).is_err());
}

#[test]
fn test_logic_requires_booleans() {
    assert!(logic(Logic::And, &Value::Boolean(true), &Value::Integer(1)).is_err());
    match logic(Logic::Or, &Value::Boolean(false), &Value::Boolean(true)).unwrap() {
        Value::Boolean(b) => assert!(b),
        v => panic!("unexpected {}", v),
    }
}
