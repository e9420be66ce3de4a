//! The numeric tower: integers, reals and exact fractions.
//!
//! The left operand of a binary operation decides the kind of the result. Integers meeting a real
//! are promoted to reals; anything meeting a fraction on the left is converted to a fraction.

use std::convert::TryFrom;
use std::fmt;

use crate::lang::exception::Result;

/// Real to fraction conversion stops once the approximation is this close
const FRACTION_PRECISION: f64 = 0.000005;
/// Largest magnitude the real to fraction conversion will produce
const FRACTION_LIMIT: i64 = 999_999_999_999_999_999;
/// Iteration cap for the continued fraction expansion
const FRACTION_MAX_TERMS: usize = 64;

/// Exact rational number, always in lowest terms with a positive denominator
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fraction {
    numerator: i64,
    denominator: i64,
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }

    a.abs()
}

impl Fraction {
    pub fn new(numerator: i64, denominator: i64) -> Result<Self> {
        Self::reduce(numerator.into(), denominator.into())
    }

    pub fn from_integer(i: i64) -> Self {
        Fraction {
            numerator: i,
            denominator: 1,
        }
    }

    /// Normalizes `n/d` and narrows it back to 64 bits
    fn reduce(n: i128, d: i128) -> Result<Self> {
        if d == 0 {
            fail!(Arithmetic, "Division by zero", "denominator is 0");
        }

        let (n, d) = if d < 0 { (-n, -d) } else { (n, d) };
        let divisor = gcd(n, d).max(1);
        let (n, d) = (n / divisor, d / divisor);

        match (i64::try_from(n), i64::try_from(d)) {
            (Ok(numerator), Ok(denominator)) => Ok(Fraction {
                numerator,
                denominator,
            }),
            _ => fail!(Arithmetic, format!("Fraction {}/{} overflows", n, d)),
        }
    }

    /// Approximates a real with a continued fraction expansion
    ///
    /// See John Kennedy, "Algorithm To Convert A Decimal To A Fraction".
    pub fn from_f64(value: f64) -> Self {
        let sign = if value < 0.0 { -1 } else { 1 };
        let value = value.abs();

        if value.fract() == 0.0 && value <= FRACTION_LIMIT as f64 {
            return Fraction::from_integer(sign * value as i64);
        }
        if value < 1.0e-18 {
            return Fraction {
                numerator: sign,
                denominator: FRACTION_LIMIT,
            };
        }
        if value > 1.0e18 || !value.is_finite() {
            return Fraction::from_integer(sign * FRACTION_LIMIT);
        }

        let mut z = value;
        let mut previous_denominator: i128 = 0;
        let mut denominator: i128 = 1;
        let mut numerator: i128 = value.round() as i128;

        for _ in 0..FRACTION_MAX_TERMS {
            z = 1.0 / (z - z.trunc());
            let next = denominator * z.trunc() as i128 + previous_denominator;
            if next > FRACTION_LIMIT as i128 {
                break;
            }

            previous_denominator = denominator;
            denominator = next;
            numerator = (value * denominator as f64 + 0.5) as i128;

            let approx = numerator as f64 / denominator as f64;
            if (value - approx).abs() < FRACTION_PRECISION || z.fract() == 0.0 {
                break;
            }
        }

        // Both terms are bounded by FRACTION_LIMIT, reduction cannot fail
        Self::reduce(sign as i128 * numerator, denominator).unwrap_or(Fraction {
            numerator: sign * numerator as i64,
            denominator: denominator as i64,
        })
    }

    /// Truncating conversion
    pub fn to_integer(&self) -> i64 {
        self.numerator / self.denominator
    }

    pub fn to_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    pub fn add(self, other: Fraction) -> Result<Fraction> {
        let (a, b, c, d) = self.widen(other);
        Self::reduce(a * d + c * b, b * d)
    }

    pub fn subtract(self, other: Fraction) -> Result<Fraction> {
        let (a, b, c, d) = self.widen(other);
        Self::reduce(a * d - c * b, b * d)
    }

    pub fn multiply(self, other: Fraction) -> Result<Fraction> {
        let (a, b, c, d) = self.widen(other);
        Self::reduce(a * c, b * d)
    }

    pub fn divide(self, other: Fraction) -> Result<Fraction> {
        let (a, b, c, d) = self.widen(other);
        Self::reduce(a * d, b * c)
    }

    pub fn negate(self) -> Result<Fraction> {
        Self::reduce(-i128::from(self.numerator), self.denominator.into())
    }

    pub fn abs(self) -> Result<Fraction> {
        Self::reduce(i128::from(self.numerator).abs(), self.denominator.into())
    }

    /// Raises both terms to `exponent`, rounding each to the nearest integer
    ///
    /// A negative exponent inverts the fraction first.
    pub fn pow(self, exponent: f64) -> Result<Fraction> {
        let (n, d) = if exponent < 0.0 {
            (self.denominator, self.numerator)
        } else {
            (self.numerator, self.denominator)
        };
        let exponent = exponent.abs();

        let n = round_to_integer((n as f64).powf(exponent))?;
        let d = round_to_integer((d as f64).powf(exponent))?;

        Self::new(n, d)
    }

    fn widen(self, other: Fraction) -> (i128, i128, i128, i128) {
        (
            self.numerator.into(),
            self.denominator.into(),
            other.numerator.into(),
            other.denominator.into(),
        )
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Rounds to the nearest integer, failing when the result does not fit
pub fn round_to_integer(value: f64) -> Result<i64> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
        fail!(Arithmetic, format!("{} does not fit in an integer", value));
    }

    Ok(rounded as i64)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Integer(i64),
    Real(f64),
    Fraction(Fraction),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Arithmetic {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl fmt::Display for Arithmetic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Arithmetic::Add => "+",
            Arithmetic::Subtract => "-",
            Arithmetic::Multiply => "*",
            Arithmetic::Divide => "/",
        };

        write!(f, "{}", s)
    }
}

impl Number {
    pub fn to_f64(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Real(r) => r,
            Number::Fraction(f) => f.to_f64(),
        }
    }

    /// Integer view: reals round, fractions truncate
    pub fn to_integer(self) -> Result<i64> {
        match self {
            Number::Integer(i) => Ok(i),
            Number::Real(r) => round_to_integer(r),
            Number::Fraction(f) => Ok(f.to_integer()),
        }
    }

    pub fn to_fraction(self) -> Fraction {
        match self {
            Number::Integer(i) => Fraction::from_integer(i),
            Number::Real(r) => Fraction::from_f64(r),
            Number::Fraction(f) => f,
        }
    }

    pub fn arithmetic(self, op: Arithmetic, other: Number) -> Result<Number> {
        Ok(match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => match op {
                Arithmetic::Divide => Number::Fraction(Fraction::new(a, b)?),
                _ => Number::Integer(integer_arithmetic(op, a, b)?),
            },
            (Number::Integer(a), Number::Real(b)) => {
                Number::Real(real_arithmetic(op, a as f64, b))
            }
            (Number::Integer(a), Number::Fraction(b)) => {
                Number::Fraction(fraction_arithmetic(op, Fraction::from_integer(a), b)?)
            }
            (Number::Real(a), b) => Number::Real(real_arithmetic(op, a, b.to_f64())),
            (Number::Fraction(a), b) => {
                Number::Fraction(fraction_arithmetic(op, a, b.to_fraction())?)
            }
        })
    }

    pub fn pow(self, exponent: Number) -> Result<Number> {
        let exponent = exponent.to_f64();

        Ok(match self {
            Number::Integer(i) => Number::Integer(round_to_integer((i as f64).powf(exponent))?),
            Number::Real(r) => Number::Real(r.powf(exponent)),
            Number::Fraction(f) => Number::Fraction(f.pow(exponent)?),
        })
    }

    pub fn abs(self) -> Result<Number> {
        Ok(match self {
            Number::Integer(i) => match i.checked_abs() {
                Some(i) => Number::Integer(i),
                None => fail!(Arithmetic, format!("|{}| overflows", i)),
            },
            Number::Real(r) => Number::Real(r.abs()),
            Number::Fraction(f) => Number::Fraction(f.abs()?),
        })
    }

    pub fn negate(self) -> Result<Number> {
        Ok(match self {
            Number::Integer(i) => match i.checked_neg() {
                Some(i) => Number::Integer(i),
                None => fail!(Arithmetic, format!("-{} overflows", i)),
            },
            Number::Real(r) => Number::Real(-r),
            Number::Fraction(f) => Number::Fraction(f.negate()?),
        })
    }
}

fn integer_arithmetic(op: Arithmetic, a: i64, b: i64) -> Result<i64> {
    let res = match op {
        Arithmetic::Add => a.checked_add(b),
        Arithmetic::Subtract => a.checked_sub(b),
        Arithmetic::Multiply => a.checked_mul(b),
        Arithmetic::Divide => {
            if b == 0 {
                fail!(Arithmetic, "Division by zero");
            }
            a.checked_div(b)
        }
    };

    match res {
        Some(i) => Ok(i),
        None => fail!(Arithmetic, format!("{} {} {} overflows", a, op, b)),
    }
}

fn real_arithmetic(op: Arithmetic, a: f64, b: f64) -> f64 {
    match op {
        Arithmetic::Add => a + b,
        Arithmetic::Subtract => a - b,
        Arithmetic::Multiply => a * b,
        Arithmetic::Divide => a / b,
    }
}

fn fraction_arithmetic(op: Arithmetic, a: Fraction, b: Fraction) -> Result<Fraction> {
    match op {
        Arithmetic::Add => a.add(b),
        Arithmetic::Subtract => a.subtract(b),
        Arithmetic::Multiply => a.multiply(b),
        Arithmetic::Divide => a.divide(b),
    }
}

#[test]
fn test_fraction_normalizes() {
    let tests = vec![
        ((6, -4), (-3, 2)),
        ((-6, -4), (3, 2)),
        ((0, -5), (0, 1)),
        ((12, 4), (3, 1)),
        ((7, 13), (7, 13)),
    ];

    for ((n, d), (en, ed)) in tests {
        let f = Fraction::new(n, d).expect("valid fraction");
        assert_eq!((f.numerator, f.denominator), (en, ed));
    }

    assert!(Fraction::new(1, 0).is_err());
}

#[test]
fn test_fraction_arithmetic() {
    let third = Fraction::new(1, 3).unwrap();
    let sixth = Fraction::new(1, 6).unwrap();

    assert_eq!(third.add(sixth).unwrap(), Fraction::new(1, 2).unwrap());
    assert_eq!(sixth.add(third).unwrap(), Fraction::new(1, 2).unwrap());
    assert_eq!(third.subtract(sixth).unwrap(), sixth);
    assert_eq!(third.multiply(sixth).unwrap(), Fraction::new(1, 18).unwrap());
    assert_eq!(third.divide(sixth).unwrap(), Fraction::from_integer(2));
    assert!(third.divide(Fraction::from_integer(0)).is_err());
    assert_eq!(format!("{}", Fraction::new(6, -4).unwrap()), "-3/2");
}

#[test]
fn test_fraction_from_f64() {
    let tests = vec![
        (0.5, (1, 2)),
        (-0.75, (-3, 4)),
        (0.333333333, (1, 3)),
        (3.0, (3, 1)),
        (2.125, (17, 8)),
    ];

    for (value, (n, d)) in tests {
        let f = Fraction::from_f64(value);
        assert_eq!((f.numerator, f.denominator), (n, d), "{}", value);
    }
}

#[test]
fn test_number_tower() {
    let half = Number::Fraction(Fraction::new(1, 2).unwrap());
    let tests = vec![
        (Number::Integer(2), Arithmetic::Add, Number::Integer(3), Number::Integer(5)),
        (
            Number::Integer(6),
            Arithmetic::Divide,
            Number::Integer(-4),
            Number::Fraction(Fraction::new(-3, 2).unwrap()),
        ),
        (Number::Integer(1), Arithmetic::Add, Number::Real(0.5), Number::Real(1.5)),
        (
            Number::Integer(1),
            Arithmetic::Add,
            half,
            Number::Fraction(Fraction::new(3, 2).unwrap()),
        ),
        (Number::Real(1.0), Arithmetic::Multiply, half, Number::Real(0.5)),
        (
            half,
            Arithmetic::Add,
            Number::Real(0.25),
            Number::Fraction(Fraction::new(3, 4).unwrap()),
        ),
    ];

    for (a, op, b, expected) in tests {
        assert_eq!(a.arithmetic(op, b).unwrap(), expected);
    }

    assert!(Number::Integer(i64::MAX)
        .arithmetic(Arithmetic::Add, Number::Integer(1))
        .is_err());
}

#[test]
fn test_number_pow() {
    assert_eq!(Number::Integer(2).pow(Number::Integer(10)).unwrap(), Number::Integer(1024));
    assert_eq!(Number::Integer(2).pow(Number::Real(0.5)).unwrap(), Number::Integer(1));
    assert_eq!(Number::Real(4.0).pow(Number::Real(0.5)).unwrap(), Number::Real(2.0));
    assert_eq!(
        Number::Fraction(Fraction::new(2, 3).unwrap())
            .pow(Number::Integer(2))
            .unwrap(),
        Number::Fraction(Fraction::new(4, 9).unwrap())
    );
    assert_eq!(
        Number::Fraction(Fraction::new(1, 2).unwrap())
            .pow(Number::Integer(-1))
            .unwrap(),
        Number::Fraction(Fraction::from_integer(2))
    );
}
