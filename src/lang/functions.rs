use std::cell::RefCell;
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::rc::Rc;

use lazy_static::lazy_static;
use log::info;
use rand::Rng;

use crate::lang::block::Block;
use crate::lang::eval::Interpreter;
use crate::lang::exception::{Error, Result};
use crate::lang::parse::Group;
use crate::lang::source::ScriptSource;
use crate::lang::value::{FunctionRef, Value};

/// Standard library primitives
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Builtin {
    Print,
    Read,
    ReadString,
    Random,
    Load,
    Exit,
}

impl TryFrom<&str> for Builtin {
    type Error = Error;

    fn try_from(f: &str) -> Result<Self> {
        Ok(match f {
            "print" => Self::Print,
            "read" => Self::Read,
            "read_string" => Self::ReadString,
            "random" => Self::Random,
            "load" => Self::Load,
            "exit" => Self::Exit,
            _ => fail!(Name, format!("Unknown builtin: {}", f)),
        })
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Builtin::Print => write!(f, "print"),
            Builtin::Read => write!(f, "read"),
            Builtin::ReadString => write!(f, "read_string"),
            Builtin::Random => write!(f, "random"),
            Builtin::Load => write!(f, "load"),
            Builtin::Exit => write!(f, "exit"),
        }
    }
}

lazy_static! {
    pub static ref BUILTINS: Vec<Builtin> = vec![
        Builtin::Print,
        Builtin::Read,
        Builtin::ReadString,
        Builtin::Random,
        Builtin::Load,
        Builtin::Exit,
    ];
}

impl Builtin {
    fn function(self) -> Function {
        let (arity, defaults) = match self {
            Builtin::Print => (Arity::Variadic, vec![]),
            Builtin::Read | Builtin::ReadString => (Arity::Fixed(vec![]), vec![]),
            Builtin::Random => (Arity::Fixed(vec!["n".to_string()]), vec![None]),
            Builtin::Load => (Arity::Fixed(vec!["path".to_string()]), vec![None]),
            Builtin::Exit => (
                Arity::Fixed(vec!["returnValue".to_string()]),
                vec![Some(Value::Nil)],
            ),
        };

        Function {
            name: self.to_string(),
            arity,
            body: Body::Native(self),
            defaults,
        }
    }

    pub fn call(self, interp: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
        match self {
            Builtin::Print => {
                let mut out = String::new();
                for arg in args {
                    match arg {
                        Value::String(s) => out += s,
                        v => out += &v.to_string(),
                    }
                }
                interp.write_line(&out)?;

                Ok(Value::Nil)
            }
            Builtin::Read => {
                let line = interp.read_raw_line()?;
                interp.evaluate_line(&line)
            }
            Builtin::ReadString => Ok(Value::String(interp.read_raw_line()?)),
            Builtin::Random => {
                let n = match args[0].dereferenced()?.as_number() {
                    Some(n) => n.to_integer()?,
                    None => fail!(
                        Type,
                        format!("Expected number, got '{}'", args[0].type_name()),
                        "random requires an upper bound"
                    ),
                };
                if n <= 0 {
                    fail!(
                        Type,
                        format!("Invalid upper bound {} for random", n),
                        "upper bound must be positive"
                    );
                }

                Ok(Value::Integer(rand::thread_rng().gen_range(0..n)))
            }
            Builtin::Load => {
                let path = args[0].as_string()?;
                let file = match File::open(&path) {
                    Ok(f) => f,
                    Err(e) => fail!(Io, format!("Could not load '{}'", path), e.to_string()),
                };
                info!("loading {}", path);
                interp.push_source(Box::new(ScriptSource::new(BufReader::new(file))));

                Ok(Value::Nil)
            }
            Builtin::Exit => {
                interp.exit_frame();
                Ok(args[0].clone())
            }
        }
    }
}

#[derive(Clone, Debug)]
pub enum Arity {
    Fixed(Vec<String>),
    /// Arguments are bound as `arg0`, `arg1`, ...
    Variadic,
}

#[derive(Clone, Debug)]
pub enum Body {
    Native(Builtin),
    /// Single line body, evaluated from a fresh copy on every call
    Line(Group),
    Block(Rc<Block>),
}

#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub arity: Arity,
    pub body: Body,
    /// Aligned with the fixed parameter names. `None` marks a mandatory argument.
    pub defaults: Vec<Option<Value>>,
}

impl Function {
    pub fn new(name: String, params: Vec<String>, body: Body) -> Self {
        let defaults = vec![None; params.len()];
        Function {
            name,
            arity: Arity::Fixed(params),
            body,
            defaults,
        }
    }

    /// Pairs arguments with parameter names, filling in defaults
    pub fn bind(&self, mut args: Vec<Value>) -> Result<Vec<(String, Value)>> {
        let names = match &self.arity {
            Arity::Variadic => {
                return Ok(args
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (format!("arg{}", i), v))
                    .collect())
            }
            Arity::Fixed(names) => names,
        };

        while args.len() < names.len() {
            match self.defaults.get(args.len()) {
                Some(Some(default)) => args.push(default.clone()),
                _ => break,
            }
        }

        if args.len() != names.len() {
            fail!(
                Arity,
                format!("Incorrect number of arguments for function '{}'", self.name),
                format!("{} out of {} given", args.len(), names.len())
            );
        }

        Ok(names.iter().cloned().zip(args.into_iter()).collect())
    }
}

/// Global name to function table
pub struct Functions {
    user: BTreeMap<String, FunctionRef>,
    builtins: BTreeMap<String, FunctionRef>,
}

impl Functions {
    pub fn new() -> Self {
        let mut builtins = BTreeMap::default();
        for builtin in &*BUILTINS {
            builtins.insert(
                builtin.to_string(),
                Rc::new(RefCell::new(builtin.function())),
            );
        }

        Functions {
            user: BTreeMap::default(),
            builtins,
        }
    }

    pub fn get(&self, name: &str) -> Option<FunctionRef> {
        self.user
            .get(name)
            .or_else(|| self.builtins.get(name))
            .cloned()
    }

    /// Registers `function`, overwriting any user function with the same name in place
    pub fn define(&mut self, function: Function) -> Result<FunctionRef> {
        if Builtin::try_from(function.name.as_str()).is_ok() {
            fail!(
                Semantic,
                format!(
                    "Standard library function with name '{}' already exists",
                    function.name
                )
            );
        }

        if let Some(existing) = self.user.get(&function.name) {
            *existing.borrow_mut() = function;
            return Ok(existing.clone());
        }

        let name = function.name.clone();
        let function = Rc::new(RefCell::new(function));
        self.user.insert(name, function.clone());

        Ok(function)
    }
}

#[test]
fn test_builtin_names() {
    for builtin in &*BUILTINS {
        let name = builtin.to_string();
        assert_eq!(Builtin::try_from(name.as_str()).unwrap(), *builtin);
    }
    assert!(Builtin::try_from("printf").is_err());
}

#[test]
fn test_bind() {
    let exit = Builtin::Exit.function();
    let bound = exit.bind(vec![]).unwrap();
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].0, "returnValue");
    assert!(bound[0].1.is_nil());

    let f = Function::new(
        "f".to_string(),
        vec!["a".to_string(), "b".to_string()],
        Body::Line(Group::default()),
    );
    let err = f.bind(vec![Value::Integer(1)]).unwrap_err();
    assert_eq!(err.message, "Incorrect number of arguments for function 'f'");
    assert_eq!(err.hint, "1 out of 2 given");

    let print = Builtin::Print.function();
    let bound = print
        .bind(vec![Value::Integer(1), Value::Integer(2)])
        .unwrap();
    let names: Vec<_> = bound.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["arg0", "arg1"]);
}

#[test]
fn test_define() {
    let mut functions = Functions::new();
    let body = || Body::Line(Group::default());

    let err = functions
        .define(Function::new("print".to_string(), vec![], body()))
        .unwrap_err();
    assert_eq!(
        err.message,
        "Standard library function with name 'print' already exists"
    );

    let first = functions
        .define(Function::new("f".to_string(), vec![], body()))
        .unwrap();
    let second = functions
        .define(Function::new("f".to_string(), vec!["x".to_string()], body()))
        .unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert!(matches!(&first.borrow().arity, Arity::Fixed(p) if p.len() == 1));
    assert!(functions.get("exit").is_some());
    assert!(functions.get("g").is_none());
}
