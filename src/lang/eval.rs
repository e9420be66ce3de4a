use std::io::Write;
use std::ops::Range;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::lang::block::{Block, Cursor};
use crate::lang::exception::{Error, Exception, Result};
use crate::lang::functions::{Body, Function, Functions};
use crate::lang::number::Arithmetic;
use crate::lang::operations::{self, Comparison, Equality, Logic};
use crate::lang::parse::{
    is_identifier, is_infix_operator, parse_literal, tokenize, Group, Item, DEREFERENCE_CHARACTER,
    DIRECTIVE_CHARACTER, MODULUS_CHARACTER, REFERENCE_CHARACTER,
};
use crate::lang::source::Source;
use crate::lang::value::{
    push_argument, FunctionRef, Value, Variable, VariableRef, MAX_REFERENCE_DEPTH,
};
use crate::lang::variables::Variables;

/// Deepest nesting of user function calls and block invocations before the program is stopped
pub const MAX_CALL_DEPTH: usize = 64;

/// Something a value or sub-group can be applied to
enum Callable {
    Function(FunctionRef),
    Block(Rc<Block>),
}

/// Left hand side of a `let`
enum Target {
    Name(String),
    Variable(VariableRef),
}

fn is_else(item: &Item) -> bool {
    item.is_symbol("else") || item.is_symbol("otherwise")
}

/// The group evaluator and everything it needs: frames, functions, input and output
pub struct Interpreter<'a> {
    sink: &'a mut dyn Write,
    sources: Vec<Box<dyn Source + 'a>>,
    variables: Variables,
    functions: Functions,
    /// One entry per block currently being replayed, innermost last
    cursors: Vec<Cursor>,
    /// Current nesting of user calls and block invocations
    depth: usize,
    strict: bool,
    alive: bool,
    line: usize,
}

impl<'a> Interpreter<'a> {
    /// Create a new `Interpreter`
    ///
    /// `sink` receives everything the program prints. `source` feeds lines until it is exhausted.
    pub fn new(sink: &'a mut dyn Write, source: Box<dyn Source + 'a>) -> Self {
        Interpreter {
            sink,
            sources: vec![source],
            variables: Variables::new(),
            functions: Functions::new(),
            cursors: Vec::new(),
            depth: 0,
            strict: false,
            alive: true,
            line: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn kill(&mut self) {
        info!("interpreter killed on line {}", self.line);
        self.alive = false;
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Number of lines read from input sources so far
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn write_line(&mut self, s: &str) -> Result<()> {
        if let Err(e) = writeln!(self.sink, "{}", s) {
            fail!(Io, "Failed to write output", e.to_string());
        }

        Ok(())
    }

    pub fn push_source(&mut self, source: Box<dyn Source + 'a>) {
        self.sources.push(source);
    }

    /// Drops an exhausted source, returning to the one that loaded it
    ///
    /// Returns false when only the outermost source is left.
    pub fn pop_source(&mut self) -> bool {
        if self.sources.len() > 1 {
            self.sources.pop();
            return true;
        }

        false
    }

    /// Reads a line from the active input source
    pub fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        let line = match self.sources.last_mut() {
            Some(source) => source.next_line(prompt)?,
            None => None,
        };

        if let Some(l) = &line {
            self.line += 1;
            info!("read: {}", l);
        }

        Ok(line)
    }

    /// Reads a line for `read`/`read_string`, bypassing any block being replayed
    pub fn read_raw_line(&mut self) -> Result<String> {
        match self.read_line("? ")? {
            Some(line) => Ok(line),
            None => fail!(Io, "Could not read input", "no input left"),
        }
    }

    /// Next line for a block body: from the innermost replay if there is one, else from input
    fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(cursor) = self.cursors.last_mut() {
            return Ok(cursor.advance());
        }

        let prompt = format!("{} . ", self.line + 1);
        self.read_line(&prompt)
    }

    /// Turns an error into the exception shown to the user
    ///
    /// In strict mode the exception is fatal and halts the interpreter on the spot.
    fn raise(&mut self, error: Error) -> Exception {
        let fatal = self.strict;
        if fatal {
            self.kill();
        }

        warn!("{} on line {}", error, self.line);

        Exception {
            error,
            fatal,
            line: self.line,
        }
    }

    /// Evaluates one top level statement
    ///
    /// Failures come back as `Value::Exception`.
    pub fn interpret(&mut self, line: &str) -> Value {
        match self.evaluate_line(line) {
            Ok(value) => value,
            Err(e) => Value::Exception(self.raise(e)),
        }
    }

    /// Tokenizes and evaluates one statement
    pub fn evaluate_line(&mut self, line: &str) -> Result<Value> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Value::Nil);
        }

        let group = tokenize(line)?;
        self.evaluate(group)
    }

    /// Evaluates a group down to a single value
    pub fn evaluate(&mut self, group: Group) -> Result<Value> {
        if group.is_empty() {
            return Ok(Value::ArgumentList(Vec::new()));
        }

        let keyword = group.first_symbol().map(str::to_string);
        match keyword.as_deref() {
            Some(DIRECTIVE_CHARACTER) => return self.directive(group),
            Some("let") => return self.assignment(group),
            Some("if") => return self.conditional(group),
            Some("while") => return self.repetition(group),
            Some("begin") => return self.begin(group),
            Some(k @ "end") | Some(k @ "else") | Some(k @ "otherwise") => {
                fail!(Control, format!("Unexpected keyword '{}'", k))
            }
            Some("for") => fail!(
                Control,
                "Unexpected keyword 'for'",
                "for loops are reserved but not implemented"
            ),
            _ => (),
        }

        let mut items = group.items;
        self.apply(&mut items)?;

        let len = items.len();
        self.resolve_references(&mut items, 0..len)?;
        self.modulus(&mut items)?;
        self.negation(&mut items)?;

        self.reduce(&mut items, &["^"], |_, a, b| operations::pow(a, b))?;
        self.reduce(&mut items, &["/", "*"], |op, a, b| {
            let op = if op == "/" {
                Arithmetic::Divide
            } else {
                Arithmetic::Multiply
            };
            operations::arithmetic(op, a, b)
        })?;
        self.reduce(&mut items, &["+", "-"], |op, a, b| {
            let op = if op == "+" {
                Arithmetic::Add
            } else {
                Arithmetic::Subtract
            };
            operations::arithmetic(op, a, b)
        })?;
        self.reduce(&mut items, &["=", "~=", "/="], |op, a, b| {
            let op = match op {
                "=" => Equality::Equal,
                "~=" => Equality::Approximate,
                _ => Equality::NotEqual,
            };
            operations::equality(op, a, b)
        })?;
        self.reduce(&mut items, &["<", ">", "<=", ">="], |op, a, b| {
            let op = match op {
                "<" => Comparison::Less,
                ">" => Comparison::Greater,
                "<=" => Comparison::LessEqual,
                _ => Comparison::GreaterEqual,
            };
            operations::compare(op, a, b)
        })?;
        self.reduce(&mut items, &[","], |_, a, b| {
            let mut list = match a {
                Value::ArgumentList(list) => list.clone(),
                other => {
                    let mut list = Vec::new();
                    push_argument(&mut list, other.clone());
                    list
                }
            };
            push_argument(&mut list, b.clone());
            Ok(Value::ArgumentList(list))
        })?;
        self.reduce(&mut items, &["and", "or"], |op, a, b| {
            let op = if op == "and" { Logic::And } else { Logic::Or };
            operations::logic(op, a, b)
        })?;

        match items.len() {
            0 => Ok(Value::Nil),
            1 => self.resolve(&items[0]),
            _ => fail!(
                Syntax,
                "Incomplete statement",
                "expression could not be evaluated completely"
            ),
        }
    }

    /// Like `evaluate`, but an empty group is `nil` rather than an empty argument list
    fn evaluate_or_nil(&mut self, group: Group) -> Result<Value> {
        if group.is_empty() {
            return Ok(Value::Nil);
        }

        self.evaluate(group)
    }

    /// Value of a single symbol: literal, keyword constant, function or variable
    fn lookup(&self, symbol: &str) -> Result<Value> {
        match symbol {
            "" | "nil" => return Ok(Value::Nil),
            "yes" => return Ok(Value::Boolean(true)),
            "no" => return Ok(Value::Boolean(false)),
            "break" => return Ok(Value::Break),
            _ => (),
        }

        if let Some(v) = parse_literal(symbol) {
            return Ok(v);
        }
        if let Some(f) = self.functions.get(symbol) {
            return Ok(Value::Function(f));
        }
        if let Some(var) = self.variables.get(symbol) {
            return Ok(Value::Variable(var.clone()));
        }

        fail!(
            Name,
            format!("Variable or function with identifier '{}' not found", symbol)
        );
    }

    fn resolve(&mut self, item: &Item) -> Result<Value> {
        match item {
            Item::Symbol(s) => self.lookup(s),
            Item::Value(v) => Ok(v.clone()),
            Item::Group(g) => self.evaluate(g.clone()),
        }
    }

    fn callable(&self, item: &Item) -> Option<Callable> {
        let value = match item {
            Item::Symbol(s) if is_identifier(s) => self.lookup(s).ok()?,
            Item::Value(v) => v.clone(),
            _ => return None,
        };

        if let Some(f) = value.as_function() {
            return Some(Callable::Function(f));
        }

        value.as_block().map(Callable::Block)
    }

    /// Evaluates sub-groups and applies functions and blocks to the value that follows them
    fn apply(&mut self, items: &mut Vec<Item>) -> Result<()> {
        let mut i = 0;
        while i < items.len() {
            if let Item::Group(g) = &mut items[i] {
                let g = std::mem::take(g);
                items[i] = Item::Value(self.evaluate(g)?);
            }

            if i > 0 {
                if let Some(callable) = self.callable(&items[i - 1]) {
                    let arg = match &items[i] {
                        Item::Value(v) => v.clone(),
                        _ => {
                            i += 1;
                            continue;
                        }
                    };

                    let res = match callable {
                        Callable::Function(f) => self.call(&f, arg)?,
                        Callable::Block(b) => self.nested(|interp| interp.run_block(&b, true))?,
                    };
                    items[i - 1] = Item::Value(res);
                    items.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        Ok(())
    }

    /// Reduces `@` and `~` within `range`, rightmost first
    fn resolve_references(&mut self, items: &mut Vec<Item>, range: Range<usize>) -> Result<()> {
        let start = range.start;
        let mut end = range.end;

        loop {
            let index = (start..end).rev().find(|&i| {
                items[i].is_symbol(REFERENCE_CHARACTER) || items[i].is_symbol(DEREFERENCE_CHARACTER)
            });
            let index = match index {
                Some(i) => i,
                None => return Ok(()),
            };

            let op = items[index].symbol().unwrap_or_default().to_string();
            if index + 1 >= end {
                fail!(
                    Syntax,
                    format!("Invalid expression term '{}' at end of statement", op)
                );
            }

            let operand = self.resolve(&items[index + 1])?;
            let var = match operand {
                Value::Variable(var) => var,
                v if op == REFERENCE_CHARACTER => fail!(
                    Type,
                    format!("Attempted creation of reference to {}", v.type_name()),
                    "expected variable identifier"
                ),
                v => fail!(
                    Type,
                    format!("Attempted dereference of {}", v.type_name()),
                    "expected variable identifier"
                ),
            };

            let res = if op == REFERENCE_CHARACTER {
                Value::Variable(Variable::new("reference", Value::Variable(var)))
            } else {
                match var.borrow().value.clone() {
                    v @ Value::Variable(_) | v @ Value::Function(_) => v,
                    _ => fail!(
                        Type,
                        "Dereference of value type variable",
                        "expected reference variable"
                    ),
                }
            };

            items[index] = Item::Value(res);
            items.remove(index + 1);
            end -= 1;
        }
    }

    /// Reduces `|x|` pairs
    fn modulus(&mut self, items: &mut Vec<Item>) -> Result<()> {
        while let Some(index) = items.iter().position(|i| i.is_symbol(MODULUS_CHARACTER)) {
            let closed = items
                .get(index + 2)
                .map_or(false, |i| i.is_symbol(MODULUS_CHARACTER));
            if !closed {
                fail!(Syntax, "Modulus brackets not closed", "another | required");
            }

            let value = self.resolve(&items[index + 1])?;
            items[index] = Item::Value(operations::modulus(&value)?);
            items.drain(index + 1..index + 3);
        }

        Ok(())
    }

    /// Reduces `-` with no left operand, rightmost first
    fn negation(&mut self, items: &mut Vec<Item>) -> Result<()> {
        loop {
            let index = (0..items.len()).rev().find(|&i| {
                items[i].is_symbol("-")
                    && (i == 0 || items[i - 1].symbol().map_or(false, is_infix_operator))
            });
            let index = match index {
                Some(i) => i,
                None => return Ok(()),
            };

            if index + 1 >= items.len() {
                fail!(Syntax, "Invalid expression term '-'");
            }

            let value = self.resolve(&items[index + 1])?;
            items[index] = Item::Value(operations::negate(&value)?);
            items.remove(index + 1);
        }
    }

    /// Repeatedly reduces the leftmost of `operators` with its two neighbours
    fn reduce<F>(&mut self, items: &mut Vec<Item>, operators: &[&str], op: F) -> Result<()>
    where
        F: Fn(&str, &Value, &Value) -> Result<Value>,
    {
        loop {
            let index = items
                .iter()
                .position(|i| i.symbol().map_or(false, |s| operators.contains(&s)));
            let index = match index {
                Some(i) => i,
                None => return Ok(()),
            };

            let symbol = items[index].symbol().unwrap_or_default().to_string();
            if index == 0 || index + 1 >= items.len() {
                fail!(Syntax, format!("Invalid expression term '{}'", symbol));
            }

            let a = self.resolve(&items[index - 1])?;
            let b = self.resolve(&items[index + 1])?;
            items[index - 1] = Item::Value(op(&symbol, &a, &b)?);
            items.drain(index..index + 2);
        }
    }

    /// `#STRICT <condition>`
    fn directive(&mut self, group: Group) -> Result<Value> {
        let name = group.items.get(1).and_then(Item::symbol).unwrap_or("");
        if name != "STRICT" {
            fail!(
                Syntax,
                "Could not use directive",
                format!("directive '{}' not recognised", name)
            );
        }
        if group.len() < 3 {
            fail!(
                Syntax,
                "Directive 'STRICT' could not be used",
                "invalid parameter (none given); use yes or no"
            );
        }

        let strict = match self.evaluate(group.slice(2..group.len()))?.dereferenced()? {
            Value::Boolean(b) => b,
            _ => fail!(
                Syntax,
                "Directive 'STRICT' could not be used",
                "invalid parameter; use yes or no"
            ),
        };

        self.strict = strict;
        self.write_line(if strict {
            "Interpreter running in strict mode"
        } else {
            "Interpreter not running in strict mode"
        })?;

        Ok(Value::Nil)
    }

    fn target(&mut self, item: &Item) -> Result<Target> {
        let value = match item {
            Item::Symbol(s) if is_identifier(s) => return Ok(Target::Name(s.clone())),
            Item::Value(v) => v.clone(),
            Item::Group(g) => self.evaluate(g.clone())?,
            Item::Symbol(_) => fail!(
                Syntax,
                "Could not assign variable",
                "invalid variable name given"
            ),
        };

        match value {
            Value::Variable(var) => Ok(Target::Variable(var)),
            Value::Function(f) => Ok(Target::Name(f.borrow().name.clone())),
            _ => fail!(
                Syntax,
                "Could not assign variable",
                "invalid variable name given"
            ),
        }
    }

    /// `let <name> = <expr>` and `let <name>(<params>) = <body>`
    fn assignment(&mut self, group: Group) -> Result<Value> {
        let mut items = group.items;
        let equals = match items.iter().position(|i| i.is_symbol("=")) {
            Some(i) => i,
            None => fail!(
                Syntax,
                "Variable or function could not be assigned a value",
                "'=' required"
            ),
        };

        if equals == 1 {
            fail!(Syntax, "Could not assign variable", "no variable name given");
        }

        self.resolve_references(&mut items, 1..equals)?;
        let target = self.target(&items[1])?;

        match items.get(2) {
            Some(Item::Group(params)) => {
                let params = params.clone();
                self.declare_function(target, params, &items[3..])
            }
            Some(item) if item.is_symbol("=") && items.len() > 3 => {
                self.assign_variable(target, Group::new(items[3..].to_vec()))
            }
            _ => fail!(
                Syntax,
                "Variable could not be assigned a value",
                "value to assign to variable must be given"
            ),
        }
    }

    fn declare_function(&mut self, target: Target, params: Group, rest: &[Item]) -> Result<Value> {
        let name = match target {
            Target::Name(n) => n,
            Target::Variable(var) => var.borrow().identifier.clone(),
        };

        let mut names = Vec::new();
        let mut comma_expected = false;
        for item in &params.items {
            match (comma_expected, item.symbol()) {
                (true, Some(",")) => (),
                (false, Some(s)) if is_identifier(s) => names.push(s.to_string()),
                _ => fail!(
                    Syntax,
                    "Parameters could not be parsed",
                    "invalid parameter name given"
                ),
            }
            comma_expected = !comma_expected;
        }
        if !params.is_empty() && !comma_expected {
            fail!(
                Syntax,
                "Parameters could not be parsed",
                "last parameter missing"
            );
        }

        if !rest.first().map_or(false, |i| i.is_symbol("=")) {
            fail!(
                Syntax,
                "Function could not be given a body",
                "function body must be given"
            );
        }

        let body = if rest.len() == 1 {
            Body::Block(Rc::new(self.capture_block(false)?))
        } else {
            Body::Line(Group::new(rest[1..].to_vec()))
        };

        debug!("defining {}{}", name, Value::ParameterList(names.clone()));
        let function = self.functions.define(Function::new(name, names, body))?;

        Ok(Value::Function(function))
    }

    fn assign_variable(&mut self, target: Target, expr: Group) -> Result<Value> {
        // Assignment copies the value out of a variable; only `@` creates references
        let value = self.evaluate(expr)?.held();

        let existing = match target {
            Target::Name(name) => match self.variables.get(&name) {
                Some(var) => var.clone(),
                None => {
                    let var = Variable::new(name, value);
                    self.variables.insert(var.clone());
                    return Ok(Value::Variable(var));
                }
            },
            Target::Variable(var) => var,
        };

        check_reference(&existing, &value)?;
        existing.borrow_mut().value = value;

        Ok(Value::Variable(existing))
    }

    fn condition(&mut self, group: Group) -> Result<bool> {
        match self.evaluate(group)?.dereferenced()? {
            Value::Boolean(b) => Ok(b),
            _ => fail!(
                Type,
                "Condition does not evaluate to a boolean value",
                "yes or no"
            ),
        }
    }

    /// Index of the comma ending the condition of `keyword`
    fn condition_end(group: &Group, keyword: &str) -> Result<usize> {
        if group.len() == 1 {
            fail!(
                Syntax,
                "Statement could not be evaluated",
                format!("{} statement must be given a condition", keyword)
            );
        }

        match group.position(",") {
            Some(i) => Ok(i),
            None => fail!(
                Syntax,
                format!("{} statement invalid", keyword),
                "comma required after condition"
            ),
        }
    }

    /// `if <cond>, <stmt> [else <stmt>]` or `if <cond>,` followed by a block
    fn conditional(&mut self, group: Group) -> Result<Value> {
        let comma = Self::condition_end(&group, "if")?;
        let condition = self.condition(group.slice(1..comma))?;
        let body = group.slice(comma + 1..group.len());

        if body.is_empty() {
            let block = Rc::new(self.capture_block(true)?);
            if condition {
                return self.run_block(&block, true);
            }
            if block.has_else() {
                return self.run_block(&block, false);
            }

            return Ok(Value::Boolean(false));
        }

        match body.items.iter().position(is_else) {
            None if condition => self.evaluate(body),
            None => Ok(Value::Nil),
            Some(e) if e == body.len() - 1 => {
                // The else body follows on the next lines
                let block = Rc::new(self.capture_block(false)?);
                if condition {
                    self.evaluate_or_nil(body.slice(0..e))
                } else {
                    self.run_block(&block, true)
                }
            }
            Some(e) if condition => self.evaluate_or_nil(body.slice(0..e)),
            Some(e) => self.evaluate_or_nil(body.slice(e + 1..body.len())),
        }
    }

    /// `while <cond>, <stmt>` or `while <cond>,` followed by a block
    fn repetition(&mut self, group: Group) -> Result<Value> {
        let comma = Self::condition_end(&group, "while")?;
        let condition = group.slice(1..comma);
        let body = group.slice(comma + 1..group.len());

        let block = if body.is_empty() {
            Some(Rc::new(self.capture_block(false)?))
        } else {
            None
        };

        let level = self.variables.level();
        while self.alive && self.condition(condition.clone())? {
            let value = match &block {
                Some(b) => self.run_block(b, true)?,
                None => self.evaluate(body.clone())?,
            };

            if self.variables.level() < level {
                // exit() left the enclosing function
                return Ok(value);
            }
            if let Value::Break = value {
                break;
            }
        }

        Ok(Value::Nil)
    }

    /// `begin` captures a block as a value
    fn begin(&mut self, group: Group) -> Result<Value> {
        if group.len() > 1 {
            fail!(
                Syntax,
                "Unexpected symbols after 'begin'",
                "begin must be alone on its line"
            );
        }

        Ok(Value::Block(Rc::new(self.capture_block(false)?)))
    }

    fn capture_block(&mut self, else_allowed: bool) -> Result<Block> {
        Block::capture(|| self.next_line(), else_allowed)
    }

    /// Replays one branch of `block` in the current frame
    ///
    /// Stops early on `break`, or when `exit()` pops the frame the block started in.
    fn run_block(&mut self, block: &Rc<Block>, before_else: bool) -> Result<Value> {
        let range = block.range(before_else)?;
        let level = self.variables.level();

        self.cursors.push(Cursor::new(block.clone(), range));
        let res = self.replay(level);
        self.cursors.pop();

        res
    }

    fn replay(&mut self, level: usize) -> Result<Value> {
        let mut value = Value::Nil;

        while self.alive {
            let statement = match self.cursors.last_mut().and_then(Cursor::advance) {
                Some(s) => s,
                None => break,
            };

            value = self.evaluate_line(&statement)?;
            if self.variables.level() < level {
                break;
            }
            if let Value::Break = value {
                break;
            }
        }

        Ok(value)
    }

    /// Calls `function` with `arg`, which is either an argument list or a single argument
    pub fn call(&mut self, function: &FunctionRef, arg: Value) -> Result<Value> {
        let args = match arg {
            Value::ArgumentList(list) => list,
            other => {
                let mut list = Vec::new();
                push_argument(&mut list, other);
                list
            }
        };

        let (name, bound, body) = {
            let f = function.borrow();
            (f.name.clone(), f.bind(args)?, f.body.clone())
        };
        debug!("calling {} with {} arguments", name, bound.len());

        if let Body::Native(builtin) = body {
            let args: Vec<Value> = bound.into_iter().map(|(_, v)| v).collect();
            return Ok(builtin.call(self, &args)?.held());
        }
        self.variables.push_scope();
        let level = self.variables.level();
        for (name, value) in bound {
            self.variables.insert(Variable::new(name, value));
        }

        let res = self.nested(|interp| match &body {
            Body::Line(group) => interp.evaluate(group.clone()),
            Body::Block(block) => interp.run_block(block, true),
            Body::Native(_) => Ok(Value::Nil),
        });

        // exit() may already have popped this frame
        if self.variables.level() >= level {
            self.variables.pop_scope();
        }

        Ok(res?.held())
    }

    /// Runs `f` one call level deeper, refusing once the nesting limit is reached
    fn nested<F>(&mut self, f: F) -> Result<Value>
    where
        F: FnOnce(&mut Self) -> Result<Value>,
    {
        if self.depth >= MAX_CALL_DEPTH {
            fail!(
                Control,
                "Maximum recursion depth exceeded",
                format!("more than {} nested calls", MAX_CALL_DEPTH)
            );
        }

        self.depth += 1;
        let res = f(self);
        self.depth -= 1;

        res
    }

    /// `exit()`: leaves the current function, or halts at the outermost frame
    pub fn exit_frame(&mut self) {
        if self.variables.level() <= 1 {
            self.kill();
        } else {
            self.variables.pop_scope();
        }
    }
}

/// Rejects an assignment that would make `target` reference itself through any chain
fn check_reference(target: &VariableRef, value: &Value) -> Result<()> {
    let mut cur = match value {
        Value::Variable(var) => var.clone(),
        _ => return Ok(()),
    };

    for depth in 0..MAX_REFERENCE_DEPTH {
        if Rc::ptr_eq(&cur, target) {
            if depth == 0 {
                fail!(
                    Semantic,
                    "Illegal assignment attempted",
                    "variables cannot reference themselves"
                );
            }
            fail!(
                Semantic,
                "Illegal assignment attempted",
                "circular reference detected"
            );
        }

        let next = match &cur.borrow().value {
            Value::Variable(var) => var.clone(),
            _ => return Ok(()),
        };
        cur = next;
    }

    fail!(
        Semantic,
        "Illegal assignment attempted",
        "reference chain too long"
    );
}

#[cfg(test)]
fn run_script(script: &str) -> String {
    use crate::lang::source::ScriptSource;

    let mut output = Vec::new();
    {
        let source = Box::new(ScriptSource::new(script.as_bytes()));
        let mut interp = Interpreter::new(&mut output, source);

        while let Ok(Some(line)) = interp.read_line("") {
            let value = interp.interpret(&line);
            if !value.is_nil() {
                interp.write_line(&value.to_string()).expect("Failed to write");
            }

            if !interp.is_alive() {
                break;
            }
        }
    }

    String::from_utf8(output).expect("Output not utf-8")
}

#[test]
fn test_expression() {
    let tests = vec![
        ("6/-4", "-3/2\n"),
        ("1/3 + 1/6", "1/2\n"),
        ("(1/3) + (1/6)", "1/2\n"),
        ("2 + 3 * 2 ^ 2", "14\n"),
        ("10 - 2 - 3", "5\n"),
        ("8 / 2 * 2", "8/1\n"),
        ("2 * -3", "-6\n"),
        ("5 - -3", "8\n"),
        ("--3", "3\n"),
        ("|3 - 5| * 2", "4\n"),
        ("-|2 - 5|", "-3\n"),
        ("1.5 + 1", "2.5\n"),
        ("1 + 0.5", "1.5\n"),
        ("1/2 + 0.25", "3/4\n"),
        ("2 ^ 10", "1024\n"),
        ("1 = 1.0", "yes\n"),
        ("1 ~= 1.3", "yes\n"),
        ("1 /= 2", "yes\n"),
        ("1 < 2 and 2 < 3", "yes\n"),
        ("1 > 2 or no", "no\n"),
        ("2 >= 2", "yes\n"),
        ("1, 2, 3", "1, 2, 3\n"),
        (r#""abc" + "def""#, "\"abcdef\"\n"),
        ("nil", ""),
        ("yes", "yes\n"),
        ("\n\n7", "7\n"),
    ];

    for (input, expected) in tests {
        assert_eq!(run_script(input), expected, "{}", input);
    }
}

#[test]
fn test_errors() {
    let tests = vec![
        (
            "(1 + 2",
            "*** Warning! Too few closing brackets on line 1 (1 required)\n",
        ),
        (
            "1 + 2)",
            "*** Warning! Too many closing brackets on line 1 (remove 1)\n",
        ),
        (
            r#""abc" + 1"#,
            "*** Warning! Attempted addition of a number to a string on line 1\n",
        ),
        (
            "1 +",
            "*** Warning! Invalid expression term '+' on line 1\n",
        ),
        (
            "foo",
            "*** Warning! Variable or function with identifier 'foo' not found on line 1\n",
        ),
        ("1 2", "*** Warning! Incomplete statement on line 1 (expression could not be evaluated completely)\n"),
        ("end", "*** Warning! Unexpected keyword 'end' on line 1\n"),
        ("otherwise", "*** Warning! Unexpected keyword 'otherwise' on line 1\n"),
        (
            "if 1, 2",
            "*** Warning! Condition does not evaluate to a boolean value on line 1 (yes or no)\n",
        ),
        (
            "if yes 2",
            "*** Warning! if statement invalid on line 1 (comma required after condition)\n",
        ),
        (
            "yes and 1",
            "*** Warning! Expected boolean, got 'integer' on line 1 (yes or no)\n",
        ),
        (
            "#FAST yes",
            "*** Warning! Could not use directive on line 1 (directive 'FAST' not recognised)\n",
        ),
        (
            "for x, 1",
            "*** Warning! Unexpected keyword 'for' on line 1 (for loops are reserved but not implemented)\n",
        ),
        (
            "1 / 0",
            "*** Warning! Division by zero on line 1 (denominator is 0)\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run_script(input), expected, "{}", input);
    }
}

#[test]
fn test_variables() {
    let tests = vec![
        ("let x = 5\nlet x = x + 1\nx", "x = 5\nx = 6\nx = 6\n"),
        ("let x = 1\nlet y = x\nlet x = 2\ny", "x = 1\ny = 1\nx = 2\ny = 1\n"),
        (
            "let x = 1\nlet y = @x\nlet ~y = 10\nx\ny",
            "x = 1\ny => x = 1\nx = 10\nx = 10\ny => x = 10\n",
        ),
        (
            "let x = 1\nlet x = @x",
            "x = 1\n*** Warning! Illegal assignment attempted on line 2 (variables cannot reference themselves)\n",
        ),
        (
            "let a = 1\nlet b = @a\nlet a = @b",
            "a = 1\nb => a = 1\n*** Warning! Illegal assignment attempted on line 3 (circular reference detected)\n",
        ),
        (
            "let x = 3\n~x",
            "x = 3\n*** Warning! Dereference of value type variable on line 2 (expected reference variable)\n",
        ),
        (
            "let x",
            "*** Warning! Variable or function could not be assigned a value on line 1 ('=' required)\n",
        ),
        (
            "let 5 = 3",
            "*** Warning! Could not assign variable on line 1 (invalid variable name given)\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run_script(input), expected, "{}", input);
    }
}

#[test]
fn test_functions() {
    let tests = vec![
        ("let f(n) = n * n\nf(4)", "f\n16\n"),
        ("let f(n) = n * n\nlet f(n) = n + n\nf(4)", "f\nf\n8\n"),
        ("let add(a, b) = a + b\nadd(1, 2)", "add\n3\n"),
        ("let one() = 1\none()", "one\n1\n"),
        (
            "let g(a, b) = a + b\ng(1)",
            "g\n*** Warning! Incorrect number of arguments for function 'g' on line 2 (1 out of 2 given)\n",
        ),
        (
            "let print(x) = x",
            "*** Warning! Standard library function with name 'print' already exists on line 1\n",
        ),
        (
            "let f(a,) = a",
            "*** Warning! Parameters could not be parsed on line 1 (last parameter missing)\n",
        ),
        (
            "let f(a b) = a",
            "*** Warning! Parameters could not be parsed on line 1 (invalid parameter name given)\n",
        ),
        // Frames are flat: a function cannot see the caller's variables
        (
            "let x = 1\nlet f() = x\nf()",
            "x = 1\nf\n*** Warning! Variable or function with identifier 'x' not found on line 3\n",
        ),
        (
            "let fact(n) = if n < 2, 1 else n * fact(n - 1)\nfact(5)",
            "fact\n120\n",
        ),
        (r#"print("a", 1, 1/2)"#, "a11/2\n"),
        ("let sq(n) = n * n\nlet g = sq\ng(3)", "sq\ng = sq\n9\n"),
        ("random(1)", "0\n"),
    ];

    for (input, expected) in tests {
        assert_eq!(run_script(input), expected, "{}", input);
    }
}

#[test]
fn test_if() {
    let tests = vec![
        ("if yes, 1 else 2", "1\n"),
        ("if no, 1 else 2", "2\n"),
        ("if no, 1 otherwise 2", "2\n"),
        ("if no, 1", ""),
        (
            "let x = 3\nif x > 2,\nprint(\"big\")\nelse\nprint(\"small\")\nend",
            "x = 3\nbig\n",
        ),
        (
            "let x = 1\nif x > 2,\nprint(\"big\")\nelse\nprint(\"small\")\nend",
            "x = 1\nsmall\n",
        ),
        ("if no,\nprint(1)\nend", "no\n"),
        ("if no,\nprint(1)\nelse print(2)\nprint(3)", "2\n3\n"),
        ("if no, print(\"a\") else\nprint(\"b\")\nend", "b\n"),
        ("if yes, print(\"a\") else\nprint(\"b\")\nend", "a\n"),
        (
            "if yes,\nprint(1)\nelse\nprint(2)\nelse\nprint(3)\nend",
            "*** Warning! Unexpected keyword 'else' on line 5 (else already used)\n3\n*** Warning! Unexpected keyword 'end' on line 7\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run_script(input), expected, "{}", input);
    }
}

#[test]
fn test_loop() {
    let tests = vec![
        ("let n = 0\nwhile n < 5, let n = n + 1\nn", "n = 0\nn = 5\n"),
        (
            "let n = 0\nwhile yes,\nlet n = n + 1\nif n = 3, break\nend\nn",
            "n = 0\nn = 3\n",
        ),
        (
            "let n = 0\nwhile n < 3,\nprint(n)\nlet n = n + 1\nend",
            "n = 0\n0\n1\n2\n",
        ),
        (
            "let i = 0\nwhile i < 2,\nlet j = 0\nwhile j < 2,\nprint(i, j)\nlet j = j + 1\nend\nlet i = i + 1\nend",
            "i = 0\n00\n01\n10\n11\n",
        ),
        ("while 1, 2", "*** Warning! Condition does not evaluate to a boolean value on line 1 (yes or no)\n"),
    ];

    for (input, expected) in tests {
        assert_eq!(run_script(input), expected, "{}", input);
    }
}

#[test]
fn test_blocks() {
    let tests = vec![
        (
            "let fact(n) =\nif n < 2,\n1\nelse\nn * fact(n - 1)\nend\nend\nfact(5)",
            "fact\n120\n",
        ),
        (
            "let b = begin\nprint(\"in b\")\nend\nb()",
            "b = block\nin b\n",
        ),
        (
            "let f(x) =\nif x > 0, exit(\"positive\")\n\"never\"\nend\nf(1)\nf(0)",
            "f\n\"positive\"\n\"never\"\n",
        ),
        (
            "let f() =\nlet n = 0\nwhile yes,\nlet n = n + 1\nif n = 3, exit(n)\nend\nprint(\"unreachable\")\nend\nf()",
            "f\n3\n",
        ),
        ("print(1)\nexit()\nprint(2)", "1\n"),
        ("begin\nelse\nend", "*** Warning! Unexpected keyword 'else' on line 2 (else not allowed in this construct)\n*** Warning! Unexpected keyword 'end' on line 3\n"),
    ];

    for (input, expected) in tests {
        assert_eq!(run_script(input), expected, "{}", input);
    }
}

#[test]
fn test_read() {
    let tests = vec![
        (
            "let s = read_string()\nhello world\ns",
            "s = \"hello world\"\ns = \"hello world\"\n",
        ),
        ("let v = read()\n1/2 + 1\nv", "v = 3/2\nv = 3/2\n"),
    ];

    for (input, expected) in tests {
        assert_eq!(run_script(input), expected, "{}", input);
    }
}

#[test]
fn test_strict() {
    let tests = vec![
        (
            "#STRICT yes\nfoo\nprint(1)",
            "Interpreter running in strict mode\n*** Fatal error! Variable or function with identifier 'foo' not found on line 2\n",
        ),
        (
            "#STRICT no\nfoo\nprint(1)",
            "Interpreter not running in strict mode\n*** Warning! Variable or function with identifier 'foo' not found on line 2\n1\n",
        ),
        (
            "#STRICT 1",
            "*** Warning! Directive 'STRICT' could not be used on line 1 (invalid parameter; use yes or no)\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run_script(input), expected, "{}", input);
    }
}

#[test]
fn test_recursion_limit() {
    let tests = vec![
        (
            "let f(n) = if n < 1, 0 else 1 + f(n - 1)\nf(100000)\nf(10)\nprint(\"alive\")",
            "f\n*** Warning! Maximum recursion depth exceeded on line 2 (more than 64 nested calls)\n10\nalive\n",
        ),
        (
            "let b = begin\nb()\nend\nb()\nprint(1)",
            "b = block\n*** Warning! Maximum recursion depth exceeded on line 4 (more than 64 nested calls)\n1\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run_script(input), expected, "{}", input);
    }
}

#[test]
fn test_random() {
    let tests = vec![
        (
            "random(0)",
            "*** Warning! Invalid upper bound 0 for random on line 1 (upper bound must be positive)\n",
        ),
        (
            "random(\"a\")",
            "*** Warning! Expected number, got 'string' on line 1 (random requires an upper bound)\n",
        ),
        ("random(1.7) < 2", "yes\n"),
        (
            "let ok = yes\nlet i = 0\nwhile i < 50,\nlet r = random(6)\nif r < 0 or r > 5, let ok = no\nlet i = i + 1\nend\nok",
            "ok = yes\ni = 0\nok = yes\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run_script(input), expected, "{}", input);
    }
}
