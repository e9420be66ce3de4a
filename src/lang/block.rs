use std::ops::Range;
use std::rc::Rc;

use log::info;

use crate::lang::exception::Result;
use crate::lang::parse::{tokenize, Group};

const ELSE_KEYWORDS: [&str; 2] = ["else", "otherwise"];

/// A captured, replayable sequence of raw statements
///
/// Statements are kept as text and re-tokenized on every replay. When the construct allows an
/// else clause, `else_location` is the index of the `else` marker statement splitting the two
/// branches.
#[derive(Debug)]
pub struct Block {
    statements: Vec<String>,
    else_location: Option<usize>,
    else_allowed: bool,
}

fn is_else(s: &str) -> bool {
    ELSE_KEYWORDS.contains(&s)
}

/// Whether this line opens a body that continues on the following lines
fn opens_body(group: &Group, keyword: &str) -> bool {
    group.position(keyword).is_some() && group.last_symbol() == Some(",")
}

impl Block {
    /// Pulls lines from `next_line` until the `end` closing this block
    ///
    /// Nesting depth goes up on `begin`, on `if`/`while` lines ending in a comma and on
    /// `if <cond>, <stmt> else` lines, and goes down on `end`. A top level `else` followed by a
    /// statement ends the capture right there.
    pub fn capture<F>(mut next_line: F, else_allowed: bool) -> Result<Block>
    where
        F: FnMut() -> Result<Option<String>>,
    {
        let mut statements = Vec::new();
        let mut else_location = None;
        let mut level = 0usize;

        loop {
            let statement = match next_line()? {
                Some(line) => line.trim().to_string(),
                None => fail!(Syntax, "Block not terminated", "'end' required"),
            };
            let group = tokenize(&statement)?;
            if group.is_empty() {
                statements.push(statement);
                continue;
            }

            match group.count("begin") {
                0 => (),
                1 => level += 1,
                _ => fail!(Syntax, "Having more than one begin on a line is forbidden"),
            }

            match group.count("end") {
                0 => (),
                1 if level == 0 => break,
                1 => level -= 1,
                _ => fail!(Syntax, "Having more than one end on a line is forbidden"),
            }

            if opens_body(&group, "if") {
                level += 1;
            }
            if opens_body(&group, "while") {
                level += 1;
            }

            let last = group.len() - 1;
            let elses = group
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| item.symbol().map_or(false, is_else))
                .map(|(i, _)| i)
                .collect::<Vec<_>>();
            for index in elses {
                if index == 0 {
                    if level > 0 {
                        // `else <stmt>` closes a nested if
                        if index < last {
                            level -= 1;
                        }
                        continue;
                    }

                    if else_location.is_some() || !else_allowed {
                        fail!(
                            Semantic,
                            "Unexpected keyword 'else'",
                            if else_allowed {
                                "else already used"
                            } else {
                                "else not allowed in this construct"
                            }
                        );
                    }

                    else_location = Some(statements.len());
                    if index < last {
                        let keyword = group.first_symbol().unwrap_or("else");
                        let remainder = statement[keyword.len()..].trim().to_string();
                        statements.push("else".to_string());
                        statements.push(remainder);
                        info!("captured block of {} statements", statements.len());

                        return Ok(Block {
                            statements,
                            else_location,
                            else_allowed,
                        });
                    }
                } else if index == last && group.items[..index].iter().any(|i| i.is_symbol("if")) {
                    // `if <cond>, <stmt> else` takes its else body from the following lines
                    level += 1;
                }
            }

            statements.push(statement);
        }

        info!("captured block of {} statements", statements.len());

        Ok(Block {
            statements,
            else_location,
            else_allowed,
        })
    }

    pub fn has_else(&self) -> bool {
        self.else_location.is_some()
    }

    /// Statement indices making up one branch of the block
    pub fn range(&self, before_else: bool) -> Result<Range<usize>> {
        let len = self.statements.len();

        match (self.else_allowed, self.else_location, before_else) {
            (false, _, _) => Ok(0..len),
            (true, loc, true) => Ok(0..loc.unwrap_or(len)),
            (true, Some(loc), false) => Ok(loc + 1..len),
            (true, None, false) => fail!(Control, "No else statement found"),
        }
    }

    pub fn statement(&self, index: usize) -> Option<&str> {
        self.statements.get(index).map(String::as_str)
    }
}

/// Position of one running replay of a block
///
/// Every replay owns its cursor, so a block may be replayed recursively (a function calling
/// itself) without the runs stepping on each other.
pub struct Cursor {
    block: Rc<Block>,
    next: usize,
    end: usize,
}

impl Cursor {
    pub fn new(block: Rc<Block>, range: Range<usize>) -> Self {
        Cursor {
            block,
            next: range.start,
            end: range.end,
        }
    }

    /// Next statement of this replay, or `None` once the branch is exhausted
    pub fn advance(&mut self) -> Option<String> {
        if self.next >= self.end {
            return None;
        }

        let statement = self.block.statement(self.next).map(String::from);
        self.next += 1;

        statement
    }
}

#[cfg(test)]
fn capture_lines(lines: &[&str], else_allowed: bool) -> Result<Block> {
    let mut lines = lines.iter().map(|s| s.to_string());
    Block::capture(|| Ok(lines.next()), else_allowed)
}

#[test]
fn test_capture() {
    let block = capture_lines(&["let x = 1", "print(x)", "end", "ignored"], false).unwrap();
    assert_eq!(block.statements, vec!["let x = 1", "print(x)"]);
    assert!(!block.has_else());
    assert_eq!(block.range(true).unwrap(), 0..2);
}

#[test]
fn test_capture_nesting() {
    let lines = [
        "while n < 3,",
        "  if n = 1,",
        "    print(n)",
        "  end",
        "  let n = n + 1",
        "end",
        "let b = begin",
        "  print(1)",
        "end",
        "end",
    ];
    let block = capture_lines(&lines, false).unwrap();
    assert_eq!(block.statements.len(), 9);
    assert_eq!(block.statement(8), Some("end"));
}

#[test]
fn test_capture_else() {
    let block = capture_lines(&["print(1)", "else", "print(2)", "end"], true).unwrap();
    assert_eq!(block.else_location, Some(1));
    assert_eq!(block.range(true).unwrap(), 0..1);
    assert_eq!(block.range(false).unwrap(), 2..3);

    // A statement after the else ends the capture
    let block = capture_lines(&["print(1)", "otherwise print(2)", "never read"], true).unwrap();
    assert_eq!(block.statements, vec!["print(1)", "else", "print(2)"]);
    assert_eq!(block.range(false).unwrap(), 2..3);

    // Nested if/else does not split the outer block
    let lines = ["if x,", "print(1)", "else", "print(2)", "end", "end"];
    let block = capture_lines(&lines, true).unwrap();
    assert!(!block.has_else());
    assert_eq!(block.statements.len(), 5);

    let lines = ["if x, print(1) else", "print(2)", "end", "end"];
    let block = capture_lines(&lines, false).unwrap();
    assert_eq!(block.statements.len(), 3);
}

#[test]
fn test_cursor() {
    let block = Rc::new(capture_lines(&["a", "else", "b", "c", "end"], true).unwrap());

    let mut cursor = Cursor::new(block.clone(), block.range(false).unwrap());
    assert_eq!(cursor.advance(), Some("b".to_string()));
    assert_eq!(cursor.advance(), Some("c".to_string()));
    assert_eq!(cursor.advance(), None);

    let mut cursor = Cursor::new(block.clone(), block.range(true).unwrap());
    assert_eq!(cursor.advance(), Some("a".to_string()));
    assert_eq!(cursor.advance(), None);
}

#[test]
fn test_capture_errors() {
    let tests = vec![
        (vec!["print(1)", "else", "print(2)", "else", "end"], true, "else already used"),
        (vec!["print(1)", "else", "end"], false, "else not allowed in this construct"),
        (vec!["print(1)"], false, "'end' required"),
        (vec!["print((1)"], false, "1 required"),
    ];

    for (lines, else_allowed, hint) in tests {
        let err = capture_lines(&lines, else_allowed).unwrap_err();
        assert_eq!(err.hint, hint);
    }

    assert!(capture_lines(&["print(1)"], true)
        .unwrap_err()
        .message
        .contains("not terminated"));
}
