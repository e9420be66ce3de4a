use std::collections::BTreeMap;

use crate::lang::value::VariableRef;

/// One flat name to variable mapping per active call frame
///
/// Lookups only ever see the top frame: a function body cannot see its caller's locals. The
/// outermost (global) frame is never popped.
pub struct Variables {
    inner: Vec<BTreeMap<String, VariableRef>>,
}

impl Variables {
    pub fn new() -> Self {
        Variables {
            inner: vec![BTreeMap::default()],
        }
    }

    /// Number of frames, the global frame being level 1
    pub fn level(&self) -> usize {
        self.inner.len()
    }

    pub fn push_scope(&mut self) {
        self.inner.push(BTreeMap::default());
    }

    /// Pops the top frame. Does nothing when only the global frame is left.
    pub fn pop_scope(&mut self) {
        if self.inner.len() > 1 {
            self.inner.pop();
        }
    }

    pub fn get(&self, ident: &str) -> Option<&VariableRef> {
        self.inner.last().and_then(|scope| scope.get(ident))
    }

    pub fn insert(&mut self, var: VariableRef) {
        let ident = var.borrow().identifier.clone();
        if let Some(scope) = self.inner.last_mut() {
            scope.insert(ident, var);
        }
    }
}

#[test]
fn test_frames_do_not_fall_through() {
    use crate::lang::value::{Value, Variable};

    let mut vars = Variables::new();
    vars.insert(Variable::new("x", Value::Integer(1)));
    assert!(vars.get("x").is_some());
    assert_eq!(vars.level(), 1);

    vars.push_scope();
    assert_eq!(vars.level(), 2);
    assert!(vars.get("x").is_none());
    vars.insert(Variable::new("y", Value::Integer(2)));
    assert!(vars.get("y").is_some());

    vars.pop_scope();
    assert!(vars.get("y").is_none());
    assert!(vars.get("x").is_some());

    // The global frame survives any number of pops
    vars.pop_scope();
    vars.pop_scope();
    assert_eq!(vars.level(), 1);
    assert!(vars.get("x").is_some());
}
