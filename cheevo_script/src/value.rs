//! Runtime values of the interpreter.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDefinition;
use crate::clause::Clause;

/// A function value: the definition plus the locals it closed over.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub definition: Rc<FunctionDefinition>,
    pub captured: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Dictionary(Rc<RefCell<Vec<(Value, Value)>>>),
    Function(Rc<Closure>),
    Clause(Rc<Clause>),
    /// Inclusive integer range, iterated lazily.
    Range {
        start: i64,
        end: i64,
        step: i64,
    },
    #[default]
    Void,
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn dictionary(entries: Vec<(Value, Value)>) -> Self {
        Value::Dictionary(Rc::new(RefCell::new(entries)))
    }

    pub fn clause(clause: Clause) -> Self {
        Value::Clause(Rc::new(clause))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Dictionary(_) => "dictionary",
            Value::Function(_) => "function",
            Value::Clause(clause) if clause.is_value() => "memory expression",
            Value::Clause(_) => "condition",
            Value::Range { .. } => "range",
            Value::Void => "nothing",
        }
    }

    /// Converts a value used inside a trigger expression into a clause.
    pub fn to_clause(&self) -> Option<Clause> {
        match self {
            Value::Integer(n) => Some(Clause::Constant(*n)),
            Value::Float(f) => Some(Clause::Float(*f)),
            Value::Bool(true) => Some(Clause::AlwaysTrue),
            Value::Bool(false) => Some(Clause::AlwaysFalse),
            Value::Clause(clause) => Some(clause.as_ref().clone()),
            _ => None,
        }
    }

    /// Equality used for dictionary keys and `==` between constants.
    pub fn key_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            #[allow(clippy::cast_precision_loss)]
            (Value::Float(a), Value::Integer(b)) | (Value::Integer(b), Value::Float(a)) => *a == *b as f64,
            (Value::Float(a), Value::Float(b)) => a == b,
            _ => false,
        }
    }

    /// Materialises the items a `for` loop or collection builtin walks over.
    /// Dictionaries yield their keys.
    pub fn iter_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items.borrow().clone()),
            Value::Dictionary(entries) => Some(entries.borrow().iter().map(|(k, _)| k.clone()).collect()),
            Value::Range { start, end, step } => Some(RangeIter::new(*start, *end, *step).map(Value::Integer).collect()),
            _ => None,
        }
    }
}

/// Steps through an inclusive range in either direction.
pub struct RangeIter {
    next: i64,
    end: i64,
    step: i64,
    done: bool,
}

impl RangeIter {
    pub fn new(start: i64, end: i64, step: i64) -> Self {
        let done = step == 0 || (step > 0 && start > end) || (step < 0 && start < end);
        Self {
            next: start,
            end,
            step,
            done,
        }
    }
}

impl Iterator for RangeIter {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.done {
            return None;
        }
        let current = self.next;
        match current.checked_add(self.step) {
            Some(next) if (self.step > 0 && next <= self.end) || (self.step < 0 && next >= self.end) => {
                self.next = next;
            },
            _ => self.done = true,
        }
        Some(current)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            },
            Value::Dictionary(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            },
            Value::Function(closure) => write!(f, "function {}", closure.definition.display_name()),
            Value::Clause(clause) => f.write_str(clause.describe()),
            Value::Range { start, end, step } => write!(f, "range({start}, {end}, {step})"),
            Value::Void => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_inclusive_in_both_directions() {
        assert_eq!(RangeIter::new(1, 4, 1).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(RangeIter::new(10, 1, -4).collect::<Vec<_>>(), vec![10, 6, 2]);
        assert_eq!(RangeIter::new(3, 1, 1).count(), 0);
        assert_eq!(RangeIter::new(1, 1, 0).count(), 0);
    }

    #[test]
    fn arrays_share_storage_between_copies() {
        let a = Value::array(vec![Value::Integer(1)]);
        let b = a.clone();
        if let Value::Array(items) = &b {
            items.borrow_mut().push(Value::Integer(2));
        }
        assert_eq!(a.to_string(), "[1, 2]");
    }

    #[test]
    fn keys_compare_by_content() {
        assert!(Value::String("a".into()).key_eq(&Value::String("a".into())));
        assert!(!Value::Integer(1).key_eq(&Value::String("1".into())));
        assert!(Value::Integer(2).key_eq(&Value::Float(2.0)));
    }
}
