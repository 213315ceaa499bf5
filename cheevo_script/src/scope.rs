//! Lexical scope chain used by the interpreter.
//!
//! Each scope borrows its parent, so a child never outlives the evaluation
//! that created it. Lookups walk outward; a function call is a visibility
//! boundary that jumps straight to the script (interpreter) scope. Closures
//! see their defining scope through the locals copied into the call.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::FunctionDefinition;
use crate::output::ScriptOutput;
use crate::value::Value;

/// Deepest nesting of function calls before evaluation gives up.
pub const MAX_CALL_DEPTH: usize = 250;

/// State owned by one script run.
#[derive(Debug, Default)]
pub struct InterpreterContext {
    pub output: Rc<RefCell<ScriptOutput>>,
}

/// What a scope was created for.
#[derive(Debug, Default)]
pub enum ScopeContext {
    #[default]
    None,
    Interpreter(InterpreterContext),
    FunctionCall(String),
    /// A trigger or value compilation in progress.
    TriggerBuilder,
}

impl ScopeContext {
    fn is_interpreter(&self) -> bool {
        matches!(self, ScopeContext::Interpreter(_))
    }
}

/// Most scopes hold zero or one variable, so the map is only built on demand.
#[derive(Debug, Default)]
enum Variables {
    #[default]
    Empty,
    Single(String, Value),
    Map(HashMap<String, Value>),
}

impl Variables {
    fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Variables::Empty => None,
            Variables::Single(key, value) => (key == name).then_some(value),
            Variables::Map(map) => map.get(name),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn set(&mut self, name: &str, value: Value) {
        match self {
            Variables::Empty => *self = Variables::Single(name.to_string(), value),
            Variables::Single(key, existing) if key == name => *existing = value,
            Variables::Single(..) => {
                let Variables::Single(key, existing) = std::mem::take(self) else {
                    return;
                };
                let mut map = HashMap::with_capacity(2);
                map.insert(key, existing);
                map.insert(name.to_string(), value);
                *self = Variables::Map(map);
            },
            Variables::Map(map) => {
                map.insert(name.to_string(), value);
            },
        }
    }

    fn for_each(&self, mut f: impl FnMut(&str, &Value)) {
        match self {
            Variables::Empty => {},
            Variables::Single(key, value) => f(key, value),
            Variables::Map(map) => {
                for (key, value) in map {
                    f(key, value);
                }
            },
        }
    }
}

#[derive(Debug)]
pub struct Scope<'p> {
    parent: Option<&'p Scope<'p>>,
    variables: RefCell<Variables>,
    functions: RefCell<HashMap<String, Rc<FunctionDefinition>>>,
    context: ScopeContext,
    depth: usize,
    complete: Cell<bool>,
    return_value: RefCell<Option<Value>>,
}

struct Ancestors<'a> {
    next: Option<&'a Scope<'a>>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Scope<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent;
        Some(current)
    }
}

impl Scope<'static> {
    /// A scope with no parent.
    pub fn root(context: ScopeContext) -> Self {
        Scope::new(None, context, 0)
    }
}

impl<'p> Scope<'p> {
    fn new(parent: Option<&'p Scope<'p>>, context: ScopeContext, depth: usize) -> Self {
        Self {
            parent,
            variables: RefCell::new(Variables::Empty),
            functions: RefCell::new(HashMap::new()),
            context,
            depth,
            complete: Cell::new(false),
            return_value: RefCell::new(None),
        }
    }

    /// A block scope (loop iteration, `if` branch).
    pub fn child(&'p self) -> Scope<'p> {
        Scope::new(Some(self), ScopeContext::None, self.depth)
    }

    pub fn with_context(&'p self, context: ScopeContext) -> Scope<'p> {
        Scope::new(Some(self), context, self.depth)
    }

    /// A scope for the body of a function call, or `None` when the call
    /// would exceed [`MAX_CALL_DEPTH`].
    pub fn function_call(&'p self, name: &str) -> Option<Scope<'p>> {
        if self.depth >= MAX_CALL_DEPTH {
            return None;
        }
        let context = ScopeContext::FunctionCall(name.to_string());
        Some(Scope::new(Some(self), context, self.depth + 1))
    }

    pub fn context(&self) -> &ScopeContext {
        &self.context
    }

    fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// The scope lookups continue in after this one.
    fn next_visible(&self) -> Option<&Scope<'_>> {
        match &self.context {
            ScopeContext::FunctionCall(_) => {
                self.parent.and_then(|parent| parent.ancestors().find(|s| s.context.is_interpreter()))
            },
            _ => self.parent,
        }
    }

    fn visible<'s>(&'s self) -> impl Iterator<Item = &'s Scope<'s>> {
        let start: &'s Scope<'s> = self;
        std::iter::successors(Some(start), |scope| scope.next_visible())
    }

    fn find_context<'s, T: ?Sized>(
        &'s self,
        select: impl Fn(&'s ScopeContext) -> Option<&'s T>,
        stop: impl Fn(&Scope<'_>) -> bool,
        outermost: bool,
    ) -> Option<&'s T> {
        let mut found = None;
        for scope in self.ancestors() {
            if let Some(context) = select(&scope.context) {
                found = Some(context);
                if !outermost {
                    break;
                }
            }
            if stop(scope) {
                break;
            }
        }
        found
    }

    /// Nearest context accepted by `select`.
    pub fn get_context<'s, T: ?Sized>(&'s self, select: impl Fn(&'s ScopeContext) -> Option<&'s T>) -> Option<&'s T> {
        self.find_context(select, |_| false, false)
    }

    /// Like [`Scope::get_context`] but never looks past the interpreter scope
    /// of the current run.
    pub fn get_interpreter_context<'s, T: ?Sized>(
        &'s self,
        select: impl Fn(&'s ScopeContext) -> Option<&'s T>,
    ) -> Option<&'s T> {
        self.find_context(select, |scope| scope.context.is_interpreter(), false)
    }

    /// Most distant context accepted by `select`.
    pub fn get_outermost_context<'s, T: ?Sized>(
        &'s self,
        select: impl Fn(&'s ScopeContext) -> Option<&'s T>,
    ) -> Option<&'s T> {
        self.find_context(select, |_| false, true)
    }

    /// The interpreter state of the current run.
    pub fn interpreter(&self) -> Option<&InterpreterContext> {
        self.get_interpreter_context(|context| match context {
            ScopeContext::Interpreter(interpreter) => Some(interpreter),
            _ => None,
        })
    }

    pub fn resolve_variable(&self, name: &str) -> Option<Value> {
        self.visible().find_map(|scope| scope.variables.borrow().get(name).cloned())
    }

    /// Functions stay visible across call boundaries so nested and
    /// mutually recursive definitions resolve.
    pub fn resolve_function(&self, name: &str) -> Option<Rc<FunctionDefinition>> {
        self.ancestors().find_map(|scope| scope.functions.borrow().get(name).cloned())
    }

    /// Defines `name` in this scope, shadowing any outer definition.
    pub fn define(&self, name: &str, value: Value) {
        self.variables.borrow_mut().set(name, value);
    }

    /// Updates the nearest visible definition of `name`, or defines it here.
    pub fn assign(&self, name: &str, value: Value) {
        match self.visible().find(|scope| scope.variables.borrow().contains(name)) {
            Some(scope) => scope.variables.borrow_mut().set(name, value),
            None => self.define(name, value),
        }
    }

    pub fn define_function(&self, definition: Rc<FunctionDefinition>) {
        if let Some(name) = &definition.name {
            self.functions.borrow_mut().insert(name.clone(), Rc::clone(&definition));
        }
    }

    /// Locals visible from here, innermost first, for closures to capture.
    /// Script-level variables are not copied since they stay reachable.
    pub fn capture_locals(&self) -> Vec<(String, Value)> {
        let mut captured: Vec<(String, Value)> = Vec::new();
        for scope in self.visible() {
            if scope.context.is_interpreter() {
                break;
            }
            scope.variables.borrow().for_each(|name, value| {
                if !captured.iter().any(|(existing, _)| existing == name) {
                    captured.push((name.to_string(), value.clone()));
                }
            });
        }
        captured
    }

    pub fn is_complete(&self) -> bool {
        self.complete.get()
    }

    /// Records a `return`: every scope up to the enclosing function call is
    /// marked complete and the call scope keeps the value. Returns false
    /// when there is no enclosing function.
    pub fn set_return(&self, value: Value) -> bool {
        let mut marked = Vec::new();
        for scope in self.ancestors() {
            if scope.context.is_interpreter() {
                return false;
            }
            marked.push(scope);
            if matches!(scope.context, ScopeContext::FunctionCall(_)) {
                for scope in marked {
                    scope.complete.set(true);
                }
                *scope.return_value.borrow_mut() = Some(value);
                return true;
            }
        }
        false
    }

    pub fn take_return(&self) -> Option<Value> {
        self.return_value.borrow_mut().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Location;

    fn interpreter_root() -> Scope<'static> {
        Scope::root(ScopeContext::Interpreter(InterpreterContext::default()))
    }

    #[test]
    fn single_slot_upgrades_to_map() {
        let root = interpreter_root();
        root.define("a", Value::Integer(1));
        root.define("a", Value::Integer(2));
        root.define("b", Value::Integer(3));
        assert_eq!(root.resolve_variable("a"), Some(Value::Integer(2)));
        assert_eq!(root.resolve_variable("b"), Some(Value::Integer(3)));
        assert_eq!(root.resolve_variable("c"), None);
    }

    #[test]
    fn calls_skip_caller_locals() {
        let root = interpreter_root();
        root.define("global", Value::Integer(1));
        let block = root.child();
        block.define("local", Value::Integer(2));

        for name in ["f", "<anonymous>"] {
            let call = block.function_call(name).expect("depth");
            assert_eq!(call.resolve_variable("global"), Some(Value::Integer(1)));
            assert_eq!(call.resolve_variable("local"), None);
        }
    }

    #[test]
    fn assignment_updates_outer_definition() {
        let root = interpreter_root();
        root.define("total", Value::Integer(0));
        {
            let block = root.child();
            block.assign("total", Value::Integer(5));
            block.assign("fresh", Value::Integer(1));
            assert_eq!(block.resolve_variable("fresh"), Some(Value::Integer(1)));
        }
        assert_eq!(root.resolve_variable("total"), Some(Value::Integer(5)));
        assert_eq!(root.resolve_variable("fresh"), None);
    }

    #[test]
    fn context_lookups_respect_their_stop_rules() {
        let outer = Scope::root(ScopeContext::TriggerBuilder);
        let run = outer.with_context(ScopeContext::Interpreter(InterpreterContext::default()));
        let inner = run.with_context(ScopeContext::TriggerBuilder);
        let leaf = inner.child();

        fn select(context: &ScopeContext) -> Option<&ScopeContext> {
            match context {
                ScopeContext::TriggerBuilder => Some(context),
                _ => None,
            }
        }
        let nearest = leaf.get_context(select).expect("nearest");
        let outermost = leaf.get_outermost_context(select).expect("outermost");
        assert!(std::ptr::eq(nearest, inner.context()));
        assert!(std::ptr::eq(outermost, outer.context()));
        assert!(run.get_interpreter_context(select).is_none());
        assert!(leaf.interpreter().is_some());
    }

    #[test]
    fn return_marks_scopes_up_to_the_call() {
        let root = interpreter_root();
        let call = root.function_call("f").expect("depth");
        let block = call.child();
        assert!(block.set_return(Value::Integer(7)));
        assert!(block.is_complete());
        assert!(call.is_complete());
        assert!(!root.is_complete());
        assert_eq!(call.take_return(), Some(Value::Integer(7)));
        assert!(!root.child().set_return(Value::Void));
    }

    #[test]
    fn call_depth_is_capped() {
        let definition = Rc::new(FunctionDefinition {
            name: Some("f".into()),
            params: Vec::new(),
            body: Vec::new(),
            location: Location::new(1, 1),
        });
        let root = interpreter_root();
        root.define_function(Rc::clone(&definition));
        fn descend(scope: &Scope<'_>, remaining: usize) -> bool {
            if remaining == 0 {
                return true;
            }
            match scope.function_call("f") {
                Some(call) => {
                    assert!(call.resolve_function("f").is_some());
                    descend(&call, remaining - 1)
                },
                None => false,
            }
        }
        assert!(descend(&root, MAX_CALL_DEPTH));
        assert!(!descend(&root, MAX_CALL_DEPTH + 1));
    }
}
