//! Expression evaluation.
//!
//! The interpreter reduces AST expressions to values. Names resolve through
//! the scope first, then builtins and helpers, then the keys of the document
//! root bound to `_`.
//!
//! Names and subscript chains are evaluated as places: a root name plus a
//! list of keys. Reading a place borrows through the document instead of
//! copying it, and mutating methods called on a place change it in place.

use std::borrow::Cow;
use std::rc::Rc;

use tracing::trace;

use super::builtins::{self, Args};
use super::error::{EvalError, EvalResult};
use super::methods;
use super::ops;
use super::scope::Scope;
use crate::ast::{Arg, CompClause, Expr, FunctionBody, FunctionDef, Literal, LogicalOp, Target};
use crate::keys::{KeyIndex, KeyMatch};
use crate::parser;
use crate::value::{Callable, Map, Value};

/// Nested user function calls allowed before a RecursionError.
const MAX_CALL_DEPTH: usize = 64;

/// A root binding plus the subscript keys leading to a value.
#[derive(Debug, Clone)]
pub(crate) struct Place {
    root: String,
    keys: Vec<Value>,
}

/// Evaluates expressions and statements against one document.
#[derive(Debug)]
pub struct Interpreter {
    pub(crate) scope: Scope,
    keys: Rc<KeyIndex>,
    /// Text written by `print` and helpers during the current turn.
    output: String,
    /// Whether bare names may resolve to keys of the document root.
    resolve_document: bool,
    depth: usize,
}

impl Interpreter {
    /// Create an interpreter with `document` bound to `_`.
    pub fn new(document: Value, keys: Rc<KeyIndex>) -> Self {
        let mut scope = Scope::new();
        scope.set_global("_", document);
        Self {
            scope,
            keys,
            output: String::new(),
            resolve_document: true,
            depth: 0,
        }
    }

    /// The current document root.
    pub fn document(&self) -> &Value {
        const NONE: &Value = &Value::None;
        self.scope.get("_").unwrap_or(NONE)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn keys(&self) -> &KeyIndex {
        &self.keys
    }

    /// Take everything printed since the last call.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub(crate) fn output_len(&self) -> usize {
        self.output.len()
    }

    /// Drop output written after `len`, e.g. by an abandoned attempt.
    pub(crate) fn truncate_output(&mut self, len: usize) {
        self.output.truncate(len);
    }

    pub(crate) fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Parse and evaluate a single expression.
    pub fn eval_str(&mut self, source: &str) -> EvalResult<Value> {
        let expr = parser::parse_expression(source).map_err(|e| EvalError::from_parse_errors(&e))?;
        self.eval_expr(&expr)
    }

    /// Test whether `code` is a reference that already resolves without
    /// falling back to document keys.
    ///
    /// Only names, attribute chains and subscripts with literal indexes are
    /// considered. Bound methods do not count: `_.items` should reach a key
    /// called `items` rather than the map method.
    pub fn probe(&mut self, code: &str) -> bool {
        let Ok(expr) = parser::parse_expression(code) else {
            return false;
        };
        if !expr.is_reference() {
            return false;
        }
        let saved = std::mem::replace(&mut self.resolve_document, false);
        let mark = self.output_len();
        let resolved = self
            .peek(&expr)
            .map(|value| !ops::is_bound_method(&value))
            .unwrap_or(false);
        self.resolve_document = saved;
        self.truncate_output(mark);
        trace!(code, resolved, "probe");
        resolved
    }

    /// Evaluate an expression to a value.
    pub fn eval_expr(&mut self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Literal(lit) => Ok(literal_value(lit)),
            Expr::Name(_) | Expr::Subscript { .. } | Expr::Attribute { .. } => {
                Ok(self.peek(expr)?.into_owned())
            }
            Expr::List(items) | Expr::Tuple(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval_expr(item))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::List(values))
            }
            Expr::Dict(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = ops::map_key(&self.eval_expr(key)?)?;
                    let value = self.eval_expr(value)?;
                    map.insert(key, value);
                }
                Ok(Value::Map(map))
            }
            Expr::ListComp { element, clauses } => {
                let mut out = Vec::new();
                self.in_frame(|this| {
                    this.comprehension(clauses, &mut |this| {
                        out.push(this.eval_expr(element)?);
                        Ok(())
                    })
                })?;
                Ok(Value::List(out))
            }
            Expr::DictComp { key, value, clauses } => {
                let mut map = Map::new();
                self.in_frame(|this| {
                    this.comprehension(clauses, &mut |this| {
                        let k = ops::map_key(&this.eval_expr(key)?)?;
                        let v = this.eval_expr(value)?;
                        map.insert(k, v);
                        Ok(())
                    })
                })?;
                Ok(Value::Map(map))
            }
            Expr::Slice { object, start, stop, step } => {
                let object = self.peek(object)?.into_owned();
                let start = self.eval_optional(start.as_deref())?;
                let stop = self.eval_optional(stop.as_deref())?;
                let step = self.eval_optional(step.as_deref())?;
                ops::slice(&object, start.as_ref(), stop.as_ref(), step.as_ref())
            }
            Expr::Call { func, args } => self.eval_call(func, args),
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                ops::unary(*op, &value)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                ops::binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval_expr(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                };
                if short_circuit { Ok(left) } else { self.eval_expr(right) }
            }
            Expr::Not(operand) => Ok(Value::Bool(!self.eval_expr(operand)?.is_truthy())),
            Expr::Compare { left, rest } => {
                let mut current = self.eval_expr(left)?;
                for (op, right) in rest {
                    let right = self.eval_expr(right)?;
                    if !ops::compare(*op, &current, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    current = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Ternary { condition, then, otherwise } => {
                if self.eval_expr(condition)?.is_truthy() {
                    self.eval_expr(then)
                } else {
                    self.eval_expr(otherwise)
                }
            }
            Expr::Lambda(def) => Ok(Value::Func(Rc::new(Callable::User(Rc::clone(def))))),
        }
    }

    fn eval_optional(&mut self, expr: Option<&Expr>) -> EvalResult<Option<Value>> {
        expr.map(|e| self.eval_expr(e)).transpose()
    }

    /// Run `f` inside a fresh scope frame.
    fn in_frame<T>(&mut self, f: impl FnOnce(&mut Self) -> EvalResult<T>) -> EvalResult<T> {
        self.scope.push_frame();
        let result = f(self);
        self.scope.pop_frame();
        result
    }

    fn comprehension(
        &mut self,
        clauses: &[CompClause],
        emit: &mut dyn FnMut(&mut Self) -> EvalResult<()>,
    ) -> EvalResult<()> {
        let Some((first, rest)) = clauses.split_first() else {
            return emit(self);
        };
        match first {
            CompClause::For { target, iter } => {
                let items = ops::iterate(self.eval_expr(iter)?)?;
                for item in items {
                    self.assign(target, item)?;
                    self.comprehension(rest, emit)?;
                }
                Ok(())
            }
            CompClause::If(condition) => {
                if self.eval_expr(condition)?.is_truthy() {
                    self.comprehension(rest, emit)
                } else {
                    Ok(())
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Places and name resolution
    // ═══════════════════════════════════════════════════════════════════

    /// Evaluate a reference, borrowing from the scope where possible.
    pub(crate) fn peek(&mut self, expr: &Expr) -> EvalResult<Cow<'_, Value>> {
        match expr {
            Expr::Name(_) | Expr::Subscript { .. } => {
                if let Some(place) = self.place(expr)? {
                    return self.lookup(&place);
                }
                let Expr::Subscript { object, index } = expr else {
                    return Err(EvalError::Syntax("invalid reference".into()));
                };
                let object = self.eval_expr(object)?;
                let index = self.eval_expr(index)?;
                ops::subscript(&object, &index).map(Cow::Owned)
            }
            Expr::Attribute { object, name } => {
                let object = self.peek(object)?;
                attribute(&object, name).map(Cow::Owned)
            }
            other => self.eval_expr(other).map(Cow::Owned),
        }
    }

    /// Resolve a name or subscript chain into a place. Returns `None` when
    /// the chain is rooted in something other than a name.
    pub(crate) fn place(&mut self, expr: &Expr) -> EvalResult<Option<Place>> {
        match expr {
            Expr::Name(name) => Ok(Some(self.place_root(name))),
            Expr::Subscript { object, index } => {
                let Some(mut place) = self.place(object)? else {
                    return Ok(None);
                };
                let index = self.eval_expr(index)?;
                place.keys.push(index);
                Ok(Some(place))
            }
            _ => Ok(None),
        }
    }

    /// A bare document key becomes a place under `_`, so that mutations
    /// reach the document.
    fn place_root(&self, name: &str) -> Place {
        if !self.scope.contains(name)
            && builtins::lookup(name).is_none()
            && let Some(key) = self.root_key(name)
        {
            return Place {
                root: "_".to_string(),
                keys: vec![Value::Str(key)],
            };
        }
        Place {
            root: name.to_string(),
            keys: Vec::new(),
        }
    }

    /// The document root key a bare name refers to: an exact key, or the
    /// single spelling of a case-insensitive match.
    fn root_key(&self, name: &str) -> Option<String> {
        if !self.resolve_document {
            return None;
        }
        let Some(Value::Map(root)) = self.scope.get("_") else {
            return None;
        };
        if root.contains_key(name) {
            return Some(name.to_string());
        }
        match self.keys.resolve(name) {
            KeyMatch::Unique(spelling) if root.contains_key(spelling) => {
                Some(spelling.to_string())
            }
            _ => None,
        }
    }

    fn resolve_name(&self, name: &str) -> EvalResult<Cow<'_, Value>> {
        if let Some(value) = self.scope.get(name) {
            return Ok(Cow::Borrowed(value));
        }
        if let Some(builtin) = builtins::lookup(name) {
            return Ok(Cow::Owned(Value::builtin(builtin)));
        }
        if let Some(key) = self.root_key(name)
            && let Some(Value::Map(root)) = self.scope.get("_")
            && let Some(value) = root.get(key.as_str())
        {
            return Ok(Cow::Borrowed(value));
        }
        Err(EvalError::Name(name.to_string()))
    }

    fn lookup(&self, place: &Place) -> EvalResult<Cow<'_, Value>> {
        let mut current = self.resolve_name(&place.root)?;
        for key in &place.keys {
            current = match current {
                Cow::Borrowed(value) => match ops::child(value, key)? {
                    Some(found) => Cow::Borrowed(found),
                    None => Cow::Owned(ops::subscript(value, key)?),
                },
                Cow::Owned(value) => Cow::Owned(ops::subscript(&value, key)?),
            };
        }
        Ok(current)
    }

    pub(crate) fn place_mut(&mut self, place: &Place) -> EvalResult<&mut Value> {
        let mut current = self
            .scope
            .get_mut(&place.root)
            .ok_or_else(|| EvalError::Name(place.root.clone()))?;
        for key in &place.keys {
            current = ops::child_mut(current, key)?;
        }
        Ok(current)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Assignment targets
    // ═══════════════════════════════════════════════════════════════════

    /// Bind a value to a target in the current frame.
    pub(crate) fn assign(&mut self, target: &Target, value: Value) -> EvalResult<()> {
        match target {
            Target::Name(name) => {
                self.scope.set(name.clone(), value);
                Ok(())
            }
            Target::Subscript { object, index } => {
                let place = self.container_place(object)?;
                let index = self.eval_expr(index)?;
                let container = self.place_mut(&place)?;
                ops::set_item(container, index, value)
            }
            Target::Tuple(targets) => {
                let items = ops::iterate(value)?;
                if items.len() != targets.len() {
                    return Err(EvalError::value_error(if items.len() < targets.len() {
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            targets.len(),
                            items.len()
                        )
                    } else {
                        format!("too many values to unpack (expected {})", targets.len())
                    }));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item)?;
                }
                Ok(())
            }
        }
    }

    /// The place holding the container of a subscript target.
    pub(crate) fn container_place(&mut self, object: &Expr) -> EvalResult<Place> {
        self.place(object)?
            .ok_or_else(|| EvalError::Syntax("cannot assign to expression".into()))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════

    fn eval_args(&mut self, args: &[Arg]) -> EvalResult<(Vec<Value>, Vec<(String, Value)>)> {
        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        for arg in args {
            match arg {
                Arg::Positional(expr) => positional.push(self.eval_expr(expr)?),
                Arg::Keyword(name, expr) => keywords.push((name.clone(), self.eval_expr(expr)?)),
            }
        }
        Ok((positional, keywords))
    }

    fn eval_call(&mut self, func: &Expr, args: &[Arg]) -> EvalResult<Value> {
        if let Expr::Attribute { object, name } = func {
            return self.call_method(object, name, args);
        }
        let callee = self.eval_expr(func)?;
        let (positional, keywords) = self.eval_args(args)?;
        self.call_value(&callee, positional, keywords)
    }

    /// `object.name(args)`, mutating `object` in place when it is a place.
    fn call_method(&mut self, object: &Expr, name: &str, args: &[Arg]) -> EvalResult<Value> {
        let place = self.place(object)?;
        let (positional, keywords) = self.eval_args(args)?;
        let args = Args::new(name, positional, keywords);

        let Some(place) = place else {
            let mut receiver = self.eval_expr(object)?;
            return self.dispatch_method(&mut receiver, name, args);
        };

        let (module, mutating) = {
            let receiver = self.lookup(&place)?;
            match receiver.as_ref() {
                Value::Module(module) => (Some(*module), false),
                other => (None, methods::is_mutating(other, name)),
            }
        };
        if let Some(module) = module {
            let qualified = builtins::module_function(module, name)?;
            return builtins::call(self, qualified, args);
        }
        if !mutating {
            let receiver = self.lookup(&place)?;
            if !methods::has_method(&receiver, name) {
                return Err(no_attribute(&receiver, name));
            }
            return methods::call(&receiver, name, args);
        }

        let mut receiver = std::mem::take(self.place_mut(&place)?);
        let result = methods::call_mut(self, &mut receiver, name, args);
        *self.place_mut(&place)? = receiver;
        result
    }

    fn dispatch_method(&mut self, receiver: &mut Value, name: &str, args: Args) -> EvalResult<Value> {
        match receiver {
            Value::Module(module) => {
                let qualified = builtins::module_function(*module, name)?;
                builtins::call(self, qualified, args)
            }
            other if methods::is_mutating(other, name) => methods::call_mut(self, other, name, args),
            other if methods::has_method(other, name) => methods::call(other, name, args),
            other => Err(no_attribute(other, name)),
        }
    }

    /// Call any callable value.
    pub fn call_value(
        &mut self,
        callee: &Value,
        positional: Vec<Value>,
        keywords: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        let Value::Func(callable) = callee else {
            return Err(EvalError::type_error(format!(
                "'{}' object is not callable",
                callee.type_name()
            )));
        };
        match callable.as_ref() {
            Callable::Builtin(name) => builtins::call(self, name, Args::new(name, positional, keywords)),
            Callable::Method { receiver, name } => {
                let mut receiver = receiver.clone();
                let args = Args::new(name, positional, keywords);
                self.dispatch_method(&mut receiver, name, args)
            }
            Callable::User(def) => self.call_user(def, positional, keywords),
        }
    }

    fn call_user(
        &mut self,
        def: &Rc<FunctionDef>,
        positional: Vec<Value>,
        keywords: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::Recursion);
        }
        let bound = self.bind_arguments(def, positional, keywords)?;
        self.enter_user(def, bound, None).0
    }

    /// Call a user function with the document root moved in as its first
    /// argument. The parameter's final binding becomes the document again,
    /// whether the call succeeds or fails, so mutations made through it
    /// persist.
    pub fn call_on_document(&mut self, callee: &Value) -> EvalResult<Value> {
        let def = match callee {
            Value::Func(callable) => match callable.as_ref() {
                Callable::User(def) => Rc::clone(def),
                _ => return self.call_value(callee, vec![self.document().clone()], Vec::new()),
            },
            other => {
                return Err(EvalError::type_error(format!(
                    "'{}' object is not callable",
                    other.type_name()
                )));
            }
        };
        let Some(param) = def.params.first().map(|p| p.name.clone()) else {
            return Err(EvalError::type_error(format!(
                "{}() takes 0 positional arguments but 1 was given",
                def.name
            )));
        };

        let mut bound = self.bind_arguments(&def, vec![Value::None], Vec::new())?;
        if let Some((_, slot)) = bound.first_mut() {
            *slot = self.scope.remove_global("_").unwrap_or(Value::None);
        }
        let (result, kept) = self.enter_user(&def, bound, Some(&param));
        self.scope.set_global("_", kept.unwrap_or(Value::None));
        result
    }

    /// Match call arguments to parameters, evaluating defaults.
    fn bind_arguments(
        &mut self,
        def: &FunctionDef,
        positional: Vec<Value>,
        mut keywords: Vec<(String, Value)>,
    ) -> EvalResult<Vec<(String, Value)>> {
        if positional.len() > def.params.len() {
            return Err(EvalError::type_error(format!(
                "{}() takes {} positional arguments but {} were given",
                def.name,
                def.params.len(),
                positional.len()
            )));
        }

        let mut positional = positional.into_iter();
        let mut bound = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let value = if let Some(value) = positional.next() {
                value
            } else if let Some(i) = keywords.iter().position(|(k, _)| *k == param.name) {
                keywords.swap_remove(i).1
            } else if let Some(default) = &param.default {
                self.eval_expr(default)?
            } else {
                return Err(EvalError::type_error(format!(
                    "{}() missing required argument: '{}'",
                    def.name, param.name
                )));
            };
            bound.push((param.name.clone(), value));
        }
        if let Some((unexpected, _)) = keywords.first() {
            return Err(EvalError::type_error(format!(
                "{}() got an unexpected keyword argument '{unexpected}'",
                def.name
            )));
        }
        Ok(bound)
    }

    /// Run a user function body in a fresh frame. When `keep` names a
    /// parameter, its final binding is handed back with the result.
    fn enter_user(
        &mut self,
        def: &FunctionDef,
        bound: Vec<(String, Value)>,
        keep: Option<&str>,
    ) -> (EvalResult<Value>, Option<Value>) {
        self.depth += 1;
        self.scope.push_frame();
        for (name, value) in bound {
            self.scope.set(name, value);
        }
        let result = match &def.body {
            FunctionBody::Expr(expr) => self.eval_expr(expr),
            FunctionBody::Block(body) => self.run_function_body(body),
        };
        let kept = keep.and_then(|name| self.scope.remove_local(name));
        self.scope.pop_frame();
        self.depth -= 1;
        (result, kept)
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::None => Value::None,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

fn no_attribute(value: &Value, name: &str) -> EvalError {
    EvalError::Attribute(format!("'{}' object has no attribute '{name}'", value.type_name()))
}

/// `object.name` without calling it.
fn attribute(object: &Value, name: &str) -> EvalResult<Value> {
    match object {
        Value::Module(module) => builtins::module_attr(*module, name).ok_or_else(|| {
            EvalError::Attribute(format!("module '{}' has no attribute '{name}'", module.name()))
        }),
        other if methods::has_method(other, name) => Ok(Value::method(other.clone(), name)),
        other => Err(no_attribute(other, name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn interpreter(json: &str) -> Interpreter {
        let document = Value::from(serde_json::from_str::<serde_json::Value>(json).unwrap());
        let keys = Rc::new(KeyIndex::build(&document));
        Interpreter::new(document, keys)
    }

    fn eval(interp: &mut Interpreter, source: &str) -> Value {
        interp.eval_str(source).unwrap_or_else(|e| panic!("{source}: {e}"))
    }

    fn json(text: &str) -> Value {
        Value::from(serde_json::from_str::<serde_json::Value>(text).unwrap())
    }

    #[rstest]
    #[case("1 + 2 * 3", "7")]
    #[case("2 ** 3 ** 2", "512")]
    #[case("-2 ** 2", "-4")]
    #[case("7 // 2 + 7 % 2", "4")]
    #[case("1 < 2 < 3", "true")]
    #[case("1 < 3 < 2", "false")]
    #[case("'a' if 0 else 'b'", "\"b\"")]
    #[case("[] or 'x'", "\"x\"")]
    #[case("0 and 1", "0")]
    #[case("not None", "true")]
    #[case("[x * 2 for x in range(4) if x % 2]", "[2,6]")]
    #[case("[[a, b] for a in range(2) for b in 'xy']", r#"[[0,"x"],[0,"y"],[1,"x"],[1,"y"]]"#)]
    #[case("{k: len(k) for k in ['a', 'bb']}", r#"{"a":1,"bb":2}"#)]
    #[case("(lambda a, b=10: a + b)(1)", "11")]
    #[case("'abc'[::-1]", "\"cba\"")]
    #[case("sorted([3, 1, 2], reverse=True)", "[3,2,1]")]
    #[case("max(['aa', 'b'], key=len)", "\"aa\"")]
    #[case("sum(x for x in [1, 2, 3])", "6")]
    fn expressions(#[case] source: &str, #[case] expected: &str) {
        let mut interp = interpreter("{}");
        assert_eq!(eval(&mut interp, source), json(expected), "{source}");
    }

    #[test]
    fn root_keys_resolve_as_names() {
        let mut interp = interpreter(r#"{"user":{"name":"Al","id":7}}"#);
        assert_eq!(eval(&mut interp, "user['name']"), Value::Str("Al".into()));
        assert_eq!(eval(&mut interp, "_['user']['id']"), Value::Int(7));
    }

    #[test]
    fn unique_case_insensitive_root_key() {
        let mut interp = interpreter(r#"{"Name":"x"}"#);
        assert_eq!(eval(&mut interp, "name"), Value::Str("x".into()));
    }

    #[test]
    fn ambiguous_root_key_uses_exact_spelling() {
        let mut interp = interpreter(r#"{"Name":"x","name":"y"}"#);
        assert_eq!(eval(&mut interp, "name"), Value::Str("y".into()));
        assert!(matches!(interp.eval_str("NAME"), Err(EvalError::Name(_))));
    }

    #[test]
    fn scope_shadows_document() {
        let mut interp = interpreter(r#"{"len":3}"#);
        assert_eq!(eval(&mut interp, "len([1])"), Value::Int(1));
        assert_eq!(eval(&mut interp, "_['len']"), Value::Int(3));
    }

    #[test]
    fn attribute_is_not_key_access() {
        let mut interp = interpreter(r#"{"a":{"b":1}}"#);
        let err = interp.eval_str("a.b").unwrap_err();
        assert_eq!(err.to_string(), "AttributeError: 'dict' object has no attribute 'b'");
    }

    #[test]
    fn mutating_methods_change_the_document() {
        let mut interp = interpreter(r#"{"items":[3,1,2]}"#);
        eval(&mut interp, "items.append(0)");
        eval(&mut interp, "_['items'].sort()");
        assert_eq!(interp.document(), &json(r#"{"items":[0,1,2,3]}"#));
    }

    #[test]
    fn sort_with_key_calls_back() {
        let mut interp = interpreter(r#"{"rows":[{"n":2},{"n":1}]}"#);
        eval(&mut interp, "rows.sort(key=lambda r: r['n'])");
        assert_eq!(eval(&mut interp, "[r['n'] for r in rows]"), json("[1,2]"));
    }

    #[test]
    fn comprehension_variables_do_not_leak() {
        let mut interp = interpreter("{}");
        eval(&mut interp, "[x for x in [1]]");
        assert!(matches!(interp.eval_str("x"), Err(EvalError::Name(_))));
    }

    #[test]
    fn probe_accepts_scope_references_only() {
        let mut interp = interpreter(r#"{"a":{"b":1},"items":[1]}"#);
        assert!(interp.probe("_"));
        assert!(interp.probe("_['a']"));
        assert!(interp.probe("_j"));
        assert!(!interp.probe("a"));
        assert!(!interp.probe("_.a"));
        assert!(!interp.probe("_.items"));
        assert!(!interp.probe("len(_)"));
        assert!(interp.eval_str("a").is_ok(), "document resolution restored");
    }

    #[test]
    fn module_attributes() {
        let mut interp = interpreter("{}");
        interp.scope.set("math", Value::Module(crate::value::Module::Math));
        assert_eq!(eval(&mut interp, "math.sqrt(16)"), Value::Float(4.0));
        assert!(interp.probe("math.pi"));
        assert!(interp.eval_str("math.nope").is_err());
    }

    #[test]
    fn runaway_recursion_is_stopped() {
        let mut interp = interpreter("{}");
        let f = eval(&mut interp, "lambda n: f(n + 1)");
        interp.scope.set("f", f);
        assert_eq!(interp.eval_str("f(0)").unwrap_err(), EvalError::Recursion);
    }

    #[test]
    fn call_errors() {
        let mut interp = interpreter("{}");
        assert_eq!(
            interp.eval_str("(lambda a: a)()").unwrap_err().to_string(),
            "TypeError: <lambda>() missing required argument: 'a'"
        );
        assert_eq!(
            interp.eval_str("1()").unwrap_err().to_string(),
            "TypeError: 'int' object is not callable"
        );
    }
}
