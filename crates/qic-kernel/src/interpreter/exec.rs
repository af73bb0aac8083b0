//! Statement execution.

use std::rc::Rc;

use super::builtins;
use super::error::{EvalError, EvalResult};
use super::eval::Interpreter;
use super::ops;
use crate::ast::{Expr, ImportName, Program, Stmt, Target};
use crate::parser;
use crate::value::{Callable, Module, Value};

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

impl Interpreter {
    /// Parse and run a block of statements.
    pub fn exec_str(&mut self, source: &str) -> EvalResult<()> {
        let program = parser::parse(source).map_err(|e| EvalError::from_parse_errors(&e))?;
        self.execute(&program)
    }

    /// Run a parsed program at top level.
    pub fn execute(&mut self, program: &Program) -> EvalResult<()> {
        match self.exec_block(&program.statements)? {
            ControlFlow::Normal => Ok(()),
            ControlFlow::Return(_) => Err(EvalError::Syntax("'return' outside function".into())),
            ControlFlow::Break => Err(EvalError::Syntax("'break' outside loop".into())),
            ControlFlow::Continue => {
                Err(EvalError::Syntax("'continue' not properly in loop".into()))
            }
        }
    }

    pub(crate) fn run_function_body(&mut self, body: &[Stmt]) -> EvalResult<Value> {
        match self.exec_block(body)? {
            ControlFlow::Normal => Ok(Value::None),
            ControlFlow::Return(value) => Ok(value),
            ControlFlow::Break => Err(EvalError::Syntax("'break' outside loop".into())),
            ControlFlow::Continue => {
                Err(EvalError::Syntax("'continue' not properly in loop".into()))
            }
        }
    }

    fn exec_block(&mut self, statements: &[Stmt]) -> EvalResult<ControlFlow> {
        for stmt in statements {
            match self.exec_stmt(stmt)? {
                ControlFlow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(ControlFlow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> EvalResult<ControlFlow> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval_expr(expr)?;
            }
            Stmt::Assign { targets, value } => {
                let value = self.eval_expr(value)?;
                if let Some((last, rest)) = targets.split_last() {
                    for target in rest {
                        self.assign(target, value.clone())?;
                    }
                    self.assign(last, value)?;
                }
            }
            Stmt::AugAssign { target, op, value } => {
                let rhs = self.eval_expr(value)?;
                match target {
                    Target::Name(name) => {
                        let current = self.eval_expr(&Expr::Name(name.clone()))?;
                        let updated = ops::binary(*op, &current, &rhs)?;
                        match self.scope.get_mut(name) {
                            Some(slot) => *slot = updated,
                            None => self.scope.set(name.clone(), updated),
                        }
                    }
                    Target::Subscript { object, index } => {
                        let place = self.container_place(object)?;
                        let index = self.eval_expr(index)?;
                        let container = self.place_mut(&place)?;
                        let updated = ops::binary(*op, ops::child_mut(container, &index)?, &rhs)?;
                        ops::set_item(container, index, updated)?;
                    }
                    Target::Tuple(_) => {
                        return Err(EvalError::Syntax(
                            "illegal expression for augmented assignment".into(),
                        ));
                    }
                }
            }
            Stmt::Del(targets) => {
                for target in targets {
                    self.delete(target)?;
                }
            }
            Stmt::Pass => {}
            Stmt::Break => return Ok(ControlFlow::Break),
            Stmt::Continue => return Ok(ControlFlow::Continue),
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::None,
                };
                return Ok(ControlFlow::Return(value));
            }
            Stmt::Import(names) => {
                for import in names {
                    let module = import_module(&import.name)?;
                    self.scope.set(import.binding().to_string(), Value::Module(module));
                }
            }
            Stmt::FromImport { module, names } => {
                let module = import_module(module)?;
                for ImportName { name, alias } in names {
                    let value = builtins::module_attr(module, name).ok_or_else(|| {
                        EvalError::Import(format!(
                            "cannot import name '{name}' from '{}'",
                            module.name()
                        ))
                    })?;
                    self.scope.set(alias.clone().unwrap_or_else(|| name.clone()), value);
                }
            }
            Stmt::If(if_stmt) => {
                if self.eval_expr(&if_stmt.condition)?.is_truthy() {
                    return self.exec_block(&if_stmt.then_branch);
                } else if let Some(else_branch) = &if_stmt.else_branch {
                    return self.exec_block(else_branch);
                }
            }
            Stmt::For(for_loop) => {
                let items = ops::iterate(self.eval_expr(&for_loop.iter)?)?;
                for item in items {
                    self.assign(&for_loop.target, item)?;
                    match self.exec_block(&for_loop.body)? {
                        ControlFlow::Break => break,
                        ControlFlow::Return(value) => return Ok(ControlFlow::Return(value)),
                        ControlFlow::Normal | ControlFlow::Continue => {}
                    }
                }
            }
            Stmt::While(while_loop) => {
                while self.eval_expr(&while_loop.condition)?.is_truthy() {
                    match self.exec_block(&while_loop.body)? {
                        ControlFlow::Break => break,
                        ControlFlow::Return(value) => return Ok(ControlFlow::Return(value)),
                        ControlFlow::Normal | ControlFlow::Continue => {}
                    }
                }
            }
            Stmt::Def(def) => {
                let function = Value::Func(Rc::new(Callable::User(Rc::clone(def))));
                self.scope.set(def.name.clone(), function);
            }
        }
        Ok(ControlFlow::Normal)
    }

    fn delete(&mut self, target: &Target) -> EvalResult<()> {
        match target {
            Target::Name(name) => self
                .scope
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| EvalError::Name(name.clone())),
            Target::Subscript { object, index } => {
                let place = self.container_place(object)?;
                let index = self.eval_expr(index)?;
                let container = self.place_mut(&place)?;
                ops::del_item(container, &index)
            }
            Target::Tuple(targets) => targets.iter().try_for_each(|t| self.delete(t)),
        }
    }
}

fn import_module(name: &str) -> EvalResult<Module> {
    Module::from_name(name).ok_or_else(|| EvalError::Import(format!("No module named '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyIndex;

    fn interpreter(json: &str) -> Interpreter {
        let document = Value::from(serde_json::from_str::<serde_json::Value>(json).unwrap());
        let keys = Rc::new(KeyIndex::build(&document));
        Interpreter::new(document, keys)
    }

    fn run(interp: &mut Interpreter, source: &str) {
        interp.exec_str(source).unwrap_or_else(|e| panic!("{source}: {e}"));
    }

    #[test]
    fn assignment_and_augmented_assignment() {
        let mut interp = interpreter("{}");
        run(&mut interp, "x = y = 2\nx += 3\ny *= 10");
        assert_eq!(interp.eval_str("[x, y]").unwrap(), Value::List(vec![Value::Int(5), Value::Int(20)]));
    }

    #[test]
    fn tuple_unpacking() {
        let mut interp = interpreter("{}");
        run(&mut interp, "a, b = [1, 2]\na, b = b, a");
        assert_eq!(interp.eval_str("a * 10 + b").unwrap(), Value::Int(21));
        let err = interp.exec_str("a, b = [1]").unwrap_err();
        assert_eq!(err.to_string(), "ValueError: not enough values to unpack (expected 2, got 1)");
    }

    #[test]
    fn statements_mutate_the_document() {
        let mut interp = interpreter(r#"{"a":{"n":1},"l":[1,2,3]}"#);
        run(&mut interp, "a['n'] += 1; a['m'] = 'new'; del l[0]");
        assert_eq!(interp.eval_str("_['a']").unwrap().repr(), "{'n': 2, 'm': 'new'}");
        assert_eq!(interp.eval_str("len(_['l'])").unwrap(), Value::Int(2));
    }

    #[test]
    fn loops_with_break_and_continue() {
        let mut interp = interpreter("{}");
        run(
            &mut interp,
            "total = 0\nfor i in range(10):\n    if i % 2:\n        continue\n    if i > 6:\n        break\n    total += i\n",
        );
        assert_eq!(interp.eval_str("total").unwrap(), Value::Int(12));

        run(&mut interp, "n = 0\nwhile n < 5: n += 1");
        assert_eq!(interp.eval_str("n").unwrap(), Value::Int(5));
    }

    #[test]
    fn functions_return_values() {
        let mut interp = interpreter("{}");
        run(
            &mut interp,
            "def fact(n):\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\n",
        );
        assert_eq!(interp.eval_str("fact(5)").unwrap(), Value::Int(120));
    }

    #[test]
    fn functions_see_the_caller_scope() {
        let mut interp = interpreter("{}");
        run(&mut interp, "k = 3\ndef add(x): return x + k");
        assert_eq!(interp.eval_str("add(1)").unwrap(), Value::Int(4));
    }

    #[test]
    fn print_is_buffered() {
        let mut interp = interpreter("{}");
        run(&mut interp, "for i in range(2): print('row', i)");
        assert_eq!(interp.take_output(), "row 0\nrow 1\n");
        assert_eq!(interp.take_output(), "");
    }

    #[test]
    fn imports_are_whitelisted() {
        let mut interp = interpreter("{}");
        run(&mut interp, "import math as m\nfrom re import sub");
        assert_eq!(interp.eval_str("m.floor(2.7)").unwrap(), Value::Int(2));
        assert_eq!(interp.eval_str("sub('a', 'b', 'aa')").unwrap(), Value::Str("bb".into()));
        let err = interp.exec_str("import os").unwrap_err();
        assert_eq!(err.to_string(), "ImportError: No module named 'os'");
    }

    #[test]
    fn return_outside_function_is_rejected() {
        let mut interp = interpreter("{}");
        assert!(matches!(interp.exec_str("return 1"), Err(EvalError::Syntax(_))));
    }

    #[test]
    fn del_unknown_name() {
        let mut interp = interpreter("{}");
        assert_eq!(interp.exec_str("del nope").unwrap_err(), EvalError::Name("nope".into()));
    }
}
