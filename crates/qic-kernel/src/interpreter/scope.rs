//! Variable scope management.
//!
//! Scopes provide variable bindings with nested frames. The outermost frame
//! holds the globals: the document root `_`, imported modules and anything
//! assigned at top level. Comprehensions and function calls push a frame.

use std::collections::HashMap;

use crate::value::Value;

/// Variable scope with nested frames.
///
/// Variables are looked up from innermost to outermost frame.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Stack of variable frames. Last element is the innermost scope.
    frames: Vec<HashMap<String, Value>>,
}

impl Scope {
    /// Create a new scope with one empty frame.
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    /// Push a new scope frame (for entering a comprehension or function call).
    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Pop the innermost scope frame. The global frame is never popped.
    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Set a variable in the current (innermost) frame.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }

    /// Set a variable in the global frame.
    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.first_mut() {
            frame.insert(name.into(), value);
        }
    }

    /// Get a variable by name, searching from innermost to outermost frame.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Mutable access to the innermost binding of a name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.frames.iter_mut().rev().find_map(|frame| frame.get_mut(name))
    }

    /// Remove a variable, searching from innermost to outermost frame.
    ///
    /// Returns the removed value if found, None otherwise.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.frames.iter_mut().rev().find_map(|frame| frame.remove(name))
    }

    /// Remove a variable from the global frame only.
    pub fn remove_global(&mut self, name: &str) -> Option<Value> {
        self.frames.first_mut().and_then(|frame| frame.remove(name))
    }

    /// Remove a variable from the innermost frame only.
    pub fn remove_local(&mut self, name: &str) -> Option<Value> {
        self.frames.last_mut().and_then(|frame| frame.remove(name))
    }

    /// Check if a variable exists in any frame.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get all variable names in scope (for completion).
    pub fn all_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .frames
            .iter()
            .flat_map(|frame| frame.keys().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_frames_shadow_outer() {
        let mut scope = Scope::new();
        scope.set("x", Value::Int(1));
        scope.push_frame();
        scope.set("x", Value::Int(2));
        assert_eq!(scope.get("x"), Some(&Value::Int(2)));
        scope.pop_frame();
        assert_eq!(scope.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn reads_fall_through_to_globals() {
        let mut scope = Scope::new();
        scope.set("_", Value::Int(7));
        scope.push_frame();
        scope.set("y", Value::Int(1));
        assert_eq!(scope.get("_"), Some(&Value::Int(7)));
        assert_eq!(scope.all_names(), vec!["_", "y"]);
    }

    #[test]
    fn root_frame_survives_pop() {
        let mut scope = Scope::new();
        scope.set("a", Value::None);
        scope.pop_frame();
        assert_eq!(scope.depth(), 1);
        assert!(scope.contains("a"));
    }

    #[test]
    fn get_mut_updates_innermost() {
        let mut scope = Scope::new();
        scope.set("l", Value::List(vec![]));
        if let Some(Value::List(items)) = scope.get_mut("l") {
            items.push(Value::Int(1));
        }
        assert_eq!(scope.get("l"), Some(&Value::List(vec![Value::Int(1)])));
        assert_eq!(scope.remove("l"), Some(Value::List(vec![Value::Int(1)])));
        assert!(!scope.contains("l"));
    }

    #[test]
    fn removal_by_frame() {
        let mut scope = Scope::new();
        scope.set("_", Value::Int(1));
        scope.push_frame();
        scope.set("_", Value::Int(2));
        assert_eq!(scope.remove_global("_"), Some(Value::Int(1)));
        assert_eq!(scope.remove_global("_"), None);
        assert_eq!(scope.remove_local("_"), Some(Value::Int(2)));
        assert!(!scope.contains("_"));
    }
}
