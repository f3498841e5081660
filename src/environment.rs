use crate::parser::FunctionDecl;
use crate::runtime::{Value, ValueType};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub value: Value,
    pub declared_type: ValueType,
}

/// One row of the symbol table as reported to tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub identifier: String,
    pub declared_type: ValueType,
    pub value: Value,
}

/// Flat name → binding map. Declaration order is remembered for reporting only.
#[derive(Debug, Default, Clone)]
pub struct Scope {
    bindings: HashMap<String, Binding>,
    order: Vec<String>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `name` is already declared here.
    pub fn declare(&mut self, name: &str, value: Value) -> bool {
        if self.bindings.contains_key(name) {
            return false;
        }
        let declared_type = value.value_type();
        self.bindings.insert(
            name.to_string(),
            Binding {
                value,
                declared_type,
            },
        );
        self.order.push(name.to_string());
        true
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.bindings.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Overwrites an existing binding; the declared type follows the new value.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        match self.bindings.get_mut(name) {
            Some(binding) => {
                binding.declared_type = value.value_type();
                binding.value = value;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Binding> {
        self.order.retain(|n| n != name);
        self.bindings.remove(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn variables(&self) -> Vec<Variable> {
        self.order
            .iter()
            .filter_map(|name| {
                self.bindings.get(name).map(|binding| Variable {
                    identifier: name.clone(),
                    declared_type: binding.declared_type,
                    value: binding.value.clone(),
                })
            })
            .collect()
    }
}

/// The global scope plus one frame per active function call. Frames do not
/// see the globals or each other.
#[derive(Debug, Default)]
pub struct ScopeStack {
    global: Scope,
    frames: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &Scope {
        self.frames.last().unwrap_or(&self.global)
    }

    pub fn current_mut(&mut self) -> &mut Scope {
        self.frames.last_mut().unwrap_or(&mut self.global)
    }

    pub fn push_frame(&mut self, frame: Scope) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<Scope> {
        self.frames.pop()
    }

    /// Number of active call frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn global(&self) -> &Scope {
        &self.global
    }

    pub fn into_global(self) -> Scope {
        self.global
    }
}

pub type FunctionTable<'p> = HashMap<&'p str, &'p FunctionDecl>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_declare_is_unique() {
        let mut scope = Scope::new();
        assert!(scope.declare("x", Value::Noob));
        assert!(!scope.declare("x", Value::Numbr(1)));
        assert_eq!(scope.get("x").map(|b| b.declared_type), Some(ValueType::Noob));
    }

    #[test]
    fn test_assign_tracks_type() {
        let mut scope = Scope::new();
        assert!(!scope.assign("x", Value::Numbr(1)));
        scope.declare("x", Value::Noob);
        assert!(scope.assign("x", Value::Yarn("hi".to_string())));
        assert_eq!(
            scope.get("x"),
            Some(&Binding {
                value: Value::Yarn("hi".to_string()),
                declared_type: ValueType::Yarn,
            })
        );
    }

    #[test]
    fn test_variables_in_declaration_order() {
        let mut scope = Scope::new();
        scope.declare("b", Value::Numbr(2));
        scope.declare("a", Value::Troof(true));
        scope.declare("tmp", Value::Noob);
        scope.remove("tmp");
        let names: Vec<_> = scope.variables().into_iter().map(|v| v.identifier).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_frames_are_isolated() {
        let mut stack = ScopeStack::new();
        stack.current_mut().declare("g", Value::Numbr(1));

        let mut frame = Scope::new();
        frame.declare("p", Value::Numbr(2));
        stack.push_frame(frame);
        assert_eq!(stack.depth(), 1);
        assert!(!stack.current().contains("g"));
        assert!(stack.current().contains("p"));

        stack.pop_frame();
        assert!(stack.current().contains("g"));
        assert_eq!(stack.global().len(), 1);
    }
}
