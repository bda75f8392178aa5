//! Per-call evaluation context.

use rustc_hash::FxHashMap;

use ognav_core::Value;

/// State for one `get_value`/`set_value`/`compile` call.
///
/// Owns the root value (fixed for the call), the mutable current-object
/// cursor that chains thread left-to-right, the user variables reachable as
/// `#name`, and a string-keyed scratch map used for transient signaling
/// between a parent node and its children during a single walk (the indexed
/// accessor handoff). A context is never shared across calls; concurrent
/// evaluations each build their own.
pub struct OgnvContext {
    root: Value,
    current: Value,
    variables: FxHashMap<String, Value>,
    scratch: FxHashMap<String, Value>,
    aliases: FxHashMap<String, String>,
}

impl OgnvContext {
    pub fn new(root: Value) -> Self {
        OgnvContext {
            current: root.clone(),
            root,
            variables: FxHashMap::default(),
            scratch: FxHashMap::default(),
            aliases: FxHashMap::default(),
        }
    }

    pub fn with_variables(root: Value, variables: FxHashMap<String, Value>) -> Self {
        let mut ctx = OgnvContext::new(root);
        ctx.variables = variables;
        ctx
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn current(&self) -> &Value {
        &self.current
    }

    pub fn set_current(&mut self, value: Value) {
        self.current = value;
    }

    /// Reset the cursor to the root, as at the start of a fresh walk.
    pub fn rewind(&mut self) {
        self.current = self.root.clone();
        self.scratch.clear();
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn aliases(&self) -> &FxHashMap<String, String> {
        &self.aliases
    }

    pub fn set_aliases(&mut self, aliases: FxHashMap<String, String>) {
        self.aliases = aliases;
    }

    pub(crate) fn scratch_put(&mut self, key: &str, value: Value) {
        self.scratch.insert(key.to_string(), value);
    }

    pub(crate) fn scratch_take(&mut self, key: &str) -> Option<Value> {
        self.scratch.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_starts_at_root_and_rewinds() {
        let mut ctx = OgnvContext::new(Value::Int(42));
        assert_eq!(ctx.current(), &Value::Int(42));
        ctx.set_current(Value::from("elsewhere"));
        ctx.scratch_put("pending", Value::Bool(true));
        ctx.rewind();
        assert_eq!(ctx.current(), &Value::Int(42));
        assert!(ctx.scratch_take("pending").is_none());
    }

    #[test]
    fn test_variables() {
        let mut vars = FxHashMap::default();
        vars.insert("limit".to_string(), Value::Int(3));
        let ctx = OgnvContext::with_variables(Value::Null, vars);
        assert_eq!(ctx.variable("limit"), Some(&Value::Int(3)));
        assert_eq!(ctx.variable("missing"), None);
    }
}
