use std::collections::HashMap;

use crate::ast::RuleNode;

/// Macros and variables visible to a parse.
///
/// A parse takes the environment by value and hands it back with the
/// definitions it found, so a caller can thread one environment through
/// several files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserEnv {
    pub macros: HashMap<String, RuleNode>,
    pub vars: HashMap<String, String>,
}

impl ParserEnv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a macro body.
    #[must_use]
    pub fn with_macro(mut self, name: impl Into<String>, rule: RuleNode) -> Self {
        self.define_macro(name, rule);
        self
    }

    /// Add or replace a variable.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.define_var(name, value);
        self
    }

    pub fn define_macro(&mut self, name: impl Into<String>, rule: RuleNode) {
        self.macros.insert(name.into(), rule);
    }

    pub fn define_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// `NAME += value`: extend with a single space, or define.
    pub fn append_var(&mut self, name: impl Into<String>, value: &str) {
        let slot = self.vars.entry(name.into()).or_default();
        if !slot.is_empty() && !value.is_empty() {
            slot.push(' ');
        }
        slot.push_str(value);
    }

    #[must_use]
    pub fn macro_rule(&self, name: &str) -> Option<&RuleNode> {
        self.macros.get(name)
    }

    #[must_use]
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_defines_when_absent() {
        let mut env = ParserEnv::new();
        env.append_var("CFLAGS", "-O2");
        assert_eq!(env.var("CFLAGS"), Some("-O2"));
    }

    #[test]
    fn append_joins_with_space() {
        let mut env = ParserEnv::new().with_var("CFLAGS", "-O2");
        env.append_var("CFLAGS", "-Wall");
        assert_eq!(env.var("CFLAGS"), Some("-O2 -Wall"));
    }

    #[test]
    fn append_empty_keeps_value() {
        let mut env = ParserEnv::new().with_var("A", "x");
        env.append_var("A", "");
        assert_eq!(env.var("A"), Some("x"));
    }

    #[test]
    fn define_replaces() {
        let mut env = ParserEnv::new().with_var("A", "x");
        env.define_var("A", "y");
        assert_eq!(env.var("A"), Some("y"));
        assert!(env.is_defined("A"));
        assert!(!env.is_defined("B"));
    }

    #[test]
    fn macros_by_name() {
        let rule = RuleNode {
            command: "cat".to_string(),
            ..RuleNode::default()
        };
        let env = ParserEnv::new().with_macro("cat", rule.clone());
        assert_eq!(env.macro_rule("cat"), Some(&rule));
        assert_eq!(env.macro_rule("dog"), None);
    }
}
