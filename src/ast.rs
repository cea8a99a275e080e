/// One parsed top-level statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Rule(RuleNode),
    /// `!name = ...`; the body is stored in the environment.
    Macro(MacroNode),
    /// `NAME = value` or `NAME += value`.
    Variable(VariableNode),
    Label(LabelNode),
    Include(IncludeNode),
    /// `include_rules`.
    IncludeRules,
}

/// A build step: `: [foreach] inputs |> command |> output`.
///
/// Macro and variable references are already resolved. Percent flags
/// stay in the command as written (`%f`, `%o`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleNode {
    pub foreach: bool,
    pub inputs: Vec<String>,
    pub command: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroNode {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableNode {
    pub name: String,
    /// Written with `+=`.
    pub append: bool,
}

/// `name: deps...` and the indented code block under it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelNode {
    pub name: String,
    pub deps: Vec<String>,
    pub code: Vec<String>,
}

/// `include <path>`; the file itself is not read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeNode {
    pub path: String,
}

impl Node {
    #[must_use]
    pub const fn as_rule(&self) -> Option<&RuleNode> {
        match self {
            Self::Rule(rule) => Some(rule),
            _ => None,
        }
    }
}
