use std::fmt;

use crate::lexer::LexErrorKind;

/// Source location for error reporting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Span {
    pub file: Option<String>,
    pub line: usize,
    pub column: usize,
}

impl Span {
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self {
            file: None,
            line,
            column,
        }
    }

    /// Attach the input name used in diagnostics.
    #[must_use]
    pub fn in_file(mut self, name: &str) -> Self {
        if !name.is_empty() {
            self.file = Some(name.to_string());
        }
        self
    }
}

/// Token kinds produced by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Scanning failed; the token text is the formatted message.
    Error(LexErrorKind),
    /// End of input.
    Eof,
    /// `|>`.
    Pipe,
    /// `!name`.
    Macro,
    /// `$(name)`.
    Variable,
    /// `@(name)`.
    AtVariable,
    /// `:` opening a rule.
    Colon,
    /// `,` between `ifeq` operands.
    Comma,
    KeywordForeach,
    KeywordIfeq,
    KeywordIfdef,
    KeywordIfndef,
    KeywordElse,
    KeywordEndif,
    KeywordIncludeRules,
    KeywordInclude,
    /// `=`.
    Assign,
    /// `+=`.
    PlusAssign,
    /// Free-running text.
    String,
    /// `# ...`, without the marker.
    Comment,
    /// `#!...` on the first line, without the marker.
    Shebang,
    /// Path or glob pattern: identifier runes plus `/*%.:-`.
    PathPattern,
    /// Double-quoted string, quotes included.
    QuotedString,
    /// `%x` placeholder inside a command; the text is the flag letter.
    PercentFlag,
    /// `name:` label.
    Label,
    Identifier,
}

impl TokenKind {
    /// Look up a reserved word.
    #[must_use]
    pub fn keyword(word: &str) -> Option<Self> {
        let kind = match word {
            "foreach" => Self::KeywordForeach,
            "ifeq" => Self::KeywordIfeq,
            "ifdef" => Self::KeywordIfdef,
            "ifndef" => Self::KeywordIfndef,
            "else" => Self::KeywordElse,
            "endif" => Self::KeywordEndif,
            "include_rules" => Self::KeywordIncludeRules,
            "include" => Self::KeywordInclude,
            _ => return None,
        };
        Some(kind)
    }

    #[must_use]
    pub const fn is_keyword(&self) -> bool {
        matches!(
            self,
            Self::KeywordForeach
                | Self::KeywordIfeq
                | Self::KeywordIfdef
                | Self::KeywordIfndef
                | Self::KeywordElse
                | Self::KeywordEndif
                | Self::KeywordIncludeRules
                | Self::KeywordInclude
        )
    }

    /// Opens a conditional block closed by `endif`.
    #[must_use]
    pub const fn opens_conditional(&self) -> bool {
        matches!(
            self,
            Self::KeywordIfeq | Self::KeywordIfdef | Self::KeywordIfndef
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error(_) => "error",
            Self::Eof => "end of input",
            Self::Pipe => "'|>'",
            Self::Macro => "macro reference",
            Self::Variable => "variable reference",
            Self::AtVariable => "@-variable reference",
            Self::Colon => "':'",
            Self::Comma => "','",
            Self::KeywordForeach => "'foreach'",
            Self::KeywordIfeq => "'ifeq'",
            Self::KeywordIfdef => "'ifdef'",
            Self::KeywordIfndef => "'ifndef'",
            Self::KeywordElse => "'else'",
            Self::KeywordEndif => "'endif'",
            Self::KeywordIncludeRules => "'include_rules'",
            Self::KeywordInclude => "'include'",
            Self::Assign => "'='",
            Self::PlusAssign => "'+='",
            Self::String => "string",
            Self::Comment => "comment",
            Self::Shebang => "shebang",
            Self::PathPattern => "path pattern",
            Self::QuotedString => "quoted string",
            Self::PercentFlag => "percent flag",
            Self::Label => "label",
            Self::Identifier => "identifier",
        };
        f.write_str(name)
    }
}

/// A single token with its kind, text, and source location.
///
/// `start` is the byte offset of `text` in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub span: Span,
}

impl Token {
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.kind, TokenKind::Error(_))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Eof => f.write_str("!EOF"),
            TokenKind::Error(_) => write!(f, "[Error]: '{}'", self.text),
            kind => write!(f, "({kind}, '{}')", crate::text::trim_text(&self.text, 10)),
        }
    }
}
