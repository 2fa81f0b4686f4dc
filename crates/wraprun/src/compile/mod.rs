//! # Definition Compiler
//!
//! Turns generated definition text into a [`WrapperSpec`], the typed form an
//! installed wrapper runs from. Syntax errors and semantic errors are both
//! reported as a [`CompilationError`] carrying the offending text and the
//! position of the problem.
//!
//! Definition grammar:
//!
//! ```text
//! definition := section*            (each section exactly once)
//! section    := "param" "(" decl,* ")"
//!             | "forward" "(" ident,* ")"
//!             | "body" "lookup" "(" string ")"
//! ```
//!
//! `#` starts a comment that runs to the end of the line.

pub mod lexer;
pub mod parser;

use std::collections::HashSet;

use crate::decl::ParamSpec;
use crate::remoting::RemotingParameterSet;
use crate::wrapper::WrapperSpec;

use lexer::Position;
use parser::ParseError;
use parser::Parser;

/// A definition failed to compile.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("compilation failed at {line}:{column}: {message}")]
pub struct CompilationError {
    /// The full text that was being compiled.
    pub text: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl CompilationError {
    fn new(text: &str, pos: Position, message: impl Into<String>) -> Self {
        Self {
            text: text.to_string(),
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    /// The source line the error points into, if it exists.
    pub fn source_line(&self) -> Option<&str> {
        self.text.lines().nth(self.line.checked_sub(1)?)
    }
}

pub type Result<T> = std::result::Result<T, CompilationError>;

fn parse_error(text: &str, e: ParseError) -> CompilationError {
    CompilationError::new(text, e.pos, e.message)
}

fn tokens(text: &str) -> Result<Vec<lexer::Token>> {
    lexer::tokenize(text).map_err(|e| CompilationError::new(text, e.pos, e.message))
}

/// Position of the first comment or line break in `text`, if any.
///
/// Declarations are spliced into one line of a generated `param(...)` list,
/// so either would swallow the separator that follows.
fn line_break(text: &str) -> Option<Position> {
    let at = text.find(['#', '\n'])?;
    Some(Position { line: 1, column: text[..at].chars().count() + 1 })
}

/// Parses a single parameter declaration such as `count: int @range(1, 10)`.
///
/// A declaration is one line without comments.
pub fn parse_declaration(text: &str) -> Result<ParamSpec> {
    if let Some(pos) = line_break(text) {
        return Err(CompilationError::new(
            text,
            pos,
            "declaration must be a single line without comments",
        ));
    }
    let mut parser = Parser::new(tokens(text)?);
    let spec = parser.declaration().map_err(|e| parse_error(text, e))?;
    parser.expect_eof().map_err(|e| parse_error(text, e))?;
    Ok(spec)
}

/// Compiles definition text against the standard remoting parameters.
pub fn compile(text: &str) -> Result<WrapperSpec> {
    compile_with(text, &RemotingParameterSet::standard())
}

/// Compiles definition text, checking that `remoting` is declared exactly as given.
pub fn compile_with(text: &str, remoting: &RemotingParameterSet) -> Result<WrapperSpec> {
    let ast = Parser::new(tokens(text)?)
        .definition()
        .map_err(|e| parse_error(text, e))?;

    let mut seen = HashSet::new();
    for param in &ast.params {
        if !seen.insert(param.node.name.as_str()) {
            return Err(CompilationError::new(
                text,
                param.pos,
                format!("duplicate parameter '{}'", param.node.name),
            ));
        }
        if let Some(expected) = remoting.get(&param.node.name) {
            if expected != &param.node {
                return Err(CompilationError::new(
                    text,
                    param.pos,
                    format!("remoting parameter must be declared as `{}`", expected),
                ));
            }
        }
    }

    for expected in remoting.params() {
        if !seen.contains(expected.name.as_str()) {
            return Err(CompilationError::new(
                text,
                ast.params_pos,
                format!("missing remoting parameter '{}'", expected.name),
            ));
        }
    }

    let mut forwarded = HashSet::new();
    for name in &ast.forward {
        if !seen.contains(name.node.as_str()) {
            return Err(CompilationError::new(
                text,
                name.pos,
                format!("forwarded name '{}' is not a declared parameter", name.node),
            ));
        }
        if remoting.contains(&name.node) {
            return Err(CompilationError::new(
                text,
                name.pos,
                format!("remoting parameter '{}' cannot be forwarded", name.node),
            ));
        }
        if !forwarded.insert(name.node.as_str()) {
            return Err(CompilationError::new(
                text,
                name.pos,
                format!("'{}' is forwarded twice", name.node),
            ));
        }
    }

    Ok(WrapperSpec {
        params: ast.params.into_iter().map(|p| p.node).collect(),
        forward: ast.forward.into_iter().map(|f| f.node).collect(),
        body: ast.body.node,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "param(\n    target-list: [string] @set(by-address) @required,\n    credential: credential @set(by-address),\n    session-list: [session] @set(by-session) @required";

    fn definition(extra_params: &str, forward: &str) -> String {
        format!("{}{}\n)\nforward({})\nbody lookup(\"Get-Thing\")\n", HEADER, extra_params, forward)
    }

    #[test]
    fn test_declaration_with_comment_rejected() {
        let err = parse_declaration("a: int # the count").unwrap_err();
        assert_eq!((err.line, err.column), (1, 8));
        assert!(err.message.contains("single line"));

        let err = parse_declaration("a: int\n@required").unwrap_err();
        assert_eq!((err.line, err.column), (1, 7));
        assert!(parse_declaration("a: int @required").is_ok());
    }

    #[test]
    fn test_compile_valid_definition() {
        let spec = compile(&definition(",\n    count: int @range(1, 5)", "count")).unwrap();
        assert_eq!(spec.params.len(), 4);
        assert_eq!(spec.params[3].name, "count");
        assert_eq!(spec.forward, vec!["count".to_string()]);
        assert_eq!(spec.body, "Get-Thing");
    }

    #[test]
    fn test_syntax_error_carries_position_and_text() {
        let text = definition(",\n    count int", "count");
        let err = compile(&text).unwrap_err();
        assert_eq!(err.text, text);
        assert_eq!(err.line, 5);
        assert_eq!(err.column, 11);
        assert_eq!(err.source_line(), Some("    count int"));
    }

    #[test]
    fn test_missing_remoting_parameter() {
        let text = "param(count: int)\nforward(count)\nbody lookup(\"f\")";
        let err = compile(text).unwrap_err();
        assert!(err.message.contains("missing remoting parameter 'target-list'"));
        assert_eq!((err.line, err.column), (1, 1));
    }

    #[test]
    fn test_tampered_remoting_parameter() {
        let text = definition("", "").replace("credential: credential", "credential: string");
        let err = compile(&text).unwrap_err();
        assert!(err.message.contains("must be declared as"));
    }

    #[test]
    fn test_forward_must_name_declared_parameter() {
        let err = compile(&definition("", "count")).unwrap_err();
        assert!(err.message.contains("'count' is not a declared parameter"));
    }

    #[test]
    fn test_remoting_parameter_cannot_be_forwarded() {
        let err = compile(&definition("", "target-list")).unwrap_err();
        assert!(err.message.contains("cannot be forwarded"));
    }

    #[test]
    fn test_duplicate_parameter() {
        let err = compile(&definition(",\n    a: int,\n    a: bool", "a")).unwrap_err();
        assert!(err.message.contains("duplicate parameter 'a'"));
        assert_eq!(err.line, 6);
    }
}
