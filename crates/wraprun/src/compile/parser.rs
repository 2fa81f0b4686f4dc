//! Recursive-descent parser for wrapper definitions and single declarations.

use crate::compile::lexer::Position;
use crate::compile::lexer::Token;
use crate::compile::lexer::TokenKind;
use crate::decl::ParamSpec;
use crate::decl::TypeExpr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub pos: Position,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, ParseError>;

#[derive(Clone, Debug, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub pos: Position,
}

/// Syntax tree of one definition: each section appears exactly once.
#[derive(Clone, Debug, PartialEq)]
pub struct DefinitionAst {
    pub params_pos: Position,
    pub params: Vec<Spanned<ParamSpec>>,
    pub forward: Vec<Spanned<String>>,
    pub body: Spanned<String>,
}

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    /// Takes a token stream, terminating it with `Eof` if it is not already.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let pos = tokens.last().map(|t| t.pos).unwrap_or_default();
            tokens.push(Token { kind: TokenKind::Eof, pos });
        }
        Self { tokens, index: 0 }
    }

    fn peek(&self) -> &Token {
        // never empty: new guarantees a trailing Eof
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Eof {
            self.index += 1;
        }
        tok
    }

    fn error<T>(&self, pos: Position, message: impl Into<String>) -> Result<T> {
        Err(ParseError { pos, message: message.into() })
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        let tok = self.advance();
        if tok.kind == kind {
            Ok(tok)
        } else {
            self.error(tok.pos, format!("expected {}, found {}", kind, tok.kind))
        }
    }

    fn ident(&mut self, what: &str) -> Result<Spanned<String>> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Ident(name) => Ok(Spanned { node: name, pos: tok.pos }),
            other => self.error(tok.pos, format!("expected {}, found {}", what, other)),
        }
    }

    fn int(&mut self) -> Result<i64> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Int(i) => Ok(i),
            other => self.error(tok.pos, format!("expected integer, found {}", other)),
        }
    }

    pub fn expect_eof(&mut self) -> Result<()> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Eof => Ok(()),
            other => self.error(tok.pos, format!("unexpected {} after end", other)),
        }
    }

    pub fn definition(&mut self) -> Result<DefinitionAst> {
        let mut params = None;
        let mut params_pos = Position::default();
        let mut forward = None;
        let mut body = None;

        loop {
            let tok = self.peek().clone();
            let keyword = match &tok.kind {
                TokenKind::Eof => break,
                TokenKind::Ident(word) => word.clone(),
                other => {
                    let message = format!("expected section keyword, found {}", other);
                    return self.error(tok.pos, message);
                }
            };

            match keyword.as_str() {
                "param" => {
                    if params.is_some() {
                        return self.error(tok.pos, "duplicate 'param' section");
                    }
                    self.advance();
                    params_pos = tok.pos;
                    params = Some(self.param_section()?);
                }
                "forward" => {
                    if forward.is_some() {
                        return self.error(tok.pos, "duplicate 'forward' section");
                    }
                    self.advance();
                    forward = Some(self.forward_section()?);
                }
                "body" => {
                    if body.is_some() {
                        return self.error(tok.pos, "duplicate 'body' section");
                    }
                    self.advance();
                    body = Some(self.body_section()?);
                }
                other => {
                    return self.error(tok.pos, format!("unknown section '{}'", other));
                }
            }
        }

        let end = self.peek().pos;
        let Some(params) = params else {
            return self.error(end, "missing 'param' section");
        };
        let Some(forward) = forward else {
            return self.error(end, "missing 'forward' section");
        };
        let Some(body) = body else {
            return self.error(end, "missing 'body' section");
        };

        Ok(DefinitionAst { params_pos, params, forward, body })
    }

    /// Parses a comma separated list between parentheses, allowing a trailing comma.
    fn paren_list<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        self.expect(TokenKind::LParen)?;
        let mut items = Vec::new();
        loop {
            if self.peek().kind == TokenKind::RParen {
                self.advance();
                return Ok(items);
            }
            items.push(item(self)?);
            let tok = self.advance();
            match tok.kind {
                TokenKind::Comma => continue,
                TokenKind::RParen => return Ok(items),
                other => {
                    return self.error(tok.pos, format!("expected ',' or ')', found {}", other));
                }
            }
        }
    }

    fn param_section(&mut self) -> Result<Vec<Spanned<ParamSpec>>> {
        self.paren_list(|p| {
            let pos = p.peek().pos;
            let spec = p.declaration()?;
            Ok(Spanned { node: spec, pos })
        })
    }

    fn forward_section(&mut self) -> Result<Vec<Spanned<String>>> {
        self.paren_list(|p| p.ident("parameter name"))
    }

    fn body_section(&mut self) -> Result<Spanned<String>> {
        let lookup = self.ident("'lookup'")?;
        if lookup.node != "lookup" {
            return self.error(lookup.pos, format!("expected 'lookup', found '{}'", lookup.node));
        }
        self.expect(TokenKind::LParen)?;
        let tok = self.advance();
        let name = match tok.kind {
            TokenKind::Str(name) if !name.is_empty() => Spanned { node: name, pos: tok.pos },
            TokenKind::Str(_) => return self.error(tok.pos, "callable name must not be empty"),
            other => return self.error(tok.pos, format!("expected string, found {}", other)),
        };
        self.expect(TokenKind::RParen)?;
        Ok(name)
    }

    pub fn declaration(&mut self) -> Result<ParamSpec> {
        let name = self.ident("parameter name")?;
        self.expect(TokenKind::Colon)?;
        let ty = self.type_expr()?;
        let mut spec = ParamSpec::new(name.node, ty);

        while self.peek().kind == TokenKind::At {
            self.advance();
            let attr = self.ident("attribute name")?;
            match attr.node.as_str() {
                "required" => {
                    if spec.required {
                        return self.error(attr.pos, "duplicate '@required'");
                    }
                    spec.required = true;
                }
                "set" => {
                    if spec.set.is_some() {
                        return self.error(attr.pos, "duplicate '@set'");
                    }
                    self.expect(TokenKind::LParen)?;
                    let set = self.ident("parameter set name")?;
                    self.expect(TokenKind::RParen)?;
                    spec.set = Some(set.node);
                }
                "range" => {
                    if spec.range.is_some() {
                        return self.error(attr.pos, "duplicate '@range'");
                    }
                    if spec.ty != TypeExpr::Int {
                        let message = format!("'@range' requires type int, found {}", spec.ty);
                        return self.error(attr.pos, message);
                    }
                    self.expect(TokenKind::LParen)?;
                    let min = self.int()?;
                    self.expect(TokenKind::Comma)?;
                    let max = self.int()?;
                    self.expect(TokenKind::RParen)?;
                    if min > max {
                        return self.error(attr.pos, format!("empty range {}..={}", min, max));
                    }
                    spec.range = Some((min, max));
                }
                other => {
                    return self.error(attr.pos, format!("unknown attribute '@{}'", other));
                }
            }
        }

        Ok(spec)
    }

    fn type_expr(&mut self) -> Result<TypeExpr> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::LBracket => {
                let inner = self.type_expr()?;
                self.expect(TokenKind::RBracket)?;
                Ok(TypeExpr::List(Box::new(inner)))
            }
            TokenKind::Ident(word) => match TypeExpr::from_keyword(&word) {
                Some(ty) => Ok(ty),
                None => self.error(tok.pos, format!("unknown type '{}'", word)),
            },
            other => self.error(tok.pos, format!("expected type, found {}", other)),
        }
    }
}
