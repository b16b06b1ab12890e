// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type string parser.
//!
//! Accepts every form `Display` produces for a [`Type`], plus the builtin
//! aliases and names registered in a [`TypeRegistry`]:
//!
//! ```text
//! type    := dim* dtype
//! dim     := INT '*' | 'strided' '*' | 'var' '*'
//! dtype   := NAME | NAME '[' args ']' | '{' field (',' field)* '}'
//! field   := NAME ':' type
//! ```

use super::{BuiltinTypeId, Type, TimeZone, TypeRegistry};
use crate::error::{Error, Result};
use crate::string_encodings::StringEncoding;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Integer(usize),
    String(String),
    Star,
    Comma,
    Colon,
    Equals,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Eof,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if pred(ch) {
                self.next_char();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn error(&self, position: usize, message: impl Into<String>) -> Error {
        Error::TypeParse {
            input: self.input.to_string(),
            position,
            message: message.into(),
        }
    }

    /// Next token and the byte position it starts at.
    fn next_token(&mut self) -> Result<(Token, usize)> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(ch) = self.peek_char() else {
            return Ok((Token::Eof, start));
        };

        let single = match ch {
            '*' => Some(Token::Star),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            '=' => Some(Token::Equals),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            _ => None,
        };
        if let Some(token) = single {
            self.next_char();
            return Ok((token, start));
        }

        if ch == '\'' || ch == '"' {
            self.next_char();
            let body = self.read_while(|c| c != ch);
            if self.next_char() != Some(ch) {
                return Err(self.error(start, "unterminated string"));
            }
            return Ok((Token::String(body.to_string()), start));
        }

        if ch.is_ascii_digit() {
            let digits = self.read_while(|c| c.is_ascii_digit());
            let n = digits
                .parse()
                .map_err(|_| self.error(start, format!("integer {} is out of range", digits)))?;
            return Ok((Token::Integer(n), start));
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            let ident = self.read_while(|c| c.is_ascii_alphanumeric() || c == '_');
            return Ok((Token::Identifier(ident.to_string()), start));
        }

        Err(self.error(start, format!("unexpected character '{}'", ch)))
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    registry: &'a TypeRegistry,
    current: Token,
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, registry: &'a TypeRegistry) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let (current, position) = lexer.next_token()?;
        Ok(Self {
            lexer,
            registry,
            current,
            position,
        })
    }

    fn advance(&mut self) -> Result<()> {
        let (token, position) = self.lexer.next_token()?;
        self.current = token;
        self.position = position;
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> Error {
        self.lexer.error(self.position, message)
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<()> {
        if self.current != token {
            return Err(self.error(format!("expected {}", what)));
        }
        self.advance()
    }

    fn expect_integer(&mut self) -> Result<usize> {
        match self.current {
            Token::Integer(n) => {
                self.advance()?;
                Ok(n)
            }
            _ => Err(self.error("expected an integer")),
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match &self.current {
            Token::String(s) => {
                let s = s.clone();
                self.advance()?;
                Ok(s)
            }
            _ => Err(self.error("expected a quoted string")),
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match &self.current {
            Token::Identifier(s) => {
                let s = s.clone();
                self.advance()?;
                Ok(s)
            }
            _ => Err(self.error("expected a name")),
        }
    }

    /// `key =`
    fn expect_keyword(&mut self, key: &str) -> Result<()> {
        match &self.current {
            Token::Identifier(s) if s == key => {
                self.advance()?;
                self.expect(Token::Equals, "'='")
            }
            _ => Err(self.error(format!("expected '{}='", key))),
        }
    }

    /// Consume `[` if present.
    fn open_args(&mut self) -> Result<bool> {
        if self.current == Token::LBracket {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Consume `,` if present.
    fn more_args(&mut self) -> Result<bool> {
        if self.current == Token::Comma {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn encoding(&self, name: &str, at: usize) -> Result<StringEncoding> {
        StringEncoding::from_name(name)
            .ok_or_else(|| self.lexer.error(at, format!("unknown string encoding '{}'", name)))
    }

    /// Attach a constructor failure to the position the type started at.
    fn build(&self, at: usize, result: Result<Type>) -> Result<Type> {
        result.map_err(|e| match e {
            Error::TypeParse { .. } => e,
            other => self.lexer.error(at, other.to_string()),
        })
    }

    fn parse_type(&mut self) -> Result<Type> {
        let at = self.position;
        match self.current.clone() {
            Token::Integer(n) => {
                self.advance()?;
                self.expect(Token::Star, "'*' after a dimension size")?;
                let element = self.parse_type()?;
                self.build(at, Type::fixed_dim(n, element))
            }
            Token::Identifier(name) if name == "strided" || name == "var" => {
                self.advance()?;
                self.expect(Token::Star, "'*' after a dimension")?;
                let element = self.parse_type()?;
                if name == "strided" {
                    Ok(Type::strided_dim(element))
                } else {
                    self.build(at, Type::var_dim(element))
                }
            }
            Token::LBrace => self.parse_struct(),
            Token::Identifier(name) => {
                self.advance()?;
                self.parse_named(&name, at)
            }
            _ => Err(self.error("expected a type")),
        }
    }

    fn parse_struct(&mut self) -> Result<Type> {
        let at = self.position;
        self.expect(Token::LBrace, "'{'")?;
        let mut fields = Vec::new();
        loop {
            let name = match &self.current {
                Token::String(s) => {
                    let s = s.clone();
                    self.advance()?;
                    s
                }
                _ => self.expect_identifier()?,
            };
            self.expect(Token::Colon, "':' after a field name")?;
            fields.push((name, self.parse_type()?));
            if !self.more_args()? {
                break;
            }
        }
        self.expect(Token::RBrace, "',' or '}'")?;
        self.build(at, Type::cstruct(fields))
    }

    fn parse_named(&mut self, name: &str, at: usize) -> Result<Type> {
        match name {
            "Any" => Ok(Type::any()),
            "bytes" => {
                self.expect(Token::LBracket, "'[' after bytes")?;
                let size = self.expect_integer()?;
                let mut align = 1;
                if self.more_args()? {
                    self.expect_keyword("align")?;
                    align = self.expect_integer()?;
                }
                self.expect(Token::RBracket, "']'")?;
                self.build(at, Type::fixed_bytes(size, align))
            }
            "string" => {
                let mut encoding = StringEncoding::Utf8;
                if self.open_args()? {
                    let enc_at = self.position;
                    let enc = self.expect_string()?;
                    encoding = self.encoding(&enc, enc_at)?;
                    self.expect(Token::RBracket, "']'")?;
                }
                Ok(Type::string(encoding))
            }
            "fixed_string" => {
                self.expect(Token::LBracket, "'[' after fixed_string")?;
                let size = self.expect_integer()?;
                let mut encoding = StringEncoding::Utf8;
                if self.more_args()? {
                    let enc_at = self.position;
                    let enc = self.expect_string()?;
                    encoding = self.encoding(&enc, enc_at)?;
                }
                self.expect(Token::RBracket, "']'")?;
                self.build(at, Type::fixed_string(size, encoding))
            }
            "time" => {
                let mut tz = TimeZone::Abstract;
                if self.open_args()? {
                    self.expect_keyword("tz")?;
                    let tz_at = self.position;
                    let zone = self.expect_string()?;
                    tz = TimeZone::from_name(&zone)
                        .map_err(|e| self.lexer.error(tz_at, e.to_string()))?;
                    self.expect(Token::RBracket, "']'")?;
                }
                Ok(Type::time_with_zone(tz))
            }
            "complex" => {
                if !self.open_args()? {
                    return Ok(Type::builtin(BuiltinTypeId::ComplexFloat64));
                }
                let real = self.expect_identifier()?;
                self.expect(Token::RBracket, "']'")?;
                BuiltinTypeId::from_name(&format!("complex[{}]", real))
                    .map(Type::builtin)
                    .ok_or_else(|| self.lexer.error(at, format!("complex of {} is not supported", real)))
            }
            "view" => {
                self.expect(Token::LBracket, "'[' after view")?;
                self.expect_keyword("as")?;
                let value = self.parse_type()?;
                self.expect(Token::Comma, "','")?;
                self.expect_keyword("original")?;
                let operand = self.parse_type()?;
                self.expect(Token::RBracket, "']'")?;
                self.build(at, Type::view(value, operand))
            }
            "convert" => {
                self.expect(Token::LBracket, "'[' after convert")?;
                self.expect_keyword("to")?;
                let value = self.parse_type()?;
                self.expect(Token::Comma, "','")?;
                self.expect_keyword("from")?;
                let operand = self.parse_type()?;
                self.expect(Token::RBracket, "']'")?;
                self.build(at, Type::convert(value, operand))
            }
            "property" => {
                self.expect(Token::LBracket, "'[' after property")?;
                self.expect_keyword("operand")?;
                let operand = self.parse_type()?;
                self.expect(Token::Comma, "','")?;
                self.expect_keyword("name")?;
                let property = self.expect_string()?;
                self.expect(Token::RBracket, "']'")?;
                self.build(at, Type::property(&operand, &property))
            }
            _ => {
                if let Some(id) = BuiltinTypeId::from_name(name) {
                    return Ok(Type::builtin(id));
                }
                self.registry
                    .get(name)
                    .ok_or_else(|| self.lexer.error(at, format!("unknown type name '{}'", name)))
            }
        }
    }
}

/// Parse a type string, resolving names through `registry`.
pub fn parse_type_with_registry(input: &str, registry: &TypeRegistry) -> Result<Type> {
    let mut parser = Parser::new(input, registry)?;
    let tp = parser.parse_type()?;
    if parser.current != Token::Eof {
        return Err(parser.error("unexpected trailing input"));
    }
    log::trace!("[types] parsed \"{}\" as {}", input, tp);
    Ok(tp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Type> {
        parse_type_with_registry(s, &TypeRegistry::new())
    }

    fn position(err: Error) -> usize {
        match err {
            Error::TypeParse { position, .. } => position,
            other => panic!("expected a parse error, got {}", other),
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!(parse("int").expect("int"), Type::builtin(BuiltinTypeId::Int32));
        assert_eq!(parse("real").expect("real"), Type::builtin(BuiltinTypeId::Float64));
        assert_eq!(parse("complex").expect("complex"), Type::builtin(BuiltinTypeId::ComplexFloat64));
        assert_eq!(
            parse("complex[float32]").expect("complex"),
            Type::builtin(BuiltinTypeId::ComplexFloat32)
        );
        assert_eq!(parse("string['U16']").expect("string").to_string(), "string['utf16']");
    }

    #[test]
    fn test_whitespace_insensitive() {
        let tp = parse("  3*var *{ a :int8,b: string }  ").expect("parse");
        assert_eq!(tp.to_string(), "3 * var * {a: int8, b: string}");
    }

    #[test]
    fn test_error_positions() {
        assert_eq!(position(parse("3 * flot32").unwrap_err()), 4);
        assert_eq!(position(parse("3 *").unwrap_err()), 3);
        assert_eq!(position(parse("int32 int32").unwrap_err()), 6);
        assert_eq!(position(parse("bytes[6, align=4]").unwrap_err()), 0);
        assert_eq!(position(parse("time[tz='EST']").unwrap_err()), 8);
        assert_eq!(position(parse("string['latin1']").unwrap_err()), 7);
        assert_eq!(position(parse("{a: int8, a: int8}").unwrap_err()), 0);
        assert_eq!(position(parse("'open").unwrap_err()), 0);
        assert_eq!(position(parse("int32 $").unwrap_err()), 6);
    }

    #[test]
    fn test_registered_names() {
        let registry = TypeRegistry::new();
        registry
            .register("pair", parse("{first: int32, second: int32}").expect("struct"))
            .expect("register");
        let tp = parse_type_with_registry("strided * pair", &registry).expect("parse");
        assert_eq!(tp.to_string(), "strided * {first: int32, second: int32}");
        assert!(parse("strided * pair").is_err());
    }

    #[test]
    fn test_expression_syntax() {
        let tp = parse("property[operand=time[tz='UTC'], name='hour']").expect("property");
        assert!(tp.is_expression());
        assert_eq!(tp.value_type(), Type::builtin(BuiltinTypeId::Int32));
        let err = parse("property[operand=time, name='weekday']").unwrap_err();
        assert_eq!(position(err), 0);
        assert!(parse("convert[from=int32, to=float64]").is_err());
    }
}
