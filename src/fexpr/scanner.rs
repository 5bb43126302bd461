use super::{JoinOp, ParseError, SignOp};

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Lexeme {
    Identifier(String),
    /// An identifier immediately followed by `(`; the paren is consumed.
    FunctionStart(String),
    Text(String),
    Number(f64),
    Sign(SignOp),
    Join(JoinOp),
    OpenParen,
    CloseParen,
    Comma,
    Eof,
}

impl Lexeme {
    pub(super) fn describe(&self) -> String {
        match self {
            Self::Identifier(name) => format!("identifier {name:?}"),
            Self::FunctionStart(name) => format!("function {name:?}"),
            Self::Text(text) => format!("text {text:?}"),
            Self::Number(number) => format!("number {number}"),
            Self::Sign(op) => format!("operator {:?}", op.as_str()),
            Self::Join(op) => format!("join {:?}", op.to_string()),
            Self::OpenParen => "'('".to_string(),
            Self::CloseParen => "')'".to_string(),
            Self::Comma => "','".to_string(),
            Self::Eof => "end of expression".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Spanned {
    pub lexeme: Lexeme,
    pub position: usize,
}

pub(super) struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '@' | '#')
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '@' | '#' | '.' | ':')
}

fn is_sign_char(c: char) -> bool {
    matches!(c, '=' | '!' | '<' | '>' | '~' | '?')
}

impl<'a> Scanner<'a> {
    pub(super) fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    pub(super) fn next_lexeme(&mut self) -> Result<Spanned, ParseError> {
        self.skip_whitespace_and_comments();

        let position = self.pos;
        let Some(c) = self.peek() else {
            return Ok(Spanned {
                lexeme: Lexeme::Eof,
                position,
            });
        };

        let lexeme = match c {
            '(' => {
                self.bump();
                Lexeme::OpenParen
            }
            ')' => {
                self.bump();
                Lexeme::CloseParen
            }
            ',' => {
                self.bump();
                Lexeme::Comma
            }
            '\'' | '"' => Lexeme::Text(self.scan_text(c)?),
            '&' | '|' => Lexeme::Join(self.scan_join()?),
            c if is_sign_char(c) => Lexeme::Sign(self.scan_sign()?),
            c if c.is_ascii_digit() => Lexeme::Number(self.scan_number()?),
            '-' if self.peek_second().is_some_and(|n| n.is_ascii_digit()) => {
                Lexeme::Number(self.scan_number()?)
            }
            c if is_identifier_start(c) => {
                let name = self.scan_identifier();
                if self.peek() == Some('(') {
                    self.bump();
                    Lexeme::FunctionStart(name)
                } else {
                    Lexeme::Identifier(name)
                }
            }
            other => {
                return Err(ParseError::new(
                    format!("unexpected character {other:?}"),
                    position,
                ));
            }
        };

        Ok(Spanned { lexeme, position })
    }

    fn scan_identifier(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_identifier_char) {
            self.bump();
        }
        self.input[start..self.pos].to_string()
    }

    fn scan_number(&mut self) -> Result<f64, ParseError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') {
            self.bump();
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return Err(ParseError::new("invalid number, expected digits after '.'", self.pos));
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }

        let raw = &self.input[start..self.pos];
        raw.parse::<f64>()
            .map_err(|_| ParseError::new(format!("invalid number {raw:?}"), start))
    }

    fn scan_text(&mut self, quote: char) -> Result<String, ParseError> {
        let start = self.pos;
        self.bump();

        let mut text = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.peek() {
                    Some(next) if next == quote || next == '\\' => {
                        self.bump();
                        text.push(next);
                    }
                    _ => text.push('\\'),
                },
                Some(c) if c == quote => return Ok(text),
                Some(c) => text.push(c),
                None => return Err(ParseError::new("unterminated text literal", start)),
            }
        }
    }

    fn scan_join(&mut self) -> Result<JoinOp, ParseError> {
        let start = self.pos;
        let first = self.bump();
        let second = self.bump();
        match (first, second) {
            (Some('&'), Some('&')) => Ok(JoinOp::And),
            (Some('|'), Some('|')) => Ok(JoinOp::Or),
            _ => Err(ParseError::new(
                format!("unexpected character {:?}, expected && or ||", first.unwrap_or('&')),
                start,
            )),
        }
    }

    fn scan_sign(&mut self) -> Result<SignOp, ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(is_sign_char) {
            self.bump();
        }
        self.input[start..self.pos]
            .parse::<SignOp>()
            .map_err(|err| ParseError::new(err.to_string(), start))
    }
}
