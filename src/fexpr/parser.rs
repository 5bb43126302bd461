use super::scanner::{Lexeme, Scanner, Spanned};
use super::{Expr, ExprGroup, ExprItem, JoinOp, ParseError, Token};

/// Recursive descent over the scanner with a single lexeme of lookahead.
pub(super) struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Spanned,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut scanner = Scanner::new(input);
        let current = scanner.next_lexeme()?;
        Ok(Self { scanner, current })
    }

    pub(super) fn parse(input: &'a str) -> Result<Vec<ExprGroup>, ParseError> {
        let mut parser = Self::new(input)?;
        if parser.current.lexeme == Lexeme::Eof {
            return Ok(Vec::new());
        }

        let groups = parser.parse_groups()?;
        match &parser.current.lexeme {
            Lexeme::Eof => Ok(groups),
            other => Err(parser.unexpected(other, "&& or ||")),
        }
    }

    fn advance(&mut self) -> Result<Spanned, ParseError> {
        let next = self.scanner.next_lexeme()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn unexpected(&self, lexeme: &Lexeme, expected: &str) -> ParseError {
        ParseError::new(
            format!("unexpected {}, expected {expected}", lexeme.describe()),
            self.current.position,
        )
    }

    fn parse_groups(&mut self) -> Result<Vec<ExprGroup>, ParseError> {
        let mut groups = Vec::new();
        let mut join = JoinOp::And;

        loop {
            let item = self.parse_item()?;
            groups.push(ExprGroup { join, item });

            match self.current.lexeme {
                Lexeme::Join(next) => {
                    join = next;
                    self.advance()?;
                }
                _ => return Ok(groups),
            }
        }
    }

    fn parse_item(&mut self) -> Result<ExprItem, ParseError> {
        if self.current.lexeme == Lexeme::OpenParen {
            let open = self.advance()?;
            if self.current.lexeme == Lexeme::CloseParen {
                return Err(ParseError::new("empty group", open.position));
            }

            let inner = self.parse_groups()?;
            if self.current.lexeme != Lexeme::CloseParen {
                return Err(self.unexpected(&self.current.lexeme, "')'"));
            }
            self.advance()?;
            return Ok(ExprItem::Group(inner));
        }

        let left = self.parse_operand()?;
        let op = match self.current.lexeme {
            Lexeme::Sign(op) => op,
            ref other => return Err(self.unexpected(other, "comparison operator")),
        };
        self.advance()?;
        let right = self.parse_operand()?;

        Ok(ExprItem::Expr(Expr { left, op, right }))
    }

    fn parse_operand(&mut self) -> Result<Token, ParseError> {
        if let Lexeme::Eof
        | Lexeme::Sign(_)
        | Lexeme::Join(_)
        | Lexeme::OpenParen
        | Lexeme::CloseParen
        | Lexeme::Comma = self.current.lexeme
        {
            return Err(self.unexpected(&self.current.lexeme, "operand"));
        }

        match self.advance()?.lexeme {
            Lexeme::Identifier(name) => Ok(Token::Identifier(name)),
            Lexeme::Text(text) => Ok(Token::Text(text)),
            Lexeme::Number(number) => Ok(Token::Number(number)),
            Lexeme::FunctionStart(name) => {
                let args = self.parse_function_args()?;
                Ok(Token::Function { name, args })
            }
            // rejected above
            other => Err(ParseError::new(
                format!("unexpected {}", other.describe()),
                self.current.position,
            )),
        }
    }

    fn parse_function_args(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut args = Vec::new();
        if self.current.lexeme == Lexeme::CloseParen {
            self.advance()?;
            return Ok(args);
        }

        loop {
            args.push(self.parse_operand()?);
            match self.current.lexeme {
                Lexeme::Comma => {
                    self.advance()?;
                }
                Lexeme::CloseParen => {
                    self.advance()?;
                    return Ok(args);
                }
                ref other => return Err(self.unexpected(other, "',' or ')'")),
            }
        }
    }
}
