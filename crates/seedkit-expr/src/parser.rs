use serde_json::Value;

use crate::errors::ExprError;
use crate::lexer::{Token, tokenize};

/// Maximum depth of the expression tree. Sub-expressions, operator chains,
/// unary operators, parentheses, arrays and calls all count towards it.
pub const MAX_DEPTH: usize = 64;

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Array(Vec<Expr>),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Parse a complete expression; trailing tokens are an error.
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expr()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(unexpected(other, "end of input")),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat_sym(&mut self, sym: &str) -> bool {
        if matches!(self.peek(), Token::Sym(found) if *found == sym) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expect_sym(&mut self, sym: &'static str) -> Result<(), ExprError> {
        if self.eat_sym(sym) {
            return Ok(());
        }
        Err(unexpected(self.peek(), &format!("'{sym}'")))
    }

    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        self.descend()?;
        let expr = self.parse_conditional();
        self.depth -= 1;
        expr
    }

    fn parse_conditional(&mut self) -> Result<Expr, ExprError> {
        let condition = self.parse_or()?;
        if !self.eat_sym("?") {
            return Ok(condition);
        }
        let when_true = self.parse_expr()?;
        self.expect_sym(":")?;
        let when_false = self.parse_expr()?;
        Ok(Expr::Conditional(
            Box::new(condition),
            Box::new(when_true),
            Box::new(when_false),
        ))
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut left = self.parse_and()?;
        while self.eat_sym("||") {
            self.descend()?;
            let right = self.parse_and()?;
            left = Expr::Logical(LogicalOp::Or, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut left = self.parse_equality()?;
        while self.eat_sym("&&") {
            self.descend()?;
            let right = self.parse_equality()?;
            left = Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut left = self.parse_comparison()?;
        loop {
            let op = if self.eat_sym("==") {
                BinaryOp::Eq
            } else if self.eat_sym("!=") {
                BinaryOp::Ne
            } else {
                break;
            };
            self.descend()?;
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.eat_sym("<=") {
                BinaryOp::Le
            } else if self.eat_sym(">=") {
                BinaryOp::Ge
            } else if self.eat_sym("<") {
                BinaryOp::Lt
            } else if self.eat_sym(">") {
                BinaryOp::Gt
            } else {
                break;
            };
            self.descend()?;
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.eat_sym("+") {
                BinaryOp::Add
            } else if self.eat_sym("-") {
                BinaryOp::Sub
            } else {
                break;
            };
            self.descend()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.eat_sym("*") {
                BinaryOp::Mul
            } else if self.eat_sym("/") {
                BinaryOp::Div
            } else if self.eat_sym("%") {
                BinaryOp::Rem
            } else {
                break;
            };
            self.descend()?;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        self.descend()?;

        let expr = if self.eat_sym("-") {
            self.parse_unary()
                .map(|operand| Expr::Unary(UnaryOp::Neg, Box::new(operand)))
        } else if self.eat_sym("!") {
            self.parse_unary()
                .map(|operand| Expr::Unary(UnaryOp::Not, Box::new(operand)))
        } else {
            self.parse_postfix()
        };

        self.depth -= 1;
        expr
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            if matches!(self.peek(), Token::Sym(".") | Token::Sym("[")) {
                self.descend()?;
            }
            if self.eat_sym(".") {
                let property = match self.bump() {
                    Token::Ident(name) => name,
                    Token::Int(index) => index.to_string(),
                    other => return Err(unexpected(&other, "property name")),
                };
                expr = Expr::Member(Box::new(expr), property);
                continue;
            }
            if self.eat_sym("[") {
                let index = self.parse_expr()?;
                self.expect_sym("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
                continue;
            }
            break;
        }
        self.depth = depth;
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.bump() {
            Token::Int(value) => Ok(Expr::Literal(Value::from(value))),
            Token::Float(value) => serde_json::Number::from_f64(value)
                .map(|number| Expr::Literal(Value::Number(number)))
                .ok_or_else(|| ExprError::InvalidNumber(value.to_string())),
            Token::Str(value) => Ok(Expr::Literal(Value::String(value))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                _ if self.eat_sym("(") => {
                    let args = self.parse_list(")")?;
                    Ok(Expr::Call(name, args))
                }
                _ => Ok(Expr::Ident(name)),
            },
            Token::Sym("(") => {
                let inner = self.parse_expr()?;
                self.expect_sym(")")?;
                Ok(inner)
            }
            Token::Sym("[") => self.parse_list("]").map(Expr::Array),
            other => Err(unexpected(&other, "expression")),
        }
    }

    /// Comma-separated expressions up to `close`; the opening symbol is consumed.
    fn parse_list(&mut self, close: &'static str) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        if self.eat_sym(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expr()?);
            if self.eat_sym(close) {
                return Ok(items);
            }
            self.expect_sym(",")?;
        }
    }
}

fn unexpected(found: &Token, expected: &str) -> ExprError {
    ExprError::UnexpectedToken {
        found: found.to_string(),
        expected: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse("a + b * 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                ident("a"),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    ident("b"),
                    Box::new(Expr::Literal(json!(2)))
                ))
            )
        );
    }

    #[test]
    fn member_index_and_call_chains() {
        let expr = parse("upper(this.tags[0])").unwrap();
        assert_eq!(
            expr,
            Expr::Call(
                "upper".to_string(),
                vec![Expr::Index(
                    Box::new(Expr::Member(ident("this"), "tags".to_string())),
                    Box::new(Expr::Literal(json!(0)))
                )]
            )
        );
    }

    #[test]
    fn conditional_is_right_associative() {
        let expr = parse("a ? 1 : b ? 2 : 3").unwrap();
        let Expr::Conditional(_, _, otherwise) = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*otherwise, Expr::Conditional(..)));
    }

    #[test]
    fn rejects_trailing_tokens_and_empty_input() {
        assert!(matches!(
            parse("a b"),
            Err(ExprError::UnexpectedToken { .. })
        ));
        assert!(matches!(parse(""), Err(ExprError::UnexpectedToken { .. })));
        assert!(matches!(parse("(a"), Err(ExprError::UnexpectedToken { .. })));
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let source = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert_eq!(parse(&source), Err(ExprError::TooDeep(MAX_DEPTH)));

        let source = "-".repeat(MAX_DEPTH + 1) + "1";
        assert_eq!(parse(&source), Err(ExprError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn long_operator_chains_are_bounded() {
        let source = vec!["1"; 300_000].join(" + ");
        assert_eq!(parse(&source), Err(ExprError::TooDeep(MAX_DEPTH)));

        let source = vec!["a"; 300_000].join(" || ");
        assert_eq!(parse(&source), Err(ExprError::TooDeep(MAX_DEPTH)));

        let source = vec!["1"; 300_000].join(" * ");
        assert_eq!(parse(&source), Err(ExprError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn long_member_chains_are_bounded() {
        let source = format!("this{}", ".a".repeat(300_000));
        assert_eq!(parse(&source), Err(ExprError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn nested_conditionals_are_bounded() {
        let source = format!("{}1{}", "1 ? ".repeat(200_000), " : 1".repeat(200_000));
        assert_eq!(parse(&source), Err(ExprError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn ordinary_chains_still_parse() {
        let source = vec!["this.a"; 20].join(" + ");
        assert!(parse(&source).is_ok());
        assert!(parse("a ? b ? 1 : 2 : c ? 3 : 4").is_ok());
    }
}
