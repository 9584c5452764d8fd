use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::errors::ExprError;

/// Lexical token of the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Sym(&'static str),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(value) => write!(f, "number {value}"),
            Token::Float(value) => write!(f, "number {value}"),
            Token::Str(value) => write!(f, "string '{value}'"),
            Token::Ident(name) => write!(f, "identifier '{name}'"),
            Token::Sym(sym) => write!(f, "'{sym}'"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

const TWO_CHAR_SYMBOLS: &[&str] = &["==", "!=", "<=", ">=", "&&", "||"];
const ONE_CHAR_SYMBOLS: &[&str] = &[
    "+", "-", "*", "/", "%", "<", ">", "!", "(", ")", "[", "]", ".", ",", "?", ":",
];

/// Split `source` into tokens, always terminated by [`Token::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch.is_ascii_digit() {
            // After a member dot only an integer index is valid: `grid.1.0`.
            let allow_fraction = !matches!(tokens.last(), Some(Token::Sym(".")));
            tokens.push(lex_number(source, &mut chars, allow_fraction)?);
            continue;
        }

        if ch == '\'' || ch == '"' {
            tokens.push(lex_string(&mut chars, offset)?);
            continue;
        }

        if is_ident_start(ch) {
            let mut name = String::new();
            while let Some(&(_, next)) = chars.peek() {
                if !is_ident_continue(next) {
                    break;
                }
                name.push(next);
                chars.next();
            }
            tokens.push(Token::Ident(name));
            continue;
        }

        let rest = &source[offset..];
        if let Some(sym) = TWO_CHAR_SYMBOLS.iter().find(|sym| rest.starts_with(**sym)) {
            chars.next();
            chars.next();
            tokens.push(Token::Sym(*sym));
            continue;
        }
        if let Some(sym) = ONE_CHAR_SYMBOLS.iter().find(|sym| rest.starts_with(**sym)) {
            chars.next();
            tokens.push(Token::Sym(*sym));
            continue;
        }

        return Err(ExprError::UnexpectedChar { ch, offset });
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

fn lex_number(
    source: &str,
    chars: &mut Peekable<CharIndices<'_>>,
    allow_fraction: bool,
) -> Result<Token, ExprError> {
    let start = chars.peek().map(|(offset, _)| *offset).unwrap_or(source.len());
    let mut end = start;
    let mut is_float = false;

    while let Some(&(offset, ch)) = chars.peek() {
        if ch.is_ascii_digit() {
            end = offset + 1;
            chars.next();
            continue;
        }
        // A dot only belongs to the number when a digit follows it.
        if ch == '.'
            && allow_fraction
            && !is_float
            && source[offset + 1..]
                .chars()
                .next()
                .is_some_and(|next| next.is_ascii_digit())
        {
            is_float = true;
            end = offset + 1;
            chars.next();
            continue;
        }
        break;
    }

    let literal = &source[start..end];
    if !is_float && let Ok(value) = literal.parse::<i64>() {
        return Ok(Token::Int(value));
    }
    literal
        .parse::<f64>()
        .map(Token::Float)
        .map_err(|_| ExprError::InvalidNumber(literal.to_string()))
}

fn lex_string(chars: &mut Peekable<CharIndices<'_>>, start: usize) -> Result<Token, ExprError> {
    let Some((_, quote)) = chars.next() else {
        return Err(ExprError::UnterminatedString(start));
    };
    let mut value = String::new();

    while let Some((_, ch)) = chars.next() {
        if ch == quote {
            return Ok(Token::Str(value));
        }
        if ch == '\\' {
            let Some((_, escaped)) = chars.next() else {
                break;
            };
            value.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            continue;
        }
        value.push(ch);
    }

    Err(ExprError::UnterminatedString(start))
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_member_access_and_concatenation() {
        let tokens = tokenize("this.firstName + ' ' + this.name").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("this".into()),
                Token::Sym("."),
                Token::Ident("firstName".into()),
                Token::Sym("+"),
                Token::Str(" ".into()),
                Token::Sym("+"),
                Token::Ident("this".into()),
                Token::Sym("."),
                Token::Ident("name".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn numbers_and_dotted_indexes() {
        assert_eq!(
            tokenize("1.5 * 2").unwrap(),
            vec![Token::Float(1.5), Token::Sym("*"), Token::Int(2), Token::Eof]
        );
        assert_eq!(
            tokenize("tags.0").unwrap(),
            vec![
                Token::Ident("tags".into()),
                Token::Sym("."),
                Token::Int(0),
                Token::Eof
            ]
        );
    }

    #[test]
    fn numeric_members_do_not_become_decimals() {
        assert_eq!(
            tokenize("grid.1.0").unwrap(),
            vec![
                Token::Ident("grid".into()),
                Token::Sym("."),
                Token::Int(1),
                Token::Sym("."),
                Token::Int(0),
                Token::Eof
            ]
        );
        assert_eq!(
            tokenize("2.5 + x.1").unwrap(),
            vec![
                Token::Float(2.5),
                Token::Sym("+"),
                Token::Ident("x".into()),
                Token::Sym("."),
                Token::Int(1),
                Token::Eof
            ]
        );
    }

    #[test]
    fn two_char_symbols_win() {
        assert_eq!(
            tokenize("a>=b").unwrap(),
            vec![
                Token::Ident("a".into()),
                Token::Sym(">="),
                Token::Ident("b".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            tokenize(r#""it\'s \"x\"\n""#).unwrap(),
            vec![Token::Str("it's \"x\"\n".into()), Token::Eof]
        );
    }

    #[test]
    fn rejects_unknown_characters_and_open_strings() {
        assert!(matches!(
            tokenize("a = b"),
            Err(ExprError::UnexpectedChar { ch: '=', offset: 2 })
        ));
        assert!(matches!(
            tokenize("'open"),
            Err(ExprError::UnterminatedString(0))
        ));
    }
}
