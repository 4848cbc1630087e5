use std::fmt;

use chumsky::prelude::*;

pub(crate) type Span = SimpleSpan<usize>;
pub(crate) type Output<'a> = Vec<(Token<'a>, Span)>;
pub(crate) type Error<'a> = extra::Err<Rich<'a, char, Span>>;

#[derive(Clone, Debug, PartialEq)]
pub enum Token<'src> {
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    All,
    Any,
    Not,
    And,
    Or,
    Tag(&'src str),
    /// Contents of a quoted tag, with escapes (`\"`, `\\`) still in place
    Quoted(&'src str),
}

impl<'src> fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::All => write!(f, "ALL"),
            Token::Any => write!(f, "ANY"),
            Token::Not => write!(f, "NOT"),
            Token::And => write!(f, "AND"),
            Token::Or => write!(f, "OR"),
            Token::Tag(tag) => write!(f, "{}", tag),
            Token::Quoted(tag) => write!(f, "\"{}\"", tag),
        }
    }
}

/// Characters that may appear in an unquoted tag.
///
/// Anything that isn't whitespace, a delimiter, or an operator symbol. This keeps
/// conventions like `SECTION:soma` or `POSTCELL:cell-1` usable without quotes.
pub(crate) fn is_tag_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '{' | '}' | '(' | ')' | ',' | '!' | '~' | '&' | '|' | '"' | '\u{00ac}')
}

pub fn lexer<'src>() -> impl Parser<'src, &'src str, Output<'src>, Error<'src>> {
    // A parser for control characters (delimiters and separators)
    let ctrl = choice((
        just('{').to(Token::LBrace),
        just('}').to(Token::RBrace),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just(',').to(Token::Comma),
    ))
    .labelled("control token");

    // Lexer for operator symbols
    let op = choice((
        just("&&").to(Token::And),
        just("&").to(Token::And),
        just("||").to(Token::Or),
        just("|").to(Token::Or),
        just("!").to(Token::Not),
        just("~").to(Token::Not),
        just("\u{00ac}").to(Token::Not), // ¬
    ))
    .labelled("operator token");

    // Quoted tags may contain any character; `"` and `\` are escaped with a backslash
    let escape = just('\\').then(one_of("\\\"")).ignored();
    let quoted_tag = just('"')
        .ignore_then(choice((escape, none_of("\\\"").ignored())).repeated().to_slice())
        .then_ignore(just('"'))
        .map(Token::Quoted)
        .labelled("quoted tag");

    // A parser for tags and keywords
    let tag = any()
        .filter(|c: &char| is_tag_char(*c))
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|tag: &str| match tag {
            "ALL" => Token::All,
            "ANY" => Token::Any,
            "NOT" => Token::Not,
            "AND" => Token::And,
            "OR" => Token::Or,
            _ => Token::Tag(tag),
        })
        .labelled("tag");

    // A single token can be one of the above
    let token = choice((op, ctrl, quoted_tag, tag)).boxed();

    token
        .map_with(|tok, e| (tok, e.span()))
        .padded()
        // If we encounter an error, skip and attempt to lex the next character as a token instead
        .recover_with(skip_then_retry_until(any().ignored(), end()))
        .repeated()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_test() {
        use Token::*;
        let cases = [
            ("Voltage", vec![(Tag("Voltage"), Span::new(0, 7))]),
            (
                "ALL{A, B}",
                vec![
                    (All, Span::new(0, 3)),
                    (LBrace, Span::new(3, 4)),
                    (Tag("A"), Span::new(4, 5)),
                    (Comma, Span::new(5, 6)),
                    (Tag("B"), Span::new(7, 8)),
                    (RBrace, Span::new(8, 9)),
                ],
            ),
            (
                "!SECTION:soma || \"my tag\"",
                vec![
                    (Not, Span::new(0, 1)),
                    (Tag("SECTION:soma"), Span::new(1, 13)),
                    (Or, Span::new(14, 16)),
                    (Quoted("my tag"), Span::new(17, 25)),
                ],
            ),
            (
                r#""say \"hi\"""#,
                vec![(Quoted(r#"say \"hi\""#), Span::new(0, 12))],
            ),
        ];

        for (input, expected) in cases {
            let actual = lexer().parse(input).into_result().unwrap();
            assert_eq!(actual, expected);
        }
    }
}
