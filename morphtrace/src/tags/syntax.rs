use std::borrow::Cow;

use chumsky::input::SpannedInput;
use chumsky::prelude::*;

use super::lexer::{Span, Token};

/// Parsed selector, borrowing tags from the source
#[derive(Clone, Debug, PartialEq)]
pub enum Expr<'src> {
    Tag(Cow<'src, str>),
    All(Vec<Cow<'src, str>>),
    Any(Vec<Cow<'src, str>>),
    Not(Box<Expr<'src>>),
    And(Box<Expr<'src>>, Box<Expr<'src>>),
    Or(Box<Expr<'src>>, Box<Expr<'src>>),
}

pub type Spanned<T> = (T, Span);

type ParserInput<'tokens, 'src> = SpannedInput<Token<'src>, Span, &'tokens [(Token<'src>, Span)]>;

type ParserError<'tokens, 'src> = extra::Err<Rich<'tokens, Token<'src>, Span>>;

/// Resolve the backslash escapes of a quoted tag
fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\\') {
        return Cow::Borrowed(raw);
    }
    let mut tag = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => tag.extend(chars.next()),
            c => tag.push(c),
        }
    }
    Cow::Owned(tag)
}

/// Selector grammar, loosest binding first:
///
/// ```text
/// or   := and (("OR" | "|" | "||") and)*
/// and  := not (("AND" | "&" | "&&") not)*
/// not  := ("NOT" | "!" | "~")* atom
/// atom := TAG | "ALL" "{" TAG ("," TAG)* "}" | "ANY" "{" ... "}" | "(" or ")"
/// ```
pub fn parser<'tokens, 'src: 'tokens>(
) -> impl Parser<'tokens, ParserInput<'tokens, 'src>, Spanned<Expr<'src>>, ParserError<'tokens, 'src>> + Clone {
    recursive(|expr| {
        let tag = select! {
            Token::Tag(tag) => Cow::Borrowed(tag),
            Token::Quoted(tag) => unescape(tag),
        }
        .labelled("tag");

        let tag_list = tag
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .labelled("tag list");

        let all_of = just(Token::All).ignore_then(tag_list.clone()).map(Expr::All);
        let any_of = just(Token::Any).ignore_then(tag_list).map(Expr::Any);

        let atom = choice((
            all_of,
            any_of,
            tag.map(Expr::Tag),
            expr.delimited_by(just(Token::LParen), just(Token::RParen)),
        ))
        .labelled("selector")
        .boxed();

        let not = just(Token::Not)
            .repeated()
            .collect::<Vec<_>>()
            .then(atom)
            .map(|(nots, arg)| nots.iter().fold(arg, |arg, _| Expr::Not(Box::new(arg))))
            .boxed();

        let and = not
            .clone()
            .then(just(Token::And).ignore_then(not).repeated().collect::<Vec<_>>())
            .map(|(lhs, rest)| {
                rest.into_iter()
                    .fold(lhs, |lhs, rhs| Expr::And(Box::new(lhs), Box::new(rhs)))
            })
            .boxed();

        and.clone()
            .then(just(Token::Or).ignore_then(and).repeated().collect::<Vec<_>>())
            .map(|(lhs, rest)| {
                rest.into_iter()
                    .fold(lhs, |lhs, rhs| Expr::Or(Box::new(lhs), Box::new(rhs)))
            })
            .boxed()
    })
    .map_with(|expr, e| (expr, e.span()))
}

#[cfg(test)]
mod tests {
    use super::super::lexer::lexer;
    use super::*;

    fn tag(tag: &str) -> Box<Expr<'_>> {
        Box::new(Expr::Tag(tag.into()))
    }

    fn parse(src: &str) -> Expr<'_> {
        let tokens = lexer().parse(src).into_result().unwrap();
        let (expr, _) = parser()
            .parse(tokens.as_slice().spanned((src.len()..src.len()).into()))
            .into_result()
            .unwrap();
        expr
    }

    #[test]
    fn precedence() {
        use Expr::*;
        assert_eq!(
            parse("a | b & !c"),
            Or(tag("a"), Box::new(And(tag("b"), Box::new(Not(tag("c")))))),
        );
        assert_eq!(parse("(a OR b) AND c"), And(Box::new(Or(tag("a"), tag("b"))), tag("c")));
        assert_eq!(parse("NOT NOT a"), Not(Box::new(Not(tag("a")))));
    }

    #[test]
    fn tag_lists() {
        assert_eq!(parse("ALL{Voltage,SIM1}"), Expr::All(vec!["Voltage".into(), "SIM1".into()]));
        assert_eq!(parse("ANY{ a , b, }"), Expr::Any(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn quoted_tags_are_unescaped() {
        assert_eq!(parse(r#""plain""#), *tag("plain"));
        assert_eq!(parse(r#""say \"hi\" \\o/""#), *tag(r#"say "hi" \o/"#));
        assert_eq!(unescape(r"a\\b"), "a\\b");
    }
}
