//! Tags and tag selectors
//!
//! Traces and event sets carry a set of free-form string tags, for example `Voltage`,
//! `SECTION:soma` or `POSTCELL:cell1`. A [`TagSelector`] is a small boolean query over
//! such tags:
//!
//! ```text
//! Voltage                          # has the tag `Voltage`
//! ALL{Voltage, SIM1}               # has every listed tag
//! ANY{SECTION:soma, SECTION:axon}  # has at least one listed tag
//! Voltage AND NOT SIM1             # boolean combinations, also `&`, `|`, `!`
//! "tag with spaces"                # quoted tags
//! "say \"hi\""                     # `\"` and `\\` escape inside quotes
//! ```
//!
//! Keywords are upper case; a lower case `all` is a tag like any other.
mod lexer;
mod syntax;

use core::fmt;
use core::str::FromStr;
use std::borrow::Cow;

use chumsky::prelude::Rich;
use itertools::Itertools;

use self::lexer::{is_tag_char, lexer};
use self::syntax::{parser, Expr};
use crate::{Error, TraceResult};

/// An insertion-ordered set of tags
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<String>,
}

impl TagSet {
    /// An empty tag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag, returning `false` if it was already present
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.contains(&tag) {
            false
        } else {
            self.tags.push(tag);
            true
        }
    }

    /// Add all the given tags
    pub fn extend<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            self.insert(tag);
        }
    }

    /// Remove a tag, returning `false` if it was not present
    pub fn remove(&mut self, tag: &str) -> bool {
        match self.tags.iter().position(|t| t == tag) {
            Some(idx) => {
                self.tags.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.tags.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut tags = TagSet::new();
        tags.extend(iter);
        tags
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tags.iter().join(","))
    }
}

/// Anything that carries tags and can therefore be picked by a [`TagSelector`]
pub trait Tagged {
    fn tags(&self) -> &TagSet;
}

/// A boolean query over tags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// The tag is present
    Tag(String),
    /// Every listed tag is present
    All(Vec<String>),
    /// At least one listed tag is present
    Any(Vec<String>),
    /// The argument does not match
    Not(Box<Selector>),
    /// Both arguments match
    And(Box<Selector>, Box<Selector>),
    /// Either argument matches
    Or(Box<Selector>, Box<Selector>),
}

impl Selector {
    fn matches(&self, tags: &TagSet) -> bool {
        match self {
            Selector::Tag(tag) => tags.contains(tag),
            Selector::All(list) => list.iter().all(|tag| tags.contains(tag)),
            Selector::Any(list) => list.iter().any(|tag| tags.contains(tag)),
            Selector::Not(arg) => !arg.matches(tags),
            Selector::And(lhs, rhs) => lhs.matches(tags) && rhs.matches(tags),
            Selector::Or(lhs, rhs) => lhs.matches(tags) || rhs.matches(tags),
        }
    }
}

impl<'src> From<Expr<'src>> for Selector {
    fn from(expr: Expr<'src>) -> Self {
        let owned = |list: Vec<Cow<'_, str>>| list.into_iter().map(Cow::into_owned).collect();
        match expr {
            Expr::Tag(tag) => Selector::Tag(tag.into_owned()),
            Expr::All(list) => Selector::All(owned(list)),
            Expr::Any(list) => Selector::Any(owned(list)),
            Expr::Not(arg) => Selector::Not(Box::new((*arg).into())),
            Expr::And(lhs, rhs) => Selector::And(Box::new((*lhs).into()), Box::new((*rhs).into())),
            Expr::Or(lhs, rhs) => Selector::Or(Box::new((*lhs).into()), Box::new((*rhs).into())),
        }
    }
}

struct DisplayTag<'a>(&'a str);

impl fmt::Display for DisplayTag<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = matches!(self.0, "ALL" | "ANY" | "NOT" | "AND" | "OR");
        if keyword || self.0.is_empty() || !self.0.chars().all(is_tag_char) {
            write!(f, "\"{}\"", self.0.replace('\\', "\\\\").replace('"', "\\\""))
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Tag(tag) => write!(f, "{}", DisplayTag(tag)),
            Selector::All(list) => write!(f, "ALL{{{}}}", list.iter().map(|t| DisplayTag(t)).join(",")),
            Selector::Any(list) => write!(f, "ANY{{{}}}", list.iter().map(|t| DisplayTag(t)).join(",")),
            Selector::Not(arg) => write!(f, "NOT ({})", arg),
            Selector::And(lhs, rhs) => write!(f, "({}) AND ({})", lhs, rhs),
            Selector::Or(lhs, rhs) => write!(f, "({}) OR ({})", lhs, rhs),
        }
    }
}

/// A parsed tag query, used to pick traces and event sets by their tags.
#[derive(Clone, Debug, PartialEq, Eq, derive_more::Display)]
#[display(fmt = "{}", root)]
pub struct TagSelector {
    root: Selector,
}

impl TagSelector {
    /// Parse a selector, reporting the first problem found.
    ///
    /// Use [`parse_str`] to get every diagnostic for reporting.
    pub fn from_string(src: &str) -> TraceResult<Self> {
        parse_str(src).map_err(|errors| {
            // parse_str never fails without at least one error
            let err = &errors[0];
            let span = err.span();
            let fragment = match src.get(span.start..span.end) {
                Some("") | None => "end of input".to_string(),
                Some(fragment) => fragment.to_string(),
            };
            Error::InvalidSelector {
                selector: src.to_string(),
                fragment,
                start: span.start,
                end: span.end,
                reason: err.to_string(),
            }
        })
    }

    /// The root of the query
    pub fn root(&self) -> &Selector {
        &self.root
    }

    /// Check if the tags of `item` satisfy the selector
    pub fn is_match<T: Tagged + ?Sized>(&self, item: &T) -> bool {
        self.matches_tags(item.tags())
    }

    /// Check if `tags` satisfy the selector
    pub fn matches_tags(&self, tags: &TagSet) -> bool {
        self.root.matches(tags)
    }

    /// Keep the items that match, in their original order
    pub fn select<'a, T, I>(&self, items: I) -> Vec<&'a T>
    where
        T: Tagged + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        items.into_iter().filter(|item| self.is_match(*item)).collect()
    }
}

impl From<Selector> for TagSelector {
    fn from(root: Selector) -> Self {
        Self { root }
    }
}

impl FromStr for TagSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

/// Parse a tag selector, collecting all lexing and parsing diagnostics.
pub fn parse_str(src: &str) -> Result<TagSelector, Vec<Rich<'_, String>>> {
    use chumsky::prelude::{end, Input, Parser};

    let (tokens, lex_errors) = lexer().parse(src).into_output_errors();
    log::debug!("** Tokens output **");
    log::debug!("{:#?}", tokens);
    log::debug!("** Lexing Errors: {} **", lex_errors.len());
    log::debug!("\n{}", lex_errors.iter().map(|e| e.to_string()).join("\n"));

    let (parsed, parse_errors) = if let Some(tokens) = &tokens {
        parser()
            .then_ignore(end())
            .parse(tokens.as_slice().spanned((src.len()..src.len()).into()))
            .into_output_errors()
    } else {
        (None, Vec::new())
    };

    log::debug!("** Parse output **");
    log::debug!("{:#?}", parsed);
    log::debug!("** Parse Errors: {}**", parse_errors.len());
    log::debug!("\n{}", parse_errors.iter().map(|e| e.to_string()).join("\n"));

    let errors: Vec<_> = lex_errors
        .into_iter()
        .map(|e| e.map_token(|c| c.to_string()))
        .chain(parse_errors.into_iter().map(|e| e.map_token(|tok| tok.to_string())))
        .map(|e| e.into_owned())
        .collect();
    log::debug!("** Total Errors: {}**", errors.len());

    match parsed {
        Some((expr, _)) if errors.is_empty() => Ok(TagSelector { root: expr.into() }),
        _ if errors.is_empty() => Err(vec![Rich::custom((src.len()..src.len()).into(), "empty selector")]),
        _ => Err(errors),
    }
}
