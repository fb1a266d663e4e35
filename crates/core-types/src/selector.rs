//! Coarse structural hints.
//!
//! A small CSS-like subset: compound selectors made of an optional tag (or `*`,
//! or `:scope`), `#id`, `.class`, `[attr]` and `[attr=value]` tests, joined by
//! descendant (whitespace) or child (`>`) combinators. Matching is left to the
//! host tree.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected character '{found}' at offset {offset} in `{source_text}`")]
    Unexpected {
        found: char,
        offset: usize,
        source_text: String,
    },
    #[error("unterminated attribute test in `{0}`")]
    UnterminatedAttribute(String),
    #[error("dangling combinator in `{0}`")]
    DanglingCombinator(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Combinator {
    Descendant,
    Child,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttrTest {
    pub name: String,
    pub value: Option<String>,
}

/// One compound step, e.g. `div.tweet[data-user-id]`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Compound {
    /// `:scope` anchors the step to the node the query runs from.
    pub scope: bool,
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrTest>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        !self.scope
            && self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Selector {
    /// Steps left to right; the combinator of a step links it to the previous one.
    /// The first step's combinator is always `Descendant` and carries no meaning.
    steps: Vec<(Combinator, Compound)>,
    source: String,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        Parser::new(source).parse()
    }

    pub fn steps(&self) -> &[(Combinator, Compound)] {
        &self.steps
    }

    /// The rightmost compound, which the candidate node itself must satisfy.
    pub fn subject(&self) -> &Compound {
        // Parser guarantees at least one step.
        &self.steps[self.steps.len() - 1].1
    }

    pub fn is_scoped(&self) -> bool {
        self.steps.first().map(|(_, c)| c.scope).unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<Selector, SelectorError> {
        let mut steps = Vec::new();
        let mut pending = Combinator::Descendant;
        self.skip_ws();
        if self.at_end() {
            return Err(SelectorError::Empty);
        }
        loop {
            let compound = self.compound()?;
            if compound.is_empty() {
                return Err(self.unexpected());
            }
            steps.push((pending, compound));

            let had_ws = self.skip_ws();
            if self.at_end() {
                break;
            }
            if self.peek() == Some('>') {
                self.pos += 1;
                self.skip_ws();
                if self.at_end() {
                    return Err(SelectorError::DanglingCombinator(self.source.to_string()));
                }
                pending = Combinator::Child;
            } else if had_ws {
                pending = Combinator::Descendant;
            } else {
                return Err(self.unexpected());
            }
        }
        Ok(Selector {
            steps,
            source: self.source.trim().to_string(),
        })
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        if self.eat_str(":scope") {
            compound.scope = true;
        } else if self.peek() == Some('*') {
            self.pos += 1;
        } else if self.peek().map(is_ident_char).unwrap_or(false) {
            compound.tag = Some(self.ident().to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    let id = self.ident();
                    if id.is_empty() {
                        return Err(self.unexpected());
                    }
                    compound.id = Some(id);
                }
                Some('.') => {
                    self.pos += 1;
                    let class = self.ident();
                    if class.is_empty() {
                        return Err(self.unexpected());
                    }
                    compound.classes.push(class);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attr()?);
                }
                _ => break,
            }
        }
        Ok(compound)
    }

    fn attr(&mut self) -> Result<AttrTest, SelectorError> {
        self.skip_ws();
        let name = self.ident();
        if name.is_empty() {
            return Err(self.unexpected());
        }
        self.skip_ws();
        let value = match self.peek() {
            Some('=') => {
                self.pos += 1;
                self.skip_ws();
                Some(self.attr_value()?)
            }
            Some(']') => None,
            None => {
                return Err(SelectorError::UnterminatedAttribute(
                    self.source.to_string(),
                ))
            }
            Some(_) => return Err(self.unexpected()),
        };
        self.skip_ws();
        if self.peek() != Some(']') {
            return Err(SelectorError::UnterminatedAttribute(
                self.source.to_string(),
            ));
        }
        self.pos += 1;
        Ok(AttrTest { name, value })
    }

    fn attr_value(&mut self) -> Result<String, SelectorError> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == quote {
                        let value: String = self.chars[start..self.pos].iter().collect();
                        self.pos += 1;
                        return Ok(value);
                    }
                    self.pos += 1;
                }
                Err(SelectorError::UnterminatedAttribute(
                    self.source.to_string(),
                ))
            }
            _ => {
                let value = self.ident();
                if value.is_empty() {
                    return Err(self.unexpected());
                }
                Ok(value)
            }
        }
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().map(is_ident_char).unwrap_or(false) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn eat_str(&mut self, text: &str) -> bool {
        let len = text.chars().count();
        if self.pos + len > self.chars.len() {
            return false;
        }
        let matches = self.chars[self.pos..self.pos + len]
            .iter()
            .copied()
            .eq(text.chars());
        if matches {
            self.pos += len;
        }
        matches
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().map(char::is_whitespace).unwrap_or(false) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn unexpected(&self) -> SelectorError {
        match self.peek() {
            Some(found) => SelectorError::Unexpected {
                found,
                offset: self.pos,
                source_text: self.source.to_string(),
            },
            None => SelectorError::DanglingCombinator(self.source.to_string()),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_compound_with_tag_class_and_attribute() {
        let sel = Selector::parse("div.tweet[data-user-id]").unwrap();
        assert_eq!(sel.steps().len(), 1);
        let subject = sel.subject();
        assert_eq!(subject.tag.as_deref(), Some("div"));
        assert_eq!(subject.classes, vec!["tweet".to_string()]);
        assert_eq!(
            subject.attrs,
            vec![AttrTest {
                name: "data-user-id".into(),
                value: None
            }]
        );
    }

    #[test]
    fn parses_scoped_child_chain() {
        let sel = Selector::parse(
            ":scope > div.item-box div.tweet > footer.tweet-footer a.tweet-action[rel='actionsMenu'][data-user-id]",
        )
        .unwrap();
        assert!(sel.is_scoped());
        let combinators: Vec<Combinator> = sel.steps().iter().map(|(c, _)| *c).collect();
        assert_eq!(
            combinators,
            vec![
                Combinator::Descendant,
                Combinator::Child,
                Combinator::Descendant,
                Combinator::Child,
                Combinator::Descendant,
            ]
        );
        let subject = sel.subject();
        assert_eq!(subject.attrs[0].value.as_deref(), Some("actionsMenu"));
    }

    #[test]
    fn parses_id_and_child_combinator_without_spaces() {
        let sel = Selector::parse("div#container>div.app-columns").unwrap();
        assert_eq!(sel.steps()[0].1.id.as_deref(), Some("container"));
        assert_eq!(sel.steps()[1].0, Combinator::Child);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(Selector::parse("   "), Err(SelectorError::Empty));
        assert!(matches!(
            Selector::parse("div >"),
            Err(SelectorError::DanglingCombinator(_))
        ));
        assert!(matches!(
            Selector::parse("div[data-x"),
            Err(SelectorError::UnterminatedAttribute(_))
        ));
        assert!(matches!(
            Selector::parse("div..x"),
            Err(SelectorError::Unexpected { .. })
        ));
    }
}
