//! Selector parsing for the CSS subset the matcher understands
//!
//! Grammar: compound selectors joined by the child combinator `>`.
//! A compound is any combination of
//!
//! ```text
//! *  tag  #id  .class  [name="value"]  :nth-child(n)  :nth-of-type(n)
//! ```
//!
//! Quoted attribute values may escape `"` and `\` with a backslash.
//! Anything outside this grammar is a hard `SelectorError`: a malformed
//! selector means corrupted input, not something to skip over.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("missing compound selector around `>`")]
    DanglingCombinator,

    #[error("unexpected character `{ch}` at byte {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected end of selector")]
    UnexpectedEnd,

    #[error("unterminated attribute value")]
    UnterminatedAttribute,

    #[error("unknown pseudo-class `:{0}`")]
    UnknownPseudo(String),

    #[error("invalid argument `{arg}` in `:{pseudo}(..)`")]
    InvalidArgument { pseudo: String, arg: String },
}

/// One compound selector between child combinators
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SelectorPart {
    pub universal: bool,
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
    pub nth_child: Option<usize>,
    pub nth_of_type: Option<usize>,
}

impl SelectorPart {
    fn is_vacant(&self) -> bool {
        !self.universal
            && self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
            && self.nth_child.is_none()
            && self.nth_of_type.is_none()
    }
}

/// A parsed selector chain, root-most compound first.
///
/// Every combinator in the grammar is `>`, so a chain of N parts matches
/// a node plus its N-1 nearest element ancestors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub parts: Vec<SelectorPart>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        if input.trim().is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut parts = Vec::new();
        for (offset, piece) in split_compounds(input)? {
            let piece = piece.trim();
            if piece.is_empty() {
                return Err(SelectorError::DanglingCombinator);
            }
            parts.push(parse_compound(piece, offset)?);
        }

        Ok(Self { parts })
    }

    /// The compound the queried node itself must match
    pub fn target(&self) -> Option<&SelectorPart> {
        self.parts.last()
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

/// Split on top-level `>`, honoring quoted attribute values (which may
/// themselves contain `>`). Returns (byte offset, slice) pairs.
fn split_compounds(input: &str) -> Result<Vec<(usize, &str)>, SelectorError> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (pos, ch) in input.char_indices() {
        if in_quotes {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_quotes = false;
            }
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            '>' => {
                pieces.push((start, &input[start..pos]));
                start = pos + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return Err(SelectorError::UnterminatedAttribute);
    }
    pieces.push((start, &input[start..]));
    Ok(pieces)
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str, offset: usize) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            offset,
        }
    }

    fn next(&mut self) -> Option<(usize, char)> {
        self.chars.next()
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn expect(&mut self, expected: char) -> Result<(), SelectorError> {
        match self.next() {
            Some((_, ch)) if ch == expected => Ok(()),
            Some((pos, ch)) => Err(SelectorError::UnexpectedChar {
                ch,
                pos: self.offset + pos,
            }),
            None => Err(SelectorError::UnexpectedEnd),
        }
    }

    /// Consume a run of identifier characters; empty runs are an error.
    fn ident(&mut self) -> Result<String, SelectorError> {
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            if is_ident_char(ch) {
                out.push(ch);
                self.next();
            } else {
                break;
            }
        }
        if out.is_empty() {
            match self.next() {
                Some((pos, ch)) => Err(SelectorError::UnexpectedChar {
                    ch,
                    pos: self.offset + pos,
                }),
                None => Err(SelectorError::UnexpectedEnd),
            }
        } else {
            Ok(out)
        }
    }

    /// Consume `"value"` with backslash escapes, after the opening quote.
    fn quoted_value(&mut self) -> Result<String, SelectorError> {
        let mut out = String::new();
        loop {
            match self.next() {
                Some((_, '\\')) => match self.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => return Err(SelectorError::UnterminatedAttribute),
                },
                Some((_, '"')) => return Ok(out),
                Some((_, ch)) => out.push(ch),
                None => return Err(SelectorError::UnterminatedAttribute),
            }
        }
    }

    fn unexpected(&self, pos: usize, ch: char) -> SelectorError {
        SelectorError::UnexpectedChar {
            ch,
            pos: self.offset + pos,
        }
    }

    fn remainder_starts_ident(&mut self) -> bool {
        self.peek().map(is_ident_char).unwrap_or(false)
    }
}

fn parse_compound(piece: &str, offset: usize) -> Result<SelectorPart, SelectorError> {
    let mut part = SelectorPart::default();
    let mut cursor = Cursor::new(piece, offset);

    // Leading tag or universal selector
    if cursor.peek() == Some('*') {
        cursor.next();
        part.universal = true;
    } else if cursor.remainder_starts_ident() {
        part.tag = Some(cursor.ident()?.to_ascii_lowercase());
    }

    while let Some((pos, ch)) = cursor.next() {
        match ch {
            '#' => {
                part.id = Some(cursor.ident()?);
            }
            '.' => {
                part.classes.push(cursor.ident()?);
            }
            '[' => {
                let name = cursor.ident()?;
                cursor.expect('=')?;
                cursor.expect('"')?;
                let value = cursor.quoted_value()?;
                cursor.expect(']')?;
                part.attributes.push((name, value));
            }
            ':' => {
                let pseudo = cursor.ident()?;
                cursor.expect('(')?;
                let arg = cursor.ident()?;
                cursor.expect(')')?;
                let n: usize = arg.parse().map_err(|_| SelectorError::InvalidArgument {
                    pseudo: pseudo.clone(),
                    arg: arg.clone(),
                })?;
                if n == 0 {
                    return Err(SelectorError::InvalidArgument { pseudo, arg });
                }
                match pseudo.as_str() {
                    "nth-child" => part.nth_child = Some(n),
                    "nth-of-type" => part.nth_of_type = Some(n),
                    _ => return Err(SelectorError::UnknownPseudo(pseudo)),
                }
            }
            _ => return Err(cursor.unexpected(pos, ch)),
        }
    }

    if part.is_vacant() {
        return Err(SelectorError::Empty);
    }
    Ok(part)
}
