//! Positional pre-scan of the movetext
//!
//! The PGN reader decodes the game but reports no positions, so the text is
//! scanned once up front. The scan rejects what cannot be read at all and
//! records the byte offset of every token the reader will report, so the
//! parser can point errors at the exact spot in the input.

use crate::core::error::{ParseError, ParseErrorKind};
use crate::rules::parse_san;
use crate::tree::Nag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    /// `12.`, `12...` or a bare `12`
    MoveNumber,
    /// A move, check suffix included (`Nf3`, `exd8=Q+`, `O-O`)
    San(&'a str),
    /// Move-quality symbol, either standalone or split off a move
    Symbol(&'a str),
    /// `$n`
    Nag,
    /// A `{...}` comment
    Comment,
    Open,
    Close,
    /// `1-0`, `0-1`, `1/2-1/2` or `*`
    Termination,
}

impl Token<'_> {
    /// Whether the PGN reader reports this token to its visitor in order
    pub fn is_reported(&self) -> bool {
        matches!(
            self,
            Token::San(_) | Token::Symbol(_) | Token::Nag | Token::Open | Token::Close
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Spanned<'a> {
    pub token: Token<'a>,
    /// Byte offset into the full input
    pub offset: usize,
    /// Source text of the token
    pub text: &'a str,
}

pub(crate) struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    /// Symbol split off the previous move token, emitted next
    pending: Option<Spanned<'a>>,
}

const TERMINATIONS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '{' | '}' | '(' | ')' | ';' | '$')
}

/// Blank out `%` escape lines, keeping every byte offset in place
///
/// Escape lines start with `%` in the first column; a `%` inside a brace
/// comment is comment text.
pub(crate) fn blank_escape_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut line_start = true;
    let mut in_comment = false;
    let mut in_escape = false;

    for c in text.chars() {
        if in_escape && c != '\n' {
            (0..c.len_utf8()).for_each(|_| out.push(' '));
            continue;
        }
        in_escape = line_start && !in_comment && c == '%';
        match c {
            '{' if !in_escape => in_comment = true,
            '}' => in_comment = false,
            _ => {}
        }
        out.push(if in_escape { ' ' } else { c });
        line_start = c == '\n';
    }
    out
}

impl<'a> Lexer<'a> {
    /// Tokenize `input` starting at byte `start`
    pub fn new(input: &'a str, start: usize) -> Self {
        Self {
            input,
            pos: start.min(input.len()),
            pending: None,
        }
    }

    fn error(&self, kind: ParseErrorKind, offset: usize, token: &str) -> ParseError {
        ParseError::at(kind, self.input, offset, token)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn spanned(&self, token: Token<'a>, offset: usize, end: usize) -> Spanned<'a> {
        Spanned {
            token,
            offset,
            text: &self.input[offset..end],
        }
    }

    fn lex_word(&mut self, start: usize) -> Result<Spanned<'a>, ParseError> {
        let rest = self.rest();
        let len = rest.find(is_delimiter).unwrap_or(rest.len());
        let end = start + len;
        let word = &self.input[start..end];
        self.pos = end;

        if TERMINATIONS.contains(&word) {
            return Ok(self.spanned(Token::Termination, start, end));
        }

        let core = word.trim_end_matches(['!', '?']);
        let symbol = &word[core.len()..];
        if !symbol.is_empty() && Nag::from_symbol(symbol).is_none() {
            return Err(self.error(ParseErrorKind::UnexpectedToken, start, word));
        }
        if core.is_empty() {
            return Ok(self.spanned(Token::Symbol(word), start, end));
        }

        // Move number, possibly glued to the move: `12.`, `12...Nf6`
        let is_castle = core.starts_with("0-0") || core.starts_with("O-O");
        if !is_castle && core.starts_with(|c: char| c.is_ascii_digit()) {
            let digits = word.trim_start_matches(|c: char| c.is_ascii_digit());
            let after_dots = digits.trim_start_matches('.');
            if after_dots.is_empty() {
                return Ok(self.spanned(Token::MoveNumber, start, end));
            }
            if after_dots.len() == digits.len() {
                return Err(self.error(ParseErrorKind::UnexpectedToken, start, word));
            }
            // Re-lex the glued move on the next call
            self.pos = end - after_dots.len();
            return Ok(self.spanned(Token::MoveNumber, start, self.pos));
        }

        if parse_san(core).is_none() {
            return Err(self.error(ParseErrorKind::UnexpectedToken, start, word));
        }
        if !symbol.is_empty() {
            let split = start + core.len();
            self.pending = Some(self.spanned(Token::Symbol(symbol), split, end));
        }
        Ok(self.spanned(Token::San(core), start, start + core.len()))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Spanned<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(pending) = self.pending.take() {
            return Some(Ok(pending));
        }

        loop {
            let rest = self.rest();
            self.pos += rest.len() - rest.trim_start().len();
            // `;` comments run to the end of the line and are not kept
            if !self.rest().starts_with(';') {
                break;
            }
            self.pos += self.rest().find('\n').unwrap_or(self.rest().len());
        }

        let start = self.pos;
        let c = self.rest().chars().next()?;

        let item = match c {
            '{' => match self.rest().find('}') {
                Some(close) => {
                    let end = start + close + 1;
                    self.pos = end;
                    Ok(self.spanned(Token::Comment, start, end))
                }
                None => {
                    self.pos = self.input.len();
                    Err(self.error(ParseErrorKind::UnterminatedComment, start, "{"))
                }
            },
            '(' => {
                self.pos += 1;
                Ok(self.spanned(Token::Open, start, start + 1))
            }
            ')' => {
                self.pos += 1;
                Ok(self.spanned(Token::Close, start, start + 1))
            }
            '}' => {
                self.pos += 1;
                Err(self.error(ParseErrorKind::UnexpectedToken, start, "}"))
            }
            '$' => {
                let digits = self.rest()[1..]
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(self.rest().len() - 1);
                let end = start + 1 + digits;
                self.pos = end;
                let text = &self.input[start..end];
                match text[1..].parse::<u8>() {
                    Ok(_) => Ok(self.spanned(Token::Nag, start, end)),
                    Err(_) => Err(self.error(ParseErrorKind::UnexpectedToken, start, text)),
                }
            }
            _ => self.lex_word(start),
        };
        Some(item)
    }
}
