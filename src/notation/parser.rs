//! Notation text → variation tree
//!
//! The text stores moves, not positions, so every move is replayed through
//! the rule engine to get each node's board state. A `(` opens a side line
//! that branches off *before* the last move played, exactly where it appears
//! in the text, and may nest arbitrarily.
//!
//! Reading happens in two passes. A positional pre-scan (see
//! [`lexer`](super::lexer)) checks tag-pair shape, tokens, parenthesis
//! balance and the termination marker, and remembers where each token sits.
//! `pgn-reader` then drives a [`Visitor`] that builds the tree; the visitor
//! pairs every event with the next pre-scanned token to locate rule errors.
//!
//! Parsing is all or nothing: any error discards the partial tree.

use super::headers::{tag_key, Headers, Outcome};
use super::lexer::{blank_escape_lines, Lexer, Spanned, Token};
use crate::core::error::{ParseError, ParseErrorKind, RuleError};
use crate::rules::RuleEngine;
use crate::tree::{Annotation, Nag, NodeId, VariationTree};
use pgn_reader::{BufferedReader, RawComment, RawHeader, SanPlus, Skip, Visitor};
use std::mem;
use tracing::debug;

/// Parse a single game into a fresh [`VariationTree`]
///
/// # Errors
///
/// [`ParseError`] with the location of the offending token when a header is
/// malformed, the `FEN` header is unusable, a move is illegal, parentheses
/// do not balance, or anything but whitespace follows the termination marker.
pub fn parse<R: RuleEngine + ?Sized>(text: &str, rules: &R) -> Result<VariationTree, ParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = blank_escape_lines(text);
    let layout = scan(&text)?;

    let tree = VariationTree::from_state(rules.starting_state());
    let mut builder = GameBuilder {
        text: &text,
        rules,
        spans: layout.spans,
        next: 0,
        fen_offset: layout.fen_offset,
        headers: Headers::new(),
        started: false,
        current: tree.root(),
        tree,
        open: Vec::new(),
        line_start: true,
        pending: Annotation::default(),
        merged: false,
        error: None,
    };

    let tree = match BufferedReader::new_cursor(text.as_bytes()).read_game(&mut builder) {
        Ok(Some(game)) => game?,
        Ok(None) => builder.end_game()?,
        Err(e) => {
            return Err(ParseError::at(
                ParseErrorKind::Unreadable(e.to_string()),
                &text,
                layout.movetext_start,
                "",
            ))
        }
    };

    debug!("[PGN] Parsed game with {} positions", tree.len());
    Ok(tree)
}

/// Where things are in the text, as found by the pre-scan
struct Layout<'t> {
    /// Offset of the `FEN` tag line
    fen_offset: usize,
    movetext_start: usize,
    /// Movetext tokens the reader reports, in order
    spans: Vec<Spanned<'t>>,
}

fn scan(text: &str) -> Result<Layout<'_>, ParseError> {
    let (fen_offset, movetext_start) = scan_headers(text)?;
    let spans = scan_movetext(text, movetext_start)?;
    Ok(Layout {
        fen_offset,
        movetext_start,
        spans,
    })
}

/// Check every tag line; returns the offset of the `FEN` line and where the
/// movetext begins
fn scan_headers(text: &str) -> Result<(usize, usize), ParseError> {
    let mut fen_offset = 0;
    let mut offset = 0;
    let mut seen_tag = false;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() && !seen_tag {
            offset += line.len();
            continue;
        }
        if !trimmed.starts_with('[') {
            break;
        }

        let key = tag_key(trimmed).ok_or_else(|| {
            ParseError::at(ParseErrorKind::MalformedHeader, text, offset, trimmed)
        })?;
        if key == "FEN" {
            fen_offset = offset;
        }
        seen_tag = true;
        offset += line.len();
    }

    Ok((fen_offset, offset))
}

/// Tokenize the movetext, checking parenthesis balance and that nothing
/// follows the termination marker
fn scan_movetext(text: &str, start: usize) -> Result<Vec<Spanned<'_>>, ParseError> {
    let mut spans = Vec::new();
    let mut open = Vec::new();
    let mut terminated = false;

    for item in Lexer::new(text, start) {
        let span = item?;
        let located = |kind| ParseError::at(kind, text, span.offset, span.text);
        if terminated {
            return Err(located(ParseErrorKind::TrailingText));
        }
        match span.token {
            Token::Open => open.push(span),
            Token::Close => {
                open.pop()
                    .ok_or_else(|| located(ParseErrorKind::UnbalancedParenthesis))?;
            }
            Token::Termination if !open.is_empty() => {
                return Err(located(ParseErrorKind::UnbalancedParenthesis));
            }
            Token::Termination => terminated = true,
            _ => {}
        }
        if span.token.is_reported() {
            spans.push(span);
        }
    }

    match open.last() {
        Some(unclosed) => Err(ParseError::at(
            ParseErrorKind::UnbalancedParenthesis,
            text,
            unclosed.offset,
            "(",
        )),
        None => Ok(spans),
    }
}

/// Builds the tree from reader events
struct GameBuilder<'t, 'r, R: RuleEngine + ?Sized> {
    text: &'t str,
    rules: &'r R,
    spans: Vec<Spanned<'t>>,
    /// Index of the span belonging to the next reported event
    next: usize,
    fen_offset: usize,
    /// Tags read so far, moved into the tree once they end
    headers: Headers,
    started: bool,
    tree: VariationTree,
    /// Last node of the line being read
    current: NodeId,
    /// Resume points of the `(` tokens still open
    open: Vec<NodeId>,
    /// No move has been read yet in the current line
    line_start: bool,
    /// Comments read after `(` and before the variation's first move
    pending: Annotation,
    /// The last move transposed into an existing branch; its annotations
    /// belong to the duplicate and are dropped
    merged: bool,
    /// First error; later events are ignored
    error: Option<ParseError>,
}

impl<R: RuleEngine + ?Sized> GameBuilder<'_, '_, R> {
    /// Run `step` for one reported event, recording its error at the
    /// event's token
    fn located(&mut self, step: impl FnOnce(&mut Self) -> Result<(), ParseErrorKind>) {
        if self.error.is_some() {
            return;
        }
        let span = self.spans.get(self.next).copied();
        self.next += 1;
        if let Err(kind) = step(self) {
            self.error = Some(match span {
                Some(span) => ParseError::at(kind, self.text, span.offset, span.text),
                None => ParseError::at(kind, self.text, self.text.len(), ""),
            });
        }
    }

    fn start_position(&mut self) -> Result<(), ParseError> {
        self.started = true;
        let Some(fen) = self.headers.fen().map(str::to_string) else {
            self.tree.headers = mem::take(&mut self.headers);
            return Ok(());
        };
        let start = self
            .rules
            .parse_state(&fen)
            // A raw-edited board is kept as a bare root; any move after it
            // fails as illegal
            .or_else(|_| {
                self.rules
                    .parse_raw_state(&fen)
                    .inspect(|raw| debug!("[PGN] Starting position {} is not playable", raw))
            })
            .map_err(|e| {
                ParseError::at(
                    ParseErrorKind::InvalidFen(e.to_string()),
                    self.text,
                    self.fen_offset,
                    &fen,
                )
            })?;

        self.tree = VariationTree::from_state(start);
        self.tree.headers = mem::take(&mut self.headers);
        self.current = self.tree.root();
        Ok(())
    }

    fn play(&mut self, san: &str) -> Result<(), ParseErrorKind> {
        let state = self
            .tree
            .state(self.current)
            .cloned()
            .unwrap_or_default();
        let played = self.rules.play_san(&state, san).map_err(|e| match e {
            RuleError::InvalidMoveText(_) => ParseErrorKind::UnexpectedToken,
            other => ParseErrorKind::IllegalMove(other.to_string()),
        })?;

        let annotation = mem::take(&mut self.pending);
        let outcome = self
            .tree
            .insert_played(self.current, played, annotation)
            .map_err(|e| ParseErrorKind::IllegalMove(e.to_string()))?;

        if outcome.is_merged() {
            debug!("[PGN] {} repeats an existing branch; merged", san);
        }
        self.merged = outcome.is_merged();
        self.current = outcome.node();
        self.line_start = false;
        Ok(())
    }

    fn annotate(&mut self, nag: Nag) -> Result<(), ParseErrorKind> {
        if self.line_start {
            return Err(ParseErrorKind::UnexpectedToken);
        }
        if self.merged {
            debug!("[PGN] Dropping {:?} on merged move", nag);
            return Ok(());
        }
        if let Some(annotation) = self.tree.annotation_mut(self.current) {
            annotation.nags.push(nag);
        }
        Ok(())
    }

    fn add_comment(&mut self, body: &str) {
        if self.line_start {
            if self.open.is_empty() {
                // Comment ahead of the first move of the game
                if let Some(root) = self.tree.annotation_mut(self.current) {
                    root.push_comment(body);
                }
            } else {
                self.pending.push_pre_comment(body);
            }
            return;
        }
        if self.merged {
            debug!("[PGN] Dropping comment on merged move");
            return;
        }
        if let Some(annotation) = self.tree.annotation_mut(self.current) {
            annotation.push_comment(body);
        }
    }

    fn open_variation(&mut self) -> Result<(), ParseErrorKind> {
        let parent = match self.tree.parent(self.current) {
            Some(parent) if !self.line_start => parent,
            _ => return Err(ParseErrorKind::VariationWithoutMove),
        };
        self.open.push(self.current);
        self.current = parent;
        self.line_start = true;
        self.merged = false;
        Ok(())
    }

    fn close_variation(&mut self) -> Result<(), ParseErrorKind> {
        let resume = self
            .open
            .pop()
            .ok_or(ParseErrorKind::UnbalancedParenthesis)?;
        if !mem::take(&mut self.pending).is_empty() {
            return Err(ParseErrorKind::UnexpectedToken);
        }
        self.current = resume;
        self.line_start = false;
        // Annotations after `)` belong to the resumed mainline move
        self.merged = false;
        Ok(())
    }
}

impl<R: RuleEngine + ?Sized> Visitor for GameBuilder<'_, '_, R> {
    type Result = Result<VariationTree, ParseError>;

    fn header(&mut self, key: &[u8], value: RawHeader<'_>) {
        match (std::str::from_utf8(key), value.decode_utf8()) {
            (Ok(key), Ok(value)) => {
                self.headers.set(key, value);
            }
            _ => debug!("[PGN] Skipping undecodable header"),
        }
    }

    fn end_headers(&mut self) -> Skip {
        if let Err(e) = self.start_position() {
            self.error = Some(e);
        }
        Skip(self.error.is_some())
    }

    fn san(&mut self, san_plus: SanPlus) {
        let san = san_plus.to_string();
        self.located(|builder| builder.play(&san));
    }

    fn nag(&mut self, nag: pgn_reader::Nag) {
        self.located(|builder| builder.annotate(Nag(nag.0)));
    }

    fn comment(&mut self, comment: RawComment<'_>) {
        if self.error.is_none() {
            let body = String::from_utf8_lossy(comment.as_bytes()).into_owned();
            self.add_comment(&body);
        }
    }

    fn begin_variation(&mut self) -> Skip {
        self.located(|builder| builder.open_variation());
        Skip(self.error.is_some())
    }

    fn end_variation(&mut self) {
        self.located(|builder| builder.close_variation());
    }

    fn outcome(&mut self, outcome: Option<pgn_reader::Outcome>) {
        let Some(outcome) = outcome.and_then(|o| Outcome::from_result(&o.to_string())) else {
            return;
        };
        if self.error.is_none() && self.tree.headers.get("Result").is_none() {
            self.tree.headers.set("Result", outcome.as_result());
        }
    }

    fn end_game(&mut self) -> Self::Result {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        // Every pre-scanned token must have been consumed by the reader
        if let Some(span) = self.spans.get(self.next) {
            return Err(ParseError::at(
                ParseErrorKind::UnexpectedToken,
                self.text,
                span.offset,
                span.text,
            ));
        }
        if !self.started {
            self.start_position()?;
        }
        Ok(mem::take(&mut self.tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ShakmatyRules;
    use crate::tree::PositionPath;

    fn parse_ok(text: &str) -> VariationTree {
        parse(text, &ShakmatyRules::new()).unwrap()
    }

    fn parse_err(text: &str) -> ParseError {
        parse(text, &ShakmatyRules::new()).unwrap_err()
    }

    #[test]
    fn test_headers_and_mainline() {
        let tree = parse_ok("[Event \"Casual\"]\n[White \"A\"]\n\n1. e4 e5 2. Nf3 *\n");
        assert_eq!(tree.headers.get("Event"), Some("Casual"));
        assert_eq!(tree.headers.white(), Some("A"));
        assert_eq!(tree.headers.result(), "*");
        assert_eq!(tree.mainline_san(tree.root()), "e4 e5 Nf3");
    }

    #[test]
    fn test_variation_branches_before_last_move() {
        let tree = parse_ok("1. e4 e5 (1... c5 2. Nf3) 2. Nf3 *");
        let root = tree.root();
        let e4 = tree.children(root)[0];

        let replies: Vec<&str> = tree
            .children(e4)
            .iter()
            .map(|&c| tree.node(c).unwrap().mv().unwrap().san.as_str())
            .collect();
        assert_eq!(replies, ["e5", "c5"]);
        assert_eq!(tree.mainline_san(root), "e4 e5 Nf3");

        let sicilian = tree.go_to_position(&PositionPath::from(vec![0, 1, 0]));
        assert_eq!(tree.node(sicilian).unwrap().mv().unwrap().san, "Nf3");
    }

    #[test]
    fn test_nested_variations() {
        let tree = parse_ok("1. e4 (1. d4 d5 (1... Nf6 2. c4) 2. c4) 1... e5 *");
        let nf6_c4 = tree.go_to_position(&PositionPath::from(vec![1, 1, 0]));
        let moves: Vec<&str> = tree.moves_to(nf6_c4).iter().map(|m| m.san.as_str()).collect();
        assert_eq!(moves, ["d4", "Nf6", "c4"]);
    }

    #[test]
    fn test_comments_and_symbols() {
        let tree = parse_ok("{Opening} 1. e4! {best by test} e5 $6 (1... c5!? {sharp}) *");
        let root = tree.root();
        assert_eq!(tree.node(root).unwrap().annotation.comment.as_deref(), Some("Opening"));

        let e4 = tree.node(tree.children(root)[0]).unwrap();
        assert_eq!(e4.annotation.nags, [Nag::GOOD_MOVE]);
        assert_eq!(e4.annotation.comment.as_deref(), Some("best by test"));

        let c5 = tree.go_to_position(&PositionPath::from(vec![0, 1]));
        let c5 = &tree.node(c5).unwrap().annotation;
        assert_eq!(c5.nags, [Nag::SPECULATIVE_MOVE]);
        assert_eq!(c5.comment.as_deref(), Some("sharp"));
    }

    #[test]
    fn test_variation_pre_comment() {
        let tree = parse_ok("1. e4 ({Alternatively} 1. d4) *");
        let d4 = tree.go_to_position(&PositionPath::from(vec![1]));
        assert_eq!(
            tree.node(d4).unwrap().annotation.pre_comment.as_deref(),
            Some("Alternatively")
        );
    }

    #[test]
    fn test_fen_header_sets_root() {
        let fen = "4k3/8/8/8/8/8/4P3/4K3 w - - 0 40";
        let tree = parse_ok(&format!("[SetUp \"1\"]\n[FEN \"{fen}\"]\n\n40. e4 Kd7 *"));
        assert_eq!(tree.state(tree.root()).unwrap().fen(), fen);
        assert_eq!(tree.mainline_san(tree.root()), "e4 Kd7");
    }

    #[test]
    fn test_duplicate_variation_merges() {
        //! A side line repeating the main move merges and drops its annotations
        let tree = parse_ok("1. e4 {main} (1. e4 {dup} e5) *");
        let root = tree.root();
        assert_eq!(tree.children(root).len(), 1);
        let e4 = tree.children(root)[0];
        assert_eq!(tree.node(e4).unwrap().annotation.comment.as_deref(), Some("main"));
        assert_eq!(tree.mainline_san(root), "e4 e5");
    }

    #[test]
    fn test_result_without_header_recorded() {
        let tree = parse_ok("1. e4 e5 1-0");
        assert_eq!(tree.headers.result(), "1-0");
    }

    #[test]
    fn test_empty_input_is_start_position() {
        let tree = parse_ok("");
        assert_eq!(tree.len(), 1);
        assert!(tree.state(tree.root()).unwrap().is_starting());
    }

    #[test]
    fn test_illegal_move_error() {
        let err = parse_err("1. e4 e5 2. Ke3 *");
        assert!(matches!(err.kind, ParseErrorKind::IllegalMove(_)));
        assert_eq!(err.token, "Ke3");
        assert_eq!(err.offset, 12);
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let err = parse_err("1. e4 (1. d4 d5 *");
        assert_eq!(err.kind, ParseErrorKind::UnbalancedParenthesis);

        let err = parse_err("1. e4 (1. d4 d5");
        assert_eq!(err.kind, ParseErrorKind::UnbalancedParenthesis);
        assert_eq!(err.offset, 6);

        let err = parse_err("1. e4 e5) *");
        assert_eq!(err.kind, ParseErrorKind::UnbalancedParenthesis);
        assert_eq!(err.token, ")");
    }

    #[test]
    fn test_variation_without_move() {
        let err = parse_err("(1. d4) 1. e4 *");
        assert_eq!(err.kind, ParseErrorKind::VariationWithoutMove);

        let err = parse_err("1. e4 ((1. d4)) *");
        assert_eq!(err.kind, ParseErrorKind::VariationWithoutMove);
    }

    #[test]
    fn test_malformed_header() {
        let err = parse_err("[Event \"x\"]\n[White Alice]\n\n1. e4 *");
        assert_eq!(err.kind, ParseErrorKind::MalformedHeader);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_invalid_fen_header() {
        let err = parse_err("[Event \"x\"]\n[FEN \"not a position\"]\n\n*");
        assert!(matches!(err.kind, ParseErrorKind::InvalidFen(_)));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_unplayable_fen_is_bare_root() {
        //! An edited board without kings parses, but nothing can be played
        let fen = "8/8/8/8/8/8/8/8 w - - 0 1";
        let tree = parse_ok(&format!("[FEN \"{fen}\"]\n\n*"));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.state(tree.root()).unwrap().fen(), fen);

        let err = parse_err(&format!("[FEN \"{fen}\"]\n\n1. e4 *"));
        assert!(matches!(err.kind, ParseErrorKind::IllegalMove(_)));
    }

    #[test]
    fn test_trailing_text() {
        let err = parse_err("1. e4 e5 * 2. Nf3");
        assert_eq!(err.kind, ParseErrorKind::TrailingText);
        assert_eq!(parse_ok("1. e4 *  \n\n").len(), 2);
    }

    #[test]
    fn test_escape_lines_in_movetext() {
        let tree = parse_ok("% exported by a database\n[Event \"x\"]\n\n1. e4\n% note\ne5 *");
        assert_eq!(tree.headers.get("Event"), Some("x"));
        assert_eq!(tree.mainline_san(tree.root()), "e4 e5");

        let err = parse_err("1. e4 %e5 *");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
    }

    #[test]
    fn test_header_escapes_decoded() {
        let tree = parse_ok("[Event \"Say \\\"hi\\\"\"]\n[Site \"C:\\\\games\"]\n\n*");
        assert_eq!(tree.headers.get("Event"), Some("Say \"hi\""));
        assert_eq!(tree.headers.get("Site"), Some("C:\\games"));
    }

    #[test]
    fn test_error_inside_variation_located() {
        //! The illegal move is reported where it sits in the side line
        let text = "1. e4 e5 (1... c5 2. Nf3 Nf3) 2. Nf3 *";
        let err = parse_err(text);
        assert!(matches!(err.kind, ParseErrorKind::IllegalMove(_)));
        assert_eq!(err.token, "Nf3");
        assert_eq!(err.offset, text.find("Nf3)").unwrap());
    }

    #[test]
    fn test_line_comments_skipped() {
        let tree = parse_ok("1. e4 ; opening move\ne5 *");
        assert_eq!(tree.mainline_san(tree.root()), "e4 e5");
    }

    #[test]
    fn test_symbol_before_any_move() {
        let err = parse_err("! 1. e4 *");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
    }
}
