//! Variation tree → notation text
//!
//! Output parses back into a tree with the same board state at every
//! position path; see [`parse`](super::parse).

use super::headers::{format_header_line, Outcome};
use crate::tree::{NodeId, VariationTree};
use serde::{Deserialize, Serialize};
use shakmaty::Color;

/// Movetext lines are wrapped at this width where token boundaries allow
const LINE_WIDTH: usize = 80;

/// What to include when writing a game
///
/// Everything is on by default. Turning a flag off only drops output; the
/// result still parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Tag pairs. `SetUp`/`FEN` are written regardless when the start is
    /// not the standard position.
    pub headers: bool,
    pub comments: bool,
    /// Move-quality symbols and other NAGs
    pub symbols: bool,
    /// Side variations; off writes the mainline only
    pub variations: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            headers: true,
            comments: true,
            symbols: true,
            variations: true,
        }
    }
}

impl WriteOptions {
    /// Mainline moves only
    pub fn bare() -> Self {
        Self {
            headers: false,
            comments: false,
            symbols: false,
            variations: false,
        }
    }
}

/// Write the game rooted at the tree's root
pub fn write_game(tree: &VariationTree, options: &WriteOptions) -> String {
    write(tree, tree.root(), options)
}

/// Write the subtree below `start` as a complete game
///
/// `start` becomes the game's starting position: a non-standard position is
/// recorded with `SetUp`/`FEN` tags.
pub fn write(tree: &VariationTree, start: NodeId, options: &WriteOptions) -> String {
    let mut out = String::new();

    let mut tags: Vec<String> = Vec::new();
    if options.headers {
        tags.extend(
            tree.headers
                .iter()
                .filter(|(key, _)| !matches!(*key, "FEN" | "SetUp"))
                .map(|(key, value)| format_header_line(key, value)),
        );
    }
    if let Some(state) = tree.state(start).filter(|s| !s.is_starting()) {
        tags.push(format_header_line("SetUp", "1"));
        tags.push(format_header_line("FEN", state.fen()));
    }
    for tag in &tags {
        out.push_str(tag);
        out.push('\n');
    }
    if !tags.is_empty() {
        out.push('\n');
    }

    let mut movetext = Movetext {
        tree,
        options,
        tokens: Vec::new(),
        glue_next: false,
    };
    let mut force_number = true;
    if let Some(comment) = tree
        .node(start)
        .and_then(|n| n.annotation.comment.as_deref())
        .filter(|_| options.comments)
    {
        movetext.push(format_comment(comment));
    }
    movetext.line(start, &mut force_number);
    // Only a decided outcome may end the movetext; any other `Result` value
    // stays in the tag section
    movetext.push(Outcome::termination(tree.headers.outcome()).to_string());

    out.push_str(&wrap(&movetext.tokens));
    out.push('\n');
    out
}

fn format_comment(text: &str) -> String {
    format!("{{{}}}", text.replace('}', ")"))
}

/// Join tokens with single spaces, breaking lines before [`LINE_WIDTH`]
fn wrap(tokens: &[String]) -> String {
    let mut out = String::new();
    let mut width = 0;
    for token in tokens {
        let len = token.chars().count();
        if width > 0 && width + 1 + len > LINE_WIDTH {
            out.push('\n');
            width = 0;
        } else if width > 0 {
            out.push(' ');
            width += 1;
        }
        out.push_str(token);
        width += len;
    }
    out
}

struct Movetext<'a> {
    tree: &'a VariationTree,
    options: &'a WriteOptions,
    tokens: Vec<String>,
    /// Attach the next token to the previous one (after `(`)
    glue_next: bool,
}

impl Movetext<'_> {
    fn push(&mut self, token: String) {
        match self.tokens.last_mut() {
            Some(last) if self.glue_next => last.push_str(&token),
            _ => self.tokens.push(token),
        }
        self.glue_next = false;
    }

    fn open(&mut self) {
        self.push("(".to_string());
        self.glue_next = true;
    }

    fn close(&mut self) {
        match self.tokens.last_mut() {
            Some(last) => last.push(')'),
            None => self.tokens.push(")".to_string()),
        }
    }

    /// Write the mainline below `from`, with side variations in parentheses
    /// right after the move they replace
    fn line(&mut self, from: NodeId, force_number: &mut bool) {
        let tree = self.tree;
        let mut current = from;

        while let Some((&main, sides)) = tree.children(current).split_first() {
            *force_number = self.write_move(current, main, *force_number);

            if self.options.variations {
                for &side in sides {
                    self.open();
                    let mut side_force = self.write_move(current, side, true);
                    self.line(side, &mut side_force);
                    self.close();
                    *force_number = true;
                }
            }
            current = main;
        }
    }

    /// Write the move leading to `child`; returns whether the next move must
    /// carry its number
    fn write_move(&mut self, parent: NodeId, child: NodeId, force_number: bool) -> bool {
        let Some(node) = self.tree.node(child) else {
            return force_number;
        };
        let Some(mv) = node.mv() else {
            return force_number;
        };
        let annotation = &node.annotation;
        let mut force_number = force_number;

        if self.options.comments {
            if let Some(pre) = annotation.pre_comment.as_deref() {
                self.push(format_comment(pre));
                force_number = true;
            }
        }

        if let Some(before) = self.tree.state(parent) {
            let number = before.fullmove_number();
            match before.side_to_move() {
                Color::White => self.push(format!("{number}.")),
                Color::Black if force_number => self.push(format!("{number}...")),
                Color::Black => {}
            }
        }

        let mut san = mv.san.clone();
        let mut extra_nags = Vec::new();
        if self.options.symbols {
            let mut glued = false;
            for nag in &annotation.nags {
                match nag.symbol() {
                    Some(symbol) if !glued => {
                        san.push_str(symbol);
                        glued = true;
                    }
                    _ => extra_nags.push(format!("${}", nag.0)),
                }
            }
        }
        self.push(san);
        for nag in extra_nags {
            self.push(nag);
        }

        match annotation.comment.as_deref() {
            Some(comment) if self.options.comments => {
                self.push(format_comment(comment));
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::parse;
    use crate::rules::ShakmatyRules;
    use crate::tree::Nag;

    fn roundtrip(text: &str) -> String {
        let tree = parse(text, &ShakmatyRules::new()).unwrap();
        write_game(&tree, &WriteOptions::default())
    }

    #[test]
    fn test_mainline_numbering() {
        assert_eq!(roundtrip("1. e4 e5 2. Nf3 Nc6 *"), "1. e4 e5 2. Nf3 Nc6 *\n");
    }

    #[test]
    fn test_variation_placement() {
        assert_eq!(
            roundtrip("1. e4 e5 (1... c5 2. Nf3) 2. Nf3 *"),
            "1. e4 e5 (1... c5 2. Nf3) 2. Nf3 *\n"
        );
    }

    #[test]
    fn test_comment_forces_black_number() {
        assert_eq!(
            roundtrip("1. e4 {king pawn} e5 *"),
            "1. e4 {king pawn} 1... e5 *\n"
        );
    }

    #[test]
    fn test_headers_written_first() {
        let text = "[Event \"Club\"]\n[Result \"1-0\"]\n\n1. e4 1-0";
        assert_eq!(roundtrip(text), "[Event \"Club\"]\n[Result \"1-0\"]\n\n1. e4 1-0\n");
    }

    #[test]
    fn test_undecided_result_tag_ends_with_asterisk() {
        //! The tag is kept verbatim, the movetext still ends in a valid marker
        for result in ["unknown", "?", ""] {
            let text = format!("[Result \"{result}\"]\n\n1. e4 e5 *");
            let written = roundtrip(&text);
            assert_eq!(written, format!("[Result \"{result}\"]\n\n1. e4 e5 *\n"));

            let reparsed = parse(&written, &ShakmatyRules::new()).unwrap();
            assert_eq!(reparsed.len(), 3);
            assert_eq!(reparsed.headers.get("Result"), Some(result));
            assert!(reparsed.iter().all(|(_, n)| n.annotation.nags.is_empty()));
        }
    }

    #[test]
    fn test_fen_tags_for_custom_start() {
        let fen = "4k3/8/8/8/8/8/4P3/4K3 b - - 0 40";
        let tree = parse(&format!("[FEN \"{fen}\"]\n\n40... Kd7 *"), &ShakmatyRules::new()).unwrap();
        let text = write_game(&tree, &WriteOptions::bare());
        assert_eq!(
            text,
            format!("[SetUp \"1\"]\n[FEN \"{fen}\"]\n\n40... Kd7 *\n")
        );
    }

    #[test]
    fn test_symbols_and_nags() {
        let mut tree = parse("1. e4 *", &ShakmatyRules::new()).unwrap();
        let e4 = tree.children(tree.root())[0];
        let annotation = tree.annotation_mut(e4).unwrap();
        annotation.nags = vec![Nag::GOOD_MOVE, Nag::DUBIOUS_MOVE, Nag(14)];

        let text = write_game(&tree, &WriteOptions::default());
        assert_eq!(text, "1. e4! $6 $14 *\n");

        let options = WriteOptions {
            symbols: false,
            ..WriteOptions::default()
        };
        assert_eq!(write_game(&tree, &options), "1. e4 *\n");
    }

    #[test]
    fn test_options_drop_output() {
        let text = "[Event \"x\"]\n\n{start} 1. e4 {c} (1. d4) 1... e5 *";
        let tree = parse(text, &ShakmatyRules::new()).unwrap();

        assert_eq!(write_game(&tree, &WriteOptions::bare()), "1. e4 e5 *\n");

        let options = WriteOptions {
            comments: false,
            ..WriteOptions::default()
        };
        assert_eq!(
            write_game(&tree, &options),
            "[Event \"x\"]\n\n1. e4 (1. d4) 1... e5 *\n"
        );
    }

    #[test]
    fn test_comment_braces_replaced() {
        let mut tree = parse("1. e4 *", &ShakmatyRules::new()).unwrap();
        let e4 = tree.children(tree.root())[0];
        tree.annotation_mut(e4).unwrap().comment = Some("a } b".into());
        assert_eq!(write_game(&tree, &WriteOptions::default()), "1. e4 {a ) b} *\n");
    }

    #[test]
    fn test_long_lines_wrap() {
        let moves = "Nf3 Nf6 Ng1 Ng8 ".repeat(10);
        let tree = {
            let mut tree = VariationTree::new();
            let root = tree.root();
            tree.apply_san_line(&ShakmatyRules::new(), root, &moves).unwrap();
            tree
        };
        let text = write_game(&tree, &WriteOptions::default());
        assert!(text.lines().count() > 1);
        assert!(text.lines().all(|l| l.chars().count() <= LINE_WIDTH));
        let reparsed = parse(&text, &ShakmatyRules::new()).unwrap();
        assert_eq!(reparsed.mainline_san(reparsed.root()), tree.mainline_san(tree.root()));
    }

    #[test]
    fn test_write_from_inner_node() {
        let tree = parse("1. e4 e5 2. Nf3 *", &ShakmatyRules::new()).unwrap();
        let e5 = tree.bottom(tree.root());
        let e5 = tree.parent(e5).unwrap();
        let text = write(&tree, e5, &WriteOptions::bare());
        assert!(text.starts_with("[SetUp \"1\"]\n[FEN \""));
        assert!(text.ends_with("\n\n2. Nf3 *\n"));
    }
}
