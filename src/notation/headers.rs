//! Header tags
//!
//! `[Key "Value"]` pairs in the order they were read. Besides plain lookup,
//! [`Headers`] decodes the tags a game database cares about: player names
//! and ratings, the result, the speed class derived from `TimeControl`, and
//! a non-standard starting position.

use crate::tree::STARTING_FEN;
use serde::{Deserialize, Serialize};
use shakmaty::Color;
use std::fmt;

/// Ordered tag pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    tags: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the value of `key`, or append the tag if it is new
    ///
    /// Returns `false` and leaves the headers alone when `key` is not a
    /// valid tag name (see [`is_valid_key`]).
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if !is_valid_key(&key) {
            return false;
        }
        let value = value.into();
        match self.tags.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.tags.push((key, value)),
        }
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.tags.iter().position(|(k, _)| k == key)?;
        Some(self.tags.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn white(&self) -> Option<&str> {
        self.get("White")
    }

    pub fn black(&self) -> Option<&str> {
        self.get("Black")
    }

    pub fn white_elo(&self) -> Option<i32> {
        rating(self.get("WhiteElo"))
    }

    pub fn black_elo(&self) -> Option<i32> {
        rating(self.get("BlackElo"))
    }

    pub fn date(&self) -> Option<&str> {
        self.get("Date").or_else(|| self.get("UTCDate"))
    }

    /// Game termination marker, `*` when unknown
    pub fn result(&self) -> &str {
        self.get("Result").unwrap_or("*")
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.get("Result").and_then(Outcome::from_result)
    }

    pub fn speed(&self) -> Option<Speed> {
        self.get("TimeControl").and_then(Speed::from_time_control)
    }

    /// Starting position, ignoring a `FEN` tag that names the standard start
    pub fn fen(&self) -> Option<&str> {
        self.get("FEN")
            .map(str::trim)
            .filter(|fen| !fen.is_empty() && *fen != STARTING_FEN)
    }
}

fn rating(value: Option<&str>) -> Option<i32> {
    value.filter(|v| *v != "?").and_then(|v| v.trim().parse().ok())
}

/// Tag names are a letter or digit followed by letters, digits and `_`
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Key of a well-formed `[Key "Value"]` line, `None` when it is malformed
///
/// Only the shape is checked here; values are decoded by the PGN reader.
pub(crate) fn tag_key(line: &str) -> Option<&str> {
    let inner = line.trim().strip_prefix('[')?.strip_suffix(']')?.trim();
    let key_end = inner.find(|c: char| c.is_whitespace() || c == '"')?;
    let key = &inner[..key_end];
    let quoted = inner[key_end..].trim_start();
    if !is_valid_key(key) || quoted.len() < 2 || !quoted.starts_with('"') {
        return None;
    }

    // The first unescaped quote after the opening one must end the line
    let mut escaped = false;
    for (i, c) in quoted.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return (i + 1 == quoted.len()).then_some(key),
            _ => {}
        }
    }
    None
}

/// Format one header line, escaping quotes and backslashes
///
/// Control characters cannot survive a tag pair and are written as spaces.
pub(crate) fn format_header_line(key: &str, value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            c if c.is_control() => escaped.push(' '),
            c => escaped.push(c),
        }
    }
    format!("[{key} \"{escaped}\"]")
}

/// Decided result of a game
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    WhiteWins,
    BlackWins,
    Draw,
}

impl Outcome {
    /// Decode a `Result` value; `*` and anything unrecognised give `None`
    pub fn from_result(result: &str) -> Option<Outcome> {
        match shakmaty::Outcome::from_ascii(result.trim().as_bytes()).ok()? {
            shakmaty::Outcome::Decisive {
                winner: Color::White,
            } => Some(Outcome::WhiteWins),
            shakmaty::Outcome::Decisive {
                winner: Color::Black,
            } => Some(Outcome::BlackWins),
            shakmaty::Outcome::Draw => Some(Outcome::Draw),
        }
    }

    /// Movetext termination marker for an optional outcome
    pub fn termination(outcome: Option<Outcome>) -> &'static str {
        outcome.map_or("*", Outcome::as_result)
    }

    pub fn as_result(self) -> &'static str {
        match self {
            Outcome::WhiteWins => "1-0",
            Outcome::BlackWins => "0-1",
            Outcome::Draw => "1/2-1/2",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_result())
    }
}

/// Speed class of a game, derived from its time control
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speed {
    UltraBullet,
    Bullet,
    Blitz,
    Rapid,
    Classical,
    Correspondence,
}

impl Speed {
    /// Classify by estimated game duration: base time plus 40 increments
    pub fn from_seconds_and_increment(seconds: u64, increment: u64) -> Speed {
        let total = increment.saturating_mul(40).saturating_add(seconds);

        if total < 30 {
            Speed::UltraBullet
        } else if total < 180 {
            Speed::Bullet
        } else if total < 480 {
            Speed::Blitz
        } else if total < 1500 {
            Speed::Rapid
        } else if total < 21_600 {
            Speed::Classical
        } else {
            Speed::Correspondence
        }
    }

    /// Parse a `TimeControl` tag such as `300+3`; `-` means correspondence
    pub fn from_time_control(value: &str) -> Option<Speed> {
        let value = value.trim();
        if value == "-" {
            return Some(Speed::Correspondence);
        }

        let (seconds, increment) = value.split_once('+')?;
        let seconds = seconds.parse().ok()?;
        let increment = increment.parse().ok()?;
        Some(Speed::from_seconds_and_increment(seconds, increment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_key() {
        assert_eq!(tag_key("[White \"Carlsen, Magnus\"]"), Some("White"));
        assert_eq!(tag_key("  [Event \"Say \\\"hi\\\"\"]  "), Some("Event"));
        assert_eq!(tag_key("[Site \"\"]"), Some("Site"));
        assert_eq!(tag_key("[Event \"a]b\"]"), Some("Event"));
    }

    #[test]
    fn test_malformed_header_lines() {
        for line in [
            "[White Carlsen]",
            "[White \"Carlsen\"",
            "[\"Carlsen\"]",
            "[White \"Carlsen]",
            "[White \"Carlsen\" extra]",
            "[Wh-ite \"x\"]",
            "[White \"a\"b\"]",
        ] {
            assert_eq!(tag_key(line), None, "{line} should be rejected");
        }
    }

    #[test]
    fn test_format_escapes() {
        let line = format_header_line("Event", "a \"b\" \\ c");
        assert_eq!(line, "[Event \"a \\\"b\\\" \\\\ c\"]");
        assert_eq!(tag_key(&line), Some("Event"));
    }

    #[test]
    fn test_format_replaces_control_characters() {
        //! A line break inside a value would split the tag pair
        let line = format_header_line("Event", "a\nb\tc");
        assert_eq!(line, "[Event \"a b c\"]");
        assert_eq!(tag_key(&line), Some("Event"));
    }

    #[test]
    fn test_set_rejects_invalid_keys() {
        let mut headers = Headers::new();
        assert!(!headers.set("Bad Key", "x"));
        assert!(!headers.set("Event]", "x"));
        assert!(!headers.set("", "x"));
        assert!(headers.is_empty());
        assert!(headers.set("Round_2", "x"));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut headers = Headers::new();
        headers.set("Event", "A");
        headers.set("White", "W");
        headers.set("Event", "B");

        let keys: Vec<&str> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["Event", "White"]);
        assert_eq!(headers.get("Event"), Some("B"));
        assert_eq!(headers.remove("Event"), Some("B".into()));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_ratings_and_players() {
        let mut headers = Headers::new();
        headers.set("White", "Alice");
        headers.set("WhiteElo", "2100");
        headers.set("BlackElo", "?");

        assert_eq!(headers.white(), Some("Alice"));
        assert_eq!(headers.black(), None);
        assert_eq!(headers.white_elo(), Some(2100));
        assert_eq!(headers.black_elo(), None);
    }

    #[test]
    fn test_outcome() {
        let mut headers = Headers::new();
        assert_eq!(headers.result(), "*");
        assert_eq!(headers.outcome(), None);

        headers.set("Result", "1/2-1/2");
        assert_eq!(headers.outcome(), Some(Outcome::Draw));
        headers.set("Result", "0-1");
        assert_eq!(headers.outcome(), Some(Outcome::BlackWins));
        assert_eq!(Outcome::WhiteWins.to_string(), "1-0");

        headers.set("Result", "unknown");
        assert_eq!(headers.outcome(), None);
        assert_eq!(Outcome::termination(headers.outcome()), "*");
        assert_eq!(Outcome::termination(Some(Outcome::Draw)), "1/2-1/2");
    }

    #[test]
    fn test_speed_classification() {
        assert_eq!(Speed::from_time_control("15+0"), Some(Speed::UltraBullet));
        assert_eq!(Speed::from_time_control("60+0"), Some(Speed::Bullet));
        assert_eq!(Speed::from_time_control("180+2"), Some(Speed::Blitz));
        assert_eq!(Speed::from_time_control("600+5"), Some(Speed::Rapid));
        assert_eq!(Speed::from_time_control("1800+30"), Some(Speed::Classical));
        assert_eq!(Speed::from_time_control("-"), Some(Speed::Correspondence));
        assert_eq!(Speed::from_time_control("90"), None);
        assert_eq!(Speed::from_time_control("a+b"), None);
    }

    #[test]
    fn test_huge_time_control_saturates() {
        assert_eq!(
            Speed::from_time_control("461168601842738791+461168601842738791"),
            Some(Speed::Correspondence)
        );
        assert_eq!(
            Speed::from_seconds_and_increment(u64::MAX, u64::MAX),
            Speed::Correspondence
        );
    }

    #[test]
    fn test_standard_fen_counts_as_absent() {
        let mut headers = Headers::new();
        headers.set("FEN", STARTING_FEN);
        assert_eq!(headers.fen(), None);

        headers.set("FEN", "8/8/8/8/8/8/8/K6k w - - 0 1");
        assert_eq!(headers.fen(), Some("8/8/8/8/8/8/8/K6k w - - 0 1"));
    }
}
