//! Tokenizer (C2): a fixed, priority-ordered token vocabulary matched against
//! the remaining input with regex, longest/first-match-wins.
//!
//! Tokens are tried strictly in priority order and the first pattern that
//! matches at the current position wins. This is why e.g. `TK_PRSLCOMMENT`
//! must precede `TK_SLCOMMENT`, and both must precede the catch-all `TK_SN`.

use once_cell::sync::Lazy;
use phf::phf_map;
use regex::Regex;

use crate::errors::{AlgoFsmError, Result};

/// Reserved-word lookup: a `phf` map from the literal spelling to the token
/// it produces, rather than one handwritten regex per keyword.
static KEYWORDS: phf::Map<&'static str, TokenKind> = phf_map! {
    "while" => TokenKind::While,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "for" => TokenKind::For,
    "do" => TokenKind::Do,
    "case" => TokenKind::Case,
    "endcase" => TokenKind::EndCase,
    "begin" => TokenKind::Begin,
    "end" => TokenKind::End,
};

/// One entry in the fixed token table: kind, the regex it's matched with,
/// and whether a match of it should be silently discarded (comments,
/// whitespace) rather than surfaced to the parser. A `Word` entry doesn't
/// carry a fixed `kind` up front: its captured text is looked up in
/// [`KEYWORDS`], and a non-keyword word declines the match entirely so the
/// `Sentence` catch-all further down the table can claim it instead.
struct TokenSpec {
    dispatch: Dispatch,
    re: Lazy<Regex>,
    is_skip: bool,
}

enum Dispatch {
    Fixed(TokenKind),
    Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    PreservedComment,
    SlashComment,
    Whitespace,
    While,
    If,
    Else,
    For,
    Do,
    Case,
    EndCase,
    Begin,
    End,
    Tick,
    OpenParen,
    Semicolon,
    Sentence,
    Eof,
}

/// In strict priority order. Do not reorder without re-checking every rule
/// that relies on a more specific pattern shadowing `Sentence`.
static TABLE: &[TokenSpec] = &[
    TokenSpec {
        dispatch: Dispatch::Fixed(TokenKind::PreservedComment),
        re: Lazy::new(|| Regex::new(r"(?s)^(///(.*?)\n)").unwrap()),
        is_skip: false,
    },
    TokenSpec {
        dispatch: Dispatch::Fixed(TokenKind::SlashComment),
        re: Lazy::new(|| Regex::new(r"(?s)^(//(.*?)\n)").unwrap()),
        is_skip: true,
    },
    TokenSpec {
        dispatch: Dispatch::Fixed(TokenKind::Whitespace),
        re: Lazy::new(|| Regex::new(r"(?s)^(\s+)").unwrap()),
        is_skip: true,
    },
    TokenSpec {
        dispatch: Dispatch::Word,
        re: Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\b").unwrap()),
        is_skip: false,
    },
    TokenSpec {
        dispatch: Dispatch::Fixed(TokenKind::Tick),
        re: Lazy::new(|| Regex::new(r"^(`tick\b)").unwrap()),
        is_skip: false,
    },
    TokenSpec {
        dispatch: Dispatch::Fixed(TokenKind::OpenParen),
        re: Lazy::new(|| Regex::new(r"^(\()").unwrap()),
        is_skip: false,
    },
    TokenSpec {
        dispatch: Dispatch::Fixed(TokenKind::Semicolon),
        re: Lazy::new(|| Regex::new(r"^(;)").unwrap()),
        is_skip: false,
    },
    TokenSpec {
        dispatch: Dispatch::Fixed(TokenKind::Sentence),
        re: Lazy::new(|| Regex::new(r"(?s)^(.*?);").unwrap()),
        is_skip: false,
    },
];

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub loc_beg: usize,
    pub loc_end: usize,
}

pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    consumed: usize,
    pending: Option<Token>,
    last_matched: Option<Token>,
    file_base: String,
    line_base: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, file_base: impl Into<String>, line_base: usize) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            consumed: 0,
            pending: None,
            last_matched: None,
            file_base: file_base.into(),
            line_base,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.consumed >= self.bytes.len()
    }

    pub fn pos(&self) -> usize {
        self.consumed
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.consumed = pos;
        self.pending = None;
    }

    /// Consume and return one raw character (used by the paren-expression
    /// and case-expression sub-rules, which scan character-by-character
    /// rather than token-by-token).
    pub fn get_char(&mut self) -> Option<char> {
        if self.is_eof() {
            return None;
        }
        let rest = &self.input[self.consumed..];
        let c = rest.chars().next()?;
        self.consumed += c.len_utf8();
        self.pending = None;
        Some(c)
    }

    fn scan_next(&mut self) -> Result<Token> {
        let loc_beg = self.consumed;
        loop {
            if self.is_eof() {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    loc_beg,
                    loc_end: self.consumed,
                });
            }
            let rest = &self.input[self.consumed..];
            let mut matched = false;
            for spec in TABLE {
                // Only the first capture group counts towards what's
                // consumed and returned as token text. For most entries
                // that's the whole match, but `Sentence`'s group stops
                // short of the trailing `;` on purpose, leaving it for a
                // separate `Semicolon` token match right after.
                let Some(caps) = spec.re.captures(rest) else {
                    continue;
                };
                let text = caps.get(1).expect("every TABLE entry has group 1").as_str();

                let kind = match spec.dispatch {
                    Dispatch::Fixed(kind) => kind,
                    Dispatch::Word => match KEYWORDS.get(text) {
                        Some(&kind) => kind,
                        // Not a reserved word: decline the match entirely so
                        // a later entry (ultimately `Sentence`) can claim it.
                        None => continue,
                    },
                };

                let text = text.to_string();
                self.consumed += text.len();
                matched = true;
                if !spec.is_skip {
                    return Ok(Token {
                        kind,
                        text,
                        loc_beg,
                        loc_end: self.consumed.saturating_sub(1),
                    });
                }
                break;
            }
            if !matched {
                return Err(AlgoFsmError::Parse {
                    file: self.file_base.clone(),
                    line: self.line_for(self.consumed),
                    message: "no token pattern matched remaining input".to_string(),
                });
            }
        }
    }

    /// Look at (without consuming) the next significant token.
    pub fn token_ahead(&mut self) -> Result<Token> {
        if self.pending.is_none() {
            self.pending = Some(self.scan_next()?);
        }
        Ok(self.pending.clone().unwrap())
    }

    /// Consume the lookahead token iff its kind matches `kind`.
    pub fn token_match(&mut self, kind: TokenKind) -> Result<bool> {
        let tok = self.token_ahead()?;
        if tok.kind == kind {
            self.last_matched = self.pending.take();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Text of the most recently consumed token. Valid right after a
    /// successful `token_match`.
    pub fn matched_text(&self) -> &str {
        self.last_matched
            .as_ref()
            .map(|t| t.text.as_str())
            .unwrap_or("")
    }

    /// Line number (1-based, relative to `line_base`) of byte offset `pos`.
    pub fn line_for(&self, pos: usize) -> usize {
        self.line_base + self.input[..pos.min(self.input.len())].matches('\n').count() + 1
    }

    pub fn file_base(&self) -> &str {
        &self.file_base
    }

    pub fn input(&self) -> &str {
        self.input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_whitespace_and_comments() {
        let mut lex = Lexer::new("  // hi\n  if", "t", 0);
        let tok = lex.token_ahead().unwrap();
        assert_eq!(tok.kind, TokenKind::If);
    }

    #[test]
    fn preserved_comment_is_a_token() {
        let mut lex = Lexer::new("/// keep me\nif", "t", 0);
        let tok = lex.token_ahead().unwrap();
        assert_eq!(tok.kind, TokenKind::PreservedComment);
        assert_eq!(tok.text, "/// keep me\n");
    }

    #[test]
    fn sentence_stops_short_of_the_semicolon() {
        let mut lex = Lexer::new("a = b + c;", "t", 0);
        let tok = lex.token_ahead().unwrap();
        assert_eq!(tok.kind, TokenKind::Sentence);
        // The trailing `;` is left for a separate `Semicolon` token match:
        // the capture group stops before it, consuming only the text
        // that precedes the literal.
        assert_eq!(tok.text, "a = b + c");
        assert!(lex.token_match(TokenKind::Semicolon).unwrap());
    }

    #[test]
    fn eof_at_end_of_input() {
        let mut lex = Lexer::new("", "t", 0);
        let tok = lex.token_ahead().unwrap();
        assert_eq!(tok.kind, TokenKind::Eof);
    }

    #[test]
    fn token_match_consumes_only_on_hit() {
        let mut lex = Lexer::new("if (x)", "t", 0);
        assert!(!lex.token_match(TokenKind::While).unwrap());
        assert!(lex.token_match(TokenKind::If).unwrap());
        assert!(lex.token_match(TokenKind::OpenParen).unwrap());
    }

    #[test]
    fn get_char_walks_raw_bytes() {
        let mut lex = Lexer::new("(ab)", "t", 0);
        assert!(lex.token_match(TokenKind::OpenParen).unwrap());
        assert_eq!(lex.get_char(), Some('a'));
        assert_eq!(lex.get_char(), Some('b'));
        assert_eq!(lex.get_char(), Some(')'));
        assert_eq!(lex.get_char(), None);
    }
}
