use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display, Formatter},
    ops::Range,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Keyword,
    Varident,
    NumbrLiteral,
    NumbarLiteral,
    YarnLiteral,
    TroofLiteral,
    Comment,
    CommentBlockStart,
    CommentBlockEnd,
    ConcatOp,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "type")]
    pub kind: TokenKind,
    #[serde(rename = "value")]
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Token {
            kind,
            text: text.into(),
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword
    }

    /// Comment tokens are kept for tooling but never reach the parser.
    pub fn is_comment(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Comment | TokenKind::CommentBlockStart | TokenKind::CommentBlockEnd
        )
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

pub const INLINE_COMMENT: &str = "BTW";
pub const BLOCK_COMMENT_START: &str = "OBTW";
pub const BLOCK_COMMENT_END: &str = "TLDR";

pub const KEYWORDS: &[&str] = &[
    "HAI",
    "KTHXBYE",
    "WAZZUP",
    "BUHBYE",
    "I HAS A",
    "ITZ",
    "R",
    "AN",
    "A",
    "VISIBLE",
    "GIMMEH",
    "SUM OF",
    "DIFF OF",
    "PRODUKT OF",
    "QUOSHUNT OF",
    "MOD OF",
    "BIGGR OF",
    "SMALLR OF",
    "BOTH SAEM",
    "DIFFRINT",
    "BOTH OF",
    "EITHER OF",
    "WON OF",
    "NOT",
    "ALL OF",
    "ANY OF",
    "MKAY",
    "SMOOSH",
    "MAEK",
    "IS NOW A",
    "O RLY?",
    "YA RLY",
    "MEBBE",
    "NO WAI",
    "NOWAI",
    "OIC",
    "WTF?",
    "OMG",
    "OMGWTF",
    "GTFO",
    "IM IN YR",
    "IM OUTTA YR",
    "UPPIN",
    "NERFIN",
    "YR",
    "TIL",
    "WILE",
    "HOW IZ I",
    "IF U SAY SO",
    "FOUND YR",
    "I IZ",
    "NUMBR",
    "NUMBAR",
    "YARN",
    "TROOF",
    "NOOB",
];

/// Spelling variants that are normalized on the way out of the lexer.
fn canonical_keyword(keyword: &'static str) -> &'static str {
    match keyword {
        "NOWAI" => "NO WAI",
        _ => keyword,
    }
}

/// A token together with the byte range of source text it was read from.
pub type Spanned = (Range<usize>, Token);

pub fn tokenize(source: &str) -> Vec<Token> {
    tokenize_spanned(source)
        .into_iter()
        .map(|(_, token)| token)
        .collect()
}

/// Like [`tokenize`], but keeps each token's byte range in `source`. Keyword
/// text is normalized, so the range is the only way back to what was typed.
pub fn tokenize_spanned(source: &str) -> Vec<Spanned> {
    let mut tokens = Vec::new();
    let mut in_block_comment = false;
    let mut offset = 0;

    for raw in source.split_inclusive('\n') {
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);
        in_block_comment = tokenize_line(line, offset, in_block_comment, &mut tokens);
        offset += raw.len();
    }

    debug!(
        "tokenized {} tokens (block comment open at end: {})",
        tokens.len(),
        in_block_comment
    );

    tokens
}

/// Tokenizes one physical line starting at byte `offset` and returns the
/// block-comment flag to carry into the next line.
fn tokenize_line(
    line: &str,
    offset: usize,
    in_block_comment: bool,
    tokens: &mut Vec<Spanned>,
) -> bool {
    let marker = |kind, text: &str, at: usize| {
        (
            offset + at..offset + at + text.len(),
            Token::new(kind, text),
        )
    };

    if in_block_comment {
        if let Some(at) = find_word(line, BLOCK_COMMENT_END) {
            tokens.push(marker(TokenKind::CommentBlockEnd, BLOCK_COMMENT_END, at));
            return false;
        }
        return true;
    }

    let indent = line.len() - line.trim_start().len();
    if line.split_whitespace().next() == Some(BLOCK_COMMENT_START) {
        tokens.push(marker(TokenKind::CommentBlockStart, BLOCK_COMMENT_START, indent));
        // OBTW ... TLDR on one line
        let rest = indent + BLOCK_COMMENT_START.len();
        if let Some(at) = find_word(&line[rest..], BLOCK_COMMENT_END) {
            tokens.push(marker(TokenKind::CommentBlockEnd, BLOCK_COMMENT_END, rest + at));
            return false;
        }
        return true;
    }

    match find_inline_comment(line) {
        Some(split) => {
            scan_segment(&line[..split], offset, tokens);
            let comment = line[split..].trim_end();
            tokens.push(marker(TokenKind::Comment, comment, split));
        }
        None => scan_segment(line, offset, tokens),
    }

    false
}

/// Byte offset of `word` standing alone between whitespace or line ends.
fn find_word(line: &str, word: &str) -> Option<usize> {
    line.match_indices(word).map(|(at, _)| at).find(|&at| {
        let before = line[..at].chars().next_back().map_or(true, char::is_whitespace);
        let after = line[at + word.len()..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace);
        before && after
    })
}

/// Byte offset of the first whole-word `BTW` outside a string literal.
fn find_inline_comment(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let n = bytes.len();
    let keyword = INLINE_COMMENT.as_bytes();
    let mut in_string = false;
    let mut cursor = 0;

    while cursor < n {
        match bytes[cursor] {
            b':' if in_string => {
                cursor += 2;
                continue;
            }
            b'"' => in_string = !in_string,
            _ if !in_string
                && bytes[cursor..].starts_with(keyword)
                && (cursor == 0 || bytes[cursor - 1].is_ascii_whitespace())
                && (cursor + keyword.len() == n
                    || bytes[cursor + keyword.len()].is_ascii_whitespace()) =>
            {
                return Some(cursor);
            }
            _ => (),
        }
        cursor += 1;
    }

    None
}

fn scan_segment(segment: &str, offset: usize, tokens: &mut Vec<Spanned>) {
    let n = segment.len();
    let mut cursor = 0;

    loop {
        cursor += segment.as_bytes()[cursor..]
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();

        if cursor >= n {
            return;
        }

        let (end, token) = next_token(segment, cursor);
        tokens.push((offset + cursor..offset + end, token));
        cursor = end;
    }
}

fn next_token(segment: &str, start: usize) -> (usize, Token) {
    let bytes = segment.as_bytes();
    let n = bytes.len();

    if bytes[start] == b'"' {
        let mut end = start + 1;
        while end < n {
            match bytes[end] {
                b':' => end += 2,
                b'"' => {
                    return (
                        end + 1,
                        Token::new(TokenKind::YarnLiteral, &segment[start..=end]),
                    )
                }
                _ => end += 1,
            }
        }
        // Unterminated string swallows the rest of the line
        return (n, Token::new(TokenKind::Unknown, &segment[start..]));
    }

    if let Some((end, keyword)) = match_keyword(bytes, start) {
        return (end, Token::new(TokenKind::Keyword, canonical_keyword(keyword)));
    }

    let end = start
        + bytes[start..]
            .iter()
            .take_while(|b| !b.is_ascii_whitespace())
            .count();
    let word = &segment[start..end];

    (end, Token::new(classify_word(word), word))
}

/// Longest keyword that matches at `start` as whole words.
fn match_keyword(bytes: &[u8], start: usize) -> Option<(usize, &'static str)> {
    KEYWORDS
        .iter()
        .filter_map(|&keyword| match_phrase(bytes, start, keyword).map(|end| (end, keyword)))
        .max_by_key(|(_, keyword)| keyword.len())
}

fn match_phrase(bytes: &[u8], start: usize, phrase: &str) -> Option<usize> {
    let mut cursor = start;

    for (i, word) in phrase.split(' ').enumerate() {
        if i > 0 {
            let gap = bytes[cursor..]
                .iter()
                .take_while(|&&b| matches!(b, b' ' | b'\t'))
                .count();
            if gap == 0 {
                return None;
            }
            cursor += gap;
        }

        let end = cursor + word.len();
        if end > bytes.len() || &bytes[cursor..end] != word.as_bytes() {
            return None;
        }
        cursor = end;
    }

    if cursor < bytes.len() && !bytes[cursor].is_ascii_whitespace() {
        return None;
    }

    Some(cursor)
}

pub fn classify_word(word: &str) -> TokenKind {
    if is_numbr_text(word) {
        TokenKind::NumbrLiteral
    } else if is_numbar_text(word) {
        TokenKind::NumbarLiteral
    } else if word == "WIN" || word == "FAIL" {
        TokenKind::TroofLiteral
    } else if is_identifier(word) {
        TokenKind::Varident
    } else if word == "+" {
        TokenKind::ConcatOp
    } else {
        TokenKind::Unknown
    }
}

fn strip_sign(text: &str) -> &str {
    text.strip_prefix('-').unwrap_or(text)
}

/// `-?[0-9]+`
pub fn is_numbr_text(text: &str) -> bool {
    let digits = strip_sign(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `-?[0-9]+\.[0-9]+`
pub fn is_numbar_text(text: &str) -> bool {
    match strip_sign(text).split_once('.') {
        Some((whole, fraction)) => {
            !whole.is_empty()
                && !fraction.is_empty()
                && whole.bytes().all(|b| b.is_ascii_digit())
                && fraction.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(text: &str) -> bool {
    let mut bytes = text.bytes();
    match bytes.next() {
        Some(first) if first.is_ascii_alphabetic() || first == b'_' => {
            bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
        }
        _ => false,
    }
}
