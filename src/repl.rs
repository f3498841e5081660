use nu_ansi_term::{Color, Style};
use reedline::{
    Highlighter, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus,
    StyledText, ValidationResult, Validator,
};
use std::borrow::Cow;

use crate::tokenizer::{tokenize_spanned, TokenKind};

#[derive(Clone)]
pub struct REPLPrompt;

impl Prompt for REPLPrompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Borrowed("lol")
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _edit_mode: PromptEditMode) -> Cow<str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed("  ... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!(
            "({}reverse-search: {}) ",
            prefix, history_search.term
        ))
    }
}

/// A buffer is complete once its last non-blank line is `KTHXBYE`, so a whole
/// program can be typed before anything runs.
pub struct REPLValidator;

impl Validator for REPLValidator {
    fn validate(&self, line: &str) -> ValidationResult {
        let last = line.lines().rev().map(str::trim).find(|l| !l.is_empty());

        match last {
            None => ValidationResult::Complete,
            Some(last) if last.split_whitespace().last() == Some("KTHXBYE") => {
                ValidationResult::Complete
            }
            Some(_) => ValidationResult::Incomplete,
        }
    }
}

pub static KEYWORD_COLOR: Color = Color::LightBlue;
pub static LITERAL_COLOR: Color = Color::Yellow;
pub static DEFAULT_COLOR: Color = Color::White;
pub static COMMENT_COLOR: Color = Color::DarkGray;
pub static UNKNOWN_COLOR: Color = Color::Red;

pub struct SyntaxHighlighter;

impl Highlighter for SyntaxHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled_text = StyledText::new();
        let mut last = 0;

        for (span, token) in tokenize_spanned(line) {
            if span.start > last {
                styled_text.push((
                    Style::new().fg(DEFAULT_COLOR),
                    line[last..span.start].to_string(),
                ));
            }

            let color = match token.kind {
                TokenKind::Keyword | TokenKind::ConcatOp => KEYWORD_COLOR,
                TokenKind::NumbrLiteral
                | TokenKind::NumbarLiteral
                | TokenKind::YarnLiteral
                | TokenKind::TroofLiteral => LITERAL_COLOR,
                TokenKind::Comment | TokenKind::CommentBlockStart | TokenKind::CommentBlockEnd => {
                    COMMENT_COLOR
                }
                TokenKind::Unknown => UNKNOWN_COLOR,
                TokenKind::Varident => DEFAULT_COLOR,
            };

            // Source text, not token text: keywords come back normalized
            styled_text.push((Style::new().fg(color), line[span.clone()].to_string()));
            last = span.end;
        }

        if last < line.len() {
            styled_text.push((Style::new().fg(DEFAULT_COLOR), line[last..].to_string()));
        }

        styled_text
    }
}
