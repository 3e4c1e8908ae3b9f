// src/core/parser.rs

//! # Module Parser
//!
//! Static, side-effect free parsing of module bodies. This is the loader's validity check:
//! a module that does not parse is never executed.
//!
//! Parsing happens in two passes:
//!
//! 1. **Scanning** splits the text into simple commands made of quote-aware words, tracking
//!    single/double quotes, backticks, `$(...)`/`(...)` groups, `${...}` expansions and
//!    here-documents. Anything left open at end of input is a [`ValidationError`].
//! 2. **Structuring** walks the commands, balancing block keywords that appear in command
//!    position (`if`/`fi`, `case`/`esac`, loops/`done`, `{`/`}`) and turning every top-level
//!    unit into a [`Statement`]. The forms the loader understands natively (assignments,
//!    aliases, functions, `require`, `source`, ...) get their own variants; everything else
//!    is kept verbatim as a snippet.

use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

/// Why a module failed the static validity check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct ValidationError {
    pub line: usize,
    pub reason: String,
}

impl ValidationError {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// The right-hand side of an assignment or alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    /// The value with shell quoting removed.
    pub text: String,
    /// False when the value was single-quoted and must not be expanded.
    pub expand: bool,
}

/// A top-level unit of a module, tagged with the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub line: usize,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// `NAME=v`, `export NAME[=v]`, `readonly NAME[=v]`. `value: None` only updates flags.
    Assign {
        name: String,
        value: Option<Value>,
        exported: bool,
        readonly: bool,
    },
    Unset(Vec<String>),
    Alias { name: String, value: Value },
    Unalias(Vec<String>),
    /// A function definition, kept verbatim.
    Function { name: String, source: String },
    Require(Vec<String>),
    Source(String),
    /// Anything else, passed through to the shell untouched.
    Snippet(String),
}

/// Parses a module body into statements.
pub fn parse(source: &str) -> Result<Vec<Statement>, ValidationError> {
    let commands = Scanner::new(source).scan()?;
    Structurer::new(source).run(&commands)
}

/// Runs the static validity check without keeping the statements.
pub fn validate(source: &str) -> Result<(), ValidationError> {
    parse(source).map(|_| ())
}

/// Returns true for valid shell variable names.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// --- Pass 1: Scanning ---

#[derive(Debug, Clone)]
struct Word {
    raw: String,
    text: String,
}

#[derive(Debug)]
struct SimpleCommand {
    words: Vec<Word>,
    start: usize,
    end: usize,
    line: usize,
    /// Followed by `&&`, `||` or `|`.
    joined: bool,
}

#[derive(Debug, Default)]
struct PendingCommand {
    words: Vec<Word>,
    start: usize,
    end: usize,
    line: usize,
}

impl PendingCommand {
    fn push(&mut self, word: Word, start: usize, end: usize, line: usize) {
        if self.words.is_empty() {
            self.start = start;
            self.line = line;
        }
        self.end = end;
        self.words.push(word);
    }
}

#[derive(Debug)]
struct PendingWord {
    raw: String,
    text: String,
    start: usize,
    end: usize,
    line: usize,
}

#[derive(Debug)]
struct Heredoc {
    delimiter: String,
    strip_tabs: bool,
    line: usize,
}

struct Scanner<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
    pos: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let (i, c) = self.chars.next()?;
        self.pos = i + c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn scan(mut self) -> Result<Vec<SimpleCommand>, ValidationError> {
        let mut commands = Vec::new();
        let mut cmd = PendingCommand::default();
        let mut word: Option<PendingWord> = None;
        let mut heredocs: Vec<Heredoc> = Vec::new();

        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    finish_word(&mut word, &mut cmd);
                    self.bump();
                }
                '\n' => {
                    finish_word(&mut word, &mut cmd);
                    self.bump();
                    if !heredocs.is_empty() {
                        self.read_heredoc_bodies(&mut heredocs)?;
                        if !cmd.words.is_empty() {
                            cmd.end = self.pos;
                        }
                    }
                    finish_command(&mut cmd, &mut commands, false);
                }
                '#' if word.is_none() => self.skip_comment(),
                ';' => {
                    finish_word(&mut word, &mut cmd);
                    self.bump();
                    if matches!(self.peek(), Some(';' | '&')) {
                        self.bump();
                    }
                    finish_command(&mut cmd, &mut commands, false);
                }
                '&' if self.peek_second() == Some('&') => {
                    finish_word(&mut word, &mut cmd);
                    self.bump();
                    self.bump();
                    finish_command(&mut cmd, &mut commands, true);
                }
                '&' if !ampersand_is_redirect(word.as_ref()) && self.peek_second() != Some('>') => {
                    finish_word(&mut word, &mut cmd);
                    self.bump();
                    finish_command(&mut cmd, &mut commands, false);
                }
                '|' => {
                    finish_word(&mut word, &mut cmd);
                    self.bump();
                    if matches!(self.peek(), Some('|' | '&')) {
                        self.bump();
                    }
                    finish_command(&mut cmd, &mut commands, true);
                }
                '<' if self.peek_second() == Some('<') => {
                    finish_word(&mut word, &mut cmd);
                    self.scan_heredoc_operator(&mut cmd, &mut heredocs)?;
                }
                _ => {
                    let (pos, line) = (self.pos_of_next(), self.line);
                    let w = word.get_or_insert_with(|| PendingWord {
                        raw: String::new(),
                        text: String::new(),
                        start: pos,
                        end: pos,
                        line,
                    });
                    self.scan_word_part(w)?;
                }
            }
        }

        finish_word(&mut word, &mut cmd);
        if let Some(doc) = heredocs.first() {
            return Err(ValidationError::new(
                doc.line,
                format!("unterminated here-document '{}'", doc.delimiter),
            ));
        }
        finish_command(&mut cmd, &mut commands, false);
        Ok(commands)
    }

    fn pos_of_next(&mut self) -> usize {
        self.chars.peek().map_or(self.src.len(), |&(i, _)| i)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    /// Consumes one syntactic piece of a word: a quoted string, an escape, a group,
    /// a `${...}` expansion, or a single plain character.
    fn scan_word_part(&mut self, w: &mut PendingWord) -> Result<(), ValidationError> {
        match self.peek() {
            Some('\'') => {
                let start_line = self.line;
                self.bump();
                w.raw.push('\'');
                loop {
                    match self.bump() {
                        None => {
                            return Err(ValidationError::new(start_line, "unterminated single quote"));
                        }
                        Some('\'') => {
                            w.raw.push('\'');
                            break;
                        }
                        Some(c) => {
                            w.raw.push(c);
                            w.text.push(c);
                        }
                    }
                }
            }
            Some('"') => self.scan_double_quoted(w)?,
            Some('`') => {
                let mut buf = String::new();
                self.bump();
                buf.push('`');
                self.until_verbatim('`', &mut buf, "backtick")?;
                w.raw.push_str(&buf);
                w.text.push_str(&buf);
            }
            Some('\\') => {
                self.bump();
                match self.bump() {
                    None => w.raw.push('\\'),
                    Some('\n') => w.raw.push_str("\\\n"),
                    Some(c) => {
                        w.raw.push('\\');
                        w.raw.push(c);
                        w.text.push(c);
                    }
                }
            }
            Some('(') => {
                let mut buf = String::new();
                self.group_verbatim(&mut buf)?;
                w.raw.push_str(&buf);
                w.text.push_str(&buf);
            }
            Some('$') if self.peek_second() == Some('{') => {
                let mut buf = String::new();
                self.braced_expansion(&mut buf)?;
                w.raw.push_str(&buf);
                w.text.push_str(&buf);
            }
            Some(c) => {
                self.bump();
                w.raw.push(c);
                w.text.push(c);
            }
            None => {}
        }
        w.end = self.pos;
        Ok(())
    }

    fn scan_double_quoted(&mut self, w: &mut PendingWord) -> Result<(), ValidationError> {
        let start_line = self.line;
        self.bump();
        w.raw.push('"');
        loop {
            match self.bump() {
                None => return Err(ValidationError::new(start_line, "unterminated double quote")),
                Some('"') => {
                    w.raw.push('"');
                    return Ok(());
                }
                Some('\\') => match self.bump() {
                    None => {
                        return Err(ValidationError::new(start_line, "unterminated double quote"));
                    }
                    Some('\n') => w.raw.push_str("\\\n"),
                    Some(n @ ('$' | '`' | '"' | '\\')) => {
                        w.raw.push('\\');
                        w.raw.push(n);
                        w.text.push(n);
                    }
                    Some(n) => {
                        w.raw.push('\\');
                        w.raw.push(n);
                        w.text.push('\\');
                        w.text.push(n);
                    }
                },
                Some('$') if self.peek() == Some('(') => {
                    let mut buf = String::from("$");
                    self.group_verbatim(&mut buf)?;
                    w.raw.push_str(&buf);
                    w.text.push_str(&buf);
                }
                Some('`') => {
                    let mut buf = String::from("`");
                    self.until_verbatim('`', &mut buf, "backtick")?;
                    w.raw.push_str(&buf);
                    w.text.push_str(&buf);
                }
                Some(c) => {
                    w.raw.push(c);
                    w.text.push(c);
                }
            }
        }
    }

    /// Copies a balanced `( ... )` group. Expects the next char to be `(`.
    fn group_verbatim(&mut self, buf: &mut String) -> Result<(), ValidationError> {
        let start_line = self.line;
        let mut depth = 0usize;
        loop {
            let Some(c) = self.bump() else {
                return Err(ValidationError::new(start_line, "unterminated '(' group"));
            };
            buf.push(c);
            match c {
                '(' => depth += 1,
                ')' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                '\'' => self.until_verbatim('\'', buf, "single quote")?,
                '"' => self.double_verbatim(buf)?,
                '`' => self.until_verbatim('`', buf, "backtick")?,
                '\\' => {
                    if let Some(n) = self.bump() {
                        buf.push(n);
                    }
                }
                _ => {}
            }
        }
    }

    fn double_verbatim(&mut self, buf: &mut String) -> Result<(), ValidationError> {
        let start_line = self.line;
        loop {
            match self.bump() {
                None => return Err(ValidationError::new(start_line, "unterminated double quote")),
                Some('"') => {
                    buf.push('"');
                    return Ok(());
                }
                Some('\\') => {
                    buf.push('\\');
                    if let Some(n) = self.bump() {
                        buf.push(n);
                    }
                }
                Some('$') if self.peek() == Some('(') => {
                    buf.push('$');
                    self.group_verbatim(buf)?;
                }
                Some(c) => buf.push(c),
            }
        }
    }

    /// Copies everything up to and including `close`. Single quotes take no escapes.
    fn until_verbatim(&mut self, close: char, buf: &mut String, what: &str) -> Result<(), ValidationError> {
        let start_line = self.line;
        loop {
            match self.bump() {
                None => {
                    return Err(ValidationError::new(start_line, format!("unterminated {}", what)));
                }
                Some('\\') if close != '\'' => {
                    buf.push('\\');
                    if let Some(n) = self.bump() {
                        buf.push(n);
                    }
                }
                Some(c) => {
                    buf.push(c);
                    if c == close {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn braced_expansion(&mut self, buf: &mut String) -> Result<(), ValidationError> {
        let start_line = self.line;
        let mut depth = 0usize;
        loop {
            let Some(c) = self.bump() else {
                return Err(ValidationError::new(start_line, "unterminated '${' expansion"));
            };
            buf.push(c);
            match c {
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                '\'' => self.until_verbatim('\'', buf, "single quote")?,
                '"' => self.double_verbatim(buf)?,
                _ => {}
            }
        }
    }

    fn scan_heredoc_operator(
        &mut self,
        cmd: &mut PendingCommand,
        heredocs: &mut Vec<Heredoc>,
    ) -> Result<(), ValidationError> {
        let start = self.pos_of_next();
        let line = self.line;
        self.bump();
        self.bump();

        // `<<<` is a here-string, not a here-document.
        if self.peek() == Some('<') {
            self.bump();
            let op = Word {
                raw: "<<<".to_string(),
                text: "<<<".to_string(),
            };
            cmd.push(op, start, self.pos, line);
            return Ok(());
        }

        let strip_tabs = self.peek() == Some('-');
        if strip_tabs {
            self.bump();
        }
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }

        let mut delimiter = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ';' | '&' | '|' | ')' | '<' | '>') {
                break;
            }
            self.bump();
            if !matches!(c, '\'' | '"' | '\\') {
                delimiter.push(c);
            }
        }
        if delimiter.is_empty() {
            return Err(ValidationError::new(line, "here-document operator without a delimiter"));
        }

        let raw = self.src.get(start..self.pos).unwrap_or_default().to_string();
        cmd.push(
            Word {
                text: raw.clone(),
                raw,
            },
            start,
            self.pos,
            line,
        );
        heredocs.push(Heredoc {
            delimiter,
            strip_tabs,
            line,
        });
        Ok(())
    }

    fn read_heredoc_bodies(&mut self, heredocs: &mut Vec<Heredoc>) -> Result<(), ValidationError> {
        for doc in heredocs.iter() {
            loop {
                if self.peek().is_none() {
                    return Err(ValidationError::new(
                        doc.line,
                        format!("unterminated here-document '{}'", doc.delimiter),
                    ));
                }
                let mut body_line = String::new();
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                    body_line.push(c);
                }
                let candidate = if doc.strip_tabs {
                    body_line.trim_start_matches('\t')
                } else {
                    body_line.as_str()
                };
                if candidate.trim_end_matches('\r') == doc.delimiter {
                    break;
                }
            }
        }
        heredocs.clear();
        Ok(())
    }
}

fn finish_word(word: &mut Option<PendingWord>, cmd: &mut PendingCommand) {
    if let Some(w) = word.take() {
        let (start, end, line) = (w.start, w.end, w.line);
        cmd.push(
            Word {
                raw: w.raw,
                text: w.text,
            },
            start,
            end,
            line,
        );
    }
}

fn finish_command(cmd: &mut PendingCommand, commands: &mut Vec<SimpleCommand>, joined: bool) {
    let done = std::mem::take(cmd);
    if done.words.is_empty() {
        return;
    }
    commands.push(SimpleCommand {
        words: done.words,
        start: done.start,
        end: done.end,
        line: done.line,
        joined,
    });
}

/// `2>&1`, `>&2`: an ampersand right after a redirection belongs to the word.
fn ampersand_is_redirect(word: Option<&PendingWord>) -> bool {
    word.is_some_and(|w| w.raw.ends_with('>') || w.raw.ends_with('<'))
}

// --- Pass 2: Structuring ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Loop,
    Case,
    Brace,
}

#[derive(Debug)]
struct OpenBlock {
    kind: BlockKind,
    opener: String,
    line: usize,
}

#[derive(Debug)]
struct OpenUnit {
    start: usize,
    line: usize,
    function: Option<String>,
}

struct Structurer<'a> {
    src: &'a str,
    stack: Vec<OpenBlock>,
    /// A function header whose body has not started yet: (name, line).
    pending_function: Option<(String, usize)>,
}

impl<'a> Structurer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            stack: Vec::new(),
            pending_function: None,
        }
    }

    fn is_closed(&self) -> bool {
        self.stack.is_empty() && self.pending_function.is_none()
    }

    fn span(&self, start: usize, end: usize) -> String {
        self.src.get(start..end).unwrap_or_default().trim().to_string()
    }

    fn run(mut self, commands: &[SimpleCommand]) -> Result<Vec<Statement>, ValidationError> {
        let mut statements = Vec::new();
        let mut unit: Option<OpenUnit> = None;

        // Group simple commands joined by `&&`, `||` or `|` into lists.
        let mut lists: Vec<&[SimpleCommand]> = Vec::new();
        let mut list_start = 0;
        for (i, cmd) in commands.iter().enumerate() {
            if !cmd.joined {
                if let Some(list) = commands.get(list_start..=i) {
                    lists.push(list);
                }
                list_start = i + 1;
            }
        }
        if let Some(rest) = commands.get(list_start..) {
            if !rest.is_empty() {
                lists.push(rest);
            }
        }

        for list in lists {
            let (Some(first), Some(last)) = (list.first(), list.last()) else {
                continue;
            };
            let top_level = self.is_closed();
            let mut function_name = None;
            for cmd in list {
                let found = self.apply_keywords(cmd)?;
                if function_name.is_none() {
                    function_name = found;
                }
            }

            if top_level {
                if self.is_closed() {
                    let source = self.span(first.start, last.end);
                    let kind = match function_name {
                        Some(name) => StatementKind::Function { name, source },
                        None if list.len() == 1 => {
                            statements.extend(self.interpret(first)?);
                            continue;
                        }
                        None => StatementKind::Snippet(source),
                    };
                    statements.push(Statement {
                        line: first.line,
                        kind,
                    });
                } else {
                    unit = Some(OpenUnit {
                        start: first.start,
                        line: first.line,
                        function: function_name,
                    });
                }
            } else if self.is_closed() {
                if let Some(open) = unit.take() {
                    let source = self.span(open.start, last.end);
                    let kind = match open.function {
                        Some(name) => StatementKind::Function { name, source },
                        None => StatementKind::Snippet(source),
                    };
                    statements.push(Statement {
                        line: open.line,
                        kind,
                    });
                }
            }
        }

        if let Some((name, line)) = self.pending_function.take() {
            return Err(ValidationError::new(line, format!("function '{}' has no body", name)));
        }
        if let Some(block) = self.stack.last() {
            return Err(ValidationError::new(
                block.line,
                format!("unterminated '{}' block", block.opener),
            ));
        }
        Ok(statements)
    }

    /// Tracks block keywords in command position. Returns the name of a function whose
    /// header appears in this command.
    fn apply_keywords(&mut self, cmd: &SimpleCommand) -> Result<Option<String>, ValidationError> {
        let words = &cmd.words;
        let mut idx = 0;
        let mut defined = None;

        if let Some((name, header_line)) = self.pending_function.take() {
            match words.first().map(|w| w.raw.as_str()) {
                Some("{") => {
                    self.open(BlockKind::Brace, "{", cmd.line);
                    idx = 1;
                }
                Some(raw) if raw.starts_with('(') => return Ok(None),
                _ => {
                    return Err(ValidationError::new(
                        header_line,
                        format!("function '{}' has no body", name),
                    ));
                }
            }
        }

        // Where a case pattern like `darwin*)` may sit: command start, or right after `in`.
        let mut pattern_at = 0;

        while let Some(word) = words.get(idx) {
            let raw = word.raw.as_str();
            if idx == pattern_at && raw.ends_with(')') && self.innermost_is(BlockKind::Case) {
                idx += 1;
                continue;
            }
            match raw {
                "then" | "do" | "else" | "elif" | "!" | "time" => idx += 1,
                "if" => {
                    self.open(BlockKind::If, raw, cmd.line);
                    idx += 1;
                }
                "while" | "until" => {
                    self.open(BlockKind::Loop, raw, cmd.line);
                    idx += 1;
                }
                "for" | "select" | "foreach" | "repeat" => {
                    self.open(BlockKind::Loop, raw, cmd.line);
                    break;
                }
                "case" => {
                    self.open(BlockKind::Case, raw, cmd.line);
                    if words.get(idx + 2).map(|w| w.raw.as_str()) != Some("in") {
                        break;
                    }
                    idx += 3;
                    pattern_at = idx;
                }
                "{" => {
                    self.open(BlockKind::Brace, raw, cmd.line);
                    idx += 1;
                }
                "fi" => return self.close(BlockKind::If, raw, cmd.line).map(|_| defined),
                "done" => return self.close(BlockKind::Loop, raw, cmd.line).map(|_| defined),
                "esac" => return self.close(BlockKind::Case, raw, cmd.line).map(|_| defined),
                "}" => return self.close(BlockKind::Brace, raw, cmd.line).map(|_| defined),
                _ => {
                    let Some((name, next)) = function_header(words, idx) else {
                        break;
                    };
                    defined = Some(name.clone());
                    match words.get(next).map(|w| w.raw.as_str()) {
                        Some("{") => {
                            self.open(BlockKind::Brace, "{", cmd.line);
                            idx = next + 1;
                        }
                        Some(body) if body.starts_with('(') => break,
                        Some(_) => {
                            return Err(ValidationError::new(
                                cmd.line,
                                format!("function '{}' has no body", name),
                            ));
                        }
                        None => {
                            self.pending_function = Some((name, cmd.line));
                            break;
                        }
                    }
                }
            }
        }
        Ok(defined)
    }

    fn innermost_is(&self, kind: BlockKind) -> bool {
        self.stack.last().is_some_and(|block| block.kind == kind)
    }

    fn open(&mut self, kind: BlockKind, opener: &str, line: usize) {
        self.stack.push(OpenBlock {
            kind,
            opener: opener.to_string(),
            line,
        });
    }

    fn close(&mut self, kind: BlockKind, closer: &str, line: usize) -> Result<(), ValidationError> {
        match self.stack.pop() {
            Some(block) if block.kind == kind => Ok(()),
            Some(block) => Err(ValidationError::new(
                line,
                format!(
                    "'{}' closes the '{}' block opened at line {}",
                    closer, block.opener, block.line
                ),
            )),
            None => Err(ValidationError::new(line, format!("unexpected '{}'", closer))),
        }
    }

    /// Turns a standalone top-level command into statements.
    fn interpret(&self, cmd: &SimpleCommand) -> Result<Vec<Statement>, ValidationError> {
        let line = cmd.line;
        let snippet = || {
            vec![Statement {
                line,
                kind: StatementKind::Snippet(self.span(cmd.start, cmd.end)),
            }]
        };
        let Some((head, args)) = cmd.words.split_first() else {
            return Ok(Vec::new());
        };
        let has_flags = args.iter().any(|w| w.raw.starts_with('-'));
        let wrap = |kinds: Vec<StatementKind>| {
            kinds
                .into_iter()
                .map(|kind| Statement { line, kind })
                .collect::<Vec<_>>()
        };

        let statements = match head.raw.as_str() {
            "export" | "readonly" if !args.is_empty() && !has_flags => {
                let exported = head.raw == "export";
                let mut kinds = Vec::new();
                for word in args {
                    match split_assignment(word) {
                        Some((name, value)) if !value.text.starts_with('(') => {
                            kinds.push(StatementKind::Assign {
                                name,
                                value: Some(value),
                                exported,
                                readonly: !exported,
                            });
                        }
                        None if is_identifier(&word.text) => kinds.push(StatementKind::Assign {
                            name: word.text.clone(),
                            value: None,
                            exported,
                            readonly: !exported,
                        }),
                        _ => return Ok(snippet()),
                    }
                }
                wrap(kinds)
            }
            "unset" if !args.is_empty() && !has_flags => {
                wrap(vec![StatementKind::Unset(texts(args))])
            }
            "alias" if !args.is_empty() && !has_flags => {
                let mut kinds = Vec::new();
                for word in args {
                    let Some((name, value)) = word.text.split_once('=') else {
                        return Ok(snippet());
                    };
                    if name.is_empty() {
                        return Ok(snippet());
                    }
                    kinds.push(StatementKind::Alias {
                        name: name.to_string(),
                        value: Value {
                            text: value.to_string(),
                            expand: !is_literal(raw_value(word)),
                        },
                    });
                }
                wrap(kinds)
            }
            "unalias" if !args.is_empty() && !has_flags => {
                wrap(vec![StatementKind::Unalias(texts(args))])
            }
            "require" => {
                if args.is_empty() {
                    return Err(ValidationError::new(line, "'require' expects at least one name"));
                }
                wrap(vec![StatementKind::Require(texts(args))])
            }
            "source" | "." => match args {
                [] => return Err(ValidationError::new(line, format!("'{}' expects a file", head.raw))),
                [path] => wrap(vec![StatementKind::Source(path.text.clone())]),
                _ => snippet(),
            },
            _ if args.is_empty() => match split_assignment(head) {
                Some((name, value)) if !value.text.starts_with('(') => {
                    wrap(vec![StatementKind::Assign {
                        name,
                        value: Some(value),
                        exported: false,
                        readonly: false,
                    }])
                }
                _ => snippet(),
            },
            _ => snippet(),
        };
        Ok(statements)
    }
}

/// Recognizes `name()`, `name ()` and `function name [()]` at `idx`.
/// Returns the function name and the index of the word after the header.
fn function_header(words: &[Word], idx: usize) -> Option<(String, usize)> {
    let word = words.get(idx)?;
    if word.raw == "function" {
        let name_word = words.get(idx + 1)?;
        let name = name_word.raw.strip_suffix("()").unwrap_or(&name_word.raw);
        let mut next = idx + 2;
        if words.get(next).is_some_and(|w| w.raw == "()") {
            next += 1;
        }
        return (!name.is_empty()).then(|| (name.to_string(), next));
    }
    if let Some(name) = word.raw.strip_suffix("()") {
        if !name.is_empty() && is_function_name(name) {
            return Some((name.to_string(), idx + 1));
        }
    }
    if words.get(idx + 1).is_some_and(|w| w.raw == "()") && is_function_name(&word.raw) {
        return Some((word.raw.clone(), idx + 2));
    }
    None
}

fn is_function_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '+' | '@'))
}

fn split_assignment(word: &Word) -> Option<(String, Value)> {
    let (name, value) = word.text.split_once('=')?;
    if !is_identifier(name) {
        return None;
    }
    Some((
        name.to_string(),
        Value {
            text: value.to_string(),
            expand: !is_literal(raw_value(word)),
        },
    ))
}

/// The quoted form of whatever follows the first `=`.
fn raw_value(word: &Word) -> &str {
    word.raw.split_once('=').map_or("", |(_, v)| v)
}

/// True for single-quoted values with nothing left outside the quotes for the shell to
/// expand: `'$HOME/x'` and `'a'b` are literal, `"it's"` and `'a'$B` are not.
fn is_literal(raw: &str) -> bool {
    let mut quoted = false;
    let (mut in_single, mut in_double, mut escaped) = (false, false, false);
    for c in raw.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\'' if !in_double => {
                in_single = !in_single;
                quoted = true;
            }
            '"' if !in_single => in_double = !in_double,
            '\\' if !in_single => escaped = true,
            '$' | '`' if !in_single => return false,
            '~' if !in_single && !in_double => return false,
            _ => {}
        }
    }
    quoted
}

fn texts(words: &[Word]) -> Vec<String> {
    words.iter().map(|w| w.text.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<StatementKind> {
        parse(source).unwrap().into_iter().map(|s| s.kind).collect()
    }

    // --- Recognized forms ---

    #[test]
    fn test_assignments_and_exports() {
        let parsed = kinds("EDITOR=nvim\nexport PAGER=\"less -R\" LANG\nreadonly TOKEN='$x'\n");
        assert_eq!(
            parsed,
            vec![
                StatementKind::Assign {
                    name: "EDITOR".into(),
                    value: Some(Value { text: "nvim".into(), expand: true }),
                    exported: false,
                    readonly: false,
                },
                StatementKind::Assign {
                    name: "PAGER".into(),
                    value: Some(Value { text: "less -R".into(), expand: true }),
                    exported: true,
                    readonly: false,
                },
                StatementKind::Assign {
                    name: "LANG".into(),
                    value: None,
                    exported: true,
                    readonly: false,
                },
                StatementKind::Assign {
                    name: "TOKEN".into(),
                    value: Some(Value { text: "$x".into(), expand: false }),
                    exported: false,
                    readonly: true,
                },
            ]
        );
    }

    #[test]
    fn test_alias_unalias_and_require() {
        let parsed = kinds("alias ll='ls -la' gs=\"git status\"\nunalias la\nrequire git_root\n");
        assert_eq!(parsed.len(), 4);
        assert_eq!(
            parsed[0],
            StatementKind::Alias {
                name: "ll".into(),
                value: Value { text: "ls -la".into(), expand: false },
            }
        );
        assert_eq!(parsed[2], StatementKind::Unalias(vec!["la".into()]));
        assert_eq!(parsed[3], StatementKind::Require(vec!["git_root".into()]));
    }

    #[test]
    fn test_only_single_quoted_values_are_literal() {
        let parsed = kinds(
            "alias gl=\"git log '$FMT'\"\nalias ll='ls $HOME'\nMSG=\"it's\"\nMIX='a'$B\nLIT='a'b\n",
        );
        let expands: Vec<_> = parsed
            .iter()
            .map(|k| match k {
                StatementKind::Alias { value, .. } => value.expand,
                StatementKind::Assign { value: Some(value), .. } => value.expand,
                other => panic!("unexpected statement {:?}", other),
            })
            .collect();
        assert_eq!(expands, vec![true, false, true, true, false]);
        if let StatementKind::Alias { value, .. } = &parsed[0] {
            assert_eq!(value.text, "git log '$FMT'");
        }
    }

    #[test]
    fn test_function_forms() {
        let source = "greet() { echo hi; }\nfunction mkcd {\n  mkdir -p \"$1\" && cd \"$1\"\n}\nup ()\n{\n  cd ..\n}\n";
        let parsed = parse(source).unwrap();
        let names: Vec<_> = parsed
            .iter()
            .filter_map(|s| match &s.kind {
                StatementKind::Function { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["greet", "mkcd", "up"]);
        assert_eq!(parsed[1].line, 2);
        if let StatementKind::Function { source, .. } = &parsed[1].kind {
            assert!(source.starts_with("function mkcd {"));
            assert!(source.ends_with('}'));
        }
    }

    #[test]
    fn test_compound_blocks_become_snippets() {
        let source = "if [ -d \"$HOME/bin\" ]; then\n  PATH=\"$HOME/bin:$PATH\"\nfi\nfor f in a b; do echo $f; done\n[ -n \"$X\" ] && export Y=1\n";
        let parsed = kinds(source);
        assert_eq!(parsed.len(), 3);
        assert!(parsed.iter().all(|k| matches!(k, StatementKind::Snippet(_))));
        if let StatementKind::Snippet(text) = &parsed[0] {
            assert!(text.starts_with("if ["));
            assert!(text.ends_with("fi"));
        }
    }

    #[test]
    fn test_case_with_patterns() {
        let source = "case \"$TERM\" in\n  xterm*|rxvt*) export COLOR=1 ;;\n  (dumb) unset COLOR ;;\n  *) ;;\nesac\n";
        assert_eq!(kinds(source).len(), 1);
    }

    #[test]
    fn test_blocks_inside_case_arms() {
        let source = "case \"$OSTYPE\" in\n  darwin*) if true; then export A=1; fi ;;\n  linux*|freebsd*) for d in a b; do :; done ;;\n  (msys) { echo win; } ;;\n  *) ;;\nesac\n";
        assert!(validate(source).is_ok());
        let parsed = kinds(source);
        assert_eq!(parsed.len(), 1);
        assert!(matches!(parsed[0], StatementKind::Snippet(_)));

        let one_line = "case $x in a) while false; do :; done ;; esac\n";
        assert!(validate(one_line).is_ok());

        let broken = "case $x in\n  a) if true; then :; ;;\nesac\n";
        let err = validate(broken).unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.reason.contains("'esac' closes the 'if' block"));
    }

    #[test]
    fn test_heredoc_body_is_not_scanned() {
        let source = "cat <<'EOF' > /tmp/x\nif this were code it would be unbalanced\n'\nEOF\nexport DONE=1\n";
        let parsed = kinds(source);
        assert_eq!(parsed.len(), 2);
        assert!(matches!(parsed[1], StatementKind::Assign { .. }));
    }

    #[test]
    fn test_comments_substitutions_and_redirects() {
        let source = "# comment with ' quote\nexport BRANCH=\"$(git branch --show-current 2>/dev/null)\"\nls >/dev/null 2>&1 &\nPATH=${PATH:-/usr/bin} \n";
        let parsed = kinds(source);
        assert_eq!(parsed.len(), 3);
        assert!(matches!(parsed[1], StatementKind::Snippet(_)));
    }

    #[test]
    fn test_array_assignment_is_passed_through() {
        let parsed = kinds("path=(~/bin $path)\n");
        assert!(matches!(parsed[0], StatementKind::Snippet(_)));
    }

    // --- Validation failures ---

    #[test]
    fn test_unterminated_quotes() {
        let err = validate("echo ok\necho 'oops\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.reason.contains("single quote"));

        let err = validate("export A=\"x\n").unwrap_err();
        assert!(err.reason.contains("double quote"));
    }

    #[test]
    fn test_unterminated_blocks() {
        let err = validate("if true; then\n  echo\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.reason.contains("'if'"));

        let err = validate("greet() {\n  echo hi\n").unwrap_err();
        assert!(err.reason.contains("unterminated"));
    }

    #[test]
    fn test_mismatched_and_unexpected_closers() {
        let err = validate("for x in 1; do\n  echo\nfi\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.reason.contains("'fi' closes the 'for'"));

        let err = validate("echo\ndone\n").unwrap_err();
        assert!(err.reason.contains("unexpected 'done'"));
    }

    #[test]
    fn test_unterminated_heredoc_and_group() {
        assert!(validate("cat <<EOF\nnever closed\n").is_err());
        assert!(validate("x=$(date\n").is_err());
    }

    #[test]
    fn test_function_without_body() {
        let err = validate("broken()\necho nope\n").unwrap_err();
        assert!(err.reason.contains("no body"));
    }

    #[test]
    fn test_require_and_source_need_arguments() {
        assert!(validate("require\n").is_err());
        assert!(validate("source\n").is_err());
    }

    #[test]
    fn test_keywords_as_arguments_are_ignored() {
        assert!(validate("echo if for done fi\nalias fi='echo'\n").is_ok());
    }
}
