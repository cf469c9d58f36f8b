//! Line parser for the module wire protocols.
//!
//! A single line may pack several GCODE instructions, e.g. `M3 S500 M123`.
//! Every GCODE token starts a new [`Command`]; the parameter tokens that
//! follow it (up to the next GCODE token) are attached to it.

use thiserror::Error;

/// Bare-word commands that do not follow the `M`/`G` + number pattern.
const BARE_WORDS: [&str; 2] = ["dfu", "version"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("parameter '{token}' appears before any gcode in line '{line}'")]
    OrphanParameter { token: String, line: String },
    #[error("unparsable token '{token}' in line '{line}'")]
    InvalidToken { token: String, line: String },
}

/// Value attached to a single-letter parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    /// Non-numeric payload such as a hex string (`L7031302e`).
    Text(String),
    /// Letter given without a value (`G28.2 X`).
    Flag,
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(value) => Some(*value),
            _ => None,
        }
    }
}

/// A single parsed instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    gcode: String,
    body: String,
    params: Vec<(char, ParamValue)>,
}

impl Command {
    pub fn new(gcode: impl Into<String>, body: impl Into<String>, params: Vec<(char, ParamValue)>) -> Self {
        Self {
            gcode: gcode.into(),
            body: body.into(),
            params,
        }
    }

    pub fn gcode(&self) -> &str {
        &self.gcode
    }

    /// Raw text between this gcode and the next one, trimmed.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Parameters in the order they appeared on the line.
    pub fn params(&self) -> &[(char, ParamValue)] {
        &self.params
    }

    /// Looks up a parameter; a repeated letter resolves to its last occurrence.
    pub fn param(&self, letter: char) -> Option<&ParamValue> {
        self.params
            .iter()
            .rev()
            .find(|(l, _)| *l == letter)
            .map(|(_, value)| value)
    }

    pub fn has_param(&self, letter: char) -> bool {
        self.param(letter).is_some()
    }
}

/// One-pass parser over a single line.
pub struct GCodeLineParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> GCodeLineParser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Parses the next command. After an error the parser is exhausted.
    pub fn next_command(&mut self) -> Option<Result<Command, ParseError>> {
        let src = self.src;
        let (start, end) = self.peek_token()?;
        let token = &src[start..end];
        let Some(gcode_len) = gcode_prefix_len(token) else {
            self.pos = src.len();
            return Some(Err(ParseError::OrphanParameter {
                token: token.to_string(),
                line: src.to_string(),
            }));
        };
        self.pos = end;

        let mut params = Vec::new();
        let mut body_end = end;
        let fused = &token[gcode_len..];
        if !fused.is_empty() {
            if let Err(e) = self.push_param(fused, &mut params) {
                return Some(Err(e));
            }
        }
        while let Some((tok_start, tok_end)) = self.peek_token() {
            let param = &src[tok_start..tok_end];
            if gcode_prefix_len(param).is_some() {
                break;
            }
            self.pos = tok_end;
            body_end = tok_end;
            if let Err(e) = self.push_param(param, &mut params) {
                return Some(Err(e));
            }
        }

        let body = src[start + gcode_len..body_end].trim();
        Some(Ok(Command::new(&token[..gcode_len], body, params)))
    }

    fn peek_token(&self) -> Option<(usize, usize)> {
        let bytes = self.src.as_bytes();
        let mut start = self.pos;
        while start < bytes.len() && bytes[start].is_ascii_whitespace() {
            start += 1;
        }
        if start >= bytes.len() {
            return None;
        }
        let mut end = start;
        while end < bytes.len() && !bytes[end].is_ascii_whitespace() {
            end += 1;
        }
        Some((start, end))
    }

    fn push_param(&mut self, token: &str, params: &mut Vec<(char, ParamValue)>) -> Result<(), ParseError> {
        match parse_param(token) {
            Some(parsed) => {
                params.extend(parsed);
                Ok(())
            }
            None => {
                self.pos = self.src.len();
                Err(ParseError::InvalidToken {
                    token: token.to_string(),
                    line: self.src.to_string(),
                })
            }
        }
    }
}

impl Iterator for GCodeLineParser<'_> {
    type Item = Result<Command, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_command()
    }
}

/// Parses a whole line. Any bad token rejects the entire line.
pub fn parse_line(line: &str) -> Result<Vec<Command>, ParseError> {
    GCodeLineParser::new(line).collect()
}

/// Length of the gcode at the start of `token`, if it starts with one.
fn gcode_prefix_len(token: &str) -> Option<usize> {
    if BARE_WORDS.contains(&token) {
        return Some(token.len());
    }
    let bytes = token.as_bytes();
    if bytes.len() < 2 || !matches!(bytes[0], b'M' | b'G') || !bytes[1].is_ascii_digit() {
        return None;
    }
    let mut len = 1;
    while len < bytes.len() && bytes[len].is_ascii_digit() {
        len += 1;
    }
    if len + 1 < bytes.len() && bytes[len] == b'.' && bytes[len + 1].is_ascii_digit() {
        len += 1;
        while len < bytes.len() && bytes[len].is_ascii_digit() {
            len += 1;
        }
    }
    Some(len)
}

fn parse_param(token: &str) -> Option<Vec<(char, ParamValue)>> {
    let mut chars = token.chars();
    let letter = chars.next().filter(|c| c.is_ascii_uppercase())?;
    let rest = chars.as_str();

    if rest.is_empty() {
        return Some(vec![(letter, ParamValue::Flag)]);
    }
    if is_numeric(rest) {
        return rest.parse().ok().map(|value| vec![(letter, ParamValue::Number(value))]);
    }
    if rest.chars().all(|c| c.is_ascii_uppercase()) {
        let mut flags = vec![(letter, ParamValue::Flag)];
        flags.extend(rest.chars().map(|c| (c, ParamValue::Flag)));
        return Some(flags);
    }
    if rest.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Some(vec![(letter, ParamValue::Text(rest.to_string()))]);
    }
    None
}

fn is_numeric(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().any(|c| c.is_ascii_digit())
}
