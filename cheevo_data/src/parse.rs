use std::fmt;

/// Error raised while reading the serialized requirement format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at position {}: {}", self.position, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Byte cursor over an ASCII serialized trigger.
pub(crate) struct Cursor<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            text,
            pos: 0,
        }
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    pub(crate) fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    pub(crate) fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_str(&mut self, expected: &str) -> bool {
        if self.bytes[self.pos..].starts_with(expected.as_bytes()) {
            self.pos += expected.len();
            true
        } else {
            false
        }
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub(crate) fn read_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    pub(crate) fn read_hex(&mut self) -> Result<u32, ParseError> {
        let digits = self.read_while(|b| b.is_ascii_hexdigit());
        if digits.is_empty() {
            return Err(self.error("expected hexadecimal digits"));
        }
        u32::from_str_radix(digits, 16).map_err(|_| self.error(format!("'{digits}' does not fit in 32 bits")))
    }

    pub(crate) fn read_decimal(&mut self) -> Result<u32, ParseError> {
        let digits = self.read_while(|b| b.is_ascii_digit());
        if digits.is_empty() {
            return Err(self.error("expected decimal digits"));
        }
        digits
            .parse::<u32>()
            .map_err(|_| self.error(format!("'{digits}' does not fit in 32 bits")))
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            position: self.pos,
            message: message.into(),
        }
    }
}
