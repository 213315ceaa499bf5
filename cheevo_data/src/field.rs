use serde::{Deserialize, Serialize};
use std::fmt;

use crate::parse::{Cursor, ParseError};

/// Width of a memory read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldSize {
    Bit0,
    Bit1,
    Bit2,
    Bit3,
    Bit4,
    Bit5,
    Bit6,
    Bit7,
    Low4,
    High4,
    Byte,
    Word,
    TByte,
    DWord,
    BitCount,
    BigEndianWord,
    BigEndianTByte,
    BigEndianDWord,
    Float,
    BigEndianFloat,
}

impl FieldSize {
    /// Size marker written after `0x` (or after `f` for float reads).
    pub fn marker(self) -> char {
        match self {
            FieldSize::Bit0 => 'M',
            FieldSize::Bit1 => 'N',
            FieldSize::Bit2 => 'O',
            FieldSize::Bit3 => 'P',
            FieldSize::Bit4 => 'Q',
            FieldSize::Bit5 => 'R',
            FieldSize::Bit6 => 'S',
            FieldSize::Bit7 => 'T',
            FieldSize::Low4 => 'L',
            FieldSize::High4 => 'U',
            FieldSize::Byte => 'H',
            FieldSize::Word => ' ',
            FieldSize::TByte => 'W',
            FieldSize::DWord => 'X',
            FieldSize::BitCount => 'K',
            FieldSize::BigEndianWord => 'I',
            FieldSize::BigEndianTByte => 'J',
            FieldSize::BigEndianDWord => 'G',
            FieldSize::Float => 'F',
            FieldSize::BigEndianFloat => 'B',
        }
    }

    fn from_integer_marker(marker: char) -> Option<Self> {
        let size = match marker {
            'M' => FieldSize::Bit0,
            'N' => FieldSize::Bit1,
            'O' => FieldSize::Bit2,
            'P' => FieldSize::Bit3,
            'Q' => FieldSize::Bit4,
            'R' => FieldSize::Bit5,
            'S' => FieldSize::Bit6,
            'T' => FieldSize::Bit7,
            'L' => FieldSize::Low4,
            'U' => FieldSize::High4,
            'H' => FieldSize::Byte,
            'W' => FieldSize::TByte,
            'X' => FieldSize::DWord,
            'K' => FieldSize::BitCount,
            'I' => FieldSize::BigEndianWord,
            'J' => FieldSize::BigEndianTByte,
            'G' => FieldSize::BigEndianDWord,
            _ => return None,
        };
        Some(size)
    }

    pub fn is_float(self) -> bool {
        matches!(self, FieldSize::Float | FieldSize::BigEndianFloat)
    }

    /// True when the read fills the whole 32-bit accumulator.
    pub fn is_32bit(self) -> bool {
        matches!(
            self,
            FieldSize::DWord | FieldSize::BigEndianDWord | FieldSize::Float | FieldSize::BigEndianFloat
        )
    }

    /// Largest value a read of this size can produce.
    pub fn max_value(self) -> u32 {
        match self {
            FieldSize::Bit0
            | FieldSize::Bit1
            | FieldSize::Bit2
            | FieldSize::Bit3
            | FieldSize::Bit4
            | FieldSize::Bit5
            | FieldSize::Bit6
            | FieldSize::Bit7 => 1,
            FieldSize::Low4 | FieldSize::High4 => 15,
            FieldSize::BitCount => 8,
            FieldSize::Byte => 0xFF,
            FieldSize::Word | FieldSize::BigEndianWord => 0xFFFF,
            FieldSize::TByte | FieldSize::BigEndianTByte => 0xFF_FFFF,
            FieldSize::DWord | FieldSize::BigEndianDWord | FieldSize::Float | FieldSize::BigEndianFloat => u32::MAX,
        }
    }

    fn max_bcd_value(self) -> u32 {
        match self {
            FieldSize::Byte => 99,
            FieldSize::Word | FieldSize::BigEndianWord => 9_999,
            FieldSize::TByte | FieldSize::BigEndianTByte => 999_999,
            FieldSize::DWord | FieldSize::BigEndianDWord => 99_999_999,
            other => other.max_value(),
        }
    }
}

/// How the value of a field is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Current frame value at an address.
    Memory,
    /// Value at the address during the previous frame.
    Previous,
    /// Last value at the address that differed from the current one.
    Prior,
    /// Current value decoded as binary coded decimal.
    Bcd,
    /// Current value with all bits of its size flipped.
    Invert,
    /// Unsigned integer constant.
    Value,
    /// Floating point constant.
    Float,
    /// The value captured by the most recent `Remember`.
    Recall,
}

/// A requirement operand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub kind: FieldKind,
    pub size: FieldSize,
    /// Address for memory references, the constant for integer values.
    pub value: u32,
    /// The constant for float values.
    pub float: f32,
}

impl Field {
    pub const fn memory(size: FieldSize, address: u32) -> Self {
        Self {
            kind: FieldKind::Memory,
            size,
            value: address,
            float: 0.0,
        }
    }

    pub const fn value(value: u32) -> Self {
        Self {
            kind: FieldKind::Value,
            size: FieldSize::DWord,
            value,
            float: 0.0,
        }
    }

    pub const fn float(value: f32) -> Self {
        Self {
            kind: FieldKind::Float,
            size: FieldSize::Float,
            value: 0,
            float: value,
        }
    }

    pub const fn recall() -> Self {
        Self {
            kind: FieldKind::Recall,
            size: FieldSize::DWord,
            value: 0,
            float: 0.0,
        }
    }

    /// Returns a copy of a memory field read through a different modifier.
    pub fn with_kind(self, kind: FieldKind) -> Self {
        Self { kind, ..self }
    }

    /// True for any operand that reads emulated memory.
    pub fn is_memory_reference(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Memory | FieldKind::Previous | FieldKind::Prior | FieldKind::Bcd | FieldKind::Invert
        )
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, FieldKind::Value | FieldKind::Float)
    }

    /// Largest value this operand can take at runtime.
    pub fn max_value(&self) -> u32 {
        match self.kind {
            FieldKind::Value => self.value,
            FieldKind::Float | FieldKind::Recall => u32::MAX,
            FieldKind::Bcd => self.size.max_bcd_value(),
            _ => self.size.max_value(),
        }
    }

    /// True when the operand may use all 32 bits of the accumulator.
    pub fn is_32bit(&self) -> bool {
        match self.kind {
            FieldKind::Value => false,
            FieldKind::Float | FieldKind::Recall => true,
            _ => self.size.is_32bit(),
        }
    }

    /// Parse a single operand in the wire format.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut cursor = Cursor::new(text);
        let field = parse_field(&mut cursor)?;
        if !cursor.at_end() {
            return Err(cursor.error("unexpected trailing characters after operand"));
        }
        Ok(field)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            FieldKind::Value => return write!(f, "{}", self.value),
            FieldKind::Float => return write!(f, "f{}", format_float(self.float)),
            FieldKind::Recall => return f.write_str("{recall}"),
            FieldKind::Memory => "",
            FieldKind::Previous => "d",
            FieldKind::Prior => "p",
            FieldKind::Bcd => "b",
            FieldKind::Invert => "~",
        };
        if self.size.is_float() {
            write!(f, "{prefix}f{}{:06x}", self.size.marker(), self.value)
        } else {
            write!(f, "{prefix}0x{}{:06x}", self.size.marker(), self.value)
        }
    }
}

impl std::str::FromStr for Field {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::parse(s)
    }
}

/// Formats a float so that integral values keep a fractional digit.
pub fn format_float(value: f32) -> String {
    if value.fract() == 0.0 && value.abs() < 1e9 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

pub(crate) fn parse_field(cursor: &mut Cursor<'_>) -> Result<Field, ParseError> {
    if cursor.eat_str("{recall}") {
        return Ok(Field::recall());
    }

    let kind = match cursor.peek() {
        Some(b'd' | b'D') => FieldKind::Previous,
        Some(b'p' | b'P') => FieldKind::Prior,
        Some(b'b' | b'B') => FieldKind::Bcd,
        Some(b'~') => FieldKind::Invert,
        _ => FieldKind::Memory,
    };
    if kind != FieldKind::Memory {
        cursor.bump();
    }

    if cursor.eat_str("0x") || cursor.eat_str("0X") {
        let size = match cursor.peek() {
            Some(b' ') => {
                cursor.bump();
                FieldSize::Word
            },
            Some(marker) => match FieldSize::from_integer_marker(marker.to_ascii_uppercase() as char) {
                Some(size) => {
                    cursor.bump();
                    size
                },
                None => FieldSize::Word,
            },
            None => return Err(cursor.error("expected address after 0x")),
        };
        let address = cursor.read_hex()?;
        return Ok(Field {
            kind,
            size,
            value: address,
            float: 0.0,
        });
    }

    if matches!(cursor.peek(), Some(b'f' | b'F')) {
        match cursor.peek_at(1) {
            Some(b'F' | b'f') | Some(b'B' | b'b') => {
                cursor.bump();
                let size = match cursor.bump() {
                    Some(b'B' | b'b') => FieldSize::BigEndianFloat,
                    _ => FieldSize::Float,
                };
                let address = cursor.read_hex()?;
                return Ok(Field {
                    kind,
                    size,
                    value: address,
                    float: 0.0,
                });
            },
            _ if kind == FieldKind::Memory => {
                cursor.bump();
                let text = cursor.read_while(|b| b.is_ascii_digit() || b == b'-');
                let mut literal = text.to_string();
                if cursor.peek() == Some(b'.') && cursor.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
                    cursor.bump();
                    literal.push('.');
                    literal.push_str(cursor.read_while(|b| b.is_ascii_digit()));
                }
                let value = literal
                    .parse::<f32>()
                    .map_err(|_| cursor.error(format!("invalid float constant '{literal}'")))?;
                return Ok(Field::float(value));
            },
            _ => {},
        }
    }

    if kind != FieldKind::Memory {
        return Err(cursor.error("expected memory reference after modifier prefix"));
    }

    if matches!(cursor.peek(), Some(b'h' | b'H')) {
        cursor.bump();
        return Ok(Field::value(cursor.read_hex()?));
    }

    let negative = cursor.eat(b'-');
    let digits = cursor.read_while(|b| b.is_ascii_digit());
    if digits.is_empty() {
        return Err(cursor.error("expected operand"));
    }
    let magnitude = digits
        .parse::<u64>()
        .map_err(|_| cursor.error(format!("constant '{digits}' is out of range")))?;
    if magnitude > u64::from(u32::MAX) {
        return Err(cursor.error(format!("constant '{digits}' is out of range")));
    }
    let value = if negative {
        (magnitude as u32).wrapping_neg()
    } else {
        magnitude as u32
    };
    Ok(Field::value(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_fields_print_with_six_digit_addresses() {
        assert_eq!(Field::memory(FieldSize::Byte, 0x1234).to_string(), "0xH001234");
        assert_eq!(Field::memory(FieldSize::Word, 0x10).to_string(), "0x 000010");
        assert_eq!(
            Field::memory(FieldSize::DWord, 0x1234).with_kind(FieldKind::Previous).to_string(),
            "d0xX001234"
        );
        assert_eq!(Field::memory(FieldSize::Float, 0x20).to_string(), "fF000020");
    }

    #[test]
    fn parses_legacy_and_lowercase_forms() {
        let word = Field::parse("0x1234").expect("legacy word");
        assert_eq!(word.size, FieldSize::Word);
        assert_eq!(word.value, 0x1234);

        let byte = Field::parse("0xh00ff").expect("lowercase marker");
        assert_eq!(byte.size, FieldSize::Byte);
        assert_eq!(byte.value, 0xff);

        let bcd = Field::parse("b0xH0010").expect("bcd");
        assert_eq!(bcd.kind, FieldKind::Bcd);
        assert_eq!(bcd.max_value(), 99);
    }

    #[test]
    fn parses_constants() {
        assert_eq!(Field::parse("42").expect("decimal"), Field::value(42));
        assert_eq!(Field::parse("h1F").expect("hex"), Field::value(31));
        assert_eq!(Field::parse("f1.5").expect("float"), Field::float(1.5));
        assert_eq!(Field::parse("{recall}").expect("recall"), Field::recall());
        assert!(Field::parse("d42").is_err());
    }

    #[test]
    fn max_values_follow_the_read_size() {
        assert_eq!(Field::memory(FieldSize::Bit3, 1).max_value(), 1);
        assert_eq!(Field::memory(FieldSize::High4, 1).max_value(), 15);
        assert_eq!(Field::memory(FieldSize::TByte, 1).max_value(), 0xFF_FFFF);
        assert!(Field::memory(FieldSize::BigEndianDWord, 1).is_32bit());
        assert!(!Field::value(u32::MAX).is_32bit());
    }
}
