use serde::{Deserialize, Serialize};
use std::fmt;

use crate::field::{Field, parse_field};
use crate::parse::{Cursor, ParseError};

/// Structural role of a requirement within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RequirementType {
    /// Plain condition.
    #[default]
    None,
    ResetIf,
    PauseIf,
    AddSource,
    SubSource,
    AddHits,
    SubHits,
    AndNext,
    OrNext,
    Measured,
    MeasuredPercent,
    MeasuredIf,
    AddAddress,
    ResetNextIf,
    Trigger,
    Remember,
}

impl RequirementType {
    /// Letter written before `:` in the serialized form.
    pub fn prefix(self) -> Option<char> {
        let c = match self {
            RequirementType::None => return None,
            RequirementType::ResetIf => 'R',
            RequirementType::PauseIf => 'P',
            RequirementType::AddSource => 'A',
            RequirementType::SubSource => 'B',
            RequirementType::AddHits => 'C',
            RequirementType::SubHits => 'D',
            RequirementType::AndNext => 'N',
            RequirementType::OrNext => 'O',
            RequirementType::Measured => 'M',
            RequirementType::MeasuredPercent => 'G',
            RequirementType::MeasuredIf => 'Q',
            RequirementType::AddAddress => 'I',
            RequirementType::ResetNextIf => 'Z',
            RequirementType::Trigger => 'T',
            RequirementType::Remember => 'K',
        };
        Some(c)
    }

    pub fn from_prefix(c: char) -> Option<Self> {
        let kind = match c {
            'R' => RequirementType::ResetIf,
            'P' => RequirementType::PauseIf,
            'A' => RequirementType::AddSource,
            'B' => RequirementType::SubSource,
            'C' => RequirementType::AddHits,
            'D' => RequirementType::SubHits,
            'N' => RequirementType::AndNext,
            'O' => RequirementType::OrNext,
            'M' => RequirementType::Measured,
            'G' => RequirementType::MeasuredPercent,
            'Q' => RequirementType::MeasuredIf,
            'I' => RequirementType::AddAddress,
            'Z' => RequirementType::ResetNextIf,
            'T' => RequirementType::Trigger,
            'K' => RequirementType::Remember,
            _ => return None,
        };
        Some(kind)
    }

    /// Kinds that feed the next requirement instead of closing a clause.
    pub fn is_combining(self) -> bool {
        matches!(
            self,
            RequirementType::AddSource
                | RequirementType::SubSource
                | RequirementType::AddAddress
                | RequirementType::AddHits
                | RequirementType::SubHits
                | RequirementType::AndNext
                | RequirementType::OrNext
                | RequirementType::Remember
        )
    }

    /// Kinds whose operand is a value rather than a comparison.
    pub fn is_value_modifier(self) -> bool {
        matches!(
            self,
            RequirementType::AddSource
                | RequirementType::SubSource
                | RequirementType::AddAddress
                | RequirementType::Remember
        )
    }

    pub fn is_measured(self) -> bool {
        matches!(self, RequirementType::Measured | RequirementType::MeasuredPercent)
    }
}

/// Comparison or arithmetic modifier between two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RequirementOperator {
    #[default]
    None,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Multiply,
    Divide,
    BitwiseAnd,
    BitwiseXor,
    Modulus,
    Add,
    Subtract,
}

impl RequirementOperator {
    /// Symbol used in the serialized form.
    pub fn symbol(self) -> &'static str {
        match self {
            RequirementOperator::None => "",
            RequirementOperator::Equal => "=",
            RequirementOperator::NotEqual => "!=",
            RequirementOperator::LessThan => "<",
            RequirementOperator::LessThanOrEqual => "<=",
            RequirementOperator::GreaterThan => ">",
            RequirementOperator::GreaterThanOrEqual => ">=",
            RequirementOperator::Multiply => "*",
            RequirementOperator::Divide => "/",
            RequirementOperator::BitwiseAnd => "&",
            RequirementOperator::BitwiseXor => "^",
            RequirementOperator::Modulus => "%",
            RequirementOperator::Add => "+",
            RequirementOperator::Subtract => "-",
        }
    }

    /// Symbol used in script source.
    pub fn script_symbol(self) -> &'static str {
        match self {
            RequirementOperator::Equal => "==",
            other => other.symbol(),
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            RequirementOperator::Equal
                | RequirementOperator::NotEqual
                | RequirementOperator::LessThan
                | RequirementOperator::LessThanOrEqual
                | RequirementOperator::GreaterThan
                | RequirementOperator::GreaterThanOrEqual
        )
    }

    pub fn is_modifier(self) -> bool {
        !self.is_comparison() && self != RequirementOperator::None
    }

    /// Operator to use when the operands swap sides (`a < b` is `b > a`).
    pub fn reverse(self) -> Self {
        match self {
            RequirementOperator::LessThan => RequirementOperator::GreaterThan,
            RequirementOperator::LessThanOrEqual => RequirementOperator::GreaterThanOrEqual,
            RequirementOperator::GreaterThan => RequirementOperator::LessThan,
            RequirementOperator::GreaterThanOrEqual => RequirementOperator::LessThanOrEqual,
            other => other,
        }
    }

    /// Logical negation of a comparison (`a < b` is `!(a >= b)`).
    pub fn opposite(self) -> Self {
        match self {
            RequirementOperator::Equal => RequirementOperator::NotEqual,
            RequirementOperator::NotEqual => RequirementOperator::Equal,
            RequirementOperator::LessThan => RequirementOperator::GreaterThanOrEqual,
            RequirementOperator::LessThanOrEqual => RequirementOperator::GreaterThan,
            RequirementOperator::GreaterThan => RequirementOperator::LessThanOrEqual,
            RequirementOperator::GreaterThanOrEqual => RequirementOperator::LessThan,
            other => other,
        }
    }

    /// Evaluates a comparison between two known values.
    pub fn compare<T: PartialOrd>(self, left: T, right: T) -> Option<bool> {
        let result = match self {
            RequirementOperator::Equal => left == right,
            RequirementOperator::NotEqual => left != right,
            RequirementOperator::LessThan => left < right,
            RequirementOperator::LessThanOrEqual => left <= right,
            RequirementOperator::GreaterThan => left > right,
            RequirementOperator::GreaterThanOrEqual => left >= right,
            _ => return None,
        };
        Some(result)
    }

    fn parse(cursor: &mut Cursor<'_>) -> Self {
        const TABLE: [(&str, RequirementOperator); 14] = [
            ("!=", RequirementOperator::NotEqual),
            ("<=", RequirementOperator::LessThanOrEqual),
            (">=", RequirementOperator::GreaterThanOrEqual),
            ("==", RequirementOperator::Equal),
            ("=", RequirementOperator::Equal),
            ("<", RequirementOperator::LessThan),
            (">", RequirementOperator::GreaterThan),
            ("*", RequirementOperator::Multiply),
            ("/", RequirementOperator::Divide),
            ("&", RequirementOperator::BitwiseAnd),
            ("^", RequirementOperator::BitwiseXor),
            ("%", RequirementOperator::Modulus),
            ("+", RequirementOperator::Add),
            ("-", RequirementOperator::Subtract),
        ];
        for (symbol, op) in TABLE {
            if cursor.eat_str(symbol) {
                return op;
            }
        }
        RequirementOperator::None
    }
}

impl fmt::Display for RequirementOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One instruction of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub left: Field,
    pub operator: RequirementOperator,
    pub right: Field,
    pub kind: RequirementType,
    pub hit_count: u32,
}

impl Requirement {
    /// A plain comparison.
    pub fn compare(left: Field, operator: RequirementOperator, right: Field) -> Self {
        Self {
            left,
            operator,
            right,
            kind: RequirementType::None,
            hit_count: 0,
        }
    }

    /// A value-only requirement such as an unmodified `AddSource`.
    pub fn operand(kind: RequirementType, left: Field) -> Self {
        Self {
            left,
            operator: RequirementOperator::None,
            right: Field::value(0),
            kind,
            hit_count: 0,
        }
    }

    pub fn always_true() -> Self {
        Self::compare(Field::value(1), RequirementOperator::Equal, Field::value(1))
    }

    pub fn always_false() -> Self {
        Self::compare(Field::value(0), RequirementOperator::Equal, Field::value(1))
    }

    pub fn with_kind(mut self, kind: RequirementType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_hits(mut self, hit_count: u32) -> Self {
        self.hit_count = hit_count;
        self
    }

    pub fn is_comparison(&self) -> bool {
        self.operator.is_comparison()
    }

    /// Result of a comparison between two integer constants.
    pub fn constant_result(&self) -> Option<bool> {
        if self.left.kind != crate::FieldKind::Value || self.right.kind != crate::FieldKind::Value {
            return None;
        }
        self.operator.compare(self.left.value, self.right.value)
    }

    /// Parse a single requirement in the wire format.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut cursor = Cursor::new(text);
        let requirement = parse_requirement(&mut cursor)?;
        if !cursor.at_end() {
            return Err(cursor.error("unexpected trailing characters after requirement"));
        }
        Ok(requirement)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = self.kind.prefix() {
            write!(f, "{prefix}:")?;
        }
        write!(f, "{}", self.left)?;
        if self.operator != RequirementOperator::None {
            write!(f, "{}{}", self.operator, self.right)?;
        }
        if self.hit_count > 0 {
            write!(f, ".{}.", self.hit_count)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Requirement {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Requirement::parse(s)
    }
}

pub(crate) fn parse_requirement(cursor: &mut Cursor<'_>) -> Result<Requirement, ParseError> {
    let mut kind = RequirementType::None;
    if let (Some(letter), Some(b':')) = (cursor.peek(), cursor.peek_at(1)) {
        kind = RequirementType::from_prefix(letter.to_ascii_uppercase() as char)
            .ok_or_else(|| cursor.error(format!("unknown requirement type '{}'", letter as char)))?;
        cursor.bump();
        cursor.bump();
    }

    let left = parse_field(cursor)?;
    let operator = RequirementOperator::parse(cursor);
    let right = if operator == RequirementOperator::None {
        Field::value(0)
    } else {
        parse_field(cursor)?
    };

    let hit_count = if cursor.eat(b'.') {
        let hits = cursor.read_decimal()?;
        if !cursor.eat(b'.') {
            return Err(cursor.error("expected '.' after hit count"));
        }
        hits
    } else if cursor.eat(b'(') {
        let hits = cursor.read_decimal()?;
        if !cursor.eat(b')') {
            return Err(cursor.error("expected ')' after hit count"));
        }
        hits
    } else {
        0
    };

    Ok(Requirement {
        left,
        operator,
        right,
        kind,
        hit_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldSize;

    #[test]
    fn prints_flags_operators_and_hits() {
        let req = Requirement::compare(
            Field::memory(FieldSize::Byte, 0x1234),
            RequirementOperator::GreaterThanOrEqual,
            Field::value(10),
        )
        .with_kind(RequirementType::ResetIf)
        .with_hits(3);
        assert_eq!(req.to_string(), "R:0xH001234>=10.3.");

        let add = Requirement::operand(RequirementType::AddSource, Field::memory(FieldSize::Word, 0x10));
        assert_eq!(add.to_string(), "A:0x 000010");
    }

    #[test]
    fn parses_legacy_hit_counts() {
        let req = Requirement::parse("0xH0010=5(4)").expect("parse");
        assert_eq!(req.hit_count, 4);
        assert_eq!(req.to_string(), "0xH000010=5.4.");
    }

    #[test]
    fn reverse_and_opposite_are_distinct() {
        assert_eq!(RequirementOperator::LessThan.reverse(), RequirementOperator::GreaterThan);
        assert_eq!(
            RequirementOperator::LessThan.opposite(),
            RequirementOperator::GreaterThanOrEqual
        );
        assert_eq!(RequirementOperator::Equal.reverse(), RequirementOperator::Equal);
    }

    #[test]
    fn constant_comparisons_evaluate() {
        assert_eq!(Requirement::always_true().constant_result(), Some(true));
        assert_eq!(Requirement::always_false().constant_result(), Some(false));
        assert!(RequirementType::AddAddress.is_combining());
        assert!(!RequirementType::ResetNextIf.is_combining());
    }
}
