//! Clause trees built by the interpreter and lowered by the compiler.
//!
//! Any expression that touches emulated memory stays symbolic: the
//! interpreter folds constants eagerly and wraps everything else in a
//! [`Clause`].

use cheevo_data::{Field, FieldKind, FieldSize, Requirement, RequirementOperator, RequirementType};

use crate::error::CompileError;

/// A memory read, optionally through a chain of AddAddress pointers.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryAccessor {
    pub field: Field,
    /// AddAddress requirements applied before the read, outermost first.
    pub pointer: Vec<Requirement>,
}

impl MemoryAccessor {
    pub fn new(field: Field) -> Self {
        Self {
            field,
            pointer: Vec::new(),
        }
    }

    /// Builds a read of `size` at `address`, where the address is either a
    /// constant or `pointer + offset`.
    ///
    /// # Errors
    /// Returns [`CompileError::InvalidAddress`] when the address expression
    /// is not a constant, a memory read, or a read plus a constant.
    pub fn from_address(size: FieldSize, address: &Clause) -> Result<Self, CompileError> {
        let (pointer, offset) = split_address(address)?;
        let offset = u32::try_from(offset.rem_euclid(1 << 32))
            .map_err(|_| CompileError::InvalidAddress(format!("offset {offset} out of range")))?;
        let field = Field::memory(size, offset);
        match pointer {
            None => Ok(Self::new(field)),
            Some(base) => Ok(Self {
                field,
                pointer: pointer_chain(base)?,
            }),
        }
    }

    /// Same read through a different modifier (`prev`, `bcd`, ...).
    ///
    /// # Errors
    /// Fails when the read already carries a modifier.
    pub fn with_kind(&self, kind: FieldKind, name: &'static str) -> Result<Self, CompileError> {
        if self.field.kind != FieldKind::Memory {
            return Err(CompileError::Unsupported {
                construct: name,
                context: "on a value that already has a modifier",
            });
        }
        Ok(Self {
            field: self.field.with_kind(kind),
            pointer: self.pointer.clone(),
        })
    }

    pub fn recall() -> Self {
        Self::new(Field::recall())
    }
}

/// Splits `pointer + offset` into its parts. A bare constant has no pointer.
fn split_address(address: &Clause) -> Result<(Option<&Clause>, i64), CompileError> {
    match address {
        Clause::Constant(value) => Ok((None, *value)),
        Clause::Math {
            op: RequirementOperator::Add,
            left,
            right,
        } => {
            let (left_ptr, left_offset) = split_address(left)?;
            let (right_ptr, right_offset) = split_address(right)?;
            match (left_ptr, right_ptr) {
                (Some(_), Some(_)) => Err(CompileError::InvalidAddress(
                    "an address may only add one pointer".to_string(),
                )),
                (ptr, None) | (None, ptr) => Ok((ptr, left_offset.wrapping_add(right_offset))),
            }
        },
        Clause::Math {
            op: RequirementOperator::Subtract,
            left,
            right,
        } => {
            let (ptr, offset) = split_address(left)?;
            match right.as_ref() {
                Clause::Constant(value) => Ok((ptr, offset.wrapping_sub(*value))),
                _ => Err(CompileError::InvalidAddress("cannot subtract a pointer".to_string())),
            }
        },
        other => Ok((Some(other), 0)),
    }
}

fn pointer_chain(base: &Clause) -> Result<Vec<Requirement>, CompileError> {
    let (accessor, modifier) = match base {
        Clause::Memory(accessor) => (accessor, None),
        Clause::Math { op, left, right } if op.is_modifier() => match (left.as_ref(), right.as_ref()) {
            (Clause::Memory(accessor), Clause::Constant(value)) => {
                (accessor, Some((*op, Field::value(constant_u32(*value)?))))
            },
            _ => {
                return Err(CompileError::InvalidAddress(
                    "pointer must be a memory read, optionally masked or scaled by a constant".to_string(),
                ));
            },
        },
        other => {
            return Err(CompileError::InvalidAddress(format!(
                "{} cannot be used as a pointer",
                other.describe()
            )));
        },
    };
    if !accessor.field.is_memory_reference() {
        return Err(CompileError::InvalidAddress("pointer must read memory".to_string()));
    }
    let mut chain = accessor.pointer.clone();
    let mut link = Requirement::operand(RequirementType::AddAddress, accessor.field);
    if let Some((op, right)) = modifier {
        link.operator = op;
        link.right = right;
    }
    chain.push(link);
    Ok(chain)
}

pub(crate) fn constant_u32(value: i64) -> Result<u32, CompileError> {
    if let Ok(v) = u32::try_from(value) {
        return Ok(v);
    }
    if let Ok(v) = i32::try_from(value) {
        return Ok(v as u32);
    }
    Err(CompileError::Overflow)
}

/// Symbolic condition or value.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Constant(i64),
    Float(f64),
    Memory(MemoryAccessor),
    Math {
        op: RequirementOperator,
        left: Box<Clause>,
        right: Box<Clause>,
    },
    Compare {
        op: RequirementOperator,
        left: Box<Clause>,
        right: Box<Clause>,
    },
    And(Vec<Clause>),
    Or(Vec<Clause>),
    Not(Box<Clause>),
    /// `once(...)` is a repeat count of one.
    Repeated {
        count: u32,
        clause: Box<Clause>,
    },
    Tally {
        count: u32,
        items: Vec<Clause>,
    },
    Deduct(Box<Clause>),
    /// `never` (ResetIf), `unless` (PauseIf), `trigger_when` (Trigger).
    Flagged {
        flag: RequirementType,
        clause: Box<Clause>,
    },
    Measured {
        clause: Box<Clause>,
        when: Option<Box<Clause>>,
        percent: bool,
    },
    DisableWhen {
        clause: Box<Clause>,
        until: Option<Box<Clause>>,
    },
    MaxOf(Vec<Clause>),
    AlwaysTrue,
    AlwaysFalse,
}

impl Clause {
    pub fn memory(accessor: MemoryAccessor) -> Self {
        Clause::Memory(accessor)
    }

    pub fn math(op: RequirementOperator, left: Clause, right: Clause) -> Self {
        Clause::Math {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn compare(op: RequirementOperator, left: Clause, right: Clause) -> Self {
        Clause::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Conjunction that flattens nested `And`s and drops `always_true()`.
    pub fn and(left: Clause, right: Clause) -> Self {
        let mut items = match left {
            Clause::And(inner) => inner,
            Clause::AlwaysTrue => Vec::new(),
            other => vec![other],
        };
        match right {
            Clause::And(inner) => items.extend(inner),
            Clause::AlwaysTrue => {},
            other => items.push(other),
        }
        match items.len() {
            0 => Clause::AlwaysTrue,
            1 => items.remove(0),
            _ => Clause::And(items),
        }
    }

    /// Disjunction that flattens nested `Or`s and drops `always_false()`.
    pub fn or(left: Clause, right: Clause) -> Self {
        let mut items = match left {
            Clause::Or(inner) => inner,
            Clause::AlwaysFalse => Vec::new(),
            other => vec![other],
        };
        match right {
            Clause::Or(inner) => items.extend(inner),
            Clause::AlwaysFalse => {},
            other => items.push(other),
        }
        match items.len() {
            0 => Clause::AlwaysFalse,
            1 => items.remove(0),
            _ => Clause::Or(items),
        }
    }

    /// True for clauses that evaluate to a number rather than a condition.
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            Clause::Constant(_) | Clause::Float(_) | Clause::Memory(_) | Clause::Math { .. }
        )
    }

    /// A clause that can sit inside an OrNext chain without its own hit
    /// target or flow control.
    pub fn is_simple(&self) -> bool {
        match self {
            Clause::AlwaysTrue | Clause::AlwaysFalse => true,
            Clause::Compare { left, right, .. } => left.is_value() && right.is_value(),
            Clause::Memory(_) | Clause::Constant(_) | Clause::Float(_) => true,
            _ => false,
        }
    }

    /// Short name used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Clause::Constant(_) => "a constant",
            Clause::Float(_) => "a float constant",
            Clause::Memory(_) => "a memory read",
            Clause::Math { .. } => "an arithmetic expression",
            Clause::Compare { .. } => "a comparison",
            Clause::And(_) => "an && expression",
            Clause::Or(_) => "an || expression",
            Clause::Not(_) => "a negation",
            Clause::Repeated { .. } => "repeated()",
            Clause::Tally { .. } => "tally()",
            Clause::Deduct(_) => "deduct()",
            Clause::Flagged {
                flag: RequirementType::ResetIf,
                ..
            } => "never()",
            Clause::Flagged {
                flag: RequirementType::PauseIf,
                ..
            } => "unless()",
            Clause::Flagged { .. } => "trigger_when()",
            Clause::Measured { .. } => "measured()",
            Clause::DisableWhen { .. } => "disable_when()",
            Clause::MaxOf(_) => "max_of()",
            Clause::AlwaysTrue => "always_true()",
            Clause::AlwaysFalse => "always_false()",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(size: FieldSize, address: u32) -> Clause {
        Clause::Memory(MemoryAccessor::new(Field::memory(size, address)))
    }

    #[test]
    fn pointer_plus_offset_builds_add_address() {
        let address = Clause::math(
            RequirementOperator::Add,
            Clause::Constant(0x1234),
            read(FieldSize::Word, 0x2222),
        );
        let accessor = MemoryAccessor::from_address(FieldSize::Byte, &address).expect("address");
        assert_eq!(accessor.field, Field::memory(FieldSize::Byte, 0x1234));
        assert_eq!(accessor.pointer.len(), 1);
        assert_eq!(accessor.pointer[0].to_string(), "I:0x 002222");
    }

    #[test]
    fn nested_and_masked_pointers_chain_in_order() {
        let inner = MemoryAccessor::from_address(
            FieldSize::DWord,
            &Clause::math(
                RequirementOperator::Add,
                read(FieldSize::DWord, 0x30),
                Clause::Constant(8),
            ),
        )
        .expect("inner");
        let masked = Clause::math(
            RequirementOperator::BitwiseAnd,
            Clause::Memory(inner),
            Clause::Constant(0x1FF_FFFF),
        );
        let outer = MemoryAccessor::from_address(
            FieldSize::Byte,
            &Clause::math(RequirementOperator::Add, masked, Clause::Constant(4)),
        )
        .expect("outer");
        let chain: Vec<String> = outer.pointer.iter().map(ToString::to_string).collect();
        assert_eq!(chain, vec!["I:0xX000030", "I:0xX000008&33554431"]);
        assert_eq!(outer.field.value, 4);
    }

    #[test]
    fn two_pointers_are_rejected() {
        let address = Clause::math(
            RequirementOperator::Add,
            read(FieldSize::Word, 1),
            read(FieldSize::Word, 2),
        );
        assert!(MemoryAccessor::from_address(FieldSize::Byte, &address).is_err());
    }

    #[test]
    fn and_or_flatten() {
        let a = read(FieldSize::Byte, 1);
        let b = read(FieldSize::Byte, 2);
        let c = read(FieldSize::Byte, 3);
        let joined = Clause::and(Clause::and(a.clone(), b.clone()), Clause::and(Clause::AlwaysTrue, c.clone()));
        assert_eq!(joined, Clause::And(vec![a.clone(), b.clone(), c]));
        assert_eq!(Clause::or(Clause::AlwaysFalse, a.clone()), a);
    }
}
