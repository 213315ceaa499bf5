//! Memory accessors and read modifiers.

use cheevo_data::{FieldKind, FieldSize};

use super::{Builtin, CallContext, ParamSpec};
use crate::clause::{Clause, MemoryAccessor};
use crate::error::EvalError;
use crate::value::Value;

const ADDRESS: &[ParamSpec] = &[ParamSpec::required("address")];
const ACCESSOR: &[ParamSpec] = &[ParamSpec::required("accessor")];

macro_rules! read {
    ($name:literal) => {
        Builtin {
            name: $name,
            params: ADDRESS,
            variadic: false,
            handler: read,
        }
    };
}

macro_rules! modifier {
    ($name:literal) => {
        Builtin {
            name: $name,
            params: ACCESSOR,
            variadic: false,
            handler: modify,
        }
    };
}

pub(super) const BUILTINS: &[Builtin] = &[
    read!("bit0"),
    read!("bit1"),
    read!("bit2"),
    read!("bit3"),
    read!("bit4"),
    read!("bit5"),
    read!("bit6"),
    read!("bit7"),
    read!("low4"),
    read!("high4"),
    read!("byte"),
    read!("word"),
    read!("tbyte"),
    read!("dword"),
    read!("bitcount"),
    read!("word_be"),
    read!("tbyte_be"),
    read!("dword_be"),
    read!("float"),
    read!("float_be"),
    Builtin {
        name: "bit",
        params: &[ParamSpec::required("index"), ParamSpec::required("address")],
        variadic: false,
        handler: bit,
    },
    modifier!("prev"),
    modifier!("prior"),
    modifier!("bcd"),
    Builtin {
        name: "recall",
        params: &[],
        variadic: false,
        handler: recall,
    },
];

const SIZES: &[(&str, FieldSize)] = &[
    ("bit0", FieldSize::Bit0),
    ("bit1", FieldSize::Bit1),
    ("bit2", FieldSize::Bit2),
    ("bit3", FieldSize::Bit3),
    ("bit4", FieldSize::Bit4),
    ("bit5", FieldSize::Bit5),
    ("bit6", FieldSize::Bit6),
    ("bit7", FieldSize::Bit7),
    ("low4", FieldSize::Low4),
    ("high4", FieldSize::High4),
    ("byte", FieldSize::Byte),
    ("word", FieldSize::Word),
    ("tbyte", FieldSize::TByte),
    ("dword", FieldSize::DWord),
    ("bitcount", FieldSize::BitCount),
    ("word_be", FieldSize::BigEndianWord),
    ("tbyte_be", FieldSize::BigEndianTByte),
    ("dword_be", FieldSize::BigEndianDWord),
    ("float", FieldSize::Float),
    ("float_be", FieldSize::BigEndianFloat),
];

fn size_of(name: &str) -> Option<FieldSize> {
    SIZES.iter().find(|(known, _)| *known == name).map(|(_, size)| *size)
}

/// Accessor function reading `size`.
pub(crate) fn size_name(size: FieldSize) -> &'static str {
    SIZES
        .iter()
        .find(|(_, known)| *known == size)
        .map_or("byte", |(name, _)| name)
}

fn accessor_at(ctx: &CallContext<'_>, size: FieldSize) -> Result<Value, EvalError> {
    let address = ctx.clause("address")?;
    if !address.is_value() {
        return Err(ctx.error(format!("address must be a value, found {}", address.describe())));
    }
    let accessor = MemoryAccessor::from_address(size, &address).map_err(|err| ctx.compile_error(&err))?;
    Ok(Value::clause(Clause::Memory(accessor)))
}

fn read(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let size = size_of(ctx.builtin.name).ok_or_else(|| ctx.error("unknown memory size"))?;
    accessor_at(ctx, size)
}

/// `bit(index, address)` picks `bit0`..`bit7` of the byte `index / 8`
/// past `address`.
fn bit(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let index = ctx.integer("index")?;
    if !(0..32).contains(&index) {
        return Err(ctx.error(format!("index must be between 0 and 31, found {index}")));
    }
    const BITS: [FieldSize; 8] = [
        FieldSize::Bit0,
        FieldSize::Bit1,
        FieldSize::Bit2,
        FieldSize::Bit3,
        FieldSize::Bit4,
        FieldSize::Bit5,
        FieldSize::Bit6,
        FieldSize::Bit7,
    ];
    let address = ctx.clause("address")?;
    let shifted = match address {
        Clause::Constant(base) => Clause::Constant(base + index / 8),
        other if index >= 8 => Clause::math(
            cheevo_data::RequirementOperator::Add,
            other,
            Clause::Constant(index / 8),
        ),
        other => other,
    };
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let size = BITS[(index % 8) as usize];
    let accessor = MemoryAccessor::from_address(size, &shifted).map_err(|err| ctx.compile_error(&err))?;
    Ok(Value::clause(Clause::Memory(accessor)))
}

fn modify(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let kind = match ctx.builtin.name {
        "prev" => FieldKind::Previous,
        "prior" => FieldKind::Prior,
        _ => FieldKind::Bcd,
    };
    match ctx.clause("accessor")? {
        Clause::Memory(accessor) => accessor
            .with_kind(kind, ctx.builtin.name)
            .map(|modified| Value::clause(Clause::Memory(modified)))
            .map_err(|err| ctx.compile_error(&err)),
        other => Err(ctx.error(format!("expected a memory read, found {}", other.describe()))),
    }
}

fn recall(_ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    Ok(Value::clause(Clause::Memory(MemoryAccessor::recall())))
}

#[cfg(test)]
mod tests {
    use cheevo_data::FieldSize;

    use crate::interpreter::evaluate;
    use crate::parser::parse_expression;
    use crate::scope::{Scope, ScopeContext};
    use crate::value::Value;

    fn describe(source: &str) -> String {
        let root = Scope::root(ScopeContext::None);
        match evaluate(&root, &parse_expression(source).expect("parse")) {
            Ok(Value::Clause(clause)) => match clause.as_ref() {
                crate::clause::Clause::Memory(accessor) => {
                    let mut parts: Vec<String> = accessor.pointer.iter().map(ToString::to_string).collect();
                    parts.push(accessor.field.to_string());
                    parts.join("_")
                },
                other => other.describe().to_string(),
            },
            Ok(other) => other.type_name().to_string(),
            Err(err) => err.root_cause().message.clone(),
        }
    }

    #[test]
    fn sizes_map_to_wire_markers() {
        assert_eq!(describe("byte(0x1234)"), "0xH001234");
        assert_eq!(describe("word(0x10)"), "0x 000010");
        assert_eq!(describe("bit3(0x10)"), "0xP000010");
        assert_eq!(describe("float_be(0x10)"), "fB000010");
    }

    #[test]
    fn size_names_match_builtins() {
        for size in [FieldSize::Bit5, FieldSize::BitCount, FieldSize::BigEndianFloat] {
            assert!(crate::builtins::lookup(super::size_name(size)).is_some());
        }
    }

    #[test]
    fn bit_index_steps_into_later_bytes() {
        assert_eq!(describe("bit(10, 0x20)"), describe("bit2(0x21)"));
    }

    #[test]
    fn modifiers_wrap_reads() {
        assert_eq!(describe("prev(byte(0x10))"), "d0xH000010");
        assert_eq!(describe("bcd(byte(0x10))"), "b0xH000010");
        assert!(describe("prev(prev(byte(0x10)))").contains("already has a modifier"));
    }

    #[test]
    fn pointer_reads_build_add_address_chains() {
        assert_eq!(describe("byte(word(0x2222) + 0x1234)"), "I:0x 002222_0xH001234");
        assert_eq!(
            describe("byte(dword(word(0x10) + 4) + 8)"),
            "I:0x 000010_I:0xX000004_0xH000008"
        );
    }
}
