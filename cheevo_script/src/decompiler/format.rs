//! Operand formatting for decompiled scripts.

use cheevo_data::{Field, FieldKind, format_float};
use serde::Deserialize;

use crate::builtins::size_name;

/// Layout and number formatting of decompiled scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrintOptions {
    /// Lines are wrapped to stay within this many columns.
    pub width: usize,
    /// Extra indentation of continuation lines.
    pub indent: usize,
    /// Print constants in hexadecimal.
    pub hex_values: bool,
    /// Digits printed for memory addresses.
    pub address_width: usize,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            width: 100,
            indent: 4,
            hex_values: false,
            address_width: 6,
        }
    }
}

/// Formatting helpers bound to one set of [`PrintOptions`].
#[derive(Debug, Clone, Copy)]
pub struct PrintContext<'o> {
    pub options: &'o PrintOptions,
}

impl<'o> PrintContext<'o> {
    pub fn new(options: &'o PrintOptions) -> Self {
        Self { options }
    }

    pub fn address(&self, address: u32) -> String {
        format!("0x{address:0width$X}", width = self.options.address_width)
    }

    pub fn constant(&self, value: u32) -> String {
        if self.options.hex_values && value > 9 {
            format!("0x{value:X}")
        } else {
            value.to_string()
        }
    }

    /// A plain read such as `byte(0x001234)`. `pointer` is added to the
    /// address when the read follows an AddAddress.
    pub fn memory(&self, field: &Field, pointer: Option<&str>) -> String {
        let size = size_name(field.size);
        match pointer {
            None => format!("{size}({})", self.address(field.value)),
            Some(pointer) if field.value == 0 => format!("{size}({pointer})"),
            Some(pointer) => format!("{size}({pointer} + {})", self.address(field.value)),
        }
    }

    /// Any operand. `recall` is the expression the last Remember captured.
    pub fn operand(&self, field: &Field, pointer: Option<&str>, recall: Option<&str>) -> String {
        match field.kind {
            FieldKind::Value => self.constant(field.value),
            FieldKind::Float => format_float(field.float),
            FieldKind::Recall => recall.map_or_else(|| "recall()".to_string(), str::to_string),
            FieldKind::Memory => self.memory(field, pointer),
            FieldKind::Previous => format!("prev({})", self.memory(field, pointer)),
            FieldKind::Prior => format!("prior({})", self.memory(field, pointer)),
            FieldKind::Bcd => format!("bcd({})", self.memory(field, pointer)),
            FieldKind::Invert => format!("~{}", self.memory(field, pointer)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cheevo_data::FieldSize;

    #[test]
    fn addresses_are_padded_uppercase_hex() {
        let options = PrintOptions::default();
        let ctx = PrintContext::new(&options);
        assert_eq!(ctx.memory(&Field::memory(FieldSize::Byte, 0xabc), None), "byte(0x000ABC)");
        assert_eq!(
            ctx.operand(&Field::memory(FieldSize::Word, 0x10).with_kind(FieldKind::Previous), None, None),
            "prev(word(0x000010))"
        );
        assert_eq!(
            ctx.memory(&Field::memory(FieldSize::Byte, 8), Some("dword(0x000004)")),
            "byte(dword(0x000004) + 0x000008)"
        );
    }

    #[test]
    fn constants_follow_hex_option() {
        let options = PrintOptions {
            hex_values: true,
            address_width: 4,
            ..PrintOptions::default()
        };
        let ctx = PrintContext::new(&options);
        assert_eq!(ctx.constant(255), "0xFF");
        assert_eq!(ctx.constant(7), "7");
        assert_eq!(ctx.address(0x12), "0x0012");
        assert_eq!(ctx.operand(&Field::float(2.0), None, None), "2.0");
        assert_eq!(ctx.operand(&Field::recall(), None, None), "recall()");
    }
}
