//! Arithmetic normalisation.
//!
//! A value expression is reduced to a [`Sum`] of signed memory terms plus a
//! constant. Scaling and masking by a constant become operator modifiers on
//! a term; anything the modifier vocabulary cannot express goes through a
//! Remember chain and is read back with `{recall}`.

use cheevo_data::{Field, FieldKind, Requirement, RequirementOperator, RequirementType};

use crate::clause::{Clause, MemoryAccessor, constant_u32};
use crate::error::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Term {
    pub negative: bool,
    pub accessor: MemoryAccessor,
    pub modifier: Option<(RequirementOperator, Field)>,
    /// Remember chain that must run before this term reads `{recall}`.
    pub prefix: Vec<Requirement>,
}

impl Term {
    fn new(accessor: MemoryAccessor) -> Self {
        Self {
            negative: false,
            accessor,
            modifier: None,
            prefix: Vec::new(),
        }
    }

    /// Positive, unmodified and self-contained: usable as a comparison's left operand.
    fn is_plain(&self) -> bool {
        !self.negative && self.modifier.is_none() && self.prefix.is_empty()
    }

    fn same_read(&self, other: &Term) -> bool {
        self.accessor == other.accessor && self.modifier == other.modifier && self.prefix == other.prefix
    }

    fn max_value(&self) -> u64 {
        let base = u64::from(self.accessor.field.max_value());
        match self.modifier {
            None => base,
            Some((op, right)) if right.kind == FieldKind::Value => {
                let operand = u64::from(right.value);
                match op {
                    RequirementOperator::Multiply => base.saturating_mul(operand),
                    RequirementOperator::Divide if operand > 0 => base / operand,
                    RequirementOperator::BitwiseAnd => base.min(operand),
                    RequirementOperator::Modulus if operand > 0 => base.min(operand - 1),
                    _ => u64::from(u32::MAX),
                }
            },
            Some(_) => u64::from(u32::MAX),
        }
    }

    fn is_32bit(&self) -> bool {
        self.accessor.field.is_32bit() || self.max_value() >= u64::from(u32::MAX)
    }

    fn describe(&self) -> String {
        let field = self.accessor.field;
        match field.kind {
            FieldKind::Recall => "recall()".to_string(),
            _ => format!("the read at 0x{:06x}", field.value),
        }
    }

    fn emit(&self, kind: RequirementType, out: &mut Vec<Requirement>) {
        out.extend(self.prefix.iter().copied());
        out.extend(self.accessor.pointer.iter().copied());
        let mut requirement = Requirement::operand(kind, self.accessor.field);
        if let Some((op, right)) = self.modifier {
            requirement.operator = op;
            requirement.right = right;
        }
        out.push(requirement);
    }

    fn emit_compare(&self, op: RequirementOperator, right: Field, out: &mut Vec<Requirement>) {
        out.extend(self.prefix.iter().copied());
        out.extend(self.accessor.pointer.iter().copied());
        out.push(Requirement::compare(self.accessor.field, op, right));
    }
}

/// Signed memory terms plus a constant.
#[derive(Debug, Clone, PartialEq, Default)]
pub(super) struct Sum {
    pub terms: Vec<Term>,
    pub constant: i64,
    pub float: Option<f64>,
}

impl Sum {
    fn constant(value: i64) -> Self {
        Self {
            constant: value,
            ..Self::default()
        }
    }

    fn term(term: Term) -> Self {
        Self {
            terms: vec![term],
            ..Self::default()
        }
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Adds a term, cancelling an identical one of opposite sign.
    fn push_term(&mut self, term: Term) {
        match self
            .terms
            .iter()
            .position(|existing| existing.negative != term.negative && existing.same_read(&term))
        {
            Some(index) => {
                self.terms.remove(index);
            },
            None => self.terms.push(term),
        }
    }

    fn add(mut self, other: Sum) -> Result<Sum, CompileError> {
        for term in other.terms {
            self.push_term(term);
        }
        self.constant = self.constant.checked_add(other.constant).ok_or(CompileError::Overflow)?;
        self.float = match (self.float, other.float) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        Ok(self)
    }

    fn negate(mut self) -> Result<Sum, CompileError> {
        self.constant = self.constant.checked_neg().ok_or(CompileError::Overflow)?;
        for term in &mut self.terms {
            term.negative = !term.negative;
        }
        self.float = self.float.map(|f| -f);
        Ok(self)
    }

    fn scale(self, factor: i64) -> Result<Sum, CompileError> {
        if factor == 0 {
            return Ok(Sum::constant(0));
        }
        let magnitude = constant_u32(i64::try_from(factor.unsigned_abs()).map_err(|_| CompileError::Overflow)?)?;
        let mut scaled = Sum {
            terms: Vec::with_capacity(self.terms.len()),
            constant: self.constant.checked_mul(factor).ok_or(CompileError::Overflow)?,
            float: self.float.map(|f| f * factor as f64),
        };
        for mut term in self.terms {
            term.negative ^= factor < 0;
            if magnitude != 1 {
                term = match term.modifier {
                    None => Term {
                        modifier: Some((RequirementOperator::Multiply, Field::value(magnitude))),
                        ..term
                    },
                    Some((RequirementOperator::Multiply, right)) if right.kind == FieldKind::Value => {
                        let product = right.value.checked_mul(magnitude).ok_or(CompileError::Overflow)?;
                        Term {
                            modifier: Some((RequirementOperator::Multiply, Field::value(product))),
                            ..term
                        }
                    },
                    Some(_) => {
                        let negative = term.negative;
                        let mut remembered = remember(
                            Sum::term(Term { negative: false, ..term }),
                            RequirementOperator::Multiply,
                            Field::value(magnitude),
                        )?;
                        remembered.negative = negative;
                        remembered
                    },
                };
            }
            scaled.terms.push(term);
        }
        Ok(scaled)
    }

    fn single_unmodified(&self) -> Option<&Term> {
        match self.terms.as_slice() {
            [term] if self.constant == 0 && self.float.is_none() && term.is_plain() => Some(term),
            _ => None,
        }
    }
}

/// Reduces a value clause to a [`Sum`].
pub(super) fn sum_of(clause: &Clause) -> Result<Sum, CompileError> {
    match clause {
        Clause::Constant(value) => Ok(Sum::constant(*value)),
        Clause::Float(value) => Ok(Sum {
            float: Some(*value),
            ..Sum::default()
        }),
        Clause::Memory(accessor) => Ok(Sum::term(Term::new(accessor.clone()))),
        Clause::Math { op, left, right } => {
            let left = sum_of(left)?;
            let right = sum_of(right)?;
            match op {
                RequirementOperator::Add => left.add(right),
                RequirementOperator::Subtract => left.add(right.negate()?),
                _ => apply_modifier(*op, left, right),
            }
        },
        other => Err(CompileError::Unsupported {
            construct: other.describe(),
            context: "in arithmetic",
        }),
    }
}

fn fold_constants(op: RequirementOperator, left: &Sum, right: &Sum) -> Result<Sum, CompileError> {
    if left.float.is_some() || right.float.is_some() {
        #[allow(clippy::cast_precision_loss)]
        let (l, r) = (
            left.float.unwrap_or(0.0) + left.constant as f64,
            right.float.unwrap_or(0.0) + right.constant as f64,
        );
        let value = match op {
            RequirementOperator::Multiply => l * r,
            RequirementOperator::Divide if r != 0.0 => l / r,
            _ => {
                return Err(CompileError::Unsupported {
                    construct: "a float constant",
                    context: "with this operator",
                });
            },
        };
        return Ok(Sum {
            float: Some(value),
            ..Sum::default()
        });
    }
    let (l, r) = (left.constant, right.constant);
    let value = match op {
        RequirementOperator::Multiply => l.checked_mul(r),
        RequirementOperator::Divide => l.checked_div(r),
        RequirementOperator::Modulus => l.checked_rem(r),
        RequirementOperator::BitwiseAnd => Some(l & r),
        RequirementOperator::BitwiseXor => Some(l ^ r),
        _ => None,
    };
    value.map(Sum::constant).ok_or(CompileError::Overflow)
}

fn apply_modifier(op: RequirementOperator, left: Sum, right: Sum) -> Result<Sum, CompileError> {
    if left.is_constant() && right.is_constant() {
        return fold_constants(op, &left, &right);
    }
    let (left, right) = if op == RequirementOperator::Multiply && left.is_constant() {
        (right, left)
    } else {
        (left, right)
    };
    if op == RequirementOperator::Multiply && right.is_constant() && right.float.is_none() {
        return left.scale(right.constant);
    }

    let operand = modifier_operand(&right)?;
    if let Some(term) = left.single_unmodified() {
        let shares_pointer = operand.is_memory_reference() && !term.accessor.pointer.is_empty();
        if !shares_pointer {
            let mut term = term.clone();
            term.modifier = Some((op, operand));
            return Ok(Sum::term(term));
        }
    }
    Ok(Sum::term(remember(left, op, operand)?))
}

/// The right side of a modifier: a constant or an unmodified direct read.
fn modifier_operand(right: &Sum) -> Result<Field, CompileError> {
    if right.is_constant() {
        #[allow(clippy::cast_possible_truncation)]
        return match right.float {
            Some(f) => Ok(Field::float((f + right.constant as f64) as f32)),
            None => constant_u32(right.constant).map(Field::value),
        };
    }
    match right.single_unmodified() {
        Some(term) if term.accessor.pointer.is_empty() => Ok(term.accessor.field),
        _ => Err(CompileError::Unsupported {
            construct: "an arithmetic expression",
            context: "as the right side of *, / or &",
        }),
    }
}

/// Stores `sum` with a Remember chain and returns a `{recall}` term that
/// applies `op operand` to it.
fn remember(sum: Sum, op: RequirementOperator, operand: Field) -> Result<Term, CompileError> {
    let mut prefix = Vec::new();
    emit_accumulated(&sum, RequirementType::Remember, &mut prefix)?;
    Ok(Term {
        negative: false,
        accessor: MemoryAccessor::recall(),
        modifier: Some((op, operand)),
        prefix,
    })
}

/// Emits non-terminal terms as AddSource/SubSource. A term carrying a
/// Remember prefix goes first so the prefix runs with an empty accumulator.
fn emit_terms<'a>(terms: impl IntoIterator<Item = &'a Term>, out: &mut Vec<Requirement>) -> Result<(), CompileError> {
    let (prefixed, direct): (Vec<&Term>, Vec<&Term>) = terms.into_iter().partition(|term| !term.prefix.is_empty());
    if prefixed.len() > 1 {
        return Err(CompileError::Unsupported {
            construct: "more than one non-linear expression",
            context: "in a single accumulation",
        });
    }
    for term in prefixed.into_iter().chain(direct) {
        let kind = if term.negative {
            RequirementType::SubSource
        } else {
            RequirementType::AddSource
        };
        term.emit(kind, out);
    }
    Ok(())
}

fn emit_constant(sum: &Sum, out: &mut Vec<Requirement>) -> Result<(), CompileError> {
    if let Some(f) = sum.float {
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let total = (f + sum.constant as f64) as f32;
        out.push(Requirement::operand(RequirementType::AddSource, Field::float(total)));
        return Ok(());
    }
    match sum.constant {
        0 => {},
        c if c > 0 => out.push(Requirement::operand(RequirementType::AddSource, Field::value(constant_u32(c)?))),
        c => out.push(Requirement::operand(
            RequirementType::SubSource,
            Field::value(constant_u32(c.checked_neg().ok_or(CompileError::Overflow)?)?),
        )),
    }
    Ok(())
}

/// Emits `sum` as an accumulation closed by a requirement of `kind`
/// (Remember or Measured). The last positive term carries the flag, or a
/// `0` operand when there is none.
pub(super) fn emit_accumulated(sum: &Sum, kind: RequirementType, out: &mut Vec<Requirement>) -> Result<(), CompileError> {
    let single = sum.terms.len() == 1;
    let carrier = sum
        .terms
        .iter()
        .rposition(|term| !term.negative && (single || term.prefix.is_empty()));
    let others = sum
        .terms
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != carrier)
        .map(|(_, term)| term);
    emit_terms(others, out)?;
    emit_constant(sum, out)?;
    match carrier {
        Some(index) => sum.terms[index].emit(kind, out),
        None => out.push(Requirement::operand(kind, Field::value(0))),
    }
    Ok(())
}

/// Lowers `left op right`.
pub(super) fn compare(op: RequirementOperator, left: &Clause, right: &Clause) -> Result<Vec<Requirement>, CompileError> {
    let mut op = op;
    let mut left = sum_of(left)?;
    let mut right = sum_of(right)?;
    if left.is_constant() && !right.is_constant() {
        std::mem::swap(&mut left, &mut right);
        op = op.reverse();
    }

    if left.float.is_some() || right.float.is_some() {
        return compare_float(op, &left, &right);
    }
    if right.is_constant() {
        let target = right.constant.checked_sub(left.constant).ok_or(CompileError::Overflow)?;
        return compare_to_constant(op, &left.terms, target);
    }
    if let Some(requirements) = compare_direct(op, &left, &right)? {
        return Ok(requirements);
    }

    // `L op R` is `R - L reverse(op) 0`; the right side's reads come first
    // so a decompiled comparison compiles back to itself.
    let difference = right.add(left.negate()?)?;
    let target = difference.constant.checked_neg().ok_or(CompileError::Overflow)?;
    compare_to_constant(op.reverse(), &difference.terms, target)
}

fn constant_result(result: Option<bool>) -> Vec<Requirement> {
    if result == Some(true) {
        vec![Requirement::always_true()]
    } else {
        vec![Requirement::always_false()]
    }
}

fn compare_float(op: RequirementOperator, left: &Sum, right: &Sum) -> Result<Vec<Requirement>, CompileError> {
    #[allow(clippy::cast_precision_loss)]
    let constant_of = |sum: &Sum| sum.float.unwrap_or(0.0) + sum.constant as f64;
    if left.is_constant() {
        return Ok(constant_result(op.compare(constant_of(left), constant_of(right))));
    }
    match left.single_unmodified() {
        Some(term) if right.is_constant() => {
            let mut out = Vec::new();
            #[allow(clippy::cast_possible_truncation)]
            term.emit_compare(op, Field::float(constant_of(right) as f32), &mut out);
            Ok(out)
        },
        _ => Err(CompileError::Unsupported {
            construct: "a float constant",
            context: "in this comparison",
        }),
    }
}

/// `Σ terms op target`, biased so the accumulator never goes below zero.
fn compare_to_constant(op: RequirementOperator, terms: &[Term], target: i64) -> Result<Vec<Requirement>, CompileError> {
    if terms.is_empty() {
        return Ok(constant_result(op.compare(0, target)));
    }

    let has_negative = terms.iter().any(|term| term.negative);
    let equality = matches!(op, RequirementOperator::Equal | RequirementOperator::NotEqual);
    let negated = target.checked_neg().ok_or(CompileError::Overflow)?;
    let (bias, target) = if !has_negative || equality {
        if target >= 0 { (0, target) } else { (negated, 0) }
    } else {
        let max_negative: i64 = terms
            .iter()
            .filter(|term| term.negative)
            .map(|term| i64::try_from(term.max_value()).unwrap_or(i64::MAX))
            .fold(0i64, i64::saturating_add);
        let bias = max_negative.max(negated);
        (bias, bias.checked_add(target).ok_or(CompileError::Overflow)?)
    };

    if bias > 0 && !equality {
        let max_positive: u64 = terms
            .iter()
            .filter(|term| !term.negative)
            .map(Term::max_value)
            .fold(0u64, u64::saturating_add);
        if max_positive.saturating_add(bias.unsigned_abs()) > u64::from(u32::MAX) {
            return Err(match terms.iter().find(|term| term.is_32bit()) {
                Some(term) => CompileError::ThirtyTwoBit(term.describe()),
                None => CompileError::Overflow,
            });
        }
    }
    let bias = u32::try_from(bias).map_err(|_| CompileError::Overflow)?;
    let target = u32::try_from(target).map_err(|_| CompileError::Overflow)?;

    let mut out = Vec::new();
    match terms.iter().rposition(Term::is_plain) {
        Some(index) => {
            emit_terms(terms.iter().take(index).chain(terms.iter().skip(index + 1)), &mut out)?;
            if bias > 0 {
                out.push(Requirement::operand(RequirementType::AddSource, Field::value(bias)));
            }
            terms[index].emit_compare(op, Field::value(target), &mut out);
        },
        None => {
            emit_terms(terms, &mut out)?;
            out.push(Requirement::compare(Field::value(bias), op, Field::value(target)));
        },
    }
    Ok(out)
}

/// `... + a op b` where `a` and `b` sit behind the same pointer chain: the
/// chain is emitted once and `b` becomes the right operand.
fn compare_direct(op: RequirementOperator, left: &Sum, right: &Sum) -> Result<Option<Vec<Requirement>>, CompileError> {
    let Some(right_term) = right.single_unmodified() else {
        return Ok(None);
    };
    let Some((last, rest)) = left.terms.split_last() else {
        return Ok(None);
    };
    if !last.is_plain() || last.accessor.pointer != right_term.accessor.pointer || left.constant < 0 {
        return Ok(None);
    }
    let equality = matches!(op, RequirementOperator::Equal | RequirementOperator::NotEqual);
    if !equality && rest.iter().any(|term| term.negative) {
        return Ok(None);
    }

    let mut out = Vec::new();
    emit_terms(rest, &mut out)?;
    if left.constant > 0 {
        out.push(Requirement::operand(
            RequirementType::AddSource,
            Field::value(constant_u32(left.constant)?),
        ));
    }
    last.emit_compare(op, right_term.accessor.field, &mut out);
    Ok(Some(out))
}
