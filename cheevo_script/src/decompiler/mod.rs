//! Decompiler: prints requirement groups back as script source.
//!
//! A group is walked in order while a [`PrinterState`] collects the text of
//! combining instructions. The condition that closes a clause consumes the
//! pending text in a fixed order: AddAddress, AddSource/SubSource,
//! Remember, AndNext/OrNext, ResetNextIf, AddHits/SubHits and finally the
//! clause flag. The result parses back into an equivalent trigger, though
//! not always the same tokens it was compiled from.

mod format;
mod state;
mod wrap;

pub use format::{PrintContext, PrintOptions};
pub use wrap::wrap;

use cheevo_data::{Field, FieldKind, Requirement, RequirementOperator, RequirementType, Trigger, ValueExpression};
use log::warn;

use state::PrinterState;
use wrap::has_top_level;

/// Prints a trigger as one script expression, wrapped to `options.width`.
pub fn decompile(trigger: &Trigger, options: &PrintOptions) -> String {
    let ctx = PrintContext::new(options);
    let core = print_group(&ctx, &trigger.core, false);
    let alts: Vec<String> = trigger
        .alts
        .iter()
        .map(|alt| match print_group(&ctx, alt, false).as_slice() {
            [] => "always_true()".to_string(),
            [single] if has_top_level(single, "&&") => format!("({single})"),
            [single] => single.clone(),
            clauses => format!("({})", join_and(clauses)),
        })
        .collect();

    let text = match (core.is_empty(), alts.is_empty()) {
        (true, true) => "always_true()".to_string(),
        (false, true) => join_and(&core),
        (true, false) => alts.join(" || "),
        (false, false) => format!("{} && ({})", join_and(&core), alts.join(" || ")),
    };
    wrap(&text, options)
}

/// Prints a value. Several groups become `max_of(...)`.
pub fn decompile_value(value: &ValueExpression, options: &PrintOptions) -> String {
    let ctx = PrintContext::new(options);
    let groups: Vec<String> = value
        .values
        .iter()
        .map(|group| join_and(&print_group(&ctx, group, true)))
        .collect();
    let text = match groups.as_slice() {
        [single] => single.clone(),
        _ => format!("max_of({})", groups.join(", ")),
    };
    wrap(&text, options)
}

fn join_and(clauses: &[String]) -> String {
    clauses
        .iter()
        .map(|clause| {
            if has_top_level(clause, "||") {
                format!("({clause})")
            } else {
                clause.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" && ")
}

/// A closed clause. Measured clauses are finished after the whole group is
/// seen, since their MeasuredIf conditions follow them.
enum Printed {
    Plain(String),
    Measured { body: String, percent: bool, value: bool },
}

fn print_group(ctx: &PrintContext<'_>, group: &[Requirement], value: bool) -> Vec<String> {
    let mut printer = GroupPrinter {
        ctx,
        state: PrinterState::default(),
        printed: Vec::new(),
    };
    for requirement in group {
        printer.push(requirement);
    }
    printer.finish(value)
}

struct GroupPrinter<'c, 'o> {
    ctx: &'c PrintContext<'o>,
    state: PrinterState,
    printed: Vec<Printed>,
}

impl GroupPrinter<'_, '_> {
    fn push(&mut self, requirement: &Requirement) {
        let pointer = self.state.address.take();
        let pointer = pointer.as_deref();
        match requirement.kind {
            RequirementType::AddAddress => {
                self.state.address = Some(self.value_term(requirement, pointer));
            },
            RequirementType::AddSource | RequirementType::SubSource => {
                let term = self.value_term(requirement, pointer);
                let negative = requirement.kind == RequirementType::SubSource;
                self.state.source.push((negative, term));
            },
            RequirementType::Remember => {
                let term = self.value_term(requirement, pointer);
                let sum = self.state.take_sum(term, false);
                let sum = if has_top_level(&sum, "+") || has_top_level(&sum, "-") {
                    format!("({sum})")
                } else {
                    sum
                };
                self.state.remember = Some(sum);
            },
            kind => {
                let condition = self.condition(requirement, pointer);
                let condition = self.state.take_chain(condition);
                match kind {
                    RequirementType::AndNext | RequirementType::OrNext => {
                        let condition = counted(condition, requirement.hit_count, None);
                        self.state.logical = Some((kind, condition));
                    },
                    RequirementType::ResetNextIf => {
                        let reset = match self.state.reset_next.take() {
                            Some(earlier) => format!("{earlier} || {condition}"),
                            None => condition,
                        };
                        self.state.reset_next = Some(reset);
                    },
                    RequirementType::AddHits | RequirementType::SubHits => {
                        let reset = self.state.reset_next.take();
                        let item = counted(condition, requirement.hit_count, reset);
                        let item = if kind == RequirementType::SubHits {
                            format!("deduct({item})")
                        } else {
                            item
                        };
                        self.state.hits.push(item);
                    },
                    RequirementType::MeasuredIf => self.state.measured_if.push(condition),
                    _ => self.close(requirement, condition),
                }
            },
        }
    }

    fn operand(&self, field: &Field, pointer: Option<&str>) -> String {
        self.ctx.operand(field, pointer, self.state.remember.as_deref())
    }

    /// The operand of a combining instruction, with its modifier applied.
    fn value_term(&self, requirement: &Requirement, pointer: Option<&str>) -> String {
        let left = self.operand(&requirement.left, pointer);
        if !requirement.operator.is_modifier() {
            return left;
        }
        let right = self.operand(&requirement.right, pointer);
        let term = format!("{left} {} {right}", requirement.operator.symbol());
        match requirement.operator {
            RequirementOperator::Add | RequirementOperator::Subtract => format!("({term})"),
            _ => term,
        }
    }

    /// A comparison, or the measured value when there is no comparison.
    fn condition(&mut self, requirement: &Requirement, pointer: Option<&str>) -> String {
        if self.state.source.is_empty() {
            match requirement.constant_result() {
                Some(true) => return "always_true()".to_string(),
                Some(false) => return "always_false()".to_string(),
                None => {},
            }
        }
        let left = self.value_term(requirement, pointer);
        let zero = requirement.left.kind == FieldKind::Value
            && requirement.left.value == 0
            && !requirement.operator.is_modifier();
        let sum = self.state.take_sum(left, zero);
        if !requirement.is_comparison() {
            return sum;
        }
        format!(
            "{sum} {} {}",
            requirement.operator.script_symbol(),
            self.operand(&requirement.right, pointer)
        )
    }

    fn close(&mut self, requirement: &Requirement, condition: String) {
        let reset = self.state.reset_next.take();
        let items = std::mem::take(&mut self.state.hits);
        let hits = requirement.hit_count;

        if requirement.kind == RequirementType::PauseIf && hits > 0 {
            if let Some(until) = reset {
                let clause = match (items.is_empty(), hits) {
                    (false, _) => tally(items, condition, hits),
                    (true, 1) => condition,
                    (true, _) => counted(condition, hits, None),
                };
                self.printed
                    .push(Printed::Plain(format!("disable_when({clause}, until={until})")));
                return;
            }
        }

        let body = if items.is_empty() {
            counted(condition, hits, reset)
        } else {
            if reset.is_some() {
                warn!("dropping a ResetNextIf in front of a tally target");
            }
            tally(items, condition, hits)
        };
        let printed = match requirement.kind {
            RequirementType::ResetIf => Printed::Plain(format!("never({body})")),
            RequirementType::PauseIf => Printed::Plain(format!("unless({body})")),
            RequirementType::Trigger => Printed::Plain(format!("trigger_when({body})")),
            RequirementType::Measured | RequirementType::MeasuredPercent => Printed::Measured {
                body,
                percent: requirement.kind == RequirementType::MeasuredPercent,
                value: !requirement.is_comparison(),
            },
            _ => Printed::Plain(body),
        };
        self.printed.push(printed);
    }

    fn finish(mut self, value: bool) -> Vec<String> {
        if !self.state.is_idle() {
            warn!("group ends inside a combined condition; its trailing instructions are dropped");
        }
        let conditions = std::mem::take(&mut self.state.measured_if);
        let measured = self
            .printed
            .iter()
            .filter(|printed| matches!(printed, Printed::Measured { .. }))
            .count();
        let mut when = None;
        if !conditions.is_empty() {
            if measured == 0 {
                warn!("measured_if without a measured condition; printing it as a plain condition");
                self.printed.extend(conditions.into_iter().map(Printed::Plain));
            } else {
                if measured > 1 {
                    warn!("measured_if applies to several measured conditions; attaching it to the first");
                }
                when = Some(join_and(&conditions));
            }
        }

        self.printed
            .into_iter()
            .map(|printed| match printed {
                Printed::Plain(text) => text,
                Printed::Measured {
                    body,
                    percent,
                    value: is_value,
                } => {
                    let when = when.take();
                    if value && is_value && !percent && when.is_none() {
                        return body;
                    }
                    let mut text = format!("measured({body}");
                    if let Some(when) = when {
                        text.push_str(&format!(", when={when}"));
                    }
                    if percent {
                        text.push_str(", format=\"percent\"");
                    }
                    text.push(')');
                    text
                },
            })
            .collect()
    }
}

/// Wraps `condition` for its hit target. A ResetNextIf only matters to a
/// condition that counts hits.
fn counted(condition: String, hits: u32, reset: Option<String>) -> String {
    let body = match reset {
        Some(reset) if hits > 0 => {
            let condition = if has_top_level(&condition, "||") {
                format!("({condition})")
            } else {
                condition
            };
            format!("{condition} && never({reset})")
        },
        Some(_) => {
            warn!("dropping a ResetNextIf on a condition without a hit target");
            condition
        },
        None => condition,
    };
    match hits {
        0 => body,
        1 => format!("once({body})"),
        u32::MAX => format!("repeated(0, {body})"),
        n => format!("repeated({n}, {body})"),
    }
}

/// `tally(N, items...)`. The closing condition is the last item unless it
/// is the `always_false()` placeholder carrying the target.
fn tally(mut items: Vec<String>, condition: String, hits: u32) -> String {
    let target = if hits == u32::MAX { 0 } else { hits };
    if condition != "always_false()" {
        items.push(condition);
    }
    format!("tally({target}, {})", items.join(", "))
}
