//! Assets produced by a script run and their TOML rendering.

use std::fmt::Write as _;

use cheevo_data::{Trigger, ValueExpression};
use serde::Serialize;
use toml_edit::{ArrayOfTables, Document, Item, Table, value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Achievement {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub points: u32,
    pub badge: String,
    /// `progression`, `win_condition`, `missable` or empty.
    pub kind: String,
    pub trigger: Trigger,
    /// 1-based line of the `achievement(...)` call.
    pub source_line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub start: Trigger,
    pub cancel: Trigger,
    pub submit: Trigger,
    pub value: ValueExpression,
    pub format: String,
    pub lower_is_better: bool,
    pub source_line: usize,
}

impl Leaderboard {
    /// The `STA:..::CAN:..::SUB:..::VAL:..` definition string.
    pub fn definition(&self) -> String {
        format!(
            "STA:{}::CAN:{}::SUB:{}::VAL:{}",
            self.start, self.cancel, self.submit, self.value
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RichPresenceLookup {
    pub name: String,
    pub entries: Vec<(i64, String)>,
    pub fallback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RichPresenceDisplay {
    /// `None` for the default display string.
    pub condition: Option<Trigger>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RichPresence {
    /// Value macros and their format type.
    pub formats: Vec<(String, String)>,
    pub lookups: Vec<RichPresenceLookup>,
    pub displays: Vec<RichPresenceDisplay>,
}

impl RichPresence {
    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }

    /// Registers a value macro, keeping the first format seen for a name.
    pub fn add_format(&mut self, name: &str, format: &str) {
        if !self.formats.iter().any(|(existing, _)| existing == name) {
            self.formats.push((name.to_string(), format.to_string()));
        }
    }

    /// Registers a lookup table, replacing an earlier one of the same name.
    pub fn add_lookup(&mut self, lookup: RichPresenceLookup) {
        match self.lookups.iter_mut().find(|existing| existing.name == lookup.name) {
            Some(existing) => *existing = lookup,
            None => self.lookups.push(lookup),
        }
    }

    /// Conditional displays come first, in script order, followed by the
    /// last unconditional one.
    pub fn script(&self) -> String {
        let mut out = String::new();
        for (name, format) in &self.formats {
            let _ = write!(out, "Format:{name}\nFormatType={}\n\n", format.to_uppercase());
        }
        for lookup in &self.lookups {
            let _ = writeln!(out, "Lookup:{}", lookup.name);
            for (key, text) in &lookup.entries {
                let _ = writeln!(out, "{key}={text}");
            }
            if !lookup.fallback.is_empty() {
                let _ = writeln!(out, "*={}", lookup.fallback);
            }
            out.push('\n');
        }
        out.push_str("Display:\n");
        for display in &self.displays {
            if let Some(condition) = &display.condition {
                let _ = writeln!(out, "?{condition}?{}", display.text);
            }
        }
        if let Some(default) = self.displays.iter().rev().find(|display| display.condition.is_none()) {
            let _ = writeln!(out, "{}", default.text);
        }
        out
    }
}

/// Everything one script run produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ScriptOutput {
    pub achievements: Vec<Achievement>,
    pub leaderboards: Vec<Leaderboard>,
    pub rich_presence: RichPresence,
}

impl ScriptOutput {
    pub fn is_empty(&self) -> bool {
        self.achievements.is_empty() && self.leaderboards.is_empty() && self.rich_presence.is_empty()
    }

    /// Render as TOML, one commented table per asset.
    pub fn to_toml(&self) -> String {
        let mut doc = Document::new();

        if !self.achievements.is_empty() {
            let mut aot = ArrayOfTables::new();
            for a in &self.achievements {
                let mut t = Table::new();
                t["id"] = value(i64::from(a.id));
                t["title"] = value(a.title.clone());
                t["description"] = value(a.description.clone());
                t["points"] = value(i64::from(a.points));
                if !a.kind.is_empty() {
                    t["type"] = value(a.kind.clone());
                }
                t["badge"] = value(a.badge.clone());
                t["trigger"] = value(a.trigger.to_string());
                t.decor_mut()
                    .set_prefix(format!("# achievement {} (source line {})\n", a.title, a.source_line));
                aot.push(t);
            }
            doc["achievements"] = Item::ArrayOfTables(aot);
        }

        if !self.leaderboards.is_empty() {
            let mut aot = ArrayOfTables::new();
            for lb in &self.leaderboards {
                let mut t = Table::new();
                t["id"] = value(i64::from(lb.id));
                t["title"] = value(lb.title.clone());
                t["description"] = value(lb.description.clone());
                t["format"] = value(lb.format.clone());
                if lb.lower_is_better {
                    t["lower_is_better"] = value(true);
                }
                t["definition"] = value(lb.definition());
                t.decor_mut()
                    .set_prefix(format!("# leaderboard {} (source line {})\n", lb.title, lb.source_line));
                aot.push(t);
            }
            doc["leaderboards"] = Item::ArrayOfTables(aot);
        }

        if !self.rich_presence.is_empty() {
            doc["rich_presence"] = value(self.rich_presence.script());
        }

        doc.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaderboard_definition_joins_parts() {
        let lb = Leaderboard {
            id: 0,
            title: "Fastest".into(),
            description: "d".into(),
            start: "0xH000010=1".parse().expect("start"),
            cancel: "0xH000010=0".parse().expect("cancel"),
            submit: "0xH000011=1".parse().expect("submit"),
            value: "M:0xX000020".parse().expect("value"),
            format: "frames".into(),
            lower_is_better: true,
            source_line: 4,
        };
        assert_eq!(
            lb.definition(),
            "STA:0xH000010=1::CAN:0xH000010=0::SUB:0xH000011=1::VAL:M:0xX000020"
        );
    }

    #[test]
    fn rich_presence_puts_default_last() {
        let mut rp = RichPresence::default();
        rp.add_format("Score", "value");
        rp.add_lookup(RichPresenceLookup {
            name: "Stage".into(),
            entries: vec![(1, "Forest".into()), (2, "Cave".into())],
            fallback: "Unknown".into(),
        });
        rp.displays.push(RichPresenceDisplay {
            condition: None,
            text: "Playing".into(),
        });
        rp.displays.push(RichPresenceDisplay {
            condition: Some("0xH000001=1".parse().expect("condition")),
            text: "In @Stage(0xH000002)".into(),
        });
        assert_eq!(
            rp.script(),
            "Format:Score\nFormatType=VALUE\n\nLookup:Stage\n1=Forest\n2=Cave\n*=Unknown\n\nDisplay:\n?0xH000001=1?In @Stage(0xH000002)\nPlaying\n"
        );
    }

    #[test]
    fn toml_carries_source_line_comments() {
        let output = ScriptOutput {
            achievements: vec![Achievement {
                id: 7,
                title: "First".into(),
                description: "Do it".into(),
                points: 5,
                badge: "0".into(),
                kind: String::new(),
                trigger: "0xH001234=5".parse().expect("trigger"),
                source_line: 3,
            }],
            ..ScriptOutput::default()
        };
        let toml = output.to_toml();
        assert!(toml.contains("# achievement First (source line 3)\n[[achievements]]"));
        assert!(toml.contains("trigger = \"0xH001234=5\""));
        assert!(!toml.contains("rich_presence"));
    }
}
