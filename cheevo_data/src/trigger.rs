use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::parse::{Cursor, ParseError};
use crate::requirement::{Requirement, parse_requirement};

/// Largest number of alt groups the compiler may generate for one trigger.
pub const MAX_EXPANSION_SIZE: usize = 10_000;

/// A compiled condition: every core requirement AND at least one alt group.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trigger {
    pub core: Vec<Requirement>,
    pub alts: Vec<Vec<Requirement>>,
}

impl Trigger {
    pub fn new(core: Vec<Requirement>, alts: Vec<Vec<Requirement>>) -> Self {
        Self { core, alts }
    }

    /// Core first, followed by each alt.
    pub fn groups(&self) -> impl Iterator<Item = &Vec<Requirement>> {
        std::iter::once(&self.core).chain(self.alts.iter())
    }

    /// Builds a trigger from optimizer groups, where `groups[0]` is the core.
    pub fn from_groups(mut groups: Vec<Vec<Requirement>>) -> Self {
        if groups.is_empty() {
            return Self::default();
        }
        let core = groups.remove(0);
        Self { core, alts: groups }
    }

    pub fn into_groups(self) -> Vec<Vec<Requirement>> {
        let mut groups = Vec::with_capacity(self.alts.len() + 1);
        groups.push(self.core);
        groups.extend(self.alts);
        groups
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, group: &[Requirement]) -> fmt::Result {
    for (i, requirement) in group.iter().enumerate() {
        if i > 0 {
            f.write_str("_")?;
        }
        write!(f, "{requirement}")?;
    }
    Ok(())
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_group(f, &self.core)?;
        for alt in &self.alts {
            f.write_str("S")?;
            write_group(f, alt)?;
        }
        Ok(())
    }
}

/// Reads `_`-separated requirements, stopping before `stop` or the end of input.
fn parse_group(cursor: &mut Cursor<'_>, stop: u8) -> Result<Vec<Requirement>, ParseError> {
    let mut group = Vec::new();
    if cursor.at_end() || cursor.peek() == Some(stop) {
        return Ok(group);
    }
    loop {
        group.push(parse_requirement(cursor)?);
        match cursor.peek() {
            Some(b'_') => {
                cursor.bump();
            },
            None => break,
            Some(b) if b == stop => break,
            Some(other) => return Err(cursor.error(format!("unexpected '{}' between requirements", other as char))),
        }
    }
    Ok(group)
}

impl FromStr for Trigger {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cursor = Cursor::new(s.trim());
        let core = parse_group(&mut cursor, b'S')?;
        let mut alts = Vec::new();
        while cursor.eat(b'S') {
            alts.push(parse_group(&mut cursor, b'S')?);
        }
        if !cursor.at_end() {
            return Err(cursor.error("unexpected trailing characters after trigger"));
        }
        Ok(Self { core, alts })
    }
}

/// A measured value: the largest result of any of its groups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueExpression {
    pub values: Vec<Vec<Requirement>>,
}

impl fmt::Display for ValueExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str("$")?;
            }
            write_group(f, value)?;
        }
        Ok(())
    }
}

impl FromStr for ValueExpression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cursor = Cursor::new(s.trim());
        let mut values = vec![parse_group(&mut cursor, b'$')?];
        while cursor.eat(b'$') {
            values.push(parse_group(&mut cursor, b'$')?);
        }
        if !cursor.at_end() {
            return Err(cursor.error("unexpected trailing characters after value"));
        }
        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit6_marker_is_not_an_alt_separator() {
        let trigger: Trigger = "0xS001234=1S0xH000010=2S0xH000011=3".parse().expect("parse");
        assert_eq!(trigger.core.len(), 1);
        assert_eq!(trigger.alts.len(), 2);
        assert_eq!(trigger.to_string(), "0xS001234=1S0xH000010=2S0xH000011=3");
    }

    #[test]
    fn empty_core_keeps_its_position() {
        let trigger: Trigger = "S0xH000010=2S0xH000011=3".parse().expect("parse");
        assert!(trigger.core.is_empty());
        assert_eq!(trigger.alts.len(), 2);
        assert_eq!(trigger.to_string(), "S0xH000010=2S0xH000011=3");
    }

    #[test]
    fn rejects_garbage_between_requirements() {
        assert!("0xH000010=2?0xH000011=3".parse::<Trigger>().is_err());
    }

    #[test]
    fn values_split_on_dollar() {
        let value: ValueExpression = "M:0xH000010$M:0x 000020*2".parse().expect("parse");
        assert_eq!(value.values.len(), 2);
        assert_eq!(value.to_string(), "M:0xH000010$M:0x 000020*2");
    }
}
