//! Line wrapping of decompiled text.
//!
//! Text is broken after a top-level `&&` or `||` first, then between the
//! arguments of a call, then at any space. A token without break points is
//! left whole even when it is wider than the line.

use textwrap::{Options, WordSeparator, WordSplitter};

use super::PrintOptions;

/// Wraps `text` so no line is wider than `options.width` where a break is
/// possible. Continuation lines are indented by `options.indent`.
pub fn wrap(text: &str, options: &PrintOptions) -> String {
    let mut writer = LineWriter::new(options);
    writer.write(text, 0);
    writer.finish()
}

struct LineWriter {
    width: usize,
    step: usize,
    lines: Vec<String>,
}

impl LineWriter {
    fn new(options: &PrintOptions) -> Self {
        Self {
            width: options.width,
            step: options.indent,
            lines: Vec::new(),
        }
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }

    fn fits(&self, indent: usize, text: &str) -> bool {
        indent + text.len() <= self.width
    }

    fn push(&mut self, indent: usize, text: &str) {
        self.lines.push(format!("{:indent$}{text}", ""));
    }

    fn write(&mut self, text: &str, indent: usize) {
        if self.fits(indent, text) {
            self.push(indent, text);
            return;
        }

        let clauses = split_top_level(text, &[" && ", " || "]);
        if clauses.len() > 1 {
            self.pack(&clauses, indent, indent);
            return;
        }
        if let Some((head, inner)) = split_call(text) {
            self.write_call(head, inner, indent);
            return;
        }
        self.write_words(text, indent);
    }

    /// Breaks at spaces only; a word is never split.
    fn write_words(&mut self, text: &str, indent: usize) {
        let hang = " ".repeat(self.step);
        let options = Options::new(self.width.saturating_sub(indent).max(1))
            .subsequent_indent(&hang)
            .word_separator(WordSeparator::AsciiSpace)
            .word_splitter(WordSplitter::NoHyphenation)
            .break_words(false);
        for line in textwrap::wrap(text, options) {
            self.push(indent, &line);
        }
    }

    /// Lays out `name(args)` with the arguments on continuation lines. The
    /// closing paren joins the last line unless that line closes parens it
    /// did not open.
    fn write_call(&mut self, head: &str, inner: &str, indent: usize) {
        let args = split_top_level(inner, &[", "]);
        let nested = indent + self.step;
        let mut rest = args.as_slice();
        match args.first() {
            Some(first) if self.fits(indent, &format!("{head}{first}")) => {
                let mut pieces = vec![format!("{head}{first}")];
                pieces.extend(args[1..].iter().cloned());
                rest = &[];
                self.pack(&pieces, indent, nested);
            },
            _ => self.push_head(indent, head),
        }
        if !rest.is_empty() {
            self.pack(rest, nested, nested);
        }

        match self.lines.last_mut() {
            Some(last) if paren_balance(last) >= 0 && last.len() < self.width => last.push(')'),
            _ => self.push(indent, ")"),
        }
    }

    /// Puts a call head that cannot take its first argument at the end of
    /// the previous line when there is room, so no line holds a lone `(`.
    fn push_head(&mut self, indent: usize, head: &str) {
        let width = self.width;
        match self.lines.last_mut() {
            Some(last) if last.ends_with('(') && last.len() + head.len() <= width => last.push_str(head),
            Some(last) if !last.ends_with('(') && last.len() + 1 + head.len() <= width => {
                last.push(' ');
                last.push_str(head);
            },
            _ => self.push(indent, head),
        }
    }

    /// Greedily fills lines with `pieces`, writing a piece that fits no line
    /// through [`LineWriter::write`].
    fn pack(&mut self, pieces: &[String], indent: usize, continuation: usize) {
        let mut line = String::new();
        let mut line_indent = indent;
        for piece in pieces {
            if line.is_empty() {
                if self.fits(line_indent, piece) {
                    line.push_str(piece);
                } else {
                    self.write(piece, line_indent);
                    line_indent = continuation;
                }
                continue;
            }
            if self.fits(line_indent, &line) && line_indent + line.len() + 1 + piece.len() <= self.width {
                line.push(' ');
                line.push_str(piece);
                continue;
            }
            self.push(line_indent, &line);
            line.clear();
            line_indent = continuation;
            if self.fits(line_indent, piece) {
                line.push_str(piece);
            } else {
                self.write(piece, line_indent);
            }
        }
        if !line.is_empty() {
            self.push(line_indent, &line);
        }
    }
}

/// Splits `text` after each separator found outside parens. The separator's
/// trailing space is dropped and the rest is kept on the left piece.
fn split_top_level(text: &str, separators: &[&str]) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut index = 0;
    let bytes = text.as_bytes();
    while index < bytes.len() {
        match bytes[index] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ => {},
        }
        if depth == 0 {
            if let Some(separator) = separators.iter().find(|sep| bytes[index..].starts_with(sep.as_bytes())) {
                let keep = separator.trim_end().len();
                pieces.push(text[start..index + keep].trim_start().to_string());
                index += separator.len();
                start = index;
                continue;
            }
        }
        index += 1;
    }
    pieces.push(text[start..].trim_start().to_string());
    pieces
}

/// True when `op` appears outside any parens.
pub(super) fn has_top_level(text: &str, op: &str) -> bool {
    split_top_level(text, &[&format!(" {op} ")]).len() > 1
}

/// `name(inner)` when the final paren closes the one after `name`. An empty
/// name is a parenthesized group.
fn split_call(text: &str) -> Option<(&str, &str)> {
    let body = text.strip_suffix(')')?;
    let mut depth = 1;
    let mut open = None;
    for (index, byte) in body.bytes().enumerate().rev() {
        match byte {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    open = Some(index);
                    break;
                }
            },
            _ => {},
        }
    }
    let open = open?;
    let name = &text[..open];
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return None;
    }
    Some((&text[..=open], &body[open + 1..]))
}

fn paren_balance(line: &str) -> i32 {
    line.bytes().fold(0, |balance, byte| match byte {
        b'(' => balance + 1,
        b')' => balance - 1,
        _ => balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(width: usize) -> PrintOptions {
        PrintOptions {
            width,
            ..PrintOptions::default()
        }
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(wrap("byte(0x000001) == 1", &options(40)), "byte(0x000001) == 1");
    }

    #[test]
    fn breaks_after_logical_operators() {
        let text = "byte(0x000001) == 1 && byte(0x000002) == 2 && byte(0x000003) == 3";
        assert_eq!(
            wrap(text, &options(45)),
            "byte(0x000001) == 1 && byte(0x000002) == 2 &&\nbyte(0x000003) == 3"
        );
    }

    #[test]
    fn calls_break_after_commas() {
        let text = "tally(3, once(byte(0x000001) == 1), byte(0x000002) == 2, byte(0x000003) == 3)";
        let wrapped = wrap(text, &options(40));
        assert_eq!(
            wrapped,
            "tally(3, once(byte(0x000001) == 1),\n    byte(0x000002) == 2,\n    byte(0x000003) == 3)"
        );
    }

    #[test]
    fn closing_paren_moves_to_its_own_line_after_nested_breaks() {
        let text = "never(repeated(5, byte(0x000001) == 1 && byte(0x000002) == 2))";
        let wrapped = wrap(text, &options(30));
        assert!(wrapped.lines().all(|line| line.len() <= 30), "{wrapped}");
        assert!(wrapped.ends_with("\n)"), "{wrapped}");
    }

    #[test]
    fn group_paren_joins_the_previous_line() {
        let text = "byte(0x000005) == 5 && (byte(0x000001) == 1 || byte(0x000002) == 2 || byte(0x000003) == 3)";
        assert_eq!(
            wrap(text, &options(40)),
            "byte(0x000005) == 5 && (\n    byte(0x000001) == 1 ||\n    byte(0x000002) == 2 ||\n    byte(0x000003) == 3)"
        );
    }

    #[test]
    fn atomic_tokens_may_overflow() {
        let wrapped = wrap("dword_be(0x00001234)", &options(8));
        assert!(wrapped.lines().any(|line| line.len() > 8));
        assert_eq!(wrapped.replace(['\n', ' '], ""), "dword_be(0x00001234)");
    }

    #[test]
    fn split_respects_parens() {
        assert_eq!(
            split_top_level("f(a, b), c", &[", "]),
            vec!["f(a, b),".to_string(), "c".to_string()]
        );
        assert!(has_top_level("a && (b || c)", "&&"));
        assert!(!has_top_level("a && (b || c)", "||"));
    }
}
