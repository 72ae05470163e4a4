//! Builder for the engine's matlabbatch document dialect.
//!
//! Every operation renderer goes through [`BatchScript`] and [`SlotWriter`]
//! so that quoting, cell-block layout and numeric-literal formatting live in
//! one place. A document is an ordered sequence of slots; slot indices are
//! contiguous, start at 1 and follow declaration order. Values referencing
//! other slots' outputs are always concrete paths, never slot indices.

use std::path::Path;

/// Formats a numeric literal the way the engine expects it.
///
/// Integral values render without a decimal point (`84`, `-102`), fractional
/// values in plain decimal (`0.001`), and non-finite values as `NaN`/`inf`,
/// which the engine accepts inside vector literals.
pub(crate) fn num_literal(value: f64) -> String {
    format!("{value}")
}

/// Quotes a string literal, doubling embedded single quotes.
fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// One matlabbatch document under construction.
#[derive(Debug, Default)]
pub struct BatchScript {
    slots: usize,
    buf: String,
}

impl BatchScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits a raw line before or between slots (e.g. an `addpath` call).
    pub fn preamble(&mut self, line: &str) {
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    /// Opens the next slot. `root` is the engine module path under
    /// `matlabbatch{N}`, e.g. `spm.spatial.coreg.estwrite`.
    pub fn slot(&mut self, root: &str) -> SlotWriter<'_> {
        self.slots += 1;
        SlotWriter {
            prefix: format!("matlabbatch{{{}}}.{}.", self.slots, root),
            buf: &mut self.buf,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots
    }

    pub fn text(&self) -> &str {
        &self.buf
    }

    pub fn into_text(self) -> String {
        self.buf
    }
}

/// Writes `field = value;` directives for one slot.
pub struct SlotWriter<'a> {
    prefix: String,
    buf: &'a mut String,
}

impl SlotWriter<'_> {
    fn line(&mut self, field: &str, rhs: &str) {
        self.buf.push_str(&self.prefix);
        self.buf.push_str(field);
        self.buf.push_str(" = ");
        self.buf.push_str(rhs);
        self.buf.push_str(";\n");
    }

    /// A numeric scalar.
    pub fn num(&mut self, field: &str, value: f64) {
        self.line(field, &num_literal(value));
    }

    /// An integer scalar.
    pub fn int(&mut self, field: &str, value: i64) {
        self.line(field, &value.to_string());
    }

    /// A boolean toggle rendered as `0`/`1`.
    pub fn flag(&mut self, field: &str, on: bool) {
        self.line(field, if on { "1" } else { "0" });
    }

    /// A quoted string literal.
    pub fn text(&mut self, field: &str, value: &str) {
        self.line(field, &quoted(value));
    }

    /// The empty string literal `''`.
    pub fn empty_text(&mut self, field: &str) {
        self.line(field, "''");
    }

    /// A one-entry cell of a quoted literal: `{'<entry>'}`.
    pub fn cell(&mut self, field: &str, entry: &str) {
        self.line(field, &format!("{{{}}}", quoted(entry)));
    }

    /// The empty cell `{''}`.
    pub fn empty_cell(&mut self, field: &str) {
        self.line(field, "{''}");
    }

    /// A one-entry cell of a filesystem path, no frame suffix.
    pub fn cell_path(&mut self, field: &str, path: &Path) {
        self.cell(field, &path.display().to_string());
    }

    /// A bracketed cell block, one quoted literal per line:
    ///
    /// ```text
    /// field = {
    /// '<entry>'
    /// ...
    /// };
    /// ```
    pub fn cell_block<I>(&mut self, field: &str, entries: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.buf.push_str(&self.prefix);
        self.buf.push_str(field);
        self.buf.push_str(" = {\n");
        for entry in entries {
            self.buf.push_str(&quoted(entry.as_ref()));
            self.buf.push('\n');
        }
        self.buf.push_str("};\n");
    }

    /// A row vector of space-separated numeric literals: `[a b c]`.
    pub fn vector(&mut self, field: &str, values: &[f64]) {
        let rendered = values
            .iter()
            .map(|v| num_literal(*v))
            .collect::<Vec<_>>()
            .join(" ");
        self.line(field, &format!("[{rendered}]"));
    }

    /// A column vector, one numeric literal per line:
    ///
    /// ```text
    /// field = [
    /// <v>
    /// ...
    /// ];
    /// ```
    pub fn column(&mut self, field: &str, values: &[f64]) {
        self.buf.push_str(&self.prefix);
        self.buf.push_str(field);
        self.buf.push_str(" = [\n");
        for value in values {
            self.buf.push_str(&num_literal(*value));
            self.buf.push('\n');
        }
        self.buf.push_str("];\n");
    }

    /// A matrix literal, rows separated by newlines: `[a b c\nd e f]`.
    pub fn matrix(&mut self, field: &str, rows: &[&[f64]]) {
        let rendered = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| num_literal(*v))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.line(field, &format!("[{rendered}]"));
    }

    /// A raw right-hand side for constructs the typed emitters do not cover
    /// (e.g. empty struct literals).
    pub fn verbatim(&mut self, field: &str, rhs: &str) {
        self.line(field, rhs);
    }
}
