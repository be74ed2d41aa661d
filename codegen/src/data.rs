//! The DATA items of a program.
//!
//! Every `DATA` item, in program order, becomes part of one character
//! buffer. The generated class locates an item through a table of
//! `(offset, length)` pairs; both are built in `<clinit>`.

use basjvm_ast::{LineNumber, StmtKind};

#[derive(Clone, Debug, PartialEq, Eq)]
struct DataItem {
    /// The line the item appears on, if any line marker precedes it.
    line: Option<LineNumber>,
    text: String,
}

/// Every DATA item of a program.
#[derive(Clone, Debug, Default)]
pub struct DataTable {
    items: Vec<DataItem>,
}

impl DataTable {
    /// Collects the DATA items of `program`, including those inside `IF`
    /// arms, in program order.
    pub fn scan(program: &[StmtKind]) -> Self {
        let mut table = DataTable::default();
        let mut line = None;
        table.scan_statements(program, &mut line);
        table
    }

    fn scan_statements(&mut self, statements: &[StmtKind], line: &mut Option<LineNumber>) {
        for stmt in statements {
            match stmt {
                StmtKind::Line(number) => *line = Some(*number),
                StmtKind::Data(items) => {
                    for text in items {
                        self.items.push(DataItem {
                            line: *line,
                            text: text.clone(),
                        });
                    }
                }
                StmtKind::If(if_stmt) => {
                    self.scan_statements(&if_stmt.then_body, line);
                    self.scan_statements(&if_stmt.else_body, line);
                }
                _ => {}
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the text of every item, concatenated.
    pub fn chars(&self) -> String {
        self.items.iter().map(|item| item.text.as_str()).collect()
    }

    /// Returns `(offset, length)` of every item in [`DataTable::chars`],
    /// counted in UTF-16 code units as the host counts them.
    pub fn entries(&self) -> Vec<(u32, u32)> {
        let mut offset = 0;
        self.items
            .iter()
            .map(|item| {
                let length = item.text.encode_utf16().count() as u32;
                let entry = (offset, length);
                offset += length;
                entry
            })
            .collect()
    }

    /// Returns the item lengths as text, two characters per item holding
    /// the high and low 15 bits of the length.
    pub fn lengths_text(&self) -> String {
        self.entries()
            .iter()
            .flat_map(|(_, length)| [*length >> 15, *length & 0x7FFF])
            .filter_map(char::from_u32)
            .collect()
    }

    /// Returns the index of the first item on or after `line`, or the
    /// number of items if there is none.
    pub fn first_index_at_or_after(&self, line: LineNumber) -> usize {
        self.items
            .iter()
            .position(|item| item.line.map_or(false, |l| l >= line))
            .unwrap_or(self.items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basjvm_ast::ExprKind;

    fn program() -> Vec<StmtKind> {
        vec![
            StmtKind::line(10),
            StmtKind::data(&["1", "HELLO"]),
            StmtKind::line(20),
            StmtKind::print_line(ExprKind::number(1.0)),
            StmtKind::line(30),
            StmtKind::data(&["", "3.5"]),
        ]
    }

    #[test]
    fn scan_when_two_data_lines_then_items_in_order() {
        let table = DataTable::scan(&program());

        assert_eq!(table.len(), 4);
        assert_eq!(table.chars(), "1HELLO3.5");
        assert_eq!(table.entries(), vec![(0, 1), (1, 5), (6, 0), (6, 3)]);
    }

    #[test]
    fn first_index_at_or_after_when_line_without_data_then_next_data_line() {
        let table = DataTable::scan(&program());

        assert_eq!(table.first_index_at_or_after(LineNumber(10)), 0);
        assert_eq!(table.first_index_at_or_after(LineNumber(20)), 2);
        assert_eq!(table.first_index_at_or_after(LineNumber(30)), 2);
        assert_eq!(table.first_index_at_or_after(LineNumber(40)), 4);
    }

    #[test]
    fn lengths_text_when_items_then_two_chars_per_item() {
        let table = DataTable::scan(&program());
        let lengths: Vec<u32> = table.lengths_text().chars().map(|c| c as u32).collect();

        assert_eq!(lengths, vec![0, 1, 0, 5, 0, 0, 0, 3]);
    }

    #[test]
    fn entries_when_supplementary_character_then_two_units() {
        let table = DataTable::scan(&[StmtKind::data(&["\u{1F600}", "A"])]);

        assert_eq!(table.entries(), vec![(0, 2), (2, 1)]);
    }

    #[test]
    fn scan_when_data_inside_if_then_included() {
        let table = DataTable::scan(&[
            StmtKind::line(10),
            StmtKind::if_then(ExprKind::number(0.0), vec![StmtKind::data(&["X"])]),
        ]);

        assert_eq!(table.chars(), "X");
        assert_eq!(table.first_index_at_or_after(LineNumber(10)), 0);
    }
}
