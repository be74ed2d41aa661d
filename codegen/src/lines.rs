//! Line numbers and GOSUB call sites.

use std::collections::HashSet;

use basjvm_ast::{LineNumber, StmtKind};

use crate::error::CodegenError;

/// The line numbers a program defines, and the label of each line in the
/// entry point.
#[derive(Debug, Default)]
pub struct LineNumberMap {
    lines: HashSet<LineNumber>,
}

impl LineNumberMap {
    /// Collects the line markers of `program`, including markers inside
    /// `IF` arms.
    pub fn scan(program: &[StmtKind]) -> Result<Self, CodegenError> {
        let mut map = LineNumberMap::default();
        map.scan_statements(program)?;
        Ok(map)
    }

    fn scan_statements(&mut self, statements: &[StmtKind]) -> Result<(), CodegenError> {
        for stmt in statements {
            match stmt {
                StmtKind::Line(number) => {
                    if !self.lines.insert(*number) {
                        return Err(CodegenError::DuplicateLine(*number));
                    }
                }
                StmtKind::If(if_stmt) => {
                    self.scan_statements(&if_stmt.then_body)?;
                    self.scan_statements(&if_stmt.else_body)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn contains(&self, line: LineNumber) -> bool {
        self.lines.contains(&line)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the label that marks `line`, failing if the program does
    /// not define it.
    pub fn label(&self, line: LineNumber) -> Result<String, CodegenError> {
        if self.contains(line) {
            Ok(Self::label_of(line))
        } else {
            Err(CodegenError::UndefinedLine(line))
        }
    }

    /// Returns the label that marks `line`, whether or not it is defined.
    pub fn label_of(line: LineNumber) -> String {
        format!("line_{}", line.0)
    }
}

/// The return points of every GOSUB, numbered densely in the order they
/// appear. `RETURN` dispatches on the number popped from the GOSUB stack.
#[derive(Debug, Default)]
pub struct CallReturnTable {
    targets: Vec<String>,
}

impl CallReturnTable {
    /// Records a return point and returns its number.
    pub fn add(&mut self, label: String) -> i32 {
        self.targets.push(label);
        (self.targets.len() - 1) as i32
    }

    /// Returns the return point labels, indexed by number.
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
