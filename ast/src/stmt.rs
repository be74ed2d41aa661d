//! Statements.
use crate::common::{LineNumber, VarName};
use crate::expr::{ExprKind, Variable};

/// `LET target = value`, with or without the `LET` keyword.
#[derive(Debug, PartialEq, Clone)]
pub struct Assignment {
    pub target: Variable,
    pub value: ExprKind,
}

/// One array of a `DIM` statement, such as `A(10, 20)`.
///
/// The bounds are the largest valid subscript of each dimension.
#[derive(Debug, PartialEq, Clone)]
pub struct DimDecl {
    pub name: VarName,
    pub bounds: Vec<ExprKind>,
}

/// An item of a `PRINT` list.
#[derive(Debug, PartialEq, Clone)]
pub enum PrintItem {
    Expr(ExprKind),
    /// `,` advances to the next print zone.
    Comma,
    /// `;` prints nothing; it only separates.
    Semicolon,
    /// `TAB(n)` moves to column `n`.
    Tab(ExprKind),
    /// `SPC(n)` prints `n` spaces.
    Spc(ExprKind),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Print {
    pub items: Vec<PrintItem>,
}

impl Print {
    /// Returns true if the statement ends with a separator, which
    /// suppresses the newline.
    pub fn suppresses_newline(&self) -> bool {
        matches!(
            self.items.last(),
            Some(PrintItem::Comma) | Some(PrintItem::Semicolon)
        )
    }
}

/// `INPUT ["prompt";] target, target, ...`
#[derive(Debug, PartialEq, Clone)]
pub struct Input {
    pub prompt: Option<String>,
    pub targets: Vec<Variable>,
}

/// `IF condition THEN ... [ELSE ...]`.
///
/// `IF X THEN 100` is represented with a `GOTO 100` arm.
#[derive(Debug, PartialEq, Clone)]
pub struct If {
    pub condition: ExprKind,
    pub then_body: Vec<StmtKind>,
    pub else_body: Vec<StmtKind>,
}

/// `ON selector GOTO|GOSUB line, line, ...`
#[derive(Debug, PartialEq, Clone)]
pub struct OnJump {
    pub selector: ExprKind,
    pub targets: Vec<LineNumber>,
}

/// `FOR control = from TO to [STEP step]`
#[derive(Debug, PartialEq, Clone)]
pub struct For {
    pub control: VarName,
    pub from: ExprKind,
    pub to: ExprKind,
    pub step: Option<ExprKind>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum StmtKind {
    /// Marks the start of a numbered line.
    Line(LineNumber),
    Let(Assignment),
    Dim(Vec<DimDecl>),
    Print(Print),
    Input(Input),
    Goto(LineNumber),
    Gosub(LineNumber),
    Return,
    OnGoto(OnJump),
    OnGosub(OnJump),
    If(If),
    For(For),
    /// `NEXT [var, var, ...]`. An empty list closes the innermost loop.
    Next(Vec<VarName>),
    While(ExprKind),
    Wend,
    /// `DATA item, item, ...` with each item as literal text. Quoted
    /// items have their quotes removed.
    Data(Vec<String>),
    Read(Vec<Variable>),
    Restore(Option<LineNumber>),
    Rem(String),
    End,
    Stop,
}

impl StmtKind {
    pub fn line(number: u32) -> StmtKind {
        StmtKind::Line(LineNumber(number))
    }

    pub fn assign(target: Variable, value: ExprKind) -> StmtKind {
        StmtKind::Let(Assignment { target, value })
    }

    pub fn let_scalar(name: &str, value: ExprKind) -> StmtKind {
        StmtKind::assign(Variable::scalar(name), value)
    }

    pub fn print(items: Vec<PrintItem>) -> StmtKind {
        StmtKind::Print(Print { items })
    }

    /// `PRINT expr`, ending the line.
    pub fn print_line(expr: ExprKind) -> StmtKind {
        StmtKind::print(vec![PrintItem::Expr(expr)])
    }

    pub fn goto(number: u32) -> StmtKind {
        StmtKind::Goto(LineNumber(number))
    }

    pub fn gosub(number: u32) -> StmtKind {
        StmtKind::Gosub(LineNumber(number))
    }

    pub fn if_then(condition: ExprKind, then_body: Vec<StmtKind>) -> StmtKind {
        StmtKind::If(If {
            condition,
            then_body,
            else_body: vec![],
        })
    }

    pub fn if_then_else(
        condition: ExprKind,
        then_body: Vec<StmtKind>,
        else_body: Vec<StmtKind>,
    ) -> StmtKind {
        StmtKind::If(If {
            condition,
            then_body,
            else_body,
        })
    }

    pub fn for_to(control: &str, from: ExprKind, to: ExprKind, step: Option<ExprKind>) -> StmtKind {
        StmtKind::For(For {
            control: VarName::new(control),
            from,
            to,
            step,
        })
    }

    pub fn next(controls: &[&str]) -> StmtKind {
        StmtKind::Next(controls.iter().map(|c| VarName::new(c)).collect())
    }

    pub fn data(items: &[&str]) -> StmtKind {
        StmtKind::Data(items.iter().map(|i| i.to_string()).collect())
    }

    pub fn dim(name: &str, bounds: Vec<ExprKind>) -> StmtKind {
        StmtKind::Dim(vec![DimDecl {
            name: VarName::new(name),
            bounds,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppresses_newline_when_trailing_semicolon_then_true() {
        let print = Print {
            items: vec![PrintItem::Expr(ExprKind::number(1.0)), PrintItem::Semicolon],
        };
        assert!(print.suppresses_newline());
    }

    #[test]
    fn suppresses_newline_when_trailing_tab_then_false() {
        let print = Print {
            items: vec![PrintItem::Tab(ExprKind::number(5.0))],
        };
        assert!(!print.suppresses_newline());
    }

    #[test]
    fn suppresses_newline_when_empty_then_false() {
        let print = Print { items: vec![] };
        assert!(!print.suppresses_newline());
    }

    #[test]
    fn next_when_names_then_var_names() {
        assert_eq!(
            StmtKind::next(&["I", "J"]),
            StmtKind::Next(vec![VarName::new("I"), VarName::new("J")])
        );
    }
}
