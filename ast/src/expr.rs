//! Expressions.
use crate::common::{ValueKind, VarName};

/// A reference to a variable, either a scalar or an array element.
#[derive(Debug, PartialEq, Clone)]
pub enum Variable {
    Scalar(VarName),
    Element(ArrayElement),
}

impl Variable {
    pub fn scalar(name: &str) -> Variable {
        Variable::Scalar(VarName::new(name))
    }

    pub fn element(name: &str, subscripts: Vec<ExprKind>) -> Variable {
        Variable::Element(ArrayElement {
            name: VarName::new(name),
            subscripts,
        })
    }

    pub fn name(&self) -> &VarName {
        match self {
            Variable::Scalar(name) => name,
            Variable::Element(element) => &element.name,
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.name().kind()
    }
}

/// An element of an array, such as `A(I, J)`.
#[derive(Debug, PartialEq, Clone)]
pub struct ArrayElement {
    pub name: VarName,
    /// One expression per dimension.
    pub subscripts: Vec<ExprKind>,
}

/// Arithmetic and logical operators.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operator {
    /// `+`, which concatenates when both operands are text.
    Add,
    Sub,
    Mul,
    /// `/`
    Div,
    /// `\`
    IntDiv,
    Mod,
    /// `^`
    Pow,
    And,
    Or,
    Xor,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// The built-in functions of the dialect.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BuiltinFunction {
    Abs,
    Asc,
    Atn,
    /// `CHR$`
    Chr,
    Cos,
    Exp,
    Fix,
    Instr,
    Int,
    /// `LEFT$`
    Left,
    Len,
    Log,
    /// `MID$`
    Mid,
    /// `RIGHT$`
    Right,
    Rnd,
    Sgn,
    Sin,
    /// `SPACE$`
    Space,
    Sqr,
    /// `STR$`
    Str,
    /// `STRING$`
    StringFill,
    Tan,
    Val,
}

impl BuiltinFunction {
    /// Returns the kind of value the function produces.
    pub fn kind(&self) -> ValueKind {
        match self {
            BuiltinFunction::Chr
            | BuiltinFunction::Left
            | BuiltinFunction::Mid
            | BuiltinFunction::Right
            | BuiltinFunction::Space
            | BuiltinFunction::Str
            | BuiltinFunction::StringFill => ValueKind::Text,
            _ => ValueKind::Number,
        }
    }

    /// Returns the name of the function as written in source.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinFunction::Abs => "ABS",
            BuiltinFunction::Asc => "ASC",
            BuiltinFunction::Atn => "ATN",
            BuiltinFunction::Chr => "CHR$",
            BuiltinFunction::Cos => "COS",
            BuiltinFunction::Exp => "EXP",
            BuiltinFunction::Fix => "FIX",
            BuiltinFunction::Instr => "INSTR",
            BuiltinFunction::Int => "INT",
            BuiltinFunction::Left => "LEFT$",
            BuiltinFunction::Len => "LEN",
            BuiltinFunction::Log => "LOG",
            BuiltinFunction::Mid => "MID$",
            BuiltinFunction::Right => "RIGHT$",
            BuiltinFunction::Rnd => "RND",
            BuiltinFunction::Sgn => "SGN",
            BuiltinFunction::Sin => "SIN",
            BuiltinFunction::Space => "SPACE$",
            BuiltinFunction::Sqr => "SQR",
            BuiltinFunction::Str => "STR$",
            BuiltinFunction::StringFill => "STRING$",
            BuiltinFunction::Tan => "TAN",
            BuiltinFunction::Val => "VAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: Operator,
    pub left: ExprKind,
    pub right: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub term: ExprKind,
}

/// A comparison. The result is the number -1 when true and 0 when false.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareExpr {
    pub op: CompareOp,
    pub left: ExprKind,
    pub right: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinCall {
    pub function: BuiltinFunction,
    pub args: Vec<ExprKind>,
}

/// Expression that yields a number or a text value.
#[derive(Debug, PartialEq, Clone)]
pub enum ExprKind {
    Number(f32),
    Text(String),
    Variable(Variable),
    Unary(Box<UnaryExpr>),
    Binary(Box<BinaryExpr>),
    Compare(Box<CompareExpr>),
    Call(Box<BuiltinCall>),
}

impl ExprKind {
    pub fn number(value: f32) -> ExprKind {
        ExprKind::Number(value)
    }

    pub fn text(value: &str) -> ExprKind {
        ExprKind::Text(value.to_string())
    }

    pub fn scalar(name: &str) -> ExprKind {
        ExprKind::Variable(Variable::scalar(name))
    }

    pub fn element(name: &str, subscripts: Vec<ExprKind>) -> ExprKind {
        ExprKind::Variable(Variable::element(name, subscripts))
    }

    pub fn unary(op: UnaryOp, term: ExprKind) -> ExprKind {
        ExprKind::Unary(Box::new(UnaryExpr { op, term }))
    }

    pub fn binary(op: Operator, left: ExprKind, right: ExprKind) -> ExprKind {
        ExprKind::Binary(Box::new(BinaryExpr { op, left, right }))
    }

    pub fn compare(op: CompareOp, left: ExprKind, right: ExprKind) -> ExprKind {
        ExprKind::Compare(Box::new(CompareExpr { op, left, right }))
    }

    pub fn call(function: BuiltinFunction, args: Vec<ExprKind>) -> ExprKind {
        ExprKind::Call(Box::new(BuiltinCall { function, args }))
    }

    /// Returns the kind of value the expression produces.
    ///
    /// Addition produces text when its left operand is text; the parser
    /// guarantees that both operands then agree.
    pub fn kind(&self) -> ValueKind {
        match self {
            ExprKind::Number(_) => ValueKind::Number,
            ExprKind::Text(_) => ValueKind::Text,
            ExprKind::Variable(variable) => variable.kind(),
            ExprKind::Unary(_) => ValueKind::Number,
            ExprKind::Binary(binary) => match binary.op {
                Operator::Add => binary.left.kind(),
                _ => ValueKind::Number,
            },
            ExprKind::Compare(_) => ValueKind::Number,
            ExprKind::Call(call) => call.function.kind(),
        }
    }
}
