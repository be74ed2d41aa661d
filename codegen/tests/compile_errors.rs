//! Programs the code generator rejects because of value kinds, call
//! arity or array shapes.

mod common;

use basjvm_ast::{
    BuiltinFunction, CompareOp, ExprKind, Operator, StmtKind, ValueKind, VarName, Variable,
};
use basjvm_codegen::{compile, CodegenError, CodegenOptions};
use rstest::rstest;

fn compile_err(program: &[StmtKind]) -> CodegenError {
    compile(program, &CodegenOptions::default()).unwrap_err()
}

fn assert_type_mismatch(err: CodegenError, context: &str, expected: ValueKind, found: ValueKind) {
    match err {
        CodegenError::TypeMismatch {
            context: actual_context,
            expected: actual_expected,
            found: actual_found,
        } => {
            assert_eq!(actual_context, context);
            assert_eq!(actual_expected, expected);
            assert_eq!(actual_found, found);
        }
        other => panic!("expected a type mismatch, got {:?}", other),
    }
}

#[test]
fn compile_when_text_assigned_to_number_then_type_mismatch() {
    let err = compile_err(&[StmtKind::let_scalar("A", ExprKind::text("X"))]);

    assert_type_mismatch(err, "assignment to A", ValueKind::Number, ValueKind::Text);
}

#[test]
fn compile_when_number_assigned_to_text_then_type_mismatch() {
    let err = compile_err(&[StmtKind::let_scalar("A$", ExprKind::number(1.0))]);

    assert_type_mismatch(err, "assignment to A$", ValueKind::Text, ValueKind::Number);
    assert_eq!(
        compile_err(&[StmtKind::let_scalar("A$", ExprKind::number(1.0))]).to_string(),
        "assignment to A$ expects a text value, found a number value"
    );
}

#[test]
fn compile_when_text_plus_number_then_concatenation_mismatch() {
    let value = ExprKind::binary(Operator::Add, ExprKind::text("A"), ExprKind::number(1.0));

    let err = compile_err(&[StmtKind::print_line(value)]);

    assert_type_mismatch(err, "concatenation", ValueKind::Text, ValueKind::Number);
}

#[test]
fn compile_when_number_times_text_then_operator_mismatch() {
    let value = ExprKind::binary(Operator::Mul, ExprKind::number(2.0), ExprKind::text("A"));

    let err = compile_err(&[StmtKind::print_line(value)]);

    assert_type_mismatch(err, "operator *", ValueKind::Number, ValueKind::Text);
}

#[test]
fn compile_when_compare_text_with_number_then_comparison_mismatch() {
    let value = ExprKind::compare(CompareOp::Lt, ExprKind::text("A"), ExprKind::number(1.0));

    let err = compile_err(&[StmtKind::print_line(value)]);

    assert_type_mismatch(err, "comparison", ValueKind::Text, ValueKind::Number);
}

#[test]
fn compile_when_if_condition_is_text_then_mismatch() {
    let program = vec![StmtKind::if_then(ExprKind::text("YES"), vec![StmtKind::End])];

    let err = compile_err(&program);

    assert_type_mismatch(err, "IF condition", ValueKind::Number, ValueKind::Text);
}

#[test]
fn compile_when_text_subscript_then_mismatch() {
    let target = Variable::element("A", vec![ExprKind::text("1")]);

    let err = compile_err(&[StmtKind::assign(target, ExprKind::number(1.0))]);

    assert_type_mismatch(err, "subscript of A", ValueKind::Number, ValueKind::Text);
}

#[test]
fn compile_when_left_given_number_then_argument_mismatch() {
    let value = ExprKind::call(
        BuiltinFunction::Left,
        vec![ExprKind::number(1.0), ExprKind::number(2.0)],
    );

    let err = compile_err(&[StmtKind::print_line(value)]);

    assert_type_mismatch(err, "argument 1 of LEFT$", ValueKind::Text, ValueKind::Number);
}

#[rstest]
#[case(BuiltinFunction::Left, 1, "2")]
#[case(BuiltinFunction::Mid, 4, "2 or 3")]
#[case(BuiltinFunction::Instr, 1, "2 or 3")]
#[case(BuiltinFunction::Rnd, 2, "0 or 1")]
#[case(BuiltinFunction::Sqr, 0, "1")]
#[case(BuiltinFunction::StringFill, 3, "2")]
fn compile_when_wrong_argument_count_then_arity_error(
    #[case] function: BuiltinFunction,
    #[case] count: usize,
    #[case] allowed: &str,
) {
    let args = vec![ExprKind::number(1.0); count];
    let value = ExprKind::call(function, args);

    let target = match function.kind() {
        ValueKind::Text => "X$",
        ValueKind::Number => "X",
    };

    let err = compile_err(&[StmtKind::let_scalar(target, value)]);

    match err {
        CodegenError::Arity {
            function: name,
            expected,
            found,
        } => {
            assert_eq!(name, function.name());
            assert_eq!(expected, allowed);
            assert_eq!(found, count);
        }
        other => panic!("expected an arity error, got {:?}", other),
    }
}

#[test]
fn compile_when_array_used_with_other_dimensions_then_error() {
    let program = vec![
        StmtKind::assign(Variable::element("A", vec![ExprKind::number(1.0)]), ExprKind::number(1.0)),
        StmtKind::print_line(ExprKind::element(
            "A",
            vec![ExprKind::number(1.0), ExprKind::number(2.0)],
        )),
    ];

    let err = compile_err(&program);

    match err {
        CodegenError::ArrayDimensions {
            name,
            expected,
            found,
        } => {
            assert_eq!(name, VarName::new("A"));
            assert_eq!((expected, found), (1, 2));
        }
        other => panic!("expected a dimension error, got {:?}", other),
    }
}

#[test]
fn compile_when_dim_after_use_with_other_dimensions_then_error() {
    let program = vec![
        StmtKind::print_line(ExprKind::element("B$", vec![ExprKind::number(1.0)])),
        StmtKind::dim("B$", vec![ExprKind::number(3.0), ExprKind::number(3.0)]),
    ];

    let err = compile_err(&program);

    assert!(matches!(
        err,
        CodegenError::ArrayDimensions {
            expected: 1,
            found: 2,
            ..
        }
    ));
}

#[test]
fn compile_when_three_dimensions_then_too_many_dimensions() {
    let program = vec![StmtKind::dim(
        "A",
        vec![ExprKind::number(1.0), ExprKind::number(2.0), ExprKind::number(3.0)],
    )];

    let err = compile_err(&program);

    assert!(matches!(err, CodegenError::TooManyDimensions { found: 3, .. }));
    assert_eq!(
        err.to_string(),
        "array A has 3 dimensions, at most 2 are supported"
    );
}

#[test]
fn compile_when_element_without_subscripts_then_dimension_error() {
    let program = vec![StmtKind::print_line(ExprKind::element("A", vec![]))];

    let err = compile_err(&program);

    assert!(matches!(
        err,
        CodegenError::ArrayDimensions {
            expected: 1,
            found: 0,
            ..
        }
    ));
}

#[test]
fn compile_when_scalar_and_array_share_name_then_ok() {
    let program = vec![
        StmtKind::let_scalar("A", ExprKind::number(1.0)),
        StmtKind::assign(
            Variable::element("A", vec![ExprKind::scalar("A")]),
            ExprKind::number(2.0),
        ),
    ];

    assert!(compile(&program, &CodegenOptions::default()).is_ok());
}
