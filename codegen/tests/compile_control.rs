//! Structural tests for line numbers, jumps, subroutines and loops.

mod common;

use basjvm_ast::{CompareOp, ExprKind, LineNumber, OnJump, Operator, StmtKind, VarName};
use basjvm_classfile::opcode;
use basjvm_classfile::ClassFile;
use basjvm_codegen::{compile, CodegenError, CodegenOptions};
use common::{calls_of, compile_program, instructions_of, member_refs};

fn compile_err(program: &[StmtKind]) -> CodegenError {
    compile(program, &CodegenOptions::default()).unwrap_err()
}

/// Returns the pcs that follow every `gosubPush; goto` pair in `main`.
fn return_points(class: &ClassFile) -> Vec<usize> {
    let instructions = instructions_of(class, "main");
    let mut points = Vec::new();
    for (i, insn) in instructions.iter().enumerate() {
        if insn.opcode != opcode::INVOKESTATIC {
            continue;
        }
        let (_, name, _) = class
            .constant_pool
            .get_member_ref(insn.pool_index.unwrap())
            .unwrap();
        if name == "gosubPush" {
            assert_eq!(instructions[i + 1].opcode, opcode::GOTO);
            points.push(instructions[i + 2].pc);
        }
    }
    points
}

#[test]
fn compile_when_goto_undefined_line_then_undefined_line_error() {
    let program = vec![StmtKind::line(10), StmtKind::goto(50)];

    let err = compile_err(&program);

    assert!(matches!(err, CodegenError::UndefinedLine(LineNumber(50))));
    assert_eq!(err.to_string(), "line 50 is not defined");
}

#[test]
fn compile_when_line_defined_twice_then_duplicate_line_error() {
    let program = vec![
        StmtKind::line(10),
        StmtKind::End,
        StmtKind::line(10),
        StmtKind::End,
    ];

    let err = compile_err(&program);

    assert!(matches!(err, CodegenError::DuplicateLine(LineNumber(10))));
}

#[test]
fn compile_when_on_goto_names_undefined_line_then_undefined_line_error() {
    let program = vec![
        StmtKind::line(10),
        StmtKind::OnGoto(OnJump {
            selector: ExprKind::number(1.0),
            targets: vec![LineNumber(10), LineNumber(99)],
        }),
    ];

    let err = compile_err(&program);

    assert!(matches!(err, CodegenError::UndefinedLine(LineNumber(99))));
}

#[test]
fn compile_when_gosub_then_dispatch_returns_after_each_call() {
    let program = vec![
        StmtKind::line(10),
        StmtKind::gosub(100),
        StmtKind::line(20),
        StmtKind::gosub(100),
        StmtKind::line(30),
        StmtKind::End,
        StmtKind::line(100),
        StmtKind::Return,
    ];

    let class = compile_program(&program);

    let points = return_points(&class);
    assert_eq!(points.len(), 2);
    let switches: Vec<_> = instructions_of(&class, "main")
        .into_iter()
        .filter(|i| i.opcode == opcode::TABLESWITCH)
        .collect();
    assert_eq!(switches.len(), 1);
    // Call sites in order, then the default.
    assert_eq!(switches[0].targets[..2], points[..]);
    assert_eq!(switches[0].targets.len(), 3);
}

#[test]
fn compile_when_gosub_then_stack_cells_initialized() {
    let program = vec![
        StmtKind::line(10),
        StmtKind::gosub(20),
        StmtKind::line(20),
        StmtKind::Return,
    ];

    let class = compile_program(&program);

    assert!(class.field("gosubStack").is_some());
    assert!(class.field("gosubDepth").is_some());
    assert_eq!(
        member_refs(&class, "<clinit>", opcode::PUTSTATIC),
        vec![("Main".to_string(), "gosubStack".to_string())]
    );
}

#[test]
fn compile_when_return_without_gosub_then_dispatch_always_faults() {
    let program = vec![StmtKind::line(10), StmtKind::Return];

    let class = compile_program(&program);

    assert_eq!(calls_of(&class, "main"), vec!["gosubPop", "fault", "reportFault"]);
    assert!(instructions_of(&class, "main")
        .iter()
        .all(|i| i.opcode != opcode::TABLESWITCH));
}

#[test]
fn compile_when_on_gosub_then_one_return_point_for_all_targets() {
    let program = vec![
        StmtKind::line(10),
        StmtKind::OnGosub(OnJump {
            selector: ExprKind::scalar("N"),
            targets: vec![LineNumber(100), LineNumber(200)],
        }),
        StmtKind::line(20),
        StmtKind::End,
        StmtKind::line(100),
        StmtKind::Return,
        StmtKind::line(200),
        StmtKind::Return,
    ];

    let class = compile_program(&program);

    let points = return_points(&class);
    assert_eq!(points.len(), 2);
    let switches: Vec<_> = instructions_of(&class, "main")
        .into_iter()
        .filter(|i| i.opcode == opcode::TABLESWITCH)
        .collect();
    // The ON selector switch and the return dispatch.
    assert_eq!(switches.len(), 2);
    assert_eq!(switches[0].targets.len(), 3);
    assert_eq!(switches[1].targets.len(), 2);
    assert_eq!(switches[1].targets[0], switches[0].targets[2]);
}

#[test]
fn compile_when_on_goto_then_switch_starts_at_one() {
    let program = vec![
        StmtKind::line(10),
        StmtKind::OnGoto(OnJump {
            selector: ExprKind::number(2.0),
            targets: vec![LineNumber(20), LineNumber(30)],
        }),
        StmtKind::line(20),
        StmtKind::End,
        StmtKind::line(30),
        StmtKind::End,
    ];

    let class = compile_program(&program);

    let code = &class.method("main").unwrap().code.as_ref().unwrap().code;
    let switch = instructions_of(&class, "main")
        .into_iter()
        .find(|i| i.opcode == opcode::TABLESWITCH)
        .unwrap();
    let base = switch.pc + 1 + (3 - switch.pc % 4);
    let low = i32::from_be_bytes(code[base + 4..base + 8].try_into().unwrap());
    let high = i32::from_be_bytes(code[base + 8..base + 12].try_into().unwrap());
    assert_eq!((low, high), (1, 2));
    assert_eq!(calls_of(&class, "main"), vec!["onSelector", "reportFault"]);
}

#[test]
fn compile_when_for_loop_then_no_runtime_needed() {
    let program = vec![
        StmtKind::line(10),
        StmtKind::for_to(
            "I",
            ExprKind::number(1.0),
            ExprKind::number(10.0),
            Some(ExprKind::number(2.0)),
        ),
        StmtKind::line(20),
        StmtKind::let_scalar(
            "S",
            ExprKind::binary(Operator::Add, ExprKind::scalar("S"), ExprKind::scalar("I")),
        ),
        StmtKind::line(30),
        StmtKind::next(&["I"]),
    ];

    let class = compile_program(&program);

    assert_eq!(class.method_names(), vec!["main", "<clinit>"]);
    let ops: Vec<u8> = instructions_of(&class, "main").iter().map(|i| i.opcode).collect();
    assert!(ops.contains(&opcode::FCMPG));
    assert!(ops.contains(&opcode::IFGE));
}

#[test]
fn compile_when_nested_loops_closed_by_one_next_then_ok() {
    let program = vec![
        StmtKind::for_to("I", ExprKind::number(1.0), ExprKind::number(2.0), None),
        StmtKind::for_to("J", ExprKind::number(1.0), ExprKind::number(2.0), None),
        StmtKind::next(&["J", "I"]),
    ];

    compile_program(&program);
}

#[test]
fn compile_when_bare_next_then_closes_innermost() {
    let program = vec![
        StmtKind::for_to("I", ExprKind::number(1.0), ExprKind::number(2.0), None),
        StmtKind::for_to("J", ExprKind::number(1.0), ExprKind::number(2.0), None),
        StmtKind::next(&[]),
        StmtKind::next(&["I"]),
    ];

    compile_program(&program);
}

#[test]
fn compile_when_next_without_for_then_error() {
    let err = compile_err(&[StmtKind::next(&["I"])]);

    assert!(matches!(err, CodegenError::NextWithoutFor));
}

#[test]
fn compile_when_next_inside_while_then_next_without_for_error() {
    let program = vec![
        StmtKind::for_to("I", ExprKind::number(1.0), ExprKind::number(2.0), None),
        StmtKind::While(ExprKind::number(0.0)),
        StmtKind::next(&["I"]),
    ];

    let err = compile_err(&program);

    assert!(matches!(err, CodegenError::NextWithoutFor));
}

#[test]
fn compile_when_next_names_other_variable_then_mismatch_error() {
    let program = vec![
        StmtKind::for_to("I", ExprKind::number(1.0), ExprKind::number(2.0), None),
        StmtKind::for_to("J", ExprKind::number(1.0), ExprKind::number(2.0), None),
        StmtKind::next(&["I"]),
    ];

    let err = compile_err(&program);

    match err {
        CodegenError::NextMismatch { expected, found } => {
            assert_eq!(expected, VarName::new("J"));
            assert_eq!(found, VarName::new("I"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn compile_when_for_never_closed_then_for_without_next_error() {
    let program = vec![
        StmtKind::line(10),
        StmtKind::for_to("K", ExprKind::number(1.0), ExprKind::number(2.0), None),
    ];

    let err = compile_err(&program);

    assert!(matches!(err, CodegenError::ForWithoutNext(name) if name == VarName::new("K")));
}

#[test]
fn compile_when_for_text_control_then_type_mismatch() {
    let program = vec![StmtKind::for_to(
        "A$",
        ExprKind::number(1.0),
        ExprKind::number(2.0),
        None,
    )];

    let err = compile_err(&program);

    assert!(matches!(err, CodegenError::TypeMismatch { .. }));
}

#[test]
fn compile_when_while_never_closed_then_while_without_wend_error() {
    let program = vec![StmtKind::While(ExprKind::compare(
        CompareOp::Lt,
        ExprKind::scalar("I"),
        ExprKind::number(3.0),
    ))];

    let err = compile_err(&program);

    assert!(matches!(err, CodegenError::WhileWithoutWend));
}

#[test]
fn compile_when_wend_without_while_then_error() {
    let err = compile_err(&[StmtKind::line(10), StmtKind::Wend]);

    assert!(matches!(err, CodegenError::WendWithoutWhile));
}

#[test]
fn compile_when_wend_closes_for_then_wend_without_while_error() {
    let program = vec![
        StmtKind::for_to("I", ExprKind::number(1.0), ExprKind::number(2.0), None),
        StmtKind::Wend,
    ];

    let err = compile_err(&program);

    assert!(matches!(err, CodegenError::WendWithoutWhile));
}

#[test]
fn compile_when_if_then_goto_then_branch_to_line() {
    let program = vec![
        StmtKind::line(10),
        StmtKind::if_then(
            ExprKind::compare(CompareOp::Eq, ExprKind::scalar("A"), ExprKind::number(0.0)),
            vec![StmtKind::goto(30)],
        ),
        StmtKind::line(20),
        StmtKind::let_scalar("A", ExprKind::number(1.0)),
        StmtKind::line(30),
        StmtKind::Stop,
    ];

    let class = compile_program(&program);

    assert_eq!(class.method_names(), vec!["main", "<clinit>"]);
}

#[test]
fn compile_when_end_inside_program_then_jumps_to_exit() {
    let program = vec![
        StmtKind::line(10),
        StmtKind::End,
        StmtKind::line(20),
        StmtKind::print_line(ExprKind::text("UNREACHED")),
    ];

    let class = compile_program(&program);

    // END flushes through the shared exit block.
    let flushes = member_refs(&class, "main", opcode::INVOKEVIRTUAL)
        .into_iter()
        .filter(|(owner, name)| owner == "java/io/PrintStream" && name == "flush")
        .count();
    assert_eq!(flushes, 2);
}
