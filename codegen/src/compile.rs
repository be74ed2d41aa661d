//! Compiles a BASIC program into a JVM class file.
//!
//! The program becomes the `main` method of the generated class. Anything
//! without a direct JVM instruction calls a helper method of the runtime
//! library, which is appended to the class after `main`.
//!
//! # Layout of `main`
//!
//! ```text
//!     goto init
//! body:
//!     <statements>
//! exit:
//!     [flush System.out]
//!     return
//!     [return dispatch]
//! body_end:
//!     [handler: report the fault, flush System.out, return]
//! init:
//!     <assign every local its initial value>
//!     goto body
//! ```
//!
//! Locals are allocated while the statements compile, so their initial
//! values can only be emitted once the body is done; hence the jump to the
//! end and back. The handler covers `[body, body_end)` and exists only when
//! the program uses the runtime library, since only helpers raise faults.
//!
//! # Values
//!
//! Numbers are `float` and text is `java/lang/String`. A comparison pushes
//! the BASIC truth value, -1 for true and 0 for false. Conditions treat any
//! value other than 0 as true.

use std::collections::HashMap;

use basjvm_ast::{
    ArrayElement, BinaryExpr, BuiltinCall, BuiltinFunction, CompareExpr, CompareOp, DimDecl,
    ExprKind, For, If, Input, LineNumber, OnJump, Operator, Print, PrintItem, StmtKind,
    UnaryExpr, UnaryOp, ValueKind, VarName, Variable,
};
use basjvm_classfile::access::{ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC};
use basjvm_classfile::opcode;
use basjvm_classfile::{ClassFile, ConstantPool, FieldInfo};
use basjvm_faults::Fault;
use log::debug;

use crate::data::DataTable;
use crate::error::CodegenError;
use crate::lines::{CallReturnTable, LineNumberMap};
use crate::method::{LocalInit, MethodEmitter, MethodUnit};
use crate::options::CodegenOptions;
use crate::runtime::{emit_out, ArrayShape, Helper, RuntimeLibrary};

const MAIN_DESCRIPTOR: &str = "([Ljava/lang/String;)V";

/// Operand stack bound of `<clinit>`.
const CLINIT_MAX_STACK: u16 = 6;

const INIT: &str = "__init";
const BODY: &str = "__body";
const EXIT: &str = "__exit";
const RETURN_DISPATCH: &str = "__return_dispatch";
const BODY_END: &str = "__body_end";
const HANDLER: &str = "__handler";

/// Compiles `program` into a class file.
///
/// Fails when the program is structurally invalid, for example when a
/// `GOTO` names an undefined line or a `NEXT` has no `FOR`.
pub fn compile(program: &[StmtKind], options: &CodegenOptions) -> Result<ClassFile, CodegenError> {
    debug!(
        "Compiling {} statements into class {}",
        program.len(),
        options.class_name
    );
    let lines = LineNumberMap::scan(program)?;
    let data = DataTable::scan(program);

    let mut pool = ConstantPool::new();
    let mut runtime = RuntimeLibrary::new();

    let main = compile_main(&mut pool, &mut runtime, program, &lines, &data, options)?;
    let helpers = runtime.flush(&mut pool, &options.class_name)?;
    let clinit = compile_class_initializer(&mut pool, &runtime, &data, options)?;

    let mut methods = Vec::with_capacity(helpers.len() + 2);
    for unit in [main, clinit].into_iter().chain(helpers) {
        methods.push(unit.into_method_info(&mut pool)?);
    }

    let mut fields = Vec::with_capacity(runtime.globals().len());
    for cell in runtime.globals() {
        fields.push(FieldInfo {
            access_flags: ACC_PRIVATE | ACC_STATIC,
            name_index: pool.utf8(cell.name())?,
            descriptor_index: pool.utf8(cell.descriptor())?,
        });
    }

    let mut class = ClassFile::new(pool, &options.class_name, &options.super_class)?;
    class.major_version = options.major_version;
    class.fields = fields;
    class.methods = methods;

    debug!(
        "Assembled class {}: {} methods, {} fields, {} constants",
        options.class_name,
        class.methods.len(),
        class.fields.len(),
        class.constant_pool.len()
    );
    Ok(class)
}

/// Compiles the statements into `main`.
fn compile_main(
    pool: &mut ConstantPool,
    runtime: &mut RuntimeLibrary,
    program: &[StmtKind],
    lines: &LineNumberMap,
    data: &DataTable,
    options: &CodegenOptions,
) -> Result<MethodUnit, CodegenError> {
    let mut m = MethodEmitter::new(
        pool,
        &options.class_name,
        "main",
        MAIN_DESCRIPTOR,
        ACC_PUBLIC | ACC_STATIC,
        options.max_stack,
    );
    let mut ctx = CompileContext::new(runtime, lines, data, options.emit_line_numbers);

    m.emit_goto(INIT);
    m.label(BODY)?;
    compile_statements(&mut m, &mut ctx, program)?;
    ctx.check_blocks_closed()?;

    m.label(EXIT)?;
    if !ctx.runtime.is_empty() {
        emit_flush_out(&mut m)?;
    }
    m.emit_op(opcode::RETURN);

    if ctx.uses_return || !ctx.calls.is_empty() {
        compile_return_dispatch(&mut m, &mut ctx)?;
    }
    m.label(BODY_END)?;

    if !ctx.runtime.is_empty() {
        m.label(HANDLER)?;
        ctx.runtime.call(&mut m, Helper::ReportFault)?;
        emit_flush_out(&mut m)?;
        m.emit_op(opcode::RETURN);
        m.add_exception_handler(BODY, BODY_END, HANDLER, Some("java/lang/RuntimeException"));
    }

    m.label(INIT)?;
    m.emit_local_initializers()?;
    m.emit_goto(BODY);
    m.finish()
}

/// `<clinit>` gives the global cells their initial values.
fn compile_class_initializer(
    pool: &mut ConstantPool,
    runtime: &RuntimeLibrary,
    data: &DataTable,
    options: &CodegenOptions,
) -> Result<MethodUnit, CodegenError> {
    let mut m = MethodEmitter::new(
        pool,
        &options.class_name,
        "<clinit>",
        "()V",
        ACC_STATIC,
        CLINIT_MAX_STACK,
    );
    runtime.emit_initializers(&mut m, data)?;
    m.emit_op(opcode::RETURN);
    m.finish()
}

fn emit_flush_out(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    emit_out(m)?;
    m.emit_invokevirtual("java/io/PrintStream", "flush", "()V")
}

/// `RETURN` jumps here. The call site number popped from the GOSUB stack
/// selects the return point.
fn compile_return_dispatch(m: &mut MethodEmitter, ctx: &mut CompileContext) -> Result<(), CodegenError> {
    m.label(RETURN_DISPATCH)?;
    ctx.runtime.call(m, Helper::GosubPop)?;
    let targets = ctx.calls.targets().to_vec();
    if targets.is_empty() {
        m.emit_op(opcode::POP);
    } else {
        let unknown = m.new_label("return_unknown");
        m.emit_tableswitch(0, &targets, &unknown);
        m.label(&unknown)?;
    }
    ctx.runtime.emit_fault(m, Fault::ReturnWithoutGosub)
}

/// An open `FOR` or `WHILE`.
enum Block {
    For {
        control: VarName,
        variable: u16,
        end: u16,
        step: u16,
        test: String,
        body: String,
        exit: String,
    },
    While {
        top: String,
        exit: String,
    },
}

/// Tracks state during compilation of `main`.
struct CompileContext<'a> {
    runtime: &'a mut RuntimeLibrary,
    lines: &'a LineNumberMap,
    data: &'a DataTable,
    emit_line_numbers: bool,
    /// Open loops, innermost last.
    blocks: Vec<Block>,
    /// Return points of the GOSUBs compiled so far.
    calls: CallReturnTable,
    /// True once a `RETURN` has been compiled.
    uses_return: bool,
    /// The number of subscripts of every array seen so far.
    array_dimensions: HashMap<VarName, usize>,
}

impl<'a> CompileContext<'a> {
    fn new(
        runtime: &'a mut RuntimeLibrary,
        lines: &'a LineNumberMap,
        data: &'a DataTable,
        emit_line_numbers: bool,
    ) -> Self {
        CompileContext {
            runtime,
            lines,
            data,
            emit_line_numbers,
            blocks: Vec::new(),
            calls: CallReturnTable::default(),
            uses_return: false,
            array_dimensions: HashMap::new(),
        }
    }

    /// Returns the shape of array `name` used with `dimensions` subscripts.
    /// An array keeps the number of subscripts of its first use.
    fn array_shape(&mut self, name: &VarName, dimensions: usize) -> Result<ArrayShape, CodegenError> {
        if let Some(expected) = self.array_dimensions.get(name) {
            if *expected != dimensions {
                return Err(CodegenError::ArrayDimensions {
                    name: name.clone(),
                    expected: *expected,
                    found: dimensions,
                });
            }
        }
        let shape = match ArrayShape::of(name.kind(), dimensions) {
            Some(shape) => shape,
            None if dimensions > 2 => {
                return Err(CodegenError::TooManyDimensions {
                    name: name.clone(),
                    found: dimensions,
                })
            }
            None => {
                return Err(CodegenError::ArrayDimensions {
                    name: name.clone(),
                    expected: 1,
                    found: dimensions,
                })
            }
        };
        self.array_dimensions.insert(name.clone(), dimensions);
        Ok(shape)
    }

    fn check_blocks_closed(&self) -> Result<(), CodegenError> {
        match self.blocks.last() {
            Some(Block::For { control, .. }) => Err(CodegenError::ForWithoutNext(control.clone())),
            Some(Block::While { .. }) => Err(CodegenError::WhileWithoutWend),
            None => Ok(()),
        }
    }
}

/// Returns the local of scalar `name`.
fn scalar_slot(m: &mut MethodEmitter, name: &VarName) -> u16 {
    let init = match name.kind() {
        ValueKind::Number => LocalInit::Number,
        ValueKind::Text => LocalInit::Text,
    };
    m.local(name.as_str(), init)
}

/// Returns the local that holds array `name`. Arrays have their own
/// namespace, so `A` and `A()` are different variables.
fn array_slot(m: &mut MethodEmitter, name: &VarName) -> u16 {
    m.local(&format!("{}()", name), LocalInit::Null)
}

fn compile_statements(
    m: &mut MethodEmitter,
    ctx: &mut CompileContext,
    statements: &[StmtKind],
) -> Result<(), CodegenError> {
    for stmt in statements {
        compile_statement(m, ctx, stmt)?;
    }
    Ok(())
}

fn compile_statement(m: &mut MethodEmitter, ctx: &mut CompileContext, stmt: &StmtKind) -> Result<(), CodegenError> {
    match stmt {
        StmtKind::Line(number) => {
            m.label(&LineNumberMap::label_of(*number))?;
            if ctx.emit_line_numbers {
                m.mark_line(number.0);
            }
        }
        StmtKind::Let(assignment) => {
            let value = &assignment.value;
            let context = format!("assignment to {}", assignment.target.name());
            check_kind(value, assignment.target.kind(), &context)?;
            compile_store(m, ctx, &assignment.target, |m, ctx| compile_expr(m, ctx, value))?;
        }
        StmtKind::Dim(decls) => {
            for decl in decls {
                compile_dim(m, ctx, decl)?;
            }
        }
        StmtKind::Print(print) => compile_print(m, ctx, print)?,
        StmtKind::Input(input) => compile_input(m, ctx, input)?,
        StmtKind::Goto(line) => {
            let target = ctx.lines.label(*line)?;
            m.emit_goto(&target);
        }
        StmtKind::Gosub(line) => {
            let target = ctx.lines.label(*line)?;
            let after = m.new_label("gosub_return");
            let site = ctx.calls.add(after.clone());
            m.emit_iconst(site)?;
            ctx.runtime.call(m, Helper::GosubPush)?;
            m.emit_goto(&target);
            m.label(&after)?;
        }
        StmtKind::Return => {
            ctx.uses_return = true;
            ctx.runtime.get(Helper::GosubPop);
            m.emit_goto(RETURN_DISPATCH);
        }
        StmtKind::OnGoto(jump) => compile_on_goto(m, ctx, jump)?,
        StmtKind::OnGosub(jump) => compile_on_gosub(m, ctx, jump)?,
        StmtKind::If(if_stmt) => compile_if(m, ctx, if_stmt)?,
        StmtKind::For(for_stmt) => compile_for(m, ctx, for_stmt)?,
        StmtKind::Next(controls) => compile_next(m, ctx, controls)?,
        StmtKind::While(condition) => {
            let top = m.new_label("while_top");
            let exit = m.new_label("while_exit");
            m.label(&top)?;
            compile_condition(m, ctx, condition, "WHILE condition", &exit)?;
            ctx.blocks.push(Block::While { top, exit });
        }
        StmtKind::Wend => match ctx.blocks.pop() {
            Some(Block::While { top, exit }) => {
                m.emit_goto(&top);
                m.label(&exit)?;
            }
            _ => return Err(CodegenError::WendWithoutWhile),
        },
        // DATA items are collected before compiling.
        StmtKind::Data(_) => {}
        StmtKind::Read(targets) => {
            for target in targets {
                let helper = match target.kind() {
                    ValueKind::Number => Helper::ReadNumber,
                    ValueKind::Text => Helper::ReadText,
                };
                compile_store(m, ctx, target, |m, ctx| ctx.runtime.call(m, helper))?;
            }
        }
        StmtKind::Restore(line) => {
            let item = match line {
                Some(line) => {
                    ctx.lines.label(*line)?;
                    ctx.data.first_index_at_or_after(*line)
                }
                None => 0,
            };
            m.emit_iconst(item as i32)?;
            ctx.runtime.call(m, Helper::Restore)?;
        }
        StmtKind::Rem(_) => {}
        StmtKind::End | StmtKind::Stop => m.emit_goto(EXIT),
    }
    Ok(())
}

/// Stores the value that `push_value` pushes into `target`.
///
/// The array and subscripts of an element target are pushed before the
/// value, so the subscripts are evaluated first.
fn compile_store<F>(
    m: &mut MethodEmitter,
    ctx: &mut CompileContext,
    target: &Variable,
    push_value: F,
) -> Result<(), CodegenError>
where
    F: FnOnce(&mut MethodEmitter, &mut CompileContext) -> Result<(), CodegenError>,
{
    match target {
        Variable::Scalar(name) => {
            push_value(m, ctx)?;
            let slot = scalar_slot(m, name);
            match name.kind() {
                ValueKind::Number => m.emit_fstore(slot),
                ValueKind::Text => m.emit_astore(slot),
            }
        }
        Variable::Element(element) => {
            let shape = compile_element_address(m, ctx, element)?;
            push_value(m, ctx)?;
            ctx.runtime.call(m, Helper::Set(shape))?;
        }
    }
    Ok(())
}

/// Pushes the array of `element`, allocating it with the default size on
/// first use, and then its subscripts.
fn compile_element_address(
    m: &mut MethodEmitter,
    ctx: &mut CompileContext,
    element: &ArrayElement,
) -> Result<ArrayShape, CodegenError> {
    let shape = ctx.array_shape(&element.name, element.subscripts.len())?;
    let slot = array_slot(m, &element.name);
    m.emit_aload(slot);
    ctx.runtime.call(m, Helper::Auto(shape))?;
    m.emit_op(opcode::DUP);
    m.emit_astore(slot);
    let context = format!("subscript of {}", element.name);
    for subscript in &element.subscripts {
        compile_typed(m, ctx, subscript, ValueKind::Number, &context)?;
    }
    Ok(shape)
}

fn compile_dim(m: &mut MethodEmitter, ctx: &mut CompileContext, decl: &DimDecl) -> Result<(), CodegenError> {
    let shape = ctx.array_shape(&decl.name, decl.bounds.len())?;
    let slot = array_slot(m, &decl.name);
    m.emit_aload(slot);
    let context = format!("bound of {}", decl.name);
    for bound in &decl.bounds {
        compile_typed(m, ctx, bound, ValueKind::Number, &context)?;
    }
    ctx.runtime.call(m, Helper::Dim(shape))?;
    m.emit_astore(slot);
    Ok(())
}

fn compile_print(m: &mut MethodEmitter, ctx: &mut CompileContext, print: &Print) -> Result<(), CodegenError> {
    for item in &print.items {
        match item {
            PrintItem::Expr(expr) => {
                compile_expr(m, ctx, expr)?;
                let helper = match expr.kind() {
                    ValueKind::Number => Helper::PrintNumber,
                    ValueKind::Text => Helper::PrintText,
                };
                ctx.runtime.call(m, helper)?;
            }
            PrintItem::Comma => ctx.runtime.call(m, Helper::PrintComma)?,
            PrintItem::Semicolon => {}
            PrintItem::Tab(column) => {
                compile_typed(m, ctx, column, ValueKind::Number, "TAB")?;
                ctx.runtime.call(m, Helper::PrintTab)?;
            }
            PrintItem::Spc(count) => {
                compile_typed(m, ctx, count, ValueKind::Number, "SPC")?;
                ctx.runtime.call(m, Helper::PrintSpc)?;
            }
        }
    }
    if !print.suppresses_newline() {
        ctx.runtime.call(m, Helper::PrintNewline)?;
    }
    Ok(())
}

fn compile_input(m: &mut MethodEmitter, ctx: &mut CompileContext, input: &Input) -> Result<(), CodegenError> {
    for (i, target) in input.targets.iter().enumerate() {
        let prompt = if i == 0 {
            format!("{}? ", input.prompt.as_deref().unwrap_or(""))
        } else {
            "?? ".to_string()
        };
        let helper = match target.kind() {
            ValueKind::Number => Helper::InputNumber,
            ValueKind::Text => Helper::InputText,
        };
        compile_store(m, ctx, target, |m, ctx| {
            m.emit_ldc_string(&prompt)?;
            ctx.runtime.call(m, helper)
        })?;
    }
    Ok(())
}

/// Pushes the selector of an `ON` statement as an int.
fn compile_selector(m: &mut MethodEmitter, ctx: &mut CompileContext, jump: &OnJump) -> Result<(), CodegenError> {
    compile_typed(m, ctx, &jump.selector, ValueKind::Number, "ON selector")?;
    ctx.runtime.call(m, Helper::OnSelector)
}

fn line_labels(ctx: &CompileContext, targets: &[LineNumber]) -> Result<Vec<String>, CodegenError> {
    targets.iter().map(|line| ctx.lines.label(*line)).collect()
}

/// Selector `n` jumps to the `n`th line; any other selector continues with
/// the next statement.
fn compile_on_goto(m: &mut MethodEmitter, ctx: &mut CompileContext, jump: &OnJump) -> Result<(), CodegenError> {
    let targets = line_labels(ctx, &jump.targets)?;
    compile_selector(m, ctx, jump)?;
    if targets.is_empty() {
        m.emit_op(opcode::POP);
        return Ok(());
    }
    let next = m.new_label("on_next");
    m.emit_tableswitch(1, &targets, &next);
    m.label(&next)?;
    Ok(())
}

/// Like `ON GOTO`, but every target is reached through a stub that pushes
/// the return point, which all targets share.
fn compile_on_gosub(m: &mut MethodEmitter, ctx: &mut CompileContext, jump: &OnJump) -> Result<(), CodegenError> {
    let targets = line_labels(ctx, &jump.targets)?;
    compile_selector(m, ctx, jump)?;
    if targets.is_empty() {
        m.emit_op(opcode::POP);
        return Ok(());
    }
    let after = m.new_label("gosub_return");
    let site = ctx.calls.add(after.clone());
    let stubs: Vec<String> = targets.iter().map(|_| m.new_label("on_gosub")).collect();
    m.emit_tableswitch(1, &stubs, &after);
    for (stub, target) in stubs.iter().zip(&targets) {
        m.label(stub)?;
        m.emit_iconst(site)?;
        ctx.runtime.call(m, Helper::GosubPush)?;
        m.emit_goto(target);
    }
    m.label(&after)?;
    Ok(())
}

/// Evaluates `condition` and jumps to `when_false` if it is 0.
fn compile_condition(
    m: &mut MethodEmitter,
    ctx: &mut CompileContext,
    condition: &ExprKind,
    context: &str,
    when_false: &str,
) -> Result<(), CodegenError> {
    compile_typed(m, ctx, condition, ValueKind::Number, context)?;
    m.emit_op(opcode::FCONST_0);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFEQ, when_false);
    Ok(())
}

fn compile_if(m: &mut MethodEmitter, ctx: &mut CompileContext, if_stmt: &If) -> Result<(), CodegenError> {
    let end = m.new_label("if_end");
    if if_stmt.else_body.is_empty() {
        compile_condition(m, ctx, &if_stmt.condition, "IF condition", &end)?;
        compile_statements(m, ctx, &if_stmt.then_body)?;
    } else {
        let otherwise = m.new_label("if_else");
        compile_condition(m, ctx, &if_stmt.condition, "IF condition", &otherwise)?;
        compile_statements(m, ctx, &if_stmt.then_body)?;
        m.emit_goto(&end);
        m.label(&otherwise)?;
        compile_statements(m, ctx, &if_stmt.else_body)?;
    }
    m.label(&end)?;
    Ok(())
}

fn compile_for(m: &mut MethodEmitter, ctx: &mut CompileContext, for_stmt: &For) -> Result<(), CodegenError> {
    let control = &for_stmt.control;
    if control.kind() != ValueKind::Number {
        return Err(CodegenError::TypeMismatch {
            context: format!("FOR {}", control),
            expected: ValueKind::Number,
            found: control.kind(),
        });
    }
    let context = format!("FOR {}", control);

    compile_typed(m, ctx, &for_stmt.from, ValueKind::Number, &context)?;
    let variable = scalar_slot(m, control);
    m.emit_fstore(variable);

    compile_typed(m, ctx, &for_stmt.to, ValueKind::Number, &context)?;
    let end = m.temp(LocalInit::Number);
    m.emit_fstore(end);

    match &for_stmt.step {
        Some(step) => compile_typed(m, ctx, step, ValueKind::Number, &context)?,
        None => m.emit_op(opcode::FCONST_1),
    }
    let step = m.temp(LocalInit::Number);
    m.emit_fstore(step);

    let test = m.new_label("for_test");
    let body = m.new_label("for_body");
    let exit = m.new_label("for_exit");
    m.emit_goto(&test);
    m.label(&body)?;

    ctx.blocks.push(Block::For {
        control: control.clone(),
        variable,
        end,
        step,
        test,
        body,
        exit,
    });
    Ok(())
}

/// Closes the innermost loop for a bare `NEXT`, otherwise one loop per
/// name, innermost first.
fn compile_next(m: &mut MethodEmitter, ctx: &mut CompileContext, controls: &[VarName]) -> Result<(), CodegenError> {
    if controls.is_empty() {
        return close_for(m, ctx, None);
    }
    for control in controls {
        close_for(m, ctx, Some(control))?;
    }
    Ok(())
}

/// Steps the control variable and loops while it has not passed the end:
/// upwards for a non-negative step, downwards for a negative one.
fn close_for(m: &mut MethodEmitter, ctx: &mut CompileContext, name: Option<&VarName>) -> Result<(), CodegenError> {
    let Some(Block::For {
        control,
        variable,
        end,
        step,
        test,
        body,
        exit,
    }) = ctx.blocks.pop()
    else {
        return Err(CodegenError::NextWithoutFor);
    };
    if let Some(name) = name {
        if *name != control {
            return Err(CodegenError::NextMismatch {
                expected: control,
                found: name.clone(),
            });
        }
    }

    m.emit_fload(variable);
    m.emit_fload(step);
    m.emit_op(opcode::FADD);
    m.emit_fstore(variable);

    let downwards = m.new_label("for_downwards");
    m.label(&test)?;
    m.emit_fload(step);
    m.emit_op(opcode::FCONST_0);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFLT, &downwards);
    m.emit_fload(variable);
    m.emit_fload(end);
    m.emit_op(opcode::FCMPG);
    m.emit_branch(opcode::IFLE, &body);
    m.emit_goto(&exit);

    m.label(&downwards)?;
    m.emit_fload(variable);
    m.emit_fload(end);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFGE, &body);
    m.label(&exit)?;
    Ok(())
}

fn check_kind(expr: &ExprKind, expected: ValueKind, context: &str) -> Result<(), CodegenError> {
    let found = expr.kind();
    if found == expected {
        Ok(())
    } else {
        Err(CodegenError::TypeMismatch {
            context: context.to_string(),
            expected,
            found,
        })
    }
}

/// Pushes the value of `expr`, which must be of kind `expected`.
fn compile_typed(
    m: &mut MethodEmitter,
    ctx: &mut CompileContext,
    expr: &ExprKind,
    expected: ValueKind,
    context: &str,
) -> Result<(), CodegenError> {
    check_kind(expr, expected, context)?;
    compile_expr(m, ctx, expr)
}

/// Pushes the value of `expr`.
fn compile_expr(m: &mut MethodEmitter, ctx: &mut CompileContext, expr: &ExprKind) -> Result<(), CodegenError> {
    match expr {
        ExprKind::Number(value) => m.emit_fconst(*value)?,
        ExprKind::Text(text) => m.emit_ldc_string(text)?,
        ExprKind::Variable(Variable::Scalar(name)) => {
            let slot = scalar_slot(m, name);
            match name.kind() {
                ValueKind::Number => m.emit_fload(slot),
                ValueKind::Text => m.emit_aload(slot),
            }
        }
        ExprKind::Variable(Variable::Element(element)) => {
            let shape = compile_element_address(m, ctx, element)?;
            ctx.runtime.call(m, Helper::Get(shape))?;
        }
        ExprKind::Unary(unary) => compile_unary(m, ctx, unary)?,
        ExprKind::Binary(binary) => compile_binary(m, ctx, binary)?,
        ExprKind::Compare(compare) => compile_compare(m, ctx, compare)?,
        ExprKind::Call(call) => compile_call(m, ctx, call)?,
    }
    Ok(())
}

fn compile_unary(m: &mut MethodEmitter, ctx: &mut CompileContext, unary: &UnaryExpr) -> Result<(), CodegenError> {
    match unary.op {
        UnaryOp::Neg => {
            compile_typed(m, ctx, &unary.term, ValueKind::Number, "negation")?;
            m.emit_op(opcode::FNEG);
        }
        UnaryOp::Not => {
            compile_typed(m, ctx, &unary.term, ValueKind::Number, "NOT")?;
            ctx.runtime.call(m, Helper::Not)?;
        }
    }
    Ok(())
}

fn compile_binary(m: &mut MethodEmitter, ctx: &mut CompileContext, binary: &BinaryExpr) -> Result<(), CodegenError> {
    if binary.op == Operator::Add && binary.left.kind() == ValueKind::Text {
        compile_typed(m, ctx, &binary.left, ValueKind::Text, "concatenation")?;
        compile_typed(m, ctx, &binary.right, ValueKind::Text, "concatenation")?;
        return ctx.runtime.call(m, Helper::Concat);
    }

    let context = format!("operator {}", operator_symbol(binary.op));
    compile_typed(m, ctx, &binary.left, ValueKind::Number, &context)?;
    compile_typed(m, ctx, &binary.right, ValueKind::Number, &context)?;
    match binary.op {
        Operator::Add => m.emit_op(opcode::FADD),
        Operator::Sub => m.emit_op(opcode::FSUB),
        Operator::Mul => m.emit_op(opcode::FMUL),
        Operator::Div => ctx.runtime.call(m, Helper::Divide)?,
        Operator::IntDiv => ctx.runtime.call(m, Helper::IntDiv)?,
        Operator::Mod => ctx.runtime.call(m, Helper::Mod)?,
        Operator::Pow => ctx.runtime.call(m, Helper::Power)?,
        Operator::And => ctx.runtime.call(m, Helper::And)?,
        Operator::Or => ctx.runtime.call(m, Helper::Or)?,
        Operator::Xor => ctx.runtime.call(m, Helper::Xor)?,
    }
    Ok(())
}

fn operator_symbol(op: Operator) -> &'static str {
    match op {
        Operator::Add => "+",
        Operator::Sub => "-",
        Operator::Mul => "*",
        Operator::Div => "/",
        Operator::IntDiv => "\\",
        Operator::Mod => "MOD",
        Operator::Pow => "^",
        Operator::And => "AND",
        Operator::Or => "OR",
        Operator::Xor => "XOR",
    }
}

/// Pushes -1 when the comparison holds and 0 otherwise. A comparison with
/// NaN holds only for `<>`.
fn compile_compare(m: &mut MethodEmitter, ctx: &mut CompileContext, compare: &CompareExpr) -> Result<(), CodegenError> {
    let kind = compare.left.kind();
    compile_expr(m, ctx, &compare.left)?;
    compile_typed(m, ctx, &compare.right, kind, "comparison")?;

    let branch = match kind {
        ValueKind::Text => {
            ctx.runtime.call(m, Helper::TextCompare)?;
            int_branch(compare.op)
        }
        ValueKind::Number => {
            // fcmpg makes NaN compare greater, fcmpl less, so that the
            // branch is not taken.
            let cmp = match compare.op {
                CompareOp::Lt | CompareOp::Le => opcode::FCMPG,
                _ => opcode::FCMPL,
            };
            m.emit_op(cmp);
            int_branch(compare.op)
        }
    };

    let holds = m.new_label("cmp_true");
    let done = m.new_label("cmp_done");
    m.emit_branch(branch, &holds);
    m.emit_op(opcode::FCONST_0);
    m.emit_goto(&done);
    m.label(&holds)?;
    m.emit_fconst(-1.0)?;
    m.label(&done)?;
    Ok(())
}

/// Returns the `if<cond>` opcode that branches when a three-way comparison
/// result satisfies `op`.
fn int_branch(op: CompareOp) -> u8 {
    match op {
        CompareOp::Eq => opcode::IFEQ,
        CompareOp::Ne => opcode::IFNE,
        CompareOp::Lt => opcode::IFLT,
        CompareOp::Le => opcode::IFLE,
        CompareOp::Gt => opcode::IFGT,
        CompareOp::Ge => opcode::IFGE,
    }
}

fn check_arity(
    call: &BuiltinCall,
    allowed: &[usize],
    expected: &'static str,
) -> Result<(), CodegenError> {
    if allowed.contains(&call.args.len()) {
        Ok(())
    } else {
        Err(CodegenError::Arity {
            function: call.function.name(),
            expected,
            found: call.args.len(),
        })
    }
}

/// Pushes the arguments of `call`, which must be of the given kinds.
fn compile_args(
    m: &mut MethodEmitter,
    ctx: &mut CompileContext,
    call: &BuiltinCall,
    kinds: &[ValueKind],
) -> Result<(), CodegenError> {
    for (i, (arg, kind)) in call.args.iter().zip(kinds).enumerate() {
        let context = format!("argument {} of {}", i + 1, call.function.name());
        compile_typed(m, ctx, arg, *kind, &context)?;
    }
    Ok(())
}

fn compile_call(m: &mut MethodEmitter, ctx: &mut CompileContext, call: &BuiltinCall) -> Result<(), CodegenError> {
    use ValueKind::{Number, Text};

    let helper = match call.function {
        BuiltinFunction::Abs
        | BuiltinFunction::Atn
        | BuiltinFunction::Chr
        | BuiltinFunction::Cos
        | BuiltinFunction::Exp
        | BuiltinFunction::Fix
        | BuiltinFunction::Int
        | BuiltinFunction::Log
        | BuiltinFunction::Sgn
        | BuiltinFunction::Sin
        | BuiltinFunction::Space
        | BuiltinFunction::Sqr
        | BuiltinFunction::Str
        | BuiltinFunction::Tan => {
            check_arity(call, &[1], "1")?;
            compile_args(m, ctx, call, &[Number])?;
            match call.function {
                BuiltinFunction::Abs => Helper::Abs,
                BuiltinFunction::Atn => Helper::Atn,
                BuiltinFunction::Chr => Helper::Chr,
                BuiltinFunction::Cos => Helper::Cos,
                BuiltinFunction::Exp => Helper::Exp,
                BuiltinFunction::Fix => Helper::Fix,
                BuiltinFunction::Int => Helper::Int,
                BuiltinFunction::Log => Helper::Log,
                BuiltinFunction::Sgn => Helper::Sgn,
                BuiltinFunction::Sin => Helper::Sin,
                BuiltinFunction::Space => Helper::Space,
                BuiltinFunction::Sqr => Helper::Sqr,
                BuiltinFunction::Str => Helper::FloatToText,
                _ => Helper::Tan,
            }
        }
        BuiltinFunction::Asc | BuiltinFunction::Len | BuiltinFunction::Val => {
            check_arity(call, &[1], "1")?;
            compile_args(m, ctx, call, &[Text])?;
            match call.function {
                BuiltinFunction::Asc => Helper::Asc,
                BuiltinFunction::Len => Helper::Len,
                _ => Helper::Val,
            }
        }
        BuiltinFunction::Rnd => {
            check_arity(call, &[0, 1], "0 or 1")?;
            if call.args.is_empty() {
                m.emit_op(opcode::FCONST_1);
            } else {
                compile_args(m, ctx, call, &[Number])?;
            }
            Helper::Rnd
        }
        BuiltinFunction::Left | BuiltinFunction::Right => {
            check_arity(call, &[2], "2")?;
            compile_args(m, ctx, call, &[Text, Number])?;
            if call.function == BuiltinFunction::Left {
                Helper::Left
            } else {
                Helper::Right
            }
        }
        BuiltinFunction::Mid => {
            check_arity(call, &[2, 3], "2 or 3")?;
            compile_args(m, ctx, call, &[Text, Number, Number])?;
            if call.args.len() == 2 {
                Helper::Mid2
            } else {
                Helper::Mid3
            }
        }
        BuiltinFunction::Instr => {
            check_arity(call, &[2, 3], "2 or 3")?;
            if call.args.len() == 2 {
                compile_args(m, ctx, call, &[Text, Text])?;
                Helper::Instr2
            } else {
                compile_args(m, ctx, call, &[Number, Text, Text])?;
                Helper::Instr3
            }
        }
        BuiltinFunction::StringFill => {
            check_arity(call, &[2], "2")?;
            // The fill is either text or a character code.
            match call.args[1].kind() {
                Text => compile_args(m, ctx, call, &[Number, Text])?,
                Number => {
                    compile_args(m, ctx, call, &[Number, Number])?;
                    ctx.runtime.call(m, Helper::Chr)?;
                }
            }
            Helper::StringFill
        }
    };
    ctx.runtime.call(m, helper)
}
