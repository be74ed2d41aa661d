//! Shared test helpers for codegen integration tests.

use std::collections::HashSet;
use std::io::Write;
use std::process::{Command, Stdio};

use basjvm_ast::StmtKind;
use basjvm_classfile::instruction::{decode, Instruction};
use basjvm_classfile::opcode;
use basjvm_classfile::{ClassFile, CodeAttribute};
use basjvm_codegen::{compile, CodegenOptions};

#[ctor::ctor]
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Compiles `program` into class `Main` and checks that the result is well
/// formed.
#[allow(dead_code)]
pub fn compile_program(program: &[StmtKind]) -> ClassFile {
    let class = compile(program, &CodegenOptions::default()).unwrap();
    assert_well_formed(&class);
    class
}

/// Returns the code of method `name`.
#[allow(dead_code)]
pub fn code_of<'a>(class: &'a ClassFile, name: &str) -> &'a CodeAttribute {
    class
        .method(name)
        .unwrap_or_else(|| panic!("no method {}", name))
        .code
        .as_ref()
        .unwrap()
}

/// Decodes the code of method `name`.
#[allow(dead_code)]
pub fn instructions_of(class: &ClassFile, name: &str) -> Vec<Instruction> {
    decode(&code_of(class, name).code).unwrap()
}

/// Returns the names of the methods of the class itself that method `name`
/// calls, in call order.
#[allow(dead_code)]
pub fn calls_of(class: &ClassFile, name: &str) -> Vec<String> {
    let own = class.name().unwrap();
    instructions_of(class, name)
        .iter()
        .filter(|i| i.opcode == opcode::INVOKESTATIC)
        .filter_map(|i| {
            let (owner, method, _) = class.constant_pool.get_member_ref(i.pool_index?).ok()?;
            (owner == own).then(|| method.to_string())
        })
        .collect()
}

/// Returns the `(class, name)` of every member method `name` refers to
/// through `opcode`.
#[allow(dead_code)]
pub fn member_refs(class: &ClassFile, name: &str, op: u8) -> Vec<(String, String)> {
    instructions_of(class, name)
        .iter()
        .filter(|i| i.opcode == op)
        .map(|i| {
            let (owner, member, _) = class
                .constant_pool
                .get_member_ref(i.pool_index.unwrap())
                .unwrap();
            (owner.to_string(), member.to_string())
        })
        .collect()
}

/// Checks every method: branch targets and exception rows point at
/// instruction starts, locals fit `max_locals` and pool operands exist.
#[allow(dead_code)]
pub fn assert_well_formed(class: &ClassFile) {
    for method in &class.methods {
        let name = class.constant_pool.get_utf8(method.name_index).unwrap();
        let code = method.code.as_ref().unwrap();
        assert!(!code.code.is_empty(), "{}: empty code", name);

        let instructions = decode(&code.code).unwrap();
        let starts: HashSet<usize> = instructions.iter().map(|i| i.pc).collect();
        for insn in &instructions {
            for target in &insn.targets {
                assert!(starts.contains(target), "{}: bad target {}", name, target);
            }
            if let Some(local) = insn.local {
                assert!(local < code.max_locals, "{}: local {} out of range", name, local);
            }
            if let Some(index) = insn.pool_index {
                assert!(
                    class.constant_pool.lookup(index).is_ok(),
                    "{}: bad constant {}",
                    name,
                    index
                );
            }
        }
        for row in &code.exception_table {
            assert!(row.start_pc < row.end_pc, "{}: empty handler range", name);
            assert!(starts.contains(&(row.start_pc as usize)), "{}: bad start", name);
            assert!(starts.contains(&(row.handler_pc as usize)), "{}: bad handler", name);
            assert!(
                starts.contains(&(row.end_pc as usize)) || row.end_pc as usize == code.code.len(),
                "{}: bad end",
                name
            );
        }
    }
}

/// Returns true if a `java` launcher is on the path.
#[allow(dead_code)]
pub fn java_available() -> bool {
    Command::new("java")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Compiles `program`, runs it with `input` on standard input and returns
/// what it printed. Returns `None` when no JVM is available.
#[allow(dead_code)]
pub fn run_with_input(program: &[StmtKind], input: &str) -> Option<String> {
    if !java_available() {
        return None;
    }
    let class = compile_program(program);
    let dir = tempfile::tempdir().unwrap();
    class.write_to_path(&dir.path().join("Main.class")).unwrap();

    let mut child = Command::new("java")
        .arg("-cp")
        .arg(dir.path())
        .arg("Main")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(
        output.status.success(),
        "java failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Some(String::from_utf8(output.stdout).unwrap().replace("\r\n", "\n"))
}

/// Compiles and runs `program` without input.
#[allow(dead_code)]
pub fn run(program: &[StmtKind]) -> Option<String> {
    run_with_input(program, "")
}
