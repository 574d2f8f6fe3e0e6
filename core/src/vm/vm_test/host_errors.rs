use super::*;

use crate::vm::{Module, Opcode};

fn fatal(src: &str) -> String {
    format!("{:#}", outcome(src).unwrap_err())
}

#[test]
fn test_unknown_opcode_is_fatal() {
    let module = Module {
        code: vec![Opcode::PUSHI as u8, 1, 200],
        ..Module::default()
    };
    let mut vm = Vm::new(module, test_registry(), VmContext::new());
    let err = vm.run().unwrap_err();
    assert!(format!("{:#}", err).contains("unknown opcode 200 at ip 2"));
}

#[test]
fn test_unknown_builtin_is_fatal() {
    assert!(fatal(r#"CALLP "no$such""#).contains("unknown builtin function no$such"));
}

#[test]
fn test_unknown_predefined_global_is_fatal() {
    assert!(fatal(r#"PUSHPPG "sys$nope""#).contains("unknown predefined global sys$nope"));
}

#[test]
fn test_cross_module_opcodes_are_unsupported() {
    assert!(fatal("PUSHPMG 0 0").contains("unsupported opcode PUSHPMG at ip 0"));
    assert!(fatal("PUSHI 1\nCALLX 0 0 0").contains("unsupported opcode CALLX at ip 2"));
    assert!(fatal("PUSHPEG 0").contains("unsupported opcode PUSHPEG at ip 0"));
    assert!(fatal(r#"PUSHCI "other.Shape""#).contains("lives in another module"));
    assert!(fatal(r#"PUSHCI "Missing""#).contains("unknown class name Missing"));
}

#[test]
fn test_type_mismatch_is_fatal() {
    let msg = fatal(
        r#"
        .globals 1
            PUSHPG 0
            PUSHI 1
            STOREN
            PUSHPG 0
            PUSHS "x"
            STORES
        "#,
    );
    assert!(msg.contains("cell type mismatch: expected string, found number"));
}

#[test]
fn test_null_address_is_fatal() {
    assert!(fatal("PUSHNIL\nLOADN").contains("null address dereferenced"));
}

#[test]
fn test_stack_underflow_is_fatal() {
    assert!(fatal("DROP").contains("operand stack underflow"));
}
