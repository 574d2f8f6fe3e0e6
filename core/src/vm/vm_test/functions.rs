use super::*;

#[test]
fn test_call_and_return_with_locals() {
    // square(x) stores x * x into global 0
    let vm = run(
        "
        .globals 1
        .function square 1 1 1 square_entry
            PUSHI 12
            CALLF square
            JUMP done
        square_entry:
            PUSHPL 0
            SWAP
            STOREN
            PUSHPG 0
            PUSHPL 0
            LOADN
            PUSHPL 0
            LOADN
            MULN
            STOREN
            RET
        done:
        ",
    );
    assert_eq!(global(&vm, 0), Cell::from(num("144")));
    assert_eq!(vm.call_depth(), 0);
}

#[test]
fn test_lexical_chain_two_hops() {
    // a (depth 1) owns local 0; c (depth 3) recurses through itself before
    // reading a's local two lexical hops up.
    let vm = run(
        "
        .globals 2
        .function a 1 0 1 a_entry
        .function b 2 0 0 b_entry
        .function c 3 0 0 c_entry
            PUSHPG 1
            PUSHI 3
            STOREN
            CALLF a
            JUMP done
        a_entry:
            PUSHPL 0
            PUSHI 42
            STOREN
            CALLF b
            RET
        b_entry:
            CALLF c
            RET
        c_entry:
            PUSHPG 1
            PUSHPG 1
            LOADN
            PUSHI 1
            SUBN
            STOREN
            PUSHPG 1
            LOADN
            PUSHI 0
            GTN
            JF read
            CALLF c
            RET
        read:
            PUSHPG 0
            PUSHPOL 2 0
            LOADN
            STOREN
            RET
        done:
        ",
    );
    assert_eq!(global(&vm, 0), Cell::from(num("42")));
}

#[test]
fn test_virtual_call_dispatch() {
    let vm = run(
        r#"
        .globals 2
        .function area 1 0 0 area_entry
        .function perimeter 1 0 0 perimeter_entry
        .class Shape area perimeter
            PUSHPG 0
            PUSHCI "Shape"
            PUSHI 7
            CONSA 2
            STOREA
            PUSHPG 0
            PUSHI 0
            CONSA 2
            CALLV 1
            JUMP done
        area_entry:
            PUSHPG 1
            PUSHS "area"
            STORES
            RET
        perimeter_entry:
            PUSHPG 1
            PUSHS "perimeter"
            STORES
            RET
        done:
        "#,
    );
    assert_eq!(global(&vm, 1), Cell::from("perimeter"));
}

#[test]
fn test_function_pointer_call() {
    let vm = run(
        r#"
        .globals 1
        .function main 1 0 0 unused
        .function target 1 0 0 target_entry
            PUSHFP target
            CALLI
            JUMP done
        unused:
            RET
        target_entry:
            PUSHPG 0
            PUSHS "called"
            STORES
            RET
        done:
        "#,
    );
    assert_eq!(global(&vm, 0), Cell::from("called"));
}

#[test]
fn test_null_function_pointer_raises() {
    // A `nowhere` function value is built as `[0, nil]`.
    let vm = run(
        r#"
        .globals 1
        .handler start end "InvalidFunctionException" caught
        start:
            PUSHN "0"
            PUSHNIL
            CONSA 2
            CALLI
        end:
            JUMP done
        caught:
            PUSHPG 0
            SWAP
            STOREA
        done:
        "#,
    );
    assert_eq!(global_array(&vm, 0)[0], Cell::from("InvalidFunctionException"));
    assert_eq!(vm.call_depth(), 0);
}

#[test]
fn test_function_index_zero_raises() {
    let result = outcome(
        r#"
        .function main 1 0 0 unused
            PUSHFP main
            CALLI
            JUMP done
        unused:
            RET
        done:
        "#,
    )
    .unwrap();
    assert_eq!(result, RunOutcome::Unhandled(NeonException::new("InvalidFunctionException", "")));
}

#[test]
fn test_malformed_function_pointer_is_fatal() {
    let err = outcome(
        r#"
            PUSHN "1"
            CONSA 1
            CALLI
        "#,
    )
    .unwrap_err();
    assert!(format!("{:#}", err).contains("function pointer must have 2 elements"));
}

#[test]
fn test_recursion_limit_raises_stack_overflow() {
    let mut vm = vm_for(
        r#"
        .globals 1
        .function forever 1 0 0 forever_entry
        .handler start end "StackOverflowException" caught
        start:
            CALLF forever
            JUMP done
        end:
        caught:
            PUSHPG 0
            SWAP
            STOREA
            JUMP done
        forever_entry:
            CALLF forever
            RET
        done:
        "#,
        VmOptions {
            recursion_limit: 50,
            stats: true,
            ..VmOptions::default()
        },
    );
    assert_eq!(vm.run().unwrap(), RunOutcome::Completed);
    assert_eq!(global_array(&vm, 0)[0], Cell::from("StackOverflowException"));
    assert_eq!(vm.call_depth(), 0);
    assert_eq!(vm.stats().max_call_depth, 50);
}

#[test]
fn test_nesting_violation_is_fatal() {
    let err = outcome(
        "
        .function deep 3 0 0 deep_entry
            CALLF deep
            JUMP done
        deep_entry:
            RET
        done:
        ",
    )
    .unwrap_err();
    assert!(format!("{:#}", err).contains("internal nesting error"));
}
