use super::*;

fn divide_by_zero_caught_by(handler: &str) -> Vec<Cell> {
    let src = format!(
        r#"
        .globals 1
        .handler start end "{handler}" caught
        start:
            PUSHI 1
            PUSHI 0
            DIVN
        end:
            JUMP done
        caught:
            PUSHPG 0
            SWAP
            STOREA
        done:
        "#
    );
    global_array(&run(&src), 0)
}

#[test]
fn test_divide_by_zero_caught_by_prefix() {
    let exception = divide_by_zero_caught_by("NumberException");
    assert_eq!(exception[0], Cell::from("NumberException.DivideByZero"));
    // PUSHI 1 and PUSHI 0 take two bytes each; DIVN sits at 4.
    assert_eq!(exception[2], Cell::from(num("4")));
}

#[test]
fn test_divide_by_zero_caught_by_exact_name() {
    let exception = divide_by_zero_caught_by("NumberException.DivideByZero");
    assert_eq!(exception[0], Cell::from("NumberException.DivideByZero"));
}

#[test]
fn test_modulo_by_zero_raises() {
    let result = outcome(
        "
            PUSHI 1
            PUSHI 0
            MODN
        ",
    )
    .unwrap();
    let RunOutcome::Unhandled(exception) = result else {
        panic!("expected an unhandled exception");
    };
    assert_eq!(exception.name, "NumberException.DivideByZero");
}

#[test]
fn test_handler_names_match_on_dot_boundaries() {
    // Foobar and Foo.Baz do not catch Foo.Bar; Foo does.
    let vm = run(
        r#"
        .globals 2
        .handler start end "Foobar" wrong1
        .handler start end "Foo.Baz" wrong2
        .handler start end "Foo" right
        start:
            PUSHS "detail"
            CALLP "test$object"
            EXCEPT "Foo.Bar"
        end:
            JUMP done
        wrong1:
            PUSHPG 0
            PUSHS "Foobar"
            STORES
            JUMP done
        wrong2:
            PUSHPG 0
            PUSHS "Foo.Baz"
            STORES
            JUMP done
        right:
            PUSHPG 1
            SWAP
            STOREA
            PUSHPG 0
            PUSHS "Foo"
            STORES
        done:
        "#,
    );
    assert_eq!(global(&vm, 0), Cell::from("Foo"));
    let exception = global_array(&vm, 1);
    assert_eq!(exception[0], Cell::from("Foo.Bar"));
    let payload = exception[1].clone().into_object().unwrap().unwrap();
    assert_eq!(payload.to_string(), "detail");
}

#[test]
fn test_unwind_restores_call_depth() {
    // outer -> middle -> inner; only outer has a handler.
    let vm = run(
        r#"
        .globals 1
        .function outer 1 0 0 outer_entry
        .function middle 1 0 0 middle_entry
        .function inner 1 0 0 inner_entry
        .handler try_start try_end "NumberException.DivideByZero" caught
            CALLF outer
            JUMP done
        outer_entry:
        try_start:
            CALLF middle
            JUMP after_try
        try_end:
        caught:
            DROP
            PUSHPG 0
            CALLP "test$depth"
            STOREN
        after_try:
            RET
        middle_entry:
            CALLF inner
            RET
        inner_entry:
            PUSHI 1
            PUSHI 0
            DIVN
            RET
        done:
        "#,
    );
    assert_eq!(global(&vm, 0), Cell::from(num("1")));
    assert_eq!(vm.call_depth(), 0);
}

#[test]
fn test_unhandled_panic() {
    let result = outcome(
        r#"
            PUSHS "boom"
            CALLP "test$object"
            EXCEPT "PANIC"
        "#,
    )
    .unwrap();
    assert_eq!(result, RunOutcome::Unhandled(NeonException::new("PANIC", "boom")));
}

#[test]
fn test_unhandled_null_payload() {
    let result = outcome(
        r#"
        .globals 1
            PUSHPG 0
            LOADJ
            EXCEPT "Custom"
        "#,
    )
    .unwrap();
    assert_eq!(result, RunOutcome::Unhandled(NeonException::new("Custom", "null")));
}

#[test]
fn test_builtin_exception_raised_at_callp() {
    let vm = run(
        r#"
        .globals 1
        .handler start end "Test" caught
        start:
            PUSHS "bad input"
            CALLP "test$fail"
        end:
            JUMP done
        caught:
            PUSHPG 0
            SWAP
            STOREA
        done:
        "#,
    );
    let exception = global_array(&vm, 0);
    assert_eq!(exception[0], Cell::from("Test.Failure"));
    assert_eq!(exception[1].clone().into_object().unwrap().unwrap().to_string(), "bad input");
    // PUSHS with a one-byte operand occupies offsets 0 and 1.
    assert_eq!(exception[2], Cell::from(num("2")));
}

#[test]
fn test_index_exceptions() {
    let vm = run(
        r#"
        .globals 3
        .handler s1 e1 "ArrayIndexException" c1
        .handler s2 e2 "DictionaryIndexException" c2
        s1:
            PUSHI 1
            CONSA 1
            PUSHN "0.5"
            INDEXAV
        e1:
            JUMP next
        c1:
            PUSHPG 0
            SWAP
            STOREA
        next:
        s2:
            PUSHPG 2
            PUSHS "missing"
            INDEXDR
        e2:
            JUMP done
        c2:
            PUSHPG 1
            SWAP
            STOREA
        done:
        "#,
    );
    let array_error = global_array(&vm, 0);
    assert_eq!(array_error[0], Cell::from("ArrayIndexException"));
    assert_eq!(array_error[1].clone().into_object().unwrap().unwrap().to_string(), "0.5");
    let dict_error = global_array(&vm, 1);
    assert_eq!(dict_error[0], Cell::from("DictionaryIndexException"));
    assert_eq!(dict_error[1].clone().into_object().unwrap().unwrap().to_string(), "missing");
}

#[test]
fn test_non_finite_power_is_invalid() {
    let result = outcome(
        r#"
            PUSHI 8
            NEGN
            PUSHN "0.5"
            EXPN
        "#,
    )
    .unwrap();
    let RunOutcome::Unhandled(exception) = result else {
        panic!("expected an unhandled exception");
    };
    assert_eq!(exception.name, "NumberException.Invalid");
}

#[test]
fn test_huge_integer_power_is_catchable() {
    let vm = run(
        r#"
        .globals 1
        .handler start end "NumberException" caught
        start:
            PUSHI 3
            PUSHN "1e18"
            EXPN
            DROP
        end:
            JUMP done
        caught:
            PUSHPG 0
            SWAP
            STOREA
        done:
        "#,
    );
    assert_eq!(global_array(&vm, 0)[0], Cell::from("NumberException.Invalid"));
}

#[test]
fn test_product_beyond_exponent_range_raises() {
    let result = outcome(
        r#"
            PUSHN "1e6000"
            PUSHN "1e6000"
            MULN
        "#,
    )
    .unwrap();
    let RunOutcome::Unhandled(exception) = result else {
        panic!("expected an unhandled exception");
    };
    assert_eq!(exception.name, "NumberException.Invalid");
}

#[test]
fn test_out_of_range_literal_is_fatal() {
    let err = outcome(
        r#"
            PUSHN "1.5e-9223372036854775808"
        "#,
    )
    .unwrap_err();
    assert!(format!("{:#}", err).contains("out of range"));
}
