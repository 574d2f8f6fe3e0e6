use super::*;

#[test]
fn test_add_integers() {
    let vm = run(
        "
        .globals 1
            PUSHPG 0
            PUSHI 2
            PUSHI 3
            ADDN
            STOREN
        ",
    );
    assert_eq!(global(&vm, 0), Cell::from(num("5")));
    assert!(vm.stack().is_empty());
}

#[test]
fn test_decimal_arithmetic() {
    let vm = run(
        r#"
        .globals 5
            PUSHPG 0
            PUSHI 1
            PUSHI 3
            DIVN
            STOREN
            PUSHPG 1
            PUSHI 2
            PUSHI 3
            DIVN
            STOREN
            PUSHPG 2
            PUSHI 7
            NEGN
            PUSHI 2
            MODN
            STOREN
            PUSHPG 3
            PUSHI 2
            PUSHI 10
            EXPN
            STOREN
            PUSHPG 4
            PUSHN "0.1"
            PUSHN "0.2"
            ADDN
            STOREN
        "#,
    );
    assert_eq!(global(&vm, 0), Cell::from(num("0.3333333333333333333333333333333333")));
    assert_eq!(global(&vm, 1), Cell::from(num("0.6666666666666666666666666666666667")));
    assert_eq!(global(&vm, 2), Cell::from(num("-1")));
    assert_eq!(global(&vm, 3), Cell::from(num("1024")));
    assert_eq!(global(&vm, 4), Cell::from(num("0.3")));
}

#[test]
fn test_comparisons() {
    let vm = run(
        r#"
        .globals 1
            PUSHPG 0
            PUSHN "1.50"
            PUSHN "1.5"
            EQN
            PUSHS "abc"
            PUSHS "abd"
            LTS
            PUSHY x"01 02"
            PUSHY x"01"
            GTY
            PUSHB 1
            PUSHB 0
            NEB
            PUSHI 2
            PUSHI 2
            GEN
            CONSA 5
            STOREA
        "#,
    );
    assert_eq!(global_array(&vm, 0), vec![Cell::from(true); 5]);
}

#[test]
fn test_stack_shaping() {
    let vm = run(
        "
        .globals 3
            PUSHPG 0
            PUSHI 1
            PUSHI 2
            DUPX1
            CONSA 3
            STOREA
            PUSHPG 1
            PUSHI 1
            PUSHI 2
            SWAP
            CONSA 2
            STOREA
            PUSHPG 2
            PUSHI 1
            PUSHI 2
            PUSHI 3
            DROPN 2
            CONSA 2
            STOREA
        ",
    );
    let n = |s| Cell::from(num(s));
    assert_eq!(global_array(&vm, 0), vec![n("2"), n("1"), n("2")]);
    assert_eq!(global_array(&vm, 1), vec![n("2"), n("1")]);
    assert_eq!(global_array(&vm, 2), vec![n("2"), n("3")]);
}

#[test]
fn test_load_fixes_empty_tag() {
    let vm = run(
        "
        .globals 2
            PUSHPG 1
            PUSHPG 0
            LOADN
            STOREN
        ",
    );
    assert_eq!(global(&vm, 0), Cell::from(Number::zero()));
    assert_eq!(global(&vm, 1), Cell::from(Number::zero()));
}

#[test]
fn test_indexaw_extends_array() {
    let vm = run(
        r#"
        .globals 1
            PUSHPG 0
            PUSHI 5
            INDEXAW
            PUSHS "x"
            STORES
        "#,
    );
    let items = global_array(&vm, 0);
    assert_eq!(items.len(), 6);
    assert!(items[..5].iter().all(Cell::is_empty));
    assert_eq!(items[5], Cell::from("x"));
}

#[test]
fn test_array_value_indexing() {
    let vm = run(
        r#"
        .globals 2
            PUSHPG 0
            PUSHS "a"
            PUSHS "b"
            CONSA 2
            PUSHI 1
            INDEXAV
            STORES
            PUSHPG 1
            PUSHS "a"
            CONSA 1
            PUSHI 9
            INDEXAN
            STOREV
        "#,
    );
    assert_eq!(global(&vm, 0), Cell::from("b"));
    assert!(global(&vm, 1).is_empty());
}

#[test]
fn test_aliasing_through_copies() {
    // global1 = global0; global1[0] = 9; global0 observes the write.
    let vm = run(
        "
        .globals 2
            PUSHPG 0
            PUSHI 1
            CONSA 1
            STOREA
            PUSHPG 1
            PUSHPG 0
            LOADA
            STOREA
            PUSHPG 1
            PUSHI 0
            INDEXAR
            PUSHI 9
            STOREN
        ",
    );
    assert_eq!(global_array(&vm, 0), vec![Cell::from(num("9"))]);
}

#[test]
fn test_dictionary_operations() {
    let vm = run(
        r#"
        .globals 4
            PUSHPG 0
            PUSHS "b"
            PUSHI 2
            PUSHS "a"
            PUSHI 1
            CONSD 2
            STORED
            PUSHPG 1
            PUSHPG 0
            LOADD
            PUSHS "a"
            INDEXDV
            STOREN
            PUSHPG 0
            PUSHS "c"
            INDEXDW
            PUSHI 3
            STOREN
            PUSHPG 2
            PUSHS "c"
            PUSHPG 0
            LOADD
            IND
            STOREB
            PUSHPG 3
            PUSHI 2
            PUSHI 1
            PUSHI 2
            CONSA 2
            INA
            STOREB
        "#,
    );
    assert_eq!(global(&vm, 1), Cell::from(num("1")));
    assert_eq!(global(&vm, 2), Cell::from(true));
    assert_eq!(global(&vm, 3), Cell::from(true));
    let dict = global(&vm, 0).into_dictionary().unwrap();
    let keys: Vec<String> = dict.borrow().keys().cloned().collect();
    assert_eq!(keys, ["a", "b", "c"]);
}

#[test]
fn test_alloc_and_reset() {
    let vm = run(
        "
        .globals 2
            PUSHPG 0
            ALLOC 3
            STOREP
            PUSHPG 1
            PUSHI 4
            STOREN
            PUSHPG 1
            RESETC
        ",
    );
    let target = global(&vm, 0).into_address().unwrap().unwrap();
    let fields = target.borrow().clone().into_array().unwrap();
    assert_eq!(fields.borrow().len(), 3);
    assert!(global(&vm, 1).is_empty());
}

#[test]
fn test_pointer_equality_is_identity() {
    let vm = run(
        "
        .globals 3
            PUSHPG 2
            PUSHPG 0
            PUSHPG 0
            EQP
            PUSHPG 0
            PUSHPG 1
            EQP
            PUSHNIL
            PUSHNIL
            EQP
            CONSA 3
            STOREA
        ",
    );
    assert_eq!(
        global_array(&vm, 2),
        vec![Cell::from(true), Cell::from(false), Cell::from(true)]
    );
}

#[test]
fn test_predefined_globals_are_cached() {
    let module = assemble(
        r#"
        .globals 2
            PUSHPG 0
            PUSHPPG "sys$args"
            LOADA
            STOREA
            PUSHPG 1
            PUSHPPG "io$stdout"
            PUSHPPG "io$stdout"
            EQP
            STOREB
        "#,
    )
    .unwrap();
    let ctx = VmContext::new().with_args(vec!["one".into(), "two".into()]);
    let mut vm = Vm::new(module, test_registry(), ctx);
    assert_eq!(vm.run().unwrap(), RunOutcome::Completed);
    assert_eq!(global_array(&vm, 0), vec![Cell::from("one"), Cell::from("two")]);
    assert_eq!(global(&vm, 1), Cell::from(true));
}

#[test]
fn test_builtin_output_is_captured() {
    let module = assemble(
        r#"
            PUSHS "hello"
            CALLP "print"
        "#,
    )
    .unwrap();
    let out = CaptureBuffer::new();
    let ctx = VmContext::new().with_stdout(out.clone());
    let mut vm = Vm::new(module, test_registry(), ctx);
    vm.run().unwrap();
    assert_eq!(out.contents(), "hello\n");
}

#[test]
fn test_stats_track_depths() {
    let mut vm = vm_for(
        "
            PUSHI 1
            PUSHI 2
            PUSHI 3
            DROP
            DROP
            DROP
        ",
        VmOptions {
            stats: true,
            ..VmOptions::default()
        },
    );
    vm.run().unwrap();
    let stats = vm.stats();
    assert_eq!(stats.instructions, 6);
    assert_eq!(stats.max_stack_depth, 3);
    assert_eq!(stats.max_call_depth, 0);
}
