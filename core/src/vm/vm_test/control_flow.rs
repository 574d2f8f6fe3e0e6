use super::*;

fn jump_table_with(selector: &str) -> Cell {
    let src = format!(
        r#"
        .globals 1
            PUSHN "{selector}"
            JUMPTBL case0 case1 case2
            PUSHPG 0
            PUSHS "default"
            STORES
            JUMP done
        case0:
            PUSHPG 0
            PUSHS "zero"
            STORES
            JUMP done
        case1:
            PUSHPG 0
            PUSHS "one"
            STORES
            JUMP done
        case2:
            PUSHPG 0
            PUSHS "two"
            STORES
        done:
        "#
    );
    global(&run(&src), 0)
}

#[test]
fn test_jump_table_selects_slot() {
    assert_eq!(jump_table_with("0"), Cell::from("zero"));
    assert_eq!(jump_table_with("1"), Cell::from("one"));
    assert_eq!(jump_table_with("2"), Cell::from("two"));
}

#[test]
fn test_jump_table_falls_through_when_out_of_range() {
    assert_eq!(jump_table_with("3"), Cell::from("default"));
    assert_eq!(jump_table_with("1.5"), Cell::from("default"));
    assert_eq!(jump_table_with("-1"), Cell::from("default"));
}

#[test]
fn test_loop_with_conditional_branch() {
    // i = 0; s = 0; while i < 5 { s = s + i; i = i + 1 }
    let vm = run(
        "
        .globals 2
        top:
            PUSHPG 0
            LOADN
            PUSHI 5
            LTN
            JF done
            PUSHPG 1
            PUSHPG 1
            LOADN
            PUSHPG 0
            LOADN
            ADDN
            STOREN
            PUSHPG 0
            PUSHPG 0
            LOADN
            PUSHI 1
            ADDN
            STOREN
            JUMP top
        done:
        ",
    );
    assert_eq!(global(&vm, 1), Cell::from(num("10")));
}

#[test]
fn test_jt_and_boolean_ops() {
    let vm = run(
        "
        .globals 1
            PUSHB 1
            PUSHB 0
            ANDB
            NOTB
            PUSHB 0
            ORB
            JT yes
            JUMP done
        yes:
            PUSHPG 0
            PUSHB 1
            STOREB
        done:
        ",
    );
    assert_eq!(global(&vm, 0), Cell::from(true));
}
