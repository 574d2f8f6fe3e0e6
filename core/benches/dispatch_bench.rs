use criterion::{Criterion, criterion_group, criterion_main};
use neonx_core::vm::{Module, RunOutcome, Vm, VmContext, assemble};
use neonx_core::BuiltinRegistry;
use std::hint::black_box;

// i = 0; s = 0; while i < 10000 { s = s + i; i = i + 1 }
const COUNTING_LOOP: &str = "
.globals 2
top:
    PUSHPG 0
    LOADN
    PUSHI 10000
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
";

// countdown(n) recurses until the global counter reaches zero
const RECURSIVE_CALLS: &str = "
.globals 1
.function countdown 1 0 0 countdown_entry
    PUSHPG 0
    PUSHI 500
    STOREN
    CALLF countdown
    JUMP done
countdown_entry:
    PUSHPG 0
    PUSHPG 0
    LOADN
    PUSHI 1
    SUBN
    STOREN
    PUSHPG 0
    LOADN
    PUSHI 0
    GTN
    JF back
    CALLF countdown
back:
    RET
done:
";

fn run_once(module: &Module) -> RunOutcome {
    let mut vm = Vm::new(module.clone(), BuiltinRegistry::new(), VmContext::new());
    vm.run().unwrap()
}

fn dispatch_bench(c: &mut Criterion) {
    let counting = assemble(COUNTING_LOOP).unwrap();
    let recursive = assemble(RECURSIVE_CALLS).unwrap();

    c.bench_function("vm_counting_loop_10k", |b| {
        b.iter(|| black_box(run_once(&counting)))
    });

    c.bench_function("vm_recursive_calls_500", |b| {
        b.iter(|| black_box(run_once(&recursive)))
    });
}

criterion_group!(benches, dispatch_bench);
criterion_main!(benches);
