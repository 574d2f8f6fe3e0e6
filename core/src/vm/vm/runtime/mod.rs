use anyhow::{Result, anyhow, bail};

use crate::val::make_string;
use crate::vm::vm::{RunOutcome, Vm};
use crate::vm::{NeonException, Opcode, disassemble_instruction};

mod access;
mod helpers;
mod invoke;
mod math;

impl Vm {
    /// Executes from the start of the code segment until the instruction
    /// pointer leaves it, `sys$exit` is called or an exception escapes.
    ///
    /// Host-fatal conditions come back as `Err`.
    pub fn run(&mut self) -> Result<RunOutcome> {
        self.ip = 0;
        while self.ip < self.module.code.len() {
            let start_ip = self.ip;
            if self.context.options.trace {
                let (text, _) = disassemble_instruction(&self.module, start_ip);
                tracing::debug!(
                    target: "neonx::vm::trace",
                    ip = start_ip,
                    stack = self.stack.len(),
                    depth = self.callstack.len(),
                    "{}",
                    text
                );
            }

            if let Err(err) = self.step(start_ip) {
                match err.downcast::<NeonException>() {
                    Ok(exception) => {
                        let payload = make_string(exception.info);
                        self.raise(&exception.name, payload, start_ip);
                    }
                    Err(err) => return Err(err.context(format!("execution failed at ip {}", start_ip))),
                }
            }

            if self.context.options.stats {
                self.stats.instructions += 1;
                self.record_depths();
            }
            if let Some(outcome) = self.halted.take() {
                return Ok(outcome);
            }
        }
        Ok(RunOutcome::Completed)
    }

    fn step(&mut self, start_ip: usize) -> Result<()> {
        let byte = self.module.code[start_ip];
        let op = Opcode::from_byte(byte).ok_or_else(|| anyhow!("unknown opcode {} at ip {}", byte, start_ip))?;
        self.ip += 1;
        match op {
            Opcode::PUSHB => self.op_pushb(),
            Opcode::PUSHN => self.op_pushn(),
            Opcode::PUSHS => self.op_pushs(),
            Opcode::PUSHY => self.op_pushy(),
            Opcode::PUSHI => self.op_pushi(),
            Opcode::PUSHPG => self.op_pushpg(),
            Opcode::PUSHPPG => self.op_pushppg(),
            Opcode::PUSHPL => self.op_pushpl(),
            Opcode::PUSHPOL => self.op_pushpol(),
            Opcode::PUSHNIL => {
                self.push(crate::val::Cell::Address(None));
                Ok(())
            }
            Opcode::ALLOC => self.op_alloc(),
            Opcode::LOADB
            | Opcode::LOADN
            | Opcode::LOADS
            | Opcode::LOADY
            | Opcode::LOADA
            | Opcode::LOADD
            | Opcode::LOADP
            | Opcode::LOADJ
            | Opcode::LOADV => self.op_load(op),
            Opcode::STOREB
            | Opcode::STOREN
            | Opcode::STORES
            | Opcode::STOREY
            | Opcode::STOREA
            | Opcode::STORED
            | Opcode::STOREP
            | Opcode::STOREJ
            | Opcode::STOREV => self.op_store(op),
            Opcode::RESETC => self.op_resetc(),
            Opcode::NEGN
            | Opcode::ADDN
            | Opcode::SUBN
            | Opcode::MULN
            | Opcode::DIVN
            | Opcode::MODN
            | Opcode::EXPN => self.op_arith(op),
            Opcode::EQB | Opcode::NEB => self.op_compare_boolean(op),
            Opcode::EQN | Opcode::NEN | Opcode::LTN | Opcode::GTN | Opcode::LEN | Opcode::GEN => {
                self.op_compare_number(op)
            }
            Opcode::EQS | Opcode::NES | Opcode::LTS | Opcode::GTS | Opcode::LES | Opcode::GES => {
                self.op_compare_string(op)
            }
            Opcode::EQY | Opcode::NEY | Opcode::LTY | Opcode::GTY | Opcode::LEY | Opcode::GEY => {
                self.op_compare_bytes(op)
            }
            Opcode::EQA
            | Opcode::NEA
            | Opcode::EQD
            | Opcode::NED
            | Opcode::EQP
            | Opcode::NEP
            | Opcode::EQV
            | Opcode::NEV => self.op_compare_structural(op),
            Opcode::ANDB | Opcode::ORB | Opcode::NOTB => self.op_boolean(op),
            Opcode::INDEXAR => self.op_indexar(),
            Opcode::INDEXAW => self.op_indexaw(),
            Opcode::INDEXAV => self.op_indexav(),
            Opcode::INDEXAN => self.op_indexan(),
            Opcode::INDEXDR => self.op_indexdr(),
            Opcode::INDEXDW => self.op_indexdw(),
            Opcode::INDEXDV => self.op_indexdv(),
            Opcode::INA => self.op_ina(),
            Opcode::IND => self.op_ind(),
            Opcode::CALLP => self.op_callp(),
            Opcode::CALLF => self.op_callf(),
            Opcode::CALLI => self.op_calli(),
            Opcode::CALLV => self.op_callv(),
            Opcode::PUSHFP => self.op_pushfp(),
            Opcode::PUSHCI => self.op_pushci(),
            Opcode::RET => self.op_ret(),
            Opcode::JUMP => {
                self.ip = self.read_operand()?;
                Ok(())
            }
            Opcode::JF | Opcode::JT => self.op_branch(op == Opcode::JT),
            Opcode::JUMPTBL => self.op_jumptbl(),
            Opcode::DUP => {
                let top = self.peek()?.clone();
                self.push(top);
                Ok(())
            }
            Opcode::DUPX1 => {
                let a = self.pop()?;
                let b = self.pop()?;
                self.push(a.clone());
                self.push(b);
                self.push(a);
                Ok(())
            }
            Opcode::DROP => self.pop().map(|_| ()),
            Opcode::SWAP => self.op_swap(),
            Opcode::DROPN => self.op_dropn(),
            Opcode::CONSA => self.op_consa(),
            Opcode::CONSD => self.op_consd(),
            Opcode::EXCEPT => self.op_except(start_ip),
            Opcode::PUSHPMG | Opcode::PUSHPEG | Opcode::CALLMF | Opcode::CALLX => {
                bail!("unsupported opcode {} at ip {}: cross-module linking is not implemented", op, start_ip)
            }
        }
    }
}
