use std::cmp::Ordering;

use anyhow::{Result, bail};

use crate::val::{Number, NumberError};
use crate::vm::vm::Vm;
use crate::vm::{DIVIDE_BY_ZERO_EXCEPTION, JUMP_TABLE_SLOT, NUMBER_INVALID_EXCEPTION, NeonException, Opcode};

fn arithmetic_error(err: NumberError, op: Opcode, a: &Number, b: &Number) -> anyhow::Error {
    match err {
        NumberError::DivideByZero => NeonException::new(DIVIDE_BY_ZERO_EXCEPTION, ""),
        NumberError::OutOfRange => NeonException::new(NUMBER_INVALID_EXCEPTION, format!("{} {} {}", a, symbol(op), b)),
    }
    .into()
}

fn symbol(op: Opcode) -> &'static str {
    match op {
        Opcode::ADDN => "+",
        Opcode::SUBN => "-",
        Opcode::MULN => "*",
        Opcode::DIVN => "/",
        Opcode::MODN => "MOD",
        _ => "^",
    }
}

/// Maps an ordering comparison opcode onto the result of `cmp`.
#[inline]
fn ordered(op: Opcode, ord: Ordering) -> bool {
    match op {
        Opcode::EQN | Opcode::EQS | Opcode::EQY => ord == Ordering::Equal,
        Opcode::NEN | Opcode::NES | Opcode::NEY => ord != Ordering::Equal,
        Opcode::LTN | Opcode::LTS | Opcode::LTY => ord == Ordering::Less,
        Opcode::GTN | Opcode::GTS | Opcode::GTY => ord == Ordering::Greater,
        Opcode::LEN | Opcode::LES | Opcode::LEY => ord != Ordering::Greater,
        _ => ord != Ordering::Less,
    }
}

impl Vm {
    pub(super) fn op_arith(&mut self, op: Opcode) -> Result<()> {
        if op == Opcode::NEGN {
            let x = self.pop_number()?;
            self.push(x.neg());
            return Ok(());
        }
        let b = self.pop_number()?;
        let a = self.pop_number()?;
        let r = match op {
            Opcode::ADDN => a.add(&b),
            Opcode::SUBN => a.sub(&b),
            Opcode::MULN => a.mul(&b),
            Opcode::DIVN => a.div(&b),
            Opcode::MODN => a.rem(&b),
            Opcode::EXPN => a.pow(&b),
            _ => bail!("{} is not an arithmetic opcode", op),
        }
        .map_err(|err| arithmetic_error(err, op, &a, &b))?;
        self.push(r);
        Ok(())
    }

    pub(super) fn op_compare_boolean(&mut self, op: Opcode) -> Result<()> {
        let b = self.pop_boolean()?;
        let a = self.pop_boolean()?;
        self.push(if op == Opcode::EQB { a == b } else { a != b });
        Ok(())
    }

    pub(super) fn op_compare_number(&mut self, op: Opcode) -> Result<()> {
        let b = self.pop_number()?;
        let a = self.pop_number()?;
        self.push(ordered(op, a.cmp(&b)));
        Ok(())
    }

    pub(super) fn op_compare_string(&mut self, op: Opcode) -> Result<()> {
        let b = self.pop_string()?;
        let a = self.pop_string()?;
        self.push(ordered(op, a.cmp(&b)));
        Ok(())
    }

    pub(super) fn op_compare_bytes(&mut self, op: Opcode) -> Result<()> {
        let b = self.pop_bytes()?;
        let a = self.pop_bytes()?;
        self.push(ordered(op, a.cmp(&b)));
        Ok(())
    }

    /// Arrays and dictionaries compare structurally, pointers by identity.
    pub(super) fn op_compare_structural(&mut self, op: Opcode) -> Result<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let equal = a == b;
        let want_equal = matches!(op, Opcode::EQA | Opcode::EQD | Opcode::EQP | Opcode::EQV);
        self.push(equal == want_equal);
        Ok(())
    }

    pub(super) fn op_boolean(&mut self, op: Opcode) -> Result<()> {
        if op == Opcode::NOTB {
            let x = self.pop_boolean()?;
            self.push(!x);
            return Ok(());
        }
        let b = self.pop_boolean()?;
        let a = self.pop_boolean()?;
        self.push(if op == Opcode::ANDB { a && b } else { a || b });
        Ok(())
    }

    pub(super) fn op_branch(&mut self, when: bool) -> Result<()> {
        let target = self.read_operand()?;
        if self.pop_boolean()? == when {
            self.ip = target;
        }
        Ok(())
    }

    /// Skips `selector` fixed-width slots, or all `count` when out of range.
    pub(super) fn op_jumptbl(&mut self) -> Result<()> {
        let count = self.read_operand()?;
        let n = self.pop_number()?;
        let slot = match n.to_index() {
            Some(i) if i < count => i,
            _ => count,
        };
        self.ip += JUMP_TABLE_SLOT * slot;
        Ok(())
    }
}
