use anyhow::{Result, anyhow, bail};

use crate::val::Number;
use crate::vm::vm::Vm;
use crate::vm::{ARRAY_INDEX_EXCEPTION, NeonException, read_vint};

impl Vm {
    /// Reads the next vint operand and advances past it.
    #[inline]
    pub(super) fn read_operand(&mut self) -> Result<usize> {
        let mut cursor = self.ip;
        let value = read_vint(&self.module.code, &mut cursor)?;
        self.ip = cursor;
        Ok(value)
    }

    pub(super) fn read_byte_operand(&mut self) -> Result<u8> {
        let Some(&byte) = self.module.code.get(self.ip) else {
            bail!("unexpected end of code while reading a byte operand");
        };
        self.ip += 1;
        Ok(byte)
    }

    /// Reads a string-table index operand and resolves it to text.
    pub(super) fn read_string_operand(&mut self) -> Result<String> {
        let index = self.read_operand()?;
        self.module
            .string(index)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("string index {} out of range", index))
    }
}

/// Validates an array index: integral and non-negative.
pub(super) fn array_index(n: &Number) -> Result<usize> {
    n.to_index()
        .ok_or_else(|| NeonException::new(ARRAY_INDEX_EXCEPTION, n.to_string()).into())
}

pub(super) fn array_index_error(n: &Number) -> anyhow::Error {
    NeonException::new(ARRAY_INDEX_EXCEPTION, n.to_string()).into()
}
