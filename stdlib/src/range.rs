//! Index arithmetic shared by the slice, range and splice builtins.

use std::ops::Range;

use anyhow::Result;
use neonx_core::{val::Number, vm::Vm};

use crate::raise;

/// One end of a `[first TO last]` range as compiled: a number plus a flag
/// saying it counts from the end (`LAST` relative).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bound {
    pub value: i64,
    pub from_end: bool,
}

impl Bound {
    /// Integral values only; others raise `exception` with the value as info.
    pub fn new(n: &Number, from_end: bool, exception: &str) -> Result<Self> {
        if !n.is_integer() {
            return raise(exception, n.to_string());
        }
        // Out-of-range integers clamp to the same place as any huge value.
        let value = n
            .to_i64()
            .unwrap_or(if n.is_negative() { i64::MIN / 4 } else { i64::MAX / 4 })
            .clamp(i64::MIN / 4, i64::MAX / 4);
        Ok(Self { value, from_end })
    }

    fn resolve(self, len: usize) -> i64 {
        if self.from_end { self.value + len as i64 - 1 } else { self.value }
    }
}

/// Pops `first, first_from_end, last, last_from_end` (pushed in that order).
pub(crate) fn pop_bounds(vm: &mut Vm, exception: &str) -> Result<(Bound, Bound)> {
    let last_from_end = vm.pop_boolean()?;
    let last = vm.pop_number()?;
    let first_from_end = vm.pop_boolean()?;
    let first = vm.pop_number()?;
    Ok((
        Bound::new(&first, first_from_end, exception)?,
        Bound::new(&last, last_from_end, exception)?,
    ))
}

/// Inclusive `[first, last]` clamped to a sequence of `len`; empty when the
/// bounds cross.
pub(crate) fn clamp_range(len: usize, first: Bound, last: Bound) -> Range<usize> {
    let n = len as i64;
    let first = first.resolve(len).clamp(0, n);
    let last = last.resolve(len).clamp(-1, n - 1);
    if last < first {
        return first as usize..first as usize;
    }
    first as usize..(last + 1) as usize
}

/// `head ++ replacement ++ tail` where the replaced span is `[first, last]`.
/// A crossed range inserts at `first` without removing anything.
pub(crate) fn splice<T: Clone>(items: &[T], replacement: &[T], first: Bound, last: Bound) -> Vec<T> {
    let span = clamp_range(items.len(), first, last);
    let mut out = Vec::with_capacity(items.len() + replacement.len());
    out.extend_from_slice(&items[..span.start]);
    out.extend_from_slice(replacement);
    out.extend_from_slice(&items[span.end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(value: i64) -> Bound {
        Bound { value, from_end: false }
    }

    fn from_end(value: i64) -> Bound {
        Bound { value, from_end: true }
    }

    #[test]
    fn clamps_to_sequence() {
        assert_eq!(clamp_range(5, at(1), at(3)), 1..4);
        assert_eq!(clamp_range(5, at(-3), at(10)), 0..5);
        assert_eq!(clamp_range(5, at(4), at(2)), 4..4);
        assert_eq!(clamp_range(0, at(0), at(0)), 0..0);
    }

    #[test]
    fn counts_from_end() {
        // a[1 TO LAST] and a[LAST-1 TO LAST] on five elements
        assert_eq!(clamp_range(5, at(1), from_end(0)), 1..5);
        assert_eq!(clamp_range(5, from_end(-1), from_end(0)), 3..5);
    }

    #[test]
    fn splice_replaces_and_inserts() {
        let items = [1, 2, 3, 4];
        assert_eq!(splice(&items, &[9], at(1), at(2)), vec![1, 9, 4]);
        assert_eq!(splice(&items, &[9], at(2), at(1)), vec![1, 2, 9, 3, 4]);
        assert_eq!(splice(&items, &[], at(0), from_end(0)), Vec::<i32>::new());
    }

    #[test]
    fn rejects_fractional_bounds() {
        let half: Number = "0.5".parse().unwrap();
        let err = Bound::new(&half, false, "Test").unwrap_err();
        let e = err.downcast_ref::<neonx_core::vm::NeonException>().unwrap();
        assert_eq!(e.info, "0.5");
    }
}
