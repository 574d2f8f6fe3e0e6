use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use anyhow::{Result, bail};

use super::number::Number;
use super::object::ObjectRef;

/// Shared, mutable storage slot. Address cells point at one of these.
pub type CellRef = Rc<RefCell<Cell>>;
pub type ArrayRef = Rc<RefCell<Vec<CellRef>>>;
pub type DictionaryRef = Rc<RefCell<BTreeMap<String, CellRef>>>;

#[inline]
pub fn new_cell_ref(cell: Cell) -> CellRef {
    Rc::new(RefCell::new(cell))
}

/// Standard stream handle published through the predefined globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardStream {
    Stdin,
    Stdout,
    Stderr,
}

/// Host values the language only passes around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opaque {
    /// Index into the module's class table.
    ClassInfo(usize),
    /// Marker for the running module, first half of a function pointer.
    Module,
    Stream(StandardStream),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Address,
    Boolean,
    Number,
    String,
    Bytes,
    Object,
    Array,
    Dictionary,
    Opaque,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellKind::Address => "address",
            CellKind::Boolean => "boolean",
            CellKind::Number => "number",
            CellKind::String => "string",
            CellKind::Bytes => "bytes",
            CellKind::Object => "object",
            CellKind::Array => "array",
            CellKind::Dictionary => "dictionary",
            CellKind::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

/// Tagged runtime value.
///
/// A cell starts `Empty` and takes the tag of the first typed access. Cloning
/// is shallow: `Array` and `Dictionary` clones alias the same container.
#[derive(Debug, Clone, Default)]
pub enum Cell {
    #[default]
    Empty,
    Address(Option<CellRef>),
    Boolean(bool),
    Number(Number),
    String(String),
    Bytes(Vec<u8>),
    Object(Option<ObjectRef>),
    Array(ArrayRef),
    Dictionary(DictionaryRef),
    Opaque(Opaque),
}

impl Cell {
    pub fn kind(&self) -> Option<CellKind> {
        match self {
            Cell::Empty => None,
            Cell::Address(_) => Some(CellKind::Address),
            Cell::Boolean(_) => Some(CellKind::Boolean),
            Cell::Number(_) => Some(CellKind::Number),
            Cell::String(_) => Some(CellKind::String),
            Cell::Bytes(_) => Some(CellKind::Bytes),
            Cell::Object(_) => Some(CellKind::Object),
            Cell::Array(_) => Some(CellKind::Array),
            Cell::Dictionary(_) => Some(CellKind::Dictionary),
            Cell::Opaque(_) => Some(CellKind::Opaque),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Value an `Empty` cell takes when first accessed as `kind`.
    pub fn default_for(kind: CellKind) -> Result<Cell> {
        Ok(match kind {
            CellKind::Address => Cell::Address(None),
            CellKind::Boolean => Cell::Boolean(false),
            CellKind::Number => Cell::Number(Number::zero()),
            CellKind::String => Cell::String(String::new()),
            CellKind::Bytes => Cell::Bytes(Vec::new()),
            CellKind::Object => Cell::Object(None),
            CellKind::Array => Cell::new_array(Vec::new()),
            CellKind::Dictionary => Cell::new_dictionary(BTreeMap::new()),
            CellKind::Opaque => bail!("opaque cells have no default value"),
        })
    }

    /// Fixes the tag of an `Empty` cell, or checks the existing tag.
    pub fn ensure_kind(&mut self, kind: CellKind) -> Result<()> {
        match self.kind() {
            None => {
                *self = Cell::default_for(kind)?;
                Ok(())
            }
            Some(k) if k == kind => Ok(()),
            Some(k) => bail!("cell type mismatch: expected {}, found {}", kind, k),
        }
    }

    /// Owned counterpart of [`Cell::ensure_kind`].
    pub fn with_kind(mut self, kind: CellKind) -> Result<Cell> {
        self.ensure_kind(kind)?;
        Ok(self)
    }

    pub fn new_array(items: Vec<Cell>) -> Cell {
        Cell::Array(Rc::new(RefCell::new(items.into_iter().map(new_cell_ref).collect())))
    }

    pub fn new_dictionary(entries: BTreeMap<String, Cell>) -> Cell {
        let map = entries.into_iter().map(|(k, v)| (k, new_cell_ref(v))).collect();
        Cell::Dictionary(Rc::new(RefCell::new(map)))
    }

    pub fn address(target: CellRef) -> Cell {
        Cell::Address(Some(target))
    }

    pub fn into_boolean(self) -> Result<bool> {
        match self {
            Cell::Boolean(b) => Ok(b),
            Cell::Empty => Ok(false),
            other => mismatch(CellKind::Boolean, &other),
        }
    }

    pub fn into_number(self) -> Result<Number> {
        match self {
            Cell::Number(n) => Ok(n),
            Cell::Empty => Ok(Number::zero()),
            other => mismatch(CellKind::Number, &other),
        }
    }

    pub fn into_string(self) -> Result<String> {
        match self {
            Cell::String(s) => Ok(s),
            Cell::Empty => Ok(String::new()),
            other => mismatch(CellKind::String, &other),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Cell::Bytes(b) => Ok(b),
            Cell::Empty => Ok(Vec::new()),
            other => mismatch(CellKind::Bytes, &other),
        }
    }

    pub fn into_object(self) -> Result<Option<ObjectRef>> {
        match self {
            Cell::Object(o) => Ok(o),
            Cell::Empty => Ok(None),
            other => mismatch(CellKind::Object, &other),
        }
    }

    pub fn into_array(self) -> Result<ArrayRef> {
        match self {
            Cell::Array(a) => Ok(a),
            Cell::Empty => Ok(Rc::new(RefCell::new(Vec::new()))),
            other => mismatch(CellKind::Array, &other),
        }
    }

    pub fn into_dictionary(self) -> Result<DictionaryRef> {
        match self {
            Cell::Dictionary(d) => Ok(d),
            Cell::Empty => Ok(Rc::new(RefCell::new(BTreeMap::new()))),
            other => mismatch(CellKind::Dictionary, &other),
        }
    }

    /// Null addresses are `None`.
    pub fn into_address(self) -> Result<Option<CellRef>> {
        match self {
            Cell::Address(a) => Ok(a),
            Cell::Empty => Ok(None),
            other => mismatch(CellKind::Address, &other),
        }
    }

    pub fn into_opaque(self) -> Result<Opaque> {
        match self {
            Cell::Opaque(o) => Ok(o),
            other => mismatch(CellKind::Opaque, &other),
        }
    }

    /// Snapshot of the array elements as plain values.
    pub fn array_values(array: &ArrayRef) -> Vec<Cell> {
        array.borrow().iter().map(|c| c.borrow().clone()).collect()
    }
}

fn mismatch<T>(expected: CellKind, found: &Cell) -> Result<T> {
    match found.kind() {
        Some(k) => bail!("cell type mismatch: expected {}, found {}", expected, k),
        None => bail!("cell type mismatch: expected {}, found empty", expected),
    }
}

impl PartialEq for Cell {
    /// Scalars and containers compare structurally, addresses and objects by
    /// identity. `Empty` equals nothing, not even another `Empty`.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Address(a), Cell::Address(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                _ => false,
            },
            (Cell::Boolean(a), Cell::Boolean(b)) => a == b,
            (Cell::Number(a), Cell::Number(b)) => a == b,
            (Cell::String(a), Cell::String(b)) => a == b,
            (Cell::Bytes(a), Cell::Bytes(b)) => a == b,
            (Cell::Object(a), Cell::Object(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                _ => false,
            },
            (Cell::Array(a), Cell::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| *x.borrow() == *y.borrow())
            }
            (Cell::Dictionary(a), Cell::Dictionary(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && *va.borrow() == *vb.borrow())
            }
            (Cell::Opaque(a), Cell::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Cell {
    #[inline]
    fn from(b: bool) -> Self {
        Cell::Boolean(b)
    }
}

impl From<Number> for Cell {
    #[inline]
    fn from(n: Number) -> Self {
        Cell::Number(n)
    }
}

impl From<String> for Cell {
    #[inline]
    fn from(s: String) -> Self {
        Cell::String(s)
    }
}

impl From<&str> for Cell {
    #[inline]
    fn from(s: &str) -> Self {
        Cell::String(s.to_string())
    }
}

impl From<Vec<u8>> for Cell {
    #[inline]
    fn from(b: Vec<u8>) -> Self {
        Cell::Bytes(b)
    }
}

impl From<usize> for Cell {
    #[inline]
    fn from(n: usize) -> Self {
        Cell::Number(Number::from(n))
    }
}

impl From<Option<ObjectRef>> for Cell {
    #[inline]
    fn from(o: Option<ObjectRef>) -> Self {
        Cell::Object(o)
    }
}

impl From<Opaque> for Cell {
    #[inline]
    fn from(o: Opaque) -> Self {
        Cell::Opaque(o)
    }
}
