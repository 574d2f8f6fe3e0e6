use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use anyhow::Result;

use super::number::Number;
use crate::vm::{
    DYNAMIC_CONVERSION_EXCEPTION, NeonException, OBJECT_SUBSCRIPT_EXCEPTION, PANIC_EXCEPTION,
};

/// Shared handle to a dynamic object. `None` in an `Option<ObjectRef>` is the
/// language's `NULL`.
pub type ObjectRef = Rc<dyn DynamicObject>;

/// Duck-typed value used for interop and exception payloads.
///
/// Every query defaults to "unsupported" (`None`); each variant answers only
/// what it can represent.
pub trait DynamicObject: fmt::Debug + fmt::Display {
    /// Variant name used in diagnostics (`"string object does not support..."`).
    fn kind(&self) -> &'static str;

    fn get_boolean(&self) -> Option<bool> {
        None
    }

    fn get_number(&self) -> Option<Number> {
        None
    }

    fn get_string(&self) -> Option<String> {
        None
    }

    fn get_bytes(&self) -> Option<Vec<u8>> {
        None
    }

    fn get_array(&self) -> Option<Vec<Option<ObjectRef>>> {
        None
    }

    fn get_dictionary(&self) -> Option<BTreeMap<String, Option<ObjectRef>>> {
        None
    }

    fn subscript(&self, index: &ObjectRef) -> Result<Option<ObjectRef>> {
        Err(NeonException::new(OBJECT_SUBSCRIPT_EXCEPTION, index.to_string()).into())
    }

    fn invoke_method(&self, _name: &str, _args: &[Option<ObjectRef>]) -> Result<Option<ObjectRef>> {
        Err(unsupported_method(self.kind()))
    }

    fn set_property(&self, index: &ObjectRef, _value: Option<ObjectRef>) -> Result<()> {
        Err(NeonException::new(OBJECT_SUBSCRIPT_EXCEPTION, index.to_string()).into())
    }

    /// Rendering used inside containers; strings are quoted.
    fn to_literal_string(&self) -> String {
        self.to_string()
    }
}

fn unsupported_method(kind: &str) -> anyhow::Error {
    NeonException::new(
        DYNAMIC_CONVERSION_EXCEPTION,
        format!("{} object does not support this method", kind),
    )
    .into()
}

fn check_no_args(name: &str, args: &[Option<ObjectRef>]) -> Result<()> {
    if !args.is_empty() {
        return Err(NeonException::new(
            DYNAMIC_CONVERSION_EXCEPTION,
            format!("invalid number of arguments to {}() (expected 0)", name),
        )
        .into());
    }
    Ok(())
}

/// Renders a possibly-null object the way container literals show elements.
pub fn literal_or_null(object: &Option<ObjectRef>) -> String {
    match object {
        Some(o) => o.to_literal_string(),
        None => "null".to_string(),
    }
}

pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub fn hex_bytes(bytes: &[u8]) -> String {
    let body: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("HEXBYTES \"{}\"", body.join(" "))
}

#[derive(Debug, Clone, Copy)]
pub struct ObjectBoolean(pub bool);

impl DynamicObject for ObjectBoolean {
    fn kind(&self) -> &'static str {
        "boolean"
    }

    fn get_boolean(&self) -> Option<bool> {
        Some(self.0)
    }
}

impl fmt::Display for ObjectBoolean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0 { "TRUE" } else { "FALSE" })
    }
}

#[derive(Debug, Clone)]
pub struct ObjectNumber(pub Number);

impl DynamicObject for ObjectNumber {
    fn kind(&self) -> &'static str {
        "number"
    }

    fn get_number(&self) -> Option<Number> {
        Some(self.0.clone())
    }
}

impl fmt::Display for ObjectNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ObjectString(pub String);

impl DynamicObject for ObjectString {
    fn kind(&self) -> &'static str {
        "string"
    }

    fn get_string(&self) -> Option<String> {
        Some(self.0.clone())
    }

    fn invoke_method(&self, name: &str, args: &[Option<ObjectRef>]) -> Result<Option<ObjectRef>> {
        match name {
            "length" => {
                check_no_args(name, args)?;
                Ok(Some(Rc::new(ObjectNumber(Number::from(self.0.chars().count())))))
            }
            _ => Err(unsupported_method(self.kind())),
        }
    }

    fn to_literal_string(&self) -> String {
        quote_string(&self.0)
    }
}

impl fmt::Display for ObjectString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ObjectBytes(pub Vec<u8>);

impl DynamicObject for ObjectBytes {
    fn kind(&self) -> &'static str {
        "bytes"
    }

    fn get_bytes(&self) -> Option<Vec<u8>> {
        Some(self.0.clone())
    }
}

impl fmt::Display for ObjectBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex_bytes(&self.0))
    }
}

#[derive(Debug, Default)]
pub struct ObjectArray(pub RefCell<Vec<Option<ObjectRef>>>);

impl ObjectArray {
    pub fn new(items: Vec<Option<ObjectRef>>) -> Self {
        Self(RefCell::new(items))
    }

    fn checked_index(&self, index: &ObjectRef) -> Result<usize> {
        let n = index
            .get_number()
            .ok_or_else(|| NeonException::new(DYNAMIC_CONVERSION_EXCEPTION, "to Number"))?;
        let len = self.0.borrow().len();
        match n.to_index() {
            Some(i) if i < len => Ok(i),
            _ => Err(NeonException::new(PANIC_EXCEPTION, format!("Array index exceeds size {}: {}", len, n)).into()),
        }
    }
}

impl DynamicObject for ObjectArray {
    fn kind(&self) -> &'static str {
        "array"
    }

    fn get_array(&self) -> Option<Vec<Option<ObjectRef>>> {
        Some(self.0.borrow().clone())
    }

    fn subscript(&self, index: &ObjectRef) -> Result<Option<ObjectRef>> {
        let i = self.checked_index(index)?;
        Ok(self.0.borrow()[i].clone())
    }

    fn invoke_method(&self, name: &str, args: &[Option<ObjectRef>]) -> Result<Option<ObjectRef>> {
        match name {
            "size" => {
                check_no_args(name, args)?;
                Ok(Some(Rc::new(ObjectNumber(Number::from(self.0.borrow().len())))))
            }
            _ => Err(unsupported_method(self.kind())),
        }
    }

    fn set_property(&self, index: &ObjectRef, value: Option<ObjectRef>) -> Result<()> {
        let i = match self.checked_index(index) {
            Ok(i) => i,
            Err(_) => return Err(NeonException::new(OBJECT_SUBSCRIPT_EXCEPTION, index.to_string()).into()),
        };
        self.0.borrow_mut()[i] = value;
        Ok(())
    }
}

impl fmt::Display for ObjectArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self.0.borrow().iter().map(literal_or_null).collect();
        write!(f, "[{}]", items.join(", "))
    }
}

#[derive(Debug, Default)]
pub struct ObjectDictionary(pub RefCell<BTreeMap<String, Option<ObjectRef>>>);

impl ObjectDictionary {
    pub fn new(entries: BTreeMap<String, Option<ObjectRef>>) -> Self {
        Self(RefCell::new(entries))
    }
}

impl DynamicObject for ObjectDictionary {
    fn kind(&self) -> &'static str {
        "dictionary"
    }

    fn get_dictionary(&self) -> Option<BTreeMap<String, Option<ObjectRef>>> {
        Some(self.0.borrow().clone())
    }

    fn subscript(&self, index: &ObjectRef) -> Result<Option<ObjectRef>> {
        let key = index
            .get_string()
            .ok_or_else(|| NeonException::new(DYNAMIC_CONVERSION_EXCEPTION, "to String"))?;
        match self.0.borrow().get(&key) {
            Some(v) => Ok(v.clone()),
            None => Err(NeonException::new(OBJECT_SUBSCRIPT_EXCEPTION, key).into()),
        }
    }

    fn invoke_method(&self, name: &str, args: &[Option<ObjectRef>]) -> Result<Option<ObjectRef>> {
        match name {
            "size" => {
                check_no_args(name, args)?;
                Ok(Some(Rc::new(ObjectNumber(Number::from(self.0.borrow().len())))))
            }
            "keys" => {
                check_no_args(name, args)?;
                let keys = self
                    .0
                    .borrow()
                    .keys()
                    .map(|k| Some(Rc::new(ObjectString(k.clone())) as ObjectRef))
                    .collect();
                Ok(Some(Rc::new(ObjectArray::new(keys))))
            }
            _ => Err(unsupported_method(self.kind())),
        }
    }

    fn set_property(&self, index: &ObjectRef, value: Option<ObjectRef>) -> Result<()> {
        match index.get_string() {
            Some(key) => {
                self.0.borrow_mut().insert(key, value);
                Ok(())
            }
            None => Err(NeonException::new(OBJECT_SUBSCRIPT_EXCEPTION, index.to_string()).into()),
        }
    }
}

impl fmt::Display for ObjectDictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self
            .0
            .borrow()
            .iter()
            .map(|(k, v)| format!("{}: {}", quote_string(k), literal_or_null(v)))
            .collect();
        write!(f, "{{{}}}", items.join(", "))
    }
}

/// Convenience constructors returning non-null handles.
pub fn make_boolean(b: bool) -> Option<ObjectRef> {
    Some(Rc::new(ObjectBoolean(b)))
}

pub fn make_number(n: Number) -> Option<ObjectRef> {
    Some(Rc::new(ObjectNumber(n)))
}

pub fn make_string(s: impl Into<String>) -> Option<ObjectRef> {
    Some(Rc::new(ObjectString(s.into())))
}

pub fn make_bytes(b: Vec<u8>) -> Option<ObjectRef> {
    Some(Rc::new(ObjectBytes(b)))
}

pub fn make_array(items: Vec<Option<ObjectRef>>) -> Option<ObjectRef> {
    Some(Rc::new(ObjectArray::new(items)))
}

pub fn make_dictionary(entries: BTreeMap<String, Option<ObjectRef>>) -> Option<ObjectRef> {
    Some(Rc::new(ObjectDictionary::new(entries)))
}
