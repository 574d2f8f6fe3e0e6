#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use crate::val::*;
    use crate::vm::NeonException;

    fn num(s: &str) -> Number {
        s.parse().unwrap()
    }

    macro_rules! test_fix_kind {
        ($name:ident, $kind:expr, $value:expr) => {
            #[test]
            fn $name() {
                let mut cell = Cell::Empty;
                cell.ensure_kind($kind).unwrap();
                assert_eq!(cell.kind(), Some($kind));
                cell = $value;
                assert!(cell.ensure_kind($kind).is_ok());
                let wrong = if $kind == CellKind::Boolean { CellKind::Number } else { CellKind::Boolean };
                assert!(cell.ensure_kind(wrong).is_err());
            }
        };
    }

    test_fix_kind!(fix_boolean, CellKind::Boolean, Cell::from(true));
    test_fix_kind!(fix_number, CellKind::Number, Cell::from(num("4.5")));
    test_fix_kind!(fix_string, CellKind::String, Cell::from("abc"));
    test_fix_kind!(fix_bytes, CellKind::Bytes, Cell::from(vec![1u8, 2]));
    test_fix_kind!(fix_array, CellKind::Array, Cell::new_array(vec![Cell::from(true)]));
    test_fix_kind!(fix_dictionary, CellKind::Dictionary, Cell::new_dictionary(BTreeMap::new()));
    test_fix_kind!(fix_address, CellKind::Address, Cell::Address(None));
    test_fix_kind!(fix_object, CellKind::Object, Cell::Object(make_string("x")));

    #[test]
    fn write_then_read_same_type() {
        let slot = new_cell_ref(Cell::Empty);
        {
            let mut c = slot.borrow_mut();
            c.ensure_kind(CellKind::Number).unwrap();
            *c = Cell::from(num("12.5"));
        }
        let read = slot.borrow().clone().into_number().unwrap();
        assert_eq!(read, num("12.50"));
        assert!(slot.borrow().clone().into_string().is_err());
    }

    #[test]
    fn empty_reads_as_default() {
        assert_eq!(Cell::Empty.into_number().unwrap(), Number::zero());
        assert!(!Cell::Empty.into_boolean().unwrap());
        assert_eq!(Cell::Empty.into_string().unwrap(), "");
        assert!(Cell::Empty.into_address().unwrap().is_none());
    }

    #[test]
    fn array_copies_alias_the_container() {
        let original = Cell::new_array(vec![Cell::from(num("1")), Cell::from(num("2"))]);
        let alias = original.clone();
        let array = alias.into_array().unwrap();
        array.borrow_mut().push(new_cell_ref(Cell::from(num("3"))));
        *array.borrow()[0].borrow_mut() = Cell::from(num("10"));

        let seen = original.into_array().unwrap();
        assert_eq!(seen.borrow().len(), 3);
        assert_eq!(*seen.borrow()[0].borrow(), Cell::from(num("10")));
    }

    #[test]
    fn address_aliasing_is_visible_through_both_paths() {
        let slot = new_cell_ref(Cell::new_array(vec![]));
        let a = Cell::address(slot.clone());
        let b = a.clone();
        let through_a = a.into_address().unwrap().unwrap().borrow().clone().into_array().unwrap();
        through_a.borrow_mut().push(new_cell_ref(Cell::from("x")));
        let through_b = b.into_address().unwrap().unwrap().borrow().clone().into_array().unwrap();
        assert_eq!(Cell::array_values(&through_b), vec![Cell::from("x")]);
    }

    #[test]
    fn equality_rules() {
        assert_ne!(Cell::Empty, Cell::Empty);
        assert_eq!(Cell::from(num("1")), Cell::from(num("1.00")));

        let slot = new_cell_ref(Cell::from(true));
        let other = new_cell_ref(Cell::from(true));
        assert_eq!(Cell::address(slot.clone()), Cell::address(slot.clone()));
        assert_ne!(Cell::address(slot), Cell::address(other));
        assert_eq!(Cell::Address(None), Cell::Address(None));

        let a = Cell::new_array(vec![Cell::from("p"), Cell::from(num("2"))]);
        let b = Cell::new_array(vec![Cell::from("p"), Cell::from(num("2.0"))]);
        assert_eq!(a, b);

        let mut da = BTreeMap::new();
        da.insert("k".to_string(), Cell::from(false));
        let mut db = BTreeMap::new();
        db.insert("k".to_string(), Cell::from(true));
        assert_ne!(Cell::new_dictionary(da), Cell::new_dictionary(db));

        let o = make_string("same");
        assert_eq!(Cell::Object(o.clone()), Cell::Object(o));
        assert_ne!(Cell::Object(make_string("same")), Cell::Object(make_string("same")));
    }

    fn exception_of(err: anyhow::Error) -> NeonException {
        err.downcast::<NeonException>().expect("language exception")
    }

    #[test]
    fn object_to_string_forms() {
        assert_eq!(make_boolean(true).unwrap().to_string(), "TRUE");
        assert_eq!(make_bytes(vec![0xaa, 0x01]).unwrap().to_string(), "HEXBYTES \"aa 01\"");
        let arr = make_array(vec![make_string("a"), None, make_number(num("2.50"))]).unwrap();
        assert_eq!(arr.to_string(), "[\"a\", null, 2.5]");
        let mut entries = BTreeMap::new();
        entries.insert("b".to_string(), make_number(num("1")));
        entries.insert("a".to_string(), make_string("x"));
        assert_eq!(make_dictionary(entries).unwrap().to_string(), "{\"a\": \"x\", \"b\": 1}");
    }

    #[test]
    fn array_subscript_errors() {
        let arr = make_array(vec![make_string("a")]).unwrap();
        let zero = make_number(num("0")).unwrap();
        assert_eq!(arr.subscript(&zero).unwrap().unwrap().to_string(), "a");

        let err = exception_of(arr.subscript(&make_string("0").unwrap()).unwrap_err());
        assert_eq!(err.name, "DynamicConversionException");
        assert_eq!(err.info, "to Number");

        let err = exception_of(arr.subscript(&make_number(num("3")).unwrap()).unwrap_err());
        assert_eq!(err.name, "PANIC");
        assert_eq!(err.info, "Array index exceeds size 1: 3");
    }

    #[test]
    fn dictionary_subscript_and_methods() {
        let mut entries = BTreeMap::new();
        entries.insert("k".to_string(), make_boolean(true));
        let dict = make_dictionary(entries).unwrap();
        assert_eq!(dict.subscript(&make_string("k").unwrap()).unwrap().unwrap().to_string(), "TRUE");

        let err = exception_of(dict.subscript(&make_string("missing").unwrap()).unwrap_err());
        assert_eq!(err.name, "ObjectSubscriptException");
        assert_eq!(err.info, "missing");

        let keys = dict.invoke_method("keys", &[]).unwrap().unwrap();
        assert_eq!(keys.to_string(), "[\"k\"]");

        let err = exception_of(dict.invoke_method("size", &[make_boolean(true)]).unwrap_err());
        assert_eq!(err.info, "invalid number of arguments to size() (expected 0)");

        let err = exception_of(dict.invoke_method("frob", &[]).unwrap_err());
        assert_eq!(err.info, "dictionary object does not support this method");
    }

    #[test]
    fn set_property_updates_in_place() {
        let arr: ObjectRef = Rc::new(ObjectArray::new(vec![None, None]));
        arr.set_property(&make_number(num("1")).unwrap(), make_string("v")).unwrap();
        assert_eq!(arr.to_string(), "[null, \"v\"]");

        let err = exception_of(arr.set_property(&make_number(num("5")).unwrap(), None).unwrap_err());
        assert_eq!(err.name, "ObjectSubscriptException");
        assert_eq!(err.info, "5");

        let s = make_string("text").unwrap();
        let err = exception_of(s.set_property(&make_string("x").unwrap(), None).unwrap_err());
        assert_eq!(err.name, "ObjectSubscriptException");
        assert_eq!(s.invoke_method("length", &[]).unwrap().unwrap().to_string(), "4");
    }
}
