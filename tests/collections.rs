#[macro_use]
mod cases;

use cases::ints;
use monkey::Object;
use monkey::ast::builder::*;

vm_case!(
    array_literal,
    program: [expr(array(vec![
        infix(int(1), "+", int(2)),
        infix(int(3), "*", int(4)),
    ]))],
    expected: ints(&[3, 12]),
);

vm_case!(
    array_index,
    program: [expr(index(
        array(vec![int(1), int(2), int(3)]),
        infix(int(1), "+", int(1)),
    ))],
    expected: Object::Integer(3),
);

vm_case!(
    array_index_out_of_range,
    program: [expr(index(array(vec![int(1)]), int(5)))],
    expected: Object::Null,
);

vm_case!(
    hash_index,
    program: [expr(index(hash(vec![(int(1), int(2))]), int(1)))],
    expected: Object::Integer(2),
);

vm_case!(
    hash_missing_key,
    program: [expr(index(hash(vec![(int(1), int(2))]), int(0)))],
    expected: Object::Null,
);

vm_case!(
    hash_with_string_keys,
    program: [
        let_("people", hash(vec![(string("name"), string("Ada")), (boolean(true), int(1))])),
        expr(index(ident("people"), string("name"))),
    ],
    expected: Object::string("Ada"),
);

vm_case!(
    arrays_compare_by_identity,
    program: [expr(infix(array(vec![]), "==", array(vec![])))],
    expected: Object::Boolean(false),
);

vm_case!(
    unusable_hash_key,
    program: [expr(index(hash(vec![]), array(vec![])))],
    error: "unusable as hash key: ARRAY",
);

vm_case!(
    index_on_integer,
    program: [expr(index(int(1), int(1)))],
    error: "index operator not supported: INTEGER[INTEGER]",
);

vm_case!(
    builtins_on_arrays,
    program: [
        let_("a", array(vec![int(1), int(2), int(3)])),
        expr(call(ident("push"), vec![call(ident("rest"), vec![ident("a")]), call(ident("len"), vec![ident("a")])])),
    ],
    expected: ints(&[2, 3, 3]),
);

vm_case!(
    first_and_last,
    program: [
        let_("a", array(vec![int(4), int(5)])),
        expr(infix(call(ident("first"), vec![ident("a")]), "*", call(ident("last"), vec![ident("a")]))),
    ],
    expected: Object::Integer(20),
);

vm_case!(
    builtin_wrong_type,
    program: [expr(call(ident("first"), vec![int(1)]))],
    error: "argument to `first` must be ARRAY, got INTEGER",
);
