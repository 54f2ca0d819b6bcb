//! End-to-end tests: compile an AST, run it, inspect the last popped value.

use std::rc::Rc;

use pretty_assertions::assert_eq;

use crate::{
    api::VmOptions,
    ast::{Expression, Program, Statement, builder::*},
    compiler::Compiler,
    object::{BuiltinError, HashKey, HashPair, HashPairs, Object, ObjectType},
    test_utils,
    vm::{Bytecode, EncodingError, Instructions, Opcode, VM, VmError, make},
};

fn run_with(program: Program, options: VmOptions) -> Result<Object, VmError> {
    let bytecode = Compiler::compile_program(&program).unwrap();
    let mut vm = VM::with_options(bytecode, options);
    vm.run()?;
    // Every top-level statement leaves the stack as deep as it found it.
    assert_eq!(vm.stack_len(), 0, "unbalanced stack");
    Ok(vm.last_popped_stack_element().clone())
}

fn run(statements: Vec<Statement>) -> Result<Object, VmError> {
    run_with(program(statements), VmOptions::default())
}

/// Run a single expression statement.
fn eval(expression: Expression) -> Object {
    run(vec![expr(expression)]).unwrap()
}

fn ints(values: &[i64]) -> Object {
    Object::array(values.iter().copied().map(Object::Integer).collect())
}

fn int_hash(pairs: &[(i64, i64)]) -> Object {
    let pairs: HashPairs = pairs
        .iter()
        .map(|&(k, v)| {
            (
                HashKey::Integer(k),
                HashPair {
                    key: Object::Integer(k),
                    value: Object::Integer(v),
                },
            )
        })
        .collect();
    Object::Hash(Rc::new(pairs))
}

fn countdown(name: &str) -> Expression {
    // fn(x) { if (x == 0) { return 0; } else { <name>(x - 1); } }
    func(
        &["x"],
        vec![expr(if_else(
            infix(ident("x"), "==", int(0)),
            vec![ret(int(0))],
            vec![expr(call(ident(name), vec![infix(ident("x"), "-", int(1))]))],
        ))],
    )
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_integer_arithmetic() {
    let cases = [
        (int(1), 1),
        (infix(int(1), "+", int(2)), 3),
        (infix(int(1), "-", int(2)), -1),
        (infix(int(1), "*", int(2)), 2),
        (infix(int(4), "/", int(2)), 2),
        (
            infix(infix(int(50), "/", int(2)), "*", int(2)),
            50,
        ),
        (infix(int(5), "*", infix(int(2), "+", int(10))), 60),
        (prefix("-", int(5)), -5),
        (
            infix(infix(prefix("-", int(50)), "+", int(100)), "+", prefix("-", int(50))),
            0,
        ),
    ];

    for (expression, expected) in cases {
        assert_eq!(eval(expression), Object::Integer(expected));
    }
}

#[test]
fn test_integer_overflow_wraps() {
    assert_eq!(
        eval(infix(int(i64::MAX), "+", int(1))),
        Object::Integer(i64::MIN)
    );
    assert_eq!(eval(prefix("-", int(i64::MIN))), Object::Integer(i64::MIN));
}

#[test]
fn test_division_truncates_toward_zero() {
    assert_eq!(eval(infix(prefix("-", int(7)), "/", int(2))), Object::Integer(-3));
}

#[test]
fn test_boolean_expressions() {
    let cases = [
        (boolean(true), true),
        (boolean(false), false),
        (infix(int(1), "<", int(2)), true),
        (infix(int(1), ">", int(2)), false),
        (infix(int(2), "<", int(1)), false),
        (infix(int(1), "==", int(1)), true),
        (infix(int(1), "!=", int(1)), false),
        (infix(int(1), "==", int(2)), false),
        (infix(boolean(true), "==", boolean(true)), true),
        (infix(boolean(true), "!=", boolean(false)), true),
        (infix(infix(int(1), "<", int(2)), "==", boolean(true)), true),
        (infix(int(1), "==", boolean(true)), false),
        (prefix("!", boolean(true)), false),
        (prefix("!", int(5)), false),
        (prefix("!", prefix("!", int(5))), true),
        (
            prefix("!", if_(boolean(false), vec![expr(int(5))])),
            true,
        ),
    ];

    for (expression, expected) in cases {
        assert_eq!(eval(expression), Object::Boolean(expected));
    }
}

#[test]
fn test_equality_of_strings_and_composites() {
    assert_eq!(
        eval(infix(string("a"), "==", string("a"))),
        Object::Boolean(true)
    );
    // Arrays compare by identity.
    assert_eq!(
        eval(infix(array(vec![int(1)]), "==", array(vec![int(1)]))),
        Object::Boolean(false)
    );
    let same = run(vec![
        let_("a", array(vec![int(1)])),
        expr(infix(ident("a"), "==", ident("a"))),
    ]);
    assert_eq!(same, Ok(Object::Boolean(true)));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval(string("monkey")), Object::string("monkey"));
    assert_eq!(
        eval(infix(
            infix(string("mon"), "+", string("key")),
            "+",
            string("banana")
        )),
        Object::string("monkeybanana")
    );
}

// ============================================================================
// Control Flow & Bindings
// ============================================================================

#[test]
fn test_conditionals() {
    let cases = [
        (if_(boolean(true), vec![expr(int(10))]), Object::Integer(10)),
        (
            if_else(boolean(true), vec![expr(int(10))], vec![expr(int(20))]),
            Object::Integer(10),
        ),
        (
            if_else(boolean(false), vec![expr(int(10))], vec![expr(int(20))]),
            Object::Integer(20),
        ),
        (if_(int(1), vec![expr(int(10))]), Object::Integer(10)),
        (
            if_(infix(int(1), "<", int(2)), vec![expr(int(10))]),
            Object::Integer(10),
        ),
        (
            if_else(
                infix(int(1), "<", int(2)),
                vec![expr(int(10))],
                vec![expr(int(20))],
            ),
            Object::Integer(10),
        ),
        (
            if_(infix(int(1), ">", int(2)), vec![expr(int(10))]),
            Object::Null,
        ),
        (if_(boolean(false), vec![expr(int(10))]), Object::Null),
        (
            if_else(
                if_(boolean(false), vec![expr(int(10))]),
                vec![expr(int(10))],
                vec![expr(int(20))],
            ),
            Object::Integer(20),
        ),
        (if_(boolean(true), vec![]), Object::Null),
    ];

    for (expression, expected) in cases {
        assert_eq!(eval(expression), expected);
    }
}

#[test]
fn test_global_let_statements() {
    assert_eq!(
        run(vec![let_("one", int(1)), expr(ident("one"))]),
        Ok(Object::Integer(1))
    );
    assert_eq!(
        run(vec![
            let_("one", int(1)),
            let_("two", infix(ident("one"), "+", ident("one"))),
            expr(infix(ident("one"), "+", ident("two"))),
        ]),
        Ok(Object::Integer(3))
    );
}

#[test]
fn test_top_level_return_ends_run() {
    assert_eq!(
        run(vec![ret(int(5)), expr(int(6))]),
        Ok(Object::Integer(5))
    );
}

// ============================================================================
// Collections
// ============================================================================

#[test]
fn test_array_literals() {
    assert_eq!(eval(array(vec![])), ints(&[]));
    assert_eq!(eval(array(vec![int(1), int(2), int(3)])), ints(&[1, 2, 3]));
    assert_eq!(
        eval(array(vec![
            infix(int(1), "+", int(2)),
            infix(int(3), "*", int(4)),
            infix(int(5), "+", int(6)),
        ])),
        ints(&[3, 12, 11])
    );
}

#[test]
fn test_hash_literals() {
    assert_eq!(eval(hash(vec![])), int_hash(&[]));
    assert_eq!(
        eval(hash(vec![(int(1), int(2)), (int(2), int(3))])),
        int_hash(&[(1, 2), (2, 3)])
    );
    assert_eq!(
        eval(hash(vec![
            (infix(int(1), "+", int(1)), infix(int(2), "*", int(2))),
            (infix(int(3), "+", int(3)), infix(int(4), "*", int(4))),
        ])),
        int_hash(&[(2, 4), (6, 16)])
    );
}

#[test]
fn test_hash_literal_display_follows_source_order() {
    let literal = hash((1..=5).map(|k| (int(k), int(k * 10))).collect());
    for _ in 0..10 {
        assert_eq!(
            eval(literal.clone()).to_string(),
            "{1: 10, 2: 20, 3: 30, 4: 40, 5: 50}"
        );
    }

    // A repeated key keeps its first position and its last value.
    let repeated = hash(vec![(int(1), int(1)), (int(2), int(2)), (int(1), int(3))]);
    assert_eq!(eval(repeated).to_string(), "{1: 3, 2: 2}");
}

#[test]
fn test_index_expressions() {
    let one_two_three = || array(vec![int(1), int(2), int(3)]);
    let cases = [
        (index(one_two_three(), int(1)), Object::Integer(2)),
        (
            index(one_two_three(), infix(int(0), "+", int(2))),
            Object::Integer(3),
        ),
        (
            index(index(array(vec![one_two_three()]), int(0)), int(0)),
            Object::Integer(1),
        ),
        (index(array(vec![]), int(0)), Object::Null),
        (index(one_two_three(), int(99)), Object::Null),
        (index(array(vec![int(1)]), prefix("-", int(1))), Object::Null),
        (
            index(hash(vec![(int(1), int(1)), (int(2), int(2))]), int(2)),
            Object::Integer(2),
        ),
        (index(hash(vec![(int(1), int(2))]), int(1)), Object::Integer(2)),
        (index(hash(vec![(int(1), int(2))]), int(0)), Object::Null),
        (index(hash(vec![]), int(0)), Object::Null),
    ];

    for (expression, expected) in cases {
        assert_eq!(eval(expression), expected);
    }
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_calling_functions_without_arguments() {
    assert_eq!(
        run(vec![
            let_(
                "fivePlusTen",
                func(&[], vec![expr(infix(int(5), "+", int(10)))]),
            ),
            expr(call(ident("fivePlusTen"), vec![])),
        ]),
        Ok(Object::Integer(15))
    );
    assert_eq!(
        run(vec![
            let_("one", func(&[], vec![expr(int(1))])),
            let_("two", func(&[], vec![expr(int(2))])),
            expr(infix(
                call(ident("one"), vec![]),
                "+",
                call(ident("two"), vec![])
            )),
        ]),
        Ok(Object::Integer(3))
    );
}

#[test]
fn test_return_statements() {
    assert_eq!(
        eval(call(
            func(&[], vec![ret(int(99)), expr(int(100))]),
            vec![]
        )),
        Object::Integer(99)
    );
    assert_eq!(
        eval(call(func(&[], vec![]), vec![])),
        Object::Null
    );
}

#[test]
fn test_first_class_functions() {
    assert_eq!(
        run(vec![
            let_("returnsOne", func(&[], vec![expr(int(1))])),
            let_("returnsOneReturner", func(&[], vec![expr(ident("returnsOne"))])),
            expr(call(call(ident("returnsOneReturner"), vec![]), vec![])),
        ]),
        Ok(Object::Integer(1))
    );
}

#[test]
fn test_local_bindings() {
    assert_eq!(
        run(vec![
            let_(
                "oneAndTwo",
                func(
                    &[],
                    vec![
                        let_("one", int(1)),
                        let_("two", int(2)),
                        expr(infix(ident("one"), "+", ident("two"))),
                    ],
                ),
            ),
            expr(call(ident("oneAndTwo"), vec![])),
        ]),
        Ok(Object::Integer(3))
    );

    assert_eq!(
        run(vec![
            let_("globalSeed", int(50)),
            let_(
                "minusOne",
                func(
                    &[],
                    vec![
                        let_("num", int(1)),
                        expr(infix(ident("globalSeed"), "-", ident("num"))),
                    ],
                ),
            ),
            let_(
                "minusTwo",
                func(
                    &[],
                    vec![
                        let_("num", int(2)),
                        expr(infix(ident("globalSeed"), "-", ident("num"))),
                    ],
                ),
            ),
            expr(infix(
                call(ident("minusOne"), vec![]),
                "+",
                call(ident("minusTwo"), vec![])
            )),
        ]),
        Ok(Object::Integer(97))
    );
}

#[test]
fn test_arguments_and_bindings() {
    assert_eq!(
        run(vec![
            let_("sub", func(&["a", "b"], vec![expr(infix(ident("a"), "-", ident("b")))])),
            expr(call(ident("sub"), vec![int(10), int(3)])),
        ]),
        Ok(Object::Integer(7))
    );

    // let globalNum = 10;
    // let sum = fn(a, b) { let c = a + b; c + globalNum; };
    // let outer = fn() { sum(1, 2) + sum(3, 4) + globalNum; };
    // outer() + globalNum;
    assert_eq!(
        run(vec![
            let_("globalNum", int(10)),
            let_(
                "sum",
                func(
                    &["a", "b"],
                    vec![
                        let_("c", infix(ident("a"), "+", ident("b"))),
                        expr(infix(ident("c"), "+", ident("globalNum"))),
                    ],
                ),
            ),
            let_(
                "outer",
                func(
                    &[],
                    vec![expr(infix(
                        infix(
                            call(ident("sum"), vec![int(1), int(2)]),
                            "+",
                            call(ident("sum"), vec![int(3), int(4)]),
                        ),
                        "+",
                        ident("globalNum"),
                    ))],
                ),
            ),
            expr(infix(call(ident("outer"), vec![]), "+", ident("globalNum"))),
        ]),
        Ok(Object::Integer(50))
    );
}

#[test]
fn test_wrong_argument_count() {
    assert_eq!(
        run(vec![expr(call(func(&[], vec![expr(int(1))]), vec![int(1)]))]),
        Err(VmError::WrongArgumentCount { want: 0, got: 1 })
    );
    assert_eq!(
        run(vec![expr(call(func(&["a", "b"], vec![expr(ident("a"))]), vec![int(1)]))]),
        Err(VmError::WrongArgumentCount { want: 2, got: 1 })
    );
}

#[test]
fn test_builtin_functions() {
    let len = |arg| eval(call(ident("len"), vec![arg]));
    assert_eq!(len(string("")), Object::Integer(0));
    assert_eq!(len(string("hello world")), Object::Integer(11));
    assert_eq!(len(array(vec![int(1), int(2), int(3)])), Object::Integer(3));

    assert_eq!(
        eval(call(ident("puts"), vec![string("hello"), string("world!")])),
        Object::Null
    );
    assert_eq!(
        eval(call(ident("first"), vec![array(vec![int(1), int(2)])])),
        Object::Integer(1)
    );
    assert_eq!(
        eval(call(ident("last"), vec![array(vec![int(1), int(2)])])),
        Object::Integer(2)
    );
    assert_eq!(
        eval(call(ident("rest"), vec![array(vec![int(1), int(2), int(3)])])),
        ints(&[2, 3])
    );
    assert_eq!(eval(call(ident("rest"), vec![array(vec![])])), Object::Null);
    assert_eq!(
        eval(call(ident("push"), vec![array(vec![]), int(1)])),
        ints(&[1])
    );
}

#[test]
fn test_builtin_errors() {
    assert_eq!(
        run(vec![expr(call(ident("len"), vec![int(1)]))]),
        Err(VmError::Builtin(BuiltinError::ArgumentNotSupported {
            name: "len",
            got: ObjectType::Integer,
        }))
    );
    assert_eq!(
        run(vec![expr(call(ident("len"), vec![string("one"), string("two")]))]),
        Err(VmError::Builtin(BuiltinError::WrongArgumentCount {
            name: "len",
            want: 1,
            got: 2,
        }))
    );

    let error = run(vec![expr(call(ident("push"), vec![int(1), int(1)]))]).unwrap_err();
    assert_eq!(
        error.to_string(),
        "argument to `push` must be ARRAY, got INTEGER"
    );
}

#[test]
fn test_closures() {
    // let newClosure = fn(a) { fn() { a; }; }; let closure = newClosure(99); closure();
    assert_eq!(
        run(vec![
            let_("newClosure", func(&["a"], vec![expr(func(&[], vec![expr(ident("a"))]))])),
            let_("closure", call(ident("newClosure"), vec![int(99)])),
            expr(call(ident("closure"), vec![])),
        ]),
        Ok(Object::Integer(99))
    );

    // let newAdder = fn(a, b) { let c = a + b; fn(d) { c + d }; };
    // let adder = newAdder(1, 2); adder(8);
    assert_eq!(
        run(vec![
            let_(
                "newAdder",
                func(
                    &["a", "b"],
                    vec![
                        let_("c", infix(ident("a"), "+", ident("b"))),
                        expr(func(&["d"], vec![expr(infix(ident("c"), "+", ident("d")))])),
                    ],
                ),
            ),
            let_("adder", call(ident("newAdder"), vec![int(1), int(2)])),
            expr(call(ident("adder"), vec![int(8)])),
        ]),
        Ok(Object::Integer(11))
    );
}

#[test]
fn test_nested_closures() {
    // let a = 1;
    // let newAdderOuter = fn(b) { fn(c) { fn(d) { a + b + c + d }; }; };
    // newAdderOuter(2)(3)(8);
    let sum = infix(
        infix(infix(ident("a"), "+", ident("b")), "+", ident("c")),
        "+",
        ident("d"),
    );
    assert_eq!(
        run(vec![
            let_("a", int(1)),
            let_(
                "newAdderOuter",
                func(
                    &["b"],
                    vec![expr(func(&["c"], vec![expr(func(&["d"], vec![expr(sum)]))]))],
                ),
            ),
            expr(call(
                call(call(ident("newAdderOuter"), vec![int(2)]), vec![int(3)]),
                vec![int(8)],
            )),
        ]),
        Ok(Object::Integer(14))
    );

    // let newClosure = fn(a, b) {
    //   let one = fn() { a; }; let two = fn() { b; };
    //   fn() { one() + two(); };
    // };
    // newClosure(9, 90)();
    assert_eq!(
        run(vec![
            let_(
                "newClosure",
                func(
                    &["a", "b"],
                    vec![
                        let_("one", func(&[], vec![expr(ident("a"))])),
                        let_("two", func(&[], vec![expr(ident("b"))])),
                        expr(func(
                            &[],
                            vec![expr(infix(
                                call(ident("one"), vec![]),
                                "+",
                                call(ident("two"), vec![]),
                            ))],
                        )),
                    ],
                ),
            ),
            expr(call(call(ident("newClosure"), vec![int(9), int(90)]), vec![])),
        ]),
        Ok(Object::Integer(99))
    );
}

#[test]
fn test_recursive_functions() {
    assert_eq!(
        run(vec![
            let_("countDown", countdown("countDown")),
            expr(call(ident("countDown"), vec![int(1)])),
        ]),
        Ok(Object::Integer(0))
    );

    // Recursion through a local binding inside another function.
    assert_eq!(
        run(vec![
            let_(
                "wrapper",
                func(
                    &[],
                    vec![
                        let_("countDown", countdown("countDown")),
                        expr(call(ident("countDown"), vec![int(1)])),
                    ],
                ),
            ),
            expr(call(ident("wrapper"), vec![])),
        ]),
        Ok(Object::Integer(0))
    );
}

#[test]
fn test_recursive_fibonacci() {
    test_utils::init_test_logging();

    // fn(x) { if (x == 0) { return 0; } else { if (x == 1) { return 1; }
    //   else { fibonacci(x - 1) + fibonacci(x - 2); } } }
    let fibonacci = func(
        &["x"],
        vec![expr(if_else(
            infix(ident("x"), "==", int(0)),
            vec![ret(int(0))],
            vec![expr(if_else(
                infix(ident("x"), "==", int(1)),
                vec![ret(int(1))],
                vec![expr(infix(
                    call(ident("fibonacci"), vec![infix(ident("x"), "-", int(1))]),
                    "+",
                    call(ident("fibonacci"), vec![infix(ident("x"), "-", int(2))]),
                ))],
            ))],
        ))],
    );

    assert_eq!(
        run(vec![
            let_("fibonacci", fibonacci),
            expr(call(ident("fibonacci"), vec![int(15)])),
        ]),
        Ok(Object::Integer(610))
    );
}

// ============================================================================
// Runtime Errors
// ============================================================================

#[test]
fn test_type_errors() {
    let cases = [
        (
            infix(int(1), "+", boolean(true)),
            "unsupported types for Add: INTEGER BOOLEAN",
        ),
        (
            infix(string("a"), "-", string("b")),
            "unsupported types for Sub: STRING STRING",
        ),
        (
            infix(boolean(true), ">", boolean(false)),
            "unsupported types for GreaterThan: BOOLEAN BOOLEAN",
        ),
        (prefix("-", boolean(true)), "unsupported type for negation: BOOLEAN"),
        (infix(int(1), "/", int(0)), "division by zero"),
        (index(int(1), int(0)), "index operator not supported: INTEGER[INTEGER]"),
        (
            hash(vec![(array(vec![int(1)]), int(2))]),
            "unusable as hash key: ARRAY",
        ),
        (
            index(hash(vec![]), func(&[], vec![])),
            "unusable as hash key: COMPILED_FUNCTION",
        ),
        (call(int(1), vec![]), "calling non-function: INTEGER"),
    ];

    for (expression, message) in cases {
        let error = run(vec![expr(expression)]).unwrap_err();
        assert_eq!(error.to_string(), message);
    }
}

#[test]
fn test_unbounded_recursion_hits_frame_limit() {
    // let f = fn() { f() }; f();
    let result = run(vec![
        let_("f", func(&[], vec![expr(call(ident("f"), vec![]))])),
        expr(call(ident("f"), vec![])),
    ]);
    assert_eq!(result, Err(VmError::FrameOverflow { max_frames: 1024 }));
}

#[test]
fn test_configured_limits() {
    let options = VmOptions {
        max_frames: 3,
        ..VmOptions::default()
    };
    let program_for = |n| {
        program(vec![
            let_("countDown", countdown("countDown")),
            expr(call(ident("countDown"), vec![int(n)])),
        ])
    };
    // Main frame plus two calls fit.
    assert_eq!(run_with(program_for(1), options), Ok(Object::Integer(0)));
    assert_eq!(
        run_with(program_for(3), options),
        Err(VmError::FrameOverflow { max_frames: 3 })
    );

    let options = VmOptions {
        stack_size: 4,
        ..VmOptions::default()
    };
    let five = program(vec![expr(array(vec![int(1), int(2), int(3), int(4), int(5)]))]);
    assert_eq!(
        run_with(five, options),
        Err(VmError::StackOverflow { capacity: 4 })
    );
}

#[test]
fn test_corrupted_bytecode() {
    let unknown = Bytecode::new(Instructions::from(vec![0xFF]), vec![]);
    assert_eq!(
        VM::new(unknown).run(),
        Err(VmError::Encoding(EncodingError::UnknownOpcode(0xFF)))
    );

    let unassigned = Bytecode::new(make(Opcode::GetGlobal, &[0]).unwrap(), vec![]);
    assert_eq!(VM::new(unassigned).run(), Err(VmError::UndefinedGlobal(0)));

    let missing_constant = Bytecode::new(make(Opcode::Constant, &[3]).unwrap(), vec![]);
    assert_eq!(
        VM::new(missing_constant).run(),
        Err(VmError::OperandOutOfRange {
            opcode: Opcode::Constant,
            operand: 3,
        })
    );
}

#[test]
fn test_globals_carry_over_between_vms() {
    let mut compiler = Compiler::new();
    compiler.compile(&program(vec![let_("a", int(5))])).unwrap();
    let (bytecode, symbols) = compiler.into_parts();
    let mut vm = VM::new(bytecode.clone());
    vm.run().unwrap();
    let globals = vm.into_globals();

    let mut compiler = Compiler::with_state(symbols, bytecode.constants);
    compiler
        .compile(&program(vec![expr(infix(ident("a"), "*", int(2)))]))
        .unwrap();
    let mut vm = VM::with_globals(compiler.bytecode(), globals, VmOptions::default());
    vm.run().unwrap();
    assert_eq!(vm.last_popped_stack_element(), &Object::Integer(10));
}
