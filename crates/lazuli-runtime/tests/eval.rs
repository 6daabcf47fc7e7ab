use lazuli_core::ir::{self, Builtin, ExprKind, Identifier};
use lazuli_core::{lower_program, PRELUDE};
use lazuli_lexer::lex;
use lazuli_parser::parse;
use lazuli_runtime::{EvalError, Interpreter, Value};
use std::io::Cursor;

fn compile(source: &str) -> ir::Expr {
    let mut program = parse(&lex(PRELUDE).expect("lex prelude")).expect("parse prelude");
    let user = parse(&lex(source).expect("lex")).expect("parse");
    program.data_defs.extend(user.data_defs);
    program.definitions.extend(user.definitions);
    program.end = user.end;
    lower_program(&program).expect("lower")
}

fn run_with(source: &str, input: &str, stress: bool) -> Result<String, EvalError> {
    let program = compile(source);
    let mut output = Vec::new();
    let mut interpreter = Interpreter::new(Cursor::new(input.to_string()), &mut output);
    interpreter.gc_stress(stress);
    let result = interpreter.run(&program);
    drop(interpreter);
    result.map(|()| String::from_utf8(output).expect("utf8 output"))
}

fn run(source: &str, input: &str) -> String {
    run_with(source, input, false).expect("run")
}

fn run_err(source: &str, input: &str) -> EvalError {
    run_with(source, input, false).expect_err("expected runtime error")
}

// Literal I/O scenarios.

#[test]
fn identity_copies_the_stream() {
    assert_eq!(run("main xs = xs\n", "hello\n"), "hello\n");
}

#[test]
fn read_add_show() {
    let source = "main xs = showInt (readInt xs + 1)\n";
    assert_eq!(run(source, "41"), "42");
    assert_eq!(run(source, "41\n"), "42");
    assert_eq!(run(source, "-8\n"), "-7");
}

#[test]
fn const_program_ignores_input() {
    let source = "const x y = x\nmain = const \"yes\\n\"\n";
    assert_eq!(run(source, "anything at all"), "yes\n");
    assert_eq!(run(source, ""), "yes\n");
}

#[test]
fn user_data_type_with_case() {
    let source = "data Maybe a = Nothing | Just a\n\
                  describe m = case m of\n  Nothing -> \"nothing\\n\"\n  Just x -> \"just\\n\"\n\
                  main xs = describe Nothing ++ describe (Just 1)\n";
    assert_eq!(run(source, ""), "nothing\njust\n");
}

#[test]
fn map_and_concat_duplicate_characters() {
    let source = "main xs = concat (map (\\c -> [c, c]) xs)\n";
    assert_eq!(run(source, "ab"), "aabb");
}

#[test]
fn take_from_an_infinite_list() {
    let source = "inc x = x + 1\n\
                  main xs = intercalate \",\" (map showInt (take 5 (iterate inc 0)))\n";
    assert_eq!(run(source, ""), "0,1,2,3,4");
}

// Universal invariants.

#[test]
fn const_does_not_force_its_second_argument() {
    let source = "const x y = x\nmain xs = const \"1\" (error \"boom\")\n";
    assert_eq!(run(source, ""), "1");
}

#[test]
fn short_circuit_boolean_operators() {
    let source = "boom = error \"x\"\nmain xs = if False && boom then \"t\" else \"f\"\n";
    assert_eq!(run(source, ""), "f");
    let source = "boom = error \"x\"\nmain xs = if True || boom then \"t\" else \"f\"\n";
    assert_eq!(run(source, ""), "t");
}

#[test]
fn lexical_capture_sees_the_binding_site() {
    let source = "main xs = showInt (let x = 1 in let f y = x in let x = 2 in f 0)\n";
    assert_eq!(run(source, ""), "1");
}

#[test]
fn recursive_knot_builds_a_cyclic_list() {
    let source = "main xs = concat (map showInt (let ones = 1 : ones in take 3 ones))\n";
    assert_eq!(run(source, ""), "111");
}

#[test]
fn concat_is_lazy_in_its_left_spine() {
    let source = "main xs = [head (\"abc\" ++ undefined)]\n";
    assert_eq!(run(source, ""), "a");
}

#[test]
fn forcing_a_cell_twice_returns_the_same_value() {
    let mut interpreter = Interpreter::new(Cursor::new(String::new()), Vec::new());
    // (\x -> x) 42, evaluated lazily so the cell starts as a thunk.
    let x = Identifier(0);
    let expr: ir::Expr = ExprKind::Apply {
        f: ExprKind::Lambda { parameter: x, body: ExprKind::Var(x).into() }.into(),
        x: ExprKind::Int(42).into(),
    }
    .into();
    let cell = interpreter.lazy_evaluate(&expr).expect("lazy");
    let first = interpreter.force(cell).expect("force");
    let second = interpreter.force(cell).expect("force");
    assert_eq!(first, second);
    assert!(matches!(interpreter.value(first), Value::Int(42)));
}

#[test]
fn read_cells_pull_input_once() {
    // Sharing the stream twice must not consume input twice.
    let source = "main xs = xs ++ xs\n";
    assert_eq!(run(source, "ab"), "abab");
}

#[test]
fn non_recursive_let_ir_node_evaluates() {
    let mut interpreter = Interpreter::new(Cursor::new(String::new()), Vec::new());
    let x = Identifier(0);
    let expr: ir::Expr = ExprKind::Let {
        binding: ir::Binding { name: x, value: ExprKind::Int(7).into() },
        body: ExprKind::Var(x).into(),
    }
    .into();
    let v = interpreter.evaluate(&expr).expect("evaluate");
    assert!(matches!(interpreter.value(v), Value::Int(7)));
}

#[test]
fn ill_founded_recursion_diverges() {
    let source = "main xs = let y = y in y\n";
    let e = run_err(source, "");
    assert_eq!(e.to_string(), "divergence");
}

#[test]
fn self_referential_forcing_is_divergence() {
    let mut interpreter = Interpreter::new(Cursor::new(String::new()), Vec::new());
    // letrec y = not y in y: forcing y re-enters its own cell.
    let y = Identifier(0);
    let expr: ir::Expr = ExprKind::LetRecursive {
        bindings: vec![ir::Binding {
            name: y,
            value: ExprKind::Apply {
                f: ExprKind::Builtin(Builtin::Not).into(),
                x: ExprKind::Var(y).into(),
            }
            .into(),
        }],
        body: ExprKind::Var(y).into(),
    }
    .into();
    assert!(matches!(interpreter.evaluate(&expr), Err(EvalError::Divergence)));
}

// Garbage collection.

#[test]
fn gc_stress_does_not_change_outcomes() {
    let cases: &[(&str, &str)] = &[
        ("main xs = xs\n", "hi\n"),
        ("main xs = concat (map (\\c -> [c, c]) xs)\n", "ab"),
        ("main xs = showInt (readInt xs + 1)\n", "41"),
        ("inc x = x + 1\nmain xs = intercalate \",\" (map showInt (take 4 (iterate inc 0)))\n", ""),
        ("main xs = showInt (length (replicate 50 'x'))\n", ""),
    ];
    for (source, input) in cases {
        let plain = run_with(source, input, false).expect("plain run");
        let stressed = run_with(source, input, true).expect("stressed run");
        assert_eq!(plain, stressed, "program {source:?}");
    }
}

#[test]
fn streaming_output_stays_bounded_by_collection() {
    // Emitting 2000 characters allocates far more nodes than the live set
    // ever holds; the footprint only stays small if sweeps reclaim the
    // consumed prefix of the stream.
    let source = "main xs = take 2000 (repeat 'x')\n";
    let program = compile(source);
    let mut output = Vec::new();
    let mut interpreter = Interpreter::new(Cursor::new(String::new()), &mut output);
    interpreter.run(&program).expect("run");
    assert!(interpreter.live_nodes() < 20_000);
    drop(interpreter);
    assert_eq!(output.len(), 2000);
    assert!(output.iter().all(|&b| b == b'x'));
}

// Builtins and runtime errors.

#[test]
fn arithmetic_and_bitwise_builtins() {
    assert_eq!(run("main xs = showInt (2 + 3 * 4 - 1)\n", ""), "13");
    assert_eq!(run("main xs = showInt (7 / 2)\n", ""), "3");
    assert_eq!(run("main xs = showInt (7 % 2)\n", ""), "1");
    assert_eq!(run("main xs = showInt (bitAnd 12 10)\n", ""), "8");
    assert_eq!(run("main xs = showInt (bitOr 12 10)\n", ""), "14");
    assert_eq!(run("main xs = showInt (shift 1 4)\n", ""), "16");
    assert_eq!(run("main xs = showInt (shift (-16) (-2))\n", ""), "-4");
}

#[test]
fn character_builtins() {
    assert_eq!(run("main xs = [chr 104, chr 105]\n", ""), "hi");
    assert_eq!(run("main xs = showInt (ord 'a')\n", ""), "97");
}

#[test]
fn character_ordering() {
    assert_eq!(run("main xs = if 'a' < 'b' then \"y\" else \"n\"\n", ""), "y");
}

#[test]
fn structural_equality_on_tuples_and_unions() {
    assert_eq!(run("main xs = if (1, 'a') == (1, 'a') then \"y\" else \"n\"\n", ""), "y");
    assert_eq!(run("main xs = if (1, 'a') == (2, 'a') then \"y\" else \"n\"\n", ""), "n");
    assert_eq!(run("main xs = if \"ab\" == \"ab\" then \"y\" else \"n\"\n", ""), "y");
    assert_eq!(run("main xs = if \"ab\" == \"ac\" then \"y\" else \"n\"\n", ""), "n");
    assert_eq!(run("main xs = if \"ab\" == \"abc\" then \"y\" else \"n\"\n", ""), "n");
    let source = "data Color = Red | Green\n\
                  main xs = if Red == Red && not (Red == Green) then \"y\" else \"n\"\n";
    assert_eq!(run(source, ""), "y");
}

#[test]
fn division_by_zero_is_fatal() {
    assert!(matches!(run_err("main xs = showInt (1 / 0)\n", ""), EvalError::DivisionByZero));
    assert!(matches!(run_err("main xs = showInt (1 % 0)\n", ""), EvalError::DivisionByZero));
}

#[test]
fn cross_type_comparisons_are_errors() {
    assert!(matches!(
        run_err("main xs = if 1 == 'a' then \"y\" else \"n\"\n", ""),
        EvalError::EqualMismatch(_, _)
    ));
    assert!(matches!(
        run_err("main xs = if 1 < 'a' then \"y\" else \"n\"\n", ""),
        EvalError::OrderMismatch(_, _)
    ));
    assert!(matches!(
        run_err("data Color = Red | Green\nmain xs = if Red == True then \"y\" else \"n\"\n", ""),
        EvalError::EqualMismatch(_, _)
    ));
}

#[test]
fn chr_out_of_range_is_fatal() {
    assert!(matches!(run_err("main xs = [chr 200]\n", ""), EvalError::ChrOutOfRange(200)));
}

#[test]
fn malformed_read_int_is_fatal() {
    assert!(matches!(run_err("main xs = showInt (readInt xs)\n", "oops"), EvalError::BadInt));
}

#[test]
fn explicit_error_aborts_with_its_message() {
    let e = run_err("main xs = error \"boom\"\n", "");
    assert_eq!(e.to_string(), "boom");
}

#[test]
fn non_exhaustive_case_names_the_scrutinee_type() {
    let source = "main xs = case 5 of\n  1 -> \"a\"\n";
    match run_err(source, "") {
        EvalError::NonExhaustiveCase { scrutinee, case } => {
            assert_eq!(scrutinee, "integer");
            assert!(case.contains("case"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn tuple_pattern_arity_mismatch_is_fatal() {
    let source = "main xs = case (1, 2, 3) of\n  (a, b) -> \"x\"\n";
    assert!(matches!(
        run_err(source, ""),
        EvalError::TuplePatternArity { pattern: 2, scrutinee: 3 }
    ));
}

#[test]
fn matching_a_different_data_type_is_fatal() {
    let source = "data Color = Red | Green\nmain xs = case True of\n  Red -> \"r\"\n";
    assert!(matches!(run_err(source, ""), EvalError::MatchType { .. }));
}

#[test]
fn output_must_be_a_character_list() {
    assert!(matches!(run_err("main xs = ord 'a'\n", ""), EvalError::BadOutput));
    assert!(matches!(run_err("main xs = [1]\n", ""), EvalError::BadOutput));
    // A main that is not a function fails when the driver applies it.
    assert!(matches!(run_err("main = 5\n", ""), EvalError::NotALambda));
}

#[test]
fn partial_output_survives_a_runtime_error() {
    let source = "main xs = \"ab\" ++ error \"late\"\n";
    let program = compile(source);
    let mut output = Vec::new();
    let mut interpreter = Interpreter::new(Cursor::new(String::new()), &mut output);
    let result = interpreter.run(&program);
    drop(interpreter);
    assert!(matches!(result, Err(EvalError::Raised(message)) if message == "late"));
    assert_eq!(String::from_utf8(output).expect("utf8"), "ab");
}

#[test]
fn tuple_destructuring_in_case() {
    let source = "main xs = case (1, 2) of\n  (a, b) -> showInt (a + b)\n";
    assert_eq!(run(source, ""), "3");
}

#[test]
fn patterns_match_in_declaration_order() {
    let source = "main xs = case 2 of\n  1 -> \"one\"\n  2 -> \"two\"\n  n -> \"many\"\n";
    assert_eq!(run(source, ""), "two");
    let source = "main xs = case 9 of\n  1 -> \"one\"\n  2 -> \"two\"\n  n -> \"many\"\n";
    assert_eq!(run(source, ""), "many");
}

#[test]
fn character_literal_patterns() {
    let source = "classify c = case c of\n  'a' -> \"vowel\"\n  c' -> \"other\"\n\
                  main xs = classify (head xs)\n";
    assert_eq!(run(source, "a"), "vowel");
    assert_eq!(run(source, "z"), "other");
}

#[test]
fn over_application_of_curried_results() {
    let source = "apply2 f x y = f x y\nadd a b = a + b\nmain xs = showInt (apply2 add 20 22)\n";
    assert_eq!(run(source, ""), "42");
}

#[test]
fn constructors_curry_like_functions() {
    // map (MkPair 1) partially applies the constructor.
    let source = "data Pair a b = MkPair a b\n\
                  second p = case p of\n  MkPair a b -> b\n\
                  main xs = showInt (sum (map second (map (MkPair 1) [10, 20])))\n";
    assert_eq!(run(source, ""), "30");
}

#[test]
fn composition_pipes_right_to_left() {
    let source = "inc x = x + 1\ndouble x = x * 2\nmain xs = showInt ((inc . double) 5)\n";
    assert_eq!(run(source, ""), "11");
}

#[test]
fn prelude_list_functions() {
    assert_eq!(run("main xs = unwords (words xs)\n", "  a  b \n c  "), "a b c");
    assert_eq!(run("main xs = unlines (lines xs)\n", "a\nb\n"), "a\nb\n");
    assert_eq!(run("main xs = showInt (sum [1, 2, 3])\n", ""), "6");
    assert_eq!(run("main xs = showInt (product [2, 3, 4])\n", ""), "24");
    assert_eq!(run("main xs = concat (reverse (lines xs))\n", "ab\ncd\n"), "cdab");
    assert_eq!(run("main xs = if elem 'b' xs then \"y\" else \"n\"\n", "abc"), "y");
    assert_eq!(run("main xs = filter (\\c -> not (c == 'x')) xs\n", "axbxc"), "abc");
    assert_eq!(run("main xs = showInt (foldr (\\a b -> a - b) 0 [10, 3, 2])\n", ""), "9");
    assert_eq!(run("main xs = showInt (foldl (\\a b -> a - b) 0 [10, 3, 2])\n", ""), "-15");
    assert_eq!(run("main xs = take 3 (drop 2 xs)\n", "abcdefg"), "cde");
    assert_eq!(run("main xs = map (\\p -> head p) (zipWith (\\a b -> [a, b]) xs \"xyz\")\n", "abc"), "abc");
}
