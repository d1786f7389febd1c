//! Integration tests: end-to-end compile-and-run scenarios.

mod common;
use common::*;

use pretty_assertions::assert_eq;
use waveguide::{
    compile_and_run_str, Augmentation, Command, DataType, Interpreter, Program, Scope, Value,
};

// ==================== Arithmetic and declarations ====================

#[test]
fn test_int_addition_through_copy() {
    let source = "Int a = 3; Int b = 4; Int c; c = a + b;";
    assert_eq!(root_int(source, "c"), 7);
}

#[test]
fn test_float_widening_of_int_literal() {
    let source = "Float a = 2.0; Float b = a + 1;";
    assert_eq!(root_float(source, "b"), 3.0);
}

#[test]
fn test_joined_operator_run() {
    assert_eq!(root_int("Int a = 1 + 2 + 3 + 4;", "a"), 10);
    assert_eq!(root_int("Int a = 2 * 3 * 4;", "a"), 24);
}

#[test]
fn test_subtraction_folds_through_negation() {
    assert_eq!(root_int("Int a = 10 - 3 - 2;", "a"), 5);
    assert_eq!(root_int("Int a = 10 - 3 + 2;", "a"), 9);
}

#[test]
fn test_division_folds_through_reciprocal() {
    let source = "Float a = 12.0 / 4.0;";
    assert_eq!(root_float(source, "a"), 3.0);
}

#[test]
fn test_modulo() {
    assert_eq!(root_int("Int a = 17 % 5;", "a"), 2);
}

#[test]
fn test_unary_negation() {
    assert_eq!(root_int("Int a = 5; Int b = -a;", "b"), -5);
}

#[test]
fn test_operator_precedence_end_to_end() {
    assert_eq!(root_int("Int a = 2 + 3 * 4;", "a"), 14);
    assert_eq!(root_int("Int a = (2 + 3) * 4;", "a"), 20);
}

#[test]
fn test_bitwise_operators() {
    assert_eq!(root_int("Int a = 12 band 10;", "a"), 8);
    assert_eq!(root_int("Int a = 12 bor 10;", "a"), 14);
    assert_eq!(root_int("Int a = 12 bxor 10;", "a"), 6);
}

#[test]
fn test_boolean_operators() {
    assert_eq!(root_bytes("Bool a = true and false;", "a"), vec![0]);
    assert_eq!(root_bytes("Bool a = true or false;", "a"), vec![1]);
    assert_eq!(root_bytes("Bool a = true xor true;", "a"), vec![0]);
}

// ==================== Arrays ====================

#[test]
fn test_array_literal_materialization() {
    let source = "Int[3] xs = [1, 2, 3];";
    assert_eq!(root_bytes(source, "xs"), int_bytes(&[1, 2, 3]));
}

#[test]
fn test_array_literal_widens_elements() {
    let source = "Float[2] fs = [1, 2.5];";
    assert_eq!(root_bytes(source, "fs"), float_bytes(&[1.0, 2.5]));
}

#[test]
fn test_array_read_with_computed_index() {
    let source = "Int[3] xs = [10, 20, 30]; Int y = xs[1 + 1];";
    assert_eq!(root_int(source, "y"), 30);
}

#[test]
fn test_array_literal_round_trips_through_reads() {
    let source = "Int[3] xs = [7, 8, 9];\n\
                  Int a = xs[0]; Int b = xs[1]; Int c = xs[2];";
    assert_eq!(root_int(source, "a"), 7);
    assert_eq!(root_int(source, "b"), 8);
    assert_eq!(root_int(source, "c"), 9);
}

#[test]
fn test_indexed_assignment() {
    let source = "Int[3] xs = [1, 2, 3]; xs[1] = 42;";
    assert_eq!(root_bytes(source, "xs"), int_bytes(&[1, 42, 3]));
}

#[test]
fn test_nested_array_access() {
    // Two sizes wrap in source order: Int[2][2] is a 2-array of Int[2].
    let source = "Int[2][2] m = [[1, 2], [3, 4]];\n\
                  Int a = m[1][0];";
    assert_eq!(root_int(source, "a"), 3);
}

// ==================== Control flow ====================

#[test]
fn test_branch_true_path() {
    let source = "Int a = 5; if (a > 3) { a = 100; } else { a = 0; }";
    assert_eq!(root_int(source, "a"), 100);
}

#[test]
fn test_branch_false_path() {
    let source = "Int a = 5; if (a < 3) { a = 100; } else { a = 0; }";
    assert_eq!(root_int(source, "a"), 0);
}

#[test]
fn test_elif_chain() {
    let source = "Int a = 2; Int r = 0;\n\
                  if (a == 1) { r = 10; } elif (a == 2) { r = 20; } else { r = 30; }";
    assert_eq!(root_int(source, "r"), 20);
}

#[test]
fn test_for_each_over_declared_array() {
    let source = "def main():Int {\n\
                  Int[3] xs = [1, 2, 3];\n\
                  Int s = 0;\n\
                  for i in xs { s = s + i; }\n\
                  return s;\n\
                  }";
    assert_eq!(main_int(source), 6);
}

#[test]
fn test_for_each_over_known_range_uses_proxies() {
    // {1, 4} folds to a known [1, 2, 3]; iteration goes through element
    // views sharing the folded array's bytes.
    let source = "Int s = 0; for i in {1, 4} { s = s + i; }";
    assert_eq!(root_int(source, "s"), 6);
}

#[test]
fn test_for_each_over_scalar_and_array() {
    let source = "Int s = 0; for i in [5, 6], 7 { s = s + i; }";
    assert_eq!(root_int(source, "s"), 18);
}

// ==================== Functions ====================

#[test]
fn test_call_with_hoisted_declaration() {
    let source = "Int a = add_one(41); def add_one(Int x):(Int r) { r = x + 1; }";
    assert_eq!(root_int(source, "a"), 42);
}

#[test]
fn test_implicit_return_output() {
    let source = "def main():Int { return 2 + 3; }";
    assert_eq!(main_int(source), 5);
}

#[test]
fn test_return_stops_execution() {
    let source = "def main():Int { return 1; return 2; }";
    assert_eq!(main_int(source), 1);
}

#[test]
fn test_multiple_outputs_with_explicit_binding() {
    let source = "def pair():(Int a, Int b) { a = 1; b = 2; }\n\
                  Int x; Int y;\n\
                  pair():(x, y);";
    assert_eq!(root_int(source, "x"), 1);
    assert_eq!(root_int(source, "y"), 2);
}

#[test]
fn test_discarded_output_slot() {
    let source = "def pair():(Int a, Int b) { a = 1; b = 2; }\n\
                  Int y;\n\
                  pair():(none, y);";
    assert_eq!(root_int(source, "y"), 2);
}

#[test]
fn test_declaring_output_binding() {
    let source = "def pair():(Int a, Int b) { a = 1; b = 2; }\n\
                  pair():(Int p, Int q);";
    assert_eq!(root_int(source, "p"), 1);
    assert_eq!(root_int(source, "q"), 2);
}

#[test]
fn test_output_bound_to_indexed_lvalue() {
    let source = "def five():(Int r) { r = 5; }\n\
                  Int[3] xs = [1, 2, 3];\n\
                  five():(xs[1]);";
    assert_eq!(root_bytes(source, "xs"), int_bytes(&[1, 5, 3]));
}

#[test]
fn test_nested_function_calls() {
    let source = "def add_one(Int x):(Int r) { r = x + 1; }\n\
                  Int a = add_one(add_one(40));";
    assert_eq!(root_int(source, "a"), 42);
}

#[test]
fn test_lambda_list_functions_resolve_in_body() {
    // Bare-type outputs read a `[` as an array size, so a declaration
    // carrying a lambda list spells its outputs parenthesized.
    let source = "def main():(Int r) [double(Int x):(Int y) { y = x * 2; }] {\n\
                  r = double(21);\n\
                  }";
    assert_eq!(main_int(source), 42);
}

#[test]
fn test_function_reads_outer_variable() {
    let source = "Int base = 10;\n\
                  def bump():(Int r) { r = base + 1; }\n\
                  Int a = bump();";
    assert_eq!(root_int(source, "a"), 11);
}

// ==================== Logging ====================

#[test]
fn test_log_scalar() {
    assert_eq!(compile_and_run_str("log(42);").unwrap(), "42");
}

#[test]
fn test_log_array_formatting() {
    let out = compile_and_run_str("Int[3] xs = [1, 2, 3]; log(xs);").unwrap();
    assert_eq!(out, "[1, 2, 3]");
}

#[test]
fn test_log_order() {
    let out = compile_and_run_str("log(1); log(true); log(2.5);").unwrap();
    assert_eq!(out, "1\ntrue\n2.5");
}

// ==================== Augmentations driven directly ====================

/// Build `acc = 0; body { acc = acc + counter }` and a root command calling
/// `body` under the given augmentation.
fn augmented_accumulator(aug: impl FnOnce(&mut Program, waveguide::ValueId) -> Augmentation) -> i32 {
    let mut program = Program::new();
    let root = program.root();

    let acc = program.add_value(Value::known_int(0).with_label("acc"));
    program.scope_mut(root).declare_var("acc", acc);
    let counter = program.add_value(Value::new(DataType::Int).with_label("counter"));
    program.scope_mut(root).declare_temp_var(counter);

    let body = program.add_scope(Scope::new(Some(root)));
    program.scope_mut(root).declare_temp_func(body);
    let mut add = Command::new(program.builtins().add);
    add.add_input(acc);
    add.add_input(counter);
    add.add_output(Some(acc));
    program.scope_mut(body).add_command(add);

    let aug = aug(&mut program, counter);
    program
        .scope_mut(root)
        .add_command(Command::with_augmentation(body, aug));

    let mut interp = Interpreter::new(&program);
    interp.run().expect("interpretation failed");
    let acc = program.lookup_var(root, "acc").unwrap();
    interp.read_i32(acc).unwrap()
}

#[test]
fn test_loop_range_augmentation() {
    let total = augmented_accumulator(|program, counter| {
        let root = program.root();
        let start = program.add_value(Value::known_int(1));
        let end = program.add_value(Value::known_int(5));
        let step = program.add_value(Value::known_int(1));
        for v in [start, end, step] {
            program.scope_mut(root).declare_temp_var(v);
        }
        Augmentation::LoopRange {
            counter,
            start,
            end,
            step,
        }
    });
    assert_eq!(total, 1 + 2 + 3 + 4);
}

#[test]
fn test_loop_for_augmentation() {
    let total = augmented_accumulator(|program, counter| {
        let root = program.root();
        let iterable = program.add_value(Value::new_known(
            DataType::array(DataType::Int, 2),
            int_bytes(&[5, 6]),
        ));
        program.scope_mut(root).declare_temp_var(iterable);
        Augmentation::LoopFor { counter, iterable }
    });
    assert_eq!(total, 11);
}

// ==================== Proxy arrays at runtime ====================

#[test]
fn test_array_proxy_reads_repeat_the_element() {
    let mut program = Program::new();
    let root = program.root();
    let element = program.add_value(Value::known_int(9));
    program.scope_mut(root).declare_temp_var(element);
    let proxy = program.add_value(Value::new_proxy(
        DataType::array_proxy(DataType::Int, 3),
        element,
    ));
    program.scope_mut(root).declare_temp_var(proxy);

    let interp = Interpreter::new(&program);
    assert_eq!(interp.read_bytes(proxy).unwrap(), int_bytes(&[9, 9, 9]));
}
