//! Integration tests for the TIR (Test IR) parser.
//!
//! These check the parsed structure through `TestIR::print` rather than
//! FileCheck, so a failure shows the whole printed module.

use cwrite::test_ir::{Operation, TestIR, ValueType};

/// Helper to check if output contains expected patterns
fn check_output_contains(output: &str, patterns: &[&str]) {
    for pattern in patterns {
        assert!(
            output.contains(pattern),
            "Output missing expected pattern: '{pattern}'\nFull output:\n{output}"
        );
    }
}

fn parse(src: &str) -> TestIR {
    TestIR::parse(src).unwrap_or_else(|e| panic!("Failed to parse: {e}"))
}

#[test]
fn test_diamond_tir() {
    let ir = parse(
        r#"
; diamond with a merge at the join
pick(%x) {
entry:
  %zero = const 0
  %c = gt %x, %zero
  condbr %c, ^then, ^else
then:
  %y1 = const 1
  br ^join
else:
  %y2 = const 2
  br ^join
join:
  %y = phi [^then, %y1], [^else, %y2]
  ret %y
}
"#,
    );
    let output = ir.print();

    check_output_contains(
        &output,
        &[
            "Function pick",
            "Argument x",
            "Block entry",
            "Succ then",
            "Succ else",
            "Value c (gt)",
            "Op ^then",
            "Block join",
            "PHI y",
            "y1 from then",
            "y2 from else",
            "Value (ret)",
        ],
    );

    assert_eq!(ir.functions.len(), 1);
    assert_eq!(ir.blocks.len(), 4);
    // x, zero, c, condbr, y1, br, y2, br, y, ret
    assert_eq!(ir.values.len(), 10);
    assert_eq!(ir.values[0].value_type, ValueType::Arg);
    assert_eq!(ir.values[8].value_type, ValueType::Phi);
}

#[test]
fn test_loop_and_virtual_phi_tir() {
    let ir = parse(
        r#"
count(%n) {
entry:
  br ^head
head:
  %i = phi [^entry, %n], [^body, %i]
  %m = vphi [^entry, %n], [^body, %m]
  loop %i, ^body, ^exit
body:
  vuse %m
  br ^head
exit:
  ret
}
"#,
    );
    let output = ir.print();

    check_output_contains(
        &output,
        &["PHI i", "VPHI m", "Value (loop)", "Value (vuse)", "Op m"],
    );
    let head = &ir.blocks[1];
    assert_eq!(head.phi_end_idx - head.inst_begin_idx, 2);
}

#[test]
fn test_switch_tir() {
    let ir = parse(
        r#"
sw(%v) {
entry:
  switch %v, [1, ^a], [-2, ^a], [default, ^b]
a:
  ret
b:
  ret
}
"#,
    );
    let output = ir.print();

    check_output_contains(
        &output,
        &["Value (switch)", "Op v", "Op ^a", "Op ^b", "Case 1", "Case -2", "Case default"],
    );
    let switch = &ir.values[1];
    assert_eq!(switch.op, Operation::Switch);
    assert_eq!(switch.case_labels, vec![Some(1), Some(-2), None]);
    assert_eq!(ir.block_operands(switch), &[1, 1, 2]);
}

#[test]
fn test_multiple_functions_tir() {
    let ir = parse(
        r#"
first() {
entry:
  ret
}

second(%a, %b) {
entry:
  %s = add %a, %b
  ret %s
}
"#,
    );

    assert_eq!(ir.functions.len(), 2);
    assert_eq!(ir.functions[0].name, "first");
    assert_eq!(ir.functions[1].name, "second");
    assert_eq!(ir.functions[1].arg_end_idx - ir.functions[1].arg_begin_idx, 2);
    // block names are per function
    assert_eq!(ir.blocks[0].name, "entry");
    assert_eq!(ir.blocks[1].name, "entry");
}

#[test]
fn test_duplicate_funcs_tir() {
    let err = TestIR::parse("f() {\nentry:\n  ret\n}\nf() {\nentry:\n  ret\n}\n").unwrap_err();
    assert!(err.message.contains("Duplicate function definition: 'f'"));
}

#[test]
fn test_parser_comments() {
    let ir = parse(
        r#"
; leading comment
f() {
; between the header and the block
entry:
  ret ; trailing comment
}
"#,
    );
    assert_eq!(ir.functions.len(), 1);
    assert_eq!(ir.values.len(), 1);
}

#[test]
fn test_parser_error_undefined_value() {
    let err = TestIR::parse("f() {\nentry:\n  ret %missing\n}\n").unwrap_err();
    assert!(err.message.contains("Undefined value reference: missing"));
}

#[test]
fn test_parser_error_undefined_block() {
    let err = TestIR::parse("f() {\nentry:\n  goto ^missing\n}\n").unwrap_err();
    assert!(err.message.contains("Undefined block reference: missing"));
}

#[test]
fn test_parser_error_invalid_phi_location() {
    let err = TestIR::parse(
        "f(%a) {\nentry:\n  br ^b\nb:\n  %x = const 1\n  %p = phi [^entry, %a]\n  ret\n}\n",
    )
    .unwrap_err();
    assert!(err.message.contains("PHI nodes must be at the beginning of a block"));
}

#[test]
fn test_parser_error_label_not_first() {
    let err = TestIR::parse("f() {\nentry:\n  %x = const 1\n  label late\n  ret\n}\n").unwrap_err();
    assert!(err.message.contains("must be its first statement"));
}
