//! Structured emission of whole functions.
//!
//! Every test parses a small TIR function, analyzes it and compares the
//! emitted body with the exact expected text.

use bumpalo::Bump;
use cwrite::core::{Analyzer, EmissionSession, EmitError, EmitResult};
use cwrite::test_ir::{TestIR, TestIRAdaptor, TirDeclarationPrinter, TirRenderer};
use cwrite::writer::{FunctionWriter, WriterConfig};

/// Emit the first function of `src` with a fresh session, returning the
/// declarations and the body.
fn emit(src: &str) -> EmitResult<(String, String)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let ir = TestIR::parse(src).unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let analyzer = Analyzer::for_function(&adaptor);
    let body = cwrite::emit_function_body(&adaptor, &analyzer, &TirRenderer)?;
    let decls = body.declarations(&adaptor, &TirDeclarationPrinter)?;
    Ok((decls, body.text))
}

fn emit_body(src: &str) -> String {
    emit(src).unwrap().1
}

const DIAMOND: &str = r#"
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
"#;

const IRREDUCIBLE: &str = r#"
tangle(%c, %d) {
entry:
  condbr %c, ^a, ^b
a:
  %x = const 1
  condbr %d, ^b, ^exit
b:
  %y = const 2
  condbr %d, ^a, ^exit
exit:
  ret
}
"#;

const SWITCH: &str = r#"
sw(%v) {
entry:
  switch %v, [1, ^a], [2, ^b], [3, ^a], [default, ^join]
a:
  %x = const 1
  br ^join
b:
  %y = const 2
  br ^join
join:
  ret
}
"#;

const MULTIWAY: &str = r#"
mw(%p, %q) {
entry:
  multiif [%p, ^a], [%q, ^b], [^join]
a:
  %x = const 1
  br ^join
b:
  %y = const 2
  br ^join
join:
  ret
}
"#;

#[test]
fn test_diamond() {
    let (decls, text) = emit(DIAMOND).unwrap();
    assert_eq!(decls, "");
    assert_eq!(
        text,
        "zero = 0;\n\
         c = x > zero;\n\
         if (c)\n\
         {\n\
         \x20  y1 = 1;\n\
         \x20  y = y1;\n\
         }\n\
         else\n\
         {\n\
         \x20  y2 = 2;\n\
         \x20  y = y2;\n\
         }\n\
         return y;\n"
    );
}

#[test]
fn test_structured_loop() {
    let text = emit_body(
        r#"
count(%n) {
entry:
  %zero = const 0
  br ^head
head:
  %i = phi [^entry, %zero], [^body, %next]
  %c = lt %i, %n
  loop %c, ^body, ^exit
body:
  %one = const 1
  %next = add %i, %one
  br ^head
exit:
  ret %i
}
"#,
    );
    assert_eq!(
        text,
        "zero = 0;\n\
         i = zero;\n\
         c = i < n;\n\
         while (c)\n\
         {\n\
         \x20  one = 1;\n\
         \x20  next = i + one;\n\
         \x20  i = next;\n\
         \x20  c = i < n;\n\
         }\n\
         return i;\n"
    );
}

#[test]
fn test_self_loop_saves_phi_read_after_loop() {
    let (decls, text) = emit(
        r#"
lost(%n) {
entry:
  %zero = const 0
  br ^head
head:
  %i = phi [^entry, %zero], [^head, %next]
  %one = const 1
  %next = add %i, %one
  %c = lt %next, %n
  condbr %c, ^head, ^exit
exit:
  ret %i
}
"#,
    )
    .unwrap();
    assert_eq!(decls, "int __t__0_0;\n");
    assert_eq!(
        text,
        "zero = 0;\n\
         i = zero;\n\
         BB_LABEL_1:;\n\
         __t__0_0 = i;\n\
         one = 1;\n\
         next = __t__0_0 + one;\n\
         c = next < n;\n\
         i = next;\n\
         if (c)\n\
         \x20  goto BB_LABEL_1;\n\
         return __t__0_0;\n"
    );
}

#[test]
fn test_irreducible_graph_uses_gotos() {
    let text = emit_body(IRREDUCIBLE);
    assert_eq!(
        text,
        "if (c)\n\
         {\n\
         \x20  BB_LABEL_1:;\n\
         \x20  x = 1;\n\
         \x20  if (d)\n\
         \x20  {\n\
         \x20     BB_LABEL_2:;\n\
         \x20     y = 2;\n\
         \x20     if (d)\n\
         \x20        goto BB_LABEL_1;\n\
         \x20  }\n\
         }\n\
         else\n\
         \x20  goto BB_LABEL_2;\n\
         return;\n"
    );
}

#[test]
fn test_switch() {
    let text = emit_body(SWITCH);
    assert_eq!(
        text,
        "switch (v)\n\
         {\n\
         \x20  case 1:\n\
         \x20  case 3:\n\
         \x20  {\n\
         \x20     x = 1;\n\
         \x20  }\n\
         \x20  break;\n\
         \x20  case 2:\n\
         \x20  {\n\
         \x20     y = 2;\n\
         \x20  }\n\
         \x20  break;\n\
         \x20  default:\n\
         \x20  break;\n\
         }\n\
         return;\n"
    );
}

#[test]
fn test_multiway() {
    let text = emit_body(MULTIWAY);
    assert_eq!(
        text,
        "if (p)\n\
         {\n\
         \x20  x = 1;\n\
         }\n\
         else if (q)\n\
         {\n\
         \x20  y = 2;\n\
         }\n\
         return;\n"
    );
}

#[test]
fn test_source_label_is_kept() {
    let text = emit_body(
        r#"
spin(%c) {
entry:
  br ^top
top:
  label again
  %t = any %c
  condbr %t, ^top, ^out
out:
  ret
}
"#,
    );
    assert_eq!(
        text,
        "again:;\n\
         t = any(c);\n\
         if (t)\n\
         \x20  goto again;\n\
         return;\n"
    );
}

#[test]
fn test_fresh_sessions_are_identical() {
    assert_eq!(emit_body(IRREDUCIBLE), emit_body(IRREDUCIBLE));
    assert_eq!(emit_body(DIAMOND), emit_body(DIAMOND));
}

#[test]
fn test_second_pass_suffixes_labels() {
    let ir = TestIR::parse(IRREDUCIBLE).unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let analyzer = Analyzer::for_function(&adaptor);

    let arena = Bump::new();
    let session = EmissionSession::new(&arena);
    let writer = FunctionWriter::new(&session);
    let first = writer
        .emit_function_body(&adaptor, &analyzer, &TirRenderer)
        .unwrap();
    let second = writer
        .emit_function_body(&adaptor, &analyzer, &TirRenderer)
        .unwrap();

    assert!(first.text.contains("BB_LABEL_1:;"));
    assert!(second.text.contains("BB_LABEL_1_2:;"));
    assert!(second.text.contains("goto BB_LABEL_2_2;"));
    assert_eq!(
        second.text.replace("_2:", ":").replace("_2;", ";"),
        first.text
    );
    assert_eq!(session.passes_of("tangle"), 2);
}

#[test]
fn test_verbose_block_comments() {
    let ir = TestIR::parse(DIAMOND).unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let analyzer = Analyzer::for_function(&adaptor);
    let arena = Bump::new();
    let session = EmissionSession::new(&arena);
    let config = WriterConfig {
        verbose: true,
        indent_width: 2,
    };
    let body = FunctionWriter::with_config(&session, config)
        .emit_function_body(&adaptor, &analyzer, &TirRenderer)
        .unwrap();

    assert!(body.text.starts_with("//Basic block 0\nzero = 0;\n"));
    assert!(body.text.contains("//Basic block 1\n{\n  y1 = 1;\n"));
    assert!(body.text.contains("//Basic block 3\nreturn y;\n"));
}

#[test]
fn test_jump_back_to_while_header() {
    let text = emit_body(
        r#"
f(%n) {
entry:
  br ^head
head:
  %c = any %n
  loop %c, ^body, ^exit
body:
  goto ^head
exit:
  ret
}
"#,
    );
    assert_eq!(
        text,
        "BB_LABEL_1:;\n\
         c = any(n);\n\
         while (c)\n\
         {\n\
         \x20  goto BB_LABEL_1;\n\
         }\n\
         return;\n"
    );
}

#[test]
fn test_explicit_goto_targets_get_labels() {
    let text = emit_body(
        r#"
jump(%c) {
entry:
  %t = any %c
  goto ^far
near:
  ret
far:
  ret %t
}
"#,
    );
    assert_eq!(
        text,
        "t = any(c);\n\
         goto BB_LABEL_2;\n\
         BB_LABEL_2:;\n\
         return t;\n"
    );
}

#[test]
fn test_inline_assembly_is_not_supported() {
    let err = emit("f() {\nentry:\n  asm\n  ret\n}\n").unwrap_err();
    assert!(matches!(err, EmitError::NotYetSupported { .. }));
}

#[test]
fn test_phi_from_unknown_predecessor() {
    let err = emit(
        r#"
f(%a, %b) {
entry:
  br ^join
other:
  br ^exit
join:
  %y = phi [^entry, %a], [^other, %b]
  ret %y
exit:
  ret
}
"#,
    )
    .unwrap_err();
    assert!(matches!(err, EmitError::UnknownPhiPredecessor { .. }));
}

#[test]
fn test_nested_loops_reevaluate_their_tests() {
    let text = emit_body(
        r#"
nest(%n) {
entry:
  %zero = const 0
  br ^h1
h1:
  %i = phi [^entry, %zero], [^latch, %inext]
  %c1 = lt %i, %n
  loop %c1, ^h2, ^exit
h2:
  %j = phi [^h1, %zero], [^b2, %jnext]
  %c2 = lt %j, %n
  loop %c2, ^b2, ^latch
b2:
  %one = const 1
  %jnext = add %j, %one
  br ^h2
latch:
  %one2 = const 1
  %inext = add %i, %one2
  br ^h1
exit:
  ret %i
}
"#,
    );
    // header statements and the copies on the edge into the inner loop run
    // again at the end of every iteration
    assert_eq!(
        text,
        "zero = 0;\n\
         i = zero;\n\
         c1 = i < n;\n\
         j = zero;\n\
         while (c1)\n\
         {\n\
         \x20  c2 = j < n;\n\
         \x20  while (c2)\n\
         \x20  {\n\
         \x20     one = 1;\n\
         \x20     jnext = j + one;\n\
         \x20     j = jnext;\n\
         \x20     c2 = j < n;\n\
         \x20  }\n\
         \x20  one2 = 1;\n\
         \x20  inext = i + one2;\n\
         \x20  i = inext;\n\
         \x20  c1 = i < n;\n\
         \x20  j = zero;\n\
         }\n\
         return i;\n"
    );
}

#[test]
fn test_switch_arm_leaving_a_loop_jumps() {
    let text = emit_body(
        r#"
f(%n, %v) {
entry:
  br ^h
h:
  loop %n, ^body, ^exit
body:
  switch %v, [1, ^a], [2, ^exit], [default, ^latch]
a:
  %x = const 1
  br ^latch
latch:
  br ^h
exit:
  ret
}
"#,
    );
    assert_eq!(
        text,
        "while (n)\n\
         {\n\
         \x20  switch (v)\n\
         \x20  {\n\
         \x20     case 1:\n\
         \x20     {\n\
         \x20        x = 1;\n\
         \x20        BB_LABEL_4:;\n\
         \x20     }\n\
         \x20     break;\n\
         \x20     case 2:\n\
         \x20     goto BB_LABEL_5;\n\
         \x20     default:\n\
         \x20     goto BB_LABEL_4;\n\
         \x20  }\n\
         }\n\
         BB_LABEL_5:;\n\
         return;\n"
    );
}

#[test]
fn test_branch_leaving_a_loop_jumps() {
    let text = emit_body(
        r#"
f(%n, %d) {
entry:
  br ^h
h:
  loop %n, ^body, ^exit
body:
  condbr %d, ^exit, ^latch
latch:
  %x = const 1
  br ^h
exit:
  ret
}
"#,
    );
    assert_eq!(
        text,
        "while (n)\n\
         {\n\
         \x20  if (d)\n\
         \x20     goto BB_LABEL_4;\n\
         \x20  else\n\
         \x20  {\n\
         \x20     x = 1;\n\
         \x20  }\n\
         }\n\
         BB_LABEL_4:;\n\
         return;\n"
    );
}

#[test]
fn test_every_reachable_block_is_rendered_once() {
    for src in [IRREDUCIBLE, SWITCH, MULTIWAY, DIAMOND] {
        let ir = TestIR::parse(src).unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        let analyzer = Analyzer::for_function(&adaptor);
        let arena = Bump::new();
        let session = EmissionSession::new(&arena);
        let body = FunctionWriter::new(&session)
            .emit_function_body(&adaptor, &analyzer, &TirRenderer)
            .unwrap();

        assert_eq!(session.stats().blocks_emitted, analyzer.order().len());
        // a block rendered twice would repeat its statements
        for line in body.text.lines().filter(|line| line.trim().ends_with(" = 1;")) {
            assert_eq!(body.text.matches(line.trim()).count(), 1, "{}", body.text);
        }
    }
}
