//! Phi elimination: the sequential copies must behave like the parallel
//! assignment the phis stand for.

use bumpalo::Bump;
use cwrite::core::{Analyzer, EmissionSession, IrAdaptor};
use cwrite::test_ir::{TestIR, TestIRAdaptor};
use cwrite::writer::PhiEliminator;
use std::collections::HashMap;

/// Run `dest = src;` lines in order.
fn run_copies(text: &str, env: &mut HashMap<String, i64>) {
    for line in text.lines() {
        let line = line.trim().trim_end_matches(';');
        let (dest, src) = line.split_once(" = ").expect("copy statement");
        let value = *env
            .get(src)
            .unwrap_or_else(|| panic!("{} read before it was written", src));
        env.insert(dest.to_string(), value);
    }
}

fn initial(vars: &[(&str, i64)]) -> HashMap<String, i64> {
    vars.iter().map(|(name, v)| (name.to_string(), *v)).collect()
}

/// Back edge of `head` carrying the phis of `body`.
fn loop_with_phis(phis: &str) -> String {
    format!(
        r#"
rot(%a, %b, %c, %d, %n) {{
entry:
  br ^head
head:
{}
  %t = any %n
  condbr %t, ^head, ^exit
exit:
  ret
}}
"#,
        phis
    )
}

fn back_edge_copies(src: &str) -> (String, Vec<String>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let ir = TestIR::parse(src).unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let analyzer = Analyzer::for_function(&adaptor);
    let arena = Bump::new();
    let session = EmissionSession::new(&arena);
    let copies = PhiEliminator::new(&adaptor, &analyzer, &session).run().unwrap();

    let head = adaptor.block_by_name("head").unwrap();
    let tail = copies.tail(head).unwrap_or("").to_string();
    let temps = copies
        .temporaries()
        .iter()
        .map(|temp| temp.name.clone())
        .collect();
    (tail, temps)
}

#[test]
fn test_swap() {
    let (tail, temps) = back_edge_copies(&loop_with_phis(
        "  %x = phi [^entry, %a], [^head, %y]\n  %y = phi [^entry, %b], [^head, %x]",
    ));
    assert_eq!(tail, "__t__0_0 = x;\nx = y;\ny = __t__0_0;\n");
    assert_eq!(temps, vec!["__t__0_0".to_string()]);

    for (x, y) in [(1, 2), (0, -5), (7, 7), (i64::MAX, i64::MIN)] {
        let mut env = initial(&[("x", x), ("y", y)]);
        run_copies(&tail, &mut env);
        assert_eq!((env["x"], env["y"]), (y, x));
    }
}

#[test]
fn test_rotation_with_fan_out() {
    let (tail, temps) = back_edge_copies(&loop_with_phis(
        "  %x = phi [^entry, %a], [^head, %y]\n\
         \x20 %y = phi [^entry, %b], [^head, %z]\n\
         \x20 %z = phi [^entry, %c], [^head, %x]\n\
         \x20 %w = phi [^entry, %d], [^head, %x]",
    ));
    // the copy into w frees x, so no temporary is needed
    assert!(temps.is_empty());

    let mut env = initial(&[("x", 1), ("y", 2), ("z", 3), ("w", 4)]);
    run_copies(&tail, &mut env);
    assert_eq!(env["x"], 2);
    assert_eq!(env["y"], 3);
    assert_eq!(env["z"], 1);
    assert_eq!(env["w"], 1);
}

#[test]
fn test_three_cycle() {
    let (tail, temps) = back_edge_copies(&loop_with_phis(
        "  %x = phi [^entry, %a], [^head, %y]\n\
         \x20 %y = phi [^entry, %b], [^head, %z]\n\
         \x20 %z = phi [^entry, %c], [^head, %x]",
    ));
    assert_eq!(temps.len(), 1);

    let mut env = initial(&[("x", 1), ("y", 2), ("z", 3)]);
    run_copies(&tail, &mut env);
    assert_eq!(env["x"], 2);
    assert_eq!(env["y"], 3);
    assert_eq!(env["z"], 1);
}

#[test]
fn test_entry_edge_copies_in_phi_order() {
    let ir = TestIR::parse(&loop_with_phis(
        "  %x = phi [^entry, %a], [^head, %y]\n  %y = phi [^entry, %b], [^head, %x]",
    ))
    .unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let analyzer = Analyzer::for_function(&adaptor);
    let arena = Bump::new();
    let session = EmissionSession::new(&arena);
    let copies = PhiEliminator::new(&adaptor, &analyzer, &session).run().unwrap();

    assert_eq!(copies.tail(adaptor.entry_block()), Some("x = a;\ny = b;\n"));
    assert_eq!(session.stats().phi_copies, 5);
}

#[test]
fn test_virtual_phis_are_skipped() {
    let (tail, temps) = back_edge_copies(&loop_with_phis(
        "  %x = phi [^entry, %a], [^head, %x]\n  %m = vphi [^entry, %b], [^head, %m]",
    ));
    // x = x is dropped, m carries no value
    assert_eq!(tail, "");
    assert!(temps.is_empty());
}

#[test]
fn test_temporary_names_avoid_function_identifiers() {
    let (tail, temps) = back_edge_copies(
        r#"
clash(%a, %b, %__t__0_0) {
entry:
  br ^head
head:
  %x = phi [^entry, %a], [^head, %y]
  %y = phi [^entry, %b], [^head, %x]
  %t = any %__t__0_0
  condbr %t, ^head, ^exit
exit:
  ret
}
"#,
    );
    assert_eq!(temps, vec!["__t__0_1".to_string()]);
    assert!(tail.starts_with("__t__0_1 = x;\n"));
}

#[test]
fn test_lost_copy_renames_reads_in_dominated_blocks() {
    let ir = TestIR::parse(
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
    let adaptor = TestIRAdaptor::new(&ir);
    let analyzer = Analyzer::for_function(&adaptor);
    let arena = Bump::new();
    let session = EmissionSession::new(&arena);
    let copies = PhiEliminator::new(&adaptor, &analyzer, &session).run().unwrap();

    let head = adaptor.block_by_name("head").unwrap();
    let exit = adaptor.block_by_name("exit").unwrap();
    let i = adaptor.value_by_name("i").unwrap();

    assert_eq!(copies.prefix(head), Some("__t__0_0 = i;\n"));
    assert_eq!(copies.tail(head), Some("i = next;\n"));
    assert_eq!(copies.renaming(head).and_then(|r| r.get(&i)).copied(), Some("__t__0_0"));
    assert_eq!(copies.renaming(exit).and_then(|r| r.get(&i)).copied(), Some("__t__0_0"));
    assert_eq!(copies.temporaries()[0].like, i);
}
