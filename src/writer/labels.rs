// This module implements the label policy. The pre-pass (LabelTable::assign) decides
// which blocks could ever be the target of a goto and gives each one its text before
// any output is produced: blocks with more than one entering edge (the entry block
// counts the implicit edge from the function entry), targets of explicit jump
// statements, and blocks reached by more than one arm of the same branch. The text is
// the block's source label when it has one, otherwise BB_LABEL_<number>, with the
// emission pass appended from the second pass on so repeated emissions of one function
// never reuse label names. needs_label is the per-visit decision taken by the
// structured emitter, a pure function of the block, its predecessors and the current
// traversal state.

//! Label pre-pass and the per-block label decision.

use crate::core::{BlockId, DominanceOracle, EmitError, EmitResult, IrAdaptor, StmtKind};
use crate::writer::state::EmissionState;
use hashbrown::{HashMap, HashSet};

/// Block to label text, fixed before emission starts.
#[derive(Debug, Default)]
pub struct LabelTable {
    labels: HashMap<BlockId, String>,
    /// Targets of explicit jump statements.
    jump_targets: HashSet<BlockId>,
}

impl LabelTable {
    /// Assign labels for emission pass `pass` of the adaptor's current function.
    pub fn assign<A: IrAdaptor>(ir: &A, pass: u32) -> EmitResult<Self> {
        let mut labels = HashMap::new();
        let mut jump_targets = HashSet::new();
        for block in ir.blocks() {
            let stmts = ir.classified_stmts(block)?;
            let mut wanted = ir.in_degree(block) > 1;
            for (_, kind) in &stmts {
                let targets = kind.branch_targets();
                if let StmtKind::Goto { .. } = kind {
                    for target in &targets {
                        jump_targets.insert(*target);
                        labels.entry(*target).or_insert_with(|| label_text(ir, *target, pass));
                    }
                }
                for (i, target) in targets.iter().enumerate() {
                    if targets[..i].contains(target) {
                        labels.entry(*target).or_insert_with(|| label_text(ir, *target, pass));
                    }
                }
            }
            if ir.block_label(block).is_some() {
                wanted = true;
            }
            if wanted {
                labels.entry(block).or_insert_with(|| label_text(ir, block, pass));
            }
        }
        log::trace!("labels for {}: {}", ir.func_name(), labels.len());
        Ok(Self {
            labels,
            jump_targets,
        })
    }

    pub fn label(&self, block: BlockId) -> EmitResult<&str> {
        self.labels
            .get(&block)
            .map(String::as_str)
            .ok_or(EmitError::MissingLabel { block })
    }

    pub fn contains(&self, block: BlockId) -> bool {
        self.labels.contains_key(&block)
    }

    /// Whether an explicit jump statement names `block`.
    pub fn is_jump_target(&self, block: BlockId) -> bool {
        self.jump_targets.contains(&block)
    }
}

fn label_text<A: IrAdaptor>(ir: &A, block: BlockId, pass: u32) -> String {
    if let Some(name) = ir.block_label(block) {
        return name.to_string();
    }
    let mut text = format!("BB_LABEL_{}", ir.block_number(block));
    if pass > 1 {
        text.push_str(&format!("_{}", pass));
    }
    text
}

/// Whether `block` must print a synthetic label when it is rendered now.
///
/// `loop_test` tells whether the block's last statement is a loop test.
pub fn needs_label<A: IrAdaptor, O: DominanceOracle>(
    ir: &A,
    oracle: &O,
    labels: &LabelTable,
    state: &EmissionState,
    block: BlockId,
    loop_test: bool,
) -> EmitResult<bool> {
    if ir.block_label(block).is_some() {
        return Ok(false);
    }
    // a jump statement may be rendered after its target
    if labels.is_jump_target(block) {
        return Ok(true);
    }
    if state.goto_targets.contains(&block) || state.is_hinted(block) {
        return Ok(true);
    }
    if ir.in_degree(block) <= 1 {
        return Ok(false);
    }
    for pred in ir.block_preds(block) {
        // first case of a switch reached from a case without break
        if ends_with_switch(ir, pred)? && oracle.immediate_post_dominator(pred) != Some(block) {
            return Ok(true);
        }
        let pred_pending = !state.analyzed.contains(&pred);
        // body of a short circuit
        if pred_pending && !oracle.is_feedback_edge(pred, block) {
            return Ok(true);
        }
        // loop header that is not a structured loop test
        if (pred_pending || pred == block) && !loop_test {
            return Ok(true);
        }
    }
    Ok(false)
}

fn ends_with_switch<A: IrAdaptor>(ir: &A, block: BlockId) -> EmitResult<bool> {
    Ok(matches!(last_real_kind(ir, block)?, Some(StmtKind::Switch { .. })))
}

/// Whether the last real statement of `block` is a loop test.
pub fn is_loop_test<A: IrAdaptor>(ir: &A, block: BlockId) -> EmitResult<bool> {
    Ok(matches!(last_real_kind(ir, block)?, Some(StmtKind::Loop { .. })))
}

fn last_real_kind<A: IrAdaptor>(ir: &A, block: BlockId) -> EmitResult<Option<StmtKind>> {
    let stmts: Vec<_> = ir.block_stmts(block).collect();
    for stmt in stmts.into_iter().rev() {
        let kind = ir.stmt_kind(stmt)?;
        if kind.is_real() {
            return Ok(Some(kind));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Analyzer;
    use crate::test_ir::{TestIR, TestIRAdaptor};

    const TANGLE: &str = r#"
tangle(%c, %d) {
entry:
  condbr %c, ^a, ^b
a:
  condbr %d, ^b, ^exit
b:
  condbr %d, ^a, ^exit
exit:
  ret
}
"#;

    #[test]
    fn test_assign_merges_and_repeated_targets() {
        let ir = TestIR::parse(TANGLE).unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        let table = LabelTable::assign(&adaptor, 1).unwrap();

        assert!(!table.contains(BlockId(0)));
        assert_eq!(table.label(BlockId(1)).unwrap(), "BB_LABEL_1");
        assert_eq!(table.label(BlockId(2)).unwrap(), "BB_LABEL_2");
        assert_eq!(table.label(BlockId(3)).unwrap(), "BB_LABEL_3");
        assert!(!table.is_jump_target(BlockId(1)));
        assert_eq!(
            table.label(BlockId(0)),
            Err(EmitError::MissingLabel { block: BlockId(0) })
        );
    }

    #[test]
    fn test_later_passes_get_a_suffix() {
        let ir = TestIR::parse(TANGLE).unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        let table = LabelTable::assign(&adaptor, 3).unwrap();
        assert_eq!(table.label(BlockId(1)).unwrap(), "BB_LABEL_1_3");
    }

    #[test]
    fn test_source_label_and_duplicate_arm() {
        let ir = TestIR::parse(
            r#"
f(%c) {
entry:
  condbr %c, ^a, ^a
a:
  label done
  ret
}
"#,
        )
        .unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        let table = LabelTable::assign(&adaptor, 2).unwrap();
        assert_eq!(table.label(BlockId(1)).unwrap(), "done");
        assert!(!table.contains(BlockId(0)));
    }

    #[test]
    fn test_needs_label_follows_traversal_state() {
        let ir = TestIR::parse(
            r#"
pick(%c) {
entry:
  condbr %c, ^then, ^else
then:
  br ^join
else:
  br ^join
join:
  ret
}
"#,
        )
        .unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        let analyzer = Analyzer::for_function(&adaptor);
        let table = LabelTable::assign(&adaptor, 1).unwrap();
        let join = BlockId(3);

        let mut state = EmissionState::new();
        // predecessors still to be rendered reach the join by a jump
        assert!(needs_label(&adaptor, &analyzer, &table, &state, join, false).unwrap());

        state.analyzed.extend([BlockId(0), BlockId(1), BlockId(2)]);
        assert!(!needs_label(&adaptor, &analyzer, &table, &state, join, false).unwrap());

        state.goto_targets.insert(join);
        assert!(needs_label(&adaptor, &analyzer, &table, &state, join, false).unwrap());

        // a single entering edge never needs a label
        let state = EmissionState::new();
        assert!(!needs_label(&adaptor, &analyzer, &table, &state, BlockId(1), false).unwrap());
    }

    #[test]
    fn test_loop_test_recognizes_last_real_statement() {
        let ir = TestIR::parse(
            r#"
f(%n) {
entry:
  br ^head
head:
  %c = any %n
  loop %c, ^body, ^exit
body:
  vuse %n
  br ^head
exit:
  ret
}
"#,
        )
        .unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        assert!(is_loop_test(&adaptor, BlockId(1)).unwrap());
        assert!(!is_loop_test(&adaptor, BlockId(2)).unwrap());
        assert!(!is_loop_test(&adaptor, BlockId(0)).unwrap());
    }

    #[test]
    fn test_jump_target_loop_header_is_labeled() {
        let ir = TestIR::parse(
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
        )
        .unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        let analyzer = Analyzer::for_function(&adaptor);
        let table = LabelTable::assign(&adaptor, 1).unwrap();
        let head = BlockId(1);

        assert!(table.is_jump_target(head));
        assert!(!table.is_jump_target(BlockId(3)));

        let mut state = EmissionState::new();
        state.analyzed.insert(BlockId(0));
        assert!(needs_label(&adaptor, &analyzer, &table, &state, head, true).unwrap());
    }
}
