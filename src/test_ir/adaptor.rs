//! TestIR adaptor implementation for the structured writer.
//!
//! This adaptor exposes one function of a [`TestIR`] module at a time, so the
//! analyzer and the writer can be exercised with simple test cases.
//! Block handles are local to the selected function (the entry block is
//! `BlockId(0)`), value and statement handles are global value indices.

use super::{Operation, TestIR, ValueType};
use crate::core::{BlockId, CaseLabel, EmitError, EmitResult, IrAdaptor, StmtId, StmtKind, SwitchArm, VarId};
use hashbrown::HashSet;

/// Adaptor that implements IrAdaptor for TestIR
pub struct TestIRAdaptor<'ir> {
    ir: &'ir TestIR,
    cur_func: u32,
    /// Predecessors of every block of the current function, without duplicates.
    preds: Vec<Vec<BlockId>>,
    /// Value and block names of the current function.
    identifiers: HashSet<&'ir str>,
}

impl<'ir> TestIRAdaptor<'ir> {
    pub fn new(ir: &'ir TestIR) -> Self {
        let mut adaptor = Self {
            ir,
            cur_func: 0,
            preds: Vec::new(),
            identifiers: HashSet::new(),
        };
        if !ir.functions.is_empty() {
            adaptor.switch_func(0);
        }
        adaptor
    }

    /// Get the current function index
    pub fn cur_func(&self) -> u32 {
        self.cur_func
    }

    pub fn func_count(&self) -> u32 {
        self.ir.functions.len() as u32
    }

    /// Select function `func` and recompute its predecessor lists.
    pub fn switch_func(&mut self, func: u32) {
        self.cur_func = func;
        let info = &self.ir.functions[func as usize];
        let block_count = (info.block_end_idx - info.block_begin_idx) as usize;

        self.preds = vec![Vec::new(); block_count];
        for local in 0..block_count {
            let block = BlockId(local as u32);
            let succs: Vec<BlockId> = self.block_succs(block).collect();
            for succ in succs {
                if !self.preds[succ.index()].contains(&block) {
                    self.preds[succ.index()].push(block);
                }
            }
        }

        self.identifiers.clear();
        for idx in info.arg_begin_idx..self.func_value_end() {
            let name = self.ir.values[idx as usize].name.as_str();
            if !name.is_empty() {
                self.identifiers.insert(name);
            }
        }
        for idx in info.block_begin_idx..info.block_end_idx {
            self.identifiers.insert(self.ir.blocks[idx as usize].name.as_str());
        }
        log::trace!("switched to {} ({} blocks)", info.name, block_count);
    }

    fn func_value_end(&self) -> u32 {
        let info = &self.ir.functions[self.cur_func as usize];
        self.ir.blocks[(info.block_end_idx - 1) as usize].inst_end_idx
    }

    /// Get the name of a block
    pub fn block_name(&self, block: BlockId) -> &str {
        &self.ir.blocks[self.global_block(block)].name
    }

    /// Find a block of the current function by name.
    pub fn block_by_name(&self, name: &str) -> Option<BlockId> {
        let info = &self.ir.functions[self.cur_func as usize];
        (info.block_begin_idx..info.block_end_idx)
            .find(|&idx| self.ir.blocks[idx as usize].name == name)
            .map(|idx| BlockId(idx - info.block_begin_idx))
    }

    /// Find a value of the current function by name.
    pub fn value_by_name(&self, name: &str) -> Option<VarId> {
        let info = &self.ir.functions[self.cur_func as usize];
        (info.arg_begin_idx..self.func_value_end())
            .find(|&idx| self.ir.values[idx as usize].name == name)
            .map(VarId)
    }

    /// Current function's arguments
    pub fn cur_args(&self) -> impl Iterator<Item = VarId> {
        let func = &self.ir.functions[self.cur_func as usize];
        (func.arg_begin_idx..func.arg_end_idx).map(VarId)
    }

    /// Underlying module.
    pub fn ir(&self) -> &'ir TestIR {
        self.ir
    }

    fn global_block(&self, block: BlockId) -> usize {
        let func = &self.ir.functions[self.cur_func as usize];
        (func.block_begin_idx + block.0) as usize
    }

    fn local_block(&self, global: u32) -> BlockId {
        let func = &self.ir.functions[self.cur_func as usize];
        BlockId(global - func.block_begin_idx)
    }

    fn block_targets(&self, stmt: StmtId) -> Vec<BlockId> {
        let value = &self.ir.values[stmt.0 as usize];
        self.ir
            .block_operands(value)
            .iter()
            .map(|&global| self.local_block(global))
            .collect()
    }
}

impl<'ir> IrAdaptor for TestIRAdaptor<'ir> {
    fn func_name(&self) -> &str {
        &self.ir.functions[self.cur_func as usize].name
    }

    fn entry_block(&self) -> BlockId {
        BlockId(0)
    }

    fn blocks(&self) -> Box<dyn Iterator<Item = BlockId> + '_> {
        let func = &self.ir.functions[self.cur_func as usize];
        Box::new((0..func.block_end_idx - func.block_begin_idx).map(BlockId))
    }

    fn block_label(&self, block: BlockId) -> Option<&str> {
        let info = &self.ir.blocks[self.global_block(block)];
        if info.phi_end_idx == info.inst_end_idx {
            return None;
        }
        let first = &self.ir.values[info.phi_end_idx as usize];
        (first.op == Operation::Label).then_some(first.symbol.as_str())
    }

    fn block_stmts(&self, block: BlockId) -> Box<dyn Iterator<Item = StmtId> + '_> {
        let block_info = &self.ir.blocks[self.global_block(block)];
        Box::new(
            (block_info.phi_end_idx..block_info.inst_end_idx)
                .filter(move |&idx| self.ir.values[idx as usize].op != Operation::Br)
                .map(StmtId),
        )
    }

    fn block_succs(&self, block: BlockId) -> Box<dyn Iterator<Item = BlockId> + '_> {
        let block_info = &self.ir.blocks[self.global_block(block)];
        let mut succs: Vec<BlockId> = Vec::new();
        for idx in block_info.succ_begin_idx..block_info.succ_end_idx {
            let succ = self.local_block(self.ir.value_operands[idx as usize]);
            if !succs.contains(&succ) {
                succs.push(succ);
            }
        }
        Box::new(succs.into_iter())
    }

    fn block_preds(&self, block: BlockId) -> Box<dyn Iterator<Item = BlockId> + '_> {
        match self.preds.get(block.index()) {
            Some(preds) => Box::new(preds.iter().copied()),
            None => Box::new(std::iter::empty()),
        }
    }

    fn stmt_kind(&self, stmt: StmtId) -> EmitResult<StmtKind> {
        let value = &self.ir.values[stmt.0 as usize];
        let operands = self.ir.operands(value);
        let targets = self.block_targets(stmt);

        let kind = match value.op {
            Operation::Any
            | Operation::Const
            | Operation::Add
            | Operation::Sub
            | Operation::Mul
            | Operation::Lt
            | Operation::Gt
            | Operation::Eq
            | Operation::Copy
            | Operation::Call
            | Operation::Ret => StmtKind::Plain,
            Operation::Init => StmtKind::Init,
            Operation::VUse => StmtKind::Virtual,
            Operation::Label => StmtKind::Label,
            Operation::CondBr => StmtKind::Conditional {
                cond: VarId(operands[0]),
                then_block: targets[0],
                else_block: targets[1],
            },
            Operation::Loop => StmtKind::Loop {
                cond: VarId(operands[0]),
                body: targets[0],
                exit: targets[1],
            },
            Operation::MultiIf => StmtKind::MultiWay {
                arms: targets
                    .iter()
                    .enumerate()
                    .map(|(idx, &target)| (operands.get(idx).map(|&cond| VarId(cond)), target))
                    .collect(),
            },
            Operation::Switch => {
                // arms with the same target are merged, in first-seen order
                let mut arms: Vec<SwitchArm> = Vec::new();
                for (case, &target) in value.case_labels.iter().zip(&targets) {
                    let label = match case {
                        Some(v) => CaseLabel::Value(*v),
                        None => CaseLabel::Default,
                    };
                    match arms.iter_mut().find(|arm| arm.target == target) {
                        Some(arm) => arm.labels.push(label),
                        None => arms.push(SwitchArm {
                            labels: vec![label],
                            target,
                        }),
                    }
                }
                StmtKind::Switch {
                    selector: VarId(operands[0]),
                    arms,
                }
            }
            Operation::Goto => StmtKind::Goto { targets },
            Operation::Asm => {
                return Err(EmitError::NotYetSupported {
                    what: format!("inline assembly statement {}", stmt),
                })
            }
            Operation::None | Operation::Phi | Operation::VPhi | Operation::Br => {
                return Err(EmitError::NotYetSupported {
                    what: format!("'{}' used as a statement", value.op.info().name),
                })
            }
        };
        Ok(kind)
    }

    fn stmt_uses(&self, stmt: StmtId) -> Box<dyn Iterator<Item = VarId> + '_> {
        let value = &self.ir.values[stmt.0 as usize];
        Box::new(self.ir.operands(value).iter().map(|&idx| VarId(idx)))
    }

    fn stmt_defs(&self, stmt: StmtId) -> Box<dyn Iterator<Item = VarId> + '_> {
        let value = &self.ir.values[stmt.0 as usize];
        if value.op.info().is_def && !value.name.is_empty() {
            Box::new(std::iter::once(VarId(stmt.0)))
        } else {
            Box::new(std::iter::empty())
        }
    }

    fn block_phis(&self, block: BlockId) -> Box<dyn Iterator<Item = VarId> + '_> {
        let block_info = &self.ir.blocks[self.global_block(block)];
        Box::new((block_info.inst_begin_idx..block_info.phi_end_idx).map(VarId))
    }

    fn phi_is_virtual(&self, phi: VarId) -> bool {
        self.ir.values[phi.index()].op == Operation::VPhi
    }

    fn phi_incoming_count(&self, phi: VarId) -> u32 {
        let value = &self.ir.values[phi.index()];
        if value.value_type == ValueType::Phi {
            value.op_count
        } else {
            0
        }
    }

    fn phi_incoming_val_for_slot(&self, phi: VarId, slot: u32) -> VarId {
        let info = &self.ir.values[phi.index()];
        VarId(self.ir.value_operands[(info.op_begin_idx + slot) as usize])
    }

    fn phi_incoming_block_for_slot(&self, phi: VarId, slot: u32) -> BlockId {
        let info = &self.ir.values[phi.index()];
        self.local_block(self.ir.value_operands[(info.op_begin_idx + info.op_count + slot) as usize])
    }

    fn var_name(&self, var: VarId) -> &str {
        &self.ir.values[var.index()].name
    }

    fn identifier_in_use(&self, name: &str) -> bool {
        self.identifiers.contains(name)
    }
}
