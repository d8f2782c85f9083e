// This module implements the StructuredEmitter, the recursive-descent renderer that
// turns the control-flow graph of one function into nested structured source text.
// Rendering a block works like this: the block's immediate post-dominator is deferred
// (put on the frontier) so that every branch opened by the block stops there, the block's
// own statements are printed with the phi copies of the eliminator interleaved, and the
// terminator decides how the successors are laid out: both arms of a conditional, the body
// and exit of a structured loop, the arms of a multi-way branch or a switch. Once the
// branches are done the deferred join is rendered as the continuation of the block.
// Edges that cannot be expressed this way (a target that was already rendered, a feedback
// edge that is not the back edge of a structured loop, an explicit jump statement) become
// `goto` statements; the targets are collected and, once the entry block is done, the
// driver renders every target that is still missing until none is left. The label policy
// decides which rendered blocks print a label, and the final check makes sure every goto
// found its label.

//! Structured control reconstruction with goto fallback.

use crate::core::{
    BlockId, CaseLabel, DominanceOracle, EmissionSession, EmitError, EmitResult, IrAdaptor,
    StmtKind, SwitchArm, VarId,
};
use crate::writer::labels::{is_loop_test, needs_label, LabelTable};
use crate::writer::output::IndentedOutput;
use crate::writer::phi::PhiCopies;
use crate::writer::render::{InstructionRenderer, RenderContext};
use crate::writer::state::EmissionState;
use crate::writer::WriterConfig;
use hashbrown::HashSet;

/// Renders the body of the adaptor's current function.
pub struct StructuredEmitter<'e, 'arena, A, O, R>
where
    A: IrAdaptor,
    O: DominanceOracle,
    R: InstructionRenderer<A>,
{
    ir: &'e A,
    oracle: &'e O,
    renderer: &'e R,
    session: &'e EmissionSession<'arena>,
    labels: &'e LabelTable,
    copies: &'e PhiCopies<'arena>,
    verbose: bool,
    blocks: HashSet<BlockId>,
    state: EmissionState,
    out: IndentedOutput,
}

impl<'e, 'arena, A, O, R> StructuredEmitter<'e, 'arena, A, O, R>
where
    A: IrAdaptor,
    O: DominanceOracle,
    R: InstructionRenderer<A>,
{
    pub fn new(
        ir: &'e A,
        oracle: &'e O,
        renderer: &'e R,
        session: &'e EmissionSession<'arena>,
        labels: &'e LabelTable,
        copies: &'e PhiCopies<'arena>,
        config: &WriterConfig,
    ) -> Self {
        Self {
            ir,
            oracle,
            renderer,
            session,
            labels,
            copies,
            verbose: config.verbose,
            blocks: ir.blocks().collect(),
            state: EmissionState::new(),
            out: IndentedOutput::new(config.indent_width),
        }
    }

    /// Render the entry block, then every jump target still missing.
    pub fn emit(mut self) -> EmitResult<String> {
        self.emit_block(self.ir.entry_block(), false)?;
        while let Some(target) = self.state.next_pending_target() {
            log::trace!("rendering pending jump target {}", target);
            self.emit_block(target, false)?;
        }

        for &target in &self.state.goto_targets {
            if !self.state.printed_labels.contains(&target) {
                return Err(EmitError::DanglingGoto {
                    block: target,
                    label: self.labels.label(target)?.to_string(),
                });
            }
        }

        let text = self.out.into_string();
        log::debug!(
            "emitted {}: {} blocks, {} jump targets",
            self.ir.func_name(),
            self.state.analyzed.len(),
            self.state.goto_targets.len()
        );
        self.session
            .record_function_emitted(self.ir.func_name(), self.state.analyzed.len(), text.len());
        Ok(text)
    }

    /// Render `bb` and everything it structurally owns.
    ///
    /// `braced` asks for the block to fill a single statement slot, as the
    /// arm of an `if` or a `case` does.
    fn emit_block(&mut self, bb: BlockId, braced: bool) -> EmitResult<()> {
        if !self.blocks.contains(&bb) {
            return Err(EmitError::UnknownBlock { block: bb });
        }
        if !self.state.analyzed.insert(bb) {
            return Ok(());
        }

        let ir = self.ir;
        let copies = self.copies;
        let labels = self.labels;
        let stmts = ir.classified_stmts(bb)?;

        let mut deferred = match self.oracle.immediate_post_dominator(bb) {
            Some(join) if !self.state.analyzed.contains(&join) && !self.state.is_deferred(join) => {
                self.state.defer(join);
                Some(join)
            }
            _ => None,
        };

        let last_real = stmts.iter().rposition(|(_, kind)| kind.is_real());
        let terminator = last_real.map(|idx| &stmts[idx].1);
        let loop_test = matches!(terminator, Some(StmtKind::Loop { .. }));
        let label = needs_label(ir, self.oracle, labels, &self.state, bb, loop_test)?;
        let prefix = copies.prefix(bb);
        let tail = copies.tail(bb);

        log::trace!(
            "{}: braced={} label={} deferred={:?} statements={}",
            bb,
            braced,
            label,
            deferred,
            last_real.map_or(0, |idx| idx + 1)
        );

        if self.verbose {
            self.out.append(&format!("//Basic block {}", ir.block_number(bb)));
        }
        let opened = braced
            && (deferred.is_some()
                || last_real.is_some()
                || label
                || prefix.is_some()
                || tail.is_some());
        if opened {
            self.out.append("{");
        }
        let mark = self.out.as_str().len();

        if label {
            let text = labels.label(bb)?;
            self.out.append(&format!("{}:;", text));
            self.state.printed_labels.insert(bb);
            self.session.record_label();
        }
        if let Some(prefix) = prefix {
            self.out.append(prefix);
        }

        let ctx = RenderContext::new(copies.renaming(bb), labels);
        if let Some(last) = last_real {
            for (stmt, kind) in &stmts[..last] {
                match kind {
                    StmtKind::Virtual => {
                        if self.verbose {
                            self.out.append("//(removed virtual statement)");
                        }
                    }
                    _ => {
                        let text = self.renderer.render(ir, *stmt, &ctx)?;
                        self.out.append(&text);
                        if let StmtKind::Label = kind {
                            self.state.printed_labels.insert(bb);
                        }
                    }
                }
            }
            let (stmt, kind) = &stmts[last];
            if kind.is_branching() {
                if let Some(tail) = tail {
                    self.out.append(tail);
                }
            }
            let text = self.renderer.render(ir, *stmt, &ctx)?;
            self.out.append(&text);
            if let StmtKind::Label = kind {
                self.state.printed_labels.insert(bb);
            }
            if !kind.is_branching() {
                if let Some(tail) = tail {
                    self.out.append(tail);
                }
            }
        } else if let Some(tail) = tail {
            self.out.append(tail);
        }

        match terminator {
            Some(StmtKind::Conditional {
                then_block,
                else_block,
                ..
            }) => self.emit_conditional(bb, *then_block, *else_block)?,
            Some(StmtKind::Loop { body, exit, .. }) => self.emit_loop(bb, *body, *exit)?,
            Some(StmtKind::MultiWay { arms }) => self.emit_multiway(bb, arms, &ctx)?,
            Some(StmtKind::Switch { arms, .. }) => self.emit_switch(bb, arms, &mut deferred)?,
            Some(StmtKind::Goto { targets }) => {
                for &target in targets {
                    self.state.goto_targets.insert(target);
                    self.session.record_goto();
                }
            }
            Some(StmtKind::Plain | StmtKind::Init | StmtKind::Virtual | StmtKind::Label) | None => {
                self.emit_fallthrough(bb, braced && !opened)?
            }
        }

        if braced && !opened && self.out.as_str().len() == mark {
            self.out.append(";");
        }

        if let Some(join) = deferred {
            self.state.undefer(join);
            if self.state.analyzed.contains(&join) {
                if !self.state.was_claimed(join) {
                    return Err(EmitError::InconsistentRecursion {
                        reason: format!("join {} of {} was rendered before the block was done", join, bb),
                    });
                }
            } else {
                log::trace!("{}: continuing with join {}", bb, join);
                self.emit_block(join, false)?;
            }
        }

        if opened {
            self.out.append("}");
        }
        Ok(())
    }

    /// One arm of a branch: a nested block, an empty body, or a jump.
    fn emit_branch(&mut self, target: BlockId) -> EmitResult<()> {
        if self.state.is_deferred(target) {
            if self.state.leaves_open_loop(target) {
                return self.emit_jump(target, true);
            }
            self.out.append("{}");
            Ok(())
        } else if self.state.analyzed.contains(&target) {
            self.emit_jump(target, true)
        } else {
            self.emit_block(target, true)
        }
    }

    fn emit_jump(&mut self, target: BlockId, nested: bool) -> EmitResult<()> {
        let line = format!("goto {};", self.labels.label(target)?);
        if nested {
            self.out.append_nested(&line);
        } else {
            self.out.append(&line);
        }
        log::trace!("jump to {}", target);
        self.state.goto_targets.insert(target);
        self.session.record_goto();
        Ok(())
    }

    fn emit_conditional(
        &mut self,
        bb: BlockId,
        then_block: BlockId,
        else_block: BlockId,
    ) -> EmitResult<()> {
        let hint = !self.state.is_deferred(else_block)
            && !self.state.goto_targets.contains(&else_block);
        if hint {
            self.state.hint(else_block);
        }
        let then_result = self.emit_branch(then_block);
        if hint {
            self.state.unhint(else_block);
        }
        then_result?;

        if self.state.is_deferred(else_block) {
            if self.state.leaves_open_loop(else_block) {
                self.out.append("else");
                self.emit_jump(else_block, true)?;
            }
            return Ok(());
        }
        if !self.oracle.is_feedback_edge(bb, else_block) {
            self.out.append("else");
            self.emit_branch(else_block)
        } else if is_loop_test(self.ir, else_block)? {
            // back edge of the enclosing loop
            let text = self.loop_header_text(else_block)?;
            if !text.is_empty() {
                self.out.append("else");
                self.out.append("{");
                self.out.append(&text);
                self.out.append("}");
            }
            Ok(())
        } else {
            self.out.append("else");
            self.emit_jump(else_block, true)
        }
    }

    fn emit_loop(&mut self, bb: BlockId, body: BlockId, exit: BlockId) -> EmitResult<()> {
        if self.state.is_deferred(body) {
            self.out.append("{}");
        } else if self.state.analyzed.contains(&body) {
            return Err(EmitError::InconsistentRecursion {
                reason: format!("loop body {} rendered before its header {}", body, bb),
            });
        } else {
            self.state.open_loop_exits.push(exit);
            let result = self.emit_block(body, true);
            self.state.open_loop_exits.pop();
            result?;
        }

        if self.state.is_deferred(exit) {
            if self.state.leaves_open_loop(exit) {
                self.emit_jump(exit, false)?;
            }
            Ok(())
        } else if self.state.analyzed.contains(&exit) {
            self.emit_jump(exit, false)
        } else {
            self.emit_block(exit, false)
        }
    }

    fn emit_multiway(
        &mut self,
        bb: BlockId,
        arms: &[(Option<VarId>, BlockId)],
        ctx: &RenderContext<'_>,
    ) -> EmitResult<()> {
        if let Some(pos) = arms.iter().position(|(cond, _)| cond.is_none()) {
            if pos == 0 || pos + 1 != arms.len() {
                return Err(EmitError::NotYetSupported {
                    what: format!("multi-way branch of {} with an unconditional arm at position {}", bb, pos),
                });
            }
        }

        let join = self.oracle.immediate_post_dominator(bb);
        let mut hinted = Vec::new();
        for &(_, target) in arms.iter().skip(1) {
            if !self.state.is_deferred(target)
                && !self.state.goto_targets.contains(&target)
                && !hinted.contains(&target)
            {
                self.state.hint(target);
                hinted.push(target);
            }
        }

        for (idx, &(cond, target)) in arms.iter().enumerate() {
            if let Some(pos) = hinted.iter().position(|&hinted| hinted == target) {
                self.state.unhint(target);
                hinted.swap_remove(pos);
            }
            if idx > 0 {
                match cond {
                    Some(cond) => {
                        let header = format!("else if ({})", ctx.var_name(self.ir, cond));
                        self.out.append(&header);
                    }
                    None if Some(target) == join
                        && self.state.is_deferred(target)
                        && !self.state.leaves_open_loop(target) =>
                    {
                        continue;
                    }
                    None => self.out.append("else"),
                }
            }
            self.emit_branch(target)?;
        }
        Ok(())
    }

    fn emit_switch(
        &mut self,
        bb: BlockId,
        arms: &[SwitchArm],
        deferred: &mut Option<BlockId>,
    ) -> EmitResult<()> {
        let join = self.oracle.immediate_post_dominator(bb);
        self.out.append("{");
        for arm in arms {
            for case in &arm.labels {
                match case {
                    CaseLabel::Value(value) => self.out.append(&format!("case {}:", value)),
                    CaseLabel::Default => self.out.append("default:"),
                }
            }

            if Some(arm.target) == join {
                if self.state.leaves_open_loop(arm.target) {
                    // `break` would only leave the switch
                    self.emit_jump(arm.target, false)?;
                    continue;
                }
                if arm.is_default()
                    && deferred.is_none()
                    && self.state.is_deferred(arm.target)
                    && self.oracle.immediate_dominator(arm.target) == Some(bb)
                {
                    // the join belongs to this switch
                    log::trace!("{}: claiming join {}", bb, arm.target);
                    self.state.claim(arm.target);
                    *deferred = Some(arm.target);
                }
                self.out.append("break;");
                continue;
            }

            if self.state.is_deferred(arm.target) {
                if self.state.leaves_open_loop(arm.target) {
                    self.emit_jump(arm.target, false)?;
                } else {
                    self.out.append("break;");
                }
            } else if self.state.analyzed.contains(&arm.target) {
                self.emit_jump(arm.target, false)?;
            } else {
                self.emit_block(arm.target, true)?;
                self.out.append("break;");
            }
        }
        self.out.append("}");
        Ok(())
    }

    /// What a loop header runs before its test: prefix copies, statements
    /// and tail copies.
    ///
    /// Printed again on every back edge that returns to the header, so the
    /// test of the next iteration sees fresh values. Labels are left out.
    fn loop_header_text(&self, header: BlockId) -> EmitResult<String> {
        let ir = self.ir;
        let stmts = ir.classified_stmts(header)?;
        let ctx = RenderContext::new(self.copies.renaming(header), self.labels);
        let mut text = String::new();
        if let Some(prefix) = self.copies.prefix(header) {
            text.push_str(prefix);
        }
        if let Some(last) = stmts.iter().rposition(|(_, kind)| kind.is_real()) {
            for (stmt, kind) in &stmts[..last] {
                if matches!(kind, StmtKind::Virtual | StmtKind::Label) {
                    continue;
                }
                text.push_str(&self.renderer.render(ir, *stmt, &ctx)?);
                text.push('\n');
            }
        }
        if let Some(tail) = self.copies.tail(header) {
            text.push_str(tail);
        }
        Ok(text)
    }

    /// Continue along the only successor of a block without branch.
    ///
    /// `slot` is set when the block was asked for braces but printed nothing,
    /// so whatever follows must still be a single statement.
    fn emit_fallthrough(&mut self, bb: BlockId, slot: bool) -> EmitResult<()> {
        let succs: Vec<BlockId> = self.ir.block_succs(bb).collect();
        let target = match succs.as_slice() {
            [] => return Ok(()),
            [target] => *target,
            _ => {
                return Err(EmitError::NotYetSupported {
                    what: format!("{} falls through to {} successors", bb, succs.len()),
                })
            }
        };

        if self.state.is_deferred(target) {
            if self.state.leaves_open_loop(target) {
                self.emit_jump(target, slot)?;
            }
            return Ok(());
        }
        if self.oracle.is_feedback_edge(bb, target) && is_loop_test(self.ir, target)? {
            let text = self.loop_header_text(target)?;
            if text.is_empty() {
                return Ok(());
            }
            if slot {
                self.out.append("{");
                self.out.append(&text);
                self.out.append("}");
            } else {
                self.out.append(&text);
            }
            return Ok(());
        }
        if self.ir.in_degree(target) == 1 && !self.state.analyzed.contains(&target) {
            self.emit_block(target, slot)
        } else {
            self.emit_jump(target, slot)
        }
    }
}
