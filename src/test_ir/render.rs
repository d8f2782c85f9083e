//! C-like statement text for TIR values.
//!
//! Every TIR variable is an `int`; operand names go through the render
//! context so phi renaming applies.

use super::{Operation, TestIRAdaptor};
use crate::core::{BlockId, EmitError, EmitResult, IrAdaptor, StmtId, VarId};
use crate::writer::{DeclarationPrinter, InstructionRenderer, RenderContext};

/// Renders TIR statements.
#[derive(Debug, Default, Clone, Copy)]
pub struct TirRenderer;

impl TirRenderer {
    fn operand_list(
        &self,
        ir: &TestIRAdaptor<'_>,
        ctx: &RenderContext<'_>,
        operands: &[u32],
    ) -> String {
        operands
            .iter()
            .map(|&op| ctx.var_name(ir, VarId(op)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<'ir> InstructionRenderer<TestIRAdaptor<'ir>> for TirRenderer {
    fn render(
        &self,
        ir: &TestIRAdaptor<'ir>,
        stmt: StmtId,
        ctx: &RenderContext<'_>,
    ) -> EmitResult<String> {
        let module = ir.ir();
        let value = &module.values[stmt.0 as usize];
        let operands = module.operands(value);
        let dest = ir.var_name(VarId(stmt.0));
        let operand = |idx: usize| ctx.var_name(ir, VarId(operands[idx]));

        let text = match value.op {
            Operation::Any => format!("{} = any({});", dest, self.operand_list(ir, ctx, operands)),
            Operation::Const => format!("{} = {};", dest, value.imms[0]),
            Operation::Add
            | Operation::Sub
            | Operation::Mul
            | Operation::Lt
            | Operation::Gt
            | Operation::Eq => {
                let op = value.op.binary_operator().unwrap_or("?");
                format!("{} = {} {} {};", dest, operand(0), op, operand(1))
            }
            Operation::Copy => format!("{} = {};", dest, operand(0)),
            Operation::Call if dest.is_empty() => {
                format!("{}({});", value.symbol, self.operand_list(ir, ctx, operands))
            }
            Operation::Call => format!(
                "{} = {}({});",
                dest,
                value.symbol,
                self.operand_list(ir, ctx, operands)
            ),
            Operation::Init => format!("{} = {};", operand(0), value.imms[0]),
            Operation::Label => format!("{}:;", value.symbol),
            Operation::Ret if operands.is_empty() => "return;".to_string(),
            Operation::Ret => format!("return {};", operand(0)),
            Operation::CondBr | Operation::MultiIf => format!("if ({})", operand(0)),
            Operation::Loop => format!("while ({})", operand(0)),
            Operation::Switch => format!("switch ({})", operand(0)),
            Operation::Goto => {
                let target = module.block_operands(value)[0];
                let func = &module.functions[ir.cur_func() as usize];
                let block = BlockId(target - func.block_begin_idx);
                format!("goto {};", ctx.label(block)?)
            }
            Operation::VUse
            | Operation::Asm
            | Operation::None
            | Operation::Phi
            | Operation::VPhi
            | Operation::Br => {
                return Err(EmitError::NotYetSupported {
                    what: format!("rendering of '{}'", value.op.info().name),
                })
            }
        };
        Ok(text)
    }
}

/// Declares temporaries as `int`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TirDeclarationPrinter;

impl<'ir> DeclarationPrinter<TestIRAdaptor<'ir>> for TirDeclarationPrinter {
    fn declare(&self, _ir: &TestIRAdaptor<'ir>, name: &str, _like: VarId) -> EmitResult<String> {
        Ok(format!("int {};", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_ir::TestIR;
    use crate::writer::LabelTable;
    use hashbrown::HashMap;

    const FUNC: &str = r#"
f(%a, %b) {
entry:
  label start
  %s = add %a, %b
  %r = call @g, %s, %a
  call @h
  init %s, 7
  %k = const -3
  %z = any
  goto ^entry
}
"#;

    fn render_all(renaming: Option<&HashMap<VarId, &str>>) -> Vec<String> {
        let ir = TestIR::parse(FUNC).unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        let labels = LabelTable::assign(&adaptor, 1).unwrap();
        let ctx = RenderContext::new(renaming, &labels);
        adaptor
            .block_stmts(BlockId(0))
            .map(|stmt| TirRenderer.render(&adaptor, stmt, &ctx).unwrap())
            .collect()
    }

    #[test]
    fn test_render_statements() {
        let text = render_all(None);
        assert_eq!(
            text,
            vec![
                "start:;",
                "s = a + b;",
                "r = g(s, a);",
                "h();",
                "s = 7;",
                "k = -3;",
                "z = any();",
                "goto start;",
            ]
        );
    }

    #[test]
    fn test_render_applies_renaming() {
        let ir = TestIR::parse(FUNC).unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        let a = adaptor.value_by_name("a").unwrap();

        let mut renaming = HashMap::new();
        renaming.insert(a, "__t__0_0");
        let text = render_all(Some(&renaming));
        assert_eq!(text[1], "s = __t__0_0 + b;");
        assert_eq!(text[2], "r = g(s, __t__0_0);");
    }

    #[test]
    fn test_declaration() {
        let ir = TestIR::parse(FUNC).unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        let decl = TirDeclarationPrinter
            .declare(&adaptor, "__t__0_0", VarId(0))
            .unwrap();
        assert_eq!(decl, "int __t__0_0;");
    }
}
