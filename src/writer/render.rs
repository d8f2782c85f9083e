// This module defines the two collaborator traits through which the writer delegates
// text it does not own. InstructionRenderer turns one statement into source text,
// including the header line of control statements (`if (c)`, `while (c)`,
// `switch (v)`) and explicit jumps. DeclarationPrinter prints the declaration of a
// temporary introduced by phi elimination, given the variable whose static type it
// copies. Renderers see variables through RenderContext, which applies the renaming
// table of the block being printed so reads of a phi destination resolve to the
// temporary that holds the path-correct value, and which resolves jump targets to the
// labels assigned by the label pre-pass.

//! Collaborator traits for statement and declaration text.

use crate::core::{BlockId, EmitResult, IrAdaptor, StmtId, VarId};
use crate::writer::labels::LabelTable;
use hashbrown::HashMap;

/// View of names while one block is being printed.
pub struct RenderContext<'a> {
    renaming: Option<&'a HashMap<VarId, &'a str>>,
    labels: &'a LabelTable,
}

impl<'a> RenderContext<'a> {
    pub fn new(renaming: Option<&'a HashMap<VarId, &'a str>>, labels: &'a LabelTable) -> Self {
        Self { renaming, labels }
    }

    /// Visible name of `var`: its active renaming, or the IR name.
    pub fn var_name<'r, A: IrAdaptor>(&'r self, ir: &'r A, var: VarId) -> &'r str {
        match self.renaming.and_then(|table| table.get(&var)) {
            Some(name) => name,
            None => ir.var_name(var),
        }
    }

    /// Label assigned to a jump target.
    pub fn label(&self, block: BlockId) -> EmitResult<&'a str> {
        self.labels.label(block)
    }
}

/// Turns one non-phi statement into text.
pub trait InstructionRenderer<A: IrAdaptor> {
    /// Text of `stmt`. Control statements return only their header line.
    fn render(&self, ir: &A, stmt: StmtId, ctx: &RenderContext<'_>) -> EmitResult<String>;
}

/// Prints the declaration of a temporary.
pub trait DeclarationPrinter<A: IrAdaptor> {
    /// Declaration of `name`, which has the static type of `like`.
    fn declare(&self, ir: &A, name: &str, like: VarId) -> EmitResult<String>;
}
