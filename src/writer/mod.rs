// This module is the text-producing half of the crate. FunctionWriter ties the pieces
// together for one function: it opens a new emission pass in the session, runs the label
// pre-pass, eliminates the phi nodes into sequential copies along the dominator tree and
// finally hands everything to the StructuredEmitter, which walks the control-flow graph
// and produces the indented body. The result, EmittedBody, carries the body text and the
// temporaries phi elimination introduced; their declarations are printed on request
// through a DeclarationPrinter because type syntax is not the writer's business.
// WriterConfig holds the few knobs the writer has (indent width and the verbose block
// comments used when debugging emitted code).

//! Structured source writer.
//!
//! # Key Components
//!
//! - [`FunctionWriter`] - per-session entry point, one call per function body
//! - [`labels`] - label pre-pass and the per-block label decision
//! - [`phi`] - phi elimination into sequential copies
//! - [`structured`] - control structure reconstruction with goto fallback
//! - [`render`] - collaborator traits for statement and declaration text

pub mod labels;
pub mod output;
pub mod phi;
pub mod render;
pub mod state;
pub mod structured;

pub use labels::LabelTable;
pub use phi::{PhiCopies, PhiEliminator, Temporary};
pub use render::{DeclarationPrinter, InstructionRenderer, RenderContext};
pub use structured::StructuredEmitter;

use crate::core::{DominanceOracle, EmissionSession, EmitResult, IrAdaptor};

/// Writer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    /// Print `//Basic block N` before every block and mark removed virtual
    /// statements.
    pub verbose: bool,
    /// Spaces per brace level.
    pub indent_width: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            indent_width: 3,
        }
    }
}

/// Emitted body of one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedBody {
    /// Temporaries introduced by phi elimination, in creation order.
    pub temporaries: Vec<Temporary>,
    /// The body, without the enclosing braces of the function.
    pub text: String,
}

impl EmittedBody {
    /// Declarations of all temporaries, one per line.
    pub fn declarations<A, P>(&self, ir: &A, printer: &P) -> EmitResult<String>
    where
        A: IrAdaptor,
        P: DeclarationPrinter<A>,
    {
        let mut text = String::new();
        for temp in &self.temporaries {
            text.push_str(&printer.declare(ir, &temp.name, temp.like)?);
            text.push('\n');
        }
        Ok(text)
    }
}

/// Emits function bodies within one session.
pub struct FunctionWriter<'s, 'arena> {
    session: &'s EmissionSession<'arena>,
    config: WriterConfig,
}

impl<'s, 'arena> FunctionWriter<'s, 'arena> {
    pub fn new(session: &'s EmissionSession<'arena>) -> Self {
        Self::with_config(session, WriterConfig::default())
    }

    pub fn with_config(session: &'s EmissionSession<'arena>, config: WriterConfig) -> Self {
        Self { session, config }
    }

    /// Emit the body of the adaptor's current function.
    pub fn emit_function_body<A, O, R>(
        &self,
        ir: &A,
        oracle: &O,
        renderer: &R,
    ) -> EmitResult<EmittedBody>
    where
        A: IrAdaptor,
        O: DominanceOracle,
        R: InstructionRenderer<A>,
    {
        let pass = self.session.begin_function(ir.func_name());
        log::debug!("emitting {} (pass {})", ir.func_name(), pass);

        let labels = LabelTable::assign(ir, pass)?;
        let copies = PhiEliminator::new(ir, oracle, self.session).run()?;
        let text = StructuredEmitter::new(
            ir,
            oracle,
            renderer,
            self.session,
            &labels,
            &copies,
            &self.config,
        )
        .emit()?;

        Ok(EmittedBody {
            temporaries: copies.into_temporaries(),
            text,
        })
    }
}
