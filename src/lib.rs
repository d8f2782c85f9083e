//! cwrite - structured source emission for SSA control-flow graphs.
//!
//! cwrite renders one function of an SSA based IR as nested C-like source.
//! It rebuilds `if`/`else`, `while`, `if`/`else if` cascades and `switch`
//! statements from the control-flow graph, falls back to labeled `goto`s where
//! the graph is not structurable, and leaves SSA form by placing sequential
//! copies on the edges into every phi.
//!
//! # Primary Usage
//!
//! ```ignore
//! use cwrite::core::{Analyzer, EmissionSession};
//! use cwrite::writer::FunctionWriter;
//! use bumpalo::Bump;
//!
//! // One session per translation unit
//! let arena = Bump::new();
//! let session = EmissionSession::new(&arena);
//! let writer = FunctionWriter::new(&session);
//!
//! // Analyze and emit the adaptor's current function
//! let analyzer = Analyzer::for_function(&adaptor);
//! let body = writer.emit_function_body(&adaptor, &analyzer, &renderer)?;
//! print!("{}{}", body.declarations(&adaptor, &printer)?, body.text);
//! ```
//!
//! # Architecture
//!
//! - [`core`] - IR access traits, dominance analysis, errors and the session
//! - [`writer`] - label policy, phi elimination and the structured emitter
//! - [`test_ir`] - a small textual SSA format used by the tests and the CLI

pub mod core;
pub mod test_ir;
pub mod writer;

pub use core::{
    // IR access
    BlockId, CaseLabel, IrAdaptor, StmtId, StmtKind, SwitchArm, VarId,
    // Analysis
    Analyzer, DominanceOracle,
    // Session and errors
    EmissionSession, EmitError, EmitResult, SessionStats,
};
pub use writer::{
    DeclarationPrinter, EmittedBody, FunctionWriter, InstructionRenderer, RenderContext,
    Temporary, WriterConfig,
};

use bumpalo::Bump;

/// Emit the body of the adaptor's current function with a fresh session.
///
/// Convenience for callers that render a single function; labels never carry
/// a pass suffix here.
pub fn emit_function_body<A, O, R>(ir: &A, oracle: &O, renderer: &R) -> EmitResult<EmittedBody>
where
    A: IrAdaptor,
    O: DominanceOracle,
    R: InstructionRenderer<A>,
{
    let arena = Bump::new();
    let session = EmissionSession::new(&arena);
    FunctionWriter::new(&session).emit_function_body(ir, oracle, renderer)
}
