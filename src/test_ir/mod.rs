//! Test IR (TIR) parser and data structures for testing structured emission.
//!
//! This module provides a simple SSA format for writing emitter tests
//! without depending on a real front-end. The format is designed to be:
//! - Human-readable and writable
//! - Easy to parse
//! - Able to express every control shape the writer distinguishes
//!
//! # TIR Format
//!
//! ```text
//! ; Comments start with semicolon
//! func_name(%x, %n) {
//! entry:
//!     %zero = const 0
//!     %c = gt %x, %zero
//!     condbr %c, ^then, ^else
//! then:
//!     %y1 = const 1
//!     br ^join
//! else:
//!     %y2 = const 2
//!     br ^join
//! join:
//!     %y = phi [^then, %y1], [^else, %y2]
//!     ret %y
//! }
//! ```

pub mod parser;
pub mod adaptor;
pub mod check;
pub mod render;

pub use adaptor::TestIRAdaptor;
pub use check::{CheckDirective, TestRunner, TestSpec};
pub use parser::ParseError;
pub use render::{TirDeclarationPrinter, TirRenderer};

#[derive(Debug, Clone, PartialEq)]
pub struct TestIR {
    pub functions: Vec<Function>,
    pub blocks: Vec<Block>,
    pub values: Vec<Value>,
    pub value_operands: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub block_begin_idx: u32,
    pub block_end_idx: u32,
    pub arg_begin_idx: u32,
    pub arg_end_idx: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub succ_begin_idx: u32,
    pub succ_end_idx: u32,
    pub inst_begin_idx: u32,
    pub phi_end_idx: u32,
    pub inst_end_idx: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub name: String,
    pub value_type: ValueType,
    pub op: Operation,
    /// Number of value operands
    pub op_count: u32,
    /// Operand indices into value_operands array. Value operands come
    /// first, block operands follow.
    pub op_begin_idx: u32,
    pub op_end_idx: u32,
    /// Callee of a call, text of a source label
    pub symbol: String,
    /// Constant of `const`, value of `init`
    pub imms: Vec<i64>,
    /// Switch only: one entry per arm, `None` for `default`
    pub case_labels: Vec<Option<i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Normal,
    Arg,
    Phi,
    Terminator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    None,
    Phi,
    VPhi,
    Any,
    Const,
    Add,
    Sub,
    Mul,
    Lt,
    Gt,
    Eq,
    Copy,
    Call,
    Init,
    VUse,
    Label,
    Asm,
    Ret,
    Br,
    CondBr,
    Loop,
    MultiIf,
    Switch,
    Goto,
}

impl Operation {
    pub const fn info(self) -> OpInfo {
        use Operation::*;
        match self {
            None => OpInfo { name: "<none>", is_terminator: false, is_def: false, op_count: 0, succ_count: 0, imm_count: 0 },
            Phi => OpInfo { name: "phi", is_terminator: false, is_def: true, op_count: !0, succ_count: 0, imm_count: 0 },
            VPhi => OpInfo { name: "vphi", is_terminator: false, is_def: true, op_count: !0, succ_count: 0, imm_count: 0 },
            Any => OpInfo { name: "any", is_terminator: false, is_def: true, op_count: !0, succ_count: 0, imm_count: 0 },
            Const => OpInfo { name: "const", is_terminator: false, is_def: true, op_count: 0, succ_count: 0, imm_count: 1 },
            Add => OpInfo { name: "add", is_terminator: false, is_def: true, op_count: 2, succ_count: 0, imm_count: 0 },
            Sub => OpInfo { name: "sub", is_terminator: false, is_def: true, op_count: 2, succ_count: 0, imm_count: 0 },
            Mul => OpInfo { name: "mul", is_terminator: false, is_def: true, op_count: 2, succ_count: 0, imm_count: 0 },
            Lt => OpInfo { name: "lt", is_terminator: false, is_def: true, op_count: 2, succ_count: 0, imm_count: 0 },
            Gt => OpInfo { name: "gt", is_terminator: false, is_def: true, op_count: 2, succ_count: 0, imm_count: 0 },
            Eq => OpInfo { name: "eq", is_terminator: false, is_def: true, op_count: 2, succ_count: 0, imm_count: 0 },
            Copy => OpInfo { name: "copy", is_terminator: false, is_def: true, op_count: 1, succ_count: 0, imm_count: 0 },
            Call => OpInfo { name: "call", is_terminator: false, is_def: true, op_count: !0, succ_count: 0, imm_count: 0 },
            Init => OpInfo { name: "init", is_terminator: false, is_def: false, op_count: 1, succ_count: 0, imm_count: 1 },
            VUse => OpInfo { name: "vuse", is_terminator: false, is_def: false, op_count: 1, succ_count: 0, imm_count: 0 },
            Label => OpInfo { name: "label", is_terminator: false, is_def: false, op_count: 0, succ_count: 0, imm_count: 0 },
            Asm => OpInfo { name: "asm", is_terminator: false, is_def: false, op_count: 0, succ_count: 0, imm_count: 0 },
            Ret => OpInfo { name: "ret", is_terminator: true, is_def: false, op_count: !0, succ_count: 0, imm_count: 0 },
            Br => OpInfo { name: "br", is_terminator: true, is_def: false, op_count: 0, succ_count: 1, imm_count: 0 },
            CondBr => OpInfo { name: "condbr", is_terminator: true, is_def: false, op_count: 1, succ_count: 2, imm_count: 0 },
            Loop => OpInfo { name: "loop", is_terminator: true, is_def: false, op_count: 1, succ_count: 2, imm_count: 0 },
            MultiIf => OpInfo { name: "multiif", is_terminator: true, is_def: false, op_count: !0, succ_count: !0, imm_count: 0 },
            Switch => OpInfo { name: "switch", is_terminator: true, is_def: false, op_count: 1, succ_count: !0, imm_count: !0 },
            Goto => OpInfo { name: "goto", is_terminator: true, is_def: false, op_count: 0, succ_count: 1, imm_count: 0 },
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "any" => Some(Operation::Any),
            "const" => Some(Operation::Const),
            "add" => Some(Operation::Add),
            "sub" => Some(Operation::Sub),
            "mul" => Some(Operation::Mul),
            "lt" => Some(Operation::Lt),
            "gt" => Some(Operation::Gt),
            "eq" => Some(Operation::Eq),
            "copy" => Some(Operation::Copy),
            "call" => Some(Operation::Call),
            "init" => Some(Operation::Init),
            "vuse" => Some(Operation::VUse),
            "label" => Some(Operation::Label),
            "asm" => Some(Operation::Asm),
            "ret" => Some(Operation::Ret),
            "br" => Some(Operation::Br),
            "condbr" => Some(Operation::CondBr),
            "loop" => Some(Operation::Loop),
            "multiif" => Some(Operation::MultiIf),
            "switch" => Some(Operation::Switch),
            "goto" => Some(Operation::Goto),
            _ => None,
        }
    }

    /// C operator of a binary operation.
    pub fn binary_operator(self) -> Option<&'static str> {
        match self {
            Operation::Add => Some("+"),
            Operation::Sub => Some("-"),
            Operation::Mul => Some("*"),
            Operation::Lt => Some("<"),
            Operation::Gt => Some(">"),
            Operation::Eq => Some("=="),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub name: &'static str,
    pub is_terminator: bool,
    pub is_def: bool,
    pub op_count: u32,
    pub succ_count: u32,
    pub imm_count: u32,
}

impl TestIR {
    pub fn new() -> Self {
        Self {
            functions: Vec::new(),
            blocks: Vec::new(),
            values: Vec::new(),
            value_operands: Vec::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        parser::parse_ir(text)
    }

    /// Value operands of `val`.
    pub fn operands(&self, val: &Value) -> &[u32] {
        let begin = val.op_begin_idx as usize;
        &self.value_operands[begin..begin + val.op_count as usize]
    }

    /// Block operands of `val`, as global block indices.
    pub fn block_operands(&self, val: &Value) -> &[u32] {
        let begin = (val.op_begin_idx + val.op_count) as usize;
        &self.value_operands[begin..val.op_end_idx as usize]
    }

    pub fn print(&self) -> String {
        let mut output = String::new();
        output.push_str("Printing IR\n");

        for func in &self.functions {
            output.push_str(&format!("Function {}", func.name));

            for arg_idx in func.arg_begin_idx..func.arg_end_idx {
                let arg = &self.values[arg_idx as usize];
                output.push_str(&format!("\nArgument {}", arg.name));
            }

            for block_idx in func.block_begin_idx..func.block_end_idx {
                let block = &self.blocks[block_idx as usize];
                output.push_str(&format!("\nBlock {}", block.name));

                for succ_idx in block.succ_begin_idx..block.succ_end_idx {
                    let succ_block_idx = self.value_operands[succ_idx as usize];
                    if let Some(succ_block) = self.blocks.get(succ_block_idx as usize) {
                        output.push_str(&format!("\nSucc {}", succ_block.name));
                    }
                }

                for inst_idx in block.inst_begin_idx..block.phi_end_idx {
                    let phi = &self.values[inst_idx as usize];
                    let kind = if phi.op == Operation::VPhi { "VPHI" } else { "PHI" };
                    output.push_str(&format!("\n{} {}", kind, phi.name));

                    let incoming = self.operands(phi);
                    let from = self.block_operands(phi);
                    for (val_idx, block_idx) in incoming.iter().zip(from) {
                        let val = &self.values[*val_idx as usize];
                        let from_block = &self.blocks[*block_idx as usize];
                        output.push_str(&format!("\n{} from {}", val.name, from_block.name));
                    }
                }

                for inst_idx in block.phi_end_idx..block.inst_end_idx {
                    let inst = &self.values[inst_idx as usize];
                    let info = inst.op.info();

                    if info.is_def {
                        output.push_str(&format!("\nValue {} ({})", inst.name, info.name));
                    } else {
                        output.push_str(&format!("\nValue ({})", info.name));
                    }

                    if !inst.symbol.is_empty() {
                        output.push_str(&format!("\nSymbol {}", inst.symbol));
                    }
                    for &operand_idx in self.operands(inst) {
                        if let Some(operand) = self.values.get(operand_idx as usize) {
                            output.push_str(&format!("\nOp {}", operand.name));
                        }
                    }
                    for &block_idx in self.block_operands(inst) {
                        if let Some(target_block) = self.blocks.get(block_idx as usize) {
                            output.push_str(&format!("\nOp ^{}", target_block.name));
                        }
                    }
                    for imm in &inst.imms {
                        output.push_str(&format!("\nOp ${}", imm));
                    }
                    for case in &inst.case_labels {
                        match case {
                            Some(value) => output.push_str(&format!("\nCase {}", value)),
                            None => output.push_str("\nCase default"),
                        }
                    }
                }
            }
            output.push('\n');
        }

        output
    }
}

impl Default for TestIR {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TestIR {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.print())
    }
}
