//! TIR (Test IR) parser implementation.

use super::*;
use std::collections::HashMap;
use thiserror::Error;

/// Parse failure with the byte offset it was detected at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at position {pos}")]
pub struct ParseError {
    pub pos: usize,
    pub message: String,
}

pub fn parse_ir(text: &str) -> Result<TestIR, ParseError> {
    let parser = Parser::new(text);
    parser.parse()
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    ir: TestIR,

    // Global maps
    funcs: HashMap<&'a str, u32>,

    // Per-function maps
    blocks: HashMap<&'a str, u32>,
    values: HashMap<&'a str, u32>,
    block_resolves: Vec<Resolve<'a>>,
    value_resolves: Vec<Resolve<'a>>,
}

#[derive(Debug)]
struct Resolve<'a> {
    name: &'a str,
    index: u32,
}

/// One arm of a `multiif`.
struct MultiIfArm<'a> {
    cond: Option<&'a str>,
    target: &'a str,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            ir: TestIR::new(),
            funcs: HashMap::new(),
            blocks: HashMap::new(),
            values: HashMap::new(),
            block_resolves: Vec::new(),
            value_resolves: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<TestIR, ParseError> {
        self.skip_whitespace(true);

        while !self.is_eof() {
            if let Err(message) = self.parse_function() {
                let context_start = self.pos.saturating_sub(20);
                let context_end = (self.pos + 20).min(self.text.len());
                log::debug!(
                    "TIR parse error: {} near '{}'",
                    message,
                    self.text.get(context_start..context_end).unwrap_or("")
                );
                return Err(ParseError {
                    pos: self.pos,
                    message,
                });
            }
            self.skip_whitespace(true);
        }

        Ok(self.ir)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn current_char(&self) -> Option<char> {
        self.text.get(self.pos..).and_then(|rest| rest.chars().next())
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self, skip_newlines: bool) {
        while let Some(ch) = self.current_char() {
            if ch == ';' {
                // Skip comment line
                while let Some(ch) = self.current_char() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch.is_whitespace() {
                if ch == '\n' && !skip_newlines {
                    break;
                }
                self.advance();
            } else {
                break;
            }
        }
    }

    fn try_read(&mut self, ch: char) -> bool {
        self.skip_whitespace(true);
        if self.current_char() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), String> {
        if !self.try_read(ch) {
            return Err(format!(
                "Expected '{}' but found {:?}",
                ch,
                self.current_char()
            ));
        }
        Ok(())
    }

    fn read_identifier(&mut self) -> Result<&'a str, String> {
        self.skip_whitespace(true);
        let start = self.pos;

        match self.current_char() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {}
            Some(ch) => return Err(format!("Expected identifier but found '{}'", ch)),
            None => return Err("Expected identifier but found EOF".to_string()),
        }

        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }

        Ok(&self.text[start..self.pos])
    }

    fn read_value_name(&mut self) -> Result<&'a str, String> {
        self.skip_whitespace(true);
        self.expect('%')?;
        self.read_identifier()
    }

    fn read_block_name(&mut self) -> Result<&'a str, String> {
        self.skip_whitespace(true);
        self.expect('^')?;
        self.read_identifier()
    }

    fn read_number(&mut self) -> Result<i64, String> {
        self.skip_whitespace(true);
        let negative = if self.current_char() == Some('-') {
            self.advance();
            true
        } else {
            false
        };
        let start = self.pos;

        // Check for hex prefix
        let is_hex = self.text[self.pos..].starts_with("0x") || self.text[self.pos..].starts_with("0X");
        if is_hex {
            self.advance();
            self.advance();
        }
        let digits_start = self.pos;
        while let Some(ch) = self.current_char() {
            let accepted = if is_hex {
                ch.is_ascii_hexdigit()
            } else {
                ch.is_ascii_digit()
            };
            if !accepted {
                break;
            }
            self.advance();
        }

        if digits_start == self.pos {
            return Err("Expected number".to_string());
        }

        let digits = &self.text[digits_start..self.pos];
        let magnitude = if is_hex {
            i64::from_str_radix(digits, 16).map_err(|e| format!("Failed to parse hex number: {}", e))?
        } else {
            digits
                .parse::<i64>()
                .map_err(|e| format!("Failed to parse number '{}': {}", &self.text[start..self.pos], e))?
        };
        Ok(if negative { -magnitude } else { magnitude })
    }

    fn parse_function(&mut self) -> Result<(), String> {
        let func_name = self.read_identifier()?;
        let func_idx = self.ir.functions.len() as u32;

        // Check for duplicate function names
        if self.funcs.contains_key(func_name) {
            return Err(format!("Duplicate function definition: '{}'", func_name));
        }

        // Reset per-function state
        self.blocks.clear();
        self.values.clear();
        self.block_resolves.clear();
        self.value_resolves.clear();

        // Parse arguments
        self.expect('(')?;
        let arg_begin_idx = self.ir.values.len() as u32;

        while !self.try_read(')') {
            let arg_name = self.read_value_name()?;
            let arg_idx = self.ir.values.len() as u32;

            self.define_value(arg_name, arg_idx)?;
            self.ir.values.push(Value {
                name: arg_name.to_string(),
                value_type: ValueType::Arg,
                op: Operation::None,
                op_count: 0,
                op_begin_idx: 0,
                op_end_idx: 0,
                symbol: String::new(),
                imms: Vec::new(),
                case_labels: Vec::new(),
            });

            if !self.try_read(',') && self.current_char() != Some(')') {
                return Err("Expected ',' or ')' in argument list".to_string());
            }
        }

        let arg_end_idx = self.ir.values.len() as u32;

        // Parse function body
        self.expect('{')?;

        let block_begin_idx = self.ir.blocks.len() as u32;
        while !self.try_read('}') {
            if self.is_eof() {
                return Err(format!("Unterminated body of function '{}'", func_name));
            }
            self.parse_block()?;
        }
        let block_end_idx = self.ir.blocks.len() as u32;
        if block_begin_idx == block_end_idx {
            return Err(format!("Function '{}' has no blocks", func_name));
        }

        // Resolve references for this function
        self.resolve_function_references()?;

        self.funcs.insert(func_name, func_idx);
        self.ir.functions.push(Function {
            name: func_name.to_string(),
            block_begin_idx,
            block_end_idx,
            arg_begin_idx,
            arg_end_idx,
        });

        Ok(())
    }

    fn define_value(&mut self, name: &'a str, idx: u32) -> Result<(), String> {
        if self.values.insert(name, idx).is_some() {
            return Err(format!("Value '%{}' defined twice", name));
        }
        Ok(())
    }

    fn parse_block(&mut self) -> Result<(), String> {
        self.skip_whitespace(true);
        let block_name = self.read_identifier()?;
        self.expect(':')?;

        let block_idx = self.ir.blocks.len() as u32;
        if self.blocks.insert(block_name, block_idx).is_some() {
            return Err(format!("Block '{}' defined twice", block_name));
        }

        let inst_begin_idx = self.ir.values.len() as u32;
        let mut phi_end_idx = inst_begin_idx;
        let mut terminated = false;

        // We'll collect successors after parsing all instructions
        let mut successor_refs = Vec::new();

        while !self.is_at_block_end() {
            if self.is_eof() {
                break;
            }
            if terminated {
                return Err(format!("Statement after the terminator of block '{}'", block_name));
            }

            if let Some(op) = self.peek_phi() {
                // Only allow PHIs if we haven't parsed any non-PHI instructions yet
                if self.ir.values.len() as u32 > phi_end_idx {
                    return Err("PHI nodes must be at the beginning of a block".to_string());
                }
                self.parse_phi(op)?;
                phi_end_idx = self.ir.values.len() as u32;
            } else {
                let first = self.ir.values.len() as u32 == phi_end_idx;
                let op = self.parse_instruction(&mut successor_refs)?;
                if op == Operation::Label && !first {
                    return Err(format!("Label of block '{}' must be its first statement", block_name));
                }
                terminated = op.info().is_terminator;
            }
        }

        let inst_end_idx = self.ir.values.len() as u32;

        // Now add successor references to value_operands
        let succ_begin_idx = self.ir.value_operands.len() as u32;
        for succ_name in &successor_refs {
            self.block_resolves.push(Resolve {
                name: succ_name,
                index: self.ir.value_operands.len() as u32,
            });
            self.ir.value_operands.push(0); // Placeholder
        }
        let succ_end_idx = self.ir.value_operands.len() as u32;

        self.ir.blocks.push(Block {
            name: block_name.to_string(),
            succ_begin_idx,
            succ_end_idx,
            inst_begin_idx,
            phi_end_idx,
            inst_end_idx,
        });

        Ok(())
    }

    fn is_at_block_end(&mut self) -> bool {
        self.skip_whitespace(true);

        // At end of function
        if self.current_char() == Some('}') || self.is_eof() {
            return true;
        }

        // Next block starts
        let saved_pos = self.pos;
        let has_colon = match self.read_identifier() {
            Ok(_) => {
                self.skip_whitespace(true);
                self.current_char() == Some(':')
            }
            Err(_) => false,
        };
        self.pos = saved_pos;
        has_colon
    }

    fn is_at_line_end(&self) -> bool {
        for ch in self.text[self.pos..].chars() {
            match ch {
                '\n' | ';' => return true,
                ' ' | '\t' | '\r' => continue,
                _ => return false,
            }
        }
        true
    }

    fn peek_phi(&mut self) -> Option<Operation> {
        let saved_pos = self.pos;
        self.skip_whitespace(true);

        let mut result = None;
        if self.current_char() == Some('%') {
            self.advance();
            if self.read_identifier().is_ok() && self.try_read('=') {
                self.skip_whitespace(false);
                result = match self.read_identifier() {
                    Ok("phi") => Some(Operation::Phi),
                    Ok("vphi") => Some(Operation::VPhi),
                    _ => None,
                };
            }
        }

        self.pos = saved_pos;
        result
    }

    fn push_value_ref(&mut self, name: &'a str) {
        self.value_resolves.push(Resolve {
            name,
            index: self.ir.value_operands.len() as u32,
        });
        self.ir.value_operands.push(0); // Placeholder
    }

    fn push_block_ref(&mut self, name: &'a str) {
        self.block_resolves.push(Resolve {
            name,
            index: self.ir.value_operands.len() as u32,
        });
        self.ir.value_operands.push(0); // Placeholder
    }

    fn parse_phi(&mut self, op: Operation) -> Result<(), String> {
        let name = self.read_value_name()?;
        self.expect('=')?;
        self.read_identifier()?;

        let val_idx = self.ir.values.len() as u32;
        self.define_value(name, val_idx)?;

        // Parse incoming values: [^block, %value], ...
        let mut incoming = Vec::new();
        loop {
            self.expect('[')?;
            let block_name = self.read_block_name()?;
            self.expect(',')?;
            let val_name = self.read_value_name()?;
            self.expect(']')?;
            incoming.push((val_name, block_name));

            self.skip_whitespace(false);
            if self.current_char() != Some(',') {
                break;
            }
            self.advance();
        }

        // Values first, then blocks
        let op_begin_idx = self.ir.value_operands.len() as u32;
        for (val_name, _) in &incoming {
            self.push_value_ref(val_name);
        }
        for (_, block_name) in &incoming {
            self.push_block_ref(block_name);
        }
        let op_end_idx = self.ir.value_operands.len() as u32;

        self.ir.values.push(Value {
            name: name.to_string(),
            value_type: ValueType::Phi,
            op,
            op_count: incoming.len() as u32,
            op_begin_idx,
            op_end_idx,
            symbol: String::new(),
            imms: Vec::new(),
            case_labels: Vec::new(),
        });

        Ok(())
    }

    fn parse_instruction(&mut self, successors: &mut Vec<&'a str>) -> Result<Operation, String> {
        self.skip_whitespace(true);

        // Check for value definition
        let (name, op) = if self.current_char() == Some('%') {
            let name = self.read_value_name()?;
            self.expect('=')?;

            // Check if there's an operation or just empty value definition
            self.skip_whitespace(false);

            let op = if self.is_at_line_end() || self.current_char() == Some('%') {
                // "any" operation, with or without operands
                Operation::Any
            } else {
                let op_str = self.read_identifier()?;
                Operation::parse(op_str).ok_or_else(|| format!("Unknown operation: {}", op_str))?
            };

            (Some(name), op)
        } else {
            let op_str = self.read_identifier()?;
            let op =
                Operation::parse(op_str).ok_or_else(|| format!("Unknown operation: {}", op_str))?;
            (None, op)
        };

        let info = op.info();

        // Check consistency
        if name.is_some() && !info.is_def {
            return Err(format!(
                "Operation '{}' does not produce a value",
                info.name
            ));
        }
        if name.is_none() && info.is_def && op != Operation::Call {
            return Err(format!("Operation '{}' requires a result value", info.name));
        }

        let val_idx = self.ir.values.len() as u32;
        if let Some(name) = name {
            self.define_value(name, val_idx)?;
        }

        let op_begin_idx = self.ir.value_operands.len() as u32;
        let mut op_count = if info.op_count == !0 { 0 } else { info.op_count };
        let mut symbol = String::new();
        let mut imms = Vec::new();
        let mut case_labels = Vec::new();

        match op {
            Operation::Const => {
                imms.push(self.read_number()?);
            }
            Operation::Add
            | Operation::Sub
            | Operation::Mul
            | Operation::Lt
            | Operation::Gt
            | Operation::Eq => {
                // binary ops: add %a, %b
                let a_name = self.read_value_name()?;
                self.expect(',')?;
                let b_name = self.read_value_name()?;
                self.push_value_ref(a_name);
                self.push_value_ref(b_name);
            }
            Operation::Copy | Operation::VUse => {
                let src = self.read_value_name()?;
                self.push_value_ref(src);
            }
            Operation::Init => {
                // init %v, <value>
                let var = self.read_value_name()?;
                self.expect(',')?;
                imms.push(self.read_number()?);
                self.push_value_ref(var);
            }
            Operation::Label => {
                symbol = self.read_identifier()?.to_string();
            }
            Operation::Asm => {}
            Operation::Call => {
                // call @func_name or call @func_name, %arg1, %arg2
                self.skip_whitespace(false);
                if self.current_char() != Some('@') {
                    return Err("Expected '@' before function name in call".to_string());
                }
                self.advance();
                symbol = self.read_identifier()?.to_string();

                self.skip_whitespace(false);
                while self.current_char() == Some(',') {
                    self.advance();
                    let arg_name = self.read_value_name()?;
                    self.push_value_ref(arg_name);
                    op_count += 1;
                    self.skip_whitespace(false);
                }
            }
            Operation::Any => {
                // Comma-separated value references, possibly none
                self.skip_whitespace(false);
                while self.current_char() == Some('%') {
                    let val_name = self.read_value_name()?;
                    self.push_value_ref(val_name);
                    op_count += 1;
                    self.skip_whitespace(false);
                    if self.current_char() != Some(',') {
                        break;
                    }
                    self.advance();
                    self.skip_whitespace(false);
                }
            }
            Operation::Ret => {
                // ret or ret %value
                self.skip_whitespace(false);
                if !self.is_at_line_end() {
                    let val_name = self.read_value_name()?;
                    self.push_value_ref(val_name);
                    op_count = 1;
                }
            }
            Operation::Br | Operation::Goto => {
                let block_name = self.read_block_name()?;
                self.push_block_ref(block_name);
                successors.push(block_name);
            }
            Operation::CondBr | Operation::Loop => {
                // condbr %cond, ^true_block, ^false_block
                let cond_name = self.read_value_name()?;
                self.expect(',')?;
                let true_block = self.read_block_name()?;
                self.expect(',')?;
                let false_block = self.read_block_name()?;

                self.push_value_ref(cond_name);
                self.push_block_ref(true_block);
                self.push_block_ref(false_block);
                successors.push(true_block);
                successors.push(false_block);
            }
            Operation::MultiIf => {
                // multiif [%c1, ^a], [%c2, ^b], [^else]
                let mut arms: Vec<MultiIfArm<'a>> = Vec::new();
                loop {
                    self.expect('[')?;
                    self.skip_whitespace(true);
                    let cond = if self.current_char() == Some('%') {
                        let cond = self.read_value_name()?;
                        self.expect(',')?;
                        Some(cond)
                    } else {
                        None
                    };
                    let target = self.read_block_name()?;
                    self.expect(']')?;
                    if arms.last().is_some_and(|arm| arm.cond.is_none()) {
                        return Err("Only the last arm of a multiif may omit its condition".to_string());
                    }
                    if arms.is_empty() && cond.is_none() {
                        return Err("The first arm of a multiif needs a condition".to_string());
                    }
                    arms.push(MultiIfArm { cond, target });

                    self.skip_whitespace(false);
                    if self.current_char() != Some(',') {
                        break;
                    }
                    self.advance();
                }

                for arm in &arms {
                    if let Some(cond) = arm.cond {
                        self.push_value_ref(cond);
                        op_count += 1;
                    }
                }
                for arm in &arms {
                    self.push_block_ref(arm.target);
                    successors.push(arm.target);
                }
            }
            Operation::Switch => {
                // switch %v, [1, ^a], [default, ^b]
                let selector = self.read_value_name()?;
                self.push_value_ref(selector);
                while self.try_read(',') {
                    self.expect('[')?;
                    self.skip_whitespace(true);
                    let case = if self.current_char().is_some_and(|ch| ch.is_alphabetic()) {
                        match self.read_identifier()? {
                            "default" => None,
                            other => return Err(format!("Expected case value but found '{}'", other)),
                        }
                    } else {
                        Some(self.read_number()?)
                    };
                    self.expect(',')?;
                    let target = self.read_block_name()?;
                    self.expect(']')?;
                    case_labels.push(case);
                    self.push_block_ref(target);
                    successors.push(target);
                }
                if case_labels.is_empty() {
                    return Err("A switch needs at least one arm".to_string());
                }
            }
            Operation::None | Operation::Phi | Operation::VPhi => {
                return Err(format!("Unexpected '{}' statement", info.name));
            }
        }

        let op_end_idx = self.ir.value_operands.len() as u32;

        self.ir.values.push(Value {
            name: name.map(|n| n.to_string()).unwrap_or_default(),
            value_type: if info.is_terminator {
                ValueType::Terminator
            } else {
                ValueType::Normal
            },
            op,
            op_count,
            op_begin_idx,
            op_end_idx,
            symbol,
            imms,
            case_labels,
        });

        Ok(op)
    }

    fn resolve_function_references(&mut self) -> Result<(), String> {
        // Resolve value references
        for resolve in &self.value_resolves {
            if let Some(&idx) = self.values.get(resolve.name) {
                self.ir.value_operands[resolve.index as usize] = idx;
            } else {
                return Err(format!("Undefined value reference: {}", resolve.name));
            }
        }

        // Resolve block references
        for resolve in &self.block_resolves {
            if let Some(&idx) = self.blocks.get(resolve.name) {
                self.ir.value_operands[resolve.index as usize] = idx;
            } else {
                return Err(format!("Undefined block reference: {}", resolve.name));
            }
        }

        Ok(())
    }
}
