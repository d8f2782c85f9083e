//! FileCheck-style test validation for TIR files.
//!
//! This module provides functionality to parse CHECK directives from TIR files
//! and validate output against expected patterns, similar to LLVM's FileCheck tool
//! but implemented in a Rust-native way.

use super::{TestIR, TestIRAdaptor, TirDeclarationPrinter, TirRenderer};
use crate::core::{Analyzer, BlockId, DominanceOracle, EmissionSession, IrAdaptor};
use crate::writer::{FunctionWriter, WriterConfig};
use bumpalo::Bump;
use std::collections::VecDeque;

/// A CHECK directive extracted from a TIR file
#[derive(Debug, Clone)]
pub enum CheckDirective {
    /// CHECK: pattern - Match exact pattern
    Check(String),
    /// CHECK-LABEL: pattern - Label for a section
    CheckLabel(String),
    /// CHECK-NEXT: pattern - Match on the next line
    CheckNext(String),
    /// CHECK-EMPTY - Match empty line
    CheckEmpty,
    /// CHECK-NOT: pattern - Pattern must not occur before the next match
    CheckNot(String),
    /// COM: comment - Comment, ignored
    Comment(String),
}

/// A RUN directive specifying how to execute the test
#[derive(Debug, Clone)]
pub struct RunDirective {
    pub command: String,
    pub args: Vec<String>,
}

/// Test specification extracted from a TIR file
#[derive(Debug)]
pub struct TestSpec {
    pub run_directives: Vec<RunDirective>,
    pub check_directives: Vec<CheckDirective>,
    pub tir_content: String,
}

impl TestSpec {
    /// Parse a TIR file to extract test specifications
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut run_directives = Vec::new();
        let mut check_directives = Vec::new();
        let mut tir_lines = Vec::new();

        for line in content.lines() {
            let trimmed = line.trim();

            if let Some(run_cmd) = trimmed.strip_prefix("; RUN:") {
                let parts: Vec<&str> = run_cmd.split_whitespace().collect();
                if let Some((command, args)) = parts.split_first() {
                    run_directives.push(RunDirective {
                        command: command.to_string(),
                        args: args.iter().map(|s| s.to_string()).collect(),
                    });
                }
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK-LABEL:") {
                check_directives.push(CheckDirective::CheckLabel(pattern.trim().to_string()));
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK-NEXT:") {
                check_directives.push(CheckDirective::CheckNext(pattern.trim().to_string()));
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK-NOT:") {
                check_directives.push(CheckDirective::CheckNot(pattern.trim().to_string()));
            } else if trimmed.starts_with("; CHECK-EMPTY") {
                check_directives.push(CheckDirective::CheckEmpty);
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK:") {
                check_directives.push(CheckDirective::Check(pattern.trim().to_string()));
            } else if let Some(comment) = trimmed.strip_prefix("; COM:") {
                check_directives.push(CheckDirective::Comment(comment.trim().to_string()));
            } else {
                // Regular TIR content
                tir_lines.push(line);
            }
        }

        Ok(TestSpec {
            run_directives,
            check_directives,
            tir_content: tir_lines.join("\n"),
        })
    }
}

/// Test runner that executes TIR tests
pub struct TestRunner {
    verbose: bool,
}

impl TestRunner {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Run a TIR test and validate output
    pub fn run_test(&self, spec: &TestSpec) -> Result<(), String> {
        // `; RUN: not %cwrite ...` expects the input to be rejected
        let expect_failure = spec.run_directives.iter().any(|run| run.command == "not");

        // Parse the TIR content
        let ir = match TestIR::parse(&spec.tir_content) {
            Ok(_) if expect_failure => {
                return Err("Expected parse failure but succeeded".to_string())
            }
            Ok(ir) => ir,
            Err(e) if expect_failure => {
                return self.validate_output(&format!("error: {}", e), &spec.check_directives)
            }
            Err(e) => return Err(e.to_string()),
        };

        // Execute based on run directives
        for run_dir in &spec.run_directives {
            let output = self.execute_command(&ir, run_dir)?;
            if self.verbose {
                println!("{}", output);
            }
            self.validate_output(&output, &spec.check_directives)?;
        }

        Ok(())
    }

    /// Execute a test command and return the output
    fn execute_command(&self, ir: &TestIR, run_dir: &RunDirective) -> Result<String, String> {
        // Parse command arguments
        let mut print_ir = false;
        let mut print_rpo = false;
        let mut print_doms = false;
        let mut emit = false;
        let mut passes = 1;
        let mut config = WriterConfig::default();

        for (i, arg) in run_dir.args.iter().enumerate() {
            match arg.as_str() {
                "--print-ir" => print_ir = true,
                "--print-rpo" => print_rpo = true,
                "--print-doms" => print_doms = true,
                "--emit" => emit = true,
                "--verbose-blocks" => config.verbose = true,
                "--passes" => {
                    passes = run_dir
                        .args
                        .get(i + 1)
                        .and_then(|n| n.parse().ok())
                        .ok_or_else(|| "--passes needs a number".to_string())?;
                }
                _ => {}
            }
        }

        let mut output = Vec::new();

        if print_ir {
            output.push(format!("{}", ir));
        }

        let arena = Bump::new();
        let session = EmissionSession::new(&arena);
        let writer = FunctionWriter::with_config(&session, config);
        let mut adaptor = TestIRAdaptor::new(ir);

        for func in 0..adaptor.func_count() {
            adaptor.switch_func(func);
            let func_name = adaptor.func_name().to_string();
            let analyzer = Analyzer::for_function(&adaptor);

            if print_rpo {
                output.push(format!("RPO for func {}", func_name));
                for (idx, block) in analyzer.order().iter().enumerate() {
                    output.push(format!("{}: {}", idx, adaptor.block_name(*block)));
                }
                output.push("End RPO".to_string());
            }

            if print_doms {
                output.push(format!("Dominators for {}", func_name));
                for &block in analyzer.order() {
                    let name = |b: Option<BlockId>| {
                        b.map_or_else(|| "-".to_string(), |b| adaptor.block_name(b).to_string())
                    };
                    output.push(format!(
                        "{}: idom {}, ipdom {}",
                        adaptor.block_name(block),
                        name(analyzer.immediate_dominator(block)),
                        name(analyzer.immediate_post_dominator(block))
                    ));
                }
                for (from, to) in analyzer.feedback_edges() {
                    output.push(format!(
                        "feedback {} -> {}",
                        adaptor.block_name(from),
                        adaptor.block_name(to)
                    ));
                }
                output.push("End Dominators".to_string());
            }

            if emit {
                for _ in 0..passes {
                    output.push(format!("Function {}", func_name));
                    match writer.emit_function_body(&adaptor, &analyzer, &TirRenderer) {
                        Ok(body) => {
                            let decls = body
                                .declarations(&adaptor, &TirDeclarationPrinter)
                                .map_err(|e| e.to_string())?;
                            if !decls.is_empty() {
                                output.push(decls.trim_end().to_string());
                            }
                            output.push(body.text.trim_end().to_string());
                        }
                        Err(err) => output.push(format!("error: {}", err)),
                    }
                    output.push(format!("End Function {}", func_name));
                }
            }
        }

        Ok(output.join("\n"))
    }

    /// Validate output against CHECK directives
    pub fn validate_output(
        &self,
        output: &str,
        directives: &[CheckDirective],
    ) -> Result<(), String> {
        let output_lines: VecDeque<_> = output.lines().collect();
        let mut line_idx = 0;
        let mut pending_not: Vec<&str> = Vec::new();

        for directive in directives {
            match directive {
                CheckDirective::Comment(_) => continue,

                CheckDirective::CheckNot(pattern) => pending_not.push(pattern),

                CheckDirective::Check(pattern) | CheckDirective::CheckLabel(pattern) => {
                    let kind = match directive {
                        CheckDirective::CheckLabel(_) => "CHECK-LABEL",
                        _ => "CHECK",
                    };
                    let found = output_lines
                        .iter()
                        .skip(line_idx)
                        .position(|line| line.contains(pattern.as_str()));

                    match found {
                        Some(idx) => {
                            Self::reject(&output_lines, line_idx, line_idx + idx, &mut pending_not)?;
                            line_idx += idx + 1; // Move to the next line after the match
                            if self.verbose {
                                println!("{}: '{}' found at line {}", kind, pattern, line_idx - 1);
                            }
                        }
                        None => {
                            return Err(format!(
                                "{}: pattern '{}' not found in output",
                                kind, pattern
                            ));
                        }
                    }
                }

                CheckDirective::CheckNext(pattern) => {
                    if line_idx >= output_lines.len() {
                        return Err(format!("CHECK-NEXT: no more lines, expected '{}'", pattern));
                    }

                    let line = output_lines[line_idx];
                    if !line.contains(pattern.as_str()) {
                        return Err(format!(
                            "CHECK-NEXT: expected '{}' but got '{}'",
                            pattern, line
                        ));
                    }
                    Self::reject(&output_lines, line_idx, line_idx, &mut pending_not)?;

                    if self.verbose {
                        println!("CHECK-NEXT: '{}' matches at line {}", pattern, line_idx);
                    }
                    line_idx += 1;
                }

                CheckDirective::CheckEmpty => {
                    if line_idx >= output_lines.len() {
                        continue; // End of output counts as empty
                    }

                    let line = output_lines[line_idx];
                    if !line.trim().is_empty() {
                        return Err(format!(
                            "CHECK-EMPTY: expected empty line but got '{}'",
                            line
                        ));
                    }

                    if self.verbose {
                        println!("CHECK-EMPTY: matches at line {}", line_idx);
                    }
                    line_idx += 1;
                }
            }
        }

        Self::reject(&output_lines, line_idx, output_lines.len(), &mut pending_not)
    }

    /// Fail if a pending CHECK-NOT pattern occurs in `lines[from..to]`.
    fn reject(
        lines: &VecDeque<&str>,
        from: usize,
        to: usize,
        pending_not: &mut Vec<&str>,
    ) -> Result<(), String> {
        for pattern in pending_not.drain(..) {
            if let Some(line) = lines
                .iter()
                .take(to)
                .skip(from)
                .find(|line| line.contains(pattern))
            {
                return Err(format!("CHECK-NOT: pattern '{}' found in '{}'", pattern, line));
            }
        }
        Ok(())
    }
}
