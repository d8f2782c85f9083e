// This module provides arena-based emission session management using the bumpalo crate.
// EmissionSession owns nothing per function: every function body is emitted with fresh,
// call-owned state. What the session does hold is what legitimately outlives a single
// function: the arena in which label and temporary names are interned (so renaming
// tables can hand out &'arena str instead of cloning Strings), the number of times each
// function has been emitted (the pass number disambiguates synthetic labels when the
// same function is emitted again), and statistics about the work done. Interior
// mutability through RefCell keeps the session shareable by reference across the
// writer, the label policy and the phi eliminator; the session is single-threaded.

//! Arena-based emission session management.
//!
//! All interned names are tied to the session lifetime, so per-function tables
//! can borrow them without lifetime gymnastics.

use bumpalo::Bump;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::fmt;

/// Arena-based emission session.
pub struct EmissionSession<'arena> {
    /// Arena allocator for interned names.
    arena: &'arena Bump,

    /// String interning for efficient storage.
    interned_strings: RefCell<HashMap<String, &'arena str>>,

    /// Emission passes per function name.
    passes: RefCell<HashMap<String, u32>>,

    /// Session statistics for debugging.
    stats: RefCell<SessionStats>,
}

impl<'arena> EmissionSession<'arena> {
    /// Create a new emission session with the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            interned_strings: RefCell::new(HashMap::new()),
            passes: RefCell::new(HashMap::new()),
            stats: RefCell::new(SessionStats::default()),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Intern a string in the arena.
    pub fn intern_str(&self, s: &str) -> &'arena str {
        let mut strings = self.interned_strings.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }

        let interned = self.arena.alloc_str(s);
        strings.insert(s.to_string(), interned);
        interned
    }

    /// Start a new emission pass of `func` and return its number, starting at 1.
    pub fn begin_function(&self, func: &str) -> u32 {
        let mut passes = self.passes.borrow_mut();
        let pass = passes.entry(func.to_string()).or_insert(0);
        *pass += 1;
        *pass
    }

    /// Number of completed or running passes of `func`.
    pub fn passes_of(&self, func: &str) -> u32 {
        self.passes.borrow().get(func).copied().unwrap_or(0)
    }

    /// Record that a function body was emitted.
    pub fn record_function_emitted(&self, name: &str, blocks: usize, text_len: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.functions_emitted += 1;
        stats.blocks_emitted += blocks;
        stats.total_text_size += text_len;

        if stats.largest_function_size < text_len {
            stats.largest_function_size = text_len;
            stats.largest_function_name = name.to_string();
        }
    }

    /// Record a jump emitted as `goto`.
    pub fn record_goto(&self) {
        self.stats.borrow_mut().gotos_emitted += 1;
    }

    /// Record a synthetic label printed.
    pub fn record_label(&self) {
        self.stats.borrow_mut().labels_emitted += 1;
    }

    /// Record phi copies and temporaries created for one function.
    pub fn record_phi_copies(&self, copies: usize, temporaries: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.phi_copies += copies;
        stats.temporaries_created += temporaries;
    }

    /// Get emission statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Emission session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Number of function bodies emitted.
    pub functions_emitted: usize,

    /// Blocks rendered across all functions.
    pub blocks_emitted: usize,

    /// Total text size generated (bytes).
    pub total_text_size: usize,

    /// Largest function emitted (for analysis).
    pub largest_function_size: usize,

    /// Name of largest function.
    pub largest_function_name: String,

    /// Jumps that could not be structured.
    pub gotos_emitted: usize,

    /// Synthetic labels printed.
    pub labels_emitted: usize,

    /// Copy statements produced by phi elimination.
    pub phi_copies: usize,

    /// Temporaries introduced by phi elimination.
    pub temporaries_created: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Emission Session Statistics:")?;
        writeln!(f, "  Functions emitted: {}", self.functions_emitted)?;
        writeln!(f, "  Blocks emitted: {}", self.blocks_emitted)?;
        writeln!(f, "  Total text size: {} bytes", self.total_text_size)?;
        writeln!(f, "  Gotos emitted: {}", self.gotos_emitted)?;
        writeln!(f, "  Labels emitted: {}", self.labels_emitted)?;
        writeln!(f, "  Phi copies: {}", self.phi_copies)?;
        writeln!(f, "  Temporaries created: {}", self.temporaries_created)?;

        if !self.largest_function_name.is_empty() {
            writeln!(
                f,
                "  Largest function: {} ({} bytes)",
                self.largest_function_name, self.largest_function_size
            )?;
        }

        Ok(())
    }
}
