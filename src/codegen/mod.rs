//! Component B: the cache state.
//!
//! `CacheState` is the symbolic model of locals and the operand stack
//! described in spec §3-§4.B: an ordered sequence of [`VarState`] slots, a
//! use-count per cache register, and the frame/allocator it consults to
//! spill and fill. It corresponds to the teacher's own `CodeGenContext`
//! (`context.rs`), which similarly aggregates a register allocator, a
//! value stack and a frame behind one type — generalized here to the
//! spec's use-count bookkeeping, which the teacher's production `Val`
//! design doesn't need because it tracks single ownership per register
//! rather than a reference count.
//!
//! Like the teacher's `CodeGenContext::spill_impl`, operations that need to
//! spill a register while *also* touching the slots that reference it are
//! written as associated functions over destructured, disjoint `&mut`
//! borrows of this struct's fields — `self.regalloc.get_unused(..., |v|
//! ...)` can't also capture `&mut self` for the spill callback, so the
//! fields are split up front.

pub mod control;

use crate::error::BailoutReason;
use crate::frame::Frame;
use crate::masm::{Imm, MacroAssembler};
use crate::reg::{CacheRegisterList, Reg};
use crate::regalloc::RegAlloc;
use crate::stack::{Location, Slots, VarState};
use crate::value::{RegClass, WasmType};
use std::collections::HashMap;

/// Number of cache-state slots (locals + operand stack) a function may
/// never exceed the operand-stack portion of. Exceeding it is a bailout
/// (spec §3 invariant 4), never an internal error.
pub const MAX_STACK_HEIGHT: u32 = 4096;

type UseCounts = HashMap<Reg, u32>;

/// The symbolic locals + operand-stack model for one function body (or one
/// block's snapshot of it).
///
/// Cheap to [`Clone`] by design (spec §9: "a value type with explicit
/// clone; snapshots are copies, not aliases") — block entry/exit takes a
/// snapshot via [`CacheState::split`] or reconciles one via
/// [`CacheState::merge_into`], never aliasing the live compiler state.
#[derive(Clone)]
pub struct CacheState {
    num_locals: u32,
    frame: Frame,
    regalloc: RegAlloc,
    slots: Slots,
    use_counts: UseCounts,
}

impl CacheState {
    /// Construct an empty cache state: `num_locals` slots, all starting on
    /// the stack (matching a conservative ABI where parameters are spilled
    /// to their home slots by the prologue before translation begins).
    pub fn new(num_locals: u32, local_types: &[WasmType], registers: CacheRegisterList) -> Self {
        assert_eq!(local_types.len(), num_locals as usize);
        let max_height = num_locals + MAX_STACK_HEIGHT;
        let slots = local_types.iter().map(|ty| VarState::on_stack(*ty)).collect();
        Self {
            num_locals,
            frame: Frame::new(num_locals, max_height),
            regalloc: RegAlloc::new(registers),
            slots,
            use_counts: HashMap::new(),
        }
    }

    pub fn num_locals(&self) -> u32 {
        self.num_locals
    }

    pub fn height(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn use_count(&self, reg: Reg) -> u32 {
        self.use_counts.get(&reg).copied().unwrap_or(0)
    }

    pub fn has_free(&self, class: RegClass) -> bool {
        self.regalloc.has_free(class)
    }

    fn local_mut(&mut self, index: u32) -> &mut VarState {
        &mut self.slots[index as usize]
    }

    pub fn local(&self, index: u32) -> VarState {
        self.slots[index as usize]
    }

    pub fn peek(&self) -> VarState {
        *self.slots.last().expect("operand stack is non-empty")
    }

    /// Bails if the operand stack has grown past [`MAX_STACK_HEIGHT`].
    /// Called after every opcode that can push, per spec §4.C step 4.
    pub fn check_stack_size_limit(&self) -> Result<(), BailoutReason> {
        let operand_height = self.height() - self.num_locals;
        if operand_height > MAX_STACK_HEIGHT {
            Err(BailoutReason::StackTooDeep {
                max: MAX_STACK_HEIGHT,
            })
        } else {
            Ok(())
        }
    }

    /// Obtain a register of `class` for transient use (e.g. a globals-base
    /// pointer) that is never pushed onto the cache state itself. The
    /// caller must release it with [`Self::free_reg`] once done.
    pub fn scratch_register<M: MacroAssembler>(&mut self, class: RegClass, masm: &mut M) -> Reg {
        self.get_register(class, &[], masm)
    }

    // ---- register acquisition, split for disjoint self-borrows --------

    /// Obtain a register of `class`, spilling a victim if none is free.
    fn get_register<M: MacroAssembler>(
        &mut self,
        class: RegClass,
        pinned: &[Reg],
        masm: &mut M,
    ) -> Reg {
        let CacheState {
            regalloc,
            slots,
            use_counts,
            frame,
            ..
        } = self;
        regalloc.get_unused(class, pinned, |victim| {
            Self::spill_victim(slots, use_counts, frame, victim, masm)
        })
    }

    /// Spill every slot referencing `victim`, as the allocator's spill
    /// callback. Static so it can take disjoint borrows of the fields it
    /// needs rather than all of `self` (see module docs).
    fn spill_victim<M: MacroAssembler>(
        slots: &mut Slots,
        use_counts: &mut UseCounts,
        frame: &Frame,
        victim: Reg,
        masm: &mut M,
    ) {
        for (idx, slot) in slots.iter_mut().enumerate() {
            if slot.location == Location::Register(victim) {
                let offset = frame.slot_offset(idx as u32);
                log::trace!("spilling slot {idx} ({victim}) to frame offset {offset}");
                masm.spill(offset, victim);
                slot.location = Location::Stack;
            }
        }
        use_counts.remove(&victim);
    }

    fn decrement(&mut self, reg: Reg) {
        match self.use_counts.get_mut(&reg) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.use_counts.remove(&reg);
            }
            None => debug_assert!(false, "decrementing a register with no recorded use count"),
        }
    }

    fn increment(&mut self, reg: Reg) {
        *self.use_counts.entry(reg).or_insert(0) += 1;
    }

    // ---- spec §4.B operations -------------------------------------------

    /// Append a register-resident slot, incrementing its use count. The
    /// caller must already hold `r` as taken in the allocator (fresh from
    /// [`Self::get_register`]/[`Self::pop_to_register`], or re-pushing a
    /// value this cache state already owns, e.g. `local.get` of a
    /// register-resident local).
    pub fn push_register(&mut self, ty: WasmType, r: Reg) {
        self.slots.push(VarState::in_register(ty, r));
        self.increment(r);
    }

    /// Append a compile-time integer constant. Non-integer constants must
    /// be materialised via [`Self::push_register`] first.
    pub fn push_constant(&mut self, ty: WasmType, c: i64) {
        assert_eq!(
            ty.reg_class(),
            RegClass::Int,
            "floating-point constants must be materialised before pushing"
        );
        self.slots.push(VarState::constant(ty, c));
    }

    /// Materialise the top slot into a register of `class`, removing the
    /// slot. The returned register remains taken in the allocator — the
    /// caller now owns it and must either push it back or call
    /// [`Self::free_reg`] once done with it.
    pub fn pop_to_register<M: MacroAssembler>(
        &mut self,
        class: RegClass,
        pinned: &[Reg],
        masm: &mut M,
    ) -> Reg {
        let top = self.slots.pop().expect("pop_to_register on an empty stack");
        match top.location {
            Location::Register(r) => {
                debug_assert_eq!(r.class(), class);
                self.decrement(r);
                r
            }
            Location::Constant(c) => {
                let r = self.get_register(class, pinned, masm);
                masm.load_constant(r, Imm(c));
                r
            }
            Location::Stack => {
                let r = self.get_register(class, pinned, masm);
                let offset = self.frame.slot_offset(self.slots.len() as u32);
                masm.fill(r, offset);
                r
            }
        }
    }

    /// Release a register the caller obtained via [`Self::pop_to_register`]
    /// but is discarding rather than pushing back (e.g. a consumed binop
    /// operand, a branch condition). A no-op if some other slot — a local
    /// aliased into the same register — still references it; the
    /// allocator only sees it back once the last reference is gone.
    pub fn free_reg(&mut self, reg: Reg) {
        if self.use_count(reg) == 0 {
            self.regalloc.free(reg);
        }
    }

    /// Choose a destination register for a binary op consuming `lhs` and
    /// `rhs` (both already popped). Reuses an operand's register when it
    /// is the sole remaining reference to it; otherwise allocates fresh.
    pub fn get_binary_op_target<M: MacroAssembler>(
        &mut self,
        class: RegClass,
        lhs: Reg,
        rhs: Reg,
        masm: &mut M,
    ) -> Reg {
        if lhs == rhs {
            return lhs;
        }
        let rhs_reclaimable = self.use_count(rhs) == 0;
        let lhs_reclaimable = self.use_count(lhs) == 0;
        match (rhs_reclaimable, lhs_reclaimable) {
            (true, true) => {
                self.free_reg(lhs);
                rhs
            }
            (true, false) => rhs,
            (false, true) => lhs,
            (false, false) => self.get_register(class, &[lhs, rhs], masm),
        }
    }

    /// Drop the top slot outright: if register-resident, decrement its use
    /// count and free the register in the allocator once nothing else
    /// references it. Unlike [`Self::pop_to_register`], the value is never
    /// handed back to the caller.
    pub fn drop_top(&mut self) {
        let top = self.slots.pop().expect("drop_top on an empty stack");
        if let Location::Register(r) = top.location {
            self.decrement(r);
            if self.use_count(r) == 0 {
                self.regalloc.free(r);
            }
        }
    }

    /// Spill every local currently in a register or holding a constant.
    /// Idempotent: a local already `Stack` is left untouched, so a second
    /// call emits no additional stores.
    pub fn spill_locals<M: MacroAssembler>(&mut self, masm: &mut M) {
        for idx in 0..self.num_locals {
            let ty = self.slots[idx as usize].ty;
            let location = self.slots[idx as usize].location;
            match location {
                Location::Stack => continue,
                Location::Register(r) => {
                    let offset = self.frame.slot_offset(idx);
                    masm.spill(offset, r);
                    self.decrement(r);
                    if self.use_count(r) == 0 {
                        self.regalloc.free(r);
                    }
                }
                Location::Constant(c) => {
                    let scratch = self.get_register(ty.reg_class(), &[], masm);
                    masm.load_constant(scratch, Imm(c));
                    let offset = self.frame.slot_offset(idx);
                    masm.spill(offset, scratch);
                    self.regalloc.free(scratch);
                }
            }
            *self.local_mut(idx) = VarState::on_stack(ty);
        }
    }

    /// Request a fill of slot `index` into `reg`, without touching any
    /// cache-state bookkeeping — a raw primitive used by callers that
    /// already manage the slot's location themselves (e.g. the merge
    /// algorithm).
    pub fn fill<M: MacroAssembler>(&self, reg: Reg, index: u32, masm: &mut M) {
        let offset = self.frame.slot_offset(index);
        masm.fill(reg, offset);
    }

    /// Eagerly materialise a bit-pattern constant into a fresh register
    /// and push it. Used for `f32.const`, whose value is never
    /// representable as a `Location::Constant` (spec §3: floating-point
    /// constants are materialised eagerly).
    pub fn push_materialized<M: MacroAssembler>(&mut self, ty: WasmType, bits: i64, masm: &mut M) {
        let r = self.get_register(ty.reg_class(), &[], masm);
        masm.load_constant(r, Imm(bits));
        self.push_register(ty, r);
    }

    /// `local.get`: read local `index` without consuming it, caching a
    /// stack-resident local into a register so repeated reads don't keep
    /// re-filling (spec §4.C).
    pub fn read_local<M: MacroAssembler>(&mut self, index: u32, masm: &mut M) {
        let slot = self.slots[index as usize];
        match slot.location {
            Location::Register(r) => self.push_register(slot.ty, r),
            Location::Constant(c) => self.push_constant(slot.ty, c),
            Location::Stack => {
                let r = self.get_register(slot.ty.reg_class(), &[], masm);
                let offset = self.frame.slot_offset(index);
                masm.fill(r, offset);
                self.increment(r);
                self.slots[index as usize] = VarState::in_register(slot.ty, r);
                self.push_register(slot.ty, r);
            }
        }
    }

    /// `local.set` (`keep = false`) / `local.tee` (`keep = true`) (spec
    /// §4.C). Pops the top slot and writes it into local `index`.
    pub fn write_local<M: MacroAssembler>(&mut self, index: u32, keep: bool, masm: &mut M) {
        let top_idx = self.slots.len() - 1;
        let src = self.slots[top_idx];
        let dst = self.slots[index as usize];
        debug_assert_eq!(
            src.ty, dst.ty,
            "local.set/tee requires matching types (decoder-checked)"
        );

        match src.location {
            Location::Register(r) => {
                self.release_dst(dst.location);
                self.slots[index as usize] = VarState::in_register(src.ty, r);
                if keep {
                    self.increment(r);
                } else {
                    self.slots.pop();
                }
            }
            Location::Constant(c) => {
                self.release_dst(dst.location);
                self.slots[index as usize] = VarState::constant(src.ty, c);
                if !keep {
                    self.slots.pop();
                }
            }
            Location::Stack => {
                let offset = self.frame.slot_offset(top_idx as u32);
                let reuse = matches!(dst.location, Location::Register(r_dst) if self.use_count(r_dst) == 1);
                let r = if reuse {
                    let r_dst = dst.location.reg().unwrap();
                    masm.fill(r_dst, offset);
                    r_dst
                } else {
                    self.release_dst(dst.location);
                    let r_new = self.get_register(dst.ty.reg_class(), &[], masm);
                    masm.fill(r_new, offset);
                    r_new
                };
                self.slots.pop();
                self.slots[index as usize] = VarState::in_register(dst.ty, r);
                if !reuse {
                    self.increment(r);
                }
                if keep {
                    self.push_register(dst.ty, r);
                }
            }
        }
    }

    /// Release whatever register `dst` previously held, if any, as part
    /// of overwriting it in `write_local`.
    fn release_dst(&mut self, dst: Location) {
        if let Location::Register(r_dst_old) = dst {
            self.decrement(r_dst_old);
            if self.use_count(r_dst_old) == 0 {
                self.regalloc.free(r_dst_old);
            }
        }
    }

    // ---- merge algorithm (spec §4.B) ------------------------------------

    /// Split: copy the current state verbatim, for use as a fresh block's
    /// `label_state` when it has no predecessor yet (spec §4.B.3).
    pub fn split(&self) -> CacheState {
        self.clone()
    }

    /// Init-merge: build the canonical template a label's predecessors
    /// must all conform to (spec §4.B.1). `stack_base` is the height
    /// recorded when the target block was entered; `arity` is the number
    /// of top-of-stack values live across the edge.
    ///
    /// Pure: emits no code. The caller still needs to reconcile *this*
    /// (the establishing) cache state against the returned template via
    /// [`Self::merge_into`], which is what actually materialises any
    /// constant this function decided to demote.
    pub fn init_merge(&self, stack_base: u32, arity: u32) -> CacheState {
        let height = self.height();
        let window_start = height - arity;
        let mut target = self.clone();

        // Interior values below the live arity window are dead across the
        // edge; canonicalise them to Stack so future merges never need to
        // reconcile a register assignment nobody will read again.
        for idx in stack_base..window_start {
            let ty = target.slots[idx as usize].ty;
            target.slots[idx as usize] = VarState::on_stack(ty);
        }
        // The live window: keep a register assignment if one already
        // exists, otherwise canonicalise to Stack. Constants are always
        // demoted here — they only survive a merge when every predecessor
        // agrees, which this function can't know in advance.
        for idx in window_start..height {
            let ty = target.slots[idx as usize].ty;
            target.slots[idx as usize] = match target.slots[idx as usize].location {
                Location::Register(r) => VarState::in_register(ty, r),
                Location::Constant(_) | Location::Stack => VarState::on_stack(ty),
            };
        }
        target.recompute_use_counts();
        target
    }

    fn recompute_use_counts(&mut self) {
        self.use_counts.clear();
        for slot in self.slots.iter() {
            if let Location::Register(r) = slot.location {
                *self.use_counts.entry(r).or_insert(0) += 1;
            }
        }
    }

    /// Steal: replace the current state wholesale with `target`, dropping
    /// any transient bookkeeping of the state being replaced (spec
    /// §4.B.4). Used at block exit on a fall-through; by this point
    /// `target` and `self` already describe the same physical values
    /// (reconciled by a prior [`Self::merge_into`] call), so this is a
    /// plain move, not a place that emits code.
    pub fn steal(&mut self, target: CacheState) {
        *self = target;
    }

    /// Merge: reconcile `self` (the current, live cache state) against
    /// `target` (a block's `label_state`), emitting whatever moves,
    /// spills, fills or load-immediates are needed so `self` ends up
    /// shaped exactly like `target` (spec §4.B.2).
    pub fn merge_into<M: MacroAssembler>(&mut self, target: &CacheState, masm: &mut M) {
        assert_eq!(
            self.height(),
            target.height(),
            "merge requires matching heights (a type-system invariant upstream)"
        );

        let mut pending_moves: Vec<(usize, Reg, Reg)> = Vec::new();

        for idx in 0..self.height() as usize {
            let cur = self.slots[idx];
            let tgt = target.slots[idx];
            debug_assert_eq!(cur.ty, tgt.ty, "merge requires matching types per slot");

            match (cur.location, tgt.location) {
                (Location::Stack, Location::Stack) => {}
                (Location::Register(r), Location::Stack) => {
                    let offset = self.frame.slot_offset(idx as u32);
                    masm.spill(offset, r);
                    self.slots[idx] = VarState::on_stack(cur.ty);
                    self.decrement(r);
                    if self.use_count(r) == 0 {
                        self.regalloc.free(r);
                    }
                }
                (Location::Constant(c), Location::Stack) => {
                    let scratch = self.get_register(cur.ty.reg_class(), &[], masm);
                    masm.load_constant(scratch, Imm(c));
                    let offset = self.frame.slot_offset(idx as u32);
                    masm.spill(offset, scratch);
                    self.regalloc.free(scratch);
                    self.slots[idx] = VarState::on_stack(cur.ty);
                }
                (Location::Register(r), Location::Register(rt)) if r == rt => {}
                (Location::Register(r), Location::Register(rt)) => {
                    pending_moves.push((idx, rt, r));
                }
                (Location::Constant(c), Location::Register(rt)) => {
                    masm.load_constant(rt, Imm(c));
                    if !self.regalloc.is_taken(rt) {
                        self.regalloc.take(rt);
                    }
                    self.slots[idx] = VarState::in_register(cur.ty, rt);
                    self.increment(rt);
                }
                (Location::Stack, Location::Register(rt)) => {
                    let offset = self.frame.slot_offset(idx as u32);
                    masm.fill(rt, offset);
                    if !self.regalloc.is_taken(rt) {
                        self.regalloc.take(rt);
                    }
                    self.slots[idx] = VarState::in_register(cur.ty, rt);
                    self.increment(rt);
                }
                (Location::Constant(c1), Location::Constant(c2)) => {
                    debug_assert_eq!(
                        c1, c2,
                        "differing constants at a merge point must have been demoted during init-merge"
                    );
                }
            }
        }

        self.resolve_register_moves(pending_moves, masm);
    }

    /// Resolve register-to-register moves collected during [`Self::merge_into`],
    /// breaking any cycles with a scratch register (spec §4.B.2, and
    /// scenario 6 in §8).
    fn resolve_register_moves<M: MacroAssembler>(
        &mut self,
        mut pending: Vec<(usize, Reg, Reg)>,
        masm: &mut M,
    ) {
        while !pending.is_empty() {
            // A move is safe to perform now if nothing else still needs to
            // read its destination register as a source.
            if let Some(pos) = pending
                .iter()
                .position(|&(_, dst, _)| !pending.iter().any(|&(_, _, src)| src == dst))
            {
                let (idx, dst, src) = pending.remove(pos);
                self.emit_register_move(idx, dst, src, masm);
            } else {
                // Every remaining move's destination is someone else's
                // source: a pure cycle. Break it by saving one
                // destination's current value to a scratch register, then
                // redirecting whoever needed that value to read the
                // scratch instead. The scratch is given a use count
                // matching however many moves get redirected to it, so
                // `emit_register_move`'s ordinary decrement-and-maybe-free
                // releases it back to the allocator once the last such
                // move has consumed it.
                let (idx, dst, src) = pending.remove(0);
                let ty = self.slots[idx].ty;
                let scratch = self.get_register(dst.class(), &[dst, src], masm);
                masm.mov(scratch, dst, ty.into());
                for other in pending.iter_mut() {
                    if other.2 == dst {
                        other.2 = scratch;
                        self.increment(scratch);
                    }
                }
                self.emit_register_move(idx, dst, src, masm);
            }
        }
    }

    fn emit_register_move<M: MacroAssembler>(&mut self, idx: usize, dst: Reg, src: Reg, masm: &mut M) {
        let ty = self.slots[idx].ty;
        masm.mov(dst, src, ty.into());
        self.decrement(src);
        if self.use_count(src) == 0 {
            self.regalloc.free(src);
        }
        if !self.regalloc.is_taken(dst) {
            self.regalloc.take(dst);
        }
        self.slots[idx] = VarState::in_register(ty, dst);
        self.increment(dst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masm::OperandSize;
    use std::cell::RefCell;
    use target_lexicon::Architecture;

    /// Records every primitive emitted, in order, for assertions.
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Mov(Reg, Reg),
        LoadConstant(Reg, i64),
        Spill(u32, Reg),
        Fill(Reg, u32),
        Store,
        Load,
        I32Add(Reg, Reg, Reg),
        Other(&'static str),
    }

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<Event>>,
        labels: RefCell<u32>,
    }

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.events.borrow().clone()
        }
    }

    impl MacroAssembler for Recorder {
        type Label = u32;

        fn new_label(&mut self) -> u32 {
            let mut l = self.labels.borrow_mut();
            *l += 1;
            *l
        }
        fn bind(&mut self, _label: u32) {}
        fn jmp(&mut self, _label: u32) {}
        fn jump_if_zero(&mut self, _reg: Reg, _label: u32) {}
        fn enter_frame(&mut self) {}
        fn reserve_stack_space(&mut self, _bytes: u32) {}
        fn leave_frame(&mut self) {}
        fn ret(&mut self) {}
        fn mov(&mut self, dst: Reg, src: Reg, _size: OperandSize) {
            self.events.borrow_mut().push(Event::Mov(dst, src));
        }
        fn load_constant(&mut self, dst: Reg, value: crate::masm::Imm) {
            self.events.borrow_mut().push(Event::LoadConstant(dst, value.0));
        }
        fn load(&mut self, _dst: Reg, _base: Reg, _offset: u32, _size: OperandSize) {
            self.events.borrow_mut().push(Event::Load);
        }
        fn store(&mut self, _base: Reg, _offset: u32, _src: Reg, _size: OperandSize) {
            self.events.borrow_mut().push(Event::Store);
        }
        fn spill(&mut self, offset: u32, reg: Reg) {
            self.events.borrow_mut().push(Event::Spill(offset, reg));
        }
        fn fill(&mut self, reg: Reg, offset: u32) {
            self.events.borrow_mut().push(Event::Fill(reg, offset));
        }
        fn load_from_context(&mut self, _dst: Reg, _offset: u32, _size: OperandSize) {
            self.events.borrow_mut().push(Event::Other("load_from_context"));
        }
        fn spill_context(&mut self, _reg: Reg, _offset: u32) {
            self.events.borrow_mut().push(Event::Other("spill_context"));
        }
        fn load_caller_frame_slot(&mut self, _dst: Reg, _slot_index: u32) {
            self.events.borrow_mut().push(Event::Other("load_caller_frame_slot"));
        }
        fn move_to_return_register(&mut self, _reg: Reg) {
            self.events.borrow_mut().push(Event::Other("move_to_return_register"));
        }
        fn i32_add(&mut self, dst: Reg, lhs: Reg, rhs: Reg) {
            self.events.borrow_mut().push(Event::I32Add(dst, lhs, rhs));
        }
        fn i32_sub(&mut self, _dst: Reg, _lhs: Reg, _rhs: Reg) {}
        fn i32_mul(&mut self, _dst: Reg, _lhs: Reg, _rhs: Reg) {}
        fn i32_and(&mut self, _dst: Reg, _lhs: Reg, _rhs: Reg) {}
        fn i32_or(&mut self, _dst: Reg, _lhs: Reg, _rhs: Reg) {}
        fn i32_xor(&mut self, _dst: Reg, _lhs: Reg, _rhs: Reg) {}
        fn f32_add(&mut self, _dst: Reg, _lhs: Reg, _rhs: Reg) {}
        fn f32_sub(&mut self, _dst: Reg, _lhs: Reg, _rhs: Reg) {}
        fn f32_mul(&mut self, _dst: Reg, _lhs: Reg, _rhs: Reg) {}
    }

    fn registers() -> CacheRegisterList {
        CacheRegisterList::for_arch(Architecture::X86_64).unwrap()
    }

    #[test]
    fn push_pop_register_round_trip_is_a_no_op_on_shape() {
        let mut cs = CacheState::new(0, &[], registers());
        let mut m = Recorder::default();
        let r = cs.get_register(RegClass::Int, &[], &mut m);
        cs.push_register(WasmType::I32, r);
        assert_eq!(cs.use_count(r), 1);

        let popped = cs.pop_to_register(RegClass::Int, &[], &mut m);
        assert_eq!(popped, r);
        assert_eq!(cs.use_count(r), 0);
        cs.push_register(WasmType::I32, popped);
        assert_eq!(cs.use_count(r), 1);
        assert_eq!(cs.height(), 1);
    }

    #[test]
    fn constant_folding_defers_load_immediate() {
        let mut cs = CacheState::new(0, &[], registers());
        let mut m = Recorder::default();
        cs.push_constant(WasmType::I32, 7);
        assert!(m.events().is_empty(), "pushing a constant emits nothing yet");

        let r = cs.pop_to_register(RegClass::Int, &[], &mut m);
        assert_eq!(m.events(), vec![Event::LoadConstant(r, 7)]);
    }

    #[test]
    fn binop_target_reclaims_sole_owner_register() {
        let mut cs = CacheState::new(0, &[], registers());
        let mut m = Recorder::default();
        let lhs_reg = cs.get_register(RegClass::Int, &[], &mut m);
        cs.push_register(WasmType::I32, lhs_reg);
        let rhs_reg = cs.get_register(RegClass::Int, &[], &mut m);
        cs.push_register(WasmType::I32, rhs_reg);

        let rhs = cs.pop_to_register(RegClass::Int, &[], &mut m);
        let lhs = cs.pop_to_register(RegClass::Int, &[rhs], &mut m);
        let target = cs.get_binary_op_target(RegClass::Int, lhs, rhs, &mut m);
        assert!(target == lhs || target == rhs);
        cs.push_register(WasmType::I32, target);
        assert_eq!(cs.height(), 1);
    }

    #[test]
    fn spill_locals_is_idempotent() {
        let mut cs = CacheState::new(1, &[WasmType::I32], registers());
        let mut m = Recorder::default();
        let r = cs.get_register(RegClass::Int, &[], &mut m);
        *cs.local_mut(0) = VarState::in_register(WasmType::I32, r);
        cs.increment(r);

        cs.spill_locals(&mut m);
        let after_first = m.events().len();
        assert!(after_first > 0);

        cs.spill_locals(&mut m);
        assert_eq!(m.events().len(), after_first, "second spill_locals must emit nothing new");
    }

    #[test]
    fn merge_resolves_a_register_swap_cycle() {
        let regs = registers();
        let mut cs = CacheState::new(0, &[], regs.clone());
        let mut target = CacheState::new(0, &[], regs);
        let mut m = Recorder::default();

        let r1 = Reg::new(RegClass::Int, 0);
        let r2 = Reg::new(RegClass::Int, 1);

        // Current: [r1, r2]; target wants: [r2, r1] -- a swap cycle.
        cs.regalloc.take(r1);
        cs.regalloc.take(r2);
        cs.push_register(WasmType::I32, r1);
        cs.push_register(WasmType::I32, r2);

        target.regalloc.take(r1);
        target.regalloc.take(r2);
        target.push_register(WasmType::I32, r2);
        target.push_register(WasmType::I32, r1);

        cs.merge_into(&target, &mut m);

        let movs: Vec<_> = m
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::Mov(_, _)))
            .collect();
        // A 2-cycle needs a scratch save plus two real moves.
        assert!(movs.len() >= 2, "expected at least two register moves, got {movs:?}");
        assert_eq!(cs.local_or_stack_reg(0), Some(r2));
        assert_eq!(cs.local_or_stack_reg(1), Some(r1));
    }

    impl CacheState {
        fn local_or_stack_reg(&self, index: usize) -> Option<Reg> {
            self.slots[index].location.reg()
        }
    }
}
