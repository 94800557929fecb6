//! Component D: the control-flow coordinator.
//!
//! Tracks the open `block`/`loop` nest as a plain `Vec` of
//! [`ControlStackFrame`]s (spec §5: "no custom arena allocator... the
//! teacher's own simpler zones are just `Vec`-backed for this scale of
//! data") and drives [`CacheState`]'s split/init-merge/merge/steal
//! quartet at the right points in block entry, branch, fallthrough and
//! block exit, per the state machine in spec §4.D.

use super::CacheState;
use crate::masm::MacroAssembler;
use crate::value::RegClass;

/// Whether a control block is an ordinary `block` or a `loop`. A loop's
/// label is bound at entry (branches to it go backwards); a block's label
/// is bound at `end` (branches to it go forwards).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Block,
    Loop,
}

/// One entry in the open control-block stack.
struct ControlStackFrame<L> {
    kind: BlockKind,
    label: L,
    stack_base: u32,
    arity: u32,
    /// The canonical shape branches to this label must produce. `None`
    /// until the first branch (`br`/`br_if`) or fallthrough establishes
    /// it via `init_merge`/`split`.
    label_state: Option<CacheState>,
    /// At least one forward branch has targeted this label.
    reached: bool,
    bound: bool,
}

/// The open control-block stack for one function body.
///
/// Parameterised directly over the emitter `M` (rather than just its
/// `Label` type) since every operation here needs to call back into it —
/// this mirrors how [`crate::codegen::CacheState`]'s own merge methods
/// take `&mut M` rather than threading emission through a separate
/// indirection layer.
pub struct ControlStack<M: MacroAssembler> {
    frames: Vec<ControlStackFrame<M::Label>>,
}

impl<M: MacroAssembler> ControlStack<M> {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn depth(&self) -> u32 {
        self.frames.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// `block`/`loop` entry (spec §4.D). `arity` is the number of values
    /// live across this block's exit edge.
    pub fn push_block(
        &mut self,
        kind: BlockKind,
        arity: u32,
        current: &mut CacheState,
        masm: &mut M,
    ) {
        let stack_base = current.height();
        let label = masm.new_label();
        let (label_state, bound) = match kind {
            BlockKind::Loop => {
                // Loops branch backwards to their own entry, so the label
                // state must be fixed before any of the body translates.
                current.spill_locals(masm);
                masm.bind(label);
                (Some(current.split()), true)
            }
            BlockKind::Block => (None, false),
        };
        self.frames.push(ControlStackFrame {
            kind,
            label,
            stack_base,
            arity,
            label_state,
            reached: false,
            bound,
        });
    }

    fn frame_at_depth(&self, target_depth: u32) -> usize {
        let len = self.frames.len();
        let idx = target_depth as usize;
        assert!(idx < len, "branch target depth {idx} exceeds control depth {len}");
        len - 1 - idx
    }

    /// Reconcile `current` against the label state `target_depth` levels
    /// up (0 = innermost), establishing it via `init_merge` on the first
    /// branch. Shared by `br` and `br_if`.
    fn prepare_branch(&mut self, target_depth: u32, current: &mut CacheState, masm: &mut M) -> M::Label {
        let idx = self.frame_at_depth(target_depth);
        if self.frames[idx].label_state.is_none() {
            let arity = self.frames[idx].arity;
            let stack_base = self.frames[idx].stack_base;
            let template = current.init_merge(stack_base, arity);
            self.frames[idx].label_state = Some(template);
        }
        let label_state = self.frames[idx]
            .label_state
            .clone()
            .expect("just established above");
        current.merge_into(&label_state, masm);
        self.frames[idx].reached = true;
        self.frames[idx].label
    }

    /// Unconditional branch (`br`).
    pub fn br(&mut self, target_depth: u32, current: &mut CacheState, masm: &mut M) {
        let label = self.prepare_branch(target_depth, current, masm);
        masm.jmp(label);
    }

    /// Conditional branch (`br_if`): pop the GP condition, then emit a
    /// jump-if-zero over the merge-and-branch sequence (spec §4.C).
    pub fn br_if(&mut self, target_depth: u32, current: &mut CacheState, masm: &mut M) {
        let cond = current.pop_to_register(RegClass::Int, &[], masm);
        let skip = masm.new_label();
        masm.jump_if_zero(cond, skip);
        current.free_reg(cond);
        let label = self.prepare_branch(target_depth, current, masm);
        masm.jmp(label);
        masm.bind(skip);
    }

    /// Fallthrough into the innermost block's exit (spec §4.D
    /// `fallthru_to`).
    pub fn fallthru(&mut self, current: &mut CacheState, masm: &mut M) {
        let top = self.frames.last().expect("fallthru with no open block");
        if top.reached {
            let label_state = top.label_state.clone().expect("reached implies a label_state");
            current.merge_into(&label_state, masm);
        } else {
            let snapshot = current.split();
            self.frames.last_mut().unwrap().label_state = Some(snapshot);
        }
    }

    /// `end`: pop the innermost block. If it was reached by a forward
    /// branch, `current` steals its label state (every predecessor has
    /// already reconciled itself against that exact shape); otherwise
    /// `current` is left as-is, since the only way to reach `end` without
    /// a recorded branch is the fallthrough this function assumes already
    /// ran. Binds the label if `push_block`/`br` didn't already.
    pub fn pop_block(&mut self, current: &mut CacheState, masm: &mut M) {
        let frame = self.frames.pop().expect("pop_block with no open block");
        if frame.reached {
            let label_state = frame
                .label_state
                .expect("a reached block always recorded a label_state");
            current.steal(label_state);
        }
        if !frame.bound {
            masm.bind(frame.label);
        }
    }

    /// Bind every still-unbound label, innermost first, so label-lifecycle
    /// invariants hold even when a bailout aborts translation before every
    /// block's natural `end` (spec §4.C step 1, §4.F).
    pub fn bind_all_unbound(&mut self, masm: &mut M) {
        for frame in self.frames.iter_mut().rev() {
            if !frame.bound {
                masm.bind(frame.label);
                frame.bound = true;
            }
        }
    }
}

impl<M: MacroAssembler> Default for ControlStack<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::CacheState;
    use crate::masm::{Imm, OperandSize};
    use crate::reg::{CacheRegisterList, Reg};
    use std::cell::RefCell;
    use target_lexicon::Architecture;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Bind(u32),
        Jmp(u32),
        JumpIfZero(Reg, u32),
        Mov(Reg, Reg),
        LoadConstant(Reg, i64),
        Spill(u32, Reg),
        Fill(Reg, u32),
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
        fn bind(&mut self, label: u32) {
            self.events.borrow_mut().push(Event::Bind(label));
        }
        fn jmp(&mut self, label: u32) {
            self.events.borrow_mut().push(Event::Jmp(label));
        }
        fn jump_if_zero(&mut self, reg: Reg, label: u32) {
            self.events.borrow_mut().push(Event::JumpIfZero(reg, label));
        }
        fn enter_frame(&mut self) {}
        fn reserve_stack_space(&mut self, _bytes: u32) {}
        fn leave_frame(&mut self) {}
        fn ret(&mut self) {}
        fn mov(&mut self, dst: Reg, src: Reg, _size: OperandSize) {
            self.events.borrow_mut().push(Event::Mov(dst, src));
        }
        fn load_constant(&mut self, dst: Reg, value: Imm) {
            self.events.borrow_mut().push(Event::LoadConstant(dst, value.0));
        }
        fn load(&mut self, _dst: Reg, _base: Reg, _offset: u32, _size: OperandSize) {}
        fn store(&mut self, _base: Reg, _offset: u32, _src: Reg, _size: OperandSize) {}
        fn spill(&mut self, offset: u32, reg: Reg) {
            self.events.borrow_mut().push(Event::Spill(offset, reg));
        }
        fn fill(&mut self, reg: Reg, offset: u32) {
            self.events.borrow_mut().push(Event::Fill(reg, offset));
        }
        fn load_from_context(&mut self, _dst: Reg, _offset: u32, _size: OperandSize) {}
        fn spill_context(&mut self, _reg: Reg, _offset: u32) {}
        fn load_caller_frame_slot(&mut self, _dst: Reg, _slot_index: u32) {}
        fn move_to_return_register(&mut self, _reg: Reg) {}
        fn i32_add(&mut self, _dst: Reg, _lhs: Reg, _rhs: Reg) {}
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
    fn loop_entry_spills_locals_and_binds_immediately() {
        let mut cs = CacheState::new(1, &[crate::value::WasmType::I32], registers());
        let mut m = Recorder::default();
        let mut stack = ControlStack::new();

        let r = cs.get_register_for_test(RegClass::Int, &mut m);
        cs.set_local_for_test(0, r);

        stack.push_block(BlockKind::Loop, 0, &mut cs, &mut m);
        assert!(matches!(m.events().first(), Some(Event::Spill(_, _))));
        assert!(matches!(m.events().last(), Some(Event::Bind(_))));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn forward_branch_binds_label_at_end_not_before() {
        let mut cs = CacheState::new(0, &[], registers());
        let mut m = Recorder::default();
        let mut stack = ControlStack::new();

        stack.push_block(BlockKind::Block, 0, &mut cs, &mut m);
        assert!(m.events().is_empty(), "a plain block binds nothing at entry");

        stack.br(0, &mut cs, &mut m);
        assert!(
            !m.events().iter().any(|e| matches!(e, Event::Bind(_))),
            "br must not itself bind the target label"
        );

        stack.pop_block(&mut cs, &mut m);
        assert!(matches!(m.events().last(), Some(Event::Bind(_))));
    }

    #[test]
    fn bind_all_unbound_covers_a_bailout_mid_nest() {
        let mut cs = CacheState::new(0, &[], registers());
        let mut m = Recorder::default();
        let mut stack = ControlStack::new();

        stack.push_block(BlockKind::Block, 0, &mut cs, &mut m);
        stack.push_block(BlockKind::Block, 0, &mut cs, &mut m);
        assert!(m.events().is_empty());

        stack.bind_all_unbound(&mut m);
        let binds: Vec<_> = m.events().into_iter().filter(|e| matches!(e, Event::Bind(_))).collect();
        assert_eq!(binds.len(), 2);
    }

    impl CacheState {
        fn get_register_for_test<M: MacroAssembler>(&mut self, class: RegClass, masm: &mut M) -> Reg {
            self.get_register(class, &[], masm)
        }
        fn set_local_for_test(&mut self, index: u32, r: Reg) {
            *self.local_mut(index) = crate::stack::VarState::in_register(crate::value::WasmType::I32, r);
            self.increment_for_test(r);
        }
        fn increment_for_test(&mut self, r: Reg) {
            self.increment(r);
        }
    }
}
