//! A deterministic mock [`MacroAssembler`] that records every emitted
//! primitive into an ordered event log instead of producing real machine
//! code — in the spirit of the teacher's own filetest infrastructure, but
//! asserting on cache-state shape and emission order rather than
//! byte-for-byte encoding (spec §8 "Test tooling").

use baseline_codegen::masm::{Imm, MacroAssembler, OperandSize};
use baseline_codegen::reg::Reg;
use std::cell::RefCell;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Bind(u32),
    Jmp(u32),
    JumpIfZero(Reg, u32),
    EnterFrame,
    ReserveStackSpace(u32),
    LeaveFrame,
    Ret,
    Mov(Reg, Reg),
    LoadConstant(Reg, i64),
    Load(Reg, Reg, u32),
    Store(Reg, u32, Reg),
    Spill(u32, Reg),
    Fill(Reg, u32),
    LoadFromContext(Reg, u32),
    SpillContext(Reg, u32),
    LoadCallerFrameSlot(Reg, u32),
    MoveToReturnRegister(Reg),
    I32Add(Reg, Reg, Reg),
    I32Sub(Reg, Reg, Reg),
    I32Mul(Reg, Reg, Reg),
    I32And(Reg, Reg, Reg),
    I32Or(Reg, Reg, Reg),
    I32Xor(Reg, Reg, Reg),
    F32Add(Reg, Reg, Reg),
    F32Sub(Reg, Reg, Reg),
    F32Mul(Reg, Reg, Reg),
}

#[derive(Default)]
pub struct MockAssembler {
    events: RefCell<Vec<Event>>,
    next_label: RefCell<u32>,
}

impl MockAssembler {
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }

    fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl MacroAssembler for MockAssembler {
    type Label = u32;

    fn new_label(&mut self) -> u32 {
        let mut n = self.next_label.borrow_mut();
        let label = *n;
        *n += 1;
        label
    }

    fn bind(&mut self, label: u32) {
        self.push(Event::Bind(label));
    }

    fn jmp(&mut self, label: u32) {
        self.push(Event::Jmp(label));
    }

    fn jump_if_zero(&mut self, reg: Reg, label: u32) {
        self.push(Event::JumpIfZero(reg, label));
    }

    fn enter_frame(&mut self) {
        self.push(Event::EnterFrame);
    }

    fn reserve_stack_space(&mut self, bytes: u32) {
        self.push(Event::ReserveStackSpace(bytes));
    }

    fn leave_frame(&mut self) {
        self.push(Event::LeaveFrame);
    }

    fn ret(&mut self) {
        self.push(Event::Ret);
    }

    fn mov(&mut self, dst: Reg, src: Reg, _size: OperandSize) {
        self.push(Event::Mov(dst, src));
    }

    fn load_constant(&mut self, dst: Reg, value: Imm) {
        self.push(Event::LoadConstant(dst, value.0));
    }

    fn load(&mut self, dst: Reg, base: Reg, offset: u32, _size: OperandSize) {
        self.push(Event::Load(dst, base, offset));
    }

    fn store(&mut self, base: Reg, offset: u32, src: Reg, _size: OperandSize) {
        self.push(Event::Store(base, offset, src));
    }

    fn spill(&mut self, offset: u32, reg: Reg) {
        self.push(Event::Spill(offset, reg));
    }

    fn fill(&mut self, reg: Reg, offset: u32) {
        self.push(Event::Fill(reg, offset));
    }

    fn load_from_context(&mut self, dst: Reg, offset: u32, _size: OperandSize) {
        self.push(Event::LoadFromContext(dst, offset));
    }

    fn spill_context(&mut self, reg: Reg, offset: u32) {
        self.push(Event::SpillContext(reg, offset));
    }

    fn load_caller_frame_slot(&mut self, dst: Reg, slot_index: u32) {
        self.push(Event::LoadCallerFrameSlot(dst, slot_index));
    }

    fn move_to_return_register(&mut self, reg: Reg) {
        self.push(Event::MoveToReturnRegister(reg));
    }

    fn i32_add(&mut self, dst: Reg, lhs: Reg, rhs: Reg) {
        self.push(Event::I32Add(dst, lhs, rhs));
    }

    fn i32_sub(&mut self, dst: Reg, lhs: Reg, rhs: Reg) {
        self.push(Event::I32Sub(dst, lhs, rhs));
    }

    fn i32_mul(&mut self, dst: Reg, lhs: Reg, rhs: Reg) {
        self.push(Event::I32Mul(dst, lhs, rhs));
    }

    fn i32_and(&mut self, dst: Reg, lhs: Reg, rhs: Reg) {
        self.push(Event::I32And(dst, lhs, rhs));
    }

    fn i32_or(&mut self, dst: Reg, lhs: Reg, rhs: Reg) {
        self.push(Event::I32Or(dst, lhs, rhs));
    }

    fn i32_xor(&mut self, dst: Reg, lhs: Reg, rhs: Reg) {
        self.push(Event::I32Xor(dst, lhs, rhs));
    }

    fn f32_add(&mut self, dst: Reg, lhs: Reg, rhs: Reg) {
        self.push(Event::F32Add(dst, lhs, rhs));
    }

    fn f32_sub(&mut self, dst: Reg, lhs: Reg, rhs: Reg) {
        self.push(Event::F32Sub(dst, lhs, rhs));
    }

    fn f32_mul(&mut self, dst: Reg, lhs: Reg, rhs: Reg) {
        self.push(Event::F32Mul(dst, lhs, rhs));
    }
}
