//! The interface to the architecture-specific code emitter (spec §6).
//!
//! This crate never emits machine code itself; it emits *requests* against
//! `MacroAssembler`. Per the design note in spec §9, the emitter is a
//! capability parameter of the core — a generic type bound, not a trait
//! object — so architecture selection is static and resolved at the
//! embedder's monomorphization site, matching how the teacher treats its
//! own `M: MacroAssembler` type parameter throughout `CodeGenContext`.

use crate::reg::Reg;
use crate::value::WasmType;

/// The width of a memory access or register move.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OperandSize {
    S32,
    S64,
}

impl From<WasmType> for OperandSize {
    fn from(ty: WasmType) -> Self {
        match ty {
            WasmType::I32 | WasmType::F32 => OperandSize::S32,
            WasmType::I64 | WasmType::F64 => OperandSize::S64,
        }
    }
}

/// A compile-time immediate, as handed to `load_constant` or a binop
/// emitter. Only integers are representable as immediates; floating-point
/// constants are materialised to a register before they ever reach the
/// emitter (spec §3, `Constant` location).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Imm(pub i64);

/// The code-emitter contract the baseline compiler core is built against.
///
/// An implementation owns an opaque `Label` type; this crate only ever
/// creates labels through [`MacroAssembler::new_label`] and threads them
/// back through `bind`/`jmp`/`jump_if_zero`, never inspecting them, which
/// sidesteps the address-stability concerns spec §9 calls out for
/// architectures that need labels to live at a stable address.
pub trait MacroAssembler {
    /// An opaque handle to an as-yet-unbound or bound branch target.
    type Label: Copy + Eq + core::fmt::Debug;

    /// Allocate a new, unbound label.
    fn new_label(&mut self) -> Self::Label;
    /// Bind `label` to the current emission point. A label must be bound
    /// exactly once.
    fn bind(&mut self, label: Self::Label);
    fn jmp(&mut self, label: Self::Label);
    fn jump_if_zero(&mut self, reg: Reg, label: Self::Label);

    fn enter_frame(&mut self);
    fn reserve_stack_space(&mut self, bytes: u32);
    fn leave_frame(&mut self);
    fn ret(&mut self);

    fn mov(&mut self, dst: Reg, src: Reg, size: OperandSize);
    fn load_constant(&mut self, dst: Reg, value: Imm);

    fn load(&mut self, dst: Reg, base: Reg, offset: u32, size: OperandSize);
    fn store(&mut self, base: Reg, offset: u32, src: Reg, size: OperandSize);

    fn spill(&mut self, offset: u32, reg: Reg);
    fn fill(&mut self, reg: Reg, offset: u32);

    fn load_from_context(&mut self, dst: Reg, offset: u32, size: OperandSize);
    fn spill_context(&mut self, reg: Reg, offset: u32);

    fn load_caller_frame_slot(&mut self, dst: Reg, slot_index: u32);
    fn move_to_return_register(&mut self, reg: Reg);

    fn i32_add(&mut self, dst: Reg, lhs: Reg, rhs: Reg);
    fn i32_sub(&mut self, dst: Reg, lhs: Reg, rhs: Reg);
    fn i32_mul(&mut self, dst: Reg, lhs: Reg, rhs: Reg);
    fn i32_and(&mut self, dst: Reg, lhs: Reg, rhs: Reg);
    fn i32_or(&mut self, dst: Reg, lhs: Reg, rhs: Reg);
    fn i32_xor(&mut self, dst: Reg, lhs: Reg, rhs: Reg);

    fn f32_add(&mut self, dst: Reg, lhs: Reg, rhs: Reg);
    fn f32_sub(&mut self, dst: Reg, lhs: Reg, rhs: Reg);
    fn f32_mul(&mut self, dst: Reg, lhs: Reg, rhs: Reg);
}
