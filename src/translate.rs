//! Component C: the opcode translator.
//!
//! Each supported opcode is translated in four steps (spec §4.C): bail
//! out on an unsupported type/variant, transform the cache state, call
//! the emitter for whatever primitives the transform needs, then check
//! the operand-stack height bound. The opcode set itself is closed —
//! anything outside it is the decoder's job to never hand us, or this
//! crate's job to decline via [`BailoutReason::UnsupportedOpcode`].

use crate::codegen::CacheState;
use crate::error::BailoutReason;
use crate::masm::{Imm, MacroAssembler, OperandSize};
use crate::value::{RegClass, WasmType};

/// Offset, within the per-call thread-local context blob, of the
/// module's globals-base pointer. Every compilation shares the same
/// context layout, so this is a single constant rather than something
/// threaded through per-call (spec §6 `load_from_context`).
pub const GLOBALS_BASE_CONTEXT_OFFSET: u32 = 0;

/// The supported baseline opcode subset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Opcode {
    I32Const(i32),
    F32Const(f32),
    /// Not part of the baseline's supported value-type set (spec §3); the
    /// only purpose of carrying the operand is so a decoder has a
    /// concrete way to trigger [`BailoutReason::UnsupportedOpcode`] for an
    /// i64 constant rather than the crate never exercising that bailout.
    I64Const(i64),
    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet { offset: u32, ty: WasmType },
    GlobalSet { offset: u32, ty: WasmType },
    I32Add,
    I32Sub,
    I32Mul,
    I32And,
    I32Or,
    I32Xor,
    F32Add,
    F32Sub,
    F32Mul,
    Drop,
    /// Pops the function's result (if any) into the return register and
    /// emits the epilogue.
    Return { has_result: bool },
}

/// Translate one opcode against `cache`, requesting emission from `masm`.
/// `offset` is carried only for bailout reporting.
pub fn translate<M: MacroAssembler>(
    op: Opcode,
    offset: u32,
    cache: &mut CacheState,
    masm: &mut M,
) -> Result<(), BailoutReason> {
    log::trace!("translating {op:?} at offset {offset}");

    match op {
        Opcode::I32Const(c) => cache.push_constant(WasmType::I32, c as i64),
        Opcode::F32Const(c) => cache.push_materialized(WasmType::F32, c.to_bits() as i64, masm),
        Opcode::I64Const(_) => return Err(BailoutReason::UnsupportedOpcode { offset }),

        Opcode::LocalGet(index) => {
            check_local_type(cache, index)?;
            cache.read_local(index, masm);
        }
        Opcode::LocalSet(index) => {
            check_local_type(cache, index)?;
            cache.write_local(index, false, masm);
        }
        Opcode::LocalTee(index) => {
            check_local_type(cache, index)?;
            cache.write_local(index, true, masm);
        }

        Opcode::GlobalGet { offset: global_offset, ty } => {
            translate_global_get(global_offset, ty, offset, cache, masm)?
        }
        Opcode::GlobalSet { offset: global_offset, ty } => {
            translate_global_set(global_offset, ty, offset, cache, masm)?
        }

        Opcode::I32Add => binop(cache, masm, RegClass::Int, WasmType::I32, M::i32_add),
        Opcode::I32Sub => binop(cache, masm, RegClass::Int, WasmType::I32, M::i32_sub),
        Opcode::I32Mul => binop(cache, masm, RegClass::Int, WasmType::I32, M::i32_mul),
        Opcode::I32And => binop(cache, masm, RegClass::Int, WasmType::I32, M::i32_and),
        Opcode::I32Or => binop(cache, masm, RegClass::Int, WasmType::I32, M::i32_or),
        Opcode::I32Xor => binop(cache, masm, RegClass::Int, WasmType::I32, M::i32_xor),

        Opcode::F32Add => binop(cache, masm, RegClass::Float, WasmType::F32, M::f32_add),
        Opcode::F32Sub => binop(cache, masm, RegClass::Float, WasmType::F32, M::f32_sub),
        Opcode::F32Mul => binop(cache, masm, RegClass::Float, WasmType::F32, M::f32_mul),

        Opcode::Drop => cache.drop_top(),

        Opcode::Return { has_result } => {
            if has_result {
                let class = cache.peek().ty.reg_class();
                let r = cache.pop_to_register(class, &[], masm);
                masm.move_to_return_register(r);
                cache.free_reg(r);
            }
            masm.leave_frame();
            masm.ret();
        }
    }

    cache.check_stack_size_limit()
}

/// Bails if local `index`'s declared type isn't fully supported outside
/// the narrow `global.get` exception (spec §3/§9) — an I64 or F64 local
/// must never reach the register path `read_local`/`write_local` take.
fn check_local_type(cache: &CacheState, index: u32) -> Result<(), BailoutReason> {
    let ty = cache.local(index).ty;
    if ty.is_baseline_supported() {
        Ok(())
    } else {
        Err(BailoutReason::UnsupportedType { ty })
    }
}

/// Pop RHS then LHS (pinning RHS), pick a target register, emit the
/// machine op, push the result (spec §4.C "Binary op transformation").
fn binop<M: MacroAssembler>(
    cache: &mut CacheState,
    masm: &mut M,
    class: RegClass,
    ty: WasmType,
    emit: fn(&mut M, crate::reg::Reg, crate::reg::Reg, crate::reg::Reg),
) {
    let rhs = cache.pop_to_register(class, &[], masm);
    let lhs = cache.pop_to_register(class, &[rhs], masm);
    let target = cache.get_binary_op_target(class, lhs, rhs, masm);
    emit(masm, target, lhs, rhs);
    cache.push_register(ty, target);
}

fn translate_global_get<M: MacroAssembler>(
    global_offset: u32,
    ty: WasmType,
    opcode_offset: u32,
    cache: &mut CacheState,
    masm: &mut M,
) -> Result<(), BailoutReason> {
    match ty {
        WasmType::I32 | WasmType::I64 => {}
        WasmType::F32 | WasmType::F64 => {
            return Err(BailoutReason::UnsupportedType { ty });
        }
    }
    let base = cache.scratch_register(RegClass::Int, masm);
    masm.load_from_context(base, GLOBALS_BASE_CONTEXT_OFFSET, OperandSize::S64);
    let dst = cache.scratch_register(RegClass::Int, masm);
    masm.load(dst, base, global_offset, OperandSize::from(ty));
    cache.free_reg(base);
    cache.push_register(ty, dst);
    let _ = opcode_offset;
    Ok(())
}

fn translate_global_set<M: MacroAssembler>(
    global_offset: u32,
    ty: WasmType,
    opcode_offset: u32,
    cache: &mut CacheState,
    masm: &mut M,
) -> Result<(), BailoutReason> {
    match ty {
        WasmType::I32 => {}
        WasmType::I64 => return Err(BailoutReason::OversizedGlobal { offset: opcode_offset }),
        WasmType::F32 | WasmType::F64 => {
            return Err(BailoutReason::UnsupportedType { ty });
        }
    }
    let src = cache.pop_to_register(RegClass::Int, &[], masm);
    let base = cache.scratch_register(RegClass::Int, masm);
    masm.load_from_context(base, GLOBALS_BASE_CONTEXT_OFFSET, OperandSize::S64);
    masm.store(base, global_offset, src, OperandSize::from(ty));
    cache.free_reg(base);
    cache.free_reg(src);
    Ok(())
}
