//! The virtual-stack slot (`VarState`) and the combined locals + operand
//! stack vector it lives in.
//!
//! This is the spec's central data structure (§3): an ordered sequence of
//! slots, indices `[0 .. num_locals)` are locals, `[num_locals .. height)`
//! is the operand stack. It corresponds to the teacher's own `stack::Stack`
//! (holding `Val`/`TypedReg`), generalized here to the spec's three-way
//! `Location` instead of Winch's own richer `Val` enum, since the spec's
//! use-count model needs to distinguish "referenced by a register" from
//! "holds a memory/local value" more simply than Winch's production design
//! does.

use crate::reg::Reg;
use crate::value::WasmType;
use smallvec::SmallVec;

/// Where a [`VarState`]'s value currently lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Location {
    /// Resident in machine register `0`.
    Register(Reg),
    /// A compile-time integer constant. Floating-point constants are
    /// materialised eagerly (spec §3) and never appear here.
    Constant(i64),
    /// Spilled to this slot's physical offset in the current frame.
    Stack,
}

impl Location {
    pub fn reg(self) -> Option<Reg> {
        match self {
            Location::Register(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_stack(self) -> bool {
        matches!(self, Location::Stack)
    }
}

/// A single cache-state slot: a local or an operand-stack entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VarState {
    pub ty: WasmType,
    pub location: Location,
}

impl VarState {
    pub fn new(ty: WasmType, location: Location) -> Self {
        Self { ty, location }
    }

    pub fn in_register(ty: WasmType, reg: Reg) -> Self {
        Self::new(ty, Location::Register(reg))
    }

    pub fn constant(ty: WasmType, value: i64) -> Self {
        Self::new(ty, Location::Constant(value))
    }

    pub fn on_stack(ty: WasmType) -> Self {
        Self::new(ty, Location::Stack)
    }
}

/// Inline capacity for the combined locals + operand-stack vector: enough
/// for most function bodies without spilling onto the heap.
pub type Slots = SmallVec<[VarState; 16]>;
