//! Component E: the function's physical stack frame layout.
//!
//! The frame maps a cache-state slot index to a fixed physical offset,
//! satisfying invariant 3 (spill-slot offset is a function of index
//! alone). It is computed once, at function prologue, from a static upper
//! bound on the cache-state height, and never recomputed — there is no
//! dynamic high-water-mark tracking, trading a handful of unused spill
//! bytes for the ability to `reserve_stack_space` before translating any
//! opcode.

/// Every cache-state slot is reserved this many bytes, regardless of its
/// value type: enough for an `I64` (the widest type this crate ever spills,
/// via the `global.get` exception), with `I32`/`F32` slots simply leaving
/// the upper half unused.
pub const SLOT_SIZE: u32 = 8;

/// The precomputed locals/operand-stack layout for one function body.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    num_locals: u32,
    max_height: u32,
}

impl Frame {
    /// `num_locals` is the function's local count (including parameters);
    /// `max_height` is a conservative static bound on `num_locals +
    /// MAX_STACK_HEIGHT`, used to size the one-time stack reservation.
    pub fn new(num_locals: u32, max_height: u32) -> Self {
        assert!(
            max_height >= num_locals,
            "max_height must cover at least the locals"
        );
        Self {
            num_locals,
            max_height,
        }
    }

    pub fn num_locals(&self) -> u32 {
        self.num_locals
    }

    /// Total bytes the prologue must reserve for spill slots.
    pub fn spill_size(&self) -> u32 {
        self.max_height * SLOT_SIZE
    }

    /// The physical offset (from the frame base) of the slot at `index`.
    ///
    /// Pure function of `index`: calling it twice for the same index
    /// always yields the same answer, independent of any other state.
    pub fn slot_offset(&self, index: u32) -> u32 {
        debug_assert!(
            index < self.max_height,
            "slot index {index} out of the reserved frame ({} slots)",
            self.max_height
        );
        (index + 1) * SLOT_SIZE
    }
}
