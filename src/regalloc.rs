//! Component A: the register allocator.
//!
//! `RegAlloc` tracks, per class, which cache registers are currently taken.
//! It knows nothing about *why* a register is taken — that bookkeeping
//! (use-counts per [`crate::stack::VarState`]) lives in
//! [`crate::codegen::CacheState`], which calls back into this allocator
//! whenever a register transitions to or from "referenced by nothing".
//!
//! This mirrors the teacher's own `cranelift-codegen` register-set bitmap
//! (`regalloc/register_set.rs`): a flat bit per allocatable register,
//! `debug_assert!`-checked take/free, and victim selection left to the
//! caller's policy rather than baked into the bitset itself.

use crate::reg::{CacheRegisterList, Reg};
use crate::value::RegClass;
use smallvec::SmallVec;

/// Inline capacity for a pinned-register set. A handful of operands are
/// ever pinned at once (binary ops pin at most two); this avoids a heap
/// allocation on the hot path.
pub type PinnedRegs = SmallVec<[Reg; 4]>;

/// Tracks which cache registers are currently taken, per class.
///
/// "Taken" means *unavailable for a fresh allocation* — either because a
/// cache-state slot references the register, or because it is transiently
/// pinned to protect a value in flight.
#[derive(Debug, Clone)]
pub struct RegAlloc {
    registers: CacheRegisterList,
    taken: SmallVec<[bool; 16]>,
    offsets: RegOffsets,
}

/// Maps a [`Reg`]'s `(class, index)` to a flat slot in `taken`.
#[derive(Debug, Clone, Copy)]
struct RegOffsets {
    int_len: usize,
    float_len: usize,
}

impl RegAlloc {
    /// Build an allocator with every cache register in `registers` free.
    pub fn new(registers: CacheRegisterList) -> Self {
        let int_len = registers.for_class(RegClass::Int).len();
        let float_len = registers.for_class(RegClass::Float).len();
        Self {
            registers,
            taken: smallvec::smallvec![false; int_len + float_len],
            offsets: RegOffsets { int_len, float_len },
        }
    }

    fn slot(&self, reg: Reg) -> usize {
        let list = self.registers.for_class(reg.class());
        let pos = list
            .iter()
            .position(|r| *r == reg)
            .expect("register must belong to its class's cache list (invariant 1)");
        match reg.class() {
            RegClass::Int => pos,
            RegClass::Float => self.offsets.int_len + pos,
        }
    }

    /// Whether an unpinned cache register of `class` is available.
    pub fn has_free(&self, class: RegClass) -> bool {
        self.registers
            .for_class(class)
            .iter()
            .any(|r| !self.taken[self.slot(*r)])
    }

    /// Whether `reg` is currently marked taken.
    pub fn is_taken(&self, reg: Reg) -> bool {
        self.taken[self.slot(reg)]
    }

    /// Mark `reg` as taken. Used both for fresh allocations and to pin a
    /// register that a cache-state slot already references.
    pub fn take(&mut self, reg: Reg) {
        let slot = self.slot(reg);
        debug_assert!(!self.taken[slot], "{reg} double-taken");
        self.taken[slot] = true;
    }

    /// Mark `reg` as no longer referenced by anything. Callers must ensure
    /// this is only called once the last cache-state reference is gone
    /// (invariant 2 is the caller's responsibility, not this type's).
    pub fn free(&mut self, reg: Reg) {
        let slot = self.slot(reg);
        debug_assert!(self.taken[slot], "{reg} freed while already free");
        self.taken[slot] = false;
    }

    /// Return a cache register of `class` not present in `pinned`.
    ///
    /// If a free one exists it is returned directly (and marked taken). If
    /// none is free, a victim not in `pinned` is selected (lowest-numbered
    /// first, see spec §9 Open Questions), `on_spill` is invoked so the
    /// caller can spill every cache-state slot referencing it, and the
    /// (now only transiently re-taken) victim is returned.
    ///
    /// Never fails: the caller must preserve the invariant that `pinned`
    /// never covers the entire cache list for `class` (pinning more than
    /// that is a compiler bug and panics below).
    pub fn get_unused(
        &mut self,
        class: RegClass,
        pinned: &[Reg],
        mut on_spill: impl FnMut(Reg),
    ) -> Reg {
        let list = self.registers.for_class(class);
        assert!(
            pinned.len() < list.len(),
            "cannot request a register of {class:?} with all {} cache registers pinned",
            list.len()
        );

        if let Some(free) = list
            .iter()
            .copied()
            .find(|r| !pinned.contains(r) && !self.taken[self.slot(*r)])
        {
            self.take(free);
            return free;
        }

        let victim = list
            .iter()
            .copied()
            .find(|r| !pinned.contains(r))
            .expect("pinned.len() < list.len() guarantees an unpinned candidate exists");

        log::trace!("spilling victim register {victim} to satisfy a fresh allocation");
        on_spill(victim);
        // `on_spill` is expected to free every slot referencing `victim`,
        // which frees it in this allocator too; re-take it for the new
        // purpose.
        let slot = self.slot(victim);
        if self.taken[slot] {
            // The callback didn't route through `Self::free` (e.g. no
            // slot actually referenced it, it was only pinned). Either
            // way the register is ours now.
            self.taken[slot] = false;
        }
        self.take(victim);
        victim
    }
}
