//! Machine registers and the per-architecture cache register lists.
//!
//! The core never allocates an arbitrary architecture register: it is only
//! ever permitted to hand out registers drawn from a fixed *cache list* per
//! [`RegClass`](crate::value::RegClass). Everything else (argument
//! registers that aren't in the cache list, the stack pointer, scratch
//! registers reserved for cycle-breaking) is visible to the emitter but
//! never held by [`crate::regalloc::RegAlloc`].

use crate::value::RegClass;
use target_lexicon::Architecture;

/// An architecture register, identified by its class and an index into
/// that class's register file.
///
/// The index is architecture-specific; this crate never interprets it
/// beyond using it as a key into the cache lists and use-count tables. The
/// concrete emitter is responsible for mapping it back to a real register
/// name/encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg {
    class: RegClass,
    index: u8,
}

impl Reg {
    /// Construct a register of the given class and index.
    pub const fn new(class: RegClass, index: u8) -> Self {
        Self { class, index }
    }

    pub fn class(self) -> RegClass {
        self.class
    }

    pub fn index(self) -> u8 {
        self.index
    }
}

impl core::fmt::Display for Reg {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.class {
            RegClass::Int => write!(f, "gp{}", self.index),
            RegClass::Float => write!(f, "fp{}", self.index),
        }
    }
}

/// The set of cache registers available to the allocator for a single
/// architecture: one list per register class.
///
/// These lists intentionally exclude registers reserved by the ABI (e.g.
/// the stack pointer, the frame pointer, argument/return registers that
/// the calling convention pins) — those are observed transiently by the
/// translator but are never cache-eligible.
#[derive(Debug, Clone)]
pub struct CacheRegisterList {
    int: &'static [Reg],
    float: &'static [Reg],
}

impl CacheRegisterList {
    pub fn for_class(&self, class: RegClass) -> &'static [Reg] {
        match class {
            RegClass::Int => self.int,
            RegClass::Float => self.float,
        }
    }

    /// Resolve the cache register list for a target architecture.
    ///
    /// Selecting an architecture this crate has no list for is a
    /// configuration error on the embedder's part, not a bailout: it is
    /// reported before any function body is compiled.
    pub fn for_arch(arch: Architecture) -> Result<Self, UnsupportedArchitecture> {
        match arch {
            Architecture::X86_64 => Ok(X64_CACHE_REGISTERS.clone()),
            Architecture::Aarch64(_) => Ok(AARCH64_CACHE_REGISTERS.clone()),
            other => Err(UnsupportedArchitecture(other)),
        }
    }
}

/// Returned when [`CacheRegisterList::for_arch`] is asked for an
/// architecture the baseline has no register list for.
#[derive(Debug, thiserror::Error)]
#[error("baseline codegen has no cache register list for architecture `{0}`")]
pub struct UnsupportedArchitecture(Architecture);

macro_rules! reg_list {
    ($class:expr, [$($idx:expr),* $(,)?]) => {
        &[$(Reg::new($class, $idx)),*]
    };
}

// x86-64: callee-saved and caller-saved GPRs minus rsp/rbp/the args the ABI
// reserves; a conservative, fixed-size subset is enough for a baseline
// tier that never needs every register at once.
static X64_GP_REGS: &[Reg] = reg_list!(RegClass::Int, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
static X64_FP_REGS: &[Reg] = reg_list!(RegClass::Float, [0, 1, 2, 3, 4, 5, 6, 7]);

static X64_CACHE_REGISTERS: CacheRegisterList = CacheRegisterList {
    int: X64_GP_REGS,
    float: X64_FP_REGS,
};

static AARCH64_GP_REGS: &[Reg] = reg_list!(RegClass::Int, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
static AARCH64_FP_REGS: &[Reg] = reg_list!(RegClass::Float, [0, 1, 2, 3, 4, 5, 6, 7]);

static AARCH64_CACHE_REGISTERS: CacheRegisterList = CacheRegisterList {
    int: AARCH64_GP_REGS,
    float: AARCH64_FP_REGS,
};
