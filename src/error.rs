//! Bailout reasons and the handful of structured errors this crate can
//! surface to its embedder.
//!
//! Per the spec's error-handling design (§7), there are two entirely
//! separate failure channels:
//!
//! * a **bailout** is not an error — it is the normal way the baseline tier
//!   declines to compile a function, via [`BailoutReason`] plus the
//!   `failed` flag on [`crate::compiler::FunctionCompiler`];
//! * an **internal invariant violation** (use-count mismatch, unbound
//!   label, allocator over-subscription) is a programmer error in this
//!   crate or its embedder and is reported with `debug_assert!`/`assert!`
//!   at the violated invariant's call site, never through a `Result`.
//!
//! Decoder validation failures are the decoder's problem and have no
//! representation here at all.

use crate::value::WasmType;

/// Why the baseline declined to compile a function body.
///
/// Every variant corresponds to one of the triggers enumerated in spec §7.
/// This is deliberately not `#[non_exhaustive]`: the supported opcode
/// subset is closed, so the set of bailout reasons is closed too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BailoutReason {
    #[error("unsupported opcode at offset {offset}")]
    UnsupportedOpcode { offset: u32 },

    #[error("unsupported value type `{ty}` in a position the baseline can't handle")]
    UnsupportedType { ty: WasmType },

    #[error("operand stack would exceed the maximum height of {max}")]
    StackTooDeep { max: u32 },

    #[error("global at offset {offset} exceeds the baseline's supported access size")]
    OversizedGlobal { offset: u32 },

    #[error("parameter location for argument {index} is not supported by the baseline")]
    UnsupportedParameterLocation { index: u32 },

    #[error("function has a multi-value return, which the baseline does not support")]
    MultiValueReturn,
}
