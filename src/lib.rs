//! Core of a baseline single-pass compiler for WebAssembly function
//! bodies: the cache-state abstraction, register allocation, per-opcode
//! translation and control-flow merging.
//!
//! This crate consumes a validated stream of stack-machine instructions
//! (via [`compiler::FunctionCompiler`]) and emits native machine code
//! directly against an architecture-neutral [`masm::MacroAssembler`],
//! without building an intermediate representation. It optimises for
//! minimum compilation latency, not peak code quality; functions outside
//! its supported opcode subset are declined with a [`error::BailoutReason`]
//! so a higher-tier compiler can retry them.

pub mod codegen;
pub mod compiler;
pub mod error;
pub mod frame;
pub mod masm;
pub mod reg;
pub mod regalloc;
pub mod stack;
pub mod translate;
pub mod value;

pub use codegen::CacheState;
pub use compiler::{CompileResult, FunctionCompiler};
pub use error::BailoutReason;
pub use masm::MacroAssembler;
pub use value::WasmType;
