//! JVM bytecode: opcodes, decoding, editable instruction lists and synthetic sequences.
//!
//! # Key Components
//!
//! - [`opcodes`] - Opcode constants
//! - [`instruction`] - Per-opcode operand formats and flow types, and [`Instruction`]
//! - [`decoder`] - Code array decoding ([`decode_code`])
//! - [`InsnList`] - Editable instruction list with stable [`NodeId`]s and its assembler
//! - [`SnippetBuilder`] - Synthetic sequences with stack tracking
//!
//! # Examples
//!
//! ```rust
//! use classweave::bytecode::{decode_code, opcodes};
//!
//! let code = [opcodes::ALOAD_0, opcodes::ARETURN];
//! let decoded = decode_code(&code)?;
//! assert_eq!(decoded.len(), 2);
//! assert_eq!(decoded[1].0, 1);
//! # Ok::<(), classweave::Error>(())
//! ```

pub mod decoder;
pub mod instruction;
mod list;
pub mod opcodes;
mod snippet;

pub use decoder::decode_code;
pub use instruction::{FlowType, Instruction, Operand};
pub use list::{Assembled, InsnList, Item, Node, NodeId, Origin, Side, MAX_CODE_LENGTH};
pub use snippet::{Snippet, SnippetBuilder};
