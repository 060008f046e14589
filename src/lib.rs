// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # classweave
//!
//! [![Crates.io](https://img.shields.io/crates/v/classweave.svg)](https://crates.io/crates/classweave)
//! [![Documentation](https://docs.rs/classweave/badge.svg)](https://docs.rs/classweave)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/classweave/blob/main/LICENSE-APACHE)
//!
//! A load-time transformation engine for JVM class files. Hosts hand `classweave` every unit
//! right before it becomes executable; units targeted by a registered rule bundle come back
//! rewritten, everything else comes back untouched.
//!
//! ## Features
//!
//! - **Declarative rules** - Injection, call redirection, argument, constant and local
//!   variable modification, whole-method overwrite, invoker and accessor synthesis
//! - **Byte-identical passthrough** - Methods, fields and attributes no rule touched are
//!   copied verbatim from the input
//! - **Per-bundle rollback** - A bundle either applies completely or not at all
//! - **Cheap common path** - A memoized gate answers "nothing to do" without locking
//! - **Never fatal** - Failures and panics become diagnostics and leave the unit unchanged
//! - **Directory loading** - `*.mixin.xml` declarations and handler classes from disk
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use classweave::prelude::*;
//!
//! let engine = MixinEngine::new();
//! engine.register(
//!     RuleBundle::new("PlayerMixin", "com.example.Player").with_rule(Rule::Inject {
//!         method: MethodSelector::exact("damage", "(I)V"),
//!         handler: HandlerRef::new("com.example.Hooks", "onDamage"),
//!         at: InsertionPoint::head(),
//!         cancellable: true,
//!         remap: false,
//!         contract: MatchContract::require(1),
//!     }),
//! );
//!
//! let input = std::fs::read("Player.class")?;
//! match engine.transform_unit("com/example/Player", &input) {
//!     Some(transformed) => std::fs::write("Player.class", transformed.bytes)?,
//!     None => println!("unchanged"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`classfile`] - Class file model, constant pool, lazy code decoding and the writer
//! - [`bytecode`] - Instructions, the editable instruction list and snippet building
//! - [`mixin`] - Rules, registry, gate, pipeline and the engine hosts talk to
//! - [`loader`] - Loading declarations and handler units from a directory
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result):
//!
//! ```rust
//! use classweave::{classfile::ClassFile, Error};
//!
//! match ClassFile::parse(&[0xCA, 0xFE, 0xBA, 0xBE]) {
//!     Ok(_) => println!("parsed"),
//!     Err(Error::OutOfBounds { .. }) => println!("truncated"),
//!     Err(e) => println!("other error: {e}"),
//! }
//! ```
//!
//! ## Development and Testing
//!
//! ### Fuzzing
//!
//! ```bash
//! cargo +nightly fuzz run classfile --release
//! cargo +nightly fuzz run pipeline --release -- -jobs=4 -fork=1
//! ```
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;
pub(crate) mod utils;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use classweave::prelude::*;
///
/// let engine = MixinEngine::new();
/// assert!(engine.decide("java/lang/String").is_empty());
/// ```
pub mod prelude;

/// JVM class file model.
///
/// Parsing is zero-copy: members and attributes keep byte spans into the input, and method
/// bodies are only decoded when an edit needs them. [`classfile::ClassWriter`] emits a new
/// unit from the original spans plus the edited members.
///
/// # Key Components
///
/// - [`classfile::ClassFile`] - Parsed view of a unit
/// - [`classfile::ConstantPool`] / [`classfile::ConstantPoolBuilder`] - Reading and extending
///   the constant pool
/// - [`classfile::MethodBody`] - An editable `Code` attribute
/// - [`classfile::ClassFileBuilder`] - Building units from scratch
pub mod classfile;

/// JVM instructions and instruction lists.
///
/// - [`bytecode::Instruction`] - One decoded instruction
/// - [`bytecode::InsnList`] - Editable instruction sequence with stable node identities
/// - [`bytecode::SnippetBuilder`] - Typed construction of inserted code
pub mod bytecode;

/// The load-time transformation engine.
pub mod mixin;

/// Directory loading of mixin declarations and handler units.
pub mod loader;

/// `classweave` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `classweave` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use classweave::{Error, classfile::ClassFile};
///
/// match ClassFile::parse(&[]) {
///     Ok(_) => println!("parsed"),
///     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// Provides access to low-level file and memory parsing utilities.
///
/// # Example
///
/// ```rust
/// use classweave::Parser;
///
/// let data = [0xCA, 0xFE, 0xBA, 0xBE];
/// let mut parser = Parser::new(&data);
/// assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
/// # Ok::<(), classweave::Error>(())
/// ```
pub use file::{parser::Parser, File};
