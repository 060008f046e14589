use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! resolution_error {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {
        crate::Error::Resolution(format!($fmt $(, $arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers every failure that can occur while decoding class files, editing method
/// bodies, re-encoding units and loading mixin declarations. Each variant provides specific
/// context about the failure mode to enable appropriate error handling.
///
/// # Error Categories
///
/// ## Class File Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid class file structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of the input
/// - [`Error::NotSupported`] - Unsupported class file version or feature
/// - [`Error::Empty`] - Empty input provided
///
/// ## Transformation Errors
/// - [`Error::Configuration`] - A rule or declaration is inconsistent with the unit it targets
/// - [`Error::Resolution`] - A method, field or insertion point could not be resolved
/// - [`Error::BranchOutOfRange`] - An edit pushed a branch beyond its encodable range
/// - [`Error::CodeTooLarge`] - An edited method exceeds the 64 KiB code limit
/// - [`Error::ConstantPoolOverflow`] - The constant pool ran out of indices
///
/// ## Loading Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::Compile`] - A declaration source could not be compiled
/// - [`Error::Xml`] - The XML front-end rejected its input
///
/// # Examples
///
/// ```rust
/// use classweave::{Error, classfile::ClassFile};
///
/// match ClassFile::parse(&[0xCA, 0xFE]) {
///     Ok(_) => println!("parsed"),
///     Err(Error::OutOfBounds { .. }) => println!("truncated input"),
///     Err(Error::Malformed { message, .. }) => println!("malformed: {message}"),
///     Err(e) => println!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Class file parsing Errors
    /// The unit is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the input.
    #[error("Out of Bound read would have occurred - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This unit is not supported.
    ///
    /// Returned for class file versions outside the supported range and for
    /// structures the codec deliberately refuses to rewrite.
    #[error("This unit is not supported - {0}")]
    NotSupported(String),

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    // Transformation Errors
    /// A rule, declaration or configuration value does not fit the unit it is applied to.
    #[error("Configuration error - {0}")]
    Configuration(String),

    /// A method, field, variable or insertion point could not be resolved.
    #[error("Resolution failed - {0}")]
    Resolution(String),

    /// A branch offset no longer fits its 16-bit encoding after an edit.
    #[error("Branch at offset {offset} cannot reach its target ({distance} bytes)")]
    BranchOutOfRange {
        /// Offset of the branching instruction in the re-encoded code
        offset: usize,
        /// Signed distance to the target
        distance: i64,
    },

    /// Edited code exceeds the maximum method size.
    #[error("Method code of {0} bytes exceeds the 65535 byte limit")]
    CodeTooLarge(usize),

    /// The constant pool cannot hold any more entries.
    #[error("Constant pool overflow - {0} entries")]
    ConstantPoolOverflow(usize),

    // Loading Errors
    /// A declaration source file failed to compile.
    #[error("Failed to compile {path}: {message}")]
    Compile {
        /// The source file that failed
        path: PathBuf,
        /// Why it failed
        message: String,
    },

    /// Error from the XML reader used by the declaration front-end.
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    /// Failed to lock target.
    #[error("Failed to lock target")]
    LockError,
}

impl Error {
    /// Returns `true` for errors that describe a problem with a rule or declaration rather
    /// than with the unit being transformed.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::Resolution(_))
    }
}
