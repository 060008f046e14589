//! Field and method descriptors.
//!
//! # Key Components
//!
//! - [`FieldType`] - One field or parameter type (`I`, `Ljava/lang/String;`, `[J`, ...)
//! - [`MethodDescriptor`] - Parameter list plus return type (`(ILjava/lang/Object;)V`)
//!
//! Besides parsing and printing, the types know the opcodes that move values of their kind
//! between the operand stack and local variables, which is what synthesized code needs.
//!
//! # Examples
//!
//! ```rust
//! use classweave::classfile::{FieldType, MethodDescriptor};
//!
//! let desc = MethodDescriptor::parse("(IJLjava/lang/String;)Z")?;
//! assert_eq!(desc.params.len(), 3);
//! assert_eq!(desc.param_slots(), 4);
//! assert_eq!(desc.ret, Some(FieldType::Boolean));
//! assert_eq!(desc.to_string(), "(IJLjava/lang/String;)Z");
//! # Ok::<(), classweave::Error>(())
//! ```

use std::fmt;

use crate::{bytecode::opcodes, Result};

/// Internal name of `java.lang.Object`
pub const OBJECT: &str = "java/lang/Object";

/// One field, parameter or return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `D`
    Double,
    /// `F`
    Float,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `S`
    Short,
    /// `Z`
    Boolean,
    /// `L<internal name>;`
    Object(String),
    /// `[<component>`
    Array(Box<FieldType>),
}

impl FieldType {
    /// Parse a complete field descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `descriptor` is not exactly one field type.
    pub fn parse(descriptor: &str) -> Result<FieldType> {
        let (field, rest) = Self::parse_prefix(descriptor)?;
        if !rest.is_empty() {
            return Err(malformed_error!(
                "Trailing characters in field descriptor '{}'",
                descriptor
            ));
        }
        Ok(field)
    }

    /// Shorthand for an object type
    #[must_use]
    pub fn object(internal_name: &str) -> FieldType {
        FieldType::Object(internal_name.to_string())
    }

    fn parse_prefix(input: &str) -> Result<(FieldType, &str)> {
        let mut chars = input.chars();
        let Some(tag) = chars.next() else {
            return Err(malformed_error!("Empty field descriptor"));
        };
        let rest = chars.as_str();
        let field = match tag {
            'B' => FieldType::Byte,
            'C' => FieldType::Char,
            'D' => FieldType::Double,
            'F' => FieldType::Float,
            'I' => FieldType::Int,
            'J' => FieldType::Long,
            'S' => FieldType::Short,
            'Z' => FieldType::Boolean,
            'L' => {
                let Some(end) = rest.find(';') else {
                    return Err(malformed_error!("Unterminated object type in '{}'", input));
                };
                if end == 0 {
                    return Err(malformed_error!("Empty class name in '{}'", input));
                }
                return Ok((FieldType::Object(rest[..end].to_string()), &rest[end + 1..]));
            }
            '[' => {
                let (component, rest) = Self::parse_prefix(rest)?;
                return Ok((FieldType::Array(Box::new(component)), rest));
            }
            other => {
                return Err(malformed_error!(
                    "Invalid descriptor character '{}' in '{}'",
                    other,
                    input
                ))
            }
        };
        Ok((field, rest))
    }

    /// Number of local variable / operand stack slots a value occupies
    #[must_use]
    pub fn slots(&self) -> u16 {
        match self {
            FieldType::Long | FieldType::Double => 2,
            _ => 1,
        }
    }

    /// Returns `true` for object and array types
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Object(_) | FieldType::Array(_))
    }

    /// Opcode loading a value of this type from a local variable
    #[must_use]
    pub fn load_opcode(&self) -> u8 {
        match self {
            FieldType::Long => opcodes::LLOAD,
            FieldType::Float => opcodes::FLOAD,
            FieldType::Double => opcodes::DLOAD,
            FieldType::Object(_) | FieldType::Array(_) => opcodes::ALOAD,
            _ => opcodes::ILOAD,
        }
    }

    /// Opcode storing a value of this type into a local variable
    #[must_use]
    pub fn store_opcode(&self) -> u8 {
        match self {
            FieldType::Long => opcodes::LSTORE,
            FieldType::Float => opcodes::FSTORE,
            FieldType::Double => opcodes::DSTORE,
            FieldType::Object(_) | FieldType::Array(_) => opcodes::ASTORE,
            _ => opcodes::ISTORE,
        }
    }

    /// Opcode returning a value of this type
    #[must_use]
    pub fn return_opcode(&self) -> u8 {
        match self {
            FieldType::Long => opcodes::LRETURN,
            FieldType::Float => opcodes::FRETURN,
            FieldType::Double => opcodes::DRETURN,
            FieldType::Object(_) | FieldType::Array(_) => opcodes::ARETURN,
            _ => opcodes::IRETURN,
        }
    }

    /// Opcode pushing the default value (zero, `false` or `null`) of this type
    #[must_use]
    pub fn default_opcode(&self) -> u8 {
        match self {
            FieldType::Long => opcodes::LCONST_0,
            FieldType::Float => opcodes::FCONST_0,
            FieldType::Double => opcodes::DCONST_0,
            FieldType::Object(_) | FieldType::Array(_) => opcodes::ACONST_NULL,
            _ => opcodes::ICONST_0,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Byte => f.write_str("B"),
            FieldType::Char => f.write_str("C"),
            FieldType::Double => f.write_str("D"),
            FieldType::Float => f.write_str("F"),
            FieldType::Int => f.write_str("I"),
            FieldType::Long => f.write_str("J"),
            FieldType::Short => f.write_str("S"),
            FieldType::Boolean => f.write_str("Z"),
            FieldType::Object(name) => write!(f, "L{name};"),
            FieldType::Array(component) => write!(f, "[{component}"),
        }
    }
}

/// A parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Parameter types in declaration order
    pub params: Vec<FieldType>,
    /// Return type, `None` for `void`
    pub ret: Option<FieldType>,
}

impl MethodDescriptor {
    /// Build a descriptor from its parts
    #[must_use]
    pub fn new(params: Vec<FieldType>, ret: Option<FieldType>) -> Self {
        MethodDescriptor { params, ret }
    }

    /// Parse a method descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for anything that is not `(<params>)<return>`.
    pub fn parse(descriptor: &str) -> Result<MethodDescriptor> {
        let Some(mut rest) = descriptor.strip_prefix('(') else {
            return Err(malformed_error!(
                "Method descriptor '{}' does not start with '('",
                descriptor
            ));
        };

        let mut params = Vec::new();
        loop {
            if let Some(after) = rest.strip_prefix(')') {
                rest = after;
                break;
            }
            if rest.is_empty() {
                return Err(malformed_error!(
                    "Unterminated parameter list in '{}'",
                    descriptor
                ));
            }
            let (param, after) = FieldType::parse_prefix(rest)?;
            params.push(param);
            rest = after;
        }

        let ret = if rest == "V" {
            None
        } else {
            Some(FieldType::parse(rest)?)
        };

        Ok(MethodDescriptor { params, ret })
    }

    /// Total local variable slots taken by the parameters (excluding `this`)
    #[must_use]
    pub fn param_slots(&self) -> u16 {
        self.params.iter().map(FieldType::slots).sum()
    }

    /// Stack slots taken by the return value
    #[must_use]
    pub fn return_slots(&self) -> u16 {
        self.ret.as_ref().map_or(0, FieldType::slots)
    }

    /// Opcode returning from a method with this descriptor
    #[must_use]
    pub fn return_opcode(&self) -> u8 {
        self.ret
            .as_ref()
            .map_or(opcodes::RETURN, FieldType::return_opcode)
    }

    /// The same descriptor with `owner` prepended as the first parameter
    #[must_use]
    pub fn with_receiver(&self, owner: &str) -> MethodDescriptor {
        let mut params = Vec::with_capacity(self.params.len() + 1);
        params.push(FieldType::object(owner));
        params.extend(self.params.iter().cloned());
        MethodDescriptor {
            params,
            ret: self.ret.clone(),
        }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.params {
            write!(f, "{param}")?;
        }
        f.write_str(")")?;
        match &self.ret {
            Some(ret) => write!(f, "{ret}"),
            None => f.write_str("V"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_types() {
        assert_eq!(FieldType::parse("I").unwrap(), FieldType::Int);
        assert_eq!(
            FieldType::parse("[[Ljava/lang/String;").unwrap(),
            FieldType::Array(Box::new(FieldType::Array(Box::new(FieldType::object(
                "java/lang/String"
            )))))
        );
        assert!(FieldType::parse("").is_err());
        assert!(FieldType::parse("Ljava/lang/String").is_err());
        assert!(FieldType::parse("II").is_err());
        assert!(FieldType::parse("V").is_err());
        assert!(FieldType::parse("L;").is_err());
    }

    #[test]
    fn test_opcodes_by_kind() {
        assert_eq!(FieldType::Boolean.load_opcode(), opcodes::ILOAD);
        assert_eq!(FieldType::Double.store_opcode(), opcodes::DSTORE);
        assert_eq!(FieldType::object("a/B").return_opcode(), opcodes::ARETURN);
        assert_eq!(FieldType::Long.default_opcode(), opcodes::LCONST_0);
        assert_eq!(FieldType::Long.slots(), 2);
        assert_eq!(FieldType::Array(Box::new(FieldType::Long)).slots(), 1);
    }

    #[test]
    fn test_method_descriptor() {
        let desc = MethodDescriptor::parse("([IDLa/B;)V").unwrap();
        assert_eq!(desc.params.len(), 3);
        assert_eq!(desc.param_slots(), 4);
        assert_eq!(desc.ret, None);
        assert_eq!(desc.return_opcode(), opcodes::RETURN);
        assert_eq!(desc.return_slots(), 0);
        assert_eq!(desc.to_string(), "([IDLa/B;)V");

        let with_this = desc.with_receiver("com/example/Player");
        assert_eq!(with_this.to_string(), "(Lcom/example/Player;[IDLa/B;)V");

        assert!(MethodDescriptor::parse("I)V").is_err());
        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("()").is_err());
        assert!(MethodDescriptor::parse("()VV").is_err());
    }
}
