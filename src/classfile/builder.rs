//! Building class files from scratch.
//!
//! Synthetic units, test fixtures and benchmarks need complete, well-formed class files
//! without a compiler. [`ClassFileBuilder`] collects the declarations and lays the class out
//! in one pass once every method body has interned its constants.

use crate::{
    classfile::{
        code::names, ClassAccessFlags, ConstantPool, ConstantPoolBuilder, FieldAccessFlags,
        MethodAccessFlags, MethodBody,
    },
    file::{io::ByteSink, CLASS_MAGIC},
    Result,
};

/// Produces a method body once the constant pool is available.
pub type MethodCode = Box<dyn FnOnce(&mut ConstantPoolBuilder<'_>) -> Result<MethodBody>>;

struct FieldSpec {
    access: FieldAccessFlags,
    name: String,
    descriptor: String,
}

struct MethodSpec {
    access: MethodAccessFlags,
    name: String,
    descriptor: String,
    code: Option<MethodCode>,
}

/// Assembles a complete class file.
///
/// # Examples
///
/// ```rust,ignore
/// use classweave::bytecode::{opcodes, Instruction};
/// use classweave::classfile::{ClassFileBuilder, MethodAccessFlags, MethodBody};
///
/// let bytes = ClassFileBuilder::new("com/example/Hooks")
///     .method(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "onTick", "()V", |_| {
///         let mut body = MethodBody::new(0);
///         body.insns.push(Instruction::simple(opcodes::RETURN));
///         Ok(body)
///     })
///     .build()?;
/// ```
pub struct ClassFileBuilder {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    access: ClassAccessFlags,
    major_version: u16,
    minor_version: u16,
    fields: Vec<FieldSpec>,
    methods: Vec<MethodSpec>,
    source_file: Option<String>,
}

impl ClassFileBuilder {
    /// A public class extending `java/lang/Object`, version 52 (Java 8)
    #[must_use]
    pub fn new(name: &str) -> Self {
        ClassFileBuilder {
            name: name.to_string(),
            super_name: Some(crate::classfile::descriptor::OBJECT.to_string()),
            interfaces: Vec::new(),
            access: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            major_version: 52,
            minor_version: 0,
            fields: Vec::new(),
            methods: Vec::new(),
            source_file: None,
        }
    }

    /// Set the class file version
    #[must_use]
    pub fn version(mut self, major: u16, minor: u16) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    /// Set the class access flags
    #[must_use]
    pub fn access(mut self, access: ClassAccessFlags) -> Self {
        self.access = access;
        self
    }

    /// Set the superclass, `None` for none
    #[must_use]
    pub fn super_class(mut self, name: Option<&str>) -> Self {
        self.super_name = name.map(str::to_string);
        self
    }

    /// Add a direct superinterface
    #[must_use]
    pub fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    /// Add a field without attributes
    #[must_use]
    pub fn field(mut self, access: FieldAccessFlags, name: &str, descriptor: &str) -> Self {
        self.fields.push(FieldSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
        self
    }

    /// Add a method whose body `code` builds against the class's constant pool
    #[must_use]
    pub fn method<F>(
        mut self,
        access: MethodAccessFlags,
        name: &str,
        descriptor: &str,
        code: F,
    ) -> Self
    where
        F: FnOnce(&mut ConstantPoolBuilder<'_>) -> Result<MethodBody> + 'static,
    {
        self.methods.push(MethodSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code: Some(Box::new(code)),
        });
        self
    }

    /// Add a method without a `Code` attribute (abstract or native)
    #[must_use]
    pub fn bodyless_method(
        mut self,
        access: MethodAccessFlags,
        name: &str,
        descriptor: &str,
    ) -> Self {
        self.methods.push(MethodSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code: None,
        });
        self
    }

    /// Add a `SourceFile` attribute
    #[must_use]
    pub fn source_file(mut self, name: &str) -> Self {
        self.source_file = Some(name.to_string());
        self
    }

    /// Lay out the class file.
    ///
    /// # Errors
    ///
    /// Propagates errors from method body closures and body encoding, and returns
    /// [`crate::Error::ConstantPoolOverflow`] if the pool fills up.
    pub fn build(self) -> Result<Vec<u8>> {
        let base = ConstantPool::empty();
        let mut pool = ConstantPoolBuilder::new(&base);

        let mut body = Vec::new();
        body.put_be(self.access.bits());
        body.put_be(pool.add_class(&self.name)?);
        match &self.super_name {
            Some(name) => body.put_be(pool.add_class(name)?),
            None => body.put_be(0_u16),
        }

        body.put_be(self.interfaces.len() as u16);
        for interface in &self.interfaces {
            body.put_be(pool.add_class(interface)?);
        }

        body.put_be(self.fields.len() as u16);
        for field in &self.fields {
            body.put_be(field.access.bits());
            body.put_be(pool.add_utf8(&field.name)?);
            body.put_be(pool.add_utf8(&field.descriptor)?);
            body.put_be(0_u16);
        }

        body.put_be(self.methods.len() as u16);
        for method in self.methods {
            body.put_be(method.access.bits());
            body.put_be(pool.add_utf8(&method.name)?);
            body.put_be(pool.add_utf8(&method.descriptor)?);
            match method.code {
                Some(code) => {
                    let payload = code(&mut pool)?.encode()?;
                    body.put_be(1_u16);
                    body.put_be(pool.add_utf8(names::CODE)?);
                    body.put_be(payload.len() as u32);
                    body.put_bytes(&payload);
                }
                None => body.put_be(0_u16),
            }
        }

        match &self.source_file {
            Some(source) => {
                body.put_be(1_u16);
                body.put_be(pool.add_utf8("SourceFile")?);
                body.put_be(2_u32);
                body.put_be(pool.add_utf8(source)?);
            }
            None => body.put_be(0_u16),
        }

        let mut out = Vec::with_capacity(body.len() + 512);
        out.put_be(CLASS_MAGIC);
        out.put_be(self.minor_version);
        out.put_be(self.major_version);
        out.put_be(pool.count() as u16);
        pool.write_appended(&mut out)?;
        out.put_bytes(&body);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::{opcodes, Instruction},
        classfile::ClassFile,
    };

    #[test]
    fn test_build_parses_back() {
        let bytes = ClassFileBuilder::new("com/example/Empty")
            .version(61, 0)
            .interface("java/io/Serializable")
            .field(FieldAccessFlags::PRIVATE, "count", "J")
            .method(MethodAccessFlags::PUBLIC, "size", "()I", |_| {
                let mut body = MethodBody::new(1);
                body.max_stack = 1;
                body.insns.push(Instruction::simple(opcodes::ICONST_0));
                body.insns.push(Instruction::simple(opcodes::IRETURN));
                Ok(body)
            })
            .bodyless_method(
                MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
                "next",
                "()V",
            )
            .source_file("Empty.java")
            .build()
            .unwrap();

        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.major_version, 61);
        assert_eq!(class.this_name().unwrap(), "com/example/Empty");
        assert_eq!(class.interface_names().unwrap(), vec!["java/io/Serializable"]);
        assert!(class.find_field("count", Some("J")).is_some());

        let size = class.find_method("size", "()I").unwrap();
        let code = class.code(size).unwrap().unwrap();
        assert_eq!(code.code, &[opcodes::ICONST_0, opcodes::IRETURN]);
        assert_eq!(code.max_locals, 1);

        let next = class.find_method("next", "()V").unwrap();
        assert!(class.code(next).unwrap().is_none());
    }

    #[test]
    fn test_build_without_super() {
        let bytes = ClassFileBuilder::new("module-info")
            .access(ClassAccessFlags::MODULE)
            .super_class(None)
            .build()
            .unwrap();
        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.super_name().unwrap(), None);
    }
}
