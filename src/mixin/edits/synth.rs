use crate::{
    bytecode::{opcodes, Instruction},
    classfile::{FieldAccessFlags, FieldType, MethodAccessFlags, MethodDescriptor},
    mixin::{
        editor::ClassEditor,
        resolve::{resolve_method, RuleContext},
        AccessorKind, MethodSelector,
    },
    Error, Result,
};

use super::build_body;

/// Add a public synthetic method `name` that forwards to the selected method.
///
/// Constructors are exposed as a static factory returning the new instance. Private targets
/// are reached with `invokespecial`, everything else with the regular virtual or interface
/// dispatch.
pub(super) fn invoker(
    ctx: &RuleContext<'_>,
    editor: &mut ClassEditor<'_, '_>,
    selector: &MethodSelector,
    name: &str,
) -> Result<()> {
    let class = editor.class();
    let target = resolve_method(ctx, class, selector)?;
    let owner = class.this_name()?;
    let interface = class.is_interface();
    let index = editor
        .pool
        .add_method_ref(owner, &target.name, &target.raw_descriptor, interface)?;

    let mut access = MethodAccessFlags::PUBLIC | MethodAccessFlags::SYNTHETIC;
    let (descriptor, body) = if target.is_constructor() {
        access |= MethodAccessFlags::STATIC;
        let class_index = editor.pool.add_class(owner)?;
        let this = FieldType::object(owner);
        let descriptor =
            MethodDescriptor::new(target.descriptor.params.clone(), Some(this.clone()));
        let body = build_body(editor, target.descriptor.param_slots(), |snippet| {
            snippet.emit(Instruction::member(opcodes::NEW, class_index), 0, 1)?;
            snippet.emit(Instruction::simple(opcodes::DUP), 1, 2)?;
            snippet.load_params(&target.descriptor, 0)?;
            snippet.invoke_instance(opcodes::INVOKESPECIAL, index, &target.descriptor)?;
            snippet.return_value(Some(&this))?;
            Ok(())
        })?;
        (descriptor, body)
    } else if target.is_static() {
        access |= MethodAccessFlags::STATIC;
        let body = build_body(editor, target.descriptor.param_slots(), |snippet| {
            snippet.load_params(&target.descriptor, 0)?;
            snippet.invoke_static(index, &target.descriptor)?;
            snippet.return_value(target.descriptor.ret.as_ref())?;
            Ok(())
        })?;
        (target.descriptor.clone(), body)
    } else {
        let opcode = if target.access.contains(MethodAccessFlags::PRIVATE) {
            opcodes::INVOKESPECIAL
        } else if interface {
            opcodes::INVOKEINTERFACE
        } else {
            opcodes::INVOKEVIRTUAL
        };
        let body = build_body(editor, target.descriptor.param_slots() + 1, |snippet| {
            snippet.load(&FieldType::object(owner), 0)?;
            snippet.load_params(&target.descriptor, 1)?;
            snippet.invoke_instance(opcode, index, &target.descriptor)?;
            snippet.return_value(target.descriptor.ret.as_ref())?;
            Ok(())
        })?;
        (target.descriptor.clone(), body)
    };

    log::debug!(
        "Invoker {name}{descriptor} -> {}{} in {}",
        target.name,
        target.raw_descriptor,
        ctx.unit
    );
    editor.add_method(access, name, &descriptor.to_string(), &body)
}

/// Add a public synthetic getter or setter `name` for field `field`.
pub(super) fn accessor(
    ctx: &RuleContext<'_>,
    editor: &mut ClassEditor<'_, '_>,
    field: &str,
    descriptor: Option<&str>,
    name: &str,
    kind: AccessorKind,
) -> Result<()> {
    let class = editor.class();
    let field_name = ctx.field_name(ctx.unit, field, descriptor);
    let slot = class.find_field(field_name, descriptor).ok_or_else(|| {
        Error::Configuration(format!("No field named '{field_name}' in {}", ctx.unit))
    })?;
    let info = &class.fields()[slot];
    let raw_descriptor = class.member_descriptor(info)?;
    let ty = FieldType::parse(raw_descriptor)?;
    let flags = info.field_access();
    let is_static = flags.contains(FieldAccessFlags::STATIC);

    if kind == AccessorKind::Setter && flags.contains(FieldAccessFlags::FINAL) {
        return Err(Error::Configuration(format!(
            "Cannot generate a setter for final field {field_name} of {}",
            ctx.unit
        )));
    }

    let owner = class.this_name()?;
    let index = editor.pool.add_field_ref(owner, field_name, raw_descriptor)?;
    let mut access = MethodAccessFlags::PUBLIC | MethodAccessFlags::SYNTHETIC;
    if is_static {
        access |= MethodAccessFlags::STATIC;
    }
    let receiver = u16::from(!is_static);

    let (descriptor, body) = match kind {
        AccessorKind::Getter => {
            let body = build_body(editor, receiver, |snippet| {
                if !is_static {
                    snippet.load(&FieldType::object(owner), 0)?;
                }
                snippet.get_field(index, &ty, is_static)?;
                snippet.return_value(Some(&ty))?;
                Ok(())
            })?;
            (MethodDescriptor::new(Vec::new(), Some(ty)), body)
        }
        AccessorKind::Setter => {
            let body = build_body(editor, receiver + ty.slots(), |snippet| {
                if !is_static {
                    snippet.load(&FieldType::object(owner), 0)?;
                }
                snippet.load(&ty, receiver)?;
                snippet.put_field(index, &ty, is_static)?;
                snippet.return_value(None)?;
                Ok(())
            })?;
            (MethodDescriptor::new(vec![ty], None), body)
        }
    };

    editor.add_method(access, name, &descriptor.to_string(), &body)
}

#[cfg(test)]
mod tests {
    use crate::{
        bytecode::opcodes,
        classfile::{ClassFile, ClassFileBuilder, FieldAccessFlags, MethodAccessFlags},
        mixin::{
            edits::tests::{apply_rules, apply_rules_to, body_in, opcodes_of},
            AccessorKind, EngineConfig, MethodSelector, Rule,
        },
        Error,
    };

    fn invoker(method: MethodSelector, name: &str) -> Rule {
        Rule::Invoker {
            method,
            accessor_name: name.to_string(),
            remap: false,
        }
    }

    fn accessor(field: &str, name: &str, kind: AccessorKind) -> Rule {
        Rule::Accessor {
            field: field.to_string(),
            descriptor: None,
            accessor_name: name.to_string(),
            kind,
            remap: false,
        }
    }

    #[test]
    fn test_invoker_for_private_method() {
        let rule = invoker(MethodSelector::exact("scale", "(I)I"), "callScale");
        let bytes = apply_rules(&EngineConfig::default(), &[rule]).unwrap();
        assert_eq!(
            opcodes_of(&bytes, "callScale", "(I)I"),
            [opcodes::ALOAD_0, opcodes::ILOAD_1, opcodes::INVOKESPECIAL, opcodes::IRETURN]
        );
        let class = ClassFile::parse(&bytes).unwrap();
        let slot = class.find_method("callScale", "(I)I").unwrap();
        assert_eq!(
            class.methods()[slot].method_access(),
            MethodAccessFlags::PUBLIC | MethodAccessFlags::SYNTHETIC
        );
        assert_eq!(body_in(&bytes, "callScale", "(I)I").max_locals, 2);
    }

    #[test]
    fn test_invoker_for_constructor_is_factory() {
        let rule = invoker(MethodSelector::exact("<init>", "()V"), "create");
        let bytes = apply_rules(&EngineConfig::default(), &[rule]).unwrap();
        assert_eq!(
            opcodes_of(&bytes, "create", "()Lcom/example/Player;"),
            [opcodes::NEW, opcodes::DUP, opcodes::INVOKESPECIAL, opcodes::ARETURN]
        );
        let body = body_in(&bytes, "create", "()Lcom/example/Player;");
        assert_eq!(body.max_stack, 2);
    }

    #[test]
    fn test_getter_and_setter() {
        let rules = [
            accessor("health", "accessHealth", AccessorKind::Getter),
            accessor("health", "assignHealth", AccessorKind::Setter),
        ];
        let bytes = apply_rules(&EngineConfig::default(), &rules).unwrap();
        assert_eq!(
            opcodes_of(&bytes, "accessHealth", "()I"),
            [opcodes::ALOAD_0, opcodes::GETFIELD, opcodes::IRETURN]
        );
        assert_eq!(
            opcodes_of(&bytes, "assignHealth", "(I)V"),
            [opcodes::ALOAD_0, opcodes::ILOAD_1, opcodes::PUTFIELD, opcodes::RETURN]
        );
    }

    #[test]
    fn test_accessor_collisions_and_missing_fields() {
        let clash = accessor("health", "getHealth", AccessorKind::Getter);
        assert!(matches!(
            apply_rules(&EngineConfig::default(), &[clash]),
            Err(Error::Configuration(_))
        ));
        let missing = accessor("mana", "getMana", AccessorKind::Getter);
        assert!(matches!(
            apply_rules(&EngineConfig::default(), &[missing]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_static_final_field() {
        let bytes = ClassFileBuilder::new("com/example/Limits")
            .field(FieldAccessFlags::STATIC | FieldAccessFlags::FINAL, "MAX", "J")
            .build()
            .unwrap();
        let config = EngineConfig::default();

        let getter = accessor("MAX", "max", AccessorKind::Getter);
        let out = apply_rules_to(&bytes, "com/example/Limits", &config, &[getter]).unwrap();
        assert_eq!(opcodes_of(&out, "max", "()J"), [opcodes::GETSTATIC, opcodes::LRETURN]);

        let setter = accessor("MAX", "setMax", AccessorKind::Setter);
        assert!(matches!(
            apply_rules_to(&bytes, "com/example/Limits", &config, &[setter]),
            Err(Error::Configuration(_))
        ));
    }
}
