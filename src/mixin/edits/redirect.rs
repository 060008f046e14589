use crate::{
    bytecode::{opcodes, Instruction, NodeId, SnippetBuilder},
    classfile::{MethodBody, MethodDescriptor, PoolAccess},
    mixin::{
        editor::ClassEditor,
        resolve::{call_site, find_calls, RuleContext, CONSTRUCTOR},
        CallSiteMatch, HandlerRef, MatchContract, MethodSelector,
    },
    Error, Result,
};

use super::{check_matches, handler_index, open, owner_type};

/// A matched call, detached from the pool it was read from
struct Call {
    opcode: u8,
    owner: String,
    name: String,
    descriptor: MethodDescriptor,
}

fn read_call(pool: &impl PoolAccess, body: &MethodBody, node: NodeId) -> Result<Call> {
    let insn = body
        .insns
        .insn(node)
        .ok_or_else(|| resolution_error!("Call node {:?} disappeared", node))?;
    let site = call_site(pool, insn)?
        .ok_or_else(|| resolution_error!("Node {:?} is not a call", node))?;
    let Some(owner) = site.owner else {
        return Err(Error::Configuration(format!(
            "Cannot rewrite invokedynamic call site {}",
            site.name
        )));
    };
    Ok(Call {
        opcode: insn.opcode,
        owner: owner.to_string(),
        name: site.name.to_string(),
        descriptor: MethodDescriptor::parse(site.descriptor)?,
    })
}

/// Replace every matched call with `invokestatic handler`.
///
/// Instance calls hand their receiver to the handler as the first argument, so the operand
/// stack is consumed exactly as the original call would have.
pub(super) fn redirect(
    ctx: &RuleContext<'_>,
    editor: &mut ClassEditor<'_, '_>,
    selector: &MethodSelector,
    handler: &HandlerRef,
    pattern: &CallSiteMatch,
    contract: &MatchContract,
) -> Result<()> {
    let (method, mut body) = open(ctx, editor, selector)?;
    let calls = find_calls(ctx, &editor.pool, &body, pattern)?;
    check_matches(ctx, contract, calls.len())?;
    if calls.is_empty() {
        return Ok(());
    }

    for node in calls {
        let call = read_call(&editor.pool, &body, node)?;
        if call.name == CONSTRUCTOR {
            return Err(Error::Configuration(format!(
                "Cannot redirect constructor call to {} in {}",
                call.owner, method.name
            )));
        }

        let mut descriptor = call.descriptor;
        if call.opcode != opcodes::INVOKESTATIC {
            descriptor.params.insert(0, owner_type(&call.owner)?);
        }
        let index = handler_index(editor, handler, &descriptor)?;
        body.insns
            .replace(node, Instruction::member(opcodes::INVOKESTATIC, index))?;
    }

    editor.store_body(method.slot, body);
    Ok(())
}

/// Pass argument `index` of every matched call through `handler`, a `(T)T` method.
///
/// Arguments after `index` are parked in fresh locals above the method's own, the handler
/// runs on the now topmost argument, and the parked ones are reloaded.
pub(super) fn modify_arg(
    ctx: &RuleContext<'_>,
    editor: &mut ClassEditor<'_, '_>,
    selector: &MethodSelector,
    handler: &HandlerRef,
    pattern: &CallSiteMatch,
    index: usize,
    contract: &MatchContract,
) -> Result<()> {
    let (method, mut body) = open(ctx, editor, selector)?;
    let calls = find_calls(ctx, &editor.pool, &body, pattern)?;
    check_matches(ctx, contract, calls.len())?;
    if calls.is_empty() {
        return Ok(());
    }

    let base = body.max_locals;
    let mut max_locals = base;
    let mut peak = 0;
    for node in calls {
        let call = read_call(&editor.pool, &body, node)?;
        let Some(argument) = call.descriptor.params.get(index).cloned() else {
            return Err(Error::Configuration(format!(
                "{}.{}{} has no argument {index}",
                call.owner, call.name, call.descriptor
            )));
        };
        let descriptor = MethodDescriptor::new(vec![argument.clone()], Some(argument));
        let handler_index = handler_index(editor, handler, &descriptor)?;

        let trailing = &call.descriptor.params[index + 1..];
        let mut slots = Vec::with_capacity(trailing.len());
        let mut next = base;
        for param in trailing {
            slots.push(next);
            next = next
                .checked_add(param.slots())
                .ok_or_else(|| Error::Configuration("Local variable slots exhausted".into()))?;
        }
        max_locals = max_locals.max(next);

        let mut snippet = SnippetBuilder::new(&mut body.insns);
        for (param, slot) in trailing.iter().zip(&slots).rev() {
            snippet.store(param, *slot)?;
        }
        snippet.invoke_static(handler_index, &descriptor)?;
        for (param, slot) in trailing.iter().zip(&slots) {
            snippet.load(param, *slot)?;
        }
        let snippet = snippet.finish();
        peak = peak.max(snippet.peak);
        body.insns.insert_before(node, snippet.items)?;
    }

    body.max_locals = max_locals;
    body.max_stack = body.max_stack.saturating_add(peak);
    editor.store_body(method.slot, body);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{
        bytecode::{opcodes, Instruction},
        classfile::{ClassFile, ClassFileBuilder, MethodAccessFlags, PoolAccess},
        mixin::{
            edits::tests::{apply_rules, apply_rules_to, body_in, opcodes_of},
            CallSiteMatch, EngineConfig, HandlerRef, MatchContract, MethodSelector, Rule,
        },
        test::{body_of, HOOKS},
        Error,
    };

    fn redirect(method: &str, descriptor: &str, call: &str) -> Rule {
        Rule::Redirect {
            method: MethodSelector::exact(method, descriptor),
            handler: HandlerRef::new(HOOKS, "redirect"),
            call: call.parse().unwrap(),
            remap: false,
            contract: MatchContract::default(),
        }
    }

    fn modify_arg(call: CallSiteMatch, index: usize) -> Rule {
        Rule::ModifyArg {
            method: MethodSelector::named("calc"),
            handler: HandlerRef::new(HOOKS, "adjust"),
            call,
            index,
            remap: false,
            contract: MatchContract::default(),
        }
    }

    fn calculator() -> Vec<u8> {
        ClassFileBuilder::new("com/example/Calc")
            .method(MethodAccessFlags::STATIC, "calc", "()I", |pool| {
                let max = pool.add_method_ref("java/lang/Math", "max", "(II)I", false)?;
                Ok(body_of(
                    2,
                    0,
                    vec![
                        Instruction::simple(opcodes::ICONST_1),
                        Instruction::simple(opcodes::ICONST_2),
                        Instruction::member(opcodes::INVOKESTATIC, max),
                        Instruction::simple(opcodes::IRETURN),
                    ],
                ))
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_redirect_instance_call() {
        let rule = redirect("tick", "()V", "com/example/Player.damage(I)V");
        let bytes = apply_rules(&EngineConfig::default(), &[rule]).unwrap();
        let ops = opcodes_of(&bytes, "tick", "()V");
        assert_eq!(ops[2], opcodes::INVOKESTATIC);
        assert_eq!(ops.len(), 6);

        let class = ClassFile::parse(&bytes).unwrap();
        let body = body_in(&bytes, "tick", "()V");
        let call = body.insns.iter().nth(2).unwrap().insn().unwrap();
        let member = class.constant_pool().member_ref(call.pool_index().unwrap()).unwrap();
        assert_eq!(member.name, "redirect");
        assert_eq!(member.descriptor, "(Lcom/example/Player;I)V");
    }

    #[test]
    fn test_redirect_static_call_keeps_descriptor() {
        let rule = redirect("tick", "()V", "info");
        let bytes = apply_rules(&EngineConfig::default(), &[rule]).unwrap();
        let class = ClassFile::parse(&bytes).unwrap();
        let body = body_in(&bytes, "tick", "()V");
        let call = body.insns.iter().nth(4).unwrap().insn().unwrap();
        let member = class.constant_pool().member_ref(call.pool_index().unwrap()).unwrap();
        assert_eq!(member.owner, HOOKS);
        assert_eq!(member.descriptor, "(Ljava/lang/String;)V");
    }

    #[test]
    fn test_redirect_constructor_rejected() {
        let rule = redirect("<init>", "()V", "<init>");
        assert!(matches!(
            apply_rules(&EngineConfig::default(), &[rule]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_modify_last_argument() {
        let rule = modify_arg("java/lang/Math.max".parse().unwrap(), 1);
        let bytes =
            apply_rules_to(&calculator(), "com/example/Calc", &EngineConfig::default(), &[rule])
                .unwrap();
        assert_eq!(
            opcodes_of(&bytes, "calc", "()I"),
            [
                opcodes::ICONST_1,
                opcodes::ICONST_2,
                opcodes::INVOKESTATIC,
                opcodes::INVOKESTATIC,
                opcodes::IRETURN
            ]
        );
        assert_eq!(body_in(&bytes, "calc", "()I").max_locals, 0);
    }

    #[test]
    fn test_modify_inner_argument_spills() {
        let rule = modify_arg("max(II)I".parse().unwrap(), 0);
        let bytes =
            apply_rules_to(&calculator(), "com/example/Calc", &EngineConfig::default(), &[rule])
                .unwrap();
        assert_eq!(
            opcodes_of(&bytes, "calc", "()I"),
            [
                opcodes::ICONST_1,
                opcodes::ICONST_2,
                opcodes::ISTORE_0,
                opcodes::INVOKESTATIC,
                opcodes::ILOAD_0,
                opcodes::INVOKESTATIC,
                opcodes::IRETURN
            ]
        );
        assert_eq!(body_in(&bytes, "calc", "()I").max_locals, 1);
    }

    #[test]
    fn test_modify_arg_out_of_range() {
        let rule = modify_arg("max".parse().unwrap(), 2);
        assert!(matches!(
            apply_rules_to(&calculator(), "com/example/Calc", &EngineConfig::default(), &[rule]),
            Err(Error::Configuration(_))
        ));
    }
}
