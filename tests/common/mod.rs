//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use classweave::{
    bytecode::{opcodes, Instruction, Item, Operand},
    classfile::{
        stackmap::FrameKind, ClassFile, ClassFileBuilder, ConstantPoolBuilder, FieldAccessFlags,
        MethodAccessFlags, MethodBody, PoolAccess,
    },
    mixin::{HandlerRef, InsertionPoint, MatchContract, MethodSelector, Rule},
    Result,
};

pub const PLAYER: &str = "com/example/Player";
pub const HOOKS: &str = "com/example/Hooks";

fn body(max_stack: u16, max_locals: u16, insns: Vec<Instruction>) -> MethodBody {
    let mut body = MethodBody::new(max_locals);
    body.max_stack = max_stack;
    for insn in insns {
        body.insns.push(insn);
    }
    body
}

fn health(pool: &mut ConstantPoolBuilder<'_>, opcode: u8) -> Result<Instruction> {
    Ok(Instruction::member(
        opcode,
        pool.add_field_ref(PLAYER, "health", "I")?,
    ))
}

/// `com/example/Player` with a constructor, field accessors, a branch with a frame and a
/// call between two of its own methods
pub fn player_class() -> Vec<u8> {
    let public = MethodAccessFlags::PUBLIC;
    ClassFileBuilder::new(PLAYER)
        .field(FieldAccessFlags::PRIVATE, "health", "I")
        .field(FieldAccessFlags::PRIVATE | FieldAccessFlags::FINAL, "name", "Ljava/lang/String;")
        .method(public, "<init>", "()V", |pool| {
            Ok(body(
                2,
                1,
                vec![
                    Instruction::simple(opcodes::ALOAD_0),
                    Instruction::member(
                        opcodes::INVOKESPECIAL,
                        pool.add_method_ref("java/lang/Object", "<init>", "()V", false)?,
                    ),
                    Instruction::simple(opcodes::ALOAD_0),
                    Instruction {
                        opcode: opcodes::BIPUSH,
                        operand: Operand::Byte(20),
                    },
                    health(pool, opcodes::PUTFIELD)?,
                    Instruction::simple(opcodes::RETURN),
                ],
            ))
        })
        .method(public, "tick", "()V", |pool| {
            Ok(body(
                2,
                1,
                vec![
                    Instruction::simple(opcodes::ALOAD_0),
                    Instruction::simple(opcodes::ICONST_1),
                    Instruction::member(
                        opcodes::INVOKEVIRTUAL,
                        pool.add_method_ref(PLAYER, "damage", "(I)V", false)?,
                    ),
                    Instruction::simple(opcodes::RETURN),
                ],
            ))
        })
        .method(public, "damage", "(I)V", |pool| {
            Ok(body(
                3,
                2,
                vec![
                    Instruction::simple(opcodes::ALOAD_0),
                    Instruction::simple(opcodes::DUP),
                    health(pool, opcodes::GETFIELD)?,
                    Instruction::simple(opcodes::ILOAD_1),
                    Instruction::simple(opcodes::ISUB),
                    health(pool, opcodes::PUTFIELD)?,
                    Instruction::simple(opcodes::RETURN),
                ],
            ))
        })
        .method(public, "isAlive", "()Z", |pool| {
            let mut body = MethodBody::new(1);
            body.max_stack = 1;
            let dead = body.insns.fresh_id();
            body.insns.push(Instruction::simple(opcodes::ALOAD_0));
            body.insns.push(health(pool, opcodes::GETFIELD)?);
            body.insns.push(Instruction::branch(opcodes::IFLE, dead));
            body.insns.push(Instruction::simple(opcodes::ICONST_1));
            body.insns.push(Instruction::simple(opcodes::IRETURN));
            body.insns.push_with_id(dead, Item::Label);
            body.insns.push(Instruction::simple(opcodes::ICONST_0));
            body.insns.push(Instruction::simple(opcodes::IRETURN));
            body.add_frame(dead, FrameKind::Same, pool.add_utf8("StackMapTable")?);
            Ok(body)
        })
        .method(public, "getHealth", "()I", |pool| {
            Ok(body(
                1,
                1,
                vec![
                    Instruction::simple(opcodes::ALOAD_0),
                    health(pool, opcodes::GETFIELD)?,
                    Instruction::simple(opcodes::IRETURN),
                ],
            ))
        })
        .source_file("Player.java")
        .build()
        .unwrap()
}

/// `com/example/Hooks` with an empty static `onDamage(Lcom/example/Player;I)V`
pub fn hooks_class() -> Vec<u8> {
    ClassFileBuilder::new(HOOKS)
        .method(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            "onDamage",
            "(Lcom/example/Player;I)V",
            |_| Ok(body(0, 2, vec![Instruction::simple(opcodes::RETURN)])),
        )
        .build()
        .unwrap()
}

/// Inject a call to `Hooks.<handler>` at the head of `damage(I)V`
pub fn inject_head(handler: &str) -> Rule {
    Rule::Inject {
        method: MethodSelector::exact("damage", "(I)V"),
        handler: HandlerRef::new(HOOKS, handler),
        at: InsertionPoint::head(),
        cancellable: false,
        remap: false,
        contract: MatchContract::require(1),
    }
}

/// Decoded body of `name descriptor`
pub fn body_of(bytes: &[u8], name: &str, descriptor: &str) -> MethodBody {
    let class = ClassFile::parse(bytes).unwrap();
    let slot = class.find_method(name, descriptor).unwrap();
    MethodBody::decode(&class.code(slot).unwrap().unwrap(), class.constant_pool()).unwrap()
}

/// Opcodes of `name descriptor` in order
pub fn opcodes_of(bytes: &[u8], name: &str, descriptor: &str) -> Vec<u8> {
    body_of(bytes, name, descriptor)
        .insns
        .iter()
        .filter_map(|node| node.insn().map(|insn| insn.opcode))
        .collect()
}

/// `owner.name` of every static call in `name descriptor`, in order
pub fn static_calls(bytes: &[u8], name: &str, descriptor: &str) -> Vec<String> {
    let class = ClassFile::parse(bytes).unwrap();
    let pool = class.constant_pool();
    body_of(bytes, name, descriptor)
        .insns
        .iter()
        .filter_map(|node| node.insn())
        .filter(|insn| insn.opcode == opcodes::INVOKESTATIC)
        .map(|insn| {
            let member = pool.member_ref(insn.pool_index().unwrap()).unwrap();
            format!("{}.{}", member.owner, member.name)
        })
        .collect()
}

/// Raw bytes of every field and method keyed by `name descriptor`
pub fn member_bytes(bytes: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let class = ClassFile::parse(bytes).unwrap();
    let mut members = BTreeMap::new();
    for (prefix, list) in [("field", class.fields()), ("method", class.methods())] {
        for member in list {
            let key = format!(
                "{prefix} {}{}",
                class.member_name(member).unwrap(),
                class.member_descriptor(member).unwrap()
            );
            members.insert(key, bytes[member.span.clone()].to_vec());
        }
    }
    members
}
