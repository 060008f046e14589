use crate::{
    bytecode::{opcodes, Instruction, Item, NodeId, Operand},
    classfile::{
        code::{BodyAttribute, LocalVariable},
        stackmap::FrameKind,
        ClassFileBuilder, CodeRef, ConstantPoolBuilder, FieldAccessFlags, MethodAccessFlags,
        MethodBody,
    },
    Result,
};

pub const PLAYER: &str = "com/example/Player";
pub const HOOKS: &str = "com/example/Hooks";

/// A body made of `insns` in order
pub fn body_of(max_stack: u16, max_locals: u16, insns: Vec<Instruction>) -> MethodBody {
    let mut body = MethodBody::new(max_locals);
    body.max_stack = max_stack;
    for insn in insns {
        body.insns.push(insn);
    }
    body
}

fn invoke(
    pool: &mut ConstantPoolBuilder<'_>,
    opcode: u8,
    owner: &str,
    name: &str,
    desc: &str,
) -> Result<Instruction> {
    Ok(Instruction::member(
        opcode,
        pool.add_method_ref(owner, name, desc, false)?,
    ))
}

fn health(pool: &mut ConstantPoolBuilder<'_>, opcode: u8) -> Result<Instruction> {
    Ok(Instruction::member(
        opcode,
        pool.add_field_ref(PLAYER, "health", "I")?,
    ))
}

/// `com/example/Player`, version 52:
///
/// ```text
/// <init>()V        super(); health = 20
/// tick()V          damage(1); Log.info("tick")            (LineNumberTable)
/// damage(I)V       health -= amount
/// damage(F)V       damage((int) amount)
/// heal(I)V         health += amount                       (LocalVariableTable)
/// isAlive()Z       health > 0 ? true : false              (StackMapTable)
/// getHealth()I     return health
/// scale(I)I        private, return value * 2
/// run()V           tick()
/// ```
pub fn sample_class() -> Vec<u8> {
    player_builder().build().unwrap()
}

pub fn player_builder() -> ClassFileBuilder {
    let public = MethodAccessFlags::PUBLIC;
    ClassFileBuilder::new(PLAYER)
        .interface("java/lang/Runnable")
        .field(FieldAccessFlags::PRIVATE, "health", "I")
        .method(public, "<init>", "()V", |pool| {
            Ok(body_of(
                2,
                1,
                vec![
                    Instruction::simple(opcodes::ALOAD_0),
                    invoke(pool, opcodes::INVOKESPECIAL, "java/lang/Object", "<init>", "()V")?,
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
            let message = pool.add_string("tick")?;
            let mut body = body_of(
                2,
                1,
                vec![
                    Instruction::simple(opcodes::ALOAD_0),
                    Instruction::simple(opcodes::ICONST_1),
                    invoke(pool, opcodes::INVOKEVIRTUAL, PLAYER, "damage", "(I)V")?,
                    Instruction {
                        opcode: opcodes::LDC,
                        operand: Operand::Constant(message),
                    },
                    invoke(
                        pool,
                        opcodes::INVOKESTATIC,
                        "com/example/Log",
                        "info",
                        "(Ljava/lang/String;)V",
                    )?,
                    Instruction::simple(opcodes::RETURN),
                ],
            );
            let ids: Vec<NodeId> = body.insns.iter().map(|node| node.id).collect();
            body.attributes.push(BodyAttribute::LineNumbers {
                name_index: pool.add_utf8("LineNumberTable")?,
                entries: vec![(ids[0], 10), (ids[3], 11)],
            });
            Ok(body)
        })
        .method(public, "damage", "(I)V", |pool| {
            Ok(body_of(
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
        .method(public, "damage", "(F)V", |pool| {
            Ok(body_of(
                2,
                2,
                vec![
                    Instruction::simple(opcodes::ALOAD_0),
                    Instruction::simple(opcodes::FLOAD_1),
                    Instruction::simple(opcodes::F2I),
                    invoke(pool, opcodes::INVOKEVIRTUAL, PLAYER, "damage", "(I)V")?,
                    Instruction::simple(opcodes::RETURN),
                ],
            ))
        })
        .method(public, "heal", "(I)V", |pool| {
            let mut body = body_of(
                3,
                2,
                vec![
                    Instruction::simple(opcodes::ALOAD_0),
                    Instruction::simple(opcodes::DUP),
                    health(pool, opcodes::GETFIELD)?,
                    Instruction::simple(opcodes::ILOAD_1),
                    Instruction::simple(opcodes::IADD),
                    health(pool, opcodes::PUTFIELD)?,
                    Instruction::simple(opcodes::RETURN),
                ],
            );
            let first = body.insns.iter().map(|node| node.id).next().unwrap();
            let this = LocalVariable {
                start: first,
                end: CodeRef::End,
                name_index: pool.add_utf8("this")?,
                descriptor_index: pool.add_utf8("Lcom/example/Player;")?,
                index: 0,
            };
            let amount = LocalVariable {
                start: first,
                end: CodeRef::End,
                name_index: pool.add_utf8("amount")?,
                descriptor_index: pool.add_utf8("I")?,
                index: 1,
            };
            body.attributes.push(BodyAttribute::LocalVariables {
                name_index: pool.add_utf8("LocalVariableTable")?,
                typed: false,
                entries: vec![this, amount],
            });
            Ok(body)
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
            Ok(body_of(
                1,
                1,
                vec![
                    Instruction::simple(opcodes::ALOAD_0),
                    health(pool, opcodes::GETFIELD)?,
                    Instruction::simple(opcodes::IRETURN),
                ],
            ))
        })
        .method(MethodAccessFlags::PRIVATE, "scale", "(I)I", |_| {
            Ok(body_of(
                2,
                2,
                vec![
                    Instruction::simple(opcodes::ILOAD_1),
                    Instruction::simple(opcodes::ICONST_2),
                    Instruction::simple(opcodes::IMUL),
                    Instruction::simple(opcodes::IRETURN),
                ],
            ))
        })
        .method(public, "run", "()V", |pool| {
            Ok(body_of(
                1,
                1,
                vec![
                    Instruction::simple(opcodes::ALOAD_0),
                    invoke(pool, opcodes::INVOKEVIRTUAL, PLAYER, "tick", "()V")?,
                    Instruction::simple(opcodes::RETURN),
                ],
            ))
        })
        .source_file("Player.java")
}
