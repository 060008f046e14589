//! Resolution of rule selectors against a decoded class.
//!
//! Everything here is read-only: methods are resolved to slots, insertion points and call
//! sites to node ids of the current body. Only original nodes are candidates, so code
//! inserted by earlier rules never shifts the matches of later ones.

use std::collections::HashMap;

use crate::{
    bytecode::{opcodes, FlowType, Instruction, NodeId, Operand, Side},
    classfile::{
        code::LocalVariable, ClassFile, CodeRef, ConstantValue, FieldType, MethodAccessFlags,
        MethodBody, MethodDescriptor, PoolAccess,
    },
    mixin::{
        parse_literal, CallSiteMatch, Diagnostic, DiagnosticKind, Diagnostics, EngineConfig,
        InsertionPoint, LocationKind, MethodSelector, RelativeTo, VariableSelector,
    },
    utils::internal_name,
    Error, Result,
};

/// Name of instance initialisers
pub const CONSTRUCTOR: &str = "<init>";

/// Everything a rule needs to know about where it runs.
pub struct RuleContext<'r> {
    /// Internal name of the unit
    pub unit: &'r str,
    /// Name of the bundle the rule belongs to
    pub bundle: &'r str,
    /// Index of the rule in its bundle
    pub rule: usize,
    /// Translate names through the configured mappings
    pub remap: bool,
    /// Engine configuration
    pub config: &'r EngineConfig,
    /// Sink for ambiguity warnings
    pub diagnostics: &'r Diagnostics,
}

impl RuleContext<'_> {
    /// Runtime name of method `owner.name`
    #[must_use]
    pub fn method_name<'n>(
        &'n self,
        owner: &str,
        name: &'n str,
        descriptor: Option<&str>,
    ) -> &'n str {
        match (&self.config.mappings, self.remap) {
            (Some(mappings), true) => mappings.method(owner, name, descriptor),
            _ => name,
        }
    }

    /// Runtime name of field `owner.name`
    #[must_use]
    pub fn field_name<'n>(
        &'n self,
        owner: &str,
        name: &'n str,
        descriptor: Option<&str>,
    ) -> &'n str {
        match (&self.config.mappings, self.remap) {
            (Some(mappings), true) => mappings.field(owner, name, descriptor),
            _ => name,
        }
    }

    fn ambiguity(&self, message: String) {
        self.diagnostics.push(
            Diagnostic::new(DiagnosticKind::Ambiguity, self.unit, message)
                .with_bundle(self.bundle)
                .with_rule(self.rule),
        );
    }
}

/// A resolved method of the unit being edited.
#[derive(Debug, Clone)]
pub struct TargetMethod {
    /// Method slot
    pub slot: usize,
    /// Runtime name
    pub name: String,
    /// Raw descriptor
    pub raw_descriptor: String,
    /// Parsed descriptor
    pub descriptor: MethodDescriptor,
    /// Access flags
    pub access: MethodAccessFlags,
}

impl TargetMethod {
    /// Returns `true` for static methods
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access.contains(MethodAccessFlags::STATIC)
    }

    /// Returns `true` for instance initialisers
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR
    }

    /// Local slot of the first declared parameter
    #[must_use]
    pub fn first_param_slot(&self) -> u16 {
        u16::from(!self.is_static())
    }

    /// The descriptor a static handler receiving the receiver (if any) and all parameters
    /// has, returning `ret`
    #[must_use]
    pub fn handler_descriptor(&self, owner: &str, ret: Option<FieldType>) -> MethodDescriptor {
        let mut descriptor = if self.is_static() {
            self.descriptor.clone()
        } else {
            self.descriptor.with_receiver(owner)
        };
        descriptor.ret = ret;
        descriptor
    }
}

/// Resolve `selector` against the methods of `class`.
///
/// A name-only selector matching several overloads picks the first declared one and records
/// an ambiguity diagnostic, or fails under `strict_ambiguity`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] when no method matches or the match is ambiguous in
/// strict mode.
pub fn resolve_method(
    ctx: &RuleContext<'_>,
    class: &ClassFile<'_>,
    selector: &MethodSelector,
) -> Result<TargetMethod> {
    let name = ctx.method_name(ctx.unit, &selector.name, selector.descriptor.as_deref());

    let slot = match &selector.descriptor {
        Some(descriptor) => class.find_method(name, descriptor).ok_or_else(|| {
            Error::Configuration(format!("No method {name}{descriptor} in {}", ctx.unit))
        })?,
        None => {
            let slots = class.methods_named(name);
            let Some(&first) = slots.first() else {
                return Err(Error::Configuration(format!(
                    "No method named '{name}' in {}",
                    ctx.unit
                )));
            };
            if slots.len() > 1 {
                let message = format!(
                    "'{name}' matches {} overloads, using the first declared {}",
                    slots.len(),
                    class.member_descriptor(&class.methods()[first])?
                );
                if ctx.config.strict_ambiguity {
                    return Err(Error::Configuration(message));
                }
                ctx.ambiguity(message);
            }
            first
        }
    };

    let method = &class.methods()[slot];
    let raw_descriptor = class.member_descriptor(method)?.to_string();
    Ok(TargetMethod {
        slot,
        name: name.to_string(),
        descriptor: MethodDescriptor::parse(&raw_descriptor)?,
        raw_descriptor,
        access: method.method_access(),
    })
}

/// A call instruction's callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite<'p> {
    /// Owner of the callee, `None` for `invokedynamic`
    pub owner: Option<&'p str>,
    /// Callee name
    pub name: &'p str,
    /// Callee descriptor
    pub descriptor: &'p str,
}

/// The callee of `insn`, `None` if it is not a call.
///
/// # Errors
///
/// Returns [`Error::Malformed`] if the referenced pool entry is invalid.
pub fn call_site<'p>(
    pool: &'p impl PoolAccess,
    insn: &Instruction,
) -> Result<Option<CallSite<'p>>> {
    if !insn.is_invoke() {
        return Ok(None);
    }
    let Some(index) = insn.pool_index() else {
        return Ok(None);
    };
    if insn.opcode == opcodes::INVOKEDYNAMIC {
        let (name, descriptor) = pool.dynamic_call_site(index)?;
        return Ok(Some(CallSite {
            owner: None,
            name,
            descriptor,
        }));
    }
    let member = pool.member_ref(index)?;
    Ok(Some(CallSite {
        owner: Some(member.owner),
        name: member.name,
        descriptor: member.descriptor,
    }))
}

fn call_matches(ctx: &RuleContext<'_>, pattern: &CallSiteMatch, site: &CallSite<'_>) -> bool {
    let owner = site.owner.unwrap_or_default();
    if !ctx.remap {
        return pattern.matches(owner, site.name, site.descriptor);
    }
    let mapped = ctx.method_name(owner, &pattern.name, pattern.descriptor.as_deref());
    mapped == site.name && pattern.matches(owner, &pattern.name, site.descriptor)
}

/// Original call instructions of `body` matching `pattern`, after ordinal selection.
///
/// # Errors
///
/// Returns [`Error::Malformed`] for invalid pool references.
pub fn find_calls(
    ctx: &RuleContext<'_>,
    pool: &impl PoolAccess,
    body: &MethodBody,
    pattern: &CallSiteMatch,
) -> Result<Vec<NodeId>> {
    let mut matches = Vec::new();
    for node in body.insns.originals() {
        let Some(insn) = node.insn() else { continue };
        if let Some(site) = call_site(pool, insn)? {
            if call_matches(ctx, pattern, &site) {
                matches.push(node.id);
            }
        }
    }
    Ok(select_ordinal(matches, pattern.ordinal))
}

/// The value a constant-pushing instruction loads, `None` for every other instruction and
/// for non-literal `ldc` entries.
///
/// # Errors
///
/// Returns [`Error::Malformed`] if an `ldc` references an invalid entry.
pub fn constant_value(pool: &impl PoolAccess, insn: &Instruction) -> Result<Option<ConstantValue>> {
    Ok(Some(match (insn.opcode, &insn.operand) {
        (opcodes::ACONST_NULL, _) => ConstantValue::Null,
        (op @ opcodes::ICONST_M1..=opcodes::ICONST_5, _) => {
            ConstantValue::Int(i32::from(op) - i32::from(opcodes::ICONST_0))
        }
        (op @ (opcodes::LCONST_0 | opcodes::LCONST_1), _) => {
            ConstantValue::Long(i64::from(op - opcodes::LCONST_0))
        }
        (op @ opcodes::FCONST_0..=opcodes::FCONST_2, _) => {
            ConstantValue::Float(f32::from(op - opcodes::FCONST_0))
        }
        (op @ (opcodes::DCONST_0 | opcodes::DCONST_1), _) => {
            ConstantValue::Double(f64::from(op - opcodes::DCONST_0))
        }
        (opcodes::BIPUSH, Operand::Byte(value)) => ConstantValue::Int(i32::from(*value)),
        (opcodes::SIPUSH, Operand::Short(value)) => ConstantValue::Int(i32::from(*value)),
        (_, Operand::Constant(index)) if insn.is_ldc() => return pool.loadable(*index),
        _ => return Ok(None),
    }))
}

/// The type a constant of `value` has on the operand stack
#[must_use]
pub fn constant_type(value: &ConstantValue) -> FieldType {
    match value {
        ConstantValue::Int(_) => FieldType::Int,
        ConstantValue::Float(_) => FieldType::Float,
        ConstantValue::Long(_) => FieldType::Long,
        ConstantValue::Double(_) => FieldType::Double,
        ConstantValue::String(_) => FieldType::object("java/lang/String"),
        ConstantValue::Null => FieldType::object(crate::classfile::descriptor::OBJECT),
    }
}

/// A resolved insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    /// Original node the edit is anchored on
    pub node: NodeId,
    /// Side of the node the edit lands on
    pub side: Side,
    /// The edit runs once on method entry instead of in front of `node`
    pub entry: bool,
}

/// Resolve `point` inside `body` of `method`.
///
/// Candidates are collected in code order, narrowed by ordinal, moved by `shift` (matches
/// shifted out of the method are dropped) and given their side. `HEAD` in a constructor
/// resolves to just after the `super(...)`/`this(...)` call.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for unparsable targets, a constructor without a
/// `super(...)` call, and edits placed after an instruction that never falls through.
pub fn resolve_points(
    ctx: &RuleContext<'_>,
    class: &ClassFile<'_>,
    pool: &impl PoolAccess,
    body: &MethodBody,
    method: &TargetMethod,
    point: &InsertionPoint,
) -> Result<Vec<Point>> {
    let entry = point.kind == LocationKind::Head && !method.is_constructor() && point.shift == 0;
    let mut side = match point.side() {
        RelativeTo::Before => Side::Before,
        RelativeTo::After => Side::After,
    };

    let candidates = match point.kind {
        LocationKind::Head if method.is_constructor() => {
            side = Side::After;
            vec![initializer_call(class, pool, body)?]
        }
        LocationKind::Head => body.insns.originals().map(|node| node.id).take(1).collect(),
        LocationKind::Return => filter_originals(body, |insn| Ok(insn.is_return()))?,
        LocationKind::Tail => {
            let mut returns = filter_originals(body, |insn| Ok(insn.is_return()))?;
            returns.drain(..returns.len().saturating_sub(1));
            returns
        }
        LocationKind::Invoke | LocationKind::InvokeAssign => {
            let pattern = point
                .target
                .as_deref()
                .map(str::parse::<CallSiteMatch>)
                .transpose()?;
            let assign = point.kind == LocationKind::InvokeAssign;
            filter_originals(body, |insn| {
                let Some(site) = call_site(pool, insn)? else {
                    return Ok(false);
                };
                if assign && site.descriptor.ends_with(")V") {
                    return Ok(false);
                }
                Ok(pattern
                    .as_ref()
                    .is_none_or(|pattern| call_matches(ctx, pattern, &site)))
            })?
        }
        LocationKind::Field => {
            let pattern = point.target.as_deref().map(FieldPattern::parse);
            filter_originals(body, |insn| {
                if !insn.is_field_access() {
                    return Ok(false);
                }
                let Some(pattern) = &pattern else {
                    return Ok(true);
                };
                let Some(index) = insn.pool_index() else {
                    return Ok(false);
                };
                let member = pool.member_ref(index)?;
                Ok(pattern.matches(ctx, member.owner, member.name, member.descriptor))
            })?
        }
        LocationKind::New => {
            let wanted = point.target.as_deref().map(internal_name);
            filter_originals(body, |insn| {
                if insn.opcode != opcodes::NEW {
                    return Ok(false);
                }
                let Some(wanted) = &wanted else {
                    return Ok(true);
                };
                let Some(index) = insn.pool_index() else {
                    return Ok(false);
                };
                Ok(pool.class_name(index)? == wanted)
            })?
        }
        LocationKind::Constant => {
            let wanted = point.target.as_deref().map(parse_literal).transpose()?;
            filter_originals(body, |insn| {
                Ok(match constant_value(pool, insn)? {
                    Some(value) => wanted.as_ref().is_none_or(|wanted| *wanted == value),
                    None => false,
                })
            })?
        }
        LocationKind::Load | LocationKind::Store => {
            let wanted = point.target.as_deref().map(parse_slot).transpose()?;
            let load = point.kind == LocationKind::Load;
            filter_originals(body, |insn| {
                let kind = if load {
                    insn.is_local_load()
                } else {
                    insn.is_local_store()
                };
                Ok(kind && wanted.is_none_or(|slot| insn.local_index() == Some(slot)))
            })?
        }
        LocationKind::Jump => {
            let wanted = point.target.as_deref().map(str::trim);
            filter_originals(body, |insn| {
                let branch = matches!(
                    insn.flow(),
                    FlowType::ConditionalBranch | FlowType::UnconditionalBranch
                );
                Ok(branch && wanted.is_none_or(|m| insn.mnemonic().eq_ignore_ascii_case(m)))
            })?
        }
    };

    let mut points = Vec::new();
    for node in select_ordinal(candidates, point.ordinal) {
        let Some(node) = body.insns.shift_original(node, point.shift) else {
            continue;
        };
        if side == Side::After {
            let falls_through = body.insns.insn(node).is_some_and(|insn| {
                matches!(
                    insn.flow(),
                    FlowType::Sequential | FlowType::ConditionalBranch | FlowType::Call
                )
            });
            if !falls_through {
                return Err(Error::Configuration(format!(
                    "Cannot insert after {} in {}: it never falls through",
                    body.insns.insn(node).map_or("a label", Instruction::mnemonic),
                    method.name
                )));
            }
        }
        points.push(Point {
            node,
            side,
            entry: entry && side == Side::Before,
        });
    }
    Ok(points)
}

/// Resolve the slot and type of a local variable at `at`.
///
/// Names are looked up in the `LocalVariableTable`. With `ordinal >= 0` the n-th row of that
/// name is used; otherwise the row live at `at`. Indices take their type from `explicit` or
/// from a table row for that slot.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the variable or its type cannot be determined.
pub fn resolve_variable(
    pool: &impl PoolAccess,
    body: &MethodBody,
    selector: &VariableSelector,
    explicit: Option<&FieldType>,
    ordinal: i32,
    at: NodeId,
) -> Result<(u16, FieldType)> {
    let positions: HashMap<NodeId, usize> = body
        .insns
        .iter()
        .enumerate()
        .map(|(position, node)| (node.id, position))
        .collect();
    let at = positions.get(&at).copied().unwrap_or_default();
    let live = |row: &LocalVariable| {
        let start = positions.get(&row.start).copied().unwrap_or(usize::MAX);
        let end = match row.end {
            CodeRef::Node(id) => positions.get(&id).copied().unwrap_or(0),
            CodeRef::End => body.insns.len(),
        };
        start <= at && at < end
    };

    match selector {
        VariableSelector::Name(name) => {
            let mut rows = Vec::new();
            for row in body.local_variables() {
                if pool.utf8(row.name_index)? == name {
                    rows.push(row);
                }
            }
            let row = if let Ok(ordinal) = usize::try_from(ordinal) {
                rows.get(ordinal).copied()
            } else {
                rows.iter().copied().find(|row| live(row))
            };
            let row = row.ok_or_else(|| {
                Error::Configuration(format!("No local variable '{name}' at the insertion point"))
            })?;
            Ok((row.index, FieldType::parse(pool.utf8(row.descriptor_index)?)?))
        }
        VariableSelector::Index(index) => {
            if let Some(ty) = explicit {
                return Ok((*index, ty.clone()));
            }
            let row = body
                .local_variables()
                .filter(|row| row.index == *index)
                .find(|row| live(row))
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "No type known for local {index}; declare one explicitly"
                    ))
                })?;
            Ok((*index, FieldType::parse(pool.utf8(row.descriptor_index)?)?))
        }
    }
}

/// Keep only the n-th entry when `ordinal` is not negative
pub(crate) fn select_ordinal<T>(mut candidates: Vec<T>, ordinal: i32) -> Vec<T> {
    match usize::try_from(ordinal) {
        Ok(ordinal) if ordinal < candidates.len() => vec![candidates.swap_remove(ordinal)],
        Ok(_) => Vec::new(),
        Err(_) => candidates,
    }
}

fn filter_originals<F>(body: &MethodBody, mut keep: F) -> Result<Vec<NodeId>>
where
    F: FnMut(&Instruction) -> Result<bool>,
{
    let mut kept = Vec::new();
    for node in body.insns.originals() {
        if let Some(insn) = node.insn() {
            if keep(insn)? {
                kept.push(node.id);
            }
        }
    }
    Ok(kept)
}

/// The `invokespecial <init>` that initialises `this` in a constructor
fn initializer_call(
    class: &ClassFile<'_>,
    pool: &impl PoolAccess,
    body: &MethodBody,
) -> Result<NodeId> {
    let this = class.this_name()?;
    let parent = class.super_name()?;
    for node in body.insns.originals() {
        let Some(insn) = node.insn() else { continue };
        if insn.opcode != opcodes::INVOKESPECIAL {
            continue;
        }
        let Some(index) = insn.pool_index() else { continue };
        let member = pool.member_ref(index)?;
        if member.name == CONSTRUCTOR && (member.owner == this || Some(member.owner) == parent) {
            return Ok(node.id);
        }
    }
    Err(Error::Configuration(format!(
        "Constructor of {this} has no super(...) or this(...) call"
    )))
}

fn parse_slot(text: &str) -> Result<u16> {
    text.trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("Invalid local variable slot '{text}'")))
}

/// `owner.name:desc`, `owner.name` or `name`
struct FieldPattern {
    owner: Option<String>,
    name: String,
    descriptor: Option<String>,
}

impl FieldPattern {
    fn parse(text: &str) -> FieldPattern {
        let text = text.trim();
        let (head, descriptor) = match text.split_once(':') {
            Some((head, descriptor)) => (head, Some(descriptor.to_string())),
            None => (text, None),
        };
        let head = head
            .strip_prefix('L')
            .and_then(|rest| rest.split_once(';'))
            .map_or_else(|| head.to_string(), |(owner, name)| format!("{owner}.{name}"));
        let (owner, name) = match head.rfind('.') {
            Some(dot) => (Some(internal_name(&head[..dot])), head[dot + 1..].to_string()),
            None => (None, head),
        };
        FieldPattern {
            owner,
            name,
            descriptor,
        }
    }

    fn matches(&self, ctx: &RuleContext<'_>, owner: &str, name: &str, descriptor: &str) -> bool {
        ctx.field_name(owner, &self.name, Some(descriptor)) == name
            && self.owner.as_deref().is_none_or(|wanted| wanted == owner)
            && self.descriptor.as_deref().is_none_or(|wanted| wanted == descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mixin::Mappings,
        test::{sample_class, PLAYER},
    };
    use std::sync::Arc;

    fn context<'r>(config: &'r EngineConfig, diagnostics: &'r Diagnostics) -> RuleContext<'r> {
        RuleContext {
            unit: PLAYER,
            bundle: "Test",
            rule: 0,
            remap: false,
            config,
            diagnostics,
        }
    }

    fn points(name: &str, descriptor: &str, point: InsertionPoint) -> Result<Vec<(u8, Side)>> {
        let bytes = sample_class();
        let class = ClassFile::parse(&bytes)?;
        let config = EngineConfig::default();
        let diagnostics = Diagnostics::new();
        let ctx = context(&config, &diagnostics);
        let method = resolve_method(&ctx, &class, &MethodSelector::exact(name, descriptor))?;
        let code = class.code(method.slot)?.unwrap();
        let body = MethodBody::decode(&code, class.constant_pool())?;
        let resolved = resolve_points(&ctx, &class, class.constant_pool(), &body, &method, &point)?;
        Ok(resolved
            .into_iter()
            .map(|p| (body.insns.insn(p.node).unwrap().opcode, p.side))
            .collect())
    }

    #[test]
    fn test_resolve_exact_and_missing() {
        let bytes = sample_class();
        let class = ClassFile::parse(&bytes).unwrap();
        let config = EngineConfig::default();
        let diagnostics = Diagnostics::new();
        let ctx = context(&config, &diagnostics);

        let method =
            resolve_method(&ctx, &class, &MethodSelector::exact("damage", "(F)V")).unwrap();
        assert_eq!(method.raw_descriptor, "(F)V");
        assert_eq!(method.first_param_slot(), 1);
        assert!(diagnostics.is_empty());

        let err = resolve_method(&ctx, &class, &MethodSelector::named("missing")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_name_only_overloads_pick_first() {
        let bytes = sample_class();
        let class = ClassFile::parse(&bytes).unwrap();
        let config = EngineConfig::default();
        let diagnostics = Diagnostics::new();
        let ctx = context(&config, &diagnostics);

        let method = resolve_method(&ctx, &class, &MethodSelector::named("damage")).unwrap();
        assert_eq!(method.raw_descriptor, "(I)V");
        assert_eq!(diagnostics.count_of(DiagnosticKind::Ambiguity), 1);

        let strict = EngineConfig::strict();
        let ctx = context(&strict, &diagnostics);
        assert!(resolve_method(&ctx, &class, &MethodSelector::named("damage")).is_err());
    }

    #[test]
    fn test_remapped_method() {
        let bytes = sample_class();
        let class = ClassFile::parse(&bytes).unwrap();
        let mut mappings = Mappings::new();
        mappings.add_method(PLAYER, "update", None, "tick");
        let config = EngineConfig {
            mappings: Some(Arc::new(mappings)),
            ..EngineConfig::default()
        };
        let diagnostics = Diagnostics::new();
        let mut ctx = context(&config, &diagnostics);
        assert!(resolve_method(&ctx, &class, &MethodSelector::named("update")).is_err());
        ctx.remap = true;
        let method = resolve_method(&ctx, &class, &MethodSelector::named("update")).unwrap();
        assert_eq!(method.name, "tick");
    }

    #[test]
    fn test_head_and_constructor_head() {
        assert_eq!(
            points("tick", "()V", InsertionPoint::head()).unwrap(),
            [(opcodes::ALOAD_0, Side::Before)]
        );
        assert_eq!(
            points("<init>", "()V", InsertionPoint::head()).unwrap(),
            [(opcodes::INVOKESPECIAL, Side::After)]
        );
    }

    #[test]
    fn test_return_and_tail() {
        let all = points("isAlive", "()Z", InsertionPoint::new(LocationKind::Return)).unwrap();
        assert_eq!(all.len(), 2);
        let tail = points("isAlive", "()Z", InsertionPoint::new(LocationKind::Tail)).unwrap();
        assert_eq!(tail, [(opcodes::IRETURN, Side::Before)]);
    }

    #[test]
    fn test_invoke_patterns() {
        let any = points("tick", "()V", InsertionPoint::new(LocationKind::Invoke)).unwrap();
        assert_eq!(any.len(), 2);
        let log = points(
            "tick",
            "()V",
            InsertionPoint::new(LocationKind::Invoke).with_target("com.example.Log.info"),
        )
        .unwrap();
        assert_eq!(log, [(opcodes::INVOKESTATIC, Side::Before)]);
        let assign =
            points("tick", "()V", InsertionPoint::new(LocationKind::InvokeAssign)).unwrap();
        assert!(assign.is_empty());
    }

    #[test]
    fn test_ordinal_and_shift() {
        let second = points(
            "tick",
            "()V",
            InsertionPoint::new(LocationKind::Invoke).with_ordinal(1),
        )
        .unwrap();
        assert_eq!(second, [(opcodes::INVOKESTATIC, Side::Before)]);

        let out_of_range = points(
            "tick",
            "()V",
            InsertionPoint::new(LocationKind::Invoke).with_ordinal(5),
        )
        .unwrap();
        assert!(out_of_range.is_empty());

        let shifted = points(
            "tick",
            "()V",
            InsertionPoint::new(LocationKind::Invoke)
                .with_ordinal(0)
                .with_shift(-1),
        )
        .unwrap();
        assert_eq!(shifted, [(opcodes::ICONST_1, Side::Before)]);

        let dropped = points("tick", "()V", InsertionPoint::head().with_shift(-1)).unwrap();
        assert!(dropped.is_empty());
    }

    #[test]
    fn test_field_constant_and_locals() {
        let fields = points(
            "damage",
            "(I)V",
            InsertionPoint::new(LocationKind::Field).with_target("com/example/Player.health:I"),
        )
        .unwrap();
        assert_eq!(fields.len(), 2);

        let constants = points(
            "tick",
            "()V",
            InsertionPoint::new(LocationKind::Constant).with_target("string:tick"),
        )
        .unwrap();
        assert_eq!(constants, [(opcodes::LDC, Side::Before)]);

        let loads = points(
            "damage",
            "(I)V",
            InsertionPoint::new(LocationKind::Load).with_target("1"),
        )
        .unwrap();
        assert_eq!(loads, [(opcodes::ILOAD_1, Side::Before)]);

        let jumps = points(
            "isAlive",
            "()Z",
            InsertionPoint::new(LocationKind::Jump).with_target("IFLE"),
        )
        .unwrap();
        assert_eq!(jumps, [(opcodes::IFLE, Side::Before)]);
    }

    #[test]
    fn test_after_return_rejected() {
        let result = points(
            "tick",
            "()V",
            InsertionPoint::new(LocationKind::Return).relative_to(RelativeTo::After),
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_resolve_variable_by_name_and_index() {
        let bytes = sample_class();
        let class = ClassFile::parse(&bytes).unwrap();
        let slot = class.find_method("heal", "(I)V").unwrap();
        let body = MethodBody::decode(&class.code(slot).unwrap().unwrap(), class.constant_pool())
            .unwrap();
        let at = body.insns.originals().nth(3).unwrap().id;
        let pool = class.constant_pool();

        let (index, ty) = resolve_variable(
            pool,
            &body,
            &VariableSelector::Name("amount".into()),
            None,
            -1,
            at,
        )
        .unwrap();
        assert_eq!((index, ty), (1, FieldType::Int));

        let (_, ty) =
            resolve_variable(pool, &body, &VariableSelector::Index(0), None, -1, at).unwrap();
        assert_eq!(ty, FieldType::object(PLAYER));

        assert!(resolve_variable(pool, &body, &VariableSelector::Index(5), None, -1, at).is_err());
        let (_, ty) = resolve_variable(
            pool,
            &body,
            &VariableSelector::Index(5),
            Some(&FieldType::Long),
            -1,
            at,
        )
        .unwrap();
        assert_eq!(ty, FieldType::Long);
    }

    #[test]
    fn test_constant_values() {
        let pool = crate::classfile::ConstantPool::empty();
        let value = |insn: Instruction| constant_value(&pool, &insn).unwrap();
        assert_eq!(value(Instruction::simple(opcodes::ICONST_M1)), Some(ConstantValue::Int(-1)));
        assert_eq!(value(Instruction::simple(opcodes::FCONST_2)), Some(ConstantValue::Float(2.0)));
        assert_eq!(value(Instruction::simple(opcodes::ACONST_NULL)), Some(ConstantValue::Null));
        assert_eq!(
            value(Instruction {
                opcode: opcodes::SIPUSH,
                operand: Operand::Short(-300)
            }),
            Some(ConstantValue::Int(-300))
        );
        assert_eq!(value(Instruction::simple(opcodes::IADD)), None);
    }
}
