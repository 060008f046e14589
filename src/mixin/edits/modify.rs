use std::collections::{BTreeMap, HashMap};

use crate::{
    bytecode::{NodeId, SnippetBuilder},
    classfile::{FieldType, MethodDescriptor},
    mixin::{
        editor::ClassEditor,
        resolve::{
            constant_type, constant_value, resolve_points, resolve_variable, select_ordinal,
            RuleContext,
        },
        ConstantMatcher, HandlerRef, InsertionPoint, MatchContract, MethodSelector,
        VariableSelector,
    },
    Result,
};

use super::{check_matches, handler_index, insert, open};

/// The local variable a `ModifyVariable` rule rewrites
pub(super) struct VariableTarget<'r> {
    pub selector: &'r VariableSelector,
    pub explicit: Option<&'r FieldType>,
    pub ordinal: i32,
}

/// Pass every matched constant load through `handler`, a `(T)T` method over the constant's
/// stack type. A load matched by several matchers is modified once.
pub(super) fn constant(
    ctx: &RuleContext<'_>,
    editor: &mut ClassEditor<'_, '_>,
    selector: &MethodSelector,
    handler: &HandlerRef,
    matchers: &[ConstantMatcher],
    contract: &MatchContract,
) -> Result<()> {
    let (method, mut body) = open(ctx, editor, selector)?;

    let mut loads = Vec::new();
    for node in body.insns.originals() {
        if let Some(insn) = node.insn() {
            if let Some(value) = constant_value(&editor.pool, insn)? {
                loads.push((node.id, value));
            }
        }
    }

    // code position -> stack type of the loaded value
    let positions: HashMap<NodeId, usize> = loads
        .iter()
        .enumerate()
        .map(|(position, (id, _))| (*id, position))
        .collect();
    let mut selected: BTreeMap<usize, FieldType> = BTreeMap::new();
    for matcher in matchers {
        let candidates: Vec<NodeId> = loads
            .iter()
            .filter(|(_, value)| matcher.value.as_ref().is_none_or(|wanted| wanted == value))
            .map(|(id, _)| *id)
            .collect();
        let ordinal = matcher
            .ordinal
            .map_or(-1, |ordinal| i32::try_from(ordinal).unwrap_or(i32::MAX));
        for id in select_ordinal(candidates, ordinal) {
            if let Some(&position) = positions.get(&id) {
                selected
                    .entry(position)
                    .or_insert_with(|| constant_type(&loads[position].1));
            }
        }
    }

    check_matches(ctx, contract, selected.len())?;
    if selected.is_empty() {
        return Ok(());
    }

    let mut indices: HashMap<String, u16> = HashMap::new();
    let mut peak = 0;
    for (position, ty) in selected {
        let descriptor = MethodDescriptor::new(vec![ty.clone()], Some(ty));
        let key = descriptor.to_string();
        let index = match indices.get(&key) {
            Some(index) => *index,
            None => {
                let index = handler_index(editor, handler, &descriptor)?;
                indices.insert(key, index);
                index
            }
        };

        let mut snippet = SnippetBuilder::new(&mut body.insns);
        snippet.invoke_static(index, &descriptor)?;
        let snippet = snippet.finish();
        peak = peak.max(snippet.peak);
        body.insns.insert_after(loads[position].0, snippet.items)?;
    }

    body.max_stack = body.max_stack.saturating_add(peak);
    editor.store_body(method.slot, body);
    Ok(())
}

/// At every point `at` resolves to, replace a local variable with the result of `handler`,
/// a `(T)T` method over the variable's type.
pub(super) fn variable(
    ctx: &RuleContext<'_>,
    editor: &mut ClassEditor<'_, '_>,
    selector: &MethodSelector,
    handler: &HandlerRef,
    at: &InsertionPoint,
    target: &VariableTarget<'_>,
    contract: &MatchContract,
) -> Result<()> {
    let (method, mut body) = open(ctx, editor, selector)?;
    let points = resolve_points(ctx, editor.class(), &editor.pool, &body, &method, at)?;
    check_matches(ctx, contract, points.len())?;
    if points.is_empty() {
        return Ok(());
    }

    let mut peak = 0;
    for point in points {
        let (slot, ty) = resolve_variable(
            &editor.pool,
            &body,
            target.selector,
            target.explicit,
            target.ordinal,
            point.node,
        )?;
        let descriptor = MethodDescriptor::new(vec![ty.clone()], Some(ty.clone()));
        let index = handler_index(editor, handler, &descriptor)?;

        let mut snippet = SnippetBuilder::new(&mut body.insns);
        snippet.load(&ty, slot)?;
        snippet.invoke_static(index, &descriptor)?;
        snippet.store(&ty, slot)?;
        let snippet = snippet.finish();
        peak = peak.max(snippet.peak);
        insert(&mut body, point, snippet)?;
    }

    body.max_stack = body.max_stack.saturating_add(peak);
    editor.store_body(method.slot, body);
    Ok(())
}
