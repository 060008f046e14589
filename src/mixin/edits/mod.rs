//! Rule application.
//!
//! Each rule kind lives in its own module and follows the same shape: resolve the target
//! method and its points against the current body, build the synthetic sequences, splice
//! them in and store the body back into the [`ClassEditor`]. A failing rule leaves the
//! editor in an unspecified state; the pipeline rolls the whole bundle back.

mod inject;
mod modify;
mod overwrite;
mod redirect;
mod synth;

use crate::{
    bytecode::{InsnList, Side, Snippet, SnippetBuilder},
    classfile::{code::CodeAttribute, FieldType, MethodBody, MethodDescriptor},
    mixin::{
        editor::ClassEditor,
        resolve::{resolve_method, Point, RuleContext, TargetMethod},
        HandlerRef, MatchContract, MethodSelector, Rule,
    },
    Result,
};

/// Apply `rule` to the class held by `editor`.
///
/// # Errors
///
/// Returns [`crate::Error::Configuration`] for rules that do not fit the class and
/// propagates pool, decoding and assembly errors.
pub fn apply(ctx: &RuleContext<'_>, editor: &mut ClassEditor<'_, '_>, rule: &Rule) -> Result<()> {
    match rule {
        Rule::Inject {
            method,
            handler,
            at,
            cancellable,
            contract,
            ..
        } => inject::apply(ctx, editor, method, handler, at, *cancellable, contract),
        Rule::Redirect {
            method,
            handler,
            call,
            contract,
            ..
        } => redirect::redirect(ctx, editor, method, handler, call, contract),
        Rule::ModifyArg {
            method,
            handler,
            call,
            index,
            contract,
            ..
        } => redirect::modify_arg(ctx, editor, method, handler, call, *index, contract),
        Rule::ModifyConstant {
            method,
            handler,
            constants,
            contract,
            ..
        } => modify::constant(ctx, editor, method, handler, constants, contract),
        Rule::ModifyVariable {
            method,
            handler,
            at,
            variable,
            variable_type,
            ordinal,
            contract,
            ..
        } => modify::variable(
            ctx,
            editor,
            method,
            handler,
            at,
            &modify::VariableTarget {
                selector: variable,
                explicit: variable_type.as_ref(),
                ordinal: *ordinal,
            },
            contract,
        ),
        Rule::Overwrite {
            method, handler, ..
        } => overwrite::apply(ctx, editor, method, handler),
        Rule::Invoker {
            method,
            accessor_name,
            ..
        } => synth::invoker(ctx, editor, method, accessor_name),
        Rule::Accessor {
            field,
            descriptor,
            accessor_name,
            kind,
            ..
        } => synth::accessor(ctx, editor, field, descriptor.as_deref(), accessor_name, *kind),
    }
}

/// The target method and its current body
fn open(
    ctx: &RuleContext<'_>,
    editor: &ClassEditor<'_, '_>,
    selector: &MethodSelector,
) -> Result<(TargetMethod, MethodBody)> {
    let method = resolve_method(ctx, editor.class(), selector)?;
    let body = editor.body(method.slot)?;
    Ok((method, body))
}

/// Check `contract` against the number of matches, logging what was found
fn check_matches(ctx: &RuleContext<'_>, contract: &MatchContract, found: usize) -> Result<()> {
    log::trace!(
        "{} rule #{} in {}: {found} match(es)",
        ctx.bundle,
        ctx.rule,
        ctx.unit
    );
    contract.check(found)
}

/// Pool index of the static `handler` with `descriptor`
fn handler_index(
    editor: &mut ClassEditor<'_, '_>,
    handler: &HandlerRef,
    descriptor: &MethodDescriptor,
) -> Result<u16> {
    editor.pool.add_method_ref(
        &handler.owner,
        &handler.name,
        &descriptor.to_string(),
        handler.interface,
    )
}

/// Splice `snippet` next to `point`
fn insert(body: &mut MethodBody, point: Point, snippet: Snippet) -> Result<()> {
    if point.entry {
        body.insns.insert_at_entry(snippet.items);
        return Ok(());
    }
    match point.side {
        Side::Before => body.insns.insert_before(point.node, snippet.items),
        Side::After => body.insns.insert_after(point.node, snippet.items),
    }
}

/// Type of a member owner on the stack; array owners appear as descriptors
fn owner_type(owner: &str) -> Result<FieldType> {
    if owner.starts_with('[') {
        FieldType::parse(owner)
    } else {
        Ok(FieldType::object(owner))
    }
}

/// A fresh body of straight-line code emitted by `emit`.
///
/// The result is encoded and decoded again, so its instructions are original nodes that
/// later rules can anchor on.
fn build_body<F>(editor: &ClassEditor<'_, '_>, max_locals: u16, emit: F) -> Result<MethodBody>
where
    F: FnOnce(&mut SnippetBuilder<'_>) -> Result<()>,
{
    let mut insns = InsnList::new();
    let mut builder = SnippetBuilder::new(&mut insns);
    emit(&mut builder)?;
    let snippet = builder.finish();

    for (id, item) in snippet.items {
        insns.push_with_id(id, item);
    }
    let mut body = MethodBody::new(max_locals);
    body.insns = insns;
    body.max_stack = snippet.peak;

    let encoded = body.encode()?;
    MethodBody::decode(&CodeAttribute::parse(&encoded)?, &editor.pool)
}
