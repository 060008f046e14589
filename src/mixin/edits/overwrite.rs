use crate::{
    classfile::FieldType,
    mixin::{editor::ClassEditor, resolve::RuleContext, HandlerRef, MethodSelector},
    Error, Result,
};

use super::{build_body, handler_index, open};

/// Replace the body of the method with a call forwarding every argument to `handler`.
///
/// Exception handlers, local variable tables, line numbers and stack maps of the old body are
/// dropped; unknown nested attributes are kept.
pub(super) fn apply(
    ctx: &RuleContext<'_>,
    editor: &mut ClassEditor<'_, '_>,
    selector: &MethodSelector,
    handler: &HandlerRef,
) -> Result<()> {
    let (method, mut body) = open(ctx, editor, selector)?;
    if method.is_constructor() {
        return Err(Error::Configuration(format!(
            "Cannot overwrite constructor {}{} of {}",
            method.name, method.raw_descriptor, ctx.unit
        )));
    }

    let owner = editor.class().this_name()?;
    let descriptor = method.handler_descriptor(owner, method.descriptor.ret.clone());
    let index = handler_index(editor, handler, &descriptor)?;

    let replacement = build_body(editor, body.max_locals, |snippet| {
        if !method.is_static() {
            snippet.load(&FieldType::object(owner), 0)?;
        }
        snippet.load_params(&method.descriptor, method.first_param_slot())?;
        snippet.invoke_static(index, &descriptor)?;
        snippet.return_value(method.descriptor.ret.as_ref())?;
        Ok(())
    })?;

    body.clear_tables();
    body.insns = replacement.insns;
    body.max_stack = replacement.max_stack;
    editor.store_body(method.slot, body);
    Ok(())
}
