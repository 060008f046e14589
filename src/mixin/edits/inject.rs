use crate::{
    bytecode::{opcodes, SnippetBuilder},
    classfile::{code::names, stackmap::FrameKind, FieldType},
    mixin::{
        editor::ClassEditor,
        resolve::{resolve_points, RuleContext},
        HandlerRef, InsertionPoint, LocationKind, MatchContract, MethodSelector,
    },
    Error, Result,
};

use super::{check_matches, handler_index, insert, open};

/// Call `handler` at every point `at` resolves to.
///
/// The handler receives the receiver (instance methods) and every parameter. A cancellable
/// handler returns `boolean`; `true` makes the method return its default value right away.
/// Methods that need stack map frames only support cancelling at `HEAD`, where the frame at
/// the resume label is known to be the method's initial one.
pub(super) fn apply(
    ctx: &RuleContext<'_>,
    editor: &mut ClassEditor<'_, '_>,
    selector: &MethodSelector,
    handler: &HandlerRef,
    at: &InsertionPoint,
    cancellable: bool,
    contract: &MatchContract,
) -> Result<()> {
    let (method, mut body) = open(ctx, editor, selector)?;
    let class = editor.class();
    let points = resolve_points(ctx, class, &editor.pool, &body, &method, at)?;
    check_matches(ctx, contract, points.len())?;
    if points.is_empty() {
        return Ok(());
    }

    let frames = class.requires_frames() || body.has_stack_map();
    if cancellable {
        if method.is_constructor() {
            return Err(Error::Configuration(format!(
                "Cannot cancel constructor of {}",
                ctx.unit
            )));
        }
        if frames && (at.kind != LocationKind::Head || at.shift != 0) {
            return Err(Error::Configuration(format!(
                "Cancellable injection at {} in {} needs a stack map frame; only HEAD is supported",
                at.kind, method.name
            )));
        }
    }

    let owner = class.this_name()?;
    let descriptor = method.handler_descriptor(owner, cancellable.then_some(FieldType::Boolean));
    let index = handler_index(editor, handler, &descriptor)?;
    let frame_name = if cancellable && frames {
        Some(editor.pool.add_utf8(names::STACK_MAP_TABLE)?)
    } else {
        None
    };

    let mut peak = 0;
    for point in points {
        let mut snippet = SnippetBuilder::new(&mut body.insns);
        if !method.is_static() {
            snippet.load(&FieldType::object(owner), 0)?;
        }
        snippet.load_params(&method.descriptor, method.first_param_slot())?;
        snippet.invoke_static(index, &descriptor)?;

        let mut resume = None;
        if cancellable {
            let label = snippet.label();
            snippet.branch(opcodes::IFEQ, label, 1)?;
            if let Some(ret) = &method.descriptor.ret {
                snippet.push_default(ret)?;
            }
            snippet.return_value(method.descriptor.ret.as_ref())?;
            snippet.place(label)?;
            resume = Some(label);
        }

        let snippet = snippet.finish();
        peak = peak.max(snippet.peak);
        insert(&mut body, point, snippet)?;
        if let (Some(label), Some(name)) = (resume, frame_name) {
            body.add_frame(label, FrameKind::Same, name);
        }
    }

    body.max_stack = body.max_stack.saturating_add(peak);
    editor.store_body(method.slot, body);
    Ok(())
}
