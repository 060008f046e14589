//! The `*.mixin.xml` declaration front-end.
//!
//! A declaration file holds one `<mixin>` element whose children are rules:
//!
//! ```xml
//! <mixin name="PlayerMixin" target="com.example.Player" priority="1200">
//!   <inject method="damage(I)V" handler="com.example.Hooks.onDamage" cancellable="true">
//!     <at kind="HEAD"/>
//!   </inject>
//!   <redirect method="tick" handler="com.example.Hooks.log"
//!             call="com.example.Log.info(Ljava/lang/String;)V"/>
//!   <modify-arg method="tick" handler="com.example.Hooks.amount" call="damage(I)V" index="0"/>
//!   <modify-constant method="&lt;init&gt;" handler="com.example.Hooks.startHealth">
//!     <constant value="int:20"/>
//!   </modify-constant>
//!   <modify-variable method="heal" handler="com.example.Hooks.heal" variable="amount">
//!     <at kind="HEAD"/>
//!   </modify-variable>
//!   <overwrite method="getHealth" handler="com.example.Hooks.health"/>
//!   <invoker method="scale(I)I" name="callScale"/>
//!   <accessor field="health" name="setHealth" kind="setter"/>
//! </mixin>
//! ```
//!
//! Attributes shared by the rule elements:
//!
//! | Attribute | Meaning |
//! |-----------|---------|
//! | `method` | Method selector, `name` or `name(desc)ret` |
//! | `handler` | Static handler, `owner.name` |
//! | `handler-interface` | `true` when the handler's owner is an interface |
//! | `remap` | Translate names through the engine's mappings |
//! | `require` / `expect` | Match count assertions |
//!
//! `<at>` takes `kind`, `target`, `ordinal`, `shift` and `side`; a rule may instead carry
//! an `at="KIND"` attribute. `<modify-constant>` without `<constant>` children modifies
//! every constant load.

use std::{fmt::Display, path::Path, str::FromStr, sync::Arc};

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::{
    classfile::FieldType,
    loader::{
        compiler::{CompiledUnit, SourceCompiler},
        declaration::BundleDeclaration,
        factory::{Argument, UnitInstance},
    },
    mixin::{
        parse_literal, AccessorKind, CallSiteMatch, ConstantMatcher, HandlerRef, InsertionPoint,
        LocationKind, MatchContract, MethodSelector, RelativeTo, Rule, RuleBundle,
        VariableSelector,
    },
    Error, Result,
};

/// File name suffix claimed by [`XmlMixinCompiler`]
pub const XML_SUFFIX: &str = ".mixin.xml";

/// Compiles `*.mixin.xml` declarations into units whose default constructor yields the
/// declared bundle.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlMixinCompiler;

impl SourceCompiler for XmlMixinCompiler {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn accepts(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.len() > XML_SUFFIX.len() && name.ends_with(XML_SUFFIX))
    }

    fn compile(&self, path: &Path, bytes: &[u8]) -> Result<CompiledUnit> {
        let compile_error = |message: String| Error::Compile {
            path: path.to_path_buf(),
            message,
        };

        let text = std::str::from_utf8(bytes)
            .map_err(|err| compile_error(format!("not valid UTF-8: {err}")))?;
        let bundle = parse_declaration(text).map_err(|err| compile_error(err.to_string()))?;

        let name = bundle.name.clone();
        let declaration = Arc::new(BundleDeclaration(bundle));
        Ok(CompiledUnit {
            name,
            bytes: bytes.to_vec(),
            factory: Some(Arc::new(move |_args: &[Argument]| {
                Ok(UnitInstance::Declaration(declaration.clone()))
            })),
        })
    }
}

/// Parse the text of a `*.mixin.xml` declaration.
///
/// # Errors
///
/// Returns [`Error::Xml`] for documents that are not well formed and
/// [`Error::Configuration`] for unknown elements, missing attributes and invalid values.
pub fn parse_declaration(text: &str) -> Result<RuleBundle> {
    let root = read_tree(text)?;
    if root.name != "mixin" {
        return Err(Error::Configuration(format!(
            "Expected <mixin> as the root element, found <{}>",
            root.name
        )));
    }

    let name = root.required("name")?;
    let target = root.required("target")?;
    let mut bundle = RuleBundle::new(name, target);
    if let Some(priority) = root.parse::<i32>("priority")? {
        bundle.priority = priority;
    }
    if let Some(enabled) = root.parse::<bool>("enabled")? {
        bundle.enabled = enabled;
    }

    for element in &root.children {
        bundle.rules.push(rule(element)?);
    }
    Ok(bundle)
}

/// An element with its attributes and child elements; text content is ignored
#[derive(Debug)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Element> {
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Element {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            children: Vec::new(),
        })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn required(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            Error::Configuration(format!("<{}> is missing the '{key}' attribute", self.name))
        })
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|value| {
                value.trim().parse::<T>().map_err(|err| {
                    Error::Configuration(format!(
                        "Invalid {key} '{value}' on <{}>: {err}",
                        self.name
                    ))
                })
            })
            .transpose()
    }

    fn flag(&self, key: &str) -> Result<bool> {
        Ok(self.parse::<bool>(key)?.unwrap_or(false))
    }

    fn method(&self) -> Result<MethodSelector> {
        self.required("method")?.parse()
    }

    fn handler(&self) -> Result<HandlerRef> {
        let mut handler: HandlerRef = self.required("handler")?.parse()?;
        handler.interface = self.flag("handler-interface")?;
        Ok(handler)
    }

    fn contract(&self) -> Result<MatchContract> {
        Ok(MatchContract {
            require: self.parse("require")?,
            expect: self.parse("expect")?,
        })
    }

    fn call(&self) -> Result<CallSiteMatch> {
        let call: CallSiteMatch = self.required("call")?.parse()?;
        Ok(call.with_ordinal(self.parse("ordinal")?.unwrap_or(-1)))
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    /// The insertion point from an `<at>` child or the `at` attribute
    fn at(&self) -> Result<InsertionPoint> {
        if let Some(at) = self.child("at") {
            let mut point = InsertionPoint::new(parse_kind(at.required("kind")?)?);
            point.target = at.get("target").map(str::to_string);
            point.ordinal = at.parse("ordinal")?.unwrap_or(-1);
            point.shift = at.parse("shift")?.unwrap_or(0);
            point.relative_to = at.parse::<RelativeTo>("side")?;
            return Ok(point);
        }
        match self.get("at") {
            Some(kind) => Ok(InsertionPoint::new(parse_kind(kind)?)),
            None => Err(Error::Configuration(format!(
                "<{}> needs an <at> child or an 'at' attribute",
                self.name
            ))),
        }
    }
}

fn parse_kind(kind: &str) -> Result<LocationKind> {
    kind.trim()
        .replace('-', "_")
        .parse()
        .map_err(|_| Error::Configuration(format!("Unknown insertion point kind '{kind}'")))
}

fn read_tree(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut open: Vec<Element> = Vec::new();
    let mut root = None;
    loop {
        match reader.read_event()? {
            Event::Start(start) => open.push(Element::open(&start)?),
            Event::Empty(start) => attach(&mut open, &mut root, Element::open(&start)?)?,
            Event::End(_) => {
                let element = open
                    .pop()
                    .ok_or_else(|| Error::Configuration("Unbalanced closing tag".to_string()))?;
                attach(&mut open, &mut root, element)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(Error::Configuration(format!(
            "<{}> is never closed",
            unclosed.name
        )));
    }
    root.ok_or_else(|| Error::Configuration("Declaration has no root element".to_string()))
}

fn attach(open: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = open.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(Error::Configuration(format!(
            "Unexpected second root element <{}>",
            element.name
        )));
    }
    *root = Some(element);
    Ok(())
}

fn rule(element: &Element) -> Result<Rule> {
    let remap = element.flag("remap")?;
    let rule = match element.name.as_str() {
        "inject" => Rule::Inject {
            method: element.method()?,
            handler: element.handler()?,
            at: element.at()?,
            cancellable: element.flag("cancellable")?,
            remap,
            contract: element.contract()?,
        },
        "redirect" => Rule::Redirect {
            method: element.method()?,
            handler: element.handler()?,
            call: element.call()?,
            remap,
            contract: element.contract()?,
        },
        "modify-arg" => Rule::ModifyArg {
            method: element.method()?,
            handler: element.handler()?,
            call: element.call()?,
            index: element.parse("index")?.ok_or_else(|| {
                Error::Configuration("<modify-arg> is missing the 'index' attribute".to_string())
            })?,
            remap,
            contract: element.contract()?,
        },
        "modify-constant" => {
            let mut constants = Vec::new();
            for child in element.children.iter().filter(|c| c.name == "constant") {
                constants.push(ConstantMatcher {
                    value: child.get("value").map(parse_literal).transpose()?,
                    ordinal: child.parse("ordinal")?,
                });
            }
            if let Some(value) = element.get("constant") {
                constants.push(ConstantMatcher::value(parse_literal(value)?));
            }
            if constants.is_empty() {
                constants.push(ConstantMatcher {
                    value: None,
                    ordinal: None,
                });
            }
            Rule::ModifyConstant {
                method: element.method()?,
                handler: element.handler()?,
                constants,
                remap,
                contract: element.contract()?,
            }
        }
        "modify-variable" => {
            let variable = match (element.get("variable"), element.parse::<u16>("slot")?) {
                (Some(name), None) => VariableSelector::Name(name.to_string()),
                (None, Some(slot)) => VariableSelector::Index(slot),
                _ => {
                    return Err(Error::Configuration(
                        "<modify-variable> needs exactly one of 'variable' and 'slot'"
                            .to_string(),
                    ))
                }
            };
            Rule::ModifyVariable {
                method: element.method()?,
                handler: element.handler()?,
                at: element.at()?,
                variable,
                variable_type: element.get("type").map(FieldType::parse).transpose()?,
                ordinal: element.parse("ordinal")?.unwrap_or(-1),
                remap,
                contract: element.contract()?,
            }
        }
        "overwrite" => Rule::Overwrite {
            method: element.method()?,
            handler: element.handler()?,
            remap,
        },
        "invoker" => Rule::Invoker {
            method: element.method()?,
            accessor_name: element.required("name")?.to_string(),
            remap,
        },
        "accessor" => Rule::Accessor {
            field: element.required("field")?.to_string(),
            descriptor: element.get("descriptor").map(str::to_string),
            accessor_name: element.required("name")?.to_string(),
            kind: element.parse::<AccessorKind>("kind")?.ok_or_else(|| {
                Error::Configuration("<accessor> is missing the 'kind' attribute".to_string())
            })?,
            remap,
        },
        other => {
            return Err(Error::Configuration(format!("Unknown rule element <{other}>")));
        }
    };
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::ConstantValue;

    const PLAYER_MIXIN: &str = r#"
        <mixin name="PlayerMixin" target="com.example.Player" priority="1200">
          <inject method="damage(I)V" handler="com.example.Hooks.onDamage" cancellable="true"
                  require="1">
            <at kind="HEAD"/>
          </inject>
          <redirect method="tick" handler="com.example.Hooks.log"
                    call="com.example.Log.info(Ljava/lang/String;)V" ordinal="0"/>
          <modify-constant method="&lt;init&gt;" handler="com.example.Hooks.startHealth">
            <constant value="int:20"/>
          </modify-constant>
          <modify-variable method="heal" handler="com.example.Hooks.heal" slot="1" type="I"
                           at="head"/>
          <accessor field="health" name="setHealth" kind="setter"/>
        </mixin>
    "#;

    #[test]
    fn test_parse_declaration() {
        let bundle = parse_declaration(PLAYER_MIXIN).unwrap();
        assert_eq!(bundle.name, "PlayerMixin");
        assert_eq!(bundle.target_unit, "com/example/Player");
        assert_eq!(bundle.priority, 1200);
        assert!(bundle.enabled);

        let kinds: Vec<&str> = bundle.rules.iter().map(Rule::kind).collect();
        assert_eq!(
            kinds,
            ["inject", "redirect", "modify-constant", "modify-variable", "accessor"]
        );

        let Rule::Inject {
            method,
            handler,
            at,
            cancellable,
            contract,
            ..
        } = &bundle.rules[0]
        else {
            panic!("expected an inject rule");
        };
        assert_eq!(method, &MethodSelector::exact("damage", "(I)V"));
        assert_eq!(handler, &HandlerRef::new("com.example.Hooks", "onDamage"));
        assert_eq!(at.kind, LocationKind::Head);
        assert!(cancellable);
        assert_eq!(contract.require, Some(1));

        let Rule::Redirect { call, .. } = &bundle.rules[1] else {
            panic!("expected a redirect rule");
        };
        assert_eq!(call.owner.as_deref(), Some("com/example/Log"));
        assert_eq!(call.ordinal, 0);

        let Rule::ModifyConstant {
            method, constants, ..
        } = &bundle.rules[2]
        else {
            panic!("expected a modify-constant rule");
        };
        assert_eq!(method.name, "<init>");
        assert_eq!(constants[0].value, Some(ConstantValue::Int(20)));

        let Rule::ModifyVariable {
            variable,
            variable_type,
            ..
        } = &bundle.rules[3]
        else {
            panic!("expected a modify-variable rule");
        };
        assert_eq!(variable, &VariableSelector::Index(1));
        assert_eq!(variable_type, &Some(FieldType::Int));
    }

    #[test]
    fn test_at_element_details() {
        let bundle = parse_declaration(
            r#"<mixin name="M" target="T">
                 <inject method="tick" handler="H.h">
                   <at kind="invoke-assign" target="damage(I)V" ordinal="1" shift="2"
                       side="before"/>
                 </inject>
               </mixin>"#,
        )
        .unwrap();
        let Rule::Inject { at, .. } = &bundle.rules[0] else {
            panic!("expected an inject rule");
        };
        assert_eq!(at.kind, LocationKind::InvokeAssign);
        assert_eq!(at.target.as_deref(), Some("damage(I)V"));
        assert_eq!(at.ordinal, 1);
        assert_eq!(at.shift, 2);
        assert_eq!(at.side(), RelativeTo::Before);
    }

    #[test]
    fn test_disabled_and_all_constants() {
        let bundle = parse_declaration(
            r#"<mixin name="M" target="T" enabled="false">
                 <modify-constant method="tick" handler="H.h"/>
               </mixin>"#,
        )
        .unwrap();
        assert!(!bundle.enabled);
        let Rule::ModifyConstant { constants, .. } = &bundle.rules[0] else {
            panic!("expected a modify-constant rule");
        };
        assert_eq!(constants.len(), 1);
        assert!(constants[0].value.is_none());
    }

    #[test]
    fn test_rejects_invalid_declarations() {
        let cases = [
            r#"<rules name="M" target="T"/>"#,
            r#"<mixin target="T"/>"#,
            r#"<mixin name="M" target="T"><teleport method="x"/></mixin>"#,
            r#"<mixin name="M" target="T"><inject method="x" handler="H.h"/></mixin>"#,
            r#"<mixin name="M" target="T"><inject method="x" handler="h" at="HEAD"/></mixin>"#,
            r#"<mixin name="M" target="T" priority="high"/>"#,
            r#"<mixin name="M" target="T"><accessor field="f" name="g"/></mixin>"#,
            r#"<mixin name="M" target="T"><modify-arg method="x" handler="H.h" call="y"/></mixin>"#,
        ];
        for case in cases {
            let err = parse_declaration(case).unwrap_err();
            assert!(err.is_configuration(), "{case}: {err}");
        }
    }

    #[test]
    fn test_rejects_malformed_xml() {
        assert!(parse_declaration("<mixin name=\"M\" target=\"T\"><inject></mixin>").is_err());
        assert!(parse_declaration("").is_err());
    }

    #[test]
    fn test_compile_produces_declaration_factory() {
        let compiler = XmlMixinCompiler;
        assert!(compiler.accepts(Path::new("mixins/player.mixin.xml")));
        assert!(!compiler.accepts(Path::new("mixins/player.xml")));
        assert!(!compiler.accepts(Path::new(".mixin.xml")));

        let unit = compiler
            .compile(Path::new("player.mixin.xml"), PLAYER_MIXIN.as_bytes())
            .unwrap();
        assert_eq!(unit.name, "PlayerMixin");
        let factory = unit.factory.unwrap();
        let instance = factory(&[]).unwrap();
        let declaration = instance.as_declaration().unwrap();
        assert_eq!(declaration.target_unit(), "com/example/Player");
        assert_eq!(declaration.priority(), 1200);
        assert_eq!(declaration.rules().len(), 5);
    }

    #[test]
    fn test_compile_error_names_the_file() {
        let err = XmlMixinCompiler
            .compile(Path::new("broken.mixin.xml"), b"<mixin name=\"M\"/>")
            .unwrap_err();
        assert!(
            matches!(err, Error::Compile { ref path, .. } if path.ends_with("broken.mixin.xml"))
        );
    }
}
