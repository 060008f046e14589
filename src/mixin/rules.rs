//! The rule model: plain data describing transformations.
//!
//! Nothing in this module performs an edit. Rules are produced by a front-end (the XML
//! compiler, a [`crate::loader::MixinDeclaration`] implementation or code building bundles
//! directly) and consumed by the pipeline.
//!
//! # Key Components
//!
//! - [`RuleBundle`] - A prioritised, named set of rules for one target unit
//! - [`Rule`] - One transformation
//! - [`MethodSelector`] / [`CallSiteMatch`] - Method and call site patterns
//! - [`InsertionPoint`] - Where inside a method an edit lands
//! - [`MatchContract`] - Required and expected match counts
//!
//! # Pattern syntax
//!
//! Method selectors are `name` or `name(desc)ret`. Call site patterns additionally accept an
//! owner, either as `owner.name(desc)ret` (dotted or internal owner) or `Lowner;name(desc)ret`.
//! Handlers are `owner.name`.

use std::{fmt, str::FromStr};

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    classfile::{ConstantValue, FieldType},
    utils::internal_name,
    Error, Result,
};

/// Priority of a bundle that does not declare one
pub const DEFAULT_PRIORITY: i32 = 1000;

/// A prioritised set of rules targeting one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleBundle {
    /// Name used in diagnostics and audit records
    pub name: String,
    /// Internal name of the unit the rules apply to
    pub target_unit: String,
    /// Disabled bundles stay registered but are never applied
    pub enabled: bool,
    /// Higher priorities are applied first
    pub priority: i32,
    /// Rules in application order
    pub rules: Vec<Rule>,
}

impl RuleBundle {
    /// An enabled, empty bundle with the default priority. `target_unit` may be dotted.
    #[must_use]
    pub fn new(name: &str, target_unit: &str) -> Self {
        RuleBundle {
            name: name.to_string(),
            target_unit: internal_name(target_unit),
            enabled: true,
            priority: DEFAULT_PRIORITY,
            rules: Vec::new(),
        }
    }

    /// Set the priority
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Enable or disable the bundle
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Append a rule
    #[must_use]
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Selects a method of the target unit by name and, optionally, descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSelector {
    /// Method name
    pub name: String,
    /// Full method descriptor; `None` matches by name only
    pub descriptor: Option<String>,
}

impl MethodSelector {
    /// Select by name only
    #[must_use]
    pub fn named(name: &str) -> Self {
        MethodSelector {
            name: name.to_string(),
            descriptor: None,
        }
    }

    /// Select by name and descriptor
    #[must_use]
    pub fn exact(name: &str, descriptor: &str) -> Self {
        MethodSelector {
            name: name.to_string(),
            descriptor: Some(descriptor.to_string()),
        }
    }
}

impl FromStr for MethodSelector {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        let (name, descriptor) = split_descriptor(value);
        if name.is_empty() {
            return Err(Error::Configuration(format!(
                "Method selector '{value}' has no name"
            )));
        }
        Ok(MethodSelector {
            name: name.to_string(),
            descriptor: descriptor.map(str::to_string),
        })
    }
}

impl fmt::Display for MethodSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor.as_deref().unwrap_or(""))
    }
}

/// The static method an edit calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerRef {
    /// Internal name of the class declaring the handler
    pub owner: String,
    /// Handler method name
    pub name: String,
    /// Set when `owner` is an interface
    pub interface: bool,
}

impl HandlerRef {
    /// Handler `name` on class `owner` (dotted or internal)
    #[must_use]
    pub fn new(owner: &str, name: &str) -> Self {
        HandlerRef {
            owner: internal_name(owner),
            name: name.to_string(),
            interface: false,
        }
    }
}

impl FromStr for HandlerRef {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        let (owner, name) = split_owner(value);
        match owner {
            Some(owner) if !name.is_empty() => Ok(HandlerRef::new(owner, name)),
            _ => Err(Error::Configuration(format!(
                "Handler '{value}' must be written as owner.name"
            ))),
        }
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

/// The kind of instruction an [`InsertionPoint`] anchors on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum LocationKind {
    /// The first instruction; after the `super()`/`this()` call in constructors
    Head,
    /// Every return instruction
    Return,
    /// The last return instruction
    Tail,
    /// Method calls, optionally matching a call site pattern
    Invoke,
    /// Method calls returning a value, landing after the call
    InvokeAssign,
    /// Field reads and writes, optionally matching `owner.name:desc`
    Field,
    /// Object creation, optionally of one class
    New,
    /// Constant loads, optionally of one literal
    Constant,
    /// Local variable loads, optionally of one slot
    Load,
    /// Local variable stores, optionally of one slot
    Store,
    /// Branch instructions, optionally of one opcode mnemonic
    Jump,
}

/// Which side of the matched instruction an edit lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RelativeTo {
    /// In front of the matched instruction
    Before,
    /// Behind the matched instruction
    After,
}

/// A location inside a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionPoint {
    /// Instruction kind to match
    pub kind: LocationKind,
    /// Kind-specific filter (call pattern, field pattern, class, literal, slot or mnemonic)
    pub target: Option<String>,
    /// Selects the n-th candidate (0-based); -1 keeps all of them
    pub ordinal: i32,
    /// Moves the selected point by this many original instructions
    pub shift: i32,
    /// Overrides the kind's default side
    pub relative_to: Option<RelativeTo>,
}

impl InsertionPoint {
    /// All candidates of `kind`, unfiltered
    #[must_use]
    pub fn new(kind: LocationKind) -> Self {
        InsertionPoint {
            kind,
            target: None,
            ordinal: -1,
            shift: 0,
            relative_to: None,
        }
    }

    /// Shorthand for [`LocationKind::Head`]
    #[must_use]
    pub fn head() -> Self {
        Self::new(LocationKind::Head)
    }

    /// Set the kind-specific filter
    #[must_use]
    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    /// Select only the n-th candidate
    #[must_use]
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = ordinal;
        self
    }

    /// Shift the selected point
    #[must_use]
    pub fn with_shift(mut self, shift: i32) -> Self {
        self.shift = shift;
        self
    }

    /// Land on an explicit side
    #[must_use]
    pub fn relative_to(mut self, side: RelativeTo) -> Self {
        self.relative_to = Some(side);
        self
    }

    /// The side an edit lands on when none is given
    #[must_use]
    pub fn side(&self) -> RelativeTo {
        self.relative_to.unwrap_or(match self.kind {
            LocationKind::InvokeAssign | LocationKind::Store => RelativeTo::After,
            _ => RelativeTo::Before,
        })
    }
}

/// Identifies call instructions inside a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSiteMatch {
    /// Internal name of the callee's owner; `None` matches any owner
    pub owner: Option<String>,
    /// Callee name
    pub name: String,
    /// Callee descriptor; `None` matches any overload
    pub descriptor: Option<String>,
    /// Selects the n-th matching call (0-based); -1 keeps all of them
    pub ordinal: i32,
}

impl CallSiteMatch {
    /// All calls to `name`
    #[must_use]
    pub fn named(name: &str) -> Self {
        CallSiteMatch {
            owner: None,
            name: name.to_string(),
            descriptor: None,
            ordinal: -1,
        }
    }

    /// Select only the n-th matching call
    #[must_use]
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = ordinal;
        self
    }

    /// Returns `true` if a call to `owner.name descriptor` matches, `name` already translated
    /// through any mappings
    #[must_use]
    pub fn matches(&self, owner: &str, name: &str, descriptor: &str) -> bool {
        self.name == name
            && self.owner.as_deref().is_none_or(|wanted| wanted == owner)
            && self.descriptor.as_deref().is_none_or(|wanted| wanted == descriptor)
    }
}

impl FromStr for CallSiteMatch {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        let (head, descriptor) = split_descriptor(value);

        let (owner, name) = if let Some(rest) = head.strip_prefix('L').filter(|r| r.contains(';')) {
            let (owner, name) = rest.split_once(';').unwrap_or((rest, ""));
            (Some(internal_name(owner)), name)
        } else {
            let (owner, name) = split_owner(head);
            (owner.map(internal_name), name)
        };

        if name.is_empty() {
            return Err(Error::Configuration(format!(
                "Call site pattern '{value}' has no method name"
            )));
        }
        Ok(CallSiteMatch {
            owner,
            name: name.to_string(),
            descriptor: descriptor.map(str::to_string),
            ordinal: -1,
        })
    }
}

impl fmt::Display for CallSiteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(owner) = &self.owner {
            write!(f, "{owner}.")?;
        }
        write!(f, "{}{}", self.name, self.descriptor.as_deref().unwrap_or(""))
    }
}

/// Selects constant loads by value, by ordinal among the matches, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantMatcher {
    /// The literal to match; `None` matches every constant load
    pub value: Option<ConstantValue>,
    /// Keep only the n-th match (0-based)
    pub ordinal: Option<u32>,
}

impl ConstantMatcher {
    /// Match every load of `value`
    #[must_use]
    pub fn value(value: ConstantValue) -> Self {
        ConstantMatcher {
            value: Some(value),
            ordinal: None,
        }
    }

    /// Keep only the n-th match
    #[must_use]
    pub fn with_ordinal(mut self, ordinal: u32) -> Self {
        self.ordinal = Some(ordinal);
        self
    }
}

/// Parse a typed literal: `int:5`, `float:1.5`, `long:7`, `double:2.0`, `string:text` or
/// `null`. A bare integer is an `int`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for unknown prefixes and unparsable numbers.
pub fn parse_literal(text: &str) -> Result<ConstantValue> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("null") {
        return Ok(ConstantValue::Null);
    }

    let invalid = || Error::Configuration(format!("Invalid constant literal '{text}'"));
    let Some((kind, value)) = text.split_once(':') else {
        return text.parse().map(ConstantValue::Int).map_err(|_| invalid());
    };
    match kind.to_ascii_lowercase().as_str() {
        "int" | "i" => value.parse().map(ConstantValue::Int).map_err(|_| invalid()),
        "float" | "f" => value.parse().map(ConstantValue::Float).map_err(|_| invalid()),
        "long" | "j" => value.parse().map(ConstantValue::Long).map_err(|_| invalid()),
        "double" | "d" => value.parse().map(ConstantValue::Double).map_err(|_| invalid()),
        "string" | "s" => Ok(ConstantValue::String(value.to_string())),
        _ => Err(invalid()),
    }
}

/// Identifies a local variable by slot or by its `LocalVariableTable` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableSelector {
    /// Local variable slot
    Index(u16),
    /// Declared name
    Name(String),
}

/// Match count assertions of an injector-style rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchContract {
    /// Fail when fewer matches than this are found
    pub require: Option<u32>,
    /// Fail unless exactly this many matches are found
    pub expect: Option<u32>,
}

impl MatchContract {
    /// At least `count` matches
    #[must_use]
    pub fn require(count: u32) -> Self {
        MatchContract {
            require: Some(count),
            expect: None,
        }
    }

    /// Check a match count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when a set assertion does not hold.
    pub fn check(&self, found: usize) -> Result<()> {
        if let Some(required) = self.require.filter(|required| *required > 0) {
            if found < required as usize {
                return Err(Error::Configuration(format!(
                    "Required {required} match(es), found {found}"
                )));
            }
        }
        if let Some(expected) = self.expect {
            if found != expected as usize {
                return Err(Error::Configuration(format!(
                    "Expected exactly {expected} match(es), found {found}"
                )));
            }
        }
        Ok(())
    }
}

/// Getter or setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AccessorKind {
    /// `()T` returning the field
    Getter,
    /// `(T)V` assigning the field
    Setter,
}

/// One transformation.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Rule {
    /// Call `handler` at every resolved point
    Inject {
        /// Method to edit
        method: MethodSelector,
        /// Called with the receiver (instance methods) and all parameters
        handler: HandlerRef,
        /// Where to call it
        at: InsertionPoint,
        /// The handler returns `boolean`; `true` returns the default value early
        cancellable: bool,
        /// Translate names through the engine's mappings
        remap: bool,
        /// Match count assertions
        contract: MatchContract,
    },
    /// Replace matched calls with a static call to `handler`
    Redirect {
        /// Method to edit
        method: MethodSelector,
        /// Receives the receiver (instance calls) and the call's arguments
        handler: HandlerRef,
        /// Calls to replace
        call: CallSiteMatch,
        /// Translate names through the engine's mappings
        remap: bool,
        /// Match count assertions
        contract: MatchContract,
    },
    /// Pass one argument of matched calls through `handler`
    ModifyArg {
        /// Method to edit
        method: MethodSelector,
        /// `(T)T` over the argument type
        handler: HandlerRef,
        /// Calls whose argument is modified
        call: CallSiteMatch,
        /// 0-based argument position (receiver excluded)
        index: usize,
        /// Translate names through the engine's mappings
        remap: bool,
        /// Match count assertions
        contract: MatchContract,
    },
    /// Pass matched constant loads through `handler`
    ModifyConstant {
        /// Method to edit
        method: MethodSelector,
        /// `(T)T` over the constant type
        handler: HandlerRef,
        /// Constants to modify; a load matched by several matchers is modified once
        constants: Vec<ConstantMatcher>,
        /// Translate names through the engine's mappings
        remap: bool,
        /// Match count assertions
        contract: MatchContract,
    },
    /// Pass a local variable through `handler` at every resolved point
    ModifyVariable {
        /// Method to edit
        method: MethodSelector,
        /// `(T)T` over the variable type
        handler: HandlerRef,
        /// Where to modify the variable
        at: InsertionPoint,
        /// The variable
        variable: VariableSelector,
        /// Explicit variable type for [`VariableSelector::Index`] without a local table
        variable_type: Option<FieldType>,
        /// Selects among same-named variables (0-based); -1 picks the one live at the point
        ordinal: i32,
        /// Translate names through the engine's mappings
        remap: bool,
        /// Match count assertions
        contract: MatchContract,
    },
    /// Replace the whole body with a call to `handler`
    Overwrite {
        /// Method to replace
        method: MethodSelector,
        /// Receives the receiver (instance methods) and all parameters
        handler: HandlerRef,
        /// Translate names through the engine's mappings
        remap: bool,
    },
    /// Add a public method forwarding to an inaccessible one
    Invoker {
        /// Method to expose
        method: MethodSelector,
        /// Name of the forwarding method
        accessor_name: String,
        /// Translate names through the engine's mappings
        remap: bool,
    },
    /// Add a public getter or setter for a field
    Accessor {
        /// Field name
        field: String,
        /// Field descriptor; `None` matches by name only
        descriptor: Option<String>,
        /// Name of the accessor method
        accessor_name: String,
        /// Getter or setter
        kind: AccessorKind,
        /// Translate names through the engine's mappings
        remap: bool,
    },
}

impl Rule {
    /// Short kind name used in diagnostics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// The method the rule edits or exposes; `None` for accessors
    #[must_use]
    pub fn method(&self) -> Option<&MethodSelector> {
        match self {
            Rule::Inject { method, .. }
            | Rule::Redirect { method, .. }
            | Rule::ModifyArg { method, .. }
            | Rule::ModifyConstant { method, .. }
            | Rule::ModifyVariable { method, .. }
            | Rule::Overwrite { method, .. }
            | Rule::Invoker { method, .. } => Some(method),
            Rule::Accessor { .. } => None,
        }
    }

    /// Whether names go through the mappings
    #[must_use]
    pub fn remap(&self) -> bool {
        match self {
            Rule::Inject { remap, .. }
            | Rule::Redirect { remap, .. }
            | Rule::ModifyArg { remap, .. }
            | Rule::ModifyConstant { remap, .. }
            | Rule::ModifyVariable { remap, .. }
            | Rule::Overwrite { remap, .. }
            | Rule::Invoker { remap, .. }
            | Rule::Accessor { remap, .. } => *remap,
        }
    }
}

/// Split `name(desc)ret` into name and descriptor
fn split_descriptor(value: &str) -> (&str, Option<&str>) {
    match value.find('(') {
        Some(paren) => (&value[..paren], Some(&value[paren..])),
        None => (value, None),
    }
}

/// Split `owner.name` at the last separator; `owner` may be dotted or internal
fn split_owner(value: &str) -> (Option<&str>, &str) {
    match value.rfind(['.', ':']) {
        Some(dot) => (Some(&value[..dot]), &value[dot + 1..]),
        None => (None, value),
    }
}
