//! Declarative value casting.
//!
//! A [`CastSpec`] such as `"trim|upper|default:N/A"` is compiled once into a
//! [`Pipeline`] of converter links, each `name[:arg1:arg2:...]`. Names resolve
//! against caller registrations first, then the built-ins. Whenever the value
//! reaching a link is a list (or a map), the link is applied to every element.

pub mod builtins;

use crate::error::{CsvError, Result};
use crate::value::Value;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A caller-supplied converter: receives the value and the link arguments.
pub type ConverterFn = Arc<dyn Fn(Value, &[String]) -> Value + Send + Sync>;

/// An opaque cast step.
pub type CastFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Settings the built-in converters read while running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertContext {
    /// Used by `number` and `int` when no separator argument is given.
    pub decimal_separator: String,
}

impl Default for ConvertContext {
    fn default() -> Self {
        Self {
            decimal_separator: ".".to_string(),
        }
    }
}

/// A per-column cast specification.
#[derive(Clone)]
pub enum CastSpec {
    /// Pipe-separated converter links, e.g. `trim|number:,`.
    Named(String),
    /// A closure applied to the value.
    Func(CastFn),
    /// Specs applied one after another.
    Chain(Vec<CastSpec>),
}

impl CastSpec {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        CastSpec::Func(Arc::new(f))
    }
}

impl fmt::Debug for CastSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastSpec::Named(spec) => f.debug_tuple("Named").field(spec).finish(),
            CastSpec::Func(_) => f.write_str("Func(..)"),
            CastSpec::Chain(specs) => f.debug_tuple("Chain").field(specs).finish(),
        }
    }
}

impl From<&str> for CastSpec {
    fn from(spec: &str) -> Self {
        CastSpec::Named(spec.to_string())
    }
}

impl From<String> for CastSpec {
    fn from(spec: String) -> Self {
        CastSpec::Named(spec)
    }
}

impl<T: Into<CastSpec>> From<Vec<T>> for CastSpec {
    fn from(specs: Vec<T>) -> Self {
        CastSpec::Chain(specs.into_iter().map(Into::into).collect())
    }
}

impl<'de> Deserialize<'de> for CastSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<Raw>),
        }

        fn convert(raw: Raw) -> CastSpec {
            match raw {
                Raw::One(spec) => CastSpec::Named(spec),
                Raw::Many(specs) => CastSpec::Chain(specs.into_iter().map(convert).collect()),
            }
        }

        Raw::deserialize(deserializer).map(convert)
    }
}

/// Converter table: caller registrations shadow the built-ins.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    custom: HashMap<String, ConverterFn>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a converter.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value, &[String]) -> Value + Send + Sync + 'static,
    {
        self.custom.insert(name.into(), Arc::new(f));
    }

    /// `true` if `name` is registered or built in.
    pub fn contains(&self, name: &str) -> bool {
        self.custom.contains_key(name) || builtins::lookup(name).is_some()
    }

    fn resolve(&self, name: &str) -> Option<Resolved> {
        if let Some(f) = self.custom.get(name) {
            return Some(Resolved::Custom(Arc::clone(f)));
        }
        builtins::lookup(name).map(Resolved::Builtin)
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Clone)]
enum Resolved {
    Custom(ConverterFn),
    Builtin(builtins::BuiltinFn),
}

#[derive(Clone)]
enum Step {
    Link {
        name: String,
        args: Vec<String>,
        converter: Option<Resolved>,
    },
    Func(CastFn),
}

impl Step {
    fn run(&self, value: Value, ctx: &ConvertContext) -> Value {
        match self {
            Step::Link {
                converter: Some(Resolved::Builtin(f)),
                args,
                ..
            } => f(value, args, ctx),
            Step::Link {
                converter: Some(Resolved::Custom(f)),
                args,
                ..
            } => f(value, args),
            Step::Link {
                converter: None,
                name,
                ..
            } => {
                tracing::debug!(converter = %name, "unknown converter, value passed through");
                value
            }
            Step::Func(f) => f(value),
        }
    }
}

/// A compiled cast specification.
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    /// Resolves every link of `spec`. With `strict`, unknown names are an error
    /// instead of a pass-through.
    pub fn compile(spec: &CastSpec, registry: &ConverterRegistry, strict: bool) -> Result<Self> {
        let mut pipeline = Pipeline::default();
        pipeline.push(spec, registry, strict)?;
        Ok(pipeline)
    }

    fn push(&mut self, spec: &CastSpec, registry: &ConverterRegistry, strict: bool) -> Result<()> {
        match spec {
            CastSpec::Named(chain) => {
                for link in chain.split('|') {
                    let mut parts = link.split(':').map(str::to_string);
                    let name = parts.next().unwrap_or_default();
                    let converter = registry.resolve(&name);
                    if converter.is_none() && strict {
                        return Err(CsvError::UnknownConverter(name));
                    }
                    self.steps.push(Step::Link {
                        name,
                        args: parts.collect(),
                        converter,
                    });
                }
            }
            CastSpec::Func(f) => self.steps.push(Step::Func(Arc::clone(f))),
            CastSpec::Chain(specs) => {
                for spec in specs {
                    self.push(spec, registry, strict)?;
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every link in order, each one elementwise over lists and maps.
    pub fn apply(&self, value: Value, ctx: &ConvertContext) -> Value {
        self.steps.iter().fold(value, |value, step| {
            map_elements(value, &|v| step.run(v, ctx))
        })
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .steps
            .iter()
            .map(|s| match s {
                Step::Link { name, .. } => name.as_str(),
                Step::Func(_) => "<fn>",
            })
            .collect();
        f.debug_struct("Pipeline").field("steps", &names).finish()
    }
}

/// Applies `f` to every scalar inside nested lists and map values.
fn map_elements(value: Value, f: &dyn Fn(Value) -> Value) -> Value {
    match value {
        Value::List(items) => Value::List(items.into_iter().map(|v| map_elements(v, f)).collect()),
        Value::Map(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (k, map_elements(v, f)))
                .collect(),
        ),
        scalar => f(scalar),
    }
}

/// Registry, runtime context and strictness bundled for callers.
#[derive(Debug, Clone, Default)]
pub struct Converters {
    registry: ConverterRegistry,
    context: ConvertContext,
    strict: bool,
}

impl Converters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_converter<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Value, &[String]) -> Value + Send + Sync + 'static,
    {
        self.registry.register(name, f);
        self
    }

    pub fn set_default_decimal_separator(&mut self, separator: impl Into<String>) -> &mut Self {
        self.context.decimal_separator = separator.into();
        self
    }

    pub fn default_decimal_separator(&self) -> &str {
        &self.context.decimal_separator
    }

    /// Makes unknown converter names an error at compile time.
    pub fn set_strict(&mut self, strict: bool) -> &mut Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ConvertContext {
        &self.context
    }

    pub fn compile(&self, spec: &CastSpec) -> Result<Pipeline> {
        Pipeline::compile(spec, &self.registry, self.strict)
    }

    pub fn apply(&self, pipeline: &Pipeline, value: Value) -> Value {
        pipeline.apply(value, &self.context)
    }

    /// Compiles `spec` and applies it to `value` in one go.
    pub fn cast(&self, value: impl Into<Value>, spec: impl Into<CastSpec>) -> Result<Value> {
        let pipeline = self.compile(&spec.into())?;
        Ok(self.apply(&pipeline, value.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cast(value: &str, spec: &str) -> Value {
        Converters::new().cast(value, spec).unwrap()
    }

    #[test]
    fn test_chain_syntax() {
        assert_eq!(cast("  ab ", "trim|upper"), Value::from("AB"));
        assert_eq!(cast("   ", "trim|default:N/A"), Value::from("N/A"));
    }

    #[test]
    fn test_list_and_string_chains_are_equivalent() {
        let conv = Converters::new();
        let piped = conv.cast(" x ", "trim|upper").unwrap();
        let listed = conv.cast(" x ", vec!["trim", "upper"]).unwrap();
        assert_eq!(piped, listed);
    }

    #[test]
    fn test_elementwise_after_split() {
        assert_eq!(
            cast(" a | b ", "split|trim|upper"),
            Value::from(vec!["A", "B"])
        );
    }

    #[test]
    fn test_elementwise_over_json_map() {
        let Value::Map(map) = cast(r#"{"a": " x ", "b": [" y "]}"#, "json|trim") else {
            panic!("expected map");
        };
        assert_eq!(map["a"], Value::from("x"));
        assert_eq!(map["b"], Value::from(vec!["y"]));
    }

    #[test]
    fn test_custom_converter_shadows_builtin() {
        let mut conv = Converters::new();
        conv.add_converter("upper", |_, _| Value::from("custom"));
        conv.add_converter("wrap", |v, args| {
            let inner = v.as_str().unwrap_or_default().to_string();
            Value::from(format!("{}{inner}{}", args[0], args[1]))
        });
        assert_eq!(conv.cast("a", "upper").unwrap(), Value::from("custom"));
        assert_eq!(conv.cast("a", "wrap:<:>").unwrap(), Value::from("<a>"));
    }

    #[test]
    fn test_closure_spec() {
        let spec = CastSpec::Chain(vec![
            "trim".into(),
            CastSpec::func(|v| Value::from(v.as_str().map(str::len).unwrap_or(0) as u64)),
        ]);
        assert_eq!(Converters::new().cast(" abc ", spec).unwrap(), Value::from(3u64));
    }

    #[test]
    fn test_unknown_converter() {
        assert_eq!(cast(" a ", "nope|trim"), Value::from("a"));

        let mut conv = Converters::new();
        conv.set_strict(true);
        assert!(matches!(
            conv.cast("a", "trim|nope"),
            Err(CsvError::UnknownConverter(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_deserialize_spec() {
        let spec: CastSpec = serde_json::from_str(r#"["trim", ["upper", "default:x"]]"#).unwrap();
        let pipeline = Converters::new().compile(&spec).unwrap();
        assert_eq!(pipeline.len(), 3);
    }
}
