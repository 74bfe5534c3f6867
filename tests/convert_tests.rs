use csvio_rs::{CastSpec, Converters, CsvError, Value};
use rstest::rstest;

fn cast(value: impl Into<Value>, spec: &str) -> Value {
    Converters::new().cast(value, spec).unwrap()
}

fn s(value: &str) -> Value {
    Value::from(value)
}

#[rstest]
#[case("  45.8 ", Some("45.8"))]
#[case("-1.789", Some("-1.789"))]
#[case(".0", Some(".0"))]
#[case("12", Some("12"))]
#[case("cd", None)]
#[case("1.2.3", None)]
#[case("1e5", None)]
fn number(#[case] input: &str, #[case] expected: Option<&str>) {
    assert_eq!(cast(input, "number"), Value::from(expected));
}

#[rstest]
#[case("1.234,5", "number:,:.", Some("1234.5"))]
#[case("1 234,5", "number:,: ", Some("1234.5"))]
#[case("1,234.5", "number:.:,", Some("1234.5"))]
#[case("1,234.5", "number", None)]
#[case("-4", "int", Some("-4"))]
#[case("45", "int", Some("45"))]
#[case("-1.789", "int", None)]
#[case(".0", "int", None)]
#[case("1.000", "int:,:.", Some("1000"))]
fn number_separators(#[case] input: &str, #[case] spec: &str, #[case] expected: Option<&str>) {
    assert_eq!(cast(input, spec), Value::from(expected));
}

#[test]
fn default_decimal_separator_applies_to_blank_argument() {
    let mut converters = Converters::new();
    converters.set_default_decimal_separator(",");
    assert_eq!(converters.cast("4,5", "number").unwrap(), s("4.5"));
    assert_eq!(converters.cast("4,5", "number: ").unwrap(), s("4.5"));
    assert_eq!(converters.cast("4.5", "number:.").unwrap(), s("4.5"));
}

#[rstest]
#[case(" false ", false)]
#[case("FALSE", false)]
#[case("0", false)]
#[case("", false)]
#[case("  ", false)]
#[case("1", true)]
#[case("true", true)]
#[case("no", true)]
#[case("0.0", true)]
fn boolean(#[case] input: &str, #[case] expected: bool) {
    assert_eq!(cast(input, "bool"), Value::Bool(expected));
}

#[test]
fn boolean_of_null_and_bool() {
    assert_eq!(cast(Value::Null, "bool"), Value::Bool(false));
    assert_eq!(cast(true, "bool"), Value::Bool(true));
    assert_eq!(cast(false, "bool"), Value::Bool(false));
}

#[test]
fn default_never_treats_false_as_empty() {
    assert_eq!(cast(false, "default:x"), Value::Bool(false));
    assert_eq!(cast(Value::Null, "default:x"), s("x"));
    assert_eq!(cast("\t", "default"), Value::Null);
    assert_eq!(cast(" ", "defaultNull"), Value::Null);
}

#[test]
fn split() {
    assert_eq!(cast("1|2|3|X", "split"), Value::from(vec!["1", "2", "3", "X"]));
    assert_eq!(cast("", "split"), Value::Null);
    assert_eq!(cast(" a ; b", "split:;"), Value::from(vec![" a ", " b"]));
}

#[test]
fn split_then_number_is_elementwise() {
    assert_eq!(
        cast("1.5| 2 |x", "split|number"),
        Value::List(vec![s("1.5"), s("2"), Value::Null])
    );
}

#[test]
fn date_timezones() {
    let utc = cast("2019-08-24 11:44:01", "date");
    assert_eq!(utc.as_date().unwrap().to_rfc3339(), "2019-08-24T11:44:01+00:00");

    let berlin = cast("2019-08-24 11:44:01", "date:Europe/Berlin");
    assert_eq!(berlin.as_date().unwrap().to_rfc3339(), "2019-08-24T11:44:01+02:00");

    let offset = cast("2019-08-24 11:44:01", "date:-03:00");
    assert_eq!(offset.as_date().unwrap().to_rfc3339(), "2019-08-24T11:44:01-03:00");

    // an explicit offset in the value wins over the argument
    let explicit = cast("2019-08-24T11:44:01+05:00", "date:Europe/Berlin");
    assert_eq!(explicit.as_date().unwrap().to_rfc3339(), "2019-08-24T11:44:01+05:00");
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("xasdas")]
#[case("2019-13-45")]
fn date_unparseable_is_null(#[case] input: &str) {
    assert_eq!(cast(input, "date"), Value::Null);
}

#[test]
fn date_unknown_timezone_is_null() {
    assert_eq!(cast("2019-08-24", "date:Nowhere/Land"), Value::Null);
}

#[test]
fn json_modes() {
    let Value::Map(map) = cast(r#"{"z": 1, "a": {"b": [true]}}"#, "json") else {
        panic!("expected map");
    };
    assert_eq!(map.keys().collect::<Vec<_>>(), ["z", "a"]);
    assert!(matches!(&map["a"], Value::Map(inner) if inner["b"] == Value::from(vec![true])));

    assert_eq!(
        cast(r#"{"b": 9}"#, "json:object"),
        Value::Json(serde_json::json!({"b": 9}))
    );
    assert_eq!(cast("[1, null]", "json"), Value::List(vec![Value::from(1i64), Value::Null]));
    assert_eq!(cast("{", "json"), Value::Null);
    assert_eq!(cast(" ", "json"), Value::Null);
}

#[test]
fn chain_with_arguments() {
    assert_eq!(cast("  ", "trim|default:N/A"), s("N/A"));
    assert_eq!(cast(" ab ", "trim|upper"), s("AB"));
    assert_eq!(cast(" AB ", "lower|trim"), s("ab"));
}

#[test]
fn nested_list_spec() {
    let spec = CastSpec::from(vec![
        CastSpec::from("split:,"),
        CastSpec::from(vec!["trim", "upper"]),
    ]);
    assert_eq!(
        Converters::new().cast("a, b ,c", spec).unwrap(),
        Value::from(vec!["A", "B", "C"])
    );
}

#[test]
fn registered_converter_receives_arguments() {
    let mut converters = Converters::new();
    converters.add_converter("repeat", |value, args| {
        let times = args.first().and_then(|n| n.parse().ok()).unwrap_or(1);
        Value::from(value.as_str().unwrap_or_default().repeat(times))
    });
    assert_eq!(converters.cast("ab", "repeat:3").unwrap(), s("ababab"));
    assert_eq!(converters.cast("x|y", "split|repeat:2").unwrap(), Value::from(vec!["xx", "yy"]));
}

#[test]
fn unknown_converter_passes_through_unless_strict() {
    assert_eq!(cast(" a ", "missing"), s(" a "));

    let mut converters = Converters::new();
    converters.set_strict(true);
    let err = converters.cast(" a ", "trim|missing").unwrap_err();
    assert!(matches!(&err, CsvError::UnknownConverter(name) if name == "missing"));
    assert!(err.is_usage_error());
}

#[test]
fn cast_spec_from_config() {
    let casts: std::collections::BTreeMap<String, CastSpec> =
        serde_json::from_str(r#"{"price": "trim|number:,", "tags": ["split", "trim"]}"#).unwrap();
    let converters = Converters::new();
    assert_eq!(converters.cast(" 4,5 ", casts["price"].clone()).unwrap(), s("4.5"));
    assert_eq!(
        converters.cast("a | b", casts["tags"].clone()).unwrap(),
        Value::from(vec!["a", "b"])
    );
}
