//! # Dispatcher Shape and Argument Tests
//!
//! Exercises every supported call shape, the malformed ones, and the strict
//! argument decoding rules against a mock operation set.

use invoke_bridge::{Dispatcher, Envelope, ErrorKind, OperationSet, Signature, Slot};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

struct MockLibrary;

#[derive(Debug, thiserror::Error)]
#[error("mock error: {0}")]
struct MockError(String);

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MockParams {
    foo: i32,
    bar: String,
    nested: Option<Box<MockParams>>,
}

fn mock_library() -> Dispatcher<MockLibrary> {
    OperationSet::<MockLibrary>::new()
        .unit("NoParam", |_| {})
        .value("NoParamResult", |_| "toot gaya")
        .fallible_unit("NoParamNilError", |_| Ok::<(), MockError>(()))
        .fallible_unit("NoParamError", |_| Err(MockError("kaputt".to_string())))
        .declare(
            "NoParamBadErrorReturn",
            Signature::new(0, &[Slot::Value, Slot::Error]),
            |_, _| Ok(None),
        )
        .declare(
            "NoParamTwoResults",
            Signature::new(0, &[Slot::Value, Slot::Value]),
            |_, _| Ok(None),
        )
        .unit_with("OneParam", |_, _a: i32| {})
        .value_with("OneParamEcho", |_, s: String| s)
        .declare("TwoParams", Signature::new(2, &[]), |_, _| Ok(None))
        .value_with("ComplexParam", |_, params: MockParams| params.nested)
        .value_with("ArrayParam", |_, params: Vec<i32>| params.len())
        .fallible_unit_with("ConditionalErrorNoResult", |_, fail: i32| {
            if fail != 0 {
                Err(MockError(format!("kaputt {fail}")))
            } else {
                Ok(())
            }
        })
        .fallible_with("ConditionalErrorWithResult", |_, nr: i32| {
            if nr == 7 {
                Err(MockError("oh noes".to_string()))
            } else {
                Ok("success")
            }
        })
        .build(MockLibrary)
}

#[derive(Debug)]
enum Expect {
    Done(Option<Value>),
    Fails(ErrorKind),
    Mock,
}

use Expect::*;

fn checks() -> Vec<(&'static str, &'static str, Expect)> {
    vec![
        ("ThisDoesNotExist", "", Fails(ErrorKind::MethodNotFound)),
        ("NoParam", "", Done(None)),
        ("NoParam", "123", Fails(ErrorKind::InvalidArguments)),
        ("NoParamResult", "", Done(Some(json!("toot gaya")))),
        ("NoParamResult", "123", Fails(ErrorKind::InvalidArguments)),
        ("NoParamNilError", "", Done(None)),
        ("NoParamNilError", "123", Fails(ErrorKind::InvalidArguments)),
        ("NoParamError", "", Mock),
        ("NoParamError", "123", Fails(ErrorKind::InvalidArguments)),
        ("NoParamBadErrorReturn", "", Fails(ErrorKind::InvocationError)),
        ("NoParamTwoResults", "", Fails(ErrorKind::InvocationError)),
        ("OneParam", "", Fails(ErrorKind::InvalidArguments)),
        ("OneParam", "123", Done(None)),
        ("OneParam", "false", Fails(ErrorKind::InvalidArguments)),
        ("OneParamEcho", "", Fails(ErrorKind::InvalidArguments)),
        ("OneParamEcho", "123", Fails(ErrorKind::InvalidArguments)),
        ("OneParamEcho", "foo", Fails(ErrorKind::InvalidArguments)),
        ("OneParamEcho", r#""foo""#, Done(Some(json!("foo")))),
        ("OneParamEcho", r#""bar""#, Done(Some(json!("bar")))),
        ("TwoParams", "", Fails(ErrorKind::InvocationError)),
        ("TwoParams", "123", Fails(ErrorKind::InvocationError)),
        ("ComplexParam", "", Fails(ErrorKind::InvalidArguments)),
        ("ComplexParam", "123", Fails(ErrorKind::InvalidArguments)),
        ("ComplexParam", r#"{"foo":42}"#, Done(Some(Value::Null))),
        ("ComplexParam", r#"{"foo":42,"nested":null}"#, Done(Some(Value::Null))),
        (
            "ComplexParam",
            r#"{"foo":42,"breakit":true}"#,
            Fails(ErrorKind::InvalidArguments),
        ),
        (
            "ComplexParam",
            r#"{"foo":42,"nested":{"bar":"baz"}}"#,
            Done(Some(json!({"foo": 0, "bar": "baz", "nested": null}))),
        ),
        ("ComplexParam", "null", Fails(ErrorKind::InvalidArguments)),
        ("ArrayParam", "[4,8,15,16,23,42]", Done(Some(json!(6)))),
        ("ArrayParam", "[]", Done(Some(json!(0)))),
        ("ArrayParam", "null", Fails(ErrorKind::InvalidArguments)),
        ("ArrayParam", "1,2,3,4", Fails(ErrorKind::InvalidArguments)),
        ("ArrayParam", "", Fails(ErrorKind::InvalidArguments)),
        ("ArrayParam", r#"{"args":[1,2,3]}"#, Fails(ErrorKind::InvalidArguments)),
        ("ConditionalErrorNoResult", "", Fails(ErrorKind::InvalidArguments)),
        ("ConditionalErrorNoResult", "0", Done(None)),
        ("ConditionalErrorNoResult", "1", Mock),
        ("ConditionalErrorWithResult", "", Fails(ErrorKind::InvalidArguments)),
        ("ConditionalErrorWithResult", " null  ", Fails(ErrorKind::InvalidArguments)),
        ("ConditionalErrorWithResult", r#""null""#, Fails(ErrorKind::InvalidArguments)),
        ("ConditionalErrorWithResult", "  0", Done(Some(json!("success")))),
        ("ConditionalErrorWithResult", "6  ", Done(Some(json!("success")))),
        ("ConditionalErrorWithResult", " 7 ", Mock),
        ("ConditionalErrorWithResult", "8", Done(Some(json!("success")))),
    ]
}

#[test]
fn test_call_method() {
    let dispatcher = mock_library();
    for (method, args, expect) in checks() {
        let outcome = dispatcher.invoke(method, args);
        match (&expect, outcome) {
            (Done(expected), Ok(result)) => {
                assert_eq!(&result, expected, "{method}({args:?}): unexpected result");
            }
            (Fails(kind), Err(err)) => {
                assert_eq!(err.kind(), *kind, "{method}({args:?}): unexpected error {err}");
                assert!(!err.is_domain::<MockError>());
            }
            (Mock, Err(err)) => {
                assert!(
                    err.is_domain::<MockError>(),
                    "{method}({args:?}): expected mock error, got {err}"
                );
                assert_eq!(err.kind(), ErrorKind::Domain);
            }
            (expect, outcome) => {
                panic!("{method}({args:?}): expected {expect:?}, got {outcome:?}");
            }
        }
    }
}

#[test]
fn test_envelope_error_empty_iff_success() {
    let dispatcher = mock_library();
    for (method, args, _) in checks() {
        let succeeded = dispatcher.invoke(method, args).is_ok();
        let envelope = Envelope::from_json(&dispatcher.invoke_json(method, args))
            .unwrap_or_else(|e| panic!("{method}({args:?}): malformed envelope: {e}"));
        assert_eq!(envelope.is_error(), !succeeded, "{method}({args:?})");
        if envelope.is_error() {
            assert_eq!(envelope.result, Value::Null);
        }
    }
}

#[test]
fn test_domain_error_message_is_preserved() {
    let dispatcher = mock_library();
    assert_eq!(
        dispatcher.invoke_json("ConditionalErrorWithResult", "7"),
        r#"{"error":"mock error: oh noes","result":null}"#
    );
    assert_eq!(
        dispatcher.invoke_json("ConditionalErrorNoResult", "3"),
        r#"{"error":"mock error: kaputt 3","result":null}"#
    );

    let err = dispatcher.invoke("NoParamError", "").unwrap_err();
    let mock = err.domain_error().unwrap().downcast_ref::<MockError>().unwrap();
    assert_eq!(mock.0, "kaputt");
}

#[test]
fn test_envelope_documents() {
    let dispatcher = mock_library();
    assert_eq!(
        dispatcher.invoke_json("NoParamResult", ""),
        r#"{"error":"","result":"toot gaya"}"#
    );
    assert_eq!(
        dispatcher.invoke_json("NoParam", ""),
        r#"{"error":"","result":null}"#
    );
    assert_eq!(
        dispatcher.invoke_json("ThisDoesNotExist", ""),
        r#"{"error":"method not found: ThisDoesNotExist","result":null}"#
    );

    let envelope = Envelope::from_json(&dispatcher.invoke_json("OneParamEcho", "123")).unwrap();
    assert!(envelope.error.starts_with("invalid arguments: OneParamEcho:"));
}

#[test]
fn test_shapes_are_reported() {
    let dispatcher = mock_library();
    assert_eq!(
        dispatcher.shape("ConditionalErrorWithResult").unwrap().unwrap().to_string(),
        "1-param/(error,result)"
    );
    assert_eq!(
        dispatcher.shape("NoParam").unwrap().unwrap().to_string(),
        "0-param/no-result"
    );
    assert!(dispatcher.shape("NoParamBadErrorReturn").unwrap().is_err());
    assert!(dispatcher.shape("ThisDoesNotExist").is_none());
    assert_eq!(dispatcher.methods().count(), 13);
}

#[test]
fn test_blank_domain_error_is_not_reported_as_success() {
    #[derive(Debug, thiserror::Error)]
    #[error("")]
    struct Silent;

    let dispatcher = OperationSet::new()
        .fallible_unit("Fail", |_: &()| Err(Silent))
        .build(());

    assert!(dispatcher.invoke("Fail", "").unwrap_err().is_domain::<Silent>());
    let envelope = Envelope::from_json(&dispatcher.invoke_json("Fail", "")).unwrap();
    assert!(envelope.is_error());
    assert_eq!(envelope.result, Value::Null);
}
