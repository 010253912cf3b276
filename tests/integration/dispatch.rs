//! Dispatcher behaviour against check doubles
//!
//! These tests verify that:
//! - Unsupported keys fail without running any check
//! - Parameters reach the check in order and unchanged
//! - Check failures surface their message, or the fallback message
//! - Malformed composite keys never reach a check

use assert_matches::assert_matches;
use itemcheck::{
    DispatchError, MetricKey,
    agent::{RequestParam, ResultValue},
    error::{INVALID_KEY_FORMAT, UNKNOWN_ERROR},
    item_key::make_key,
};
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[test]
fn test_unsupported_key_names_the_key() {
    let check = FakeCheck::new(FakeOutcome::NoValue);
    let dispatcher = dispatcher_for_all(&check);

    let error = dispatcher.execute("vfs.fs.size", &["/", "free"]).unwrap_err();

    assert_eq!(error, DispatchError::UnsupportedMetric("vfs.fs.size".to_string()));
    assert!(error.to_string().contains("vfs.fs.size"));
    assert_eq!(check.calls(), 0);
}

#[test]
fn test_unsupported_key_is_checked_before_parsing() {
    let check = FakeCheck::new(FakeOutcome::NoValue);
    let dispatcher = dispatcher_for_all(&check);

    assert_matches!(
        dispatcher.execute_key("vfs.fs.size[/,"),
        Err(DispatchError::UnsupportedMetric(key)) if key == "vfs.fs.size"
    );
    assert_eq!(check.calls(), 0);
}

#[test]
fn test_composite_key_for_tcp_port() {
    assert_eq!(
        make_key("net.tcp.port", &["127.0.0.1", "80"]),
        "net.tcp.port[127.0.0.1,80]"
    );
}

#[test]
fn test_params_reach_check_in_order() {
    let check = FakeCheck::new(FakeOutcome::Value(ResultValue::Uint64(1)));
    let dispatcher = dispatcher_with(MetricKey::NetTcpPort, &check);

    let value = dispatcher.execute("net.tcp.port", &["127.0.0.1", "80"]).unwrap();

    assert_eq!(value.as_deref(), Some("1"));
    let request = check.last_request().unwrap();
    assert_eq!(request.key(), "net.tcp.port");
    assert_eq!(
        request.params(),
        &[
            RequestParam::Plain("127.0.0.1".to_string()),
            RequestParam::Plain("80".to_string()),
        ]
    );
}

#[test]
fn test_special_characters_survive_quoting() {
    let check = FakeCheck::new(FakeOutcome::NoValue);
    let dispatcher = dispatcher_with(MetricKey::WebPageRegexp, &check);
    let params = ["host", "/", "", r#"say "hi", ok]"#, "", r"\1"];

    dispatcher.execute("web.page.regexp", &params).unwrap();

    let request = check.last_request().unwrap();
    let received = request
        .params()
        .iter()
        .map(|param| param.as_str().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(received, params);
}

#[test]
fn test_failure_with_message_is_returned_verbatim() {
    let check = FakeCheck::new(FakeOutcome::Failure(Some("Cannot obtain process list.")));
    let dispatcher = dispatcher_with(MetricKey::ProcNum, &check);

    let error = dispatcher.execute("proc.num", &["sshd"]).unwrap_err();

    assert_eq!(error.to_string(), "Cannot obtain process list.");
}

#[test]
fn test_failure_without_message_uses_fallback() {
    let check = FakeCheck::new(FakeOutcome::Failure(None));
    let dispatcher = dispatcher_with(MetricKey::ProcNum, &check);

    let error = dispatcher.execute::<&str>("proc.num", &[]).unwrap_err();

    assert_eq!(error, DispatchError::CheckFailed(UNKNOWN_ERROR.to_string()));
    assert_eq!(error.to_string(), "Unknown error.");
}

#[test]
fn test_success_without_value_is_not_an_error() {
    let check = FakeCheck::new(FakeOutcome::NoValue);
    let dispatcher = dispatcher_with(MetricKey::SystemBoottime, &check);

    assert_eq!(dispatcher.execute::<&str>("system.boottime", &[]), Ok(None));
}

#[test]
fn test_numeric_values_are_converted_to_strings() {
    let check = FakeCheck::new(FakeOutcome::Value(ResultValue::Double(0.25)));
    let dispatcher = dispatcher_with(MetricKey::WebPagePerf, &check);

    assert_eq!(
        dispatcher.execute("web.page.perf", &["localhost"]),
        Ok(Some("0.250000".to_string()))
    );
}

#[test]
fn test_malformed_composite_key_never_reaches_check() {
    let check = FakeCheck::new(FakeOutcome::Value(ResultValue::Uint64(1)));
    let dispatcher = dispatcher_with(MetricKey::NetTcpPort, &check);

    // quoted because of the comma, the trailing backslash then escapes the closing quote
    let error = dispatcher.execute("net.tcp.port", &["a,b\\"]).unwrap_err();
    assert_eq!(error, DispatchError::InvalidKeyFormat);
    assert_eq!(error.to_string(), INVALID_KEY_FORMAT);

    for text in ["net.tcp.port[127.0.0.1,80", "net.tcp.port[a]b", r#"net.tcp.port["a"x]"#] {
        assert_eq!(
            dispatcher.execute_key(text),
            Err(DispatchError::InvalidKeyFormat),
            "{text}"
        );
    }
    assert_eq!(check.calls(), 0);
}

#[test]
fn test_repeated_calls_are_independent() {
    let check = FakeCheck::new(FakeOutcome::Value(ResultValue::Str("ok".to_string())));
    let dispatcher = dispatcher_with(MetricKey::NetDns, &check);

    let first = dispatcher.execute("net.dns", &["", "localhost"]);
    let second = dispatcher.execute("net.dns", &["", "localhost"]);

    assert_eq!(first, second);
    assert_eq!(check.calls(), 2);
}

#[test]
fn test_supported_keys_follow_registry() {
    let check = FakeCheck::new(FakeOutcome::NoValue);

    assert_eq!(
        dispatcher_with(MetricKey::NetTcpListen, &check).supported_keys(),
        vec![MetricKey::NetTcpListen]
    );
    assert_eq!(
        dispatcher_for_all(&check).supported_keys(),
        MetricKey::ALL.to_vec()
    );
}
