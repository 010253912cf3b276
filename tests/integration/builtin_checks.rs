//! Built-in checks run through the dispatcher
//!
//! Network checks only talk to sockets opened by the tests themselves.

use std::io::Write;
use std::net::TcpListener;
use std::thread;

use itemcheck::{CheckRegistry, DispatchError, Dispatcher, config::AgentConfig};
use regex::Regex;

use crate::helpers::*;

#[test]
fn test_tcp_port_open() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port().to_string();

    let value = builtin_dispatcher()
        .execute("net.tcp.port", &["127.0.0.1", port.as_str()])
        .unwrap();

    assert_eq!(value.as_deref(), Some("1"));
}

#[test]
fn test_zero_timeout_config_is_rejected() {
    let config = AgentConfig {
        timeout: 0,
        ..AgentConfig::default()
    };

    assert!(Dispatcher::from_config(&config).is_err());
}

#[test]
fn test_zero_timeout_registry_still_sees_open_port() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port().to_string();
    let config = AgentConfig {
        timeout: 0,
        ..AgentConfig::default()
    };
    let dispatcher = Dispatcher::new(CheckRegistry::builtin(&config));

    let value = dispatcher
        .execute("net.tcp.port", &["127.0.0.1", port.as_str()])
        .unwrap();

    assert_eq!(value.as_deref(), Some("1"));
}

#[test]
fn test_tcp_port_closed() {
    let port = closed_port().to_string();

    let value = builtin_dispatcher()
        .execute("net.tcp.port", &["", port.as_str()])
        .unwrap();

    assert_eq!(value.as_deref(), Some("0"));
}

#[test]
fn test_tcp_port_requires_port() {
    assert_eq!(
        builtin_dispatcher().execute("net.tcp.port", &["127.0.0.1"]),
        Err(DispatchError::CheckFailed("Invalid second parameter.".to_string()))
    );
    assert_eq!(
        builtin_dispatcher().execute_key("net.tcp.port[127.0.0.1,http]"),
        Err(DispatchError::CheckFailed("Invalid second parameter.".to_string()))
    );
}

#[test]
fn test_tcp_service_with_greeting() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let _ = stream.write_all(b"220 ftp ready\r\n");
        }
    });

    let value = builtin_dispatcher()
        .execute_key(&format!("net.tcp.service[ftp,127.0.0.1,{port}]"))
        .unwrap();

    assert_eq!(value.as_deref(), Some("1"));
}

#[test]
fn test_tcp_service_down() {
    let port = closed_port().to_string();
    let dispatcher = builtin_dispatcher();

    assert_eq!(
        dispatcher
            .execute("net.tcp.service", &["tcp", "127.0.0.1", port.as_str()])
            .unwrap()
            .as_deref(),
        Some("0")
    );
    assert_eq!(
        dispatcher
            .execute("net.tcp.service.perf", &["tcp", "127.0.0.1", port.as_str()])
            .unwrap()
            .as_deref(),
        Some("0.000000")
    );
}

#[test]
fn test_localtime_formats() {
    let dispatcher = builtin_dispatcher();

    let utc = dispatcher.execute::<&str>("system.localtime", &[]).unwrap().unwrap();
    assert!(utc.parse::<u64>().unwrap() > 1_600_000_000);

    let local = dispatcher.execute("system.localtime", &["local"]).unwrap().unwrap();
    let format = Regex::new(r"^\d{4}-\d{2}-\d{2},\d{2}:\d{2}:\d{2}\.\d{3},[+-]\d{2}:\d{2}$").unwrap();
    assert!(format.is_match(&local), "{local}");
}

#[test]
fn test_boottime_is_in_the_past() {
    let boot_time = builtin_dispatcher()
        .execute::<&str>("system.boottime", &[])
        .unwrap()
        .unwrap()
        .parse::<u64>()
        .unwrap();
    let now = chrono::Utc::now().timestamp() as u64;

    assert!(boot_time > 0 && boot_time <= now);
}

#[test]
fn test_proc_num_with_state_filter() {
    let dispatcher = builtin_dispatcher();

    let all = dispatcher.execute("proc.num", &["", "", "all"]).unwrap().unwrap();
    let zombies = dispatcher.execute("proc.num", &["", "", "zomb"]).unwrap().unwrap();

    assert!(all.parse::<u64>().unwrap() >= zombies.parse::<u64>().unwrap());
}

#[test]
fn test_proc_mem_avg_is_double() {
    let value = builtin_dispatcher()
        .execute("proc.mem", &["", "", "avg", "", "rss"])
        .unwrap()
        .unwrap();

    assert!(value.contains('.'), "{value}");
}

#[test]
fn test_unknown_user_is_an_error() {
    let error = builtin_dispatcher()
        .execute("proc.num", &["", "no-such-user-for-itemcheck"])
        .unwrap_err();

    assert!(error.to_string().starts_with("Cannot obtain user information"));
}
