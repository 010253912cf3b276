//! Concurrent use of a shared dispatcher
//!
//! The registry is read-only and every call owns its scratch state, so a
//! dispatcher can be shared across threads without locking.

use std::sync::Arc;
use std::thread;

use itemcheck::{MetricKey, agent::ResultValue};

use crate::helpers::*;

#[test]
fn test_shared_dispatcher_across_threads() {
    let check = FakeCheck::new(FakeOutcome::Value(ResultValue::Uint64(7)));
    let dispatcher = Arc::new(dispatcher_with(MetricKey::NetTcpPort, &check));

    let handles = (0..8)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                let port = (8000 + i).to_string();
                (0..25)
                    .map(|_| dispatcher.execute("net.tcp.port", &["127.0.0.1", port.as_str()]))
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        for outcome in handle.join().unwrap() {
            assert_eq!(outcome, Ok(Some("7".to_string())));
        }
    }
    assert_eq!(check.calls(), 8 * 25);
}

#[tokio::test]
async fn test_concurrent_blocking_dispatch() {
    let dispatcher = Arc::new(builtin_dispatcher());

    let tasks = (0..4)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::task::spawn_blocking(move || {
                dispatcher.execute::<&str>("system.localtime", &[])
            })
        })
        .collect::<Vec<_>>();

    for task in tasks {
        let value = task.await.unwrap().unwrap().unwrap();
        assert!(value.parse::<u64>().is_ok());
    }
}
