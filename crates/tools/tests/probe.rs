//! Probing program handles with their own transport semantics

use async_trait::async_trait;
use harness_tools::{probe, ProbeError, ProgramHandle};
use serde_json::{json, Value};
use std::time::Duration;

/// Answers every call with a signature derived from the method name
struct LocalValidator;

#[async_trait]
impl ProgramHandle for LocalValidator {
    fn label(&self) -> &str {
        "hello"
    }

    async fn invoke(&self, method: &str, args: &[Value]) -> Result<String, ProbeError> {
        Ok(format!("{}-{}-sig", method, args.len()))
    }
}

/// Never answers; gives up after its own deadline
struct StalledNode {
    deadline: Duration,
}

#[async_trait]
impl ProgramHandle for StalledNode {
    fn label(&self) -> &str {
        "stalled"
    }

    async fn invoke(&self, _method: &str, _args: &[Value]) -> Result<String, ProbeError> {
        tokio::time::timeout(self.deadline, std::future::pending::<String>())
            .await
            .map_err(|_| ProbeError::Timeout)
    }
}

#[tokio::test]
async fn test_initialize_succeeds() {
    let result = probe(&LocalValidator, "initialize", &[]).await;

    assert!(result.success);
    assert_eq!(result.identifier.as_deref(), Some("initialize-0-sig"));
    assert_eq!(result.error, None);
}

#[tokio::test]
async fn test_arguments_reach_the_handle() {
    let args = [json!(42), json!("memo")];
    let result = probe(&LocalValidator, "transfer", &args).await;
    assert_eq!(result.into_result(), Ok("transfer-2-sig".to_string()));
}

#[tokio::test]
async fn test_initialize_times_out() {
    let handle = StalledNode {
        deadline: Duration::from_millis(20),
    };
    let result = probe(&handle, "initialize", &[]).await;

    assert!(!result.success);
    assert_eq!(result.identifier, None);
    assert_eq!(result.error, Some(ProbeError::Timeout));
}

#[tokio::test]
async fn test_independent_probes_do_not_affect_each_other() {
    let stalled = StalledNode {
        deadline: Duration::from_millis(10),
    };
    let handles: Vec<&dyn ProgramHandle> = vec![&stalled, &LocalValidator];

    let mut results = Vec::new();
    for handle in handles {
        results.push(probe(handle, "initialize", &[]).await);
    }

    assert!(!results[0].success);
    assert!(results[1].success);
}
