//! # Poll Command
//!
//! One-shot read of each requested pid, printed to the terminal.
//!
//! Uses the same [`EcuPoller`] as the monitor command but with no
//! interval, which means poll-and-resolve instead of continuous emission.

use std::sync::Arc;

use crate::error::Result;
use crate::pids::{self, PidDescriptor};
use crate::poller::EcuPoller;
use crate::transport::Transport;

/// Resolve the pids, connect, poll each once and print the results
pub async fn run(tokens: &[String], transport: Arc<dyn Transport>) -> Result<()> {
    let pids: Vec<&'static PidDescriptor> = tokens
        .iter()
        .map(|token| pids::resolve(token))
        .collect::<Result<_>>()?;

    transport.connect().await?;

    println!("\nResults:\n");

    for pid in pids {
        let poller = EcuPoller::new(pid, None, Arc::clone(&transport));
        let event = poller.poll_once().await?;

        match &event.unit {
            Some(unit) => println!("{}: {} {}", event.name, event.value, unit),
            None => println!("{}: {}", event.name, event.value),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ObdError;
    use crate::transport::mocks::MockTransport;

    #[tokio::test]
    async fn test_poll_connects_and_queries_each_pid_once() {
        let transport = Arc::new(MockTransport::new());
        let tokens = vec!["0C".to_string(), "Fuel Level Input".to_string()];

        run(&tokens, transport.clone()).await.unwrap();

        assert!(transport.connected.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(transport.query_count(), 2);
    }

    #[tokio::test]
    async fn test_poll_rejects_unknown_pid_before_connecting() {
        let transport = Arc::new(MockTransport::new());
        let tokens = vec!["0C".to_string(), "bogus".to_string()];

        match run(&tokens, transport.clone()).await {
            Err(ObdError::UnknownPid(token)) => assert_eq!(token, "bogus"),
            other => panic!("Expected UnknownPid, got {:?}", other),
        }
        assert!(!transport.connected.load(std::sync::atomic::Ordering::SeqCst));
    }
}
