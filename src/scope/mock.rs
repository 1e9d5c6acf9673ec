//! Scripted in-memory transport for exercising the session without hardware

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::transport::{InstrumentLink, Transport};
use crate::error::ScopeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String),
    Write(String),
    Query(String),
    QueryBinary(String),
    Close,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<Call>,
    replies: HashMap<String, String>,
    blocks: HashMap<String, Vec<u8>>,
    fail_on: Option<String>,
    refuse_open: bool,
}

/// Cloneable handle; every clone shares the same script and call log.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Mock answering the identity query like a four-channel scope
    pub fn new() -> Self {
        Self::default().reply("*IDN?", "RIGOL TECHNOLOGIES,DS1104Z,DS1ZA000000001,00.04.04")
    }

    pub fn reply(self, query: &str, reply: &str) -> Self {
        self.lock().replies.insert(query.to_string(), reply.to_string());
        self
    }

    pub fn block(self, query: &str, payload: &[u8]) -> Self {
        self.lock().blocks.insert(query.to_string(), payload.to_vec());
        self
    }

    /// Fail with an I/O error when this exact command or query is sent
    pub fn fail_on(self, command: &str) -> Self {
        self.lock().fail_on = Some(command.to_string());
        self
    }

    pub fn refuse_open(self) -> Self {
        self.lock().refuse_open = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Commands and queries in the order they were sent
    pub fn sent(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Write(c) | Call::Query(c) | Call::QueryBinary(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: Call, command: &str) -> Result<(), ScopeError> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.fail_on.as_deref() == Some(command) {
            return Err(ScopeError::io(
                std::io::ErrorKind::BrokenPipe.into(),
                format!("Writing {command}"),
            ));
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    type Link = MockTransport;

    fn open(&mut self, resource: &str) -> Result<MockTransport, ScopeError> {
        let mut state = self.lock();
        state.calls.push(Call::Open(resource.to_string()));
        if state.refuse_open {
            return Err(ScopeError::Connection {
                resource: resource.to_string(),
                reason: "refused".to_string(),
            });
        }
        Ok(self.clone())
    }
}

impl InstrumentLink for MockTransport {
    fn write(&mut self, command: &str) -> Result<(), ScopeError> {
        self.record(Call::Write(command.to_string()), command)
    }

    fn query(&mut self, command: &str) -> Result<String, ScopeError> {
        self.record(Call::Query(command.to_string()), command)?;
        self.lock().replies.get(command).cloned().ok_or_else(|| {
            ScopeError::io(std::io::ErrorKind::TimedOut.into(), format!("No reply to {command}"))
        })
    }

    fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, ScopeError> {
        self.record(Call::QueryBinary(command.to_string()), command)?;
        self.lock().blocks.get(command).cloned().ok_or_else(|| {
            ScopeError::io(std::io::ErrorKind::TimedOut.into(), format!("No reply to {command}"))
        })
    }

    fn close(&mut self) -> Result<(), ScopeError> {
        self.lock().calls.push(Call::Close);
        Ok(())
    }
}
