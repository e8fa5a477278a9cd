//! Fuzz target comparing the lock client against its reference model
//!
//! # Invariants
//!
//! - The client sends exactly what the model sends, or refuses for the same
//!   reason
//! - Identity and mirrored channel state always match the model
//! - Authenticated if and only if an identity is held

#![no_main]

use distlock_client::{
    AuthState, ClientAction, ClientConfig, ClientError, LockClient, UnauthenticatedPolicy,
};
use distlock_core::{ConnectionEvent, TransportKind};
use distlock_harness::{ModelClient, Operation, OperationResult, Rejection, SimEnv};
use libfuzzer_sys::fuzz_target;

fn apply(client: &mut LockClient<SimEnv>, op: &Operation) -> OperationResult {
    let result = match *op {
        Operation::Identify(name) => client.identify(name.raw()),
        Operation::Deidentify => Ok(client.deidentify()),
        Operation::RequestLock(name) => client.request_lock(name.raw()),
        Operation::ReleaseLock(name) => client.release_lock(name.raw()),
        Operation::RequestLocks(names) => client.request_locks(names.raw()),
        Operation::ReleaseLocks(names) => client.release_locks(names.raw()),
        Operation::ChannelOpened => {
            Ok(client.on_channel_event(ConnectionEvent::Opened { transport: TransportKind::WebSocket }))
        },
        Operation::ChannelReconnecting => Ok(client.on_channel_event(ConnectionEvent::Reconnecting)),
        Operation::ChannelClosed => Ok(client.on_channel_event(ConnectionEvent::Closed)),
        Operation::ChannelError { terminal } => Ok(client.on_channel_event(ConnectionEvent::Error {
            detail: "fuzz".to_string(),
            terminal,
        })),
        Operation::Notification { valid } => Ok(client.on_notification(if valid {
            r#"{"time":0,"status":"OK","message":"Acquired"}"#
        } else {
            "{"
        })),
    };

    match result {
        Ok(actions) => {
            let sent: Vec<String> = actions
                .into_iter()
                .filter_map(|action| match action {
                    ClientAction::Send { payload, .. } => Some(payload),
                    _ => None,
                })
                .collect();
            if sent.is_empty() { OperationResult::NothingSent } else { OperationResult::Sent(sent) }
        },
        Err(ClientError::InvalidInput { .. }) => OperationResult::Rejected(Rejection::InvalidInput),
        Err(ClientError::ChannelUnavailable { .. }) => {
            OperationResult::Rejected(Rejection::ChannelUnavailable)
        },
        Err(ClientError::NotAuthenticated) => OperationResult::Rejected(Rejection::NotAuthenticated),
        Err(other) => panic!("unexpected client error: {other}"),
    }
}

fuzz_target!(|input: (bool, Vec<Operation>)| {
    let (reject, ops) = input;
    let policy = if reject { UnauthenticatedPolicy::Reject } else { UnauthenticatedPolicy::Permit };

    let mut model = ModelClient::new(policy);
    let mut client = LockClient::new(SimEnv::new(), ClientConfig { unauthenticated: policy });

    for op in &ops {
        assert_eq!(apply(&mut client, op), model.apply(op), "diverged on {op:?}");

        let session = client.session();
        assert_eq!(session.identity().name(), model.identity());
        assert_eq!(session.connection_state(), model.connection_state());
        assert_eq!(session.auth_state() == AuthState::Authenticated, model.identity().is_some());
    }
});
