//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! lock client behaves identically to the reference model.
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelClient     LockClient      Compare
//!      (reference)     (SimEnv)        results + session
//! ```

#![allow(clippy::unwrap_used)]

use distlock_client::{
    AuthState, ClientAction, ClientConfig, ClientError, LockClient, UnauthenticatedPolicy,
};
use distlock_core::{ConnectionEvent, TransportKind};
use distlock_harness::{
    ModelClient, NameInput, NamesInput, Operation, OperationResult, Rejection, SimEnv,
};
use proptest::prelude::*;

const VALID_FRAME: &str = r#"{"time":1704067200000,"status":"OK","message":"Acquired"}"#;
const INVALID_FRAME: &str = r#"{"status":"OK"}"#;

/// Real client wrapper that mirrors the model's interface.
struct RealClient {
    client: LockClient<SimEnv>,
}

impl RealClient {
    fn new(policy: UnauthenticatedPolicy) -> Self {
        let config = ClientConfig { unauthenticated: policy };
        Self { client: LockClient::new(SimEnv::new(), config) }
    }

    fn apply(&mut self, op: &Operation) -> OperationResult {
        let result = match *op {
            Operation::Identify(name) => self.client.identify(name.raw()),
            Operation::Deidentify => Ok(self.client.deidentify()),
            Operation::RequestLock(name) => self.client.request_lock(name.raw()),
            Operation::ReleaseLock(name) => self.client.release_lock(name.raw()),
            Operation::RequestLocks(names) => self.client.request_locks(names.raw()),
            Operation::ReleaseLocks(names) => self.client.release_locks(names.raw()),
            Operation::ChannelOpened => Ok(self
                .client
                .on_channel_event(ConnectionEvent::Opened { transport: TransportKind::WebSocket })),
            Operation::ChannelReconnecting => {
                Ok(self.client.on_channel_event(ConnectionEvent::Reconnecting))
            },
            Operation::ChannelClosed => Ok(self.client.on_channel_event(ConnectionEvent::Closed)),
            Operation::ChannelError { terminal } => {
                Ok(self.client.on_channel_event(ConnectionEvent::Error {
                    detail: "simulated".to_string(),
                    terminal,
                }))
            },
            Operation::Notification { valid } => {
                let raw = if valid { VALID_FRAME } else { INVALID_FRAME };
                Ok(self.client.on_notification(raw))
            },
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
                if sent.is_empty() {
                    OperationResult::NothingSent
                } else {
                    OperationResult::Sent(sent)
                }
            },
            Err(ClientError::InvalidInput { .. }) => {
                OperationResult::Rejected(Rejection::InvalidInput)
            },
            Err(ClientError::ChannelUnavailable { .. }) => {
                OperationResult::Rejected(Rejection::ChannelUnavailable)
            },
            Err(ClientError::NotAuthenticated) => {
                OperationResult::Rejected(Rejection::NotAuthenticated)
            },
            Err(other) => unreachable!("unexpected client error: {other}"),
        }
    }
}

fn name_strategy() -> impl Strategy<Value = NameInput> {
    prop_oneof![
        3 => Just(NameInput::Alice),
        2 => Just(NameInput::Bob),
        3 => Just(NameInput::Printer),
        1 => Just(NameInput::Blank),
        1 => Just(NameInput::Padded),
    ]
}

fn names_strategy() -> impl Strategy<Value = NamesInput> {
    prop_oneof![
        3 => Just(NamesInput::Single),
        3 => Just(NamesInput::Mixed),
        1 => Just(NamesInput::SeparatorsOnly),
        1 => Just(NamesInput::Empty),
    ]
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => name_strategy().prop_map(Operation::Identify),
        1 => Just(Operation::Deidentify),
        4 => name_strategy().prop_map(Operation::RequestLock),
        3 => name_strategy().prop_map(Operation::ReleaseLock),
        2 => names_strategy().prop_map(Operation::RequestLocks),
        2 => names_strategy().prop_map(Operation::ReleaseLocks),
        3 => Just(Operation::ChannelOpened),
        1 => Just(Operation::ChannelReconnecting),
        1 => Just(Operation::ChannelClosed),
        1 => any::<bool>().prop_map(|terminal| Operation::ChannelError { terminal }),
        2 => any::<bool>().prop_map(|valid| Operation::Notification { valid }),
    ]
}

fn policy_strategy() -> impl Strategy<Value = UnauthenticatedPolicy> {
    prop_oneof![Just(UnauthenticatedPolicy::Permit), Just(UnauthenticatedPolicy::Reject)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_model_matches_real(
        policy in policy_strategy(),
        ops in prop::collection::vec(operation_strategy(), 1..60),
    ) {
        let mut model = ModelClient::new(policy);
        let mut real = RealClient::new(policy);

        for (i, op) in ops.iter().enumerate() {
            let expected = model.apply(op);
            let actual = real.apply(op);
            prop_assert_eq!(&expected, &actual, "operation {} ({:?}) diverged", i, op);

            let session = real.client.session();
            prop_assert_eq!(session.identity().name(), model.identity());
            prop_assert_eq!(session.connection_state(), model.connection_state());
        }
    }

    #[test]
    fn prop_authenticated_iff_named(
        policy in policy_strategy(),
        ops in prop::collection::vec(operation_strategy(), 1..60),
    ) {
        let mut real = RealClient::new(policy);

        for op in &ops {
            real.apply(op);
            let session = real.client.session();
            let named = session.identity().name().is_some();
            prop_assert_eq!(session.auth_state() == AuthState::Authenticated, named);
        }
    }

    #[test]
    fn prop_notifications_never_change_session(
        ops in prop::collection::vec(operation_strategy(), 0..30),
        valid in any::<bool>(),
    ) {
        let mut real = RealClient::new(UnauthenticatedPolicy::Permit);
        for op in &ops {
            real.apply(op);
        }

        let before = real.client.session().clone();
        let raw = if valid { VALID_FRAME } else { INVALID_FRAME };
        let actions = real.client.on_notification(raw);

        prop_assert_eq!(real.client.session(), &before);
        prop_assert_eq!(actions.len(), if valid { 2 } else { 0 });
    }
}

#[test]
fn reject_policy_refuses_locks_before_identify() {
    let mut model = ModelClient::new(UnauthenticatedPolicy::Reject);
    let mut real = RealClient::new(UnauthenticatedPolicy::Reject);

    let script = [
        Operation::ChannelOpened,
        Operation::RequestLock(NameInput::Printer),
        Operation::Identify(NameInput::Alice),
        Operation::RequestLock(NameInput::Printer),
        Operation::RequestLocks(NamesInput::Mixed),
        Operation::ChannelClosed,
        Operation::RequestLock(NameInput::Printer),
    ];

    let results: Vec<OperationResult> = script.iter().map(|op| real.apply(op)).collect();
    let expected: Vec<OperationResult> = script.iter().map(|op| model.apply(op)).collect();
    assert_eq!(results, expected);

    assert_eq!(results[1], OperationResult::Rejected(Rejection::NotAuthenticated));
    assert_eq!(
        results[4],
        OperationResult::Sent(vec![r#"{"action":"mlock","params":["a","b","c","d"]}"#.to_string()])
    );
    assert_eq!(results[6], OperationResult::Rejected(Rejection::NotAuthenticated));
}

#[test]
fn resume_restores_identity_in_model_and_client() {
    let mut model = ModelClient::new(UnauthenticatedPolicy::Permit);
    let mut real = RealClient::new(UnauthenticatedPolicy::Permit);

    let script = [
        Operation::ChannelOpened,
        Operation::Identify(NameInput::Alice),
        Operation::ChannelReconnecting,
        Operation::RequestLock(NameInput::Printer),
        Operation::ChannelOpened,
        Operation::RequestLock(NameInput::Printer),
    ];

    let results: Vec<OperationResult> = script.iter().map(|op| real.apply(op)).collect();
    let expected: Vec<OperationResult> = script.iter().map(|op| model.apply(op)).collect();
    assert_eq!(results, expected);

    assert_eq!(results[3], OperationResult::Rejected(Rejection::ChannelUnavailable));
    assert_eq!(
        results[4],
        OperationResult::Sent(vec![r#"{"action":"connect","params":["alice"]}"#.to_string()])
    );
    assert_eq!(real.client.session().auth_state(), AuthState::Authenticated);
}
