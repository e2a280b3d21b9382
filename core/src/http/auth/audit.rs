//! Audit logging for authentication events.
//!
//! Responses to failed verification are deliberately generic; the audit log
//! is where the distinguishing detail (unknown account vs. bad credential,
//! backend causes, impersonation denials) is recorded.
//!
//! Events raised while serving one request are accumulated on the
//! per-request session and flushed by the middleware when the request
//! finishes; nothing here has ambient lifetime tied to a thread.

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

// =============================================================================
// Events
// =============================================================================

/// Authentication event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthEventType {
    /// A credential verified successfully.
    AuthenticationSuccess,
    /// A credential was presented and rejected.
    AuthenticationFailure,
    /// A session record was created by login.
    SessionCreated,
    /// A session record was destroyed by logout or re-login.
    SessionDestroyed,
    /// A session record was reissued with a fresh expiry.
    SessionRefreshed,
    /// A cookie resolved to an inactive account and was discarded.
    InactiveAccount,
    /// A CSRF header was present but did not match the session secret.
    CsrfRejected,
    /// A run-as header rebound the request identity.
    ImpersonationUsed,
    /// A run-as header was refused.
    ImpersonationDenied,
}

impl fmt::Display for AuthEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthEventType::AuthenticationSuccess => "AUTHENTICATION_SUCCESS",
            AuthEventType::AuthenticationFailure => "AUTHENTICATION_FAILURE",
            AuthEventType::SessionCreated => "SESSION_CREATED",
            AuthEventType::SessionDestroyed => "SESSION_DESTROYED",
            AuthEventType::SessionRefreshed => "SESSION_REFRESHED",
            AuthEventType::InactiveAccount => "INACTIVE_ACCOUNT",
            AuthEventType::CsrfRejected => "CSRF_REJECTED",
            AuthEventType::ImpersonationUsed => "IMPERSONATION_USED",
            AuthEventType::ImpersonationDenied => "IMPERSONATION_DENIED",
        };
        f.write_str(name)
    }
}

/// One authentication event.
#[derive(Debug, Clone, Serialize)]
pub struct AuthEvent {
    pub event_type: AuthEventType,
    /// Account or username the event concerns, when known.
    pub principal: Option<String>,
    /// Free-form detail. This is the only place enumeration-sensitive
    /// detail may appear.
    pub detail: Option<String>,
    /// Seconds since the UNIX epoch.
    pub timestamp: u64,
}

impl AuthEvent {
    pub fn new(event_type: AuthEventType) -> Self {
        AuthEvent {
            event_type,
            principal: None,
            detail: None,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    pub fn principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn publish(&self, event: &AuthEvent);
}

/// Writes one JSON line per event to stdout.
#[derive(Default)]
pub struct StdoutSink;

impl AuditSink for StdoutSink {
    fn publish(&self, event: &AuthEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(_) => println!("{} {:?}", event.event_type, event.principal),
        }
    }
}

/// Retains events in memory; used by tests to assert on logged detail.
#[derive(Default)]
pub struct MemorySink {
    events: RwLock<Vec<AuthEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<AuthEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, event_type: AuthEventType) -> usize {
        self.snapshot()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl AuditSink for MemorySink {
    fn publish(&self, event: &AuthEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event.clone());
        }
    }
}

// =============================================================================
// Log
// =============================================================================

/// Fan-out of audit events to configured sinks.
#[derive(Clone, Default)]
pub struct AuditLog {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl AuditLog {
    /// A log with no sinks; events are dropped.
    pub fn new() -> Self {
        Self::default()
    }

    /// A log writing JSON lines to stdout.
    pub fn stdout() -> Self {
        Self::new().with_sink(Arc::new(StdoutSink))
    }

    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn publish(&self, event: &AuthEvent) {
        for sink in &self.sinks {
            sink.publish(event);
        }
    }

    pub fn publish_all<'a>(&self, events: impl IntoIterator<Item = &'a AuthEvent>) {
        for event in events {
            self.publish(event);
        }
    }
}
