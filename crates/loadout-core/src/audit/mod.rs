//! Structured audit events emitted by handlers for every write and removal.
//!
//! The core only depends on [`AuditSink`]; how events are displayed or stored
//! is up to the frontend.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::agent::Agent;
use crate::resource::ResourceType;
use crate::types::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Install,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    /// Tolerated failure (forced remove).
    Warning,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    pub resource_name: String,
    pub resource_type: ResourceType,
    pub target_path: PathBuf,
    pub agent: Agent,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        outcome: AuditOutcome,
        resource_type: ResourceType,
        resource_name: impl Into<String>,
        agent: Agent,
        scope: Scope,
        target_path: PathBuf,
    ) -> Self {
        Self {
            action,
            outcome,
            resource_name: resource_name.into(),
            resource_type,
            target_path,
            agent,
            scope,
            metadata: Map::new(),
            message: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn emit(self, sink: &dyn AuditSink) {
        sink.record(self);
    }
}

/// Receiver of audit events.
pub trait AuditSink: Send + Sync + std::fmt::Debug {
    fn record(&self, event: AuditEvent);
}

/// Emits events as `tracing` events on target `loadout::audit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let metadata = Value::Object(event.metadata.clone());
        match event.outcome {
            AuditOutcome::Success => info!(
                target: "loadout::audit",
                action = ?event.action,
                resource_type = %event.resource_type,
                name = %event.resource_name,
                agent = %event.agent,
                scope = %event.scope,
                path = %event.target_path.display(),
                metadata = %metadata,
                "resource {:?}", event.action
            ),
            AuditOutcome::Warning | AuditOutcome::Failure => warn!(
                target: "loadout::audit",
                action = ?event.action,
                outcome = ?event.outcome,
                resource_type = %event.resource_type,
                name = %event.resource_name,
                agent = %event.agent,
                scope = %event.scope,
                path = %event.target_path.display(),
                detail = event.message.as_deref().unwrap_or(""),
                "resource {:?} did not complete", event.action
            ),
        }
    }
}

/// Collects events in memory. Used by tests and by callers that render a
/// summary after the command finishes.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn with_outcome(&self, outcome: AuditOutcome) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.outcome == outcome)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Shared handle passed to handlers.
pub type SharedAuditSink = Arc<dyn AuditSink>;

/// Fans out to several sinks.
#[derive(Debug, Default, Clone)]
pub struct FanoutAuditSink {
    sinks: Vec<SharedAuditSink>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<SharedAuditSink>) -> Self {
        Self { sinks }
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, event: AuditEvent) {
        for sink in &self.sinks {
            sink.record(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(outcome: AuditOutcome) -> AuditEvent {
        AuditEvent::new(
            AuditAction::Install,
            outcome,
            ResourceType::Hook,
            "fmt",
            Agent::ClaudeCode,
            Scope::Project,
            PathBuf::from("/p/.claude/hooks/fmt.json"),
        )
    }

    #[test]
    fn memory_sink_collects_and_filters() {
        let sink = MemoryAuditSink::new();
        sink.record(event(AuditOutcome::Success));
        sink.record(event(AuditOutcome::Warning));

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.with_outcome(AuditOutcome::Warning).len(), 1);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = MemoryAuditSink::new();
        let b = MemoryAuditSink::new();
        let fanout = FanoutAuditSink::new(vec![Arc::new(a.clone()), Arc::new(b.clone())]);

        fanout.record(event(AuditOutcome::Success));

        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events().len(), 1);
    }

    #[test]
    fn event_serializes_camel_case() {
        let json = serde_json::to_value(event(AuditOutcome::Success)).expect("serialize");
        assert_eq!(json["resourceName"], "fmt");
        assert_eq!(json["resourceType"], "hook");
        assert_eq!(json["outcome"], "success");
    }
}
