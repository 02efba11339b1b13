use std::fmt;
use uuid::Uuid;

/// The ordered identifier set threaded through every orchestrator operation for
/// observability: flow, workflow, correlation, step, processor, publish, execution.
///
/// Fields are optional because a context is built up incrementally as it is passed
/// down through the call stack (the API layer knows the flow id before the step id
/// is known, the dispatcher mints a publish id the traversal engine never needed, …).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HierarchicalContext {
    pub orchestrated_flow_id: Option<Uuid>,
    pub workflow_id: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
    pub step_id: Option<Uuid>,
    pub processor_id: Option<Uuid>,
    pub publish_id: Option<Uuid>,
    pub execution_id: Option<Uuid>,
}

impl HierarchicalContext {
    pub fn root(orchestrated_flow_id: Uuid) -> Self {
        Self {
            orchestrated_flow_id: Some(orchestrated_flow_id),
            ..Default::default()
        }
    }

    /// Returns the context's correlation id, minting a fresh one only if none is
    /// already carried. Per the scheduler contract, an inherited correlation id must
    /// never be replaced.
    pub fn correlation_id_or_mint(&self) -> Uuid {
        self.correlation_id.unwrap_or_else(Uuid::new_v4)
    }

    pub fn with_workflow(mut self, workflow_id: Uuid) -> Self {
        self.workflow_id = Some(workflow_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_step(mut self, step_id: Uuid) -> Self {
        self.step_id = Some(step_id);
        self
    }

    pub fn with_processor(mut self, processor_id: Uuid) -> Self {
        self.processor_id = Some(processor_id);
        self
    }

    /// `publish_id` is minted per published command, never inherited.
    pub fn with_fresh_publish(mut self) -> Self {
        self.publish_id = Some(Uuid::new_v4());
        self
    }

    /// `execution_id` is minted per successor firing; entry-point commands keep the
    /// zero value instead of calling this.
    pub fn with_fresh_execution(mut self) -> Self {
        self.execution_id = Some(Uuid::new_v4());
        self
    }
}

impl fmt::Display for HierarchicalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(v) = self.orchestrated_flow_id {
            parts.push(format!("flow={v}"));
        }
        if let Some(v) = self.workflow_id {
            parts.push(format!("workflow={v}"));
        }
        if let Some(v) = self.correlation_id {
            parts.push(format!("correlation={v}"));
        }
        if let Some(v) = self.step_id {
            parts.push(format!("step={v}"));
        }
        if let Some(v) = self.processor_id {
            parts.push(format!("processor={v}"));
        }
        if let Some(v) = self.publish_id {
            parts.push(format!("publish={v}"));
        }
        if let Some(v) = self.execution_id {
            parts.push(format!("execution={v}"));
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// Opens a `tracing::info_span!` carrying whichever hierarchical-context fields are
/// present, mirroring the fields every component-level log call attaches.
#[macro_export]
macro_rules! context_span {
    ($name:expr, $ctx:expr) => {
        tracing::info_span!(
            $name,
            orchestrated_flow_id = $ctx.orchestrated_flow_id.map(|v| v.to_string()),
            workflow_id = $ctx.workflow_id.map(|v| v.to_string()),
            correlation_id = $ctx.correlation_id.map(|v| v.to_string()),
            step_id = $ctx.step_id.map(|v| v.to_string()),
            processor_id = $ctx.processor_id.map(|v| v.to_string()),
            publish_id = $ctx.publish_id.map(|v| v.to_string()),
            execution_id = $ctx.execution_id.map(|v| v.to_string()),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_is_preserved_when_present() {
        let correlation = Uuid::new_v4();
        let ctx = HierarchicalContext::root(Uuid::new_v4()).with_correlation(correlation);
        assert_eq!(ctx.correlation_id_or_mint(), correlation);
    }

    #[test]
    fn correlation_is_minted_only_when_absent() {
        let ctx = HierarchicalContext::root(Uuid::new_v4());
        assert!(ctx.correlation_id.is_none());
        assert_ne!(ctx.correlation_id_or_mint(), Uuid::nil());
    }

    #[test]
    fn execution_id_defaults_to_none_for_entry_points() {
        let ctx = HierarchicalContext::root(Uuid::new_v4());
        assert_eq!(ctx.execution_id, None);
    }
}
