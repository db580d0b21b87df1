//! Installation of the flow rule that realizes an action
//!
//! Installs are not transactional and never retried: a rejection usually
//! means the topology view is stale, so the caller has to re-observe.

use crate::controller::{FlowController, FlowTemplate};
use crate::error::Result;
use crate::models::Action;
use std::sync::Arc;
use tracing::warn;

/// Applies actions through the controller
pub struct ActionExecutor {
    controller: Arc<dyn FlowController>,
    template: FlowTemplate,
}

impl ActionExecutor {
    pub fn new(controller: Arc<dyn FlowController>, template: FlowTemplate) -> Self {
        Self {
            controller,
            template,
        }
    }

    /// Render `action` for `device_id` and submit it once
    pub async fn apply(&self, action: &Action, device_id: &str) -> Result<()> {
        let rule = self.template.render(action, device_id);
        let result = self.controller.install_flow(device_id, &rule).await;

        if let Err(e) = &result {
            warn!(
                device_id = %device_id,
                action = %action,
                error = %e,
                "Flow install failed"
            );
        }
        result
    }
}
