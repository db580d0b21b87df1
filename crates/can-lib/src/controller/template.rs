//! Flow-rule template for installing rewritten flows
//!
//! The controller only accepts a rule with one OUTPUT instruction and the
//! IN_PORT, ETH_DST and ETH_SRC criteria in that order. The template is
//! validated once at load and then field-substituted per action.

use crate::error::{QosError, Result};
use crate::models::Action;
use serde_json::Value;
use std::path::Path;

/// Embedded default template
pub const DEFAULT_FLOW_TEMPLATE: &str = r#"{
  "priority": 40000,
  "timeout": 0,
  "isPermanent": true,
  "deviceId": "",
  "treatment": {
    "instructions": [
      { "type": "OUTPUT", "port": "" }
    ]
  },
  "selector": {
    "criteria": [
      { "type": "IN_PORT", "port": "" },
      { "type": "ETH_DST", "mac": "" },
      { "type": "ETH_SRC", "mac": "" }
    ]
  }
}"#;

const EXPECTED_CRITERIA: [&str; 3] = ["IN_PORT", "ETH_DST", "ETH_SRC"];

/// A validated flow-rule document
#[derive(Debug, Clone, PartialEq)]
pub struct FlowTemplate {
    document: Value,
}

impl FlowTemplate {
    /// Parse and validate a template document
    pub fn parse(json: &str) -> Result<Self> {
        let document: Value =
            serde_json::from_str(json).map_err(|e| QosError::malformed("flow_template", e))?;
        validate(&document)?;
        Ok(Self { document })
    }

    /// Load a template from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            QosError::malformed(
                "flow_template",
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;
        Self::parse(&json)
    }

    /// Render the rule realizing `action` on `device_id`
    pub fn render(&self, action: &Action, device_id: &str) -> Value {
        let mut rule = self.document.clone();
        rule["deviceId"] = Value::from(device_id);
        rule["treatment"]["instructions"][0]["port"] =
            Value::from(action.candidate_out_port.as_str());
        rule["selector"]["criteria"][0]["port"] = Value::from(action.in_port.as_str());
        rule["selector"]["criteria"][1]["mac"] = Value::from(action.eth_dst.as_str());
        rule["selector"]["criteria"][2]["mac"] = Value::from(action.eth_src.as_str());
        rule
    }
}

impl Default for FlowTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_FLOW_TEMPLATE).unwrap_or_else(|e| {
            unreachable!("embedded flow template is invalid: {}", e)
        })
    }
}

fn validate(document: &Value) -> Result<()> {
    let invalid = |reason: &str| QosError::malformed("flow_template", reason);

    if !document.is_object() {
        return Err(invalid("template is not an object"));
    }

    let instructions = document["treatment"]["instructions"]
        .as_array()
        .ok_or_else(|| invalid("missing treatment.instructions"))?;
    if instructions.len() != 1 || instructions[0]["type"] != "OUTPUT" {
        return Err(invalid("expected exactly one OUTPUT instruction"));
    }

    let criteria = document["selector"]["criteria"]
        .as_array()
        .ok_or_else(|| invalid("missing selector.criteria"))?;
    let kinds: Vec<&str> = criteria
        .iter()
        .map(|c| c["type"].as_str().unwrap_or_default())
        .collect();
    if kinds != EXPECTED_CRITERIA {
        return Err(invalid("expected IN_PORT, ETH_DST, ETH_SRC criteria"));
    }

    Ok(())
}
