//! Checklist tool. Same shape as the comparison tool: validate required
//! fields, repackage as a typed payload.

use arbor_core::error::ToolError;
use arbor_core::tool::{Tool, ToolResult};
use async_trait::async_trait;

pub struct CreateChecklistTool;

const REQUIRED_FIELDS: &[&str] = &["title", "items"];

#[async_trait]
impl Tool for CreateChecklistTool {
    fn name(&self) -> &str {
        "create_checklist"
    }

    fn description(&self) -> &str {
        "Present an actionable checklist of steps or items. Use when the user \
         asks for a plan, packing list, or step-by-step preparation."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Title of the checklist"
                },
                "items": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Checklist entries in order"
                }
            },
            "required": ["title", "items"]
        })
    }

    async fn execute(
        &self,
        args: &serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| args.get(field).is_none())
            .collect();
        if !missing.is_empty() {
            return Ok(ToolResult::error(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        Ok(ToolResult::ok(serde_json::json!({
            "type": "checklist",
            "title": args["title"],
            "items": args["items"],
        })))
    }
}
