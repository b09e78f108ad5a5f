//! Comparison table tool.
//!
//! A pure transformation: the model supplies the table, the tool validates
//! and repackages it as a typed payload for rendering. Missing fields come
//! back as an error-flagged result naming exactly what was absent, so the
//! model can retry with a corrected call.

use arbor_core::error::ToolError;
use arbor_core::tool::{Tool, ToolResult};
use async_trait::async_trait;

pub struct CompareItemsTool;

const REQUIRED_FIELDS: &[&str] = &["title", "columns", "rows"];

#[async_trait]
impl Tool for CompareItemsTool {
    fn name(&self) -> &str {
        "compare_items"
    }

    fn description(&self) -> &str {
        "Present a side-by-side comparison of two or more items as a table. \
         Use when the user asks to compare options, products, or approaches."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Title of the comparison"
                },
                "columns": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Column headers; the first names the compared attribute"
                },
                "rows": {
                    "type": "array",
                    "items": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "description": "Table rows, each with one cell per column"
                },
                "recommendation": {
                    "type": "string",
                    "description": "Optional bottom-line recommendation"
                }
            },
            "required": ["title", "columns", "rows"]
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
            "type": "comparison",
            "title": args["title"],
            "columns": args["columns"],
            "rows": args["rows"],
            "recommendation": args.get("recommendation").cloned().unwrap_or(serde_json::Value::Null),
        })))
    }
}
