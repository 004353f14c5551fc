//! JSON schema of the extraction payload, sent as the structured-output
//! contract of every extraction request.
//!
//! Strict mode requires every declared property to be listed in `required`
//! and `additionalProperties: false` on every object; optional values are
//! therefore expressed as nullable types.

use serde_json::{Value, json};

/// Schema name reported to the provider.
pub const SCHEMA_NAME: &str = "tapestry_extraction";

fn edge_schema(predicate_hint: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "sourceLabel": { "type": "string", "description": "The name of the starting node" },
            "targetLabel": { "type": "string", "description": "The name of the ending node" },
            "predicate": { "type": "string", "description": predicate_hint }
        },
        "required": ["sourceLabel", "targetLabel", "predicate"],
        "additionalProperties": false
    })
}

fn node_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "label": { "type": "string", "description": "The name of the entity" },
            "type": { "type": "string", "enum": ["Person", "Place", "Thing", "Event"] },
            "description": {
                "type": ["string", "null"],
                "description": "A brief summary of the entity"
            },
            "attributes": {
                "type": "object",
                "properties": {
                    "coordinates": {
                        "anyOf": [
                            {
                                "type": "object",
                                "properties": {
                                    "x": { "type": "number" },
                                    "y": { "type": "number" }
                                },
                                "required": ["x", "y"],
                                "additionalProperties": false
                            },
                            { "type": "null" }
                        ],
                        "description": "Coordinates if the entity is a location"
                    },
                    "timestamp": {
                        "type": ["string", "null"],
                        "description": "Date or time if the entity is an event"
                    },
                    "locationType": {
                        "type": ["string", "null"],
                        "description": "e.g., 'city', 'mountain'"
                    },
                    "extraInfo": {
                        "type": ["string", "null"],
                        "description": "Any other notable details"
                    }
                },
                "required": ["coordinates", "timestamp", "locationType", "extraInfo"],
                "additionalProperties": false
            }
        },
        "required": ["label", "type", "description", "attributes"],
        "additionalProperties": false
    })
}

/// The full payload schema.
pub fn extraction_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "extractedNodes": { "type": "array", "items": node_schema() },
            "extractedEdges": {
                "type": "array",
                "items": edge_schema("The relationship verb, e.g., 'SPOUSE_OF'. Do NOT use 'NOT_' prefix.")
            },
            "edgesToRemove": {
                "type": "array",
                "items": edge_schema("The relationship verb of the edge to delete, e.g., 'SPOUSE_OF'."),
                "description": "Edges that should be deleted based on the user's request (e.g., 'X is not Y')"
            },
            "suggestedFollowUp": {
                "type": "string",
                "description": "A question to ask the user to gather more information about the graph from them."
            }
        },
        "required": ["extractedNodes", "extractedEdges", "edgesToRemove", "suggestedFollowUp"],
        "additionalProperties": false
    })
}
