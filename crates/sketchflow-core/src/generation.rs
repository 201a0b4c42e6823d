//! Boundary to the diagram-generation backend.

use crate::model::{Edge, Node};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a generation round-trip.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation backend failed: {0}")]
    Backend(String),
    #[error("Malformed generation response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
}

impl GenerationRequest {
    /// `None` for a blank topic.
    pub fn new(topic: &str) -> Option<Self> {
        let topic = topic.trim();
        (!topic.is_empty()).then(|| Self {
            topic: topic.to_string(),
        })
    }
}

/// A complete diagram as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GenerationResponse {
    pub fn from_json(json: &str) -> Result<Self, GenerationError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, GenerationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Anything that can turn a topic into a diagram.
pub trait DiagramGenerator {
    fn generate(&mut self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError>;
}

impl<F> DiagramGenerator for F
where
    F: FnMut(&GenerationRequest) -> Result<GenerationResponse, GenerationError>,
{
    fn generate(&mut self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;

    #[test]
    fn test_blank_topic_has_no_request() {
        assert!(GenerationRequest::new("   ").is_none());
        assert_eq!(GenerationRequest::new(" ecommerce ").unwrap().topic, "ecommerce");
    }

    #[test]
    fn test_parse_backend_response() {
        let json = r#"{
            "nodes": [
                {"id": "1", "type": "circle", "position": {"x": 0, "y": 0}, "data": {"label": "User"}},
                {"id": "2", "type": "database", "position": {"x": 200, "y": 0}, "data": {"label": "DB"}}
            ],
            "edges": [
                {"id": "e1-2", "source": "1", "target": "2", "style": {"strokeDasharray": "5,5"}}
            ]
        }"#;
        let response = GenerationResponse::from_json(json).unwrap();
        assert_eq!(response.nodes.len(), 2);
        assert_eq!(response.nodes[0].kind, NodeKind::Actor);
        assert_eq!(response.nodes[1].kind, NodeKind::Store);
        assert!(response.edges[0].style.is_dashed());
    }

    #[test]
    fn test_malformed_response() {
        let err = GenerationResponse::from_json("{\"nodes\": 3}").unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }
}
