use serde::{Deserialize, Serialize};

/// A single candidate from one ranker.
///
/// Scores are ranker-local and never comparable across rankers: the dense
/// ranker reports cosine similarity in [-1, 1], the sparse ranker reports
/// unbounded BM25 relevance. Within one ranker's output, hits are sorted by
/// descending score with stable ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub id: String,
    pub score: f32,
}

impl RankedHit {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Where a fused result came from: its 1-based rank in each ranker's
/// candidate list. A rank is absent (not a sentinel) when the document never
/// appeared in that ranker's list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dense_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse_rank: Option<usize>,
}

/// One entry of a fused ranking. `fused_score` is monotonically
/// non-increasing across a returned sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub id: String,
    pub fused_score: f32,
    pub provenance: Provenance,
}

/// A document as owned by the document store. The engine only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn default_k() -> usize {
    5
}

/// The external search request shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Opaque experiment tag, passed through untouched by ranking logic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

/// A fully hydrated search result with fusion score and per-source
/// provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub score: f32,
    pub source_scores: Provenance,
}

/// The external search response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_k_defaults_to_five() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"query": "hello"}"#).unwrap();
        assert_eq!(req.k, 5);
        assert!(req.profile.is_none());
    }

    #[test]
    fn request_profile_is_passed_through() {
        let req: SearchRequest = serde_json::from_str(
            r#"{"query": "hello", "k": 2, "profile": "attack-baseline"}"#,
        )
        .unwrap();
        assert_eq!(req.k, 2);
        assert_eq!(req.profile.as_deref(), Some("attack-baseline"));
    }

    #[test]
    fn absent_ranks_are_omitted_from_json() {
        let provenance = Provenance {
            dense_rank: Some(3),
            sparse_rank: None,
        };
        let json = serde_json::to_string(&provenance).unwrap();
        assert_eq!(json, r#"{"dense_rank":3}"#);
    }

    #[test]
    fn document_metadata_defaults_to_null() {
        let doc: Document =
            serde_json::from_str(r#"{"id": "a", "content": "text"}"#).unwrap();
        assert!(doc.metadata.is_null());
    }
}
