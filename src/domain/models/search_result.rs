use serde::{Deserialize, Serialize};

use super::{Chunk, Language};

/// Score cutoffs for mapping a raw similarity score to a relevance bucket.
/// Exposed through configuration rather than hard-coded in the store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceThresholds {
    pub highly_relevant: f32,
    pub relevant: f32,
    pub loosely_related: f32,
}

impl Default for RelevanceThresholds {
    fn default() -> Self {
        Self {
            highly_relevant: 0.8,
            relevant: 0.6,
            loosely_related: 0.4,
        }
    }
}

/// Coarse classification of a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    HighlyRelevant,
    Relevant,
    LooselyRelated,
    NotRelevant,
}

impl Relevance {
    pub fn from_score(score: f32, thresholds: &RelevanceThresholds) -> Self {
        if score >= thresholds.highly_relevant {
            Relevance::HighlyRelevant
        } else if score >= thresholds.relevant {
            Relevance::Relevant
        } else if score >= thresholds.loosely_related {
            Relevance::LooselyRelated
        } else {
            Relevance::NotRelevant
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relevance::HighlyRelevant => "highly_relevant",
            Relevance::Relevant => "relevant",
            Relevance::LooselyRelated => "loosely_related",
            Relevance::NotRelevant => "not_relevant",
        }
    }
}

impl std::fmt::Display for Relevance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One nearest-neighbor hit from the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    chunk: Chunk,
    score: f32,
    relevance: Relevance,
}

impl SearchResult {
    pub fn new(chunk: Chunk, score: f32, thresholds: &RelevanceThresholds) -> Self {
        Self {
            chunk,
            score,
            relevance: Relevance::from_score(score, thresholds),
        }
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn relevance(&self) -> Relevance {
        self.relevance
    }

    pub fn display_line(&self) -> String {
        format!(
            "{} (score: {:.3}, {})",
            self.chunk.location(),
            self.score,
            self.relevance
        )
    }
}

/// Filter for range scans over the store.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    pub language: Option<Language>,
    /// Case-insensitive path pattern: interpreted as a regex when it
    /// compiles, as a plain substring otherwise.
    pub pattern: Option<String>,
    pub limit: Option<usize>,
}

impl ScanFilter {
    pub fn for_file(relative_path: &str) -> Self {
        Self {
            language: None,
            pattern: Some(format!("^{}$", regex::escape(relative_path))),
            limit: None,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ChunkType;

    #[test]
    fn test_relevance_buckets() {
        let t = RelevanceThresholds::default();
        assert_eq!(Relevance::from_score(0.9, &t), Relevance::HighlyRelevant);
        assert_eq!(Relevance::from_score(0.8, &t), Relevance::HighlyRelevant);
        assert_eq!(Relevance::from_score(0.7, &t), Relevance::Relevant);
        assert_eq!(Relevance::from_score(0.5, &t), Relevance::LooselyRelated);
        assert_eq!(Relevance::from_score(0.1, &t), Relevance::NotRelevant);
    }

    #[test]
    fn test_configurable_thresholds() {
        let strict = RelevanceThresholds {
            highly_relevant: 0.95,
            relevant: 0.9,
            loosely_related: 0.85,
        };
        assert_eq!(Relevance::from_score(0.9, &strict), Relevance::Relevant);
    }

    #[test]
    fn test_search_result_carries_bucket() {
        let chunk = Chunk::new(
            "math.ts".to_string(),
            "export function calculateSum(a, b) { return a + b; }".to_string(),
            1,
            1,
            Language::TypeScript,
            ChunkType::Function,
        );
        let result = SearchResult::new(chunk, 0.85, &RelevanceThresholds::default());
        assert_eq!(result.relevance(), Relevance::HighlyRelevant);
        assert!(result.display_line().contains("math.ts:1-1"));
    }
}
