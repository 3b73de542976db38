//! Keyword scoring and LLM relevance fusion: `score = (score +
//! relevance_score) / 2.0`, applied only when the Ollama pass reports a
//! positive relevance score.

use crate::crawler::llm::OllamaAnalysis;

/// Fraction of `keywords` that appear (case-insensitively) in `text`, plus
/// the matched subset. Keyword-less jobs always score zero.
pub fn score_content(text: &str, keywords: &[String]) -> (f64, Vec<String>) {
    if keywords.is_empty() {
        return (0.0, Vec::new());
    }
    let text_lower = text.to_lowercase();
    let matched: Vec<String> = keywords
        .iter()
        .filter(|k| text_lower.contains(&k.to_lowercase()))
        .cloned()
        .collect();
    let score = matched.len() as f64 / keywords.len() as f64;
    (score, matched)
}

/// Blend a keyword score with an optional Ollama relevance pass. A
/// non-positive Ollama score leaves the keyword score untouched — it means
/// the model found nothing, not that it found zero relevance.
pub fn fuse_with_ollama(keyword_score: f64, analysis: &OllamaAnalysis) -> f64 {
    if analysis.relevance_score > 0.0 {
        (keyword_score + analysis.relevance_score) / 2.0
    } else {
        keyword_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_keywords_scores_zero() {
        let (score, matched) = score_content("anything goes here", &[]);
        assert_eq!(score, 0.0);
        assert!(matched.is_empty());
    }

    #[test]
    fn partial_keyword_match_scores_fraction() {
        let keywords = vec!["rust".to_string(), "golang".to_string()];
        let (score, matched) = score_content("I love rust programming", &keywords);
        assert_eq!(score, 0.5);
        assert_eq!(matched, vec!["rust".to_string()]);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let keywords = vec!["RUST".to_string()];
        let (score, _) = score_content("rust is great", &keywords);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn fusion_averages_when_ollama_positive() {
        let analysis = OllamaAnalysis {
            relevance_score: 0.8,
            ..Default::default()
        };
        let fused = fuse_with_ollama(0.4, &analysis);
        assert!((fused - 0.6).abs() < 1e-9);
    }

    #[test]
    fn fusion_ignores_zero_ollama_score() {
        let analysis = OllamaAnalysis::default();
        let fused = fuse_with_ollama(0.4, &analysis);
        assert_eq!(fused, 0.4);
    }
}
