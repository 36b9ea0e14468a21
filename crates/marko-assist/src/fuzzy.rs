//! Fuzzy scoring of suggestions against the typed prefix.

/// Scores how well `candidate` matches `query`; zero or less excludes it.
pub trait FuzzyScorer: Send + Sync {
    fn score(&self, candidate: &str, query: &str) -> f64;
}

/// Case-insensitive subsequence filter ranked by Jaro-Winkler similarity,
/// with a bonus for exact prefixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinklerScorer;

/// Every char of `query` appears in `candidate`, in order.
fn is_subsequence(query: &str, candidate: &str) -> bool {
    let mut chars = candidate.chars();
    query.chars().all(|q| chars.any(|c| c == q))
}

impl FuzzyScorer for JaroWinklerScorer {
    fn score(&self, candidate: &str, query: &str) -> f64 {
        let candidate = candidate.to_lowercase();
        let query = query.to_lowercase();
        if !is_subsequence(&query, &candidate) {
            return 0.0;
        }

        let similarity = strsim::jaro_winkler(&candidate, &query);
        if candidate.starts_with(&query) {
            similarity + 1.0
        } else {
            similarity
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_matching_scores_zero() {
        assert_eq!(JaroWinklerScorer.score("div", "xz"), 0.0);
        assert_eq!(JaroWinklerScorer.score("span", "nas"), 0.0);
    }

    #[test]
    fn test_prefix_beats_scattered() {
        let scorer = JaroWinklerScorer;
        let prefix = scorer.score("class", "cl");
        let scattered = scorer.score("colspan", "cl");
        assert!(prefix > scattered);
        assert!(scattered > 0.0);
    }

    #[test]
    fn test_case_insensitive() {
        assert!(JaroWinklerScorer.score("onClick", "oncl") > 1.0);
    }
}
