//! LLM-as-judge evaluator interface

use async_trait::async_trait;
use langcheck_core::Result;
use regex::Regex;
use std::sync::OnceLock;

/// An evaluator model that answers judging prompts
#[async_trait]
pub trait EvalClient: Send + Sync {
    /// Raw response to a single judging prompt
    async fn judge(&self, prompt: &str) -> Result<String>;

    /// Evaluator name, for logging
    fn name(&self) -> &str;
}

/// Verdict of a pairwise comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairwiseVerdict {
    ResponseA,
    Tie,
    ResponseB,
}

impl PairwiseVerdict {
    /// Preference for Response B: A → 0.0, Tie → 0.5, B → 1.0
    pub fn score(&self) -> f64 {
        match self {
            Self::ResponseA => 0.0,
            Self::Tie => 0.5,
            Self::ResponseB => 1.0,
        }
    }

    /// Parse the final verdict from a judge response
    ///
    /// The last mention of `Response A`, `Response B` or `Tie` wins, since
    /// judges usually reason before concluding.
    pub fn parse(response: &str) -> Option<Self> {
        static VERDICT: OnceLock<Option<Regex>> = OnceLock::new();
        let re = VERDICT
            .get_or_init(|| Regex::new(r"(?i)\b(?:response\s*(a|b)|(tie))\b").ok())
            .as_ref()?;

        let caps = re.captures_iter(response).last()?;
        if caps.get(2).is_some() {
            return Some(Self::Tie);
        }
        match caps.get(1)?.as_str() {
            "a" | "A" => Some(Self::ResponseA),
            _ => Some(Self::ResponseB),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verdicts() {
        assert_eq!(PairwiseVerdict::parse("Response A"), Some(PairwiseVerdict::ResponseA));
        assert_eq!(PairwiseVerdict::parse("tie"), Some(PairwiseVerdict::Tie));
        assert_eq!(
            PairwiseVerdict::parse("Response A is vague. Final verdict: response b"),
            Some(PairwiseVerdict::ResponseB)
        );
        assert_eq!(PairwiseVerdict::parse("I cannot decide."), None);
        assert_eq!(PairwiseVerdict::parse("Tied scores, Response Bx"), None);
    }

    #[test]
    fn test_verdict_scores() {
        assert_eq!(PairwiseVerdict::ResponseA.score(), 0.0);
        assert_eq!(PairwiseVerdict::Tie.score(), 0.5);
        assert_eq!(PairwiseVerdict::ResponseB.score(), 1.0);
    }
}
