//! Pairwise comparison against mock evaluators

use async_trait::async_trait;
use langcheck_core::{Error, Language, Result};
use langcheck_metrics::{pairwise_comparison, EvalClient, PairwiseRequest};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Evaluator that answers every prompt with the same verdict
struct MockEvalClient {
    verdict: String,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl MockEvalClient {
    fn new(verdict: &str) -> Self {
        Self {
            verdict: verdict.to_string(),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvalClient for MockEvalClient {
    async fn judge(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.verdict.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Prefers whichever response mentions Tokyo, regardless of position
struct TokyoJudge;

#[async_trait]
impl EvalClient for TokyoJudge {
    async fn judge(&self, prompt: &str) -> Result<String> {
        let a = prompt.find("[Response A]").unwrap();
        let b = prompt.find("[Response B]").unwrap();
        let tokyo = prompt.rfind("Tokyo").unwrap();
        let verdict = if tokyo > a && tokyo < b { "Response A" } else { "Response B" };
        Ok(format!("After careful thought, my verdict is: {verdict}"))
    }

    fn name(&self) -> &str {
        "tokyo"
    }
}

struct FailingEvalClient;

#[async_trait]
impl EvalClient for FailingEvalClient {
    async fn judge(&self, _prompt: &str) -> Result<String> {
        Err(Error::eval("evaluator offline"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

fn capital_request() -> PairwiseRequest {
    PairwiseRequest::new(
        ["Tokyo is the capital of Japan."],
        ["New York is the capital of Japan."],
        ["What is the capital of Japan?"],
        Language::En,
    )
}

#[tokio::test]
async fn test_tie_scores_half_for_every_input_combination() {
    let requests = vec![
        capital_request(),
        capital_request().with_reference_outputs(["Tokyo"]),
        capital_request().with_sources_a(["capital of Japan = Tokyo"]),
        capital_request()
            .with_sources_a(["capital of Japan = Tokyo"])
            .with_sources_b(["capital of Japan = Tokyo"]),
        capital_request()
            .with_sources_a(["capital of Japan = Tokyo"])
            .with_sources_b(["capital of Japan = Tokyo"])
            .with_reference_outputs(["Tokyo"]),
    ];

    for request in requests {
        let client = MockEvalClient::new("Tie");
        let value = pairwise_comparison(&client, &request).await.unwrap();

        assert_eq!(value.metric_name, "pairwise_comparison");
        assert_eq!(value.metric_values, vec![Some(0.5)]);
        // One judgement per order
        assert_eq!(client.call_count(), 2);
    }
}

#[tokio::test]
async fn test_position_biased_judge_is_inconsistent() {
    let client = MockEvalClient::new("Response B");
    let value = pairwise_comparison(&client, &capital_request()).await.unwrap();

    assert_eq!(value.metric_values[0], None);
    assert_eq!(value.mean(), None);
}

#[tokio::test]
async fn test_consistent_judge_prefers_correct_answer() {
    let request = PairwiseRequest::new(
        ["Tokyo is the capital.", "It is New York."],
        ["It is New York.", "Tokyo is the capital."],
        ["What is the capital of Japan?", "What is the capital of Japan?"],
        Language::En,
    );

    let value = pairwise_comparison(&TokyoJudge, &request).await.unwrap();
    assert_eq!(value.metric_values, vec![Some(0.0), Some(1.0)]);
}

#[tokio::test]
async fn test_unparseable_verdict_yields_none() {
    let client = MockEvalClient::new("Both answers have merit.");
    let value = pairwise_comparison(&client, &capital_request()).await.unwrap();
    assert_eq!(value.metric_values, vec![None]);
}

#[tokio::test]
async fn test_swapped_prompt_reverses_responses() {
    let client = MockEvalClient::new("Tie");
    pairwise_comparison(&client, &capital_request()).await.unwrap();

    let prompts = client.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    let tokyo_first = prompts
        .iter()
        .filter(|p| p.find("Tokyo").unwrap() < p.find("New York").unwrap())
        .count();
    assert_eq!(tokyo_first, 1);
}

#[tokio::test]
async fn test_japanese_prompt_template() {
    let client = MockEvalClient::new("Tie");
    let request = PairwiseRequest::new(
        ["東京は日本の首都です。"],
        ["ニューヨークは日本の首都です。"],
        ["日本の首都は何ですか？"],
        Language::Ja,
    )
    .with_reference_outputs(["東京"]);

    let value = pairwise_comparison(&client, &request).await.unwrap();
    assert_eq!(value.metric_values, vec![Some(0.5)]);

    let prompts = client.prompts.lock().unwrap();
    assert!(prompts.iter().all(|p| p.contains("[参照回答]\n東京")));
}

#[tokio::test]
async fn test_length_mismatch_is_rejected_before_judging() {
    let client = MockEvalClient::new("Tie");
    let request = PairwiseRequest::new(["a", "b"], ["c"], ["q", "q"], Language::En);

    let err = pairwise_comparison(&client, &request).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_evaluator_errors_propagate() {
    let err = pairwise_comparison(&FailingEvalClient, &capital_request())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Eval(_)));
}
