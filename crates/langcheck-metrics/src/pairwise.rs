//! Pairwise comparison judged by an evaluator LLM
//!
//! Each pair is judged twice, once in the given order and once with the
//! responses swapped. Judges have a position bias, so an item only gets a
//! value when both orders agree.

use crate::eval_client::{EvalClient, PairwiseVerdict};
use futures::future::try_join_all;
use langcheck_core::{Error, Language, MetricValue, Result};
use tracing::debug;

/// Inputs for [`pairwise_comparison`]
#[derive(Debug, Clone)]
pub struct PairwiseRequest {
    pub outputs_a: Vec<String>,
    pub outputs_b: Vec<String>,
    pub prompts: Vec<String>,
    pub sources_a: Option<Vec<String>>,
    pub sources_b: Option<Vec<String>>,
    pub reference_outputs: Option<Vec<String>>,
    pub language: Language,
}

impl PairwiseRequest {
    pub fn new<A, B, P>(outputs_a: A, outputs_b: B, prompts: P, language: Language) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            outputs_a: collect(outputs_a),
            outputs_b: collect(outputs_b),
            prompts: collect(prompts),
            sources_a: None,
            sources_b: None,
            reference_outputs: None,
            language,
        }
    }

    pub fn with_sources_a<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.sources_a = Some(collect(sources));
        self
    }

    pub fn with_sources_b<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.sources_b = Some(collect(sources));
        self
    }

    pub fn with_reference_outputs<I>(mut self, references: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.reference_outputs = Some(collect(references));
        self
    }

    pub fn len(&self) -> usize {
        self.outputs_a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs_a.is_empty()
    }

    /// All provided lists must have one entry per item
    pub fn validate(&self) -> Result<()> {
        let expected = self.outputs_a.len();
        let lists = [
            ("outputs_b", Some(&self.outputs_b)),
            ("prompts", Some(&self.prompts)),
            ("sources_a", self.sources_a.as_ref()),
            ("sources_b", self.sources_b.as_ref()),
            ("reference_outputs", self.reference_outputs.as_ref()),
        ];

        for (name, list) in lists {
            if let Some(list) = list {
                if list.len() != expected {
                    return Err(Error::invalid_input(format!(
                        "{} has {} entries but outputs_a has {}",
                        name,
                        list.len(),
                        expected
                    )));
                }
            }
        }
        Ok(())
    }

    /// Judge prompt for item `idx`, optionally with the responses swapped
    fn judge_prompt(&self, idx: usize, swapped: bool) -> String {
        let (first, second) = if swapped {
            (&self.outputs_b[idx], &self.outputs_a[idx])
        } else {
            (&self.outputs_a[idx], &self.outputs_b[idx])
        };

        let source_a = self.sources_a.as_ref().map(|s| s[idx].as_str());
        let source_b = self.sources_b.as_ref().map(|s| s[idx].as_str());
        let source = match (source_a, source_b) {
            (Some(a), Some(b)) if swapped => Some(format!("{b}\n{a}")),
            (Some(a), Some(b)) => Some(format!("{a}\n{b}")),
            (Some(s), None) | (None, Some(s)) => Some(s.to_string()),
            (None, None) => None,
        };
        let reference = self.reference_outputs.as_ref().map(|r| r[idx].as_str());

        let template = PromptTemplate::for_language(self.language);
        let mut prompt = String::from(template.instructions);
        prompt.push_str("\n\n");
        if let Some(source) = source {
            prompt.push_str(&format!("[{}]\n{}\n\n", template.source, source));
        }
        if let Some(reference) = reference {
            prompt.push_str(&format!("[{}]\n{}\n\n", template.reference, reference));
        }
        prompt.push_str(&format!(
            "[{}]\n{}\n\n[Response A]\n{}\n\n[Response B]\n{}\n\n{}",
            template.user_query, self.prompts[idx], first, second, template.verdict
        ));
        prompt
    }
}

fn collect<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

struct PromptTemplate {
    instructions: &'static str,
    source: &'static str,
    reference: &'static str,
    user_query: &'static str,
    verdict: &'static str,
}

impl PromptTemplate {
    fn for_language(language: Language) -> Self {
        match language {
            Language::Ja => Self {
                instructions: "ユーザーの質問に対する2つのAIアシスタントの回答を比較し、\
                    どちらがより優れているかを判断してください。回答の順番や長さに影響されないでください。",
                source: "ソース",
                reference: "参照回答",
                user_query: "ユーザーの質問",
                verdict: "最後に、\"Response A\"、\"Response B\"、\"Tie\" のいずれかで判定を出力してください。",
            },
            Language::De => Self {
                instructions: "Vergleichen Sie die Antworten zweier KI-Assistenten auf die \
                    Benutzerfrage und entscheiden Sie, welche besser ist. Lassen Sie sich nicht \
                    von Reihenfolge oder Länge der Antworten beeinflussen.",
                source: "Quelle",
                reference: "Referenzantwort",
                user_query: "Benutzerfrage",
                verdict: "Geben Sie zum Schluss Ihr Urteil als \"Response A\", \"Response B\" \
                    oder \"Tie\" aus.",
            },
            Language::Zh => Self {
                instructions: "请比较两个AI助手对用户问题的回答，判断哪一个更好。不要受回答顺序或长度的影响。",
                source: "来源",
                reference: "参考答案",
                user_query: "用户问题",
                verdict: "最后，请用 \"Response A\"、\"Response B\" 或 \"Tie\" 给出你的判断。",
            },
            Language::En => Self {
                instructions: "Compare the responses of two AI assistants to the user question \
                    and decide which one is better. Do not let the order or the length of the \
                    responses influence your decision.",
                source: "Source",
                reference: "Reference Answer",
                user_query: "User Question",
                verdict: "Finally, output your verdict as \"Response A\", \"Response B\" or \"Tie\".",
            },
        }
    }
}

/// Preference for output B over output A for each item
///
/// `0.0` means A is better, `0.5` a tie, `1.0` B is better. Items whose
/// verdict flips when the responses are swapped, or whose verdict cannot be
/// parsed, get `None`.
pub async fn pairwise_comparison<E>(eval_client: &E, request: &PairwiseRequest) -> Result<MetricValue>
where
    E: EvalClient + ?Sized,
{
    request.validate()?;

    let items = (0..request.len()).map(|idx| judge_item(eval_client, request, idx));
    let values = try_join_all(items).await?;

    Ok(MetricValue::new("pairwise_comparison", request.language, values))
}

async fn judge_item<E>(eval_client: &E, request: &PairwiseRequest, idx: usize) -> Result<Option<f64>>
where
    E: EvalClient + ?Sized,
{
    let original_prompt = request.judge_prompt(idx, false);
    let swapped_prompt = request.judge_prompt(idx, true);

    let (original, swapped) = futures::try_join!(
        eval_client.judge(&original_prompt),
        eval_client.judge(&swapped_prompt)
    )?;

    let original = PairwiseVerdict::parse(&original).map(|v| v.score());
    let swapped = PairwiseVerdict::parse(&swapped).map(|v| 1.0 - v.score());

    match (original, swapped) {
        (Some(a), Some(b)) if a == b => Ok(Some(a)),
        (Some(a), Some(b)) => {
            debug!(
                evaluator = eval_client.name(),
                item = idx,
                original = a,
                swapped = b,
                "Inconsistent pairwise verdicts"
            );
            Ok(None)
        }
        _ => {
            debug!(evaluator = eval_client.name(), item = idx, "Unparseable pairwise verdict");
            Ok(None)
        }
    }
}
