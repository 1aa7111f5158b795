//! Classifier-based metrics: toxicity and sentiment

use langcheck_core::{Error, Language, MetricValue, Result};
use langcheck_models::TextClassifier;

/// Toxicity of each output, in `[0, 1]`
///
/// Multi-label heads (more than two labels, Detoxify style) score the
/// sigmoid of the toxicity logit. Binary and single-label heads score the
/// softmax probability of the toxicity label, or of the last label when no
/// label is named after toxicity.
pub fn toxicity<C, S>(classifier: &C, generated_outputs: &[S], language: Language) -> Result<MetricValue>
where
    C: TextClassifier + ?Sized,
    S: AsRef<str>,
{
    let labels: Vec<String> = classifier
        .labels()
        .iter()
        .map(|label| normalize_toxicity_label(label))
        .collect();

    let values = generated_outputs
        .iter()
        .map(|output| {
            let logits = classifier.logits(output.as_ref())?;
            toxicity_score(&labels, &logits).map(Some)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MetricValue::new("toxicity", language, values))
}

/// Sentiment of each output, in `[0, 1]` (0 negative, 1 positive)
///
/// Scores `P(positive) + 0.5 · P(neutral)` when those labels are present,
/// otherwise the probability of the last label.
pub fn sentiment<C, S>(classifier: &C, generated_outputs: &[S], language: Language) -> Result<MetricValue>
where
    C: TextClassifier + ?Sized,
    S: AsRef<str>,
{
    let labels: Vec<String> = classifier
        .labels()
        .iter()
        .map(|label| label.to_lowercase())
        .collect();

    let values = generated_outputs
        .iter()
        .map(|output| {
            let logits = classifier.logits(output.as_ref())?;
            sentiment_score(&labels, &logits).map(Some)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MetricValue::new("sentiment", language, values))
}

/// Map Detoxify's original class names onto the names LangCheck reports
pub fn normalize_toxicity_label(label: &str) -> String {
    let label = label.to_lowercase();
    match label.as_str() {
        "toxic" => "toxicity".to_string(),
        "severe_toxic" => "severe_toxicity".to_string(),
        "identity_hate" => "identity_attack".to_string(),
        _ => label,
    }
}

fn toxicity_score(labels: &[String], logits: &[f32]) -> Result<f64> {
    check_shape(labels, logits)?;
    let toxic_idx = labels.iter().position(|label| label == "toxicity");

    if logits.len() > 2 {
        if let Some(idx) = toxic_idx {
            return Ok(sigmoid(logits[idx]));
        }
    }

    let probs = softmax(logits);
    let idx = toxic_idx.unwrap_or(probs.len() - 1);
    Ok(probs[idx])
}

fn sentiment_score(labels: &[String], logits: &[f32]) -> Result<f64> {
    check_shape(labels, logits)?;
    let probs = softmax(logits);

    let positive = labels.iter().position(|label| label == "positive");
    let neutral = labels.iter().position(|label| label == "neutral");

    Ok(match positive {
        Some(pos) => probs[pos] + neutral.map_or(0.0, |n| 0.5 * probs[n]),
        None => probs[probs.len() - 1],
    })
}

fn check_shape(labels: &[String], logits: &[f32]) -> Result<()> {
    if logits.is_empty() || labels.len() != logits.len() {
        return Err(Error::model(format!(
            "Classifier returned {} logits for {} labels",
            logits.len(),
            labels.len()
        )));
    }
    Ok(())
}

fn sigmoid(x: f32) -> f64 {
    1.0 / (1.0 + (-(x as f64)).exp())
}

fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&x| (x as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClassifier {
        labels: Vec<String>,
        logits: Vec<f32>,
    }

    impl FixedClassifier {
        fn new(labels: &[&str], logits: &[f32]) -> Self {
            Self {
                labels: labels.iter().map(|s| s.to_string()).collect(),
                logits: logits.to_vec(),
            }
        }
    }

    impl TextClassifier for FixedClassifier {
        fn labels(&self) -> &[String] {
            &self.labels
        }

        fn logits(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.logits.clone())
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_toxicity_multi_label_uses_sigmoid() {
        let classifier = FixedClassifier::new(
            &["toxic", "severe_toxic", "obscene", "threat", "insult", "identity_hate"],
            &[0.0, 5.0, 5.0, 5.0, 5.0, 5.0],
        );

        let value = toxicity(&classifier, &["hello"], Language::En).unwrap();
        assert!(approx(value.metric_values[0].unwrap(), 0.5));
    }

    #[test]
    fn test_toxicity_binary_uses_softmax() {
        let classifier = FixedClassifier::new(&["normal", "toxic"], &[0.0, 0.0]);
        let value = toxicity(&classifier, &["a", "b"], Language::Zh).unwrap();
        assert_eq!(value.len(), 2);
        assert!(approx(value.mean().unwrap(), 0.5));

        let classifier = FixedClassifier::new(&["LABEL_0", "LABEL_1"], &[0.0, 2.0f32.ln()]);
        let value = toxicity(&classifier, &["a"], Language::Zh).unwrap();
        assert!(approx(value.metric_values[0].unwrap(), 2.0 / 3.0));
    }

    #[test]
    fn test_sentiment_with_neutral() {
        let classifier =
            FixedClassifier::new(&["Negative", "Neutral", "Positive"], &[0.0, 0.0, 0.0]);
        let value = sentiment(&classifier, &["ok"], Language::En).unwrap();
        assert!(approx(value.metric_values[0].unwrap(), 0.5));
    }

    #[test]
    fn test_sentiment_binary_fallback() {
        let classifier = FixedClassifier::new(&["LABEL_0", "LABEL_1"], &[3.0f32.ln(), 0.0]);
        let value = sentiment(&classifier, &["bad"], Language::Zh).unwrap();
        assert!(approx(value.metric_values[0].unwrap(), 0.25));
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let classifier = FixedClassifier::new(&["negative", "positive"], &[1.0]);
        let err = sentiment(&classifier, &["x"], Language::En).unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }

    #[test]
    fn test_normalize_toxicity_label() {
        assert_eq!(normalize_toxicity_label("identity_hate"), "identity_attack");
        assert_eq!(normalize_toxicity_label("Threat"), "threat");
    }
}
