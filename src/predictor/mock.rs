use super::{Predictor, Prediction};

/// Returns the EOS sentinel on an empty candidate list, otherwise the
/// first candidate label — matches the original `mock_predictor.py`
/// `MockLLMPredictor`.
pub struct FirstCandidatePredictor;

impl Predictor for FirstCandidatePredictor {
    fn predict(&self, _last_edge_label: &str, candidate_labels: &[String]) -> Prediction {
        match candidate_labels.first() {
            Some(label) => Prediction::Label(label.clone()),
            None => Prediction::Eos,
        }
    }
}

/// Returns every candidate label as equally plausible continuations —
/// matches the original `predictor.py` `MockLLMPredictor`, which never
/// emits an EOS sentinel.
pub struct AllCandidatesPredictor;

impl Predictor for AllCandidatesPredictor {
    fn predict(&self, _last_edge_label: &str, candidate_labels: &[String]) -> Prediction {
        Prediction::Labels(candidate_labels.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_candidate_predictor_emits_eos_when_no_candidates() {
        let p = FirstCandidatePredictor;
        assert_eq!(p.predict("eats", &[]), Prediction::Eos);
    }

    #[test]
    fn all_candidates_predictor_never_emits_eos() {
        let p = AllCandidatesPredictor;
        let labels = vec!["eats".to_string(), "avoids".to_string()];
        let prediction = p.predict("eats", &labels);
        assert!(prediction.matches("avoids"));
        assert!(prediction.matches("eats"));
    }
}
