//! Next-edge predictor interface used by `h_r` (§4.4).
//!
//! The original ships two mutually-inconsistent mock predictors: one that
//! returns only the first matching candidate label, one that returns
//! *all* candidate labels, space-joined. [`Prediction`] models both real
//! shapes plus the EOS sentinel so callers never need to guess which one
//! they are talking to.

pub mod mock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prediction {
    /// A single predicted next-edge label.
    Label(String),
    /// Several candidate labels, any of which should be treated as
    /// matching (mirrors the "return all candidates" mock).
    Labels(Vec<String>),
    /// End-of-sequence: stop extending the path.
    Eos,
}

impl Prediction {
    /// Whether `label` is among the predicted labels. `Eos` never
    /// matches anything.
    pub fn matches(&self, label: &str) -> bool {
        match self {
            Prediction::Label(l) => l == label,
            Prediction::Labels(ls) => ls.iter().any(|l| l == label),
            Prediction::Eos => false,
        }
    }
}

/// An external collaborator: given the label of the edge just taken and
/// the candidate labels available from here, predicts which one(s)
/// continue the paraphrase path. Model weights/training are out of
/// scope; only this seam is owned by the crate.
pub trait Predictor: Send + Sync {
    fn predict(&self, last_edge_label: &str, candidate_labels: &[String]) -> Prediction;
}
