use serde::Serialize;
use utoipa::ToSchema;

/// Crisis phrases checked against every incoming letter. Matching is
/// case-insensitive substring search, so "I feel SUICIDAL" and
/// "thinking about self-harm again" both trip the gate. Paraphrased
/// crisis language will not match; the policy covers listed phrases only.
const CRISIS_PHRASES: &[&str] = &[
    "suicide",
    "suicidal",
    "kill myself",
    "end my life",
    "hurt myself",
    "self-harm",
    "self harm",
    "want to die",
    "better off dead",
    "no reason to live",
];

/// Pointers handed back with every flagged screening. The caller shows
/// these to the writer instead of the normal acknowledgement; they are
/// never stored as a Response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CrisisResources {
    /// Suicide & Crisis Lifeline (call or text)
    pub crisis_line: String,
    /// Crisis Text Line keyword and number
    pub text_line: String,
    /// Emergency services number
    pub emergency: String,
}

impl CrisisResources {
    pub fn default_lines() -> Self {
        Self {
            crisis_line: "988".to_string(),
            text_line: "text HOME to 741741".to_string(),
            emergency: "911".to_string(),
        }
    }
}

/// Outcome of classifying one piece of text.
#[derive(Debug, Clone)]
pub struct Screening {
    pub flagged: bool,
    /// The phrase that tripped the gate, when flagged.
    pub reason: Option<String>,
    /// Fixed crisis-response text shown to the writer, when flagged.
    pub user_message: Option<String>,
    pub resources: Option<CrisisResources>,
}

impl Screening {
    pub fn clean() -> Self {
        Self {
            flagged: false,
            reason: None,
            user_message: None,
            resources: None,
        }
    }

    fn flagged(phrase: &str) -> Self {
        let resources = CrisisResources::default_lines();
        Self {
            flagged: true,
            reason: Some(phrase.to_string()),
            user_message: Some(crisis_message(&resources)),
            resources: Some(resources),
        }
    }
}

fn crisis_message(resources: &CrisisResources) -> String {
    format!(
        "Your letter has been received and a person will read it with care. \
         It sounds like you may be carrying something very heavy right now, \
         and you deserve support sooner than a letter can give: call or text \
         {} (Suicide & Crisis Lifeline), {} (Crisis Text Line), or dial {} \
         if you are in immediate danger.",
        resources.crisis_line, resources.text_line, resources.emergency
    )
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

/// Seam for richer classifiers (ML scoring, external moderation APIs).
/// Implementations must be pure with respect to persisted state.
pub trait Classifier {
    fn classify(&self, text: &str) -> Result<Screening, ClassifierError>;
}

/// Default classifier: fixed crisis-phrase list, case-insensitive
/// substring match. Never errors, never misses a listed phrase.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<Screening, ClassifierError> {
        let lowered = text.to_lowercase();
        for phrase in CRISIS_PHRASES {
            if lowered.contains(phrase) {
                return Ok(Screening::flagged(phrase));
            }
        }
        Ok(Screening::clean())
    }
}

/// Run a classifier with fail-open semantics: a classifier error yields an
/// unflagged screening so the platform never silently blocks a submission.
/// Do not flip to fail-closed without product sign-off.
pub fn screen(classifier: &dyn Classifier, text: &str) -> Screening {
    match classifier.classify(text) {
        Ok(screening) => screening,
        Err(err) => {
            tracing::warn!(error = %err, "moderation classifier failed, defaulting to unflagged");
            Screening::clean()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Classifier, ClassifierError, KeywordClassifier, Screening, screen};

    #[test]
    fn crisis_content_is_flagged_with_reason_and_resources() {
        let screening = KeywordClassifier
            .classify("I want to end my life please help")
            .unwrap();
        assert!(screening.flagged);
        assert_eq!(screening.reason.as_deref(), Some("end my life"));
        let message = screening.user_message.expect("crisis message present");
        assert!(message.contains("988"));
        assert!(screening.resources.is_some());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let screening = KeywordClassifier.classify("I feel SUICIDAL today").unwrap();
        assert!(screening.flagged);
        // "suicide" sits earlier in the list and matches as a substring.
        assert_eq!(screening.reason.as_deref(), Some("suicide"));
    }

    #[test]
    fn every_listed_phrase_trips_the_gate() {
        for phrase in super::CRISIS_PHRASES {
            let text = format!("something something {phrase} something");
            let screening = KeywordClassifier.classify(&text).unwrap();
            assert!(screening.flagged, "phrase {phrase:?} should flag");
        }
    }

    #[test]
    fn ordinary_content_passes_clean() {
        let screening = KeywordClassifier
            .classify("I had a rough day at work today")
            .unwrap();
        assert!(!screening.flagged);
        assert!(screening.reason.is_none());
        assert!(screening.user_message.is_none());
    }

    struct BrokenClassifier;

    impl Classifier for BrokenClassifier {
        fn classify(&self, _text: &str) -> Result<Screening, ClassifierError> {
            Err(ClassifierError::Unavailable("model not loaded".to_string()))
        }
    }

    #[test]
    fn screen_fails_open_when_the_classifier_errors() {
        let screening = screen(&BrokenClassifier, "anything at all");
        assert!(!screening.flagged);
    }

    #[test]
    fn screen_passes_through_a_working_classifier() {
        let screening = screen(&KeywordClassifier, "thinking about self-harm");
        assert!(screening.flagged);
    }
}
