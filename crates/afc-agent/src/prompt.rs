/// Reply the model must give when the knowledge text does not cover a question.
pub const NOT_IN_KNOWLEDGE_BASE: &str = "This information is not included in my knowledge base.";

const DEFAULT_PERSONA: &str = "You are an AI assistant that provides information about \
                               AFC (Automatic Fare Collection) equipment faults.";

/// Fixed framing around the knowledge text and the question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub persona: String,
    pub sentinel: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            sentinel: NOT_IN_KNOWLEDGE_BASE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// Embed `knowledge` and `question` verbatim.
    pub fn render(&self, question: &str, knowledge: &str) -> String {
        format!(
            "{persona}\n\
             Answer the user's question using only the information provided below.\n\
             If the answer is not contained in the provided information, reply with exactly: \"{sentinel}\"\n\
             \n\
             ---\n\
             Provided information:\n\
             {knowledge}\n\
             ---\n\
             \n\
             User question:\n\
             {question}\n",
            persona = self.persona,
            sentinel = self.sentinel,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_knowledge_and_question_verbatim() {
        let prompt = PromptTemplate::default()
            .render("How do I resolve Fault X?", "Fault X: reset the reader.");

        assert!(prompt.contains("Fault X: reset the reader."));
        assert!(prompt.contains("How do I resolve Fault X?"));
        assert!(prompt.contains(NOT_IN_KNOWLEDGE_BASE));
        assert!(prompt.contains("only the information provided"));
    }

    #[test]
    fn knowledge_precedes_question() {
        let prompt = PromptTemplate::default().render("QUESTION-MARKER", "KNOWLEDGE-MARKER");
        let knowledge_at = prompt.find("KNOWLEDGE-MARKER").unwrap();
        let question_at = prompt.find("QUESTION-MARKER").unwrap();
        assert!(knowledge_at < question_at);
    }

    #[test]
    fn multiline_knowledge_is_not_altered() {
        let knowledge = "Fault A: check power.\n\n  Fault B: \"quoted\" {braces}\n";
        let prompt = PromptTemplate::default().render("q", knowledge);
        assert!(prompt.contains(knowledge));
    }

    #[test]
    fn custom_sentinel_replaces_default() {
        let prompt = PromptTemplate::default()
            .with_sentinel("해당 정보는 저의 지식 베이스에 포함되어 있지 않습니다.")
            .render("q", "k");
        assert!(prompt.contains("해당 정보는 저의 지식 베이스에 포함되어 있지 않습니다."));
        assert!(!prompt.contains(NOT_IN_KNOWLEDGE_BASE));
    }
}
