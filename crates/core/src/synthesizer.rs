use crate::traits::LanguageModel;
use crate::SearchError;
use std::sync::Arc;
use tracing::debug;

pub const NO_ANSWER_SENTINEL: &str = "The document does not contain this information.";

const DEFAULT_TEMPLATE: &str = "
You are a helpful AI assistant. Use ONLY the following document context to answer the question.
If the answer is not present in the provided context, respond with:
\"The document does not contain this information.\"

Context:
{context}

Question:
{question}

Answer:
";

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Custom templates must contain `{context}` and `{question}`.
    pub fn new(template: impl Into<String>) -> Option<Self> {
        let template = template.into();
        (template.contains("{context}") && template.contains("{question}"))
            .then_some(Self { template })
    }

    /// Single pass, so placeholder-like text inside the substituted values is
    /// left alone.
    pub fn render(&self, question: &str, context: &str) -> String {
        let mut output =
            String::with_capacity(self.template.len() + question.len() + context.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            output.push_str(&rest[..open]);
            let tail = &rest[open..];
            if let Some(after) = tail.strip_prefix("{context}") {
                output.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{question}") {
                output.push_str(question);
                rest = after;
            } else {
                output.push('{');
                rest = &tail[1..];
            }
        }

        output.push_str(rest);
        output
    }
}

/// Joins passages in rank order while the context stays within
/// `max_chars`. The first passage is always kept, cut at a char boundary
/// if it alone is over budget.
pub fn assemble_context(passages: &[String], max_chars: usize) -> String {
    const SEPARATOR: &str = "\n\n";
    let mut context = String::new();
    let mut used = 0usize;

    for passage in passages {
        let length = passage.chars().count();
        if context.is_empty() {
            if length > max_chars {
                context.extend(passage.chars().take(max_chars));
                break;
            }
            context.push_str(passage);
            used = length;
            continue;
        }

        if used + SEPARATOR.len() + length > max_chars {
            break;
        }
        context.push_str(SEPARATOR);
        context.push_str(passage);
        used += SEPARATOR.len() + length;
    }

    context
}

pub struct AnswerSynthesizer {
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    max_context_chars: usize,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, max_context_chars: usize) -> Self {
        Self {
            model,
            template: PromptTemplate::default(),
            max_context_chars,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn build_prompt(&self, question: &str, passages: &[String]) -> String {
        let context = assemble_context(passages, self.max_context_chars);
        self.template.render(question, &context)
    }

    /// One synchronous model call; the output is returned unmodified.
    pub async fn answer(&self, question: &str, passages: &[String]) -> Result<String, SearchError> {
        let prompt = self.build_prompt(question, passages);
        debug!(
            model = self.model.model_name(),
            prompt_chars = prompt.chars().count(),
            passages = passages.len(),
            "invoking language model"
        );
        self.model.complete(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, prompt: &str) -> Result<String, SearchError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            Ok(" raw output \n".to_string())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, SearchError> {
            Err(SearchError::Request("model offline".to_string()))
        }
    }

    #[test]
    fn prompt_contains_context_question_and_sentinel_instruction() {
        let prompt = PromptTemplate::default().render("Who?", "Passage one\n\nPassage two");

        assert!(prompt.contains("Context:\nPassage one\n\nPassage two\n"));
        assert!(prompt.contains("Question:\nWho?\n"));
        assert!(prompt.contains(NO_ANSWER_SENTINEL));
        assert!(prompt.trim_end().ends_with("Answer:"));
    }

    #[test]
    fn context_is_bounded_by_whole_passages() {
        let passages = vec!["a".repeat(10), "b".repeat(10), "c".repeat(10)];
        assert_eq!(assemble_context(&passages, 22), format!("{}\n\n{}", passages[0], passages[1]));
        assert_eq!(assemble_context(&passages, 21), passages[0]);
        assert_eq!(assemble_context(&passages, 4), "aaaa");
        assert_eq!(assemble_context(&[], 100), "");
    }

    #[test]
    fn custom_template_needs_both_placeholders() {
        assert!(PromptTemplate::new("{context} only").is_none());
        let template = PromptTemplate::new("Q={question} C={context}").unwrap();
        assert_eq!(template.render("q", "c"), "Q=q C=c");
        assert_eq!(
            template.render("{context}?", "{question} {x}"),
            "Q={context}? C={question} {x}"
        );
    }

    #[tokio::test]
    async fn model_output_is_returned_unmodified() {
        let model = Arc::new(RecordingModel::default());
        let synthesizer = AnswerSynthesizer::new(model.clone(), 1_000);

        let answer = synthesizer
            .answer("What?", &["Some context".to_string()])
            .await
            .unwrap();

        assert_eq!(answer, " raw output \n");
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Some context"));
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let synthesizer = AnswerSynthesizer::new(Arc::new(FailingModel), 1_000);
        let result = synthesizer.answer("What?", &[]).await;
        assert!(matches!(result, Err(SearchError::Request(_))));
    }
}
