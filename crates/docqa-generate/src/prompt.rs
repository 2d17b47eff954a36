//! Prompt templates.

use crate::error::GeneratorError;

/// Default answer prompt.
pub const DEFAULT_TEMPLATE: &str = "You are a knowledgeable chatbot, here to help with questions of the user. Your tone should be professional and informative.
Context: {context}
History: {history}
User: {question}
Chatbot:";

const PLACEHOLDERS: &[&str] = &["context", "history", "question"];

/// A prompt with `{context}`, `{history}` and `{question}` placeholders.
///
/// `{question}` is required. Any other `{name}` is rejected so a typo in a
/// configured template fails at startup instead of reaching the model.
/// Literal braces are written `{{` and `}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
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

enum Piece<'a> {
    Text(&'a str),
    Brace(char),
    Placeholder(&'a str),
}

fn pieces(template: &str) -> Result<Vec<Piece<'_>>, GeneratorError> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push(Piece::Text(&rest[..pos]));
        let tail = &rest[pos..];
        if tail.starts_with("{{") {
            out.push(Piece::Brace('{'));
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push(Piece::Brace('}'));
            rest = &tail[2..];
        } else if tail.starts_with('}') {
            return Err(GeneratorError::Template("unmatched '}'".into()));
        } else {
            let end = tail
                .find('}')
                .ok_or_else(|| GeneratorError::Template("unclosed '{'".into()))?;
            out.push(Piece::Placeholder(&tail[1..end]));
            rest = &tail[end + 1..];
        }
    }
    out.push(Piece::Text(rest));
    Ok(out)
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, GeneratorError> {
        let template = template.into();
        let mut has_question = false;
        for piece in pieces(&template)? {
            if let Piece::Placeholder(name) = piece {
                if !PLACEHOLDERS.contains(&name) {
                    return Err(GeneratorError::Template(format!(
                        "unknown placeholder {{{name}}}"
                    )));
                }
                has_question |= name == "question";
            }
        }
        if !has_question {
            return Err(GeneratorError::Template(
                "template must contain {question}".into(),
            ));
        }
        Ok(Self { template })
    }

    /// The configured template, or the default when none is set.
    pub fn from_option(template: Option<&str>) -> Result<Self, GeneratorError> {
        match template {
            Some(t) => Self::new(t),
            None => Ok(Self::default()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn render(&self, context: &str, history: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        // Validated in new()
        for piece in pieces(&self.template).unwrap_or_default() {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Brace(c) => out.push(c),
                Piece::Placeholder("context") => out.push_str(context),
                Piece::Placeholder("history") => out.push_str(history),
                Piece::Placeholder(_) => out.push_str(question),
            }
        }
        out
    }
}

/// Prompt asking for follow-up questions.
pub fn suggestion_prompt(question: &str, answer: &str) -> String {
    format!(
        "A user asked: {question}\n\
         They were told: {answer}\n\n\
         Suggest three short follow-up questions the user might ask next. \
         Reply with one question per line and nothing else."
    )
}

/// Parse a model's follow-up list: one per line, bullets and numbering
/// stripped, at most three.
pub fn parse_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .take(3)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim().trim_start_matches(['-', '*', '•']).trim_start();
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(['.', ')']) {
            return rest.trim();
        }
    }
    line.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_renders_all_parts() {
        let prompt = PromptTemplate::default().render("CTX", "HIST", "What is it?");
        assert!(prompt.starts_with("You are a knowledgeable chatbot"));
        assert!(prompt.contains("Context: CTX\n"));
        assert!(prompt.contains("History: HIST\n"));
        assert!(prompt.contains("User: What is it?\n"));
        assert!(prompt.ends_with("Chatbot:"));
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let err = PromptTemplate::new("Q: {question} {docs}").unwrap_err();
        assert!(matches!(err, GeneratorError::Template(m) if m.contains("{docs}")));
    }

    #[test]
    fn test_question_required() {
        assert!(PromptTemplate::new("Context: {context}").is_err());
    }

    #[test]
    fn test_unbalanced_braces_rejected() {
        assert!(PromptTemplate::new("{question").is_err());
        assert!(PromptTemplate::new("{question} }").is_err());
    }

    #[test]
    fn test_escaped_braces() {
        let template = PromptTemplate::new("Reply as {{\"answer\": ...}} to {question}").unwrap();
        assert_eq!(
            template.render("", "", "Q"),
            "Reply as {\"answer\": ...} to Q"
        );
    }

    #[test]
    fn test_placeholder_values_are_not_reinterpreted() {
        let template = PromptTemplate::new("{context}|{question}").unwrap();
        assert_eq!(template.render("{question}", "", "q"), "{question}|q");
    }

    #[test]
    fn test_from_option() {
        assert_eq!(
            PromptTemplate::from_option(None).unwrap(),
            PromptTemplate::default()
        );
        let custom = PromptTemplate::from_option(Some("Q: {question}")).unwrap();
        assert_eq!(custom.as_str(), "Q: {question}");
    }

    #[test]
    fn test_parse_suggestions() {
        let text = "1. What about returns?\n- How long is shipping?\n\n* Who pays postage?\n4) Extra";
        assert_eq!(
            parse_suggestions(text),
            vec![
                "What about returns?",
                "How long is shipping?",
                "Who pays postage?"
            ]
        );
        assert!(parse_suggestions("  \n ").is_empty());
        assert_eq!(parse_suggestions("2024 filing dates?"), vec!["2024 filing dates?"]);
    }
}
