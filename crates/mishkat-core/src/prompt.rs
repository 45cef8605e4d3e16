//! Prompt assembly.
//!
//! Builds the three-part chat prompt (system, user, assistant template) for
//! a [`LanguageProfile`] and the condensation prompt that rewrites a
//! follow-up question into a standalone one.
//!
//! All placeholder filling goes through [`substitute`], which makes a single
//! left-to-right pass over the template. Inserted values are copied verbatim
//! and never scanned again, so retrieved text containing `{`, `}` or
//! something that looks like `{question}` cannot alter the rest of the
//! prompt.

use crate::language::LanguageProfile;
use crate::models::{ChatMessage, ChatTurn};

/// Placeholder for retrieved context in system templates.
pub const CONTEXT_PLACEHOLDER: &str = "context_str";
/// Placeholder for the language display name in system templates.
pub const LANGUAGE_PLACEHOLDER: &str = "query_language";
/// Placeholder for the generated answer in the assistant template.
pub const RESPONSE_PLACEHOLDER: &str = "response";

pub const CONDENSE_TEMPLATE: &str = "Given a conversation (between Human and Assistant) and a follow up message from Human, rewrite the message to be a standalone question that captures all relevant context from the conversation.

<Chat History>
{chat_history}

<Follow Up Message>
{question}

<Standalone question>
";

/// Replace `{name}` placeholders in `template` with their values.
///
/// A placeholder is `{` followed by ASCII letters, digits or `_`, then `}`.
/// Names not present in `vars` are left as they are. Values are inserted
/// as-is and are not themselves searched for placeholders.
pub fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let extra: usize = vars.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..name_len];

        if !name.is_empty() && after[name_len..].starts_with('}') {
            if let Some((_, value)) = vars.iter().find(|(k, _)| *k == name) {
                out.push_str(value);
                rest = &after[name_len + 1..];
                continue;
            }
        }

        out.push('{');
        rest = after;
    }

    out.push_str(rest);
    out
}

/// The prompt for one chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub profile: LanguageProfile,
    /// System instruction with context and language filled in.
    pub system: String,
    /// The question, verbatim.
    pub user: String,
    /// Response prefix followed by a `{response}` slot.
    pub assistant_template: String,
}

impl ChatPrompt {
    pub fn build(profile: LanguageProfile, context: &str, question: &str) -> Self {
        let system = substitute(
            profile.system_template(),
            &[
                (CONTEXT_PLACEHOLDER, context),
                (LANGUAGE_PLACEHOLDER, profile.display_name()),
            ],
        );
        Self {
            profile,
            system,
            user: question.to_string(),
            assistant_template: format!("{}{{{}}}", profile.response_prefix(), RESPONSE_PLACEHOLDER),
        }
    }

    /// Messages sent to the model: the system instruction and the user turn.
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system.clone()),
            ChatMessage::user(self.user.clone()),
        ]
    }

    /// The full assistant reply for a given model answer.
    pub fn render_assistant(&self, answer: &str) -> String {
        substitute(&self.assistant_template, &[(RESPONSE_PLACEHOLDER, answer)])
    }
}

/// Render history as alternating `Human:` / `Assistant:` lines.
pub fn render_history(history: &[ChatTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("Human: {}\nAssistant: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The single-message request asking the model for a standalone question.
pub fn condense_messages(history: &[ChatTurn], question: &str) -> Vec<ChatMessage> {
    let chat_history = render_history(history);
    vec![ChatMessage::user(substitute(
        CONDENSE_TEMPLATE,
        &[("chat_history", &chat_history), ("question", question)],
    ))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn substitutes_known_names() {
        let out = substitute("a {x} b {y}", &[("x", "1"), ("y", "2")]);
        assert_eq!(out, "a 1 b 2");
    }

    #[test]
    fn leaves_unknown_and_malformed_braces() {
        let out = substitute("{x} {unknown} {} { x } {x", &[("x", "1")]);
        assert_eq!(out, "1 {unknown} {} { x } {x");
    }

    #[test]
    fn doubled_brace_before_placeholder() {
        assert_eq!(substitute("{{x}}", &[("x", "1")]), "{1}");
    }

    #[test]
    fn inserted_values_are_not_rescanned() {
        let out = substitute(
            "ctx=[{context_str}] lang=[{query_language}]",
            &[
                ("context_str", "{query_language} and {context_str} }{"),
                ("query_language", "Urdu"),
            ],
        );
        assert_eq!(
            out,
            "ctx=[{query_language} and {context_str} }{] lang=[Urdu]"
        );
    }

    #[test]
    fn system_prompt_contains_context_verbatim() {
        let nasty = "fn main() { println!(\"{}\", x); } {question} {{context_str}} {response}";
        for profile in LanguageProfile::ALL {
            let prompt = ChatPrompt::build(profile, nasty, "What is salah?");
            assert!(prompt.system.contains(nasty));
            assert!(!prompt.system.contains("{context_str}\n"));
            assert_eq!(prompt.user, "What is salah?");
        }
    }

    #[test]
    fn rest_of_template_unchanged_by_context() {
        let plain = ChatPrompt::build(LanguageProfile::English, "CTX", "q");
        let nasty = ChatPrompt::build(LanguageProfile::English, "{query_language}", "q");
        assert_eq!(
            plain.system.replacen("CTX", "{query_language}", 1),
            nasty.system
        );
        assert!(plain.system.contains("The query language is: English"));
    }

    #[test]
    fn assistant_template_starts_with_prefix() {
        let prompt = ChatPrompt::build(LanguageProfile::Arabic, "", "سؤال");
        assert!(prompt
            .assistant_template
            .starts_with(LanguageProfile::Arabic.response_prefix()));
        assert!(prompt.assistant_template.ends_with("{response}"));
        let rendered = prompt.render_assistant("answer with {response} inside");
        assert_eq!(
            rendered,
            format!(
                "{}answer with {{response}} inside",
                LanguageProfile::Arabic.response_prefix()
            )
        );
    }

    #[test]
    fn messages_are_system_then_user() {
        let prompt = ChatPrompt::build(LanguageProfile::Urdu, "ctx", "سوال");
        let msgs = prompt.messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[1].role, Role::User);
        assert_eq!(msgs[1].content, "سوال");
    }

    #[test]
    fn condense_prompt_renders_history() {
        let history = vec![
            ChatTurn::new("Who compiled Sahih Bukhari?", "Imam al-Bukhari."),
            ChatTurn::new("Where was he born?", "In Bukhara."),
        ];
        let msgs = condense_messages(&history, "When did he die?");
        assert_eq!(msgs.len(), 1);
        let body = &msgs[0].content;
        assert!(body.contains(
            "Human: Who compiled Sahih Bukhari?\nAssistant: Imam al-Bukhari.\nHuman: Where was he born?"
        ));
        assert!(body.contains("<Follow Up Message>\nWhen did he die?"));
        assert!(!body.contains("{chat_history}"));
    }
}
