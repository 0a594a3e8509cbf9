use crate::api::ChatMessage;
use crate::core::expert::Expert;

/// System instruction first, then the user's text exactly as typed.
///
/// Callers are expected to reject blank input before getting here.
pub fn build_messages(expert: &Expert, user_text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(expert.system_instruction.as_str()),
        ChatMessage::user(user_text),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Role;
    use crate::core::expert::ExpertRegistry;

    #[test]
    fn system_then_user_for_every_expert() {
        let registry = ExpertRegistry::builtin();
        let inputs = ["hi", "  padded input \n", "multi\nline\ttext", "日本語の質問"];

        for expert in registry.iter() {
            for input in inputs {
                let messages = build_messages(expert, input);
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].role, Role::System);
                assert_eq!(messages[0].content, expert.system_instruction);
                assert_eq!(messages[1].role, Role::User);
                assert_eq!(messages[1].content, input);
            }
        }
    }
}
