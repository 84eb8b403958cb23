use crate::models::Conversation;

pub fn filter_conversations<'a>(conversations: &'a [Conversation], query: &str) -> Vec<&'a Conversation> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return conversations.iter().collect();
    }
    conversations
        .iter()
        .filter(|conversation| matches(conversation, &needle))
        .collect()
}

fn matches(conversation: &Conversation, needle: &str) -> bool {
    let user = &conversation.other_user;
    user.display_name().to_lowercase().contains(needle)
        || user
            .company
            .as_deref()
            .is_some_and(|company| company.to_lowercase().contains(needle))
        || conversation.last_message.to_lowercase().contains(needle)
}
