use crate::llm::ChatMessage;

/// Characters per approximate token
const CHARS_PER_TOKEN: usize = 2;

/// Estimate tokens for a message (rough approximation: ~2 chars = 1 token)
pub fn estimate_tokens(message: &ChatMessage) -> usize {
    message.content.chars().count() / CHARS_PER_TOKEN
}

/// Keep the newest messages that fit in `max_tokens`.
///
/// Input within budget is returned unchanged. Otherwise messages are taken
/// from the end while the running total fits; the first message that would
/// overflow stops the walk, so earlier context (system prompts included) is
/// dropped. A newest message larger than the whole budget yields an empty
/// result.
pub fn truncate(messages: Vec<ChatMessage>, max_tokens: usize) -> Vec<ChatMessage> {
    // Compare in characters so odd-length messages are not rounded down
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    let char_counts: Vec<usize> = messages.iter().map(|m| m.content.chars().count()).collect();

    if char_counts.iter().sum::<usize>() <= max_chars {
        return messages;
    }

    let mut used = 0usize;
    let mut keep_from = messages.len();
    for (i, chars) in char_counts.iter().enumerate().rev() {
        if used + chars > max_chars {
            break;
        }
        used += chars;
        keep_from = i;
    }

    let dropped = keep_from;
    let kept: Vec<ChatMessage> = messages.into_iter().skip(keep_from).collect();

    tracing::debug!(
        "Context over budget: dropped {} oldest messages, kept {} (~{} tokens of {})",
        dropped,
        kept.len(),
        used / CHARS_PER_TOKEN,
        max_tokens
    );

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(chars: usize) -> ChatMessage {
        ChatMessage::user("x".repeat(chars))
    }

    #[test]
    fn test_within_budget_is_unchanged() {
        let messages = vec![ChatMessage::system("abcd"), message(6)];
        assert_eq!(truncate(messages.clone(), 5), messages);
    }

    #[test]
    fn test_keeps_newest_that_fit() {
        let messages: Vec<ChatMessage> = (0..4)
            .map(|i| ChatMessage::user(format!("message-{}", i)))
            .collect();
        assert!(messages.iter().all(|m| m.content.len() == 9));

        let kept = truncate(
            vec![message(10), message(10), message(10), message(10)],
            12,
        );
        assert_eq!(kept.len(), 2);

        let kept = truncate(messages, 10);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].content, "message-2");
        assert_eq!(kept[1].content, "message-3");
    }

    #[test]
    fn test_stops_at_first_overflow() {
        // The small oldest message would fit, but the walk stops at the big one
        let messages = vec![message(2), message(100), message(4)];
        let kept = truncate(messages, 10);
        assert_eq!(kept, vec![message(4)]);
    }

    #[test]
    fn test_oversized_newest_message_yields_empty() {
        let kept = truncate(vec![message(4), message(50)], 10);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let message = ChatMessage::user("你好你好");
        assert_eq!(estimate_tokens(&message), 2);
        assert_eq!(truncate(vec![message.clone()], 2), vec![message]);
    }
}
