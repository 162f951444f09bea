//! First-run data: the live bot config row, the built-in command registry,
//! a few authorized channels and a starter knowledge base.

use lorebot_schema::{AuthorizedChannel, CommandDefinition, NewKnowledgeEntry};

fn command(name: &str, description: &str, usage: &str) -> CommandDefinition {
    CommandDefinition {
        name: name.to_string(),
        description: description.to_string(),
        usage: usage.to_string(),
        enabled: true,
    }
}

pub fn default_commands() -> Vec<CommandDefinition> {
    vec![
        command("ask", "Ask a question about Ahmadiyya", "ask [question]"),
        command(
            "quote",
            "Get a random quote from Ahmadiyya texts",
            "quote [optional category]",
        ),
        command("history", "Learn about Ahmadiyya history", "history [topic]"),
        command(
            "beliefs",
            "Explain Ahmadiyya beliefs on a topic",
            "beliefs [topic]",
        ),
        command("help", "Show available commands", "help"),
    ]
}

pub fn default_channels() -> Vec<AuthorizedChannel> {
    [
        ("12345", "general"),
        ("67890", "ahmadiyya-discussion"),
        ("24680", "bot-commands"),
    ]
    .into_iter()
    .map(|(id, name)| AuthorizedChannel {
        channel_id: id.to_string(),
        channel_name: name.to_string(),
    })
    .collect()
}

fn entry(
    topic: &str,
    category: &str,
    question: &str,
    answer: &str,
    source: &str,
    tags: &[&str],
) -> NewKnowledgeEntry {
    NewKnowledgeEntry {
        topic: topic.to_string(),
        category: category.to_string(),
        question: question.to_string(),
        answer: answer.to_string(),
        source: Some(source.to_string()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn default_knowledge() -> Vec<NewKnowledgeEntry> {
    vec![
        entry(
            "Founder",
            "History",
            "Who was the founder of the Ahmadiyya Muslim Community?",
            "The Ahmadiyya Muslim Community was founded by Mirza Ghulam Ahmad (1835-1908) in 1889 in Qadian, India. He claimed to be the promised Messiah and Mahdi awaited by Muslims, as well as the metaphorical second coming of Jesus Christ awaited by Christians and the manifestation of Krishna for Hindus.",
            "\"Invitation to Ahmadiyyat\" by Mirza Bashir-ud-Din Mahmud Ahmad, p.15-17",
            &["founder", "Mirza Ghulam Ahmad", "Promised Messiah", "Mahdi", "history"],
        ),
        entry(
            "Khilafat",
            "Beliefs",
            "What is the Ahmadiyya belief about Khilafat?",
            "In Ahmadiyya Islam, Khilafat refers to the spiritual institution of successorship that began after the death of Mirza Ghulam Ahmad in 1908. The Khalifa (successor) is believed to be divinely guided and serves as the spiritual and administrative head of the community. The community follows a system of elected Khilafat, where the successor is chosen by an electoral college. Currently, the fifth Khalifa, Mirza Masroor Ahmad, leads the community since 2003.",
            "\"The Institution of Khilafat\" published by The Review of Religions, 2008",
            &["khilafat", "khalifa", "successorship", "leadership", "beliefs"],
        ),
        entry(
            "Jesus",
            "Beliefs",
            "What do Ahmadis believe about Jesus?",
            "Ahmadiyya Muslims believe that Jesus (Isa) did not die on the cross but survived the crucifixion and migrated to Kashmir, India, where he continued his mission to the lost tribes of Israel and eventually died a natural death at an old age. They believe his tomb is located at the Roza Bal shrine in Srinagar, Kashmir. Ahmadis do not believe in Jesus's physical ascension to heaven but rather a spiritual one.",
            "\"Jesus in India\" by Mirza Ghulam Ahmad",
            &["Jesus", "Isa", "crucifixion", "kashmir", "survival", "beliefs"],
        ),
        entry(
            "Finality of Prophethood",
            "Beliefs",
            "What is the Ahmadiyya view on the finality of prophethood?",
            "Ahmadiyya Muslims believe that Muhammad is the Seal of the Prophets (Khatam an-Nabiyyin) and no new law-bearing prophet can come after him. However, they distinguish between law-bearing prophets and non-law-bearing prophets. They believe that non-law-bearing prophets can come as subordinates to Muhammad, reflecting his prophethood. They consider Mirza Ghulam Ahmad as a non-law-bearing prophet who came in complete submission to the Prophet Muhammad and his teachings.",
            "\"The Essence of Islam, Vol. IV\" by Mirza Ghulam Ahmad",
            &["prophethood", "khatam", "Muhammad", "seal", "beliefs"],
        ),
        entry(
            "Jihad",
            "Beliefs",
            "What is the Ahmadiyya perspective on Jihad?",
            "Ahmadiyya Muslims interpret Jihad primarily as a peaceful struggle for self-reformation and spreading Islam through argumentation and rational discourse, rather than through violence or military means. They emphasize 'Jihad of the Pen' over 'Jihad of the Sword,' believing that in the modern age, defending and promoting Islam should be done through writing, dialogue, and peaceful means rather than warfare. They categorically reject terrorism and violent extremism as having no place in Islamic teachings.",
            "\"The True Islamic Concept of Jihad\" by Mirza Tahir Ahmad",
            &["jihad", "peace", "non-violence", "beliefs"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_commands_cover_every_handler() {
        let names: Vec<_> = default_commands().into_iter().map(|c| c.name).collect();
        for expected in ["ask", "quote", "history", "beliefs", "help"] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn default_usages_carry_no_prefix() {
        assert!(default_commands().iter().all(|c| !c.usage.starts_with('!')));
    }

    #[test]
    fn default_knowledge_entries_are_cited() {
        let entries = default_knowledge();
        assert_eq!(entries.len(), 5);
        assert!(entries.iter().all(|e| e.source.is_some() && !e.tags.is_empty()));
    }
}
