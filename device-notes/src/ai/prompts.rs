use crate::notes::Note;

use super::ChatMessage;

/// Per-note cap on plain-text content sent to the provider in dashboard chat.
const DASHBOARD_NOTE_CHARS: usize = 2_000;

pub fn note_messages(note: &Note, prompt: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
    let system = format!(
        "You are a writing assistant inside a note-taking app. \
         Answer using the note below as context. Reply in plain text or simple HTML.\n\n\
         Title: {}\n\nContent:\n{}",
        display_title(note),
        plain_text(&note.content)
    );

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(prompt));
    messages
}

pub fn dashboard_messages(notes: &[Note], message: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut system = String::from(
        "You are an assistant that helps the user search and reason about their notes. \
         When you refer to a note, mention its title. If no note is relevant, say so.\n",
    );

    if notes.is_empty() {
        system.push_str("\nThe user has no notes yet.");
    }

    for note in notes {
        system.push_str(&format!("\n---\nNote {} \"{}\"", note.id, display_title(note)));
        if note.is_pinned {
            system.push_str(" (pinned)");
        }
        if !note.tags.is_empty() {
            system.push_str(&format!("\nTags: {}", note.tags.join(", ")));
        }
        system.push('\n');
        system.push_str(&truncate(&plain_text(&note.content), DASHBOARD_NOTE_CHARS));
    }

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(message));
    messages
}

fn display_title(note: &Note) -> &str {
    if note.title.trim().is_empty() {
        "Untitled"
    } else {
        &note.title
    }
}

/// Drops markup tags and decodes the handful of entities a rich-text editor emits.
pub fn plain_text(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut in_tag = false;
    let mut tag = String::new();

    for c in markup.chars() {
        match (in_tag, c) {
            (false, '<') => {
                in_tag = true;
                tag.clear();
            }
            (true, '>') => {
                in_tag = false;
                let name = tag.trim_start_matches('/').split_whitespace().next().unwrap_or_default();
                if matches!(name.to_ascii_lowercase().as_str(), "p" | "br" | "br/" | "div" | "li" | "h1" | "h2" | "h3")
                    && !text.ends_with('\n')
                    && !text.is_empty()
                {
                    text.push('\n');
                }
            }
            (true, c) => tag.push(c),
            (false, c) => text.push(c),
        }
    }

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
