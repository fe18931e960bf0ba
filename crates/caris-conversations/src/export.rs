//! Transcript rendering for conversation exports

use crate::types::RoomSnapshot;
use std::fmt::Write;

/// Render a snapshot as a human-readable transcript
///
/// Messages appear oldest first with timestamp and sender, followed by a
/// file list when the room has attachments.
pub fn render_transcript(snapshot: &RoomSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Conversation: {}", snapshot.room_name);
    let _ = writeln!(
        out,
        "Exported: {}",
        snapshot.taken_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "{} message(s), {} file(s)",
        snapshot.messages.len(),
        snapshot.attachments.len()
    );
    let _ = writeln!(out);

    for message in &snapshot.messages {
        let _ = writeln!(
            out,
            "[{}] {}: {}",
            message.sent_at.format("%Y-%m-%d %H:%M"),
            message.sender_name,
            message.content
        );
    }

    if !snapshot.attachments.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Files:");
        for attachment in &snapshot.attachments {
            let _ = writeln!(
                out,
                "- {} (uploaded {})",
                attachment.filename,
                attachment.uploaded_at.format("%Y-%m-%d")
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatAttachment, ChatMessage};
    use uuid::Uuid;

    #[test]
    fn test_transcript_lists_messages_and_files() {
        let sender = Uuid::new_v4();
        let snapshot = RoomSnapshot {
            room_id: Uuid::new_v4(),
            room_name: "Therapy check-in".into(),
            taken_at: "2025-04-01T10:00:00Z".parse().unwrap(),
            messages: vec![ChatMessage {
                id: Uuid::new_v4(),
                sender_id: sender,
                sender_name: "Ana".into(),
                content: "How was your week?".into(),
                sent_at: "2025-03-30T09:15:00Z".parse().unwrap(),
                ephemeral: false,
            }],
            attachments: vec![ChatAttachment {
                id: Uuid::new_v4(),
                filename: "exercise-plan.pdf".into(),
                storage_path: "uploads/exercise-plan.pdf".into(),
                uploaded_by: sender,
                uploaded_at: "2025-03-30T09:20:00Z".parse().unwrap(),
            }],
        };

        let transcript = render_transcript(&snapshot);
        assert!(transcript.contains("Conversation: Therapy check-in"));
        assert!(transcript.contains("[2025-03-30 09:15] Ana: How was your week?"));
        assert!(transcript.contains("- exercise-plan.pdf (uploaded 2025-03-30)"));
        assert!(transcript.contains("1 message(s), 1 file(s)"));
    }
}
