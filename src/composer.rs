// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Summary composition.
//!
//! Turns reconstructed records, AI insights and transcript text into the
//! markdown title/body pairs that are published and filed as issues.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::{MeetingDetails, MeetingInsights, Summary};
use crate::reconstruct::DecryptedRecord;

/// Issue bodies are limited upstream; leave room for the summary around it.
pub const MAX_TRANSCRIPT_BODY_CHARS: usize = 60_000;

const SUMMARIZED_SENTENCE_MIN_CHARS: usize = 10;
const KEY_POINT_MIN_CHARS: usize = 50;
const MAX_LISTED_POINTS: usize = 3;

const ACTION_WORDS: &[&str] = &[
    "action",
    "todo",
    "follow up",
    "next step",
    "assign",
    "responsible",
    "deadline",
    "complete",
    "finish",
];

const DECISION_WORDS: &[&str] = &[
    "decide",
    "agreed",
    "conclusion",
    "final",
    "approve",
    "confirm",
    "resolution",
];

fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn duration_minutes(start: Option<&str>, end: Option<&str>) -> Option<i64> {
    let (start, end) = (parse_time(start)?, parse_time(end)?);
    let seconds = (end - start).num_seconds();
    Some((seconds as f64 / 60.0).round() as i64)
}

fn display_date(value: Option<&str>) -> String {
    parse_time(value)
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%d")
        .to_string()
}

fn display_time(value: &str) -> String {
    parse_time(Some(value))
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Meeting facts carried by a reconstructed record.
pub fn meeting_details(record: &DecryptedRecord) -> MeetingDetails {
    MeetingDetails {
        organizer: record.organizer_display_name().map(str::to_string),
        start_time: record.created_date_time.clone(),
        end_time: record.end_date_time.clone(),
        duration_minutes: duration_minutes(
            record.created_date_time.as_deref(),
            record.end_date_time.as_deref(),
        ),
        meeting_id: record.meeting_id.clone(),
        call_id: record.call_id.clone(),
        transcript_id: record.id.clone(),
        content_correlation_id: record.content_correlation_id.clone(),
        ai_insight_id: None,
    }
}

/// Summary published as soon as a notification is reconstructed.
pub fn interim(record: &DecryptedRecord) -> Summary {
    let details = meeting_details(record);

    let mut lines = Vec::new();
    let mut push = |label: &str, value: Option<String>| {
        if let Some(value) = value {
            lines.push(format!("- **{label}**: {value}"));
        }
    };
    push(
        "Organizer",
        details
            .organizer
            .clone()
            .or_else(|| record.organizer_user_id().map(str::to_string)),
    );
    push("Start Time", details.start_time.as_deref().map(display_time));
    push("End Time", details.end_time.as_deref().map(display_time));
    push(
        "Duration",
        details.duration_minutes.map(|m| format!("{m} minutes")),
    );
    push("Meeting ID", details.meeting_id.clone());
    push("Call ID", details.call_id.clone());
    push("Transcript ID", details.transcript_id.clone());
    push("Content URL", record.transcript_content_url.clone());

    let mut body = String::from(
        "## Meeting Summary\n\n\
         **Meeting completed with transcript available.**\n\n\
         Fetching the AI-generated summary or the transcript content. \
         This summary is updated automatically once enrichment completes.",
    );
    if !lines.is_empty() {
        body.push_str("\n\n### Meeting Details\n\n");
        body.push_str(&lines.join("\n"));
    }

    let mut summary = Summary::new(
        format!(
            "Meeting Transcript - {}",
            display_date(record.created_date_time.as_deref())
        ),
        body,
    );
    summary.is_metadata_only = true;
    summary.content_reference_url = record.transcript_content_url.clone();
    summary.source_key = record.source_key();
    summary.meeting_details = Some(details);
    summary.provenance = record.to_provenance();
    summary
}

/// Summary built from AI-generated meeting insights.
pub fn from_insights(insights: &MeetingInsights, record: Option<&DecryptedRecord>) -> Summary {
    let start = record
        .and_then(|r| r.created_date_time.as_deref())
        .or(insights.created_date_time.as_deref());
    let end = record
        .and_then(|r| r.end_date_time.as_deref())
        .or(insights.end_date_time.as_deref());
    let duration = duration_minutes(start, end);
    let date = display_date(start);

    let mut sections: Vec<String> = Vec::new();

    if !insights.meeting_notes.is_empty() {
        let mut section = String::from("## Meeting Notes\n\n");
        for (index, note) in insights.meeting_notes.iter().enumerate() {
            section.push_str(&format!("### {}. {}\n{}\n\n", index + 1, note.title, note.text));
            for subpoint in &note.subpoints {
                section.push_str(&format!("- **{}**: {}\n", subpoint.title, subpoint.text));
            }
            if !note.subpoints.is_empty() {
                section.push('\n');
            }
        }
        sections.push(section);
    }

    if !insights.action_items.is_empty() {
        let mut section = String::from("## Action Items\n\n");
        for (index, item) in insights.action_items.iter().enumerate() {
            section.push_str(&format!(
                "### {}. {}\n**Description**: {}\n",
                index + 1,
                item.title,
                item.text
            ));
            if let Some(owner) = &item.owner_display_name {
                section.push_str(&format!("**Assigned to**: {owner}\n"));
            }
            section.push('\n');
        }
        sections.push(section);
    }

    let mentions = insights.mention_events();
    if !mentions.is_empty() {
        let mut section = String::from("## Key Mentions\n\n");
        for (index, mention) in mentions.iter().enumerate() {
            let speaker = mention
                .speaker
                .as_ref()
                .and_then(|s| s.user.as_ref())
                .and_then(|u| u.display_name.as_deref())
                .unwrap_or("Unknown Speaker");
            let when = mention
                .event_date_time
                .as_deref()
                .map(display_time)
                .unwrap_or_else(|| "an unknown time".to_string());
            section.push_str(&format!(
                "### {}. Mentioned at {}\n**Speaker**: {}\n**Quote**: \"{}\"\n\n",
                index + 1,
                when,
                speaker,
                mention.transcript_utterance.as_deref().unwrap_or_default()
            ));
        }
        sections.push(section);
    }

    let body = if sections.is_empty() {
        let length = duration
            .map(|m| format!(" with a duration of {m} minutes"))
            .unwrap_or_default();
        format!(
            "## Meeting Summary\n\nMeeting completed on {date}{length}.\n\n\
             *AI-generated content will be available once processed.*"
        )
    } else {
        sections.concat().trim_end().to_string()
    };

    let title = match duration {
        Some(minutes) => format!("Meeting Summary - {date} ({minutes}min)"),
        None => format!("Meeting Summary - {date}"),
    };

    let mut details = record.map(meeting_details).unwrap_or_default();
    details.start_time = details.start_time.or(insights.created_date_time.clone());
    details.end_time = details.end_time.or(insights.end_date_time.clone());
    details.duration_minutes = duration;
    details.call_id = details.call_id.or(insights.call_id.clone());
    details.content_correlation_id = details
        .content_correlation_id
        .or(insights.content_correlation_id.clone());
    details.ai_insight_id = Some(insights.id.clone()).filter(|id| !id.is_empty());

    let mut summary = Summary::new(title, body);
    summary.has_insights = true;
    summary.insights = Some(insights.clone());
    summary.meeting_details = Some(details);
    if let Some(record) = record {
        summary.source_key = record.source_key();
        summary.content_reference_url = record.transcript_content_url.clone();
        summary.provenance = record.to_provenance();
    }
    summary
}

/// Appended body section for a fetched transcript, capped to fit the issue
/// tracker's body limit.
pub fn transcript_section(text: &str) -> String {
    let mut section = String::from("\n\n## Transcript\n\n");
    match text.char_indices().nth(MAX_TRANSCRIPT_BODY_CHARS) {
        Some((cut, _)) => {
            section.push_str(&text[..cut]);
            section.push_str("\n\n*Transcript truncated.*");
        }
        None => section.push_str(text),
    }
    section
}

/// Heuristic summary of free-form transcript text.
pub fn summarize_text(text: &str) -> String {
    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().count() > SUMMARIZED_SENTENCE_MIN_CHARS)
        .collect();

    let mut key_points = Vec::new();
    let mut action_items = Vec::new();
    for sentence in &sentences {
        let lower = sentence.to_lowercase();
        if ACTION_WORDS.iter().any(|w| lower.contains(w)) {
            action_items.push(*sentence);
        } else if DECISION_WORDS.iter().any(|w| lower.contains(w))
            || sentence.chars().count() > KEY_POINT_MIN_CHARS
        {
            key_points.push(*sentence);
        }
    }

    let numbered = |heading: &str, items: &[&str]| {
        let mut block = format!("**{heading}:**\n");
        for (index, item) in items.iter().take(MAX_LISTED_POINTS).enumerate() {
            block.push_str(&format!("{}. {}\n", index + 1, item));
        }
        block
    };

    let mut blocks = Vec::new();
    if !key_points.is_empty() {
        blocks.push(numbered("Key Discussion Points", &key_points));
    }
    if !action_items.is_empty() {
        blocks.push(numbered("Action Items", &action_items));
    }

    if blocks.is_empty() {
        let overview = sentences
            .iter()
            .take(2)
            .copied()
            .collect::<Vec<_>>()
            .join(". ");
        let overview = if overview.is_empty() {
            "Meeting discussion covered various topics.".to_string()
        } else {
            overview
        };
        let words = text.split_whitespace().count();
        return format!(
            "**Meeting Overview:**\n{overview}\n\n**Meeting Statistics:**\n- Content: {words} words of discussion"
        );
    }

    blocks.join("\n").trim_end().to_string()
}

fn transcript_summary(text: &str, participants: &[String], organizer: Option<&str>) -> Summary {
    let mut header = String::new();
    if let Some(organizer) = organizer {
        header.push_str(&format!("Organizer: {organizer}\n"));
    }
    if !participants.is_empty() {
        header.push_str(&format!("Participants: {}\n", participants.join(", ")));
    }
    if !header.is_empty() {
        header.push('\n');
    }

    let body = format!(
        "## Meeting Summary\n\n{header}{}\n\n*Summary generated from the meeting transcript.*",
        summarize_text(text)
    );

    let mut summary = Summary::new(
        format!("Meeting Summary - {}", Utc::now().format("%Y-%m-%d")),
        body,
    );
    summary.has_enriched_content = true;
    summary.transcript = Some(text.to_string());
    summary
}

/// Summary built from a fetched transcript: heuristic summary followed by the
/// (capped) transcript itself.
pub fn from_transcript(text: &str, record: Option<&DecryptedRecord>) -> Summary {
    let organizer = record.and_then(DecryptedRecord::organizer_display_name);
    let mut summary = transcript_summary(text, &[], organizer);
    summary.body.push_str(&transcript_section(text));

    if let Some(record) = record {
        summary.title = format!(
            "Meeting Summary - {}",
            display_date(record.created_date_time.as_deref())
        );
        summary.source_key = record.source_key();
        summary.content_reference_url = record.transcript_content_url.clone();
        summary.meeting_details = Some(meeting_details(record));
        summary.provenance = record.to_provenance();
    }
    summary
}

fn collect_content(items: Option<&Value>) -> String {
    items
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("content").and_then(Value::as_str))
                .map(|content| format!("{content}\n"))
                .collect()
        })
        .unwrap_or_default()
}

fn display_names(items: Option<&Value>) -> Vec<String> {
    items
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|p| {
                    p.get("displayName")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown")
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Summary for a plaintext `resourceData` notification, if it carries
/// anything usable.
pub fn from_resource_data(data: &Value) -> Option<Summary> {
    if data.get("transcriptContentUrl").is_some() {
        let record: DecryptedRecord = serde_json::from_value(data.clone()).ok()?;
        return Some(interim(&record));
    }

    let text = if let Some(content) = data.get("content").and_then(Value::as_str) {
        content.to_string()
    } else if data.get("transcripts").is_some() {
        collect_content(data.get("transcripts"))
    } else if let Some(content) = data.as_str() {
        content.to_string()
    } else if data.get("callRecords").is_some() {
        collect_content(data.get("callRecords"))
    } else if let Some(user) = data.get("user") {
        let name = user
            .get("displayName")
            .and_then(Value::as_str)
            .unwrap_or("Unknown User");
        let mut summary = Summary::new(
            format!("Meeting Summary - {}", Utc::now().format("%Y-%m-%d")),
            format!(
                "## Meeting Summary\n\nMeeting transcript notification received for user: {name}\n\n\
                 *This summary is updated automatically once meeting content is processed.*"
            ),
        );
        summary.is_metadata_only = true;
        summary.source_key = user
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);
        return Some(summary);
    } else {
        return None;
    };

    if text.trim().is_empty() {
        return None;
    }

    let organizer = data
        .get("organizer")
        .map(|o| o.get("displayName").and_then(Value::as_str).unwrap_or("Unknown"));
    Some(transcript_summary(
        &text,
        &display_names(data.get("participants")),
        organizer,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionItem, MeetingNote, MeetingNoteSubpoint, MentionEvent, Viewpoint};
    use crate::reconstruct::{MeetingOrganizer, OrganizerUser};
    use serde_json::json;

    fn record() -> DecryptedRecord {
        DecryptedRecord {
            id: Some("transcript-1".into()),
            meeting_id: Some("meeting-1".into()),
            call_id: Some("call-1".into()),
            transcript_content_url: Some("https://graph/transcripts/1/content".into()),
            created_date_time: Some("2026-03-02T10:00:00Z".into()),
            end_date_time: Some("2026-03-02T10:45:20Z".into()),
            meeting_organizer: Some(MeetingOrganizer {
                user: Some(OrganizerUser {
                    id: Some("user-1".into()),
                    display_name: Some("Ada Lovelace".into()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn interim_lists_available_metadata() {
        let summary = interim(&record());
        assert_eq!(summary.title, "Meeting Transcript - 2026-03-02");
        assert!(summary.is_metadata_only);
        assert!(!summary.is_enriched());
        assert!(summary.body.contains("- **Organizer**: Ada Lovelace"));
        assert!(summary.body.contains("- **Duration**: 45 minutes"));
        assert!(summary
            .body
            .contains("- **Content URL**: https://graph/transcripts/1/content"));
        assert_eq!(summary.source_key.as_deref(), Some("transcript-1"));
        assert_eq!(
            summary.content_reference_url.as_deref(),
            Some("https://graph/transcripts/1/content")
        );
        assert!(summary.provenance.unwrap().contains("transcript-1"));
    }

    #[test]
    fn interim_skips_missing_fields() {
        let sparse = DecryptedRecord {
            id: Some("t".into()),
            ..Default::default()
        };
        let summary = interim(&sparse);
        assert!(!summary.body.contains("Organizer"));
        assert!(!summary.body.contains("Duration"));
        assert!(summary.body.contains("- **Transcript ID**: t"));
    }

    #[test]
    fn insights_summary_has_all_sections() {
        let insights = MeetingInsights {
            id: "insight-1".into(),
            meeting_notes: vec![MeetingNote {
                title: "Roadmap".into(),
                text: "Discussed Q3 priorities".into(),
                subpoints: vec![MeetingNoteSubpoint {
                    title: "Hiring".into(),
                    text: "Two roles approved".into(),
                }],
            }],
            action_items: vec![ActionItem {
                title: "Draft plan".into(),
                text: "Write the Q3 plan".into(),
                owner_display_name: Some("Alan".into()),
            }],
            viewpoint: Some(Viewpoint {
                mention_events: vec![MentionEvent {
                    transcript_utterance: Some("Ada, can you review?".into()),
                    ..Default::default()
                }],
            }),
            ..Default::default()
        };

        let summary = from_insights(&insights, Some(&record()));
        assert_eq!(summary.title, "Meeting Summary - 2026-03-02 (45min)");
        assert!(summary.has_insights);
        assert!(!summary.is_metadata_only);
        assert!(summary.body.starts_with("## Meeting Notes"));
        assert!(summary.body.contains("### 1. Roadmap"));
        assert!(summary.body.contains("- **Hiring**: Two roles approved"));
        assert!(summary.body.contains("**Assigned to**: Alan"));
        assert!(summary.body.contains("**Speaker**: Unknown Speaker"));
        assert!(summary.body.contains("\"Ada, can you review?\""));
        let details = summary.meeting_details.unwrap();
        assert_eq!(details.ai_insight_id.as_deref(), Some("insight-1"));
        assert_eq!(details.meeting_id.as_deref(), Some("meeting-1"));
        assert_eq!(summary.source_key.as_deref(), Some("transcript-1"));
    }

    #[test]
    fn empty_insights_get_fallback_paragraph() {
        let insights = MeetingInsights {
            id: "insight-2".into(),
            created_date_time: Some("2026-03-02T10:00:00Z".into()),
            end_date_time: Some("2026-03-02T10:30:00Z".into()),
            ..Default::default()
        };
        let summary = from_insights(&insights, None);
        assert!(summary
            .body
            .contains("Meeting completed on 2026-03-02 with a duration of 30 minutes."));
        assert!(summary.source_key.is_none());
    }

    #[test]
    fn transcript_section_caps_length() {
        let short = transcript_section("Ada: hi");
        assert!(short.ends_with("Ada: hi"));

        let long = "é".repeat(MAX_TRANSCRIPT_BODY_CHARS + 10);
        let section = transcript_section(&long);
        assert!(section.ends_with("*Transcript truncated.*"));
        assert!(section.chars().count() < MAX_TRANSCRIPT_BODY_CHARS + 100);
    }

    #[test]
    fn transcript_summary_appends_transcript() {
        let text = "Ada Lovelace: We agreed to move the launch to Friday.\nAlan Turing: I will follow up with marketing.";
        let summary = from_transcript(text, Some(&record()));
        assert_eq!(summary.title, "Meeting Summary - 2026-03-02");
        assert!(summary.has_enriched_content);
        assert!(!summary.has_insights);
        assert!(summary.body.contains("Organizer: Ada Lovelace"));
        assert!(summary.body.contains("**Action Items:**"));
        assert!(summary.body.ends_with("Alan Turing: I will follow up with marketing."));
        assert_eq!(summary.transcript.as_deref(), Some(text));
        assert_eq!(summary.source_key.as_deref(), Some("transcript-1"));
    }

    #[test]
    fn summarize_text_extracts_points_and_actions() {
        let text = "We agreed to ship the beta next month. \
                    Alan will follow up with the vendor on pricing. \
                    Short one. \
                    The migration plan needs another review pass from the infrastructure team.";
        let summary = summarize_text(text);
        assert!(summary.contains("**Key Discussion Points:**\n1. We agreed to ship the beta next month"));
        assert!(summary.contains("2. The migration plan"));
        assert!(summary.contains("**Action Items:**\n1. Alan will follow up"));
        assert!(!summary.contains("Short one"));
    }

    #[test]
    fn summarize_text_falls_back_to_overview() {
        let summary = summarize_text("Hello there all. Nice weather today");
        assert!(summary.starts_with("**Meeting Overview:**\nHello there all. Nice weather today"));
        assert!(summary.contains("6 words of discussion"));
    }

    #[test]
    fn resource_data_variants() {
        let with_url = from_resource_data(&json!({
            "id": "t1",
            "transcriptContentUrl": "https://x/y"
        }))
        .unwrap();
        assert!(with_url.is_metadata_only);
        assert_eq!(with_url.content_reference_url.as_deref(), Some("https://x/y"));

        let content = from_resource_data(&json!({
            "content": "We decided to approve the final budget for the quarter.",
            "organizer": { "displayName": "Ada" },
            "participants": [{ "displayName": "Alan" }, {}]
        }))
        .unwrap();
        assert!(content.has_enriched_content);
        assert!(content.body.contains("Organizer: Ada\nParticipants: Alan, Unknown"));

        let segments = from_resource_data(&json!({
            "transcripts": [{ "content": "First segment of the meeting talk." }, { "content": "Second segment." }]
        }))
        .unwrap();
        assert!(segments.transcript.unwrap().contains("Second segment."));

        let bare = from_resource_data(&json!("A plain transcript string that is long enough."));
        assert!(bare.is_some());

        let user = from_resource_data(&json!({ "user": { "id": "u1", "displayName": "Grace" } }))
            .unwrap();
        assert!(user.is_metadata_only);
        assert!(user.body.contains("for user: Grace"));

        assert!(from_resource_data(&json!({ "unrelated": true })).is_none());
        assert!(from_resource_data(&json!({ "content": "   " })).is_none());
    }
}
