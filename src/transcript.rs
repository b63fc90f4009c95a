// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caption (WebVTT) transcript normalization.
//!
//! Transcript content fetched from the meeting service arrives as captions:
//!
//! ```text
//! WEBVTT
//!
//! 1
//! 00:00:01.000 --> 00:00:04.000
//! <v Ada Lovelace>Good morning.</v>
//! ```
//!
//! [`normalize_caption_text`] reduces this to `Speaker: text` lines.

use lazy_static::lazy_static;
use regex::Regex;

const CAPTION_HEADER: &str = "WEBVTT";
const TIMING_ARROW: &str = "-->";
const VOICE_CLOSE_TAG: &str = "</v>";

lazy_static! {
    static ref VOICE_TAG: Regex = Regex::new(r"^<v\s+([^>]+)>").unwrap();
}

fn strip_bom(text: &str) -> &str {
    text.trim_start_matches('\u{feff}')
}

/// Whether `text` is caption-formatted (starts with the `WEBVTT` header).
pub fn is_caption_format(text: &str) -> bool {
    strip_bom(text).trim_start().starts_with(CAPTION_HEADER)
}

fn is_timing_line(line: &str) -> bool {
    line.contains(TIMING_ARROW)
}

/// Reduce caption text to speaker-attributed plain lines.
///
/// Header, blank, timing and cue-identifier lines are dropped. A cue
/// identifier is a purely numeric line or any line directly followed by a
/// timing line. `<v Speaker>` sets the current speaker; untagged lines are
/// attributed to the most recent one.
pub fn normalize_caption_text(text: &str) -> String {
    let lines: Vec<&str> = strip_bom(text).lines().map(str::trim).collect();

    let mut speaker: Option<String> = None;
    let mut output: Vec<String> = Vec::new();

    for (index, raw) in lines.iter().enumerate() {
        if raw.is_empty() || raw.starts_with(CAPTION_HEADER) || is_timing_line(raw) {
            continue;
        }

        let is_cue_identifier = raw.chars().all(|c| c.is_ascii_digit())
            || lines.get(index + 1).is_some_and(|next| is_timing_line(next));
        if is_cue_identifier {
            continue;
        }

        let line = raw.replace(VOICE_CLOSE_TAG, "");
        let content = match VOICE_TAG.captures(&line) {
            Some(captures) => {
                speaker = Some(captures[1].trim().to_string());
                line[captures[0].len()..].trim().to_string()
            }
            None => line.trim().to_string(),
        };

        if content.is_empty() {
            continue;
        }

        match &speaker {
            Some(name) => output.push(format!("{name}: {content}")),
            None => output.push(content),
        }
    }

    output.join("\n")
}

/// Plain-text form of fetched transcript content.
pub fn to_plain_text(content: &str) -> String {
    if is_caption_format(content) {
        normalize_caption_text(content)
    } else {
        content.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "WEBVTT\r\n\r\n1\r\n00:00:01.000 --> 00:00:04.000\r\n<v Ada Lovelace>Good morning everyone.</v>\r\n\r\n2\r\n00:00:04.500 --> 00:00:08.000\r\n<v Alan Turing>Morning.\r\nLet us start with the roadmap.</v>\r\n\r\na1b2-c3d4/15-0\r\n00:00:09.000 --> 00:00:12.000\r\nNo voice tag on this cue.\r\n";

    #[test]
    fn detects_caption_header() {
        assert!(is_caption_format(SAMPLE));
        assert!(is_caption_format("\u{feff}WEBVTT\n\n"));
        assert!(!is_caption_format("Speaker: hello"));
    }

    #[test]
    fn strips_cues_and_attributes_speakers() {
        let normalized = normalize_caption_text(SAMPLE);
        assert_eq!(
            normalized,
            "Ada Lovelace: Good morning everyone.\n\
             Alan Turing: Morning.\n\
             Alan Turing: Let us start with the roadmap.\n\
             Alan Turing: No voice tag on this cue."
        );
    }

    #[test]
    fn untagged_lines_without_speaker_are_kept_verbatim() {
        let text = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nHello there\n";
        assert_eq!(normalize_caption_text(text), "Hello there");
    }

    #[test]
    fn empty_voice_cue_only_sets_speaker() {
        let text = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\n<v Grace></v>\nFollow-up line\n";
        assert_eq!(normalize_caption_text(text), "Grace: Follow-up line");
    }

    #[test]
    fn plain_text_passes_through_trimmed() {
        assert_eq!(to_plain_text("  just text \n"), "just text");
        assert_eq!(
            to_plain_text("WEBVTT\n\n1\n00:00:01.000 --> 00:00:02.000\n<v A>x</v>"),
            "A: x"
        );
    }
}
