// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

/// Shell setup sent once per login. Echo is turned off so transcripts only
/// carry command output.
pub(crate) const PROMPT_SETUP: &str = "stty -echo; unset PROMPT_COMMAND; PS1='[ROBOTD]\\$ '";

const PROMPTS: [&str; 2] = ["[ROBOTD]$ ", "[ROBOTD]# "];

/// Accumulates raw PTY output and splits it at prompt boundaries.
#[derive(Debug, Default)]
pub(crate) struct PromptBuffer {
    buf: Vec<u8>,
}

impl PromptBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Removes and returns everything before the first complete prompt,
    /// or `None` if no prompt has arrived yet.
    pub(crate) fn take_until_prompt(&mut self) -> Option<String> {
        let (start, len) = PROMPTS
            .iter()
            .filter_map(|prompt| {
                find_subslice(&self.buf, prompt.as_bytes()).map(|idx| (idx, prompt.len()))
            })
            .min_by_key(|(idx, _)| *idx)?;
        let rest = self.buf.split_off(start + len);
        self.buf.truncate(start);
        let before = std::mem::replace(&mut self.buf, rest);
        let text = String::from_utf8_lossy(&before).replace('\r', "");
        Some(text)
    }

    /// Drops buffered output, returning it as text.
    pub(crate) fn drain(&mut self) -> String {
        let raw = std::mem::take(&mut self.buf);
        String::from_utf8_lossy(&raw).replace('\r', "")
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_prompt_yet() {
        let mut buf = PromptBuffer::new();
        buf.push(b"running tests...\r\n");
        assert_eq!(buf.take_until_prompt(), None);
    }

    #[test]
    fn splits_at_prompt_across_chunks() {
        let mut buf = PromptBuffer::new();
        buf.push(b"==== PASS ====\r\n[ROB");
        assert_eq!(buf.take_until_prompt(), None);
        buf.push(b"OTD]$ trailing");
        assert_eq!(
            buf.take_until_prompt().as_deref(),
            Some("==== PASS ====\n")
        );
        assert_eq!(buf.drain(), "trailing");
    }

    #[test]
    fn root_prompt_is_recognised() {
        let mut buf = PromptBuffer::new();
        buf.push(b"[ROBOTD]# ");
        assert_eq!(buf.take_until_prompt().as_deref(), Some(""));
    }

    #[test]
    fn consecutive_prompts_are_taken_one_at_a_time() {
        let mut buf = PromptBuffer::new();
        buf.push(b"motd\r\n[ROBOTD]$ out\r\n[ROBOTD]$ ");
        assert_eq!(buf.take_until_prompt().as_deref(), Some("motd\n"));
        assert_eq!(buf.take_until_prompt().as_deref(), Some("out\n"));
        assert_eq!(buf.take_until_prompt(), None);
    }

    #[test]
    fn setup_line_sets_marker_prompt() {
        assert!(PROMPT_SETUP.ends_with("PS1='[ROBOTD]\\$ '"));
        assert!(PROMPT_SETUP.starts_with("stty -echo"));
    }
}
