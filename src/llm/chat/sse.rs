use serde::Deserialize;

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

/// Failure reported inside an otherwise successful event stream.
#[derive(Deserialize)]
struct StreamError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl StreamError {
    fn describe(&self) -> String {
        let message = self.message.as_deref().unwrap_or("unknown upstream error");
        match &self.code {
            Some(code) => format!("{} (code {})", message, code),
            None => message.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

/// One parsed `data:` line of a chat-completions event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Token(String),
    /// Last token of the completion, if the final event carried one.
    Finished(Option<String>),
    Done,
    /// The upstream aborted the completion with an error event.
    Error(String),
    Skip,
}

pub fn parse_line(line: &str) -> SseEvent {
    let line = line.trim_end_matches('\r');
    let data = match line.strip_prefix("data:") {
        Some(data) => data.trim_start(),
        None => {
            return SseEvent::Skip;
        }
    };
    if data == "[DONE]" {
        return SseEvent::Done;
    }

    let response = match serde_json::from_str::<StreamResponse>(data) {
        Ok(r) => r,
        Err(e) => {
            log::debug!("Skipping unparseable stream event: {} ({})", data, e);
            return SseEvent::Skip;
        }
    };

    if let Some(error) = response.error {
        return SseEvent::Error(error.describe());
    }

    let mut text = String::new();
    let mut finished = false;
    for choice in response.choices {
        if let Some(content) = choice.delta.and_then(|d| d.content) {
            text.push_str(&content);
        }
        if choice.finish_reason.is_some() {
            finished = true;
        }
    }

    match (finished, text.is_empty()) {
        (true, true) => SseEvent::Finished(None),
        (true, false) => SseEvent::Finished(Some(text)),
        (false, true) => SseEvent::Skip,
        (false, false) => SseEvent::Token(text),
    }
}

/// Reassembles lines from arbitrarily split response chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and drains every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
