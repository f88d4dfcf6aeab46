use serde_json::Value;

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: String,
    fragments: Vec<String>,
    done: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut completed = Vec::new();
        while let Some(idx) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=idx).collect();
            if let Some(fragment) = self.decode_line(&line) {
                completed.push(fragment);
            }
        }
        self.fragments.extend(completed.iter().cloned());
        completed
    }

    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        let completed: Vec<String> = self.decode_line(&rest).into_iter().collect();
        self.fragments.extend(completed.iter().cloned());
        completed
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn into_fragments(self) -> Vec<String> {
        self.fragments
    }

    pub fn text(&self) -> String {
        self.fragments.concat().trim().to_string()
    }

    fn decode_line(&mut self, raw: &str) -> Option<String> {
        if self.done {
            return None;
        }
        let line = raw.trim_end_matches(['\n', '\r']).trim();
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        let payload = match line.strip_prefix(DATA_PREFIX) {
            Some(payload) => payload.trim(),
            None if line.starts_with('{') => line,
            None => return None,
        };
        if payload == DONE_MARKER {
            self.done = true;
            return None;
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => fragment_of(&value),
            Err(error) => {
                tracing::warn!(error = %error, "skipping malformed completion stream line");
                None
            }
        }
    }
}

fn fragment_of(value: &Value) -> Option<String> {
    ["/choices/0/delta/content", "/choices/0/message/content", "/choices/0/text"]
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
