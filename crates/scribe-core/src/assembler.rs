//! Response assembly.
//!
//! Fragments are appended to the most recent in-progress response until one
//! carries the completion flag; the next fragment then starts a new response.
//! An error fragment terminates the in-progress response immediately.

use std::fmt;

use scribe_proto::Fragment;

use crate::event::SessionEvent;

/// Identifies a response within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResponseId(pub u64);

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A response assembled from fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response identity.
    pub id: ResponseId,
    /// Concatenated chunks so far.
    pub content: String,
    /// Whether a completion fragment has been seen.
    pub finished: bool,
}

/// Application error carried by a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentError {
    /// Backend message.
    pub message: String,
    /// Backend error code, if given.
    pub code: Option<String>,
}

impl fmt::Display for FragmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Folds fragments into responses.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    current: Option<Response>,
    next_id: u64,
}

impl ResponseAssembler {
    /// Empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Response currently being streamed.
    pub fn in_progress(&self) -> Option<&Response> {
        self.current.as_ref()
    }

    /// Apply one fragment and return the resulting events.
    pub fn push(&mut self, fragment: Fragment) -> Vec<SessionEvent> {
        if let Some(message) = fragment.error {
            let partial = self.current.take();
            return vec![SessionEvent::FragmentError {
                error: FragmentError { message, code: fragment.code },
                partial,
            }];
        }

        let text = fragment.chunk.unwrap_or_default();
        let mut events = Vec::new();

        if self.current.is_none() {
            // A bare completion marker with nothing in flight finishes nothing.
            if fragment.done && text.is_empty() {
                return events;
            }

            let id = ResponseId(self.next_id);
            self.next_id += 1;
            self.current = Some(Response { id, content: String::new(), finished: false });
            events.push(SessionEvent::ResponseStarted { response: id });
        }

        let Some(response) = self.current.as_mut() else {
            return events;
        };

        if !text.is_empty() {
            response.content.push_str(&text);
            events.push(SessionEvent::Chunk { response: response.id, text });
        }

        if fragment.done
            && let Some(mut finished) = self.current.take()
        {
            finished.finished = true;
            events.push(SessionEvent::ResponseFinished(finished));
        }

        events
    }

    /// Drop the in-progress response, returning it.
    pub fn abandon(&mut self) -> Option<Response> {
        self.current.take()
    }
}
