//! Line classifier: the transducer's state machine.
//!
//! Two states. In `Normal`, each line is matched against the crew's progress
//! markers and becomes at most one event. In `Capturing`, lines after a
//! `Final Answer:` marker are accumulated silently until a boundary (a box
//! edge, a new attribution, or a task marker) closes the block. Closing a
//! block flushes one `final_answer` event plus the full answer text for
//! decision extraction, then the boundary line is classified normally.

use crisis_common::{EventDraft, EventKind, Speaker};

use super::normalize::{
    LineSplitter, NoiseFilter, has_box_glyph, has_boundary_glyph, strip_box_padding,
};
use super::speaker::{AttributionTracker, SpeakerTable};
use super::TransducerConfig;

const ATTRIBUTION_MARKER: &str = "Agent:";
const FINAL_ANSWER_MARKER: &str = "Final Answer:";
const TASK_STARTED_MARKERS: [&str; 1] = ["Task Started"];
const TASK_COMPLETED_MARKERS: [&str; 2] = ["Task Completed", "Task Completion"];
const TOOL_STARTED_MARKERS: [&str; 2] = ["Tool Execution Started", "🔧"];
const TOOL_COMPLETED_MARKERS: [&str; 2] = ["Tool Execution Completed", "Tool Completed"];
const DIAGNOSTIC_PREFIXES: [&str; 5] = ["INFO", "WARNING", "ERROR", "DEBUG", "Tool "];

/// Minimum length, in characters, for an unmarked line to count as a thought.
const MIN_THOUGHT_CHARS: usize = 20;
/// Captured answer lines this short are padding, not content.
const MIN_ANSWER_LINE_CHARS: usize = 2;

/// Output of the classifier, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Event(EventDraft),
    /// A completed final answer, untruncated, for decision extraction.
    Answer { speaker: Speaker, text: String },
}

#[derive(Debug, Clone)]
struct Capture {
    speaker: Speaker,
    lines: Vec<String>,
}

/// Per-run capture state plus line reassembly.
#[derive(Debug)]
pub struct Classifier {
    splitter: LineSplitter,
    tracker: AttributionTracker,
    noise: NoiseFilter,
    capture: Option<Capture>,
}

fn contains_any(line: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| line.contains(m))
}

impl Classifier {
    pub fn new(config: &TransducerConfig) -> Self {
        Self {
            splitter: LineSplitter::new(),
            tracker: AttributionTracker::new(SpeakerTable::new(&config.speakers)),
            noise: NoiseFilter::new(&config.noise_patterns),
            capture: None,
        }
    }

    pub fn current_speaker(&self) -> Speaker {
        self.tracker.current()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Feed a raw chunk of any size. Only complete lines are classified.
    pub fn write_chunk(&mut self, chunk: &str) -> Vec<Classified> {
        let mut out = Vec::new();
        for line in self.splitter.push(chunk) {
            self.classify_line(&line, &mut out);
        }
        out
    }

    /// End of stream: classify any partial line, then flush a pending answer.
    pub fn finish(&mut self) -> Vec<Classified> {
        let mut out = Vec::new();
        for line in self.splitter.finish() {
            self.classify_line(&line, &mut out);
        }
        self.flush_capture(&mut out);
        out
    }


    fn classify_line(&mut self, line: &str, out: &mut Vec<Classified>) {
        if self.noise.is_noise(line) {
            return;
        }

        if let Some(idx) = line.find(FINAL_ANSWER_MARKER) {
            self.flush_capture(out);
            let speaker = self.tracker.current();
            out.push(Classified::Event(EventDraft::new(
                speaker,
                EventKind::Thought,
                "Formulating final answer...",
            )));
            let mut lines = Vec::new();
            let inline = strip_box_padding(&line[idx + FINAL_ANSWER_MARKER.len()..]);
            if !inline.is_empty() {
                lines.push(inline.to_string());
            }
            self.capture = Some(Capture { speaker, lines });
            return;
        }

        if let Some(capture) = self.capture.as_mut() {
            if !Self::is_capture_boundary(line) {
                let content = strip_box_padding(line);
                if content.chars().count() > MIN_ANSWER_LINE_CHARS {
                    capture.lines.push(content.to_string());
                }
                return;
            }
            self.flush_capture(out);
        }

        self.classify_normal(line, out);
    }

    fn is_capture_boundary(line: &str) -> bool {
        has_boundary_glyph(line)
            || line.contains(ATTRIBUTION_MARKER)
            || contains_any(line, &TASK_STARTED_MARKERS)
            || contains_any(line, &TASK_COMPLETED_MARKERS)
    }

    fn classify_normal(&mut self, line: &str, out: &mut Vec<Classified>) {
        let emit = |out: &mut Vec<Classified>, speaker: Speaker, kind: EventKind, message: &str| {
            out.push(Classified::Event(EventDraft::new(speaker, kind, message)));
        };

        if line.contains(ATTRIBUTION_MARKER) {
            if let Some(speaker) = self.tracker.observe(line) {
                emit(out, speaker, EventKind::AgentStart, "Agent started");
            }
            return;
        }

        let speaker = self.tracker.current();
        if contains_any(line, &TASK_STARTED_MARKERS) {
            emit(out, speaker, EventKind::TaskStart, "Starting task...");
        } else if contains_any(line, &TASK_COMPLETED_MARKERS) {
            emit(out, speaker, EventKind::AgentComplete, "Task completed ✓");
        } else if contains_any(line, &TOOL_STARTED_MARKERS) {
            emit(out, speaker, EventKind::ToolCall, "Calling tool...");
        } else if contains_any(line, &TOOL_COMPLETED_MARKERS) {
            emit(out, speaker, EventKind::ToolResult, "Tool returned result");
        } else if Self::is_substantive(line) {
            emit(out, speaker, EventKind::Thought, line);
        }
    }

    fn is_substantive(line: &str) -> bool {
        line.chars().count() > MIN_THOUGHT_CHARS
            && !has_box_glyph(line)
            && !DIAGNOSTIC_PREFIXES.iter().any(|p| line.starts_with(p))
    }

    fn flush_capture(&mut self, out: &mut Vec<Classified>) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        let text = capture.lines.join("\n");
        if text.trim().is_empty() {
            return;
        }
        out.push(Classified::Event(EventDraft::new(
            capture.speaker,
            EventKind::FinalAnswer,
            &text,
        )));
        out.push(Classified::Answer {
            speaker: capture.speaker,
            text,
        });
    }
}
