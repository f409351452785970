/// Who produced a transcript segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Bot,
    System,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "You:",
            Speaker::Bot => "Bot:",
            Speaker::System => "System:",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub speaker: Speaker,
    pub text: String,
}

/// Append-only log of displayed chat segments. Entries are addressed by the
/// index returned at insertion time and are never edited or reordered. Lives
/// for the process lifetime; not persisted.
///
/// The transient "thinking" indicator is deliberately not a segment here: it
/// is derived from the in-flight dispatch and rendered by the UI, so
/// retracting it never touches previously appended entries.
#[derive(Debug, Default)]
pub struct Transcript {
    segments: Vec<Segment>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a segment and returns its index.
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) -> usize {
        self.segments.push(Segment {
            speaker,
            text: text.into(),
        });
        self.segments.len() - 1
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
