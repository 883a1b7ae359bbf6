//! Debounced syntax highlighting for one text buffer.
//!
//! ## State Machine
//!
//! ```text
//!            on_text_changed            deadline reached
//!   Idle ──────────────────► Pending ─────────────────► Rendering ──► Idle
//!                             │  ▲                       (ok or rollback)
//!                             └──┘ on_text_changed: deadline reset
//! ```
//!
//! Only one pass can be pending per buffer: the deadline lives in the
//! `Pending` state itself, so scheduling a new pass overwrites the old one.
//! A pass writes the display through a private path that never reaches
//! [`CodeInput::on_text_changed`], and notifications arriving while the
//! state is `Rendering` are dropped.
//!
//! ## Learning: Time as a Value
//!
//! `CodeInput` never sleeps. It records a deadline and lets whoever drives
//! the event loop call [`CodeInput::poll`]. The same type therefore works
//! under a real tokio timer ([`crate::session`]) and under a paused test
//! clock.

use std::time::Duration;

use codepad_syntax::{Highlighter, Rendered, StyleMap, SyntaxError};
use tokio::time::Instant;

use crate::config::EditorConfig;
use crate::document::DocumentId;
use crate::event::{EditorEvent, EventBus};

/// Quiet interval used when none is configured.
pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_millis(100);

/// Where a buffer is in its highlighting cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightState {
    Idle,
    Pending { deadline: Instant },
    Rendering,
}

/// What the buffer currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Display {
    /// Unstyled text: after an edit, or after a rolled-back pass.
    Plain(String),
    /// Output of a successful pass.
    Markup(Rendered),
}

impl Display {
    pub fn as_str(&self) -> &str {
        match self {
            Display::Plain(text) => text,
            Display::Markup(rendered) => rendered.markup(),
        }
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, Display::Markup(_))
    }
}

/// Everything needed to build a [`CodeInput`] for a language.
#[derive(Debug, Clone)]
pub struct HighlightSettings {
    pub styles: StyleMap,
    pub quiet_interval: Duration,
}

impl HighlightSettings {
    pub fn from_config(config: &EditorConfig) -> Result<Self, SyntaxError> {
        Ok(Self {
            styles: config.styles()?,
            quiet_interval: config.highlight_delay(),
        })
    }

    /// Creates an empty input for `language`.
    pub fn build(&self, language: &str) -> Result<CodeInput, SyntaxError> {
        let highlighter = Highlighter::new(language, self.styles.clone())?;
        Ok(CodeInput::new(highlighter).with_quiet_interval(self.quiet_interval))
    }
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            styles: StyleMap::default(),
            quiet_interval: DEFAULT_QUIET_INTERVAL,
        }
    }
}

/// A text buffer that re-highlights itself once edits go quiet.
#[derive(Debug)]
pub struct CodeInput {
    /// Logical text, never markup
    text: String,

    /// Caret as a character offset into `text`
    caret: usize,

    display: Display,
    state: HighlightState,
    quiet_interval: Duration,
    highlighter: Highlighter,

    /// Completed passes, successful or rolled back
    passes: u64,

    notify: Option<(DocumentId, EventBus)>,
}

impl CodeInput {
    pub fn new(highlighter: Highlighter) -> Self {
        Self {
            text: String::new(),
            caret: 0,
            display: Display::Plain(String::new()),
            state: HighlightState::Idle,
            quiet_interval: DEFAULT_QUIET_INTERVAL,
            highlighter,
            passes: 0,
            notify: None,
        }
    }

    pub fn with_quiet_interval(mut self, quiet_interval: Duration) -> Self {
        self.quiet_interval = quiet_interval;
        self
    }

    /// Publishes `TextChanged` and `Highlighted` events for `id` on `bus`.
    pub fn with_events(mut self, id: DocumentId, bus: EventBus) -> Self {
        self.notify = Some((id, bus));
        self
    }

    // ==================== Edit Notification ====================

    /// Records new buffer content and (re)schedules a highlighting pass.
    ///
    /// Any pass already pending is replaced, so a burst of edits closer
    /// together than the quiet interval produces a single pass.
    pub fn on_text_changed(&mut self, text: impl Into<String>) {
        if self.state == HighlightState::Rendering {
            tracing::trace!("Ignoring change notification during re-render");
            return;
        }

        self.text = text.into();
        self.caret = self.caret.min(self.char_count());
        self.display = Display::Plain(self.text.clone());

        let deadline = Instant::now() + self.quiet_interval;
        if let HighlightState::Pending { .. } = self.state {
            tracing::trace!("Rescheduling pending highlight pass");
        }
        self.state = HighlightState::Pending { deadline };

        if let Some((id, bus)) = &self.notify {
            bus.emit(EditorEvent::TextChanged(*id));
        }
    }

    /// Moves the caret. Does not schedule a pass.
    pub fn set_caret(&mut self, caret: usize) {
        self.caret = caret.min(self.char_count());
    }

    // ==================== Scheduling ====================

    /// Deadline of the pending pass, if one is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            HighlightState::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Runs the pending pass if its deadline has passed.
    /// Returns true if a pass ran.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            HighlightState::Pending { deadline } if deadline <= now => {
                self.run_highlight_pass();
                true
            }
            _ => false,
        }
    }

    // ==================== Highlighting ====================

    /// Re-renders the buffer as markup, keeping the caret on the same
    /// character. On any lexing or formatting error the display reverts to
    /// the unmodified text. Returns true if markup was applied.
    pub fn run_highlight_pass(&mut self) -> bool {
        let snapshot = self.text.clone();
        let caret = self.caret;
        self.state = HighlightState::Rendering;

        let ok = match self.highlighter.highlight(&snapshot) {
            Ok(rendered) => {
                tracing::debug!(
                    chars = rendered.char_count(),
                    markup_len = rendered.markup().len(),
                    "Highlight pass applied"
                );
                self.apply_render(Display::Markup(rendered), caret);
                true
            }
            Err(e) => {
                tracing::warn!("Highlight pass failed, restoring plain text: {}", e);
                self.apply_render(Display::Plain(snapshot), caret);
                false
            }
        };

        self.passes += 1;
        self.state = HighlightState::Idle;

        if let Some((id, bus)) = &self.notify {
            bus.emit(EditorEvent::Highlighted { id: *id, ok });
        }
        ok
    }

    /// Internal write path for re-rendering; bypasses edit notification.
    fn apply_render(&mut self, display: Display, caret: usize) {
        self.display = display;
        self.caret = caret.min(self.char_count());
    }

    // ==================== Getters ====================

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    /// Caret as a zero-based (row, column) pair, column counted in chars.
    pub fn caret_row_col(&self) -> (usize, usize) {
        let before = self.text.chars().take(self.caret);
        let mut row = 0;
        let mut col = 0;
        for c in before {
            if c == '\n' {
                row += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        (row, col)
    }

    /// Byte offset of the caret within [`CodeInput::display`].
    pub fn display_caret(&self) -> usize {
        match &self.display {
            Display::Markup(rendered) => rendered.markup_offset(self.caret),
            Display::Plain(text) => text
                .char_indices()
                .nth(self.caret)
                .map_or(text.len(), |(i, _)| i),
        }
    }

    pub fn state(&self) -> HighlightState {
        self.state
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn quiet_interval(&self) -> Duration {
        self.quiet_interval
    }

    pub fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codepad_syntax::{HighlightSpan, Lexer, plain_text};

    fn python_input() -> CodeInput {
        let highlighter = Highlighter::new("python", StyleMap::named("default").unwrap()).unwrap();
        CodeInput::new(highlighter)
    }

    struct FailingLexer;

    impl Lexer for FailingLexer {
        fn language(&self) -> &str {
            "failing"
        }

        fn spans(&mut self, _source: &str) -> Result<Vec<HighlightSpan>, SyntaxError> {
            Err(SyntaxError::Tokenize("injected failure".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_collapses_burst() {
        let mut input = python_input();

        for text in ["d", "de", "def", "def f", "def f(): pass"] {
            input.on_text_changed(text);
            tokio::time::advance(Duration::from_millis(60)).await;
            assert!(!input.poll(Instant::now()));
        }

        tokio::time::advance(Duration::from_millis(40)).await;
        assert!(input.poll(Instant::now()));
        assert!(!input.poll(Instant::now()));

        assert_eq!(input.passes(), 1);
        assert_eq!(plain_text(input.display().as_str()), "def f(): pass");
        assert_eq!(input.state(), HighlightState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_edit_replaces_deadline() {
        let mut input = python_input();

        input.on_text_changed("a");
        let first = input.next_deadline().unwrap();
        tokio::time::advance(Duration::from_millis(50)).await;
        input.on_text_changed("ab");
        let second = input.next_deadline().unwrap();

        assert_eq!(second - first, Duration::from_millis(50));
        assert!(!input.poll(first));
        assert!(input.poll(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_each_highlight() {
        let mut input = python_input();

        input.on_text_changed("x = 1");
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(input.poll(Instant::now()));

        input.on_text_changed("x = 2");
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(input.poll(Instant::now()));

        assert_eq!(input.passes(), 2);
    }

    #[test]
    fn test_example_scenario() {
        let mut input = python_input();
        input.on_text_changed("def f():\n    return 1");
        input.set_caret(20);

        assert!(input.run_highlight_pass());

        let markup = input.display().as_str();
        assert!(markup.contains("[color=008000]def[/color]"));
        assert!(markup.contains("[color=008000]return[/color]"));
        assert!(markup.contains("[color=666666]1[/color]"));

        assert_eq!(input.caret(), 20);
        assert_eq!(&markup[input.display_caret()..], "1[/color]");
        assert_eq!(input.caret_row_col(), (1, 11));

        input.set_caret(21);
        assert_eq!(&input.display().as_str()[input.display_caret()..], "[/color]");
        assert_eq!(input.caret_row_col(), (1, 12));
    }

    #[test]
    fn test_caret_lands_on_same_character() {
        let text = "if a < b:\n    s = '[x]' & 3\n";
        let mut input = python_input();
        input.on_text_changed(text);

        for (caret, expected) in text.chars().enumerate() {
            input.set_caret(caret);
            input.run_highlight_pass();
            let tail = plain_text(&input.display().as_str()[input.display_caret()..]);
            assert_eq!(tail.chars().next(), Some(expected), "caret {caret}");
        }
    }

    #[test]
    fn test_pass_is_idempotent() {
        let mut input = python_input();
        input.on_text_changed("for i in range(3):\n    print(i)  # loop\n");

        input.run_highlight_pass();
        let first = input.display().clone();
        input.run_highlight_pass();

        assert_eq!(input.display(), &first);
        assert_eq!(input.text(), "for i in range(3):\n    print(i)  # loop\n");
    }

    #[test]
    fn test_failure_rolls_back_to_plain_text() {
        let highlighter = Highlighter::with_lexer(Box::new(FailingLexer), StyleMap::builtin());
        let mut input = CodeInput::new(highlighter);
        input.on_text_changed("x = [1] < 2");
        input.set_caret(4);
        let before = input.display().clone();

        assert!(!input.run_highlight_pass());

        assert_eq!(input.display(), &before);
        assert_eq!(input.display(), &Display::Plain("x = [1] < 2".to_string()));
        assert_eq!(input.caret(), 4);
        assert_eq!(input.state(), HighlightState::Idle);
        assert_eq!(input.passes(), 1);
    }

    #[test]
    fn test_pass_does_not_reschedule() {
        let mut input = python_input();
        input.on_text_changed("pass");
        input.run_highlight_pass();
        assert_eq!(input.next_deadline(), None);
    }

    #[test]
    fn test_caret_clamped_to_text() {
        let mut input = python_input();
        input.on_text_changed("abc");
        input.set_caret(10);
        assert_eq!(input.caret(), 3);

        input.on_text_changed("a");
        assert_eq!(input.caret(), 1);
    }

    #[test]
    fn test_plain_display_caret_is_byte_offset() {
        let mut input = python_input();
        input.on_text_changed("é = 1");
        input.set_caret(2);
        assert_eq!(input.display_caret(), 3);
    }

    #[tokio::test]
    async fn test_events_published() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let id = DocumentId::new();
        let mut input = python_input().with_events(id, bus);

        input.on_text_changed("x");
        input.run_highlight_pass();

        assert_eq!(rx.recv().await.unwrap(), EditorEvent::TextChanged(id));
        assert_eq!(
            rx.recv().await.unwrap(),
            EditorEvent::Highlighted { id, ok: true }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_settings_build() {
        let settings = HighlightSettings::default();
        let input = settings.build("python").unwrap();
        assert_eq!(input.highlighter().language(), "python");
        assert_eq!(input.quiet_interval(), DEFAULT_QUIET_INTERVAL);
        assert!(settings.build("brainfuck").is_err());
    }
}
