use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::gemini::{DispatchOutcome, GeminiClient};
use crate::transcript::{Speaker, Transcript};

/// Session state for the single chat window. Owns the transcript, the input
/// line, and the busy guard; everything here is mutated only from the UI task.
pub struct App {
    pub should_quit: bool,

    pub transcript: Transcript,

    // Input line state
    pub input: String,
    pub cursor: usize, // char index into `input`

    // Transcript viewport
    pub scroll: u16,
    pub chat_height: u16, // inner size of the chat area, updated during render
    pub chat_width: u16,

    // Ellipsis animation while a dispatch is in flight (0-2)
    pub animation_frame: u8,

    client: GeminiClient,

    // Busy guard: `Some` while exactly one dispatch is in flight. A second
    // submit while this is set is dropped, not queued.
    dispatch_task: Option<JoinHandle<DispatchOutcome>>,
}

impl App {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            should_quit: false,
            transcript: Transcript::new(),
            input: String::new(),
            cursor: 0,
            scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            client,
            dispatch_task: None,
        }
    }

    pub fn is_sending(&self) -> bool {
        self.dispatch_task.is_some()
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Handles a submit trigger (Enter). Appends the user segment and spawns
    /// the dispatch on the runtime; empty input or an in-flight dispatch make
    /// this a no-op with no segment appended.
    pub fn submit(&mut self) {
        let prompt = self.input.trim().to_string();
        if prompt.is_empty() || self.is_sending() {
            return;
        }

        self.transcript.push(Speaker::User, prompt.clone());
        self.input.clear();
        self.cursor = 0;

        info!(chars = prompt.len(), model = self.client.model(), "dispatching prompt");
        let client = self.client.clone();
        self.dispatch_task = Some(tokio::spawn(async move { client.dispatch(&prompt).await }));

        self.scroll_to_bottom();
    }

    /// Collects a finished dispatch, appending the bot segment and clearing
    /// the busy guard in one step. Called every iteration of the run loop;
    /// does nothing while the task is still running.
    pub async fn poll_dispatch(&mut self) {
        let Some(task) = self.dispatch_task.take_if(|task| task.is_finished()) else {
            return;
        };

        let text = match task.await {
            Ok(DispatchOutcome::Reply(text)) => text,
            Ok(outcome) => outcome.message().to_string(),
            Err(err) => {
                error!(error = %err, "dispatch task failed to join");
                DispatchOutcome::ConnectionFailed.message().to_string()
            }
        };

        self.transcript.push(Speaker::Bot, text);
        self.scroll_to_bottom();
    }

    pub fn tick_animation(&mut self) {
        if self.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.scroll = self.scroll.saturating_add(1).min(self.max_scroll());
    }

    pub fn scroll_page_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(self.chat_height.max(1));
    }

    pub fn scroll_page_down(&mut self) {
        self.scroll = self
            .scroll
            .saturating_add(self.chat_height.max(1))
            .min(self.max_scroll());
    }

    /// Scrolls so the latest segment (and the thinking line) stays visible.
    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
    }

    fn max_scroll(&self) -> u16 {
        let total = self.rendered_line_count();
        let visible = if self.chat_height > 0 { self.chat_height } else { 20 };
        total.saturating_sub(visible)
    }

    /// Wrapped line count of the transcript as the chat pane renders it: a
    /// label line per segment, wrapped content lines, and a trailing blank.
    fn rendered_line_count(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total: u16 = 0;
        for segment in self.transcript.segments() {
            total += 1; // label line
            for line in segment.text.lines() {
                let chars = line.chars().count();
                total += ((chars / wrap_width) + 1) as u16;
            }
            total += 1; // blank line after segment
        }

        if self.is_sending() {
            total += 2; // "Bot:" label + thinking line
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{CONNECTION_FAILED_MSG, DEFAULT_MODEL, INVALID_RESPONSE_MSG};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_app(base_url: &str) -> App {
        let client = GeminiClient::new(base_url, "test-key", DEFAULT_MODEL)
            .with_timeout(Duration::from_secs(5))
            .with_retry_delay(Duration::from_millis(10));
        App::new(client)
    }

    async fn drain_dispatch(app: &mut App) {
        // Run loop stand-in: poll until the in-flight dispatch resolves.
        for _ in 0..500 {
            app.poll_dispatch().await;
            if !app.is_sending() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("dispatch did not resolve");
    }

    fn mock_reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        }))
    }

    #[tokio::test]
    async fn empty_and_whitespace_input_are_ignored() {
        let mut app = test_app("http://127.0.0.1:1");

        app.submit();
        app.input = "   \t ".to_string();
        app.submit();

        assert!(app.transcript.is_empty());
        assert!(!app.is_sending());
    }

    #[tokio::test]
    async fn submit_appends_user_segment_before_dispatch_resolves() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(mock_reply("Hi there!").set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;

        let mut app = test_app(&server.uri());
        app.input = "Hello".to_string();
        app.submit();

        // User segment is synchronous; the bot reply has not landed yet.
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript.segments()[0].speaker, Speaker::User);
        assert_eq!(app.transcript.segments()[0].text, "Hello");
        assert!(app.is_sending());
        assert!(app.input.is_empty());

        drain_dispatch(&mut app).await;
        assert_eq!(app.transcript.len(), 2);
        assert_eq!(app.transcript.segments()[1].speaker, Speaker::Bot);
        assert_eq!(app.transcript.segments()[1].text, "Hi there!");
    }

    #[tokio::test]
    async fn submit_while_sending_is_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1beta/models/{DEFAULT_MODEL}:generateContent")))
            .respond_with(mock_reply("first").set_delay(Duration::from_millis(300)))
            .expect(1)
            .mount(&server)
            .await;

        let mut app = test_app(&server.uri());
        app.input = "one".to_string();
        app.submit();

        app.input = "two".to_string();
        app.submit();

        // Second submit was dropped: no segment, input untouched.
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.input, "two");

        drain_dispatch(&mut app).await;
        assert_eq!(app.transcript.len(), 2);
        assert_eq!(app.transcript.segments()[1].text, "first");
        server.verify().await;
    }

    #[tokio::test]
    async fn malformed_response_yields_fixed_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let mut app = test_app(&server.uri());
        app.input = "Hello".to_string();
        app.submit();
        drain_dispatch(&mut app).await;

        assert_eq!(app.transcript.segments()[1].text, INVALID_RESPONSE_MSG);
        assert!(!app.is_sending());
    }

    #[tokio::test]
    async fn exhausted_retries_yield_fixed_message_and_return_to_idle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let mut app = test_app(&server.uri());
        app.input = "Hello".to_string();
        app.submit();
        assert!(app.is_sending());

        drain_dispatch(&mut app).await;
        assert_eq!(app.transcript.segments()[1].text, CONNECTION_FAILED_MSG);
        assert!(!app.is_sending());
    }

    #[tokio::test]
    async fn poll_is_a_no_op_while_task_runs_and_when_idle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(mock_reply("late").set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;

        let mut app = test_app(&server.uri());
        app.poll_dispatch().await; // idle: nothing to do
        assert!(app.transcript.is_empty());

        app.input = "Hello".to_string();
        app.submit();
        app.poll_dispatch().await; // still in flight
        assert!(app.is_sending());
        assert_eq!(app.transcript.len(), 1);

        drain_dispatch(&mut app).await;
        assert_eq!(app.transcript.len(), 2);
    }

    #[tokio::test]
    async fn animation_only_advances_while_sending() {
        let mut app = test_app("http://127.0.0.1:1");
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);
    }
}
