use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use anyhow::Result;
use crate::api::{ChatClient, ChatOutcome};

/// Delay before the canned capability message appears on startup.
pub const GREETING_DELAY: Duration = Duration::from_millis(500);

pub const GREETING: &str =
    "I can help you send emails through Gmail. Just tell me who to email and what to say!";

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub kind: MessageKind,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation state (append-only, session-lived)
    pub messages: Vec<ChatMessage>,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Input line state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Request state: at most one in flight, gated by `pending`
    pub loading: bool,
    pub pending: Option<JoinHandle<Result<ChatOutcome>>>,

    // Startup greeting
    pub greeting_due: Instant,
    pub greeted: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Backend
    pub client: ChatClient,
}

impl App {
    pub fn new(client: ChatClient) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            messages: Vec::new(),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            input: String::new(),
            cursor: 0,

            loading: false,
            pending: None,

            greeting_due: Instant::now() + GREETING_DELAY,
            greeted: false,

            animation_frame: 0,

            client,
        }
    }

    /// Append a message to the conversation and keep the newest entry visible.
    pub fn push_message(&mut self, kind: MessageKind, content: impl Into<String>) {
        self.messages.push(ChatMessage {
            kind,
            content: content.into(),
        });
        self.scroll_to_bottom();
    }

    /// Send the current input line to the backend.
    ///
    /// No-op when the trimmed input is empty or a request is already pending;
    /// the pending gate is the only throttle, there is no queue.
    pub fn submit(&mut self) {
        if self.pending.is_some() {
            return;
        }

        let message = self.input.trim().to_string();
        if message.is_empty() {
            return;
        }

        self.push_message(MessageKind::User, message.clone());
        self.input.clear();
        self.cursor = 0;
        self.loading = true;

        let client = self.client.clone();
        self.pending = Some(tokio::spawn(async move {
            client.send_message(&message).await
        }));
    }

    /// Collect the result of a finished request, if any.
    pub async fn poll_reply(&mut self) {
        if !self.pending.as_ref().is_some_and(|task| task.is_finished()) {
            return;
        }

        if let Some(task) = self.pending.take() {
            let outcome = match task.await {
                Ok(result) => result,
                // A panicked request task counts as a transport failure.
                Err(join_err) => Err(anyhow::anyhow!(join_err)),
            };
            self.apply_outcome(outcome);
        }
    }

    /// Render one request resolution into the conversation. The loading flag
    /// is cleared on every path.
    fn apply_outcome(&mut self, outcome: Result<ChatOutcome>) {
        match outcome {
            Ok(ChatOutcome::Reply(text)) => {
                self.push_message(MessageKind::Assistant, text);
            }
            Ok(ChatOutcome::Failure(error)) => {
                self.push_message(MessageKind::System, format!("Error: {}", error));
            }
            Err(err) => {
                self.push_message(
                    MessageKind::System,
                    format!("Error connecting to server: {}", err),
                );
            }
        }
        self.loading = false;
    }

    /// Show the canned capability message once the startup delay has passed.
    pub fn greet_if_due(&mut self) {
        if !self.greeted && Instant::now() >= self.greeting_due {
            self.greeted = true;
            self.push_message(MessageKind::Assistant, GREETING);
        }
    }

    /// Advance animation and greeting state (called by Tick event).
    pub fn on_tick(&mut self) {
        if self.loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.greet_if_due();
    }

    // Chat scrolling
    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
    }

    /// Scroll the chat so the newest message (and the ellipsis while loading)
    /// is visible.
    pub fn scroll_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.messages {
            total_lines += 1; // Prefix line ("You:" / "Assistant:" / "System:")
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1; // Empty line still takes one line
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.loading {
            total_lines += 2; // "Assistant:" + ellipsis line
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        // Port 9 (discard) is never listening; requests fail fast if awaited.
        App::new(ChatClient::new("http://127.0.0.1:9"))
    }

    #[tokio::test]
    async fn test_submit_whitespace_is_noop() {
        let mut app = test_app();
        app.input = "   ".to_string();
        app.submit();

        assert!(app.messages.is_empty());
        assert!(app.pending.is_none());
        assert!(!app.loading);
        // The input is not cleared either, since nothing was sent
        assert_eq!(app.input, "   ");
    }

    #[tokio::test]
    async fn test_submit_appends_user_message_and_marks_busy() {
        let mut app = test_app();
        app.input = "  Email Alice about lunch  ".to_string();
        app.cursor = app.input.chars().count();
        app.submit();

        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].kind, MessageKind::User);
        assert_eq!(app.messages[0].content, "Email Alice about lunch");
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
        assert!(app.loading);
        assert!(app.pending.is_some());
    }

    #[tokio::test]
    async fn test_submit_gated_while_pending() {
        let mut app = test_app();
        app.loading = true;
        app.pending = Some(tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ChatOutcome::Reply(String::new()))
        }));

        app.input = "second message".to_string();
        app.submit();

        assert!(app.messages.is_empty());
        assert_eq!(app.input, "second message");
        if let Some(task) = app.pending.take() {
            task.abort();
        }
    }

    #[tokio::test]
    async fn test_success_reply_appends_assistant_message() {
        let mut app = test_app();
        app.loading = true;
        app.apply_outcome(Ok(ChatOutcome::Reply("Email sent to Alice.".to_string())));

        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].kind, MessageKind::Assistant);
        assert_eq!(app.messages[0].content, "Email sent to Alice.");
        assert!(!app.loading);
    }

    #[tokio::test]
    async fn test_server_failure_appends_system_message() {
        let mut app = test_app();
        app.loading = true;
        app.apply_outcome(Ok(ChatOutcome::Failure(
            "Gmail authentication expired".to_string(),
        )));

        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].kind, MessageKind::System);
        assert_eq!(
            app.messages[0].content,
            "Error: Gmail authentication expired"
        );
        assert!(!app.loading);
    }

    #[tokio::test]
    async fn test_transport_failure_appends_system_message() {
        let mut app = test_app();
        app.loading = true;
        app.apply_outcome(Err(anyhow::anyhow!("Failed to fetch")));

        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].kind, MessageKind::System);
        assert_eq!(
            app.messages[0].content,
            "Error connecting to server: Failed to fetch"
        );
        assert!(!app.loading);
    }

    #[tokio::test]
    async fn test_poll_reply_consumes_finished_task_once() {
        let mut app = test_app();
        app.loading = true;
        let task = tokio::spawn(async { Ok(ChatOutcome::Reply("done".to_string())) });
        // Let the spawned task run to completion before polling
        tokio::task::yield_now().await;
        while !task.is_finished() {
            tokio::task::yield_now().await;
        }
        app.pending = Some(task);

        app.poll_reply().await;
        assert_eq!(app.messages.len(), 1);
        assert!(!app.loading);
        assert!(app.pending.is_none());

        // A second poll with nothing pending appends nothing
        app.poll_reply().await;
        assert_eq!(app.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_greeting_appears_once_after_delay() {
        let mut app = test_app();

        // Before the deadline nothing is shown
        app.greet_if_due();
        assert!(app.messages.is_empty());

        app.greeting_due = Instant::now();
        app.greet_if_due();
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].kind, MessageKind::Assistant);
        assert_eq!(app.messages[0].content, GREETING);

        // Never a second one
        app.greet_if_due();
        assert_eq!(app.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_scroll_to_bottom_follows_overflow() {
        let mut app = test_app();
        app.chat_width = 50;
        app.chat_height = 4;
        for i in 0..5 {
            app.push_message(MessageKind::User, format!("message {}", i));
        }
        // 5 messages at 3 lines each against a 4-line viewport
        assert_eq!(app.chat_scroll, 15 - 4);
    }
}
