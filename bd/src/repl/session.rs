//! Chat session management

use std::io::{self, Write};

use chrono::NaiveDate;
use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::assistant::{Assistant, AssistantAction, AssistantError, AssistantReply};
use crate::llm::{Message, MessageContent, Role, StreamChunk};

/// Print streamed text as it arrives
///
/// Returns once the sender side is dropped.
pub async fn stream_to_stdout(mut rx: mpsc::Receiver<StreamChunk>) {
    while let Some(chunk) = rx.recv().await {
        if let StreamChunk::TextDelta(text) = chunk {
            print!("{}", text);
            let _ = io::stdout().flush();
        }
    }
}

/// Print a finished turn; the body is skipped when it was already streamed
pub fn print_reply(reply: &AssistantReply, streamed: bool) {
    if streamed {
        println!();
    } else {
        println!("{}", reply.content);
    }

    if reply.tool_calls.is_empty() {
        return;
    }
    println!();
    for call in &reply.tool_calls {
        let marker = if call.is_error { "✗".red() } else { "✓".green() };
        println!("  {} {}", marker, call.name.dimmed());
    }
    if reply.committed_writes > 0 {
        println!("  {}", format!("{} change(s) saved", reply.committed_writes).dimmed());
    }
}

/// Run one assistant turn, streaming to stdout when asked
pub async fn ask(
    assistant: &Assistant,
    history: Vec<Message>,
    action: AssistantAction,
    today: NaiveDate,
    stream: bool,
) -> Result<AssistantReply, AssistantError> {
    debug!(%action, stream, "ask: called");
    if !stream {
        let reply = assistant.respond(history, action, today).await?;
        print_reply(&reply, false);
        return Ok(reply);
    }

    let (tx, rx) = mpsc::channel::<StreamChunk>(100);
    let printer = tokio::spawn(stream_to_stdout(rx));
    let result = assistant.respond_streaming(history, action, today, tx).await;
    if let Err(e) = printer.await {
        warn!(error = %e, "Stream printer task failed");
    }

    let reply = result?;
    print_reply(&reply, true);
    Ok(reply)
}

/// Interactive conversation with the AI manager
pub struct ChatSession {
    assistant: Assistant,
    conversation: Vec<Message>,
    stream: bool,
    owner_id: String,
}

impl ChatSession {
    pub fn new(assistant: Assistant, owner_id: impl Into<String>, stream: bool) -> Self {
        Self {
            assistant,
            conversation: Vec::new(),
            stream,
            owner_id: owner_id.into(),
        }
    }

    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    /// Run the read-eval-print loop until /quit or Ctrl+D
    pub async fn run(&mut self, initial_message: Option<String>) -> Result<()> {
        self.print_welcome();

        if let Some(message) = initial_message {
            println!("{} {}", ">".bright_green(), message);
            self.send(&message, today()).await;
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            match rl.readline(&format!("{} ", ">".bright_green())) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input) {
                            SlashResult::Continue => continue,
                            SlashResult::Briefing => self.briefing(today()).await,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.send(input, today()).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => return Err(eyre::eyre!("Readline error: {}", err)),
            }
        }

        println!("Até logo!");
        Ok(())
    }

    /// Send one user message
    ///
    /// A failed turn leaves the conversation as it was before the message.
    pub async fn send(&mut self, input: &str, today: NaiveDate) -> Option<AssistantReply> {
        debug!(len = input.len(), "send: called");
        self.conversation.push(Message::user(input));

        match ask(
            &self.assistant,
            self.conversation.clone(),
            AssistantAction::Chat,
            today,
            self.stream,
        )
        .await
        {
            Ok(reply) => {
                self.conversation.push(Message::assistant(&reply.content));
                println!();
                Some(reply)
            }
            Err(e) => {
                self.conversation.pop();
                eprintln!("{} {}", "Error:".red(), e);
                None
            }
        }
    }

    /// Briefing in a fresh context; the chat history is left untouched
    async fn briefing(&mut self, today: NaiveDate) {
        if let Err(e) = ask(&self.assistant, Vec::new(), AssistantAction::DailyBriefing, today, self.stream).await {
            eprintln!("{} {}", "Error:".red(), e);
        }
        println!();
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "bizdesk - gerente de IA".bright_cyan().bold());
        println!("Owner: {}", self.owner_id);
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let cmd = input.split_whitespace().next().unwrap_or("");

        match cmd {
            "/help" | "/h" => {
                self.print_help();
                SlashResult::Continue
            }
            "/quit" | "/q" | "/exit" => SlashResult::Quit,
            "/clear" | "/c" => {
                self.conversation.clear();
                println!("{}", "Conversation cleared.".dimmed());
                SlashResult::Continue
            }
            "/history" => {
                self.print_history();
                SlashResult::Continue
            }
            "/briefing" | "/b" => SlashResult::Briefing,
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
                SlashResult::Continue
            }
        }
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit the chat", "/quit".yellow());
        println!("  {:14} Clear conversation history", "/clear".yellow());
        println!("  {:14} Show conversation history", "/history".yellow());
        println!("  {:14} Generate today's briefing", "/briefing".yellow());
        println!();
    }

    fn print_history(&self) {
        if self.conversation.is_empty() {
            println!("{}", "No conversation history.".dimmed());
            return;
        }

        println!();
        println!("{}", "Conversation History:".bright_cyan());
        for (i, msg) in self.conversation.iter().enumerate() {
            let role = match msg.role {
                Role::User => "User".bright_green(),
                Role::Assistant => "Assistant".bright_blue(),
            };
            let preview = match &msg.content {
                MessageContent::Text(text) => {
                    let head: String = text.chars().take(50).collect();
                    if text.chars().count() > 50 { format!("{}...", head) } else { head }
                }
                MessageContent::Blocks(blocks) => format!("[{} blocks]", blocks.len()),
            };
            println!("  {}. {}: {}", i + 1, role, preview);
        }
        println!();
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

enum SlashResult {
    Continue,
    Briefing,
    Quit,
}
