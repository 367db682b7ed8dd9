use std::io::{BufRead, Write};

use anyhow::Result;
use colored::Colorize;

use crate::llm::Chatbot;
use crate::speech::{Voice, SPOKEN_GREETING};

const GREETING: &str = "🤖 How can i assist you  ";
const PROMPT: &str = "You: ";
const FAREWELL: &str = "See you Again, Goodbye! 👋";
const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", "bye"];

/// Expects input that has already been trimmed.
fn is_exit_command(input: &str) -> bool {
    EXIT_COMMANDS.contains(&input.to_lowercase().as_str())
}

/// The interactive loop: one line in, one reply out.
pub struct Repl {
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
    voice: Box<dyn Voice>,
}

impl Repl {
    pub fn new(input: Box<dyn BufRead>, output: Box<dyn Write>, voice: Box<dyn Voice>) -> Self {
        Self {
            input,
            output,
            voice,
        }
    }

    pub fn run(&mut self, chatbot: &mut Chatbot) -> Result<()> {
        writeln!(self.output, "{}", GREETING.green())?;
        self.speak(SPOKEN_GREETING);

        loop {
            write!(self.output, "{}", PROMPT.yellow())?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                // End of input behaves like an exit command.
                writeln!(self.output)?;
                return self.farewell(chatbot);
            }

            let user_input = line.trim();
            if is_exit_command(user_input) {
                return self.farewell(chatbot);
            }

            let reply = chatbot.submit_turn(user_input);
            self.print_reply(&reply)?;
            self.speak(&reply);
        }
    }

    fn print_reply(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{}", format!("Chatbot: {text}").green())?;
        self.output.flush()?;
        Ok(())
    }

    fn farewell(&mut self, chatbot: &Chatbot) -> Result<()> {
        tracing::info!(messages = chatbot.transcript().len(), "session ended");
        self.print_reply(FAREWELL)
    }

    fn speak(&mut self, text: &str) {
        if let Err(e) = self.voice.say(text) {
            tracing::warn!(error = %e, "unable to speak");
        }
    }
}
