use anyhow::Result;

pub const SPOKEN_GREETING: &str = "Hello, I am Vyahant. I am a chatbot here to help.";

/// Reads text aloud.
pub trait Voice {
    fn say(&mut self, text: &str) -> Result<()>;
}

/// Used when the crate is built without the `speech` feature.
pub struct Silent;

impl Voice for Silent {
    fn say(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(feature = "speech")]
pub struct Narrator {
    client: tts_rust::tts::GTTSClient,
}

#[cfg(feature = "speech")]
impl Narrator {
    pub fn new() -> Self {
        Self {
            client: tts_rust::tts::GTTSClient {
                volume: 1.0,
                language: tts_rust::languages::Languages::English,
                tld: "com",
            },
        }
    }
}

#[cfg(feature = "speech")]
impl Voice for Narrator {
    fn say(&mut self, text: &str) -> Result<()> {
        self.client
            .speak(text)
            .map_err(|e| anyhow::anyhow!("text to speech failed: {e}"))
    }
}

/// The voice matching how the crate was built.
pub fn default_voice() -> Box<dyn Voice> {
    #[cfg(feature = "speech")]
    {
        Box::new(Narrator::new())
    }
    #[cfg(not(feature = "speech"))]
    {
        Box::new(Silent)
    }
}
