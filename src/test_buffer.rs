use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Shared in-memory writer so tests can read back what was printed.
#[derive(Clone, Default)]
pub struct TestBuffer {
    content: Arc<Mutex<Vec<u8>>>,
}

impl TestBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_string_content(&self) -> String {
        String::from_utf8_lossy(&self.content.lock().unwrap()).into_owned()
    }
}

impl Write for TestBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.content.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
