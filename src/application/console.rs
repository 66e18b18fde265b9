use std::io::{self, BufRead, Write};

/// Line-oriented user interaction. Answers come back trimmed.
pub trait Console {
    fn ask(&mut self, prompt: &str) -> String;
    fn say(&mut self, line: &str);

    /// True once input has ended; later answers are all empty.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Console over the process stdin/stdout. End of input or a read failure closes it.
#[derive(Debug, Default)]
pub struct StdConsole {
    closed: bool,
}

impl Console for StdConsole {
    fn ask(&mut self, prompt: &str) -> String {
        let mut stdout = io::stdout().lock();
        let _ = write!(stdout, "{prompt}");
        let _ = stdout.flush();
        drop(stdout);

        if self.closed {
            return String::new();
        }
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => {
                tracing::debug!("stdin closed");
                self.closed = true;
                String::new()
            }
            Ok(_) => line.trim().to_string(),
            Err(error) => {
                tracing::warn!(%error, "failed reading stdin");
                self.closed = true;
                String::new()
            }
        }
    }

    fn say(&mut self, line: &str) {
        println!("{line}");
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
