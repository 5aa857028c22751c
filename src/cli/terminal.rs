use super::{CliError, ConsolePort, CLI_BUFFER_SIZE};

/// Line-oriented operator console with local echo and basic editing
pub struct Terminal<P: ConsolePort> {
    port: P,
    line_buffer: String,
    cursor_pos: usize,
    escape_state: EscapeState,
    after_cr: bool,
}

#[derive(Clone, Copy, PartialEq)]
enum EscapeState {
    Normal,
    Escape,
    Csi,
}

impl<P: ConsolePort> Terminal<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            line_buffer: String::new(),
            cursor_pos: 0,
            escape_state: EscapeState::Normal,
            after_cr: false,
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn write_str(&mut self, s: &str) -> Result<(), CliError> {
        self.port.write(s.as_bytes())
    }

    pub fn write_line(&mut self, s: &str) -> Result<(), CliError> {
        self.write_str(s)?;
        self.write_str("\r\n")
    }

    pub fn print_prompt(&mut self) -> Result<(), CliError> {
        self.write_str("Code> ")
    }

    /// Drain pending input; returns a line once Enter is seen. Bytes after
    /// the line end stay queued in the port for the next call.
    pub fn poll_line(&mut self) -> Result<Option<String>, CliError> {
        while let Some(ch) = self.port.read_byte()? {
            if let Some(line) = self.handle_char(ch)? {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    pub fn handle_char(&mut self, ch: u8) -> Result<Option<String>, CliError> {
        let after_cr = core::mem::replace(&mut self.after_cr, ch == b'\r');
        match self.escape_state {
            // Second half of a CRLF: the line was already returned and echoed
            EscapeState::Normal if ch == b'\n' && after_cr => Ok(None),
            EscapeState::Normal => match ch {
                b'\r' | b'\n' => {
                    self.write_str("\r\n")?;
                    let line = core::mem::take(&mut self.line_buffer);
                    self.cursor_pos = 0;
                    Ok(Some(line))
                }
                b'\x1b' => {
                    self.escape_state = EscapeState::Escape;
                    Ok(None)
                }
                b'\x08' | b'\x7f' => {
                    if self.cursor_pos > 0 {
                        self.delete_char_before_cursor()?;
                    }
                    Ok(None)
                }
                0x20..=0x7E => {
                    if self.line_buffer.len() < CLI_BUFFER_SIZE - 1 {
                        self.insert_char_at_cursor(ch as char)?;
                    }
                    Ok(None)
                }
                _ => Ok(None),
            },
            EscapeState::Escape => {
                self.escape_state = if ch == b'[' {
                    EscapeState::Csi
                } else {
                    EscapeState::Normal
                };
                Ok(None)
            }
            EscapeState::Csi => {
                match ch {
                    b'C' => self.handle_cursor_right()?,
                    b'D' => self.handle_cursor_left()?,
                    // Parameter bytes: stay in the sequence
                    b'0'..=b'9' | b';' => return Ok(None),
                    // History and anything else are not supported here
                    _ => {}
                }
                self.escape_state = EscapeState::Normal;
                Ok(None)
            }
        }
    }

    fn handle_cursor_right(&mut self) -> Result<(), CliError> {
        if self.cursor_pos < self.line_buffer.len() {
            self.cursor_pos += 1;
            self.write_str("\x1b[C")?;
        }
        Ok(())
    }

    fn handle_cursor_left(&mut self) -> Result<(), CliError> {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
            self.write_str("\x1b[D")?;
        }
        Ok(())
    }

    fn insert_char_at_cursor(&mut self, ch: char) -> Result<(), CliError> {
        if self.cursor_pos == self.line_buffer.len() {
            self.line_buffer.push(ch);
            self.cursor_pos += 1;
            self.port.write(&[ch as u8])
        } else {
            self.line_buffer.insert(self.cursor_pos, ch);
            self.cursor_pos += 1;

            // Redraw the tail, then walk the cursor back over it
            let tail: String = self.line_buffer[self.cursor_pos - 1..].to_string();
            self.write_str(&tail)?;
            for _ in 1..tail.len() {
                self.write_str("\x1b[D")?;
            }
            Ok(())
        }
    }

    fn delete_char_before_cursor(&mut self) -> Result<(), CliError> {
        if self.cursor_pos == self.line_buffer.len() {
            self.line_buffer.pop();
            self.cursor_pos -= 1;
            self.write_str("\x08 \x08")
        } else {
            self.line_buffer.remove(self.cursor_pos - 1);
            self.cursor_pos -= 1;
            self.write_str("\x1b[D")?;

            // Redraw the tail plus a blank over the stale last column
            let tail: String = self.line_buffer[self.cursor_pos..].to_string();
            self.write_str(&tail)?;
            self.write_str(" ")?;
            for _ in 0..tail.len() + 1 {
                self.write_str("\x1b[D")?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct MemoryPort {
        input: VecDeque<u8>,
        output: Vec<u8>,
    }

    impl ConsolePort for MemoryPort {
        fn write(&mut self, bytes: &[u8]) -> Result<(), CliError> {
            self.output.extend_from_slice(bytes);
            Ok(())
        }

        fn read_byte(&mut self) -> Result<Option<u8>, CliError> {
            Ok(self.input.pop_front())
        }
    }

    fn terminal(input: &[u8]) -> Terminal<MemoryPort> {
        Terminal::new(MemoryPort {
            input: input.iter().copied().collect(),
            output: Vec::new(),
        })
    }

    #[test]
    fn returns_line_on_enter_and_echoes() {
        let mut term = terminal(b"1234\r");
        assert_eq!(term.poll_line().unwrap().as_deref(), Some("1234"));
        assert_eq!(term.port().output, b"1234\r\n");
        assert_eq!(term.poll_line().unwrap(), None);
    }

    #[test]
    fn crlf_yields_single_line() {
        let mut term = terminal(b"12\r\n34\r\n");
        assert_eq!(term.poll_line().unwrap().as_deref(), Some("12"));
        assert_eq!(term.poll_line().unwrap().as_deref(), Some("34"));
        assert_eq!(term.poll_line().unwrap(), None);
    }

    #[test]
    fn crlf_echoes_one_line_break() {
        let mut term = terminal(b"1234\r\n");
        assert_eq!(term.poll_line().unwrap().as_deref(), Some("1234"));
        assert_eq!(term.poll_line().unwrap(), None);
        assert_eq!(term.port().output, b"1234\r\n");
    }

    #[test]
    fn bare_lf_ends_a_line() {
        let mut term = terminal(b"42\n\n");
        assert_eq!(term.poll_line().unwrap().as_deref(), Some("42"));
        // An empty line is still a line; the caller decides what it means
        assert_eq!(term.poll_line().unwrap().as_deref(), Some(""));
    }

    #[test]
    fn partial_input_waits_for_more() {
        let mut term = terminal(b"12");
        assert_eq!(term.poll_line().unwrap(), None);
        term.port.input.extend(b"34\n");
        assert_eq!(term.poll_line().unwrap().as_deref(), Some("1234"));
    }

    #[test]
    fn backspace_and_cursor_editing() {
        // "125", backspace, "4" -> "124"; cursor left, insert "3" -> "1234"
        let mut term = terminal(b"125\x7f4\x1b[D3\r");
        assert_eq!(term.poll_line().unwrap().as_deref(), Some("1234"));
    }

    #[test]
    fn escape_sequences_are_swallowed() {
        let mut term = terminal(b"\x1b[A\x1b[1;5C99\r");
        assert_eq!(term.poll_line().unwrap().as_deref(), Some("99"));
    }

    #[test]
    fn line_length_is_bounded() {
        let long = vec![b'7'; CLI_BUFFER_SIZE * 2];
        let mut term = terminal(&long);
        term.port.input.push_back(b'\r');
        let line = term.poll_line().unwrap().unwrap();
        assert_eq!(line.len(), CLI_BUFFER_SIZE - 1);
    }
}
