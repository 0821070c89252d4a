use std::fmt;
use std::io::{self, BufRead, BufReader, Stderr, Stdin, Write};

use parking_lot::Mutex;
use unigate_common::security::SecureCredential;
use zeroize::Zeroizing;

use super::{CredentialSource, CredentialSourceError};

const SOURCE_NAME: &str = "stdin prompt";

/// Prompts for the login on a reader/writer pair, stdin/stderr by default
///
/// Input is not masked; the password line is zeroized after use.
pub struct StdinSource<R = BufReader<Stdin>, W = Stderr> {
    io: Mutex<(R, W)>,
}

impl StdinSource {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stderr())
    }
}

impl<R: BufRead, W: Write> StdinSource<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { io: Mutex::new((reader, writer)) }
    }

    fn prompt(io: &mut (R, W), label: &str) -> Result<Zeroizing<String>, CredentialSourceError> {
        let (reader, writer) = io;
        let io_error =
            |source| CredentialSourceError::Io { source_name: SOURCE_NAME.to_string(), source };

        write!(writer, "{label}: ").map_err(io_error)?;
        writer.flush().map_err(io_error)?;

        let mut line = Zeroizing::new(String::new());
        let read = reader.read_line(&mut line).map_err(io_error)?;
        if read == 0 {
            return Err(CredentialSourceError::unavailable(
                SOURCE_NAME,
                "input closed before a value was entered",
            ));
        }

        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(line)
    }
}

impl<R, W> CredentialSource for StdinSource<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn get_credentials(&self) -> Result<SecureCredential, CredentialSourceError> {
        let mut io = self.io.lock();
        let username = Self::prompt(&mut io, "Username")?;
        let password = Self::prompt(&mut io, "Password")?;
        Ok(SecureCredential::new(username.trim(), &password)?)
    }

    fn describe(&self) -> String {
        SOURCE_NAME.to_string()
    }
}

impl<R, W> fmt::Debug for StdinSource<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdinSource").finish_non_exhaustive()
    }
}
