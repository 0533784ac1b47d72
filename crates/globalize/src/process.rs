//! Child-process output handling shared by the git and translation runners.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Reads `pipe` line by line until EOF, decoding each line lossily.
///
/// Invalid UTF-8 never stops the read: the child must always find its pipe
/// open, or it dies of SIGPIPE.
pub(crate) async fn drain_lines<R, F>(pipe: R, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(String),
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(['\n', '\r']).to_string());
            }
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading child output");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_utf8_does_not_stop_reading() {
        let input: &[u8] = b"first \xff line\r\nsecond\nno newline";
        let mut lines = Vec::new();
        drain_lines(input, |line| lines.push(line)).await;
        assert_eq!(lines, vec!["first \u{fffd} line", "second", "no newline"]);
    }

    #[tokio::test]
    async fn test_empty_input_yields_nothing() {
        let mut lines = Vec::new();
        drain_lines(&b""[..], |line| lines.push(line)).await;
        assert!(lines.is_empty());
    }
}
