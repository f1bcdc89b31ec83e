//! Outbound delivery through Messages.app.

use crate::error::SendError;
use std::process::{Command, Output};

/// Delivers one message body to a phone number or email handle.
pub trait SendMessage: Send + Sync {
    fn send(&self, recipient: &str, body: &str) -> Result<(), SendError>;
}

/// Runs an AppleScript through `osascript` that sends over iMessage.
#[derive(Debug, Clone)]
pub struct AppleScriptTransport {
    program: String,
}

impl Default for AppleScriptTransport {
    fn default() -> Self {
        Self {
            program: "osascript".to_string(),
        }
    }
}

impl AppleScriptTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Escape for an AppleScript string literal.
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Try the existing buddy first, then a direct send; the script answers
/// `success` or `error:<reason>`.
pub fn send_script(recipient: &str, body: &str) -> String {
    let recipient = escape(recipient);
    let body = escape(body);
    format!(
        r#"tell application "Messages"
    set targetService to 1st service whose service type = iMessage
    try
        set targetBuddy to buddy "{recipient}" of targetService
        send "{body}" to targetBuddy
        delay 1
        return "success"
    on error errMsg
        try
            send "{body}" to "{recipient}"
            return "success"
        on error errMsg2
            return "error:" & errMsg2
        end try
    end try
end tell"#
    )
}

fn interpret(output: &Output) -> Result<(), SendError> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(SendError::Failed(format!("Error: {}", stderr)));
    }
    let result = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if let Some(reason) = result.strip_prefix("error:") {
        Err(SendError::Failed(reason.to_string()))
    } else if result == "success" {
        Ok(())
    } else {
        Err(SendError::UnknownResult(result))
    }
}

impl SendMessage for AppleScriptTransport {
    fn send(&self, recipient: &str, body: &str) -> Result<(), SendError> {
        let output = Command::new(&self.program)
            .arg("-e")
            .arg(send_script(recipient, body))
            .output()?;
        let result = interpret(&output);
        if let Err(e) = &result {
            log::warn!("send to {} failed: {}", recipient, e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        use std::os::unix::process::ExitStatusExt;
        Output {
            status: std::process::ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_script_escapes_quotes_and_backslashes() {
        let script = send_script("+13105551234", r#"she said "hi" \o/"#);
        assert!(script.contains(r#"send "she said \"hi\" \\o/" to targetBuddy"#));
        assert!(script.contains(r#"buddy "+13105551234" of targetService"#));
        let script = send_script(r#"a"b"#, "x");
        assert!(script.contains(r#"buddy "a\"b""#));
    }

    #[cfg(unix)]
    #[test]
    fn test_interpret_results() {
        assert!(interpret(&output(0, "success\n", "")).is_ok());
        match interpret(&output(0, "error:buddy not found", "")) {
            Err(SendError::Failed(reason)) => assert_eq!(reason, "buddy not found"),
            other => panic!("unexpected {:?}", other),
        }
        match interpret(&output(0, "maybe", "")) {
            Err(e @ SendError::UnknownResult(_)) => assert_eq!(e.to_string(), "Unknown result: maybe"),
            other => panic!("unexpected {:?}", other),
        }
        match interpret(&output(1, "", "execution error")) {
            Err(SendError::Failed(reason)) => assert!(reason.contains("execution error")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let transport = AppleScriptTransport {
            program: "definitely-not-osascript-here".into(),
        };
        assert!(matches!(transport.send("1", "x"), Err(SendError::Spawn(_))));
    }
}
