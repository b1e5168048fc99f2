// src/system/invoker.rs

//! Invocation of the downstream build tool. The child's stdout and stderr
//! are streamed line-by-line through dedicated reader threads into a
//! caller-supplied sink; the threads are joined before the call returns. A
//! non-zero exit code is a hard failure carrying the literal command line.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("no command specified to run")]
    EmptyCommand,
    #[error("unable to invoke command [{command_line}]: {source}")]
    Spawn {
        command_line: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command [{command_line}] exited with code {code}")]
    NonZeroExit { command_line: String, code: i32 },
}

/// Receives the streamed output of an external command, one line at a time.
pub trait OutputSink: Send {
    fn line(&mut self, line: &str);
}

/// Prints streamed tool output straight to stdout.
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn line(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Collects streamed output in memory; used by tests and by callers that
/// postprocess tool output.
#[derive(Default)]
pub struct BufferSink {
    pub lines: Vec<String>,
}

impl OutputSink for BufferSink {
    fn line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Renders an argv for display, quoting where needed.
pub fn command_to_string(argv: &[String]) -> String {
    shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "))
}

/// Runs `argv` in `working_directory`, streaming combined stdout/stderr into
/// `sink`, and returns once the process has exited and both streams are
/// drained.
pub fn invoke(
    working_directory: &Path,
    argv: &[String],
    sink: &mut dyn OutputSink,
) -> Result<(), InvokeError> {
    let Some((program, arguments)) = argv.split_first() else {
        return Err(InvokeError::EmptyCommand);
    };
    let command_line = command_to_string(argv);

    println!("Invoking command: {command_line}");
    println!(
        "Working directory: {}",
        dunce::simplified(working_directory).display()
    );

    let mut child = Command::new(program)
        .args(arguments)
        .current_dir(dunce::simplified(working_directory))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| InvokeError::Spawn {
            command_line: command_line.clone(),
            source,
        })?;

    let stdout = child.stdout.take().expect("stdout was requested piped");
    let stderr = child.stderr.take().expect("stderr was requested piped");

    let shared_sink = Mutex::new(sink);
    thread::scope(|scope| {
        let out_pump = scope.spawn(|| pump_lines(stdout, &shared_sink));
        let err_pump = scope.spawn(|| pump_lines(stderr, &shared_sink));
        out_pump.join().expect("stdout reader panicked");
        err_pump.join().expect("stderr reader panicked");
    });

    let status = child.wait().map_err(|source| InvokeError::Spawn {
        command_line: command_line.clone(),
        source,
    })?;

    let code = status.code().unwrap_or(-1);
    println!("Command has exited with code {code}");

    if !status.success() {
        return Err(InvokeError::NonZeroExit { command_line, code });
    }
    Ok(())
}

fn pump_lines(stream: impl Read, sink: &Mutex<&mut dyn OutputSink>) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        match line {
            Ok(line) => sink.lock().expect("output sink mutex poisoned").line(&line),
            Err(error) => {
                log::warn!("failed to read tool output: {error}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_is_rejected() {
        let error = invoke(Path::new("."), &[], &mut ConsoleSink).unwrap_err();
        assert!(matches!(error, InvokeError::EmptyCommand));
    }

    #[cfg(unix)]
    #[test]
    fn streams_both_stdout_and_stderr() {
        let mut sink = BufferSink::default();
        invoke(
            Path::new("."),
            &[
                "sh".to_string(),
                "-c".to_string(),
                "echo to-stdout; echo to-stderr 1>&2".to_string(),
            ],
            &mut sink,
        )
        .unwrap();

        assert!(sink.lines.iter().any(|line| line == "to-stdout"));
        assert!(sink.lines.iter().any(|line| line == "to-stderr"));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_carries_command_line_and_code() {
        let error = invoke(
            Path::new("."),
            &["sh".to_string(), "-c".to_string(), "exit 3".to_string()],
            &mut ConsoleSink,
        )
        .unwrap_err();

        match error {
            InvokeError::NonZeroExit { command_line, code } => {
                assert!(command_line.contains("sh"));
                assert_eq!(code, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_executable_is_a_spawn_error() {
        let error = invoke(
            Path::new("."),
            &["definitely-not-a-real-binary-1234".to_string()],
            &mut ConsoleSink,
        )
        .unwrap_err();
        assert!(matches!(error, InvokeError::Spawn { .. }));
    }
}
