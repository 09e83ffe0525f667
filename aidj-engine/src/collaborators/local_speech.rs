//! Command-line speech engine and process-backed utterances
//!
//! The fallback engine shells out to a local synthesizer (espeak-ng by
//! default) that speaks straight to the sound card. The same
//! [`ProcessUtterance`] handle plays audio files produced by the HTTP speech
//! engine through an external player command.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{SpeechEngine, Utterance, VoiceParams};
use crate::error::SynthesisError;

/// Words per minute at `rate == 1.0`
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Split a configured command line into program and arguments
pub(crate) fn split_command_line(command_line: &str) -> Option<(String, Vec<String>)> {
    let mut parts = command_line.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// Substitute `{name}` in each argument, appending `value` when no
/// argument mentions the placeholder
pub(crate) fn fill_placeholder(args: &[String], placeholder: &str, value: &str) -> Vec<String> {
    let mut filled: Vec<String> = args.iter().map(|a| a.replace(placeholder, value)).collect();
    if !args.iter().any(|a| a.contains(placeholder)) {
        filled.push(value.to_string());
    }
    filled
}

/// How often the waiter task checks whether the child has exited
const EXIT_POLL: Duration = Duration::from_millis(50);

/// Audio produced by a child process
///
/// `finished()` resolves when the process exits. `stop()` sends the kill
/// signal before it returns; the waiter task only reaps the child. Any
/// value passed as `keep_alive` (e.g. a temp audio file) is dropped once the
/// process is gone.
pub struct ProcessUtterance {
    child: Arc<Mutex<Child>>,
    done: watch::Receiver<bool>,
    program: String,
}

impl ProcessUtterance {
    pub fn spawn<K>(
        program: &str,
        args: &[String],
        keep_alive: K,
    ) -> std::io::Result<Arc<Self>>
    where
        K: Send + 'static,
    {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let child = Arc::new(Mutex::new(child));

        let (done_tx, done) = watch::channel(false);
        let waiter = Arc::clone(&child);
        let name = program.to_string();

        tokio::spawn(async move {
            let mut poll = tokio::time::interval(EXIT_POLL);
            loop {
                poll.tick().await;
                let status = waiter.lock().unwrap_or_else(|e| e.into_inner()).try_wait();
                match status {
                    Ok(Some(status)) if !status.success() => {
                        debug!("{} exited with {}", name, status);
                        break;
                    }
                    Ok(Some(_)) => {
                        debug!("{} finished", name);
                        break;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Failed waiting for {}: {}", name, e);
                        break;
                    }
                }
            }
            drop(keep_alive);
            let _ = done_tx.send(true);
        });

        Ok(Arc::new(Self {
            child,
            done,
            program: program.to_string(),
        }))
    }
}

#[async_trait]
impl Utterance for ProcessUtterance {
    async fn finished(&self) {
        let mut done = self.done.clone();
        // Err means the waiter task is gone, which also means finished
        let _ = done.wait_for(|finished| *finished).await;
    }

    fn stop(&self) {
        let mut child = self.child.lock().unwrap_or_else(|e| e.into_inner());
        match child.start_kill() {
            Ok(()) => debug!("{} stopped", self.program),
            Err(e) => debug!("{} already gone: {}", self.program, e),
        }
    }
}

/// Speech engine backed by a local command
///
/// The command line may use `{text}` and `{wpm}` placeholders; without a
/// `{text}` placeholder the text is appended as the last argument.
#[derive(Debug, Clone)]
pub struct CommandSpeechEngine {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandSpeechEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        Self {
            name: format!("local:{}", program),
            program,
            args,
        }
    }

    pub fn from_command_line(command_line: &str) -> Result<Self, crate::Error> {
        let (program, args) = split_command_line(command_line).ok_or_else(|| {
            aidj_common::Error::Config("collaborators.local_tts_command is empty".to_string())
        })?;
        Ok(Self::new(program, args))
    }

    fn arguments(&self, text: &str, params: &VoiceParams) -> Vec<String> {
        let wpm = (BASE_WORDS_PER_MINUTE * params.rate.clamp(0.25, 4.0)).round() as u32;
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{wpm}", &wpm.to_string()))
            .collect();
        fill_placeholder(&args, "{text}", text)
    }
}

#[async_trait]
impl SpeechEngine for CommandSpeechEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn speak(
        &self,
        text: &str,
        params: &VoiceParams,
    ) -> Result<Arc<dyn Utterance>, SynthesisError> {
        let args = self.arguments(text, params);
        debug!("Speaking via {} ({} chars)", self.program, text.len());
        let utterance = ProcessUtterance::spawn(&self.program, &args, ())
            .map_err(|e| SynthesisError::Unavailable(format!("{}: {}", self.program, e)))?;
        Ok(utterance as Arc<dyn Utterance>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_command_line() {
        let (program, args) = split_command_line("ffplay -nodisp  -autoexit").unwrap();
        assert_eq!(program, "ffplay");
        assert_eq!(args, vec!["-nodisp", "-autoexit"]);
        assert!(split_command_line("   ").is_none());
    }

    #[test]
    fn test_text_appended_without_placeholder() {
        let engine = CommandSpeechEngine::new("espeak-ng", vec![]);
        let args = engine.arguments("hello there", &VoiceParams::default());
        assert_eq!(args, vec!["hello there"]);
    }

    #[test]
    fn test_placeholders_substituted() {
        let engine = CommandSpeechEngine::new(
            "espeak-ng",
            vec!["-s".to_string(), "{wpm}".to_string(), "{text}".to_string()],
        );
        let params = VoiceParams {
            voice: "en".to_string(),
            rate: 2.0,
        };
        assert_eq!(engine.arguments("hi", &params), vec!["-s", "350", "hi"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let engine = CommandSpeechEngine::new("definitely-not-a-real-tts-binary", vec![]);
        let result = engine.speak("hello", &VoiceParams::default()).await;
        assert!(matches!(result, Err(SynthesisError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_utterance_finishes() {
        let utterance = ProcessUtterance::spawn("true", &[], ()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), utterance.finished())
            .await
            .expect("short process should finish");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_utterance_stop_kills_child() {
        let utterance = ProcessUtterance::spawn("sleep", &["30".to_string()], ()).unwrap();
        utterance.stop();
        tokio::time::timeout(Duration::from_secs(5), utterance.finished())
            .await
            .expect("stopped process should finish promptly");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_kills_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("still-running");
        let script = format!("sleep 0.5; touch {}", marker.display());
        let utterance =
            ProcessUtterance::spawn("sh", &["-c".to_string(), script], ()).unwrap();
        utterance.stop();

        // Block the only runtime thread so the waiter task cannot run
        std::thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());

        tokio::time::timeout(Duration::from_secs(5), utterance.finished())
            .await
            .expect("killed process should be reaped");
    }
}
