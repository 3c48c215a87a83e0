//! Scripted in-memory speech channel for integration tests
//!
//! Utterances "play" for a fixed duration on the tokio clock, so tests
//! using `start_paused` get exact, repeatable timing.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use webpodcast::speech::{
    share, SharedChannel, SpeechChannel, Utterance, UtteranceOutcome, VoiceGender, VoiceHandle,
};
use webpodcast::{PodcastError, Result};

/// Everything the channel was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Speak {
        text: String,
        voice: Option<String>,
        rate: f32,
        pitch: f32,
    },
    Cancel,
    Pause,
    Resume,
}

type Sender = Arc<Mutex<Option<oneshot::Sender<UtteranceOutcome>>>>;

struct InFlight {
    tx: Sender,
    timer: JoinHandle<()>,
    started: Instant,
    remaining: Duration,
    paused: bool,
}

/// Test-side handle onto a [`ScriptedChannel`]
#[derive(Clone)]
pub struct Script {
    calls: Arc<Mutex<Vec<Call>>>,
    voices: Arc<Mutex<Vec<VoiceHandle>>>,
    registry: Arc<watch::Sender<u64>>,
}

impl Script {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Texts sent to the channel, in order
    pub fn spoken(&self) -> Vec<String> {
        self.speaks().into_iter().map(|(text, _, _)| text).collect()
    }

    /// `(text, voice id, rate)` per utterance
    pub fn speaks(&self) -> Vec<(String, Option<String>, f32)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Speak {
                    text, voice, rate, ..
                } => Some((text, voice, rate)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls().iter().filter(|call| *call == wanted).count()
    }

    /// Replace the installed voices and announce the change
    pub fn install_voices(&self, voices: Vec<VoiceHandle>) {
        *self.voices.lock().unwrap() = voices;
        self.registry.send_modify(|generation| *generation += 1);
    }
}

/// In-memory speech channel
pub struct ScriptedChannel {
    duration: Duration,
    can_pause: bool,
    failing: Vec<String>,
    in_flight: Option<InFlight>,
    script: Script,
}

impl ScriptedChannel {
    pub fn new(voices: Vec<VoiceHandle>) -> Self {
        let (registry, _) = watch::channel(0);
        Self {
            duration: Duration::from_secs(1),
            can_pause: false,
            failing: Vec::new(),
            in_flight: None,
            script: Script {
                calls: Arc::new(Mutex::new(Vec::new())),
                voices: Arc::new(Mutex::new(voices)),
                registry: Arc::new(registry),
            },
        }
    }

    /// How long every utterance plays
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Support suspending utterances in place
    pub fn with_pause(mut self) -> Self {
        self.can_pause = true;
        self
    }

    /// Refuse to speak this text
    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.push(text.to_string());
        self
    }

    pub fn into_shared(self) -> (SharedChannel, Script) {
        let script = self.script.clone();
        (share(Box::new(self)), script)
    }

    fn record(&self, call: Call) {
        self.script.calls.lock().unwrap().push(call);
    }
}

fn finish_after(tx: Sender, after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(UtteranceOutcome::Finished);
        }
    })
}

impl SpeechChannel for ScriptedChannel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn voices(&self) -> Result<Vec<VoiceHandle>> {
        Ok(self.script.voices.lock().unwrap().clone())
    }

    fn registry_updates(&self) -> Option<watch::Receiver<u64>> {
        Some(self.script.registry.subscribe())
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<webpodcast::speech::Completion> {
        self.record(Call::Speak {
            text: utterance.text.clone(),
            voice: utterance.voice.as_ref().map(|v| v.id.clone()),
            rate: utterance.rate,
            pitch: utterance.pitch,
        });
        if self.failing.contains(&utterance.text) {
            return Err(PodcastError::Speech("scripted failure".to_string()));
        }

        let (tx, rx) = oneshot::channel();
        let tx: Sender = Arc::new(Mutex::new(Some(tx)));
        self.in_flight = Some(InFlight {
            timer: finish_after(Arc::clone(&tx), self.duration),
            tx,
            started: Instant::now(),
            remaining: self.duration,
            paused: false,
        });
        Ok(rx)
    }

    fn cancel(&mut self) -> Result<()> {
        self.record(Call::Cancel);
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.timer.abort();
            if let Some(tx) = in_flight.tx.lock().unwrap().take() {
                let _ = tx.send(UtteranceOutcome::Interrupted);
            }
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.record(Call::Pause);
        if !self.can_pause {
            return Err(PodcastError::Unsupported("pause"));
        }
        if let Some(in_flight) = self.in_flight.as_mut() {
            if !in_flight.paused {
                in_flight.timer.abort();
                in_flight.remaining = in_flight.remaining.saturating_sub(in_flight.started.elapsed());
                in_flight.paused = true;
            }
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.record(Call::Resume);
        if !self.can_pause {
            return Err(PodcastError::Unsupported("resume"));
        }
        if let Some(in_flight) = self.in_flight.as_mut() {
            if in_flight.paused {
                in_flight.timer = finish_after(Arc::clone(&in_flight.tx), in_flight.remaining);
                in_flight.started = Instant::now();
                in_flight.paused = false;
            }
        }
        Ok(())
    }
}

/// A small registry with two English accents and a French voice
pub fn voices() -> Vec<VoiceHandle> {
    vec![
        VoiceHandle::new("us", "Samantha", "en-US").with_gender(VoiceGender::Female),
        VoiceHandle::new("in", "Rishi", "en-IN").with_gender(VoiceGender::Male),
        VoiceHandle::new("fr", "Thomas", "fr-FR").as_default(),
    ]
}
