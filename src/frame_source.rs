//! Where detection frames come from, and how a hand gets picked out of them.
//!
//! The hand landmark model runs outside this process. Its results arrive
//! either as Tether messages or as one JSON object per line (stdin, or the
//! stdout of a detector command that we spawn ourselves).

use std::{
    io::{self, BufRead, BufReader, ErrorKind},
    process::{Child, Command, Stdio},
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
};

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};

use crate::tracking::{DetectionFrame, HandLandmarks, landmark_index};

pub trait FrameSource {
    type Frame;

    /// None means no frame was available this time; try again next pass
    fn read(&mut self) -> Option<Self::Frame>;
}

pub trait HandDetector {
    type Frame;

    /// At most one hand per frame
    fn detect(&mut self, frame: &Self::Frame) -> Option<HandLandmarks>;
}

/// One JSON-encoded [DetectionFrame] per line
pub struct JsonLinesSource<R: BufRead> {
    reader: R,
    line: String,
    finished: bool,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        JsonLinesSource {
            reader,
            line: String::new(),
            finished: false,
        }
    }

    /// True once the underlying stream has ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<R: BufRead> FrameSource for JsonLinesSource<R> {
    type Frame = DetectionFrame;

    fn read(&mut self) -> Option<DetectionFrame> {
        if self.finished {
            return None;
        }
        self.line.clear();
        match self.reader.read_line(&mut self.line) {
            Ok(0) => {
                info!("End of landmark stream");
                self.finished = true;
                None
            }
            Ok(_) => {
                let text = self.line.trim();
                if text.is_empty() {
                    return None;
                }
                match serde_json::from_str::<DetectionFrame>(text) {
                    Ok(frame) => match &frame.error {
                        Some(e) => {
                            debug!("Detector reported an error for this frame: {}", e);
                            None
                        }
                        None => Some(frame),
                    },
                    Err(e) => {
                        debug!("Skipping unparseable landmark line: {}", e);
                        None
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => None,
            Err(e) => {
                warn!("Failed to read landmark stream, giving up: {}", e);
                self.finished = true;
                None
            }
        }
    }
}

/// Reads JSON lines on a separate thread, so that a silent detector never
/// blocks the control loop. Only the latest unread frame is kept.
pub struct ThreadedLines {
    rx: Receiver<DetectionFrame>,
    slot: LatestFrame<DetectionFrame>,
    disconnected: bool,
}

impl ThreadedLines {
    pub fn spawn<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut source = JsonLinesSource::new(reader);
            while !source.is_finished() {
                if let Some(frame) = source.read() {
                    if tx.send(frame).is_err() {
                        break;
                    }
                }
            }
        });
        ThreadedLines {
            rx,
            slot: LatestFrame::new(),
            disconnected: false,
        }
    }

    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(frame) => self.slot.push(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
    }

    /// True once the reader thread has stopped and every frame it sent has
    /// been read
    pub fn is_finished(&self) -> bool {
        self.disconnected && self.slot.frame.is_none()
    }

    pub fn dropped(&self) -> usize {
        self.slot.dropped()
    }
}

impl FrameSource for ThreadedLines {
    type Frame = DetectionFrame;

    fn read(&mut self) -> Option<DetectionFrame> {
        if !self.disconnected {
            self.drain();
        }
        self.slot.read()
    }
}

/// Holds only the most recent frame; anything unread is replaced, so the
/// loop never falls behind a faster detector
pub struct LatestFrame<F> {
    frame: Option<F>,
    dropped: usize,
}

impl<F> LatestFrame<F> {
    pub fn new() -> Self {
        LatestFrame {
            frame: None,
            dropped: 0,
        }
    }

    pub fn push(&mut self, frame: F) {
        if self.frame.replace(frame).is_some() {
            self.dropped += 1;
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl<F> Default for LatestFrame<F> {
    fn default() -> Self {
        LatestFrame::new()
    }
}

impl<F> FrameSource for LatestFrame<F> {
    type Frame = F;

    fn read(&mut self) -> Option<F> {
        self.frame.take()
    }
}

/// Equivalent of running the detector with "max hands = 1"
pub struct SingleHandDetector {
    pub min_score: f32,
}

impl HandDetector for SingleHandDetector {
    type Frame = DetectionFrame;

    fn detect(&mut self, frame: &DetectionFrame) -> Option<HandLandmarks> {
        frame
            .hands
            .iter()
            .find(|h| {
                h.score >= self.min_score && h.landmarks.len() > landmark_index::INDEX_FINGER_TIP
            })
            .cloned()
    }
}

/// Camera settings handed to the detector command. These are hints only;
/// the camera may well deliver something else.
#[derive(Debug, Clone, Copy)]
pub struct CameraHints {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

pub fn substitute_hints(arg: &str, hints: &CameraHints) -> String {
    arg.replace("{width}", &hints.width.to_string())
        .replace("{height}", &hints.height.to_string())
        .replace("{fps}", &hints.fps.to_string())
}

/// A detector running as a child process, writing JSON lines to stdout
pub struct DetectorProcess {
    child: Child,
}

impl DetectorProcess {
    pub fn spawn(
        command: &[String],
        hints: &CameraHints,
    ) -> Result<(Self, LandmarkSource)> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("no detector command configured"))?;
        let args: Vec<String> = args.iter().map(|a| substitute_hints(a, hints)).collect();

        info!("Spawning detector: {} {}", program, args.join(" "));
        let mut child = Command::new(program)
            .args(&args)
            .stdout(Stdio::piped())
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start detector \"{}\"", program))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("detector stdout was not captured"))?;

        Ok((
            DetectorProcess { child },
            LandmarkSource::Lines(ThreadedLines::spawn(BufReader::new(stdout))),
        ))
    }
}

impl Drop for DetectorProcess {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!("Detector process already gone: {}", e);
        }
        let _ = self.child.wait();
    }
}

/// The landmark sources the agent can be configured with, behind one type
pub enum LandmarkSource {
    /// Filled from Tether messages by the caller, via [LandmarkSource::push]
    Tether(LatestFrame<DetectionFrame>),
    Lines(ThreadedLines),
}

impl LandmarkSource {
    pub fn stdin() -> Self {
        LandmarkSource::Lines(ThreadedLines::spawn(BufReader::new(io::stdin())))
    }

    pub fn push(&mut self, frame: DetectionFrame) {
        match self {
            LandmarkSource::Tether(slot) => slot.push(frame),
            LandmarkSource::Lines(_) => {
                debug!("Ignoring Tether landmarks; not the configured source")
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            LandmarkSource::Tether(_) => false,
            LandmarkSource::Lines(lines) => lines.is_finished(),
        }
    }

    /// Frames that were replaced before the loop got to them
    pub fn dropped(&self) -> usize {
        match self {
            LandmarkSource::Tether(slot) => slot.dropped(),
            LandmarkSource::Lines(lines) => lines.dropped(),
        }
    }
}

impl FrameSource for LandmarkSource {
    type Frame = DetectionFrame;

    fn read(&mut self) -> Option<DetectionFrame> {
        match self {
            LandmarkSource::Tether(slot) => slot.read(),
            LandmarkSource::Lines(lines) => lines.read(),
        }
    }
}
