use crate::protocol::RtspUrl;

/// Live edge (`Range: npt=end-`).
pub const RANGE_LIVE: &str = "npt=end-";
/// Current position, used after pause and speed changes.
pub const RANGE_NOW: &str = "npt=now-";
/// Start of a recording.
pub const RANGE_BEGINNING: &str = "npt=beginning-";
/// Start of an on-demand stream.
pub const RANGE_START: &str = "npt=0.000-";

/// Where and how fast the next PLAY asks the server to deliver
/// (RFC 7826 §18.40 `Range`, §18.46 `Scale`).
///
/// Negative scale plays in reverse; magnitude is the speed multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackCursor {
    pub range: String,
    pub scale: f32,
}

impl PlaybackCursor {
    pub fn new(range: &str, scale: f32) -> Self {
        Self {
            range: range.to_string(),
            scale,
        }
    }

    /// Live `.sdp` targets start at the live edge, everything else from 0.
    pub fn for_url(url: &RtspUrl) -> Self {
        if url.is_live() {
            Self::new(RANGE_LIVE, 1.0)
        } else {
            Self::new(RANGE_START, 1.0)
        }
    }

    /// `Scale` header value; integral scales render without a fraction.
    pub fn scale_header(&self) -> String {
        format!("{}", self.scale)
    }

    /// Update the cursor for a user command.
    pub fn apply(&mut self, command: &PlaybackCommand) {
        match command {
            PlaybackCommand::Play { range, scale } => {
                if let Some(range) = range {
                    self.range = range.clone();
                }
                if let Some(scale) = scale {
                    self.scale = *scale;
                }
            }
            PlaybackCommand::Pause => {
                self.scale = 1.0;
                self.range = RANGE_NOW.to_string();
            }
            PlaybackCommand::Forward => {
                if self.scale < 0.0 {
                    self.scale = 1.0;
                }
                self.scale *= 2.0;
                self.range = RANGE_NOW.to_string();
            }
            PlaybackCommand::Backward => {
                if self.scale > 0.0 {
                    self.scale = -1.0;
                }
                self.scale *= 2.0;
                self.range = RANGE_NOW.to_string();
            }
            PlaybackCommand::Begin => {
                self.scale = 1.0;
                self.range = RANGE_BEGINNING.to_string();
            }
            PlaybackCommand::Live => {
                self.scale = 1.0;
                self.range = RANGE_LIVE.to_string();
            }
            PlaybackCommand::Teardown => {}
        }
    }
}

impl Default for PlaybackCursor {
    fn default() -> Self {
        Self::new(RANGE_START, 1.0)
    }
}

/// User playback controls.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    /// Re-issue PLAY, optionally moving the cursor first.
    Play {
        range: Option<String>,
        scale: Option<f32>,
    },
    Pause,
    /// Double the forward speed.
    Forward,
    /// Double the reverse speed.
    Backward,
    /// Restart from the beginning at normal speed.
    Begin,
    /// Jump to the live edge at normal speed.
    Live,
    Teardown,
}

impl PlaybackCommand {
    /// Whether the command is followed by a PLAY request.
    pub fn resumes_playback(&self) -> bool {
        !matches!(self, PlaybackCommand::Pause | PlaybackCommand::Teardown)
    }
}
