use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

/// Frame clock of the player.
///
/// Manual stepping (`next`/`prev`/`seek`) clamps to the clip, automatic advance while playing
/// wraps around to frame 0.
#[derive(Debug, Clone)]
pub struct PlaybackController {
    state: PlaybackState,
    current_frame: usize,
    num_frames: usize,
    base_frame_time: f64,
    speed: f64,
    /// Time accumulated towards the next automatic advance.
    elapsed: f64,
}

impl Default for PlaybackController {
    fn default() -> Self {
        PlaybackController::new(0, 0.0)
    }
}

impl PlaybackController {
    pub fn new(num_frames: usize, base_frame_time: f64) -> Self {
        PlaybackController {
            state: PlaybackState::Stopped,
            current_frame: 0,
            num_frames,
            base_frame_time,
            speed: 1.0,
            elapsed: 0.0,
        }
    }

    /// Back to Stopped, frame 0 and speed 1.0 for a freshly loaded clip.
    pub fn reset(&mut self, num_frames: usize, base_frame_time: f64) {
        *self = PlaybackController::new(num_frames, base_frame_time);
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn base_frame_time(&self) -> f64 {
        self.base_frame_time
    }

    /// Seconds each frame stays on screen at the current speed.
    pub fn frame_interval(&self) -> f64 {
        self.base_frame_time / self.speed
    }

    pub fn play(&mut self) {
        if self.num_frames == 0 {
            return;
        }
        self.state = PlaybackState::Playing;
        debug!("Playback started at frame {}", self.current_frame);
    }

    pub fn pause(&mut self) {
        self.state = PlaybackState::Stopped;
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.current_frame = 0;
        self.elapsed = 0.0;
    }

    pub fn toggle(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn seek(&mut self, frame: usize) {
        self.current_frame = frame.min(self.last_frame());
    }

    pub fn next(&mut self) {
        self.seek(self.current_frame.saturating_add(1));
    }

    pub fn prev(&mut self) {
        self.seek(self.current_frame.saturating_sub(1));
    }

    /// Scale playback rate. Only the rate of later advances changes, never the current frame.
    pub fn set_speed(&mut self, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            warn!("Ignoring invalid playback speed {}", factor);
            return;
        }
        // keep the leftover as the same fraction of the new interval
        self.elapsed *= self.speed / factor;
        self.speed = factor;
    }

    /// Advance one frame, wrapping from the last frame to the first.
    pub fn advance(&mut self) {
        if self.num_frames == 0 {
            return;
        }
        self.current_frame = (self.current_frame + 1) % self.num_frames;
    }

    /// Feed `delta_time` seconds of wall clock. While playing, the frame advances by every full
    /// interval elapsed; the remainder carries over to the next tick. Returns whether the frame
    /// changed.
    pub fn tick(&mut self, delta_time: f64) -> bool {
        if !self.is_playing() || self.num_frames == 0 {
            return false;
        }
        if !delta_time.is_finite() {
            warn!("Ignoring tick of {} seconds", delta_time);
            return false;
        }

        let interval = self.frame_interval();
        let steps = if interval > 0.0 && interval.is_finite() {
            self.elapsed += delta_time.max(0.0);
            let steps = (self.elapsed / interval).floor();
            self.elapsed -= steps * interval;
            steps as usize
        } else {
            // no usable frame time: one frame per tick
            1
        };

        if steps == 0 {
            return false;
        }
        let before = self.current_frame;
        self.current_frame = (self.current_frame + steps % self.num_frames) % self.num_frames;
        self.current_frame != before
    }

    fn last_frame(&self) -> usize {
        self.num_frames.saturating_sub(1)
    }
}
