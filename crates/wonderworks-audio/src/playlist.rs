//! Background music playlist
//!
//! A fixed, ordered list of tracks with a current position and the shuffle and
//! repeat modes. Index arithmetic lives here; starting and stopping sound is
//! the transport's job.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A playable asset reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Asset path or URL
    pub source: String,
    /// Display title
    pub title: String,
}

impl Track {
    /// Create a track.
    pub fn new(source: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
        }
    }
}

/// Snapshot of the current music track for UI display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    /// Playlist index
    pub index: usize,
    /// Playlist length
    pub total: usize,
    /// Display title
    pub title: String,
    /// Asset path or URL
    pub source: String,
    /// Playback position in seconds
    pub position_secs: f64,
    /// Duration in seconds, once decoded
    pub duration_secs: Option<f64>,
    /// Whether the track is sounding
    pub playing: bool,
}

/// Result of advancing the playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Continue with this index.
    To(usize),
    /// Ran off the end with repeat off.
    End,
}

/// Ordered track list with shuffle and repeat modes.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    tracks: Vec<Track>,
    current: usize,
    /// Pick a random track on advance
    pub shuffle: bool,
    /// Wrap around at either end
    pub repeat: bool,
}

impl Playlist {
    /// Playlist positioned at the first track.
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            current: 0,
            shuffle: false,
            repeat: false,
        }
    }

    /// Number of tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// True if there are no tracks.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// All tracks.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Current index.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Current track, if the playlist is not empty.
    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.current)
    }

    /// Map any integer into range. Empty playlists map everything to 0.
    pub fn normalize(&self, index: i64) -> usize {
        if self.tracks.is_empty() {
            return 0;
        }
        index.rem_euclid(self.tracks.len() as i64) as usize
    }

    /// Move to `index`, normalized into range. Returns the new index.
    pub fn select(&mut self, index: i64) -> usize {
        self.current = self.normalize(index);
        self.current
    }

    /// Index that follows the current one.
    pub fn next_index<R: Rng + ?Sized>(&self, rng: &mut R) -> Advance {
        let len = self.tracks.len();
        if len == 0 {
            return Advance::End;
        }
        if self.shuffle {
            return Advance::To(rng.gen_range(0..len));
        }
        if self.current + 1 < len {
            Advance::To(self.current + 1)
        } else if self.repeat {
            Advance::To(0)
        } else {
            Advance::End
        }
    }

    /// Index that precedes the current one. Stays at 0 without repeat.
    pub fn prev_index(&self) -> usize {
        match self.current {
            _ if self.tracks.is_empty() => 0,
            0 if self.repeat => self.tracks.len() - 1,
            0 => 0,
            i => i - 1,
        }
    }
}
