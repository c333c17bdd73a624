//! Logical mixing channels
//!
//! The site mixes three categories of sound through separate gain stages so
//! each can carry its own volume and mute flag.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// An independently mixed category of sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Background music playlist
    Music,
    /// Section-scoped ambient soundscape
    Ambient,
    /// Short UI sound effects
    Sfx,
}

impl Channel {
    /// Every channel, in gain-stage order.
    pub const ALL: [Channel; 3] = [Channel::Music, Channel::Ambient, Channel::Sfx];

    /// Position of this channel in [`Channel::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Channel::Music => 0,
            Channel::Ambient => 1,
            Channel::Sfx => 2,
        }
    }

    /// Lowercase name used in settings keys and the JS API.
    pub const fn as_str(self) -> &'static str {
        match self {
            Channel::Music => "music",
            Channel::Ambient => "ambient",
            Channel::Sfx => "sfx",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "music" | "bgm" => Ok(Channel::Music),
            "ambient" | "ambience" => Ok(Channel::Ambient),
            "sfx" => Ok(Channel::Sfx),
            _ => Err(AudioError::UnknownChannel(s.to_string())),
        }
    }
}

/// A value for each channel, indexable by [`Channel`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelMap<T> {
    /// Music channel entry
    pub music: T,
    /// Ambient channel entry
    pub ambient: T,
    /// SFX channel entry
    pub sfx: T,
}

impl<T> ChannelMap<T> {
    /// Build a map by evaluating `f` once per channel.
    pub fn from_fn(mut f: impl FnMut(Channel) -> T) -> Self {
        Self {
            music: f(Channel::Music),
            ambient: f(Channel::Ambient),
            sfx: f(Channel::Sfx),
        }
    }

    /// Iterate `(channel, value)` pairs in gain-stage order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, &T)> {
        Channel::ALL.into_iter().map(move |ch| (ch, &self[ch]))
    }

    /// Transform every entry.
    pub fn map<U>(&self, mut f: impl FnMut(Channel, &T) -> U) -> ChannelMap<U> {
        ChannelMap::from_fn(|ch| f(ch, &self[ch]))
    }
}

impl<T> Index<Channel> for ChannelMap<T> {
    type Output = T;

    fn index(&self, channel: Channel) -> &T {
        match channel {
            Channel::Music => &self.music,
            Channel::Ambient => &self.ambient,
            Channel::Sfx => &self.sfx,
        }
    }
}

impl<T> IndexMut<Channel> for ChannelMap<T> {
    fn index_mut(&mut self, channel: Channel) -> &mut T {
        match channel {
            Channel::Music => &mut self.music,
            Channel::Ambient => &mut self.ambient,
            Channel::Sfx => &mut self.sfx,
        }
    }
}
