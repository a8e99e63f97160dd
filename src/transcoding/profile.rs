use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Target rendition of an uploaded video. The set is fixed; every record
/// owns exactly one slot per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
}

impl Resolution {
    pub const ALL: [Resolution; 2] = [Resolution::P480, Resolution::P720];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P480 => "480p",
            Resolution::P720 => "720p",
        }
    }

    pub fn profile(&self) -> &'static ResolutionProfile {
        match self {
            Resolution::P480 => &PROFILES[0],
            Resolution::P720 => &PROFILES[1],
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "480p" => Ok(Resolution::P480),
            "720p" => Ok(Resolution::P720),
            other => Err(format!("unknown resolution '{}'", other)),
        }
    }
}

/// Encoding parameters for one rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionProfile {
    pub resolution: Resolution,
    /// ffmpeg frame size (`-s`), either a named size or `WxH`.
    pub frame_size: &'static str,
    pub video_codec: &'static str,
    pub crf: u8,
    pub audio_codec: &'static str,
    /// Column on the `videos` table holding this rendition.
    pub slot: &'static str,
}

pub static PROFILES: [ResolutionProfile; 2] = [
    ResolutionProfile {
        resolution: Resolution::P480,
        frame_size: "hd480",
        video_codec: "libx264",
        crf: 23,
        audio_codec: "aac",
        slot: "video_480p",
    },
    ResolutionProfile {
        resolution: Resolution::P720,
        frame_size: "hd720",
        video_codec: "libx264",
        crf: 23,
        audio_codec: "aac",
        slot: "video_720p",
    },
];

impl ResolutionProfile {
    pub fn name(&self) -> &'static str {
        self.resolution.as_str()
    }

    /// `<dir>/<base><ext>` -> `<dir>/<base>_<name><ext>`
    pub fn derived_path(&self, source: &Path) -> PathBuf {
        suffixed(source, &format!("_{}", self.name()))
    }

    /// Scratch path the encoder writes to before the output is renamed into place.
    pub fn partial_path(&self, source: &Path) -> PathBuf {
        suffixed(source, &format!("_{}.partial", self.name()))
    }

    /// Same as [`derived_path`](Self::derived_path) for `/`-separated storage references.
    pub fn derived_reference(&self, reference: &str) -> String {
        let (dir, file) = match reference.rfind('/') {
            Some(idx) => reference.split_at(idx + 1),
            None => ("", reference),
        };
        let (base, ext) = match file.rfind('.') {
            Some(idx) if idx > 0 => file.split_at(idx),
            _ => (file, ""),
        };
        format!("{}{}_{}{}", dir, base, self.name(), ext)
    }
}

fn suffixed(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match source.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    source.with_file_name(file_name)
}
