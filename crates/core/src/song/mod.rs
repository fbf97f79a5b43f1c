use serde::{Deserialize, Serialize};

use crate::{Result, VizError};

/// A single word with the playback positions between which it should be
/// visually emphasised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub start: f32,
    pub end: f32,
    pub text: String,
}

/// One timed sentence of lyrics. `words` is optional; when absent the timing
/// engine synthesises even per-word spans from `sentence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricSegment {
    pub start: f32,
    pub end: f32,
    pub sentence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordTiming>>,
}

impl LyricSegment {
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }
}

/// Read-only song record supplied by the surrounding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    #[serde(rename = "audioSource")]
    pub audio_source: String,
    #[serde(rename = "durationSec")]
    pub duration_seconds: f32,
    /// Optional cover image for effects that draw a background.
    #[serde(rename = "artworkUrl", default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
    #[serde(rename = "lyricTrack", default, skip_serializing_if = "Option::is_none")]
    pub lyric_track: Option<Vec<LyricSegment>>,
}

/// Decodes the semi-persisted lyric timing JSON shape
/// `[{ start, end, sentence, words?: [{ start, end, text }] }]` and validates
/// the ordering invariants.
pub fn parse_lyric_track(json: &str) -> Result<Vec<LyricSegment>> {
    let track: Vec<LyricSegment> = serde_json::from_str(json)?;
    validate_lyric_track(&track)?;
    Ok(track)
}

/// Decodes a list of song records and validates each embedded lyric track.
pub fn parse_song_list(json: &str) -> Result<Vec<Song>> {
    let songs: Vec<Song> = serde_json::from_str(json)?;
    for song in &songs {
        if let Some(track) = &song.lyric_track {
            validate_lyric_track(track)?;
        }
    }
    Ok(songs)
}

/// Enforces the lyric track invariants at the boundary so the per-frame
/// timing engine can assume them: segments strictly ordered with
/// `start < end` and no overlap, word spans ascending within their parent.
pub fn validate_lyric_track(track: &[LyricSegment]) -> Result<()> {
    for (index, segment) in track.iter().enumerate() {
        if !(segment.start < segment.end) {
            return Err(VizError::InvalidInput(
                "lyric segment must satisfy start < end",
            ));
        }
        if index > 0 && segment.start < track[index - 1].end {
            return Err(VizError::InvalidInput(
                "lyric segments must be sorted and non-overlapping",
            ));
        }
        if let Some(words) = &segment.words {
            validate_words(segment, words)?;
        }
    }
    Ok(())
}

fn validate_words(segment: &LyricSegment, words: &[WordTiming]) -> Result<()> {
    for (index, word) in words.iter().enumerate() {
        if word.start > word.end {
            return Err(VizError::InvalidInput(
                "word timing must satisfy start <= end",
            ));
        }
        if word.start < segment.start || word.end > segment.end {
            return Err(VizError::InvalidInput(
                "word timings must lie within their parent segment",
            ));
        }
        if index > 0 && word.start < words[index - 1].start {
            return Err(VizError::InvalidInput(
                "word timings must be ascending within a segment",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LYRIC_JSON: &str = r#"[
        { "start": 0.0, "end": 2.0, "sentence": "Hello world" },
        { "start": 2.0, "end": 4.0, "sentence": "Goodbye now",
          "words": [
            { "start": 2.0, "end": 3.0, "text": "Goodbye" },
            { "start": 3.0, "end": 4.0, "text": "now" }
          ] }
    ]"#;

    #[test]
    fn parses_the_persisted_lyric_shape() {
        let track = parse_lyric_track(LYRIC_JSON).unwrap();
        assert_eq!(track.len(), 2);
        assert!(track[0].words.is_none());
        assert_eq!(track[1].words.as_ref().unwrap()[1].text, "now");
    }

    #[test]
    fn parses_song_records_with_renamed_fields() {
        let json = r#"[{
            "id": "song-1",
            "title": "First",
            "audioSource": "https://cdn.example/1.mp3",
            "durationSec": 30.0
        }]"#;
        let songs = parse_song_list(json).unwrap();
        assert_eq!(songs[0].audio_source, "https://cdn.example/1.mp3");
        assert!(songs[0].lyric_track.is_none());
    }

    #[test]
    fn rejects_overlapping_segments() {
        let track = vec![
            LyricSegment {
                start: 0.0,
                end: 2.0,
                sentence: "a".into(),
                words: None,
            },
            LyricSegment {
                start: 1.5,
                end: 3.0,
                sentence: "b".into(),
                words: None,
            },
        ];
        assert!(validate_lyric_track(&track).is_err());
    }

    #[test]
    fn rejects_reversed_segment_bounds() {
        let track = vec![LyricSegment {
            start: 2.0,
            end: 1.0,
            sentence: "a".into(),
            words: None,
        }];
        assert!(validate_lyric_track(&track).is_err());
    }

    #[test]
    fn rejects_words_outside_their_segment() {
        let track = vec![LyricSegment {
            start: 1.0,
            end: 2.0,
            sentence: "a b".into(),
            words: Some(vec![WordTiming {
                start: 0.5,
                end: 1.5,
                text: "a".into(),
            }]),
        }];
        assert!(validate_lyric_track(&track).is_err());
    }

    #[test]
    fn accepts_zero_duration_words() {
        let track = vec![LyricSegment {
            start: 0.0,
            end: 1.0,
            sentence: "a b".into(),
            words: Some(vec![
                WordTiming {
                    start: 0.5,
                    end: 0.5,
                    text: "a".into(),
                },
                WordTiming {
                    start: 0.5,
                    end: 1.0,
                    text: "b".into(),
                },
            ]),
        }];
        assert!(validate_lyric_track(&track).is_ok());
    }
}
