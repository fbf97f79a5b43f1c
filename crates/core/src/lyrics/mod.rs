use crate::config::LyricConfig;
use crate::song::{LyricSegment, WordTiming};

/// One word of the active line, ready for the lyric overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWord {
    pub text: String,
    /// Visibility in `[0, 1]`.
    pub opacity: f32,
}

/// The line the lyric overlay should display right now. Empty when no
/// segment is active and none is upcoming within its fade-in window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveLine {
    pub words: Vec<ResolvedWord>,
}

impl ActiveLine {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Maps wall-clock playback position to per-word visibility.
///
/// The per-segment word layout (including the whitespace synthesis fallback)
/// is memoized on the active segment index, so a steady 60 Hz caller pays
/// O(words-in-segment) per frame rather than re-walking the whole track.
/// Callers must [`reset`](LyricTimingEngine::reset) when the lyric track
/// itself changes (song switch).
#[derive(Debug)]
pub struct LyricTimingEngine {
    config: LyricConfig,
    layout: Option<SegmentLayout>,
}

#[derive(Debug)]
struct SegmentLayout {
    segment_index: usize,
    words: Vec<WordTiming>,
    fade_out: f32,
}

impl LyricTimingEngine {
    pub fn new(config: LyricConfig) -> Self {
        Self {
            config,
            layout: None,
        }
    }

    /// Drops the memoized layout. Call when the lyric track changes.
    pub fn reset(&mut self) {
        self.layout = None;
    }

    /// Resolves the active line for playback position `time`.
    ///
    /// The active segment is the one containing `time`; failing that, the
    /// engine prefers finishing the previous segment's fade-out tail, then
    /// the upcoming segment once `time` enters its fade-in lead.
    pub fn resolve(&mut self, track: &[LyricSegment], time: f32) -> ActiveLine {
        let Some(index) = self.pick_segment(track, time) else {
            return ActiveLine::default();
        };

        self.ensure_layout(track, index);
        let layout = self
            .layout
            .as_ref()
            .expect("layout is built by ensure_layout");

        let words = layout
            .words
            .iter()
            .map(|word| ResolvedWord {
                text: word.text.clone(),
                opacity: word_opacity(
                    time,
                    word.start,
                    word.end,
                    self.config.fade_in_lead,
                    layout.fade_out,
                ),
            })
            .collect();

        ActiveLine { words }
    }

    fn pick_segment(&self, track: &[LyricSegment], time: f32) -> Option<usize> {
        if track.is_empty() {
            return None;
        }

        // First segment whose end has not yet passed.
        let upcoming = track.partition_point(|segment| segment.end < time);

        if let Some(segment) = track.get(upcoming) {
            if segment.start <= time {
                return Some(upcoming);
            }
        }

        // Between segments: keep the previous line while any word is still
        // fading out, otherwise show the next line inside its fade-in lead.
        if upcoming > 0 {
            let previous = &track[upcoming - 1];
            if time <= previous.end + self.fade_out_for(previous) {
                return Some(upcoming - 1);
            }
        }
        if let Some(segment) = track.get(upcoming) {
            if time >= segment.start - self.config.fade_in_lead {
                return Some(upcoming);
            }
        }

        None
    }

    fn ensure_layout(&mut self, track: &[LyricSegment], index: usize) {
        if self
            .layout
            .as_ref()
            .map(|layout| layout.segment_index == index)
            .unwrap_or(false)
        {
            return;
        }

        let segment = &track[index];
        let words = match &segment.words {
            Some(words) => words.clone(),
            None => synthesize_words(segment),
        };
        tracing::debug!(index, words = words.len(), "lyric segment changed");

        self.layout = Some(SegmentLayout {
            segment_index: index,
            words,
            fade_out: self.fade_out_for(segment),
        });
    }

    fn fade_out_for(&self, segment: &LyricSegment) -> f32 {
        let count = word_count(segment).max(1);
        (segment.duration() / count as f32 * self.config.fade_out_scale)
            .max(self.config.min_fade_out)
    }
}

fn word_count(segment: &LyricSegment) -> usize {
    match &segment.words {
        Some(words) => words.len(),
        None => segment.sentence.split_whitespace().count(),
    }
}

/// Splits the sentence on whitespace and distributes the segment duration
/// evenly across the tokens, in order.
fn synthesize_words(segment: &LyricSegment) -> Vec<WordTiming> {
    let tokens: Vec<&str> = segment.sentence.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let span = segment.duration() / tokens.len() as f32;
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| WordTiming {
            start: segment.start + span * i as f32,
            end: segment.start + span * (i + 1) as f32,
            text: (*token).to_string(),
        })
        .collect()
}

/// Opacity for a word with span `[start, end]` at playback position `time`.
///
/// Fade-in ramps 0→1 over `fade_in_lead` seconds ending at `start`; fade-out
/// ramps 1→0 over `fade_out` seconds beginning at `end`. Zero-width ramps
/// (zero-duration words, lead clamped at track start) render fully visible
/// rather than dividing by zero.
fn word_opacity(time: f32, start: f32, end: f32, fade_in_lead: f32, fade_out: f32) -> f32 {
    let fade_in_start = (start - fade_in_lead).max(0.0);
    if time < fade_in_start || time > end + fade_out {
        return 0.0;
    }

    if time < start {
        let ramp = start - fade_in_start;
        if ramp <= f32::EPSILON {
            1.0
        } else {
            ((time - fade_in_start) / ramp).clamp(0.0, 1.0)
        }
    } else if time <= end {
        1.0
    } else if fade_out <= f32::EPSILON {
        1.0
    } else {
        (1.0 - (time - end) / fade_out).clamp(0.0, 1.0)
    }
}
