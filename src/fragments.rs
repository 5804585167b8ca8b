//! Extraction windows and clip filenames for matching segments

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::matching::KeywordMatcher;
use crate::timestamp::{format_timestamp, TimestampStyle};
use crate::transcription::TranscriptSegment;

/// Shortest window handed to the cutter; zero-length segments get stretched
pub const MIN_WINDOW_SECONDS: f64 = 0.5;

/// Third component of a clip filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FragmentNaming {
    /// `<base>_segment<N>_<window start>`
    #[default]
    StartTimestamp,
    /// `<base>_segment<N>_<first matching keyword>`
    Keyword,
}

/// One planned clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentWindow {
    /// Dense 1-based ordinal within the episode
    pub ordinal: u32,
    /// Index of the segment that triggered this window
    pub segment_index: u32,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub keyword: String,
    pub output_path: PathBuf,
}

impl FragmentWindow {
    pub fn duration_seconds(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Turns matching segments into padded, clamped windows
#[derive(Debug, Clone)]
pub struct FragmentPlanner {
    padding_seconds: f64,
    naming: FragmentNaming,
    style: TimestampStyle,
    clips_dir: PathBuf,
    extension: String,
}

impl FragmentPlanner {
    pub fn new(
        padding_seconds: f64,
        naming: FragmentNaming,
        style: TimestampStyle,
        clips_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            padding_seconds: if padding_seconds.is_finite() {
                padding_seconds.max(0.0)
            } else {
                0.0
            },
            naming,
            style,
            clips_dir: clips_dir.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    /// `[start - pad, end + pad]` with the start clamped at zero.
    ///
    /// The end is left for the cutter to clamp against the media length.
    pub fn window_bounds(&self, segment: &TranscriptSegment) -> (f64, f64) {
        let start = (segment.start_seconds - self.padding_seconds).max(0.0);
        let end = segment.end_seconds + self.padding_seconds;
        if end > start {
            (start, end)
        } else {
            (start, start + MIN_WINDOW_SECONDS)
        }
    }

    /// Plan one window per matching segment, in segment-index order.
    ///
    /// Ordinals count matches only, so they run `1..=N` without gaps.
    pub fn plan(
        &self,
        base_name: &str,
        segments: &[TranscriptSegment],
        matcher: &KeywordMatcher,
    ) -> Vec<FragmentWindow> {
        let mut ordered: Vec<&TranscriptSegment> = segments.iter().collect();
        ordered.sort_by_key(|s| s.index);

        ordered
            .into_iter()
            .filter_map(|segment| matcher.first_match(segment).map(|kw| (segment, kw)))
            .enumerate()
            .map(|(i, (segment, keyword))| {
                let ordinal = i as u32 + 1;
                let (start_seconds, end_seconds) = self.window_bounds(segment);
                let output_path = self.output_path(base_name, ordinal, start_seconds, keyword);
                FragmentWindow {
                    ordinal,
                    segment_index: segment.index,
                    start_seconds,
                    end_seconds,
                    keyword: keyword.to_string(),
                    output_path,
                }
            })
            .collect()
    }

    fn output_path(&self, base_name: &str, ordinal: u32, start_seconds: f64, keyword: &str) -> PathBuf {
        let suffix = match self.naming {
            FragmentNaming::StartTimestamp => format_timestamp(start_seconds, self.style),
            FragmentNaming::Keyword => sanitize_component(keyword),
        };
        self.clips_dir.join(format!(
            "{}_segment{}_{}.{}",
            sanitize_component(base_name),
            ordinal,
            suffix,
            self.extension
        ))
    }
}

/// Replace characters that common filesystems reserve
pub fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::MatchMode;

    fn planner(padding: f64, naming: FragmentNaming) -> FragmentPlanner {
        FragmentPlanner::new(padding, naming, TimestampStyle::UnitSuffixed, "out/mp4", "mp4")
    }

    fn seg(index: u32, start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment::new(index, start, end, text).with_romanized(text)
    }

    #[test]
    fn test_padded_window() {
        let window = planner(2.0, FragmentNaming::StartTimestamp).window_bounds(&seg(1, 10.0, 12.0, "x"));
        assert_eq!(window, (8.0, 14.0));
    }

    #[test]
    fn test_start_is_clamped_at_zero() {
        let window = planner(2.0, FragmentNaming::StartTimestamp).window_bounds(&seg(1, 1.0, 2.0, "x"));
        assert_eq!(window, (0.0, 4.0));
    }

    #[test]
    fn test_unpadded_zero_length_segment_is_stretched() {
        let (start, end) = planner(0.0, FragmentNaming::StartTimestamp).window_bounds(&seg(1, 5.0, 5.0, "x"));
        assert_eq!(start, 5.0);
        assert!(end > start);
    }

    #[test]
    fn test_negative_padding_treated_as_zero() {
        let window = planner(-3.0, FragmentNaming::StartTimestamp).window_bounds(&seg(1, 10.0, 12.0, "x"));
        assert_eq!(window, (10.0, 12.0));
    }

    #[test]
    fn test_ordinals_are_dense_over_matches_only() {
        let segments = vec![
            seg(1, 0.0, 1.0, "nothing"),
            seg(2, 5.0, 6.0, "ninja here"),
            seg(3, 10.0, 11.0, "nothing"),
            seg(4, 20.0, 21.0, "nothing"),
            seg(5, 30.0, 31.0, "another ninja"),
            seg(6, 40.0, 41.0, "ninja again"),
        ];
        let matcher = KeywordMatcher::new(&["ninja"], MatchMode::Substring);
        let windows = planner(2.0, FragmentNaming::StartTimestamp).plan("Series - 05", &segments, &matcher);

        let ordinals: Vec<u32> = windows.iter().map(|w| w.ordinal).collect();
        let indices: Vec<u32> = windows.iter().map(|w| w.segment_index).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert_eq!(indices, vec![2, 5, 6]);
    }

    #[test]
    fn test_plan_follows_segment_index_order() {
        let segments = vec![seg(3, 30.0, 31.0, "ninja"), seg(1, 10.0, 11.0, "ninja")];
        let matcher = KeywordMatcher::new(&["ninja"], MatchMode::Substring);
        let windows = planner(0.0, FragmentNaming::StartTimestamp).plan("S - 01", &segments, &matcher);
        assert_eq!(windows[0].segment_index, 1);
        assert_eq!(windows[1].segment_index, 3);
    }

    #[test]
    fn test_no_matches_no_windows() {
        let segments = vec![seg(1, 0.0, 1.0, "abc")];
        let matcher = KeywordMatcher::new(&["zzz"], MatchMode::Substring);
        assert!(planner(2.0, FragmentNaming::StartTimestamp)
            .plan("S - 01", &segments, &matcher)
            .is_empty());
    }

    #[test]
    fn test_timestamp_naming_uses_window_start() {
        let segments = vec![seg(7, 3723.0, 3725.0, "ninja")];
        let matcher = KeywordMatcher::new(&["ninja"], MatchMode::Substring);
        let windows = planner(2.0, FragmentNaming::StartTimestamp).plan("Series - 05", &segments, &matcher);
        assert_eq!(
            windows[0].output_path,
            PathBuf::from("out/mp4/Series - 05_segment1_01h02m01s.mp4")
        );
    }

    #[test]
    fn test_keyword_naming_is_sanitized() {
        let segments = vec![seg(1, 3.0, 4.0, "a/b")];
        let matcher = KeywordMatcher::new(&["a/b"], MatchMode::Substring);
        let windows = planner(2.0, FragmentNaming::Keyword).plan("Series - 05", &segments, &matcher);
        assert_eq!(windows[0].keyword, "a/b");
        assert_eq!(
            windows[0].output_path,
            PathBuf::from("out/mp4/Series - 05_segment1_a_b.mp4")
        );
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("who: me?"), "who_ me_");
        assert_eq!(sanitize_component("忍者"), "忍者");
    }
}
