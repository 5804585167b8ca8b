use criterion::{black_box, criterion_group, criterion_main, Criterion};
use episode_clipper::{
    format_timestamp, FragmentNaming, FragmentPlanner, KeywordMatcher, MatchMode, TimestampStyle,
    TranscriptSegment,
};

/// A long episode: one segment every four seconds, every tenth one a hit
fn episode_segments(count: u32) -> Vec<TranscriptSegment> {
    (1..=count)
        .map(|i| {
            let start = f64::from(i) * 4.0;
            let (text, romanized) = if i % 10 == 0 {
                ("俺は忍者だ", "ore ha ninja da")
            } else {
                ("今日はいい天気ですね", "kyou ha ii tenki desu ne")
            };
            TranscriptSegment::new(i, start, start + 3.5, text).with_romanized(romanized)
        })
        .collect()
}

fn bench_matching(c: &mut Criterion) {
    let segments = episode_segments(600);
    let substring = KeywordMatcher::new(&["忍者", "ninja", "sensei"], MatchMode::Substring);
    let word_boundary = KeywordMatcher::new(&["忍者", "ninja", "sensei"], MatchMode::WordBoundary);

    c.bench_function("match_substring_600_segments", |b| {
        b.iter(|| black_box(segments.iter().filter(|s| substring.matches(s)).count()))
    });

    c.bench_function("match_word_boundary_600_segments", |b| {
        b.iter(|| black_box(segments.iter().filter(|s| word_boundary.matches(s)).count()))
    });
}

fn bench_planning(c: &mut Criterion) {
    let segments = episode_segments(600);
    let matcher = KeywordMatcher::new(&["ninja"], MatchMode::Substring);
    let planner = FragmentPlanner::new(
        2.0,
        FragmentNaming::StartTimestamp,
        TimestampStyle::UnitSuffixed,
        "output/mp4",
        "mp4",
    );

    c.bench_function("plan_fragments_600_segments", |b| {
        b.iter(|| black_box(planner.plan("Series - 05", &segments, &matcher)))
    });

    c.bench_function("format_timestamp", |b| {
        b.iter(|| {
            black_box(format_timestamp(black_box(3723.9), TimestampStyle::UnitSuffixed));
            black_box(format_timestamp(black_box(59.0), TimestampStyle::Colon));
        })
    });
}

criterion_group!(benches, bench_matching, bench_planning);
criterion_main!(benches);
