use std::iter::FusedIterator;

use chrono::{DateTime, Duration, TimeZone};

use crate::datetime::start_of_next_day;

/// 1日の範囲に収まるように切り出した時間範囲。
#[derive(Clone, Debug, PartialEq)]
pub struct DayChunk<Tz: TimeZone> {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub duration: Duration,
}

/// `start`から`end`までを日付の境界で区切るイテレーター。
///
/// 日付の境界は`start`のタイムゾーンで判定する。
#[derive(Clone, Debug)]
pub struct DayChunks<Tz: TimeZone> {
    next_start: Option<DateTime<Tz>>,
    end: DateTime<Tz>,
}

/// 時間範囲を日毎に分割する。
///
/// 常に1つ以上のチャンクを返す。`start == end`の場合は長さ0のチャンクを1つ返す。
pub fn split_by_day<Tz: TimeZone>(start: DateTime<Tz>, end: DateTime<Tz>) -> DayChunks<Tz> {
    DayChunks {
        next_start: Some(start),
        end,
    }
}

impl<Tz: TimeZone> Iterator for DayChunks<Tz> {
    type Item = DayChunk<Tz>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start.take()?;
        let boundary = start_of_next_day(&start).unwrap_or_else(|| self.end.clone());
        let end = boundary.clone().min(self.end.clone());

        if end < self.end {
            self.next_start = Some(boundary);
        }

        Some(DayChunk {
            duration: end.clone() - start.clone(),
            start,
            end,
        })
    }
}

impl<Tz: TimeZone> FusedIterator for DayChunks<Tz> {}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
    use proptest::prelude::*;
    use rstest::rstest;

    use super::split_by_day;

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 7, d, h, m, 0).unwrap()
    }

    #[rstest]
    #[case::same_day(utc(4, 10, 0), utc(4, 11, 0), vec![(utc(4, 10, 0), utc(4, 11, 0))])]
    #[case::zero_length(utc(4, 10, 0), utc(4, 10, 0), vec![(utc(4, 10, 0), utc(4, 10, 0))])]
    #[case::crosses_midnight(
        utc(4, 23, 30),
        utc(5, 0, 10),
        vec![(utc(4, 23, 30), utc(5, 0, 0)), (utc(5, 0, 0), utc(5, 0, 10))],
    )]
    #[case::starts_at_midnight(utc(5, 0, 0), utc(5, 0, 10), vec![(utc(5, 0, 0), utc(5, 0, 10))])]
    #[case::ends_at_midnight(utc(4, 23, 30), utc(5, 0, 0), vec![(utc(4, 23, 30), utc(5, 0, 0))])]
    #[case::three_days(
        utc(4, 22, 0),
        utc(6, 1, 0),
        vec![
            (utc(4, 22, 0), utc(5, 0, 0)),
            (utc(5, 0, 0), utc(6, 0, 0)),
            (utc(6, 0, 0), utc(6, 1, 0)),
        ],
    )]
    fn test_split_by_day(
        #[case] start: DateTime<Utc>,
        #[case] end: DateTime<Utc>,
        #[case] expected: Vec<(DateTime<Utc>, DateTime<Utc>)>,
    ) {
        let chunks = split_by_day(start, end)
            .map(|chunk| (chunk.start, chunk.end))
            .collect::<Vec<_>>();

        assert_eq!(chunks, expected);
    }

    #[test]
    fn test_chunk_durations() {
        let durations = split_by_day(utc(4, 23, 30), utc(5, 0, 10))
            .map(|chunk| chunk.duration)
            .collect::<Vec<_>>();

        assert_eq!(durations, vec![Duration::minutes(30), Duration::minutes(10)]);
    }

    /// 日付の境界はチャンクのタイムゾーンで判定する。
    #[test]
    fn test_split_by_day_in_offset() {
        let jst = FixedOffset::east_opt(9 * 3600).unwrap();
        // UTCでは同じ日だが、JSTでは日付をまたぐ。
        let start = utc(4, 14, 30).with_timezone(&jst);
        let end = utc(4, 15, 10).with_timezone(&jst);

        let chunks = split_by_day(start, end).collect::<Vec<_>>();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].end, jst.with_ymd_and_hms(2016, 7, 5, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_end_before_start_yields_single_chunk() {
        let chunks = split_by_day(utc(4, 11, 0), utc(4, 10, 0)).collect::<Vec<_>>();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].duration, Duration::hours(-1));
    }

    #[test]
    fn test_iterator_is_fused() {
        let mut chunks = split_by_day(utc(4, 10, 0), utc(4, 11, 0));

        assert!(chunks.next().is_some());
        assert!(chunks.next().is_none());
        assert!(chunks.next().is_none());
    }

    proptest! {
        /// チャンクが隙間なく重複なく範囲を覆い、日付の境界の数+1個になることを確認する。
        #[test]
        fn chunks_tile_the_range(start_secs in 0i64..2_000_000_000, length_secs in 0i64..(10 * 86_400)) {
            let start = Utc.timestamp_opt(start_secs, 0).unwrap();
            let end = start + Duration::seconds(length_secs);

            let chunks = split_by_day(start, end).collect::<Vec<_>>();

            let crossed = (end.date_naive() - start.date_naive()).num_days();
            let expected = if end > start && end.time() == NaiveTime::MIN {
                crossed
            } else {
                crossed + 1
            };
            prop_assert_eq!(chunks.len() as i64, expected);
            prop_assert_eq!(chunks[0].start, start);
            prop_assert_eq!(chunks[chunks.len() - 1].end, end);
            for pair in chunks.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }
            let total = chunks
                .iter()
                .fold(Duration::zero(), |acc, chunk| acc + chunk.duration);
            prop_assert_eq!(total, end - start);
        }
    }
}
