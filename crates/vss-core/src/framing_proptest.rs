#[cfg(test)]
mod proptest_framing {
    use crate::calibration::Calibration;
    use crate::extract::extract_speed;
    use crate::framer::LineFramer;
    use proptest::prelude::*;

    fn frame_all(chunks: &[&[u8]], capacity: usize) -> Vec<String> {
        let mut framer = LineFramer::new(capacity);
        let mut lines = Vec::new();
        for chunk in chunks {
            framer.feed(chunk, |line| lines.push(line.to_string()));
        }
        lines
    }

    // Bytes biased towards what a speed link carries, terminators included.
    fn link_bytes() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(
            prop_oneof![
                4 => prop::sample::select(b"0123456789".to_vec()),
                2 => prop::sample::select(b"\r\n".to_vec()),
                1 => prop::sample::select(b".+-mph=: \t".to_vec()),
                1 => any::<u8>(),
            ],
            0..400,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        // Property: framing does not depend on how the stream is chunked
        #[test]
        fn chunking_is_irrelevant(
            bytes in link_bytes(),
            cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
            capacity in 1usize..64,
        ) {
            let whole = frame_all(&[&bytes], capacity);

            let mut points: Vec<usize> = cuts.iter().map(|c| c.index(bytes.len() + 1)).collect();
            points.sort_unstable();
            let mut chunks: Vec<&[u8]> = Vec::new();
            let mut start = 0;
            for p in points {
                chunks.push(&bytes[start..p]);
                start = p;
            }
            chunks.push(&bytes[start..]);

            prop_assert_eq!(frame_all(&chunks, capacity), whole);
        }

        // Property: no empty line, no terminator and nothing over capacity is emitted
        #[test]
        fn emitted_lines_are_well_formed(bytes in link_bytes(), capacity in 1usize..64) {
            let mut framer = LineFramer::new(capacity);
            let mut ok = true;
            framer.feed(&bytes, |line| {
                ok &= !line.is_empty()
                    && !line.contains(['\r', '\n'])
                    && line.chars().count() <= capacity;
            });
            prop_assert!(ok);
            prop_assert!(framer.pending() <= capacity);
        }

        // Property: any formatted speed survives a label prefix
        #[test]
        fn labelled_speed_round_trips(
            value in 0.0f64..200.0,
            label in prop::sample::select(vec!["", "MPH:", "mph=", "speed ", "  "]),
        ) {
            let line = format!("{label}{value:.3}");
            let parsed = extract_speed(&line);
            prop_assert!(parsed.is_some());
            prop_assert!((parsed.unwrap() - value).abs() < 1e-3);
        }

        // Property: clamped speeds always land inside the calibrated range
        #[test]
        fn clamped_speed_in_range(raw in any::<f64>().prop_filter("finite or inf", |v| !v.is_nan())) {
            let cal = Calibration::default();
            let mph = cal.clamp_speed(raw);
            prop_assert!((cal.min_speed_mph..=cal.max_speed_mph).contains(&mph));
        }
    }
}
