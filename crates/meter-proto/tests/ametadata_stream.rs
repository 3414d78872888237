//! Feeds a captured `astats` + `ametadata=mode=print` transcript through the
//! parser the same way the ffmpeg reader does, line by line.

use meter_proto::ametadata::AmetadataParser;
use meter_proto::protocol::{PipelineMessage, Sample, DB_CEIL, DB_FLOOR};

const STEREO_TRANSCRIPT: &str = "\
frame:0    pts:0       pts_time:0
lavfi.astats.1.DC_offset=0.000012
lavfi.astats.1.Peak_level=-6.020600
lavfi.astats.1.RMS_level=-9.031000
lavfi.astats.2.DC_offset=-0.000003
lavfi.astats.2.Peak_level=-inf
lavfi.astats.2.RMS_level=-inf
lavfi.astats.Overall.Peak_level=-6.020600
lavfi.astats.Overall.RMS_level=-12.041200
frame:1    pts:2205    pts_time:0.05
lavfi.astats.1.Peak_level=0.000000
lavfi.astats.1.RMS_level=-3.010300
lavfi.astats.2.Peak_level=inf
lavfi.astats.2.RMS_level=nan
frame:2    pts:4410    pts_time:0.1
lavfi.astats.1.Peak_level=-20.5
lavfi.astats.1.RMS_level=-26.25
lavfi.astats.2.Peak_level=-18
lavfi.astats.2.RMS_level=-24
";

fn collect(transcript: &str) -> Vec<PipelineMessage> {
    let mut parser = AmetadataParser::new();
    let mut out: Vec<PipelineMessage> = transcript
        .lines()
        .filter_map(|line| parser.feed_line(line))
        .collect();
    out.extend(parser.finish());
    out
}

#[test]
fn stereo_transcript_yields_one_batch_per_frame() {
    let messages = collect(STEREO_TRANSCRIPT);
    assert_eq!(messages.len(), 3, "got {:?}", messages);

    assert_eq!(
        messages[0],
        PipelineMessage::Level(vec![
            Sample::new(-6.0206, -9.031),
            Sample::new(DB_FLOOR, DB_FLOOR),
        ])
    );
    assert_eq!(
        messages[1],
        PipelineMessage::Level(vec![
            Sample::new(0.0, -3.0103),
            Sample::new(DB_CEIL, DB_FLOOR),
        ])
    );
    assert_eq!(
        messages[2],
        PipelineMessage::Level(vec![Sample::new(-20.5, -26.25), Sample::new(-18.0, -24.0)])
    );
}

#[test]
fn wide_sources_are_passed_through_in_channel_order() {
    let mut transcript = String::from("frame:0 pts:0 pts_time:0\n");
    // astats numbers channels from 1; write them out of order on purpose.
    for ch in (1..=10).rev() {
        transcript.push_str(&format!("lavfi.astats.{ch}.Peak_level=-{ch}.0\n"));
        transcript.push_str(&format!("lavfi.astats.{ch}.RMS_level=-{}.0\n", ch + 10));
    }

    let messages = collect(&transcript);
    let [PipelineMessage::Level(batch)] = messages.as_slice() else {
        panic!("expected exactly one batch, got {:?}", messages);
    };
    assert_eq!(batch.len(), 10);
    for (i, sample) in batch.iter().enumerate() {
        let ch = (i + 1) as f64;
        assert_eq!(sample.peak_db, -ch);
        assert_eq!(sample.rms_db, -(ch + 10.0));
    }
}
