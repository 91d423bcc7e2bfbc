/// Exported name and help text of one observable value.
#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub metric: &'static str,
    pub help: &'static str,
}

pub const SPEED_MPH: Tag = Tag {
    metric: "vss_speed_mph",
    help: "Last accepted speed in mph",
};

pub const TARGET_HZ: Tag = Tag {
    metric: "vss_target_frequency_hz",
    help: "Target pulse frequency in Hz",
};

pub const UPDATE_AGE_MS: Tag = Tag {
    metric: "vss_update_age_milliseconds",
    help: "Milliseconds since the last accepted speed update",
};

pub const OUTPUT_LEVEL: Tag = Tag {
    metric: "vss_output_level",
    help: "Current output level (0=released, 1=sunk)",
};

pub const OUTPUT_EDGES: Tag = Tag {
    metric: "vss_output_edges_total",
    help: "Output level changes",
};

pub const OUTPUT_HEALTHY: Tag = Tag {
    metric: "vss_output_healthy",
    help: "Whether the last output write succeeded (1=ok, 0=failing)",
};

pub const OUTPUT_WRITE_FAILURES: Tag = Tag {
    metric: "vss_output_write_failures_total",
    help: "Output writes that failed",
};

pub const LINK_CONNECTED: Tag = Tag {
    metric: "vss_link_connected",
    help: "Link client connection status (1=connected, 0=disconnected)",
};

pub const LINES_ACCEPTED: Tag = Tag {
    metric: "vss_lines_accepted_total",
    help: "Lines that produced a speed update",
};

pub const LINES_REJECTED: Tag = Tag {
    metric: "vss_lines_rejected_total",
    help: "Lines discarded because they carried no speed",
};

pub const LINES_OVERFLOWED: Tag = Tag {
    metric: "vss_lines_overflowed_total",
    help: "Lines dropped because they exceeded the line buffer",
};
