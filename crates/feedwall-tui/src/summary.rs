//! Aggregate status counters for the open station.

use feedwall_proto::protocol::{Aggregate, FeedStatus, StatusClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub total: usize,
    pub live: usize,
    pub error: usize,
}

impl Summary {
    pub fn from_statuses(statuses: impl IntoIterator<Item = FeedStatus>) -> Self {
        statuses
            .into_iter()
            .fold(Self::default(), |mut acc, status| {
                acc.total += 1;
                match status {
                    FeedStatus::Live => acc.live += 1,
                    FeedStatus::Error => acc.error += 1,
                    FeedStatus::Idle => {}
                }
                acc
            })
    }

    /// Overall label and class.  Errors win over live feeds.
    pub fn overall(&self) -> (String, StatusClass) {
        if self.total == 0 {
            return ("Sin transmisión".to_string(), StatusClass::Idle);
        }
        if self.error > 0 {
            let plural = if self.error == 1 { "" } else { "es" };
            return (
                format!("{} transmisión{} con error", self.error, plural),
                StatusClass::Error,
            );
        }
        if self.live > 0 {
            return (format!("{} en vivo", self.live), StatusClass::Live);
        }
        ("En espera".to_string(), StatusClass::Idle)
    }

    /// Header metrics.  `total_streams` counts feeds across every station
    /// and takes precedence over the visible count.
    pub fn aggregate(&self, total_streams: usize) -> Aggregate {
        let (text, class) = self.overall();
        Aggregate {
            total_label: total_label(total_streams, self.total),
            live_count: self.live.to_string(),
            error_count: self.error.to_string(),
            overall_status_text: text,
            overall_status_class: class,
        }
    }

    /// Header metrics on the landing screen.
    pub fn landing(total_streams: usize) -> Aggregate {
        Self::default().aggregate(total_streams)
    }
}

fn total_label(total_streams: usize, visible: usize) -> String {
    match (total_streams, visible) {
        (0, 0) => "--".to_string(),
        (0, n) => n.to_string(),
        (n, _) => n.to_string(),
    }
}
