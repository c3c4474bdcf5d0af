use busvis_protocol::SharedStr;

use crate::timeline::TimelineEngine;

/// One detail-panel section: a group title and the records from that
/// group intersecting the highlighted region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSection {
    pub title: SharedStr,
    /// Indices into the pane's record store.
    pub records: Vec<usize>,
}

/// Records under the highlighted region, one section per group, for the
/// external detail panel. Headers are excluded; groups with no match are
/// left out entirely.
pub fn highlighted_messages(eng: &TimelineEngine) -> Vec<HighlightSection> {
    let Some((lb, ub)) = eng.highlight_bounds() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for row in &eng.rows {
        if row.header {
            continue;
        }
        let records: Vec<usize> = row
            .interval_rows
            .iter()
            .flat_map(|&r| eng.intervals[r].iter())
            .filter(|iv| iv.intersects(lb, ub))
            .map(|iv| iv.record)
            .collect();
        if !records.is_empty() {
            out.push(HighlightSection {
                title: row.title.clone(),
                records,
            });
        }
    }
    out
}

/// Flat list of highlighted record indices across every group, in row
/// order. Feeds the per-pane `highlighted_records` cache.
pub fn highlighted_record_indices(eng: &TimelineEngine) -> Vec<usize> {
    highlighted_messages(eng)
        .into_iter()
        .flat_map(|section| section.records)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{GroupBy, MessageField};
    use crate::model::{MessageKind, MessageRecord, Outcome, PaneRecords};
    use crate::timeline::{PaneGeometry, PaneKind};
    use serde_json::json;

    fn message(serial: u32, sender: &str, t0: f64, t1: f64) -> MessageRecord {
        MessageRecord {
            kind: MessageKind::MethodCall,
            serial,
            timestamp: t0,
            sender: SharedStr::from(sender),
            destination: SharedStr::from("org.dest"),
            path: SharedStr::from("/obj"),
            interface: SharedStr::from("org.iface"),
            member: SharedStr::from("Do"),
            payload: json!([]),
            end_timestamp: Some(t1),
            outcome: Outcome::Ok,
        }
    }

    fn engine() -> TimelineEngine {
        let mut eng = TimelineEngine::new(PaneKind::Messages, PaneGeometry::default());
        eng.records = PaneRecords::Messages(vec![
            message(1, ":1.1", 10.0, 11.0),
            message(2, ":1.1", 20.0, 21.0),
            message(3, ":1.2", 10.5, 10.6),
        ]);
        eng.group_by = GroupBy::Messages(vec![MessageField::Sender]);
        eng.regroup(10.0);
        eng
    }

    #[test]
    fn no_highlight_yields_no_sections() {
        let eng = engine();
        assert!(highlighted_messages(&eng).is_empty());
    }

    #[test]
    fn sections_follow_row_order_and_skip_misses() {
        let mut eng = engine();
        // Covers the first :1.1 call and the :1.2 call, not the second
        // :1.1 call at t=10.
        eng.highlight = Some((0.0, 2.0));
        let sections = highlighted_messages(&eng);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, ":1.1");
        assert_eq!(sections[0].records, vec![0]);
        assert_eq!(sections[1].title, ":1.2");
        assert_eq!(sections[1].records, vec![2]);

        assert_eq!(highlighted_record_indices(&eng), vec![0, 2]);
    }

    #[test]
    fn unordered_drag_endpoints_are_normalized() {
        let mut eng = engine();
        eng.highlight = Some((2.0, 0.0));
        assert_eq!(highlighted_record_indices(&eng), vec![0, 2]);
    }
}
