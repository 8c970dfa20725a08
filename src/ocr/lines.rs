use serde::Serialize;

use super::Detection;

pub const DEFAULT_LINE_THRESHOLD: f32 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuLine {
    pub text: String,
    pub y: f32,
}

/// Groups detections into rows by their top-left Y coordinate.
///
/// Detections are consumed in the order given. A detection joins the current
/// row while it sits within `threshold` of the previous detection's Y; the
/// first one further away starts a new row. Out-of-order input is not
/// re-sorted.
pub fn reconstruct_lines(detections: &[Detection], threshold: f32) -> Vec<MenuLine> {
    let mut lines = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_y = 0f32;
    let mut previous_y: Option<f32> = None;

    for detection in detections {
        let y = detection.top();
        let same_row = previous_y
            .map(|anchor| (y - anchor).abs() < threshold)
            .unwrap_or(true);
        if same_row {
            if current.is_empty() {
                current_y = y;
            }
            current.push(detection.text.as_str());
        } else {
            flush(&mut lines, &current, current_y);
            current = vec![detection.text.as_str()];
            current_y = y;
        }
        previous_y = Some(y);
    }
    flush(&mut lines, &current, current_y);

    lines
}

fn flush(lines: &mut Vec<MenuLine>, words: &[&str], y: f32) {
    if words.is_empty() {
        return;
    }
    let text = words.join(" ");
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    lines.push(MenuLine {
        text: text.to_string(),
        y,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[MenuLine]) -> Vec<&str> {
        lines.iter().map(|line| line.text.as_str()).collect()
    }

    #[test]
    fn groups_close_rows_and_splits_far_ones() {
        let detections = vec![
            Detection::new("Soup", 0.0, 10.0),
            Detection::new("$5", 80.0, 12.0),
            Detection::new("Salad", 0.0, 40.0),
        ];
        let lines = reconstruct_lines(&detections, DEFAULT_LINE_THRESHOLD);
        assert_eq!(texts(&lines), vec!["Soup $5", "Salad"]);
        assert_eq!(lines[0].y, 10.0);
        assert_eq!(lines[1].y, 40.0);
    }

    #[test]
    fn difference_equal_to_threshold_starts_new_line() {
        let detections = vec![
            Detection::new("Tea", 0.0, 100.0),
            Detection::new("Coffee", 0.0, 115.0),
            Detection::new("3", 60.0, 129.9),
        ];
        let lines = reconstruct_lines(&detections, 15.0);
        assert_eq!(texts(&lines), vec!["Tea", "Coffee 3"]);
    }

    #[test]
    fn empty_input_yields_no_lines() {
        assert!(reconstruct_lines(&[], DEFAULT_LINE_THRESHOLD).is_empty());
    }

    #[test]
    fn blank_rows_are_dropped() {
        let detections = vec![
            Detection::new("   ", 0.0, 0.0),
            Detection::new("Nuggets", 0.0, 50.0),
            Detection::new("", 0.0, 90.0),
        ];
        let lines = reconstruct_lines(&detections, DEFAULT_LINE_THRESHOLD);
        assert_eq!(texts(&lines), vec!["Nuggets"]);
    }

    #[test]
    fn out_of_order_detections_are_not_resorted() {
        let detections = vec![
            Detection::new("Tea", 0.0, 200.0),
            Detection::new("Menu", 0.0, 10.0),
            Detection::new("Hot", 0.0, 205.0),
        ];
        let lines = reconstruct_lines(&detections, DEFAULT_LINE_THRESHOLD);
        assert_eq!(texts(&lines), vec!["Tea", "Menu", "Hot"]);
    }
}
