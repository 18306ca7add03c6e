//! Coordinate extraction from locator answers such as `<answer>[103,470]</answer>`
//! or `<answer>[500,800],[500,200]</answer>`, plus swipe endpoint inference.
use serde_json::Value;

use crate::errors::{PhoneClawError, PhoneClawResult};
use crate::protocol::action::Point;

/// Distance, in relative units, of a synthesized swipe endpoint from its start.
pub const SWIPE_OFFSET: f64 = 300.0;

/// Extracts every bracketed coordinate group, left to right.
///
/// Two numbers form a point; four numbers form a bounding box and yield its
/// centre. Groups of any other shape are skipped.
pub fn resolve(answer: &str) -> PhoneClawResult<Vec<Point>> {
    let cleaned: String = answer
        .trim()
        .replace("<answer>", "")
        .replace("</answer>", "")
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect();
    let cleaned = cleaned.trim();

    let mut points = Vec::new();
    let mut open: Option<usize> = None;
    for (idx, ch) in cleaned.char_indices() {
        match ch {
            '[' => open = Some(idx),
            ']' => {
                if let Some(start) = open.take() {
                    if let Some(point) = parse_group(&cleaned[start + 1..idx]) {
                        points.push(point);
                    }
                }
            }
            _ => {}
        }
    }

    if points.is_empty() {
        return Err(PhoneClawError::Resolve(format!(
            "no coordinates found in: {cleaned}"
        )));
    }
    Ok(points)
}

fn parse_group(group: &str) -> Option<Point> {
    let values = group
        .split(',')
        .map(|t| t.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    match values.as_slice() {
        [x, y] => Some(Point::new(*x, *y)),
        [x1, y1, x2, y2] => Some(Point::new((x1 + x2) / 2.0, (y1 + y2) / 2.0)),
        _ => None,
    }
}

/// Parses `"[x,y]"` or `"x, y"`. Missing or non-numeric components become 0.
pub fn parse_point(raw: &str) -> Point {
    let stripped = raw.replace(['[', ']'], "");
    let mut parts = stripped.split(',').map(|t| t.trim().parse::<f64>().unwrap_or(0.0));
    let x = parts.next().unwrap_or(0.0);
    let y = parts.next().unwrap_or(0.0);
    Point::new(x, y)
}

/// Point from a planner parameter: a JSON list is read positionally, a string
/// goes through [`parse_point`]. Other shapes are unsupported.
pub fn point_from_json(value: &Value) -> Option<Point> {
    match value {
        Value::Array(items) => {
            let component = |i: usize| {
                items
                    .get(i)
                    .and_then(|v| match v {
                        Value::Number(n) => n.as_f64(),
                        Value::String(s) => s.trim().parse::<f64>().ok(),
                        _ => None,
                    })
                    .unwrap_or(0.0)
            };
            Some(Point::new(component(0), component(1)))
        }
        Value::String(s) => Some(parse_point(s)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    RightToLeft,
    LeftToRight,
    BottomToTop,
    TopToBottom,
}

const RIGHT_TO_LEFT: &[&str] = &["从右向左", "从右往左", "向左滑", "right to left", "right-to-left", "swipe left"];
const LEFT_TO_RIGHT: &[&str] = &["从左向右", "从左往右", "向右滑", "left to right", "left-to-right", "swipe right"];
const BOTTOM_TO_TOP: &[&str] = &["从下往上", "从下向上", "向上滑", "bottom to top", "bottom-to-top", "swipe up"];
const TOP_TO_BOTTOM: &[&str] = &["从上往下", "从上向下", "向下滑", "top to bottom", "top-to-bottom", "swipe down"];

impl SwipeDirection {
    /// Case-insensitive keyword match over free text. Right-to-left when nothing matches.
    pub fn from_text(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let hit = |phrases: &[&str]| phrases.iter().any(|p| lowered.contains(p));
        if hit(RIGHT_TO_LEFT) {
            Self::RightToLeft
        } else if hit(LEFT_TO_RIGHT) {
            Self::LeftToRight
        } else if hit(BOTTOM_TO_TOP) {
            Self::BottomToTop
        } else if hit(TOP_TO_BOTTOM) {
            Self::TopToBottom
        } else {
            Self::RightToLeft
        }
    }

    /// Endpoint [`SWIPE_OFFSET`] units from `start`, clamped into range.
    pub fn end_from(self, start: Point) -> Point {
        match self {
            Self::RightToLeft => start.offset(-SWIPE_OFFSET, 0.0),
            Self::LeftToRight => start.offset(SWIPE_OFFSET, 0.0),
            Self::BottomToTop => start.offset(0.0, -SWIPE_OFFSET),
            Self::TopToBottom => start.offset(0.0, SWIPE_OFFSET),
        }
    }
}

/// Start and end of a swipe. A lone point gets its end synthesized from the
/// direction described in `reason`.
pub fn swipe_endpoints(points: &[Point], reason: &str) -> Option<(Point, Point)> {
    match points {
        [] => None,
        [start] => Some((*start, SwipeDirection::from_text(reason).end_from(*start))),
        [start, end, ..] => Some((*start, *end)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_tag_point() {
        assert_eq!(
            resolve("<answer>[103,470]</answer>").unwrap(),
            vec![Point::new(103.0, 470.0)]
        );
    }

    #[test]
    fn bounding_box_becomes_centre() {
        assert_eq!(resolve("[10,20,30,40]").unwrap(), vec![Point::new(20.0, 30.0)]);
    }

    #[test]
    fn multiple_groups_in_order() {
        let pts = resolve("  <answer>[500,800],\n[500, 200]</answer> ").unwrap();
        assert_eq!(pts, vec![Point::new(500.0, 800.0), Point::new(500.0, 200.0)]);
    }

    #[test]
    fn group_at_start_of_text_is_found() {
        assert_eq!(resolve("[1,2]").unwrap(), vec![Point::new(1.0, 2.0)]);
    }

    #[test]
    fn malformed_groups_are_skipped() {
        let pts = resolve("[1,2,3] [a,b] [[7,8]]").unwrap();
        assert_eq!(pts, vec![Point::new(7.0, 8.0)]);
    }

    #[test]
    fn nothing_found_is_an_error() {
        let err = resolve("<answer>no idea</answer>").unwrap_err();
        assert!(matches!(err, PhoneClawError::Resolve(_)));
    }

    #[test]
    fn parse_point_forms() {
        assert_eq!(parse_point("[500, 500]"), Point::new(500.0, 500.0));
        assert_eq!(parse_point("12,34"), Point::new(12.0, 34.0));
        assert_eq!(parse_point("[x, 9]"), Point::new(0.0, 9.0));
        assert_eq!(parse_point("7"), Point::new(7.0, 0.0));
    }

    #[test]
    fn json_point_forms() {
        assert_eq!(
            point_from_json(&serde_json::json!([100, "200"])),
            Some(Point::new(100.0, 200.0))
        );
        assert_eq!(
            point_from_json(&serde_json::json!("[3,4]")),
            Some(Point::new(3.0, 4.0))
        );
        assert_eq!(point_from_json(&serde_json::json!({"x": 1})), None);
    }

    #[test]
    fn upward_swipe_is_inferred() {
        let (start, end) = swipe_endpoints(&[Point::new(500.0, 800.0)], "在列表中向上滑动").unwrap();
        assert_eq!(start, Point::new(500.0, 800.0));
        assert_eq!(end, Point::new(500.0, 500.0));
    }

    #[test]
    fn inferred_endpoint_is_clamped() {
        let (_, end) = swipe_endpoints(&[Point::new(100.0, 900.0)], "Swipe Down to refresh").unwrap();
        assert_eq!(end, Point::new(100.0, 1000.0));
        let (_, end) = swipe_endpoints(&[Point::new(100.0, 900.0)], "").unwrap();
        assert_eq!(end, Point::new(0.0, 900.0));
    }

    #[test]
    fn explicit_endpoints_win() {
        let pts = [Point::new(1.0, 2.0), Point::new(3.0, 4.0)];
        assert_eq!(swipe_endpoints(&pts, "向上滑"), Some((pts[0], pts[1])));
        assert_eq!(swipe_endpoints(&[], "向上滑"), None);
    }
}
