//! Fixed layout table for overlay positions.

use crate::config::OverlaySettings;

use super::types::{OverlayPosition, Placement};

/// Margins that define the layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    /// Fraction of width (x) and height (y) kept clear at the edges.
    pub safe_margin: f64,
    /// Fraction of height between the lower-third baseline and the bottom.
    pub lower_third_offset: f64,
}

impl Default for Layout {
    fn default() -> Self {
        Self::from_settings(&OverlaySettings::default())
    }
}

/// Horizontal anchor.
enum Column {
    Left,
    Center,
    Right,
}

/// Vertical anchor.
enum Row {
    Top,
    Middle,
    LowerThird,
    Bottom,
}

impl Layout {
    pub fn from_settings(settings: &OverlaySettings) -> Self {
        Self {
            safe_margin: settings.safe_margin,
            lower_third_offset: settings.lower_third_offset,
        }
    }

    fn margins(&self, frame_w: u32, frame_h: u32) -> (i64, i64) {
        (
            (f64::from(frame_w) * self.safe_margin) as i64,
            (f64::from(frame_h) * self.safe_margin) as i64,
        )
    }

    fn baseline(&self, frame_h: u32) -> i64 {
        (f64::from(frame_h) * (1.0 - self.lower_third_offset)) as i64
    }

    fn anchors(position: OverlayPosition) -> Option<(Column, Row)> {
        use OverlayPosition::*;
        let anchors = match position {
            LowerThirdLeft => (Column::Left, Row::LowerThird),
            LowerThirdCenter => (Column::Center, Row::LowerThird),
            LowerThirdRight => (Column::Right, Row::LowerThird),
            TopLeft => (Column::Left, Row::Top),
            TopCenter => (Column::Center, Row::Top),
            TopRight => (Column::Right, Row::Top),
            BottomLeft => (Column::Left, Row::Bottom),
            BottomCenter => (Column::Center, Row::Bottom),
            BottomRight => (Column::Right, Row::Bottom),
            Center => (Column::Center, Row::Middle),
            Fullscreen => return None,
        };
        Some(anchors)
    }

    /// Pixel placement of an overlay of `overlay_w x overlay_h` (before scaling).
    pub fn place(
        &self,
        position: OverlayPosition,
        frame: (u32, u32),
        overlay: (u32, u32),
        scale: f64,
        offset: (i32, i32),
    ) -> Placement {
        let (frame_w, frame_h) = frame;
        let Some((column, row)) = Self::anchors(position) else {
            return Placement {
                x: i64::from(offset.0),
                y: i64::from(offset.1),
                width: frame_w,
                height: frame_h,
            };
        };

        let width = (f64::from(overlay.0) * scale) as i64;
        let height = (f64::from(overlay.1) * scale) as i64;
        let (mx, my) = self.margins(frame_w, frame_h);
        let fw = i64::from(frame_w);
        let fh = i64::from(frame_h);

        let x = match column {
            Column::Left => mx,
            Column::Center => (fw - width).div_euclid(2),
            Column::Right => fw - width - mx,
        };
        let y = match row {
            Row::Top => my,
            Row::Middle => (fh - height).div_euclid(2),
            Row::LowerThird => self.baseline(frame_h) - height,
            Row::Bottom => fh - height - my,
        };

        Placement {
            x: x + i64::from(offset.0),
            y: y + i64::from(offset.1),
            width: width.max(0) as u32,
            height: height.max(0) as u32,
        }
    }

    /// ffmpeg `overlay` x/y expressions, in terms of the overlay size `w`/`h`.
    pub fn overlay_expressions(
        &self,
        position: OverlayPosition,
        frame: (u32, u32),
        offset: (i32, i32),
    ) -> (String, String) {
        let Some(anchors) = Self::anchors(position) else {
            return (offset.0.to_string(), offset.1.to_string());
        };
        let vars = SizeVars {
            frame_w: "W",
            frame_h: "H",
            item_w: "w".to_string(),
            item_h: "h".to_string(),
        };
        self.expressions(anchors, frame, offset, &vars)
    }

    /// ffmpeg `drawtext` x/y expressions for a text block `block_height`
    /// pixels tall. The x expression centres or right-aligns each line on
    /// its own width. Fullscreen text is centred.
    pub fn text_expressions(
        &self,
        position: OverlayPosition,
        frame: (u32, u32),
        offset: (i32, i32),
        block_height: u32,
    ) -> (String, String) {
        let anchors = Self::anchors(position).unwrap_or((Column::Center, Row::Middle));
        let vars = SizeVars {
            frame_w: "w",
            frame_h: "h",
            item_w: "text_w".to_string(),
            item_h: block_height.to_string(),
        };
        self.expressions(anchors, frame, offset, &vars)
    }

    fn expressions(
        &self,
        (column, row): (Column, Row),
        frame: (u32, u32),
        offset: (i32, i32),
        vars: &SizeVars,
    ) -> (String, String) {
        let (frame_w, frame_h) = frame;
        let (mx, my) = self.margins(frame_w, frame_h);
        let SizeVars {
            frame_w: fw,
            frame_h: fh,
            item_w: w,
            item_h: h,
        } = vars;

        let x = match column {
            Column::Left => mx.to_string(),
            Column::Center => format!("({fw}-{w})/2"),
            Column::Right => format!("{fw}-{w}-{mx}"),
        };
        let y = match row {
            Row::Top => my.to_string(),
            Row::Middle => format!("({fh}-{h})/2"),
            Row::LowerThird => format!("{}-{h}", self.baseline(frame_h)),
            Row::Bottom => format!("{fh}-{h}-{my}"),
        };

        (with_offset(x, offset.0), with_offset(y, offset.1))
    }
}

/// Names ffmpeg gives the frame and item sizes inside an expression.
struct SizeVars {
    frame_w: &'static str,
    frame_h: &'static str,
    item_w: String,
    item_h: String,
}

fn with_offset(expr: String, offset: i32) -> String {
    match offset {
        0 => expr,
        o if o > 0 => format!("{}+{}", expr, o),
        o => format!("{}{}", expr, o),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: (u32, u32) = (1920, 1080);

    #[test]
    fn lower_third_sits_on_baseline() {
        let p = Layout::default().place(OverlayPosition::LowerThirdLeft, FRAME, (600, 120), 1.0, (0, 0));
        assert_eq!(p.x, 96);
        assert_eq!(p.y, 918 - 120);
    }

    #[test]
    fn corners_respect_safe_margin() {
        let layout = Layout::default();
        let tr = layout.place(OverlayPosition::TopRight, FRAME, (200, 100), 1.0, (0, 0));
        assert_eq!((tr.x, tr.y), (1920 - 200 - 96, 54));
        let bl = layout.place(OverlayPosition::BottomLeft, FRAME, (200, 100), 1.0, (0, 0));
        assert_eq!((bl.x, bl.y), (96, 1080 - 100 - 54));
    }

    #[test]
    fn center_uses_scaled_size() {
        let p = Layout::default().place(OverlayPosition::Center, FRAME, (400, 200), 0.5, (10, -5));
        assert_eq!((p.width, p.height), (200, 100));
        assert_eq!((p.x, p.y), (860 + 10, 490 - 5));
    }

    #[test]
    fn fullscreen_covers_frame() {
        let p = Layout::default().place(OverlayPosition::Fullscreen, FRAME, (10, 10), 3.0, (0, 0));
        assert_eq!((p.x, p.y, p.width, p.height), (0, 0, 1920, 1080));
    }

    #[test]
    fn expressions_match_layout() {
        let layout = Layout::default();
        assert_eq!(
            layout.overlay_expressions(OverlayPosition::LowerThirdRight, FRAME, (0, 0)),
            ("W-w-96".to_string(), "918-h".to_string())
        );
        assert_eq!(
            layout.overlay_expressions(OverlayPosition::BottomCenter, FRAME, (0, -8)),
            ("(W-w)/2".to_string(), "H-h-54-8".to_string())
        );
    }

    #[test]
    fn text_expressions_use_drawtext_names() {
        let layout = Layout::default();
        assert_eq!(
            layout.text_expressions(OverlayPosition::LowerThirdLeft, FRAME, (0, 0), 90),
            ("96".to_string(), "918-90".to_string())
        );
        assert_eq!(
            layout.text_expressions(OverlayPosition::Fullscreen, FRAME, (0, 0), 72),
            ("(w-text_w)/2".to_string(), "(h-72)/2".to_string())
        );
    }
}
