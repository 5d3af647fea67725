// src/geometry.rs
//
// Coordinate mapping between model space, frame space and screen space.
// Everything downstream of the perception adapter agrees on one frame:
// hand landmarks map into screen space directly (the capture buffer is
// already mirrored for self-view), pose keypoints are re-mirrored with
// `mirror_x` before any comparison against non-mirrored overlays.

use nalgebra::Point2;

/// An axis-aligned rectangle in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point2<f32> {
        Point2::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Corner order: top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [Point2<f32>; 4] {
        [
            Point2::new(self.left, self.top),
            Point2::new(self.left + self.width, self.top),
            Point2::new(self.left, self.top + self.height),
            Point2::new(self.left + self.width, self.top + self.height),
        ]
    }

    pub fn contains(&self, p: Point2<f32>) -> bool {
        p.x >= self.left
            && p.x <= self.left + self.width
            && p.y >= self.top
            && p.y <= self.top + self.height
    }
}

/// A bounding circle used for hit-testing rendered targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Point2<f32>,
    pub radius: f32,
}

impl Circle {
    pub fn new(center: Point2<f32>, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn contains(&self, p: Point2<f32>) -> bool {
        distance(self.center, p) <= self.radius
    }
}

pub fn distance(a: Point2<f32>, b: Point2<f32>) -> f32 {
    (b - a).norm()
}

pub fn midpoint(a: Point2<f32>, b: Point2<f32>) -> Point2<f32> {
    Point2::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Map a model-space normalized point into absolute screen coordinates
/// against the rendered canvas rectangle.
pub fn norm_to_screen(nx: f32, ny: f32, rect: &Rect) -> Point2<f32> {
    Point2::new(rect.left + nx * rect.width, rect.top + ny * rect.height)
}

/// Map a point in frame pixel space onto the rendered canvas rectangle.
pub fn frame_to_screen(p: Point2<f32>, frame_w: u32, frame_h: u32, rect: &Rect) -> Point2<f32> {
    norm_to_screen(p.x / frame_w as f32, p.y / frame_h as f32, rect)
}

/// Re-mirror an x coordinate computed against the mirrored buffer back
/// into the non-mirrored frame, for display overlays.
pub fn mirror_x(x: f32, canvas_width: f32) -> f32 {
    canvas_width - x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_to_screen_maps_corners_and_center() {
        let rect = Rect::new(100.0, 50.0, 640.0, 480.0);
        let tl = norm_to_screen(0.0, 0.0, &rect);
        assert_eq!(tl, Point2::new(100.0, 50.0));
        let br = norm_to_screen(1.0, 1.0, &rect);
        assert_eq!(br, Point2::new(740.0, 530.0));
        let c = norm_to_screen(0.5, 0.5, &rect);
        assert_eq!(c, rect.center());
    }

    #[test]
    fn frame_to_screen_scales_pixel_coordinates() {
        let rect = Rect::new(0.0, 0.0, 1280.0, 960.0);
        let p = frame_to_screen(Point2::new(320.0, 240.0), 640, 480, &rect);
        assert_eq!(p, Point2::new(640.0, 480.0));
    }

    #[test]
    fn mirror_x_round_trips() {
        let x = 150.0;
        assert_eq!(mirror_x(x, 640.0), 490.0);
        assert_eq!(mirror_x(mirror_x(x, 640.0), 640.0), x);
    }

    #[test]
    fn circle_contains_boundary() {
        let c = Circle::new(Point2::new(10.0, 10.0), 5.0);
        assert!(c.contains(Point2::new(10.0, 15.0)));
        assert!(c.contains(Point2::new(13.0, 13.0)));
        assert!(!c.contains(Point2::new(10.0, 15.1)));
    }

    #[test]
    fn rect_corners_order() {
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        let corners = rect.corners();
        assert_eq!(corners[0], Point2::new(0.0, 0.0));
        assert_eq!(corners[3], Point2::new(100.0, 50.0));
    }
}
