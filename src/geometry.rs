use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

impl Segment {
    pub const fn new(from: Point, to: Point) -> Self {
        Self { from, to }
    }

    pub fn midpoint(&self) -> Point {
        Point::new(
            (self.from.x + self.to.x) / 2.0,
            (self.from.y + self.to.y) / 2.0,
        )
    }

    pub fn is_degenerate(&self) -> bool {
        self.from.distance(&self.to) < 1e-3
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.from.translate(dx, dy);
        self.to.translate(dx, dy);
    }

    pub fn bounds(&self) -> Rect {
        let x = self.from.x.min(self.to.x);
        let y = self.from.y.min(self.to.y);
        Rect::new(
            x,
            y,
            self.from.x.max(self.to.x) - x,
            self.from.y.max(self.to.y) - y,
        )
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn centered_at(center: Point, width: f32, height: f32) -> Self {
        Self::new(
            center.x - width / 2.0,
            center.y - height / 2.0,
            width,
            height,
        )
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    pub fn move_center_to(&mut self, center: Point) {
        self.x = center.x - self.width / 2.0;
        self.y = center.y - self.height / 2.0;
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    pub fn union_point(&self, point: Point) -> Rect {
        self.union(&Rect::new(point.x, point.y, 0.0, 0.0))
    }

    /// Grows the rectangle by `dx` on the left and right and `dy` on top and bottom.
    pub fn inflate(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(
            self.x - dx,
            self.y - dy,
            self.width + 2.0 * dx,
            self.height + 2.0 * dy,
        )
    }

    /// Strict overlap; rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// Folds an iterator of rectangles into their union, `None` when it is empty.
pub fn union_all<I>(rects: I) -> Option<Rect>
where
    I: IntoIterator<Item = Rect>,
{
    rects.into_iter().reduce(|acc, rect| acc.union(&rect))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_covers_both_rectangles() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 5.0, 5.0, 20.0);
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 25.0, 25.0));
    }

    #[test]
    fn touching_rectangles_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rect::new(9.0, 9.0, 5.0, 5.0)));
    }

    #[test]
    fn centered_at_round_trips_center() {
        let rect = Rect::centered_at(Point::new(50.0, 40.0), 20.0, 10.0);
        assert_eq!(rect.center(), Point::new(50.0, 40.0));
        assert_eq!(rect.x, 40.0);
        assert_eq!(rect.y, 35.0);
    }

    #[test]
    fn union_all_of_nothing_is_none() {
        assert!(union_all(Vec::new()).is_none());
        let merged = union_all([Rect::new(1.0, 1.0, 1.0, 1.0), Rect::new(-1.0, 0.0, 1.0, 1.0)]);
        assert_eq!(merged, Some(Rect::new(-1.0, 0.0, 3.0, 2.0)));
    }

    #[test]
    fn segment_bounds_are_normalized() {
        let seg = Segment::new(Point::new(10.0, 5.0), Point::new(2.0, 9.0));
        assert_eq!(seg.bounds(), Rect::new(2.0, 5.0, 8.0, 4.0));
    }
}
