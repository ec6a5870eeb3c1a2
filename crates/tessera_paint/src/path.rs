//! Vector outlines

use smallvec::SmallVec;

use crate::geometry::{Point, Rect};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo { control: Point, end: Point },
    Close,
}

/// An outline made of straight and quadratic segments
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    commands: SmallVec<[PathCommand; 8]>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed outline through `points`; empty for fewer than two points
    pub fn polygon(points: &[Point]) -> Self {
        let mut path = Self::new();
        if let [first, rest @ ..] = points {
            if rest.is_empty() {
                return path;
            }
            path.move_to(*first);
            for &point in rest {
                path.line_to(point);
            }
            path.close();
        }
        path
    }

    pub fn move_to(&mut self, point: Point) -> &mut Self {
        self.commands.push(PathCommand::MoveTo(point));
        self
    }

    pub fn line_to(&mut self, point: Point) -> &mut Self {
        self.commands.push(PathCommand::LineTo(point));
        self
    }

    pub fn quad_to(&mut self, control: Point, end: Point) -> &mut Self {
        self.commands.push(PathCommand::QuadTo { control, end });
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.commands.push(PathCommand::Close);
        self
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Box around every end and control point; a quadratic stays inside
    /// the hull of its control polygon
    pub fn bounds(&self) -> Rect {
        let points = self.commands.iter().flat_map(|command| match *command {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => [Some(p), None],
            PathCommand::QuadTo { control, end } => [Some(control), Some(end)],
            PathCommand::Close => [None, None],
        });
        points.flatten().fold(None, |acc: Option<Rect>, p| {
            let dot = Rect::new(p.x, p.y, 0.0, 0.0);
            Some(acc.map_or(dot, |rect| {
                Rect::from_ltrb(
                    rect.left().min(p.x),
                    rect.top().min(p.y),
                    rect.right().max(p.x),
                    rect.bottom().max(p.y),
                )
            }))
        })
        .unwrap_or(Rect::EMPTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_include_control_points() {
        let mut path = Path::new();
        path.move_to(Point::ZERO).quad_to(Point::new(5.0, 20.0), Point::new(10.0, 0.0));
        assert_eq!(path.bounds(), Rect::new(0.0, 0.0, 10.0, 20.0));
        assert!(Path::new().bounds().is_empty());
    }

    #[test]
    fn test_polygon_needs_two_points() {
        assert!(Path::polygon(&[Point::ZERO]).is_empty());
        let triangle = Path::polygon(&[Point::ZERO, Point::new(8.0, 0.0), Point::new(0.0, 6.0)]);
        assert_eq!(triangle.commands().len(), 4);
        assert_eq!(triangle.bounds(), Rect::new(0.0, 0.0, 8.0, 6.0));
    }
}
