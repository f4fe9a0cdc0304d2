use nalgebra::Vector2;

/// Stand-in gradient for vertical lines.
pub const VERTICAL_LINE_GRADIENT: f32 = 1e5;

const NEARLY_ZERO: f32 = 1e-8;

/// Infinite 2D line used as a turn boundary while following a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavLine {
    gradient: f32,
    y_intercept: f32,
    gradient_perpendicular: f32,
    approach_side: bool,
    point_on_line_1: Vector2<f32>,
    point_on_line_2: Vector2<f32>,
}

impl NavLine {
    /// Line through `point_on_line`, perpendicular to the direction from
    /// `point_perpendicular`, which also sets the side agents approach from.
    pub fn new(point_on_line: Vector2<f32>, point_perpendicular: Vector2<f32>) -> Self {
        let dx = point_on_line.x - point_perpendicular.x;
        let dy = point_on_line.y - point_perpendicular.y;

        let gradient_perpendicular = if dx.abs() <= NEARLY_ZERO {
            VERTICAL_LINE_GRADIENT
        } else {
            dy / dx
        };
        let gradient = if gradient_perpendicular.abs() <= NEARLY_ZERO {
            VERTICAL_LINE_GRADIENT
        } else {
            -1.0 / gradient_perpendicular
        };

        let mut line = Self {
            gradient,
            y_intercept: point_on_line.y - gradient * point_on_line.x,
            gradient_perpendicular,
            approach_side: false,
            point_on_line_1: point_on_line,
            point_on_line_2: point_on_line + Vector2::new(1.0, gradient),
        };
        line.approach_side = line.side(&point_perpendicular);
        line
    }

    pub fn gradient(&self) -> f32 {
        self.gradient
    }

    pub fn side(&self, point: &Vector2<f32>) -> bool {
        let a = self.point_on_line_1;
        let b = self.point_on_line_2;
        (point.x - a.x) * (b.y - a.y) > (point.y - a.y) * (b.x - a.x)
    }

    pub fn has_crossed_line(&self, point: &Vector2<f32>) -> bool {
        self.side(point) != self.approach_side
    }

    pub fn distance_from_point(&self, point: &Vector2<f32>) -> f32 {
        let y_intercept_perpendicular = point.y - self.gradient_perpendicular * point.x;
        let intersect_x = (y_intercept_perpendicular - self.y_intercept)
            / (self.gradient - self.gradient_perpendicular);
        let intersect_y = self.gradient * intersect_x + self.y_intercept;
        (point - Vector2::new(intersect_x, intersect_y)).norm()
    }
}
