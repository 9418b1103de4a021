//! Planar geometry used by shadow casting & polygon drawing

use glam::Vec2;

/// Winding of an ordered point triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

/// Classifies `a → b → c` by the sign of its doubled signed area
///
/// Exactly zero is collinear; there is no epsilon
pub fn three_point_orientation(a: Vec2, b: Vec2, c: Vec2) -> Orientation {
    let doubled = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    if doubled == 0.0 {
        Orientation::Collinear
    } else if doubled < 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// Signed area of a triangle, positive when counter-clockwise
pub fn triangle_signed_area(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)) * 0.5
}

/// Directed line segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub p1: Vec2,
    pub p2: Vec2,
}

impl Edge {
    pub fn new(p1: Vec2, p2: Vec2) -> Self {
        Self { p1, p2 }
    }

    pub fn length(&self) -> f32 {
        self.p1.distance(self.p2)
    }

    /// Unit vector from `p1` towards `p2` (zero for a degenerate edge)
    pub fn direction(&self) -> Vec2 {
        (self.p2 - self.p1).normalize_or_zero()
    }

    /// Right-hand normal; points outward on a counter-clockwise polygon
    pub fn normal(&self) -> Vec2 {
        let dir = self.direction();
        Vec2::new(dir.y, -dir.x)
    }
}

/// True when `p` is collinear with `edge` & inside its bounding box
pub fn point_on_segment(p: Vec2, edge: &Edge) -> bool {
    three_point_orientation(edge.p1, edge.p2, p) == Orientation::Collinear
        && p.x >= edge.p1.x.min(edge.p2.x)
        && p.x <= edge.p1.x.max(edge.p2.x)
        && p.y >= edge.p1.y.min(edge.p2.y)
        && p.y <= edge.p1.y.max(edge.p2.y)
}

/// Segment intersection test, touching endpoints & collinear overlap included
pub fn segments_intersect(e1: &Edge, e2: &Edge) -> bool {
    let o1 = three_point_orientation(e1.p1, e1.p2, e2.p1);
    let o2 = three_point_orientation(e1.p1, e1.p2, e2.p2);
    let o3 = three_point_orientation(e2.p1, e2.p2, e1.p1);
    let o4 = three_point_orientation(e2.p1, e2.p2, e1.p2);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    use Orientation::Collinear;
    (o1 == Collinear && point_on_segment(e2.p1, e1))
        || (o2 == Collinear && point_on_segment(e2.p2, e1))
        || (o3 == Collinear && point_on_segment(e1.p1, e2))
        || (o4 == Collinear && point_on_segment(e1.p2, e2))
}

/// Closed polygon; the last vertex connects back to the first
///
/// Edges are derived on demand and never cached
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub vertices: Vec<Vec2>,
}

impl Polygon {
    pub fn new(vertices: Vec<Vec2>) -> Self {
        Self { vertices }
    }

    /// Half the sum of `(b.x - a.x) * (b.y + a.y)` over consecutive vertices
    ///
    /// This shoelace variant is negative for counter-clockwise winding
    pub fn signed_area(&self) -> f32 {
        let n = self.vertices.len();
        let mut area = 0.0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            area += (b.x - a.x) * (b.y + a.y);
        }
        area * 0.5
    }

    pub fn is_counter_clockwise(&self) -> bool {
        self.signed_area() < 0.0
    }

    /// Reverses a clockwise winding
    ///
    /// Zero-area polygons are left as they are, so calling this twice changes nothing
    pub fn ensure_counter_clockwise(&mut self) {
        if self.signed_area() > 0.0 {
            self.vertices.reverse();
            log::info!("Polygon::ensure_counter_clockwise: reversing vertices");
        }
    }

    /// Tests every pair of non-adjacent edges for intersection
    pub fn is_self_intersecting(&self) -> bool {
        let edges: Vec<Edge> = self.edges().collect();
        let n = edges.len();
        for i in 0..n {
            for j in (i + 1)..n {
                if j == (i + 1) % n || j == (i + n - 1) % n {
                    continue;
                }
                if segments_intersect(&edges[i], &edges[j]) {
                    return true;
                }
            }
        }
        false
    }

    /// Counter-clockwise, simple, & at least a triangle
    pub fn is_valid(&self) -> bool {
        self.is_counter_clockwise() && !self.is_self_intersecting() && self.vertices.len() >= 3
    }

    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| Edge::new(self.vertices[i], self.vertices[(i + 1) % n]))
    }
}

impl From<Vec<Vec2>> for Polygon {
    fn from(vertices: Vec<Vec2>) -> Self {
        Self::new(vertices)
    }
}
