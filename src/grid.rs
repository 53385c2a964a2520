use std::fmt;
use std::str::FromStr;

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Position of a chunk in chunk space. The chunk's world origin is
/// `(x * area, 0, z * area)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GridCoord {
    pub x: i32,
    pub z: i32,
}

impl GridCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// Chunk containing the world position.
    pub fn containing(position: Vec3, area: f32) -> Self {
        Self {
            x: (position.x / area).floor() as i32,
            z: (position.z / area).floor() as i32,
        }
    }

    /// Chunk whose origin is nearest to the world position.
    pub fn nearest(position: Vec3, area: f32) -> Self {
        Self {
            x: (position.x / area).round() as i32,
            z: (position.z / area).round() as i32,
        }
    }

    pub fn chebyshev(self, other: GridCoord) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    pub fn origin(self, area: f32) -> Vec3 {
        Vec3::new(self.x as f32 * area, 0.0, self.z as f32 * area)
    }

    pub fn center(self, area: f32) -> Vec3 {
        self.origin(area) + Vec3::new(area * 0.5, 0.0, area * 0.5)
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.x, self.z)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseGridCoordError(pub String);

impl fmt::Display for ParseGridCoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a grid coordinate", self.0)
    }
}

impl std::error::Error for ParseGridCoordError {}

impl FromStr for GridCoord {
    type Err = ParseGridCoordError;

    // Negative coordinates carry their own '-', so split on the first '_' only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseGridCoordError(s.to_string());
        let (x, z) = s.split_once('_').ok_or_else(err)?;
        let x = x.parse::<i32>().map_err(|_| err())?;
        let z = z.parse::<i32>().map_err(|_| err())?;
        Ok(Self { x, z })
    }
}

/// A 2x2 block of chunks addressed by its bottom-left coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Region(pub GridCoord);

impl Region {
    pub const fn new(x: i32, z: i32) -> Self {
        Self(GridCoord::new(x, z))
    }

    /// Region whose shared corner is nearest to the position, so a brush placed
    /// there can reach all four chunks around that corner.
    pub fn around(position: Vec3, area: f32) -> Self {
        Self(GridCoord::nearest(position, area).offset(-1, -1))
    }

    pub fn origin(self) -> GridCoord {
        self.0
    }

    /// Chunks in quadrant order: bottom-left, bottom-right, top-left, top-right.
    pub fn chunks(self) -> [GridCoord; 4] {
        let c = self.0;
        [c, c.offset(1, 0), c.offset(0, 1), c.offset(1, 1)]
    }

    pub fn contains(self, coord: GridCoord) -> bool {
        let dx = coord.x - self.0.x;
        let dz = coord.z - self.0.z;
        (0..=1).contains(&dx) && (0..=1).contains(&dz)
    }

    /// World XZ of the region's bottom-left corner.
    pub fn anchor(self, area: f32) -> Vec2 {
        Vec2::new(self.0.x as f32 * area, self.0.z as f32 * area)
    }

    pub fn rect(self) -> GridRect {
        GridRect::new(self.0, self.0.offset(1, 1))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region {}", self.0)
    }
}

/// Inclusive rectangle of chunk coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridRect {
    pub min: GridCoord,
    pub max: GridCoord,
}

impl GridRect {
    pub fn new(a: GridCoord, b: GridCoord) -> Self {
        Self {
            min: GridCoord::new(a.x.min(b.x), a.z.min(b.z)),
            max: GridCoord::new(a.x.max(b.x), a.z.max(b.z)),
        }
    }

    pub fn single(coord: GridCoord) -> Self {
        Self {
            min: coord,
            max: coord,
        }
    }

    /// Chunks whose footprint touches the XZ extent of `bounds` grown by
    /// `padding` on every side.
    pub fn covering(bounds: &Bounds, area: f32, padding: f32) -> Self {
        let pad = Vec3::new(padding, 0.0, padding);
        Self::new(
            GridCoord::containing(bounds.min - pad, area),
            GridCoord::containing(bounds.max + pad, area),
        )
    }

    pub fn contains(&self, coord: GridCoord) -> bool {
        coord.x >= self.min.x && coord.x <= self.max.x && coord.z >= self.min.z && coord.z <= self.max.z
    }

    pub fn union(&self, other: &GridRect) -> GridRect {
        GridRect {
            min: GridCoord::new(self.min.x.min(other.min.x), self.min.z.min(other.min.z)),
            max: GridCoord::new(self.max.x.max(other.max.x), self.max.z.max(other.max.z)),
        }
    }

    pub fn chunk_count(&self) -> usize {
        let w = self.max.x as i64 - self.min.x as i64 + 1;
        let h = self.max.z as i64 - self.min.z as i64 + 1;
        (w * h) as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = GridCoord> {
        let (min, max) = (self.min, self.max);
        (min.z..=max.z).flat_map(move |z| (min.x..=max.x).map(move |x| GridCoord::new(x, z)))
    }

    /// Region of the [`regions`](Self::regions) tiling that holds `coord`.
    /// `coord` must lie inside the rectangle.
    pub fn region_of(&self, coord: GridCoord) -> Region {
        let snap = |c: i32, min: i32| (min as i64 + (c as i64 - min as i64) / 2 * 2) as i32;
        Region::new(snap(coord.x, self.min.x), snap(coord.z, self.min.z))
    }

    /// Regions tiling the rectangle. Each chunk of the rectangle belongs to
    /// exactly one returned region; the last row or column may overhang by one.
    pub fn regions(&self) -> impl Iterator<Item = Region> {
        let (min, max) = (self.min, self.max);
        (min.z..=max.z)
            .step_by(2)
            .flat_map(move |z| (min.x..=max.x).step_by(2).map(move |x| Region::new(x, z)))
    }
}

/// Axis aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self { min, max })
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// Bounds of this box after an affine transform, without visiting the
    /// eight corners.
    pub fn transformed(&self, matrix: &Mat4) -> Bounds {
        let xa = matrix.x_axis.truncate() * self.min.x;
        let xb = matrix.x_axis.truncate() * self.max.x;
        let ya = matrix.y_axis.truncate() * self.min.y;
        let yb = matrix.y_axis.truncate() * self.max.y;
        let za = matrix.z_axis.truncate() * self.min.z;
        let zb = matrix.z_axis.truncate() * self.max.z;
        let translation = matrix.w_axis.truncate();
        Bounds {
            min: xa.min(xb) + ya.min(yb) + za.min(zb) + translation,
            max: xa.max(xb) + ya.max(yb) + za.max(zb) + translation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

/// View frustum as six inward facing planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts planes from a view-projection matrix with a `[0, 1]` depth range.
    pub fn from_view_projection(view_proj: Mat4) -> Self {
        let m = view_proj.transpose();
        let (r0, r1, r2, r3) = (m.x_axis, m.y_axis, m.z_axis, m.w_axis);
        let raw: [Vec4; 6] = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2];
        Self {
            planes: raw.map(|p| {
                let n = p.truncate();
                let inv_len = 1.0 / n.length();
                Plane {
                    normal: n * inv_len,
                    d: p.w * inv_len,
                }
            }),
        }
    }

    /// A frustum that accepts everything.
    pub fn unbounded() -> Self {
        let plane = Plane {
            normal: Vec3::Y,
            d: f32::INFINITY,
        };
        Self { planes: [plane; 6] }
    }

    pub fn intersects(&self, bounds: &Bounds) -> bool {
        let center = (bounds.min + bounds.max) * 0.5;
        let extents = (bounds.max - bounds.min) * 0.5;
        self.planes.iter().all(|p| {
            let r = extents.dot(p.normal.abs());
            let s = p.normal.dot(center) + p.d;
            s + r >= 0.0
        })
    }
}
