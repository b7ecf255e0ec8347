//! Anatomical regions: convex hulls, exclusion zones, and the precomputed
//! active-point sets the per-frame models run over.

use std::collections::HashMap;
use std::io::Read;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Integer standard-space pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: u32,
    pub y: u32,
}

impl GridPoint {
    /// Euclidean distance to a float point.
    #[inline]
    pub fn distance_to(&self, p: [f64; 2]) -> f64 {
        let dx = self.x as f64 - p[0];
        let dy = self.y as f64 - p[1];
        (dx * dx + dy * dy).sqrt()
    }
}

/// Convex polygon describing one anatomical zone.
///
/// Vertices are stored in input order; containment is evaluated by requiring
/// the query point on one consistent side of every edge, so the winding
/// direction of the input does not matter. Degenerate hulls (fewer than three
/// vertices) contain nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvexHull {
    pub points: Vec<[f64; 2]>,
}

impl ConvexHull {
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self { points }
    }

    /// Centroid of the hull vertices, or `None` for an empty hull.
    pub fn centroid(&self) -> Option<[f64; 2]> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
        Some([sx / n, sy / n])
    }

    /// True when (x, y) lies inside or on the hull boundary.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if self.points.len() < 3 {
            return false;
        }
        let mut sign = 0.0f64;
        for i in 0..self.points.len() {
            let a = self.points[i];
            let b = self.points[(i + 1) % self.points.len()];
            let cross = (b[0] - a[0]) * (y - a[1]) - (b[1] - a[1]) * (x - a[0]);
            if cross.abs() < f64::EPSILON {
                continue; // on the edge line
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }
}

/// User-drawn polygon exclusion zones.
///
/// Wire format: `x,y` pairs separated by `;`, zones separated by `|`.
/// Zones are general polygons; containment uses even-odd ray casting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExclusionZones {
    pub zones: Vec<Vec<[f64; 2]>>,
}

impl ExclusionZones {
    /// Parse the `|`/`;`-delimited zone string. Malformed pairs are dropped
    /// from their zone; a zone reduced below three points excludes nothing.
    pub fn parse(s: &str) -> Self {
        let mut zones = Vec::new();
        for zone_str in s.split('|') {
            let mut zone = Vec::new();
            for pair in zone_str.split(';') {
                let pair = pair.trim();
                if pair.is_empty() {
                    continue;
                }
                let mut it = pair.split(',');
                let x = it.next().and_then(|v| v.trim().parse::<f64>().ok());
                let y = it.next().and_then(|v| v.trim().parse::<f64>().ok());
                match (x, y) {
                    (Some(x), Some(y)) => zone.push([x, y]),
                    _ => tracing::warn!("dropping malformed exclusion point '{}'", pair),
                }
            }
            if !zone.is_empty() {
                zones.push(zone);
            }
        }
        Self { zones }
    }

    /// True when (x, y) falls inside any zone (even-odd rule).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.zones.iter().any(|zone| point_in_polygon(zone, x, y))
    }
}

fn point_in_polygon(poly: &[[f64; 2]], x: f64, y: f64) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        let (xi, yi) = (poly[i][0], poly[i][1]);
        let (xj, yj) = (poly[j][0], poly[j][1]);
        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Precomputed active-point set for one anatomical region.
///
/// Points inside the include hull, outside every exclude hull and exclusion
/// zone, sorted row-major with a per-row index so per-pixel updates can be
/// parallelized over rows with disjoint destinations.
#[derive(Debug, Clone)]
pub struct ActiveRegion {
    points: Vec<GridPoint>,
    rows: Vec<Range<usize>>,
}

impl ActiveRegion {
    /// Rasterize the region over a `size x size` standard-space grid.
    pub fn compute(
        include: &ConvexHull,
        excludes: &[&ConvexHull],
        zones: &ExclusionZones,
        size: usize,
    ) -> Self {
        let mut points = Vec::new();
        let mut rows = Vec::with_capacity(size);
        for y in 0..size {
            let row_start = points.len();
            for x in 0..size {
                let (fx, fy) = (x as f64, y as f64);
                if !include.contains(fx, fy) {
                    continue;
                }
                if excludes.iter().any(|h| h.contains(fx, fy)) || zones.contains(fx, fy) {
                    continue;
                }
                points.push(GridPoint {
                    x: x as u32,
                    y: y as u32,
                });
            }
            rows.push(row_start..points.len());
        }
        Self { points, rows }
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Active points on row `y`, empty for rows outside the region.
    pub fn row(&self, y: usize) -> &[GridPoint] {
        match self.rows.get(y) {
            Some(r) => &self.points[r.clone()],
            None => &[],
        }
    }
}

/// Named hull point lists loaded from the calibration table.
#[derive(Debug, Clone, Default)]
pub struct HullTable {
    hulls: HashMap<String, ConvexHull>,
}

impl HullTable {
    pub fn hull(&self, name: &str) -> Option<&ConvexHull> {
        self.hulls.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, hull: ConvexHull) {
        self.hulls.insert(name.into(), hull);
    }

    /// Read the calibration hull table.
    ///
    /// Expected shape: a header row of `<name>_x`/`<name>_y` column pairs,
    /// data rows of floats. `-1` in either column is the "no point this row"
    /// sentinel. An unparseable cell drops that row's point from its hull
    /// only; the rest of the table still loads.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        // pair up <name>_x / <name>_y headers by name
        let headers = rdr.headers()?.clone();
        let mut columns: Vec<(String, usize, usize)> = Vec::new();
        for (ix, hx) in headers.iter().enumerate() {
            let Some(name) = hx.strip_suffix("_x") else {
                continue;
            };
            if let Some(iy) = headers.iter().position(|h| {
                h.strip_suffix("_y")
                    .map(|n| n == name)
                    .unwrap_or(false)
            }) {
                columns.push((name.to_string(), ix, iy));
            }
        }

        let mut hulls: HashMap<String, Vec<[f64; 2]>> = columns
            .iter()
            .map(|(name, _, _)| (name.clone(), Vec::new()))
            .collect();

        for record in rdr.records() {
            let record = record?;
            for (name, ix, iy) in &columns {
                let x = record.get(*ix).and_then(|v| v.parse::<f64>().ok());
                let y = record.get(*iy).and_then(|v| v.parse::<f64>().ok());
                match (x, y) {
                    (Some(x), Some(y)) if x != -1.0 && y != -1.0 => {
                        hulls.get_mut(name).unwrap().push([x, y]);
                    }
                    (Some(_), Some(_)) => {} // sentinel row
                    _ => tracing::warn!("skipping unparseable {} point", name),
                }
            }
        }

        Ok(Self {
            hulls: hulls
                .into_iter()
                .map(|(name, pts)| (name, ConvexHull::new(pts)))
                .collect(),
        })
    }
}
