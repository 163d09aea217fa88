//! morphology::tree
//!
//! Section forest of a neuron morphology.
//!
//! # Architecture
//!
//! Sections live in an arena indexed by section id. Each section stores its
//! parent id (or none for a root) and its child ids in ascending order, so
//! every traversal is an index walk rather than a pointer chase:
//!
//! ```text
//! id  type  parent  children
//! 0   soma  -       [1, 4]
//! 1   axon  0       [2, 3]
//! 2   axon  1       []
//! ...
//! ```
//!
//! Section ids are the rows of the stored `structure` dataset, which is how
//! synapse `*_section_id` columns address a morphology.
//!
//! # Storage
//!
//! A morphology container holds:
//! - `points`: `[N, 4]` floats (x, y, z, diameter)
//! - `structure`: `[M, 3]` ints (first point row, section type, parent row
//!   or -1)
//!
//! Section `i` owns points from its first row up to the next section's
//! first row (or `N` for the last section).
//!
//! # Invariants
//!
//! - Every parent id refers to a section in the arena
//! - The parent relation is acyclic
//! - `children` lists are derived from parents and kept in id order

use std::path::Path;

use crate::core::container::{Container, Data, Dataset};
use crate::core::error::{CurateError, CurateResult};

/// Section type code of the soma.
pub const SOMA_TYPE: i64 = 1;

/// Name of the point dataset.
pub const POINTS: &str = "points";
/// Name of the structure dataset.
pub const STRUCTURE: &str = "structure";

/// A sample point: position and diameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub diameter: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64, diameter: f64) -> Self {
        Self { x, y, z, diameter }
    }

    /// Euclidean distance between positions; diameter is ignored.
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }

    /// Point at fraction `t` along the way to `other`.
    pub fn lerp(&self, other: &Point, t: f64) -> [f64; 3] {
        [
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        ]
    }
}

/// Section contents before the arena links it up.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionData {
    pub section_type: i64,
    pub parent: Option<usize>,
    pub points: Vec<Point>,
}

/// A linked section of the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub id: usize,
    pub section_type: i64,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub points: Vec<Point>,
}

impl Section {
    pub fn is_soma(&self) -> bool {
        self.section_type == SOMA_TYPE
    }

    /// Number of segments (consecutive point pairs).
    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Path length of the polyline.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    /// Path length from the first point to `offset` along `segment`.
    ///
    /// Returns `None` if the segment does not exist.
    pub fn path_length_to(&self, segment: usize, offset: f64) -> Option<f64> {
        let end = self.points.get(segment + 1)?;
        let start = &self.points[segment];
        let before: f64 = self.points[..=segment]
            .windows(2)
            .map(|w| w[0].distance(&w[1]))
            .sum();
        Some(before + offset.clamp(0.0, start.distance(end)))
    }

    /// Midpoint of a segment.
    pub fn segment_midpoint(&self, segment: usize) -> Option<[f64; 3]> {
        let end = self.points.get(segment + 1)?;
        Some(self.points[segment].lerp(end, 0.5))
    }
}

/// A morphology as an arena of sections.
#[derive(Debug, Clone, PartialEq)]
pub struct Morphology {
    sections: Vec<Section>,
}

impl Morphology {
    /// Link sections into an arena; `subject` names the morphology in errors.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` on a dangling parent or a cycle.
    pub fn build(parts: Vec<SectionData>, subject: &str) -> CurateResult<Morphology> {
        let count = parts.len();
        let mut sections: Vec<Section> = parts
            .into_iter()
            .enumerate()
            .map(|(id, part)| Section {
                id,
                section_type: part.section_type,
                parent: part.parent,
                children: Vec::new(),
                points: part.points,
            })
            .collect();

        for id in 0..count {
            if let Some(parent) = sections[id].parent {
                if parent >= count || parent == id {
                    return Err(CurateError::invariant(
                        subject,
                        format!("section {} has dangling parent {}", id, parent),
                    ));
                }
                sections[parent].children.push(id);
            }
        }

        let morphology = Morphology { sections };
        let reached = morphology.dfs_order().len();
        if reached != count {
            return Err(CurateError::invariant(
                subject,
                format!("{} sections are part of a parent cycle", count - reached),
            ));
        }
        Ok(morphology)
    }

    /// Read a morphology from its container layout.
    pub fn from_container(container: &Container, subject: &str) -> CurateResult<Morphology> {
        let points = container.dataset(POINTS)?;
        let structure = container.dataset(STRUCTURE)?;
        let (coords, rows) = match (&points.data, points.shape.as_slice()) {
            (Data::Float(v), [rows, 4]) => (v, *rows),
            _ => {
                return Err(CurateError::invariant(
                    subject,
                    format!("points must be [N, 4] floats, found {:?}", points.shape),
                ))
            }
        };
        let (table, count) = match (&structure.data, structure.shape.as_slice()) {
            (Data::Int(v), [count, 3]) => (v, *count),
            _ => {
                return Err(CurateError::invariant(
                    subject,
                    format!("structure must be [M, 3] ints, found {:?}", structure.shape),
                ))
            }
        };
        if rows.checked_mul(4) != Some(coords.len())
            || count.checked_mul(3) != Some(table.len())
        {
            return Err(CurateError::invariant(
                subject,
                "points or structure hold fewer values than their shape declares",
            ));
        }

        let all_points: Vec<Point> = coords
            .chunks_exact(4)
            .map(|c| Point::new(c[0], c[1], c[2], c[3]))
            .collect();
        let starts: Vec<usize> = (0..count)
            .map(|i| {
                usize::try_from(table[i * 3])
                    .ok()
                    .filter(|&s| s <= rows)
                    .ok_or_else(|| {
                        CurateError::invariant(
                            subject,
                            format!("section {} has invalid point offset {}", i, table[i * 3]),
                        )
                    })
            })
            .collect::<CurateResult<_>>()?;

        let mut parts = Vec::with_capacity(count);
        for i in 0..count {
            let start = starts[i];
            let end = starts.get(i + 1).copied().unwrap_or(rows);
            if end < start {
                return Err(CurateError::invariant(
                    subject,
                    format!("section {} point offsets are not increasing", i),
                ));
            }
            let parent = match table[i * 3 + 2] {
                -1 => None,
                p => Some(usize::try_from(p).map_err(|_| {
                    CurateError::invariant(subject, format!("section {} has parent {}", i, p))
                })?),
            };
            parts.push(SectionData {
                section_type: table[i * 3 + 1],
                parent,
                points: all_points[start..end].to_vec(),
            });
        }
        Morphology::build(parts, subject)
    }

    /// Write the container layout.
    pub fn to_container(&self) -> CurateResult<Container> {
        let mut coords = Vec::new();
        let mut table = Vec::with_capacity(self.sections.len() * 3);
        for section in &self.sections {
            table.push((coords.len() / 4) as i64);
            table.push(section.section_type);
            table.push(section.parent.map(|p| p as i64).unwrap_or(-1));
            for p in &section.points {
                coords.extend_from_slice(&[p.x, p.y, p.z, p.diameter]);
            }
        }
        let mut container = Container::new();
        container.put_dataset(POINTS, Dataset::matrix(Data::Float(coords), 4))?;
        container.put_dataset(STRUCTURE, Dataset::matrix(Data::Int(table), 3))?;
        Ok(container)
    }

    /// Load a morphology file.
    pub fn load(path: &Path) -> CurateResult<Morphology> {
        let container = Container::load(path)?;
        Morphology::from_container(&container, &path.display().to_string())
    }

    /// Save a morphology file atomically.
    pub fn save(&self, path: &Path) -> CurateResult<()> {
        self.to_container()?.save(path)?;
        Ok(())
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, id: usize) -> Option<&Section> {
        self.sections.get(id)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Root section ids in id order.
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.sections
            .iter()
            .filter(|s| s.parent.is_none())
            .map(|s| s.id)
    }

    /// Whether `id` is a non-soma section with exactly one child.
    pub fn is_unifurcation(&self, id: usize) -> bool {
        self.sections
            .get(id)
            .is_some_and(|s| !s.is_soma() && s.children.len() == 1)
    }

    /// True iff any non-soma section has exactly one child.
    pub fn has_unifurcations(&self) -> bool {
        (0..self.sections.len()).any(|id| self.is_unifurcation(id))
    }

    /// Section ids in depth-first pre-order: roots in id order, children
    /// in id order.
    ///
    /// Sections unreachable from a root (cycles) are not visited.
    pub fn dfs_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.sections.len());
        let mut stack: Vec<usize> = self.roots().collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.sections[id].children.iter().rev());
        }
        order
    }

    /// True iff every section id equals its depth-first pre-order position.
    ///
    /// This implies every parent precedes its children and every subtree
    /// occupies a contiguous id range.
    pub fn has_sonata_ordering(&self) -> bool {
        self.dfs_order()
            .into_iter()
            .enumerate()
            .all(|(position, id)| position == id)
    }
}
