//! Trajectory model

use glam::Vec3;

use crate::histogram::AttributeSeries;

/// Name of the single attribute produced by the loader
pub const PRESSURE: &str = "pressure";

/// One trajectory: a polyline plus per-point attribute sequences.
///
/// `attributes[k][i]` belongs to `positions[i]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectory {
    pub positions: Vec<Vec3>,
    pub attributes: Vec<Vec<f32>>,
}

impl Trajectory {
    pub fn with_attributes(attribute_count: usize) -> Self {
        Self {
            positions: Vec::new(),
            attributes: vec![Vec::new(); attribute_count],
        }
    }

    pub fn push(&mut self, position: Vec3, attributes: &[f32]) {
        self.positions.push(position);
        for (column, value) in self.attributes.iter_mut().zip(attributes) {
            column.push(*value);
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Attribute `index` at every point, if present
    pub fn attribute(&self, index: usize) -> Option<&[f32]> {
        self.attributes.get(index).map(Vec::as_slice)
    }

    /// Consecutive point pairs with their attribute-0 values
    pub fn segments(&self) -> impl Iterator<Item = ((Vec3, f32), (Vec3, f32))> + '_ {
        let attribute = self.attribute(0).unwrap_or(&[]);
        self.positions.windows(2).enumerate().map(move |(i, pair)| {
            let a = attribute.get(i).copied().unwrap_or(0.0);
            let b = attribute.get(i + 1).copied().unwrap_or(0.0);
            ((pair[0], a), (pair[1], b))
        })
    }
}

/// Trajectories from one input plus the names of their attributes
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrajectorySet {
    pub trajectories: Vec<Trajectory>,
    pub attribute_names: Vec<String>,
}

impl TrajectorySet {
    pub fn new(attribute_names: Vec<String>) -> Self {
        Self {
            trajectories: Vec::new(),
            attribute_names,
        }
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trajectory> {
        self.trajectories.iter()
    }

    pub fn point_count(&self) -> usize {
        self.trajectories.iter().map(Trajectory::len).sum()
    }

    pub fn segment_count(&self) -> usize {
        self.trajectories
            .iter()
            .map(|t| t.len().saturating_sub(1))
            .sum()
    }

    /// Axis-aligned bounds of every point, `None` when empty
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut points = self.trajectories.iter().flat_map(|t| t.positions.iter());
        let first = *points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p))))
    }

    /// One series per attribute, concatenated over all trajectories, with
    /// its global range
    pub fn attribute_series(&self) -> Vec<AttributeSeries> {
        self.attribute_names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let values: Vec<f32> = self
                    .trajectories
                    .iter()
                    .filter_map(|t| t.attribute(index))
                    .flatten()
                    .copied()
                    .collect();
                AttributeSeries::new(name.clone(), values)
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a TrajectorySet {
    type Item = &'a Trajectory;
    type IntoIter = std::slice::Iter<'a, Trajectory>;

    fn into_iter(self) -> Self::IntoIter {
        self.trajectories.iter()
    }
}
