//! Geometry scaffolding and the external spatial query capability.
//!
//! The engine never implements spatial logic itself. It carries opaque
//! [`Geometry`] payloads between feeds and the hosting application's spatial
//! layer, scopes queries with an [`Envelope`], and asks the injected
//! [`SpatialQuery`] capability for containment and distance answers.

#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding rectangle used to scope spatial queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Minimum x ordinate.
    pub min_x: f64,
    /// Minimum y ordinate.
    pub min_y: f64,
    /// Maximum x ordinate.
    pub max_x: f64,
    /// Maximum y ordinate.
    pub max_y: f64,
}

impl Envelope {
    /// Creates an envelope from two corner points, normalizing the ordinate
    /// order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// A degenerate envelope covering a single point.
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// The center of the envelope.
    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    /// This envelope grown by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    /// Returns true when the two envelopes overlap.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Returns true when `other` lies entirely inside this envelope.
    pub fn contains(&self, other: &Envelope) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }
}

/// An opaque geometry as exchanged with the spatial capability.
///
/// The engine only reads the envelope, to scope queries; everything else
/// about a shape is the concern of the hosting application's spatial layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    envelope: Envelope,
}

impl Geometry {
    /// A point geometry.
    pub fn point(x: f64, y: f64) -> Self {
        Self { envelope: Envelope::point(x, y) }
    }

    /// A geometry covering `envelope`.
    pub fn from_envelope(envelope: Envelope) -> Self {
        Self { envelope }
    }

    /// The axis-aligned bounds of this geometry.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }
}

/// Spatial predicates supplied by the hosting application.
///
/// The engine calls this with a candidate geometry and zero or more target
/// geometries already scoped to a query area, and expects a boolean or a
/// numeric distance back. No further contract is assumed.
#[cfg_attr(test, automock)]
pub trait SpatialQuery {
    /// Returns true when `geometry` lies within any of `targets`.
    fn contains(&self, geometry: &Geometry, targets: &[Geometry]) -> bool;

    /// The minimum distance between `geometry` and `targets`, or `None` when
    /// `targets` is empty.
    fn distance(&self, geometry: &Geometry, targets: &[Geometry]) -> Option<f64>;
}
