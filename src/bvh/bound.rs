//! Bounding shapes: axis-aligned boxes and spheres.
//!
//! Containment is evaluated on the open interior. A point lying exactly on a
//! box face (or a sphere surface) is *not* within the shape, so two viewers'
//! boxes sharing an edge never both claim a point on it.

use super::vector::Vector;
use num_traits::{Float, NumCast, One};
use serde::{Deserialize, Serialize};

/// Contract shared by every shape the [`Tree`](super::Tree) can index.
pub trait Bound: Copy + std::fmt::Debug {
    type Point: Vector;

    /// Point strictly inside the shape.
    fn within(&self, point: Self::Point) -> bool;
    /// Interiors of the two shapes overlap.
    fn touch(&self, other: &Self) -> bool;
    /// Smallest shape of this kind enclosing both.
    fn union(&self, other: &Self) -> Self;
    /// Balancing cost; only its monotonicity with size matters.
    fn surface(&self) -> <Self::Point as Vector>::Scalar;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb<V> {
    pub lower: V,
    pub upper: V,
}

impl<V: Vector> Aabb<V> {
    pub fn new(lower: V, upper: V) -> Self {
        Self { lower, upper }
    }

    /// Box spanning `center - half ..= center + half`.
    pub fn around(center: V, half: V) -> Self {
        Self {
            lower: center.sub(half),
            upper: center.add(half),
        }
    }
}

impl<V: Vector> Bound for Aabb<V> {
    type Point = V;

    fn within(&self, point: V) -> bool {
        self.lower.less(point) && self.upper.more(point)
    }

    fn touch(&self, other: &Self) -> bool {
        self.lower.less(other.upper) && other.lower.less(self.upper)
    }

    fn union(&self, other: &Self) -> Self {
        Self {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    fn surface(&self) -> V::Scalar {
        let two = <V::Scalar as One>::one() + <V::Scalar as One>::one();
        self.upper.sub(self.lower).sum() * two
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere<V: Vector> {
    pub center: V,
    pub radius: V::Scalar,
}

impl<V> Sphere<V>
where
    V: Vector,
    V::Scalar: Float,
{
    pub fn new(center: V, radius: V::Scalar) -> Self {
        Self { center, radius }
    }

    fn distance_to(&self, other: V) -> V::Scalar {
        <V::Scalar as NumCast>::from(self.center.sub(other).norm())
            .unwrap_or_else(<V::Scalar as Float>::infinity)
    }
}

impl<V> Bound for Sphere<V>
where
    V: Vector,
    V::Scalar: Float,
{
    type Point = V;

    fn within(&self, point: V) -> bool {
        self.distance_to(point) < self.radius
    }

    fn touch(&self, other: &Self) -> bool {
        self.distance_to(other.center) < self.radius + other.radius
    }

    fn union(&self, other: &Self) -> Self {
        let d = self.distance_to(other.center);
        if d + other.radius <= self.radius {
            return *self;
        }
        if d + self.radius <= other.radius {
            return *other;
        }
        let two = <V::Scalar as One>::one() + <V::Scalar as One>::one();
        let radius = (d + self.radius + other.radius) / two;
        // Slide from our centre towards the other's by however much the
        // enclosing radius exceeds ours.
        let t = (radius - self.radius) / d;
        Self {
            center: self.center.add(other.center.sub(self.center).mul(t)),
            radius,
        }
    }

    fn surface(&self) -> V::Scalar {
        let tau = <V::Scalar as NumCast>::from(std::f64::consts::TAU)
            .unwrap_or_else(<V::Scalar as One>::one);
        tau * self.radius
    }
}
