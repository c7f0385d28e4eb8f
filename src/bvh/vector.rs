//! Small fixed-size vectors generic over a signed integer or float scalar.

use num_traits::{Num, ToPrimitive};
use serde::{Deserialize, Serialize};

/// Scalar types the bounding volumes can be built on.
pub trait Scalar: Num + Copy + PartialOrd + ToPrimitive + std::fmt::Debug {}

impl<T: Num + Copy + PartialOrd + ToPrimitive + std::fmt::Debug> Scalar for T {}

/// Operations a point type must expose to back an [`Aabb`](super::Aabb) or
/// [`Sphere`](super::Sphere).
///
/// `less` / `more` are strict on every axis.
pub trait Vector: Copy + PartialEq + std::fmt::Debug {
    type Scalar: Scalar;

    fn add(self, other: Self) -> Self;
    fn sub(self, other: Self) -> Self;
    fn mul(self, k: Self::Scalar) -> Self;
    fn max(self, other: Self) -> Self;
    fn min(self, other: Self) -> Self;
    fn less(self, other: Self) -> bool;
    fn more(self, other: Self) -> bool;
    fn norm(self) -> f64;
    fn sum(self) -> Self::Scalar;
}

fn max<S: PartialOrd>(a: S, b: S) -> S {
    if a > b {
        a
    } else {
        b
    }
}

fn min<S: PartialOrd>(a: S, b: S) -> S {
    if a < b {
        a
    } else {
        b
    }
}

fn to_f64<S: ToPrimitive>(v: S) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2<S>(pub [S; 2]);

impl<S: Scalar> Vector for Vec2<S> {
    type Scalar = S;

    fn add(self, o: Self) -> Self {
        Vec2([self.0[0] + o.0[0], self.0[1] + o.0[1]])
    }

    fn sub(self, o: Self) -> Self {
        Vec2([self.0[0] - o.0[0], self.0[1] - o.0[1]])
    }

    fn mul(self, k: S) -> Self {
        Vec2([self.0[0] * k, self.0[1] * k])
    }

    fn max(self, o: Self) -> Self {
        Vec2([max(self.0[0], o.0[0]), max(self.0[1], o.0[1])])
    }

    fn min(self, o: Self) -> Self {
        Vec2([min(self.0[0], o.0[0]), min(self.0[1], o.0[1])])
    }

    fn less(self, o: Self) -> bool {
        self.0[0] < o.0[0] && self.0[1] < o.0[1]
    }

    fn more(self, o: Self) -> bool {
        self.0[0] > o.0[0] && self.0[1] > o.0[1]
    }

    fn norm(self) -> f64 {
        let [x, y] = self.0.map(to_f64);
        (x * x + y * y).sqrt()
    }

    fn sum(self) -> S {
        self.0[0] + self.0[1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3<S>(pub [S; 3]);

impl<S: Scalar> Vector for Vec3<S> {
    type Scalar = S;

    fn add(self, o: Self) -> Self {
        Vec3([self.0[0] + o.0[0], self.0[1] + o.0[1], self.0[2] + o.0[2]])
    }

    fn sub(self, o: Self) -> Self {
        Vec3([self.0[0] - o.0[0], self.0[1] - o.0[1], self.0[2] - o.0[2]])
    }

    fn mul(self, k: S) -> Self {
        Vec3([self.0[0] * k, self.0[1] * k, self.0[2] * k])
    }

    fn max(self, o: Self) -> Self {
        Vec3([
            max(self.0[0], o.0[0]),
            max(self.0[1], o.0[1]),
            max(self.0[2], o.0[2]),
        ])
    }

    fn min(self, o: Self) -> Self {
        Vec3([
            min(self.0[0], o.0[0]),
            min(self.0[1], o.0[1]),
            min(self.0[2], o.0[2]),
        ])
    }

    fn less(self, o: Self) -> bool {
        self.0[0] < o.0[0] && self.0[1] < o.0[1] && self.0[2] < o.0[2]
    }

    fn more(self, o: Self) -> bool {
        self.0[0] > o.0[0] && self.0[1] > o.0[1] && self.0[2] > o.0[2]
    }

    fn norm(self) -> f64 {
        let [x, y, z] = self.0.map(to_f64);
        (x * x + y * y + z * z).sqrt()
    }

    fn sum(self) -> S {
        self.0[0] + self.0[1] + self.0[2]
    }
}
