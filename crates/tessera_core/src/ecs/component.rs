//! # Component System
//!
//! Components are plain data stored by value in versioned slots, so they
//! must be `Copy`. The movement pipeline needs two: a [`Position`] and the
//! [`Velocity`] that advances it.

use std::ops::{Add, Mul};

use bytemuck::{Pod, Zeroable};

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Copy`: No heap allocations, bitwise copyable
/// - `Pod`: Plain old data, safe to transmute
/// - `Zeroable`: Can be safely zeroed
/// - `Default`: Fills the slots of a fresh versioned cache
/// - `Send + Sync`: Read and written from worker threads
///
/// # Example
///
/// ```rust
/// use bytemuck::{Pod, Zeroable};
/// use tessera_core::Component;
///
/// #[derive(Clone, Copy, Default, Pod, Zeroable)]
/// #[repr(C)]
/// struct Health {
///     value: f32,
/// }
///
/// impl Component for Health {
///     const ID: u8 = 10;
/// }
///
/// assert_eq!(Health::BIT, 1 << 10);
/// ```
///
/// An `ID` outside the signature is rejected at compile time:
///
/// ```rust,compile_fail
/// use bytemuck::{Pod, Zeroable};
/// use tessera_core::Component;
///
/// #[derive(Clone, Copy, Default, Pod, Zeroable)]
/// #[repr(C)]
/// struct Overflow {
///     value: f32,
/// }
///
/// impl Component for Overflow {
///     const ID: u8 = 64;
/// }
///
/// const _: u64 = Overflow::BIT;
/// ```
pub trait Component: Copy + Pod + Zeroable + Default + Send + Sync + 'static {
    /// Unique identifier for this component type, below 64.
    const ID: u8;

    /// This component's bit in an entity signature.
    ///
    /// Evaluating it for an `ID` of 64 or more fails to compile, and every
    /// registered array evaluates it.
    const BIT: u64 = {
        assert!(Self::ID < 64, "component ID must be below 64");
        1 << Self::ID
    };
}

/// Three `f32` lanes shared by the spatial components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vec3 {
    /// X lane.
    pub x: f32,
    /// Y lane.
    pub y: f32,
    /// Z lane.
    pub z: f32,
}

impl Vec3 {
    /// All lanes zero.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a vector from its lanes.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// World-space location of an entity. Signature bit 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(transparent)]
pub struct Position(pub Vec3);

impl Component for Position {
    const ID: u8 = 0;
}

impl Position {
    /// Creates a position.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }

    /// Returns this position advanced by `velocity` over `dt` seconds.
    #[inline]
    #[must_use]
    pub fn integrate(self, velocity: Velocity, dt: f32) -> Self {
        Self(self.0 + velocity.0 * dt)
    }
}

/// World units per second. Signature bit 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(transparent)]
pub struct Velocity(pub Vec3);

impl Component for Velocity {
    const ID: u8 = 1;
}

impl Velocity {
    /// Creates a velocity.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }
}
