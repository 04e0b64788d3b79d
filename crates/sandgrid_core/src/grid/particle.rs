//! # Particle Values
//!
//! Particles are pure data. The grid owns exactly one per cell, and an
//! empty cell holds [`Particle::EMPTY`] rather than nothing.

/// Material of a grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParticleKind {
    /// No occupant.
    #[default]
    Empty,
    /// Falling powder.
    Sand,
    /// Flowing liquid.
    Water,
    /// Static solid.
    Stone,
    /// Static solid.
    Wood,
}

impl ParticleKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 5] = [Self::Empty, Self::Sand, Self::Water, Self::Stone, Self::Wood];

    /// Mass a freshly placed particle of this kind receives.
    #[inline]
    #[must_use]
    pub const fn default_mass(self) -> u32 {
        match self {
            Self::Empty => 0,
            Self::Sand => 100,
            Self::Water => 50,
            Self::Stone => 200,
            Self::Wood => 150,
        }
    }
}

/// Contents of a single grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Particle {
    /// Material.
    pub kind: ParticleKind,
    /// Mass. Zero by convention for empty cells.
    pub mass: u32,
    /// Horizontal velocity in cells per tick.
    pub velocity_x: i32,
    /// Vertical velocity in cells per tick.
    pub velocity_y: i32,
}

impl Particle {
    /// The empty cell value.
    pub const EMPTY: Self = Self::new(ParticleKind::Empty, 0);

    /// Creates a particle at rest.
    #[inline]
    #[must_use]
    pub const fn new(kind: ParticleKind, mass: u32) -> Self {
        Self {
            kind,
            mass,
            velocity_x: 0,
            velocity_y: 0,
        }
    }

    /// Creates a particle at rest with its kind's default mass.
    #[inline]
    #[must_use]
    pub const fn with_default_mass(kind: ParticleKind) -> Self {
        Self::new(kind, kind.default_mass())
    }

    /// Returns a copy with the given velocity.
    #[inline]
    #[must_use]
    pub fn with_velocity(mut self, velocity_x: i32, velocity_y: i32) -> Self {
        self.velocity_x = velocity_x;
        self.velocity_y = velocity_y;
        self
    }

    /// True iff this cell has no occupant. Mass is irrelevant.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.kind, ParticleKind::Empty)
    }
}

impl From<ParticleKind> for Particle {
    fn from(kind: ParticleKind) -> Self {
        Self::with_default_mass(kind)
    }
}
