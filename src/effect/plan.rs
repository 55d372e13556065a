//! The fixed blur/sharpen pass graph.
//!
//! A blarp of `n` iterations is `n` full-screen passes over a pair of ping-pong buffers
//! `A` and `B`. Step `i` is a blur (`A -> B`) when `i` is even and a sharpen (`B -> A`) when
//! `i` is odd. Blur direction is horizontal for `i % 4 < 2` and vertical otherwise.
//!
//! The result is read from `A` for odd `n` and from `B` for even `n`, which is the buffer the
//! last step sampled from. The last step's own output is never read back.

/// Sharpen strength `a` in `(4a + 1) * center - a * (up + down + left + right)`.
pub const SHARPEN_STRENGTH: f32 = 0.55;

/// Center weight of the 5-tap blur folded into 3 linear samples.
pub const BLUR_CENTER_WEIGHT: f32 = 0.294_117_65;
/// Weight of each of the two off-center linear samples.
pub const BLUR_SIDE_WEIGHT: f32 = 0.352_941_18;
/// Distance of the off-center samples in texels.
pub const BLUR_SIDE_OFFSET: f32 = 1.333_333_3;

/// One of the two ping-pong buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Initialized from the source image.
    A,
    /// Uninitialized render target.
    B,
}

/// Axis a blur step runs along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlurDirection {
    /// Samples left and right of the center texel.
    Horizontal,
    /// Samples above and below the center texel.
    Vertical,
}

impl BlurDirection {
    /// Direction vector in texel space.
    pub fn vector(self) -> [f32; 2] {
        match self {
            Self::Horizontal => [1.0, 0.0],
            Self::Vertical => [0.0, 1.0],
        }
    }
}

/// The two states of the pass state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassState {
    /// 3-tap linear blur along one axis, `A -> B`.
    Blur(BlurDirection),
    /// 5-point Laplacian sharpen, `B -> A`.
    Sharpen,
}

impl PassState {
    /// State for step `i`.
    pub fn at(i: u32) -> Self {
        if i.is_multiple_of(2) {
            let dir = if i % 4 < 2 {
                BlurDirection::Horizontal
            } else {
                BlurDirection::Vertical
            };
            Self::Blur(dir)
        } else {
            Self::Sharpen
        }
    }

    /// Buffer this state samples from.
    pub fn read(self) -> Slot {
        match self {
            Self::Blur(_) => Slot::A,
            Self::Sharpen => Slot::B,
        }
    }

    /// Buffer this state renders into.
    pub fn write(self) -> Slot {
        match self {
            Self::Blur(_) => Slot::B,
            Self::Sharpen => Slot::A,
        }
    }
}

/// One full-screen pass of a [`PassPlan`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassStep {
    /// Zero-based position in the plan.
    pub index: u32,
    /// Which shader runs, and in which direction for blurs.
    pub state: PassState,
    /// Buffer bound as the sampled texture.
    pub read: Slot,
    /// Buffer bound as the color attachment.
    pub write: Slot,
}

/// Ordered list of pass descriptors for one blarp invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassPlan {
    iterations: u32,
}

impl PassPlan {
    /// Plan of `iterations` passes. Zero is allowed and renders nothing.
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Number of passes in the plan.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// `true` when the plan has no passes and the source is the result.
    pub fn is_empty(&self) -> bool {
        self.iterations == 0
    }

    /// Passes in execution order. Step `i` runs [`PassState::at`]`(i)`.
    pub fn steps(&self) -> impl Iterator<Item = PassStep> + '_ {
        (0..self.iterations).map(|index| {
            let state = PassState::at(index);
            PassStep {
                index,
                state,
                read: state.read(),
                write: state.write(),
            }
        })
    }

    /// Buffer read back once every step has run.
    ///
    /// `A` for odd counts, `B` for even counts. With zero steps the untouched source in `A`
    /// is the result.
    pub fn final_slot(&self) -> Slot {
        if self.iterations == 0 || !self.iterations.is_multiple_of(2) {
            Slot::A
        } else {
            Slot::B
        }
    }
}

/// What one render actually did, recorded by the backends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassTrace {
    /// Steps in the order they were encoded.
    pub steps: Vec<PassStep>,
    /// Buffer whose pixels were copied back to the host.
    pub read_back_from: Slot,
}

impl PassTrace {
    /// Buffer written by the last step, `None` for an empty render.
    pub fn last_written(&self) -> Option<Slot> {
        self.steps.last().map(|s| s.write)
    }
}
