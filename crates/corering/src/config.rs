use crate::RingError;

/// Configuration for [`CoreRing`](crate::CoreRing) and [`DescRing`](crate::DescRing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of slots in the ring.
    ///
    /// Generic rings accept any value; zero yields a disabled ring that refuses
    /// every produce. Descriptor rings require a non-zero power of two.
    pub capacity: usize,
    /// Enable metrics collection (slight overhead)
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom settings.
    pub const fn new(capacity: usize, enable_metrics: bool) -> Self {
        Self {
            capacity,
            enable_metrics,
        }
    }

    /// Creates a power-of-two configuration with `1 << ring_bits` slots.
    ///
    /// # Panics
    ///
    /// Panics if `ring_bits` is not below `usize::BITS` (at compile time when
    /// used in a `const`).
    pub const fn with_bits(ring_bits: u8, enable_metrics: bool) -> Self {
        assert!(
            (ring_bits as u32) < usize::BITS,
            "ring_bits must be below usize::BITS"
        );
        Self::new(1 << ring_bits, enable_metrics)
    }

    /// Returns the capacity of the ring.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the mask for index wrapping.
    ///
    /// Only meaningful once [`validate_power_of_two`](Self::validate_power_of_two)
    /// has accepted the configuration.
    #[inline]
    pub const fn mask(&self) -> usize {
        self.capacity.wrapping_sub(1)
    }

    /// Rejects capacities that cannot back masked index arithmetic.
    pub fn validate_power_of_two(&self) -> Result<(), RingError> {
        if self.capacity == 0 {
            return Err(RingError::InvalidConfiguration("capacity must be non-zero"));
        }
        if !self.capacity.is_power_of_two() {
            return Err(RingError::InvalidConfiguration(
                "capacity must be a power of two",
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 1024,
            enable_metrics: false,
        }
    }
}

/// Low latency configuration (256 slots, stays resident in L1)
pub const LOW_LATENCY_CONFIG: Config = Config::with_bits(8, false);

/// High throughput configuration (64K slots, metrics on)
pub const HIGH_THROUGHPUT_CONFIG: Config = Config::with_bits(16, true);
